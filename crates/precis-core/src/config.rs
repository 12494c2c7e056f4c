use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Top-level config (precis.toml + PRECIS_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrecisConfig {
    pub discord: DiscordConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    pub summarization: SummarizationConfig,
    #[serde(default)]
    pub targets: TargetsConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub bot_token: String,
    /// Channel IDs the bot scans for links. Messages elsewhere are ignored.
    pub monitored_channels: Vec<u64>,
    #[serde(default = "default_prefix")]
    pub command_prefix: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesConfig {
    pub youtube: Option<YouTubeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YouTubeConfig {
    /// YouTube Data API v3 key.
    pub api_key: String,
    #[serde(default = "default_youtube_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizationConfig {
    /// Summarizer adapter id, e.g. "anthropic" or "openai".
    #[serde(default = "default_provider")]
    pub provider: String,
    pub api_key: String,
    /// Model override. Each adapter supplies its own default when unset.
    pub model: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Language the summary is written in, regardless of source language.
    #[serde(default = "default_language")]
    pub language: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetsConfig {
    /// Target adapter ids to deliver every summary to, in order.
    /// Every id listed here must resolve at startup.
    #[serde(default)]
    pub enabled: Vec<String>,
    pub coda: Option<CodaConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodaConfig {
    pub api_key: String,
    pub doc_id: String,
    pub table_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Pending entries older than this are reconciled to `failed` by the
    /// startup recovery sweep.
    #[serde(default = "default_stale_minutes")]
    pub stale_after_minutes: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            stale_after_minutes: default_stale_minutes(),
        }
    }
}

/// Retry knobs for transient adapter failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

fn default_prefix() -> String {
    "!precis".to_string()
}
fn default_provider() -> String {
    "anthropic".to_string()
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_language() -> String {
    "français".to_string()
}
fn default_youtube_base_url() -> String {
    "https://www.googleapis.com/youtube/v3".to_string()
}
fn default_stale_minutes() -> u64 {
    60
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    500
}
fn default_backoff_max_ms() -> u64 {
    30_000
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.precis/precis.db", home)
}

impl PrecisConfig {
    /// Load config from a TOML file with PRECIS_* env var overrides.
    ///
    /// Checks in order: explicit path argument, then ~/.precis/precis.toml.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: PrecisConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("PRECIS_").split("_"))
            .extract()
            .map_err(|e| CoreError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Checks that do not need the adapter registries. Registry resolution of
    /// the configured summarizer/target ids happens separately at startup.
    pub fn validate(&self) -> Result<()> {
        if self.discord.bot_token.is_empty() {
            return Err(CoreError::Config("discord.bot_token is empty".into()));
        }
        if self.discord.monitored_channels.is_empty() {
            return Err(CoreError::Config(
                "discord.monitored_channels is empty — nothing to scan".into(),
            ));
        }
        if self.summarization.api_key.is_empty() {
            return Err(CoreError::Config("summarization.api_key is empty".into()));
        }
        if self.targets.enabled.iter().any(|t| t == "coda") && self.targets.coda.is_none() {
            return Err(CoreError::Config(
                "target \"coda\" is enabled but [targets.coda] is missing".into(),
            ));
        }
        Ok(())
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.precis/precis.toml", home)
}
