use std::sync::Arc;

use tracing::info;

mod adapter;
mod commands;
mod handler;
mod platform;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "precis=info,precis_bot=info".into()),
        )
        .init();

    // load config: explicit path > PRECIS_CONFIG env > ~/.precis/precis.toml
    let config_path = std::env::var("PRECIS_CONFIG").ok();
    let config = precis_core::config::PrecisConfig::load(config_path.as_deref())?;

    // open the ledger database
    let db_path = &config.ledger.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening ledger database");
    let db = rusqlite::Connection::open(db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    let ledger = Arc::new(precis_ledger::DedupCache::new(db)?);

    // recovery sweep: a crash mid-run leaves pending entries behind
    let staleness = chrono::Duration::minutes(config.ledger.stale_after_minutes as i64);
    ledger.reconcile_stale(staleness)?;

    // source adapters
    let mut sources = precis_adapters::SourceRegistry::new();
    if let Some(ref youtube) = config.sources.youtube {
        sources.register(Arc::new(precis_adapters::youtube::YouTubeSource::new(
            youtube.api_key.clone(),
            youtube.base_url.clone(),
        )));
    }
    if sources.is_empty() {
        anyhow::bail!("no source adapters configured — set sources.youtube.api_key in precis.toml");
    }

    // summarizer adapters — both registered, config picks the active one
    let mut summarizers = precis_adapters::SummarizerRegistry::new();
    summarizers.register(Arc::new(precis_adapters::anthropic::AnthropicSummarizer::new(
        config.summarization.api_key.clone(),
        None,
    )));
    summarizers.register(Arc::new(precis_adapters::openai::OpenAiSummarizer::new(
        config.summarization.api_key.clone(),
        None,
    )));
    let summarizer = summarizers.resolve(&config.summarization.provider)?;
    info!(provider = %config.summarization.provider, "summarizer selected");

    // delivery targets — every enabled id must resolve before we go online
    let mut targets = precis_adapters::TargetRegistry::new();
    if let Some(ref coda) = config.targets.coda {
        targets.register(Arc::new(precis_adapters::coda::CodaTarget::new(
            coda.api_key.clone(),
            coda.doc_id.clone(),
            coda.table_id.clone(),
        )));
    }
    let enabled_targets = config
        .targets
        .enabled
        .iter()
        .map(|id| targets.resolve(id))
        .collect::<Result<Vec<_>, _>>()?;

    let options = precis_adapters::SummarizeOptions {
        model: config.summarization.model.clone(),
        max_tokens: config.summarization.max_tokens,
        language: config.summarization.language.clone(),
    };

    // serenity's Http is a plain REST client, usable before the gateway is up
    let http = Arc::new(serenity::http::Http::new(&config.discord.bot_token));
    let threads = Arc::new(platform::DiscordThreads::new(Arc::clone(&http)));

    let orchestrator = Arc::new(precis_pipeline::Orchestrator::new(
        Arc::new(sources),
        summarizer,
        options,
        enabled_targets,
        Arc::clone(&ledger),
        threads,
        precis_pipeline::RetryPolicy::from(&config.pipeline),
    ));

    let adapter = adapter::DiscordAdapter::new(config.discord.clone(), orchestrator, ledger);
    adapter.run().await;

    Ok(())
}

/// Ensure the parent directory for a file path exists.
fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
