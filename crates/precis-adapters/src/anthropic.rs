//! Anthropic summarizer adapter.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, warn};

use precis_core::{FetchedContent, Summary};

use crate::error::SummarizeError;
use crate::summarizer::{
    build_prompt, parse_summary_reply, SummarizeOptions, Summarizer, SUMMARY_SYSTEM_PROMPT,
};

const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

pub struct AnthropicSummarizer {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicSummarizer {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.anthropic.com".to_string()),
        }
    }
}

#[async_trait]
impl Summarizer for AnthropicSummarizer {
    fn id(&self) -> &str {
        "anthropic"
    }

    async fn summarize(
        &self,
        content: &FetchedContent,
        options: &SummarizeOptions,
    ) -> Result<Summary, SummarizeError> {
        if content.body.trim().is_empty() && content.title.trim().is_empty() {
            return Err(SummarizeError::InvalidInput(
                "nothing to summarize: empty title and body".into(),
            ));
        }

        let model = options.model.as_deref().unwrap_or(DEFAULT_MODEL);
        let body = serde_json::json!({
            "model": model,
            "max_tokens": options.max_tokens,
            "temperature": 0.3,
            "system": SUMMARY_SYSTEM_PROMPT,
            "messages": [{ "role": "user", "content": build_prompt(content, options) }],
        });

        debug!(%model, title = %content.title, "sending summarization request to Anthropic");

        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| SummarizeError::Upstream(e.to_string()))?;

        let status = resp.status().as_u16();
        if status == 429 {
            let retry = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(5000);
            return Err(SummarizeError::RateLimited {
                retry_after_ms: retry,
            });
        }
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "Anthropic API error");
            return Err(SummarizeError::Upstream(format!("HTTP {status}: {text}")));
        }

        let api_resp: ApiResponse = resp
            .json()
            .await
            .map_err(|e| SummarizeError::Upstream(format!("bad Anthropic response: {e}")))?;

        let reply = api_resp
            .content
            .iter()
            .filter_map(|b| b.text.as_deref())
            .collect::<Vec<_>>()
            .join("");
        if reply.is_empty() {
            return Err(SummarizeError::Upstream("empty completion".into()));
        }

        let (text, tags) = parse_summary_reply(&reply);
        Ok(Summary {
            fingerprint: content.fingerprint.clone(),
            summarizer_id: self.id().to_string(),
            text,
            tags,
            generated_at: Utc::now(),
        })
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: Option<String>,
}
