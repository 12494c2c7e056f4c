//! OpenAI summarizer adapter — same JSON reply contract as the Anthropic one.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, warn};

use precis_core::{FetchedContent, Summary};

use crate::error::SummarizeError;
use crate::summarizer::{
    build_prompt, parse_summary_reply, SummarizeOptions, Summarizer, SUMMARY_SYSTEM_PROMPT,
};

const DEFAULT_MODEL: &str = "gpt-4o-mini";

pub struct OpenAiSummarizer {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiSummarizer {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com".to_string()),
        }
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    fn id(&self) -> &str {
        "openai"
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
            "messages": [
                { "role": "system", "content": SUMMARY_SYSTEM_PROMPT },
                { "role": "user", "content": build_prompt(content, options) },
            ],
        });

        debug!(%model, title = %content.title, "sending summarization request to OpenAI");

        let resp = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
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
            warn!(status, body = %text, "OpenAI API error");
            return Err(SummarizeError::Upstream(format!("HTTP {status}: {text}")));
        }

        let api_resp: ApiResponse = resp
            .json()
            .await
            .map_err(|e| SummarizeError::Upstream(format!("bad OpenAI response: {e}")))?;

        let reply = api_resp
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();
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
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}
