use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use precis_core::{FetchedContent, Summary};

use crate::error::{RegistryError, SummarizeError};

/// Options passed to every summarization call, derived from configuration.
#[derive(Debug, Clone)]
pub struct SummarizeOptions {
    /// Model override; adapters fall back to their own default when `None`.
    pub model: Option<String>,
    pub max_tokens: u32,
    /// Language the summary must be written in, regardless of the source
    /// content's language.
    pub language: String,
}

impl Default for SummarizeOptions {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 1024,
            language: "français".to_string(),
        }
    }
}

/// Common interface for LLM-backed summarizers.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Stable identifier used in configuration (e.g. `"anthropic"`).
    fn id(&self) -> &str;

    async fn summarize(
        &self,
        content: &FetchedContent,
        options: &SummarizeOptions,
    ) -> Result<Summary, SummarizeError>;
}

/// Prompt shared by the LLM-backed summarizers. Asks for a JSON object so the
/// reply can be parsed by [`parse_summary_reply`].
pub(crate) fn build_prompt(content: &FetchedContent, options: &SummarizeOptions) -> String {
    format!(
        "I need you to summarize the following content:\n\n\
         Title: {title}\n\
         Creator: {author}\n\n\
         Start of content:\n\n{body}\n\nEnd of content.\n\n\
         Please provide:\n\
         1. A concise summary (1 to 4 paragraphs depending on the length of the \
         content) of the main points and key information. This summary MUST be \
         written in {language}, regardless of the content's original language.\n\
         2. A list of 5-10 relevant tags or keywords, including the names of \
         people mentioned.\n\
         3. Format your response as a JSON object: \
         {{\"summary\": \"...\", \"tags\": [\"tag1\", \"tag2\"]}}",
        title = content.title,
        author = content.author,
        body = content.body,
        language = options.language,
    )
}

pub(crate) const SUMMARY_SYSTEM_PROMPT: &str = "You are a helpful AI assistant that \
summarizes content accurately and concisely. Always respond with a JSON object \
containing 'summary' and 'tags' fields.";

/// Parse the model reply into (summary, tags).
///
/// Accepts a bare JSON object, a fenced ```json block, or anything with a
/// top-level `{...}` span. Falls back to the whole reply as the summary with
/// no tags when no JSON can be extracted — a degraded summary beats a failed
/// run.
pub(crate) fn parse_summary_reply(reply: &str) -> (String, Vec<String>) {
    #[derive(serde::Deserialize)]
    struct Payload {
        summary: String,
        #[serde(default)]
        tags: Vec<String>,
    }

    let candidate = match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if end > start => &reply[start..=end],
        _ => reply,
    };

    match serde_json::from_str::<Payload>(candidate) {
        Ok(p) => (p.summary, p.tags),
        Err(_) => (reply.trim().to_string(), Vec::new()),
    }
}

/// Maps summarizer ids to adapters. Resolution failure is a configuration
/// error surfaced by startup validation, never at request time.
#[derive(Default)]
pub struct SummarizerRegistry {
    adapters: HashMap<String, Arc<dyn Summarizer>>,
}

impl SummarizerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: Arc<dyn Summarizer>) {
        info!(summarizer = %adapter.id(), "registering summarizer adapter");
        self.adapters.insert(adapter.id().to_string(), adapter);
    }

    pub fn resolve(&self, id: &str) -> Result<Arc<dyn Summarizer>, RegistryError> {
        self.adapters
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownAdapter {
                kind: "summarizer",
                id: id.to_string(),
            })
    }
}
