use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use url::Url;

use precis_core::{FetchedContent, Link};

use crate::error::{FetchError, RegistryError};

/// Common interface implemented by every content source (YouTube, articles, …).
///
/// Implementations must be `Send + Sync` so they can be shared across the
/// Tokio tasks running independent pipeline runs.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable lowercase identifier for this source (e.g. `"youtube"`).
    fn id(&self) -> &str;

    /// Whether this adapter claims the given normalized URL.
    fn can_handle(&self, url: &Url) -> bool;

    /// Fetch canonical content for a claimed link.
    async fn fetch(&self, link: &Link) -> Result<FetchedContent, FetchError>;
}

/// Ordered collection of source adapters.
///
/// Matching is first-match-wins in registration order, so register the most
/// specific patterns first. Registration order must be deterministic — it is
/// part of the adapter-registration contract, not runtime negotiation.
#[derive(Default)]
pub struct SourceRegistry {
    adapters: Vec<Arc<dyn SourceAdapter>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        info!(source = %adapter.id(), "registering source adapter");
        self.adapters.push(adapter);
    }

    /// First registered adapter that claims `url`, if any. Unmatched URLs are
    /// expected traffic, not errors.
    pub fn match_url(&self, url: &Url) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.iter().find(|a| a.can_handle(url)).cloned()
    }

    pub fn resolve(&self, id: &str) -> Result<Arc<dyn SourceAdapter>, RegistryError> {
        self.adapters
            .iter()
            .find(|a| a.id() == id)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownAdapter {
                kind: "source",
                id: id.to_string(),
            })
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
