//! Link extraction from inbound message text.

use std::sync::{Arc, OnceLock};

use regex::Regex;

use precis_adapters::SourceRegistry;
use precis_core::{normalize_url, Link};

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://\S+").unwrap())
}

/// Scans message text for URLs claimed by a registered source adapter.
///
/// Links nobody claims are silently dropped — unsupported links are expected
/// traffic, not errors.
pub struct LinkExtractor {
    sources: Arc<SourceRegistry>,
}

impl LinkExtractor {
    pub fn new(sources: Arc<SourceRegistry>) -> Self {
        Self { sources }
    }

    /// Lazily yield one [`Link`] per supported URL in `text`, tagged with the
    /// first source adapter (in registration order) that claims it.
    pub fn extract<'a>(&'a self, text: &'a str) -> impl Iterator<Item = Link> + 'a {
        url_re().find_iter(text).filter_map(move |m| {
            let url = normalize_url(m.as_str())?;
            let adapter = self.sources.match_url(&url)?;
            Some(Link::new(m.as_str(), url, adapter.id()))
        })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use url::Url;

    use precis_adapters::{FetchError, SourceAdapter};
    use precis_core::FetchedContent;

    use super::*;

    struct HostSource {
        id: &'static str,
        hosts: &'static [&'static str],
    }

    #[async_trait]
    impl SourceAdapter for HostSource {
        fn id(&self) -> &str {
            self.id
        }
        fn can_handle(&self, url: &Url) -> bool {
            url.host_str().is_some_and(|h| self.hosts.contains(&h))
        }
        async fn fetch(&self, _link: &Link) -> Result<FetchedContent, FetchError> {
            Err(FetchError::Permanent("not used in extractor tests".into()))
        }
    }

    fn registry() -> Arc<SourceRegistry> {
        let mut reg = SourceRegistry::new();
        reg.register(Arc::new(HostSource {
            id: "youtube",
            hosts: &["youtu.be", "youtube.com"],
        }));
        Arc::new(reg)
    }

    #[test]
    fn extracts_supported_link_from_message() {
        let extractor = LinkExtractor::new(registry());
        let links: Vec<Link> =
            extractor.extract("check this out https://youtu.be/abc123XYZ_w").collect();

        assert_eq!(links.len(), 1);
        assert_eq!(links[0].source_id, "youtube");
        assert_eq!(links[0].url.as_str(), "https://youtu.be/abc123XYZ_w");
        assert_eq!(links[0].raw_url, "https://youtu.be/abc123XYZ_w");
    }

    #[test]
    fn drops_unsupported_links_silently() {
        let extractor = LinkExtractor::new(registry());
        let links: Vec<Link> = extractor
            .extract("https://example.com/a and https://youtu.be/abc123XYZ_w and ftp://x")
            .collect();

        assert_eq!(links.len(), 1);
        assert_eq!(links[0].source_id, "youtube");
    }

    #[test]
    fn no_links_yields_empty_sequence() {
        let extractor = LinkExtractor::new(registry());
        assert_eq!(extractor.extract("just words, no urls here").count(), 0);
    }

    #[test]
    fn first_registered_adapter_wins() {
        let mut reg = SourceRegistry::new();
        reg.register(Arc::new(HostSource {
            id: "specific",
            hosts: &["youtu.be"],
        }));
        reg.register(Arc::new(HostSource {
            id: "generic",
            hosts: &["youtu.be", "youtube.com"],
        }));
        let extractor = LinkExtractor::new(Arc::new(reg));

        let links: Vec<Link> = extractor.extract("https://youtu.be/abc").collect();
        assert_eq!(links[0].source_id, "specific");
    }
}
