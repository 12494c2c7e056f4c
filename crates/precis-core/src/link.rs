//! Link values and URL canonicalization.
//!
//! The normalized URL is the deduplication identity: the same content shared
//! with different tracking parameters must canonicalize to the same string,
//! and therefore to the same [`ContentFingerprint`].

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

/// Query parameters stripped during canonicalization, in addition to any
/// parameter starting with `utm_`.
const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "dclid", "msclkid", "igshid", "mc_cid", "mc_eid", "si", "feature",
    "ref", "ref_src", "ref_url",
];

/// A candidate link extracted from a message, already matched against the
/// source registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    /// The URL exactly as it appeared in the message.
    pub raw_url: String,

    /// Canonicalized URL — tracking parameters and fragment stripped.
    pub url: Url,

    /// Identifier of the source adapter that claimed this link.
    pub source_id: String,
}

impl Link {
    pub fn new(raw_url: impl Into<String>, url: Url, source_id: impl Into<String>) -> Self {
        Self {
            raw_url: raw_url.into(),
            url,
            source_id: source_id.into(),
        }
    }

    /// Fingerprint of the normalized URL. Stable across restarts.
    pub fn fingerprint(&self) -> ContentFingerprint {
        ContentFingerprint::from_url(&self.url)
    }
}

/// Stable deduplication key derived from a normalized URL.
///
/// Derived from the URL rather than fetched content, since content may change
/// between fetches while still describing the same link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentFingerprint(String);

impl ContentFingerprint {
    /// SHA-256 over the normalized URL string, hex-encoded.
    pub fn from_url(url: &Url) -> Self {
        let digest = Sha256::digest(url.as_str().as_bytes());
        Self(hex::encode(digest))
    }

    /// Reconstruct a fingerprint from its persisted hex form.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix used in thread names and metadata tags.
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonicalize a raw URL string.
///
/// Lowercases scheme and host (done by the `url` parser), strips a leading
/// `www.`, the fragment, tracking query parameters, and a trailing slash on
/// non-root paths. Returns `None` for anything that does not parse as an
/// absolute http(s) URL.
pub fn normalize_url(raw: &str) -> Option<Url> {
    // Messages often end links with punctuation the regex captured.
    let trimmed = raw.trim_end_matches(['.', ',', ';', ')', ']', '>', '!', '?']);
    let mut url = Url::parse(trimmed).ok()?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    if let Some(host) = url.host_str() {
        if let Some(bare) = host.strip_prefix("www.") {
            let bare = bare.to_string();
            url.set_host(Some(&bare)).ok()?;
        }
    } else {
        return None;
    }

    url.set_fragment(None);

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept).finish();
    }

    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed_path = path.trim_end_matches('/').to_string();
        url.set_path(&trimmed_path);
    }

    Some(url)
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tracking_params_and_fragment() {
        let url = normalize_url(
            "https://www.youtube.com/watch?v=abc123&utm_source=share&si=XyZ#comments",
        )
        .unwrap();
        assert_eq!(url.as_str(), "https://youtube.com/watch?v=abc123");
    }

    #[test]
    fn keeps_meaningful_params() {
        let url = normalize_url("https://youtu.be/abc123?t=120&fbclid=junk").unwrap();
        assert_eq!(url.as_str(), "https://youtu.be/abc123?t=120");
    }

    #[test]
    fn trims_trailing_punctuation_and_slash() {
        let url = normalize_url("https://example.com/article/,").unwrap();
        assert_eq!(url.as_str(), "https://example.com/article");
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(normalize_url("ftp://example.com/file").is_none());
        assert!(normalize_url("not a url").is_none());
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let a = normalize_url("https://www.youtube.com/watch?v=abc&utm_medium=x").unwrap();
        let b = normalize_url("https://youtube.com/watch?v=abc").unwrap();
        assert_eq!(
            ContentFingerprint::from_url(&a),
            ContentFingerprint::from_url(&b)
        );
        assert_eq!(ContentFingerprint::from_url(&a).as_str().len(), 64);
    }

    #[test]
    fn fingerprint_differs_for_different_urls() {
        let a = normalize_url("https://youtu.be/abc123").unwrap();
        let b = normalize_url("https://youtu.be/def456").unwrap();
        assert_ne!(
            ContentFingerprint::from_url(&a),
            ContentFingerprint::from_url(&b)
        );
    }
}
