use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::link::ContentFingerprint;

/// Canonical content record produced by a source adapter.
///
/// Owned transiently by a single pipeline run; only the resulting summary is
/// persisted. The `metadata` payload is opaque to the orchestrator —
/// platform-specific fields (video id, duration, view counts, …) live there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedContent {
    pub fingerprint: ContentFingerprint,
    pub source_id: String,
    pub title: String,
    pub author: String,
    /// Primary text content handed to the summarizer.
    pub body: String,
    pub metadata: serde_json::Value,
    pub fetched_at: DateTime<Utc>,
}

/// Summary produced by a summarizer adapter. One per successful pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub fingerprint: ContentFingerprint,
    pub summarizer_id: String,
    pub text: String,
    pub tags: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// Association between a fingerprint and a platform discussion thread.
///
/// At most one active binding exists per fingerprint per channel; once
/// persisted it is never overwritten, only referenced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadBinding {
    pub fingerprint: ContentFingerprint,
    pub channel_id: String,
    pub thread_id: String,
}
