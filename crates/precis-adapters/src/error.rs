use thiserror::Error;

/// Failure fetching canonical content for a link.
///
/// Transient failures are eligible for retry by the orchestrator; permanent
/// failures terminate the pipeline run for that link.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transient fetch failure: {0}")]
    Transient(String),

    #[error("permanent fetch failure: {0}")]
    Permanent(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        // Transport-level failures (DNS, connect, timeout) are worth retrying.
        if e.is_timeout() || e.is_connect() || e.is_request() {
            FetchError::Transient(e.to_string())
        } else {
            FetchError::Permanent(e.to_string())
        }
    }
}

/// Failure producing a summary.
#[derive(Debug, Error)]
pub enum SummarizeError {
    /// The provider throttled us; `retry_after_ms` is its hint.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// The content cannot be summarized (empty body, oversized, …).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The provider failed upstream (5xx, malformed reply, transport error).
    #[error("upstream error: {0}")]
    Upstream(String),
}

/// Failure delivering a summary to a target.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("transient delivery failure: {0}")]
    Transient(String),

    #[error("permanent delivery failure: {0}")]
    Permanent(String),
}

impl DeliveryError {
    pub fn is_transient(&self) -> bool {
        matches!(self, DeliveryError::Transient(_))
    }
}

/// Failure talking to the thread platform.
#[derive(Debug, Error)]
pub enum ThreadError {
    /// A create-thread call failed; the coordinator reverts to Unbound.
    #[error("thread creation failed: {0}")]
    Creation(String),

    #[error("thread platform error: {0}")]
    Api(String),
}

/// Registry resolution failure — a configuration error, surfaced at startup
/// before the bot accepts any traffic.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no {kind} adapter registered under id \"{id}\"")]
    UnknownAdapter { kind: &'static str, id: String },
}
