//! Bounded exponential backoff for transient adapter failures.

use std::fmt::Display;
use std::future::Future;

use tokio::time::{sleep, Duration};
use tracing::warn;

use precis_adapters::{DeliveryError, FetchError, SummarizeError};
use precis_core::config::PipelineConfig;

/// Error classes the orchestrator may retry.
///
/// Only transient classes qualify: `FetchError::Transient`,
/// `SummarizeError::RateLimited`, `DeliveryError::Transient`. Everything else
/// terminates the run on first occurrence.
pub trait Retryable {
    fn is_transient(&self) -> bool;

    /// Provider-supplied wait hint, overriding the computed backoff delay.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Retryable for FetchError {
    fn is_transient(&self) -> bool {
        self.is_transient()
    }
}

impl Retryable for DeliveryError {
    fn is_transient(&self) -> bool {
        self.is_transient()
    }
}

impl Retryable for SummarizeError {
    fn is_transient(&self) -> bool {
        matches!(self, SummarizeError::RateLimited { .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            SummarizeError::RateLimited { retry_after_ms } => {
                Some(Duration::from_millis(*retry_after_ms))
            }
            _ => None,
        }
    }
}

/// Backoff schedule: base × 2 per attempt, capped, bounded attempt count.
/// Exhausting the attempts converts the last transient error into the
/// terminal failure for the run.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl From<&PipelineConfig> for RetryPolicy {
    fn from(cfg: &PipelineConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_delay: Duration::from_millis(cfg.backoff_base_ms),
            max_delay: Duration::from_millis(cfg.backoff_max_ms),
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        E: Retryable + Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut delay = self.base_delay;

        for attempt in 1..=self.max_attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let wait = e.retry_after().unwrap_or(delay).min(self.max_delay);
                    warn!(
                        %what,
                        attempt,
                        max = self.max_attempts,
                        error = %e,
                        retry_after_ms = wait.as_millis() as u64,
                        "transient failure, retrying with backoff"
                    );
                    sleep(wait).await;
                    delay = (delay * 2).min(self.max_delay);
                }
                Err(e) => return Err(e),
            }
        }

        unreachable!("retry loop always returns from its match arms")
    }
}
