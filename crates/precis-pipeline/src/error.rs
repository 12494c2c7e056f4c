use thiserror::Error;

use precis_adapters::{DeliveryError, FetchError, SummarizeError, ThreadError};
use precis_ledger::LedgerError;

/// Terminal failure of a single pipeline run. The stage name is part of the
/// user-visible failure notice.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Summarize(#[from] SummarizeError),

    #[error("delivery to {target_id} failed: {source}")]
    Delivery {
        target_id: String,
        source: DeliveryError,
    },

    #[error(transparent)]
    Thread(#[from] ThreadError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl PipelineError {
    /// Which pipeline stage failed — recorded in the ledger and named in the
    /// failure notice.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Fetch(_) => "fetch",
            PipelineError::Summarize(_) => "summarize",
            PipelineError::Delivery { .. } => "deliver",
            PipelineError::Thread(_) => "thread",
            PipelineError::Ledger(_) => "ledger",
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
