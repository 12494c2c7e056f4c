use thiserror::Error;

/// Errors from the deduplication ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A SQLite operation failed — fatal for the affected pipeline run.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No ledger entry exists for the fingerprint.
    #[error("no ledger entry for fingerprint {fingerprint}")]
    NotFound { fingerprint: String },

    /// A persisted status string could not be parsed.
    #[error("invalid ledger status: {0}")]
    InvalidStatus(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
