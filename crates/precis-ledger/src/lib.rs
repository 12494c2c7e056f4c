pub mod cache;
pub mod db;
pub mod error;
pub mod types;

pub use cache::DedupCache;
pub use error::{LedgerError, Result};
pub use types::{ClaimOutcome, DeliveryRecord, LedgerEntry, LedgerStatus, RunOutcome};
