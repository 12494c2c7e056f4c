use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use precis_core::{ContentFingerprint, ThreadBinding};

use crate::error::LedgerError;

/// Processing status of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerStatus {
    /// Claimed for processing; the pipeline run is (or was) in flight.
    Pending,
    Succeeded,
    Failed,
}

impl fmt::Display for LedgerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LedgerStatus::Pending => "pending",
            LedgerStatus::Succeeded => "succeeded",
            LedgerStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl FromStr for LedgerStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(LedgerStatus::Pending),
            "succeeded" => Ok(LedgerStatus::Succeeded),
            "failed" => Ok(LedgerStatus::Failed),
            other => Err(LedgerError::InvalidStatus(other.to_string())),
        }
    }
}

/// Persisted record for one fingerprint. The authoritative source of truth
/// for duplicate detection; entries are updated, never deleted by normal
/// operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub fingerprint: ContentFingerprint,
    pub channel_id: String,
    pub url: String,
    pub status: LedgerStatus,
    pub thread_id: Option<String>,
    pub summary: Option<String>,
    pub failure: Option<String>,
    pub claimed_at: String,
    pub updated_at: String,
}

impl LedgerEntry {
    /// The thread binding recorded for this entry, if one was ever made.
    pub fn binding(&self) -> Option<ThreadBinding> {
        self.thread_id.as_ref().map(|thread_id| ThreadBinding {
            fingerprint: self.fingerprint.clone(),
            channel_id: self.channel_id.clone(),
            thread_id: thread_id.clone(),
        })
    }
}

/// Result of [`DedupCache::claim`](crate::cache::DedupCache::claim).
#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    /// The fingerprint was free; a pending entry now reserves it for this run.
    Acquired,
    /// An entry already exists (any status) — short-circuit to duplicate
    /// handling instead of re-running the pipeline.
    Duplicate(LedgerEntry),
}

impl ClaimOutcome {
    pub fn acquired(&self) -> bool {
        matches!(self, ClaimOutcome::Acquired)
    }
}

/// Terminal result of a pipeline run, recorded by `complete`.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Succeeded { summary: String },
    Failed { stage: String, reason: String },
}

/// One delivery attempt outcome for one target. Targets are independent, so
/// each outcome is recorded in its own row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub fingerprint: ContentFingerprint,
    pub target_id: String,
    pub ok: bool,
    pub detail: Option<String>,
    pub created_at: String,
}
