use std::sync::Mutex;

use chrono::{Duration, Utc};
use rusqlite::Connection;
use tracing::{debug, info, warn};

use precis_core::{ContentFingerprint, ThreadBinding};

use crate::db::init_db;
use crate::error::{LedgerError, Result};
use crate::types::{ClaimOutcome, DeliveryRecord, LedgerEntry, LedgerStatus, RunOutcome};

/// Persistent deduplication ledger.
///
/// `claim` is the single serialization point for a fingerprint: the atomic
/// check-and-insert happens at the SQLite layer, so exclusivity holds across
/// process instances sharing the database file, not just across tasks in this
/// process.
pub struct DedupCache {
    db: Mutex<Connection>,
}

impl DedupCache {
    /// Wrap an open connection, initialising the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }

    /// Atomically reserve a fingerprint for processing.
    ///
    /// Inserts a `pending` entry if and only if none exists. When an entry
    /// already exists — any status — it is returned so the caller can point
    /// at the prior thread instead of re-running the pipeline.
    pub fn claim(
        &self,
        fingerprint: &ContentFingerprint,
        channel_id: &str,
        url: &str,
    ) -> Result<ClaimOutcome> {
        let db = self.db.lock().unwrap();
        let now = Utc::now().to_rfc3339();

        let inserted = db.execute(
            "INSERT OR IGNORE INTO ledger
             (fingerprint, channel_id, url, status, claimed_at, updated_at)
             VALUES (?1, ?2, ?3, 'pending', ?4, ?4)",
            rusqlite::params![fingerprint.as_str(), channel_id, url, now],
        )?;

        if inserted == 1 {
            debug!(fingerprint = %fingerprint.short(), "fingerprint claimed");
            return Ok(ClaimOutcome::Acquired);
        }

        let entry = query_entry(&db, fingerprint)?.ok_or_else(|| LedgerError::NotFound {
            fingerprint: fingerprint.to_string(),
        })?;
        debug!(
            fingerprint = %fingerprint.short(),
            status = %entry.status,
            "claim refused — entry exists"
        );
        Ok(ClaimOutcome::Duplicate(entry))
    }

    /// Record the terminal outcome of a run. Idempotent: calling again with
    /// the same outcome rewrites the same values.
    pub fn complete(&self, fingerprint: &ContentFingerprint, outcome: &RunOutcome) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = Utc::now().to_rfc3339();

        let changed = match outcome {
            RunOutcome::Succeeded { summary } => db.execute(
                "UPDATE ledger
                 SET status = 'succeeded', summary = ?2, failure = NULL, updated_at = ?3
                 WHERE fingerprint = ?1",
                rusqlite::params![fingerprint.as_str(), summary, now],
            )?,
            RunOutcome::Failed { stage, reason } => db.execute(
                "UPDATE ledger
                 SET status = 'failed', failure = ?2, updated_at = ?3
                 WHERE fingerprint = ?1",
                rusqlite::params![fingerprint.as_str(), format!("{stage}: {reason}"), now],
            )?,
        };

        if changed == 0 {
            return Err(LedgerError::NotFound {
                fingerprint: fingerprint.to_string(),
            });
        }
        Ok(())
    }

    /// Persist a thread binding for a claimed fingerprint — write-once.
    ///
    /// If a binding already exists it is left untouched and returned, so
    /// concurrent callers converge on the same thread.
    pub fn bind_thread(
        &self,
        fingerprint: &ContentFingerprint,
        channel_id: &str,
        thread_id: &str,
    ) -> Result<ThreadBinding> {
        let db = self.db.lock().unwrap();
        let now = Utc::now().to_rfc3339();

        db.execute(
            "UPDATE ledger SET thread_id = ?2, updated_at = ?3
             WHERE fingerprint = ?1 AND thread_id IS NULL",
            rusqlite::params![fingerprint.as_str(), thread_id, now],
        )?;

        // Read back the stored id — it may differ from `thread_id` when a
        // binding already existed.
        let stored: Option<String> = db
            .query_row(
                "SELECT thread_id FROM ledger WHERE fingerprint = ?1",
                rusqlite::params![fingerprint.as_str()],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => LedgerError::NotFound {
                    fingerprint: fingerprint.to_string(),
                },
                other => LedgerError::Database(other),
            })?;

        let thread_id = stored.ok_or_else(|| LedgerError::NotFound {
            fingerprint: fingerprint.to_string(),
        })?;
        Ok(ThreadBinding {
            fingerprint: fingerprint.clone(),
            channel_id: channel_id.to_string(),
            thread_id,
        })
    }

    /// Record one target delivery outcome. Each target is independent.
    pub fn record_delivery(
        &self,
        fingerprint: &ContentFingerprint,
        target_id: &str,
        ok: bool,
        detail: Option<&str>,
    ) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        db.execute(
            "INSERT INTO deliveries (fingerprint, target_id, ok, detail, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![fingerprint.as_str(), target_id, ok as i64, detail, now],
        )?;
        Ok(())
    }

    /// All recorded delivery outcomes for a fingerprint, oldest first.
    pub fn deliveries(&self, fingerprint: &ContentFingerprint) -> Result<Vec<DeliveryRecord>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT fingerprint, target_id, ok, detail, created_at
             FROM deliveries WHERE fingerprint = ?1 ORDER BY created_at",
        )?;
        let rows = stmt.query_map(rusqlite::params![fingerprint.as_str()], |row| {
            Ok(DeliveryRecord {
                fingerprint: ContentFingerprint::from_hex(row.get::<_, String>(0)?),
                target_id: row.get(1)?,
                ok: row.get::<_, i64>(2)? != 0,
                detail: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Fetch the entry for a fingerprint, if any.
    pub fn get(&self, fingerprint: &ContentFingerprint) -> Result<Option<LedgerEntry>> {
        let db = self.db.lock().unwrap();
        query_entry(&db, fingerprint)
    }

    /// Manual re-evaluation hook: drop the entry so the fingerprint becomes
    /// claimable again. Returns whether an entry existed.
    pub fn reset(&self, fingerprint: &ContentFingerprint) -> Result<bool> {
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "DELETE FROM ledger WHERE fingerprint = ?1",
            rusqlite::params![fingerprint.as_str()],
        )?;
        if n > 0 {
            info!(fingerprint = %fingerprint.short(), "ledger entry reset");
        }
        Ok(n > 0)
    }

    /// Startup recovery sweep: a crash between `claim` and `complete` leaves
    /// a `pending` entry that would otherwise block the link forever. Entries
    /// pending for longer than `staleness` are marked failed so the link can
    /// be reset and reprocessed.
    pub fn reconcile_stale(&self, staleness: Duration) -> Result<usize> {
        let db = self.db.lock().unwrap();
        let cutoff = (Utc::now() - staleness).to_rfc3339();
        let now = Utc::now().to_rfc3339();
        let n = db.execute(
            "UPDATE ledger
             SET status = 'failed', failure = 'recovery: stale pending entry', updated_at = ?2
             WHERE status = 'pending' AND claimed_at < ?1",
            rusqlite::params![cutoff, now],
        )?;
        if n > 0 {
            warn!(count = n, "stale pending ledger entries reconciled to failed");
        }
        Ok(n)
    }

    #[cfg(test)]
    pub(crate) fn backdate_claim(&self, fingerprint: &ContentFingerprint, claimed_at: &str) {
        let db = self.db.lock().unwrap();
        db.execute(
            "UPDATE ledger SET claimed_at = ?2 WHERE fingerprint = ?1",
            rusqlite::params![fingerprint.as_str(), claimed_at],
        )
        .unwrap();
    }
}

fn query_entry(db: &Connection, fingerprint: &ContentFingerprint) -> Result<Option<LedgerEntry>> {
    match db.query_row(
        "SELECT fingerprint, channel_id, url, status, thread_id, summary, failure,
                claimed_at, updated_at
         FROM ledger WHERE fingerprint = ?1",
        rusqlite::params![fingerprint.as_str()],
        row_to_entry,
    ) {
        Ok(entry) => Ok(Some(entry)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(LedgerError::Database(e)),
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<LedgerEntry> {
    let status_str: String = row.get(3)?;
    Ok(LedgerEntry {
        fingerprint: ContentFingerprint::from_hex(row.get::<_, String>(0)?),
        channel_id: row.get(1)?,
        url: row.get(2)?,
        status: status_str.parse().unwrap_or(LedgerStatus::Failed),
        thread_id: row.get(4)?,
        summary: row.get(5)?,
        failure: row.get(6)?,
        claimed_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn fp(url: &str) -> ContentFingerprint {
        ContentFingerprint::from_url(&precis_core::normalize_url(url).unwrap())
    }

    fn open_cache() -> DedupCache {
        DedupCache::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn first_claim_acquires_second_observes_entry() {
        let cache = open_cache();
        let f = fp("https://youtu.be/abc123");

        assert!(cache.claim(&f, "C1", "https://youtu.be/abc123").unwrap().acquired());

        match cache.claim(&f, "C1", "https://youtu.be/abc123").unwrap() {
            ClaimOutcome::Duplicate(entry) => {
                assert_eq!(entry.status, LedgerStatus::Pending);
                assert_eq!(entry.channel_id, "C1");
            }
            ClaimOutcome::Acquired => panic!("second claim must not acquire"),
        }
    }

    #[test]
    fn concurrent_claims_acquire_exactly_once() {
        let cache = Arc::new(open_cache());
        let f = fp("https://youtu.be/race");

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let f = f.clone();
                std::thread::spawn(move || {
                    cache.claim(&f, "C1", "https://youtu.be/race").unwrap().acquired()
                })
            })
            .collect();

        let acquired = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|acquired| *acquired)
            .count();
        assert_eq!(acquired, 1);
    }

    #[test]
    fn claim_after_success_returns_succeeded_entry() {
        let cache = open_cache();
        let f = fp("https://youtu.be/done");

        cache.claim(&f, "C1", "https://youtu.be/done").unwrap();
        cache
            .complete(
                &f,
                &RunOutcome::Succeeded {
                    summary: "résumé".into(),
                },
            )
            .unwrap();

        match cache.claim(&f, "C1", "https://youtu.be/done").unwrap() {
            ClaimOutcome::Duplicate(entry) => {
                assert_eq!(entry.status, LedgerStatus::Succeeded);
                assert_eq!(entry.summary.as_deref(), Some("résumé"));
            }
            ClaimOutcome::Acquired => panic!("completed fingerprint must stay claimed"),
        }
    }

    #[test]
    fn complete_is_idempotent() {
        let cache = open_cache();
        let f = fp("https://youtu.be/twice");
        cache.claim(&f, "C1", "u").unwrap();

        let outcome = RunOutcome::Failed {
            stage: "fetch".into(),
            reason: "404".into(),
        };
        cache.complete(&f, &outcome).unwrap();
        cache.complete(&f, &outcome).unwrap();

        let entry = cache.get(&f).unwrap().unwrap();
        assert_eq!(entry.status, LedgerStatus::Failed);
        assert_eq!(entry.failure.as_deref(), Some("fetch: 404"));
    }

    #[test]
    fn bind_thread_is_write_once() {
        let cache = open_cache();
        let f = fp("https://youtu.be/bound");
        cache.claim(&f, "C1", "u").unwrap();

        let first = cache.bind_thread(&f, "C1", "T100").unwrap();
        assert_eq!(first.thread_id, "T100");

        // A losing racer gets the original binding back, not its own.
        let second = cache.bind_thread(&f, "C1", "T200").unwrap();
        assert_eq!(second.thread_id, "T100");
    }

    #[test]
    fn reset_makes_fingerprint_claimable_again() {
        let cache = open_cache();
        let f = fp("https://youtu.be/again");
        cache.claim(&f, "C1", "u").unwrap();
        cache
            .complete(
                &f,
                &RunOutcome::Failed {
                    stage: "summarize".into(),
                    reason: "upstream".into(),
                },
            )
            .unwrap();

        assert!(cache.reset(&f).unwrap());
        assert!(!cache.reset(&f).unwrap());
        assert!(cache.claim(&f, "C1", "u").unwrap().acquired());
    }

    #[test]
    fn recovery_sweep_fails_stale_pending_only() {
        let cache = open_cache();
        let stale = fp("https://youtu.be/stale");
        let fresh = fp("https://youtu.be/fresh");
        cache.claim(&stale, "C1", "u1").unwrap();
        cache.claim(&fresh, "C1", "u2").unwrap();

        let two_hours_ago = (Utc::now() - Duration::hours(2)).to_rfc3339();
        cache.backdate_claim(&stale, &two_hours_ago);

        let n = cache.reconcile_stale(Duration::minutes(60)).unwrap();
        assert_eq!(n, 1);
        assert_eq!(cache.get(&stale).unwrap().unwrap().status, LedgerStatus::Failed);
        assert_eq!(cache.get(&fresh).unwrap().unwrap().status, LedgerStatus::Pending);
    }

    #[test]
    fn delivery_outcomes_are_recorded_separately() {
        let cache = open_cache();
        let f = fp("https://youtu.be/deliver");
        cache.claim(&f, "C1", "u").unwrap();

        cache.record_delivery(&f, "coda", true, None).unwrap();
        cache
            .record_delivery(&f, "webhook", false, Some("503"))
            .unwrap();

        let records = cache.deliveries(&f).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].ok);
        assert!(!records[1].ok);
        assert_eq!(records[1].detail.as_deref(), Some("503"));
    }
}
