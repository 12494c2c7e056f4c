//! Thread coordination: one discussion thread per (channel, fingerprint).

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

use precis_adapters::ThreadPlatform;
use precis_core::{ContentFingerprint, ThreadBinding};
use precis_ledger::DedupCache;

use crate::error::Result;

/// Discord's thread name limit; other platforms are given the same budget.
const MAX_THREAD_NAME: usize = 100;

/// Outcome of a binding request.
#[derive(Debug)]
pub struct BindResult {
    pub binding: ThreadBinding,
    /// Whether this call created the thread (vs. reusing an existing one).
    pub created: bool,
}

/// Decides, per (channel, fingerprint), whether to reuse an existing thread
/// or create one.
///
/// State machine per key: Unbound → Binding → Bound. The Binding transition
/// is guarded by a per-key async mutex so concurrent requests for the same
/// link cannot race to create duplicate threads; the persisted binding in the
/// ledger is write-once, so even racers across processes converge on one
/// thread id. A failed creation reverts to Unbound (the guard is simply
/// released with nothing persisted) and the error propagates.
pub struct ThreadCoordinator {
    platform: Arc<dyn ThreadPlatform>,
    ledger: Arc<DedupCache>,
    binding_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ThreadCoordinator {
    pub fn new(platform: Arc<dyn ThreadPlatform>, ledger: Arc<DedupCache>) -> Self {
        Self {
            platform,
            ledger,
            binding_locks: DashMap::new(),
        }
    }

    /// Obtain the thread binding for a claimed fingerprint, creating the
    /// thread if no existing one matches.
    pub async fn bind(
        &self,
        channel_id: &str,
        fingerprint: &ContentFingerprint,
        title: &str,
    ) -> Result<BindResult> {
        let key = format!("{channel_id}:{fingerprint}");
        let lock = self
            .binding_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let result = self.bind_locked(channel_id, fingerprint, title).await;

        drop(_guard);
        self.binding_locks
            .remove_if(&key, |_, v| Arc::strong_count(v) <= 2);
        result
    }

    async fn bind_locked(
        &self,
        channel_id: &str,
        fingerprint: &ContentFingerprint,
        title: &str,
    ) -> Result<BindResult> {
        // Already bound in a previous run (or by a racer that held the lock
        // first): reuse.
        if let Some(entry) = self.ledger.get(fingerprint)? {
            if let Some(binding) = entry.binding() {
                debug!(
                    fingerprint = %fingerprint.short(),
                    thread = %binding.thread_id,
                    "reusing ledger thread binding"
                );
                return Ok(BindResult {
                    binding,
                    created: false,
                });
            }
        }

        // Ask the platform for an existing thread tagged with the
        // fingerprint — covers bindings lost to a reset ledger.
        let tag = fingerprint.short().to_string();
        let threads = self.platform.list_threads(channel_id).await?;
        if let Some(existing) = threads.iter().find(|t| t.metadata_tags.contains(&tag)) {
            info!(
                fingerprint = %tag,
                thread = %existing.thread_id,
                "adopting existing platform thread"
            );
            let binding =
                self.ledger
                    .bind_thread(fingerprint, channel_id, &existing.thread_id)?;
            return Ok(BindResult {
                binding,
                created: false,
            });
        }

        let name = thread_name(title, &tag);
        let thread_id = self.platform.create_thread(channel_id, &name).await?;
        info!(fingerprint = %tag, thread = %thread_id, channel = %channel_id, "thread created");

        let binding = self.ledger.bind_thread(fingerprint, channel_id, &thread_id)?;
        let created = binding.thread_id == thread_id;
        Ok(BindResult { binding, created })
    }
}

/// Thread name carrying the fingerprint tag, truncated to the platform limit
/// on a char boundary.
fn thread_name(title: &str, tag: &str) -> String {
    let suffix = format!(" [{tag}]");
    let budget = MAX_THREAD_NAME - suffix.len();
    let mut base: String = title.chars().take(budget).collect();
    while base.len() > budget {
        base.pop();
    }
    format!("{}{}", base.trim_end(), suffix)
}
