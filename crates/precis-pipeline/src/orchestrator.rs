//! Pipeline orchestration: claim, thread, fetch, summarize, deliver.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use precis_adapters::{
    FetchError, SourceRegistry, SummarizeOptions, Summarizer, Target, ThreadPlatform,
};
use precis_core::{strings, ContentFingerprint, Link, Summary, ThreadBinding};
use precis_ledger::{ClaimOutcome, DedupCache, RunOutcome};

use crate::coordinator::ThreadCoordinator;
use crate::error::{PipelineError, Result};
use crate::extract::LinkExtractor;
use crate::retry::RetryPolicy;

/// Drives one pipeline run per supported link in an inbound message.
///
/// Runs are independent tokio tasks: one failing or slow link never blocks
/// the others. Every run ends in exactly one terminal ledger state,
/// `succeeded` or `failed`, even when a stage errors out.
pub struct Orchestrator {
    extractor: LinkExtractor,
    sources: Arc<SourceRegistry>,
    summarizer: Arc<dyn Summarizer>,
    summarize_options: SummarizeOptions,
    targets: Vec<Arc<dyn Target>>,
    ledger: Arc<DedupCache>,
    coordinator: ThreadCoordinator,
    platform: Arc<dyn ThreadPlatform>,
    retry: RetryPolicy,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sources: Arc<SourceRegistry>,
        summarizer: Arc<dyn Summarizer>,
        summarize_options: SummarizeOptions,
        targets: Vec<Arc<dyn Target>>,
        ledger: Arc<DedupCache>,
        platform: Arc<dyn ThreadPlatform>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            extractor: LinkExtractor::new(Arc::clone(&sources)),
            sources,
            summarizer,
            summarize_options,
            targets,
            coordinator: ThreadCoordinator::new(Arc::clone(&platform), Arc::clone(&ledger)),
            ledger,
            platform,
            retry,
        }
    }

    /// Scan a message for supported links and spawn one pipeline run per
    /// link. Returns the spawned task handles; callers that do not care can
    /// drop them.
    pub fn handle_message(
        self: &Arc<Self>,
        channel_id: &str,
        text: &str,
    ) -> Vec<JoinHandle<()>> {
        self.extractor
            .extract(text)
            .map(|link| {
                let orchestrator = Arc::clone(self);
                let channel_id = channel_id.to_string();
                tokio::spawn(async move {
                    orchestrator.process_link(&channel_id, link).await;
                })
            })
            .collect()
    }

    async fn process_link(&self, channel_id: &str, link: Link) {
        let fingerprint = ContentFingerprint::from_url(&link.url);
        info!(
            fingerprint = %fingerprint.short(),
            url = %link.url,
            source = %link.source_id,
            "processing link"
        );

        let outcome = match self
            .ledger
            .claim(&fingerprint, channel_id, link.url.as_str())
        {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(fingerprint = %fingerprint.short(), error = %e, "claim failed");
                return;
            }
        };

        match outcome {
            ClaimOutcome::Duplicate(entry) => {
                let notice = match &entry.thread_id {
                    Some(thread_id) => {
                        strings::duplicate_detected(&self.platform.thread_url(thread_id))
                    }
                    None => strings::duplicate_without_thread(&entry.url),
                };
                info!(fingerprint = %fingerprint.short(), status = %entry.status, "duplicate link");
                self.notify(channel_id, &notice).await;
            }
            ClaimOutcome::Acquired => {
                self.run_claimed(channel_id, &link, &fingerprint).await;
            }
        }
    }

    /// The run for a freshly claimed fingerprint. Whatever happens past this
    /// point, the ledger entry reaches a terminal state.
    async fn run_claimed(&self, channel_id: &str, link: &Link, fingerprint: &ContentFingerprint) {
        let title = format!(
            "Discussion: {}",
            link.url.host_str().unwrap_or("lien partagé")
        );
        let bind = match self.coordinator.bind(channel_id, fingerprint, &title).await {
            Ok(bind) => bind,
            Err(e) => {
                self.record_failure(channel_id, fingerprint, &e).await;
                self.notify(channel_id, &strings::stage_failed(e.stage(), &e.to_string()))
                    .await;
                return;
            }
        };

        let thread_id = bind.binding.thread_id.clone();
        if bind.created {
            self.notify(&thread_id, strings::THREAD_CREATED).await;
        }

        match self.run_stages(link, fingerprint, &bind.binding).await {
            Ok(summary) => {
                if let Err(e) = self.ledger.complete(
                    fingerprint,
                    &RunOutcome::Succeeded {
                        summary: summary.text.clone(),
                    },
                ) {
                    error!(fingerprint = %fingerprint.short(), error = %e, "completion not recorded");
                }
                info!(fingerprint = %fingerprint.short(), "pipeline run succeeded");
            }
            Err(e) => {
                self.record_failure(channel_id, fingerprint, &e).await;
                self.notify(&thread_id, &strings::stage_failed(e.stage(), &e.to_string()))
                    .await;
            }
        }
    }

    async fn run_stages(
        &self,
        link: &Link,
        fingerprint: &ContentFingerprint,
        binding: &ThreadBinding,
    ) -> Result<Summary> {
        let thread_id = &binding.thread_id;

        self.notify(thread_id, strings::CONTENT_FETCHING).await;
        let source = self
            .sources
            .resolve(&link.source_id)
            .map_err(|e| PipelineError::Fetch(FetchError::Permanent(e.to_string())))?;
        let content = self.retry.run("fetch", || source.fetch(link)).await?;
        self.notify(thread_id, &strings::content_fetched(&content.source_id))
            .await;

        self.notify(thread_id, strings::SUMMARIZING).await;
        let summary = self
            .retry
            .run("summarize", || {
                self.summarizer.summarize(&content, &self.summarize_options)
            })
            .await?;
        self.notify(thread_id, &render_summary(&summary)).await;

        // Targets are independent: every enabled target gets its attempt and
        // its delivery record, then the first failure terminates the run.
        let mut first_failure: Option<PipelineError> = None;
        for target in &self.targets {
            let result = self
                .retry
                .run("deliver", || target.deliver(&summary, binding))
                .await;
            match result {
                Ok(receipt) => {
                    self.ledger.record_delivery(
                        fingerprint,
                        target.id(),
                        true,
                        receipt.reference.as_deref(),
                    )?;
                    info!(target = %target.id(), fingerprint = %fingerprint.short(), "summary delivered");
                }
                Err(e) => {
                    self.ledger
                        .record_delivery(fingerprint, target.id(), false, Some(&e.to_string()))?;
                    if first_failure.is_none() {
                        first_failure = Some(PipelineError::Delivery {
                            target_id: target.id().to_string(),
                            source: e,
                        });
                    }
                }
            }
        }
        if let Some(e) = first_failure {
            return Err(e);
        }

        Ok(summary)
    }

    async fn record_failure(
        &self,
        channel_id: &str,
        fingerprint: &ContentFingerprint,
        e: &PipelineError,
    ) {
        warn!(
            fingerprint = %fingerprint.short(),
            channel = %channel_id,
            stage = e.stage(),
            error = %e,
            "pipeline run failed"
        );
        let outcome = RunOutcome::Failed {
            stage: e.stage().to_string(),
            reason: e.to_string(),
        };
        if let Err(le) = self.ledger.complete(fingerprint, &outcome) {
            error!(fingerprint = %fingerprint.short(), error = %le, "failure not recorded");
        }
    }

    /// Post a user-facing notice. Notice failures are logged and swallowed:
    /// they never change the outcome of a run.
    async fn notify(&self, destination: &str, content: &str) {
        if let Err(e) = self.platform.post_message(destination, content).await {
            warn!(destination = %destination, error = %e, "notice not posted");
        }
    }
}

fn render_summary(summary: &Summary) -> String {
    let mut out = format!("**{}**\n\n{}", strings::SUMMARY_TITLE, summary.text);
    if !summary.tags.is_empty() {
        out.push_str("\n\nTags: ");
        out.push_str(&summary.tags.join(", "));
    }
    out
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;
    use rusqlite::Connection;
    use tokio::time::Duration;
    use url::Url;

    use precis_adapters::{
        DeliveryError, DeliveryReceipt, SourceAdapter, SummarizeError, ThreadError, ThreadInfo,
    };
    use precis_core::FetchedContent;
    use precis_ledger::LedgerStatus;

    use super::*;

    struct RecordingPlatform {
        posts: Mutex<Vec<(String, String)>>,
        creates: AtomicU32,
    }

    impl RecordingPlatform {
        fn new() -> Self {
            Self {
                posts: Mutex::new(Vec::new()),
                creates: AtomicU32::new(0),
            }
        }

        fn posts_to(&self, destination: &str) -> Vec<String> {
            self.posts
                .lock()
                .unwrap()
                .iter()
                .filter(|(d, _)| d == destination)
                .map(|(_, c)| c.clone())
                .collect()
        }
    }

    #[async_trait]
    impl ThreadPlatform for RecordingPlatform {
        async fn list_threads(&self, _channel_id: &str) -> std::result::Result<Vec<ThreadInfo>, ThreadError> {
            Ok(Vec::new())
        }

        async fn create_thread(
            &self,
            _channel_id: &str,
            _title: &str,
        ) -> std::result::Result<String, ThreadError> {
            let n = self.creates.fetch_add(1, Ordering::SeqCst);
            Ok(format!("T{n}"))
        }

        async fn post_message(
            &self,
            thread_id: &str,
            content: &str,
        ) -> std::result::Result<String, ThreadError> {
            self.posts
                .lock()
                .unwrap()
                .push((thread_id.to_string(), content.to_string()));
            Ok("M0".into())
        }

        fn thread_url(&self, thread_id: &str) -> String {
            format!("<#{thread_id}>")
        }
    }

    enum FetchPlan {
        Ok,
        Permanent,
        TransientThenOk(u32),
    }

    struct MockSource {
        calls: AtomicU32,
        plan: FetchPlan,
    }

    impl MockSource {
        fn new(plan: FetchPlan) -> Self {
            Self {
                calls: AtomicU32::new(0),
                plan,
            }
        }
    }

    #[async_trait]
    impl SourceAdapter for MockSource {
        fn id(&self) -> &str {
            "youtube"
        }

        fn can_handle(&self, url: &Url) -> bool {
            url.host_str()
                .is_some_and(|h| h == "youtu.be" || h == "youtube.com")
        }

        async fn fetch(&self, link: &Link) -> std::result::Result<FetchedContent, FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            match self.plan {
                FetchPlan::Permanent => Err(FetchError::Permanent("video not found".into())),
                FetchPlan::TransientThenOk(failures) if n < failures => {
                    Err(FetchError::Transient("503".into()))
                }
                _ => Ok(FetchedContent {
                    fingerprint: ContentFingerprint::from_url(&link.url),
                    source_id: "youtube".into(),
                    title: "Une vidéo".into(),
                    author: "Une chaîne".into(),
                    body: "transcription".into(),
                    metadata: serde_json::json!({}),
                    fetched_at: Utc::now(),
                }),
            }
        }
    }

    struct MockSummarizer {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Summarizer for MockSummarizer {
        fn id(&self) -> &str {
            "mock"
        }

        async fn summarize(
            &self,
            content: &FetchedContent,
            _options: &SummarizeOptions,
        ) -> std::result::Result<Summary, SummarizeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Summary {
                fingerprint: content.fingerprint.clone(),
                summarizer_id: "mock".into(),
                text: "résumé de test".into(),
                tags: vec!["ia".into()],
                generated_at: Utc::now(),
            })
        }
    }

    struct MockTarget {
        calls: AtomicU32,
        fail: bool,
    }

    impl MockTarget {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl Target for MockTarget {
        fn id(&self) -> &str {
            "coda"
        }

        async fn deliver(
            &self,
            summary: &Summary,
            _binding: &ThreadBinding,
        ) -> std::result::Result<DeliveryReceipt, DeliveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(DeliveryError::Permanent("table gone".into()));
            }
            Ok(DeliveryReceipt {
                target_id: "coda".into(),
                reference: Some(format!("row-{}", summary.fingerprint.short())),
                delivered_at: Utc::now(),
            })
        }
    }

    struct Fixture {
        orchestrator: Arc<Orchestrator>,
        platform: Arc<RecordingPlatform>,
        source: Arc<MockSource>,
        summarizer: Arc<MockSummarizer>,
        target: Arc<MockTarget>,
        ledger: Arc<DedupCache>,
    }

    fn fixture(fetch_plan: FetchPlan, target_fails: bool) -> Fixture {
        let platform = Arc::new(RecordingPlatform::new());
        let source = Arc::new(MockSource::new(fetch_plan));
        let summarizer = Arc::new(MockSummarizer {
            calls: AtomicU32::new(0),
        });
        let target = Arc::new(MockTarget::new(target_fails));
        let ledger = Arc::new(DedupCache::new(Connection::open_in_memory().unwrap()).unwrap());

        let mut sources = SourceRegistry::new();
        sources.register(source.clone());

        let retry = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        };

        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(sources),
            summarizer.clone(),
            SummarizeOptions::default(),
            vec![target.clone() as Arc<dyn Target>],
            Arc::clone(&ledger),
            platform.clone(),
            retry,
        ));

        Fixture {
            orchestrator,
            platform,
            source,
            summarizer,
            target,
            ledger,
        }
    }

    async fn run(fx: &Fixture, text: &str) {
        for handle in fx.orchestrator.handle_message("C1", text) {
            handle.await.unwrap();
        }
    }

    fn fp(url: &str) -> ContentFingerprint {
        ContentFingerprint::from_url(&precis_core::normalize_url(url).unwrap())
    }

    #[tokio::test]
    async fn full_run_summarizes_delivers_and_succeeds() {
        let fx = fixture(FetchPlan::Ok, false);
        run(&fx, "à voir: https://youtu.be/abc123XYZ_w").await;

        let entry = fx
            .ledger
            .get(&fp("https://youtu.be/abc123XYZ_w"))
            .unwrap()
            .unwrap();
        assert_eq!(entry.status, LedgerStatus::Succeeded);
        assert_eq!(entry.summary.as_deref(), Some("résumé de test"));
        assert_eq!(entry.thread_id.as_deref(), Some("T0"));

        let thread_posts = fx.platform.posts_to("T0");
        assert_eq!(thread_posts[0], strings::THREAD_CREATED);
        assert!(thread_posts.contains(&strings::CONTENT_FETCHING.to_string()));
        assert!(thread_posts.iter().any(|p| p.contains("résumé de test")));
        assert!(thread_posts.iter().any(|p| p.contains("Tags: ia")));

        assert_eq!(fx.target.calls.load(Ordering::SeqCst), 1);
        let deliveries = fx
            .ledger
            .deliveries(&fp("https://youtu.be/abc123XYZ_w"))
            .unwrap();
        assert_eq!(deliveries.len(), 1);
        assert!(deliveries[0].ok);
    }

    #[tokio::test]
    async fn duplicate_link_is_not_reprocessed() {
        let fx = fixture(FetchPlan::Ok, false);
        run(&fx, "https://youtu.be/abc123XYZ_w").await;
        run(&fx, "encore https://youtu.be/abc123XYZ_w").await;

        // One fetch, one summarize, one delivery for the whole pair.
        assert_eq!(fx.source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fx.summarizer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fx.target.calls.load(Ordering::SeqCst), 1);

        // The duplicate notice lands in the channel and points at the thread.
        let channel_posts = fx.platform.posts_to("C1");
        assert!(channel_posts.iter().any(|p| p.contains("<#T0>")));
    }

    #[tokio::test]
    async fn tracking_params_do_not_defeat_deduplication() {
        let fx = fixture(FetchPlan::Ok, false);
        run(&fx, "https://www.youtube.com/watch?v=abc123XYZ_w").await;
        run(
            &fx,
            "https://youtube.com/watch?v=abc123XYZ_w&utm_source=partage",
        )
        .await;

        assert_eq!(fx.source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn permanent_fetch_failure_marks_run_failed() {
        let fx = fixture(FetchPlan::Permanent, false);
        run(&fx, "https://youtu.be/abc123XYZ_w").await;

        let entry = fx
            .ledger
            .get(&fp("https://youtu.be/abc123XYZ_w"))
            .unwrap()
            .unwrap();
        assert_eq!(entry.status, LedgerStatus::Failed);
        assert!(entry.failure.as_deref().unwrap().starts_with("fetch:"));

        // No retries on a permanent error, nothing downstream runs.
        assert_eq!(fx.source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fx.summarizer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fx.target.calls.load(Ordering::SeqCst), 0);

        let thread_posts = fx.platform.posts_to("T0");
        assert!(thread_posts.iter().any(|p| p.contains("Échec à l'étape fetch")));
    }

    #[tokio::test]
    async fn transient_fetch_failures_are_retried_to_success() {
        let fx = fixture(FetchPlan::TransientThenOk(2), false);
        run(&fx, "https://youtu.be/abc123XYZ_w").await;

        assert_eq!(fx.source.calls.load(Ordering::SeqCst), 3);
        let entry = fx
            .ledger
            .get(&fp("https://youtu.be/abc123XYZ_w"))
            .unwrap()
            .unwrap();
        assert_eq!(entry.status, LedgerStatus::Succeeded);
    }

    #[tokio::test]
    async fn delivery_failure_is_terminal_and_recorded() {
        let fx = fixture(FetchPlan::Ok, true);
        run(&fx, "https://youtu.be/abc123XYZ_w").await;

        let f = fp("https://youtu.be/abc123XYZ_w");
        let entry = fx.ledger.get(&f).unwrap().unwrap();
        assert_eq!(entry.status, LedgerStatus::Failed);
        assert!(entry.failure.as_deref().unwrap().starts_with("deliver:"));

        let deliveries = fx.ledger.deliveries(&f).unwrap();
        assert_eq!(deliveries.len(), 1);
        assert!(!deliveries[0].ok);
        assert!(deliveries[0].detail.as_deref().unwrap().contains("table gone"));
    }

    #[tokio::test]
    async fn two_links_in_one_message_run_independently() {
        let fx = fixture(FetchPlan::Ok, false);
        run(
            &fx,
            "https://youtu.be/abc123XYZ_w et https://youtu.be/zzz999AAA_b",
        )
        .await;

        assert_eq!(fx.source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(fx.platform.creates.load(Ordering::SeqCst), 2);
        assert!(fx
            .ledger
            .get(&fp("https://youtu.be/abc123XYZ_w"))
            .unwrap()
            .is_some());
        assert!(fx
            .ledger
            .get(&fp("https://youtu.be/zzz999AAA_b"))
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn message_without_supported_links_is_ignored() {
        let fx = fixture(FetchPlan::Ok, false);
        run(&fx, "bonjour, rien à voir ici https://example.com/page").await;

        assert_eq!(fx.source.calls.load(Ordering::SeqCst), 0);
        assert!(fx.platform.posts.lock().unwrap().is_empty());
    }
}
