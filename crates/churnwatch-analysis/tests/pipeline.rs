//! End-to-end pipeline tests over the in-memory store.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use churnwatch_analysis::{
    AnalysisError, FetchCoordinator, JobExecutor, JobOrchestrator, LexiconClassifier, LogNotifier,
    Notifier, ProgressStage, RawComment, SourceFetcher, SourceProfile, Spike, SpikeKind,
    SyntheticSource,
};
use churnwatch_core::{
    AnalysisJob, Comment, JobResult, JobStatus, NewComment, NewTopic, Product, RiskBand, Store,
    StoreError, Subscriber, Subscription, Topic,
};
use churnwatch_db::MemoryStore;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct ScriptedSource {
    name: &'static str,
    texts: Vec<&'static str>,
    fail: bool,
}

#[async_trait]
impl SourceFetcher for ScriptedSource {
    fn name(&self) -> &str {
        self.name
    }

    fn weight(&self) -> u32 {
        1
    }

    async fn fetch(
        &self,
        _product_name: &str,
        limit: usize,
    ) -> Result<Vec<RawComment>, AnalysisError> {
        if self.fail {
            return Err(AnalysisError::Source {
                source_name: self.name.to_string(),
                message: "upstream unavailable".to_string(),
            });
        }
        Ok(self
            .texts
            .iter()
            .take(limit)
            .map(|t| RawComment {
                text: (*t).to_string(),
                source: self.name.to_string(),
                source_url: None,
                author: None,
                posted_at: None,
            })
            .collect())
    }
}

fn scripted(name: &'static str, texts: Vec<&'static str>, fail: bool) -> Arc<dyn SourceFetcher> {
    Arc::new(ScriptedSource { name, texts, fail })
}

/// Sleeps before answering so a worker stays busy.
struct SlowSource {
    delay: Duration,
}

#[async_trait]
impl SourceFetcher for SlowSource {
    fn name(&self) -> &str {
        "slow"
    }

    fn weight(&self) -> u32 {
        1
    }

    async fn fetch(
        &self,
        product_name: &str,
        _limit: usize,
    ) -> Result<Vec<RawComment>, AnalysisError> {
        tokio::time::sleep(self.delay).await;
        Ok(vec![RawComment {
            text: format!("{product_name} works fine"),
            source: "slow".to_string(),
            source_url: None,
            author: None,
            posted_at: None,
        }])
    }
}

struct PanickingSource;

#[async_trait]
impl SourceFetcher for PanickingSource {
    fn name(&self) -> &str {
        "broken"
    }

    fn weight(&self) -> u32 {
        1
    }

    async fn fetch(
        &self,
        _product_name: &str,
        _limit: usize,
    ) -> Result<Vec<RawComment>, AnalysisError> {
        panic!("source blew up");
    }
}

/// Delegates to a [`MemoryStore`] but refuses to persist completed jobs.
struct FailingCompleteStore {
    inner: Arc<MemoryStore>,
}

#[async_trait]
impl Store for FailingCompleteStore {
    async fn get_or_create_product(&self, name: &str) -> Result<Product, StoreError> {
        self.inner.get_or_create_product(name).await
    }

    async fn get_product_by_name(&self, name: &str) -> Result<Option<Product>, StoreError> {
        self.inner.get_product_by_name(name).await
    }

    async fn get_product(&self, id: i64) -> Result<Option<Product>, StoreError> {
        self.inner.get_product(id).await
    }

    async fn create_job(&self, product_id: i64) -> Result<AnalysisJob, StoreError> {
        self.inner.create_job(product_id).await
    }

    async fn start_job(&self, job_id: i64) -> Result<(), StoreError> {
        self.inner.start_job(job_id).await
    }

    async fn complete_job(
        &self,
        _job_id: i64,
        _result: &JobResult,
        _comments: &[NewComment],
        _topics: &[NewTopic],
    ) -> Result<(), StoreError> {
        Err(StoreError::Backend("disk full".to_string()))
    }

    async fn fail_job(&self, job_id: i64, message: &str) -> Result<(), StoreError> {
        self.inner.fail_job(job_id, message).await
    }

    async fn get_job(&self, job_id: i64) -> Result<Option<AnalysisJob>, StoreError> {
        self.inner.get_job(job_id).await
    }

    async fn latest_completed_jobs(
        &self,
        product_id: i64,
        limit: usize,
    ) -> Result<Vec<AnalysisJob>, StoreError> {
        self.inner.latest_completed_jobs(product_id, limit).await
    }

    async fn list_comments(&self, job_id: i64, limit: usize) -> Result<Vec<Comment>, StoreError> {
        self.inner.list_comments(job_id, limit).await
    }

    async fn list_topics(&self, job_id: i64) -> Result<Vec<Topic>, StoreError> {
        self.inner.list_topics(job_id).await
    }

    async fn fail_stale_jobs(
        &self,
        cutoff: DateTime<Utc>,
        message: &str,
    ) -> Result<u64, StoreError> {
        self.inner.fail_stale_jobs(cutoff, message).await
    }

    async fn upsert_subscription(&self, subscription: &Subscription) -> Result<(), StoreError> {
        self.inner.upsert_subscription(subscription).await
    }

    async fn get_subscription(
        &self,
        product_id: i64,
        email: &str,
    ) -> Result<Option<Subscription>, StoreError> {
        self.inner.get_subscription(product_id, email).await
    }

    async fn list_alert_subscribers(
        &self,
        product_id: i64,
    ) -> Result<Vec<Subscriber>, StoreError> {
        self.inner.list_alert_subscribers(product_id).await
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, Spike)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, subscriber: &Subscriber, _product: &Product, spike: &Spike) -> bool {
        self.sent
            .lock()
            .unwrap()
            .push((subscriber.email.clone(), spike.clone()));
        true
    }
}

fn synthetic_coordinator(seed: u64) -> FetchCoordinator {
    FetchCoordinator::new(
        vec![
            Arc::new(SyntheticSource::seeded(SourceProfile::Forum, seed)),
            Arc::new(SyntheticSource::seeded(SourceProfile::Reviews, seed + 1)),
            Arc::new(SyntheticSource::seeded(SourceProfile::Social, seed + 2)),
        ],
        Duration::from_secs(5),
    )
}

fn orchestrator(
    store: Arc<MemoryStore>,
    fetcher: FetchCoordinator,
    notifier: Arc<dyn Notifier>,
) -> Arc<JobOrchestrator> {
    Arc::new(JobOrchestrator::new(
        store,
        fetcher,
        Arc::new(LexiconClassifier),
        notifier,
        50,
    ))
}

async fn wait_for_terminal(orchestrator: &JobOrchestrator, job_id: i64) -> JobStatus {
    for _ in 0..200 {
        let snapshot = orchestrator
            .get_status(job_id)
            .await
            .unwrap()
            .expect("job exists");
        if snapshot.job.status.is_terminal() {
            return snapshot.job.status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} did not finish");
}

fn completed(positive: i32, negative: i32, neutral: i32) -> JobResult {
    JobResult {
        total_comments: positive + negative + neutral,
        positive_count: positive,
        negative_count: negative,
        neutral_count: neutral,
        avg_sentiment: 0.0,
        churn_risk: 0.2,
    }
}

// ---------------------------------------------------------------------------
// Section 1: Orchestrator
// ---------------------------------------------------------------------------

#[tokio::test]
async fn synthetic_job_completes_with_consistent_counts() {
    let store = Arc::new(MemoryStore::new());
    let orch = orchestrator(store.clone(), synthetic_coordinator(11), Arc::new(LogNotifier));

    let submitted = orch.create("Acme Cloud").await.unwrap();
    assert_eq!(submitted.status, JobStatus::Pending);
    assert_eq!(submitted.estimated_seconds, 5);

    let status = orch.run(submitted.job_id, &submitted.product_name).await;
    assert_eq!(status, JobStatus::Completed);

    let snapshot = orch.get_status(submitted.job_id).await.unwrap().unwrap();
    let job = snapshot.job;
    assert_eq!(job.total_comments, 50);
    assert_eq!(
        job.positive_count + job.negative_count + job.neutral_count,
        job.total_comments
    );
    assert!(job.completed_at.is_some());
    assert!(job
        .avg_sentiment
        .is_some_and(|s| (-1.0..=1.0).contains(&s)));
    assert!(job.churn_risk.is_some_and(|r| (0.0..=1.0).contains(&r)));
    assert!(job.error_message.is_none());
    assert_eq!(snapshot.progress.stage, ProgressStage::Done);
    assert_eq!(snapshot.progress.percent, 100);

    assert_eq!(store.comment_count(submitted.job_id).await, 50);
    assert!(store.topic_count(submitted.job_id).await > 0);
}

#[tokio::test]
async fn zero_comments_fails_without_rows() {
    let store = Arc::new(MemoryStore::new());
    let fetcher = FetchCoordinator::new(
        vec![scripted("forum", vec![], false), scripted("social", vec![], false)],
        Duration::from_secs(5),
    );
    let orch = orchestrator(store.clone(), fetcher, Arc::new(LogNotifier));

    let submitted = orch.create("Ghost Product").await.unwrap();
    let status = orch.run(submitted.job_id, &submitted.product_name).await;
    assert_eq!(status, JobStatus::Failed);

    let job = store.get_job(submitted.job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.started_at.is_some());
    assert_eq!(
        job.error_message.as_deref(),
        Some("No comments found for product")
    );
    assert_eq!(store.comment_count(submitted.job_id).await, 0);
    assert_eq!(store.topic_count(submitted.job_id).await, 0);
}

#[tokio::test]
async fn all_sources_failing_fails_the_job() {
    let store = Arc::new(MemoryStore::new());
    let fetcher = FetchCoordinator::new(
        vec![scripted("forum", vec!["x"], true)],
        Duration::from_secs(5),
    );
    let orch = orchestrator(store.clone(), fetcher, Arc::new(LogNotifier));

    let submitted = orch.create("Acme").await.unwrap();
    assert_eq!(
        orch.run(submitted.job_id, &submitted.product_name).await,
        JobStatus::Failed
    );
    let job = store.get_job(submitted.job_id).await.unwrap().unwrap();
    assert_eq!(job.error_message.as_deref(), Some("all sources failed"));
}

#[tokio::test]
async fn partial_source_failure_still_completes() {
    let store = Arc::new(MemoryStore::new());
    let fetcher = FetchCoordinator::new(
        vec![
            scripted("forum", vec!["Love it, great support", "Too expensive and slow"], false),
            scripted("reviews", vec![], true),
            scripted("social", vec!["Terrible, cancel now"], false),
        ],
        Duration::from_secs(5),
    );
    let orch = orchestrator(store.clone(), fetcher, Arc::new(LogNotifier));

    let submitted = orch.create("Acme").await.unwrap();
    assert_eq!(
        orch.run(submitted.job_id, &submitted.product_name).await,
        JobStatus::Completed
    );

    let job = store.get_job(submitted.job_id).await.unwrap().unwrap();
    assert_eq!(job.total_comments, 3);
    assert_eq!(job.positive_count, 1);
    assert_eq!(job.negative_count, 2);

    let topics = store.list_topics(submitted.job_id).await.unwrap();
    let names: Vec<&str> = topics.iter().map(|t| t.name.as_str()).collect();
    assert!(names.contains(&"price"));
    assert!(names.contains(&"performance"));
    assert!(names.contains(&"support"));
}

#[tokio::test]
async fn persistence_failure_fails_the_job_without_rows() {
    let memory = Arc::new(MemoryStore::new());
    let store = Arc::new(FailingCompleteStore {
        inner: memory.clone(),
    });
    let orch = JobOrchestrator::new(
        store,
        synthetic_coordinator(21),
        Arc::new(LexiconClassifier),
        Arc::new(LogNotifier),
        50,
    );

    let submitted = orch.create("Acme").await.unwrap();
    assert_eq!(
        orch.run(submitted.job_id, &submitted.product_name).await,
        JobStatus::Failed
    );

    let job = memory.get_job(submitted.job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(
        job.error_message.as_deref(),
        Some("store backend error: disk full")
    );
    assert_eq!(job.total_comments, 0);
    assert!(job.churn_risk.is_none());
    assert_eq!(memory.comment_count(submitted.job_id).await, 0);
    assert_eq!(memory.topic_count(submitted.job_id).await, 0);

    let snapshot = orch.get_status(submitted.job_id).await.unwrap().unwrap();
    assert_eq!(snapshot.job.status, JobStatus::Failed);
}

#[tokio::test]
async fn invalid_product_name_creates_nothing() {
    let store = Arc::new(MemoryStore::new());
    let orch = orchestrator(store.clone(), synthetic_coordinator(1), Arc::new(LogNotifier));

    let err = orch.create("   ").await.unwrap_err();
    assert!(matches!(err, AnalysisError::InvalidProductName(_)));
    let err = orch.create(&"x".repeat(256)).await.unwrap_err();
    assert!(matches!(err, AnalysisError::InvalidProductName(_)));
    assert!(store.get_product_by_name("").await.unwrap().is_none());
}

#[tokio::test]
async fn unknown_job_status_is_none() {
    let store = Arc::new(MemoryStore::new());
    let orch = orchestrator(store, synthetic_coordinator(1), Arc::new(LogNotifier));
    assert!(orch.get_status(424_242).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Section 2: Dashboard
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dashboard_is_defaulted_for_unknown_product() {
    let store = Arc::new(MemoryStore::new());
    let orch = orchestrator(store, synthetic_coordinator(1), Arc::new(LogNotifier));

    let dashboard = orch.dashboard("Nobody Uses This").await.unwrap();
    assert!(dashboard.product.is_none());
    assert!(dashboard.job.is_none());
    assert!(dashboard.comments.is_empty());
    assert!(dashboard.risk_band.is_none());
}

#[tokio::test]
async fn dashboard_shows_latest_completed_job() {
    let store = Arc::new(MemoryStore::new());
    let orch = orchestrator(store, synthetic_coordinator(5), Arc::new(LogNotifier));

    let submitted = orch.create("Acme").await.unwrap();
    orch.run(submitted.job_id, &submitted.product_name).await;

    let dashboard = orch.dashboard("Acme").await.unwrap();
    let job = dashboard.job.expect("completed job");
    assert_eq!(job.id, submitted.job_id);
    assert_eq!(dashboard.comments.len(), 20);
    assert!(dashboard.risk_band.is_some());
    let d = dashboard.distribution;
    assert!((d.positive + d.negative + d.neutral - 100.0).abs() < 0.2);
    let counts: Vec<i32> = dashboard.topics.iter().map(|t| t.mention_count).collect();
    assert!(counts.windows(2).all(|w| w[0] >= w[1]));
}

// ---------------------------------------------------------------------------
// Section 3: Spikes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn negative_spike_notifies_subscribers() {
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let orch = orchestrator(store.clone(), synthetic_coordinator(1), notifier.clone());

    let product = store.get_or_create_product("Acme").await.unwrap();
    for (positive, negative, neutral) in [(50, 10, 40), (40, 35, 25)] {
        let job = store.create_job(product.id).await.unwrap();
        store.start_job(job.id).await.unwrap();
        store
            .complete_job(job.id, &completed(positive, negative, neutral), &[], &[])
            .await
            .unwrap();
    }
    let latest = store.latest_completed_jobs(product.id, 1).await.unwrap()[0].id;

    for (email, alerts) in [("on@example.com", true), ("off@example.com", false)] {
        store
            .upsert_subscription(&Subscription {
                product_id: product.id,
                email: email.to_string(),
                display_name: None,
                email_alerts: alerts,
            })
            .await
            .unwrap();
    }

    let check = orch.check_spike(latest).await.unwrap();
    let spike = check.spike.expect("spike detected");
    assert_eq!(spike.kind, SpikeKind::NegativeSpike);
    assert!((spike.change_percentage - 25.0).abs() < 1e-9);
    assert_eq!(check.notified, 1);

    let sent = notifier.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "on@example.com");
}

#[tokio::test]
async fn single_completed_job_has_no_spike() {
    let store = Arc::new(MemoryStore::new());
    let orch = orchestrator(store, synthetic_coordinator(2), Arc::new(LogNotifier));

    let submitted = orch.create("Acme").await.unwrap();
    orch.run(submitted.job_id, &submitted.product_name).await;

    let check = orch.check_spike(submitted.job_id).await.unwrap();
    assert!(check.spike.is_none());
    assert_eq!(check.notified, 0);
}

#[tokio::test]
async fn spike_check_for_unknown_job_is_not_found() {
    let store = Arc::new(MemoryStore::new());
    let orch = orchestrator(store, synthetic_coordinator(2), Arc::new(LogNotifier));
    let err = orch.check_spike(999).await.unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::Store(churnwatch_core::StoreError::NotFound)
    ));
}

// ---------------------------------------------------------------------------
// Section 4: Executor
// ---------------------------------------------------------------------------

#[tokio::test]
async fn inline_executor_returns_before_job_finishes() {
    let store = Arc::new(MemoryStore::new());
    let orch = orchestrator(store, synthetic_coordinator(3), Arc::new(LogNotifier));
    let executor = JobExecutor::inline(orch.clone());

    let submitted = executor.submit("Acme").await.unwrap();
    assert_eq!(submitted.status, JobStatus::Pending);
    assert_eq!(
        wait_for_terminal(&orch, submitted.job_id).await,
        JobStatus::Completed
    );
}

#[tokio::test]
async fn queued_executor_runs_every_job() {
    let store = Arc::new(MemoryStore::new());
    let orch = orchestrator(store.clone(), synthetic_coordinator(4), Arc::new(LogNotifier));
    let executor = JobExecutor::queued(orch.clone(), 2, 16);

    let mut ids = Vec::new();
    for name in ["Acme", "Globex", "Initech", "Acme"] {
        ids.push(executor.submit(name).await.unwrap().job_id);
    }
    for id in ids {
        assert_eq!(wait_for_terminal(&orch, id).await, JobStatus::Completed);
    }

    let acme = store.get_product_by_name("Acme").await.unwrap().unwrap();
    let jobs = store.latest_completed_jobs(acme.id, 10).await.unwrap();
    assert_eq!(jobs.len(), 2);
    assert!(jobs.iter().all(|j| j.completed_at.is_some()));
}

#[tokio::test]
async fn panicking_job_is_failed_by_its_supervisor() {
    let store = Arc::new(MemoryStore::new());
    let fetcher = FetchCoordinator::new(vec![Arc::new(PanickingSource)], Duration::from_secs(5));
    let orch = orchestrator(store.clone(), fetcher, Arc::new(LogNotifier));
    let executor = JobExecutor::inline(orch.clone());

    let submitted = executor.submit("Acme").await.unwrap();
    assert_eq!(
        wait_for_terminal(&orch, submitted.job_id).await,
        JobStatus::Failed
    );

    let job = store.get_job(submitted.job_id).await.unwrap().unwrap();
    assert_eq!(
        job.error_message.as_deref(),
        Some("job aborted: internal error")
    );
    assert!(job.completed_at.is_some());
    assert_eq!(store.comment_count(submitted.job_id).await, 0);
}

#[tokio::test]
async fn full_queue_rejects_jobs_as_failed() {
    let store = Arc::new(MemoryStore::new());
    let fetcher = FetchCoordinator::new(
        vec![Arc::new(SlowSource {
            delay: Duration::from_millis(500),
        })],
        Duration::from_secs(5),
    );
    let orch = orchestrator(store.clone(), fetcher, Arc::new(LogNotifier));
    let executor = JobExecutor::queued(orch.clone(), 1, 1);

    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    for i in 0..6 {
        let submitted = executor.submit(&format!("Product {i}")).await.unwrap();
        if submitted.status == JobStatus::Failed {
            rejected.push(submitted.job_id);
        } else {
            accepted.push(submitted.job_id);
        }
    }

    // one job in the worker plus one buffered in the channel
    assert!(accepted.len() <= 2, "accepted {accepted:?}");
    assert!(rejected.len() >= 4, "rejected {rejected:?}");

    for id in &rejected {
        let job = store.get_job(*id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(
            job.error_message.as_deref(),
            Some("job rejected: queue is full")
        );
        assert!(job.started_at.is_none());
    }
    for id in accepted {
        assert_eq!(wait_for_terminal(&orch, id).await, JobStatus::Completed);
    }
}

#[tokio::test]
async fn risk_band_matches_churn_risk() {
    let store = Arc::new(MemoryStore::new());
    let orch = orchestrator(store, synthetic_coordinator(9), Arc::new(LogNotifier));
    let submitted = orch.create("Acme").await.unwrap();
    orch.run(submitted.job_id, &submitted.product_name).await;

    let dashboard = orch.dashboard("Acme").await.unwrap();
    let job = dashboard.job.unwrap();
    assert_eq!(
        dashboard.risk_band,
        job.churn_risk.map(RiskBand::from_probability)
    );
}
