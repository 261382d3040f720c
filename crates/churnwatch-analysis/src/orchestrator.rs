//! Job orchestration: fetch, classify, aggregate, score, extract topics,
//! persist.
//!
//! The orchestrator owns the job state machine. Every failure inside
//! [`JobOrchestrator::run`] ends with the job in `failed`; callers only
//! observe job state.

use std::sync::Arc;
use std::time::Duration;

use churnwatch_core::{
    validate_product_name, AnalysisJob, AppConfig, ClassifierBackend, Comment, CoreError,
    JobResult, JobStatus, NewComment, Product, RiskBand, SentimentLabel, Store, StoreError, Topic,
};
use serde::Serialize;

use crate::churn;
use crate::classifier::{HttpClassifier, LexiconClassifier, SentimentClassifier};
use crate::error::AnalysisError;
use crate::notifier::{LogNotifier, Notifier, WebhookNotifier};
use crate::progress::{Progress, ProgressTracker};
use crate::sources::{FetchCoordinator, FetchOutcome};
use crate::spike;
use crate::topics::{to_new_topics, TopicExtractor};
use crate::types::{round_to, ProgressStage, RawComment, SentimentResult, Spike};

/// Estimated runtime when only demo sources are configured.
pub const SYNTHETIC_ESTIMATE_SECS: u32 = 5;
/// Estimated runtime when any live source is configured.
pub const LIVE_ESTIMATE_SECS: u32 = 90;
/// Comments returned with a dashboard.
pub const DASHBOARD_COMMENTS: usize = 20;

const NO_DATA_MESSAGE: &str = "No comments found for product";

/// Acknowledgement returned as soon as a job is created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmittedJob {
    pub job_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub status: JobStatus,
    pub estimated_seconds: u32,
}

/// A job as seen by a poller.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    #[serde(flatten)]
    pub job: AnalysisJob,
    pub progress: Progress,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SentimentDistribution {
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
}

impl SentimentDistribution {
    /// Percentages rounded to one decimal place.
    #[must_use]
    pub fn from_job(job: &AnalysisJob) -> Self {
        Self {
            positive: round_to(job.positive_ratio() * 100.0, 1),
            negative: round_to(job.negative_ratio() * 100.0, 1),
            neutral: round_to(job.neutral_ratio() * 100.0, 1),
        }
    }
}

/// Latest completed analysis for a product. Every field is defaulted when
/// the product is unknown or has no completed job.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Dashboard {
    pub product: Option<Product>,
    pub job: Option<AnalysisJob>,
    pub comments: Vec<Comment>,
    pub topics: Vec<Topic>,
    pub distribution: SentimentDistribution,
    pub risk_band: Option<RiskBand>,
}

/// Result of a spike check for one job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpikeCheck {
    pub job_id: i64,
    pub spike: Option<Spike>,
    pub notified: usize,
    pub failed_notifications: usize,
}

pub struct JobOrchestrator {
    store: Arc<dyn Store>,
    fetcher: FetchCoordinator,
    classifier: Arc<dyn SentimentClassifier>,
    topics: TopicExtractor,
    notifier: Arc<dyn Notifier>,
    progress: ProgressTracker,
    max_results: usize,
}

impl JobOrchestrator {
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        fetcher: FetchCoordinator,
        classifier: Arc<dyn SentimentClassifier>,
        notifier: Arc<dyn Notifier>,
        max_results: usize,
    ) -> Self {
        Self {
            store,
            fetcher,
            classifier,
            topics: TopicExtractor::default(),
            notifier,
            progress: ProgressTracker::new(),
            max_results,
        }
    }

    /// Wire the demo sources, the configured classifier and notifier
    /// around `store`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Http`] if an HTTP client cannot be built.
    pub fn from_config(config: &AppConfig, store: Arc<dyn Store>) -> Result<Self, AnalysisError> {
        let fetcher = FetchCoordinator::synthetic(Duration::from_secs(config.source_timeout_secs));

        let classifier: Arc<dyn SentimentClassifier> =
            match (config.classifier, config.classifier_url.as_deref()) {
                (ClassifierBackend::Http, Some(url)) => {
                    tracing::info!(url, "using remote sentiment classifier");
                    Arc::new(HttpClassifier::new(
                        url,
                        config.classifier_batch_size,
                        Duration::from_secs(config.classifier_timeout_secs),
                    )?)
                }
                (ClassifierBackend::Http, None) => {
                    tracing::warn!("http classifier selected without a url; using lexicon");
                    Arc::new(LexiconClassifier)
                }
                (ClassifierBackend::Lexicon, _) => Arc::new(LexiconClassifier),
            };

        let notifier: Arc<dyn Notifier> = match config.notify_webhook_url.as_deref() {
            Some(url) => Arc::new(WebhookNotifier::new(
                url,
                &config.frontend_url,
                Duration::from_secs(config.notify_timeout_secs),
            )?),
            None => Arc::new(LogNotifier),
        };

        Ok(Self::new(
            store,
            fetcher,
            classifier,
            notifier,
            config.max_results,
        ))
    }

    #[must_use]
    pub fn with_topic_extractor(mut self, topics: TopicExtractor) -> Self {
        self.topics = topics;
        self
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    #[must_use]
    pub fn estimated_seconds(&self) -> u32 {
        if self.fetcher.all_synthetic() {
            SYNTHETIC_ESTIMATE_SECS
        } else {
            LIVE_ESTIMATE_SECS
        }
    }

    /// Validate the name, create the product if absent, and insert a
    /// `pending` job. Does not run the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidProductName`] before touching the
    /// store, or [`AnalysisError::Store`].
    pub async fn create(&self, product_name: &str) -> Result<SubmittedJob, AnalysisError> {
        let name = validate_name(product_name)?;
        let product = self.store.get_or_create_product(&name).await?;
        let job = self.store.create_job(product.id).await?;
        self.progress.set(job.id, ProgressStage::Queued);

        tracing::info!(job_id = job.id, product = name.as_str(), "analysis job created");

        Ok(SubmittedJob {
            job_id: job.id,
            product_id: product.id,
            product_name: product.name,
            status: job.status,
            estimated_seconds: self.estimated_seconds(),
        })
    }

    /// Drive a `pending` job to a terminal state and return that state.
    pub async fn run(&self, job_id: i64, product_name: &str) -> JobStatus {
        let status = match self.execute(job_id, product_name).await {
            Ok(()) => {
                tracing::info!(job_id, product = product_name, "analysis job completed");
                JobStatus::Completed
            }
            Err(e) => {
                let message = failure_message(&e);
                tracing::error!(job_id, product = product_name, error = %e, "analysis job failed");
                self.fail(job_id, &message).await;
                JobStatus::Failed
            }
        };
        self.progress.clear(job_id);
        status
    }

    /// Record a failure for a job that did not finish normally. Already
    /// terminal jobs are left untouched.
    pub async fn fail(&self, job_id: i64, message: &str) {
        match self.store.fail_job(job_id, message).await {
            Ok(()) => {}
            Err(StoreError::InvalidTransition { from, .. }) => {
                tracing::warn!(job_id, status = %from, "job already terminal; failure not recorded");
            }
            Err(e) => {
                tracing::error!(job_id, error = %e, "could not record job failure");
            }
        }
        self.progress.clear(job_id);
    }

    async fn execute(&self, job_id: i64, product_name: &str) -> Result<(), AnalysisError> {
        self.store.start_job(job_id).await?;

        self.stage(job_id, ProgressStage::Fetching);
        let FetchOutcome { comments, errors } =
            self.fetcher.fetch(product_name, self.max_results).await?;
        if !errors.is_empty() {
            tracing::warn!(
                job_id,
                failed_sources = errors.len(),
                "continuing with partial source results"
            );
        }

        self.stage(job_id, ProgressStage::Classifying);
        let texts: Vec<String> = comments.iter().map(|c| c.text.clone()).collect();
        let sentiments = self.classifier.classify_batch(&texts).await;
        if sentiments.len() != texts.len() {
            return Err(AnalysisError::Classifier(format!(
                "classifier returned {} results for {} texts",
                sentiments.len(),
                texts.len()
            )));
        }

        self.stage(job_id, ProgressStage::Persisting);
        let rows = build_comment_rows(comments, &sentiments);

        self.stage(job_id, ProgressStage::Scoring);
        let result = aggregate(&sentiments);

        self.stage(job_id, ProgressStage::ExtractingTopics);
        let scores: Vec<f64> = sentiments.iter().map(|s| s.score).collect();
        let topics = to_new_topics(&self.topics.extract(&texts, &scores));

        self.store
            .complete_job(job_id, &result, &rows, &topics)
            .await?;
        self.stage(job_id, ProgressStage::Done);

        tracing::debug!(
            job_id,
            total = result.total_comments,
            churn_risk = result.churn_risk,
            topics = topics.len(),
            "job results persisted"
        );
        Ok(())
    }

    fn stage(&self, job_id: i64, stage: ProgressStage) {
        tracing::info!(job_id, stage = stage.as_str(), "job stage");
        self.progress.set(job_id, stage);
    }

    /// Current job state plus best-effort progress.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] from the lookup.
    pub async fn get_status(&self, job_id: i64) -> Result<Option<JobSnapshot>, StoreError> {
        let Some(job) = self.store.get_job(job_id).await? else {
            return Ok(None);
        };

        let progress = match job.status {
            JobStatus::Completed => progress_at(ProgressStage::Done),
            JobStatus::Pending | JobStatus::InProgress | JobStatus::Failed => self
                .progress
                .get(job_id)
                .unwrap_or_else(|| progress_at(ProgressStage::Queued)),
        };

        Ok(Some(JobSnapshot { job, progress }))
    }

    /// Latest completed job for a product with its comments and topics.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidProductName`] for a malformed name, or
    /// [`AnalysisError::Store`].
    pub async fn dashboard(&self, product_name: &str) -> Result<Dashboard, AnalysisError> {
        let name = validate_name(product_name)?;
        let Some(product) = self.store.get_product_by_name(&name).await? else {
            return Ok(Dashboard::default());
        };

        let latest = self.store.latest_completed_jobs(product.id, 1).await?;
        let Some(job) = latest.into_iter().next() else {
            return Ok(Dashboard {
                product: Some(product),
                ..Dashboard::default()
            });
        };

        let comments = self.store.list_comments(job.id, DASHBOARD_COMMENTS).await?;
        let topics = self.store.list_topics(job.id).await?;

        Ok(Dashboard {
            distribution: SentimentDistribution::from_job(&job),
            risk_band: job.churn_risk.map(RiskBand::from_probability),
            product: Some(product),
            job: Some(job),
            comments,
            topics,
        })
    }

    /// Look for a spike ending at the product's latest completed job and
    /// alert every subscriber with alerts enabled.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Store`] with [`StoreError::NotFound`] for an
    /// unknown job, or any other store failure.
    pub async fn check_spike(&self, job_id: i64) -> Result<SpikeCheck, AnalysisError> {
        let job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or(StoreError::NotFound)?;

        let found = spike::detect(self.store.as_ref(), job.product_id).await?;
        let mut check = SpikeCheck {
            job_id,
            spike: found,
            notified: 0,
            failed_notifications: 0,
        };

        let Some(spike) = check.spike.as_ref() else {
            tracing::debug!(job_id, "no sentiment spike");
            return Ok(check);
        };

        tracing::info!(
            job_id,
            kind = spike.kind.as_str(),
            change_percentage = spike.change_percentage,
            "sentiment spike detected"
        );

        let Some(product) = self.store.get_product(job.product_id).await? else {
            return Ok(check);
        };
        let subscribers = self.store.list_alert_subscribers(product.id).await?;
        for subscriber in &subscribers {
            if self.notifier.notify(subscriber, &product, spike).await {
                check.notified += 1;
            } else {
                check.failed_notifications += 1;
            }
        }

        Ok(check)
    }
}

fn validate_name(raw: &str) -> Result<String, AnalysisError> {
    validate_product_name(raw).map_err(|e| match e {
        CoreError::InvalidProductName(message) => AnalysisError::InvalidProductName(message),
        other => AnalysisError::InvalidProductName(other.to_string()),
    })
}

fn progress_at(stage: ProgressStage) -> Progress {
    Progress {
        stage,
        percent: stage.percent(),
    }
}

fn failure_message(err: &AnalysisError) -> String {
    match err {
        AnalysisError::NoData => NO_DATA_MESSAGE.to_string(),
        other => other.to_string(),
    }
}

fn build_comment_rows(comments: Vec<RawComment>, sentiments: &[SentimentResult]) -> Vec<NewComment> {
    comments
        .into_iter()
        .zip(sentiments)
        .map(|(raw, sentiment)| NewComment {
            text: raw.text,
            source: raw.source,
            source_url: raw.source_url,
            author: raw.author,
            posted_at: raw.posted_at,
            sentiment: sentiment.label,
            sentiment_score: sentiment.score,
            confidence: sentiment.confidence,
        })
        .collect()
}

/// Counts, mean sentiment and churn risk over classified comments.
#[must_use]
pub fn aggregate(sentiments: &[SentimentResult]) -> JobResult {
    let mut positive = 0_i32;
    let mut negative = 0_i32;
    let mut neutral = 0_i32;
    for s in sentiments {
        match s.label {
            SentimentLabel::Positive => positive += 1,
            SentimentLabel::Negative => negative += 1,
            SentimentLabel::Neutral => neutral += 1,
        }
    }
    let total = positive + negative + neutral;

    let scores: Vec<f64> = sentiments.iter().map(|s| s.score).collect();
    let avg_sentiment = if total == 0 {
        0.0
    } else {
        (scores.iter().sum::<f64>() / f64::from(total)).clamp(-1.0, 1.0)
    };
    let negative_ratio = if total == 0 {
        0.0
    } else {
        f64::from(negative) / f64::from(total)
    };

    let churn = churn::score(
        avg_sentiment,
        negative_ratio,
        u32::try_from(total).unwrap_or(0),
        churn::volatility(&scores),
    );

    JobResult {
        total_comments: total,
        positive_count: positive,
        negative_count: negative,
        neutral_count: neutral,
        avg_sentiment: round_to(avg_sentiment, 3),
        churn_risk: churn.probability,
    }
}
