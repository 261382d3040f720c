//! Customer-feedback analysis pipeline.
//!
//! Fetches comments about a product from several sources concurrently,
//! classifies their sentiment, extracts coarse topics, scores churn risk and
//! persists everything through a [`churnwatch_core::Store`] as one job.
//! Completed jobs are compared to detect sentiment spikes, which are pushed
//! to subscribers through a [`Notifier`].

pub mod churn;
pub mod classifier;
pub mod error;
pub mod executor;
pub mod notifier;
pub mod orchestrator;
pub mod progress;
pub mod sources;
pub mod spike;
pub mod topics;
pub mod types;

pub use classifier::{HttpClassifier, LexiconClassifier, SentimentClassifier};
pub use error::AnalysisError;
pub use executor::JobExecutor;
pub use notifier::{LogNotifier, Notifier, WebhookNotifier};
pub use orchestrator::{
    Dashboard, JobOrchestrator, JobSnapshot, SentimentDistribution, SpikeCheck, SubmittedJob,
};
pub use progress::{Progress, ProgressTracker};
pub use sources::{FetchCoordinator, FetchOutcome, SourceFetcher, SourceProfile, SyntheticSource};
pub use topics::TopicExtractor;
pub use types::{ChurnResult, ProgressStage, RawComment, SentimentResult, Spike, SpikeKind};
