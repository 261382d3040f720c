//! The persistence contract the analysis pipeline depends on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::jobs::{AnalysisJob, Comment, JobResult, JobStatus, NewComment, NewTopic, Topic};
use crate::products::Product;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: i64,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("store backend error: {0}")]
    Backend(String),
}

/// A user who asked to be alerted about sentiment spikes for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    pub email: String,
    pub display_name: Option<String>,
}

/// Per-product alert preference for one subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub product_id: i64,
    pub email: String,
    pub display_name: Option<String>,
    pub email_alerts: bool,
}

/// Persistence operations used by the orchestrator and the API layer.
///
/// Implementations must make [`Store::complete_job`] atomic: comments, topics,
/// aggregate fields, status and `completed_at` become visible together or not
/// at all. Transitions out of a terminal status are refused with
/// [`StoreError::InvalidTransition`].
#[async_trait]
pub trait Store: Send + Sync {
    /// Verify the backend is reachable.
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Look up a product by name, creating it if absent.
    async fn get_or_create_product(&self, name: &str) -> Result<Product, StoreError>;

    async fn get_product_by_name(&self, name: &str) -> Result<Option<Product>, StoreError>;

    async fn get_product(&self, id: i64) -> Result<Option<Product>, StoreError>;

    /// Insert a new job in `pending` status.
    async fn create_job(&self, product_id: i64) -> Result<AnalysisJob, StoreError>;

    /// `pending -> in_progress`, stamping `started_at`.
    async fn start_job(&self, job_id: i64) -> Result<(), StoreError>;

    /// `in_progress -> completed` together with every comment, topic and
    /// aggregate field, in one unit.
    async fn complete_job(
        &self,
        job_id: i64,
        result: &JobResult,
        comments: &[NewComment],
        topics: &[NewTopic],
    ) -> Result<(), StoreError>;

    /// Any non-terminal status `-> failed` with a verbatim message.
    async fn fail_job(&self, job_id: i64, message: &str) -> Result<(), StoreError>;

    async fn get_job(&self, job_id: i64) -> Result<Option<AnalysisJob>, StoreError>;

    /// Most recently completed jobs for a product, newest first by
    /// `completed_at` (ties broken by id, newest first).
    async fn latest_completed_jobs(
        &self,
        product_id: i64,
        limit: usize,
    ) -> Result<Vec<AnalysisJob>, StoreError>;

    /// Comments for a job, most recently ingested first.
    async fn list_comments(&self, job_id: i64, limit: usize) -> Result<Vec<Comment>, StoreError>;

    /// Topics for a job, highest mention count first.
    async fn list_topics(&self, job_id: i64) -> Result<Vec<Topic>, StoreError>;

    /// Fail every non-terminal job created before `cutoff`. Returns the
    /// number of jobs failed.
    async fn fail_stale_jobs(
        &self,
        cutoff: DateTime<Utc>,
        message: &str,
    ) -> Result<u64, StoreError>;

    async fn upsert_subscription(&self, subscription: &Subscription) -> Result<(), StoreError>;

    /// The stored preference for `email` on a product, enabled or not.
    async fn get_subscription(
        &self,
        product_id: i64,
        email: &str,
    ) -> Result<Option<Subscription>, StoreError>;

    /// Subscribers for the product with alerts enabled.
    async fn list_alert_subscribers(&self, product_id: i64)
        -> Result<Vec<Subscriber>, StoreError>;
}
