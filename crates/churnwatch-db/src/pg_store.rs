//! [`Store`] implementation backed by Postgres.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use churnwatch_core::{
    AnalysisJob, Comment, JobResult, NewComment, NewTopic, Product, Store, StoreError, Subscriber,
    Subscription, Topic,
};
use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound => StoreError::NotFound,
            DbError::InvalidJobTransition { id, from, to } => {
                StoreError::InvalidTransition { id, from, to }
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        crate::ping(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn get_or_create_product(&self, name: &str) -> Result<Product, StoreError> {
        let row = crate::products::get_or_create_product(&self.pool, name).await?;
        Ok(row.into())
    }

    async fn get_product_by_name(&self, name: &str) -> Result<Option<Product>, StoreError> {
        let row = crate::products::get_product_by_name(&self.pool, name).await?;
        Ok(row.map(Product::from))
    }

    async fn get_product(&self, id: i64) -> Result<Option<Product>, StoreError> {
        let row = crate::products::get_product(&self.pool, id).await?;
        Ok(row.map(Product::from))
    }

    async fn create_job(&self, product_id: i64) -> Result<AnalysisJob, StoreError> {
        let row = crate::jobs::create_job(&self.pool, product_id).await?;
        Ok(AnalysisJob::try_from(row)?)
    }

    async fn start_job(&self, job_id: i64) -> Result<(), StoreError> {
        Ok(crate::jobs::start_job(&self.pool, job_id).await?)
    }

    async fn complete_job(
        &self,
        job_id: i64,
        result: &JobResult,
        comments: &[NewComment],
        topics: &[NewTopic],
    ) -> Result<(), StoreError> {
        Ok(crate::jobs::complete_job(&self.pool, job_id, result, comments, topics).await?)
    }

    async fn fail_job(&self, job_id: i64, message: &str) -> Result<(), StoreError> {
        Ok(crate::jobs::fail_job(&self.pool, job_id, message).await?)
    }

    async fn get_job(&self, job_id: i64) -> Result<Option<AnalysisJob>, StoreError> {
        let row = crate::jobs::get_job(&self.pool, job_id).await?;
        Ok(row.map(AnalysisJob::try_from).transpose()?)
    }

    async fn latest_completed_jobs(
        &self,
        product_id: i64,
        limit: usize,
    ) -> Result<Vec<AnalysisJob>, StoreError> {
        let rows = crate::jobs::latest_completed_jobs(&self.pool, product_id, limit).await?;
        let jobs = rows
            .into_iter()
            .map(AnalysisJob::try_from)
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(jobs)
    }

    async fn list_comments(&self, job_id: i64, limit: usize) -> Result<Vec<Comment>, StoreError> {
        let rows = crate::comments::list_comments(&self.pool, job_id, limit).await?;
        let comments = rows
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(comments)
    }

    async fn list_topics(&self, job_id: i64) -> Result<Vec<Topic>, StoreError> {
        let rows = crate::topics::list_topics(&self.pool, job_id).await?;
        Ok(rows.into_iter().map(Topic::from).collect())
    }

    async fn fail_stale_jobs(
        &self,
        cutoff: DateTime<Utc>,
        message: &str,
    ) -> Result<u64, StoreError> {
        Ok(crate::jobs::fail_stale_jobs(&self.pool, cutoff, message).await?)
    }

    async fn upsert_subscription(&self, subscription: &Subscription) -> Result<(), StoreError> {
        crate::subscriptions::upsert_subscription(
            &self.pool,
            subscription.product_id,
            &subscription.email,
            subscription.display_name.as_deref(),
            subscription.email_alerts,
        )
        .await?;
        Ok(())
    }

    async fn get_subscription(
        &self,
        product_id: i64,
        email: &str,
    ) -> Result<Option<Subscription>, StoreError> {
        let row = crate::subscriptions::get_subscription(&self.pool, product_id, email).await?;
        Ok(row.map(|row| Subscription {
            product_id: row.product_id,
            email: row.email,
            display_name: row.display_name,
            email_alerts: row.email_alerts,
        }))
    }

    async fn list_alert_subscribers(
        &self,
        product_id: i64,
    ) -> Result<Vec<Subscriber>, StoreError> {
        let rows = crate::subscriptions::list_alert_subscribers(&self.pool, product_id).await?;
        Ok(rows
            .into_iter()
            .map(|row| Subscriber {
                email: row.email,
                display_name: row.display_name,
            })
            .collect())
    }
}
