//! In-process [`Store`] used for demo deployments and tests.
//!
//! All state sits behind one `RwLock`, so every operation (including
//! [`Store::complete_job`]) is atomic with respect to readers.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use churnwatch_core::{
    AnalysisJob, Comment, JobResult, JobStatus, NewComment, NewTopic, Product, Store, StoreError,
    Subscriber, Subscription, Topic,
};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i64,
    products: Vec<Product>,
    jobs: HashMap<i64, AnalysisJob>,
    comments: Vec<Comment>,
    topics: Vec<Topic>,
    subscriptions: Vec<Subscription>,
}

impl MemoryState {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn job_mut(&mut self, job_id: i64) -> Result<&mut AnalysisJob, StoreError> {
        self.jobs.get_mut(&job_id).ok_or(StoreError::NotFound)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of comments stored for a job.
    pub async fn comment_count(&self, job_id: i64) -> usize {
        let state = self.state.read().await;
        state.comments.iter().filter(|c| c.job_id == job_id).count()
    }

    /// Number of topics stored for a job.
    pub async fn topic_count(&self, job_id: i64) -> usize {
        let state = self.state.read().await;
        state.topics.iter().filter(|t| t.job_id == job_id).count()
    }
}

fn ensure_transition(job: &AnalysisJob, allowed: &[JobStatus], to: JobStatus) -> Result<(), StoreError> {
    if allowed.contains(&job.status) {
        Ok(())
    } else {
        Err(StoreError::InvalidTransition {
            id: job.id,
            from: job.status,
            to,
        })
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_or_create_product(&self, name: &str) -> Result<Product, StoreError> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.products.iter().find(|p| p.name == name) {
            return Ok(existing.clone());
        }
        let product = Product {
            id: state.allocate_id(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        state.products.push(product.clone());
        Ok(product)
    }

    async fn get_product_by_name(&self, name: &str) -> Result<Option<Product>, StoreError> {
        let state = self.state.read().await;
        Ok(state.products.iter().find(|p| p.name == name).cloned())
    }

    async fn get_product(&self, id: i64) -> Result<Option<Product>, StoreError> {
        let state = self.state.read().await;
        Ok(state.products.iter().find(|p| p.id == id).cloned())
    }

    async fn create_job(&self, product_id: i64) -> Result<AnalysisJob, StoreError> {
        let mut state = self.state.write().await;
        if !state.products.iter().any(|p| p.id == product_id) {
            return Err(StoreError::NotFound);
        }
        let job = AnalysisJob {
            id: state.allocate_id(),
            product_id,
            status: JobStatus::Pending,
            total_comments: 0,
            positive_count: 0,
            negative_count: 0,
            neutral_count: 0,
            avg_sentiment: None,
            churn_risk: None,
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };
        state.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn start_job(&self, job_id: i64) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let job = state.job_mut(job_id)?;
        ensure_transition(job, &[JobStatus::Pending], JobStatus::InProgress)?;
        job.status = JobStatus::InProgress;
        job.started_at = Some(Utc::now());
        Ok(())
    }

    async fn complete_job(
        &self,
        job_id: i64,
        result: &JobResult,
        comments: &[NewComment],
        topics: &[NewTopic],
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;

        let product_id = {
            let job = state.job_mut(job_id)?;
            ensure_transition(job, &[JobStatus::InProgress], JobStatus::Completed)?;
            job.product_id
        };

        let now = Utc::now();
        for comment in comments {
            let id = state.allocate_id();
            state.comments.push(Comment {
                id,
                product_id,
                job_id,
                text: comment.text.clone(),
                source: comment.source.clone(),
                source_url: comment.source_url.clone(),
                author: comment.author.clone(),
                posted_at: comment.posted_at,
                sentiment: Some(comment.sentiment),
                sentiment_score: Some(comment.sentiment_score),
                confidence: Some(comment.confidence),
                ingested_at: now,
            });
        }
        for topic in topics {
            let id = state.allocate_id();
            state.topics.push(Topic {
                id,
                job_id,
                name: topic.name.clone(),
                keywords: topic.keywords.clone(),
                mention_count: topic.mention_count,
                avg_sentiment: Some(topic.avg_sentiment),
                created_at: now,
            });
        }

        let job = state.job_mut(job_id)?;
        job.status = JobStatus::Completed;
        job.total_comments = result.total_comments;
        job.positive_count = result.positive_count;
        job.negative_count = result.negative_count;
        job.neutral_count = result.neutral_count;
        job.avg_sentiment = Some(result.avg_sentiment);
        job.churn_risk = Some(result.churn_risk);
        job.completed_at = Some(now);
        Ok(())
    }

    async fn fail_job(&self, job_id: i64, message: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let job = state.job_mut(job_id)?;
        ensure_transition(
            job,
            &[JobStatus::Pending, JobStatus::InProgress],
            JobStatus::Failed,
        )?;
        job.status = JobStatus::Failed;
        job.error_message = Some(message.to_string());
        job.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn get_job(&self, job_id: i64) -> Result<Option<AnalysisJob>, StoreError> {
        let state = self.state.read().await;
        Ok(state.jobs.get(&job_id).cloned())
    }

    async fn latest_completed_jobs(
        &self,
        product_id: i64,
        limit: usize,
    ) -> Result<Vec<AnalysisJob>, StoreError> {
        let state = self.state.read().await;
        let mut jobs: Vec<AnalysisJob> = state
            .jobs
            .values()
            .filter(|j| j.product_id == product_id && j.status == JobStatus::Completed)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| {
            b.completed_at
                .cmp(&a.completed_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        jobs.truncate(limit);
        Ok(jobs)
    }

    async fn list_comments(&self, job_id: i64, limit: usize) -> Result<Vec<Comment>, StoreError> {
        let state = self.state.read().await;
        let mut comments: Vec<Comment> = state
            .comments
            .iter()
            .filter(|c| c.job_id == job_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| {
            b.ingested_at
                .cmp(&a.ingested_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        comments.truncate(limit);
        Ok(comments)
    }

    async fn list_topics(&self, job_id: i64) -> Result<Vec<Topic>, StoreError> {
        let state = self.state.read().await;
        let mut topics: Vec<Topic> = state
            .topics
            .iter()
            .filter(|t| t.job_id == job_id)
            .cloned()
            .collect();
        topics.sort_by(|a, b| {
            b.mention_count
                .cmp(&a.mention_count)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(topics)
    }

    async fn fail_stale_jobs(
        &self,
        cutoff: DateTime<Utc>,
        message: &str,
    ) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let mut failed = 0_u64;
        for job in state.jobs.values_mut() {
            if !job.status.is_terminal() && job.created_at < cutoff {
                job.status = JobStatus::Failed;
                job.error_message = Some(message.to_string());
                job.completed_at = Some(now);
                failed += 1;
            }
        }
        Ok(failed)
    }

    async fn upsert_subscription(&self, subscription: &Subscription) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if let Some(existing) = state
            .subscriptions
            .iter_mut()
            .find(|s| s.product_id == subscription.product_id && s.email == subscription.email)
        {
            existing.display_name.clone_from(&subscription.display_name);
            existing.email_alerts = subscription.email_alerts;
        } else {
            state.subscriptions.push(subscription.clone());
        }
        Ok(())
    }

    async fn get_subscription(
        &self,
        product_id: i64,
        email: &str,
    ) -> Result<Option<Subscription>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .subscriptions
            .iter()
            .find(|s| s.product_id == product_id && s.email == email)
            .cloned())
    }

    async fn list_alert_subscribers(
        &self,
        product_id: i64,
    ) -> Result<Vec<Subscriber>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .subscriptions
            .iter()
            .filter(|s| s.product_id == product_id && s.email_alerts)
            .map(|s| Subscriber {
                email: s.email.clone(),
                display_name: s.display_name.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(total: i32, positive: i32, negative: i32) -> JobResult {
        JobResult {
            total_comments: total,
            positive_count: positive,
            negative_count: negative,
            neutral_count: total - positive - negative,
            avg_sentiment: 0.1,
            churn_risk: 0.2,
        }
    }

    fn comment(text: &str) -> NewComment {
        NewComment {
            text: text.to_string(),
            source: "forum".to_string(),
            source_url: None,
            author: None,
            posted_at: None,
            sentiment: churnwatch_core::SentimentLabel::Neutral,
            sentiment_score: 0.0,
            confidence: 0.0,
        }
    }

    async fn started_job(store: &MemoryStore, name: &str) -> AnalysisJob {
        let product = store.get_or_create_product(name).await.unwrap();
        let job = store.create_job(product.id).await.unwrap();
        store.start_job(job.id).await.unwrap();
        job
    }

    #[tokio::test]
    async fn get_or_create_product_is_idempotent() {
        let store = MemoryStore::new();
        let a = store.get_or_create_product("Widget").await.unwrap();
        let b = store.get_or_create_product("Widget").await.unwrap();
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn create_job_requires_product() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.create_job(999).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn complete_job_writes_rows_and_aggregates_together() {
        let store = MemoryStore::new();
        let job = started_job(&store, "Widget").await;

        store
            .complete_job(job.id, &result(2, 1, 1), &[comment("a"), comment("b")], &[])
            .await
            .unwrap();

        let stored = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert_eq!(stored.total_comments, 2);
        assert!(stored.completed_at.is_some());
        assert_eq!(store.comment_count(job.id).await, 2);
    }

    #[tokio::test]
    async fn terminal_jobs_reject_further_transitions() {
        let store = MemoryStore::new();
        let job = started_job(&store, "Widget").await;
        store.fail_job(job.id, "boom").await.unwrap();

        let err = store
            .complete_job(job.id, &result(1, 1, 0), &[comment("late")], &[])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidTransition {
                from: JobStatus::Failed,
                to: JobStatus::Completed,
                ..
            }
        ));
        assert!(store.fail_job(job.id, "again").await.is_err());
        assert_eq!(store.comment_count(job.id).await, 0);

        let stored = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(stored.error_message.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn start_requires_pending() {
        let store = MemoryStore::new();
        let job = started_job(&store, "Widget").await;
        assert!(matches!(
            store.start_job(job.id).await,
            Err(StoreError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn latest_completed_jobs_orders_newest_first() {
        let store = MemoryStore::new();
        let first = started_job(&store, "Widget").await;
        store
            .complete_job(first.id, &result(1, 1, 0), &[], &[])
            .await
            .unwrap();
        let second = started_job(&store, "Widget").await;
        store
            .complete_job(second.id, &result(1, 0, 1), &[], &[])
            .await
            .unwrap();
        let pending = started_job(&store, "Widget").await;

        let jobs = store
            .latest_completed_jobs(first.product_id, 2)
            .await
            .unwrap();
        let ids: Vec<i64> = jobs.iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
        assert!(!ids.contains(&pending.id));
    }

    #[tokio::test]
    async fn fail_stale_jobs_only_touches_open_jobs() {
        let store = MemoryStore::new();
        let open = started_job(&store, "Widget").await;
        let done = started_job(&store, "Widget").await;
        store
            .complete_job(done.id, &result(1, 1, 0), &[], &[])
            .await
            .unwrap();

        let failed = store
            .fail_stale_jobs(Utc::now() + chrono::Duration::seconds(1), "stale")
            .await
            .unwrap();
        assert_eq!(failed, 1);
        let open = store.get_job(open.id).await.unwrap().unwrap();
        assert_eq!(open.status, JobStatus::Failed);
        let done = store.get_job(done.id).await.unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn subscriptions_upsert_and_filter_disabled() {
        let store = MemoryStore::new();
        let product = store.get_or_create_product("Widget").await.unwrap();
        let mut sub = Subscription {
            product_id: product.id,
            email: "ops@example.com".to_string(),
            display_name: Some("Ops".to_string()),
            email_alerts: true,
        };
        store.upsert_subscription(&sub).await.unwrap();
        assert_eq!(
            store.list_alert_subscribers(product.id).await.unwrap().len(),
            1
        );

        sub.email_alerts = false;
        store.upsert_subscription(&sub).await.unwrap();
        assert!(store
            .list_alert_subscribers(product.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn get_subscription_returns_disabled_preferences_too() {
        let store = MemoryStore::new();
        let product = store.get_or_create_product("Widget").await.unwrap();
        let sub = Subscription {
            product_id: product.id,
            email: "ops@example.com".to_string(),
            display_name: None,
            email_alerts: false,
        };
        store.upsert_subscription(&sub).await.unwrap();

        let found = store
            .get_subscription(product.id, "ops@example.com")
            .await
            .unwrap();
        assert_eq!(found, Some(sub));
        assert!(store
            .get_subscription(product.id, "other@example.com")
            .await
            .unwrap()
            .is_none());
        assert!(store
            .get_subscription(product.id + 1, "ops@example.com")
            .await
            .unwrap()
            .is_none());
    }
}
