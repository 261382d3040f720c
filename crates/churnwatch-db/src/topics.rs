//! Database operations for the `topics` table.

use chrono::{DateTime, Utc};
use churnwatch_core::Topic;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `topics` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TopicRow {
    pub id: i64,
    pub job_id: i64,
    pub name: String,
    pub keywords: Vec<String>,
    pub mention_count: i32,
    pub avg_sentiment: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl From<TopicRow> for Topic {
    fn from(row: TopicRow) -> Self {
        Topic {
            id: row.id,
            job_id: row.job_id,
            name: row.name,
            keywords: row.keywords,
            mention_count: row.mention_count,
            avg_sentiment: row.avg_sentiment,
            created_at: row.created_at,
        }
    }
}

/// Returns all topics for a job, highest `mention_count` first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_topics(pool: &PgPool, job_id: i64) -> Result<Vec<TopicRow>, DbError> {
    let rows = sqlx::query_as::<_, TopicRow>(
        "SELECT id, job_id, name, keywords, mention_count, avg_sentiment, created_at \
         FROM topics \
         WHERE job_id = $1 \
         ORDER BY mention_count DESC, name ASC",
    )
    .bind(job_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
