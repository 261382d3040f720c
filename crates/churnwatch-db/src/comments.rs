//! Database operations for the `comments` table.
//!
//! Comments are inserted only inside [`crate::jobs::complete_job`]; this
//! module covers reads.

use chrono::{DateTime, Utc};
use churnwatch_core::{Comment, SentimentLabel};
use sqlx::PgPool;

use crate::{sql_limit, DbError};

/// A row from the `comments` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommentRow {
    pub id: i64,
    pub product_id: i64,
    pub job_id: i64,
    pub text: String,
    pub source: String,
    pub source_url: Option<String>,
    pub author: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub sentiment: Option<String>,
    pub sentiment_score: Option<f64>,
    pub confidence: Option<f64>,
    pub ingested_at: DateTime<Utc>,
}

impl TryFrom<CommentRow> for Comment {
    type Error = DbError;

    fn try_from(row: CommentRow) -> Result<Self, Self::Error> {
        let sentiment = row
            .sentiment
            .as_deref()
            .map(str::parse::<SentimentLabel>)
            .transpose()
            .map_err(|e| DbError::Corrupt(format!("comments.id={}: {e}", row.id)))?;

        Ok(Comment {
            id: row.id,
            product_id: row.product_id,
            job_id: row.job_id,
            text: row.text,
            source: row.source,
            source_url: row.source_url,
            author: row.author,
            posted_at: row.posted_at,
            sentiment,
            sentiment_score: row.sentiment_score,
            confidence: row.confidence,
            ingested_at: row.ingested_at,
        })
    }
}

/// Returns up to `limit` comments for a job, most recently ingested first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_comments(
    pool: &PgPool,
    job_id: i64,
    limit: usize,
) -> Result<Vec<CommentRow>, DbError> {
    let rows = sqlx::query_as::<_, CommentRow>(
        "SELECT id, product_id, job_id, text, source, source_url, author, posted_at, \
                sentiment, sentiment_score, confidence, ingested_at \
         FROM comments \
         WHERE job_id = $1 \
         ORDER BY ingested_at DESC, id DESC \
         LIMIT $2",
    )
    .bind(job_id)
    .bind(sql_limit(limit))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
