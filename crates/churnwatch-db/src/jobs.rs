//! Database operations for `analysis_jobs`.
//!
//! Every status transition is a guarded `UPDATE ... WHERE status IN (...)`;
//! a zero-row update is resolved into [`DbError::NotFound`] or
//! [`DbError::InvalidJobTransition`] by re-reading the row.

use chrono::{DateTime, Utc};
use churnwatch_core::{AnalysisJob, JobResult, JobStatus, NewComment, NewTopic};
use sqlx::{PgPool, Postgres, Transaction};

use crate::{sql_limit, DbError};

const JOB_COLUMNS: &str = "id, product_id, status, total_comments, positive_count, \
     negative_count, neutral_count, avg_sentiment, churn_risk, error_message, \
     created_at, started_at, completed_at";

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// A row from the `analysis_jobs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AnalysisJobRow {
    pub id: i64,
    pub product_id: i64,
    pub status: String,
    pub total_comments: i32,
    pub positive_count: i32,
    pub negative_count: i32,
    pub neutral_count: i32,
    pub avg_sentiment: Option<f64>,
    pub churn_risk: Option<f64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<AnalysisJobRow> for AnalysisJob {
    type Error = DbError;

    fn try_from(row: AnalysisJobRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<JobStatus>()
            .map_err(|e| DbError::Corrupt(format!("analysis_jobs.id={}: {e}", row.id)))?;

        Ok(AnalysisJob {
            id: row.id,
            product_id: row.product_id,
            status,
            total_comments: row.total_comments,
            positive_count: row.positive_count,
            negative_count: row.negative_count,
            neutral_count: row.neutral_count,
            avg_sentiment: row.avg_sentiment,
            churn_risk: row.churn_risk,
            error_message: row.error_message,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Creates a new job in `pending` status and returns the full row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_job(pool: &PgPool, product_id: i64) -> Result<AnalysisJobRow, DbError> {
    let row = sqlx::query_as::<_, AnalysisJobRow>(&format!(
        "INSERT INTO analysis_jobs (product_id, status) VALUES ($1, 'pending') \
         RETURNING {JOB_COLUMNS}"
    ))
    .bind(product_id)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a job `in_progress` and sets `started_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::InvalidJobTransition`] if the job is not `pending`,
/// [`DbError::NotFound`] if it does not exist, or [`DbError::Sqlx`].
pub async fn start_job(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE analysis_jobs \
         SET status = 'in_progress', started_at = NOW() \
         WHERE id = $1 AND status = 'pending'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(transition_error(pool, id, JobStatus::InProgress).await);
    }

    Ok(())
}

/// Marks a job `completed` and writes its comments, topics and aggregates in
/// one transaction.
///
/// The job row is locked with `FOR UPDATE` first, so a concurrent failure
/// (e.g. the stale-job reaper) either wins before this runs or waits for it.
/// `completed_at` is read with `clock_timestamp()` after the lock is held,
/// not the transaction start time.
///
/// # Errors
///
/// Returns [`DbError::InvalidJobTransition`] if the job is not `in_progress`,
/// [`DbError::NotFound`] if it does not exist, or [`DbError::Sqlx`] if any
/// statement fails (in which case nothing is written).
pub async fn complete_job(
    pool: &PgPool,
    id: i64,
    result: &JobResult,
    comments: &[NewComment],
    topics: &[NewTopic],
) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    let locked: Option<(i64, String)> =
        sqlx::query_as("SELECT product_id, status FROM analysis_jobs WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

    let (product_id, status) = locked.ok_or(DbError::NotFound)?;
    let status = parse_status(id, &status)?;
    if status != JobStatus::InProgress {
        return Err(DbError::InvalidJobTransition {
            id,
            from: status,
            to: JobStatus::Completed,
        });
    }

    insert_comments(&mut tx, product_id, id, comments).await?;
    insert_topics(&mut tx, id, topics).await?;

    sqlx::query(
        "UPDATE analysis_jobs \
         SET status = 'completed', total_comments = $1, positive_count = $2, \
             negative_count = $3, neutral_count = $4, avg_sentiment = $5, \
             churn_risk = $6, completed_at = clock_timestamp() \
         WHERE id = $7",
    )
    .bind(result.total_comments)
    .bind(result.positive_count)
    .bind(result.negative_count)
    .bind(result.neutral_count)
    .bind(result.avg_sentiment)
    .bind(result.churn_risk)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Marks a non-terminal job `failed`, setting `error_message` and stamping
/// `completed_at` with the wall clock at update time.
///
/// # Errors
///
/// Returns [`DbError::InvalidJobTransition`] if the job is already terminal,
/// [`DbError::NotFound`] if it does not exist, or [`DbError::Sqlx`].
pub async fn fail_job(pool: &PgPool, id: i64, error_message: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE analysis_jobs \
         SET status = 'failed', completed_at = clock_timestamp(), error_message = $1 \
         WHERE id = $2 AND status IN ('pending', 'in_progress')",
    )
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(transition_error(pool, id, JobStatus::Failed).await);
    }

    Ok(())
}

/// Fails every `pending`/`in_progress` job created before `cutoff`.
///
/// Returns the number of jobs failed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn fail_stale_jobs(
    pool: &PgPool,
    cutoff: DateTime<Utc>,
    error_message: &str,
) -> Result<u64, DbError> {
    let result = sqlx::query(
        "UPDATE analysis_jobs \
         SET status = 'failed', completed_at = clock_timestamp(), error_message = $1 \
         WHERE status IN ('pending', 'in_progress') AND created_at < $2",
    )
    .bind(error_message)
    .bind(cutoff)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Fetches a single job by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_job(pool: &PgPool, id: i64) -> Result<Option<AnalysisJobRow>, DbError> {
    let row = sqlx::query_as::<_, AnalysisJobRow>(&format!(
        "SELECT {JOB_COLUMNS} FROM analysis_jobs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns the most recent `limit` completed jobs for a product, ordered by
/// `completed_at DESC, id DESC`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn latest_completed_jobs(
    pool: &PgPool,
    product_id: i64,
    limit: usize,
) -> Result<Vec<AnalysisJobRow>, DbError> {
    let rows = sqlx::query_as::<_, AnalysisJobRow>(&format!(
        "SELECT {JOB_COLUMNS} FROM analysis_jobs \
         WHERE product_id = $1 AND status = 'completed' \
         ORDER BY completed_at DESC, id DESC \
         LIMIT $2"
    ))
    .bind(product_id)
    .bind(sql_limit(limit))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn insert_comments(
    tx: &mut Transaction<'_, Postgres>,
    product_id: i64,
    job_id: i64,
    comments: &[NewComment],
) -> Result<(), DbError> {
    for comment in comments {
        sqlx::query(
            "INSERT INTO comments \
                 (product_id, job_id, text, source, source_url, author, posted_at, \
                  sentiment, sentiment_score, confidence) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(product_id)
        .bind(job_id)
        .bind(&comment.text)
        .bind(&comment.source)
        .bind(comment.source_url.as_deref())
        .bind(comment.author.as_deref())
        .bind(comment.posted_at)
        .bind(comment.sentiment.as_str())
        .bind(comment.sentiment_score)
        .bind(comment.confidence)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn insert_topics(
    tx: &mut Transaction<'_, Postgres>,
    job_id: i64,
    topics: &[NewTopic],
) -> Result<(), DbError> {
    for topic in topics {
        sqlx::query(
            "INSERT INTO topics (job_id, name, keywords, mention_count, avg_sentiment) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(job_id)
        .bind(&topic.name)
        .bind(&topic.keywords)
        .bind(topic.mention_count)
        .bind(topic.avg_sentiment)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Explain why a guarded transition matched no rows.
async fn transition_error(pool: &PgPool, id: i64, to: JobStatus) -> DbError {
    let status: Result<Option<String>, sqlx::Error> =
        sqlx::query_scalar("SELECT status FROM analysis_jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await;

    match status {
        Ok(None) => DbError::NotFound,
        Ok(Some(raw)) => match parse_status(id, &raw) {
            Ok(from) => DbError::InvalidJobTransition { id, from, to },
            Err(e) => e,
        },
        Err(e) => DbError::Sqlx(e),
    }
}

fn parse_status(id: i64, raw: &str) -> Result<JobStatus, DbError> {
    raw.parse::<JobStatus>()
        .map_err(|e| DbError::Corrupt(format!("analysis_jobs.id={id}: {e}")))
}
