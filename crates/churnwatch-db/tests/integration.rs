//! Offline unit tests for churnwatch-db pool configuration and row types.
//! These tests do not require a live database connection.

use churnwatch_core::{
    AnalysisJob, AppConfig, ClassifierBackend, Comment, Environment, ExecutionMode, JobStatus,
    SentimentLabel, StoreBackend, StoreError,
};
use churnwatch_db::{AnalysisJobRow, CommentRow, DbError, PoolConfig};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

fn app_config() -> AppConfig {
    AppConfig {
        database_url: Some("postgres://example".to_string()),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
        log_level: "info".to_string(),
        store: StoreBackend::Postgres,
        execution_mode: ExecutionMode::Inline,
        worker_concurrency: 4,
        queue_capacity: 64,
        max_results: 50,
        source_timeout_secs: 30,
        classifier: ClassifierBackend::Lexicon,
        classifier_url: None,
        classifier_batch_size: 32,
        classifier_timeout_secs: 10,
        notify_webhook_url: None,
        notify_timeout_secs: 10,
        frontend_url: "http://localhost:3000".to_string(),
        stale_job_minutes: 30,
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
    }
}

fn job_row(status: &str) -> AnalysisJobRow {
    AnalysisJobRow {
        id: 11,
        product_id: 3,
        status: status.to_string(),
        total_comments: 4,
        positive_count: 2,
        negative_count: 1,
        neutral_count: 1,
        avg_sentiment: Some(0.25),
        churn_risk: Some(0.31),
        error_message: None,
        created_at: chrono::Utc::now(),
        started_at: None,
        completed_at: None,
    }
}

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let pool_config = PoolConfig::from_app_config(&app_config());
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

#[test]
fn job_row_converts_known_status() {
    let job = AnalysisJob::try_from(job_row("in_progress")).expect("valid row");
    assert_eq!(job.status, JobStatus::InProgress);
    assert_eq!(job.total_comments, 4);
    assert_eq!(job.churn_risk, Some(0.31));
}

#[test]
fn job_row_with_unknown_status_is_corrupt() {
    let err = AnalysisJob::try_from(job_row("paused")).unwrap_err();
    assert!(matches!(err, DbError::Corrupt(_)), "got {err:?}");
}

#[test]
fn comment_row_parses_sentiment_label() {
    let row = CommentRow {
        id: 1,
        product_id: 3,
        job_id: 11,
        text: "Support never answered".to_string(),
        source: "forum".to_string(),
        source_url: None,
        author: Some("sam".to_string()),
        posted_at: None,
        sentiment: Some("negative".to_string()),
        sentiment_score: Some(-0.6),
        confidence: Some(0.6),
        ingested_at: chrono::Utc::now(),
    };

    let comment = Comment::try_from(row).expect("valid row");
    assert_eq!(comment.sentiment, Some(SentimentLabel::Negative));
    assert_eq!(comment.author.as_deref(), Some("sam"));
}

#[test]
fn db_errors_map_onto_store_errors() {
    let err: StoreError = DbError::InvalidJobTransition {
        id: 5,
        from: JobStatus::Failed,
        to: JobStatus::Completed,
    }
    .into();
    assert!(matches!(
        err,
        StoreError::InvalidTransition {
            id: 5,
            from: JobStatus::Failed,
            to: JobStatus::Completed
        }
    ));

    let err: StoreError = DbError::NotFound.into();
    assert!(matches!(err, StoreError::NotFound));

    let err: StoreError = DbError::Corrupt("bad".to_string()).into();
    assert!(matches!(err, StoreError::Backend(msg) if msg.contains("bad")));
}
