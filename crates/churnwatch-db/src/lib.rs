use churnwatch_core::{AppConfig, JobStatus, Store, StoreBackend};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{sync::Arc, time::Duration};
use thiserror::Error;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

// Path relative to crates/churnwatch-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("DATABASE_URL is not set")]
    MissingDatabaseUrl,
    #[error("record not found")]
    NotFound,
    #[error("job {id} cannot move from {from} to {to}")]
    InvalidJobTransition {
        id: i64,
        from: JobStatus,
        to: JobStatus,
    },
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Connect to a Postgres pool using explicit URL and config.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Open the store selected by `config.store`.
///
/// For Postgres this connects, runs pending migrations and wraps the pool in
/// a [`PgStore`]; for memory it returns an empty [`MemoryStore`].
///
/// # Errors
///
/// Returns [`DbError::MissingDatabaseUrl`] if Postgres is selected without a
/// URL, or the connection/migration error.
pub async fn open_store(config: &AppConfig) -> Result<Arc<dyn Store>, DbError> {
    match config.store {
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .ok_or(DbError::MissingDatabaseUrl)?;
            let pool = connect_pool(database_url, PoolConfig::from_app_config(config)).await?;
            let applied = run_migrations(&pool).await?;
            tracing::info!(applied, "database migrations applied");
            Ok(Arc::new(PgStore::new(pool)))
        }
    }
}

/// Run all pending migrations against the pool.
///
/// Returns the number of migrations that were applied.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, sqlx::migrate::MigrateError> {
    // The _sqlx_migrations table may not exist yet on a fresh database;
    // treat absence as zero applied.
    let applied_before: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    MIGRATOR.run(pool).await?;

    let applied_after: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    let delta = (applied_after - applied_before).max(0);
    Ok(usize::try_from(delta).unwrap_or(0))
}

/// Send a `SELECT 1` to verify the pool has a live connection.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

/// Clamp a caller-supplied `usize` limit into a SQL `LIMIT` value.
pub(crate) fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}


pub mod comments;
pub mod jobs;
pub mod memory;
pub mod pg_store;
pub mod products;
pub mod subscriptions;
pub mod topics;

pub use comments::{list_comments, CommentRow};
pub use jobs::{
    complete_job, create_job, fail_job, fail_stale_jobs, get_job, latest_completed_jobs,
    start_job, AnalysisJobRow,
};
pub use memory::MemoryStore;
pub use pg_store::PgStore;
pub use products::{get_or_create_product, get_product, get_product_by_name, ProductRow};
pub use subscriptions::{
    get_subscription, list_alert_subscribers, upsert_subscription, SubscriptionRow,
};
pub use topics::{list_topics, TopicRow};
