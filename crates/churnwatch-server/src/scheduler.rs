//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! stale-job reaper.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use churnwatch_core::{Store, StoreError};
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

pub const STALE_JOB_MESSAGE: &str = "job abandoned: exceeded stale timeout";

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process; dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    store: Arc<dyn Store>,
    config: Arc<churnwatch_core::AppConfig>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_stale_job_reaper(&scheduler, store, Duration::minutes(config.stale_job_minutes))
        .await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the reaper, once a minute (`0 * * * * *`).
///
/// Jobs still pending or in progress after `stale_after` belonged to a
/// worker that died or a process that restarted; they are failed so pollers
/// see a terminal state.
async fn register_stale_job_reaper(
    scheduler: &JobScheduler,
    store: Arc<dyn Store>,
    stale_after: Duration,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async("0 * * * * *", move |_uuid, _lock| {
        let store = Arc::clone(&store);

        Box::pin(async move {
            match reap_stale_jobs(store.as_ref(), stale_after, Utc::now()).await {
                Ok(0) => tracing::debug!("scheduler: no stale jobs"),
                Ok(reaped) => tracing::warn!(reaped, "scheduler: failed stale analysis jobs"),
                Err(e) => tracing::error!(error = %e, "scheduler: stale-job reaper failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// Fail every non-terminal job created before `now - stale_after`.
pub async fn reap_stale_jobs(
    store: &dyn Store,
    stale_after: Duration,
    now: DateTime<Utc>,
) -> Result<u64, StoreError> {
    store
        .fail_stale_jobs(now - stale_after, STALE_JOB_MESSAGE)
        .await
}
