//! Scheduling of submitted jobs.
//!
//! Submission only creates the job and hands it off; the pipeline runs in a
//! background task. Inline mode spawns one task per job, queued mode feeds a
//! bounded channel drained by a fixed worker pool. Both run the same
//! [`JobOrchestrator::run`].

use std::sync::Arc;

use churnwatch_core::{ExecutionMode, JobStatus};
use tokio::sync::{mpsc, Mutex};

use crate::error::AnalysisError;
use crate::orchestrator::{JobOrchestrator, SubmittedJob};

const PANIC_MESSAGE: &str = "job aborted: internal error";
const QUEUE_FULL_MESSAGE: &str = "job rejected: queue is full";

#[derive(Debug, Clone)]
struct WorkItem {
    job_id: i64,
    product_name: String,
}

#[derive(Clone)]
enum Dispatch {
    Inline,
    Queued(mpsc::Sender<WorkItem>),
}

#[derive(Clone)]
pub struct JobExecutor {
    orchestrator: Arc<JobOrchestrator>,
    dispatch: Dispatch,
}

impl JobExecutor {
    /// One detached task per job.
    #[must_use]
    pub fn inline(orchestrator: Arc<JobOrchestrator>) -> Self {
        Self {
            orchestrator,
            dispatch: Dispatch::Inline,
        }
    }

    /// `workers` tasks draining a channel of `capacity` pending jobs.
    ///
    /// Must be called inside a Tokio runtime.
    #[must_use]
    pub fn queued(orchestrator: Arc<JobOrchestrator>, workers: usize, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel::<WorkItem>(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        for worker in 0..workers.max(1) {
            let rx = Arc::clone(&rx);
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move {
                loop {
                    let item = {
                        let mut rx = rx.lock().await;
                        rx.recv().await
                    };
                    let Some(item) = item else {
                        tracing::debug!(worker, "job queue closed; worker exiting");
                        break;
                    };
                    supervise(Arc::clone(&orchestrator), item).await;
                }
            });
        }

        Self {
            orchestrator,
            dispatch: Dispatch::Queued(tx),
        }
    }

    #[must_use]
    pub fn from_mode(
        orchestrator: Arc<JobOrchestrator>,
        mode: ExecutionMode,
        workers: usize,
        capacity: usize,
    ) -> Self {
        match mode {
            ExecutionMode::Inline => Self::inline(orchestrator),
            ExecutionMode::Queued => Self::queued(orchestrator, workers, capacity),
        }
    }

    #[must_use]
    pub fn orchestrator(&self) -> &Arc<JobOrchestrator> {
        &self.orchestrator
    }

    /// Create a job and schedule it. Returns without waiting for the
    /// pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidProductName`] or
    /// [`AnalysisError::Store`] if the job could not be created.
    pub async fn submit(&self, product_name: &str) -> Result<SubmittedJob, AnalysisError> {
        let mut submitted = self.orchestrator.create(product_name).await?;
        let item = WorkItem {
            job_id: submitted.job_id,
            product_name: submitted.product_name.clone(),
        };

        match &self.dispatch {
            Dispatch::Inline => {
                tokio::spawn(supervise(Arc::clone(&self.orchestrator), item));
            }
            Dispatch::Queued(tx) => {
                if let Err(e) = tx.try_send(item) {
                    tracing::warn!(job_id = submitted.job_id, error = %e, "could not enqueue job");
                    self.orchestrator
                        .fail(submitted.job_id, QUEUE_FULL_MESSAGE)
                        .await;
                    submitted.status = JobStatus::Failed;
                }
            }
        }

        Ok(submitted)
    }
}

/// Run one job in its own task so a panic still leaves the job `failed`,
/// then check for a spike if it completed.
async fn supervise(orchestrator: Arc<JobOrchestrator>, item: WorkItem) {
    let job_id = item.job_id;
    let runner = Arc::clone(&orchestrator);
    let handle = tokio::spawn(async move { runner.run(item.job_id, &item.product_name).await });

    match handle.await {
        Ok(JobStatus::Completed) => match orchestrator.check_spike(job_id).await {
            Ok(check) if check.spike.is_some() => {
                tracing::info!(
                    job_id,
                    notified = check.notified,
                    failed = check.failed_notifications,
                    "spike alerts sent"
                );
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(job_id, error = %e, "post-completion spike check failed"),
        },
        Ok(_) => {}
        Err(e) => {
            tracing::error!(job_id, error = %e, "job task aborted");
            orchestrator.fail(job_id, PANIC_MESSAGE).await;
        }
    }
}
