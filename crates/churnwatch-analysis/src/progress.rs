//! In-process progress for running jobs, for UI polling.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::Serialize;

use crate::types::ProgressStage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub stage: ProgressStage,
    pub percent: u8,
}

/// Latest stage per job id. Percent never moves backwards for a job.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    jobs: RwLock<HashMap<i64, Progress>>,
}

impl ProgressTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, job_id: i64, stage: ProgressStage) {
        let Ok(mut jobs) = self.jobs.write() else {
            return;
        };
        let next = Progress {
            stage,
            percent: stage.percent(),
        };
        jobs.entry(job_id)
            .and_modify(|current| {
                if next.percent >= current.percent {
                    *current = next;
                }
            })
            .or_insert(next);
    }

    #[must_use]
    pub fn get(&self, job_id: i64) -> Option<Progress> {
        self.jobs.read().ok()?.get(&job_id).copied()
    }

    /// Forget a job once its terminal state is persisted.
    pub fn clear(&self, job_id: i64) {
        if let Ok(mut jobs) = self.jobs.write() {
            jobs.remove(&job_id);
        }
    }
}
