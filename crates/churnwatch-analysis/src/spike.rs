//! Sentiment swing detection between a product's two latest completed jobs.

use churnwatch_core::{AnalysisJob, Store, StoreError};

use crate::types::{round_to, Spike, SpikeKind};

/// Negative-ratio increase (as a fraction) that counts as a spike.
pub const NEGATIVE_SPIKE_THRESHOLD: f64 = 0.20;
/// Positive-ratio increase (as a fraction) that counts as a spike.
pub const POSITIVE_SPIKE_THRESHOLD: f64 = 0.30;

/// Compare the two most recently completed jobs for `product_id`.
///
/// Returns `None` with fewer than two completed jobs or when neither
/// threshold is crossed.
///
/// # Errors
///
/// Propagates [`StoreError`] from the lookup.
pub async fn detect(store: &dyn Store, product_id: i64) -> Result<Option<Spike>, StoreError> {
    let jobs = store.latest_completed_jobs(product_id, 2).await?;
    match jobs.as_slice() {
        [current, previous] => Ok(compare(current, previous)),
        _ => Ok(None),
    }
}

/// Negative swings are checked first, so at most one spike is reported.
#[must_use]
pub fn compare(current: &AnalysisJob, previous: &AnalysisJob) -> Option<Spike> {
    let negative_delta = current.negative_ratio() - previous.negative_ratio();
    if negative_delta > NEGATIVE_SPIKE_THRESHOLD {
        return Some(spike(
            SpikeKind::NegativeSpike,
            negative_delta,
            current.negative_ratio(),
            previous.negative_ratio(),
            current.id,
        ));
    }

    let positive_delta = current.positive_ratio() - previous.positive_ratio();
    if positive_delta > POSITIVE_SPIKE_THRESHOLD {
        return Some(spike(
            SpikeKind::PositiveSpike,
            positive_delta,
            current.positive_ratio(),
            previous.positive_ratio(),
            current.id,
        ));
    }

    None
}

fn spike(kind: SpikeKind, delta: f64, current: f64, previous: f64, job_id: i64) -> Spike {
    Spike {
        kind,
        change_percentage: round_to(delta * 100.0, 1),
        current_ratio: round_to(current * 100.0, 1),
        previous_ratio: round_to(previous * 100.0, 1),
        job_id,
    }
}
