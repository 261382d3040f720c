//! Feedback sources and the coordinator that fans out to them.

mod synthetic;

pub use synthetic::{SourceProfile, SyntheticSource};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;

use crate::error::AnalysisError;
use crate::types::RawComment;

/// A named feedback channel that produces raw comments for a product.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Source tag written to every comment, e.g. `forum`.
    fn name(&self) -> &str;

    /// Relative share of the fetch cap. Shares are normalized across all
    /// configured sources.
    fn weight(&self) -> u32;

    /// Whether this source generates demo data instead of calling out.
    fn is_synthetic(&self) -> bool {
        false
    }

    /// Fetch up to `limit` comments mentioning `product_name`.
    async fn fetch(&self, product_name: &str, limit: usize)
        -> Result<Vec<RawComment>, AnalysisError>;
}

/// Merged result of one coordinated fetch.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Comments in source-issue order, then within-source order.
    pub comments: Vec<RawComment>,
    /// One entry per failed or timed-out source.
    pub errors: Vec<AnalysisError>,
}

/// Runs every configured source concurrently and merges their output.
#[derive(Clone)]
pub struct FetchCoordinator {
    sources: Vec<Arc<dyn SourceFetcher>>,
    source_timeout: Duration,
}

impl FetchCoordinator {
    #[must_use]
    pub fn new(sources: Vec<Arc<dyn SourceFetcher>>, source_timeout: Duration) -> Self {
        Self {
            sources,
            source_timeout,
        }
    }

    /// The three demo sources (`forum`, `reviews`, `social`) with OS-seeded
    /// randomness.
    #[must_use]
    pub fn synthetic(source_timeout: Duration) -> Self {
        let sources: Vec<Arc<dyn SourceFetcher>> = vec![
            Arc::new(SyntheticSource::new(SourceProfile::Forum)),
            Arc::new(SyntheticSource::new(SourceProfile::Reviews)),
            Arc::new(SyntheticSource::new(SourceProfile::Social)),
        ];
        Self::new(sources, source_timeout)
    }

    #[must_use]
    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// True when every configured source is synthetic.
    #[must_use]
    pub fn all_synthetic(&self) -> bool {
        self.sources.iter().all(|s| s.is_synthetic())
    }

    /// Fetch up to `max_results` comments across all sources.
    ///
    /// A failing or slow source is recorded in [`FetchOutcome::errors`] and
    /// skipped; the others still contribute.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::AllSourcesFailed`] if every invoked source
    /// failed, or [`AnalysisError::NoData`] if the merged result is empty.
    pub async fn fetch(
        &self,
        product_name: &str,
        max_results: usize,
    ) -> Result<FetchOutcome, AnalysisError> {
        let weights: Vec<u32> = self.sources.iter().map(|s| s.weight()).collect();
        let shares = partition(max_results, &weights);

        let calls = self
            .sources
            .iter()
            .zip(shares)
            .filter(|(_, share)| *share > 0)
            .map(|(source, share)| {
                let source = Arc::clone(source);
                let timeout = self.source_timeout;
                async move {
                    let name = source.name().to_string();
                    let result =
                        match tokio::time::timeout(timeout, source.fetch(product_name, share))
                            .await
                        {
                            Ok(Ok(mut comments)) => {
                                comments.truncate(share);
                                Ok(comments)
                            }
                            Ok(Err(e)) => Err(e),
                            Err(_) => Err(AnalysisError::Timeout {
                                source_name: name.clone(),
                            }),
                        };
                    (name, result)
                }
            });

        // join_all keeps input order, so the merge is deterministic.
        let results = join_all(calls).await;
        let invoked = results.len();

        let mut outcome = FetchOutcome::default();
        for (name, result) in results {
            match result {
                Ok(comments) => {
                    tracing::debug!(
                        product = product_name,
                        source = name.as_str(),
                        count = comments.len(),
                        "collected comments"
                    );
                    outcome.comments.extend(comments);
                }
                Err(e) => {
                    tracing::warn!(
                        product = product_name,
                        source = name.as_str(),
                        error = %e,
                        "source fetch failed"
                    );
                    outcome.errors.push(e);
                }
            }
        }

        if invoked > 0 && outcome.errors.len() == invoked {
            return Err(AnalysisError::AllSourcesFailed);
        }

        outcome.comments.truncate(max_results);
        if outcome.comments.is_empty() {
            return Err(AnalysisError::NoData);
        }

        Ok(outcome)
    }
}

/// Split `cap` across sources in proportion to `weights`.
///
/// Every source but the last gets `floor(cap * w / total)`; the last takes
/// the remainder so shares always sum to `cap`. When `cap` covers every
/// source, a source left at zero borrows one unit from the largest share.
#[must_use]
pub fn partition(cap: usize, weights: &[u32]) -> Vec<usize> {
    if weights.is_empty() {
        return Vec::new();
    }

    let total: u128 = weights.iter().map(|w| u128::from(*w)).sum();
    let cap_wide = u128::try_from(cap).unwrap_or(u128::MAX);
    let mut shares = Vec::with_capacity(weights.len());
    let mut assigned = 0_usize;

    for (i, w) in weights.iter().enumerate() {
        let share = if i + 1 == weights.len() {
            cap - assigned
        } else if total == 0 {
            0
        } else {
            // quotient never exceeds cap
            usize::try_from(cap_wide.saturating_mul(u128::from(*w)) / total).unwrap_or(cap)
        };
        assigned += share;
        shares.push(share);
    }

    if cap >= shares.len() {
        while let Some(empty) = shares.iter().position(|s| *s == 0) {
            let Some(largest) = shares
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(&a.0)))
                .map(|(i, _)| i)
            else {
                break;
            };
            if shares[largest] <= 1 {
                break;
            }
            shares[largest] -= 1;
            shares[empty] += 1;
        }
    }

    shares
}
