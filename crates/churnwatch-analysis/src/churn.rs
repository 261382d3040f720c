//! Churn-risk heuristic over aggregate sentiment.

use churnwatch_core::RiskBand;

use crate::types::{round_to, ChurnResult};

/// Comment count at which a job is considered fully reliable.
const FULL_VOLUME: f64 = 50.0;
const NEGATIVE_WEIGHT: f64 = 0.3;
const MAX_VOLATILITY_BOOST: f64 = 0.2;

/// Map sentiment aggregates to a churn probability.
///
/// Pure and deterministic. `confidence` is the volume factor: small samples
/// report low confidence.
#[must_use]
pub fn score(
    avg_sentiment: f64,
    negative_ratio: f64,
    total_comments: u32,
    sentiment_volatility: f64,
) -> ChurnResult {
    let avg_sentiment = finite_or_zero(avg_sentiment).clamp(-1.0, 1.0);
    let negative_ratio = finite_or_zero(negative_ratio).clamp(0.0, 1.0);
    let volatility = finite_or_zero(sentiment_volatility).max(0.0);

    let sentiment_risk = (1.0 - avg_sentiment) / 2.0;
    let negative_boost = negative_ratio * NEGATIVE_WEIGHT;
    let volatility_boost = volatility.min(MAX_VOLATILITY_BOOST);
    let volume_factor = (f64::from(total_comments) / FULL_VOLUME).min(1.0);

    let probability =
        ((sentiment_risk * 0.5 + negative_boost + volatility_boost) * volume_factor).clamp(0.0, 1.0);
    let probability = round_to(probability, 3);

    ChurnResult {
        probability,
        band: RiskBand::from_probability(probability),
        confidence: round_to(volume_factor, 3),
    }
}

/// Mean absolute deviation of `scores` around their mean. `0.0` when empty.
#[must_use]
pub fn volatility(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = scores.len() as f64;
    let mean = scores.iter().sum::<f64>() / n;
    scores.iter().map(|s| (s - mean).abs()).sum::<f64>() / n
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_positive_full_volume_is_near_zero() {
        let result = score(1.0, 0.0, 50, 0.0);
        assert!(result.probability.abs() < 1e-9);
        assert_eq!(result.band, RiskBand::Low);
        assert!((result.confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn all_negative_clamps_to_one() {
        let result = score(-1.0, 1.0, 50, 0.2);
        assert!((result.probability - 1.0).abs() < f64::EPSILON);
        assert_eq!(result.band, RiskBand::High);
    }

    #[test]
    fn monotonic_in_negative_ratio() {
        let mut previous = -1.0;
        for step in 0..=20 {
            let ratio = f64::from(step) / 20.0;
            let p = score(0.0, ratio, 30, 0.05).probability;
            assert!(p >= previous, "ratio {ratio}: {p} < {previous}");
            previous = p;
        }
    }

    #[test]
    fn non_increasing_in_avg_sentiment() {
        let mut previous = 2.0;
        for step in -10..=10 {
            let avg = f64::from(step) / 10.0;
            let p = score(avg, 0.3, 40, 0.1).probability;
            assert!(p <= previous, "avg {avg}: {p} > {previous}");
            previous = p;
        }
    }

    #[test]
    fn small_samples_scale_down() {
        let small = score(-0.5, 0.6, 5, 0.1);
        let large = score(-0.5, 0.6, 50, 0.1);
        assert!(small.probability < large.probability);
        assert!((small.confidence - 0.1).abs() < 1e-9);
    }

    #[test]
    fn zero_comments_is_zero_risk() {
        let result = score(0.0, 0.0, 0, 0.0);
        assert!(result.probability.abs() < f64::EPSILON);
        assert!(result.confidence.abs() < f64::EPSILON);
    }

    #[test]
    fn out_of_range_inputs_are_clamped() {
        assert_eq!(score(-5.0, 3.0, 500, 9.0), score(-1.0, 1.0, 50, 0.2));
        assert_eq!(score(f64::NAN, 0.0, 50, 0.0), score(0.0, 0.0, 50, 0.0));
    }

    #[test]
    fn volatility_is_mean_absolute_deviation() {
        assert!(volatility(&[]).abs() < f64::EPSILON);
        assert!(volatility(&[0.5, 0.5]).abs() < f64::EPSILON);
        assert!((volatility(&[-1.0, 1.0]) - 1.0).abs() < 1e-9);
    }
}
