use chrono::{DateTime, Utc};
use churnwatch_core::{RiskBand, SentimentLabel};
use serde::{Deserialize, Serialize};

/// A comment as produced by a source fetcher, before classification.
#[derive(Debug, Clone, PartialEq)]
pub struct RawComment {
    pub text: String,
    /// Source tag, e.g. `forum`.
    pub source: String,
    pub source_url: Option<String>,
    pub author: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
}

/// Classifier output for one text.
///
/// `score` carries the sign of `label` and the magnitude of `confidence`;
/// neutral results always have `score == 0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentResult {
    pub label: SentimentLabel,
    pub score: f64,
    pub confidence: f64,
}

impl SentimentResult {
    /// The result used for blank input and for degraded classifier calls.
    #[must_use]
    pub fn neutral() -> Self {
        Self {
            label: SentimentLabel::Neutral,
            score: 0.0,
            confidence: 0.0,
        }
    }

    /// Build a result from a label and a confidence in `[0, 1]`, deriving the
    /// signed score.
    #[must_use]
    pub fn from_label(label: SentimentLabel, confidence: f64) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let score = match label {
            SentimentLabel::Positive => confidence,
            SentimentLabel::Negative => -confidence,
            SentimentLabel::Neutral => 0.0,
        };
        Self {
            label,
            score,
            confidence,
        }
    }
}

/// Churn estimate for one job. Not persisted on its own.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChurnResult {
    pub probability: f64,
    pub band: RiskBand,
    /// Sample-size reliability in `[0, 1]`, not a statistical interval.
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpikeKind {
    NegativeSpike,
    PositiveSpike,
}

impl SpikeKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SpikeKind::NegativeSpike => "negative_spike",
            SpikeKind::PositiveSpike => "positive_spike",
        }
    }
}

impl std::fmt::Display for SpikeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A large swing in sentiment ratio between the two latest completed jobs.
///
/// Percentages are rounded to one decimal place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spike {
    #[serde(rename = "type")]
    pub kind: SpikeKind,
    pub change_percentage: f64,
    pub current_ratio: f64,
    pub previous_ratio: f64,
    /// The most recent of the two compared jobs.
    pub job_id: i64,
}

/// Named pipeline stages reported to pollers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    Queued,
    Fetching,
    Classifying,
    Persisting,
    Scoring,
    ExtractingTopics,
    Done,
}

impl ProgressStage {
    #[must_use]
    pub fn percent(self) -> u8 {
        match self {
            ProgressStage::Queued => 0,
            ProgressStage::Fetching => 10,
            ProgressStage::Classifying => 40,
            ProgressStage::Persisting => 60,
            ProgressStage::Scoring => 70,
            ProgressStage::ExtractingTopics => 85,
            ProgressStage::Done => 100,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProgressStage::Queued => "queued",
            ProgressStage::Fetching => "fetching",
            ProgressStage::Classifying => "classifying",
            ProgressStage::Persisting => "persisting",
            ProgressStage::Scoring => "scoring",
            ProgressStage::ExtractingTopics => "extracting_topics",
            ProgressStage::Done => "done",
        }
    }
}

/// Round to `places` decimal places.
#[must_use]
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10_f64.powi(places);
    (value * factor).round() / factor
}
