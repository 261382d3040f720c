use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Lifecycle state of an analysis job.
///
/// `Pending -> InProgress -> {Completed, Failed}`. Both terminal states are
/// final; stores refuse any transition out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "in_progress" => Ok(JobStatus::InProgress),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(CoreError::UnknownJobStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SentimentLabel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "positive" => Ok(SentimentLabel::Positive),
            "negative" => Ok(SentimentLabel::Negative),
            "neutral" => Ok(SentimentLabel::Neutral),
            other => Err(CoreError::UnknownSentimentLabel(other.to_string())),
        }
    }
}

/// Discrete churn-risk band derived from a churn probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskBand {
    Low,
    Medium,
    High,
}

impl RiskBand {
    /// `< 0.3` is low, `< 0.6` is medium, anything else is high.
    #[must_use]
    pub fn from_probability(probability: f64) -> Self {
        if probability < 0.3 {
            RiskBand::Low
        } else if probability < 0.6 {
            RiskBand::Medium
        } else {
            RiskBand::High
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RiskBand::Low => "low",
            RiskBand::Medium => "medium",
            RiskBand::High => "high",
        }
    }
}

impl std::fmt::Display for RiskBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One analysis run for a product.
///
/// Aggregate fields stay at their defaults (`0` / `None`) until the job is
/// completed; `error_message` is set only when the job fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub id: i64,
    pub product_id: i64,
    pub status: JobStatus,
    pub total_comments: i32,
    pub positive_count: i32,
    pub negative_count: i32,
    pub neutral_count: i32,
    /// Mean signed sentiment in `[-1.0, 1.0]`.
    pub avg_sentiment: Option<f64>,
    /// Churn probability in `[0.0, 1.0]`.
    pub churn_risk: Option<f64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl AnalysisJob {
    /// Fraction of negative comments, `0.0` when the job has no comments.
    #[must_use]
    pub fn negative_ratio(&self) -> f64 {
        ratio(self.negative_count, self.total_comments)
    }

    /// Fraction of positive comments, `0.0` when the job has no comments.
    #[must_use]
    pub fn positive_ratio(&self) -> f64 {
        ratio(self.positive_count, self.total_comments)
    }

    /// Fraction of neutral comments, `0.0` when the job has no comments.
    #[must_use]
    pub fn neutral_ratio(&self) -> f64 {
        ratio(self.neutral_count, self.total_comments)
    }
}

fn ratio(part: i32, total: i32) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    f64::from(part) / f64::from(total)
}

/// Aggregate fields written together with the `completed` transition.
#[derive(Debug, Clone, PartialEq)]
pub struct JobResult {
    pub total_comments: i32,
    pub positive_count: i32,
    pub negative_count: i32,
    pub neutral_count: i32,
    pub avg_sentiment: f64,
    pub churn_risk: f64,
}

/// A classified comment ready to be persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewComment {
    pub text: String,
    /// Source tag, e.g. `"forum"`, `"reviews"`, `"social"`.
    pub source: String,
    pub source_url: Option<String>,
    pub author: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub sentiment: SentimentLabel,
    pub sentiment_score: f64,
    pub confidence: f64,
}

/// A persisted comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub product_id: i64,
    pub job_id: i64,
    pub text: String,
    pub source: String,
    pub source_url: Option<String>,
    pub author: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub sentiment: Option<SentimentLabel>,
    pub sentiment_score: Option<f64>,
    pub confidence: Option<f64>,
    pub ingested_at: DateTime<Utc>,
}

/// A topic bucket ready to be persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTopic {
    pub name: String,
    /// Display sample of matched keywords, already capped.
    pub keywords: Vec<String>,
    pub mention_count: i32,
    pub avg_sentiment: f64,
}

/// A persisted topic bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: i64,
    pub job_id: i64,
    pub name: String,
    pub keywords: Vec<String>,
    pub mention_count: i32,
    pub avg_sentiment: Option<f64>,
    pub created_at: DateTime<Utc>,
}
