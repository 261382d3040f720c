use churnwatch_core::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("classifier error: {0}")]
    Classifier(String),

    #[error("source {source_name} failed: {message}")]
    Source {
        source_name: String,
        message: String,
    },

    #[error("source {source_name} timed out")]
    Timeout { source_name: String },

    #[error("no comments found for product")]
    NoData,

    #[error("all sources failed")]
    AllSourcesFailed,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid product name: {0}")]
    InvalidProductName(String),
}
