//! Shared domain types and configuration for churnwatch.

mod app_config;
mod config;
mod jobs;
mod products;
mod store;

pub use app_config::{AppConfig, ClassifierBackend, Environment, ExecutionMode, StoreBackend};
pub use config::{load_app_config, load_app_config_from_env, MAX_RESULTS_LIMIT};
pub use jobs::{
    AnalysisJob, Comment, JobResult, JobStatus, NewComment, NewTopic, RiskBand, SentimentLabel,
    Topic,
};
pub use products::{validate_product_name, Product, MAX_PRODUCT_NAME_LEN};
pub use store::{Store, StoreError, Subscriber, Subscription};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid product name: {0}")]
    InvalidProductName(String),

    #[error("unknown job status: {0}")]
    UnknownJobStatus(String),

    #[error("unknown sentiment label: {0}")]
    UnknownSentimentLabel(String),
}
