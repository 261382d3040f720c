use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Where jobs, comments and topics are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    /// Process-local store; data is lost on restart.
    Memory,
}

/// How submitted jobs are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One detached task per submitted job.
    Inline,
    /// Jobs are pushed onto a bounded channel drained by a fixed worker pool.
    Queued,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierBackend {
    /// Built-in word-weight lexicon.
    Lexicon,
    /// Remote model server reached over HTTP.
    Http,
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub store: StoreBackend,
    pub execution_mode: ExecutionMode,
    pub worker_concurrency: usize,
    pub queue_capacity: usize,
    pub max_results: usize,
    pub source_timeout_secs: u64,
    pub classifier: ClassifierBackend,
    pub classifier_url: Option<String>,
    pub classifier_batch_size: usize,
    /// Per-request timeout for the model server.
    pub classifier_timeout_secs: u64,
    pub notify_webhook_url: Option<String>,
    /// Per-request timeout for the alert webhook.
    pub notify_timeout_secs: u64,
    pub frontend_url: String,
    pub stale_job_minutes: i64,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[redacted]"),
            )
            .field("store", &self.store)
            .field("execution_mode", &self.execution_mode)
            .field("worker_concurrency", &self.worker_concurrency)
            .field("queue_capacity", &self.queue_capacity)
            .field("max_results", &self.max_results)
            .field("source_timeout_secs", &self.source_timeout_secs)
            .field("classifier", &self.classifier)
            .field("classifier_url", &self.classifier_url)
            .field("classifier_batch_size", &self.classifier_batch_size)
            .field("classifier_timeout_secs", &self.classifier_timeout_secs)
            .field(
                "notify_webhook_url",
                &self.notify_webhook_url.as_ref().map(|_| "[redacted]"),
            )
            .field("notify_timeout_secs", &self.notify_timeout_secs)
            .field("frontend_url", &self.frontend_url)
            .field("stale_job_minutes", &self.stale_job_minutes)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .finish()
    }
}
