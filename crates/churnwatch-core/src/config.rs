use crate::app_config::{AppConfig, ClassifierBackend, Environment, ExecutionMode, StoreBackend};
use crate::ConfigError;

/// Upper bound for `CHURNWATCH_MAX_RESULTS`.
pub const MAX_RESULTS_LIMIT: usize = 10_000;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can drive it with a map.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_positive_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let value = parse_u64(var, default)?;
        if value == 0 {
            return Err(invalid(var, "must be greater than zero".to_string()));
        }
        Ok(value)
    };

    let parse_positive_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let value = or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))?;
        if value == 0 {
            return Err(invalid(var, "must be greater than zero".to_string()));
        }
        Ok(value)
    };

    let env = parse_environment(&or_default("CHURNWATCH_ENV", "development"));
    let store = parse_store_backend(&or_default("CHURNWATCH_STORE", "postgres"))
        .map_err(|reason| invalid("CHURNWATCH_STORE", reason))?;

    let database_url = optional("DATABASE_URL");
    if store == StoreBackend::Postgres && database_url.is_none() {
        return Err(ConfigError::MissingEnvVar("DATABASE_URL".to_string()));
    }

    let bind_addr = parse_addr("CHURNWATCH_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("CHURNWATCH_LOG_LEVEL", "info");

    let execution_mode =
        parse_execution_mode(&or_default("CHURNWATCH_EXECUTION_MODE", "inline"))
            .map_err(|reason| invalid("CHURNWATCH_EXECUTION_MODE", reason))?;
    let worker_concurrency = parse_positive_usize("CHURNWATCH_WORKER_CONCURRENCY", "4")?;
    let queue_capacity = parse_positive_usize("CHURNWATCH_QUEUE_CAPACITY", "64")?;

    let max_results = parse_positive_usize("CHURNWATCH_MAX_RESULTS", "50")?;
    if max_results > MAX_RESULTS_LIMIT {
        return Err(invalid(
            "CHURNWATCH_MAX_RESULTS",
            format!("must be at most {MAX_RESULTS_LIMIT}"),
        ));
    }
    let source_timeout_secs = parse_u64("CHURNWATCH_SOURCE_TIMEOUT_SECS", "30")?;

    let classifier = parse_classifier_backend(&or_default("CHURNWATCH_CLASSIFIER", "lexicon"))
        .map_err(|reason| invalid("CHURNWATCH_CLASSIFIER", reason))?;
    let classifier_url = optional("CHURNWATCH_CLASSIFIER_URL");
    if classifier == ClassifierBackend::Http && classifier_url.is_none() {
        return Err(ConfigError::MissingEnvVar(
            "CHURNWATCH_CLASSIFIER_URL".to_string(),
        ));
    }
    let classifier_batch_size = parse_positive_usize("CHURNWATCH_CLASSIFIER_BATCH_SIZE", "32")?;
    let classifier_timeout_secs =
        parse_positive_u64("CHURNWATCH_CLASSIFIER_TIMEOUT_SECS", "10")?;

    let notify_webhook_url = optional("CHURNWATCH_NOTIFY_WEBHOOK_URL");
    let notify_timeout_secs = parse_positive_u64("CHURNWATCH_NOTIFY_TIMEOUT_SECS", "10")?;
    let frontend_url = or_default("CHURNWATCH_FRONTEND_URL", "http://localhost:3000");

    let stale_job_minutes = i64::try_from(parse_u64("CHURNWATCH_STALE_JOB_MINUTES", "30")?)
        .map_err(|e| invalid("CHURNWATCH_STALE_JOB_MINUTES", e.to_string()))?;

    let db_max_connections = parse_u32("CHURNWATCH_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("CHURNWATCH_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("CHURNWATCH_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        store,
        execution_mode,
        worker_concurrency,
        queue_capacity,
        max_results,
        source_timeout_secs,
        classifier,
        classifier_url,
        classifier_batch_size,
        classifier_timeout_secs,
        notify_webhook_url,
        notify_timeout_secs,
        frontend_url,
        stale_job_minutes,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

fn parse_store_backend(s: &str) -> Result<StoreBackend, String> {
    match s {
        "postgres" => Ok(StoreBackend::Postgres),
        "memory" => Ok(StoreBackend::Memory),
        other => Err(format!("expected 'postgres' or 'memory', got '{other}'")),
    }
}

fn parse_execution_mode(s: &str) -> Result<ExecutionMode, String> {
    match s {
        "inline" => Ok(ExecutionMode::Inline),
        "queued" => Ok(ExecutionMode::Queued),
        other => Err(format!("expected 'inline' or 'queued', got '{other}'")),
    }
}

fn parse_classifier_backend(s: &str) -> Result<ClassifierBackend, String> {
    match s {
        "lexicon" => Ok(ClassifierBackend::Lexicon),
        "http" => Ok(ClassifierBackend::Http),
        other => Err(format!("expected 'lexicon' or 'http', got '{other}'")),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
