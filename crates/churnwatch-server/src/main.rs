mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use churnwatch_analysis::{JobExecutor, JobOrchestrator};
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(churnwatch_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let store = churnwatch_db::open_store(&config).await?;

    let orchestrator = Arc::new(JobOrchestrator::from_config(&config, Arc::clone(&store))?);
    let executor = JobExecutor::from_mode(
        orchestrator,
        config.execution_mode,
        config.worker_concurrency,
        config.queue_capacity,
    );

    let _scheduler = scheduler::build_scheduler(store, Arc::clone(&config)).await?;

    let auth = AuthState::from_env(matches!(
        config.env,
        churnwatch_core::Environment::Development
    ))?;
    let app = build_app(AppState { executor }, auth, default_rate_limit_state());

    tracing::info!(
        addr = %config.bind_addr,
        env = %config.env,
        mode = ?config.execution_mode,
        "churnwatch server listening"
    );
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
