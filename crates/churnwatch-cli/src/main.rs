mod analysis;

use churnwatch_analysis::JobOrchestrator;
use churnwatch_core::{AppConfig, StoreBackend};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "churnwatch")]
#[command(about = "churnwatch command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Run one analysis for a product in the foreground and print the result
    Analyze {
        /// Product name to analyze
        product: String,

        /// Print the finished job as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the state of an analysis job
    Status {
        job_id: i64,
    },
    /// Show the latest completed analysis for a product
    Dashboard {
        product: String,

        /// Print the dashboard as JSON
        #[arg(long)]
        json: bool,
    },
    /// Compare a job with the previous completed one and alert subscribers
    CheckSpike {
        job_id: i64,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("churnwatch: no command given; see --help");
        return Ok(());
    };

    let config = churnwatch_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match command {
        Commands::Db { command } => run_db(&config, command).await,
        Commands::Analyze { product, json } => {
            let orchestrator = build_orchestrator(&config).await?;
            analysis::run_analyze(&orchestrator, &product, json).await
        }
        Commands::Status { job_id } => {
            let orchestrator = build_orchestrator(&config).await?;
            analysis::run_status(&orchestrator, job_id).await
        }
        Commands::Dashboard { product, json } => {
            let orchestrator = build_orchestrator(&config).await?;
            analysis::run_dashboard(&orchestrator, &product, json).await
        }
        Commands::CheckSpike { job_id } => {
            let orchestrator = build_orchestrator(&config).await?;
            analysis::run_check_spike(&orchestrator, job_id).await
        }
    }
}

async fn build_orchestrator(config: &AppConfig) -> anyhow::Result<JobOrchestrator> {
    let store = churnwatch_db::open_store(config).await?;
    Ok(JobOrchestrator::from_config(config, store)?)
}

async fn run_db(config: &AppConfig, command: DbCommands) -> anyhow::Result<()> {
    if config.store != StoreBackend::Postgres {
        anyhow::bail!("db commands require CHURNWATCH_STORE=postgres");
    }
    let database_url = config
        .database_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is not set"))?;
    let pool =
        churnwatch_db::connect_pool(database_url, churnwatch_db::PoolConfig::from_app_config(config))
            .await?;

    match command {
        DbCommands::Ping => {
            churnwatch_db::ping(&pool).await?;
            println!("database ok");
        }
        DbCommands::Migrate => {
            let applied = churnwatch_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
    }

    pool.close().await;
    Ok(())
}
