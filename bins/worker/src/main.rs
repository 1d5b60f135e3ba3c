//! Autodocs retention worker.
//!
//! Usage:
//!   autodocs-worker                 - Run the retention jobs on their schedules
//!   autodocs-worker run-once <job>  - Run one job now and exit
//!                                     (`temp_cleanup` or `soft_delete_purge`)

use std::sync::Arc;

use anyhow::{Context, bail};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use autodocs_core::activity::ActivityLogger;
use autodocs_core::retention::{JobKind, RetentionConfig, RetentionScheduler, RunStatus};
use autodocs_core::storage::{CloudStorageAdapter, StorageConfig, StorageService};
use autodocs_db::{ActivityLogRepository, StorageObjectRepository, connect_with};
use autodocs_shared::{AppConfig, AppError, AppResult};

/// What the process was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Serve,
    RunOnce(JobKind),
}

fn parse_command(mut args: impl Iterator<Item = String>) -> anyhow::Result<Command> {
    match args.next().as_deref() {
        None => Ok(Command::Serve),
        Some("run-once") => {
            let name = args.next().context("run-once needs a job name")?;
            let job = JobKind::ALL
                .into_iter()
                .find(|job| job.as_str() == name)
                .with_context(|| format!("unknown job '{name}'"))?;
            Ok(Command::RunOnce(job))
        }
        Some(other) => bail!("unknown command '{other}'"),
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn,autodocs=info".into());
    let json = std::env::var("AUTODOCS_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

async fn run(command: Command) -> AppResult<()> {
    let config = AppConfig::load()?;
    let storage_config =
        StorageConfig::try_from(&config.storage).map_err(|e| AppError::Config(e.to_string()))?;
    let retention_config = RetentionConfig::try_from(&config.retention)
        .map_err(|e| AppError::Config(e.to_string()))?;

    // Connect to database
    let db = connect_with(&config.database)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    info!("Connected to database");

    // Create storage adapter
    let adapter =
        CloudStorageAdapter::new(storage_config).map_err(|e| AppError::Config(e.to_string()))?;
    adapter
        .initialize()
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;
    let storage: Arc<dyn StorageService> = Arc::new(adapter);

    let scheduler = RetentionScheduler::new(
        storage,
        Arc::new(StorageObjectRepository::new(db.clone())),
        ActivityLogger::new(Arc::new(ActivityLogRepository::new(db))),
        retention_config,
    );

    match command {
        Command::RunOnce(job) => {
            let report = scheduler
                .run_now(job)
                .await
                .ok_or_else(|| AppError::Internal(format!("{job} is already running")))?;
            if report.status == RunStatus::Failure {
                return Err(AppError::Internal(format!(
                    "{job} finished with {} failures{}",
                    report.failed,
                    report
                        .error
                        .map(|e| format!(": {e}"))
                        .unwrap_or_default()
                )));
            }
            Ok(())
        }
        Command::Serve => {
            let handle = scheduler.start(CancellationToken::new());
            info!(
                temp_cleanup = %scheduler.config().temp_schedule,
                soft_delete_purge = %scheduler.config().purge_schedule,
                "Retention scheduler started"
            );

            shutdown_signal().await;
            info!("Shutdown signal received");
            handle.shutdown().await;
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let command = parse_command(std::env::args().skip(1))?;
    init_tracing();

    if let Err(e) = run(command).await {
        error!(code = e.error_code(), error = %e, "Worker stopped");
        std::process::exit(e.exit_code());
    }
    Ok(())
}
