//! jobfill - AI-guided browser autofill for job applications
//!
//! Main entry point for the jobfill CLI.

mod app;
mod cli;
mod cmd_run;
mod cmd_sessions;

use std::path::Path;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use jobfill_config::{Config, ConfigLoader, LoggingConfig, data_root};

use crate::cli::{Cli, Commands};
use crate::cmd_run::{resume_job, run_job};
use crate::cmd_sessions::{check_config, handle_sessions_command};

/// Initialize tracing with console and file output.
///
/// Log files rotate daily under `logging.dir` (default: `<data dir>/logs`),
/// keeping 30 days.
fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let log_dir = logging.dir.clone().unwrap_or_else(|| data_root().join("logs"));
    std::fs::create_dir_all(&log_dir).with_context(|| format!("creating log dir {}", log_dir.display()))?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("jobfill")
        .filename_suffix("log")
        .max_log_files(30)
        .build(&log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // The guard flushes the file writer when dropped; keep it for the process lifetime.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> = std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true).with_writer(std::io::stderr))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    ConfigLoader::load_or_default(path).with_context(|| format!("loading config {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    init_tracing(&config.logging)?;
    info!("jobfill v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Run {
            url,
            profile,
            job_id,
            platform,
            no_wait,
        } => run_job(&config, url, &profile, job_id, platform, no_wait).await,
        Commands::Resume { job_id, no_wait } => resume_job(&config, &job_id, no_wait).await,
        Commands::Sessions { action } => handle_sessions_command(&config, action).await,
        Commands::CheckConfig => check_config(&cli.config, &config),
    }
}
