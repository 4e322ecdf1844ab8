use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Environment variable that overrides the configured log filter
pub const LOG_ENV_VAR: &str = "TASKCLOCK_LOG";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to create log directory: {0}")]
    DirectoryError(#[from] std::io::Error),
    #[error("Invalid log filter: {0}")]
    FilterError(String),
    #[error("Failed to install tracing subscriber: {0}")]
    InitError(String),
}

/// Logs live next to the database, under `<data dir>/logs`
pub fn log_dir_for(data_dir: &Path) -> PathBuf {
    data_dir.join("logs")
}

/// Pick the filter directive: the environment wins over the configured level
fn filter_directive(env_value: Option<String>, configured: &str) -> String {
    env_value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| configured.to_string())
}

/// Initialize file logging with a daily rolling `taskclock.log`.
/// The terminal belongs to the TUI, so nothing is written to stdout or stderr.
/// Keep the returned guard alive for buffered log lines to be flushed.
pub fn init_logging(log_dir: &Path, configured_level: &str) -> Result<WorkerGuard, LoggingError> {
    std::fs::create_dir_all(log_dir)?;

    let directive = filter_directive(std::env::var(LOG_ENV_VAR).ok(), configured_level);
    let env_filter = EnvFilter::try_new(&directive).map_err(|e| LoggingError::FilterError(e.to_string()))?;

    let appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "taskclock.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false),
    );

    tracing::subscriber::set_global_default(subscriber).map_err(|e| LoggingError::InitError(e.to_string()))?;

    tracing::info!(log_dir = %log_dir.display(), filter = %directive, "logging initialized");

    Ok(guard)
}
