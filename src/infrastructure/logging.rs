use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::domain::{DomainError, LoggingConfig};

const LOG_FILE_PREFIX: &str = "syncstate";

fn default_directive(level: &str) -> String {
    format!("{}={},warn", LOG_FILE_PREFIX, level)
}

/// Initialize console logging and, if enabled, a daily rotating JSON log file.
///
/// Returns a guard that must be kept alive for the duration of the application.
/// When the guard is dropped, any remaining logs are flushed. Initializing twice
/// is not an error; the first subscriber stays installed.
pub fn init_logging(
    logs_dir: &Path,
    config: &LoggingConfig,
) -> Result<Option<WorkerGuard>, DomainError> {
    let level = config.level.as_str();

    // Environment filter with default from config
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level)));

    // Console layer (always enabled)
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::NONE)
        .with_filter(env_filter);

    if !config.file_logging {
        // Console only - use try_init to avoid panic if called twice
        let _ = tracing_subscriber::registry()
            .with(console_layer)
            .try_init();

        tracing::info!(level = level, "Logging initialized (console only)");
        return Ok(None);
    }

    // Ensure logs directory exists
    fs::create_dir_all(logs_dir)?;

    // Daily rotation, oldest files pruned beyond max_files
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(config.max_files.max(1) as usize)
        .build(logs_dir)
        .map_err(|e| DomainError::Config(format!("Failed to create log file appender: {}", e)))?;

    // Non-blocking writer for the file appender
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // File layer with JSON format
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .json()
        .with_span_events(FmtSpan::CLOSE)
        .with_filter(EnvFilter::new(format!("{}={}", LOG_FILE_PREFIX, level)));

    // Combine layers - use try_init to avoid panic if called twice
    if tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .is_ok()
    {
        tracing::info!(
            logs_dir = ?logs_dir,
            level = level,
            max_files = config.max_files,
            "Logging initialized with file output"
        );
    }

    Ok(Some(guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive("debug"), "syncstate=debug,warn");
    }

    #[test]
    fn test_file_logging_creates_logs_dir() {
        let dir = tempfile::tempdir().unwrap();
        let logs_dir = dir.path().join("logs");
        let config = LoggingConfig::default();

        let guard = init_logging(&logs_dir, &config).unwrap();

        assert!(guard.is_some());
        assert!(logs_dir.is_dir());
    }

    #[test]
    fn test_console_only_returns_no_guard() {
        let dir = tempfile::tempdir().unwrap();
        let logs_dir = dir.path().join("logs");
        let config = LoggingConfig {
            file_logging: false,
            ..LoggingConfig::default()
        };

        assert!(init_logging(&logs_dir, &config).unwrap().is_none());
        assert!(!logs_dir.exists());
    }
}
