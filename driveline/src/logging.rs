//! Tracing subscriber setup.
//!
//! Console output always; a daily-rolling file under the configured
//! directory when one is set. `RUST_LOG` overrides the configured level.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::LoggingSettings;

/// Log file name prefix inside the log directory.
pub const LOG_FILE_PREFIX: &str = "driveline.log";

/// Keeps the file writer flushing. Hold it until the process exits.
#[derive(Debug)]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Errors installing the subscriber.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {message}")]
    Filter { filter: String, message: String },

    #[error("Failed to create log directory {path}: {message}")]
    Directory { path: String, message: String },

    /// A global subscriber was already set.
    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}

fn env_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(default_level).map_err(|e| LoggingError::Filter {
        filter: default_level.to_string(),
        message: e.to_string(),
    })
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails on an unparseable level, an uncreatable log directory, or when a
/// subscriber is already installed.
pub fn init_logging(settings: &LoggingSettings) -> Result<LoggingGuard, LoggingError> {
    let filter = env_filter(&settings.level)?;

    let console = fmt::layer()
        .with_timer(LocalTime::rfc_3339())
        .with_target(false)
        .with_writer(std::io::stderr);

    let (file, guard) = match settings.directory.as_deref() {
        Some(dir) => {
            let (layer, guard) = file_layer(dir)?;
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(file)
        .with(filter)
        .with(console)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    Ok(LoggingGuard { _file: guard })
}

type BoxedLayer = Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync>;

fn file_layer(dir: &Path) -> Result<(BoxedLayer, WorkerGuard), LoggingError> {
    std::fs::create_dir_all(dir).map_err(|e| LoggingError::Directory {
        path: dir.display().to_string(),
        message: e.to_string(),
    })?;

    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = fmt::layer()
        .with_timer(LocalTime::rfc_3339())
        .with_ansi(false)
        .with_writer(writer)
        .boxed();

    Ok((layer, guard))
}
