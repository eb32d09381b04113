//! Shared setup for commands that run the navigation core.

use std::path::{Path, PathBuf};

use driveline::config::DrivelineConfig;
use driveline::logging::{init_logging, LoggingGuard};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::CliError;

/// Loaded configuration, installed logging and a runtime factory.
pub struct CliRunner {
    config: DrivelineConfig,
    config_path: Option<PathBuf>,
    _logging: LoggingGuard,
}

impl CliRunner {
    /// Load configuration (explicit path or the default location) and
    /// install logging from its `[logging]` section.
    pub fn new(config_path: Option<&Path>) -> Result<Self, CliError> {
        let config = load_config(config_path)?;
        let logging = init_logging(&config.logging)?;

        Ok(Self {
            config,
            config_path: config_path.map(Path::to_path_buf),
            _logging: logging,
        })
    }

    pub fn config(&self) -> &DrivelineConfig {
        &self.config
    }

    /// Log the command being run.
    pub fn log_startup(&self, command: &str) {
        info!(
            version = driveline::VERSION,
            command,
            config = ?self.config_path,
            "Driveline starting"
        );
    }

    /// Multi-threaded runtime for the session and its transports.
    pub fn runtime(&self) -> Result<tokio::runtime::Runtime, CliError> {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| CliError::RuntimeCreation(e.to_string()))
    }

    /// Cancel `token` on Ctrl-C.
    pub fn install_shutdown_handler(&self, token: &CancellationToken) -> Result<(), CliError> {
        let token = token.clone();
        ctrlc::set_handler(move || {
            eprintln!();
            eprintln!("Received shutdown signal, stopping session...");
            token.cancel();
        })
        .map_err(|e| CliError::Config(format!("Failed to set Ctrl-C handler: {}", e)))
    }
}

/// Load from `path` when given, else from the default location.
pub fn load_config(path: Option<&Path>) -> Result<DrivelineConfig, CliError> {
    let config = match path {
        Some(path) => DrivelineConfig::load_from(path)?,
        None => DrivelineConfig::load()?,
    };
    Ok(config)
}
