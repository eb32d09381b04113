//! CLI error type.

use std::fmt;

use driveline::bridge::BridgeError;
use driveline::config::ConfigError;
use driveline::logging::LoggingError;
use driveline::routing::RouteError;
use driveline::session::trace::TraceError;

/// Errors surfaced to the user by a subcommand.
#[derive(Debug)]
pub enum CliError {
    /// Configuration could not be loaded, validated or saved.
    Config(String),

    /// A command-line argument could not be interpreted.
    InvalidArgument(String),

    /// Route request failed.
    Routing(RouteError),

    /// Trace or fixture file could not be used.
    Trace(String),

    /// Renderer bridge failure.
    Bridge(BridgeError),

    /// The tracking session task failed.
    Session(String),

    /// Logging could not be installed.
    Logging(LoggingError),

    /// Failed to create the Tokio runtime.
    RuntimeCreation(String),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgument(_) => 2,
            CliError::Routing(_) => 3,
            CliError::Bridge(_) => 4,
            _ => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CliError::Routing(e) => write!(f, "Routing failed: {}", e),
            CliError::Trace(msg) => write!(f, "Trace error: {}", msg),
            CliError::Bridge(e) => write!(f, "Renderer bridge error: {}", e),
            CliError::Session(msg) => write!(f, "Session failed: {}", msg),
            CliError::Logging(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::RuntimeCreation(msg) => {
                write!(f, "Failed to create Tokio runtime: {}", msg)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Routing(e) => Some(e),
            CliError::Bridge(e) => Some(e),
            CliError::Logging(e) => Some(e),
            CliError::Config(_)
            | CliError::InvalidArgument(_)
            | CliError::Trace(_)
            | CliError::Session(_)
            | CliError::RuntimeCreation(_) => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<RouteError> for CliError {
    fn from(e: RouteError) -> Self {
        CliError::Routing(e)
    }
}

impl From<TraceError> for CliError {
    fn from(e: TraceError) -> Self {
        CliError::Trace(e.to_string())
    }
}

impl From<BridgeError> for CliError {
    fn from(e: BridgeError) -> Self {
        CliError::Bridge(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}
