//! Error types for the runner binary.
//!
//! Only startup can fail. Once the scheduler is running, feed and
//! delivery errors are logged by the core and never surface here.

use quakewatch_core::config::ConfigError;

/// Errors that abort startup.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The configuration file or an override is invalid.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// An HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// The log filter could not be parsed.
    #[error("logging setup error: {0}")]
    Logging(String),

    /// Waiting for the shutdown signal failed.
    #[error("signal error: {0}")]
    Signal(#[from] std::io::Error),
}
