//! Error types for steadfast-telemetry

use thiserror::Error;

/// Errors that can occur while delivering a report to the collector.
///
/// These never reach callers of the dispatcher; they are logged and counted.
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// Transport-level failure (connect, TLS, timeout)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Collector answered with a non-success status
    #[error("collector rejected report with status {status}")]
    Rejected { status: u16 },

    /// Collector URL could not be parsed or the client could not be built
    #[error("invalid collector configuration: {0}")]
    InvalidConfig(String),

    /// Sink refused the report without attempting transport
    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for TelemetryError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => TelemetryError::Rejected {
                status: status.as_u16(),
            },
            None => TelemetryError::Http(err.to_string()),
        }
    }
}

/// Result type for collector operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;
