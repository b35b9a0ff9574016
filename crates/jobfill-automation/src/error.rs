//! Error types for the automation layer.

use jobfill_browser::{DriverError, PoolError};
use thiserror::Error;

/// Session persistence errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No session recorded for the job id.
    #[error("Session not found: {0}")]
    NotFound(String),

    /// A session record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for SessionError {
    fn from(e: serde_json::Error) -> Self {
        SessionError::Serialization(e.to_string())
    }
}

/// Notification delivery errors.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Webhook returned HTTP {status}")]
    Status { status: u16 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for NotifyError {
    fn from(e: serde_json::Error) -> Self {
        NotifyError::Serialization(e.to_string())
    }
}

/// Decision oracle errors.
#[derive(Debug, Error)]
pub enum OracleError {
    /// The response could not be parsed into a decision.
    #[error("Failed to parse AI response: {0}")]
    Malformed(String),

    #[error("Oracle request failed: {0}")]
    Http(String),

    #[error("Oracle returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Oracle timed out after {0}s")]
    Timeout(u64),

    #[error("Oracle is not configured: {0}")]
    NotConfigured(String),

    #[error("Operation not supported by this oracle: {0}")]
    Unsupported(String),
}

impl From<reqwest::Error> for OracleError {
    fn from(e: reqwest::Error) -> Self {
        OracleError::Http(e.to_string())
    }
}

/// Errors from submitting, resuming or cancelling jobs.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Job {0} is already running")]
    AlreadyRunning(String),

    /// No browser could be leased for the job.
    #[error("Browser unavailable: {0}")]
    Unavailable(#[from] PoolError),

    #[error("Job {0} is not paused")]
    NotPaused(String),

    #[error("Unknown job: {0}")]
    UnknownJob(String),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_display_matches_operator_text() {
        let err = OracleError::Malformed("expected value at line 1 column 1".into());
        assert_eq!(
            err.to_string(),
            "Failed to parse AI response: expected value at line 1 column 1"
        );
    }

    #[test]
    fn test_pool_error_becomes_unavailable() {
        let err: RunnerError = PoolError::Exhausted { max: 2 }.into();
        assert!(matches!(err, RunnerError::Unavailable(_)));
        assert_eq!(err.to_string(), "Browser unavailable: No browser slot available (2 in use)");
    }

    #[test]
    fn test_json_error_maps_to_serialization() {
        let bad = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(SessionError::from(bad), SessionError::Serialization(_)));
    }
}
