//! Error types for the harness

use thiserror::Error;

/// Failure talking to the reservation service.
///
/// All variants are treated alike when reporting: a failed attempt is a
/// transport error, a failed baseline read degrades to a zero baseline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The request did not complete (connect failure, timeout, reset)
    #[error("Service unreachable: {0}")]
    UnreachableService(String),

    /// The response body did not decode into the expected shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// A snapshot read answered with something other than 200
    #[error("Unexpected status: {0}")]
    UnexpectedStatus(u16),
}

/// Errors that stop a run from being configured or executed
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The load profile cannot be scheduled
    #[error("Invalid load profile: {0}")]
    InvalidProfile(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ticketcheck_config::ConfigError),

    /// A worker task panicked or was cancelled
    #[error("Worker task failed: {0}")]
    Worker(String),
}

/// Result type alias for the harness
pub type Result<T> = std::result::Result<T, HarnessError>;

impl From<tokio::task::JoinError> for HarnessError {
    fn from(err: tokio::task::JoinError) -> Self {
        HarnessError::Worker(err.to_string())
    }
}
