//! Error types for shield-client
//!
//! The taxonomy mirrors the lifecycle of one submitted batch:
//! - input and submission errors are fatal to the current attempt
//! - poll transport errors are transient and recovered by the tracker
//! - a service-reported failure is a terminal outcome for the task

use thiserror::Error;

use crate::types::TaskId;

/// Result type alias for shield-client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for shield-client
#[derive(Debug, Error)]
pub enum Error {
    /// Empty or disallowed file selection, rejected before any I/O
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The service (or the transport) rejected the batch at submission time
    ///
    /// Displays the server-provided detail verbatim so it can be shown to the user as-is.
    #[error("{message}")]
    SubmissionFailed {
        /// Human-readable reason, taken from the service's `detail` when present
        message: String,
    },

    /// A status query failed to complete (network or parse fault)
    #[error("status query failed: {0}")]
    PollTransport(String),

    /// The service reported a terminal failure for the task
    #[error("{message}")]
    ProcessingFailed {
        /// The task that failed
        task_id: TaskId,
        /// The service's failure message
        message: String,
    },

    /// Tracking was cancelled by the caller before a terminal state was reached
    #[error("tracking cancelled")]
    Cancelled,

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "SHIELD_API_PORT")
        key: Option<String>,
    },

    /// HTTP client error outside the submit/poll paths (client construction, health checks)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid service URL
    #[error("invalid service URL: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Returns true if the error is transient and the failed step may simply run again later
    ///
    /// Only transport-level faults qualify. Input, submission and processing failures are
    /// final for the current attempt; retrying them is a caller decision.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::PollTransport(_) => true,
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            Error::InvalidInput(_)
            | Error::SubmissionFailed { .. }
            | Error::ProcessingFailed { .. }
            | Error::Cancelled
            | Error::Config { .. }
            | Error::Serialization(_)
            | Error::Url(_) => false,
        }
    }

    /// Returns true if this error ends tracking of a task with a terminal outcome
    pub fn is_terminal(&self) -> bool {
        matches!(self, Error::ProcessingFailed { .. })
    }

    pub(crate) fn config(message: impl Into<String>, key: &str) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}
