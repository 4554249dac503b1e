//! CLI Error Types

use intake_core::GraphViolation;
use intake_executor::{SubmissionError, TrackerError};
use intake_store::StoreError;
use thiserror::Error;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// File I/O error
    #[error("File I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Graph failed validation
    #[error("Validation failed: {0}")]
    Invalid(#[from] GraphViolation),

    /// Submission error
    #[error("{}", .0.user_message())]
    Submission(#[from] SubmissionError),

    /// Tracker error
    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),

    /// Storage error
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        CliError::ConfigError {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_arg(message: impl Into<String>) -> Self {
        CliError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Get exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::ConfigError { .. } => 1,
            CliError::InvalidArgument { .. } => 2,
            CliError::IoError(_) => 5,
            CliError::JsonError(_) => 6,
            CliError::Invalid(_) => 8,
            CliError::Submission(err) => match err {
                SubmissionError::Validation(_) => 8,
                SubmissionError::AuthorizationPending { .. } => 9,
                SubmissionError::DuplicateAttempt { .. } => 10,
                SubmissionError::TransientRemote { .. } | SubmissionError::Tracker(_) => 11,
                SubmissionError::UnresolvedReference { .. } | SubmissionError::Internal(_) => 12,
            },
            CliError::Tracker(_) => 13,
            CliError::Store(_) => 14,
        }
    }
}
