//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// Batch pass rate below target
    #[error("Pass rate {pass_rate:.1}% is below the {target:.1}% target")]
    BelowTarget {
        /// Achieved pass rate in percent
        pass_rate: f64,
        /// Required pass rate in percent
        target: f64,
    },

    /// Single render rejected
    #[error("{image}: re-render recommended (qa_total {qa_total:.3})")]
    Rejected {
        /// Image identifier
        image: String,
        /// Aggregate score
        qa_total: f64,
    },

    /// Logging setup error
    #[error("Logging setup failed: {message}")]
    Logging {
        /// Error message
        message: String,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// GhostQA library error
    #[error("{0}")]
    Qa(#[from] ghostqa::QaError),
}

impl CliError {
    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a logging setup error
    #[must_use]
    pub fn logging(message: impl Into<String>) -> Self {
        Self::Logging {
            message: message.into(),
        }
    }
}
