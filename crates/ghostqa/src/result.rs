//! Result and error types for GhostQA.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result type for GhostQA operations
pub type QaResult<T> = Result<T, QaError>;

/// Errors that can occur in GhostQA
#[derive(Debug, Error)]
pub enum QaError {
    /// Malformed input value (hex color, JSON document, mask shape)
    #[error("Invalid format: {message}")]
    InvalidFormat {
        /// Error message
        message: String,
    },

    /// An input file is missing or unreadable
    #[error("Missing resource {}: {message}", path.display())]
    MissingResource {
        /// Path that could not be read
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Image could not be decoded
    #[error("Image decode failed for {}: {message}", path.display())]
    ImageDecode {
        /// Path of the image
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Threshold configuration is corrupt or inconsistent
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl QaError {
    /// Create an invalid format error
    #[must_use]
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Create a missing resource error
    #[must_use]
    pub fn missing_resource(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::MissingResource {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Classify the error for batch reports
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidFormat { .. } | Self::Json(_) | Self::Yaml(_) => ErrorKind::InvalidFormat,
            Self::MissingResource { .. } | Self::ImageDecode { .. } | Self::Io(_) => {
                ErrorKind::MissingResource
            }
            Self::Config { .. } => ErrorKind::Internal,
        }
    }
}

/// Error classification carried by error items in a batch report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed hex color or Facts document
    InvalidFormat,
    /// Image or Facts file missing, unreadable or undecodable
    MissingResource,
    /// Unexpected failure inside validation
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidFormat => write!(f, "invalid_format"),
            Self::MissingResource => write!(f, "missing_resource"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
