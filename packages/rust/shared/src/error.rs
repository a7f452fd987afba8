//! Error types for DeepResearch.
//!
//! Library crates use [`DeepResearchError`] via `thiserror`.
//! App crates (cli/tui) wrap this with `color-eyre` for rich diagnostics.

use std::fmt;
use std::path::PathBuf;

/// The external service an upstream failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Completion,
    Retrieval,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completion => write!(f, "completion"),
            Self::Retrieval => write!(f, "retrieval"),
        }
    }
}

/// Top-level error type for all DeepResearch operations.
#[derive(Debug, thiserror::Error)]
pub enum DeepResearchError {
    /// Configuration loading or credential resolution error. Fatal at startup.
    #[error("config error: {message}")]
    Config { message: String },

    /// Non-success status or malformed payload from an external service.
    #[error("{service} service error: {message}")]
    Upstream { service: Service, message: String },

    /// Rejected user input (e.g. an empty query).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DeepResearchError>;

impl DeepResearchError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a completion-service upstream error.
    pub fn completion(msg: impl Into<String>) -> Self {
        Self::Upstream {
            service: Service::Completion,
            message: msg.into(),
        }
    }

    /// Create a retrieval-service upstream error.
    pub fn retrieval(msg: impl Into<String>) -> Self {
        Self::Upstream {
            service: Service::Retrieval,
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Validation errors are shown to the user as warnings, not failures.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream { .. })
    }
}
