//! Unified error handling for the s3-thaw crate
//!
//! This module provides a unified error type that wraps the domain-specific
//! errors into a single `Error` enum, while keeping the detailed error
//! available to callers that need to classify it.
//!
//! # Architecture
//!
//! - [`ThawErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! Per-key remote failures never surface here during a batch: workers classify
//! them and move on. What does surface is whatever stops a run before workers
//! start (unreadable master list, unwritable logs, bad configuration) and list
//! generation failures. The binary uses [`ThawErrorTrait`] to tell the user
//! whether rerunning the same command is worthwhile.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub use crate::listing::ListGenerationError;
pub use crate::remote::RemoteError;

/// Common trait for all s3-thaw error types
pub trait ThawErrorTrait: std::error::Error {
    /// Check if this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Object store calls (HTTP, service errors, credentials)
    Remote,
    /// Key lists and resumability logs
    Storage,
    /// Configuration and validation errors
    Config,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Storage => "storage",
            Self::Config => "config",
        }
    }
}

/// Unified error type for the s3-thaw crate
#[derive(Error, Debug)]
pub enum Error {
    /// Object store errors
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Object list generation errors
    #[error("List generation error: {0}")]
    ListGeneration(#[from] ListGenerationError),

    /// Key list could not be read or written
    #[error("Key list error ({}): {source}", path.display())]
    KeyList {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Resumability log could not be appended
    #[error("Log error ({}): {source}", path.display())]
    Log {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),
}

impl ThawErrorTrait for ListGenerationError {
    fn is_recoverable(&self) -> bool {
        match self {
            ListGenerationError::Page { source, .. } => source.is_recoverable(),
            ListGenerationError::Write { .. } => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            ListGenerationError::Page { .. } => ErrorCategory::Remote,
            ListGenerationError::Write { .. } => ErrorCategory::Storage,
        }
    }
}

impl ThawErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Remote(e) => e.is_recoverable(),
            Self::ListGeneration(e) => e.is_recoverable(),
            Self::KeyList { .. } => false,
            Self::Log { .. } => true, // a full disk or a lock may clear up
            Self::Config(_) => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Remote(_) => ErrorCategory::Remote,
            Self::ListGeneration(e) => e.category(),
            Self::KeyList { .. } | Self::Log { .. } => ErrorCategory::Storage,
            Self::Config(_) => ErrorCategory::Config,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category() {
        let remote: Error = RemoteError::CredentialExpired.into();
        assert_eq!(remote.category(), ErrorCategory::Remote);

        let log = Error::Log {
            path: PathBuf::from("b.progress"),
            source: io::Error::new(io::ErrorKind::Other, "disk full"),
        };
        assert_eq!(log.category(), ErrorCategory::Storage);
    }

    #[test]
    fn test_is_recoverable() {
        let slow: Error = RemoteError::from_code(503, "SlowDown", "").into();
        assert!(slow.is_recoverable());

        let denied: Error = RemoteError::from_code(403, "AccessDenied", "").into();
        assert!(!denied.is_recoverable());
    }

    #[test]
    fn test_key_list_error_names_path() {
        let err = Error::KeyList {
            path: PathBuf::from("archive.objects"),
            source: io::Error::new(io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.to_string().contains("archive.objects"));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_list_generation_category() {
        let err: Error = ListGenerationError::Page {
            page: 3,
            source: RemoteError::from_code(500, "InternalError", ""),
        }
        .into();
        assert_eq!(err.category(), ErrorCategory::Remote);
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_config_error() {
        let err = Error::config("thread_count must be greater than 0");
        assert_eq!(err.category(), ErrorCategory::Config);
        assert_eq!(err.category().as_str(), "config");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_classified_through_context() {
        let err = anyhow::Error::new(Error::from(RemoteError::from_code(503, "SlowDown", "")))
            .context("Restore request run failed");
        let found = err
            .chain()
            .find_map(|e| e.downcast_ref::<Error>())
            .unwrap();
        assert_eq!(found.category(), ErrorCategory::Remote);
        assert!(found.is_recoverable());
    }

    #[test]
    fn test_log_error_is_recoverable() {
        let err = Error::Log {
            path: PathBuf::from("b.available"),
            source: io::Error::new(io::ErrorKind::Other, "no space left"),
        };
        assert!(err.is_recoverable());
        assert_eq!(err.category().as_str(), "storage");
    }
}
