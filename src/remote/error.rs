//! Remote call failures
//!
//! Every remote call reports failures as a [`RemoteError`]. The batch workers
//! classify them per key: `NotFound` is skipped, `AlreadyInProgress` counts as
//! an accepted restore, `CredentialExpired` triggers a session refresh, and
//! everything else is reported and left for the next run.

use thiserror::Error;

/// Errors returned by object store calls
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Key absent from the bucket
    #[error("object not found")]
    NotFound,

    /// A restore for this key is already running
    #[error("restore already in progress")]
    AlreadyInProgress,

    /// Session credentials are no longer accepted
    #[error("credentials expired")]
    CredentialExpired,

    /// Any other service-reported failure
    #[error("service error {status} {code}: {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },

    /// Transport-level failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Credentials could not be acquired
    #[error("credentials unavailable: {0}")]
    Credentials(String),

    /// Response did not match the expected shape
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl RemoteError {
    /// Classify a service error code
    pub fn from_code(status: u16, code: &str, message: &str) -> Self {
        match code {
            "NoSuchKey" | "NotFound" => Self::NotFound,
            "RestoreAlreadyInProgress" => Self::AlreadyInProgress,
            "ExpiredToken" => Self::CredentialExpired,
            _ => Self::Service {
                status,
                code: code.to_string(),
                message: message.to_string(),
            },
        }
    }

    /// Whether repeating the same call may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Http(_) | Self::CredentialExpired => true,
            Self::Service { status, code, .. } => {
                *status >= 500 || *status == 429 || code == "SlowDown" || code == "RequestTimeout"
            }
            Self::NotFound
            | Self::AlreadyInProgress
            | Self::Credentials(_)
            | Self::InvalidResponse(_) => false,
        }
    }

    /// Short machine-friendly code, used in log fields
    pub fn code(&self) -> &str {
        match self {
            Self::NotFound => "NoSuchKey",
            Self::AlreadyInProgress => "RestoreAlreadyInProgress",
            Self::CredentialExpired => "ExpiredToken",
            Self::Service { code, .. } => code,
            Self::Http(_) => "Http",
            Self::Credentials(_) => "Credentials",
            Self::InvalidResponse(_) => "InvalidResponse",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_code_classification() {
        assert!(matches!(
            RemoteError::from_code(404, "NoSuchKey", ""),
            RemoteError::NotFound
        ));
        assert!(matches!(
            RemoteError::from_code(409, "RestoreAlreadyInProgress", ""),
            RemoteError::AlreadyInProgress
        ));
        assert!(matches!(
            RemoteError::from_code(400, "ExpiredToken", ""),
            RemoteError::CredentialExpired
        ));
        assert!(matches!(
            RemoteError::from_code(403, "AccessDenied", "denied"),
            RemoteError::Service { status: 403, .. }
        ));
    }

    #[test]
    fn test_is_recoverable() {
        assert!(RemoteError::from_code(503, "SlowDown", "").is_recoverable());
        assert!(RemoteError::from_code(500, "InternalError", "").is_recoverable());
        assert!(!RemoteError::from_code(403, "AccessDenied", "").is_recoverable());
        assert!(!RemoteError::NotFound.is_recoverable());
    }

    #[test]
    fn test_code() {
        assert_eq!(RemoteError::NotFound.code(), "NoSuchKey");
        assert_eq!(
            RemoteError::from_code(403, "AccessDenied", "").code(),
            "AccessDenied"
        );
    }
}
