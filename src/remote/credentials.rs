//! Credential acquisition
//!
//! Looks in the environment (`AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`,
//! `AWS_SESSION_TOKEN`) when the default profile is requested, then in the
//! shared credentials file (`AWS_SHARED_CREDENTIALS_FILE`, falling back to
//! `~/.aws/credentials`). Every call re-reads its sources, so acquiring a new
//! session after expiry picks up rotated keys.

use std::fmt;
use std::path::{Path, PathBuf};

use super::RemoteError;

/// Profile name that also accepts environment credentials
pub const DEFAULT_PROFILE: &str = "default";

/// Access key pair plus optional session token
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    #[must_use]
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// Credentials from `AWS_*` environment variables, if both keys are set
    pub fn from_env() -> Option<Self> {
        let access_key_id = non_empty_env("AWS_ACCESS_KEY_ID")?;
        let secret_access_key = non_empty_env("AWS_SECRET_ACCESS_KEY")?;
        Some(Self {
            access_key_id,
            secret_access_key,
            session_token: non_empty_env("AWS_SESSION_TOKEN"),
        })
    }

    /// Credentials for `profile` from a shared credentials file
    pub async fn from_profile_file(
        path: &Path,
        profile: &str,
    ) -> Result<Option<Self>, RemoteError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(RemoteError::Credentials(format!(
                    "failed to read {}: {e}",
                    path.display()
                )))
            }
        };

        Ok(parse_profile(&content, profile))
    }

    /// Resolve credentials for `profile`
    pub async fn load(profile: &str) -> Result<Self, RemoteError> {
        if profile == DEFAULT_PROFILE {
            if let Some(credentials) = Self::from_env() {
                return Ok(credentials);
            }
        }

        let path = shared_credentials_path().ok_or_else(|| {
            RemoteError::Credentials("cannot locate shared credentials file".to_string())
        })?;

        Self::from_profile_file(&path, profile).await?.ok_or_else(|| {
            RemoteError::Credentials(format!(
                "profile '{profile}' not found in {}",
                path.display()
            ))
        })
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn shared_credentials_path() -> Option<PathBuf> {
    if let Some(path) = non_empty_env("AWS_SHARED_CREDENTIALS_FILE") {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".aws").join("credentials"))
}

fn parse_profile(content: &str, profile: &str) -> Option<Credentials> {
    let mut in_profile = false;
    let mut access_key_id = None;
    let mut secret_access_key = None;
    let mut session_token = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let section = section.trim();
            let name = section.strip_prefix("profile ").unwrap_or(section).trim();
            in_profile = name == profile;
            continue;
        }

        if !in_profile {
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().to_string();
            match key.trim() {
                "aws_access_key_id" => access_key_id = Some(value),
                "aws_secret_access_key" => secret_access_key = Some(value),
                "aws_session_token" => session_token = Some(value),
                _ => {}
            }
        }
    }

    Some(Credentials {
        access_key_id: access_key_id?,
        secret_access_key: secret_access_key?,
        session_token,
    })
}
