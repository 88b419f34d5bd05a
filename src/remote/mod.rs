//! Object store collaborator
//!
//! The batch engine talks to the remote store only through two traits:
//!
//! - [`ObjectStore`] - the three remote calls (restore, metadata check, list)
//! - [`SessionProvider`] - acquires a fresh, credentialed [`ObjectStore`]
//!
//! Workers hold a session and call [`SessionProvider::connect`] again when the
//! store answers with [`RemoteError::CredentialExpired`].
//!
//! Implementations:
//!
//! - [`s3::S3SessionProvider`] - S3 REST API over `reqwest`, SigV4 signed
//! - [`memory::MemorySessionProvider`] - in-memory store used by the unit and integration tests

pub mod credentials;
pub mod error;
pub mod memory;
pub mod s3;
pub mod sigv4;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use error::RemoteError;

/// Restore speed/cost class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RetrievalTier {
    #[default]
    Standard,
    Bulk,
    Expedited,
}

impl RetrievalTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalTier::Standard => "Standard",
            RetrievalTier::Bulk => "Bulk",
            RetrievalTier::Expedited => "Expedited",
        }
    }
}

impl fmt::Display for RetrievalTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetrievalTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(RetrievalTier::Standard),
            "bulk" => Ok(RetrievalTier::Bulk),
            "expedited" => Ok(RetrievalTier::Expedited),
            other => Err(format!(
                "unknown retrieval tier '{other}' (expected Standard, Bulk or Expedited)"
            )),
        }
    }
}

/// Storage class reported by object listings
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StorageClass {
    Standard,
    Glacier,
    DeepArchive,
    Other(String),
}

impl StorageClass {
    pub fn parse(s: &str) -> Self {
        match s {
            "STANDARD" => StorageClass::Standard,
            "GLACIER" => StorageClass::Glacier,
            "DEEP_ARCHIVE" => StorageClass::DeepArchive,
            other => StorageClass::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            StorageClass::Standard => "STANDARD",
            StorageClass::Glacier => "GLACIER",
            StorageClass::DeepArchive => "DEEP_ARCHIVE",
            StorageClass::Other(s) => s,
        }
    }

    /// Whether objects of this class need a restore before download
    pub fn is_archived(&self) -> bool {
        matches!(self, StorageClass::Glacier | StorageClass::DeepArchive)
    }
}

/// Accepted outcome of a restore call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreStatus {
    /// Object already has a restored copy (HTTP 200)
    AlreadyRestored,
    /// Restore job accepted (HTTP 202)
    Accepted,
}

/// Metadata returned by a head call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectHead {
    /// Raw `x-amz-restore` value, absent if no restore was ever requested
    pub restore: Option<String>,

    /// Storage class, when reported
    pub storage_class: Option<String>,
}

impl ObjectHead {
    /// `ongoing-request="false"` marks a finished restore
    pub fn is_restore_complete(&self) -> bool {
        self.restore
            .as_deref()
            .is_some_and(|r| r.contains("ongoing-request=\"false\""))
    }
}

/// One object in a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub storage_class: StorageClass,
}

/// One page of a bucket listing
#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    pub objects: Vec<ObjectSummary>,

    /// Token for the next page, `None` on the last page
    pub next_token: Option<String>,
}

/// Remote object store calls
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Request a temporary restore of an archived object
    async fn restore_object(
        &self,
        bucket: &str,
        key: &str,
        days: u32,
        tier: RetrievalTier,
    ) -> Result<RestoreStatus, RemoteError>;

    /// Fetch object metadata
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectHead, RemoteError>;

    /// List one page of objects
    async fn list_objects(
        &self,
        bucket: &str,
        continuation: Option<&str>,
    ) -> Result<ObjectPage, RemoteError>;
}

/// Shared handle to a connected store
pub type SharedObjectStore = Arc<dyn ObjectStore>;

/// Acquires credentialed sessions on demand
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Build a store with freshly acquired credentials
    async fn connect(&self) -> Result<SharedObjectStore, RemoteError>;
}
