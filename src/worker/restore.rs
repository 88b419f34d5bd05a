//! Restore request task

use async_trait::async_trait;

use super::{KeyOutcome, WorkerTask};
use crate::remote::{ObjectStore, RemoteError, RestoreStatus, RetrievalTier};

/// Requests a temporary restore of every key in the chunk
#[derive(Debug, Clone)]
pub struct RestoreRequestTask {
    bucket: String,
    retain_days: u32,
    tier: RetrievalTier,
}

impl RestoreRequestTask {
    pub fn new(bucket: impl Into<String>, retain_days: u32, tier: RetrievalTier) -> Self {
        Self {
            bucket: bucket.into(),
            retain_days,
            tier,
        }
    }
}

#[async_trait]
impl WorkerTask for RestoreRequestTask {
    fn name(&self) -> &'static str {
        "restore"
    }

    async fn process_key(
        &self,
        store: &dyn ObjectStore,
        key: &str,
    ) -> Result<KeyOutcome, RemoteError> {
        match store
            .restore_object(&self.bucket, key, self.retain_days, self.tier)
            .await
        {
            Ok(RestoreStatus::AlreadyRestored) => Ok(KeyOutcome::Available),
            Ok(RestoreStatus::Accepted) => Ok(KeyOutcome::Requested),
            // Someone else already asked; same as accepted.
            Err(RemoteError::AlreadyInProgress) => Ok(KeyOutcome::Requested),
            Err(e) => Err(e),
        }
    }
}
