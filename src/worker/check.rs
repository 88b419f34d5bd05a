//! Availability check task

use async_trait::async_trait;

use super::{KeyOutcome, WorkerTask};
use crate::remote::{ObjectStore, RemoteError};

/// Checks whether the restore of every key in the chunk has finished
#[derive(Debug, Clone)]
pub struct AvailabilityCheckTask {
    bucket: String,
}

impl AvailabilityCheckTask {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl WorkerTask for AvailabilityCheckTask {
    fn name(&self) -> &'static str {
        "check"
    }

    async fn process_key(
        &self,
        store: &dyn ObjectStore,
        key: &str,
    ) -> Result<KeyOutcome, RemoteError> {
        let head = store.head_object(&self.bucket, key).await?;
        if head.is_restore_complete() {
            Ok(KeyOutcome::Available)
        } else {
            Ok(KeyOutcome::Pending)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::memory::{MemoryObjectStore, MemorySessionProvider, RestoreState};
    use crate::remote::SessionProvider;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_restore_states() {
        let store = Arc::new(MemoryObjectStore::new("archive"));
        store.insert_archived(["cold", "warming", "ready"]);
        store.set_restore_state("warming", RestoreState::InProgress);
        store.set_restore_state("ready", RestoreState::Restored);

        let session = MemorySessionProvider::new(Arc::clone(&store))
            .connect()
            .await
            .unwrap();
        let task = AvailabilityCheckTask::new("archive");

        let cold = task.process_key(session.as_ref(), "cold").await.unwrap();
        let warming = task.process_key(session.as_ref(), "warming").await.unwrap();
        let ready = task.process_key(session.as_ref(), "ready").await.unwrap();

        assert_eq!(cold, KeyOutcome::Pending);
        assert_eq!(warming, KeyOutcome::Pending);
        assert_eq!(ready, KeyOutcome::Available);
    }

    #[tokio::test]
    async fn test_missing_key_is_not_found() {
        let store = Arc::new(MemoryObjectStore::new("archive"));
        let session = MemorySessionProvider::new(Arc::clone(&store))
            .connect()
            .await
            .unwrap();

        let result = AvailabilityCheckTask::new("archive")
            .process_key(session.as_ref(), "gone")
            .await;
        assert!(matches!(result, Err(RemoteError::NotFound)));
    }
}
