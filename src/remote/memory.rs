//! In-memory object store
//!
//! Behaves like a bucket of archived objects: restores move through
//! not-requested, in-progress and restored; head calls expose the matching
//! `x-amz-restore` value; listings paginate. Faults can be injected per key,
//! credentials can be expired for every open session at once and individual
//! session acquisitions can be made to fail, which is what the worker tests
//! lean on.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;

use super::{
    ObjectHead, ObjectPage, ObjectStore, ObjectSummary, RemoteError, RestoreStatus,
    RetrievalTier, SessionProvider, SharedObjectStore, StorageClass,
};

/// Restore lifecycle of one object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreState {
    NotRequested,
    InProgress,
    Restored,
}

/// Failure injected for the next call on a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    ExpiredToken,
    Service { status: u16, code: String },
}

impl Fault {
    fn into_error(self) -> RemoteError {
        match self {
            Fault::ExpiredToken => RemoteError::CredentialExpired,
            Fault::Service { status, code } => {
                RemoteError::from_code(status, &code, "injected fault")
            }
        }
    }
}

#[derive(Debug, Clone)]
struct MemoryObject {
    storage_class: StorageClass,
    restore: RestoreState,
    restore_days: Option<u32>,
}

/// Shared in-memory bucket contents
#[derive(Debug)]
pub struct MemoryObjectStore {
    bucket: String,
    objects: RwLock<BTreeMap<String, MemoryObject>>,
    faults: RwLock<HashMap<String, VecDeque<Fault>>>,
    generation: AtomicU64,
    page_size: usize,
    instant_restore: bool,
    calls: AtomicU64,
}

impl MemoryObjectStore {
    /// Empty bucket
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: RwLock::new(BTreeMap::new()),
            faults: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
            page_size: 1000,
            instant_restore: false,
            calls: AtomicU64::new(0),
        }
    }

    /// Listing page size
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Restore requests complete immediately instead of staying in progress
    #[must_use]
    pub fn with_instant_restore(mut self) -> Self {
        self.instant_restore = true;
        self
    }

    /// Add an object with the given storage class
    pub fn insert(&self, key: impl Into<String>, storage_class: StorageClass) {
        let object = MemoryObject {
            storage_class,
            restore: RestoreState::NotRequested,
            restore_days: None,
        };
        if let Ok(mut objects) = self.objects.write() {
            objects.insert(key.into(), object);
        }
    }

    /// Add archived objects in bulk
    pub fn insert_archived<I, K>(&self, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        for key in keys {
            self.insert(key, StorageClass::Glacier);
        }
    }

    /// Force the restore state of an existing key
    pub fn set_restore_state(&self, key: &str, state: RestoreState) {
        if let Ok(mut objects) = self.objects.write() {
            if let Some(object) = objects.get_mut(key) {
                object.restore = state;
            }
        }
    }

    pub fn restore_state(&self, key: &str) -> Option<RestoreState> {
        self.objects
            .read()
            .ok()
            .and_then(|objects| objects.get(key).map(|o| o.restore))
    }

    /// Days requested by the last accepted restore of `key`
    pub fn restore_days(&self, key: &str) -> Option<u32> {
        self.objects
            .read()
            .ok()
            .and_then(|objects| objects.get(key).and_then(|o| o.restore_days))
    }

    /// Finish every in-progress restore
    pub fn complete_restores(&self) {
        if let Ok(mut objects) = self.objects.write() {
            for object in objects.values_mut() {
                if object.restore == RestoreState::InProgress {
                    object.restore = RestoreState::Restored;
                }
            }
        }
    }

    /// Queue a one-shot failure for the next call touching `key`
    pub fn inject_fault(&self, key: impl Into<String>, fault: Fault) {
        if let Ok(mut faults) = self.faults.write() {
            faults.entry(key.into()).or_default().push_back(fault);
        }
    }

    /// Invalidate every session connected so far
    pub fn expire_credentials(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Total remote calls served, across all sessions
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    fn take_fault(&self, key: &str) -> Option<Fault> {
        let mut faults = self.faults.write().ok()?;
        let queue = faults.get_mut(key)?;
        let fault = queue.pop_front();
        if queue.is_empty() {
            faults.remove(key);
        }
        fault
    }

    fn check_bucket(&self, bucket: &str) -> Result<(), RemoteError> {
        if bucket == self.bucket {
            Ok(())
        } else {
            Err(RemoteError::from_code(404, "NoSuchBucket", bucket))
        }
    }

    fn poisoned() -> RemoteError {
        RemoteError::InvalidResponse("memory store lock poisoned".to_string())
    }
}

/// One credentialed view onto a [`MemoryObjectStore`]
#[derive(Debug)]
pub struct MemorySession {
    store: Arc<MemoryObjectStore>,
    generation: u64,
}

impl MemorySession {
    fn begin(&self, bucket: &str, key: Option<&str>) -> Result<(), RemoteError> {
        self.store.calls.fetch_add(1, Ordering::Relaxed);
        if self.generation < self.store.generation.load(Ordering::SeqCst) {
            return Err(RemoteError::CredentialExpired);
        }
        self.store.check_bucket(bucket)?;
        if let Some(fault) = key.and_then(|k| self.store.take_fault(k)) {
            return Err(fault.into_error());
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemorySession {
    async fn restore_object(
        &self,
        bucket: &str,
        key: &str,
        days: u32,
        _tier: RetrievalTier,
    ) -> Result<RestoreStatus, RemoteError> {
        self.begin(bucket, Some(key))?;

        let mut objects = self
            .store
            .objects
            .write()
            .map_err(|_| MemoryObjectStore::poisoned())?;
        let object = objects.get_mut(key).ok_or(RemoteError::NotFound)?;

        match object.restore {
            RestoreState::Restored => Ok(RestoreStatus::AlreadyRestored),
            RestoreState::InProgress => Err(RemoteError::AlreadyInProgress),
            RestoreState::NotRequested => {
                object.restore_days = Some(days);
                object.restore = if self.store.instant_restore {
                    RestoreState::Restored
                } else {
                    RestoreState::InProgress
                };
                Ok(RestoreStatus::Accepted)
            }
        }
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectHead, RemoteError> {
        self.begin(bucket, Some(key))?;

        let objects = self
            .store
            .objects
            .read()
            .map_err(|_| MemoryObjectStore::poisoned())?;
        let object = objects.get(key).ok_or(RemoteError::NotFound)?;

        let restore = match object.restore {
            RestoreState::NotRequested => None,
            RestoreState::InProgress => Some("ongoing-request=\"true\"".to_string()),
            RestoreState::Restored => Some(
                "ongoing-request=\"false\", expiry-date=\"Fri, 21 Dec 2012 00:00:00 GMT\""
                    .to_string(),
            ),
        };

        Ok(ObjectHead {
            restore,
            storage_class: Some(object.storage_class.as_str().to_string()),
        })
    }

    async fn list_objects(
        &self,
        bucket: &str,
        continuation: Option<&str>,
    ) -> Result<ObjectPage, RemoteError> {
        self.begin(bucket, None)?;

        let start = match continuation {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| RemoteError::InvalidResponse(format!("bad token {token}")))?,
            None => 0,
        };

        let objects = self
            .store
            .objects
            .read()
            .map_err(|_| MemoryObjectStore::poisoned())?;
        let page: Vec<ObjectSummary> = objects
            .iter()
            .skip(start)
            .take(self.store.page_size)
            .map(|(key, object)| ObjectSummary {
                key: key.clone(),
                storage_class: object.storage_class.clone(),
            })
            .collect();

        let end = start + page.len();
        let next_token = (end < objects.len()).then(|| end.to_string());

        Ok(ObjectPage {
            objects: page,
            next_token,
        })
    }
}

/// Hands out sessions bound to the store's current credential generation
#[derive(Debug)]
pub struct MemorySessionProvider {
    store: Arc<MemoryObjectStore>,
    connects: AtomicU64,
    failing_attempts: Mutex<HashSet<u64>>,
}

impl MemorySessionProvider {
    pub fn new(store: Arc<MemoryObjectStore>) -> Self {
        Self {
            store,
            connects: AtomicU64::new(0),
            failing_attempts: Mutex::new(HashSet::new()),
        }
    }

    /// Connection attempts made so far, failed ones included
    pub fn connects(&self) -> u64 {
        self.connects.load(Ordering::Relaxed)
    }

    /// Make the `attempt`-th call to `connect` (1-based) fail
    pub fn fail_connect(&self, attempt: u64) {
        if let Ok(mut attempts) = self.failing_attempts.lock() {
            attempts.insert(attempt);
        }
    }
}

#[async_trait]
impl SessionProvider for MemorySessionProvider {
    async fn connect(&self) -> Result<SharedObjectStore, RemoteError> {
        let attempt = self.connects.fetch_add(1, Ordering::SeqCst) + 1;
        let fails = self
            .failing_attempts
            .lock()
            .map(|attempts| attempts.contains(&attempt))
            .unwrap_or(false);
        if fails {
            return Err(RemoteError::Credentials(format!(
                "connection attempt {attempt} refused"
            )));
        }

        Ok(Arc::new(MemorySession {
            store: Arc::clone(&self.store),
            generation: self.store.generation.load(Ordering::SeqCst),
        }))
    }
}
