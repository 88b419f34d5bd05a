//! Common test utilities

use std::path::Path;
use std::sync::{Arc, Mutex};

use s3_thaw::config::BatchConfig;
use s3_thaw::keys::Key;
use s3_thaw::progress::ProgressSink;
use s3_thaw::remote::memory::{MemoryObjectStore, MemorySessionProvider};
use s3_thaw::storage::{write_key_list, BucketFiles};

pub const BUCKET: &str = "archive";

/// `n` keys shaped like dated object paths
pub fn make_keys(n: usize) -> Vec<Key> {
    (0..n).map(|i| format!("2018/06/{:02}/file-{i:04}.txt", i % 28 + 1)).collect()
}

/// Batch settings with short poll intervals
pub fn batch_config(threads: usize) -> BatchConfig {
    BatchConfig {
        thread_count: threads,
        restore_poll_interval_ms: 5,
        check_poll_interval_ms: 5,
        ..BatchConfig::default()
    }
}

/// A bucket of archived objects plus its master list on disk
pub struct TestBucket {
    pub files: BucketFiles,
    pub store: Arc<MemoryObjectStore>,
    pub sessions: Arc<MemorySessionProvider>,
}

impl TestBucket {
    pub async fn new(dir: &Path, master: &[Key]) -> Self {
        Self::with_store(dir, master, MemoryObjectStore::new(BUCKET)).await
    }

    pub async fn with_store(dir: &Path, master: &[Key], store: MemoryObjectStore) -> Self {
        let files = BucketFiles::new(dir, BUCKET);
        write_key_list(&files.objects, master).await.unwrap();

        let store = Arc::new(store);
        store.insert_archived(master.iter().cloned());
        let sessions = Arc::new(MemorySessionProvider::new(Arc::clone(&store)));

        Self {
            files,
            store,
            sessions,
        }
    }
}

/// Keeps every progress line
#[derive(Default)]
#[allow(dead_code)]
pub struct RecordingSink {
    pub lines: Mutex<Vec<String>>,
}

impl ProgressSink for RecordingSink {
    fn on_progress(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }
}
