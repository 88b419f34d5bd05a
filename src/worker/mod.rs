//! Per-chunk workers
//!
//! A [`ChunkWorker`] owns one contiguous chunk of keys and walks it
//! sequentially. For each key it asks its [`WorkerTask`] to make the remote
//! call, then records the outcome:
//!
//! | result | effect |
//! |---|---|
//! | `Ok(Available)` | key appended to the availability log |
//! | `Ok(Requested)` | key appended to the requested log |
//! | `Ok(Pending)` | nothing written, key is rechecked next run |
//! | `Err(NotFound)` | skipped, nothing written |
//! | `Err(CredentialExpired)` | session re-acquired, key left for next run |
//! | any other `Err` | reported, key left for next run |
//!
//! A progress sample follows every key, whatever its outcome. Nothing here is
//! fatal to the chunk.

pub mod check;
pub mod restore;

use std::sync::Arc;

use async_trait::async_trait;

use crate::keys::Key;
use crate::progress::ProgressReporter;
use crate::remote::{ObjectStore, RemoteError, SessionProvider};
use crate::storage::{LogKind, ResumabilityLog};

pub use check::AvailabilityCheckTask;
pub use restore::RestoreRequestTask;

/// Confirmed outcome for one key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Restore complete
    Available,
    /// Restore accepted or already running
    Requested,
    /// Restore not finished yet
    Pending,
}

/// The remote step applied to each key of a chunk
#[async_trait]
pub trait WorkerTask: Send + Sync {
    /// Short name used in log fields
    fn name(&self) -> &'static str;

    /// Make the remote call for `key` and classify a successful answer
    async fn process_key(&self, store: &dyn ObjectStore, key: &str)
        -> Result<KeyOutcome, RemoteError>;
}

/// Log handles shared by every worker of a run
#[derive(Debug, Clone)]
pub struct LogSet {
    pub requested: Arc<ResumabilityLog>,
    pub available: Arc<ResumabilityLog>,
}

impl LogSet {
    pub fn new(requested: ResumabilityLog, available: ResumabilityLog) -> Self {
        Self {
            requested: Arc::new(requested),
            available: Arc::new(available),
        }
    }

    fn for_outcome(&self, outcome: KeyOutcome) -> Option<&ResumabilityLog> {
        match outcome {
            KeyOutcome::Available => Some(&self.available),
            KeyOutcome::Requested => Some(&self.requested),
            KeyOutcome::Pending => None,
        }
    }
}

/// What one worker did with its chunk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub chunk_len: usize,
    pub processed: usize,
    pub available: usize,
    pub requested: usize,
    pub pending: usize,
    pub not_found: usize,
    pub failed: usize,
    pub credential_refreshes: usize,
    /// Set when the worker could not start at all
    pub aborted: Option<String>,
}

impl WorkerReport {
    fn new(worker_id: usize, chunk_len: usize) -> Self {
        Self {
            worker_id,
            chunk_len,
            ..Default::default()
        }
    }

    /// Keys whose outcome is now persisted
    pub fn logged(&self) -> usize {
        self.available + self.requested
    }
}

/// One worker bound to one chunk
pub struct ChunkWorker {
    keys: Vec<Key>,
    task: Arc<dyn WorkerTask>,
    sessions: Arc<dyn SessionProvider>,
    logs: LogSet,
    reporter: ProgressReporter,
}

impl ChunkWorker {
    pub fn new(
        keys: Vec<Key>,
        task: Arc<dyn WorkerTask>,
        sessions: Arc<dyn SessionProvider>,
        logs: LogSet,
        reporter: ProgressReporter,
    ) -> Self {
        Self {
            keys,
            task,
            sessions,
            logs,
            reporter,
        }
    }

    /// Process every key of the chunk in order
    pub async fn run(self) -> WorkerReport {
        let worker_id = self.reporter.worker_id();
        let total = self.keys.len();
        let mut report = WorkerReport::new(worker_id, total);

        let mut store = match self.sessions.connect().await {
            Ok(store) => store,
            Err(e) => {
                tracing::error!(worker_id, error = %e, "Failed to acquire session, chunk left for next run");
                report.aborted = Some(e.to_string());
                return report;
            }
        };

        tracing::debug!(worker_id, task = self.task.name(), keys = total, "Worker started");

        for (index, key) in self.keys.iter().enumerate() {
            match self.task.process_key(store.as_ref(), key).await {
                Ok(outcome) => self.record(key, outcome, &mut report).await,
                Err(RemoteError::NotFound) => {
                    tracing::info!(worker_id, key = %key, "Object not found, skipping");
                    report.not_found += 1;
                }
                Err(RemoteError::CredentialExpired) => {
                    tracing::warn!(worker_id, key = %key, "Credentials expired, refreshing session");
                    match self.sessions.connect().await {
                        Ok(fresh) => {
                            store = fresh;
                            report.credential_refreshes += 1;
                        }
                        Err(e) => {
                            tracing::error!(worker_id, error = %e, "Session refresh failed");
                        }
                    }
                    report.failed += 1;
                }
                Err(e) => {
                    tracing::warn!(worker_id, key = %key, code = e.code(), error = %e, "Remote call failed");
                    report.failed += 1;
                }
            }

            report.processed = index + 1;
            self.reporter.report(report.processed, total);
        }

        tracing::debug!(
            worker_id,
            available = report.available,
            requested = report.requested,
            failed = report.failed,
            "Worker finished"
        );

        report
    }

    async fn record(&self, key: &str, outcome: KeyOutcome, report: &mut WorkerReport) {
        let Some(log) = self.logs.for_outcome(outcome) else {
            report.pending += 1;
            return;
        };

        match log.append(key).await {
            Ok(()) => match log.kind() {
                LogKind::Available => report.available += 1,
                LogKind::Requested => report.requested += 1,
            },
            Err(e) => {
                tracing::error!(key = %key, log = log.kind().as_str(), error = %e, "Failed to append to log");
                report.failed += 1;
            }
        }
    }
}
