//! Batch orchestration
//!
//! A run walks a fixed sequence of states:
//!
//! ```text
//! Init -> DiffComputed -> Estimated -> AwaitingConfirmation -> Running -> Draining -> Done
//!              |                              |
//!              +-> NothingToDo                +-> Declined
//! ```
//!
//! 1. Load the master list and the resumability logs, diff them into the
//!    remaining work.
//! 2. Clamp the worker count, size the chunks and estimate the duration.
//! 3. Ask for confirmation.
//! 4. Spawn one [`ChunkWorker`] per chunk and poll the progress queue on a
//!    fixed interval until every worker has finished.
//! 5. Drain once more, then summarise. Availability counts are re-read from
//!    disk, the logs being the durable record of what happened.
//!
//! Only an unreadable master list or log stops a run with an error. Per-key
//! failures stay inside the workers.

pub mod confirm;
pub mod estimate;

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::task::JoinHandle;

use crate::config::BatchConfig;
use crate::error::Result;
use crate::keys::{self, Key};
use crate::progress::{render_progress, ProgressAggregator, ProgressReporter, ProgressSink};
use crate::remote::{RetrievalTier, SessionProvider};
use crate::storage::{read_key_list, read_key_list_if_exists, BucketFiles, LogKind, ResumabilityLog};
use crate::worker::{
    AvailabilityCheckTask, ChunkWorker, LogSet, RestoreRequestTask, WorkerReport, WorkerTask,
};

pub use confirm::{AutoConfirm, Confirmation};
pub use estimate::{format_duration, RunEstimate};

/// What a run does with each remaining key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    /// Ask for a restore of every key not yet requested or available
    RestoreRequest { retain_days: u32, tier: RetrievalTier },
    /// Check every key not yet known to be available
    AvailabilityCheck,
}

impl BatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchMode::RestoreRequest { .. } => "restore",
            BatchMode::AvailabilityCheck => "check",
        }
    }

    /// Remote calls one worker completes per second
    pub fn throughput_per_thread(&self, config: &BatchConfig) -> f64 {
        match self {
            BatchMode::RestoreRequest { .. } => config.restore_throughput_per_thread,
            BatchMode::AvailabilityCheck => config.check_throughput_per_thread,
        }
    }

    /// How often the progress line is refreshed
    pub fn poll_interval(&self, config: &BatchConfig) -> Duration {
        let ms = match self {
            BatchMode::RestoreRequest { .. } => config.restore_poll_interval_ms,
            BatchMode::AvailabilityCheck => config.check_poll_interval_ms,
        };
        Duration::from_millis(ms)
    }

    /// Task applied to every key
    pub fn task(&self, bucket: &str) -> Arc<dyn WorkerTask> {
        match *self {
            BatchMode::RestoreRequest { retain_days, tier } => {
                Arc::new(RestoreRequestTask::new(bucket, retain_days, tier))
            }
            BatchMode::AvailabilityCheck => Arc::new(AvailabilityCheckTask::new(bucket)),
        }
    }
}

impl fmt::Display for BatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Orchestrator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    DiffComputed,
    Estimated,
    AwaitingConfirmation,
    Running,
    Draining,
    Done,
    /// Remaining work was empty
    NothingToDo,
    /// Estimate was not confirmed
    Declined,
    /// Check mode found no master list
    MissingObjectList,
}

/// Keys removed from the work list by one log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipReport {
    /// `"requested"`, `"available"` or `"legacy available"`
    pub log: &'static str,
    pub path: PathBuf,
    pub skipped: usize,
}

impl fmt::Display for SkipReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.log {
            "requested" => write!(f, "Progress log found. Skipping {} entries", self.skipped),
            _ => write!(
                f,
                "Availability log found. Skipping {} entries (restore is complete on these files)",
                self.skipped
            ),
        }
    }
}

/// Master list minus every applicable log
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemainingWork {
    pub master_len: usize,
    pub skipped: Vec<SkipReport>,
    pub keys: Vec<Key>,
}

/// Result of [`run_batch`]
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// One report per worker that ran to completion, by worker id
    pub workers: Vec<WorkerReport>,
    pub elapsed: Duration,
    /// Workers that died; their unprocessed keys are picked up next run
    pub lost_workers: usize,
    /// Last progress line printed
    pub final_progress: Option<String>,
}

/// Per-outcome key counts summed over every worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeTotals {
    pub processed: usize,
    pub available: usize,
    pub requested: usize,
    pub pending: usize,
    pub not_found: usize,
    pub failed: usize,
    pub credential_refreshes: usize,
    pub aborted_workers: usize,
}

impl RunReport {
    pub fn totals(&self) -> OutcomeTotals {
        self.workers
            .iter()
            .fold(OutcomeTotals::default(), |mut totals, report| {
                totals.processed += report.processed;
                totals.available += report.available;
                totals.requested += report.requested;
                totals.pending += report.pending;
                totals.not_found += report.not_found;
                totals.failed += report.failed;
                totals.credential_refreshes += report.credential_refreshes;
                totals.aborted_workers += usize::from(report.aborted.is_some());
                totals
            })
    }
}

/// Master list keys found in the availability logs after a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AvailabilitySummary {
    pub total: usize,
    pub available: usize,
    pub pending: usize,
}

/// Everything a completed run reports
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub mode: BatchMode,
    pub estimate: RunEstimate,
    pub run: RunReport,
    /// Present in check mode
    pub availability: Option<AvailabilitySummary>,
}

impl BatchSummary {
    pub fn totals(&self) -> OutcomeTotals {
        self.run.totals()
    }
}

/// How a run ended
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Check mode without a master list; nothing was started
    MissingObjectList(PathBuf),
    NothingToDo(RemainingWork),
    Declined(RunEstimate),
    Completed(BatchSummary),
}

/// Drives one batch run for one bucket
pub struct BatchOrchestrator {
    bucket: String,
    config: BatchConfig,
    files: BucketFiles,
    sessions: Arc<dyn SessionProvider>,
    state: RunState,
    transitions: Vec<RunState>,
}

impl BatchOrchestrator {
    pub fn new(
        bucket: impl Into<String>,
        config: BatchConfig,
        files: BucketFiles,
        sessions: Arc<dyn SessionProvider>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            config,
            files,
            sessions,
            state: RunState::Init,
            transitions: vec![RunState::Init],
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Every state entered so far, in order
    pub fn transitions(&self) -> &[RunState] {
        &self.transitions
    }

    pub fn files(&self) -> &BucketFiles {
        &self.files
    }

    fn advance(&mut self, next: RunState) {
        tracing::debug!(from = ?self.state, to = ?next, "Run state change");
        self.state = next;
        self.transitions.push(next);
    }

    /// Load the master list and diff it against the logs that apply to `mode`
    ///
    /// Restore mode skips keys already requested or available. Check mode
    /// skips keys already available, including the legacy availability log;
    /// requested keys are exactly what it has to check.
    pub async fn compute_remaining_work(&self, mode: BatchMode) -> Result<RemainingWork> {
        let master = read_key_list(&self.files.objects).await?;
        let master_len = master.len();

        let sources: Vec<(&'static str, &PathBuf)> = match mode {
            BatchMode::RestoreRequest { .. } => vec![
                (LogKind::Requested.as_str(), &self.files.requested),
                (LogKind::Available.as_str(), &self.files.available),
            ],
            BatchMode::AvailabilityCheck => vec![
                (LogKind::Available.as_str(), &self.files.available),
                ("legacy available", &self.files.legacy_available),
            ],
        };

        let mut keys = master;
        let mut skipped = Vec::new();
        for (log, path) in sources {
            let excluded = read_key_list_if_exists(path).await?;
            if excluded.is_empty() {
                continue;
            }

            let before = keys.len();
            keys = keys::diff(keys, &excluded);
            let report = SkipReport {
                log,
                path: path.clone(),
                skipped: before - keys.len(),
            };
            tracing::info!(log = log, path = %path.display(), skipped = report.skipped, "{report}");
            skipped.push(report);
        }

        Ok(RemainingWork {
            master_len,
            skipped,
            keys,
        })
    }

    /// Run `mode` to completion
    pub async fn run(
        &mut self,
        mode: BatchMode,
        confirm: &dyn Confirmation,
        sink: &dyn ProgressSink,
    ) -> Result<RunOutcome> {
        let has_master = tokio::fs::try_exists(&self.files.objects)
            .await
            .unwrap_or(false);
        if mode == BatchMode::AvailabilityCheck && !has_master {
            tracing::warn!(
                path = %self.files.objects.display(),
                "Object list not found, run generate-object-list first"
            );
            self.advance(RunState::MissingObjectList);
            return Ok(RunOutcome::MissingObjectList(self.files.objects.clone()));
        }

        let work = self.compute_remaining_work(mode).await?;
        self.advance(RunState::DiffComputed);

        if work.keys.is_empty() {
            tracing::info!(bucket = %self.bucket, mode = %mode, "Nothing to do");
            self.advance(RunState::NothingToDo);
            return Ok(RunOutcome::NothingToDo(work));
        }

        let estimate = RunEstimate::compute(
            work.keys.len(),
            self.config.thread_count,
            mode.throughput_per_thread(&self.config),
        );
        tracing::info!(
            remaining = estimate.remaining,
            threads = estimate.thread_count,
            chunk_size = estimate.chunk_size,
            estimated = %estimate.formatted_duration(),
            "Run estimated"
        );
        self.advance(RunState::Estimated);

        self.advance(RunState::AwaitingConfirmation);
        if !confirm.confirm(&estimate) {
            self.advance(RunState::Declined);
            return Ok(RunOutcome::Declined(estimate));
        }

        self.advance(RunState::Running);
        let task = mode.task(&self.bucket);
        let logs = LogSet::new(
            ResumabilityLog::new(LogKind::Requested, &self.files.requested),
            ResumabilityLog::new(LogKind::Available, &self.files.available),
        );
        let sessions = Arc::clone(&self.sessions);

        let run = run_batch(
            work.keys,
            estimate.thread_count,
            mode.poll_interval(&self.config),
            sink,
            |_, chunk, reporter| {
                ChunkWorker::new(
                    chunk,
                    Arc::clone(&task),
                    Arc::clone(&sessions),
                    logs.clone(),
                    reporter,
                )
                .run()
            },
        )
        .await;
        self.advance(RunState::Draining);

        let availability = match mode {
            BatchMode::AvailabilityCheck => Some(self.availability_summary().await?),
            BatchMode::RestoreRequest { .. } => None,
        };

        let totals = run.totals();
        tracing::info!(
            elapsed_secs = run.elapsed.as_secs(),
            processed = totals.processed,
            available = totals.available,
            requested = totals.requested,
            failed = totals.failed,
            "Run finished"
        );
        self.advance(RunState::Done);

        Ok(RunOutcome::Completed(BatchSummary {
            mode,
            estimate,
            run,
            availability,
        }))
    }

    /// Re-read the master list and availability logs from disk
    pub async fn availability_summary(&self) -> Result<AvailabilitySummary> {
        let master = read_key_list(&self.files.objects).await?;
        let mut available: HashSet<Key> = read_key_list_if_exists(&self.files.available)
            .await?
            .into_iter()
            .collect();
        available.extend(read_key_list_if_exists(&self.files.legacy_available).await?);

        let restored = master.iter().filter(|key| available.contains(*key)).count();
        Ok(AvailabilitySummary {
            total: master.len(),
            available: restored,
            pending: master.len() - restored,
        })
    }
}

/// Run one worker per chunk of `keys` and report progress until all finish
///
/// `task_factory` receives the worker id, its chunk and its progress reporter
/// and returns the worker future. Completion is found by polling every
/// `poll_interval`; the merged progress line goes to `sink` on each poll and
/// once more after the last worker is done.
pub async fn run_batch<F, Fut>(
    keys: Vec<Key>,
    worker_count: usize,
    poll_interval: Duration,
    sink: &dyn ProgressSink,
    mut task_factory: F,
) -> RunReport
where
    F: FnMut(usize, Vec<Key>, ProgressReporter) -> Fut,
    Fut: Future<Output = WorkerReport> + Send + 'static,
{
    let started = Instant::now();
    let mut aggregator = ProgressAggregator::new();

    let handles: Vec<JoinHandle<WorkerReport>> = keys::chunk(keys, worker_count)
        .into_iter()
        .enumerate()
        .map(|(worker_id, chunk)| {
            tracing::debug!(worker_id, keys = chunk.len(), "Spawning worker");
            tokio::spawn(task_factory(worker_id, chunk, aggregator.reporter(worker_id)))
        })
        .collect();

    while handles.iter().any(|handle| !handle.is_finished()) {
        if let Some(line) = render_progress(&mut aggregator) {
            sink.on_progress(&line);
        }
        tokio::time::sleep(poll_interval).await;
    }

    let final_progress = render_progress(&mut aggregator);
    if let Some(line) = &final_progress {
        sink.on_progress(line);
    }

    let mut workers = Vec::with_capacity(handles.len());
    let mut lost_workers = 0;
    for (worker_id, result) in join_all(handles).await.into_iter().enumerate() {
        match result {
            Ok(report) => workers.push(report),
            Err(e) => {
                tracing::error!(worker_id, error = %e, "Worker died, its keys are left for the next run");
                lost_workers += 1;
            }
        }
    }

    RunReport {
        workers,
        elapsed: started.elapsed(),
        lost_workers,
        final_progress,
    }
}
