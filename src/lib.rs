//! s3-thaw - resumable bulk restore of archived S3 objects
//!
//! Requests restores of millions of `GLACIER` / `DEEP_ARCHIVE` objects and
//! polls for their completion, spread over many concurrent workers, picking up
//! where the previous run stopped.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`keys`] - Set difference and chunk partitioning of key lists
//! - [`storage`] - Master key list and append-only resumability logs
//! - [`progress`] - Per-worker progress samples merged into one readout
//! - [`worker`] - Per-chunk workers and the restore / check tasks
//! - [`orchestrator`] - Run state machine: diff, estimate, confirm, run, summarise
//! - [`listing`] - Master list generation from a bucket listing
//! - [`remote`] - Object store traits, S3 REST client, in-memory store
//! - [`config`] - Configuration management and settings
//! - [`error`] - Unified error type
//! - [`utils`] - Retry helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use s3_thaw::config::Config;
//! use s3_thaw::orchestrator::{AutoConfirm, BatchMode, BatchOrchestrator};
//! use s3_thaw::progress::NullSink;
//! use s3_thaw::remote::s3::S3SessionProvider;
//! use s3_thaw::storage::BucketFiles;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let sessions = Arc::new(S3SessionProvider::new(&config.remote)?);
//!     let files = BucketFiles::new(&config.storage.work_dir, "my-archive");
//!
//!     let mut orchestrator =
//!         BatchOrchestrator::new("my-archive", config.batch.clone(), files, sessions);
//!     orchestrator
//!         .run(BatchMode::AvailabilityCheck, &AutoConfirm, &NullSink)
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod keys;
pub mod listing;
pub mod orchestrator;
pub mod progress;
pub mod remote;
pub mod storage;
pub mod utils;
pub mod worker;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, Result, ThawErrorTrait};
    pub use crate::keys::{chunk, diff, remaining_work, Key};
    pub use crate::orchestrator::{
        run_batch, BatchMode, BatchOrchestrator, BatchSummary, RunOutcome, RunReport,
    };
    pub use crate::progress::{render_progress, ProgressAggregator, ProgressSink};
    pub use crate::remote::{ObjectStore, RemoteError, RetrievalTier, SessionProvider};
    pub use crate::storage::{BucketFiles, LogKind, ResumabilityLog};
}

pub use keys::Key;
