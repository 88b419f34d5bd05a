//! On-disk state for a bucket
//!
//! Three plain-text files per bucket live in the working directory:
//!
//! - `<bucket>.objects` - master key list, produced by list generation
//! - `<bucket>.progress` - keys whose restore was requested
//! - `<bucket>.available` - keys whose restore is complete
//!
//! Both batch modes write availability to `<bucket>.available`. Older runs of
//! the status check wrote `bucket_<bucket>.available`; that file is still read
//! as an extra exclusion list when present, but never written.

pub mod keylist;
pub mod log;

use std::path::{Path, PathBuf};

pub use keylist::{read_key_list, read_key_list_if_exists, write_key_list};
pub use log::{LogKind, ResumabilityLog};

/// File locations for one bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketFiles {
    /// Master key list
    pub objects: PathBuf,

    /// Requested / in-progress log
    pub requested: PathBuf,

    /// Availability log
    pub available: PathBuf,

    /// Availability log name used by older status-check runs
    pub legacy_available: PathBuf,
}

impl BucketFiles {
    /// Default layout under `dir`
    pub fn new(dir: &Path, bucket: &str) -> Self {
        Self {
            objects: dir.join(format!("{bucket}.objects")),
            requested: dir.join(format!("{bucket}.{}", LogKind::Requested.extension())),
            available: dir.join(format!("{bucket}.{}", LogKind::Available.extension())),
            legacy_available: dir.join(format!("bucket_{bucket}.available")),
        }
    }

    /// Override the master list location
    #[must_use]
    pub fn with_object_list(mut self, path: impl Into<PathBuf>) -> Self {
        self.objects = path.into();
        self
    }
}
