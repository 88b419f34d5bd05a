use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use s3_thaw::config::Config;
use s3_thaw::error::Error;
use s3_thaw::orchestrator::{AutoConfirm, BatchMode, BatchOrchestrator, Confirmation};
use s3_thaw::remote::s3::S3SessionProvider;
use s3_thaw::storage::BucketFiles;

use super::{print_outcome, StdinConfirm, StdoutSink};

pub async fn check_objects_status(
    config: &Config,
    bucket: &str,
    object_list: Option<PathBuf>,
    yes: bool,
) -> Result<()> {
    let mut files = BucketFiles::new(&config.storage.work_dir, bucket);
    if let Some(path) = object_list {
        files = files.with_object_list(path);
    }

    let sessions = S3SessionProvider::new(&config.remote)
        .map_err(Error::from)
        .context("Failed to set up S3 client")?;
    let confirm: &dyn Confirmation = if yes { &AutoConfirm } else { &StdinConfirm };

    let mut orchestrator =
        BatchOrchestrator::new(bucket, config.batch.clone(), files, Arc::new(sessions));
    let outcome = orchestrator
        .run(BatchMode::AvailabilityCheck, confirm, &StdoutSink)
        .await
        .context("Status check run failed")?;

    print_outcome(&outcome, "All objects are already restored, nothing to do");
    Ok(())
}
