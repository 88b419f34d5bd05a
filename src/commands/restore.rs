use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use s3_thaw::config::Config;
use s3_thaw::error::Error;
use s3_thaw::orchestrator::{AutoConfirm, BatchMode, BatchOrchestrator, Confirmation};
use s3_thaw::remote::s3::S3SessionProvider;
use s3_thaw::storage::BucketFiles;

use super::{print_outcome, StdinConfirm, StdoutSink};

pub async fn request_objects_restore(
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
    let mode = BatchMode::RestoreRequest {
        retain_days: config.restore.retain_days,
        tier: config.restore.tier,
    };
    let confirm: &dyn Confirmation = if yes { &AutoConfirm } else { &StdinConfirm };

    let mut orchestrator =
        BatchOrchestrator::new(bucket, config.batch.clone(), files, Arc::new(sessions));
    let outcome = orchestrator
        .run(mode, confirm, &StdoutSink)
        .await
        .context("Restore request run failed")?;

    print_outcome(&outcome, "All objects already requested, nothing to do");
    Ok(())
}
