use anyhow::{Context, Result};
use std::path::PathBuf;

use s3_thaw::config::Config;
use s3_thaw::error::Error;
use s3_thaw::listing::generate_and_save;
use s3_thaw::remote::s3::S3SessionProvider;
use s3_thaw::remote::SessionProvider;
use s3_thaw::storage::BucketFiles;
use s3_thaw::utils::RetryConfig;

use super::ask;

pub async fn generate_object_list(
    config: &Config,
    bucket: &str,
    output: Option<PathBuf>,
    yes: bool,
) -> Result<()> {
    let output = output.unwrap_or_else(|| BucketFiles::new(&config.storage.work_dir, bucket).objects);

    if tokio::fs::try_exists(&output).await.unwrap_or(false) && !yes {
        let question = format!(
            "File {} already exists and will be overwritten\nContinue? y/[n]: ",
            output.display()
        );
        if !ask(&question)? {
            return Ok(());
        }
    }

    let sessions = S3SessionProvider::new(&config.remote)
        .map_err(Error::from)
        .context("Failed to set up S3 client")?;
    let store = sessions
        .connect()
        .await
        .map_err(Error::from)
        .context("Failed to acquire S3 session")?;

    println!("Listing objects to file");
    let count = generate_and_save(store.as_ref(), bucket, &output, &RetryConfig::default())
        .await
        .map_err(Error::from)
        .context("Object list generation failed")?;

    println!(
        "Total count: {count} glacier/deep_archive objects saved to {}",
        output.display()
    );
    Ok(())
}
