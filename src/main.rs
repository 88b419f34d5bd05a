use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use s3_thaw::config::Config;
use s3_thaw::error::{Error, ThawErrorTrait};
use s3_thaw::remote::RetrievalTier;

mod commands;

#[derive(Parser)]
#[command(
    name = "s3-thaw",
    version,
    about = "Resumable bulk restore of archived S3 objects",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Bucket holding the archived objects
    #[arg(long)]
    bucket: String,

    /// Credentials profile (overrides AWS_PROFILE and the config file)
    #[arg(long)]
    aws_profile: Option<String>,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the object list and logs
    #[arg(long, global = true)]
    work_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the list of archived objects in the bucket
    GenerateObjectList {
        /// Output path (default: <bucket>.objects)
        #[arg(long)]
        output_object_list_path: Option<PathBuf>,

        /// Overwrite an existing list without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Request restoration of every listed object
    RequestObjectsRestore {
        /// How many days to keep restored copies
        #[arg(long)]
        retain_for: u32,

        /// Object list path (default: <bucket>.objects)
        #[arg(long)]
        object_list_path: Option<PathBuf>,

        /// Retrieval tier (Standard, Bulk, Expedited)
        #[arg(long)]
        retrieval_tier: Option<RetrievalTier>,

        /// Number of concurrent workers
        #[arg(long)]
        thread_count: Option<usize>,

        /// Start without confirming the estimate
        #[arg(short, long)]
        yes: bool,
    },

    /// Check which restores have completed
    CheckObjectsStatus {
        /// Object list path (default: <bucket>.objects)
        #[arg(long)]
        object_list_path: Option<PathBuf>,

        /// Number of concurrent workers
        #[arg(long)]
        thread_count: Option<usize>,

        /// Start without confirming the estimate
        #[arg(short, long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = commands::load_config(cli.config.as_deref())?;
    let log_format = cli.log_format.as_deref().unwrap_or(&config.logging.format);
    setup_tracing(log_format, &config.logging.level, cli.verbose)?;

    if let Some(profile) = cli.aws_profile {
        config.remote.profile = profile;
    }
    if let Some(work_dir) = cli.work_dir {
        config.storage.work_dir = work_dir;
    }

    let result = run_command(cli.command, &cli.bucket, config).await;
    if let Err(e) = &result {
        report_failure(e);
    }
    result
}

async fn run_command(command: Commands, bucket: &str, mut config: Config) -> Result<()> {
    match command {
        Commands::GenerateObjectList {
            output_object_list_path,
            yes,
        } => {
            println!("Command: Generate list of objects to restore from {bucket}");
            config.validate()?;
            commands::generate_object_list(&config, bucket, output_object_list_path, yes)
                .await?;
        }

        Commands::RequestObjectsRestore {
            retain_for,
            object_list_path,
            retrieval_tier,
            thread_count,
            yes,
        } => {
            println!("Command: Request restoration of objects");
            config.restore.retain_days = retain_for;
            if let Some(tier) = retrieval_tier {
                config.restore.tier = tier;
            }
            if let Some(threads) = thread_count {
                config.batch.thread_count = threads;
            }
            config.validate()?;

            tracing::info!(
                bucket = %bucket,
                retain_days = config.restore.retain_days,
                tier = %config.restore.tier,
                threads = config.batch.thread_count,
                "Starting restore request run"
            );
            commands::request_objects_restore(&config, bucket, object_list_path, yes).await?;
        }

        Commands::CheckObjectsStatus {
            object_list_path,
            thread_count,
            yes,
        } => {
            println!("Command: Check objects status to verify completeness");
            if let Some(threads) = thread_count {
                config.batch.thread_count = threads;
            }
            config.validate()?;

            tracing::info!(
                bucket = %bucket,
                threads = config.batch.thread_count,
                "Starting status check run"
            );
            commands::check_objects_status(&config, bucket, object_list_path, yes).await?;
        }
    }

    Ok(())
}

/// Classify a failed command so the user knows whether rerunning helps
fn report_failure(err: &anyhow::Error) {
    let Some(thaw) = err.chain().find_map(|e| e.downcast_ref::<Error>()) else {
        return;
    };

    tracing::error!(
        category = thaw.category().as_str(),
        recoverable = thaw.is_recoverable(),
        error = %thaw,
        "Command failed"
    );
    if thaw.is_recoverable() {
        eprintln!("This looks transient. Logs are intact; rerun the same command to resume.");
    }
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("s3_thaw=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_new(format!("s3_thaw={level},warn"))?
    };

    // Progress lines own stdout; logs go to stderr.
    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .compact()
                        .with_target(false)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
    }

    Ok(())
}
