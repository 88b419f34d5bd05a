//! Subcommand implementations and terminal plumbing

pub mod generate;
pub mod restore;
pub mod status;

use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};
use std::path::Path;

use s3_thaw::config::Config;
use s3_thaw::orchestrator::{BatchSummary, Confirmation, RunEstimate, RunOutcome};
use s3_thaw::progress::ProgressSink;

pub use generate::generate_object_list;
pub use restore::request_objects_restore;
pub use status::check_objects_status;

/// Config file if given, environment otherwise
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path),
        None => Config::from_env().context("Failed to load configuration from environment"),
    }
}

/// Ask a yes/no question on the terminal; anything but `y` is a no
pub fn ask(question: &str) -> Result<bool> {
    print!("{question}");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim() == "y")
}

/// Prints the estimate and waits for `y` on stdin
pub struct StdinConfirm;

impl Confirmation for StdinConfirm {
    fn confirm(&self, estimate: &RunEstimate) -> bool {
        println!("Will have to process {} files", estimate.remaining);
        println!(
            "{} threads, {} files per thread",
            estimate.thread_count, estimate.chunk_size
        );
        let question = format!(
            "This will take approximately {}\nContinue? (y/[n]): ",
            estimate.formatted_duration()
        );
        match ask(&question) {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read confirmation");
                false
            }
        }
    }
}

/// Prints progress lines to stdout
pub struct StdoutSink;

impl ProgressSink for StdoutSink {
    fn on_progress(&self, line: &str) {
        println!("{line}");
    }
}

/// Print how a batch run ended
pub fn print_outcome(outcome: &RunOutcome, nothing_to_do: &str) {
    match outcome {
        RunOutcome::MissingObjectList(path) => {
            println!("{} not found. Cancelling", path.display());
            println!("If you don't have an object list yet, run `generate-object-list` first");
        }
        RunOutcome::NothingToDo(_) => println!("{nothing_to_do}"),
        RunOutcome::Declined(_) => println!("Cancelled"),
        RunOutcome::Completed(summary) => print_summary(summary),
    }
}

fn print_summary(summary: &BatchSummary) {
    let totals = summary.totals();

    println!("Execution took {}s", summary.run.elapsed.as_secs());
    println!();
    println!("Processed: {}", totals.processed);
    println!("  Available:            {}", totals.available);
    println!("  Requested:            {}", totals.requested);
    println!("  Still restoring:      {}", totals.pending);
    println!("  Not found:            {}", totals.not_found);
    println!("  Failed:               {}", totals.failed);
    println!("  Credential refreshes: {}", totals.credential_refreshes);
    if summary.run.lost_workers > 0 || totals.aborted_workers > 0 {
        println!(
            "  Workers lost: {} (their keys will be retried on the next run)",
            summary.run.lost_workers + totals.aborted_workers
        );
    }

    if let Some(availability) = summary.availability {
        println!();
        println!(
            "{} files are restored and ready for download",
            availability.available
        );
        println!("{} files are still being restored", availability.pending);
    }
}
