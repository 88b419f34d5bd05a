//! Object list generation
//!
//! Pages through the whole bucket and keeps the keys stored in an archival
//! class (`GLACIER`, `DEEP_ARCHIVE`). The result becomes `<bucket>.objects`,
//! the master list every batch run diffs against.
//!
//! A page that still fails after the retry budget aborts the crawl: a
//! truncated master list would silently leave objects archived, so nothing is
//! written unless the listing completed.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::keys::Key;
use crate::remote::{ObjectStore, RemoteError};
use crate::storage::write_key_list;
use crate::utils::retry::{with_retry_if, RetryConfig};

/// Matches between progress events
pub const PROGRESS_EVERY: usize = 1000;

/// Failures that abort list generation
#[derive(Error, Debug)]
pub enum ListGenerationError {
    /// A listing page could not be fetched
    #[error("Listing page {page} failed: {source}")]
    Page {
        page: usize,
        #[source]
        source: RemoteError,
    },

    /// The finished list could not be saved
    #[error("Failed to write object list {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: Box<crate::error::Error>,
    },
}

/// Keys of every archived object in `bucket`, in listing order
pub async fn generate_object_list(
    store: &dyn ObjectStore,
    bucket: &str,
    retry: &RetryConfig,
) -> Result<Vec<Key>, ListGenerationError> {
    let mut keys = Vec::new();
    let mut token: Option<String> = None;
    let mut page = 0;
    let mut next_event = PROGRESS_EVERY;

    loop {
        let continuation = token.as_deref();
        let listing = with_retry_if(
            retry,
            || store.list_objects(bucket, continuation),
            RemoteError::is_recoverable,
        )
        .await
        .map_err(|source| ListGenerationError::Page { page, source })?;

        let scanned = listing.objects.len();
        keys.extend(
            listing
                .objects
                .into_iter()
                .filter(|object| object.storage_class.is_archived())
                .map(|object| object.key),
        );

        while keys.len() >= next_event {
            tracing::info!(bucket, found = next_event, "Archived objects found so far");
            next_event += PROGRESS_EVERY;
        }

        tracing::debug!(bucket, page, scanned, total = keys.len(), "Listing page done");
        page += 1;

        match listing.next_token {
            Some(next) => token = Some(next),
            None => break,
        }
    }

    tracing::info!(bucket, pages = page, archived = keys.len(), "Listing complete");
    Ok(keys)
}

/// Generate the list and save it to `path`; returns the number of keys written
pub async fn generate_and_save(
    store: &dyn ObjectStore,
    bucket: &str,
    path: &Path,
    retry: &RetryConfig,
) -> Result<usize, ListGenerationError> {
    let keys = generate_object_list(store, bucket, retry).await?;

    write_key_list(path, &keys)
        .await
        .map_err(|e| ListGenerationError::Write {
            path: path.to_path_buf(),
            source: Box::new(e),
        })?;

    Ok(keys.len())
}
