//! Append-only resumability logs
//!
//! A log records keys whose outcome is already confirmed. It is the only
//! source of truth for "already handled": whatever is in the file at run start
//! is skipped, whatever a worker appends stays there for the life of the file.
//!
//! One [`ResumabilityLog`] is shared by every worker in a run. Each append is a
//! single `write_all` of `key\n` on a file opened in append mode, under an
//! internal lock, so concurrent callers never interleave partial lines.
//!
//! A file left without a trailing newline (a run killed mid-write, a hand
//! edit) gets one before the first key of the next run, so that key starts on
//! its own line.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

use super::keylist::read_key_list_if_exists;
use crate::error::{Error, Result};
use crate::keys::Key;

/// Purpose of a resumability log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogKind {
    /// Restore accepted or already in progress
    Requested,
    /// Restore complete, object downloadable
    Available,
}

impl LogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::Requested => "requested",
            LogKind::Available => "available",
        }
    }

    /// File extension used for `<bucket>.<ext>`
    pub fn extension(&self) -> &'static str {
        match self {
            LogKind::Requested => "progress",
            LogKind::Available => "available",
        }
    }
}

/// Shared append-only key log backed by a newline-delimited file
#[derive(Debug)]
pub struct ResumabilityLog {
    kind: LogKind,
    path: PathBuf,
    // Opened on first append so runs that never write leave no empty file.
    file: Mutex<Option<File>>,
}

impl ResumabilityLog {
    pub fn new(kind: LogKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    pub fn kind(&self) -> LogKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keys currently persisted, empty when the file does not exist yet
    pub async fn load(&self) -> Result<Vec<Key>> {
        read_key_list_if_exists(&self.path).await
    }

    /// Append one key
    ///
    /// The lock is held only for the duration of this single write.
    pub async fn append(&self, key: &str) -> Result<()> {
        let mut line = Vec::with_capacity(key.len() + 1);
        line.extend_from_slice(key.as_bytes());
        line.push(b'\n');

        let mut guard = self.file.lock().await;
        if guard.is_none() {
            let unterminated = ends_without_newline(&self.path)
                .await
                .map_err(|source| self.log_error(source))?;
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await
                .map_err(|source| self.log_error(source))?;
            if unterminated {
                tracing::warn!(path = %self.path.display(), "Log ends mid-line, terminating it");
                file.write_all(b"\n")
                    .await
                    .map_err(|source| self.log_error(source))?;
            }
            *guard = Some(file);
        }

        if let Some(file) = guard.as_mut() {
            file.write_all(&line)
                .await
                .map_err(|source| self.log_error(source))?;
            file.flush().await.map_err(|source| self.log_error(source))?;
        }

        Ok(())
    }

    fn log_error(&self, source: std::io::Error) -> Error {
        Error::Log {
            path: self.path.clone(),
            source,
        }
    }
}

/// True when `path` exists, is non-empty and its last byte is not `\n`
async fn ends_without_newline(path: &Path) -> std::io::Result<bool> {
    let mut file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if file.metadata().await?.len() == 0 {
        return Ok(false);
    }

    file.seek(SeekFrom::End(-1)).await?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last).await?;
    Ok(last[0] != b'\n')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_append_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let log = ResumabilityLog::new(LogKind::Requested, temp_dir.path().join("b.progress"));

        assert!(log.load().await.unwrap().is_empty());
        assert!(!log.path().exists());

        log.append("2018/06/10/file.txt").await.unwrap();
        log.append("2018/06/11/file.txt").await.unwrap();

        assert_eq!(
            log.load().await.unwrap(),
            vec!["2018/06/10/file.txt", "2018/06/11/file.txt"]
        );
    }

    #[tokio::test]
    async fn test_append_keeps_existing_entries() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("b.available");
        std::fs::write(&path, "old\n").unwrap();

        let log = ResumabilityLog::new(LogKind::Available, &path);
        log.append("new").await.unwrap();

        assert_eq!(log.load().await.unwrap(), vec!["old", "new"]);
    }

    #[tokio::test]
    async fn test_append_after_unterminated_line() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("b.progress");
        std::fs::write(&path, "a\nb").unwrap();

        let log = ResumabilityLog::new(LogKind::Requested, &path);
        log.append("c").await.unwrap();
        log.append("d").await.unwrap();

        assert_eq!(log.load().await.unwrap(), vec!["a", "b", "c", "d"]);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\nb\nc\nd\n");
    }

    #[tokio::test]
    async fn test_append_to_empty_file_adds_no_blank_line() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("b.available");
        std::fs::write(&path, "").unwrap();

        let log = ResumabilityLog::new(LogKind::Available, &path);
        log.append("x").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "x\n");
    }

    #[tokio::test]
    async fn test_concurrent_appends_do_not_interleave() {
        let temp_dir = TempDir::new().unwrap();
        let log = Arc::new(ResumabilityLog::new(
            LogKind::Available,
            temp_dir.path().join("b.available"),
        ));

        let mut handles = Vec::new();
        for worker in 0..8 {
            let log = Arc::clone(&log);
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    log.append(&format!("worker-{worker}/object-{i}")).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let keys = log.load().await.unwrap();
        assert_eq!(keys.len(), 400);
        let unique: HashSet<_> = keys.iter().collect();
        assert_eq!(unique.len(), 400);
        assert!(keys.iter().all(|k| k.starts_with("worker-")));
    }

    #[test]
    fn test_log_kind_extensions() {
        assert_eq!(LogKind::Requested.extension(), "progress");
        assert_eq!(LogKind::Available.extension(), "available");
        assert_eq!(LogKind::Requested.as_str(), "requested");
    }
}
