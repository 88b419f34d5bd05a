//! Newline-delimited key list files
//!
//! One key per line, no escaping. Used for the master object list and for
//! reading the resumability logs back at run start.

use std::io;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};
use crate::keys::Key;

/// Read a key list, in file order
///
/// Blank lines are skipped and a trailing `\r` is stripped, so lists edited on
/// Windows still diff cleanly against logs written here.
pub async fn read_key_list(path: &Path) -> Result<Vec<Key>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| Error::KeyList {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(parse_key_list(&content))
}

/// Like [`read_key_list`], but a missing file is an empty list
pub async fn read_key_list_if_exists(path: &Path) -> Result<Vec<Key>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(parse_key_list(&content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(source) => Err(Error::KeyList {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Write a key list atomically (temp file, then rename)
pub async fn write_key_list(path: &Path, keys: &[Key]) -> Result<()> {
    let temp_path = temp_path_for(path);

    let write = async {
        let mut file = tokio::fs::File::create(&temp_path).await?;
        let mut buffer = Vec::with_capacity(64 * 1024);
        for key in keys {
            buffer.extend_from_slice(key.as_bytes());
            buffer.push(b'\n');
            if buffer.len() >= 64 * 1024 {
                file.write_all(&buffer).await?;
                buffer.clear();
            }
        }
        file.write_all(&buffer).await?;
        file.sync_all().await?;
        tokio::fs::rename(&temp_path, path).await
    };

    write.await.map_err(|source| Error::KeyList {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!(path = %path.display(), count = keys.len(), "Key list written");
    Ok(())
}

fn parse_key_list(content: &str) -> Vec<Key> {
    content
        .lines()
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_then_read_preserves_order() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bucket.objects");
        let keys = vec![
            "2018/06/10/file.txt".to_string(),
            "a b c.bin".to_string(),
            "2018/06/10/file.txt".to_string(),
        ];

        write_key_list(&path, &keys).await.unwrap();
        assert_eq!(read_key_list(&path).await.unwrap(), keys);
        assert!(!temp_dir.path().join("bucket.objects.tmp").exists());
    }

    #[tokio::test]
    async fn test_read_missing_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let err = read_key_list(&temp_dir.path().join("nope.objects"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::KeyList { .. }));
    }

    #[tokio::test]
    async fn test_read_if_exists_missing_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let keys = read_key_list_if_exists(&temp_dir.path().join("nope.progress"))
            .await
            .unwrap();
        assert!(keys.is_empty());
    }

    #[test]
    fn test_parse_skips_blank_lines_and_carriage_returns() {
        let keys = parse_key_list("a\r\n\nb\nc");
        assert_eq!(keys, vec!["a", "b", "c"]);
    }
}
