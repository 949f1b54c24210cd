//! File-backed local medium.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::error::MediumError;

use super::LocalMedium;

/// Local medium that keeps each key as one file under a data directory.
///
/// Suits desktop/kiosk clients where "client-resident storage" means the
/// local disk. Keys map to file names with path separators rejected, so a
/// key can never escape the directory.
pub struct FileMedium {
    dir: PathBuf,
}

impl FileMedium {
    /// Create a medium rooted at `dir`. The directory is created on first
    /// write, not here.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, MediumError> {
        if key.is_empty() || key.contains(['/', '\\']) || key == "." || key == ".." {
            return Err(MediumError(format!("invalid storage key: {key:?}")));
        }
        Ok(self.dir.join(key))
    }
}

fn io_err(context: &str, path: &Path, err: &std::io::Error) -> MediumError {
    MediumError(format!("{context} {}: {err}", path.display()))
}

#[async_trait]
impl LocalMedium for FileMedium {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, MediumError> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_err("read", &path, &err)),
        }
    }

    async fn write(&self, key: &str, value: Vec<u8>) -> Result<(), MediumError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|err| io_err("create dir", &self.dir, &err))?;
        fs::write(&path, value)
            .await
            .map_err(|err| io_err("write", &path, &err))
    }

    async fn remove(&self, key: &str) -> Result<(), MediumError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_err("remove", &path, &err)),
        }
    }

    async fn keys(&self) -> Result<Vec<String>, MediumError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(io_err("read dir", &self.dir, &err)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| io_err("read dir", &self.dir, &err))?
        {
            if let Ok(name) = entry.file_name().into_string() {
                keys.push(name);
            }
        }
        Ok(keys)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_absent_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let medium = FileMedium::new(dir.path());
        assert!(medium.read("cartsync.cart").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_read_remove_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let medium = FileMedium::new(dir.path());

        medium
            .write("cartsync.cart", b"blob".to_vec())
            .await
            .unwrap();
        assert_eq!(
            medium.read("cartsync.cart").await.unwrap(),
            Some(b"blob".to_vec())
        );

        medium.remove("cartsync.cart").await.unwrap();
        assert!(medium.read("cartsync.cart").await.unwrap().is_none());

        // Removing again is not an error.
        medium.remove("cartsync.cart").await.unwrap();
    }

    #[tokio::test]
    async fn test_keys_enumerates_files() {
        let dir = tempfile::tempdir().unwrap();
        let medium = FileMedium::new(dir.path());
        medium.write("a", vec![1]).await.unwrap();
        medium.write("b", vec![2]).await.unwrap();

        let mut keys = medium.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_path_traversal_keys_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let medium = FileMedium::new(dir.path());
        assert!(medium.write("../escape", vec![1]).await.is_err());
        assert!(medium.read("a/b").await.is_err());
    }
}
