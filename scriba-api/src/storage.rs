//! Blob storage for uploaded media
//!
//! Files live on the local filesystem under the configured root folder,
//! addressed by relative keys such as `projects/42/audio.mp3`. Keys are
//! validated so a crafted filename cannot escape the storage root.

use scriba_common::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Filesystem-backed blob store
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Write bytes under `key`, creating parent directories as needed
    pub async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(key, size = bytes.len(), "stored blob");
        Ok(())
    }

    /// Read the bytes stored under `key`
    pub async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("no blob stored under {}", key)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Map a storage key onto a path strictly inside the storage root
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let traversal = relative.components().any(|c| {
            !matches!(c, Component::Normal(_))
        });
        if key.is_empty() || traversal {
            return Err(Error::InvalidInput(format!("invalid storage key: {}", key)));
        }
        Ok(self.root.join(relative))
    }
}
