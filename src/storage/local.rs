use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::io::ErrorKind;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::{validate_key, FileStorage, StorageError, StoredObject};

/// Writes objects below a root directory on the local disk.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl FileStorage for LocalStorage {
    fn backend(&self) -> &'static str {
        "local"
    }

    async fn put(&self, key: &str, bytes: &[u8], _content_type: &str) -> Result<StoredObject, StorageError> {
        validate_key(key)?;
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        // Existing objects are never replaced.
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => StorageError::AlreadyExists(key.to_string()),
                _ => StorageError::Io(e),
            })?;
        file.write_all(bytes).await?;
        file.flush().await?;
        tracing::debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(StoredObject::new(path.to_string_lossy().into_owned(), bytes))
    }

    async fn health(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }
}
