//! File storage backends for uploaded recordings.

pub mod gcs;
pub mod local;

use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Component, Path};
use std::sync::Arc;
use thiserror::Error;

use crate::config::{StorageConfig, StorageKind};

pub use gcs::GcsStorage;
pub use local::LocalStorage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid storage key '{0}'")]
    InvalidKey(String),

    #[error("object '{0}' already exists")]
    AlreadyExists(String),

    #[error("storage upstream error: {0}")]
    Upstream(String),

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where an uploaded object ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredObject {
    pub path: String,
    pub size: u64,
    pub sha256: String,
}

impl StoredObject {
    pub fn new(path: String, bytes: &[u8]) -> Self {
        Self {
            path,
            size: bytes.len() as u64,
            sha256: sha256_hex(bytes),
        }
    }
}

/// Storage backend trait
#[async_trait]
pub trait FileStorage: Send + Sync {
    fn backend(&self) -> &'static str;

    /// Store `bytes` under the relative `key`.
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<StoredObject, StorageError>;

    async fn health(&self) -> Result<(), StorageError>;
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Keys are relative, slash separated and may not escape their root.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let path = Path::new(key);
    let valid = !key.is_empty()
        && !key.contains('\\')
        && path.components().all(|c| matches!(c, Component::Normal(_)));
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

/// Build the backend selected by `STORAGE_TYPE`.
pub fn from_config(config: &StorageConfig) -> Result<Arc<dyn FileStorage>, StorageError> {
    match config.kind {
        StorageKind::Local => Ok(Arc::new(LocalStorage::new(&config.local_root))),
        StorageKind::Gcs => {
            let bucket = config
                .gcs_bucket
                .clone()
                .ok_or_else(|| StorageError::Upstream("GCS_BUCKET is not set".to_string()))?;
            Ok(Arc::new(GcsStorage::new(
                bucket,
                config.gcs_prefix.clone(),
                config.gcs_access_token.clone(),
            )))
        }
    }
}
