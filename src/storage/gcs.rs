use async_trait::async_trait;
use reqwest::Client;

use super::{sha256_hex, validate_key, FileStorage, StorageError, StoredObject};

const UPLOAD_ENDPOINT: &str = "https://storage.googleapis.com/upload/storage/v1/b";
const METADATA_ENDPOINT: &str = "https://storage.googleapis.com/storage/v1/b";

/// Google Cloud Storage through the JSON API.
pub struct GcsStorage {
    client: Client,
    bucket: String,
    prefix: String,
    access_token: Option<String>,
}

impl GcsStorage {
    pub fn new(bucket: String, prefix: String, access_token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            bucket,
            prefix: prefix.trim_matches('/').to_string(),
            access_token,
        }
    }

    /// Object name inside the bucket.
    pub fn object_name(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", self.prefix, key)
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl FileStorage for GcsStorage {
    fn backend(&self) -> &'static str {
        "gcs"
    }

    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<StoredObject, StorageError> {
        validate_key(key)?;
        let object = self.object_name(key);
        let url = format!("{}/{}/o", UPLOAD_ENDPOINT, self.bucket);

        let response = self
            .authorize(self.client.post(&url))
            .query(&[("uploadType", "media"), ("name", object.as_str()), ("ifGenerationMatch", "0")])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| StorageError::Upstream(e.to_string()))?;

        let status = response.status();
        // ifGenerationMatch=0 fails with 412 when the object already exists.
        if status == reqwest::StatusCode::PRECONDITION_FAILED {
            return Err(StorageError::AlreadyExists(key.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Upstream(format!("upload of {} failed ({}): {}", object, status, body)));
        }

        tracing::info!("Uploaded gs://{}/{} ({} bytes)", self.bucket, object, bytes.len());
        Ok(StoredObject {
            path: format!("gs://{}/{}", self.bucket, object),
            size: bytes.len() as u64,
            sha256: sha256_hex(bytes),
        })
    }

    async fn health(&self) -> Result<(), StorageError> {
        let url = format!("{}/{}", METADATA_ENDPOINT, self.bucket);
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| StorageError::Upstream(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(StorageError::Upstream(format!("bucket check returned {}", response.status())))
        }
    }
}
