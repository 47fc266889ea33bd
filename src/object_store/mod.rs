mod azure;
mod local;

pub use azure::AzureBlobStore;
pub use local::LocalStore;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid object key: {0}")]
    InvalidKey(String),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Abstraction over object storage backends.
/// `put` returns the URL under which the object is publicly fetchable.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create the destination container if it does not exist yet. Idempotent.
    async fn ensure_container(&self) -> Result<(), ObjectStoreError>;
    async fn put(&self, key: &str, data: Bytes, content_type: &str)
        -> Result<String, ObjectStoreError>;
    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError>;
    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;
    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError>;
}

/// Where a payload landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
}

/// Write a payload under a fresh timestamped key, creating the container first.
pub async fn store(
    store: &dyn ObjectStore,
    data: Bytes,
    content_type: &str,
    suggested_name: &str,
    now: DateTime<Utc>,
) -> Result<StoredObject, ObjectStoreError> {
    let key = object_key(now, suggested_name);
    store.ensure_container().await?;
    let url = store.put(&key, data, content_type).await?;
    Ok(StoredObject { key, url })
}

/// `2024-05-01T10-20-30-123Z_cat.png` style key: ISO timestamp with `:` and `.`
/// replaced, followed by the sanitized original name.
pub fn object_key(now: DateTime<Utc>, suggested_name: &str) -> String {
    let timestamp = now.format("%Y-%m-%dT%H-%M-%S-%3fZ");
    format!("{timestamp}_{}", sanitize_name(suggested_name))
}

/// Reduce a user-supplied file name to `[A-Za-z0-9._-]`, keeping only its last path segment.
pub fn sanitize_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Keys are a single path segment and never start with a dot.
pub(crate) fn validate_key(key: &str) -> Result<(), ObjectStoreError> {
    if key.is_empty() || key.starts_with('.') || key.contains(['/', '\\']) {
        return Err(ObjectStoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
