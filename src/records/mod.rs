//! Persistence of [`FileRecord`]s behind a swappable backend.

mod embedded;
mod remote;

pub use embedded::EmbeddedRecords;
pub use remote::RemoteRecords;

use async_trait::async_trait;
use thiserror::Error;

use crate::storage::models::FileRecord;

#[derive(Debug, Error)]
pub enum RecordStoreError {
    #[error("Record create failed: {0}")]
    CreateFailed(String),
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Record store unavailable: {0}")]
    Transport(String),
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a new record. A duplicate id is a create failure.
    async fn create(&self, record: FileRecord) -> Result<FileRecord, RecordStoreError>;
    async fn get(&self, id: &str) -> Result<Option<FileRecord>, RecordStoreError>;
    async fn list_all(&self) -> Result<Vec<FileRecord>, RecordStoreError>;
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<FileRecord>, RecordStoreError>;
    async fn list_published(&self) -> Result<Vec<FileRecord>, RecordStoreError>;
    /// Change only the publish flag. Setting the current value succeeds unchanged.
    async fn set_published(
        &self,
        id: &str,
        is_published: bool,
    ) -> Result<FileRecord, RecordStoreError>;
    /// Idempotent: a missing id is not an error.
    async fn delete(&self, id: &str) -> Result<(), RecordStoreError>;
}
