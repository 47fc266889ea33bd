use async_trait::async_trait;

use super::{RecordStore, RecordStoreError};
use crate::storage::models::FileRecord;
use crate::storage::{Database, DatabaseError};

/// Records kept in the local redb database.
#[derive(Clone)]
pub struct EmbeddedRecords {
    db: Database,
}

impl EmbeddedRecords {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn transport(e: DatabaseError) -> RecordStoreError {
    RecordStoreError::Transport(e.to_string())
}

#[async_trait]
impl RecordStore for EmbeddedRecords {
    async fn create(&self, record: FileRecord) -> Result<FileRecord, RecordStoreError> {
        self.db
            .insert_file(&record)
            .map_err(|e| RecordStoreError::CreateFailed(e.to_string()))?;
        Ok(record)
    }

    async fn get(&self, id: &str) -> Result<Option<FileRecord>, RecordStoreError> {
        self.db.get_file(id).map_err(transport)
    }

    async fn list_all(&self) -> Result<Vec<FileRecord>, RecordStoreError> {
        self.db.get_all_files().map_err(transport)
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<FileRecord>, RecordStoreError> {
        self.db.get_files_by_owner(owner_id).map_err(transport)
    }

    async fn list_published(&self) -> Result<Vec<FileRecord>, RecordStoreError> {
        self.db.get_published_files().map_err(transport)
    }

    async fn set_published(
        &self,
        id: &str,
        is_published: bool,
    ) -> Result<FileRecord, RecordStoreError> {
        self.db
            .set_published(id, is_published)
            .map_err(transport)?
            .ok_or_else(|| RecordStoreError::NotFound(id.to_string()))
    }

    async fn delete(&self, id: &str) -> Result<(), RecordStoreError> {
        let deleted = self.db.delete_file(id).map_err(transport)?;
        if !deleted {
            tracing::debug!(file_id = %id, "Delete of unknown record ignored");
        }
        Ok(())
    }
}
