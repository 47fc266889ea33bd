use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Serialize;

use super::{RecordStore, RecordStoreError};
use crate::storage::models::FileRecord;

/// Records kept behind an HTTP record API:
///
/// - `GET /files` and `GET /files/{owner_id}` return bare `FileRecord` arrays
/// - `POST /files` takes a record and returns it as stored
/// - `PUT /files/{id}` takes `{"isPublished": bool}`
/// - `DELETE /files/{id}`
pub struct RemoteRecords {
    base_url: Url,
    client: Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PublishBody {
    is_published: bool,
}

impl RemoteRecords {
    pub fn new(base_url: &str) -> Result<Self, RecordStoreError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| RecordStoreError::Transport(format!("Invalid record API URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(RecordStoreError::Transport(format!(
                "Record API URL cannot be a base: {base_url}"
            )));
        }
        let client = Client::builder()
            .build()
            .map_err(|e| RecordStoreError::Transport(e.to_string()))?;
        Ok(Self { base_url, client })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("files").extend(segments);
        }
        url
    }

    async fn fetch_list(&self, url: Url) -> Result<Vec<FileRecord>, RecordStoreError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RecordStoreError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(RecordStoreError::Transport(format!(
                "Record API list failed ({})",
                resp.status()
            )));
        }

        resp.json()
            .await
            .map_err(|e| RecordStoreError::Transport(format!("Malformed record list: {e}")))
    }
}

#[async_trait]
impl RecordStore for RemoteRecords {
    async fn create(&self, record: FileRecord) -> Result<FileRecord, RecordStoreError> {
        let resp = self
            .client
            .post(self.endpoint(&[]))
            .json(&record)
            .send()
            .await
            .map_err(|e| RecordStoreError::CreateFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(RecordStoreError::CreateFailed(format!(
                "Record API rejected record ({status}): {body}"
            )));
        }

        resp.json()
            .await
            .map_err(|e| RecordStoreError::CreateFailed(format!("Malformed record: {e}")))
    }

    async fn get(&self, id: &str) -> Result<Option<FileRecord>, RecordStoreError> {
        Ok(self.list_all().await?.into_iter().find(|r| r.id == id))
    }

    async fn list_all(&self) -> Result<Vec<FileRecord>, RecordStoreError> {
        self.fetch_list(self.endpoint(&[])).await
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<FileRecord>, RecordStoreError> {
        self.fetch_list(self.endpoint(&[owner_id])).await
    }

    async fn list_published(&self) -> Result<Vec<FileRecord>, RecordStoreError> {
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .filter(|r| r.is_published)
            .collect())
    }

    async fn set_published(
        &self,
        id: &str,
        is_published: bool,
    ) -> Result<FileRecord, RecordStoreError> {
        let resp = self
            .client
            .put(self.endpoint(&[id]))
            .json(&PublishBody { is_published })
            .send()
            .await
            .map_err(|e| RecordStoreError::Transport(e.to_string()))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(RecordStoreError::NotFound(id.to_string()));
        }
        if !resp.status().is_success() {
            return Err(RecordStoreError::Transport(format!(
                "Record API update failed ({})",
                resp.status()
            )));
        }

        resp.json()
            .await
            .map_err(|e| RecordStoreError::Transport(format!("Malformed record: {e}")))
    }

    async fn delete(&self, id: &str) -> Result<(), RecordStoreError> {
        let resp = self
            .client
            .delete(self.endpoint(&[id]))
            .send()
            .await
            .map_err(|e| RecordStoreError::Transport(e.to_string()))?;

        if resp.status().is_success() || resp.status() == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(RecordStoreError::Transport(format!(
                "Record API delete failed ({})",
                resp.status()
            )))
        }
    }
}
