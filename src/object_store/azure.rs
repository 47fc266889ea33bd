use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use std::sync::atomic::{AtomicBool, Ordering};

use super::{validate_key, ObjectStore, ObjectStoreError};

const API_VERSION: &str = "2021-08-06";

/// Azure Blob Storage backend authorized with a SAS token.
///
/// The token is appended to every request but never to the URLs handed back
/// to callers; the container is expected to allow anonymous blob reads.
pub struct AzureBlobStore {
    client: Client,
    container: String,
    container_ready: AtomicBool,
    endpoint: String,
    sas_token: String,
}

impl AzureBlobStore {
    /// `endpoint` is the account endpoint, e.g. `https://myaccount.blob.core.windows.net`.
    pub fn new(endpoint: &str, container: &str, sas_token: &str) -> Result<Self, ObjectStoreError> {
        let client = Client::builder()
            .build()
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        Ok(Self {
            client,
            container: container.to_string(),
            container_ready: AtomicBool::new(false),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            sas_token: sas_token.trim_start_matches('?').to_string(),
        })
    }

    /// Default public endpoint for a storage account name.
    pub fn account_endpoint(account: &str) -> String {
        format!("https://{account}.blob.core.windows.net")
    }

    fn container_url(&self) -> String {
        format!("{}/{}", self.endpoint, self.container)
    }

    fn blob_url(&self, key: &str) -> String {
        format!("{}/{}/{key}", self.endpoint, self.container)
    }

    fn signed(&self, url: &str, extra_query: Option<&str>) -> String {
        let mut query: Vec<&str> = Vec::new();
        if let Some(extra) = extra_query {
            query.push(extra);
        }
        if !self.sas_token.is_empty() {
            query.push(&self.sas_token);
        }
        if query.is_empty() {
            url.to_string()
        } else {
            format!("{url}?{}", query.join("&"))
        }
    }
}

#[async_trait]
impl ObjectStore for AzureBlobStore {
    async fn ensure_container(&self) -> Result<(), ObjectStoreError> {
        if self.container_ready.load(Ordering::Acquire) {
            return Ok(());
        }

        let resp = self
            .client
            .put(self.signed(&self.container_url(), Some("restype=container")))
            .header("x-ms-version", API_VERSION)
            .body(Vec::new())
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        // 409 means the container already exists
        if !resp.status().is_success() && resp.status() != StatusCode::CONFLICT {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ObjectStoreError::Backend(format!(
                "Azure container create failed ({status}): {body}"
            )));
        }

        self.container_ready.store(true, Ordering::Release);
        Ok(())
    }

    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<String, ObjectStoreError> {
        validate_key(key)?;
        let url = self.blob_url(key);

        let resp = self
            .client
            .put(self.signed(&url, None))
            .header("x-ms-version", API_VERSION)
            .header("x-ms-blob-type", "BlockBlob")
            .header("Content-Type", content_type)
            .body(data)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ObjectStoreError::Backend(format!(
                "Azure upload failed ({status}): {body}"
            )));
        }

        Ok(url)
    }

    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
        validate_key(key)?;

        let resp = self
            .client
            .get(self.signed(&self.blob_url(key), None))
            .header("x-ms-version", API_VERSION)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(ObjectStoreError::NotFound(key.to_string()));
        }

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ObjectStoreError::Backend(format!(
                "Azure download failed ({status}): {body}"
            )));
        }

        resp.bytes()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        validate_key(key)?;

        let resp = self
            .client
            .delete(self.signed(&self.blob_url(key), None))
            .header("x-ms-version", API_VERSION)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        // 404 is fine -- blob already gone
        if !resp.status().is_success() && resp.status() != StatusCode::NOT_FOUND {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ObjectStoreError::Backend(format!(
                "Azure delete failed ({status}): {body}"
            )));
        }

        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        validate_key(key)?;

        let resp = self
            .client
            .head(self.signed(&self.blob_url(key), None))
            .header("x-ms-version", API_VERSION)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        Ok(resp.status().is_success())
    }
}
