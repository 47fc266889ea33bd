//! The upload workflow: validate, store the payload, record its metadata, notify.
//!
//! ```text
//! Idle -> Validating -> Storing -> RecordingMetadata -> Done
//!             |            |               |
//!             +------------+---------------+--> Failed
//! ```
//!
//! A failed metadata write leaves the stored object in place; nothing is rolled back.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::object_store::{self, ObjectStore, ObjectStoreError};
use crate::records::{RecordStore, RecordStoreError};
use crate::session::Session;
use crate::storage::models::{FileRecord, MediaKind};

pub const NO_FILE_MESSAGE: &str = "Please select a file first.";
pub const NOT_SIGNED_IN_MESSAGE: &str = "Please log in to upload files.";
pub const SUCCESS_MESSAGE: &str = "File uploaded and record created successfully.";

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    Idle,
    Validating,
    Storing,
    RecordingMetadata,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Success,
}

/// User-facing outcome message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub message: String,
    pub severity: Severity,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Success,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Error,
        }
    }
}

/// Reasons an upload is refused before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("{}", NO_FILE_MESSAGE)]
    NoFile,
    #[error("{}", NOT_SIGNED_IN_MESSAGE)]
    NotSignedIn,
    #[error("File exceeds maximum upload size of {limit} bytes")]
    TooLarge { limit: u64 },
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Validation(ValidationFailure),
    #[error("storage write failed: {0}")]
    UploadFailed(#[source] ObjectStoreError),
    #[error("record create failed: {source}")]
    RecordCreateFailed {
        /// Key of the object left behind in storage.
        orphaned_key: String,
        #[source]
        source: RecordStoreError,
    },
}

/// Changes to the library that listings should react to.
#[derive(Debug, Clone, PartialEq)]
pub enum LibraryEvent {
    Uploaded(FileRecord),
    PublishChanged { id: String, is_published: bool },
    Deleted { id: String },
}

/// A file picked by the user.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl SelectedFile {
    /// Keep the declared content type unless it is missing or generic,
    /// in which case guess from the file name.
    pub fn new(name: impl Into<String>, declared_type: Option<&str>, data: Bytes) -> Self {
        let name = name.into();
        let content_type = declared_type
            .map(str::trim)
            .filter(|ct| !ct.is_empty() && *ct != FALLBACK_CONTENT_TYPE)
            .map(|ct| ct.to_string())
            .or_else(|| mime_guess::from_path(&name).first().map(|m| m.to_string()))
            .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string());
        Self {
            name,
            content_type,
            data,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub file: Option<SelectedFile>,
    pub is_published: bool,
}

#[derive(Debug)]
pub struct UploadReport {
    /// Every state visited, starting at `Idle`.
    pub trail: Vec<UploadState>,
    pub outcome: Result<FileRecord, UploadError>,
    pub notice: Notice,
}

impl UploadReport {
    pub fn state(&self) -> UploadState {
        self.trail.last().copied().unwrap_or(UploadState::Idle)
    }

    /// The state the workflow was in when it failed.
    pub fn failed_from(&self) -> Option<UploadState> {
        match self.trail.as_slice() {
            [.., from, UploadState::Failed] => Some(*from),
            _ => None,
        }
    }
}

pub struct UploadWorkflow {
    events: broadcast::Sender<LibraryEvent>,
    max_upload_size: u64,
    objects: Arc<dyn ObjectStore>,
    records: Arc<dyn RecordStore>,
}

impl UploadWorkflow {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        records: Arc<dyn RecordStore>,
        events: broadcast::Sender<LibraryEvent>,
        max_upload_size: u64,
    ) -> Self {
        Self {
            events,
            max_upload_size,
            objects,
            records,
        }
    }

    /// Run one upload to completion. Never panics or propagates; the report
    /// carries the outcome and the message to show.
    pub async fn run(&self, session: &Session, request: UploadRequest) -> UploadReport {
        let mut trail = vec![UploadState::Idle, UploadState::Validating];

        // A nameless or empty selection counts as no selection
        let selected = request
            .file
            .filter(|f| !f.name.trim().is_empty() && !f.data.is_empty());
        let (file, identity) = match (selected, session.identity()) {
            (None, _) => return fail(trail, UploadError::Validation(ValidationFailure::NoFile)),
            (Some(_), None) => {
                return fail(trail, UploadError::Validation(ValidationFailure::NotSignedIn))
            }
            (Some(file), Some(identity)) => (file, identity),
        };

        let byte_size = file.data.len() as u64;
        if byte_size > self.max_upload_size {
            return fail(
                trail,
                UploadError::Validation(ValidationFailure::TooLarge {
                    limit: self.max_upload_size,
                }),
            );
        }

        let upload_id = uuid::Uuid::new_v4();
        tracing::debug!(%upload_id, file_name = %file.name, byte_size, "Storing upload");

        trail.push(UploadState::Storing);
        let now = Utc::now();
        let stored = match object_store::store(
            self.objects.as_ref(),
            file.data,
            &file.content_type,
            &file.name,
            now,
        )
        .await
        {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(%upload_id, error = %e, "Object storage write failed");
                return fail(trail, UploadError::UploadFailed(e));
            }
        };

        trail.push(UploadState::RecordingMetadata);
        let record = FileRecord {
            id: stored.key.clone(),
            file_name: file.name,
            media_kind: MediaKind::from_mime(&file.content_type),
            mime_type: file.content_type,
            url: stored.url,
            byte_size,
            uploaded_at: now,
            author: identity.display_name().to_string(),
            author_id: identity.user_id.clone(),
            is_published: request.is_published,
        };

        let record = match self.records.create(record).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(
                    %upload_id,
                    orphaned_key = %stored.key,
                    error = %e,
                    "Record create failed, stored object left orphaned"
                );
                return fail(
                    trail,
                    UploadError::RecordCreateFailed {
                        orphaned_key: stored.key,
                        source: e,
                    },
                );
            }
        };

        trail.push(UploadState::Done);
        tracing::info!(%upload_id, file_id = %record.id, author_id = %record.author_id, "Upload complete");
        // No subscribers is fine
        let _ = self.events.send(LibraryEvent::Uploaded(record.clone()));

        UploadReport {
            trail,
            outcome: Ok(record),
            notice: Notice::success(SUCCESS_MESSAGE),
        }
    }
}

fn fail(mut trail: Vec<UploadState>, error: UploadError) -> UploadReport {
    trail.push(UploadState::Failed);
    let notice = match &error {
        UploadError::Validation(reason) => Notice::error(reason.to_string()),
        other => Notice::error(format!("Upload failed: {other}")),
    };
    UploadReport {
        trail,
        outcome: Err(error),
        notice,
    }
}
