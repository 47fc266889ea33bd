//! Projections of record lists into list, gallery and teaser views, the local
//! view state behind publish/delete toggles, and the [`Library`] service the
//! HTTP layer drives.

use std::collections::HashSet;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::object_store::ObjectStore;
use crate::records::{RecordStore, RecordStoreError};
use crate::session::Session;
use crate::storage::models::{FileRecord, MediaKind};
use crate::upload::LibraryEvent;

/// Upper bound on the anonymous teaser sample.
pub const TEASER_LIMIT: usize = 15;

// ============================================================================
// Views
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    List,
    Gallery,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryTile {
    pub id: String,
    pub file_name: String,
    pub is_published: bool,
    pub media_kind: MediaKind,
    pub url: String,
}

impl From<&FileRecord> for GalleryTile {
    fn from(record: &FileRecord) -> Self {
        Self {
            id: record.id.clone(),
            file_name: record.file_name.clone(),
            is_published: record.is_published,
            media_kind: record.media_kind,
            url: record.url.clone(),
        }
    }
}

/// All records, newest first.
pub fn list_view(records: &[FileRecord]) -> Vec<FileRecord> {
    let mut items = records.to_vec();
    items.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
    items
}

/// Tiles for everything that can be previewed inline, newest first.
pub fn gallery_view(records: &[FileRecord]) -> Vec<GalleryTile> {
    list_view(records)
        .iter()
        .filter(|r| r.media_kind.is_previewable())
        .map(GalleryTile::from)
        .collect()
}

/// Random sample of published images and videos, at most [`TEASER_LIMIT`] long.
pub fn teaser_view<R: Rng + ?Sized>(records: &[FileRecord], rng: &mut R) -> Vec<GalleryTile> {
    let eligible: Vec<&FileRecord> = records
        .iter()
        .filter(|r| r.is_published && matches!(r.media_kind, MediaKind::Image | MediaKind::Video))
        .collect();

    eligible
        .choose_multiple(rng, TEASER_LIMIT)
        .map(|r| GalleryTile::from(*r))
        .collect()
}

/// Result of a fail-soft listing: on error the list is empty and
/// `diagnostic` says why.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Listing {
    pub files: Vec<FileRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl Listing {
    fn from_result(result: Result<Vec<FileRecord>, RecordStoreError>, what: &str) -> Self {
        match result {
            Ok(files) => Listing {
                files,
                diagnostic: None,
            },
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list {what}");
                Listing {
                    files: Vec::new(),
                    diagnostic: Some(format!("Failed to list {what}: {e}")),
                }
            }
        }
    }
}

// ============================================================================
// Local view state
// ============================================================================

/// Identifies one refresh so that late results can be recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTicket(u64);

/// Records currently on screen plus the last error indicator.
///
/// Refreshes replace the list wholesale. Publish and delete only touch the
/// local list after the store confirmed the change.
#[derive(Debug, Default)]
pub struct LibraryView {
    error: Option<String>,
    generation: u64,
    records: Vec<FileRecord>,
    unmounted: bool,
}

impl LibraryView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn begin_refresh(&mut self) -> RefreshTicket {
        self.generation += 1;
        RefreshTicket(self.generation)
    }

    /// Apply a refresh result. Returns false when the result was discarded
    /// because the view is gone or a newer refresh has started.
    pub fn apply_refresh(&mut self, ticket: RefreshTicket, listing: Listing) -> bool {
        if self.unmounted || ticket.0 != self.generation {
            return false;
        }
        self.records = listing.files;
        self.error = listing.diagnostic;
        true
    }

    pub fn unmount(&mut self) {
        self.unmounted = true;
    }

    pub async fn toggle_publish(
        &mut self,
        store: &dyn RecordStore,
        id: &str,
        is_published: bool,
    ) -> Result<(), RecordStoreError> {
        match store.set_published(id, is_published).await {
            Ok(updated) => {
                if !self.unmounted {
                    if let Some(record) = self.records.iter_mut().find(|r| r.id == id) {
                        record.is_published = updated.is_published;
                    }
                    self.error = None;
                }
                Ok(())
            }
            Err(e) => {
                if !self.unmounted {
                    self.error = Some(format!("Failed to toggle publish state: {e}"));
                }
                Err(e)
            }
        }
    }

    pub async fn delete(&mut self, store: &dyn RecordStore, id: &str) -> Result<(), RecordStoreError> {
        match store.delete(id).await {
            Ok(()) => {
                if !self.unmounted {
                    self.records.retain(|r| r.id != id);
                    self.error = None;
                }
                Ok(())
            }
            Err(e) => {
                if !self.unmounted {
                    self.error = Some(format!("Failed to delete file: {e}"));
                }
                Err(e)
            }
        }
    }
}

// ============================================================================
// Service
// ============================================================================

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Sign in required")]
    Unauthenticated,
    #[error("{0}")]
    Forbidden(String),
    #[error("File not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Store(RecordStoreError),
}

impl From<RecordStoreError> for LibraryError {
    fn from(e: RecordStoreError) -> Self {
        match e {
            RecordStoreError::NotFound(id) => LibraryError::NotFound(id),
            other => LibraryError::Store(other),
        }
    }
}

/// Read and mutate records on behalf of a session.
///
/// Publish and delete are restricted to the record's author.
pub struct Library {
    events: broadcast::Sender<LibraryEvent>,
    objects: Arc<dyn ObjectStore>,
    records: Arc<dyn RecordStore>,
}

impl Library {
    pub fn new(
        records: Arc<dyn RecordStore>,
        objects: Arc<dyn ObjectStore>,
        events: broadcast::Sender<LibraryEvent>,
    ) -> Self {
        Self {
            events,
            objects,
            records,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LibraryEvent> {
        self.events.subscribe()
    }

    /// Records owned by `owner_id`; only the owner may list them.
    pub async fn list_owned(&self, session: &Session, owner_id: &str) -> Result<Listing, LibraryError> {
        let identity = session.identity().ok_or(LibraryError::Unauthenticated)?;
        if identity.user_id != owner_id {
            return Err(LibraryError::Forbidden(
                "You can only list your own files".to_string(),
            ));
        }
        let listing = Listing::from_result(self.records.list_by_owner(owner_id).await, "your files");
        Ok(Listing {
            files: list_view(&listing.files),
            ..listing
        })
    }

    pub async fn list_published(&self) -> Listing {
        let listing = Listing::from_result(self.records.list_published().await, "published files");
        Listing {
            files: list_view(&listing.files),
            ..listing
        }
    }

    /// Published records plus the caller's own, newest first.
    pub async fn list_visible(&self, session: &Session) -> Listing {
        let mut listing = self.list_published().await;
        if let Some(identity) = session.identity() {
            let own = Listing::from_result(
                self.records.list_by_owner(&identity.user_id).await,
                "your files",
            );
            let seen: HashSet<String> = listing.files.iter().map(|r| r.id.clone()).collect();
            listing
                .files
                .extend(own.files.into_iter().filter(|r| !seen.contains(&r.id)));
            listing.files = list_view(&listing.files);
            listing.diagnostic = listing.diagnostic.or(own.diagnostic);
        }
        listing
    }

    pub async fn teaser(&self) -> Vec<GalleryTile> {
        let listing = self.list_published().await;
        let mut rng = rand::thread_rng();
        teaser_view(&listing.files, &mut rng)
    }

    pub async fn set_published(
        &self,
        session: &Session,
        id: &str,
        is_published: bool,
    ) -> Result<FileRecord, LibraryError> {
        let record = self
            .authorize(session, id)
            .await?
            .ok_or_else(|| LibraryError::NotFound(id.to_string()))?;

        if record.is_published == is_published {
            return Ok(record);
        }

        let updated = self.records.set_published(id, is_published).await?;
        tracing::debug!(file_id = %id, is_published, "Changed publish state");
        let _ = self.events.send(LibraryEvent::PublishChanged {
            id: id.to_string(),
            is_published: updated.is_published,
        });
        Ok(updated)
    }

    /// Idempotent: deleting an unknown id succeeds.
    pub async fn delete(&self, session: &Session, id: &str) -> Result<(), LibraryError> {
        let Some(record) = self.authorize(session, id).await? else {
            return Ok(());
        };

        self.records.delete(id).await?;

        if let Err(e) = self.objects.delete(&record.id).await {
            tracing::warn!(file_id = %id, error = %e, "Failed to delete file from object storage");
        }

        tracing::debug!(file_id = %id, "Deleted file");
        let _ = self.events.send(LibraryEvent::Deleted { id: id.to_string() });
        Ok(())
    }

    /// Load a record and check that the session owns it. `None` when it does not exist.
    async fn authorize(
        &self,
        session: &Session,
        id: &str,
    ) -> Result<Option<FileRecord>, LibraryError> {
        let identity = session.identity().ok_or(LibraryError::Unauthenticated)?;
        match self.records.get(id).await? {
            Some(record) if record.author_id != identity.user_id => Err(LibraryError::Forbidden(
                "Only the author can change this file".to_string(),
            )),
            other => Ok(other),
        }
    }
}
