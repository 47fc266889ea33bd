//! media-library - Media upload, publishing and feed service
//!
//! This crate provides uploads of images, video and audio with:
//! - Swappable object storage backends (local filesystem, Azure Blob Storage)
//! - File records kept in an embedded redb database or behind a remote record API
//! - Session resolution against the platform's identity endpoint
//! - REST API with multipart and JSON upload, publish toggling and public feeds

pub mod api;
pub mod config;
pub mod library;
pub mod object_store;
pub mod records;
pub mod session;
pub mod storage;
#[cfg(test)]
pub mod testutil;
pub mod upload;

use std::sync::Arc;

use tokio::sync::broadcast;

use config::Config;
use library::Library;
use object_store::ObjectStore;
use records::RecordStore;
use session::SessionResolver;
use storage::Database;
use upload::{LibraryEvent, UploadWorkflow};

const EVENT_CAPACITY: usize = 64;

/// Shared application state
pub struct AppState {
    pub config: Config,
    /// Present only with the embedded record backend.
    pub db: Option<Database>,
    pub library: Library,
    pub object_store: Arc<dyn ObjectStore>,
    pub sessions: Arc<dyn SessionResolver>,
    pub uploads: UploadWorkflow,
}

impl AppState {
    /// Wire the workflow and library over the selected adapters.
    pub fn new(
        config: Config,
        db: Option<Database>,
        object_store: Arc<dyn ObjectStore>,
        records: Arc<dyn RecordStore>,
        sessions: Arc<dyn SessionResolver>,
    ) -> Self {
        let (events, _) = broadcast::channel::<LibraryEvent>(EVENT_CAPACITY);
        let uploads = UploadWorkflow::new(
            Arc::clone(&object_store),
            Arc::clone(&records),
            events.clone(),
            config.max_upload_size,
        );
        let library = Library::new(records, Arc::clone(&object_store), events);

        Self {
            config,
            db,
            library,
            object_store,
            sessions,
            uploads,
        }
    }
}
