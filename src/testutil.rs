//! Shared test helpers for media-library unit tests.

use std::sync::Arc;

use crate::config::{Config, NodeConfig, RecordsConfig, SessionConfig, StorageConfig};
use crate::object_store::LocalStore;
use crate::records::EmbeddedRecords;
use crate::session::{Identity, Session, StaticSessionResolver, AUTHENTICATED_ROLE};
use crate::storage::Database;
use crate::AppState;

pub const TEST_BASE_URL: &str = "http://media.test";

/// Create a test AppState with a temporary database and local object store.
/// Every request resolves to an anonymous session.
pub fn test_state(temp_dir: &tempfile::TempDir) -> Arc<AppState> {
    test_state_for(temp_dir, Session::Anonymous)
}

/// Like [`test_state`], but every request resolves to `session`.
pub fn test_state_for(temp_dir: &tempfile::TempDir, session: Session) -> Arc<AppState> {
    let data_dir = temp_dir.path().join("data");
    let files_dir = temp_dir.path().join("files");

    let config = Config {
        node: NodeConfig {
            bind_address: "127.0.0.1:0".to_string(),
            data_dir: data_dir.to_string_lossy().to_string(),
            public_base_url: TEST_BASE_URL.to_string(),
        },
        records: RecordsConfig::default(),
        session: SessionConfig::default(),
        storage: StorageConfig::default(),
        test_mode: true,
        max_upload_size: 1024 * 1024, // 1MB for tests
    };

    let db = Database::open(&data_dir).expect("Failed to open test database");
    let object_store =
        LocalStore::new(&files_dir, TEST_BASE_URL).expect("Failed to create test object store");

    Arc::new(AppState::new(
        config,
        Some(db.clone()),
        Arc::new(object_store),
        Arc::new(EmbeddedRecords::new(db)),
        Arc::new(StaticSessionResolver::new(session)),
    ))
}

/// An authenticated session for `user_id`.
pub fn signed_in(user_id: &str) -> Session {
    Session::Authenticated(Identity {
        user_id: user_id.to_string(),
        user_details: format!("{user_id}@example.test"),
        identity_provider: "github".to_string(),
        user_roles: vec!["anonymous".to_string(), AUTHENTICATED_ROLE.to_string()],
    })
}
