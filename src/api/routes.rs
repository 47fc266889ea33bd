use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // JSON uploads carry the payload base64-encoded
    let upload_limit = (state.config.max_upload_size as usize)
        .saturating_mul(4)
        .saturating_div(3)
        .saturating_add(64 * 1024);

    let mut router = Router::new()
        // Session
        .route("/session", get(handlers::current_session))
        // Files
        .route("/files", get(handlers::list_files))
        .route(
            "/files",
            post(handlers::upload_file).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/files/:id", get(handlers::list_owner_files))
        .route("/files/:id", put(handlers::update_file))
        .route("/files/:id", delete(handlers::delete_file))
        // Public feed
        .route("/feed", get(handlers::feed))
        .route("/feed/teaser", get(handlers::teaser))
        // Stored objects (local backend)
        .route("/static/*key", get(handlers::serve_static))
        // Internal
        .route("/_internal/health", get(handlers::health));

    // Test-only routes
    if state.config.test_mode {
        tracing::warn!("Test mode enabled, purge route is available.");
        router = router.route("/admin/purge", delete(handlers::admin_purge));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
