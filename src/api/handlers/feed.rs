use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::response::{ApiError, AppQuery, JSend};
use crate::library::{gallery_view, GalleryTile, Listing, ViewMode};
use crate::storage::models::FileRecord;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct FeedParams {
    #[serde(default)]
    pub view: ViewMode,
}

#[derive(Debug, Serialize)]
#[serde(tag = "view", rename_all = "lowercase")]
pub enum FeedResponse {
    List {
        files: Vec<FileRecord>,
        #[serde(skip_serializing_if = "Option::is_none")]
        diagnostic: Option<String>,
    },
    Gallery {
        tiles: Vec<GalleryTile>,
        #[serde(skip_serializing_if = "Option::is_none")]
        diagnostic: Option<String>,
    },
}

impl FeedResponse {
    /// Project a listing for the requested view. The gallery drops
    /// records that cannot be previewed.
    pub fn project(listing: Listing, view: ViewMode) -> Self {
        match view {
            ViewMode::List => FeedResponse::List {
                files: listing.files,
                diagnostic: listing.diagnostic,
            },
            ViewMode::Gallery => FeedResponse::Gallery {
                tiles: gallery_view(&listing.files),
                diagnostic: listing.diagnostic,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TeaserResponse {
    pub tiles: Vec<GalleryTile>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Published records as a list or a gallery.
pub async fn feed(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<FeedParams>,
) -> Result<Json<JSend<FeedResponse>>, ApiError> {
    let listing = state.library.list_published().await;
    let response = FeedResponse::project(listing, params.view);

    Ok(JSend::success(response))
}

/// Random sample of published images and videos for signed-out visitors.
pub async fn teaser(State(state): State<Arc<AppState>>) -> Json<JSend<TeaserResponse>> {
    JSend::success(TeaserResponse {
        tiles: state.library.teaser().await,
    })
}
