use axum::extract::multipart::MultipartError;
use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::{header, StatusCode};
use axum::Json;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::feed::{FeedParams, FeedResponse};
use crate::api::response::{ApiError, AppJson, AppQuery, CurrentSession, JSend};
use crate::library::Listing;
use crate::storage::models::FileRecord;
use crate::upload::{
    Notice, SelectedFile, UploadError, UploadReport, UploadRequest, UploadState, ValidationFailure,
};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub file: FileRecord,
    pub notice: Notice,
    pub trail: Vec<UploadState>,
}

/// JSON upload body. `userInfo` is accepted for compatibility and ignored;
/// the uploader is always the resolved session.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonUploadRequest {
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
    /// Base64-encoded payload
    #[serde(default)]
    pub file_buffer: Option<String>,
    #[serde(default)]
    pub is_published: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFileRequest {
    pub is_published: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// `POST /files`, either `multipart/form-data` (`file`, `isPublished`) or JSON.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    CurrentSession(session): CurrentSession,
    request: Request,
) -> Result<Json<JSend<UploadResponse>>, ApiError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let upload = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        read_multipart(multipart, state.config.max_upload_size).await?
    } else {
        let AppJson(body) = AppJson::<JsonUploadRequest>::from_request(request, &state).await?;
        decode_json_upload(body)?
    };

    let report = state.uploads.run(&session, upload).await;
    upload_response(report)
}

pub async fn list_files(
    State(state): State<Arc<AppState>>,
    CurrentSession(session): CurrentSession,
) -> Json<JSend<Listing>> {
    JSend::success(state.library.list_visible(&session).await)
}

/// `GET /files/:id?view=list|gallery` where the id is the owner's user id.
/// Unpublished records are included.
pub async fn list_owner_files(
    State(state): State<Arc<AppState>>,
    CurrentSession(session): CurrentSession,
    Path(owner_id): Path<String>,
    AppQuery(params): AppQuery<FeedParams>,
) -> Result<Json<JSend<FeedResponse>>, ApiError> {
    let listing = state.library.list_owned(&session, &owner_id).await?;
    Ok(JSend::success(FeedResponse::project(listing, params.view)))
}

pub async fn update_file(
    State(state): State<Arc<AppState>>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateFileRequest>,
) -> Result<Json<JSend<FileRecord>>, ApiError> {
    let record = state
        .library
        .set_published(&session, &id, req.is_published)
        .await?;
    Ok(JSend::success(record))
}

pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<String>,
) -> Result<Json<JSend<()>>, ApiError> {
    state.library.delete(&session, &id).await?;
    Ok(JSend::success(()))
}

// ============================================================================
// Helpers
// ============================================================================

async fn read_multipart(
    mut multipart: Multipart,
    max_upload_size: u64,
) -> Result<UploadRequest, ApiError> {
    let mut upload = UploadRequest::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("").to_string();
                let content_type = field.content_type().map(|s| s.to_string());

                let data = field.bytes().await.map_err(multipart_error)?;

                if data.len() as u64 > max_upload_size {
                    return Err(ApiError::payload_too_large(format!(
                        "File exceeds maximum upload size of {max_upload_size} bytes"
                    )));
                }

                // An empty file input still submits a nameless, empty part
                if !file_name.is_empty() || !data.is_empty() {
                    upload.file = Some(SelectedFile::new(file_name, content_type.as_deref(), data));
                }
            }
            "isPublished" | "is_published" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid isPublished: {e}")))?;
                upload.is_published = parse_flag(&text)?;
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    Ok(upload)
}

/// The body limit surfaces as a multipart stream error; keep its 413.
fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("Request body exceeds the upload size limit")
    } else {
        ApiError::bad_request(format!("Invalid multipart data: {}", e.body_text()))
    }
}

fn decode_json_upload(body: JsonUploadRequest) -> Result<UploadRequest, ApiError> {
    let file = match body.file_buffer {
        Some(encoded) => {
            let data = base64::engine::general_purpose::STANDARD
                .decode(encoded.trim())
                .map_err(|e| ApiError::bad_request(format!("fileBuffer must be base64: {e}")))?;
            let name = body.file_name.unwrap_or_else(|| "file".to_string());
            Some(SelectedFile::new(
                name,
                body.file_type.as_deref(),
                Bytes::from(data),
            ))
        }
        None => None,
    };

    Ok(UploadRequest {
        file,
        is_published: body.is_published,
    })
}

fn parse_flag(text: &str) -> Result<bool, ApiError> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" | "" => Ok(false),
        other => Err(ApiError::bad_request(format!(
            "isPublished must be a boolean, got '{other}'"
        ))),
    }
}

fn upload_response(report: UploadReport) -> Result<Json<JSend<UploadResponse>>, ApiError> {
    let UploadReport {
        trail,
        outcome,
        notice,
    } = report;

    match outcome {
        Ok(file) => Ok(JSend::success(UploadResponse {
            file,
            notice,
            trail,
        })),
        Err(UploadError::Validation(ValidationFailure::NotSignedIn)) => {
            Err(ApiError::unauthorized(notice.message))
        }
        Err(UploadError::Validation(ValidationFailure::TooLarge { .. })) => {
            Err(ApiError::payload_too_large(notice.message))
        }
        Err(UploadError::Validation(ValidationFailure::NoFile)) => {
            Err(ApiError::bad_request(notice.message))
        }
        Err(UploadError::UploadFailed(_)) => Err(ApiError::bad_gateway(notice.message)),
        Err(_) => Err(ApiError::internal(notice.message)),
    }
}
