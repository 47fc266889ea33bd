use axum::body::Body;
use axum::extract::{Path, Request, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Router;
use base64::Engine;
use tower::ServiceExt;

use super::create_router;
use super::handlers::{self, FeedResponse};
use super::response::{ApiError, AppJson, AppQuery, CurrentSession};
use crate::library::ViewMode;
use crate::session::Session;
use crate::storage::models::MediaKind;
use crate::testutil::{signed_in, test_state, test_state_for, TEST_BASE_URL};
use crate::upload::{UploadState, NO_FILE_MESSAGE};

fn json_upload(name: &str, mime: &str, data: &[u8], published: bool) -> Request {
    let body = serde_json::json!({
        "fileName": name,
        "fileType": mime,
        "fileBuffer": base64::engine::general_purpose::STANDARD.encode(data),
        "isPublished": published,
        "userInfo": { "userId": "spoofed" },
    });
    Request::builder()
        .method("POST")
        .uri("/files")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn status_of(err: ApiError) -> StatusCode {
    err.into_response().status()
}

#[tokio::test]
async fn upload_creates_record_owned_by_session() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);

    let resp = handlers::upload_file(
        State(state.clone()),
        CurrentSession(signed_in("u1")),
        json_upload("cat.png", "image/png", &[7u8; 2048], false),
    )
    .await
    .unwrap();

    let upload = &resp.0.data;
    assert_eq!(upload.file.author_id, "u1");
    assert_eq!(upload.file.mime_type, "image/png");
    assert_eq!(upload.file.byte_size, 2048);
    assert!(!upload.file.is_published);
    assert!(upload
        .file
        .url
        .starts_with(&format!("{TEST_BASE_URL}/static/")));
    assert_eq!(upload.trail.last(), Some(&UploadState::Done));

    // The stored bytes are served back under the record's key
    let served = handlers::serve_static(State(state.clone()), Path(upload.file.id.clone()))
        .await
        .unwrap();
    assert_eq!(served.status(), StatusCode::OK);
    assert_eq!(
        served.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/png"
    );
}

#[tokio::test]
async fn upload_without_file_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);

    let request = Request::builder()
        .method("POST")
        .uri("/files")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"isPublished": true}"#))
        .unwrap();

    let err = handlers::upload_file(State(state), CurrentSession(signed_in("u1")), request)
        .await
        .unwrap_err();
    match err {
        ApiError::Fail(code, message) => {
            assert_eq!(code, StatusCode::BAD_REQUEST);
            assert_eq!(message, NO_FILE_MESSAGE);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn anonymous_upload_is_unauthorized() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);

    let err = handlers::upload_file(
        State(state),
        CurrentSession(Session::Anonymous),
        json_upload("cat.png", "image/png", b"png", false),
    )
    .await
    .unwrap_err();
    assert_eq!(status_of(err), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn only_author_can_publish_and_delete() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);

    let created = handlers::upload_file(
        State(state.clone()),
        CurrentSession(signed_in("u1")),
        json_upload("clip.mp4", "video/mp4", b"mp4", false),
    )
    .await
    .unwrap();
    let id = created.0.data.file.id.clone();

    let err = handlers::update_file(
        State(state.clone()),
        CurrentSession(signed_in("u2")),
        Path(id.clone()),
        AppJson(handlers_update(true)),
    )
    .await
    .unwrap_err();
    assert_eq!(status_of(err), StatusCode::FORBIDDEN);

    let err = handlers::delete_file(
        State(state.clone()),
        CurrentSession(signed_in("u2")),
        Path(id.clone()),
    )
    .await
    .unwrap_err();
    assert_eq!(status_of(err), StatusCode::FORBIDDEN);

    let updated = handlers::update_file(
        State(state.clone()),
        CurrentSession(signed_in("u1")),
        Path(id.clone()),
        AppJson(handlers_update(true)),
    )
    .await
    .unwrap();
    assert!(updated.0.data.is_published);

    handlers::delete_file(
        State(state.clone()),
        CurrentSession(signed_in("u1")),
        Path(id.clone()),
    )
    .await
    .unwrap();
    // Second delete is a no-op
    handlers::delete_file(State(state.clone()), CurrentSession(signed_in("u1")), Path(id))
        .await
        .unwrap();
}

#[tokio::test]
async fn update_unknown_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);

    let err = handlers::update_file(
        State(state),
        CurrentSession(signed_in("u1")),
        Path("missing".to_string()),
        AppJson(handlers_update(true)),
    )
    .await
    .unwrap_err();
    assert_eq!(status_of(err), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn owner_listing_is_private() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);

    handlers::upload_file(
        State(state.clone()),
        CurrentSession(signed_in("u1")),
        json_upload("a.png", "image/png", b"a", false),
    )
    .await
    .unwrap();

    let own = handlers::list_owner_files(
        State(state.clone()),
        CurrentSession(signed_in("u1")),
        Path("u1".to_string()),
        AppQuery(list_params()),
    )
    .await
    .unwrap();
    match &own.0.data {
        FeedResponse::List { files, .. } => assert_eq!(files.len(), 1),
        other => panic!("expected list view, got {other:?}"),
    }

    let err = handlers::list_owner_files(
        State(state.clone()),
        CurrentSession(signed_in("u2")),
        Path("u1".to_string()),
        AppQuery(list_params()),
    )
    .await
    .unwrap_err();
    assert_eq!(status_of(err), StatusCode::FORBIDDEN);

    let err = handlers::list_owner_files(
        State(state),
        CurrentSession(Session::Anonymous),
        Path("u1".to_string()),
        AppQuery(list_params()),
    )
    .await
    .unwrap_err();
    assert_eq!(status_of(err), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn owner_gallery_includes_unpublished_media() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);

    for (name, mime) in [
        ("draft.png", "image/png"),
        ("song.mp3", "audio/mpeg"),
        ("notes.txt", "text/plain"),
    ] {
        handlers::upload_file(
            State(state.clone()),
            CurrentSession(signed_in("u1")),
            json_upload(name, mime, b"x", false),
        )
        .await
        .unwrap();
    }

    let gallery = handlers::list_owner_files(
        State(state),
        CurrentSession(signed_in("u1")),
        Path("u1".to_string()),
        AppQuery(handlers::FeedParams {
            view: ViewMode::Gallery,
        }),
    )
    .await
    .unwrap();

    let FeedResponse::Gallery { tiles, diagnostic } = &gallery.0.data else {
        panic!("expected gallery view, got {:?}", gallery.0.data);
    };
    assert!(diagnostic.is_none());
    let mut names: Vec<&str> = tiles.iter().map(|t| t.file_name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["draft.png", "song.mp3"]);
    assert!(tiles.iter().all(|t| !t.is_published));
    assert!(tiles.iter().any(|t| t.media_kind == MediaKind::Audio));
}

#[tokio::test]
async fn feed_and_listing_show_published_to_everyone() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);

    handlers::upload_file(
        State(state.clone()),
        CurrentSession(signed_in("u1")),
        json_upload("public.png", "image/png", b"p", true),
    )
    .await
    .unwrap();
    handlers::upload_file(
        State(state.clone()),
        CurrentSession(signed_in("u1")),
        json_upload("private.png", "image/png", b"q", false),
    )
    .await
    .unwrap();
    handlers::upload_file(
        State(state.clone()),
        CurrentSession(signed_in("u1")),
        json_upload("notes.txt", "text/plain", b"r", true),
    )
    .await
    .unwrap();

    let anonymous = handlers::list_files(State(state.clone()), CurrentSession(Session::Anonymous))
        .await;
    assert_eq!(anonymous.0.data.files.len(), 2);

    let owner = handlers::list_files(State(state.clone()), CurrentSession(signed_in("u1"))).await;
    assert_eq!(owner.0.data.files.len(), 3);

    let gallery = handlers::feed(
        State(state.clone()),
        AppQuery(handlers::FeedParams {
            view: ViewMode::Gallery,
        }),
    )
    .await
    .unwrap();
    let value = serde_json::to_value(&gallery.0.data).unwrap();
    assert_eq!(value["view"], "gallery");
    assert_eq!(value["tiles"].as_array().unwrap().len(), 1);

    let teaser = handlers::teaser(State(state)).await;
    assert_eq!(teaser.0.data.tiles.len(), 1);
    assert_eq!(teaser.0.data.tiles[0].file_name, "public.png");
}

#[tokio::test]
async fn static_rejects_traversal_keys() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);

    let err = handlers::serve_static(State(state), Path("../data/media-library.redb".to_string()))
        .await
        .unwrap_err();
    assert_eq!(status_of(err), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn purge_clears_records() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);

    handlers::upload_file(
        State(state.clone()),
        CurrentSession(signed_in("u1")),
        json_upload("a.png", "image/png", b"a", true),
    )
    .await
    .unwrap();

    let purged = handlers::admin_purge(State(state.clone())).await.unwrap();
    assert_eq!(purged.0.data.files_deleted, 1);

    let listing = handlers::list_files(State(state), CurrentSession(signed_in("u1"))).await;
    assert!(listing.0.data.files.is_empty());
}

fn handlers_update(is_published: bool) -> handlers::UpdateFileRequest {
    handlers::UpdateFileRequest { is_published }
}

fn list_params() -> handlers::FeedParams {
    handlers::FeedParams {
        view: ViewMode::List,
    }
}

// ============================================================================
// Through the router
// ============================================================================

const BOUNDARY: &str = "media-library-test-boundary";

/// A `multipart/form-data` upload with an `isPublished` part and a `file` part.
fn multipart_upload(file_name: &str, mime: &str, data: &[u8], published: bool) -> Request {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"isPublished\"\r\n\r\n\
             {published}\r\n\
             --{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
             Content-Type: {mime}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/files")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn send(router: &Router, request: Request) -> (StatusCode, serde_json::Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, value)
}

#[tokio::test]
async fn router_multipart_upload_then_list_and_delete_twice() {
    let dir = tempfile::tempdir().unwrap();
    let router = create_router(test_state_for(&dir, signed_in("u1")));

    let (status, body) = send(
        &router,
        multipart_upload("cat.png", "image/png", &[7u8; 2048], true),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    let file = &body["data"]["file"];
    assert_eq!(file["fileName"], "cat.png");
    assert_eq!(file["type"], "image/png");
    assert_eq!(file["size"], 2048);
    assert_eq!(file["authorId"], "u1");
    assert_eq!(file["isPublished"], true);
    assert_eq!(body["data"]["notice"]["severity"], "success");
    let id = file["id"].as_str().unwrap().to_string();

    let (status, body) = send(&router, empty_request("GET", "/files")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["files"].as_array().unwrap().len(), 1);

    let (status, body) = send(&router, empty_request("GET", "/feed/teaser")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["tiles"][0]["id"], id.as_str());

    let (status, _) = send(&router, empty_request("GET", &format!("/static/{id}"))).await;
    assert_eq!(status, StatusCode::OK);

    for _ in 0..2 {
        let (status, body) =
            send(&router, empty_request("DELETE", &format!("/files/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
    }

    let (_, body) = send(&router, empty_request("GET", "/files")).await;
    assert!(body["data"]["files"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn router_empty_file_part_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let router = create_router(test_state_for(&dir, signed_in("u1")));

    let (status, body) = send(
        &router,
        multipart_upload("", "application/octet-stream", b"", false),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "fail");
    assert_eq!(body["data"]["message"], NO_FILE_MESSAGE);
}

#[tokio::test]
async fn router_owner_gallery_and_unknown_update() {
    let dir = tempfile::tempdir().unwrap();
    let router = create_router(test_state_for(&dir, signed_in("u1")));

    send(&router, multipart_upload("clip.mp4", "video/mp4", b"mp4", false)).await;

    let (status, body) = send(&router, empty_request("GET", "/files/u1?view=gallery")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["view"], "gallery");
    assert_eq!(body["data"]["tiles"][0]["mediaKind"], "video");

    let (status, _) = send(&router, empty_request("GET", "/files/u2")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let request = Request::builder()
        .method("PUT")
        .uri("/files/missing")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"isPublished": true}"#))
        .unwrap();
    let (status, _) = send(&router, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn router_oversized_uploads_are_payload_too_large() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state_for(&dir, signed_in("u1"));
    let limit = state.config.max_upload_size as usize;
    let router = create_router(state);

    // Past the upload limit but inside the body limit
    let (status, _) = send(
        &router,
        multipart_upload("big.png", "image/png", &vec![0u8; limit + 1], false),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

    // Base64 inflates the payload past the body limit
    let (status, body) = send(
        &router,
        json_upload("big.png", "image/png", &vec![0u8; limit + limit / 4], false),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["status"], "fail");

    // Multipart past the body limit is cut off while streaming
    let (status, _) = send(
        &router,
        multipart_upload("huge.png", "image/png", &vec![0u8; 2 * limit], false),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}
