//! Session lifecycle and session-file delivery endpoints.

use std::path::Path;

use axum::Json;
use axum::extract::{Path as RoutePath, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use prostream_core::hls::HlsError;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub url: String,
    #[serde(default)]
    pub start_offset: Option<f64>,
}

/// `POST /session` - start a streaming session for a source URL.
///
/// Responds once the master manifest is playable. Start failures map to
/// statuses a player can act on: an unusable source is the client's
/// problem, a broken upstream or transcoder is ours.
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<StartSessionRequest>,
) -> Response {
    match state
        .session_manager
        .start_session(&request.url, request.start_offset)
        .await
    {
        Ok(handle) => Json(handle).into_response(),
        Err(e) => {
            let status = match &e {
                HlsError::NoVideoTrack => StatusCode::UNPROCESSABLE_ENTITY,
                HlsError::ProbeFailed { .. } => StatusCode::BAD_GATEWAY,
                HlsError::TrackStartTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            warn!("Session start rejected with {}: {}", status, e);
            (
                status,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// `DELETE /session/{session_id}` - stop a session.
///
/// Always reports success; stopping an unknown or already-stopped session
/// is a no-op.
pub async fn stop_session(
    State(state): State<AppState>,
    RoutePath(session_id): RoutePath<String>,
) -> Json<serde_json::Value> {
    state.session_manager.stop_session(&session_id).await;
    Json(serde_json::json!({ "stopped": true }))
}

/// `GET /session/{session_id}/{*path}` - serve a manifest or segment.
pub async fn serve_session_file(
    State(state): State<AppState>,
    RoutePath((session_id, file_path)): RoutePath<(String, String)>,
) -> Response {
    if !session_id.chars().all(|c| c.is_ascii_alphanumeric()) || session_id.is_empty() {
        return StatusCode::NOT_FOUND.into_response();
    }

    let session_dir = state.session_manager.session_dir(&session_id);
    let max_age = state.config.server.cache_max_age.as_secs();
    serve_from_session_dir(&session_dir, &file_path, max_age).await
}

/// Reads a file from within a session directory and wraps it with the
/// delivery headers players expect.
///
/// The requested path is canonicalized and must remain inside the session
/// directory; escapes and missing files are indistinguishable 404s.
pub(crate) async fn serve_from_session_dir(
    session_dir: &Path,
    file_path: &str,
    cache_max_age: u64,
) -> Response {
    let Ok(session_dir) = session_dir.canonicalize() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let Ok(target) = session_dir.join(file_path).canonicalize() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    if !target.starts_with(&session_dir) {
        warn!("Rejected path escaping session directory: {}", file_path);
        return StatusCode::NOT_FOUND.into_response();
    }

    let body = match tokio::fs::read(&target).await {
        Ok(body) => body,
        Err(e) => {
            debug!("Session file {} unreadable: {}", target.display(), e);
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type_for(&target).to_string()),
            (
                header::CACHE_CONTROL,
                format!("max-age={cache_max_age}"),
            ),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*".to_string()),
        ],
        body,
    )
        .into_response()
}

/// Content type by file extension. HLS players are strict about manifest
/// types but treat fMP4 init and media segments identically.
fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("m3u8") => "application/x-mpegURL",
        Some("m4s") | Some("mp4") | Some("init") => "video/mp4",
        Some("ts") => "video/mp2t",
        Some("vtt") => "text/vtt",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use tempfile::TempDir;

    use super::*;

    fn seed(dir: &TempDir, relative: &str, contents: &[u8]) -> PathBuf {
        let path = dir.path().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_content_type_table() {
        assert_eq!(
            content_type_for(Path::new("master.m3u8")),
            "application/x-mpegURL"
        );
        assert_eq!(content_type_for(Path::new("segment_00001.m4s")), "video/mp4");
        assert_eq!(content_type_for(Path::new("init.mp4")), "video/mp4");
        assert_eq!(content_type_for(Path::new("seg.ts")), "video/mp2t");
        assert_eq!(content_type_for(Path::new("subs.vtt")), "text/vtt");
        assert_eq!(
            content_type_for(Path::new("mystery.bin")),
            "application/octet-stream"
        );
    }

    #[tokio::test]
    async fn test_serves_file_with_delivery_headers() {
        let dir = TempDir::new().unwrap();
        seed(&dir, "video/playlist.m3u8", b"#EXTM3U\n");

        let response = serve_from_session_dir(dir.path(), "video/playlist.m3u8", 3600).await;

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers["content-type"], "application/x-mpegURL");
        assert_eq!(headers["cache-control"], "max-age=3600");
        assert_eq!(headers["access-control-allow-origin"], "*");
    }

    #[tokio::test]
    async fn test_missing_file_is_404() {
        let dir = TempDir::new().unwrap();

        let response = serve_from_session_dir(dir.path(), "video/playlist.m3u8", 3600).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_traversal_escape_is_404() {
        let dir = TempDir::new().unwrap();
        let session_dir = dir.path().join("session1");
        std::fs::create_dir_all(&session_dir).unwrap();
        std::fs::write(dir.path().join("secret.txt"), b"secret").unwrap();

        let response = serve_from_session_dir(&session_dir, "../secret.txt", 3600).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
