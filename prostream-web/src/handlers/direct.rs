//! Direct single-file playback with HTTP Range support.
//!
//! Serves an already-downloaded media file straight from disk. Players
//! issue closed and open-ended byte ranges while seeking; responses carry
//! exactly the requested span.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use axum::extract::Path as RoutePath;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

use super::range::{extract_range_header, parse_range_header, validate_range};

/// `GET /file/{*path}` - stream a local file with byte-range support.
///
/// The wildcard captures the percent-encoded absolute path of the file.
pub async fn serve_direct_file(RoutePath(path): RoutePath<String>, headers: HeaderMap) -> Response {
    let decoded = match urlencoding::decode(&path) {
        Ok(decoded) => decoded.into_owned(),
        Err(e) => {
            debug!("Undecodable file path: {}", e);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    // Wildcard captures strip the leading slash of absolute paths
    let file_path = if decoded.starts_with('/') {
        PathBuf::from(decoded)
    } else {
        PathBuf::from(format!("/{decoded}"))
    };

    serve_file_with_range(&file_path, &headers).await
}

/// Serves a file honoring an optional single byte range.
///
/// No `Range` header yields a full 200 response. A satisfiable range
/// yields 206 with `Content-Range`; a start beyond EOF yields 416.
/// Malformed range values fall back to the full response.
pub async fn serve_file_with_range(path: &Path, headers: &HeaderMap) -> Response {
    let total_size = match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => meta.len(),
        _ => return StatusCode::NOT_FOUND.into_response(),
    };

    let range = extract_range_header(headers).and_then(|value| parse_range_header(value, total_size));

    let Some((start, end)) = range else {
        let body = match tokio::fs::read(path).await {
            Ok(body) => body,
            Err(_) => return StatusCode::NOT_FOUND.into_response(),
        };
        return (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "video/mp4".to_string()),
                (header::CONTENT_LENGTH, total_size.to_string()),
                (header::ACCEPT_RANGES, "bytes".to_string()),
            ],
            body,
        )
            .into_response();
    };

    if validate_range(start, end, total_size).is_err() {
        return (
            StatusCode::RANGE_NOT_SATISFIABLE,
            [(header::CONTENT_RANGE, format!("bytes */{total_size}"))],
        )
            .into_response();
    }

    let body = match read_span(path, start, end).await {
        Ok(body) => body,
        Err(e) => {
            debug!("Range read of {} failed: {}", path.display(), e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    (
        StatusCode::PARTIAL_CONTENT,
        [
            (header::CONTENT_TYPE, "video/mp4".to_string()),
            (
                header::CONTENT_RANGE,
                format!("bytes {start}-{end}/{total_size}"),
            ),
            (header::CONTENT_LENGTH, (end - start + 1).to_string()),
            (header::ACCEPT_RANGES, "bytes".to_string()),
        ],
        body,
    )
        .into_response()
}

async fn read_span(path: &Path, start: u64, end: u64) -> std::io::Result<Vec<u8>> {
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(SeekFrom::Start(start)).await?;

    let mut buffer = vec![0u8; (end - start + 1) as usize];
    file.read_exact(&mut buffer).await?;
    Ok(buffer)
}
