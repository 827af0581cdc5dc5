//! HTTP Range request handling for direct file streaming
//!
//! Implements the single-range subset of RFC 7233 used by media players:
//! `bytes=start-end` and the open-ended `bytes=start-`.

use axum::http::HeaderMap;

/// Parse an HTTP Range header value against a known file size.
///
/// Returns the inclusive `(start, end)` byte span, with a missing end
/// defaulting to `total_size - 1`. Returns `None` for malformed values,
/// multi-range requests, or suffix ranges, which callers treat as a full
/// response.
pub fn parse_range_header(range: &str, total_size: u64) -> Option<(u64, u64)> {
    let spec = range.strip_prefix("bytes=")?;
    let (start_str, end_str) = spec.split_once('-')?;

    let start = start_str.parse::<u64>().ok()?;
    let end = if end_str.is_empty() {
        total_size.saturating_sub(1)
    } else {
        end_str.parse::<u64>().ok()?
    };

    Some((start, end.min(total_size.saturating_sub(1))))
}

/// Validate a parsed range against the file size.
///
/// # Errors
/// Returns `Err(())` when the range cannot be satisfied (start beyond EOF
/// or inverted), which maps to 416 Range Not Satisfiable.
pub fn validate_range(start: u64, end: u64, total_size: u64) -> Result<(), ()> {
    if total_size == 0 || start >= total_size || start > end {
        return Err(());
    }
    Ok(())
}

/// Extract the Range header value from request headers.
pub fn extract_range_header(headers: &HeaderMap) -> Option<&str> {
    headers.get("range").and_then(|value| value.to_str().ok())
}
