//! Poll-with-deadline readiness checking.
//!
//! Session startup needs to wait for external processes to produce output
//! files. The waiting semantics (fixed poll interval, hard deadline) live
//! here once instead of in ad hoc loops.

use std::path::Path;
use std::time::Duration;

/// The awaited condition did not become true before the deadline.
#[derive(Debug, thiserror::Error)]
#[error("Condition not met within {timeout:?}")]
pub struct WaitTimeout {
    /// The deadline that elapsed.
    pub timeout: Duration,
}

/// Polls `predicate` at `interval` until it returns true or `timeout` elapses.
///
/// The predicate is evaluated immediately, then once per interval tick.
///
/// # Errors
/// - `WaitTimeout` - The deadline elapsed with the predicate still false
pub async fn wait_for<F, Fut>(
    mut predicate: F,
    interval: Duration,
    timeout: Duration,
) -> Result<(), WaitTimeout>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let poll = async {
        loop {
            if predicate().await {
                return;
            }
            tokio::time::sleep(interval).await;
        }
    };

    tokio::time::timeout(timeout, poll)
        .await
        .map_err(|_| WaitTimeout { timeout })
}

/// Whether a rendition playlist is playable: the file exists and is non-empty.
pub async fn playlist_ready(path: &Path) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata.is_file() && metadata.len() > 0,
        Err(_) => false,
    }
}
