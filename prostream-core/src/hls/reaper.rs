//! Stale session cleanup.
//!
//! A periodic sweep stops sessions whose files have not been touched within
//! the expiry window (abandoned players rarely say goodbye), and a shutdown
//! sweep tears down every live session when the process exits.

use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::session::SessionManager;
use crate::config::ReaperConfig;

/// Background reaper of expired streaming sessions.
pub struct SessionReaper {
    manager: Arc<SessionManager>,
    config: ReaperConfig,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionReaper {
    /// Creates the reaper and starts its periodic sweep task.
    ///
    /// Must be called within a tokio runtime.
    pub fn spawn(manager: Arc<SessionManager>, config: ReaperConfig) -> Arc<Self> {
        let reaper = Arc::new(Self {
            manager,
            config,
            task: Mutex::new(None),
        });

        let periodic = Arc::clone(&reaper);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(periodic.config.sweep_interval);
            // The immediate first tick would sweep an empty root
            ticker.tick().await;
            loop {
                ticker.tick().await;
                periodic.sweep().await;
            }
        });

        *reaper.task.lock() = Some(handle);
        reaper
    }

    /// Stops every session idle longer than the expiry window.
    ///
    /// Stat failures on individual directories are logged and skipped;
    /// they never abort the sweep.
    pub async fn sweep(&self) {
        let sessions = match self.manager.list_sessions() {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!("Reaper sweep could not list sessions: {}", e);
                return;
            }
        };

        debug!("Reaper sweep over {} sessions", sessions.len());

        for session_id in sessions {
            let dir = self.manager.session_dir(&session_id);
            let idle = match last_activity(&dir) {
                Ok(touched) => SystemTime::now()
                    .duration_since(touched)
                    .unwrap_or_default(),
                Err(e) => {
                    warn!("Skipping unstatable session {}: {}", session_id, e);
                    continue;
                }
            };

            if idle > self.config.session_expiry {
                info!(
                    "Reaping session {} (idle {}s)",
                    session_id,
                    idle.as_secs()
                );
                self.manager.stop_session(&session_id).await;
            }
        }
    }

    /// Halts the periodic timer and tears down every live session.
    ///
    /// A listing failure is logged; shutdown proceeds regardless.
    pub async fn shutdown(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }

        match self.manager.list_sessions() {
            Ok(sessions) => {
                info!("Shutdown sweep over {} sessions", sessions.len());
                for session_id in sessions {
                    self.manager.stop_session(&session_id).await;
                }
            }
            Err(e) => warn!("Shutdown sweep could not list sessions: {}", e),
        }
    }
}

/// Most recent modification time of a session directory or its track
/// subdirectories. Segment rotation touches the subdirectories, not the
/// session root, so both levels count as activity.
fn last_activity(dir: &Path) -> std::io::Result<SystemTime> {
    let mut latest = std::fs::metadata(dir)?.modified()?;

    for entry in std::fs::read_dir(dir)?.flatten() {
        if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
            latest = latest.max(modified);
        }
    }

    Ok(latest)
}
