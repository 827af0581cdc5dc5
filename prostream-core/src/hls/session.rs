//! Session lifecycle orchestration.
//!
//! A session moves through `Created -> Probing -> Transcoding -> Ready` and
//! ends as `Stopped`, `Expired` or `Failed`; all terminal states converge on
//! the same teardown. The filesystem is the session store: a session exists
//! exactly as long as its directory does, and the process registry holds its
//! running transcoders.

use std::path::PathBuf;
use std::sync::{Arc, Weak};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::manifest::{VIDEO_PLAYLIST, audio_dir, build_master_manifest};
use super::probe::{MediaProber, TrackDescriptor};
use super::readiness::{playlist_ready, wait_for};
use super::registry::{ProcessKey, ProcessRegistry};
use super::transcoder::{TrackEvent, TrackTranscoder, TranscodeJob};
use super::{HlsError, HlsResult};
use crate::config::ProstreamConfig;

/// Result of a successful session start.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionHandle {
    pub session_id: String,
    /// Deterministically derived from the session id.
    pub manifest_url: String,
}

/// Owns the lifecycle of streaming sessions.
pub struct SessionManager {
    config: ProstreamConfig,
    registry: Arc<ProcessRegistry>,
    prober: Arc<dyn MediaProber>,
    transcoder: TrackTranscoder,
}

impl SessionManager {
    /// Creates the manager and spawns its track-event pump.
    ///
    /// Must be called within a tokio runtime. Runtime track failures
    /// arriving on the event channel trigger teardown of their session.
    pub fn new(
        config: ProstreamConfig,
        registry: Arc<ProcessRegistry>,
        prober: Arc<dyn MediaProber>,
    ) -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let transcoder =
            TrackTranscoder::new(config.hls.clone(), Arc::clone(&registry), events_tx);

        let manager = Arc::new(Self {
            config,
            registry,
            prober,
            transcoder,
        });

        spawn_event_pump(Arc::downgrade(&manager), events_rx);

        manager
    }

    /// Starts a streaming session for a source URL.
    ///
    /// Blocks until every track's playlist is confirmed playable or a
    /// bounded wait elapses. On any failure the partially-built session is
    /// torn down before the error propagates; no half-initialized session
    /// is ever reachable.
    ///
    /// # Errors
    /// - `HlsError::ProbeFailed` - The source could not be analyzed
    /// - `HlsError::NoVideoTrack` - The source has no video stream
    /// - `HlsError::TrackSpawnFailed` - A transcoder could not be launched
    /// - `HlsError::TrackStartTimeout` - A playlist never became playable
    /// - `HlsError::Io` - Session directory or manifest writes failed
    pub async fn start_session(
        &self,
        source_url: &str,
        start_offset: Option<f64>,
    ) -> HlsResult<SessionHandle> {
        let session_id = uuid::Uuid::new_v4().simple().to_string();
        info!("Starting session {} for {}", session_id, source_url);

        match self.launch(&session_id, source_url, start_offset).await {
            Ok(handle) => {
                info!("Session {} ready at {}", session_id, handle.manifest_url);
                Ok(handle)
            }
            Err(e) => {
                warn!("Session {} failed to start: {}", session_id, e);
                self.teardown(&session_id).await;
                Err(e)
            }
        }
    }

    async fn launch(
        &self,
        session_id: &str,
        source_url: &str,
        start_offset: Option<f64>,
    ) -> HlsResult<SessionHandle> {
        let session_dir = self.session_dir(session_id);
        tokio::fs::create_dir_all(&session_dir)
            .await
            .map_err(|e| HlsError::io("create session directory", e))?;

        let tracks = self.prober.probe(source_url).await?;
        let video = tracks
            .iter()
            .find(|track| track.is_video())
            .ok_or(HlsError::NoVideoTrack)?;
        let audio_tracks: Vec<&TrackDescriptor> =
            tracks.iter().filter(|track| !track.is_video()).collect();

        debug!(
            "Session {}: 1 video + {} audio tracks",
            session_id,
            audio_tracks.len()
        );

        // One transcoder per elementary stream, each into its own subdirectory
        let mut playlists = Vec::new();

        let video_dir = session_dir.join("video");
        tokio::fs::create_dir_all(&video_dir)
            .await
            .map_err(|e| HlsError::io("create video track directory", e))?;
        self.transcoder.spawn(TranscodeJob {
            source_url: source_url.to_string(),
            session_id: session_id.to_string(),
            track: (*video).clone(),
            ordinal: 0,
            output_dir: video_dir.clone(),
            start_offset,
        })?;
        playlists.push((
            ProcessKey::video(session_id),
            session_dir.join(VIDEO_PLAYLIST),
        ));

        for (ordinal, track) in audio_tracks.iter().enumerate() {
            let ordinal = ordinal as u32;
            let track_dir = session_dir.join(audio_dir(ordinal));
            tokio::fs::create_dir_all(&track_dir)
                .await
                .map_err(|e| HlsError::io("create audio track directory", e))?;
            self.transcoder.spawn(TranscodeJob {
                source_url: source_url.to_string(),
                session_id: session_id.to_string(),
                track: (*track).clone(),
                ordinal,
                output_dir: track_dir.clone(),
                start_offset,
            })?;
            playlists.push((
                ProcessKey::audio(session_id, ordinal),
                track_dir.join("playlist.m3u8"),
            ));
        }

        // A master manifest referencing an absent rendition would be served
        // to players, so every playlist must exist before it is written
        for (key, playlist) in &playlists {
            wait_for(
                || playlist_ready(playlist),
                self.config.hls.playlist_poll_interval,
                self.config.hls.playlist_wait_timeout,
            )
            .await
            .map_err(|_| HlsError::TrackStartTimeout {
                key: key.to_string(),
            })?;
        }

        let audio_owned: Vec<TrackDescriptor> =
            audio_tracks.iter().map(|track| (*track).clone()).collect();
        let manifest =
            build_master_manifest(video, &audio_owned, self.config.hls.fallback_bandwidth);
        tokio::fs::write(session_dir.join("master.m3u8"), manifest)
            .await
            .map_err(|e| HlsError::io("write master manifest", e))?;

        Ok(SessionHandle {
            session_id: session_id.to_string(),
            manifest_url: format!(
                "{}/session/{}/master.m3u8",
                self.config.server.base_path, session_id
            ),
        })
    }

    /// Stops a session: kills its transcoders and removes its directory.
    ///
    /// Idempotent; unknown or already-removed session ids are a silent
    /// no-op, so racing callers (explicit stop, reaper, runtime-failure
    /// cleanup) cannot double-free.
    pub async fn stop_session(&self, session_id: &str) {
        if !valid_session_id(session_id) {
            debug!("Ignoring stop for malformed session id");
            return;
        }
        self.teardown(session_id).await;
    }

    /// Tears down whatever remains of a session.
    ///
    /// Directory existence is checked first: a second teardown attempt
    /// finds nothing and exits before issuing any kills.
    pub(crate) async fn teardown(&self, session_id: &str) {
        let session_dir = self.session_dir(session_id);
        if !session_dir.exists() {
            debug!("Teardown skipped, session {} already gone", session_id);
            return;
        }

        let killed = self.registry.kill_session(session_id);
        if let Err(e) = tokio::fs::remove_dir_all(&session_dir).await {
            warn!(
                "Failed to remove session directory {}: {}",
                session_dir.display(),
                e
            );
        }

        info!(
            "Session {} torn down ({} processes killed)",
            session_id, killed
        );
    }

    /// Absolute directory of a session (which may or may not exist).
    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.config.hls.session_root.join(session_id)
    }

    /// Root directory holding all session directories.
    pub fn session_root(&self) -> &std::path::Path {
        &self.config.hls.session_root
    }

    /// Lists the ids of all sessions currently on disk.
    ///
    /// # Errors
    /// - `HlsError::Io` - The session root could not be read
    pub fn list_sessions(&self) -> HlsResult<Vec<String>> {
        let entries = std::fs::read_dir(&self.config.hls.session_root)
            .map_err(|e| HlsError::io("list session root", e))?;

        let mut sessions = Vec::new();
        for entry in entries.flatten() {
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                sessions.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(sessions)
    }
}

/// Session ids are generated as hex uuids; anything else (separators,
/// traversal attempts) is rejected before touching the filesystem.
fn valid_session_id(session_id: &str) -> bool {
    !session_id.is_empty() && session_id.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Consumes track events; a runtime failure invalidates its whole session
/// since the master manifest references every rendition.
fn spawn_event_pump(manager: Weak<SessionManager>, mut events: mpsc::UnboundedReceiver<TrackEvent>) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let Some(manager) = manager.upgrade() else {
                break;
            };
            match event {
                TrackEvent::Started { key } => debug!("Track {} started", key),
                TrackEvent::Ended { key } => debug!("Track {} ended", key),
                TrackEvent::Failed { key, reason } => {
                    let error = HlsError::TrackRuntimeFailure {
                        key: key.to_string(),
                        reason,
                    };
                    warn!(
                        "{}; tearing down session {}",
                        error,
                        key.session_id()
                    );
                    manager.teardown(key.session_id()).await;
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::hls::probe::TrackKind;

    struct MockProber {
        tracks: Vec<TrackDescriptor>,
        fail: bool,
    }

    #[async_trait]
    impl MediaProber for MockProber {
        async fn probe(&self, _source_url: &str) -> HlsResult<Vec<TrackDescriptor>> {
            if self.fail {
                return Err(HlsError::ProbeFailed {
                    reason: "mock probe failure".to_string(),
                });
            }
            Ok(self.tracks.clone())
        }
    }

    fn video_track() -> TrackDescriptor {
        TrackDescriptor {
            index: 0,
            kind: TrackKind::Video,
            codec: "h264".to_string(),
            width: Some(1920),
            height: Some(1080),
            bit_rate: Some(4_000_000),
            language: "und".to_string(),
        }
    }

    fn audio_track(index: u32, language: &str) -> TrackDescriptor {
        TrackDescriptor {
            index,
            kind: TrackKind::Audio,
            codec: "ac3".to_string(),
            width: None,
            height: None,
            bit_rate: None,
            language: language.to_string(),
        }
    }

    /// Fake ffmpeg: writes a playlist to its final argument, then idles
    /// until killed. Exits non-zero if asked to via FAKE_FFMPEG_FAIL.
    fn write_fake_ffmpeg(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-ffmpeg.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn manager_with(
        dir: &TempDir,
        prober: MockProber,
        ffmpeg_body: &str,
    ) -> Arc<SessionManager> {
        let mut config = ProstreamConfig::for_testing(dir.path().join("sessions"));
        config.hls.playlist_wait_timeout = Duration::from_secs(2);
        config.hls.ffmpeg_path = write_fake_ffmpeg(dir.path(), ffmpeg_body);
        SessionManager::new(
            config,
            Arc::new(ProcessRegistry::new()),
            Arc::new(prober),
        )
    }

    const WRITE_PLAYLIST_AND_IDLE: &str =
        r##"for last; do :; done; echo "#EXTM3U" > "$last"; exec sleep 60"##;

    #[tokio::test]
    async fn test_start_session_with_audio() {
        let dir = TempDir::new().unwrap();
        let prober = MockProber {
            tracks: vec![video_track(), audio_track(1, "eng"), audio_track(2, "fra")],
            fail: false,
        };
        let manager = manager_with(&dir, prober, WRITE_PLAYLIST_AND_IDLE);

        let handle = manager
            .start_session("http://example.com/movie.mkv", None)
            .await
            .unwrap();

        assert_eq!(
            handle.manifest_url,
            format!("/streaming/session/{}/master.m3u8", handle.session_id)
        );

        let manifest =
            std::fs::read_to_string(manager.session_dir(&handle.session_id).join("master.m3u8"))
                .unwrap();
        assert_eq!(manifest.matches("#EXT-X-MEDIA").count(), 2);
        assert_eq!(manifest.matches("DEFAULT=YES").count(), 1);
        assert!(manifest.contains("AUDIO=\"audio\""));

        // The video rendition lives exactly where the manifest points
        assert!(
            manager
                .session_dir(&handle.session_id)
                .join(VIDEO_PLAYLIST)
                .is_file()
        );

        // 1 video + 2 audio transcoders registered
        assert_eq!(manager.registry.active_count(), 3);

        manager.stop_session(&handle.session_id).await;
        assert!(!manager.session_dir(&handle.session_id).exists());
        assert_eq!(manager.registry.active_count(), 0);

        // Idempotent: a second stop is a silent no-op
        manager.stop_session(&handle.session_id).await;
    }

    #[tokio::test]
    async fn test_start_session_without_audio() {
        let dir = TempDir::new().unwrap();
        let prober = MockProber {
            tracks: vec![video_track()],
            fail: false,
        };
        let manager = manager_with(&dir, prober, WRITE_PLAYLIST_AND_IDLE);

        let handle = manager
            .start_session("http://example.com/movie.mkv", None)
            .await
            .unwrap();

        let manifest =
            std::fs::read_to_string(manager.session_dir(&handle.session_id).join("master.m3u8"))
                .unwrap();
        assert!(!manifest.contains("#EXT-X-MEDIA"));
        assert!(!manifest.contains("AUDIO="));

        manager.stop_session(&handle.session_id).await;
    }

    #[tokio::test]
    async fn test_probe_failure_leaves_no_directory() {
        let dir = TempDir::new().unwrap();
        let prober = MockProber {
            tracks: vec![],
            fail: true,
        };
        let manager = manager_with(&dir, prober, WRITE_PLAYLIST_AND_IDLE);

        let result = manager.start_session("http://example.com/bad.mkv", None).await;

        assert!(matches!(result, Err(HlsError::ProbeFailed { .. })));
        assert!(manager.list_sessions().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_video_track_fails() {
        let dir = TempDir::new().unwrap();
        let prober = MockProber {
            tracks: vec![audio_track(0, "eng")],
            fail: false,
        };
        let manager = manager_with(&dir, prober, WRITE_PLAYLIST_AND_IDLE);

        let result = manager.start_session("http://example.com/audio.mka", None).await;

        assert!(matches!(result, Err(HlsError::NoVideoTrack)));
        assert!(manager.list_sessions().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_playlist_timeout_tears_down() {
        let dir = TempDir::new().unwrap();
        let prober = MockProber {
            tracks: vec![video_track()],
            fail: false,
        };
        // Fake ffmpeg that idles without ever writing a playlist
        let manager = manager_with(&dir, prober, "exec sleep 60");

        let result = manager.start_session("http://example.com/movie.mkv", None).await;

        assert!(matches!(result, Err(HlsError::TrackStartTimeout { .. })));
        assert!(manager.list_sessions().unwrap().is_empty());
        assert_eq!(manager.registry.active_count(), 0);
    }

    #[tokio::test]
    async fn test_runtime_failure_triggers_teardown() {
        let dir = TempDir::new().unwrap();
        let prober = MockProber {
            tracks: vec![video_track()],
            fail: false,
        };
        // Produces a playlist, then dies mid-session
        let manager = manager_with(
            &dir,
            prober,
            r##"for last; do :; done; echo "#EXTM3U" > "$last"; sleep 0.2; exit 1"##,
        );

        let handle = manager
            .start_session("http://example.com/movie.mkv", None)
            .await
            .unwrap();

        let session_dir = manager.session_dir(&handle.session_id);
        let gone = wait_for(
            || async { !session_dir.exists() },
            Duration::from_millis(20),
            Duration::from_secs(2),
        )
        .await;

        assert!(gone.is_ok(), "session should be torn down after track failure");
        assert_eq!(manager.registry.active_count(), 0);
    }

    #[tokio::test]
    async fn test_stop_unknown_session_is_noop() {
        let dir = TempDir::new().unwrap();
        let prober = MockProber {
            tracks: vec![],
            fail: false,
        };
        let manager = manager_with(&dir, prober, WRITE_PLAYLIST_AND_IDLE);
        std::fs::create_dir_all(manager.session_root()).unwrap();

        manager.stop_session("deadbeef").await;
        manager.stop_session("../escape").await;

        assert!(manager.list_sessions().unwrap().is_empty());
    }
}
