//! Per-track transcoder process management.
//!
//! Each elementary stream gets its own ffmpeg process writing a rolling
//! fMP4 HLS rendition into the track's subdirectory. Video is stream-copied,
//! audio is encoded to AAC. Lifecycle events flow over a channel to the
//! session manager; the monitor task here is the sole owner of the child
//! process handle.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::probe::{TrackDescriptor, TrackKind};
use super::registry::{ProcessKey, ProcessRegistry};
use super::{HlsError, HlsResult};
use crate::config::HlsConfig;

/// Lifecycle events reported by a spawned transcoder process.
#[derive(Debug)]
pub enum TrackEvent {
    /// The process launched and was registered.
    Started { key: ProcessKey },
    /// The process completed normally (reached end of input).
    Ended { key: ProcessKey },
    /// The process exited abnormally while its session was still live.
    Failed { key: ProcessKey, reason: String },
}

/// Everything needed to launch one track's transcoder.
#[derive(Debug, Clone)]
pub struct TranscodeJob {
    pub source_url: String,
    pub session_id: String,
    pub track: TrackDescriptor,
    /// Ordinal among the session's audio tracks; ignored for video.
    pub ordinal: u32,
    /// Track subdirectory receiving playlist and segments.
    pub output_dir: PathBuf,
    /// Input seek position in seconds, applied before any output is produced.
    pub start_offset: Option<f64>,
}

impl TranscodeJob {
    fn key(&self) -> ProcessKey {
        match self.track.kind {
            TrackKind::Video => ProcessKey::video(&self.session_id),
            TrackKind::Audio => ProcessKey::audio(&self.session_id, self.ordinal),
        }
    }

    fn playlist_path(&self) -> PathBuf {
        self.output_dir.join("playlist.m3u8")
    }

    fn segment_pattern(&self) -> PathBuf {
        self.output_dir.join("segment_%05d.m4s")
    }
}

/// Launches and supervises one ffmpeg process per elementary stream.
#[derive(Clone)]
pub struct TrackTranscoder {
    config: HlsConfig,
    registry: Arc<ProcessRegistry>,
    events: mpsc::UnboundedSender<TrackEvent>,
}

impl TrackTranscoder {
    /// Creates a transcoder reporting to `registry` and emitting on `events`.
    pub fn new(
        config: HlsConfig,
        registry: Arc<ProcessRegistry>,
        events: mpsc::UnboundedSender<TrackEvent>,
    ) -> Self {
        Self {
            config,
            registry,
            events,
        }
    }

    /// Launches the transcoder process for one track.
    ///
    /// Returns as soon as the process is running and registered; runtime
    /// failures surface later as `TrackEvent::Failed` on the event channel,
    /// never as a return value here.
    ///
    /// # Errors
    /// - `HlsError::TrackSpawnFailed` - The process could not be launched
    pub fn spawn(&self, job: TranscodeJob) -> HlsResult<()> {
        let key = job.key();
        let args = build_ffmpeg_args(&self.config, &job);

        debug!("Launching transcoder {}: ffmpeg {}", key, args.join(" "));

        let mut child = tokio::process::Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| HlsError::TrackSpawnFailed {
                reason: format!("Failed to execute ffmpeg for {key}: {e}"),
            })?;

        let pid = child.id();
        let (kill_tx, kill_rx) = oneshot::channel();
        self.registry.register(key.clone(), pid, kill_tx);

        info!("Transcoder {} started (pid {:?})", key, pid);
        let _ = self.events.send(TrackEvent::Started { key: key.clone() });

        let session_dir = self.config.session_root.join(&job.session_id);
        let registry = Arc::clone(&self.registry);
        let events = self.events.clone();

        tokio::spawn(async move {
            // Drain stderr so ffmpeg never blocks on a full pipe; with
            // -loglevel error the captured output stays small.
            let stderr_task = child.stderr.take().map(|mut stderr| {
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let _ = stderr.read_to_end(&mut buf).await;
                    buf
                })
            });

            tokio::select! {
                _ = kill_rx => {
                    // Forceful stop requested; the registry entry is already gone.
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    if let Some(task) = stderr_task {
                        task.abort();
                    }
                    debug!("Transcoder {} killed", key);
                }
                status = child.wait() => {
                    let stderr = match stderr_task {
                        Some(task) => task.await.unwrap_or_default(),
                        None => Vec::new(),
                    };
                    handle_exit(status, &key, &session_dir, &registry, &events, &stderr);
                }
            }
        });

        Ok(())
    }
}

/// Classifies a transcoder exit and reports it.
///
/// A failure after the session directory is gone means the session was
/// already torn down; reporting it would cascade into a second cleanup.
fn handle_exit(
    status: std::io::Result<std::process::ExitStatus>,
    key: &ProcessKey,
    session_dir: &std::path::Path,
    registry: &ProcessRegistry,
    events: &mpsc::UnboundedSender<TrackEvent>,
    stderr: &[u8],
) {
    match status {
        Ok(status) if status.success() => {
            registry.deregister(key);
            info!("Transcoder {} ended", key);
            let _ = events.send(TrackEvent::Ended { key: key.clone() });
        }
        exit => {
            if !session_dir.exists() {
                // Teardown already removed the entry in the common case;
                // deregistering again is a no-op.
                registry.deregister(key);
                debug!("Ignoring exit of {} for torn-down session", key);
                return;
            }

            let reason = match exit {
                Ok(status) => format!("ffmpeg exited with {status}: {}", stderr_tail(stderr)),
                Err(e) => format!("Failed to reap ffmpeg: {e}"),
            };

            registry.deregister(key);
            warn!("Transcoder {} failed: {}", key, reason);
            let _ = events.send(TrackEvent::Failed {
                key: key.clone(),
                reason,
            });
        }
    }
}

/// Last portion of captured stderr, enough to identify the failure.
fn stderr_tail(stderr: &[u8]) -> String {
    const TAIL_CHARS: usize = 512;
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    match trimmed.char_indices().nth_back(TAIL_CHARS) {
        Some((offset, _)) => format!("...{}", &trimmed[offset..]),
        None => trimmed.to_string(),
    }
}

/// Builds the ffmpeg argument list mapping exactly one elementary stream
/// to an fMP4 HLS rendition.
fn build_ffmpeg_args(config: &HlsConfig, job: &TranscodeJob) -> Vec<String> {
    let mut args = vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
    ];

    // Seek must precede the input so no pre-offset output is produced
    if let Some(offset) = job.start_offset {
        args.push("-ss".to_string());
        args.push(format!("{offset}"));
    }

    args.push("-i".to_string());
    args.push(job.source_url.clone());
    args.push("-map".to_string());
    args.push(format!("0:{}", job.track.index));

    match job.track.kind {
        TrackKind::Video => {
            args.push("-c:v".to_string());
            args.push("copy".to_string());
        }
        TrackKind::Audio => {
            args.push("-c:a".to_string());
            args.push("aac".to_string());
            args.push("-b:a".to_string());
            args.push(config.audio_bitrate.to_string());
        }
    }

    args.extend([
        "-f".to_string(),
        "hls".to_string(),
        "-hls_time".to_string(),
        config.segment_duration.as_secs().to_string(),
        "-hls_segment_type".to_string(),
        "fmp4".to_string(),
        "-hls_playlist_type".to_string(),
        "event".to_string(),
        "-hls_fmp4_init_filename".to_string(),
        "init.mp4".to_string(),
        "-hls_segment_filename".to_string(),
        job.segment_pattern().to_string_lossy().into_owned(),
    ]);

    args.push(job.playlist_path().to_string_lossy().into_owned());

    args
}
