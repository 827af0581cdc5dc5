//! Centralized configuration for Prostream.
//!
//! All tunable parameters live here to avoid hard-coded values scattered
//! throughout the codebase. Timeouts and intervals that govern session
//! startup and expiry are deliberately exposed rather than baked in.

use std::path::PathBuf;
use std::time::Duration;

/// Central configuration for all Prostream components.
///
/// Groups related settings into logical sections and supports
/// environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct ProstreamConfig {
    pub hls: HlsConfig,
    pub reaper: ReaperConfig,
    pub server: ServerConfig,
}

/// HLS packaging configuration.
///
/// Controls ffmpeg/ffprobe invocation and how long session startup waits
/// for each track's playlist to become playable.
#[derive(Debug, Clone)]
pub struct HlsConfig {
    /// Path to the ffmpeg binary
    pub ffmpeg_path: PathBuf,
    /// Path to the ffprobe binary
    pub ffprobe_path: PathBuf,
    /// Root directory under which session directories are created
    pub session_root: PathBuf,
    /// Target duration of each media segment
    pub segment_duration: Duration,
    /// Upper bound on waiting for a track playlist to appear
    pub playlist_wait_timeout: Duration,
    /// Interval between playlist readiness checks
    pub playlist_poll_interval: Duration,
    /// Audio bitrate passed to the AAC encoder
    pub audio_bitrate: &'static str,
    /// BANDWIDTH attribute used when the source reports no video bitrate
    pub fallback_bandwidth: u64,
}

impl Default for HlsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            session_root: PathBuf::from("sessions"),
            segment_duration: Duration::from_secs(4),
            playlist_wait_timeout: Duration::from_secs(60),
            playlist_poll_interval: Duration::from_millis(500),
            audio_bitrate: "128k",
            fallback_bandwidth: 2_000_000,
        }
    }
}

/// Stale-session cleanup configuration.
#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// Interval between sweeps of the session root
    pub sweep_interval: Duration,
    /// Sessions untouched for longer than this are stopped
    pub session_expiry: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(300),  // 5 minutes
            session_expiry: Duration::from_secs(3600), // 1 hour
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP server binds to
    pub bind_address: String,
    /// Listen port
    pub port: u16,
    /// URL prefix under which streaming routes are mounted
    pub base_path: String,
    /// Cache-Control max-age for served session files
    pub cache_max_age: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 3000,
            base_path: "/streaming".to_string(),
            cache_max_age: Duration::from_secs(3600),
        }
    }
}

impl ProstreamConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via `PROSTREAM_*` environment variables
    /// while maintaining sensible defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(root) = std::env::var("PROSTREAM_SESSION_ROOT") {
            config.hls.session_root = PathBuf::from(root);
        }

        if let Ok(path) = std::env::var("PROSTREAM_FFMPEG_PATH") {
            config.hls.ffmpeg_path = PathBuf::from(path);
        }

        if let Ok(path) = std::env::var("PROSTREAM_FFPROBE_PATH") {
            config.hls.ffprobe_path = PathBuf::from(path);
        }

        if let Ok(secs) = std::env::var("PROSTREAM_SEGMENT_DURATION") {
            if let Ok(value) = secs.parse::<u64>() {
                config.hls.segment_duration = Duration::from_secs(value);
            }
        }

        if let Ok(secs) = std::env::var("PROSTREAM_PLAYLIST_WAIT_TIMEOUT") {
            if let Ok(value) = secs.parse::<u64>() {
                config.hls.playlist_wait_timeout = Duration::from_secs(value);
            }
        }

        if let Ok(secs) = std::env::var("PROSTREAM_SESSION_EXPIRY") {
            if let Ok(value) = secs.parse::<u64>() {
                config.reaper.session_expiry = Duration::from_secs(value);
            }
        }

        if let Ok(port) = std::env::var("PROSTREAM_PORT") {
            if let Ok(value) = port.parse::<u16>() {
                config.server.port = value;
            }
        }

        config
    }

    /// Creates a configuration tuned for fast tests.
    ///
    /// Shrinks the readiness and expiry windows so timeout paths are
    /// exercised in milliseconds instead of minutes.
    pub fn for_testing(session_root: PathBuf) -> Self {
        let mut config = Self::default();
        config.hls.session_root = session_root;
        config.hls.playlist_wait_timeout = Duration::from_millis(200);
        config.hls.playlist_poll_interval = Duration::from_millis(20);
        config.reaper.sweep_interval = Duration::from_millis(50);
        config.reaper.session_expiry = Duration::from_millis(100);
        config
    }
}
