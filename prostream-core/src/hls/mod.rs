//! Live HLS packaging engine.
//!
//! Turns a direct-download media URL into an adaptive HLS presentation on
//! demand: probe the source, run one ffmpeg process per elementary stream,
//! wait for each rendition playlist to become playable, then synthesize the
//! master manifest. Sessions live entirely on the filesystem; the process
//! registry is the only in-memory shared state.

pub mod manifest;
pub mod probe;
pub mod readiness;
pub mod reaper;
pub mod registry;
pub mod session;
pub mod transcoder;

pub use manifest::build_master_manifest;
pub use probe::{FfprobeProber, MediaProber, TrackDescriptor, TrackKind};
pub use readiness::{playlist_ready, wait_for};
pub use reaper::SessionReaper;
pub use registry::{ProcessKey, ProcessRegistry};
pub use session::{SessionHandle, SessionManager};
pub use transcoder::{TrackEvent, TrackTranscoder, TranscodeJob};

/// Errors that can occur during HLS session orchestration.
#[derive(Debug, thiserror::Error)]
pub enum HlsError {
    /// The inspection tool could not analyze the source.
    #[error("Probe failed: {reason}")]
    ProbeFailed {
        /// Error output from the probe invocation.
        reason: String,
    },

    /// The source has no usable video stream.
    #[error("Source has no video track")]
    NoVideoTrack,

    /// A transcoding process could not be launched.
    #[error("Failed to start transcoder: {reason}")]
    TrackSpawnFailed {
        /// The reason the spawn failed.
        reason: String,
    },

    /// A track's playlist never became playable within the wait window.
    #[error("Track {key} produced no playable output before timeout")]
    TrackStartTimeout {
        /// Process key of the track that timed out.
        key: String,
    },

    /// A transcoding process exited abnormally mid-session.
    #[error("Track {key} failed at runtime: {reason}")]
    TrackRuntimeFailure {
        /// Process key of the failed track.
        key: String,
        /// Error output captured from the process.
        reason: String,
    },

    /// I/O error occurred during a specific operation.
    #[error("IO error during {operation}: {source}")]
    Io {
        /// Description of the operation that failed.
        operation: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl HlsError {
    /// Wraps an I/O error with the operation that produced it.
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }
}

/// Result type for HLS operations.
pub type HlsResult<T> = Result<T, HlsError>;
