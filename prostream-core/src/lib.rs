//! Prostream Core - Live HLS packaging and session orchestration
//!
//! This crate provides the building blocks for on-demand adaptive
//! streaming of remote media files: source probing, per-track transcoder
//! supervision, session lifecycle management, stale-session reaping, and
//! configuration.

pub mod config;
pub mod hls;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use config::ProstreamConfig;
pub use hls::{
    FfprobeProber, HlsError, MediaProber, ProcessRegistry, SessionHandle, SessionManager,
    SessionReaper, TrackDescriptor,
};

/// Core errors that can bubble up from any Prostream subsystem.
#[derive(Debug, thiserror::Error)]
pub enum ProstreamError {
    #[error("Streaming error: {0}")]
    Hls(#[from] HlsError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProstreamError>;
