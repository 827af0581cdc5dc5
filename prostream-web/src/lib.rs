//! Prostream Web - HTTP API and media delivery
//!
//! Exposes session management endpoints, session-file delivery for HLS
//! playback, and direct byte-range file streaming.

pub mod handlers;
pub mod server;

pub use server::{AppState, build_router, run_server};
