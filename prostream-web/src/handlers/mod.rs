//! HTTP request handlers.

pub mod direct;
pub mod range;
pub mod sessions;

pub use direct::serve_direct_file;
pub use sessions::{create_session, serve_session_file, stop_session};
