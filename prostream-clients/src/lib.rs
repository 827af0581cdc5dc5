//! Prostream Clients - External service integration
//!
//! Thin typed wrappers over the services the gateway composes: TMDB for
//! movie metadata, Prowlarr for release search, and AllDebrid for turning
//! releases into directly streamable links.

pub mod debrid;
pub mod errors;
pub mod prowlarr;
pub mod tmdb;
pub mod types;

// Re-export main types
pub use debrid::{AllDebridClient, DebridClient, info_hash_from_torrent};
pub use errors::ClientError;
pub use prowlarr::{IndexerClient, ProwlarrClient};
pub use tmdb::{MetadataClient, TmdbClient, TrendingWindow};

/// Convenience type alias for Results with ClientError.
pub type Result<T> = std::result::Result<T, ClientError>;
