//! Shared response types for the external API clients.
//!
//! Field names follow each upstream API's JSON, renamed to Rust
//! conventions where they differ.

use serde::{Deserialize, Serialize};

/// One movie entry in a TMDB search or listing page.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MovieSummary {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub genre_ids: Vec<u64>,
}

/// A page of TMDB movie results.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MoviePage {
    pub page: u32,
    pub results: Vec<MovieSummary>,
    pub total_pages: u32,
    pub total_results: u32,
}

/// Full details of a single TMDB movie.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MovieDetails {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub runtime: Option<u32>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default)]
    pub imdb_id: Option<String>,
}

/// TMDB genre entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Genre {
    pub id: u64,
    pub name: String,
}

/// TMDB genre listing.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenreList {
    pub genres: Vec<Genre>,
}

/// One release returned by a Prowlarr search.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerRelease {
    pub title: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub seeders: Option<u32>,
    #[serde(default)]
    pub leechers: Option<u32>,
    #[serde(default)]
    pub indexer: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub magnet_url: Option<String>,
    #[serde(default)]
    pub info_url: Option<String>,
    #[serde(default)]
    pub publish_date: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
}

/// A configured Prowlarr indexer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Indexer {
    #[serde(default)]
    pub definition_name: String,
    #[serde(default)]
    pub indexer_urls: Vec<String>,
}

/// AllDebrid magnet registered by an upload call.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DebridMagnet {
    pub id: u64,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub ready: Option<bool>,
}

/// One file inside a debrid-resolved magnet.
///
/// AllDebrid uses single-letter keys: `n` name, `s` size, `l` link.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DebridFile {
    #[serde(rename = "n")]
    pub name: String,
    #[serde(rename = "s", default)]
    pub size: u64,
    #[serde(rename = "l", default)]
    pub link: Option<String>,
}

/// Status of a magnet known to AllDebrid.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebridMagnetStatus {
    pub id: u64,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub status_code: Option<u32>,
}

/// A direct-download link unlocked from a debrid-hosted file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UnlockedLink {
    pub link: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub filesize: Option<u64>,
    #[serde(default)]
    pub streaming: Option<Vec<serde_json::Value>>,
}
