//! AllDebrid client.
//!
//! Converts indexer releases into directly streamable HTTP links: a
//! `.torrent` download URL becomes a magnet, the magnet is registered
//! with AllDebrid, and the resolved file link is unlocked into the
//! `source_url` the streaming core consumes.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use sha1::{Digest, Sha1};
use tracing::debug;

use crate::errors::ClientError;
use crate::types::{DebridFile, DebridMagnet, DebridMagnetStatus, UnlockedLink};

const ALLDEBRID_BASE_URL: &str = "https://api.alldebrid.com/v4.1";
const AGENT: &str = "prostream";

/// Debrid service operations.
#[async_trait]
pub trait DebridClient: Send + Sync {
    /// Registers a magnet link for download.
    ///
    /// # Errors
    /// - `ClientError::Http` - Network failure
    /// - `ClientError::Api` - The service rejected the magnet
    /// - `ClientError::Decode` - Unexpected response shape
    async fn upload_magnet(&self, magnet: &str) -> Result<DebridMagnet, ClientError>;

    /// Fetches the status of a registered magnet.
    ///
    /// # Errors
    /// - `ClientError::Http` - Network failure
    /// - `ClientError::Api` - Unknown magnet id or service error
    /// - `ClientError::Decode` - Unexpected response shape
    async fn magnet_status(&self, magnet_id: u64) -> Result<DebridMagnetStatus, ClientError>;

    /// Lists the files of a resolved magnet.
    ///
    /// # Errors
    /// - `ClientError::Http` - Network failure
    /// - `ClientError::Api` - Unknown magnet id or service error
    /// - `ClientError::Decode` - Unexpected response shape
    async fn magnet_files(&self, magnet_id: u64) -> Result<Vec<DebridFile>, ClientError>;

    /// Unlocks a hosted file link into a direct-download URL.
    ///
    /// # Errors
    /// - `ClientError::Http` - Network failure
    /// - `ClientError::Api` - The link could not be unlocked
    /// - `ClientError::Decode` - Unexpected response shape
    async fn unlock_link(&self, link: &str) -> Result<UnlockedLink, ClientError>;
}

/// Client for the AllDebrid v4.1 API.
pub struct AllDebridClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

/// AllDebrid wraps every payload in a status envelope; failures carry an
/// error object instead of data.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Envelope<T> {
    status: String,
    #[serde(default)]
    data: Option<T>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

#[derive(Debug, Deserialize)]
struct MagnetListData {
    magnets: Vec<DebridMagnet>,
}

#[derive(Debug, Deserialize)]
struct MagnetStatusData {
    magnets: HashMap<String, DebridMagnetStatus>,
}

#[derive(Debug, Deserialize)]
struct MagnetFilesData {
    magnets: Vec<MagnetFilesEntry>,
}

#[derive(Debug, Deserialize)]
struct MagnetFilesEntry {
    #[serde(default)]
    files: Vec<DebridFile>,
}

impl AllDebridClient {
    /// Creates a client against the production AllDebrid API.
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, ALLDEBRID_BASE_URL.to_string())
    }

    /// Creates a client against an arbitrary base URL (test servers).
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Converts a `.torrent` download URL into a magnet link.
    ///
    /// Downloads the torrent file, hashes its `info` dictionary and
    /// builds a bare `btih` magnet URI.
    ///
    /// # Errors
    /// - `ClientError::Http` - The torrent file could not be downloaded
    /// - `ClientError::Decode` - The payload is not a valid torrent file
    pub async fn url_to_magnet(&self, torrent_url: &str) -> Result<String, ClientError> {
        let response = self.http.get(torrent_url).send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Http {
                reason: format!("Torrent download returned {}", response.status()),
            });
        }

        let torrent_bytes = response.bytes().await?;
        let info_hash = info_hash_from_torrent(&torrent_bytes)?;
        debug!("Torrent {} hashed to {}", torrent_url, info_hash);
        Ok(format!("magnet:?xt=urn:btih:{info_hash}"))
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        extra: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let mut query: Vec<(&str, String)> = vec![
            ("agent", AGENT.to_string()),
            ("apikey", self.api_key.clone()),
        ];
        query.extend_from_slice(extra);

        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .query(&query)
            .send()
            .await?;

        let envelope = response.json::<Envelope<T>>().await?;
        unwrap_envelope(envelope)
    }
}

fn unwrap_envelope<T>(envelope: Envelope<T>) -> Result<T, ClientError> {
    if envelope.status != "success" {
        let reason = match envelope.error {
            Some(ApiError {
                code: Some(code),
                message,
            }) => format!("{code}: {message}"),
            Some(ApiError { message, .. }) => message,
            None => format!("status '{}'", envelope.status),
        };
        return Err(ClientError::Api { reason });
    }

    envelope.data.ok_or_else(|| ClientError::Decode {
        reason: "Success response without data".to_string(),
    })
}

#[async_trait]
impl DebridClient for AllDebridClient {
    async fn upload_magnet(&self, magnet: &str) -> Result<DebridMagnet, ClientError> {
        let data: MagnetListData = self
            .call("/magnet/upload", &[("magnets[]", magnet.to_string())])
            .await?;

        data.magnets.into_iter().next().ok_or(ClientError::Api {
            reason: "Upload response contained no magnet".to_string(),
        })
    }

    async fn magnet_status(&self, magnet_id: u64) -> Result<DebridMagnetStatus, ClientError> {
        let data: MagnetStatusData = self
            .call("/magnet/status", &[("id", magnet_id.to_string())])
            .await?;

        data.magnets
            .into_values()
            .find(|status| status.id == magnet_id)
            .ok_or(ClientError::Api {
                reason: format!("No status for magnet {magnet_id}"),
            })
    }

    async fn magnet_files(&self, magnet_id: u64) -> Result<Vec<DebridFile>, ClientError> {
        let data: MagnetFilesData = self
            .call("/magnet/files", &[("id[]", magnet_id.to_string())])
            .await?;

        Ok(data
            .magnets
            .into_iter()
            .flat_map(|entry| entry.files)
            .collect())
    }

    async fn unlock_link(&self, link: &str) -> Result<UnlockedLink, ClientError> {
        self.call("/link/unlock", &[("link", link.to_string())])
            .await
    }
}

/// Computes the hex info hash of a `.torrent` payload.
///
/// The hash covers the exact bencode bytes of the `info` dictionary as
/// they appear in the file, so the payload is validated with a full
/// parse first and then sliced rather than re-encoded.
///
/// # Errors
/// - `ClientError::Decode` - Malformed bencode or missing info dictionary
pub fn info_hash_from_torrent(torrent_bytes: &[u8]) -> Result<String, ClientError> {
    let parsed =
        bencode_rs::parse_all(torrent_bytes).map_err(|e| ClientError::Decode {
            reason: format!("Bencode parsing failed: {e:?}"),
        })?;

    let is_torrent = matches!(
        parsed.first(),
        Some(bencode_rs::Value::Dictionary(dict)) if dict.iter().any(
            |(key, _)| matches!(key, bencode_rs::Value::ByteString(bytes) if bytes.as_slice() == b"info")
        )
    );
    if !is_torrent {
        return Err(ClientError::Decode {
            reason: "Missing info dictionary".to_string(),
        });
    }

    let info_start = torrent_bytes
        .windows(b"4:info".len())
        .position(|window| window == b"4:info")
        .ok_or_else(|| ClientError::Decode {
            reason: "Could not locate info dictionary".to_string(),
        })?
        + b"4:info".len();

    let info_len = bencode_dictionary_end(&torrent_bytes[info_start..])?;
    let info_bytes = &torrent_bytes[info_start..info_start + info_len];

    let mut hasher = Sha1::new();
    hasher.update(info_bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// Byte length of the bencode dictionary at the start of `data`.
fn bencode_dictionary_end(data: &[u8]) -> Result<usize, ClientError> {
    if data.first() != Some(&b'd') {
        return Err(ClientError::Decode {
            reason: "Expected dictionary start".to_string(),
        });
    }

    let mut pos = 1;
    let mut depth = 1;

    while pos < data.len() && depth > 0 {
        match data[pos] {
            b'd' | b'l' => {
                depth += 1;
                pos += 1;
            }
            b'e' => {
                depth -= 1;
                pos += 1;
            }
            b'i' => {
                pos += 1;
                while pos < data.len() && data[pos] != b'e' {
                    pos += 1;
                }
                pos += 1;
            }
            b'0'..=b'9' => {
                let len_start = pos;
                while pos < data.len() && data[pos] != b':' {
                    pos += 1;
                }
                let length: usize = std::str::from_utf8(&data[len_start..pos])
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| ClientError::Decode {
                        reason: "Invalid string length".to_string(),
                    })?;
                pos += 1 + length;
            }
            _ => {
                return Err(ClientError::Decode {
                    reason: "Invalid bencode character".to_string(),
                });
            }
        }
    }

    if depth != 0 || pos > data.len() {
        return Err(ClientError::Decode {
            reason: "Truncated bencode dictionary".to_string(),
        });
    }

    Ok(pos)
}
