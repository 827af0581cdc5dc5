//! Prowlarr indexer client.
//!
//! Searches the user's configured indexers for releases matching a title.
//! The search result's download or magnet URL feeds the debrid pipeline.

use async_trait::async_trait;

use crate::errors::ClientError;
use crate::types::{Indexer, IndexerRelease};

/// Release search across configured indexers.
#[async_trait]
pub trait IndexerClient: Send + Sync {
    /// Searches all indexers for releases matching the query.
    ///
    /// # Errors
    /// - `ClientError::Http` - Network failure
    /// - `ClientError::Api` - Prowlarr rejected the request
    /// - `ClientError::Decode` - Unexpected response shape
    async fn search(&self, query: &str) -> Result<Vec<IndexerRelease>, ClientError>;

    /// Lists the configured indexers.
    ///
    /// # Errors
    /// - `ClientError::Http` - Network failure
    /// - `ClientError::Api` - Prowlarr rejected the request
    /// - `ClientError::Decode` - Unexpected response shape
    async fn indexers(&self) -> Result<Vec<Indexer>, ClientError>;
}

/// Client for a Prowlarr instance.
pub struct ProwlarrClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ProwlarrClient {
    /// Creates a client for the Prowlarr instance at `base_url`.
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        extra: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let mut query: Vec<(&str, String)> = vec![("apikey", self.api_key.clone())];
        query.extend_from_slice(extra);

        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .query(&query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::Api {
                reason: format!("Prowlarr returned {}", response.status()),
            });
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl IndexerClient for ProwlarrClient {
    async fn search(&self, query: &str) -> Result<Vec<IndexerRelease>, ClientError> {
        self.get_json("/api/v1/search", &[("query", query.to_string())])
            .await
    }

    async fn indexers(&self) -> Result<Vec<Indexer>, ClientError> {
        self.get_json("/api/v1/indexer", &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_normalized() {
        let client = ProwlarrClient::new("http://localhost:9696/".to_string(), "key".to_string());
        assert_eq!(client.base_url, "http://localhost:9696");
    }

    #[test]
    fn test_release_deserialization() {
        let json = r#"[{
            "title": "Some.Movie.2024.1080p",
            "size": 4294967296,
            "seeders": 120,
            "leechers": 4,
            "indexer": "SomeIndexer",
            "downloadUrl": "http://indexer/dl/1.torrent",
            "publishDate": "2024-05-01T00:00:00Z",
            "protocol": "torrent"
        }]"#;

        let releases: Vec<IndexerRelease> = serde_json::from_str(json).unwrap();
        assert_eq!(releases[0].title, "Some.Movie.2024.1080p");
        assert_eq!(releases[0].seeders, Some(120));
        assert_eq!(
            releases[0].download_url.as_deref(),
            Some("http://indexer/dl/1.torrent")
        );
        assert!(releases[0].magnet_url.is_none());
    }

    #[test]
    fn test_indexer_deserialization() {
        let json = r#"[{ "definitionName": "SomeIndexer", "indexerUrls": ["http://a", "http://b"] }]"#;

        let indexers: Vec<Indexer> = serde_json::from_str(json).unwrap();
        assert_eq!(indexers[0].definition_name, "SomeIndexer");
        assert_eq!(indexers[0].indexer_urls.len(), 2);
    }
}
