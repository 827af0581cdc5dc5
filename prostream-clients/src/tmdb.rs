//! TMDB metadata client.
//!
//! Thin wrapper over The Movie Database v3 API for the catalog views the
//! frontend renders. Every call carries the api key and a fixed language.

use async_trait::async_trait;

use crate::errors::ClientError;
use crate::types::{GenreList, MovieDetails, MoviePage};

const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";

/// Trending window accepted by the TMDB trending endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendingWindow {
    Day,
    Week,
}

impl TrendingWindow {
    fn as_str(self) -> &'static str {
        match self {
            TrendingWindow::Day => "day",
            TrendingWindow::Week => "week",
        }
    }
}

/// Movie metadata lookups.
#[async_trait]
pub trait MetadataClient: Send + Sync {
    /// Searches movies by free-text query.
    ///
    /// # Errors
    /// - `ClientError::Http` - Network failure
    /// - `ClientError::Decode` - Unexpected response shape
    async fn search_movies(&self, query: &str) -> Result<MoviePage, ClientError>;

    /// Fetches full details for one movie.
    ///
    /// # Errors
    /// - `ClientError::Http` - Network failure
    /// - `ClientError::Decode` - Unexpected response shape
    async fn movie_details(&self, id: u64) -> Result<MovieDetails, ClientError>;

    /// Lists currently popular movies.
    ///
    /// # Errors
    /// - `ClientError::Http` - Network failure
    /// - `ClientError::Decode` - Unexpected response shape
    async fn popular_movies(&self) -> Result<MoviePage, ClientError>;

    /// Lists trending movies over a day or week window.
    ///
    /// # Errors
    /// - `ClientError::Http` - Network failure
    /// - `ClientError::Decode` - Unexpected response shape
    async fn trending_movies(&self, window: TrendingWindow) -> Result<MoviePage, ClientError>;

    /// Lists movies belonging to a genre.
    ///
    /// # Errors
    /// - `ClientError::Http` - Network failure
    /// - `ClientError::Decode` - Unexpected response shape
    async fn discover_by_genre(&self, genre_id: u64) -> Result<MoviePage, ClientError>;

    /// Lists all movie genres.
    ///
    /// # Errors
    /// - `ClientError::Http` - Network failure
    /// - `ClientError::Decode` - Unexpected response shape
    async fn movie_genres(&self) -> Result<GenreList, ClientError>;
}

/// TMDB-backed metadata client.
pub struct TmdbClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    language: String,
}

impl TmdbClient {
    /// Creates a client against the production TMDB API.
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, TMDB_BASE_URL.to_string())
    }

    /// Creates a client against an arbitrary base URL (test servers).
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            api_key,
            language: "en-US".to_string(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        extra: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let mut query: Vec<(&str, String)> = vec![
            ("api_key", self.api_key.clone()),
            ("language", self.language.clone()),
        ];
        query.extend_from_slice(extra);

        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .query(&query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::Api {
                reason: format!("TMDB returned {}", response.status()),
            });
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl MetadataClient for TmdbClient {
    async fn search_movies(&self, query: &str) -> Result<MoviePage, ClientError> {
        self.get_json("/search/movie", &[("query", query.to_string())])
            .await
    }

    async fn movie_details(&self, id: u64) -> Result<MovieDetails, ClientError> {
        self.get_json(&format!("/movie/{id}"), &[]).await
    }

    async fn popular_movies(&self) -> Result<MoviePage, ClientError> {
        self.get_json("/movie/popular", &[]).await
    }

    async fn trending_movies(&self, window: TrendingWindow) -> Result<MoviePage, ClientError> {
        self.get_json(&format!("/trending/movie/{}", window.as_str()), &[])
            .await
    }

    async fn discover_by_genre(&self, genre_id: u64) -> Result<MoviePage, ClientError> {
        self.get_json("/discover/movie", &[("with_genres", genre_id.to_string())])
            .await
    }

    async fn movie_genres(&self) -> Result<GenreList, ClientError> {
        self.get_json("/genre/movie/list", &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trending_window_path_segments() {
        assert_eq!(TrendingWindow::Day.as_str(), "day");
        assert_eq!(TrendingWindow::Week.as_str(), "week");
    }

    #[test]
    fn test_movie_page_deserialization() {
        let json = r#"{
            "page": 1,
            "results": [{
                "id": 603,
                "title": "The Matrix",
                "overview": "A hacker discovers reality is simulated.",
                "release_date": "1999-03-31",
                "poster_path": "/p.jpg",
                "vote_average": 8.2,
                "genre_ids": [28, 878]
            }],
            "total_pages": 1,
            "total_results": 1
        }"#;

        let page: MoviePage = serde_json::from_str(json).unwrap();
        assert_eq!(page.results.len(), 1);
        assert_eq!(page.results[0].title, "The Matrix");
        assert_eq!(page.results[0].genre_ids, vec![28, 878]);
    }

    #[test]
    fn test_movie_details_tolerates_missing_optionals() {
        let json = r#"{ "id": 603, "title": "The Matrix" }"#;

        let details: MovieDetails = serde_json::from_str(json).unwrap();
        assert_eq!(details.id, 603);
        assert!(details.runtime.is_none());
        assert!(details.genres.is_empty());
    }
}
