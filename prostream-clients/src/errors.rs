//! Error types for external API clients.

use thiserror::Error;

/// Errors that can occur when talking to an external service.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network communication with the service failed.
    #[error("HTTP error: {reason}")]
    Http {
        /// The reason for the HTTP failure
        reason: String,
    },

    /// The service answered but reported an application-level error.
    #[error("API error: {reason}")]
    Api {
        /// The error reported by the service
        reason: String,
    },

    /// The response body could not be decoded.
    #[error("Decode error: {reason}")]
    Decode {
        /// The reason decoding failed
        reason: String,
    },
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::Decode {
                reason: e.to_string(),
            }
        } else {
            ClientError::Http {
                reason: e.to_string(),
            }
        }
    }
}
