//! Error types for the embed link extractor
//!
//! Provides a single error enum with human-readable messages and
//! string serialization for JSON responses.

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Error type for all embedlinks operations
///
/// Implements Display for human-readable messages and Serialize
/// so handlers can embed it directly in a response body.
#[derive(Error, Debug)]
pub enum EmbedError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Upstream answered with an unexpected status code
    #[error("Unexpected HTTP status {status} for {url}")]
    HttpStatus { status: u16, url: String },

    /// Failed to parse a response or page payload
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Requested resource does not exist upstream
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by server (HTTP 429)
    #[error("Rate limited - too many requests")]
    RateLimited,

    /// Headless browser could not be launched or driven
    #[error("Browser error: {0}")]
    Browser(String),

    /// A bounded wait elapsed
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Caller supplied an unusable request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The in-page decryption routine was missing or returned garbage
    #[error("Decryption failed: {0}")]
    Decryption(String),
}

impl From<chromiumoxide::error::CdpError> for EmbedError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        EmbedError::Browser(err.to_string())
    }
}

impl From<serde_json::Error> for EmbedError {
    fn from(err: serde_json::Error) -> Self {
        EmbedError::ParseError(err.to_string())
    }
}

impl Serialize for EmbedError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Result type alias for embedlinks operations
pub type Result<T> = std::result::Result<T, EmbedError>;
