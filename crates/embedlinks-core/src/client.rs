//! HTTP client with rate limiting and retry logic for the TMDB API
//!
//! Provides a rate-limited JSON client that authenticates with an API key
//! and implements exponential backoff for transient errors when asked to.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::debug;

use crate::error::{EmbedError, Result};
use crate::url::IMAGE_BASE_URL;

const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
const USER_AGENT: &str = concat!("embedlinks/", env!("CARGO_PKG_VERSION"));

/// Configuration for the TMDB client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// TMDB v3 API key, sent as the `api_key` query parameter
    pub api_key: String,
    /// API root (default: https://api.themoviedb.org/3)
    pub base_url: String,
    /// Image CDN root (default: https://image.tmdb.org/t/p)
    pub image_base_url: String,
    /// Maximum requests per second (default: 4.0)
    pub requests_per_second: f64,
    /// Request timeout in seconds (default: 10)
    pub timeout_secs: u64,
    /// Retry attempts for transient errors (default: 0)
    pub max_retries: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: TMDB_BASE_URL.to_string(),
            image_base_url: IMAGE_BASE_URL.to_string(),
            requests_per_second: 4.0,
            timeout_secs: 10,
            max_retries: 0,
        }
    }
}

impl ClientConfig {
    /// Default configuration with the given API key
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }
}

/// Rate limiter to control request frequency
///
/// Ensures requests are spaced at least `min_interval` apart.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_request: Arc<Mutex<Instant>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the specified requests per second
    pub fn new(requests_per_second: f64) -> Self {
        let min_interval = Duration::from_secs_f64(1.0 / requests_per_second);
        let start = Instant::now()
            .checked_sub(min_interval)
            .unwrap_or_else(Instant::now);
        Self {
            min_interval,
            last_request: Arc::new(Mutex::new(start)),
        }
    }

    /// Acquire permission to make a request
    ///
    /// Sleeps until `min_interval` has elapsed since the previous request.
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        let elapsed = last.elapsed();

        if elapsed < self.min_interval {
            sleep(self.min_interval - elapsed).await;
        }

        *last = Instant::now();
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

/// JSON client for the TMDB v3 API
///
/// Handles all HTTP communication with TMDB, including:
/// - API key authentication
/// - Rate limiting
/// - Optional retries with exponential backoff for transient errors
#[derive(Debug)]
pub struct TmdbClient {
    client: reqwest::Client,
    rate_limiter: RateLimiter,
    base_url: String,
    image_base_url: String,
    api_key: String,
    max_retries: u32,
}

impl TmdbClient {
    /// Create a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        if config.requests_per_second <= 0.0 {
            return Err(EmbedError::InvalidRequest(
                "requests_per_second must be positive".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(EmbedError::HttpError)?;

        Ok(Self {
            client,
            rate_limiter: RateLimiter::new(config.requests_per_second),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            image_base_url: config.image_base_url,
            api_key: config.api_key,
            max_retries: config.max_retries,
        })
    }

    /// Root used when building image URLs
    pub fn image_base_url(&self) -> &str {
        &self.image_base_url
    }

    /// Fetch and decode a JSON document
    ///
    /// # Arguments
    /// * `path` - Path below the API root, may carry its own query (e.g. "/search/tv?query=x")
    /// * `params` - Extra query parameters
    ///
    /// # Errors
    /// - `HttpError` - Network errors
    /// - `NotFound` - TMDB answered 404
    /// - `RateLimited` - TMDB answered 429 after all retries
    /// - `HttpStatus` - Any other non-success status
    /// - `ParseError` - Body is not the expected JSON
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let body = self.fetch_with_retry(&url, params).await?;
        serde_json::from_str(&body).map_err(|e| EmbedError::ParseError(format!("{}: {}", url, e)))
    }

    async fn fetch_with_retry(&self, url: &str, params: &[(&str, &str)]) -> Result<String> {
        let mut attempt = 0;

        loop {
            self.rate_limiter.acquire().await;

            match self.do_fetch(url, params).await {
                Ok(body) => return Ok(body),
                Err(e) if Self::is_retryable(&e) && attempt < self.max_retries => {
                    // Exponential backoff: 1s, 2s, 4s
                    let backoff = Duration::from_secs(1 << attempt.min(5));
                    debug!(%url, attempt, ?backoff, "retrying TMDB request: {}", e);
                    sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn do_fetch(&self, url: &str, params: &[(&str, &str)]) -> Result<String> {
        let response = self
            .client
            .get(url)
            .query(&[("api_key", self.api_key.as_str())])
            .query(params)
            .send()
            .await
            .map_err(EmbedError::HttpError)?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(EmbedError::RateLimited);
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(EmbedError::NotFound(url.to_string()));
        }

        if !status.is_success() {
            return Err(EmbedError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response.text().await.map_err(EmbedError::HttpError)
    }

    fn is_retryable(error: &EmbedError) -> bool {
        match error {
            EmbedError::RateLimited => true,
            EmbedError::HttpStatus { status, .. } => *status >= 500,
            EmbedError::HttpError(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }
}
