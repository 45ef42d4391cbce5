//! Link extraction from embed pages
//!
//! Drives one browser session per page: navigate, check for the missing-title
//! state, wait for `dataLink`, filter it, try the direct-link pass and fall
//! back to the page's own decryption routine.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::browser::{EmbedSession, SessionFactory};
use crate::error::{EmbedError, Result};
use crate::parser::embed::{decrypt_batch, direct_links, filter_embeds, map_decrypted, parse_data_link};
use crate::parser::page::find_not_found_marker;
use crate::types::{ExtractionOutcome, UnavailableReason};
use crate::url::{EMBED_BASE_URL, build_episode_url, build_movie_url};

/// Timing and addressing for the extractor
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Bound on navigation plus network settle (default: 30s)
    pub navigation_timeout: Duration,
    /// Bound on waiting for `dataLink` (default: 20s)
    pub data_timeout: Duration,
    /// Interval between `dataLink` checks (default: 250ms)
    pub poll_interval: Duration,
    /// Embed site root (default: https://embed69.org)
    pub embed_base_url: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(30),
            data_timeout: Duration::from_secs(20),
            poll_interval: Duration::from_millis(250),
            embed_base_url: EMBED_BASE_URL.to_string(),
        }
    }
}

/// Extracts playable links from embed pages
///
/// Every call opens its own session and closes it before returning,
/// whatever the outcome.
pub struct LinkExtractor<F> {
    factory: F,
    config: ExtractorConfig,
}

impl<F: SessionFactory> LinkExtractor<F> {
    pub fn new(factory: F) -> Self {
        Self::with_config(factory, ExtractorConfig::default())
    }

    pub fn with_config(factory: F, config: ExtractorConfig) -> Self {
        Self { factory, config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Embed page URL of a movie
    pub fn movie_url(&self, imdb_id: &str) -> String {
        build_movie_url(&self.config.embed_base_url, imdb_id)
    }

    /// Embed page URL of an episode
    pub fn episode_url(&self, imdb_id: &str, season: u32, episode: u32) -> String {
        build_episode_url(&self.config.embed_base_url, imdb_id, season, episode)
    }

    /// Extracts links from one embed page
    ///
    /// # Arguments
    /// * `url` - Embed page URL
    /// * `servers` - Server names to keep (case-insensitive); empty keeps all
    /// * `language` - Language code to keep (exact); empty keeps all
    ///
    /// # Returns
    /// - `Found` with at least one link
    /// - `Unavailable` if the page reports a missing title, a bound is
    ///   exceeded or anything fails along the way
    /// - `Empty` if nothing matched the filters or decryption yielded nothing
    pub async fn extract_links(&self, url: &str, servers: &[String], language: &str) -> ExtractionOutcome {
        info!(url, ?servers, language, "extracting links");

        let session = match self.factory.open().await {
            Ok(session) => session,
            Err(e) => {
                warn!(url, "could not open browser session: {}", e);
                return ExtractionOutcome::Unavailable(UnavailableReason::Fault(e.to_string()));
            }
        };

        let run = AssertUnwindSafe(self.run(session.as_ref(), url, servers, language))
            .catch_unwind()
            .await;

        if let Err(e) = session.close().await {
            warn!(url, "closing browser session failed: {}", e);
        }

        match run {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!(url, "extraction panicked: {}", message);
                ExtractionOutcome::Unavailable(UnavailableReason::Fault(message))
            }
        }
    }

    async fn run(
        &self,
        session: &dyn EmbedSession,
        url: &str,
        servers: &[String],
        language: &str,
    ) -> ExtractionOutcome {
        match self.try_run(session, url, servers, language).await {
            Ok(outcome) => outcome,
            Err(EmbedError::Timeout(what)) => {
                debug!(url, "timed out: {}", what);
                ExtractionOutcome::Unavailable(UnavailableReason::NavigationTimeout)
            }
            Err(e) => {
                warn!(url, "extraction failed: {}", e);
                ExtractionOutcome::Unavailable(UnavailableReason::Fault(e.to_string()))
            }
        }
    }

    async fn try_run(
        &self,
        session: &dyn EmbedSession,
        url: &str,
        servers: &[String],
        language: &str,
    ) -> Result<ExtractionOutcome> {
        session.navigate(url, self.config.navigation_timeout).await?;

        let html = session.html().await?;
        if let Some(marker) = find_not_found_marker(&html) {
            info!(url, marker = %marker, "page reports missing title");
            return Ok(ExtractionOutcome::Unavailable(UnavailableReason::NotFoundMarker(marker)));
        }

        let ready = session
            .wait_for_data(self.config.data_timeout, self.config.poll_interval)
            .await?;
        if !ready {
            info!(url, "dataLink never populated");
            return Ok(ExtractionOutcome::Unavailable(UnavailableReason::DataTimeout));
        }

        let groups = parse_data_link(session.read_data().await?)?;
        let kept = filter_embeds(groups, servers, language);
        if kept.is_empty() {
            debug!(url, "no server/language combination matched");
            return Ok(ExtractionOutcome::Empty);
        }

        let direct = direct_links(&kept);
        if !direct.is_empty() {
            debug!(url, count = direct.len(), "direct links found");
            return Ok(ExtractionOutcome::Found(direct));
        }

        debug!(url, count = kept.len(), "no direct links, decrypting");
        let output = match session.decrypt(&decrypt_batch(&kept)).await {
            Ok(output) => output,
            Err(e) => {
                warn!(url, "decryption unavailable: {}", e);
                return Ok(ExtractionOutcome::Empty);
            }
        };

        match map_decrypted(&kept, &output) {
            Ok(links) if !links.is_empty() => Ok(ExtractionOutcome::Found(links)),
            Ok(_) => Ok(ExtractionOutcome::Empty),
            Err(e) => {
                warn!(url, "malformed decryption output: {}", e);
                Ok(ExtractionOutcome::Empty)
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
