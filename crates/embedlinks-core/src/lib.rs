//! Embed Links Core Library
//!
//! Resolves streaming links for movies and series episodes from embed69
//! player pages, using TMDB as the catalog.
//!
//! # Overview
//!
//! This crate provides:
//! - A rate-limited TMDB client for id cross-references, season structure,
//!   search and enrichment metadata
//! - A headless-browser link extractor that reads the page's `dataLink`
//!   variable and falls back to the page's own decryption routine
//! - An orchestrator that walks every requested episode with cooperative
//!   cancellation
//!
//! # Example
//!
//! ```no_run
//! use embedlinks_core::{
//!     ChromiumLauncher, ClientConfig, EmbedScraper, ExtractionRequest, LinkExtractor, Result,
//!     Target, TmdbCatalog,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let catalog = TmdbCatalog::with_config(ClientConfig::with_api_key("your-key"))?;
//!     let extractor = LinkExtractor::new(ChromiumLauncher::default());
//!     let scraper = EmbedScraper::new(catalog, extractor);
//!
//!     let request = ExtractionRequest {
//!         tmdb_id: "550".to_string(),
//!         target: Target::Movie,
//!         servers: vec!["vidcloud".to_string()],
//!         language: "LAT".to_string(),
//!     };
//!
//!     let report = scraper.extract(&request, &CancellationToken::new()).await;
//!     println!("{}", serde_json::to_string_pretty(&report)?);
//!     Ok(())
//! }
//! ```
//!
//! # Link lifetime
//!
//! Embed links frequently carry expiring tokens. Treat them as short-lived
//! and do not cache them.

pub mod browser;
mod client;
mod error;
mod extractor;
pub mod parser;
mod scraper;
mod tmdb;
mod types;
pub mod url;

#[cfg(test)]
mod testing;

// Re-export client types
pub use client::{ClientConfig, RateLimiter, TmdbClient};

// Re-export error types
pub use error::{EmbedError, Result};

// Re-export browser abstractions
pub use browser::{ChromiumLauncher, Decryptor, EmbedSession, LaunchConfig, SessionFactory};

// Re-export the extraction pipeline
pub use extractor::{ExtractorConfig, LinkExtractor};
pub use scraper::EmbedScraper;
pub use tmdb::{Catalog, DEFAULT_LOCALE, MAX_SEARCH_RESULTS, TmdbCatalog};

// Re-export parser helpers
pub use parser::embed::process_links_by_server;

// Re-export data types
pub use types::{
    EmbedEntry, EmbedGroup, EpisodeLinks, EpisodeStill, ExtractionData, ExtractionOutcome,
    ExtractionReport, ExtractionRequest, ExtractionStatus, LinkValue, MediaKind, ResolvedLink,
    SearchHit, SeasonInfo, SeasonLinks, SeasonStills, Target, TitleMetadata, UnavailableReason,
};
