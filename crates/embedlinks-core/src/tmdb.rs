//! TMDB catalog lookups
//!
//! Resolves IMDb cross-reference ids and season structure for the
//! extractor, and provides search and enrichment metadata for the UI.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::client::{ClientConfig, TmdbClient};
use crate::error::{EmbedError, Result};
use crate::types::{EpisodeStill, MediaKind, SearchHit, SeasonInfo, SeasonStills, TitleMetadata};
use crate::url::{build_image_url, build_search_path};

/// Maximum number of search hits returned
pub const MAX_SEARCH_RESULTS: usize = 10;

/// Default locale for enrichment metadata
pub const DEFAULT_LOCALE: &str = "es-MX";

/// Lookups the extraction pipeline needs from a catalog
///
/// Both operations collapse every failure into `None`: callers treat an
/// invalid id and an unreachable API the same way.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// IMDb id for a TMDB title
    async fn resolve_imdb_id(&self, tmdb_id: &str, kind: MediaKind) -> Option<String>;

    /// Regular seasons of a series (season 0 excluded), ordered by number
    async fn series_structure(&self, tmdb_id: &str) -> Option<Vec<SeasonInfo>>;
}

#[derive(Debug, Deserialize)]
struct ExternalIds {
    imdb_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSeason {
    season_number: u32,
    #[serde(default)]
    episode_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawDetails {
    id: u64,
    #[serde(alias = "name")]
    title: Option<String>,
    overview: Option<String>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    #[serde(default)]
    seasons: Vec<RawSeason>,
}

#[derive(Debug, Deserialize)]
struct RawSearchPage {
    #[serde(default)]
    results: Vec<RawSearchItem>,
}

#[derive(Debug, Deserialize)]
struct RawSearchItem {
    id: u64,
    title: Option<String>,
    name: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
    poster_path: Option<String>,
    popularity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawSeasonDetails {
    #[serde(default)]
    episodes: Vec<RawEpisode>,
}

#[derive(Debug, Deserialize)]
struct RawEpisode {
    episode_number: u32,
    name: Option<String>,
    still_path: Option<String>,
}

/// TMDB-backed catalog
#[derive(Debug)]
pub struct TmdbCatalog {
    client: TmdbClient,
}

impl TmdbCatalog {
    /// Create a catalog with custom client configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            client: TmdbClient::with_config(config)?,
        })
    }

    pub fn new(client: TmdbClient) -> Self {
        Self { client }
    }

    /// Fetch the IMDb id of a title
    ///
    /// # Returns
    /// `Ok(None)` when TMDB knows the title but has no IMDb id for it
    ///
    /// # Errors
    /// - `InvalidRequest` if the id is not numeric
    /// - Any client error
    pub async fn external_imdb_id(&self, tmdb_id: &str, kind: MediaKind) -> Result<Option<String>> {
        let id = validate_id(tmdb_id)?;
        let path = format!("/{}/{}/external_ids", kind.tmdb_segment(), id);
        let ids: ExternalIds = self.client.get_json(&path, &[]).await?;
        Ok(ids
            .imdb_id
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()))
    }

    /// Fetch the season list of a series
    ///
    /// Season 0 (specials) is dropped, the rest is sorted by number.
    pub async fn seasons(&self, tmdb_id: &str) -> Result<Vec<SeasonInfo>> {
        let id = validate_id(tmdb_id)?;
        let details: RawDetails = self.client.get_json(&format!("/tv/{}", id), &[]).await?;
        Ok(regular_seasons(&details.seasons))
    }

    /// Search titles of one kind
    ///
    /// Results are ranked by TMDB popularity and truncated to
    /// [`MAX_SEARCH_RESULTS`].
    ///
    /// # Errors
    /// - `InvalidRequest` if query is empty or whitespace only
    /// - Any client error
    pub async fn search(&self, query: &str, kind: MediaKind) -> Result<Vec<SearchHit>> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(EmbedError::InvalidRequest(
                "Search query cannot be empty".to_string(),
            ));
        }

        let path = build_search_path(kind.tmdb_segment(), trimmed);
        let page: RawSearchPage = self.client.get_json(&path, &[]).await?;

        let mut items = page.results;
        items.sort_by(|a, b| {
            b.popularity
                .unwrap_or(0.0)
                .total_cmp(&a.popularity.unwrap_or(0.0))
        });

        Ok(items
            .into_iter()
            .take(MAX_SEARCH_RESULTS)
            .map(|item| self.search_hit(item, kind))
            .collect())
    }

    /// Enrichment metadata for a title
    ///
    /// For series every regular season's episode stills are fetched too;
    /// a season whose lookup fails is skipped.
    pub async fn metadata(&self, tmdb_id: &str, kind: MediaKind, locale: &str) -> Result<TitleMetadata> {
        let id = validate_id(tmdb_id)?;
        let locale = if locale.trim().is_empty() {
            DEFAULT_LOCALE
        } else {
            locale.trim()
        };

        let path = format!("/{}/{}", kind.tmdb_segment(), id);
        let details: RawDetails = self.client.get_json(&path, &[("language", locale)]).await?;

        let seasons = if kind.is_series() {
            let mut stills = Vec::new();
            for season in regular_seasons(&details.seasons) {
                match self.season_stills(id, season.season_number, locale).await {
                    Ok(s) => stills.push(s),
                    Err(e) => warn!(tmdb_id = id, season = season.season_number, "skipping season stills: {}", e),
                }
            }
            Some(stills)
        } else {
            None
        };

        let images = self.client.image_base_url();
        Ok(TitleMetadata {
            id: details.id,
            title: details.title.unwrap_or_default(),
            overview: details.overview.filter(|o| !o.trim().is_empty()),
            poster_url: build_image_url(images, "w500", details.poster_path.as_deref()),
            backdrop_url: build_image_url(images, "original", details.backdrop_path.as_deref()),
            seasons,
        })
    }

    async fn season_stills(&self, id: &str, season: u32, locale: &str) -> Result<SeasonStills> {
        let path = format!("/tv/{}/season/{}", id, season);
        let details: RawSeasonDetails = self.client.get_json(&path, &[("language", locale)]).await?;
        let images = self.client.image_base_url();

        Ok(SeasonStills {
            season,
            episodes: details
                .episodes
                .into_iter()
                .map(|ep| EpisodeStill {
                    episode: ep.episode_number,
                    name: ep.name,
                    still_url: build_image_url(images, "w300", ep.still_path.as_deref()),
                })
                .collect(),
        })
    }

    fn search_hit(&self, item: RawSearchItem, kind: MediaKind) -> SearchHit {
        let date = item.release_date.or(item.first_air_date);
        SearchHit {
            id: item.id,
            title: item.title.or(item.name).unwrap_or_default(),
            year: date.and_then(|d| d.get(..4).map(str::to_string)),
            kind,
            poster: build_image_url(self.client.image_base_url(), "w92", item.poster_path.as_deref()),
        }
    }
}

#[async_trait]
impl Catalog for TmdbCatalog {
    async fn resolve_imdb_id(&self, tmdb_id: &str, kind: MediaKind) -> Option<String> {
        match self.external_imdb_id(tmdb_id, kind).await {
            Ok(Some(imdb)) => {
                debug!(tmdb_id, imdb = %imdb, "resolved cross-reference id");
                Some(imdb)
            }
            Ok(None) => {
                warn!(tmdb_id, "TMDB has no IMDb id for title");
                None
            }
            Err(e) => {
                warn!(tmdb_id, "IMDb id lookup failed: {}", e);
                None
            }
        }
    }

    async fn series_structure(&self, tmdb_id: &str) -> Option<Vec<SeasonInfo>> {
        match self.seasons(tmdb_id).await {
            Ok(seasons) if !seasons.is_empty() => Some(seasons),
            Ok(_) => {
                warn!(tmdb_id, "series has no regular seasons");
                None
            }
            Err(e) => {
                warn!(tmdb_id, "season lookup failed: {}", e);
                None
            }
        }
    }
}

fn validate_id(tmdb_id: &str) -> Result<&str> {
    let id = tmdb_id.trim();
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
        return Err(EmbedError::InvalidRequest(format!(
            "TMDB id must be numeric, got {:?}",
            tmdb_id
        )));
    }
    Ok(id)
}

fn regular_seasons(raw: &[RawSeason]) -> Vec<SeasonInfo> {
    let mut seasons: Vec<SeasonInfo> = raw
        .iter()
        .filter(|s| s.season_number > 0)
        .map(|s| SeasonInfo {
            season_number: s.season_number,
            episode_count: s.episode_count.unwrap_or(0),
        })
        .collect();
    seasons.sort_by_key(|s| s.season_number);
    seasons
}
