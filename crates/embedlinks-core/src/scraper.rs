//! Main extraction API
//!
//! Combines the catalog lookups with the link extractor and walks the
//! episodes a request targets, one page at a time.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::browser::SessionFactory;
use crate::extractor::LinkExtractor;
use crate::parser::embed::process_links_by_server;
use crate::tmdb::Catalog;
use crate::types::{
    EpisodeLinks, ExtractionData, ExtractionOutcome, ExtractionReport, ExtractionRequest,
    ExtractionStatus, SeasonInfo, SeasonLinks, Target,
};

pub const MSG_TMDB_ID_REQUIRED: &str = "TMDB ID requerido";
pub const MSG_IMDB_NOT_FOUND: &str = "No se encontró el ID de IMDB para el TMDB ID proporcionado";
pub const MSG_SERIES_INFO: &str = "No se pudo obtener info de episodios";
pub const MSG_MOVIE_UNAVAILABLE: &str = "Película no disponible";
pub const MSG_EPISODE_UNAVAILABLE: &str = "Episodio no disponible";
pub const MSG_SEASON_UNAVAILABLE: &str = "Temporada no disponible";
pub const MSG_RANGE_INVALID: &str = "Rango de temporadas inválido";
pub const MSG_RANGE_EMPTY: &str = "No hay temporadas disponibles en el rango seleccionado";
pub const MSG_STOPPED: &str = "Extracción detenida por el usuario";
pub const MSG_NO_LINKS: &str = "No se encontraron enlaces para los servidores e idioma seleccionados";

/// Main extraction API
///
/// Resolves the IMDb id through the catalog, then extracts each target
/// page strictly in sequence. The cancellation token is checked before
/// every page; an in-flight page is never interrupted.
pub struct EmbedScraper<C, F> {
    catalog: C,
    extractor: LinkExtractor<F>,
}

impl<C: Catalog, F: SessionFactory> EmbedScraper<C, F> {
    pub fn new(catalog: C, extractor: LinkExtractor<F>) -> Self {
        Self { catalog, extractor }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn extractor(&self) -> &LinkExtractor<F> {
        &self.extractor
    }

    /// Runs an extraction request to completion or cancellation
    ///
    /// Never fails: every problem is reported through the returned
    /// report's status and message.
    pub async fn extract(&self, request: &ExtractionRequest, cancel: &CancellationToken) -> ExtractionReport {
        let tmdb_id = request.tmdb_id.trim();
        if tmdb_id.is_empty() {
            return ExtractionReport::error(MSG_TMDB_ID_REQUIRED);
        }

        info!(tmdb_id, target = ?request.target, language = %request.language, "starting extraction");

        let Some(imdb_id) = self.catalog.resolve_imdb_id(tmdb_id, request.target.kind()).await else {
            return ExtractionReport::error(MSG_IMDB_NOT_FOUND);
        };

        match request.target {
            Target::Movie => self.extract_movie(&imdb_id, request, cancel).await,
            _ => {
                let Some(structure) = self.catalog.series_structure(tmdb_id).await else {
                    return ExtractionReport::error(MSG_SERIES_INFO);
                };
                self.extract_series(&imdb_id, &structure, request, cancel).await
            }
        }
    }

    async fn extract_movie(
        &self,
        imdb_id: &str,
        request: &ExtractionRequest,
        cancel: &CancellationToken,
    ) -> ExtractionReport {
        if cancel.is_cancelled() {
            return stopped(None, None);
        }

        let url = self.extractor.movie_url(imdb_id);
        let outcome = self
            .extractor
            .extract_links(&url, &request.servers, &request.language)
            .await;

        let warning = match &outcome {
            ExtractionOutcome::Unavailable(reason) => {
                info!(imdb_id, ?reason, "movie unavailable");
                return ExtractionReport::error(MSG_MOVIE_UNAVAILABLE);
            }
            ExtractionOutcome::Empty => Some(MSG_NO_LINKS.to_string()),
            ExtractionOutcome::Found(_) => None,
        };

        ExtractionReport {
            status: ExtractionStatus::Success,
            data: Some(ExtractionData::Movie {
                movie: process_links_by_server(outcome.into_links()),
            }),
            warning,
            message: None,
        }
    }

    async fn extract_series(
        &self,
        imdb_id: &str,
        structure: &[SeasonInfo],
        request: &ExtractionRequest,
        cancel: &CancellationToken,
    ) -> ExtractionReport {
        let find = |n: u32| structure.iter().find(|s| s.season_number == n).copied();
        let mut unavailable_seasons: Vec<u32> = Vec::new();

        let plan: Vec<(u32, u32)> = match request.target {
            Target::Movie => Vec::new(),
            Target::Episode { season, episode } => {
                match find(season) {
                    Some(info) if episode >= 1 && episode <= info.episode_count => {}
                    _ => return ExtractionReport::error(MSG_EPISODE_UNAVAILABLE),
                }
                vec![(season, episode)]
            }
            Target::Season { season } => match find(season) {
                Some(info) => episodes_of(&info),
                None => return ExtractionReport::error(MSG_SEASON_UNAVAILABLE),
            },
            Target::SeasonRange { start, end } => {
                if start > end {
                    return ExtractionReport::error(MSG_RANGE_INVALID);
                }
                let mut plan = Vec::new();
                for season in start..=end {
                    match find(season) {
                        Some(info) => plan.extend(episodes_of(&info)),
                        None => unavailable_seasons.push(season),
                    }
                }
                if plan.is_empty() {
                    return ExtractionReport::error(MSG_RANGE_EMPTY);
                }
                plan
            }
        };

        let single = matches!(request.target, Target::Episode { .. });
        let mut seasons: Vec<SeasonLinks> = Vec::new();

        for (season, episode) in plan {
            if cancel.is_cancelled() {
                info!(imdb_id, season, episode, "extraction stopped");
                return stopped(Some(seasons), seasons_warning(&unavailable_seasons));
            }

            let url = self.extractor.episode_url(imdb_id, season, episode);
            let outcome = self
                .extractor
                .extract_links(&url, &request.servers, &request.language)
                .await;

            if outcome.is_unavailable() {
                if single {
                    return ExtractionReport::error(MSG_EPISODE_UNAVAILABLE);
                }
                warn!(imdb_id, season, episode, "episode unavailable, continuing");
                if !unavailable_seasons.contains(&season) {
                    unavailable_seasons.push(season);
                }
                continue;
            }

            let links = process_links_by_server(outcome.into_links());
            match seasons.last_mut() {
                Some(last) if last.season == season => last.episodes.push(EpisodeLinks { episode, links }),
                _ => seasons.push(SeasonLinks {
                    season,
                    episodes: vec![EpisodeLinks { episode, links }],
                }),
            }
        }

        ExtractionReport {
            status: ExtractionStatus::Success,
            data: Some(ExtractionData::Series { seasons }),
            warning: seasons_warning(&unavailable_seasons),
            message: None,
        }
    }
}

fn episodes_of(info: &SeasonInfo) -> Vec<(u32, u32)> {
    (1..=info.episode_count)
        .map(|episode| (info.season_number, episode))
        .collect()
}

fn seasons_warning(seasons: &[u32]) -> Option<String> {
    if seasons.is_empty() {
        return None;
    }
    let mut sorted = seasons.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    let list = sorted
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    Some(format!("Temporadas no disponibles: {}", list))
}

fn stopped(seasons: Option<Vec<SeasonLinks>>, warning: Option<String>) -> ExtractionReport {
    ExtractionReport {
        status: ExtractionStatus::Stopped,
        data: seasons.map(|seasons| ExtractionData::Series { seasons }),
        warning,
        message: Some(MSG_STOPPED.to_string()),
    }
}
