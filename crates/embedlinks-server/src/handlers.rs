//! HTTP handlers
//!
//! Every handler answers with a JSON body carrying a `status` field; bad
//! input and upstream failures become `{"status":"error","message":..}`
//! with a 200 response, as the web UI expects.

use axum::extract::rejection::QueryRejection;
use axum::extract::{FromRequest, Query, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Json, Response};
use axum::Form;
use embedlinks_core::{
    DEFAULT_LOCALE, EmbedError, ExtractionReport, ExtractionRequest, ExtractionStatus, MediaKind,
    SearchHit, Target, TitleMetadata,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::state::AppState;

pub const MSG_TMDB_ID_REQUIRED: &str = "TMDB ID requerido";
pub const MSG_BAD_REQUEST: &str = "Solicitud inválida";
pub const MSG_BAD_NUMBER: &str = "Número de temporada o episodio inválido";
pub const MSG_EPISODE_REQUIRED: &str = "Temporada y episodio requeridos";
pub const MSG_SEASON_REQUIRED: &str = "Temporada requerida";
pub const MSG_RANGE_REQUIRED: &str = "Temporada inicial y final requeridas";
pub const MSG_BAD_MODE: &str = "Modo de extracción no válido";
pub const MSG_QUERY_REQUIRED: &str = "Búsqueda requerida";
pub const MSG_STOP_REQUESTED: &str = "Detención solicitada";

/// Default `video_language` when the form leaves it out
pub const DEFAULT_VIDEO_LANGUAGE: &str = "LAT";

/// Body extractor accepting both JSON and url-encoded forms
///
/// Rejections are turned into an error body instead of a 4xx response.
pub struct FormOrJson<T>(pub T);

impl<S, T> FromRequest<S> for FormOrJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));

        let parsed = if is_json {
            Json::<T>::from_request(req, state)
                .await
                .map(|Json(value)| value)
                .map_err(|e| e.body_text())
        } else {
            Form::<T>::from_request(req, state)
                .await
                .map(|Form(value)| value)
                .map_err(|e| e.body_text())
        };

        parsed.map(FormOrJson).map_err(|reason| {
            warn!("rejected request body: {}", reason);
            Json(ExtractionReport::error(MSG_BAD_REQUEST)).into_response()
        })
    }
}

/// A form value sent either as a JSON number or as text
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Loose {
    Number(u64),
    Text(String),
}

impl Loose {
    fn text(&self) -> String {
        match self {
            Loose::Number(n) => n.to_string(),
            Loose::Text(s) => s.trim().to_string(),
        }
    }

    fn number(&self) -> Result<u32, &'static str> {
        match self {
            Loose::Number(n) => u32::try_from(*n).map_err(|_| MSG_BAD_NUMBER),
            Loose::Text(s) => s.trim().parse().map_err(|_| MSG_BAD_NUMBER),
        }
    }
}

/// Server selection: a single name, a comma separated list or a JSON array
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ServerField {
    Many(Vec<String>),
    One(String),
}

impl ServerField {
    fn names(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            ServerField::Many(names) => names.iter().map(String::as_str).collect(),
            ServerField::One(name) => name.split(',').collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Body of `POST /extract`
#[derive(Debug, Default, Deserialize)]
pub struct ExtractForm {
    #[serde(default)]
    pub tmdb_id: Option<Loose>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub server: Option<ServerField>,
    #[serde(default)]
    pub video_language: Option<String>,
    #[serde(default)]
    pub extraction_mode: Option<String>,
    #[serde(default)]
    pub season: Option<Loose>,
    #[serde(default)]
    pub episode: Option<Loose>,
    #[serde(default)]
    pub season_start: Option<Loose>,
    #[serde(default)]
    pub season_end: Option<Loose>,
}

impl ExtractForm {
    /// Validates the form into an [`ExtractionRequest`]
    ///
    /// # Errors
    /// The user-facing message to answer with
    pub fn into_request(self) -> Result<ExtractionRequest, &'static str> {
        let tmdb_id = self
            .tmdb_id
            .as_ref()
            .map(Loose::text)
            .filter(|s| !s.is_empty())
            .ok_or(MSG_TMDB_ID_REQUIRED)?;

        let target = if is_series(self.kind.as_deref()) {
            let number = |field: &Option<Loose>, missing: &'static str| {
                field
                    .as_ref()
                    .filter(|v| !v.text().is_empty())
                    .ok_or(missing)
                    .and_then(Loose::number)
            };
            match self.extraction_mode.as_deref().map(str::trim).unwrap_or("specific") {
                "" | "specific" => Target::Episode {
                    season: number(&self.season, MSG_EPISODE_REQUIRED)?,
                    episode: number(&self.episode, MSG_EPISODE_REQUIRED)?,
                },
                "full_season" => Target::Season {
                    season: number(&self.season, MSG_SEASON_REQUIRED)?,
                },
                "season_range" => Target::SeasonRange {
                    start: number(&self.season_start, MSG_RANGE_REQUIRED)?,
                    end: number(&self.season_end, MSG_RANGE_REQUIRED)?,
                },
                _ => return Err(MSG_BAD_MODE),
            }
        } else {
            Target::Movie
        };

        Ok(ExtractionRequest {
            tmdb_id,
            target,
            servers: self.server.as_ref().map(ServerField::names).unwrap_or_default(),
            language: self
                .video_language
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|| DEFAULT_VIDEO_LANGUAGE.to_string()),
        })
    }
}

fn is_series(kind: Option<&str>) -> bool {
    matches!(kind.map(str::trim), Some("series") | Some("tv"))
}

fn media_kind(kind: Option<&str>) -> MediaKind {
    if is_series(kind) {
        MediaKind::Series
    } else {
        MediaKind::Movie
    }
}

/// Envelope for the catalog endpoints
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: ExtractionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: ExtractionStatus::Success,
            data: Some(data),
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ExtractionStatus::Error,
            data: None,
            message: Some(message.into()),
        }
    }
}

/// Catalog failures as shown to the user
fn catalog_message(error: &EmbedError) -> String {
    match error {
        EmbedError::InvalidRequest(msg) => format!("Solicitud inválida: {}", msg),
        EmbedError::NotFound(_) => "No se encontró el título en TMDB".to_string(),
        EmbedError::RateLimited => "TMDB limitó las solicitudes, intenta de nuevo".to_string(),
        other => format!("Error al consultar TMDB: {}", other),
    }
}

/// `POST /extract`
pub async fn extract(
    State(state): State<AppState>,
    FormOrJson(form): FormOrJson<ExtractForm>,
) -> Json<ExtractionReport> {
    let request = match form.into_request() {
        Ok(request) => request,
        Err(message) => return Json(ExtractionReport::error(message)),
    };

    let guard = state.extractions.register();
    let report = state.scraper.extract(&request, guard.token()).await;
    info!(tmdb_id = %request.tmdb_id, status = ?report.status, "extraction finished");
    Json(report)
}

/// Body of `POST /extract_tmdb`
#[derive(Debug, Default, Deserialize)]
pub struct TmdbForm {
    #[serde(default)]
    pub tmdb_id: Option<Loose>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

/// `POST /extract_tmdb`
pub async fn extract_tmdb(
    State(state): State<AppState>,
    FormOrJson(form): FormOrJson<TmdbForm>,
) -> Json<ApiResponse<TitleMetadata>> {
    let Some(tmdb_id) = form.tmdb_id.as_ref().map(Loose::text).filter(|s| !s.is_empty()) else {
        return Json(ApiResponse::error(MSG_TMDB_ID_REQUIRED));
    };
    let locale = form
        .language
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_LOCALE);

    match state
        .scraper
        .catalog()
        .metadata(&tmdb_id, media_kind(form.kind.as_deref()), locale)
        .await
    {
        Ok(metadata) => Json(ApiResponse::success(metadata)),
        Err(e) => {
            warn!(tmdb_id = %tmdb_id, "metadata lookup failed: {}", e);
            Json(ApiResponse::error(catalog_message(&e)))
        }
    }
}

/// Query of `GET /search_tmdb`
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// `GET /search_tmdb`
pub async fn search_tmdb(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Json<ApiResponse<Vec<SearchHit>>> {
    let Ok(Query(params)) = params else {
        return Json(ApiResponse::error(MSG_BAD_REQUEST));
    };
    let Some(query) = params.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) else {
        return Json(ApiResponse::error(MSG_QUERY_REQUIRED));
    };

    match state
        .scraper
        .catalog()
        .search(query, media_kind(params.kind.as_deref()))
        .await
    {
        Ok(hits) => Json(ApiResponse::success(hits)),
        Err(e) => {
            warn!(query, "search failed: {}", e);
            Json(ApiResponse::error(catalog_message(&e)))
        }
    }
}

/// `POST /stop_extraction`
pub async fn stop_extraction(State(state): State<AppState>) -> Json<ApiResponse<()>> {
    let cancelled = state.extractions.cancel_all();
    info!(cancelled, "stop requested");
    Json(ApiResponse {
        status: ExtractionStatus::Success,
        data: None,
        message: Some(MSG_STOP_REQUESTED.to_string()),
    })
}
