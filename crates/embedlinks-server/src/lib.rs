//! Embed Links HTTP server
//!
//! Exposes the extraction pipeline and the TMDB lookups over HTTP and
//! serves the static web UI.
//!
//! | Route              | Method | Body / query                                   |
//! |--------------------|--------|------------------------------------------------|
//! | `/extract`         | POST   | `tmdb_id, type, server, video_language, ...`   |
//! | `/extract_tmdb`    | POST   | `tmdb_id, type, language`                      |
//! | `/search_tmdb`     | GET    | `query, type`                                  |
//! | `/stop_extraction` | POST   | none                                           |
//!
//! Bodies may be JSON or url-encoded forms.

use anyhow::Context;
use axum::routing::{get, post};
use axum::Router;
use embedlinks_core::{
    ChromiumLauncher, ClientConfig, EmbedScraper, ExtractorConfig, LaunchConfig, LinkExtractor,
    TmdbCatalog,
};
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

pub mod config;
pub mod handlers;
pub mod state;

pub use config::ServerConfig;
pub use state::{AppState, Extractions, Scraper};

/// Builds the scraper described by `config`
pub fn build_scraper(config: &ServerConfig) -> anyhow::Result<Scraper> {
    let catalog = TmdbCatalog::with_config(ClientConfig::with_api_key(config.tmdb_api_key.clone()))
        .context("failed to create TMDB client")?;

    let launcher = ChromiumLauncher::new(LaunchConfig {
        chrome_executable: config.chrome_path.clone(),
        ..LaunchConfig::default()
    });
    let extractor = LinkExtractor::with_config(
        launcher,
        ExtractorConfig {
            embed_base_url: config.embed_base_url.clone(),
            ..ExtractorConfig::default()
        },
    );

    Ok(EmbedScraper::new(catalog, extractor))
}

/// The application router
///
/// Unknown paths fall through to the static UI directory, with
/// `index.html` served at `/`.
pub fn create_app(state: AppState, config: &ServerConfig) -> Router {
    let index = config.static_dir.join("index.html");
    let static_files = ServeDir::new(&config.static_dir).not_found_service(ServeFile::new(index));

    Router::new()
        .route("/extract", post(handlers::extract))
        .route("/extract_tmdb", post(handlers::extract_tmdb))
        .route("/search_tmdb", get(handlers::search_tmdb))
        .route("/stop_extraction", post(handlers::stop_extraction))
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> ServerConfig {
        ServerConfig::from_lookup(|key| match key {
            "TMDB_API_KEY" => Some("test-key".to_string()),
            "STATIC_DIR" => Some("does-not-exist".to_string()),
            _ => None,
        })
        .unwrap()
    }

    fn app_with_tmdb(base_url: &str) -> (Router, AppState) {
        let config = test_config();
        let catalog = TmdbCatalog::with_config(ClientConfig {
            base_url: base_url.to_string(),
            ..ClientConfig::with_api_key("test-key")
        })
        .unwrap();
        let extractor = LinkExtractor::new(ChromiumLauncher::new(LaunchConfig {
            chrome_executable: Some("/nonexistent/chrome".into()),
            ..LaunchConfig::default()
        }));
        let state = AppState::new(EmbedScraper::new(catalog, extractor));
        (create_app(state.clone(), &config), state)
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn form_post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn json_post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_stop_extraction_always_succeeds() {
        let (app, _) = app_with_tmdb("http://127.0.0.1:9");
        let response = app
            .oneshot(Request::builder().method("POST").uri("/stop_extraction").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({ "status": "success", "message": "Detención solicitada" })
        );
    }

    #[tokio::test]
    async fn test_stop_extraction_cancels_registered() {
        let (app, state) = app_with_tmdb("http://127.0.0.1:9");
        let guard = state.extractions.register();

        app.oneshot(Request::builder().method("POST").uri("/stop_extraction").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(guard.token().is_cancelled());
    }

    #[tokio::test]
    async fn test_extract_requires_tmdb_id() {
        let (app, _) = app_with_tmdb("http://127.0.0.1:9");
        let response = app
            .oneshot(form_post("/extract", "type=movie&server=vidcloud"))
            .await
            .unwrap();

        assert_eq!(
            json_body(response).await,
            json!({ "status": "error", "message": "TMDB ID requerido" })
        );
    }

    #[tokio::test]
    async fn test_extract_rejects_unknown_content_type() {
        let (app, _) = app_with_tmdb("http://127.0.0.1:9");
        let request = Request::builder()
            .method("POST")
            .uri("/extract")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("tmdb_id=550"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "error");
    }

    #[tokio::test]
    async fn test_extract_without_imdb_id_answers_before_browser() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movie/550/external_ids"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 550, "imdb_id": null })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let (app, state) = app_with_tmdb(&mock_server.uri());
        let response = app
            .oneshot(form_post("/extract", "tmdb_id=550&type=movie&server=vidcloud&video_language=LAT"))
            .await
            .unwrap();

        // A launch attempt with the missing chrome binary would answer
        // "Película no disponible" instead
        let body = json_body(response).await;
        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().starts_with("No se encontró el ID de IMDB"));
        assert_eq!(state.extractions.registered(), 1);
        assert_eq!(state.extractions.running(), 0);
        mock_server.verify().await;
    }

    #[tokio::test]
    async fn test_search_tmdb() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/movie"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    { "id": 1, "title": "Low", "release_date": "1999-01-01", "popularity": 1.0 },
                    { "id": 550, "title": "Fight Club", "release_date": "1999-10-15",
                      "poster_path": "/p.jpg", "popularity": 60.0 }
                ]
            })))
            .mount(&mock_server)
            .await;

        let (app, _) = app_with_tmdb(&mock_server.uri());
        let response = app
            .oneshot(Request::builder().uri("/search_tmdb?query=fight%20club&type=movie").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body = json_body(response).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["data"][0]["id"], 550);
        assert_eq!(body["data"][0]["year"], "1999");
        assert_eq!(body["data"][0]["poster"], "https://image.tmdb.org/t/p/w92/p.jpg");
        assert_eq!(body["data"][1]["id"], 1);
    }

    #[tokio::test]
    async fn test_search_tmdb_requires_query() {
        let (app, _) = app_with_tmdb("http://127.0.0.1:9");
        let response = app
            .oneshot(Request::builder().uri("/search_tmdb?type=movie").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(
            json_body(response).await,
            json!({ "status": "error", "message": "Búsqueda requerida" })
        );
    }

    #[tokio::test]
    async fn test_extract_tmdb_metadata() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movie/550"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 550,
                "title": "El club de la pelea",
                "overview": "Un empleado de oficina...",
                "poster_path": "/poster.jpg",
                "backdrop_path": "/backdrop.jpg"
            })))
            .mount(&mock_server)
            .await;

        let (app, _) = app_with_tmdb(&mock_server.uri());
        let response = app
            .oneshot(json_post("/extract_tmdb", json!({ "tmdb_id": "550", "type": "movie" })))
            .await
            .unwrap();

        let body = json_body(response).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["data"]["title"], "El club de la pelea");
        assert_eq!(body["data"]["poster_url"], "https://image.tmdb.org/t/p/w500/poster.jpg");
        assert_eq!(body["data"]["backdrop_url"], "https://image.tmdb.org/t/p/original/backdrop.jpg");
    }

    #[tokio::test]
    async fn test_extract_tmdb_not_found() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movie/999999"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let (app, _) = app_with_tmdb(&mock_server.uri());
        let response = app
            .oneshot(form_post("/extract_tmdb", "tmdb_id=999999&type=movie"))
            .await
            .unwrap();

        assert_eq!(
            json_body(response).await,
            json!({ "status": "error", "message": "No se encontró el título en TMDB" })
        );
    }
}
