use anyhow::Context;
use embedlinks_server::{AppState, ServerConfig, build_scraper, create_app};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "embedlinks_server=debug,embedlinks_core=debug,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    if !config.static_dir.is_dir() {
        warn!("static directory {} not found, UI will not be served", config.static_dir.display());
    }

    let state = AppState::new(build_scraper(&config)?);
    let extractions = state.extractions.clone();
    let app = create_app(state, &config);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Servidor en http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for shutdown signal: {}", e);
                return;
            }
            let cancelled = extractions.cancel_all();
            info!(cancelled, "shutting down");
        })
        .await?;

    Ok(())
}
