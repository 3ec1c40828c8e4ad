use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use design_studio::config::{read_api_key, Config};
use design_studio::gemini::GeminiClient;
use design_studio::routes::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = Config::from_env();
    if read_api_key().is_empty() {
        tracing::warn!("No GEMINI_API_KEY set; generation calls will be rejected by the backend");
    }
    tracing::info!(base = %config.gemini.base_url, poll = ?config.gemini.poll_interval, "Gemini backend configured");

    let state = AppState::new(Arc::new(GeminiClient::new(config.gemini.clone())));
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("binding {}", addr))?;
    tracing::info!(%addr, "Starting server");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await
        .context("server error")?;
    Ok(())
}
