//! isotrack HTTP server
//!
//! Run with: cargo run --bin isotrack-server
//! Configuration: `ISOTRACK_CONFIG=/path/to/isotrack.toml`, defaults otherwise.

use isotrack::{
    config::EngineConfig,
    server::{state::AppState, IsotrackServer},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "isotrack=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = EngineConfig::load()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Target: {}", config.target.horizons_command);
    tracing::info!(
        "  - Rate limit: {} requests / {} s",
        config.gateway.requests_per_window,
        config.gateway.window_secs
    );
    match &config.cache.database_path {
        Some(path) => tracing::info!("  - Durable cache: {}", path.display()),
        None => tracing::info!("  - Durable cache: disabled"),
    }

    let state = AppState::from_config(&config).await?;
    tracing::info!("Predicted orbit: {}", state.elements());

    let server = IsotrackServer::new(config.server.clone(), state);
    server.start().await?;

    Ok(())
}
