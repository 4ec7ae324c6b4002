//! HTTP server exposing the reconciled products

pub mod routes;
pub mod state;

use axum::Router;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;

use crate::{config::ServerConfig, isotrack_errors::IsotrackError};
use state::AppState;

/// Router with every route mounted under `/api`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", routes::api_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub struct IsotrackServer {
    config: ServerConfig,
    state: AppState,
}

impl IsotrackServer {
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Bind and serve until the process stops.
    pub async fn start(self) -> Result<(), IsotrackError> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| IsotrackError::Config(format!("Invalid address: {}", e)))?;

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("isotrack server listening on http://{}", addr);

        axum::serve(listener, build_router(self.state)).await?;
        Ok(())
    }
}
