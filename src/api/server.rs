//! HTTP server setup and routing

use crate::error::{Error, Result};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::info;

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes as usize;
    let request_timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::new()
        .route("/api/diarization", post(super::handlers::diarization))
        .route("/api/separate", post(super::handlers::separate))
        .route("/api/health", get(super::handlers::health))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        // Outer deadline for stalled reads; the scheduler enforces the much
        // tighter per-task budget.
        .layer(TimeoutLayer::new(request_timeout))
        // Local tooling and the SPA dev server talk to this directly
        .layer(CorsLayer::permissive())
}

/// Run the HTTP API server until shutdown.
pub async fn run(state: AppState) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", state.config.host, state.config.port)
        .parse()
        .map_err(|e| Error::Internal(format!("invalid bind address: {}", e)))?;

    let app = build_router(state);

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| Error::Internal(format!("server error: {}", e)))?;

    Ok(())
}
