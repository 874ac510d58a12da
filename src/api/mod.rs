//! HTTP/JSON API Layer
//!
//! REST-style endpoints consumed by the mobile game client.
//!
//! ## Architecture
//! ```text
//! Mobile Client (JSON over HTTP)
//!       ↓
//! Axum Router
//!       ↓
//! Service Handlers (player, economy, progress, leaderboard, session, chapter)
//!       ↓
//! StorageManager (PostgreSQL or in-memory)
//! ```

pub mod chapter;
pub mod economy;
pub mod leaderboard;
pub mod player;
pub mod progress;
pub mod session;

use std::sync::Arc;

use axum::{middleware, routing::get, Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::metrics::ServerMetrics;
use crate::storage::repository::StorageManager;

/// Shared state available to all API handlers
#[derive(Clone)]
pub struct ApiState {
    pub storage: Arc<StorageManager>,
    /// Server-wide metrics (lock-free atomics)
    pub metrics: Arc<ServerMetrics>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Build the full API router with all service endpoints
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(crate::metrics::prometheus_handler))
        .route("/metrics/json", get(crate::metrics::json_metrics_handler))
        .merge(player::routes())
        .merge(economy::routes())
        .merge(progress::routes())
        .merge(leaderboard::routes())
        .merge(session::routes())
        .merge(chapter::routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::metrics::metrics_middleware,
        ))
        // Mobile clients connect from anywhere
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP API server on the given port
pub async fn start_api_server(
    storage: Arc<StorageManager>,
    port: u16,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let metrics = ServerMetrics::new();
    let state = ApiState { storage, metrics };
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("API server listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
