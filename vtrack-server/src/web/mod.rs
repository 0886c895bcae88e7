//! Web server: axum REST API plus a WebSocket event stream.
//!
//! Shared state is the ingestion pipeline, which owns the tracking state,
//! the record store, the position source, and the broadcaster.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use vtrack_core::TrackError;

use crate::pipeline::IngestPipeline;

pub mod ingest;
pub mod routes;
pub mod stream;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct AppState {
    pub pipeline: Arc<IngestPipeline>,
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Map a pipeline error to a status code and JSON error body.
pub fn error_response(err: &TrackError) -> (StatusCode, Json<Value>) {
    match err {
        TrackError::InvalidInput(_) => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Invalid data", "detail": err.to_string()})),
        ),
        TrackError::PositionUnavailable => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Could not fetch location"})),
        ),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": err.to_string()})),
        ),
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Ingestion
        .route("/location", get(ingest::api_pull_location))
        .route("/update_location", post(ingest::api_push_location))
        // Queries
        .route("/location/latest", get(routes::api_latest))
        .route("/locations", get(routes::api_locations))
        .route("/status", get(routes::api_status))
        // Live updates
        .route("/ws", get(stream::api_stream))
        .with_state(state)
        .layer(cors)
}

/// Start the web server and run until Ctrl-C.
pub async fn serve(state: Arc<AppState>, host: &str, port: u16) -> std::io::Result<()> {
    let app = build_router(state);
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("vtrack server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}
