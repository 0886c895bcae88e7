//! Ingestion endpoints: pull (server-side lookup) and push (device report).

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use vtrack_core::TrackError;

use crate::pipeline::PushReport;
use crate::web::{error_response, AppState};

/// GET /location: look up the current position, store and broadcast it.
pub async fn api_pull_location(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    match state.pipeline.ingest_pull().await {
        Ok(record) => (StatusCode::OK, Json(json!(record))),
        Err(e) => error_response(&e),
    }
}

/// POST /update_location: accept a position report from a device.
pub async fn api_push_location(
    State(state): State<Arc<AppState>>,
    body: Result<Json<PushReport>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    // Malformed bodies get the same 400 as out-of-range values
    let report = match body {
        Ok(Json(report)) => report,
        Err(rejection) => {
            return error_response(&TrackError::InvalidInput(rejection.body_text()));
        }
    };

    match state.pipeline.ingest_push(&report).await {
        Ok(record) => (
            StatusCode::OK,
            Json(json!({"success": true, "data": record})),
        ),
        Err(e) => error_response(&e),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
