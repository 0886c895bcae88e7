//! Read-only query endpoints.
//!
//! None of these touch tracking state except `/status`, which takes a
//! snapshot copy.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::web::{error_response, AppState};

/// GET /location/latest: most recent record, or `{"data": null}` when the
/// store is empty.
pub async fn api_latest(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    match state.pipeline.store().find_latest().await {
        Ok(latest) => (StatusCode::OK, Json(json!({ "data": latest }))),
        Err(e) => error_response(&e),
    }
}

/// GET /locations: every record in chronological order, for replay.
pub async fn api_locations(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    match state.pipeline.store().find_all_ordered().await {
        Ok(records) => (StatusCode::OK, Json(json!(records))),
        Err(e) => error_response(&e),
    }
}

/// GET /status: last observation, observer count, stored record count.
pub async fn api_status(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let pipeline = &state.pipeline;
    let last = pipeline.state().snapshot().map(|obs| {
        json!({
            "latitude": obs.coord.latitude(),
            "longitude": obs.coord.longitude(),
            "timestamp": obs.at,
        })
    });
    let records = match pipeline.store().count().await {
        Ok(n) => n,
        Err(e) => return error_response(&e),
    };

    (
        StatusCode::OK,
        Json(json!({
            "last_observation": last,
            "observers": pipeline.broadcaster().subscriber_count(),
            "records": records,
        })),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
