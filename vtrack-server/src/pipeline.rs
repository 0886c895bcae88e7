//! Ingestion pipeline: coordinate → speed → store → broadcast.
//!
//! Two entry points share one path. Pull ingestion asks the position source;
//! push ingestion takes a caller-supplied report. Both validate first and
//! only then touch tracking state, so a rejected input changes nothing.
//!
//! Order on the common path is fixed:
//! 1. swap the new observation into `TrackingState`, getting the prior one
//! 2. derive speed against the prior observation
//! 3. persist, getting the record id
//! 4. publish to observers (best effort)
//!
//! Persisting before publishing means any observer can re-fetch what it was
//! told about. If the store write fails, tracking state has already moved to
//! the new fix with no stored record behind it; the next record's speed is
//! derived from that unstored fix.
//!
//! Speed is only meaningful when reports for the vehicle arrive one at a
//! time. Two sources reporting concurrently get distinct baselines, but their
//! timestamps can cross, in which case the later swap sees a newer baseline
//! and records speed 0.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use vtrack_core::{
    estimate, round_speed, Coordinate, LocationRecord, Result, TrackError, TrackingState,
};

use crate::broadcast::Broadcaster;
use crate::db::RecordStore;
use crate::geocode::PositionSource;

/// Externally supplied position report. Both fields are required; they are
/// optional here so a missing field surfaces as `InvalidInput`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushReport {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

pub struct IngestPipeline {
    state: Arc<TrackingState>,
    store: Arc<dyn RecordStore>,
    source: Arc<dyn PositionSource>,
    broadcaster: Broadcaster,
    query: String,
    lookup_timeout: Duration,
}

impl IngestPipeline {
    pub fn new(
        state: Arc<TrackingState>,
        store: Arc<dyn RecordStore>,
        source: Arc<dyn PositionSource>,
        broadcaster: Broadcaster,
        query: &str,
        lookup_timeout: Duration,
    ) -> Self {
        IngestPipeline {
            state,
            store,
            source,
            broadcaster,
            query: query.to_string(),
            lookup_timeout,
        }
    }

    pub fn state(&self) -> &TrackingState {
        &self.state
    }

    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Look up the current position and ingest it.
    pub async fn ingest_pull(&self) -> Result<LocationRecord> {
        let coord = match tokio::time::timeout(self.lookup_timeout, self.source.lookup(&self.query))
            .await
        {
            Ok(Some(coord)) => coord,
            Ok(None) => return Err(TrackError::PositionUnavailable),
            Err(_) => {
                warn!(
                    query = %self.query,
                    timeout_ms = self.lookup_timeout.as_millis() as u64,
                    "position lookup timed out"
                );
                return Err(TrackError::PositionUnavailable);
            }
        };
        self.ingest_at(coord, Utc::now()).await
    }

    /// Validate and ingest a caller-supplied report.
    pub async fn ingest_push(&self, report: &PushReport) -> Result<LocationRecord> {
        let coord = Coordinate::from_parts(report.latitude, report.longitude)?;
        self.ingest_at(coord, Utc::now()).await
    }

    /// Common path for a validated coordinate observed at `at`.
    ///
    /// `at` is truncated to whole microseconds, the resolution the store
    /// keeps, so the returned and broadcast record equals the stored one.
    pub async fn ingest_at(&self, coord: Coordinate, at: DateTime<Utc>) -> Result<LocationRecord> {
        let at = at.trunc_subsecs(6);
        let previous = self.state.snapshot_and_update(coord, at);
        let speed = round_speed(estimate(previous.as_ref(), coord, at));

        let record = LocationRecord::new(coord, at, speed);
        let id = match self.store.append(&record).await {
            Ok(id) => id,
            Err(e) => {
                warn!(
                    lat = coord.latitude(),
                    lon = coord.longitude(),
                    error = %e,
                    "record not persisted; tracking state already advanced to this fix"
                );
                return Err(e);
            }
        };
        let record = record.with_id(id);

        let observers = self.broadcaster.publish(&record);
        info!(
            lat = record.latitude,
            lon = record.longitude,
            speed = record.speed,
            id = record.id.as_deref().unwrap_or_default(),
            observers,
            "location ingested"
        );

        Ok(record)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
