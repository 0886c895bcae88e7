//! Position source adapters.
//!
//! The pull ingestion path asks a `PositionSource` for the vehicle's current
//! coordinate. The production adapter queries a Nominatim-compatible search
//! endpoint; the caller bounds each lookup with its own timeout.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use vtrack_core::{Coordinate, TrackError};

#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Resolve `query` to a coordinate. `None` covers every failure mode:
    /// transport errors, non-2xx responses, empty results, bad payloads.
    async fn lookup(&self, query: &str) -> Option<Coordinate>;
}

/// One search hit. Nominatim returns coordinates as decimal strings.
#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

/// Free-text geocoding via a Nominatim `/search` endpoint.
pub struct NominatimSource {
    url: String,
    client: reqwest::Client,
}

impl NominatimSource {
    pub fn new(url: &str, user_agent: &str, timeout: Duration) -> Result<Self, TrackError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| TrackError::Config(format!("http client: {e}")))?;
        Ok(NominatimSource {
            url: url.to_string(),
            client,
        })
    }

    async fn search(&self, query: &str) -> reqwest::Result<Vec<Place>> {
        self.client
            .get(&self.url)
            .query(&[("q", query), ("format", "json"), ("limit", "1")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

#[async_trait]
impl PositionSource for NominatimSource {
    async fn lookup(&self, query: &str) -> Option<Coordinate> {
        match self.search(query).await {
            Ok(places) => {
                let coord = first_coordinate(&places);
                if coord.is_none() {
                    warn!(query, hits = places.len(), "geocoder returned no usable position");
                }
                coord
            }
            Err(e) => {
                warn!(query, error = %e, "geocoder lookup failed");
                None
            }
        }
    }
}

/// First hit whose coordinates parse and are in range.
fn first_coordinate(places: &[Place]) -> Option<Coordinate> {
    let place = places.first()?;
    let lat = place.lat.trim().parse::<f64>().ok()?;
    let lon = place.lon.trim().parse::<f64>().ok()?;
    match Coordinate::new(lat, lon) {
        Ok(c) => Some(c),
        Err(e) => {
            debug!(error = %e, "discarding geocoder hit");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
