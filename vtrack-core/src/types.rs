//! Shared types and error enum for vtrack-core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors produced by the tracking pipeline.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("position unavailable from upstream source")]
    PositionUnavailable,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TrackError>;

// ---------------------------------------------------------------------------
// Coordinates
// ---------------------------------------------------------------------------

pub const MIN_LAT: f64 = -90.0;
pub const MAX_LAT: f64 = 90.0;
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// A validated WGS84 latitude/longitude pair in degrees.
///
/// Fields are private so every instance has passed range checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !(MIN_LAT..=MAX_LAT).contains(&latitude) {
            return Err(TrackError::InvalidInput(format!(
                "latitude {latitude} outside [{MIN_LAT}, {MAX_LAT}]"
            )));
        }
        if !longitude.is_finite() || !(MIN_LON..=MAX_LON).contains(&longitude) {
            return Err(TrackError::InvalidInput(format!(
                "longitude {longitude} outside [{MIN_LON}, {MAX_LON}]"
            )));
        }
        Ok(Coordinate {
            latitude,
            longitude,
        })
    }

    /// Validate a pair where either side may be missing.
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Result<Self> {
        match (latitude, longitude) {
            (Some(lat), Some(lon)) => Self::new(lat, lon),
            (None, _) => Err(TrackError::InvalidInput("latitude is required".into())),
            (_, None) => Err(TrackError::InvalidInput("longitude is required".into())),
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

// ---------------------------------------------------------------------------
// Observations + records
// ---------------------------------------------------------------------------

/// A single (position, instant) pair used as the baseline for speed derivation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Observation {
    pub coord: Coordinate,
    pub at: DateTime<Utc>,
}

impl Observation {
    pub fn new(coord: Coordinate, at: DateTime<Utc>) -> Self {
        Observation { coord, at }
    }
}

/// One location report after speed derivation.
///
/// `id` is `None` until the record store assigns one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
    pub speed: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl LocationRecord {
    pub fn new(coord: Coordinate, timestamp: DateTime<Utc>, speed: f64) -> Self {
        LocationRecord {
            latitude: coord.latitude(),
            longitude: coord.longitude(),
            timestamp,
            speed,
            id: None,
        }
    }

    /// Attach the store-assigned identifier.
    pub fn with_id(mut self, id: String) -> Self {
        self.id = Some(id);
        self
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_coordinate_valid() {
        let c = Coordinate::new(13.08, 80.27).unwrap();
        assert_eq!(c.latitude(), 13.08);
        assert_eq!(c.longitude(), 80.27);
    }

    #[test]
    fn test_coordinate_bounds_inclusive() {
        assert!(Coordinate::new(90.0, 180.0).is_ok());
        assert!(Coordinate::new(-90.0, -180.0).is_ok());
    }

    #[test]
    fn test_coordinate_latitude_out_of_range() {
        let err = Coordinate::new(200.0, 80.0).unwrap_err();
        assert!(matches!(err, TrackError::InvalidInput(_)));
    }

    #[test]
    fn test_coordinate_longitude_out_of_range() {
        assert!(Coordinate::new(13.0, -180.5).is_err());
    }

    #[test]
    fn test_coordinate_rejects_nan() {
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
        assert!(Coordinate::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_from_parts_missing() {
        assert!(matches!(
            Coordinate::from_parts(None, Some(80.0)),
            Err(TrackError::InvalidInput(_))
        ));
        assert!(matches!(
            Coordinate::from_parts(Some(13.0), None),
            Err(TrackError::InvalidInput(_))
        ));
        assert!(Coordinate::from_parts(Some(13.0), Some(80.0)).is_ok());
    }

    #[test]
    fn test_record_serialization() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let coord = Coordinate::new(13.08, 80.27).unwrap();
        let record = LocationRecord::new(coord, ts, 1.25);

        let unsaved = serde_json::to_value(&record).unwrap();
        assert!(unsaved.get("id").is_none());
        assert_eq!(unsaved["timestamp"], "2025-03-01T12:00:00Z");

        let saved = serde_json::to_value(record.with_id("abc".into())).unwrap();
        assert_eq!(saved["id"], "abc");
        assert_eq!(saved["speed"], 1.25);
        assert_eq!(saved["latitude"], 13.08);
    }
}
