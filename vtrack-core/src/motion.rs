//! Speed derivation from consecutive observations.
//!
//! Distance is great-circle (haversine) on a sphere of mean Earth radius.
//! Speed is meters per second and is never negative.

use chrono::{DateTime, Utc};

use crate::types::{Coordinate, Observation};

/// IUGG mean Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Great-circle distance in meters.
pub fn distance_m(a: Coordinate, b: Coordinate) -> f64 {
    let (lat1, lon1) = (a.latitude(), a.longitude());
    let (lat2, lon2) = (b.latitude(), b.longitude());
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let h = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    EARTH_RADIUS_M * 2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Speed in m/s between `previous` and the current fix.
///
/// Returns 0 when there is no previous observation, or when the clock did not
/// move forward (duplicate, skewed, or out-of-order timestamps).
pub fn estimate(previous: Option<&Observation>, current: Coordinate, at: DateTime<Utc>) -> f64 {
    let prev = match previous {
        Some(p) => p,
        None => return 0.0,
    };

    let elapsed = elapsed_secs(prev.at, at);
    if elapsed <= 0.0 {
        return 0.0;
    }

    distance_m(prev.coord, current) / elapsed
}

/// Round to 2 decimals, the precision records are persisted with.
pub fn round_speed(speed: f64) -> f64 {
    (speed * 100.0).round() / 100.0
}

fn elapsed_secs(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to.signed_duration_since(from);
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        // Overflow only for spans of ~292k years
        None => delta.num_milliseconds() as f64 / 1000.0,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    /// Point `meters` north of `origin` along its meridian.
    fn north_of(origin: Coordinate, meters: f64) -> Coordinate {
        let dlat = (meters / EARTH_RADIUS_M).to_degrees();
        coord(origin.latitude() + dlat, origin.longitude())
    }

    #[test]
    fn test_no_previous_is_zero() {
        assert_eq!(estimate(None, coord(13.0, 80.0), t0()), 0.0);
    }

    #[test]
    fn test_zero_elapsed_is_zero() {
        let origin = coord(13.0, 80.0);
        let prev = Observation::new(origin, t0());
        assert_eq!(estimate(Some(&prev), north_of(origin, 100.0), t0()), 0.0);
    }

    #[test]
    fn test_negative_elapsed_is_zero() {
        let origin = coord(13.0, 80.0);
        let prev = Observation::new(origin, t0());
        let earlier = t0() - Duration::seconds(30);
        assert_eq!(estimate(Some(&prev), north_of(origin, 5000.0), earlier), 0.0);
    }

    #[test]
    fn test_hundred_meters_in_hundred_seconds() {
        let origin = coord(13.0, 80.0);
        let prev = Observation::new(origin, t0());
        let speed = estimate(
            Some(&prev),
            north_of(origin, 100.0),
            t0() + Duration::seconds(100),
        );
        assert!((speed - 1.0).abs() < 1e-6, "speed = {speed}");
    }

    #[test]
    fn test_small_latitude_step() {
        // 0.0009 deg of latitude is ~100.1 m
        let prev = Observation::new(coord(13.0, 80.0), t0());
        let speed = estimate(
            Some(&prev),
            coord(13.0009, 80.0),
            t0() + Duration::seconds(100),
        );
        assert!((speed - 1.0).abs() < 0.05, "speed = {speed}");
    }

    #[test]
    fn test_subsecond_elapsed() {
        let origin = coord(13.0, 80.0);
        let prev = Observation::new(origin, t0());
        let speed = estimate(
            Some(&prev),
            north_of(origin, 10.0),
            t0() + Duration::milliseconds(500),
        );
        assert!((speed - 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_stationary() {
        let origin = coord(13.0, 80.0);
        let prev = Observation::new(origin, t0());
        assert_eq!(estimate(Some(&prev), origin, t0() + Duration::seconds(5)), 0.0);
    }

    #[test]
    fn test_distance_chennai_bengaluru() {
        // ~290 km great-circle
        let d = distance_m(coord(13.0827, 80.2707), coord(12.9716, 77.5946));
        assert!((d - 290_000.0).abs() < 5_000.0, "d = {d}");
    }

    #[test]
    fn test_distance_antimeridian() {
        let d = distance_m(coord(0.0, 179.9), coord(0.0, -179.9));
        assert!((d - 22_239.0).abs() < 50.0, "d = {d}");
    }

    #[test]
    fn test_round_speed() {
        assert_eq!(round_speed(1.23456), 1.23);
        assert_eq!(round_speed(1.236), 1.24);
        assert_eq!(round_speed(0.0), 0.0);
    }
}
