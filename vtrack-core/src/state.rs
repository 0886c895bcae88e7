//! Last-known observation for the tracked vehicle.
//!
//! Pure state, no I/O. The ingestion pipeline owns one `TrackingState`
//! (behind an `Arc`) and touches it only through `snapshot_and_update`, so
//! reading the previous fix and installing the new one is a single critical
//! section. Two concurrent ingestions can never derive speed from the same
//! baseline.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::types::{Coordinate, Observation};

#[derive(Debug, Default)]
pub struct TrackingState {
    previous: Mutex<Option<Observation>>,
}

impl TrackingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `(coord, at)` as the latest observation and return the one it
    /// replaced.
    pub fn snapshot_and_update(&self, coord: Coordinate, at: DateTime<Utc>) -> Option<Observation> {
        let mut guard = self.lock();
        guard.replace(Observation::new(coord, at))
    }

    /// Copy of the current observation, for diagnostics.
    pub fn snapshot(&self) -> Option<Observation> {
        *self.lock()
    }

    // The guarded value is a plain Copy type that is always fully written, so
    // a panic in another holder cannot leave it half-updated.
    fn lock(&self) -> MutexGuard<'_, Option<Observation>> {
        self.previous.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_starts_empty() {
        let state = TrackingState::new();
        assert!(state.snapshot().is_none());
    }

    #[test]
    fn test_swap_returns_prior() {
        let state = TrackingState::new();
        let a = Coordinate::new(13.0, 80.0).unwrap();
        let b = Coordinate::new(13.1, 80.1).unwrap();

        assert!(state.snapshot_and_update(a, t0()).is_none());

        let prev = state
            .snapshot_and_update(b, t0() + Duration::seconds(10))
            .unwrap();
        assert_eq!(prev.coord, a);
        assert_eq!(prev.at, t0());

        let current = state.snapshot().unwrap();
        assert_eq!(current.coord, b);
    }

    #[test]
    fn test_snapshot_does_not_mutate() {
        let state = TrackingState::new();
        let a = Coordinate::new(13.0, 80.0).unwrap();
        state.snapshot_and_update(a, t0());
        assert_eq!(state.snapshot(), state.snapshot());
        assert_eq!(state.snapshot().unwrap().coord, a);
    }

    /// Each call embeds its sequence number in the timestamp. Every returned
    /// snapshot must be another call's input, used by exactly one successor.
    #[test]
    fn test_concurrent_swaps_never_share_baseline() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 500;
        let total = THREADS * PER_THREAD;

        let state = Arc::new(TrackingState::new());
        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let state = Arc::clone(&state);
                thread::spawn(move || {
                    let mut seen = Vec::with_capacity(PER_THREAD);
                    for i in 0..PER_THREAD {
                        let seq = (t * PER_THREAD + i) as i64;
                        let coord = Coordinate::new(0.0, 0.0).unwrap();
                        let at = t0() + Duration::milliseconds(seq);
                        let prev = state.snapshot_and_update(coord, at);
                        seen.push((seq, prev.map(|p| (p.at - t0()).num_milliseconds())));
                    }
                    seen
                })
            })
            .collect();

        let results: Vec<(i64, Option<i64>)> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        assert_eq!(results.len(), total);

        let empties = results.iter().filter(|(_, p)| p.is_none()).count();
        assert_eq!(empties, 1, "exactly one call sees the initial empty state");

        let mut prevs = HashSet::new();
        for (seq, prev) in &results {
            if let Some(p) = prev {
                assert_ne!(p, seq, "a call observed its own write");
                assert!(prevs.insert(*p), "baseline {p} observed twice");
            }
        }
        assert_eq!(prevs.len(), total - 1);

        // The one input never returned is the value still held.
        let last = (state.snapshot().unwrap().at - t0()).num_milliseconds();
        assert!(!prevs.contains(&last));
        let inputs: HashSet<i64> = results.iter().map(|(s, _)| *s).collect();
        assert!(prevs.is_subset(&inputs));
    }
}
