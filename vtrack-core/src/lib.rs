//! vtrack-core: Pure data model + speed derivation for single-vehicle tracking.
//!
//! No async, no network, just types and algorithms. This crate is the shared
//! core used by `vtrack-server` (ingestion pipeline, web server, CLI).

pub mod config;
pub mod motion;
pub mod state;
pub mod types;

// Re-export commonly used types at crate root
pub use motion::{distance_m, estimate, round_speed};
pub use state::TrackingState;
pub use types::*;
