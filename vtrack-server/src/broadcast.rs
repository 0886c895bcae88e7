//! Live fan-out of enriched records to connected observers.
//!
//! Backed by a bounded `tokio::sync::broadcast` channel: `publish` never
//! waits on observers. An observer that falls more than `capacity` events
//! behind loses the oldest ones and carries on. Observers only see events
//! published after they subscribed.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use vtrack_core::LocationRecord;

/// Largest buffer a broadcaster will allocate, whatever the config asks for.
const MAX_CAPACITY: usize = 65_536;

/// Event name carried in every stream message.
pub const LOCATION_UPDATE: &str = "location_update";

/// Wire envelope for one stream message.
#[derive(Debug, Serialize)]
pub struct LocationEvent<'a> {
    pub event: &'static str,
    pub data: &'a LocationRecord,
}

impl<'a> LocationEvent<'a> {
    pub fn new(data: &'a LocationRecord) -> Self {
        LocationEvent {
            event: LOCATION_UPDATE,
            data,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[derive(Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<LocationRecord>,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.clamp(1, MAX_CAPACITY));
        Broadcaster { tx }
    }

    /// Hand `record` to every current observer. Returns how many were reached.
    ///
    /// Having no observers is not an error for the caller; it is logged and
    /// the record is dropped.
    pub fn publish(&self, record: &LocationRecord) -> usize {
        match self.tx.send(record.clone()) {
            Ok(n) => n,
            Err(_) => {
                debug!(id = ?record.id, "no observers connected; update not delivered");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LocationRecord> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
