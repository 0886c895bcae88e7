//! `vtrack watch`: attach to a server's event stream and print updates.

use futures_util::StreamExt;
use serde::Deserialize;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::warn;

use vtrack_core::{LocationRecord, TrackError};

use crate::broadcast::LOCATION_UPDATE;

#[derive(Debug, Deserialize)]
struct StreamEvent {
    event: String,
    data: LocationRecord,
}

/// Extract the record from a `location_update` frame.
pub fn parse_event(text: &str) -> Option<LocationRecord> {
    let event: StreamEvent = serde_json::from_str(text).ok()?;
    (event.event == LOCATION_UPDATE).then_some(event.data)
}

pub fn format_record(record: &LocationRecord) -> String {
    format!(
        "{}  lat {:>9.5}  lon {:>10.5}  speed {:>6.2} m/s  id {}",
        record.timestamp.format("%Y-%m-%dT%H:%M:%SZ"),
        record.latitude,
        record.longitude,
        record.speed,
        record.id.as_deref().unwrap_or("-"),
    )
}

/// Print updates until the server closes the stream, or after `limit` updates.
pub async fn run(url: &str, limit: Option<usize>) -> Result<(), TrackError> {
    let (ws, _) = connect_async(url)
        .await
        .map_err(|e| TrackError::Io(std::io::Error::other(e)))?;
    eprintln!("Connected to {url}");

    let (_write, mut read) = ws.split();
    let mut seen = 0usize;

    while let Some(msg) = read.next().await {
        match msg.map_err(|e| TrackError::Io(std::io::Error::other(e)))? {
            Message::Text(text) => match parse_event(&text) {
                Some(record) => {
                    println!("{}", format_record(&record));
                    seen += 1;
                    if limit.is_some_and(|n| seen >= n) {
                        break;
                    }
                }
                None => warn!(frame = %text, "ignoring unrecognised event"),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    Ok(())
}
