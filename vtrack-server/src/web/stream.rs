//! WebSocket event stream: one text frame per ingested record.
//!
//! Each connection gets its own broadcast receiver and task, so a slow or
//! stalled client only ever delays itself.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;
use tracing::{debug, warn};

use vtrack_core::LocationRecord;

use crate::broadcast::LocationEvent;
use crate::web::AppState;

/// GET /ws: subscribe to live location updates.
pub async fn api_stream(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    // Subscribe before the upgrade completes: anything published once the
    // client sees the handshake is delivered.
    let rx = state.pipeline.broadcaster().subscribe();
    ws.on_upgrade(move |socket| forward(socket, rx))
}

async fn forward(socket: WebSocket, mut rx: Receiver<LocationRecord>) {
    let (mut sink, mut incoming) = socket.split();
    debug!("observer connected");

    loop {
        tokio::select! {
            update = rx.recv() => match update {
                Ok(record) => {
                    let text = LocationEvent::new(&record).to_json();
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "observer fell behind; oldest updates dropped");
                }
                Err(RecvError::Closed) => break,
            },
            msg = incoming.next() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // Pings are answered by the protocol layer; other client frames are ignored
                Some(Ok(_)) => {}
            },
        }
    }

    debug!("observer disconnected");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
