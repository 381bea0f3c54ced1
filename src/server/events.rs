//! WebSocket event broadcaster for real-time updates
//!
//! Bridges controller snapshots to WebSocket clients.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::ServerAppState;
use crate::events::EVENT_RESEARCH_SNAPSHOT;
use crate::session::ResearchController;

/// A server event that can be broadcast to WebSocket clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerEvent {
    /// Event type (e.g., "research:snapshot")
    pub event: String,
    /// Event payload as JSON value
    pub payload: serde_json::Value,
}

impl ServerEvent {
    pub fn new(event_type: &str, payload: impl Serialize) -> Self {
        Self {
            event: event_type.to_string(),
            payload: serde_json::to_value(payload).unwrap_or(serde_json::Value::Null),
        }
    }
}

/// Broadcasts events to all connected WebSocket clients
pub struct EventBroadcaster {
    tx: broadcast::Sender<ServerEvent>,
}

impl EventBroadcaster {
    /// Create a new event broadcaster with a channel capacity of 1000 events
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1000);
        Self { tx }
    }

    /// Broadcast an event to all connected clients
    pub fn broadcast(&self, event_type: &str, payload: impl Serialize) {
        // Ignore send errors (no receivers)
        let _ = self.tx.send(ServerEvent::new(event_type, payload));
    }

    /// Subscribe to events (returns a receiver)
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Forward every controller snapshot to the broadcaster until the controller
/// goes away
pub fn spawn_snapshot_forwarder(
    controller: &ResearchController,
    broadcaster: Arc<EventBroadcaster>,
) -> JoinHandle<()> {
    let mut updates = controller.subscribe();
    tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            broadcaster.broadcast(EVENT_RESEARCH_SNAPSHOT, &snapshot);
        }
        log::debug!("Snapshot forwarder stopped");
    })
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<ServerAppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Handle a WebSocket connection
async fn handle_websocket(socket: WebSocket, state: ServerAppState) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before reading the snapshot so no change slips in between
    let mut event_rx = state.broadcaster.subscribe();
    let initial = ServerEvent::new(EVENT_RESEARCH_SNAPSHOT, state.controller.snapshot());

    log::info!("WebSocket client connected");

    let send_task = tokio::spawn(async move {
        if let Ok(json) = serde_json::to_string(&initial) {
            if sender.send(Message::Text(json)).await.is_err() {
                return;
            }
        }

        loop {
            let event = match event_rx.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::debug!("WebSocket client lagged by {} events", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::warn!("Failed to serialize event: {}", e);
                }
            }
        }
    });

    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => {
                log::info!("WebSocket client disconnected");
                break;
            }
            Ok(Message::Text(text)) => {
                log::debug!("Ignoring text message from client: {}", text);
            }
            Ok(_) => {}
            Err(e) => {
                log::warn!("WebSocket error: {}", e);
                break;
            }
        }
    }

    send_task.abort();
    log::info!("WebSocket connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_broadcaster() {
        let broadcaster = EventBroadcaster::new();
        let mut rx = broadcaster.subscribe();

        broadcaster.broadcast("research:started", serde_json::json!({"sessionId": "s1"}));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event, "research:started");
        assert_eq!(event.payload["sessionId"], "s1");
    }

    #[test]
    fn test_server_event_serialization() {
        let event = ServerEvent::new(
            EVENT_RESEARCH_SNAPSHOT,
            serde_json::json!({ "isLoading": true }),
        );

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("research:snapshot"));
        assert!(json.contains("isLoading"));
    }
}
