use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::ws::Message;
use tokio::sync::{mpsc, RwLock};
use workpulse_core::protocol::ServerMessage;
use workpulse_core::types::{DbId, Timestamp};

/// Channel sender half for pushing frames to a WebSocket connection.
pub type FrameSender = mpsc::UnboundedSender<Message>;

/// Metadata for a single WebSocket connection.
pub struct ClientConnection {
    /// Authenticated identity, set once login or resume succeeds.
    pub identity_id: Option<DbId>,
    /// Channel sender for outbound frames to this connection.
    sender: FrameSender,
    /// When this connection was established.
    pub connected_at: Timestamp,
}

/// Registry of all active WebSocket connections.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc`
/// and shared between the axum handlers and the session service (which
/// uses it to deliver force-logout frames during takeovers).
pub struct ConnectionManager {
    connections: RwLock<HashMap<String, ClientConnection>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection.
    ///
    /// Returns the receiver half of the frame channel so the caller can
    /// forward frames to the WebSocket sink.
    pub async fn add(&self, conn_id: String) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = ClientConnection {
            identity_id: None,
            sender: tx,
            connected_at: chrono::Utc::now(),
        };
        self.connections.write().await.insert(conn_id, conn);
        rx
    }

    /// Attach an authenticated identity to a connection.
    pub async fn bind_identity(&self, conn_id: &str, identity_id: DbId) {
        if let Some(conn) = self.connections.write().await.get_mut(conn_id) {
            conn.identity_id = Some(identity_id);
        }
    }

    /// Remove a connection by its ID.
    pub async fn remove(&self, conn_id: &str) {
        self.connections.write().await.remove(conn_id);
    }

    /// Send a message to one connection. Returns `false` if the
    /// connection is unknown or its channel has closed.
    pub async fn send(&self, conn_id: &str, message: &ServerMessage) -> bool {
        let Some(frame) = encode(message) else {
            return false;
        };
        match self.connections.read().await.get(conn_id) {
            Some(conn) => conn.sender.send(frame).is_ok(),
            None => false,
        }
    }

    /// Push a Close frame to one connection. The socket task tears the
    /// connection down when the frame is flushed.
    pub async fn close(&self, conn_id: &str) {
        if let Some(conn) = self.connections.read().await.get(conn_id) {
            let _ = conn.sender.send(Message::Close(None));
        }
    }

    /// Broadcast a message to every connected client.
    ///
    /// Connections whose send channels are closed are silently skipped;
    /// they are cleaned up by their own receive loops.
    pub async fn broadcast(&self, message: &ServerMessage) {
        let Some(frame) = encode(message) else {
            return;
        };
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(frame.clone());
        }
    }

    /// Return the current number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a Ping frame to every connected client.
    pub async fn ping_all(&self) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Ping(Bytes::new()));
        }
    }

    /// Send a Close frame to every connection, then clear the map.
    /// Used during graceful shutdown.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialize a [`ServerMessage`] into a text frame.
fn encode(message: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode server message");
            None
        }
    }
}
