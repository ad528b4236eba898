//! Fan-out task bridging the presence bus to connected sockets.

use std::sync::Arc;

use tokio::sync::broadcast;
use workpulse_core::protocol::ServerMessage;
use workpulse_events::PresenceEvent;

use crate::ws::ConnectionManager;

/// Background task that forwards every bus event to all viewers.
///
/// The session service publishes only after persistence, so everything
/// arriving here is safe to broadcast.
pub struct PresenceRouter;

impl PresenceRouter {
    /// Run the fan-out loop until the bus is dropped.
    pub async fn run(
        connections: Arc<ConnectionManager>,
        mut receiver: broadcast::Receiver<PresenceEvent>,
    ) {
        loop {
            match receiver.recv().await {
                Ok(event) => connections.broadcast(&frame_for(event)).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Presence fan-out lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Presence bus closed, fan-out shutting down");
                    break;
                }
            }
        }
    }
}

fn frame_for(event: PresenceEvent) -> ServerMessage {
    match event {
        PresenceEvent::PresenceUpdated(record) => ServerMessage::PresenceUpdate { record },
        PresenceEvent::HistoryAppended(events) => ServerMessage::HistoryUpdate { events },
        PresenceEvent::SummaryUpdated(summary) => ServerMessage::SummaryUpdate { summary },
        PresenceEvent::Offline(identity_id) => ServerMessage::Offline { identity_id },
    }
}
