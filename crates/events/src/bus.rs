//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`PresenceBus`] is the publish/subscribe hub between the session
//! service (sole publisher) and the WebSocket fan-out task. It is
//! designed to be shared via `Arc<PresenceBus>`.

use tokio::sync::broadcast;
use workpulse_core::event::StatusEvent;
use workpulse_core::presence::PresenceRecord;
use workpulse_core::summary::DaySummary;
use workpulse_core::types::DbId;

/// A presence-domain event ready for fan-out to connected viewers.
///
/// Every variant carries the full updated value, never a diff, so
/// subscribers stay stateless with respect to merge logic. The session
/// service publishes only after the corresponding store write has
/// completed.
#[derive(Debug, Clone)]
pub enum PresenceEvent {
    /// An identity's live record changed (status or activity).
    PresenceUpdated(PresenceRecord),

    /// Events newly appended to the log, for viewers to replay.
    HistoryAppended(Vec<StatusEvent>),

    /// A snapshot was recomputed and upserted.
    SummaryUpdated(DaySummary),

    /// An identity went offline; its presence record is gone.
    Offline(DbId),
}

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out bus for [`PresenceEvent`]s.
pub struct PresenceBus {
    sender: broadcast::Sender<PresenceEvent>,
}

impl PresenceBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest un-consumed messages are
    /// dropped and slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// With zero subscribers the event is silently dropped; durability
    /// is the store's job, not the bus's.
    pub fn publish(&self, event: PresenceEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<PresenceEvent> {
        self.sender.subscribe()
    }
}

impl Default for PresenceBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use workpulse_core::status::StatusCategory;

    fn record(identity_id: DbId) -> PresenceRecord {
        PresenceRecord::new(
            identity_id,
            StatusCategory::Available,
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = PresenceBus::default();
        let mut rx = bus.subscribe();

        bus.publish(PresenceEvent::PresenceUpdated(record(7)));

        match rx.recv().await.expect("should receive the event") {
            PresenceEvent::PresenceUpdated(rec) => assert_eq!(rec.identity_id, 7),
            other => panic!("Expected PresenceUpdated, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = PresenceBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(PresenceEvent::Offline(3));

        for rx in [&mut rx1, &mut rx2] {
            match rx.recv().await.expect("subscriber should receive") {
                PresenceEvent::Offline(id) => assert_eq!(id, 3),
                other => panic!("Expected Offline, got {other:?}"),
            }
        }
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = PresenceBus::default();
        bus.publish(PresenceEvent::Offline(1));
    }
}
