//! Cross-tab coordination: exactly one local tab acts as the live
//! session; the rest observe.
//!
//! Tabs communicate over an explicit typed publish/subscribe channel,
//! not storage-change side effects. Leadership goes to the earliest
//! registered tab; when the leader closes, the earliest survivor is
//! promoted and every tab is notified.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::sync::broadcast;
use workpulse_core::presence::PresenceRecord;
use workpulse_core::summary::DaySummary;

/// Locally unique tab identifier.
pub type TabId = u64;

/// Typed messages carried between tabs.
#[derive(Debug, Clone)]
pub enum TabMessage {
    /// Leadership moved (or was first established).
    LeaderChanged { leader: TabId },

    /// The live tab mirrors a presence update to passive tabs.
    PresenceMirror { record: PresenceRecord },

    /// The live tab mirrors a summary snapshot to passive tabs.
    SummaryMirror { summary: DaySummary },
}

/// A registered tab: its id plus the message subscription.
pub struct TabRegistration {
    pub id: TabId,
    pub messages: broadcast::Receiver<TabMessage>,
}

/// Channel capacity for tab messages.
const CHANNEL_CAPACITY: usize = 64;

/// The in-process coordinator shared by all tabs of one client.
pub struct TabCoordinator {
    tabs: Mutex<Vec<TabId>>,
    next_id: AtomicU64,
    tx: broadcast::Sender<TabMessage>,
}

impl TabCoordinator {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tabs: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            tx,
        }
    }

    /// Register a new tab. The first registration becomes the leader
    /// and a `LeaderChanged` is published (the new tab's subscription
    /// is live before the announcement, so it sees its own election).
    pub fn register(&self) -> TabRegistration {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let messages = self.tx.subscribe();

        let became_leader = {
            let mut tabs = self.lock();
            tabs.push(id);
            tabs.len() == 1
        };
        if became_leader {
            self.publish(TabMessage::LeaderChanged { leader: id });
        }

        TabRegistration { id, messages }
    }

    /// Remove a closed tab. If it was the leader, the earliest
    /// surviving registration is promoted and announced.
    pub fn unregister(&self, id: TabId) {
        let promoted = {
            let mut tabs = self.lock();
            let Some(position) = tabs.iter().position(|t| *t == id) else {
                return;
            };
            tabs.remove(position);
            (position == 0).then(|| tabs.first().copied()).flatten()
        };
        if let Some(leader) = promoted {
            self.publish(TabMessage::LeaderChanged { leader });
        }
    }

    /// The current live tab, if any.
    pub fn leader(&self) -> Option<TabId> {
        self.lock().first().copied()
    }

    pub fn is_leader(&self, id: TabId) -> bool {
        self.leader() == Some(id)
    }

    /// Publish a typed message to every registered tab.
    pub fn publish(&self, message: TabMessage) {
        let _ = self.tx.send(message);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TabMessage> {
        self.tx.subscribe()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<TabId>> {
        match self.tabs.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for TabCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
