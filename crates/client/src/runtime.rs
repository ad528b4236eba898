//! Per-identity timer tasks.
//!
//! Three independent intervals drive the client: the reconciliation
//! tick, the activity heartbeat, and the presence poll. All three are
//! scoped to one identity under a single `CancellationToken`. Logout
//! must call [`IdentityTimers::stop`], which cancels and awaits every
//! task, before timers for another identity start, so no timer ever
//! fires against the wrong identity's state.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use workpulse_core::types::DbId;

/// What a fired timer wants done. The connection driver consumes these
/// and performs the actual I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerEvent {
    /// Advance the reconciliation cache and push the snapshot.
    ReconcileTick,
    /// Send an activity heartbeat with the current input level.
    HeartbeatDue,
    /// Refresh the presence board.
    PresencePoll,
}

/// Timer periods. Defaults match the server's expectations: minutes
/// accrue once per minute, heartbeats stay well inside the keepalive
/// window.
#[derive(Debug, Clone)]
pub struct TimerConfig {
    pub reconcile_interval: Duration,
    pub heartbeat_interval: Duration,
    pub poll_interval: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            reconcile_interval: Duration::from_secs(60),
            heartbeat_interval: Duration::from_secs(30),
            poll_interval: Duration::from_secs(45),
        }
    }
}

/// Handle to one identity's running timers.
pub struct IdentityTimers {
    identity_id: DbId,
    cancel: CancellationToken,
    handles: Vec<tokio::task::JoinHandle<()>>,
}

/// Start the three timer tasks for an identity.
pub fn start(
    identity_id: DbId,
    config: TimerConfig,
    events: mpsc::Sender<TimerEvent>,
) -> IdentityTimers {
    let cancel = CancellationToken::new();
    let handles = vec![
        spawn_interval(
            config.reconcile_interval,
            TimerEvent::ReconcileTick,
            events.clone(),
            cancel.clone(),
        ),
        spawn_interval(
            config.heartbeat_interval,
            TimerEvent::HeartbeatDue,
            events.clone(),
            cancel.clone(),
        ),
        spawn_interval(
            config.poll_interval,
            TimerEvent::PresencePoll,
            events,
            cancel.clone(),
        ),
    ];
    tracing::debug!(identity_id, "Identity timers started");
    IdentityTimers {
        identity_id,
        cancel,
        handles,
    }
}

fn spawn_interval(
    period: Duration,
    event: TimerEvent,
    events: mpsc::Sender<TimerEvent>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The immediate first tick would double-fire on login.
        interval.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    if events.send(event).await.is_err() {
                        break;
                    }
                }
            }
        }
    })
}

impl IdentityTimers {
    pub fn identity_id(&self) -> DbId {
        self.identity_id
    }

    /// Cancel every timer and wait for the tasks to finish. After this
    /// returns, no event for this identity will ever fire again, so
    /// timers for the next identity can start safely.
    pub async fn stop(self) {
        self.cancel.cancel();
        for handle in self.handles {
            let _ = handle.await;
        }
        tracing::debug!(identity_id = self.identity_id, "Identity timers stopped");
    }
}
