//! The session service: Session Authority plus Presence Store.
//!
//! A single actor task owns both the lease map and the presence map.
//! Every mutation arrives as a [`SessionCommand`] on one mpsc queue, so
//! all per-identity operations are strictly serialized and neither map
//! is ever shared mutably. Two racing acquires for the same identity
//! therefore resolve deterministically: the first one processed wins
//! and the second takes the revoke-then-grant path.
//!
//! Ordering contract: the store append/upsert completes before any
//! broadcast leaves the service. A store failure means no state change
//! and no broadcast; the caller gets a retryable error.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::FixedOffset;
use tokio::sync::{mpsc, oneshot};
use workpulse_core::accounting;
use workpulse_core::event::StatusEvent;
use workpulse_core::presence::{ActivityLevel, PresenceRecord};
use workpulse_core::protocol::ServerMessage;
use workpulse_core::status::StatusCategory;
use workpulse_core::summary::DaySummary;
use workpulse_core::types::{DbId, Timestamp};
use workpulse_events::{PresenceBus, PresenceEvent};

use crate::store::StatusStore;
use crate::ws::ConnectionManager;

/// Command queue capacity. Senders back-pressure when full.
const COMMAND_QUEUE_CAPACITY: usize = 256;

/// The exclusive right of one connection to act as an identity's
/// authoritative session. At most one lease exists per identity.
#[derive(Debug, Clone)]
pub struct SessionLease {
    pub identity_id: DbId,
    /// Connection currently owning the lease.
    pub conn_id: String,
    /// SHA-256 of the client-supplied opaque session token. Presenting
    /// the same token again resumes this logical session.
    pub token_hash: String,
    pub acquired_at: Timestamp,
}

/// How an acquire request was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// No prior lease existed.
    Granted,
    /// Same token: the logical session moved to a new connection, with
    /// no revoke notice.
    Resumed,
    /// Different token: the previous session was revoked first.
    TookOver,
}

/// Errors surfaced to wire handlers.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The sending connection no longer owns the identity's lease. The
    /// mutation was dropped.
    #[error("connection no longer owns the session for identity {0}")]
    StaleOwnership(DbId),

    /// A store write failed; the mutation did not happen.
    #[error("persistence failed: {0}")]
    Persistence(String),

    /// The service task is gone (shutdown).
    #[error("session service is not running")]
    ServiceClosed,
}

impl SessionError {
    /// Whether the caller may retry the same mutation.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            SessionError::Persistence(_) | SessionError::ServiceClosed
        )
    }
}

enum SessionCommand {
    AcquireLease {
        identity_id: DbId,
        token_hash: String,
        conn_id: String,
        reply: oneshot::Sender<AcquireOutcome>,
    },
    ReleaseLease {
        identity_id: DbId,
        conn_id: String,
    },
    RevokeLease {
        identity_id: DbId,
        reason: String,
        reply: oneshot::Sender<bool>,
    },
    SetStatus {
        identity_id: DbId,
        status: StatusCategory,
        observed_at: Timestamp,
        conn_id: String,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    SetActivity {
        identity_id: DbId,
        level: ActivityLevel,
        observed_at: Timestamp,
        conn_id: String,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Disconnected {
        conn_id: String,
    },
    PresenceSnapshot {
        reply: oneshot::Sender<Vec<PresenceRecord>>,
    },
}

/// Cloneable handle for submitting commands to the service task.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// Acquire (or take over) the lease for an identity.
    pub async fn acquire_lease(
        &self,
        identity_id: DbId,
        token_hash: String,
        conn_id: String,
    ) -> Result<AcquireOutcome, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::AcquireLease {
                identity_id,
                token_hash,
                conn_id,
                reply,
            })
            .await
            .map_err(|_| SessionError::ServiceClosed)?;
        rx.await.map_err(|_| SessionError::ServiceClosed)
    }

    /// Voluntarily release a lease. No-op unless `conn_id` owns it.
    pub async fn release_lease(
        &self,
        identity_id: DbId,
        conn_id: String,
    ) -> Result<(), SessionError> {
        self.tx
            .send(SessionCommand::ReleaseLease {
                identity_id,
                conn_id,
            })
            .await
            .map_err(|_| SessionError::ServiceClosed)
    }

    /// Administratively revoke a lease regardless of owner. Returns
    /// whether a lease existed.
    pub async fn revoke_lease(
        &self,
        identity_id: DbId,
        reason: String,
    ) -> Result<bool, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::RevokeLease {
                identity_id,
                reason,
                reply,
            })
            .await
            .map_err(|_| SessionError::ServiceClosed)?;
        rx.await.map_err(|_| SessionError::ServiceClosed)
    }

    /// Record a status change observed at `observed_at` (server clock).
    pub async fn set_status(
        &self,
        identity_id: DbId,
        status: StatusCategory,
        observed_at: Timestamp,
        conn_id: String,
    ) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::SetStatus {
                identity_id,
                status,
                observed_at,
                conn_id,
                reply,
            })
            .await
            .map_err(|_| SessionError::ServiceClosed)?;
        rx.await.map_err(|_| SessionError::ServiceClosed)?
    }

    /// Record an activity heartbeat. Never touches the status half of
    /// the record and never appends to the event log.
    pub async fn set_activity(
        &self,
        identity_id: DbId,
        level: ActivityLevel,
        observed_at: Timestamp,
        conn_id: String,
    ) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::SetActivity {
                identity_id,
                level,
                observed_at,
                conn_id,
                reply,
            })
            .await
            .map_err(|_| SessionError::ServiceClosed)?;
        rx.await.map_err(|_| SessionError::ServiceClosed)?
    }

    /// Report an unexpected connection close. Releases the lease and
    /// clears presence immediately; there is no reconnection grace
    /// window.
    pub async fn disconnected(&self, conn_id: String) -> Result<(), SessionError> {
        self.tx
            .send(SessionCommand::Disconnected { conn_id })
            .await
            .map_err(|_| SessionError::ServiceClosed)
    }

    /// All live presence records.
    pub async fn presence_snapshot(&self) -> Result<Vec<PresenceRecord>, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::PresenceSnapshot { reply })
            .await
            .map_err(|_| SessionError::ServiceClosed)?;
        rx.await.map_err(|_| SessionError::ServiceClosed)
    }
}

/// The actor state. Constructed and consumed by [`SessionService::spawn`].
pub struct SessionService {
    sessions: HashMap<DbId, SessionLease>,
    presence: HashMap<DbId, PresenceRecord>,
    store: Arc<dyn StatusStore>,
    bus: Arc<PresenceBus>,
    connections: Arc<ConnectionManager>,
    zone: FixedOffset,
}

impl SessionService {
    /// Start the service task and return a handle to it.
    pub fn spawn(
        store: Arc<dyn StatusStore>,
        bus: Arc<PresenceBus>,
        connections: Arc<ConnectionManager>,
        zone: FixedOffset,
    ) -> SessionHandle {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let service = Self {
            sessions: HashMap::new(),
            presence: HashMap::new(),
            store,
            bus,
            connections,
            zone,
        };
        tokio::spawn(service.run(rx));
        SessionHandle { tx }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<SessionCommand>) {
        while let Some(command) = rx.recv().await {
            self.handle(command).await;
        }
        tracing::info!("Session service stopped");
    }

    async fn handle(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::AcquireLease {
                identity_id,
                token_hash,
                conn_id,
                reply,
            } => {
                let outcome = self.acquire(identity_id, token_hash, conn_id).await;
                let _ = reply.send(outcome);
            }
            SessionCommand::ReleaseLease {
                identity_id,
                conn_id,
            } => self.release(identity_id, &conn_id),
            SessionCommand::RevokeLease {
                identity_id,
                reason,
                reply,
            } => {
                let existed = self.revoke(identity_id, &reason).await;
                let _ = reply.send(existed);
            }
            SessionCommand::SetStatus {
                identity_id,
                status,
                observed_at,
                conn_id,
                reply,
            } => {
                let result = self
                    .set_status(identity_id, status, observed_at, &conn_id)
                    .await;
                let _ = reply.send(result);
            }
            SessionCommand::SetActivity {
                identity_id,
                level,
                observed_at,
                conn_id,
                reply,
            } => {
                let result = self.set_activity(identity_id, level, observed_at, &conn_id);
                let _ = reply.send(result);
            }
            SessionCommand::Disconnected { conn_id } => self.connection_closed(&conn_id),
            SessionCommand::PresenceSnapshot { reply } => {
                let _ = reply.send(self.presence.values().cloned().collect());
            }
        }
    }

    async fn acquire(
        &mut self,
        identity_id: DbId,
        token_hash: String,
        conn_id: String,
    ) -> AcquireOutcome {
        let same_token = self
            .sessions
            .get(&identity_id)
            .map(|lease| lease.token_hash == token_hash);

        match same_token {
            None => {
                self.sessions
                    .insert(identity_id, new_lease(identity_id, token_hash, conn_id));
                tracing::info!(identity_id, "Lease granted");
                AcquireOutcome::Granted
            }
            // Reload of the same logical session: move ownership to the
            // new connection without a revoke notice.
            Some(true) => {
                if let Some(lease) = self.sessions.get_mut(&identity_id) {
                    lease.conn_id = conn_id;
                }
                tracing::info!(identity_id, "Lease resumed on new connection");
                AcquireOutcome::Resumed
            }
            // Different token: revoke-before-grant.
            Some(false) => {
                if let Some(old) = self.sessions.remove(&identity_id) {
                    tracing::info!(
                        identity_id,
                        old_conn = %old.conn_id,
                        "Lease taken over, revoking previous session"
                    );
                    self.connections
                        .send(
                            &old.conn_id,
                            &ServerMessage::ForceLogout {
                                identity_id,
                                reason: "Signed in from another session".into(),
                            },
                        )
                        .await;
                    self.connections.close(&old.conn_id).await;
                    self.clear_presence(identity_id);
                }
                self.sessions
                    .insert(identity_id, new_lease(identity_id, token_hash, conn_id));
                AcquireOutcome::TookOver
            }
        }
    }

    fn release(&mut self, identity_id: DbId, conn_id: &str) {
        // Only the owning connection may release; a stale connection
        // must not tear down a session it lost.
        let owns = self
            .sessions
            .get(&identity_id)
            .is_some_and(|lease| lease.conn_id == conn_id);
        if owns {
            self.sessions.remove(&identity_id);
            self.clear_presence(identity_id);
            tracing::info!(identity_id, "Lease released");
        }
    }

    async fn revoke(&mut self, identity_id: DbId, reason: &str) -> bool {
        match self.sessions.remove(&identity_id) {
            Some(lease) => {
                tracing::info!(identity_id, reason, "Lease revoked administratively");
                self.connections
                    .send(
                        &lease.conn_id,
                        &ServerMessage::ForceLogout {
                            identity_id,
                            reason: reason.to_string(),
                        },
                    )
                    .await;
                self.connections.close(&lease.conn_id).await;
                self.clear_presence(identity_id);
                true
            }
            None => false,
        }
    }

    async fn set_status(
        &mut self,
        identity_id: DbId,
        status: StatusCategory,
        observed_at: Timestamp,
        conn_id: &str,
    ) -> Result<(), SessionError> {
        self.check_ownership(identity_id, conn_id)?;

        // Clamp against the current record without committing it; the
        // in-memory maps change only after the store accepts the write.
        let previous_changed_at = self
            .presence
            .get(&identity_id)
            .map(|r| r.status_changed_at);
        let mut record = self
            .presence
            .get(&identity_id)
            .cloned()
            .unwrap_or_else(|| PresenceRecord::new(identity_id, status, observed_at));
        let clamped = record.apply_status(status, observed_at);

        let event = StatusEvent {
            identity_id,
            status,
            occurred_at: clamped,
        };
        self.store
            .append_event(&event)
            .await
            .map_err(|e| SessionError::Persistence(e.to_string()))?;
        // If the summary upsert below fails, a retried append lands at
        // the same clamped instant and replays as a zero-length
        // interval, so it cannot double count.

        let events = self
            .store
            .read_events(Some(identity_id))
            .await
            .map_err(|e| SessionError::Persistence(e.to_string()))?;
        let days =
            accounting::summarize_identity(identity_id, &events, self.zone, clamped, Some(&record));

        let from = previous_changed_at
            .unwrap_or(clamped)
            .with_timezone(&self.zone)
            .date_naive();
        let to = clamped.with_timezone(&self.zone).date_naive();
        let mut upserted: Vec<DaySummary> = Vec::new();
        for (_, summary) in days.range(from..=to) {
            self.store
                .upsert_summary(summary)
                .await
                .map_err(|e| SessionError::Persistence(e.to_string()))?;
            upserted.push(summary.clone());
        }

        // Persistence complete: commit and broadcast full records.
        self.presence.insert(identity_id, record.clone());
        self.bus.publish(PresenceEvent::HistoryAppended(vec![event]));
        self.bus.publish(PresenceEvent::PresenceUpdated(record));
        for summary in upserted {
            self.bus.publish(PresenceEvent::SummaryUpdated(summary));
        }
        Ok(())
    }

    fn set_activity(
        &mut self,
        identity_id: DbId,
        level: ActivityLevel,
        observed_at: Timestamp,
        conn_id: &str,
    ) -> Result<(), SessionError> {
        self.check_ownership(identity_id, conn_id)?;

        let Some(record) = self.presence.get_mut(&identity_id) else {
            // Heartbeat before the first status change: nothing to
            // annotate yet.
            tracing::debug!(identity_id, "Heartbeat without presence record");
            return Ok(());
        };
        record.apply_activity(level, observed_at);
        let updated = record.clone();
        self.bus.publish(PresenceEvent::PresenceUpdated(updated));
        Ok(())
    }

    fn connection_closed(&mut self, conn_id: &str) {
        let owned: Vec<DbId> = self
            .sessions
            .values()
            .filter(|lease| lease.conn_id == conn_id)
            .map(|lease| lease.identity_id)
            .collect();
        for identity_id in owned {
            self.sessions.remove(&identity_id);
            self.clear_presence(identity_id);
            tracing::info!(identity_id, "Lease auto-released on disconnect");
        }
    }

    fn clear_presence(&mut self, identity_id: DbId) {
        if self.presence.remove(&identity_id).is_some() {
            self.bus.publish(PresenceEvent::Offline(identity_id));
        }
    }

    fn check_ownership(&self, identity_id: DbId, conn_id: &str) -> Result<(), SessionError> {
        match self.sessions.get(&identity_id) {
            Some(lease) if lease.conn_id == conn_id => Ok(()),
            _ => {
                tracing::warn!(
                    identity_id,
                    conn_id = %conn_id,
                    "Dropped mutation from connection that does not own the lease"
                );
                Err(SessionError::StaleOwnership(identity_id))
            }
        }
    }
}

fn new_lease(identity_id: DbId, token_hash: String, conn_id: String) -> SessionLease {
    SessionLease {
        identity_id,
        conn_id,
        token_hash,
        acquired_at: chrono::Utc::now(),
    }
}
