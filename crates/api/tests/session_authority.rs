//! Integration tests for the session service: single-lease arbitration,
//! ownership checks, and the persist-before-broadcast contract, all
//! against the in-memory store.

use std::sync::Arc;

use assert_matches::assert_matches;
use axum::extract::ws::Message;
use chrono::FixedOffset;
use tokio::sync::mpsc::UnboundedReceiver;
use workpulse_api::session::{AcquireOutcome, SessionError, SessionHandle, SessionService};
use workpulse_api::store::MemoryStatusStore;
use workpulse_api::ws::ConnectionManager;
use workpulse_core::presence::ActivityLevel;
use workpulse_core::protocol::{parse_server, ServerMessage};
use workpulse_core::status::StatusCategory;
use workpulse_core::types::Timestamp;
use workpulse_events::{PresenceBus, PresenceEvent};

struct Harness {
    sessions: SessionHandle,
    store: Arc<MemoryStatusStore>,
    connections: Arc<ConnectionManager>,
    bus: Arc<PresenceBus>,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStatusStore::new());
    let connections = Arc::new(ConnectionManager::new());
    let bus = Arc::new(PresenceBus::default());
    let sessions = SessionService::spawn(
        Arc::clone(&store) as Arc<dyn workpulse_api::store::StatusStore>,
        Arc::clone(&bus),
        Arc::clone(&connections),
        FixedOffset::east_opt(0).unwrap(),
    );
    Harness {
        sessions,
        store,
        connections,
        bus,
    }
}

fn ts(s: &str) -> Timestamp {
    s.parse().unwrap()
}

/// Drain every frame queued for a fake connection, decoded.
fn drain_frames(rx: &mut UnboundedReceiver<Message>) -> Vec<ServerMessage> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        if let Message::Text(text) = frame {
            frames.push(parse_server(text.as_str()).expect("server frame should parse"));
        }
    }
    frames
}

#[tokio::test]
async fn different_token_takes_over_with_exactly_one_force_logout() {
    let h = harness();
    let mut rx_a = h.connections.add("conn-a".into()).await;
    let _rx_b = h.connections.add("conn-b".into()).await;

    let first = h
        .sessions
        .acquire_lease(7, "hash-a".into(), "conn-a".into())
        .await
        .unwrap();
    assert_eq!(first, AcquireOutcome::Granted);

    let second = h
        .sessions
        .acquire_lease(7, "hash-b".into(), "conn-b".into())
        .await
        .unwrap();
    assert_eq!(second, AcquireOutcome::TookOver);

    let frames = drain_frames(&mut rx_a);
    let force_logouts = frames
        .iter()
        .filter(|f| matches!(f, ServerMessage::ForceLogout { identity_id: 7, .. }))
        .count();
    assert_eq!(force_logouts, 1, "exactly one force-logout to the loser");

    // No interval where both connections are granted: the old one is
    // already stale, the new one owns the lease.
    let stale = h
        .sessions
        .set_status(7, StatusCategory::Available, ts("2026-03-02T09:00:00Z"), "conn-a".into())
        .await;
    assert_matches!(stale, Err(SessionError::StaleOwnership(7)));

    h.sessions
        .set_status(7, StatusCategory::Available, ts("2026-03-02T09:00:00Z"), "conn-b".into())
        .await
        .unwrap();
}

#[tokio::test]
async fn same_token_resumes_without_revoke() {
    let h = harness();
    let mut rx_a = h.connections.add("conn-a".into()).await;
    let _rx_b = h.connections.add("conn-b".into()).await;

    h.sessions
        .acquire_lease(7, "hash-t".into(), "conn-a".into())
        .await
        .unwrap();
    let outcome = h
        .sessions
        .acquire_lease(7, "hash-t".into(), "conn-b".into())
        .await
        .unwrap();
    assert_eq!(outcome, AcquireOutcome::Resumed);

    let frames = drain_frames(&mut rx_a);
    assert!(
        !frames
            .iter()
            .any(|f| matches!(f, ServerMessage::ForceLogout { .. })),
        "a reload of the same logical session must not broadcast a revoke"
    );

    // Ownership moved to the new connection all the same.
    let stale = h
        .sessions
        .set_status(7, StatusCategory::Break, ts("2026-03-02T09:00:00Z"), "conn-a".into())
        .await;
    assert_matches!(stale, Err(SessionError::StaleOwnership(7)));
}

#[tokio::test]
async fn release_from_non_owner_is_a_no_op() {
    let h = harness();
    let _rx_a = h.connections.add("conn-a".into()).await;

    h.sessions
        .acquire_lease(7, "hash-a".into(), "conn-a".into())
        .await
        .unwrap();
    h.sessions
        .release_lease(7, "conn-zombie".into())
        .await
        .unwrap();

    // The lease survives: the owner can still mutate.
    h.sessions
        .set_status(7, StatusCategory::Available, ts("2026-03-02T09:00:00Z"), "conn-a".into())
        .await
        .unwrap();
}

#[tokio::test]
async fn disconnect_releases_lease_and_clears_presence() {
    let h = harness();
    let _rx_a = h.connections.add("conn-a".into()).await;
    let mut bus_rx = h.bus.subscribe();

    h.sessions
        .acquire_lease(7, "hash-a".into(), "conn-a".into())
        .await
        .unwrap();
    h.sessions
        .set_status(7, StatusCategory::Available, ts("2026-03-02T09:00:00Z"), "conn-a".into())
        .await
        .unwrap();

    h.sessions.disconnected("conn-a".into()).await.unwrap();
    // Synchronize on the offline broadcast before inspecting state.
    loop {
        match bus_rx.recv().await.unwrap() {
            PresenceEvent::Offline(id) => {
                assert_eq!(id, 7);
                break;
            }
            _ => continue,
        }
    }
    assert!(h.sessions.presence_snapshot().await.unwrap().is_empty());

    // A later resume with the same token is a fresh acquire, not a
    // conflict.
    let outcome = h
        .sessions
        .acquire_lease(7, "hash-a".into(), "conn-a2".into())
        .await
        .unwrap();
    assert_eq!(outcome, AcquireOutcome::Granted);
}

#[tokio::test]
async fn persistence_failure_means_no_state_change_and_no_broadcast() {
    let h = harness();
    let _rx_a = h.connections.add("conn-a".into()).await;

    h.sessions
        .acquire_lease(7, "hash-a".into(), "conn-a".into())
        .await
        .unwrap();

    let mut bus_rx = h.bus.subscribe();
    h.store.set_fail_writes(true);

    let result = h
        .sessions
        .set_status(7, StatusCategory::Available, ts("2026-03-02T09:00:00Z"), "conn-a".into())
        .await;
    assert_matches!(result, Err(SessionError::Persistence(_)));
    assert!(result.unwrap_err().retryable());

    assert!(h.store.events().is_empty(), "append must not have happened");
    assert!(
        h.sessions.presence_snapshot().await.unwrap().is_empty(),
        "presence must not change when the write fails"
    );
    assert_matches!(
        bus_rx.try_recv(),
        Err(tokio::sync::broadcast::error::TryRecvError::Empty)
    );

    // The same mutation succeeds once the store recovers.
    h.store.set_fail_writes(false);
    h.sessions
        .set_status(7, StatusCategory::Available, ts("2026-03-02T09:00:00Z"), "conn-a".into())
        .await
        .unwrap();
    assert_eq!(h.store.events().len(), 1);
}

#[tokio::test]
async fn status_change_persists_then_broadcasts_full_record() {
    let h = harness();
    let _rx_a = h.connections.add("conn-a".into()).await;

    h.sessions
        .acquire_lease(7, "hash-a".into(), "conn-a".into())
        .await
        .unwrap();

    let mut bus_rx = h.bus.subscribe();
    h.sessions
        .set_status(7, StatusCategory::Available, ts("2026-03-02T09:00:00Z"), "conn-a".into())
        .await
        .unwrap();
    h.sessions
        .set_status(7, StatusCategory::Lunch, ts("2026-03-02T09:30:00Z"), "conn-a".into())
        .await
        .unwrap();

    // The log was written before anything was published.
    assert_eq!(h.store.events().len(), 2);
    let stored = h
        .store
        .summary(7, "2026-03-02".parse().unwrap())
        .expect("snapshot upserted");
    assert_eq!(stored.minutes(StatusCategory::Available), 30);

    let mut saw_history = false;
    let mut saw_presence = false;
    let mut saw_summary = false;
    while let Ok(event) = bus_rx.try_recv() {
        match event {
            PresenceEvent::HistoryAppended(events) => {
                assert_eq!(events.len(), 1);
                saw_history = true;
            }
            PresenceEvent::PresenceUpdated(record) => {
                assert_eq!(record.identity_id, 7);
                saw_presence = true;
            }
            PresenceEvent::SummaryUpdated(summary) => {
                assert_eq!(summary.identity_id, 7);
                saw_summary = true;
            }
            PresenceEvent::Offline(_) => {}
        }
    }
    assert!(saw_history && saw_presence && saw_summary);
}

#[tokio::test]
async fn backdated_status_change_is_clamped_monotonic() {
    let h = harness();
    let _rx_a = h.connections.add("conn-a".into()).await;

    h.sessions
        .acquire_lease(7, "hash-a".into(), "conn-a".into())
        .await
        .unwrap();
    h.sessions
        .set_status(7, StatusCategory::Available, ts("2026-03-02T10:00:00Z"), "conn-a".into())
        .await
        .unwrap();
    // Observed earlier than the previous change: clamp forward.
    h.sessions
        .set_status(7, StatusCategory::Break, ts("2026-03-02T09:55:00Z"), "conn-a".into())
        .await
        .unwrap();

    let events = h.store.events();
    assert_eq!(events[1].occurred_at, ts("2026-03-02T10:00:00Z"));
    assert_eq!(events[1].status, StatusCategory::Break);
}

#[tokio::test]
async fn heartbeat_updates_activity_without_appending() {
    let h = harness();
    let _rx_a = h.connections.add("conn-a".into()).await;

    h.sessions
        .acquire_lease(7, "hash-a".into(), "conn-a".into())
        .await
        .unwrap();
    h.sessions
        .set_status(7, StatusCategory::Available, ts("2026-03-02T09:00:00Z"), "conn-a".into())
        .await
        .unwrap();

    h.sessions
        .set_activity(7, ActivityLevel::Idle, ts("2026-03-02T09:01:00Z"), "conn-a".into())
        .await
        .unwrap();

    assert_eq!(h.store.events().len(), 1, "heartbeats never hit the log");

    let records = h.sessions.presence_snapshot().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].activity, ActivityLevel::Idle);
    assert_eq!(
        records[0].status_changed_at,
        ts("2026-03-02T09:00:00Z"),
        "heartbeats must not move the status change instant"
    );
}

#[tokio::test]
async fn administrative_revoke_always_succeeds() {
    let h = harness();
    let mut rx_a = h.connections.add("conn-a".into()).await;

    h.sessions
        .acquire_lease(7, "hash-a".into(), "conn-a".into())
        .await
        .unwrap();
    h.sessions
        .set_status(7, StatusCategory::Available, ts("2026-03-02T09:00:00Z"), "conn-a".into())
        .await
        .unwrap();

    let revoked = h
        .sessions
        .revoke_lease(7, "shift ended".into())
        .await
        .unwrap();
    assert!(revoked);

    let frames = drain_frames(&mut rx_a);
    assert!(frames.iter().any(|f| matches!(
        f,
        ServerMessage::ForceLogout { identity_id: 7, .. }
    )));
    assert!(h.sessions.presence_snapshot().await.unwrap().is_empty());

    // Nothing left to revoke.
    assert!(!h.sessions.revoke_lease(7, "again".into()).await.unwrap());
}

#[tokio::test]
async fn concurrent_acquires_resolve_to_a_single_owner() {
    let h = harness();
    let _rx_a = h.connections.add("conn-a".into()).await;
    let _rx_b = h.connections.add("conn-b".into()).await;

    // Submit both acquires without awaiting in between; the command
    // queue serializes them and picks a deterministic winner.
    let sessions_a = h.sessions.clone();
    let sessions_b = h.sessions.clone();
    let (ra, rb) = tokio::join!(
        sessions_a.acquire_lease(7, "hash-a".into(), "conn-a".into()),
        sessions_b.acquire_lease(7, "hash-b".into(), "conn-b".into()),
    );
    let outcomes = [ra.unwrap(), rb.unwrap()];

    // One Granted, one TookOver, in either order.
    assert!(outcomes.contains(&AcquireOutcome::Granted));
    assert!(outcomes.contains(&AcquireOutcome::TookOver));

    // Exactly one connection can mutate afterwards.
    let a = h
        .sessions
        .set_status(7, StatusCategory::Available, ts("2026-03-02T09:00:00Z"), "conn-a".into())
        .await;
    let b = h
        .sessions
        .set_status(7, StatusCategory::Available, ts("2026-03-02T09:00:00Z"), "conn-b".into())
        .await;
    assert_eq!(
        [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(),
        1,
        "exactly one connection may own the lease"
    );
}
