//! WebSocket upgrade and per-connection message loop.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use workpulse_core::identity::Identity;
use workpulse_core::protocol::{self, ClientMessage, ServerMessage};
use workpulse_core::types::DbId;
use workpulse_db::repositories::IdentityRepo;

use crate::auth;
use crate::session::SessionError;
use crate::state::AppState;

/// HTTP handler that upgrades the connection to WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Registers the connection, sends the clock-sync hello, then splits
/// the socket: a spawned task drains the outbound frame channel while
/// the current task processes inbound messages. The connection's close
/// (clean or not) releases any lease it owns immediately.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "WebSocket connected");

    let mut rx = state.connections.add(conn_id.clone()).await;

    // First frame on every connection: the server's clock, so the
    // client can stop trusting its raw local time.
    state
        .connections
        .send(
            &conn_id,
            &ServerMessage::Hello {
                server_time: chrono::Utc::now(),
            },
        )
        .await;

    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(frame).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Text(text)) => match protocol::parse_client(text.as_str()) {
                Ok(message) => dispatch(message, &conn_id, &state).await,
                Err(e) => {
                    tracing::debug!(conn_id = %conn_id, error = %e, "Unparseable client frame");
                    send_error(&state, &conn_id, "bad_message", "Unrecognized message", false)
                        .await;
                }
            },
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    // Hard-cut: no reconnection grace window. A later resume with the
    // same session token is a fresh acquire.
    if let Err(e) = state.sessions.disconnected(conn_id.clone()).await {
        tracing::warn!(conn_id = %conn_id, error = %e, "Disconnect notification failed");
    }
    state.connections.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}

async fn dispatch(message: ClientMessage, conn_id: &str, state: &AppState) {
    match message {
        ClientMessage::Login {
            email,
            password,
            session_token,
        } => login(state, conn_id, &email, &password, &session_token).await,

        ClientMessage::Resume {
            identity_id,
            session_token,
        } => resume(state, conn_id, identity_id, &session_token).await,

        ClientMessage::StatusChange {
            identity_id,
            status,
        } => {
            // The server's arrival clock is authoritative for status
            // changes; client clocks only matter for heartbeats.
            let result = state
                .sessions
                .set_status(identity_id, status, chrono::Utc::now(), conn_id.to_string())
                .await;
            report(state, conn_id, result).await;
        }

        ClientMessage::ActivityHeartbeat {
            identity_id,
            level,
            timestamp,
        } => {
            let result = state
                .sessions
                .set_activity(identity_id, level, timestamp, conn_id.to_string())
                .await;
            report(state, conn_id, result).await;
        }

        ClientMessage::Logout { identity_id } => {
            if let Err(e) = state
                .sessions
                .release_lease(identity_id, conn_id.to_string())
                .await
            {
                tracing::warn!(identity_id, error = %e, "Logout release failed");
            }
        }
    }
}

async fn login(state: &AppState, conn_id: &str, email: &str, password: &str, session_token: &str) {
    match auth::verify_credentials(&state.pool, email, password).await {
        Ok(Some(identity)) => attach(state, conn_id, identity, session_token).await,
        // Inline and non-fatal: the connection stays up for a retry.
        Ok(None) => {
            state
                .connections
                .send(
                    conn_id,
                    &ServerMessage::LoginFailed {
                        reason: "Invalid email or password".into(),
                    },
                )
                .await;
        }
        Err(e) => {
            tracing::error!(conn_id = %conn_id, error = %e, "Credential verification failed");
            send_error(state, conn_id, "auth", "Authentication unavailable", true).await;
        }
    }
}

async fn resume(state: &AppState, conn_id: &str, identity_id: DbId, session_token: &str) {
    match IdentityRepo::find_by_id(&state.pool, identity_id).await {
        Ok(Some(row)) if row.is_active => match row.into_identity() {
            Ok(identity) => attach(state, conn_id, identity, session_token).await,
            Err(e) => {
                tracing::error!(identity_id, error = %e, "Malformed identity row");
                send_error(state, conn_id, "internal", "Internal error", false).await;
            }
        },
        Ok(_) => {
            state
                .connections
                .send(
                    conn_id,
                    &ServerMessage::LoginFailed {
                        reason: "Unknown or inactive identity".into(),
                    },
                )
                .await;
        }
        Err(e) => {
            tracing::error!(identity_id, error = %e, "Identity lookup failed");
            send_error(state, conn_id, "auth", "Authentication unavailable", true).await;
        }
    }
}

/// Shared tail of login and resume: acquire the lease, bind the
/// connection, and seed the new viewer with history plus live
/// presence.
async fn attach(state: &AppState, conn_id: &str, identity: Identity, session_token: &str) {
    let token_hash = auth::hash_session_token(session_token);
    match state
        .sessions
        .acquire_lease(identity.id, token_hash, conn_id.to_string())
        .await
    {
        Ok(outcome) => {
            tracing::debug!(identity_id = identity.id, ?outcome, "Session attached");
            state.connections.bind_identity(conn_id, identity.id).await;
            state
                .connections
                .send(conn_id, &ServerMessage::LoginOk { identity })
                .await;
            send_initial_state(state, conn_id).await;
        }
        Err(e) => {
            send_error(state, conn_id, "session", &e.to_string(), e.retryable()).await;
        }
    }
}

async fn send_initial_state(state: &AppState, conn_id: &str) {
    match state.store.read_events(None).await {
        Ok(events) => {
            state
                .connections
                .send(conn_id, &ServerMessage::HistoryUpdate { events })
                .await;
        }
        Err(e) => {
            tracing::warn!(conn_id = %conn_id, error = %e, "History snapshot read failed");
            send_error(state, conn_id, "history", "History unavailable", true).await;
        }
    }

    if let Ok(records) = state.sessions.presence_snapshot().await {
        for record in records {
            state
                .connections
                .send(conn_id, &ServerMessage::PresenceUpdate { record })
                .await;
        }
    }
}

async fn report(state: &AppState, conn_id: &str, result: Result<(), SessionError>) {
    if let Err(e) = result {
        let code = match &e {
            SessionError::StaleOwnership(_) => "stale_ownership",
            SessionError::Persistence(_) => "persistence",
            SessionError::ServiceClosed => "unavailable",
        };
        send_error(state, conn_id, code, &e.to_string(), e.retryable()).await;
    }
}

async fn send_error(state: &AppState, conn_id: &str, code: &str, message: &str, retryable: bool) {
    state
        .connections
        .send(
            conn_id,
            &ServerMessage::Error {
                code: code.into(),
                message: message.into(),
                retryable,
            },
        )
        .await;
}
