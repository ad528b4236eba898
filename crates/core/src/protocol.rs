//! Transport-agnostic wire protocol.
//!
//! Both directions use JSON messages with the shape
//! `{"type": "<kind>", "data": {...}}`, deserialized via internally
//! tagged serde enums. The server and client crates share these types,
//! so a protocol change is a single edit.

use serde::{Deserialize, Serialize};

use crate::event::StatusEvent;
use crate::identity::Identity;
use crate::presence::{ActivityLevel, PresenceRecord};
use crate::status::StatusCategory;
use crate::summary::DaySummary;
use crate::types::{DbId, Timestamp};

/// Messages a client may send to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Authenticate with credentials. `session_token` is an opaque
    /// client-generated value persisted locally; presenting the same
    /// token later resumes the same logical session.
    Login {
        email: String,
        password: String,
        session_token: String,
    },

    /// Re-attach a previously authenticated session after a reload or
    /// reconnect.
    Resume {
        identity_id: DbId,
        session_token: String,
    },

    /// Change the identity's work status.
    StatusChange {
        identity_id: DbId,
        status: StatusCategory,
    },

    /// Periodic input-activity heartbeat. `timestamp` is the client's
    /// offset-corrected clock reading.
    ActivityHeartbeat {
        identity_id: DbId,
        level: ActivityLevel,
        timestamp: Timestamp,
    },

    /// Voluntarily end the session.
    Logout { identity_id: DbId },
}

/// Messages the server may send to one client or broadcast to all.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First frame on every connection. Clients derive their clock
    /// offset from `server_time` and never trust the raw local clock
    /// afterwards.
    Hello { server_time: Timestamp },

    LoginOk { identity: Identity },

    LoginFailed { reason: String },

    /// This connection's session was superseded or administratively
    /// revoked; the client must return to the unauthenticated state.
    ForceLogout { identity_id: DbId, reason: String },

    /// Full updated presence record, never a diff.
    PresenceUpdate { record: PresenceRecord },

    /// Newly appended status events for viewers to replay.
    HistoryUpdate { events: Vec<StatusEvent> },

    Offline { identity_id: DbId },

    /// A freshly upserted day-summary snapshot.
    SummaryUpdate { summary: DaySummary },

    Error {
        code: String,
        message: String,
        retryable: bool,
    },
}

/// Parse an inbound client frame.
///
/// Returns `Err` for malformed JSON or unknown `type` values; callers
/// log and answer with an error frame rather than dropping the socket.
pub fn parse_client(text: &str) -> Result<ClientMessage, serde_json::Error> {
    serde_json::from_str(text)
}

/// Parse an inbound server frame (client side).
pub fn parse_server(text: &str) -> Result<ServerMessage, serde_json::Error> {
    serde_json::from_str(text)
}
