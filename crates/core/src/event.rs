//! The append-only status-change event.

use serde::{Deserialize, Serialize};

use crate::status::StatusCategory;
use crate::types::{DbId, Timestamp};

/// One status change for one identity.
///
/// Events are immutable once appended: the event log is never edited or
/// reordered, and all reporting is derived by replaying it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub identity_id: DbId,
    pub status: StatusCategory,
    /// Server-clamped instant the change took effect (UTC).
    pub occurred_at: Timestamp,
}
