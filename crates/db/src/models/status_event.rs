//! Status-event row model.

use serde::Serialize;
use sqlx::FromRow;
use workpulse_core::error::CoreError;
use workpulse_core::event::StatusEvent;
use workpulse_core::status::StatusCategory;
use workpulse_core::types::{DbId, Timestamp};

/// A row from the `status_events` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StatusEventRow {
    pub id: DbId,
    pub identity_id: DbId,
    pub status: String,
    pub occurred_at: Timestamp,
    pub created_at: Timestamp,
}

impl StatusEventRow {
    /// Convert to the domain event used by the accounting engine.
    pub fn to_event(&self) -> Result<StatusEvent, CoreError> {
        let status = StatusCategory::parse(&self.status).ok_or_else(|| {
            CoreError::Internal(format!(
                "status event {} has unknown category '{}'",
                self.id, self.status
            ))
        })?;
        Ok(StatusEvent {
            identity_id: self.identity_id,
            status,
            occurred_at: self.occurred_at,
        })
    }
}
