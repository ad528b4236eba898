//! Repository for the `status_events` table (the Event Log).

use sqlx::PgPool;
use workpulse_core::event::StatusEvent;
use workpulse_core::types::DbId;

use crate::models::StatusEventRow;

/// Column list for `status_events` queries.
const EVENT_COLUMNS: &str = "id, identity_id, status, occurred_at, created_at";

/// Append and read operations for the event log. There is no update or
/// delete: events are immutable once written.
pub struct StatusEventRepo;

impl StatusEventRepo {
    /// Append one event, returning the generated id.
    pub async fn append(pool: &PgPool, event: &StatusEvent) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO status_events (identity_id, status, occurred_at) \
             VALUES ($1, $2, $3) \
             RETURNING id",
        )
        .bind(event.identity_id)
        .bind(event.status.as_str())
        .bind(event.occurred_at)
        .fetch_one(pool)
        .await
    }

    /// Read the full log in replay order (occurred_at, then insertion
    /// order for equal instants).
    pub async fn list_all(pool: &PgPool) -> Result<Vec<StatusEventRow>, sqlx::Error> {
        let query = format!("SELECT {EVENT_COLUMNS} FROM status_events ORDER BY occurred_at, id");
        sqlx::query_as::<_, StatusEventRow>(&query)
            .fetch_all(pool)
            .await
    }

    /// Read one identity's log in replay order.
    pub async fn list_for_identity(
        pool: &PgPool,
        identity_id: DbId,
    ) -> Result<Vec<StatusEventRow>, sqlx::Error> {
        let query = format!(
            "SELECT {EVENT_COLUMNS} FROM status_events \
             WHERE identity_id = $1 ORDER BY occurred_at, id"
        );
        sqlx::query_as::<_, StatusEventRow>(&query)
            .bind(identity_id)
            .fetch_all(pool)
            .await
    }
}
