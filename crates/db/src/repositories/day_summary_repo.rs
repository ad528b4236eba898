//! Repository for the `day_summaries` snapshot table.

use chrono::NaiveDate;
use sqlx::PgPool;
use workpulse_core::summary::DaySummary;
use workpulse_core::types::DbId;

use crate::models::day_summary::buckets_to_json;
use crate::models::DaySummaryRow;

/// Column list for `day_summaries` queries.
const SUMMARY_COLUMNS: &str = "id, identity_id, summary_date, buckets, total_minutes, \
     login_time, logout_time, is_leave_day, updated_at";

/// Upsert and read operations for the snapshot cache. Last write wins;
/// the event log stays authoritative.
pub struct DaySummaryRepo;

impl DaySummaryRepo {
    /// Upsert a snapshot keyed `(identity_id, summary_date)`.
    pub async fn upsert(pool: &PgPool, summary: &DaySummary) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO day_summaries \
                (identity_id, summary_date, buckets, total_minutes, \
                 login_time, logout_time, is_leave_day) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT ON CONSTRAINT uq_day_summaries_identity_date DO UPDATE SET \
                buckets = EXCLUDED.buckets, \
                total_minutes = EXCLUDED.total_minutes, \
                login_time = EXCLUDED.login_time, \
                logout_time = EXCLUDED.logout_time, \
                is_leave_day = EXCLUDED.is_leave_day, \
                updated_at = now()",
        )
        .bind(summary.identity_id)
        .bind(summary.date)
        .bind(buckets_to_json(summary))
        .bind(summary.total_minutes)
        .bind(summary.login_time.as_deref())
        .bind(summary.logout_time.as_deref())
        .bind(summary.is_leave_day)
        .execute(pool)
        .await
        .map(|_| ())
    }

    /// Fetch the stored snapshot for one identity and date.
    pub async fn find(
        pool: &PgPool,
        identity_id: DbId,
        date: NaiveDate,
    ) -> Result<Option<DaySummaryRow>, sqlx::Error> {
        let query = format!(
            "SELECT {SUMMARY_COLUMNS} FROM day_summaries \
             WHERE identity_id = $1 AND summary_date = $2"
        );
        sqlx::query_as::<_, DaySummaryRow>(&query)
            .bind(identity_id)
            .bind(date)
            .fetch_optional(pool)
            .await
    }
}
