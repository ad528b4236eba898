//! Day-summary row model.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::FromRow;
use workpulse_core::error::CoreError;
use workpulse_core::status::StatusCategory;
use workpulse_core::summary::DaySummary;
use workpulse_core::types::{DbId, Timestamp};

/// A row from the `day_summaries` table. Buckets are stored as a JSONB
/// object of `{"category": minutes}`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DaySummaryRow {
    pub id: DbId,
    pub identity_id: DbId,
    pub summary_date: NaiveDate,
    pub buckets: serde_json::Value,
    pub total_minutes: i64,
    pub login_time: Option<String>,
    pub logout_time: Option<String>,
    pub is_leave_day: bool,
    pub updated_at: Timestamp,
}

impl DaySummaryRow {
    /// Convert to the domain summary.
    pub fn to_summary(&self) -> Result<DaySummary, CoreError> {
        let buckets: BTreeMap<StatusCategory, i64> = serde_json::from_value(self.buckets.clone())
            .map_err(|e| {
                CoreError::Internal(format!(
                    "day summary {} has malformed buckets: {e}",
                    self.id
                ))
            })?;
        Ok(DaySummary {
            identity_id: self.identity_id,
            date: self.summary_date,
            total_minutes: buckets.values().sum(),
            buckets,
            login_time: self.login_time.clone(),
            logout_time: self.logout_time.clone(),
            is_leave_day: self.is_leave_day,
        })
    }
}

/// Serialize a domain summary's buckets for the JSONB column.
pub fn buckets_to_json(summary: &DaySummary) -> serde_json::Value {
    serde_json::to_value(&summary.buckets).unwrap_or_else(|_| serde_json::json!({}))
}
