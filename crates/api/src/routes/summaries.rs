//! Day-summary reporting endpoints.
//!
//! `/live` recomputes from the event log with the accounting engine;
//! the bare route serves the stored snapshot (what the client
//! reconciliation cache reads as its server baseline).

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use workpulse_core::accounting;
use workpulse_core::error::CoreError;
use workpulse_core::summary::DaySummary;
use workpulse_core::types::DbId;
use workpulse_db::repositories::DaySummaryRepo;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// GET /api/v1/summaries/{identity_id}/{date} -- stored snapshot.
async fn stored_summary(
    State(state): State<AppState>,
    Path((identity_id, date)): Path<(DbId, NaiveDate)>,
) -> AppResult<Json<DaySummary>> {
    let row = DaySummaryRepo::find(&state.pool, identity_id, date)
        .await?
        .ok_or_else(|| CoreError::not_found("day summary", format!("{identity_id}/{date}")))?;
    Ok(Json(row.to_summary()?))
}

/// GET /api/v1/summaries/{identity_id}/{date}/live -- recompute from
/// the event log, honoring the live presence record for the open tail.
async fn live_summary(
    State(state): State<AppState>,
    Path((identity_id, date)): Path<(DbId, NaiveDate)>,
) -> AppResult<Json<DaySummary>> {
    let events = state
        .store
        .read_events(Some(identity_id))
        .await
        .map_err(|e| AppError::Retryable(e.to_string()))?;

    let records = state
        .sessions
        .presence_snapshot()
        .await
        .map_err(|e| AppError::Retryable(e.to_string()))?;
    let record = records.iter().find(|r| r.identity_id == identity_id);

    let days = accounting::summarize_identity(
        identity_id,
        &events,
        state.config.canonical_zone(),
        chrono::Utc::now(),
        record,
    );
    let summary = days
        .get(&date)
        .cloned()
        .unwrap_or_else(|| DaySummary::empty(identity_id, date));
    Ok(Json(summary))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/summaries/{identity_id}/{date}", get(stored_summary))
        .route("/summaries/{identity_id}/{date}/live", get(live_summary))
}
