//! Administrative session controls.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use workpulse_core::error::CoreError;
use workpulse_core::types::DbId;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Request body for a lease revocation.
#[derive(Debug, Deserialize, Default)]
pub struct RevokeRequest {
    pub reason: Option<String>,
}

/// POST /api/v1/admin/sessions/{identity_id}/revoke
///
/// Force-release an identity's lease regardless of owner. The owning
/// connection receives a force-logout and is disconnected.
async fn revoke_session(
    State(state): State<AppState>,
    Path(identity_id): Path<DbId>,
    Json(input): Json<RevokeRequest>,
) -> AppResult<StatusCode> {
    let reason = input
        .reason
        .unwrap_or_else(|| "Revoked by administrator".to_string());
    let revoked = state
        .sessions
        .revoke_lease(identity_id, reason)
        .await
        .map_err(|e| AppError::Retryable(e.to_string()))?;

    if revoked {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(CoreError::not_found("session lease", identity_id).into())
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/admin/sessions/{identity_id}/revoke", post(revoke_session))
}
