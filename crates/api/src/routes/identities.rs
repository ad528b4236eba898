//! Read-only directory listing.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use workpulse_core::identity::Identity;
use workpulse_db::repositories::IdentityRepo;

use crate::error::AppResult;
use crate::state::AppState;

/// GET /api/v1/identities -- list active identities.
async fn list_identities(State(state): State<AppState>) -> AppResult<Json<Vec<Identity>>> {
    let rows = IdentityRepo::list(&state.pool).await?;
    let identities = rows
        .into_iter()
        .map(|row| row.into_identity())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(identities))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/identities", get(list_identities))
}
