pub mod admin;
pub mod health;
pub mod identities;
pub mod summaries;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                                      WebSocket (all wire messages)
///
/// /identities                              directory list
///
/// /summaries/{identity_id}/{date}          stored snapshot
/// /summaries/{identity_id}/{date}/live     recomputed from the event log
///
/// /admin/sessions/{identity_id}/revoke     force-release a lease (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .merge(identities::router())
        .merge(summaries::router())
        .merge(admin::router())
}
