use std::sync::Arc;

use crate::config::ServerConfig;
use crate::session::SessionHandle;
use crate::store::StatusStore;
use crate::ws::ConnectionManager;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`.
///
/// Cheaply cloneable (inner data is behind `Arc` or is already
/// `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: workpulse_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// WebSocket connection registry.
    pub connections: Arc<ConnectionManager>,
    /// Handle to the session service actor.
    pub sessions: SessionHandle,
    /// Event Log / Snapshot Store collaborator.
    pub store: Arc<dyn StatusStore>,
}
