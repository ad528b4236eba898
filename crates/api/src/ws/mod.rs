//! WebSocket surface: connection registry, upgrade handler, presence
//! fan-out, and keepalive.

pub mod handler;
pub mod heartbeat;
pub mod manager;
pub mod router;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::ConnectionManager;
pub use router::PresenceRouter;
