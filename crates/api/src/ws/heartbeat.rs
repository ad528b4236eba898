use std::sync::Arc;
use std::time::Duration;

use crate::ws::ConnectionManager;

/// Interval between keepalive pings (in seconds).
const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Spawn a background task that pings every connected client
/// periodically so dead sockets surface as receive errors instead of
/// lingering.
pub fn start_heartbeat(connections: Arc<ConnectionManager>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));

        loop {
            interval.tick().await;
            let count = connections.connection_count().await;
            tracing::debug!(count, "WebSocket keepalive ping");
            connections.ping_all().await;
        }
    })
}
