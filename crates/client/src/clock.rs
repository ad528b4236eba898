//! Offset-corrected client clock.
//!
//! The server's hello frame carries its current time. The client pins
//! `offset = server_time - local_time` once and corrects every local
//! reading through it, so client-side time math never trusts the raw
//! local clock after the first frame.

use chrono::Duration;
use workpulse_core::types::Timestamp;

/// Clock-skew correction derived from the server hello.
#[derive(Debug, Clone, Copy)]
pub struct ServerClock {
    offset: Duration,
}

impl ServerClock {
    /// A clock with no correction, used only before the first hello.
    pub fn unsynchronized() -> Self {
        Self {
            offset: Duration::zero(),
        }
    }

    /// Pin the offset from a hello frame observed at `local_now`.
    pub fn synchronized(server_time: Timestamp, local_now: Timestamp) -> Self {
        Self {
            offset: server_time - local_now,
        }
    }

    /// Re-pin the offset after a reconnect.
    pub fn resync(&mut self, server_time: Timestamp, local_now: Timestamp) {
        self.offset = server_time - local_now;
    }

    /// Correct a raw local reading into server time.
    pub fn correct(&self, local: Timestamp) -> Timestamp {
        local + self.offset
    }

    pub fn offset(&self) -> Duration {
        self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> Timestamp {
        s.parse().unwrap()
    }

    #[test]
    fn unsynchronized_clock_passes_local_time_through() {
        let clock = ServerClock::unsynchronized();
        let local = ts("2026-03-02T10:00:00Z");
        assert_eq!(clock.correct(local), local);
    }

    #[test]
    fn fast_local_clock_is_pulled_back() {
        // Local clock runs 90 seconds ahead of the server.
        let clock =
            ServerClock::synchronized(ts("2026-03-02T10:00:00Z"), ts("2026-03-02T10:01:30Z"));
        assert_eq!(
            clock.correct(ts("2026-03-02T10:02:00Z")),
            ts("2026-03-02T10:00:30Z")
        );
    }

    #[test]
    fn slow_local_clock_is_pushed_forward() {
        let clock =
            ServerClock::synchronized(ts("2026-03-02T10:00:00Z"), ts("2026-03-02T09:59:00Z"));
        assert_eq!(clock.offset(), Duration::seconds(60));
        assert_eq!(
            clock.correct(ts("2026-03-02T09:59:30Z")),
            ts("2026-03-02T10:00:30Z")
        );
    }

    #[test]
    fn resync_replaces_the_offset() {
        let mut clock =
            ServerClock::synchronized(ts("2026-03-02T10:00:00Z"), ts("2026-03-02T10:01:00Z"));
        clock.resync(ts("2026-03-02T11:00:00Z"), ts("2026-03-02T11:00:00Z"));
        assert_eq!(clock.offset(), Duration::zero());
    }
}
