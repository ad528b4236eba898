//! Client-local idle accumulation for the authenticated identity.
//!
//! Consumes the same activity heartbeats the server receives and keeps
//! a per-date total of idle milliseconds. Tracking is live only while
//! the current status is the productive category; any other category
//! force-closes an open window without opening a new one. The result
//! is informational for reporting and never feeds the accounting
//! engine's buckets.

use std::collections::HashMap;

use chrono::{FixedOffset, NaiveDate};
use workpulse_core::presence::ActivityLevel;
use workpulse_core::status::StatusCategory;
use workpulse_core::types::Timestamp;

/// Pure idle-window state machine. All methods take explicit
/// timestamps; nothing here reads the clock.
#[derive(Debug)]
pub struct IdleAccumulator {
    zone: FixedOffset,
    /// True while the current status is productive.
    tracking: bool,
    last_level: ActivityLevel,
    open_started_at: Option<Timestamp>,
    /// Closed-window totals per canonical-zone date, in milliseconds.
    /// A window accrues to the date it opened on.
    accumulated_ms: HashMap<NaiveDate, i64>,
}

impl IdleAccumulator {
    /// Start with tracking disabled; the first status change decides.
    pub fn new(zone: FixedOffset) -> Self {
        Self {
            zone,
            tracking: false,
            last_level: ActivityLevel::Unknown,
            open_started_at: None,
            accumulated_ms: HashMap::new(),
        }
    }

    /// React to a local status change at `at`.
    pub fn status_changed(&mut self, status: StatusCategory, at: Timestamp) {
        let enabled = status.is_productive();
        if !enabled {
            self.close_window(at);
        }
        self.tracking = enabled;
    }

    /// Consume one activity heartbeat at `at`.
    pub fn heartbeat(&mut self, level: ActivityLevel, at: Timestamp) {
        if !self.tracking {
            self.close_window(at);
            self.last_level = level;
            return;
        }

        match level {
            ActivityLevel::Idle => {
                // Entering Idle (or no window yet): (re)open at this
                // instant, last writer wins on the start boundary. A
                // repeated Idle heartbeat leaves the window alone.
                if self.open_started_at.is_none() || self.last_level != ActivityLevel::Idle {
                    self.open_started_at = Some(at);
                }
            }
            ActivityLevel::Active | ActivityLevel::Unknown => self.close_window(at),
        }
        self.last_level = level;
    }

    /// Whole idle minutes for one date, extending an open window to
    /// `now` only when the open window belongs to that date.
    pub fn idle_minutes(&self, date: NaiveDate, now: Timestamp) -> i64 {
        let mut ms = self.accumulated_ms.get(&date).copied().unwrap_or(0);
        if let Some(start) = self.open_started_at {
            if start.with_timezone(&self.zone).date_naive() == date && now > start {
                ms += (now - start).num_milliseconds();
            }
        }
        ms / 60_000
    }

    fn close_window(&mut self, at: Timestamp) {
        if let Some(start) = self.open_started_at.take() {
            let elapsed = (at - start).num_milliseconds().max(0);
            let date = start.with_timezone(&self.zone).date_naive();
            *self.accumulated_ms.entry(date).or_insert(0) += elapsed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn ts(s: &str) -> Timestamp {
        s.parse().unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn productive_accumulator() -> IdleAccumulator {
        let mut acc = IdleAccumulator::new(zone());
        acc.status_changed(StatusCategory::Available, ts("2026-03-02T09:00:00Z"));
        acc
    }

    #[test]
    fn active_idle_active_yields_floored_window_minutes() {
        // Active at t0, Idle at t0+60s, Active at t0+300s while the
        // status stays productive: 240 idle seconds, four whole minutes.
        let mut acc = productive_accumulator();
        acc.heartbeat(ActivityLevel::Active, ts("2026-03-02T10:00:00Z"));
        acc.heartbeat(ActivityLevel::Idle, ts("2026-03-02T10:01:00Z"));
        acc.heartbeat(ActivityLevel::Active, ts("2026-03-02T10:05:00Z"));

        assert_eq!(
            acc.idle_minutes(date("2026-03-02"), ts("2026-03-02T10:06:00Z")),
            4
        );
    }

    #[test]
    fn repeated_idle_heartbeats_do_not_restart_the_window() {
        let mut acc = productive_accumulator();
        acc.heartbeat(ActivityLevel::Idle, ts("2026-03-02T10:00:00Z"));
        acc.heartbeat(ActivityLevel::Idle, ts("2026-03-02T10:02:00Z"));
        acc.heartbeat(ActivityLevel::Active, ts("2026-03-02T10:03:00Z"));

        assert_eq!(
            acc.idle_minutes(date("2026-03-02"), ts("2026-03-02T10:03:00Z")),
            3
        );
    }

    #[test]
    fn reentering_idle_restarts_at_the_new_instant() {
        let mut acc = productive_accumulator();
        acc.heartbeat(ActivityLevel::Idle, ts("2026-03-02T10:00:00Z"));
        acc.heartbeat(ActivityLevel::Active, ts("2026-03-02T10:01:00Z"));
        acc.heartbeat(ActivityLevel::Idle, ts("2026-03-02T10:10:00Z"));
        acc.heartbeat(ActivityLevel::Active, ts("2026-03-02T10:12:00Z"));

        // 60s from the first window, 120s from the second.
        assert_eq!(
            acc.idle_minutes(date("2026-03-02"), ts("2026-03-02T10:12:00Z")),
            3
        );
    }

    #[test]
    fn non_productive_status_closes_the_open_window() {
        let mut acc = productive_accumulator();
        acc.heartbeat(ActivityLevel::Idle, ts("2026-03-02T10:00:00Z"));
        acc.status_changed(StatusCategory::Lunch, ts("2026-03-02T10:02:00Z"));

        // The window closed at the status change; heartbeats during
        // lunch must not reopen it.
        acc.heartbeat(ActivityLevel::Idle, ts("2026-03-02T10:10:00Z"));

        assert_eq!(
            acc.idle_minutes(date("2026-03-02"), ts("2026-03-02T10:30:00Z")),
            2
        );
    }

    #[test]
    fn tracking_resumes_after_returning_to_productive() {
        let mut acc = productive_accumulator();
        acc.status_changed(StatusCategory::Break, ts("2026-03-02T10:00:00Z"));
        acc.status_changed(StatusCategory::Available, ts("2026-03-02T10:15:00Z"));
        acc.heartbeat(ActivityLevel::Idle, ts("2026-03-02T10:20:00Z"));
        acc.heartbeat(ActivityLevel::Active, ts("2026-03-02T10:21:00Z"));

        assert_eq!(
            acc.idle_minutes(date("2026-03-02"), ts("2026-03-02T10:21:00Z")),
            1
        );
    }

    #[test]
    fn open_window_extends_only_the_current_date() {
        let mut acc = productive_accumulator();
        // A closed window on day one.
        acc.heartbeat(ActivityLevel::Idle, ts("2026-03-02T10:00:00Z"));
        acc.heartbeat(ActivityLevel::Active, ts("2026-03-02T10:05:00Z"));
        // An open window on day two.
        acc.heartbeat(ActivityLevel::Idle, ts("2026-03-03T09:00:00Z"));

        let now = ts("2026-03-03T09:10:00Z");
        assert_eq!(acc.idle_minutes(date("2026-03-02"), now), 5);
        assert_eq!(acc.idle_minutes(date("2026-03-03"), now), 10);
    }
}
