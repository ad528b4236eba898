//! Live presence state per identity.

use serde::{Deserialize, Serialize};

use crate::status::StatusCategory;
use crate::types::{DbId, Timestamp};

/// Input-activity level reported by the client heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Idle,
    Active,
    Unknown,
}

/// The authoritative live record for one identity.
///
/// Mutated only by the session service; broadcast in full (never as a
/// diff) so subscribers stay stateless with respect to merge logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub identity_id: DbId,
    pub status: StatusCategory,
    /// Monotonic non-decreasing per identity; writes are clamped.
    pub status_changed_at: Timestamp,
    pub activity: ActivityLevel,
    pub activity_observed_at: Timestamp,
}

impl PresenceRecord {
    /// A fresh record for an identity's first status change.
    pub fn new(identity_id: DbId, status: StatusCategory, at: Timestamp) -> Self {
        Self {
            identity_id,
            status,
            status_changed_at: at,
            activity: ActivityLevel::Unknown,
            activity_observed_at: at,
        }
    }

    /// Apply a status change, clamping the change instant so
    /// `status_changed_at` never moves backwards. Returns the clamped
    /// instant actually recorded.
    pub fn apply_status(&mut self, status: StatusCategory, observed_at: Timestamp) -> Timestamp {
        let clamped = observed_at.max(self.status_changed_at);
        self.status = status;
        self.status_changed_at = clamped;
        clamped
    }

    /// Apply an activity heartbeat. Touches only the activity fields;
    /// the status half of the record is unaffected.
    pub fn apply_activity(&mut self, level: ActivityLevel, observed_at: Timestamp) {
        self.activity = level;
        self.activity_observed_at = observed_at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn ts(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn status_change_records_observed_instant() {
        let mut rec = PresenceRecord::new(1, StatusCategory::Available, ts(0));
        let clamped = rec.apply_status(StatusCategory::Break, ts(60));
        assert_eq!(clamped, ts(60));
        assert_eq!(rec.status, StatusCategory::Break);
        assert_eq!(rec.status_changed_at, ts(60));
    }

    #[test]
    fn backdated_status_change_is_clamped() {
        let mut rec = PresenceRecord::new(1, StatusCategory::Available, ts(100));
        let clamped = rec.apply_status(StatusCategory::Lunch, ts(40));
        assert_eq!(clamped, ts(100), "change instant must not move backwards");
        assert_eq!(rec.status, StatusCategory::Lunch);
    }

    #[test]
    fn activity_does_not_touch_status_fields() {
        let mut rec = PresenceRecord::new(1, StatusCategory::Available, ts(0));
        rec.apply_activity(ActivityLevel::Idle, ts(30));
        assert_eq!(rec.activity, ActivityLevel::Idle);
        assert_eq!(rec.activity_observed_at, ts(30));
        assert_eq!(rec.status, StatusCategory::Available);
        assert_eq!(rec.status_changed_at, ts(0));
    }
}
