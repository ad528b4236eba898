//! Work-status categories.
//!
//! The categories are mutually exclusive: an identity is in exactly one
//! at any time. `Available` is the single productive category. `Leave`
//! accrues no minutes but marks the whole calendar day as leave.

use serde::{Deserialize, Serialize};

/// A work-state label.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    Available,
    Break,
    Lunch,
    Meeting,
    Leave,
}

impl StatusCategory {
    /// Every category, in bucket-display order.
    pub const ALL: [StatusCategory; 5] = [
        StatusCategory::Available,
        StatusCategory::Break,
        StatusCategory::Lunch,
        StatusCategory::Meeting,
        StatusCategory::Leave,
    ];

    /// Lowercase string form used for storage and wire payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCategory::Available => "available",
            StatusCategory::Break => "break",
            StatusCategory::Lunch => "lunch",
            StatusCategory::Meeting => "meeting",
            StatusCategory::Leave => "leave",
        }
    }

    /// Parse the storage form. Returns `None` for unknown names.
    pub fn parse(name: &str) -> Option<StatusCategory> {
        match name {
            "available" => Some(StatusCategory::Available),
            "break" => Some(StatusCategory::Break),
            "lunch" => Some(StatusCategory::Lunch),
            "meeting" => Some(StatusCategory::Meeting),
            "leave" => Some(StatusCategory::Leave),
            _ => None,
        }
    }

    /// The single productive category. Idle tracking on the client is
    /// live only while the current status is productive.
    pub fn is_productive(&self) -> bool {
        matches!(self, StatusCategory::Available)
    }

    pub fn is_leave(&self) -> bool {
        matches!(self, StatusCategory::Leave)
    }

    /// Whether intervals in this category accrue bucket minutes.
    /// Leave sets the day flag instead of accruing.
    pub fn accrues_minutes(&self) -> bool {
        !self.is_leave()
    }
}

impl std::fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
