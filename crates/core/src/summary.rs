//! Per-identity, per-day aggregation of category minutes.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::status::StatusCategory;
use crate::types::DbId;

/// Derived day totals for one identity and one calendar date in the
/// canonical timezone.
///
/// Always recomputed from the event log (or accumulated client-side);
/// the snapshot table is a cache keyed `(identity_id, date)`, never the
/// source of truth. `total_minutes` is kept equal to the bucket sum by
/// construction: all writes go through [`DaySummary::add_minutes`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySummary {
    pub identity_id: DbId,
    pub date: NaiveDate,
    /// Minutes per accruing category. Leave never appears here.
    pub buckets: BTreeMap<StatusCategory, i64>,
    pub total_minutes: i64,
    /// Earliest instant touching the date, formatted `HH:MM` in the
    /// canonical timezone.
    pub login_time: Option<String>,
    /// Latest instant touching the date, formatted `HH:MM`.
    pub logout_time: Option<String>,
    pub is_leave_day: bool,
}

impl DaySummary {
    pub fn empty(identity_id: DbId, date: NaiveDate) -> Self {
        Self {
            identity_id,
            date,
            buckets: BTreeMap::new(),
            total_minutes: 0,
            login_time: None,
            logout_time: None,
            is_leave_day: false,
        }
    }

    /// Minutes recorded for one category (zero if absent).
    pub fn minutes(&self, category: StatusCategory) -> i64 {
        self.buckets.get(&category).copied().unwrap_or(0)
    }

    /// Credit minutes to a category, keeping `total_minutes` in sync.
    /// Leave is rejected here; callers set [`DaySummary::is_leave_day`]
    /// instead.
    pub fn add_minutes(&mut self, category: StatusCategory, minutes: i64) {
        debug_assert!(category.accrues_minutes());
        if minutes <= 0 || !category.accrues_minutes() {
            return;
        }
        *self.buckets.entry(category).or_insert(0) += minutes;
        self.total_minutes += minutes;
    }
}
