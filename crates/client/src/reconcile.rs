//! Client reconciliation cache: the locally persisted running total
//! for one identity and one date, reconciled against server snapshots.
//!
//! The cache advances in whole minutes. On each tick it credits
//! `floor(elapsed / 60s)` minutes to the current category and moves
//! `last_reconciled_at` forward by exactly that many minutes, so the
//! sub-minute remainder stays pending for the next tick and no time is
//! lost or double counted. Buckets only ever grow within a date; a
//! stale server snapshot can never roll one back.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use workpulse_core::status::StatusCategory;
use workpulse_core::summary::DaySummary;
use workpulse_core::types::{DbId, Timestamp};

/// Locally persisted running totals for `(identity, date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationCache {
    pub identity_id: DbId,
    pub date: NaiveDate,
    /// Whole minutes per accruing category.
    pub minutes: BTreeMap<StatusCategory, i64>,
    /// High-water mark of reconciled time. Advanced only in whole
    /// minutes.
    pub last_reconciled_at: Timestamp,
    pub current_category: StatusCategory,
    pub current_category_changed_at: Timestamp,
    pub is_leave_day: bool,
}

impl ReconciliationCache {
    /// Fresh cache starting at `now` in `category`.
    pub fn new(identity_id: DbId, date: NaiveDate, category: StatusCategory, now: Timestamp) -> Self {
        Self {
            identity_id,
            date,
            minutes: BTreeMap::new(),
            last_reconciled_at: now,
            current_category: category,
            current_category_changed_at: now,
            is_leave_day: category.is_leave(),
        }
    }

    /// Seed from a server snapshot when no local cache exists for the
    /// date.
    pub fn seed_from_summary(summary: &DaySummary, category: StatusCategory, now: Timestamp) -> Self {
        let mut cache = Self::new(summary.identity_id, summary.date, category, now);
        cache.minutes = summary.buckets.clone();
        cache.is_leave_day = summary.is_leave_day || cache.is_leave_day;
        cache
    }

    /// Periodic reconciliation tick.
    ///
    /// Returns the cumulative snapshot to push upstream when at least
    /// one whole minute was credited; `None` means nothing changed.
    pub fn tick(&mut self, now: Timestamp) -> Option<DaySummary> {
        let elapsed_ms = (now - self.last_reconciled_at).num_milliseconds();
        let delta = elapsed_ms / 60_000;
        if delta <= 0 {
            return None;
        }

        if self.current_category.accrues_minutes() {
            *self.minutes.entry(self.current_category).or_insert(0) += delta;
        }
        // Advance by exactly the credited minutes, not to `now`: the
        // remainder below one minute stays pending.
        self.last_reconciled_at += Duration::minutes(delta);
        Some(self.snapshot())
    }

    /// Local category change: credit the elapsed time to the outgoing
    /// category first, then switch.
    pub fn change_category(&mut self, category: StatusCategory, now: Timestamp) -> Option<DaySummary> {
        let pushed = self.tick(now);
        self.current_category = category;
        self.current_category_changed_at = now;
        if category.is_leave() {
            self.is_leave_day = true;
        }
        pushed
    }

    /// Manual sync: flush whatever is pending and return the snapshot
    /// to push regardless. Safe to run concurrently with the periodic
    /// tick because a second call in the same minute credits nothing.
    pub fn manual_sync(&mut self, now: Timestamp) -> DaySummary {
        self.tick(now);
        self.snapshot()
    }

    /// Re-establish the baseline after a reconnect. The offline gap
    /// between the old mark and `now` is credited to no bucket; accrual
    /// simply resumes from here.
    pub fn rebase(&mut self, now: Timestamp) {
        if now > self.last_reconciled_at {
            self.last_reconciled_at = now;
        }
        self.current_category_changed_at = now;
    }

    /// Merge a server snapshot without ever decreasing a bucket.
    pub fn adopt_server(&mut self, summary: &DaySummary) {
        for (category, minutes) in &summary.buckets {
            let local = self.minutes.entry(*category).or_insert(0);
            *local = (*local).max(*minutes);
        }
        self.is_leave_day = self.is_leave_day || summary.is_leave_day;
    }

    /// The cumulative upsert payload keyed `(identity, date)`.
    pub fn snapshot(&self) -> DaySummary {
        DaySummary {
            identity_id: self.identity_id,
            date: self.date,
            total_minutes: self.minutes.values().sum(),
            buckets: self.minutes.clone(),
            login_time: None,
            logout_time: None,
            is_leave_day: self.is_leave_day,
        }
    }
}
