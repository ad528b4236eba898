//! Storage seam between the session service and the external Event Log
//! / Snapshot Store.
//!
//! The session service talks to a [`StatusStore`] trait object so the
//! single-lease and persist-before-broadcast contracts can be tested
//! without Postgres. [`PgStatusStore`] is the production impl;
//! [`MemoryStatusStore`] backs integration tests and local development.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use workpulse_core::event::StatusEvent;
use workpulse_core::summary::DaySummary;
use workpulse_core::types::DbId;
use workpulse_db::repositories::{DaySummaryRepo, StatusEventRepo};
use workpulse_db::DbPool;

/// A store operation failed. Always retryable from the caller's view:
/// the mutation is treated as not having happened.
#[derive(Debug, thiserror::Error)]
#[error("status store error: {0}")]
pub struct StoreError(pub String);

impl StoreError {
    fn from_display(err: impl std::fmt::Display) -> Self {
        Self(err.to_string())
    }
}

/// The Event Log / Snapshot Store collaborator boundary.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Append one immutable event to the log.
    async fn append_event(&self, event: &StatusEvent) -> Result<(), StoreError>;

    /// Read the log in replay order, optionally filtered to one
    /// identity.
    async fn read_events(&self, identity_id: Option<DbId>) -> Result<Vec<StatusEvent>, StoreError>;

    /// Upsert a snapshot keyed `(identity, date)`. Last write wins.
    async fn upsert_summary(&self, summary: &DaySummary) -> Result<(), StoreError>;

    /// Read the stored snapshot for one identity and date.
    async fn read_summary(
        &self,
        identity_id: DbId,
        date: NaiveDate,
    ) -> Result<Option<DaySummary>, StoreError>;
}

/// Production store backed by the `workpulse-db` repositories.
pub struct PgStatusStore {
    pool: DbPool,
}

impl PgStatusStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatusStore for PgStatusStore {
    async fn append_event(&self, event: &StatusEvent) -> Result<(), StoreError> {
        StatusEventRepo::append(&self.pool, event)
            .await
            .map(|_| ())
            .map_err(StoreError::from_display)
    }

    async fn read_events(&self, identity_id: Option<DbId>) -> Result<Vec<StatusEvent>, StoreError> {
        let rows = match identity_id {
            Some(id) => StatusEventRepo::list_for_identity(&self.pool, id).await,
            None => StatusEventRepo::list_all(&self.pool).await,
        }
        .map_err(StoreError::from_display)?;

        rows.iter()
            .map(|row| row.to_event().map_err(StoreError::from_display))
            .collect()
    }

    async fn upsert_summary(&self, summary: &DaySummary) -> Result<(), StoreError> {
        DaySummaryRepo::upsert(&self.pool, summary)
            .await
            .map_err(StoreError::from_display)
    }

    async fn read_summary(
        &self,
        identity_id: DbId,
        date: NaiveDate,
    ) -> Result<Option<DaySummary>, StoreError> {
        let row = DaySummaryRepo::find(&self.pool, identity_id, date)
            .await
            .map_err(StoreError::from_display)?;
        row.map(|r| r.to_summary().map_err(StoreError::from_display))
            .transpose()
    }
}

/// In-memory store for integration tests and local development.
///
/// Writes can be switched into a failing mode to exercise the
/// persist-before-broadcast contract.
#[derive(Default)]
pub struct MemoryStatusStore {
    inner: Mutex<MemoryInner>,
    fail_writes: AtomicBool,
}

#[derive(Default)]
struct MemoryInner {
    events: Vec<StatusEvent>,
    summaries: HashMap<(DbId, NaiveDate), DaySummary>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every write returns [`StoreError`] without mutating.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of all appended events, in append order.
    pub fn events(&self) -> Vec<StatusEvent> {
        self.lock().events.clone()
    }

    /// The stored snapshot for one identity and date, if any.
    pub fn summary(&self, identity_id: DbId, date: NaiveDate) -> Option<DaySummary> {
        self.lock().summaries.get(&(identity_id, date)).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StoreError("writes disabled".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn append_event(&self, event: &StatusEvent) -> Result<(), StoreError> {
        self.check_writable()?;
        self.lock().events.push(event.clone());
        Ok(())
    }

    async fn read_events(&self, identity_id: Option<DbId>) -> Result<Vec<StatusEvent>, StoreError> {
        let events = &self.lock().events;
        Ok(match identity_id {
            Some(id) => events
                .iter()
                .filter(|e| e.identity_id == id)
                .cloned()
                .collect(),
            None => events.clone(),
        })
    }

    async fn upsert_summary(&self, summary: &DaySummary) -> Result<(), StoreError> {
        self.check_writable()?;
        self.lock()
            .summaries
            .insert((summary.identity_id, summary.date), summary.clone());
        Ok(())
    }

    async fn read_summary(
        &self,
        identity_id: DbId,
        date: NaiveDate,
    ) -> Result<Option<DaySummary>, StoreError> {
        Ok(self.summary(identity_id, date))
    }
}
