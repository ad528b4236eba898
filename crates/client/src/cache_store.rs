//! Local JSON persistence for the reconciliation cache.
//!
//! One file per `(identity, date)`. Load-time policy: an existing
//! local file is the preferred working base (optimistic local-first);
//! the server snapshot is only a seed when no file exists.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use workpulse_core::types::DbId;

use crate::reconcile::ReconciliationCache;

/// Errors from reading or writing the local cache file.
#[derive(Debug, thiserror::Error)]
pub enum CacheStoreError {
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// File path for one identity-date cache under `dir`.
pub fn cache_path(dir: &Path, identity_id: DbId, date: NaiveDate) -> PathBuf {
    dir.join(format!("{identity_id}-{date}.json"))
}

/// Persist the cache, creating parent directories as needed.
pub fn save(path: &Path, cache: &ReconciliationCache) -> Result<(), CacheStoreError> {
    if let Some(parent) = path.parent() {
        fs_err::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(cache)?;
    fs_err::write(path, json)?;
    Ok(())
}

/// Load a cache if the file exists. `Ok(None)` means no local cache
/// for this date; a malformed file is an error the caller may treat as
/// absent.
pub fn load(path: &Path) -> Result<Option<ReconciliationCache>, CacheStoreError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs_err::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&raw)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use workpulse_core::status::StatusCategory;

    fn sample() -> ReconciliationCache {
        let mut cache = ReconciliationCache::new(
            7,
            "2026-03-02".parse().unwrap(),
            StatusCategory::Available,
            "2026-03-02T09:00:00Z".parse().unwrap(),
        );
        cache.minutes.insert(StatusCategory::Available, 50);
        cache
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = cache_path(dir.path(), 7, "2026-03-02".parse().unwrap());

        save(&path, &sample()).unwrap();
        let loaded = load(&path).unwrap().expect("cache should exist");
        assert_eq!(loaded, sample());
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = cache_path(dir.path(), 7, "2026-03-02".parse().unwrap());
        assert!(load(&path).unwrap().is_none());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = cache_path(dir.path(), 7, "2026-03-02".parse().unwrap());
        fs_err::write(&path, "{ not json").unwrap();
        assert!(load(&path).is_err());
    }

    #[test]
    fn paths_are_distinct_per_identity_and_date() {
        let dir = Path::new("/tmp/workpulse");
        let a = cache_path(dir, 7, "2026-03-02".parse().unwrap());
        let b = cache_path(dir, 7, "2026-03-03".parse().unwrap());
        let c = cache_path(dir, 8, "2026-03-02".parse().unwrap());
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
