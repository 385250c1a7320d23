//! Optimistic concurrency control: one current record per id, and
//! updates that carry the version they read and lose if it has moved.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Current state of one record.
///
/// Reads hand out detached clones, so a caller can hold its snapshot
/// across its own think time and use `version` in a later
/// [`OptimisticStore::update`] without racing the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: u64,
    pub value: String,
    /// Conflict-detection token: 1 on insert, +1 per successful update.
    pub version: u64,
}

/// OCC store. One mutex covers the whole record map, so insert, read
/// and update are mutually exclusive and the version check in
/// [`update`](Self::update) is atomic with the write it guards.
#[derive(Debug, Default)]
pub struct OptimisticStore {
    records: Mutex<HashMap<u64, Record>>,
}

impl OptimisticStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record at version 1, unconditionally replacing whatever
    /// was stored under `id`. Insert is not version-checked.
    pub fn insert(&self, id: u64, value: &str) {
        let mut records = self.records.lock();
        records.insert(
            id,
            Record {
                id,
                value: value.to_string(),
                version: 1,
            },
        );
        tracing::trace!(id, "occ insert");
    }

    /// Detached snapshot of the current record, or `None` if the id is
    /// absent.
    pub fn get(&self, id: u64) -> Option<Record> {
        self.records.lock().get(&id).cloned()
    }

    /// Version-checked compare-and-set.
    ///
    /// Succeeds iff the record exists and its current version equals
    /// `expected_version`; the value is then replaced and the version
    /// incremented by exactly one. On a stale `expected_version` the
    /// record is left untouched and `false` is returned — re-reading and
    /// retrying is the caller's move.
    pub fn update(&self, id: u64, value: &str, expected_version: u64) -> bool {
        let mut records = self.records.lock();
        match records.get_mut(&id) {
            Some(record) if record.version == expected_version => {
                record.value = value.to_string();
                record.version += 1;
                true
            }
            Some(record) => {
                tracing::debug!(
                    id,
                    expected_version,
                    current_version = record.version,
                    "occ update rejected: stale version"
                );
                false
            }
            None => {
                tracing::debug!(id, "occ update rejected: no such record");
                false
            }
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let store = OptimisticStore::new();
        store.insert(1, "A");

        let record = store.get(1).unwrap();
        assert_eq!(record.id, 1);
        assert_eq!(record.value, "A");
        assert_eq!(record.version, 1);
    }

    #[test]
    fn test_get_missing() {
        let store = OptimisticStore::new();
        assert!(store.get(99).is_none());
    }

    #[test]
    fn test_update_then_stale_update() {
        let store = OptimisticStore::new();
        store.insert(1, "A");

        assert!(store.update(1, "B", 1));
        let record = store.get(1).unwrap();
        assert_eq!(record.value, "B");
        assert_eq!(record.version, 2);

        // Stale expected version: no effect.
        assert!(!store.update(1, "C", 1));
        let record = store.get(1).unwrap();
        assert_eq!(record.value, "B");
        assert_eq!(record.version, 2);
    }

    #[test]
    fn test_update_missing_record() {
        let store = OptimisticStore::new();
        assert!(!store.update(5, "X", 1));
        assert!(store.get(5).is_none());
    }

    #[test]
    fn test_version_increments_by_one() {
        let store = OptimisticStore::new();
        store.insert(1, "v");
        for expected in 1..=5u64 {
            assert!(store.update(1, "v", expected));
        }
        assert_eq!(store.get(1).unwrap().version, 6);
    }

    #[test]
    fn test_insert_resets_version() {
        let store = OptimisticStore::new();
        store.insert(1, "old");
        assert!(store.update(1, "newer", 1));
        assert_eq!(store.get(1).unwrap().version, 2);

        // Unconditional overwrite: version starts over.
        store.insert(1, "fresh");
        let record = store.get(1).unwrap();
        assert_eq!(record.value, "fresh");
        assert_eq!(record.version, 1);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let store = OptimisticStore::new();
        store.insert(1, "A");

        let snapshot = store.get(1).unwrap();
        assert!(store.update(1, "B", snapshot.version));

        // The earlier snapshot is unaffected by the update.
        assert_eq!(snapshot.value, "A");
        assert_eq!(snapshot.version, 1);
        assert_eq!(store.get(1).unwrap().version, 2);
    }

    #[test]
    fn test_len() {
        let store = OptimisticStore::new();
        assert!(store.is_empty());
        store.insert(1, "a");
        store.insert(2, "b");
        store.insert(1, "a-again");
        assert_eq!(store.len(), 2);
        assert!(!store.is_empty());
    }
}
