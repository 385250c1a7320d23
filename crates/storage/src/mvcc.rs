//! Multi-version store: every write appends a timestamped version and
//! reads resolve against the newest version at or before a timestamp.
//!
//! History is append-only. Nothing is compacted, deleted, or reordered,
//! so memory grows with every write.

use crate::Timestamp;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::mem;

/// One committed write. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub timestamp: Timestamp,
    pub value: String,
}

/// Point-in-time size snapshot of a [`VersionedStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Distinct keys with at least one version.
    pub total_keys: usize,
    /// Versions summed across all keys.
    pub total_versions: usize,
    /// Key bytes + value bytes + one timestamp width per version.
    /// An approximation, not an allocator accounting.
    pub approx_mem_bytes: usize,
}

/// MVCC store: key -> append-only version log.
///
/// One lock covers the whole map: writes are exclusive, reads and
/// [`stats`](Self::stats) share the read side.
#[derive(Debug, Default)]
pub struct VersionedStore {
    data: RwLock<HashMap<String, Vec<Version>>>,
}

impl VersionedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a version for `key` at `timestamp`.
    ///
    /// The timestamp is stored exactly as supplied. A timestamp earlier
    /// than an already-stored version is accepted; reads resolve against
    /// stored timestamp values, not call order.
    pub fn write(&self, key: &str, value: &str, timestamp: Timestamp) {
        let mut data = self.data.write();
        data.entry(key.to_string()).or_default().push(Version {
            timestamp,
            value: value.to_string(),
        });
        tracing::trace!(key, timestamp, "mvcc write");
    }

    /// Snapshot read: the value of the version with the greatest
    /// timestamp `<=` the query timestamp, or `None` when the key is
    /// unknown or every version is newer.
    ///
    /// When two versions carry the same timestamp, the most recently
    /// written one wins.
    pub fn read(&self, key: &str, timestamp: Timestamp) -> Option<String> {
        let data = self.data.read();
        let versions = data.get(key)?;

        let mut best: Option<&Version> = None;
        for version in versions {
            if version.timestamp > timestamp {
                continue;
            }
            match best {
                Some(b) if version.timestamp < b.timestamp => {}
                _ => best = Some(version),
            }
        }
        best.map(|v| v.value.clone())
    }

    /// Full history for a key in write order. Returns a detached copy;
    /// empty if the key was never written.
    pub fn versions(&self, key: &str) -> Vec<Version> {
        self.data.read().get(key).cloned().unwrap_or_default()
    }

    /// Number of distinct keys.
    pub fn key_count(&self) -> usize {
        self.data.read().len()
    }

    /// Total versions across all keys.
    pub fn version_count(&self) -> usize {
        self.data.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// All keys, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.data.read().keys().cloned().collect()
    }

    /// Compute a size snapshot in one pass under the read lock, so the
    /// three counters are consistent with each other even while writers
    /// are queued.
    pub fn stats(&self) -> StoreStats {
        let data = self.data.read();
        let mut stats = StoreStats::default();
        for (key, versions) in data.iter() {
            stats.total_keys += 1;
            stats.approx_mem_bytes += key.len();
            for version in versions {
                stats.total_versions += 1;
                stats.approx_mem_bytes += version.value.len() + mem::size_of::<Timestamp>();
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_between_and_after_versions() {
        let store = VersionedStore::new();
        store.write("k", "v1", 100);
        store.write("k", "v2", 200);

        assert_eq!(store.read("k", 150), Some("v1".to_string()));
        assert_eq!(store.read("k", 250), Some("v2".to_string()));
        assert_eq!(store.read("k", 50), None);
    }

    #[test]
    fn test_read_at_exact_timestamp() {
        let store = VersionedStore::new();
        store.write("k", "v1", 100);
        store.write("k", "v2", 200);

        assert_eq!(store.read("k", 100), Some("v1".to_string()));
        assert_eq!(store.read("k", 200), Some("v2".to_string()));
        assert_eq!(store.read("k", 199), Some("v1".to_string()));
    }

    #[test]
    fn test_read_missing_key() {
        let store = VersionedStore::new();
        assert_eq!(store.read("nope", i64::MAX), None);
    }

    #[test]
    fn test_monotone_visibility() {
        let store = VersionedStore::new();
        let writes = [(10, "a"), (20, "b"), (30, "c")];
        for (ts, value) in writes {
            store.write("k", value, ts);
        }

        assert_eq!(store.read("k", 9), None);
        assert_eq!(store.read("k", 10), Some("a".to_string()));
        assert_eq!(store.read("k", 19), Some("a".to_string()));
        assert_eq!(store.read("k", 20), Some("b".to_string()));
        assert_eq!(store.read("k", 29), Some("b".to_string()));
        assert_eq!(store.read("k", 30), Some("c".to_string()));
        assert_eq!(store.read("k", i64::MAX), Some("c".to_string()));
    }

    #[test]
    fn test_repeated_reads_are_stable() {
        let store = VersionedStore::new();
        store.write("k", "v1", 100);
        store.write("k", "v2", 200);

        for _ in 0..10 {
            assert_eq!(store.read("k", 150), Some("v1".to_string()));
        }
    }

    #[test]
    fn test_equal_timestamp_later_write_wins() {
        let store = VersionedStore::new();
        store.write("k", "first", 100);
        store.write("k", "second", 100);

        assert_eq!(store.read("k", 100), Some("second".to_string()));
        assert_eq!(store.read("k", 150), Some("second".to_string()));
    }

    #[test]
    fn test_out_of_order_write_accepted() {
        let store = VersionedStore::new();
        store.write("k", "late", 300);
        store.write("k", "early", 100);

        // Both versions are stored and resolve by timestamp value.
        assert_eq!(store.version_count(), 2);
        assert_eq!(store.read("k", 100), Some("early".to_string()));
        assert_eq!(store.read("k", 300), Some("late".to_string()));
        assert_eq!(store.read("k", 200), Some("early".to_string()));
    }

    #[test]
    fn test_versions_keeps_write_order() {
        let store = VersionedStore::new();
        store.write("k", "late", 300);
        store.write("k", "early", 100);

        let history = store.versions("k");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].timestamp, 300);
        assert_eq!(history[1].timestamp, 100);
        assert!(store.versions("other").is_empty());
    }

    #[test]
    fn test_counts_and_keys() {
        let store = VersionedStore::new();
        assert!(store.is_empty());

        store.write("a", "1", 1);
        store.write("a", "2", 2);
        store.write("b", "1", 1);

        assert!(!store.is_empty());
        assert_eq!(store.key_count(), 2);
        assert_eq!(store.version_count(), 3);

        let mut keys = store.keys();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_stats_counts() {
        let store = VersionedStore::new();
        for i in 0..5 {
            store.write("x", &format!("v{i}"), i);
        }
        for i in 0..3 {
            store.write("y", &format!("v{i}"), i);
        }

        let stats = store.stats();
        assert_eq!(stats.total_keys, 2);
        assert_eq!(stats.total_versions, 8);
    }

    #[test]
    fn test_stats_approx_mem() {
        let store = VersionedStore::new();
        store.write("k", "v1", 100);
        store.write("k", "v2", 200);

        // 1 key byte + 2 * (2 value bytes + 8 timestamp bytes)
        let stats = store.stats();
        assert_eq!(stats.approx_mem_bytes, 1 + 2 * (2 + mem::size_of::<Timestamp>()));
    }

    #[test]
    fn test_stats_empty_store() {
        let store = VersionedStore::new();
        assert_eq!(store.stats(), StoreStats::default());
    }

    #[test]
    fn test_version_serde_roundtrip() {
        let version = Version {
            timestamp: 42,
            value: "payload".to_string(),
        };
        let json = serde_json::to_string(&version).unwrap();
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(version, back);
    }
}
