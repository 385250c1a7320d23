//! In-memory storage engines for janus.
//!
//! Two concurrency-control disciplines, side by side:
//! [`VersionedStore`] keeps the full timestamped write history per key
//! and answers snapshot reads "as of" a timestamp (MVCC);
//! [`OptimisticStore`] keeps one current record per id and rejects
//! updates made against a stale version counter (OCC).
//! [`MonotonicClock`] supplies the timestamps.

pub mod clock;
pub mod mvcc;
pub mod occ;

pub use clock::MonotonicClock;
pub use mvcc::{StoreStats, Version, VersionedStore};
pub use occ::{OptimisticStore, Record};

/// Timestamp attached to every MVCC version: nanoseconds since the Unix
/// epoch when produced by [`MonotonicClock`], or any caller-supplied
/// logical value.
pub type Timestamp = i64;
