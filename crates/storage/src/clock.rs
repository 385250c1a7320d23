//! Monotonic timestamp source for MVCC writes and snapshot reads.

use crate::Timestamp;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock nanoseconds latched to be monotonically non-decreasing.
///
/// [`now`](Self::now) never returns less than an earlier call on the
/// same clock, even if the system clock steps backwards. Successive
/// calls may return the same value.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: AtomicI64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current timestamp: wall-clock nanos, or the last value handed out
    /// when the wall clock is behind it.
    pub fn now(&self) -> Timestamp {
        let wall = wall_nanos();
        loop {
            let last = self.last.load(Ordering::SeqCst);
            let next = wall.max(last);
            if self
                .last
                .compare_exchange_weak(last, next, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return next;
            }
        }
    }

    /// Fold an externally observed timestamp into the clock, so that
    /// later [`now`](Self::now) calls never fall behind it.
    pub fn observe(&self, timestamp: Timestamp) {
        loop {
            let last = self.last.load(Ordering::SeqCst);
            if timestamp <= last {
                return;
            }
            if self
                .last
                .compare_exchange_weak(last, timestamp, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return;
            }
        }
    }
}

fn wall_nanos() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as Timestamp
}
