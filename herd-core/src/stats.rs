//! Point-in-time statistics snapshots.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of small cache activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Entries currently held (live or not yet swept).
    pub entries: u64,
    /// Lookups that found a fresh entry.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Lookups that found an entry past its TTL.
    pub expired: u64,
    pub inserts: u64,
    /// Entries removed by path invalidation.
    pub invalidated: u64,
    /// Entries removed by GC sweeps.
    pub gc_evicted: u64,
    /// Completed GC sweeps.
    pub gc_runs: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses + self.expired;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Snapshot of coalescing queue activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoalesceStats {
    /// Keys with an active leader right now.
    pub in_flight_keys: u64,
    /// Followers currently waiting on some leader.
    pub waiting_followers: u64,
    pub leaders: u64,
    pub followers: u64,
    /// Leaders that delivered a result.
    pub completions: u64,
    /// Leaders that went away without delivering.
    pub abandonments: u64,
}

/// Monotonic counter used by the snapshot types.
#[derive(Debug, Default)]
pub(crate) struct Counter(AtomicU64);

impl Counter {
    pub(crate) fn incr(&self) {
        self.add(1);
    }

    pub(crate) fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}
