//! Bounded-lifetime response cache.
//!
//! A concurrent map from [`CacheKey`] to [`CachedResponse`] with a fixed TTL.
//! Expiry is enforced in two places:
//!
//! - [`SmallCache::lookup`] reports an entry past its TTL as
//!   [`Lookup::Expired`] and deletes it on the spot.
//! - A periodic GC sweep removes expired entries nobody asked for again.
//!   Sweeps are started opportunistically by [`SmallCache::maybe_collect_garbage`]
//!   and never run concurrently with each other.
//!
//! The cache is meant for short TTLs and small working sets. Invalidation and
//! GC are linear scans over the live entries.

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::key::CacheKey;
use crate::response::CachedResponse;
use crate::stats::{CacheStats, Counter};

/// Outcome of a TTL-checked lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Fresh(Arc<CachedResponse>),
    /// An entry existed but had outlived the TTL; it has been removed.
    Expired,
    Miss,
}

#[derive(Debug, Default)]
struct Counters {
    hits: Counter,
    misses: Counter,
    expired: Counter,
    inserts: Counter,
    invalidated: Counter,
    gc_evicted: Counter,
    gc_runs: Counter,
}

/// Concurrent TTL cache of captured responses.
#[derive(Debug)]
pub struct SmallCache {
    entries: DashMap<CacheKey, Arc<CachedResponse>>,
    ttl: Duration,
    gc_interval: Duration,
    clock: Arc<dyn Clock>,
    /// Reference point for `last_gc_nanos`.
    epoch: Instant,
    last_gc_nanos: AtomicU64,
    gc_in_progress: AtomicBool,
    counters: Counters,
}

impl SmallCache {
    /// Create a cache on the system clock. A zero `ttl` disables caching.
    pub fn new(ttl: Duration, gc_interval: Duration) -> Self {
        Self::with_clock(ttl, gc_interval, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, gc_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        let epoch = clock.now();
        Self {
            entries: DashMap::new(),
            ttl,
            gc_interval,
            clock,
            epoch,
            last_gc_nanos: AtomicU64::new(0),
            gc_in_progress: AtomicBool::new(false),
            counters: Counters::default(),
        }
    }

    pub fn from_config(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self::with_clock(config.ttl, config.gc_interval, clock)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn gc_interval(&self) -> Duration {
        self.gc_interval
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    /// Current time according to the cache's clock.
    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    // ========================================================================
    // POINT OPERATIONS
    // ========================================================================

    /// Raw lookup with no TTL check.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<CachedResponse>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// TTL-checked lookup. An expired entry is deleted before returning.
    pub fn lookup(&self, key: &CacheKey) -> Lookup {
        // The map guard is released at the end of this statement, before any
        // removal below touches the same shard.
        let Some(entry) = self.get(key) else {
            self.counters.misses.incr();
            return Lookup::Miss;
        };

        if entry.is_expired(self.clock.now(), self.ttl) {
            // Only drop the entry we inspected; a fresher one inserted in the
            // meantime stays.
            self.entries
                .remove_if(key, |_, current| Arc::ptr_eq(current, &entry));
            self.counters.expired.incr();
            return Lookup::Expired;
        }

        self.counters.hits.incr();
        Lookup::Fresh(entry)
    }

    /// Store `value` under `key`, replacing whatever was there.
    ///
    /// Concurrent inserts for one key race and the last write wins. Does
    /// nothing when caching is disabled.
    pub fn insert(&self, key: CacheKey, value: Arc<CachedResponse>) {
        if !self.is_enabled() {
            return;
        }
        self.entries.insert(key, value);
        self.counters.inserts.incr();
    }

    /// Remove the entry for `key`, if any.
    pub fn remove(&self, key: &CacheKey) -> Option<Arc<CachedResponse>> {
        self.entries.remove(key).map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // ========================================================================
    // SWEEPS
    // ========================================================================

    /// Remove every entry whose key was built for `path`. Returns the number
    /// of entries removed.
    pub fn invalidate_path(&self, path: &str) -> usize {
        let mut removed = 0usize;
        self.entries.retain(|key, _| {
            if key.path() == path {
                removed += 1;
                false
            } else {
                true
            }
        });

        if removed > 0 {
            self.counters.invalidated.add(removed as u64);
            tracing::debug!(path, removed, "Invalidated cached responses");
        }
        removed
    }

    /// Run a GC sweep now, removing every expired entry.
    ///
    /// Returns the number of entries evicted. If another sweep is already
    /// running this call does nothing and returns 0.
    pub fn collect_garbage(&self) -> usize {
        let Some(_gate) = GcGate::try_acquire(&self.gc_in_progress) else {
            tracing::trace!("GC sweep already in progress, skipping");
            return 0;
        };

        let now = self.clock.now();
        let ttl = self.ttl;
        let mut evicted = 0usize;
        self.entries.retain(|_, entry| {
            if entry.is_expired(now, ttl) {
                evicted += 1;
                false
            } else {
                true
            }
        });

        self.last_gc_nanos
            .store(self.nanos_since_epoch(now), Ordering::Release);
        self.counters.gc_runs.incr();
        self.counters.gc_evicted.add(evicted as u64);

        if evicted > 0 {
            tracing::info!(evicted, remaining = self.entries.len(), "Small cache GC sweep completed");
        } else {
            tracing::debug!(remaining = self.entries.len(), "Small cache GC sweep found nothing to evict");
        }
        evicted
    }

    /// True when caching is on, no sweep is running and the GC interval has
    /// elapsed since the last sweep.
    pub fn gc_due(&self) -> bool {
        if !self.is_enabled() || self.gc_in_progress.load(Ordering::Acquire) {
            return false;
        }
        let now = self.nanos_since_epoch(self.clock.now());
        let last = self.last_gc_nanos.load(Ordering::Acquire);
        now.saturating_sub(last) >= duration_nanos(self.gc_interval)
    }

    /// Start a GC sweep without blocking the caller, if one is due.
    ///
    /// Inside a tokio runtime the sweep runs on the blocking pool; outside one
    /// it runs inline. Returns whether a sweep was started.
    pub fn maybe_collect_garbage(self: &Arc<Self>) -> bool {
        if !self.gc_due() {
            return false;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let cache = Arc::clone(self);
                handle.spawn_blocking(move || {
                    cache.collect_garbage();
                });
            }
            Err(_) => {
                self.collect_garbage();
            }
        }
        true
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len() as u64,
            hits: self.counters.hits.get(),
            misses: self.counters.misses.get(),
            expired: self.counters.expired.get(),
            inserts: self.counters.inserts.get(),
            invalidated: self.counters.invalidated.get(),
            gc_evicted: self.counters.gc_evicted.get(),
            gc_runs: self.counters.gc_runs.get(),
        }
    }

    fn nanos_since_epoch(&self, at: Instant) -> u64 {
        duration_nanos(at.saturating_duration_since(self.epoch))
    }
}

fn duration_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// Holds the GC in-progress flag; clears it on drop, including on unwind.
struct GcGate<'a> {
    flag: &'a AtomicBool,
}

impl<'a> GcGate<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for GcGate<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
