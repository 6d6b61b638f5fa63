//! Cache Statistics
//!
//! Cheap atomic counters fed from the cache hot path and result handlers,
//! snapshotted for diagnostics overlays. The map-lookup counter doubles as the
//! instrumentation used by the memo-short-circuit tests.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct CacheStats {
    shaders_created: AtomicU64,
    shaders_alive: AtomicU64,
    compile_requests: AtomicU64,
    compile_failures: AtomicU64,
    memo_hits: AtomicU64,
    map_lookups: AtomicU64,
    loaded_from_disk: AtomicU64,
    pass_through_hits: AtomicU64,
}

impl CacheStats {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_created(&self) {
        self.shaders_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_alive(&self, alive: u64) {
        self.shaders_alive.store(alive, Ordering::Relaxed);
    }

    pub(crate) fn record_compile_request(&self) {
        self.compile_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.compile_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_memo_hit(&self) {
        self.memo_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_map_lookup(&self) {
        self.map_lookups.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_loaded_from_disk(&self, count: u64) {
        self.loaded_from_disk.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_pass_through(&self) {
        self.pass_through_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Consistent-enough copy of all counters for display.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            shaders_created: self.shaders_created.load(Ordering::Relaxed),
            shaders_alive: self.shaders_alive.load(Ordering::Relaxed),
            compile_requests: self.compile_requests.load(Ordering::Relaxed),
            compile_failures: self.compile_failures.load(Ordering::Relaxed),
            memo_hits: self.memo_hits.load(Ordering::Relaxed),
            map_lookups: self.map_lookups.load(Ordering::Relaxed),
            loaded_from_disk: self.loaded_from_disk.load(Ordering::Relaxed),
            pass_through_hits: self.pass_through_hits.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of one cache's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Shaders compiled successfully this run.
    pub shaders_created: u64,
    /// Entries currently alive in the map.
    pub shaders_alive: u64,
    /// Work units submitted to the async compiler.
    pub compile_requests: u64,
    /// Compiles rejected by the backend.
    pub compile_failures: u64,
    /// Prepares resolved by the cursor memo without a map lookup.
    pub memo_hits: u64,
    /// Entry-map lookup/insert operations.
    pub map_lookups: u64,
    /// Entries hydrated from the disk cache.
    pub loaded_from_disk: u64,
    /// Prepares resolved to the pass-through entry.
    pub pass_through_hits: u64,
}
