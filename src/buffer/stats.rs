//! Buffer pool statistics tracking.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics tracked by a buffer pool.
///
/// All fields are atomic for lock-free, thread-safe reads while the pool
/// lock is held elsewhere. `Ordering::Relaxed` is used throughout: the
/// counters only need atomicity, not cross-counter ordering.
///
/// `current_size` and `peak_size` are only mutated while the owning pool's
/// entry lock is held, so `current_size` always equals the byte sum of the
/// live entries.
///
/// # Example
/// ```
/// use framepool::PoolStats;
/// use std::sync::atomic::Ordering;
///
/// let stats = PoolStats::new();
/// stats.hits.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(stats.hits.load(Ordering::Relaxed), 1);
/// ```
#[derive(Debug)]
pub struct PoolStats {
    /// Number of times a key was found in the pool.
    pub hits: AtomicU64,

    /// Number of times an allocation found no existing entry.
    pub misses: AtomicU64,

    /// Number of entries evicted to make room.
    pub evictions: AtomicU64,

    /// Number of new payloads allocated.
    pub allocations: AtomicU64,

    /// Current total byte size of all entries.
    pub current_size: AtomicU64,

    /// Highest value `current_size` has reached.
    pub peak_size: AtomicU64,

    /// Total mutating and reading operations served.
    pub total_operations: AtomicU64,
}

impl PoolStats {
    /// Create a new stats tracker with all counters at zero.
    pub fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            allocations: AtomicU64::new(0),
            current_size: AtomicU64::new(0),
            peak_size: AtomicU64::new(0),
            total_operations: AtomicU64::new(0),
        }
    }

    /// Calculate cache hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Add `bytes` to the running size and update the peak.
    pub(crate) fn grow(&self, bytes: u64) {
        let new = self.current_size.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.peak_size.fetch_max(new, Ordering::Relaxed);
    }

    /// Subtract `bytes` from the running size.
    pub(crate) fn shrink(&self, bytes: u64) {
        self.current_size.fetch_sub(bytes, Ordering::Relaxed);
    }

    /// Get a snapshot of current statistics.
    ///
    /// Returns a non-atomic copy for display/logging.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            allocations: self.allocations.load(Ordering::Relaxed),
            current_size: self.current_size.load(Ordering::Relaxed),
            peak_size: self.peak_size.load(Ordering::Relaxed),
            total_operations: self.total_operations.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.allocations.store(0, Ordering::Relaxed);
        self.current_size.store(0, Ordering::Relaxed);
        self.peak_size.store(0, Ordering::Relaxed);
        self.total_operations.store(0, Ordering::Relaxed);
    }
}

impl Default for PoolStats {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of buffer pool statistics.
///
/// Unlike [`PoolStats`], this is not atomic and can be safely printed,
/// serialized, compared, etc.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub allocations: u64,
    pub current_size: u64,
    pub peak_size: u64,
    pub total_operations: u64,
}

impl StatsSnapshot {
    /// Calculate cache hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stats {{ hits: {}, misses: {}, evictions: {}, size: {}/{} peak, hit_rate: {:.2}% }}",
            self.hits,
            self.misses,
            self.evictions,
            self.current_size,
            self.peak_size,
            self.hit_rate() * 100.0
        )
    }
}
