//! Eviction strategies.
//!
//! A pool picks victims by sorting its entries with the strategy's
//! comparator and evicting from the front until enough space is free.
//! The comparators:
//! - FIFO: creation time ascending
//! - LRU: last access time ascending
//! - LFU: access count ascending
//! - Adaptive: `(last_access, access_count, -size)` ascending, which
//!   prefers evicting stale, rarely used, large buffers first

use std::cmp::Ordering;
use std::time::Instant;

/// Eviction policy of a buffer pool, selectable per pool at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Fifo,
    Lru,
    Lfu,
    Adaptive,
}

impl Strategy {
    /// Short name for log lines.
    pub const fn as_str(self) -> &'static str {
        match self {
            Strategy::Fifo => "fifo",
            Strategy::Lru => "lru",
            Strategy::Lfu => "lfu",
            Strategy::Adaptive => "adaptive",
        }
    }
}

/// Access metadata a strategy orders victims by.
#[derive(Debug, Clone, Copy)]
pub(crate) struct VictimMeta {
    pub created_at: Instant,
    pub last_access: Instant,
    pub access_count: u64,
    pub size_bytes: u64,
}

/// Ordering of two entries under a strategy; `Less` is evicted first.
pub(crate) fn victim_order(strategy: Strategy, a: &VictimMeta, b: &VictimMeta) -> Ordering {
    match strategy {
        Strategy::Fifo => a.created_at.cmp(&b.created_at),
        Strategy::Lru => a.last_access.cmp(&b.last_access),
        Strategy::Lfu => a.access_count.cmp(&b.access_count),
        Strategy::Adaptive => a
            .last_access
            .cmp(&b.last_access)
            .then(a.access_count.cmp(&b.access_count))
            .then(b.size_bytes.cmp(&a.size_bytes)),
    }
}
