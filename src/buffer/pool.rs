//! Buffer pool - a capacity-bounded, strategy-evicted buffer collection.
//!
//! The [`BufferPool`] provides:
//! - Keyed allocation of typed, zero-initialized payloads
//! - Capacity accounting with strategy-driven eviction
//! - Zero-copy views and aliased handles
//! - Atomic statistics
//!
//! # Architecture
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         BufferPool                           │
//! │  ┌──────────────────────────────┐  ┌──────────────────────┐  │
//! │  │ entries: Mutex<HashMap>      │  │ stats: PoolStats     │  │
//! │  │ key → { storage, info }      │  │ (atomic counters)    │  │
//! │  └──────────────┬───────────────┘  └──────────────────────┘  │
//! │                 │ Arc<RwLock<Storage>>                       │
//! │        ┌────────┴────────┬──────────────┐                    │
//! │   BufferHandle      BufferHandle    BufferView               │
//! │   (caller A)        (caller B)      (sub-region)             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Thread Safety
//! - `entries`: one `Mutex` serializes every mutating operation
//! - payloads: per-buffer `RwLock` shared with handed-out handles
//! - `stats`: atomic counters, no lock
//!
//! Transient capacity overshoot can exist inside a single
//! allocate-then-evict step while the entry lock is held; it is never
//! observable from outside the lock.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info};
use memmap2::MmapMut;
use parking_lot::{Mutex, RwLock};

use crate::buffer::handle::{BufferHandle, BufferView, SharedStorage, Storage};
use crate::buffer::stats::PoolStats;
use crate::buffer::strategy::{victim_order, Strategy, VictimMeta};
use crate::common::dtype::byte_size;
use crate::common::{DType, Error, Result};

/// Declared access mode of a buffer.
///
/// Advisory: buffers are shared-read, exclusive-write by convention. The
/// engine guarantees its bookkeeping is race-free, not the content of
/// concurrently mutated payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

/// Per-entry metadata. Mutated only under the pool's entry lock.
struct BufferInfo {
    dtype: DType,
    shape: Vec<usize>,
    size_bytes: u64,
    #[allow(dead_code)]
    mode: AccessMode,
    created_at: Instant,
    last_access: Instant,
    access_count: u64,
    dirty: bool,
}

impl BufferInfo {
    fn new(dtype: DType, shape: Vec<usize>, size_bytes: u64, mode: AccessMode) -> Self {
        let now = Instant::now();
        Self {
            dtype,
            shape,
            size_bytes,
            mode,
            created_at: now,
            last_access: now,
            access_count: 1,
            dirty: false,
        }
    }

    fn touch(&mut self) {
        self.last_access = Instant::now();
        self.access_count += 1;
    }

    fn victim_meta(&self) -> VictimMeta {
        VictimMeta {
            created_at: self.created_at,
            last_access: self.last_access,
            access_count: self.access_count,
            size_bytes: self.size_bytes,
        }
    }
}

struct BufferEntry {
    storage: SharedStorage,
    info: BufferInfo,
}

impl BufferEntry {
    fn handle(&self, key: &str) -> BufferHandle {
        BufferHandle::new(
            key.to_string(),
            self.info.dtype,
            self.info.shape.clone(),
            self.info.size_bytes,
            Arc::clone(&self.storage),
        )
    }
}

/// A capacity-bounded collection of buffers under one eviction strategy.
///
/// # Usage
/// ```
/// use framepool::{BufferPool, Strategy, AccessMode, DType};
///
/// let pool = BufferPool::new("scratch", 1024, Strategy::Lru);
/// let handle = pool
///     .allocate("frame_0", &[16, 16], DType::U8, AccessMode::ReadWrite)
///     .unwrap();
/// handle.write()[0] = 0xAB;
/// assert_eq!(pool.get("frame_0").unwrap().read()[0], 0xAB);
/// ```
pub struct BufferPool {
    /// Pool name, used in log lines and error context.
    name: String,

    /// Capacity in bytes (immutable after construction).
    capacity: u64,

    /// Eviction strategy (immutable after construction).
    strategy: Strategy,

    /// Keyed entries. One lock serializes allocate/put/release/evict.
    entries: Mutex<HashMap<String, BufferEntry>>,

    /// Performance statistics.
    stats: PoolStats,
}

impl BufferPool {
    /// Create a new pool.
    ///
    /// # Panics
    /// Panics if `capacity` is 0.
    pub fn new(name: impl Into<String>, capacity: u64, strategy: Strategy) -> Self {
        assert!(capacity > 0, "capacity must be > 0");
        let name = name.into();
        debug!(
            "pool '{}' created (capacity: {} bytes, strategy: {})",
            name,
            capacity,
            strategy.as_str()
        );
        Self {
            name,
            capacity,
            strategy,
            entries: Mutex::new(HashMap::new()),
            stats: PoolStats::new(),
        }
    }

    // ========================================================================
    // Public API: allocate / get / put / release
    // ========================================================================

    /// Allocate a zero-initialized buffer, or return the existing one.
    ///
    /// If `key` already exists this is a cache hit: access metadata is
    /// updated and the existing buffer is returned unchanged. Otherwise the
    /// pool evicts until the new payload fits.
    ///
    /// # Errors
    /// - [`Error::InvalidShape`] for empty/zero/overflowing shapes
    /// - [`Error::CapacityExceeded`] if eviction cannot free enough space
    pub fn allocate(
        &self,
        key: &str,
        shape: &[usize],
        dtype: DType,
        mode: AccessMode,
    ) -> Result<BufferHandle> {
        let size = byte_size(shape, dtype)? as u64;

        let mut entries = self.entries.lock();
        self.stats.total_operations.fetch_add(1, Ordering::Relaxed);

        if let Some(entry) = entries.get_mut(key) {
            entry.info.touch();
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(entry.handle(key));
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        self.make_room(&mut entries, size)?;

        let storage: SharedStorage =
            Arc::new(RwLock::new(Storage::Heap(vec![0u8; size as usize])));
        let entry = BufferEntry {
            storage,
            info: BufferInfo::new(dtype, shape.to_vec(), size, mode),
        };
        let handle = entry.handle(key);
        entries.insert(key.to_string(), entry);

        self.stats.allocations.fetch_add(1, Ordering::Relaxed);
        self.stats.grow(size);

        debug!(
            "pool '{}': allocated '{}' ({} bytes, shape {:?})",
            self.name, key, size, shape
        );
        Ok(handle)
    }

    /// Pure lookup. Updates access metadata on hit; never allocates.
    pub fn get(&self, key: &str) -> Option<BufferHandle> {
        let mut entries = self.entries.lock();
        self.stats.total_operations.fetch_add(1, Ordering::Relaxed);

        let entry = entries.get_mut(key)?;
        entry.info.touch();
        self.stats.hits.fetch_add(1, Ordering::Relaxed);
        Some(entry.handle(key))
    }

    /// Upsert `data` under `key`.
    ///
    /// If an entry with the same shape and dtype exists, the content is
    /// copied in place (no reallocation) and the buffer is marked dirty.
    /// A differing shape/dtype fully replaces the old entry, with capacity
    /// accounting adjusted accordingly.
    ///
    /// # Errors
    /// - [`Error::InvalidShape`] if `data.len()` disagrees with the shape
    /// - [`Error::CapacityExceeded`] if the replacement cannot fit
    pub fn put(
        &self,
        key: &str,
        data: &[u8],
        shape: &[usize],
        dtype: DType,
        mode: AccessMode,
    ) -> Result<()> {
        let size = byte_size(shape, dtype)? as u64;
        if data.len() as u64 != size {
            return Err(Error::InvalidShape(format!(
                "data length {} does not match shape {:?} of {}",
                data.len(),
                shape,
                dtype
            )));
        }

        let mut entries = self.entries.lock();
        self.stats.total_operations.fetch_add(1, Ordering::Relaxed);

        let same_layout = entries
            .get(key)
            .map(|e| e.info.shape == shape && e.info.dtype == dtype);
        match same_layout {
            Some(true) => {
                let entry = entries.get_mut(key).expect("entry present");
                entry.info.dirty = true;
                entry.info.touch();
                let storage = Arc::clone(&entry.storage);
                // Payload locks are taken only after the entry lock is
                // released; a caller holding a handle guard can still
                // reach the pool.
                drop(entries);
                storage.write().as_mut_slice().copy_from_slice(data);
                return Ok(());
            }
            Some(false) => {
                // Shape changed: full replacement.
                let old = entries.remove(key).expect("entry present");
                self.stats.shrink(old.info.size_bytes);
            }
            None => {}
        }

        self.make_room(&mut entries, size)?;

        let mut info = BufferInfo::new(dtype, shape.to_vec(), size, mode);
        info.dirty = true;
        entries.insert(
            key.to_string(),
            BufferEntry {
                storage: Arc::new(RwLock::new(Storage::Heap(data.to_vec()))),
                info,
            },
        );
        self.stats.allocations.fetch_add(1, Ordering::Relaxed);
        self.stats.grow(size);
        Ok(())
    }

    /// Remove and free an entry. Returns whether it existed.
    ///
    /// Handles and views already handed out keep the payload alive; the
    /// pool merely stops accounting for it.
    pub fn release(&self, key: &str) -> bool {
        let mut entries = self.entries.lock();
        self.stats.total_operations.fetch_add(1, Ordering::Relaxed);

        match entries.remove(key) {
            Some(entry) => {
                self.stats.shrink(entry.info.size_bytes);
                debug!(
                    "pool '{}': released '{}' ({} bytes)",
                    self.name, key, entry.info.size_bytes
                );
                true
            }
            None => false,
        }
    }

    // ========================================================================
    // Public API: views and copies
    // ========================================================================

    /// Zero-copy view of an element range of `key`.
    ///
    /// Marks the parent buffer accessed; changes no other bookkeeping.
    /// Returns `None` if the key is absent or the range is out of bounds.
    pub fn view(&self, key: &str, elements: Range<usize>) -> Option<BufferView> {
        let mut entries = self.entries.lock();
        self.stats.total_operations.fetch_add(1, Ordering::Relaxed);

        let entry = entries.get_mut(key)?;
        entry.info.touch();
        self.stats.hits.fetch_add(1, Ordering::Relaxed);

        let elem_size = entry.info.dtype.size_of();
        let offset = elements.start.checked_mul(elem_size)?;
        let end = elements.end.checked_mul(elem_size)?;
        if elements.start > elements.end || end > entry.info.size_bytes as usize {
            return None;
        }
        Some(BufferView::new(
            Arc::clone(&entry.storage),
            offset,
            end - offset,
        ))
    }

    /// Create or overwrite `dst_key` from `src_key`, optionally restricted
    /// to an element range of the source.
    ///
    /// When the destination already matches the copied size its storage is
    /// reused, so handles to it observe the new content. The source bytes
    /// are staged outside both pool and payload locks; payload locks are
    /// never taken while the entry lock is held.
    ///
    /// # Errors
    /// - [`Error::BufferNotFound`] if `src_key` is absent
    /// - [`Error::InvalidShape`] for an out-of-bounds or overflowing region
    /// - [`Error::CapacityExceeded`] if the destination cannot fit
    pub fn copy(&self, src_key: &str, dst_key: &str, region: Option<Range<usize>>) -> Result<()> {
        // Resolve the source under the entry lock.
        let (src_storage, src_dtype, dst_shape, byte_range) = {
            let mut entries = self.entries.lock();
            self.stats.total_operations.fetch_add(1, Ordering::Relaxed);

            let src = entries
                .get_mut(src_key)
                .ok_or_else(|| Error::BufferNotFound(src_key.to_string()))?;
            src.info.touch();

            let elem_size = src.info.dtype.size_of();
            let total_bytes = src.info.size_bytes as usize;
            let (shape, range) = match &region {
                Some(r) => {
                    let start = r.start.checked_mul(elem_size);
                    let end = r.end.checked_mul(elem_size);
                    match (start, end) {
                        (Some(start), Some(end))
                            if r.start <= r.end && end <= total_bytes =>
                        {
                            (vec![r.end - r.start], start..end)
                        }
                        _ => {
                            return Err(Error::InvalidShape(format!(
                                "region {:?} out of bounds for '{}'",
                                r, src_key
                            )));
                        }
                    }
                }
                None => (src.info.shape.clone(), 0..total_bytes),
            };
            (Arc::clone(&src.storage), src.info.dtype, shape, range)
        };
        let size = (byte_range.end - byte_range.start) as u64;

        if src_key == dst_key && region.is_none() {
            return Ok(()); // full self-copy is a no-op
        }

        // Stage the bytes with no pool lock held. One payload lock at a
        // time, so concurrent copies in opposite directions cannot wedge.
        let bytes = src_storage.read().as_slice()[byte_range].to_vec();

        // Reuse the destination's storage when it matches byte-for-byte.
        if src_key != dst_key {
            let dst_storage = {
                let mut entries = self.entries.lock();
                match entries.get_mut(dst_key) {
                    Some(dst) if dst.info.size_bytes == size => {
                        dst.info.dirty = true;
                        dst.info.touch();
                        Some(Arc::clone(&dst.storage))
                    }
                    _ => None,
                }
            };
            if let Some(dst_storage) = dst_storage {
                dst_storage.write().as_mut_slice().copy_from_slice(&bytes);
                return Ok(());
            }
        }

        // Replacement path (also covers region-restricted self-copies).
        let mut entries = self.entries.lock();
        if let Some(old) = entries.remove(dst_key) {
            self.stats.shrink(old.info.size_bytes);
        }
        self.make_room(&mut entries, size)?;
        self.insert_dirty(&mut entries, dst_key, bytes, dst_shape, src_dtype, size);
        Ok(())
    }

    // ========================================================================
    // Public API: maintenance and info
    // ========================================================================

    /// Drop every entry and reset size accounting. Counters survive.
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        let count = entries.len();
        entries.clear();
        self.stats.current_size.store(0, Ordering::Relaxed);
        self.stats.total_operations.fetch_add(1, Ordering::Relaxed);
        info!("pool '{}': cleared {} entries", self.name, count);
    }

    /// Pool statistics.
    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    /// Pool name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Capacity in bytes.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Eviction strategy.
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the pool has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Whether `key` exists (no access metadata update).
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Current keys, unordered.
    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }

    // ========================================================================
    // Internal: mapped entries (temporary buffers)
    // ========================================================================

    /// Register a file-backed payload. Used by the manager for temporary
    /// buffers; behaves like `allocate` for accounting purposes.
    pub(crate) fn insert_mapped(
        &self,
        key: &str,
        map: MmapMut,
        shape: &[usize],
        dtype: DType,
    ) -> Result<BufferHandle> {
        let size = byte_size(shape, dtype)? as u64;

        let mut entries = self.entries.lock();
        self.stats.total_operations.fetch_add(1, Ordering::Relaxed);

        if let Some(old) = entries.remove(key) {
            self.stats.shrink(old.info.size_bytes);
        }
        self.make_room(&mut entries, size)?;

        let entry = BufferEntry {
            storage: Arc::new(RwLock::new(Storage::Mapped(map))),
            info: BufferInfo::new(dtype, shape.to_vec(), size, AccessMode::ReadWrite),
        };
        let handle = entry.handle(key);
        entries.insert(key.to_string(), entry);

        self.stats.allocations.fetch_add(1, Ordering::Relaxed);
        self.stats.grow(size);
        Ok(handle)
    }

    // ========================================================================
    // Internal: eviction
    // ========================================================================

    /// Evict entries, in strategy order, until `incoming` bytes fit.
    ///
    /// Caller holds the entry lock. Fails only if `incoming` exceeds the
    /// whole capacity, i.e. when removing every other entry still would
    /// not be enough.
    fn make_room(&self, entries: &mut HashMap<String, BufferEntry>, incoming: u64) -> Result<()> {
        if incoming > self.capacity {
            return Err(Error::CapacityExceeded {
                pool: self.name.clone(),
                requested: incoming,
                capacity: self.capacity,
            });
        }

        let mut current = self.stats.current_size.load(Ordering::Relaxed);
        if current + incoming <= self.capacity {
            return Ok(());
        }

        let mut victims: Vec<(String, VictimMeta)> = entries
            .iter()
            .map(|(k, e)| (k.clone(), e.info.victim_meta()))
            .collect();
        victims.sort_by(|a, b| victim_order(self.strategy, &a.1, &b.1));

        for (key, meta) in victims {
            if current + incoming <= self.capacity {
                break;
            }
            entries.remove(&key);
            current -= meta.size_bytes;
            self.stats.shrink(meta.size_bytes);
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(
                "pool '{}': evicted '{}' ({} bytes, {})",
                self.name,
                key,
                meta.size_bytes,
                self.strategy.as_str()
            );
        }

        Ok(())
    }

    fn insert_dirty(
        &self,
        entries: &mut HashMap<String, BufferEntry>,
        key: &str,
        bytes: Vec<u8>,
        shape: Vec<usize>,
        dtype: DType,
        size: u64,
    ) {
        let mut info = BufferInfo::new(dtype, shape, size, AccessMode::ReadWrite);
        info.dirty = true;
        entries.insert(
            key.to_string(),
            BufferEntry {
                storage: Arc::new(RwLock::new(Storage::Heap(bytes))),
                info,
            },
        );
        self.stats.allocations.fetch_add(1, Ordering::Relaxed);
        self.stats.grow(size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::strategy::Strategy;
    use proptest::prelude::*;

    fn pool(capacity: u64, strategy: Strategy) -> BufferPool {
        BufferPool::new("test", capacity, strategy)
    }

    #[test]
    fn test_allocate_and_get() {
        let p = pool(1024, Strategy::Lru);

        let handle = p
            .allocate("a", &[16], DType::U8, AccessMode::ReadWrite)
            .unwrap();
        handle.write()[3] = 9;

        let again = p.get("a").unwrap();
        assert_eq!(again.read()[3], 9);
        assert_eq!(again.size_bytes(), 16);
    }

    #[test]
    fn test_allocate_existing_is_hit() {
        let p = pool(1024, Strategy::Lru);

        p.allocate("a", &[16], DType::U8, AccessMode::ReadWrite)
            .unwrap();
        p.allocate("a", &[16], DType::U8, AccessMode::ReadWrite)
            .unwrap();

        let snapshot = p.stats().snapshot();
        assert_eq!(snapshot.allocations, 1);
        assert_eq!(snapshot.hits, 1);
        assert_eq!(snapshot.current_size, 16);
    }

    #[test]
    fn test_zero_size_rejected() {
        let p = pool(1024, Strategy::Lru);
        assert!(p
            .allocate("a", &[0, 4], DType::U8, AccessMode::ReadWrite)
            .is_err());
        assert!(p.allocate("a", &[], DType::F32, AccessMode::ReadOnly).is_err());
        assert_eq!(p.len(), 0);
    }

    #[test]
    fn test_lru_eviction_order() {
        // Capacity 100, three 40-byte buffers: after the third insert only
        // the 2nd and 3rd remain.
        let p = pool(100, Strategy::Lru);

        p.allocate("first", &[40], DType::U8, AccessMode::ReadWrite)
            .unwrap();
        p.allocate("second", &[40], DType::U8, AccessMode::ReadWrite)
            .unwrap();
        p.allocate("third", &[40], DType::U8, AccessMode::ReadWrite)
            .unwrap();

        assert!(!p.contains("first"));
        assert!(p.contains("second"));
        assert!(p.contains("third"));
        assert_eq!(p.stats().snapshot().current_size, 80);
        assert_eq!(p.stats().snapshot().evictions, 1);
    }

    #[test]
    fn test_lru_eviction_respects_access() {
        let p = pool(100, Strategy::Lru);

        p.allocate("a", &[40], DType::U8, AccessMode::ReadWrite)
            .unwrap();
        p.allocate("b", &[40], DType::U8, AccessMode::ReadWrite)
            .unwrap();

        // Touch "a" so "b" becomes the LRU victim.
        p.get("a").unwrap();

        p.allocate("c", &[40], DType::U8, AccessMode::ReadWrite)
            .unwrap();

        assert!(p.contains("a"));
        assert!(!p.contains("b"));
        assert!(p.contains("c"));
    }

    #[test]
    fn test_lfu_eviction_order() {
        let p = pool(100, Strategy::Lfu);

        p.allocate("hot", &[40], DType::U8, AccessMode::ReadWrite)
            .unwrap();
        p.allocate("cold", &[40], DType::U8, AccessMode::ReadWrite)
            .unwrap();
        for _ in 0..5 {
            p.get("hot").unwrap();
        }

        p.allocate("new", &[40], DType::U8, AccessMode::ReadWrite)
            .unwrap();

        assert!(p.contains("hot"));
        assert!(!p.contains("cold"));
    }

    #[test]
    fn test_fifo_eviction_ignores_access() {
        let p = pool(100, Strategy::Fifo);

        p.allocate("a", &[40], DType::U8, AccessMode::ReadWrite)
            .unwrap();
        p.allocate("b", &[40], DType::U8, AccessMode::ReadWrite)
            .unwrap();

        // Re-accessing "a" must not save it under FIFO.
        for _ in 0..5 {
            p.get("a").unwrap();
        }

        p.allocate("c", &[40], DType::U8, AccessMode::ReadWrite)
            .unwrap();

        assert!(!p.contains("a"));
        assert!(p.contains("b"));
        assert!(p.contains("c"));
    }

    #[test]
    fn test_capacity_exceeded() {
        let p = pool(100, Strategy::Lru);

        p.allocate("a", &[40], DType::U8, AccessMode::ReadWrite)
            .unwrap();

        let result = p.allocate("big", &[200], DType::U8, AccessMode::ReadWrite);
        match result {
            Err(Error::CapacityExceeded {
                requested, capacity, ..
            }) => {
                assert_eq!(requested, 200);
                assert_eq!(capacity, 100);
            }
            _ => panic!("expected CapacityExceeded"),
        }
        // Failed allocation must not disturb existing entries.
        assert!(p.contains("a"));
    }

    #[test]
    fn test_put_round_trip() {
        let p = pool(1024, Strategy::Lru);
        let data: Vec<u8> = (0u8..64).collect();

        p.put("k", &data, &[64], DType::U8, AccessMode::ReadWrite)
            .unwrap();

        assert_eq!(p.get("k").unwrap().to_vec(), data);
    }

    #[test]
    fn test_put_in_place_preserves_storage() {
        let p = pool(1024, Strategy::Lru);

        p.put("k", &[1u8; 32], &[32], DType::U8, AccessMode::ReadWrite)
            .unwrap();
        let before = p.get("k").unwrap();

        p.put("k", &[2u8; 32], &[32], DType::U8, AccessMode::ReadWrite)
            .unwrap();

        // Same storage: the old handle observes the new content.
        assert_eq!(before.read()[0], 2);
        assert_eq!(p.stats().snapshot().current_size, 32);
    }

    #[test]
    fn test_put_reshape_replaces_entry() {
        let p = pool(1024, Strategy::Lru);

        p.put("k", &[1u8; 32], &[32], DType::U8, AccessMode::ReadWrite)
            .unwrap();
        p.put("k", &[2u8; 64], &[64], DType::U8, AccessMode::ReadWrite)
            .unwrap();

        let handle = p.get("k").unwrap();
        assert_eq!(handle.size_bytes(), 64);
        assert_eq!(p.stats().snapshot().current_size, 64);
    }

    #[test]
    fn test_put_length_mismatch_rejected() {
        let p = pool(1024, Strategy::Lru);
        let result = p.put("k", &[0u8; 10], &[32], DType::U8, AccessMode::ReadWrite);
        assert!(matches!(result, Err(Error::InvalidShape(_))));
    }

    #[test]
    fn test_release() {
        let p = pool(1024, Strategy::Lru);

        p.allocate("a", &[64], DType::U8, AccessMode::ReadWrite)
            .unwrap();

        assert!(p.release("a"));
        assert!(!p.release("a"));
        assert_eq!(p.stats().snapshot().current_size, 0);
    }

    #[test]
    fn test_view_aliasing() {
        let p = pool(1024, Strategy::Lru);

        p.allocate("a", &[16], DType::U8, AccessMode::ReadWrite)
            .unwrap();

        let view = p.view("a", 4..8).unwrap();
        view.write().copy_from_slice(&[9, 9, 9, 9]);

        // No hidden copy: the mutation is visible through get().
        let handle = p.get("a").unwrap();
        assert_eq!(&handle.read()[4..8], &[9, 9, 9, 9]);
    }

    #[test]
    fn test_view_missing_or_out_of_bounds() {
        let p = pool(1024, Strategy::Lru);
        p.allocate("a", &[16], DType::U8, AccessMode::ReadWrite)
            .unwrap();

        assert!(p.view("missing", 0..4).is_none());
        assert!(p.view("a", 8..32).is_none());
    }

    #[test]
    fn test_copy_full() {
        let p = pool(1024, Strategy::Lru);
        let data: Vec<u8> = (0u8..32).collect();

        p.put("src", &data, &[32], DType::U8, AccessMode::ReadWrite)
            .unwrap();
        p.copy("src", "dst", None).unwrap();

        assert_eq!(p.get("dst").unwrap().to_vec(), data);
        assert_eq!(p.stats().snapshot().current_size, 64);
    }

    #[test]
    fn test_copy_region() {
        let p = pool(1024, Strategy::Lru);
        let data: Vec<u8> = (0u8..32).collect();

        p.put("src", &data, &[32], DType::U8, AccessMode::ReadWrite)
            .unwrap();
        p.copy("src", "dst", Some(8..12)).unwrap();

        let dst = p.get("dst").unwrap();
        assert_eq!(dst.to_vec(), vec![8, 9, 10, 11]);
        assert_eq!(dst.shape(), &[4]);
    }

    #[test]
    fn test_copy_into_existing_same_size_is_in_place() {
        let p = pool(1024, Strategy::Lru);

        p.put("src", &[7u8; 16], &[16], DType::U8, AccessMode::ReadWrite)
            .unwrap();
        p.put("dst", &[0u8; 16], &[16], DType::U8, AccessMode::ReadWrite)
            .unwrap();
        let dst_before = p.get("dst").unwrap();

        p.copy("src", "dst", None).unwrap();

        // Existing storage was reused.
        assert_eq!(dst_before.read()[0], 7);
    }

    #[test]
    fn test_copy_region_overflow_is_invalid_shape() {
        let p = pool(1024, Strategy::Lru);
        p.allocate("src", &[8], DType::F32, AccessMode::ReadWrite)
            .unwrap();

        // Element range whose byte offset wraps usize.
        let start = usize::MAX / 4 + 1;
        assert!(matches!(
            p.copy("src", "dst", Some(start..start + 1)),
            Err(Error::InvalidShape(_))
        ));
        assert!(!p.contains("dst"));
    }

    #[test]
    fn test_payload_guard_does_not_block_pool_operations() {
        use std::sync::mpsc;
        use std::thread;
        use std::time::Duration;

        let p = Arc::new(pool(1024, Strategy::Lru));
        p.put("k", &[1u8; 32], &[32], DType::U8, AccessMode::ReadWrite)
            .unwrap();

        let handle = p.get("k").unwrap();
        let guard = handle.read();

        let (tx, rx) = mpsc::channel();
        let writer = {
            let p = Arc::clone(&p);
            thread::spawn(move || {
                // Blocks on the payload lock until the guard drops, but
                // must not hold the entry table hostage while waiting.
                p.put("k", &[2u8; 32], &[32], DType::U8, AccessMode::ReadWrite)
                    .unwrap();
                tx.send(()).unwrap();
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(p.contains("k"));
        assert!(p.get("missing").is_none());

        drop(guard);
        rx.recv_timeout(Duration::from_secs(3)).unwrap();
        writer.join().unwrap();
        assert_eq!(p.get("k").unwrap().read()[0], 2);
    }

    #[test]
    fn test_copy_missing_source() {
        let p = pool(1024, Strategy::Lru);
        assert!(matches!(
            p.copy("nope", "dst", None),
            Err(Error::BufferNotFound(_))
        ));
    }

    #[test]
    fn test_clear() {
        let p = pool(1024, Strategy::Lru);

        p.allocate("a", &[64], DType::U8, AccessMode::ReadWrite)
            .unwrap();
        p.allocate("b", &[64], DType::U8, AccessMode::ReadWrite)
            .unwrap();

        p.clear();

        assert!(p.is_empty());
        assert_eq!(p.stats().snapshot().current_size, 0);
    }

    #[test]
    fn test_concurrent_allocations() {
        use std::thread;

        let p = Arc::new(pool(1024 * 1024, Strategy::Lru));
        let mut handles = vec![];

        for t in 0..8 {
            let p = Arc::clone(&p);
            handles.push(thread::spawn(move || {
                for i in 0..50 {
                    let key = format!("t{}_{}", t, i);
                    p.allocate(&key, &[128], DType::U8, AccessMode::ReadWrite)
                        .unwrap();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(p.len(), 400);
        assert_eq!(p.stats().snapshot().current_size, 400 * 128);
    }

    proptest! {
        /// Capacity invariant: after any sequence of allocate/put/release
        /// the pool never exceeds its capacity and the accounted size
        /// matches the entry sum.
        #[test]
        fn prop_capacity_invariant(ops in proptest::collection::vec((0u8..3, 0usize..8, 1usize..96), 1..64)) {
            let p = pool(256, Strategy::Adaptive);

            for (op, key_idx, len) in ops {
                let key = format!("k{}", key_idx);
                match op {
                    0 => { let _ = p.allocate(&key, &[len], DType::U8, AccessMode::ReadWrite); }
                    1 => { let _ = p.put(&key, &vec![0u8; len], &[len], DType::U8, AccessMode::ReadWrite); }
                    _ => { p.release(&key); }
                }

                let snapshot = p.stats().snapshot();
                prop_assert!(snapshot.current_size <= 256);

                let entry_sum: u64 = p
                    .keys()
                    .iter()
                    .filter_map(|k| p.get(k).map(|h| h.size_bytes()))
                    .sum();
                prop_assert_eq!(snapshot.current_size, entry_sum);
            }
        }
    }
}
