//! Refcounted memory-mapped file cache.
//!
//! Read-only mappings are cached by canonical path and shared via
//! `Arc<Mmap>`: mapping the same file twice returns clones of one mapping.
//! The cache holds at most `max_cached` entries; inserting past the bound
//! evicts the least recently used mapping. Eviction only drops the
//! cache's own reference, so callers still holding an `Arc` keep their
//! mapping valid.
//!
//! Writable mappings are never cached: each request produces a fresh
//! exclusive `MmapMut`.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info};
use memmap2::{Mmap, MmapMut};
use parking_lot::Mutex;

use crate::common::{Error, Result};

/// Requested access for a file mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapMode {
    /// Shared, cacheable mapping.
    ReadOnly,
    /// Exclusive, uncached mapping.
    ReadWrite,
}

/// A mapping handed out by [`MappingCache::map_file`].
pub enum MappedHandle {
    /// Cached read-only mapping, shared with the cache and other callers.
    Shared(Arc<Mmap>),
    /// Fresh writable mapping owned by the caller.
    Exclusive(MmapMut),
}

impl MappedHandle {
    /// The mapped bytes.
    pub fn as_slice(&self) -> &[u8] {
        match self {
            MappedHandle::Shared(map) => map,
            MappedHandle::Exclusive(map) => map,
        }
    }

    /// Mapped length in bytes.
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Whether the mapping is empty.
    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    /// Mutable bytes, available only for exclusive mappings.
    pub fn as_mut_slice(&mut self) -> Option<&mut [u8]> {
        match self {
            MappedHandle::Shared(_) => None,
            MappedHandle::Exclusive(map) => Some(&mut map[..]),
        }
    }
}

struct CacheEntry {
    map: Arc<Mmap>,
    last_access: Instant,
    access_count: u64,
    size_bytes: u64,
}

/// LRU-bounded cache of read-only file mappings.
pub struct MappingCache {
    max_cached: usize,
    entries: Mutex<HashMap<PathBuf, CacheEntry>>,
}

impl MappingCache {
    /// Create a cache holding at most `max_cached` read-only mappings.
    pub fn new(max_cached: usize) -> Self {
        Self {
            max_cached: max_cached.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Map `path`, serving read-only requests from the cache when possible.
    ///
    /// # Errors
    /// [`Error::Mapping`] if the file cannot be opened or mapped.
    pub fn map_file(&self, path: impl Into<PathBuf>, mode: MapMode) -> Result<MappedHandle> {
        let path = path.into();
        match mode {
            MapMode::ReadOnly => self.map_shared(path),
            MapMode::ReadWrite => self.map_exclusive(path),
        }
    }

    fn map_shared(&self, path: PathBuf) -> Result<MappedHandle> {
        let mut entries = self.entries.lock();

        if let Some(entry) = entries.get_mut(&path) {
            entry.last_access = Instant::now();
            entry.access_count += 1;
            debug!("mapping cache hit: {}", path.display());
            return Ok(MappedHandle::Shared(Arc::clone(&entry.map)));
        }

        let file = OpenOptions::new()
            .read(true)
            .open(&path)
            .map_err(|e| Error::Mapping {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        // SAFETY: mapped files are treated as immutable for the lifetime of
        // the mapping; the engine never writes to a file it maps read-only.
        let map = unsafe {
            Mmap::map(&file).map_err(|e| Error::Mapping {
                path: path.clone(),
                reason: e.to_string(),
            })?
        };
        let map = Arc::new(map);

        if entries.len() >= self.max_cached {
            self.evict_lru(&mut entries);
        }

        entries.insert(
            path.clone(),
            CacheEntry {
                map: Arc::clone(&map),
                last_access: Instant::now(),
                access_count: 1,
                size_bytes: map.len() as u64,
            },
        );
        debug!("mapped {} ({} bytes)", path.display(), map.len());
        Ok(MappedHandle::Shared(map))
    }

    fn map_exclusive(&self, path: PathBuf) -> Result<MappedHandle> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| Error::Mapping {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        // SAFETY: the writable mapping is exclusive to the returned handle;
        // the underlying file is not mapped elsewhere by this cache.
        let map = unsafe {
            MmapMut::map_mut(&file).map_err(|e| Error::Mapping {
                path: path.clone(),
                reason: e.to_string(),
            })?
        };
        debug!("mapped {} writable ({} bytes)", path.display(), map.len());
        Ok(MappedHandle::Exclusive(map))
    }

    fn evict_lru(&self, entries: &mut HashMap<PathBuf, CacheEntry>) {
        let victim = entries
            .iter()
            .min_by_key(|(_, e)| e.last_access)
            .map(|(p, _)| p.clone());
        if let Some(path) = victim {
            if let Some(entry) = entries.remove(&path) {
                debug!(
                    "mapping cache evicted {} ({} bytes, {} accesses)",
                    path.display(),
                    entry.size_bytes,
                    entry.access_count
                );
            }
        }
    }

    /// Drop the cached mapping for `path`. Returns whether one was cached.
    ///
    /// Outstanding `Arc` holders keep their mapping alive; the backing
    /// region is unmapped once the last reference drops.
    pub fn unmap(&self, path: impl AsRef<Path>) -> bool {
        self.entries.lock().remove(path.as_ref()).is_some()
    }

    /// Drop every cached mapping.
    pub fn clear_all(&self) {
        let mut entries = self.entries.lock();
        let count = entries.len();
        entries.clear();
        if count > 0 {
            info!("mapping cache cleared {} entries", count);
        }
    }

    /// Number of cached read-only mappings.
    pub fn cached_count(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether a read-only mapping for `path` is cached.
    pub fn is_cached(&self, path: impl AsRef<Path>) -> bool {
        self.entries.lock().contains_key(path.as_ref())
    }
}

impl Drop for MappingCache {
    fn drop(&mut self) {
        self.clear_all();
    }
}
