//! Buffer manager - one pool per buffer type, plus temporary file-backed
//! buffers and a shared mapping cache.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       BufferManager                         │
//! │  ┌─────────┬─────────┬──────────┬─────────┬────────────┐    │
//! │  │ Normal  │ Stream  │ Pipeline │ Shared  │ Temporary  │    │
//! │  │ (pool)  │ (pool)  │ (pool)   │ (pool)  │ (pool,mmap)│    │
//! │  └─────────┴─────────┴──────────┴─────────┴────────────┘    │
//! │  ┌──────────────────┐  ┌─────────────────────────────────┐  │
//! │  │  MappingCache    │  │ temp_files: key → scratch path  │  │
//! │  └──────────────────┘  └─────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Pool operations never take two pool locks at once; lookups that probe
//! several pools do so sequentially.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::ops::Range;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};
use memmap2::MmapMut;
use parking_lot::Mutex;

use crate::buffer::handle::{BufferHandle, BufferView};
use crate::buffer::pool::{AccessMode, BufferPool};
use crate::buffer::stats::StatsSnapshot;
use crate::common::{BufferType, DType, EngineConfig, Error, Result};
use crate::mmap::{MapMode, MappedHandle, MappingCache};

/// Disambiguates temp files created within the same millisecond.
static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Central entry point for buffer allocation across typed pools.
pub struct BufferManager {
    config: EngineConfig,

    /// Pools indexed by [`BufferType::index`].
    pools: [BufferPool; BufferType::ALL.len()],

    /// Refcounted file mapping cache.
    mapping_cache: MappingCache,

    /// Scratch file backing each live temporary buffer, by key.
    temp_files: Mutex<HashMap<String, PathBuf>>,
}

impl BufferManager {
    /// Build the manager and its scratch directory from `config`.
    ///
    /// # Errors
    /// Fails if the scratch directory cannot be created.
    pub fn new(config: EngineConfig) -> Result<Self> {
        fs::create_dir_all(&config.scratch_dir)?;

        let pools = BufferType::ALL.map(|ty| {
            BufferPool::new(ty.as_str(), config.pool_capacity(ty), config.strategy)
        });
        let mapping_cache = MappingCache::new(config.max_cached_maps);

        info!(
            "buffer manager ready (scratch: {}, strategy: {})",
            config.scratch_dir.display(),
            config.strategy.as_str()
        );
        Ok(Self {
            config,
            pools,
            mapping_cache,
            temp_files: Mutex::new(HashMap::new()),
        })
    }

    /// Build with the default configuration.
    pub fn with_defaults() -> Result<Self> {
        Self::new(EngineConfig::default())
    }

    fn pool(&self, ty: BufferType) -> &BufferPool {
        &self.pools[ty.index()]
    }

    // Logical keys are stored qualified ("<type>:<key>") so manager-level
    // lookups can tell which namespace a pooled entry belongs to.

    // ========================================================================
    // Pool delegation
    // ========================================================================

    /// Allocate (or fetch) a buffer in the pool for `ty`.
    pub fn allocate(
        &self,
        ty: BufferType,
        key: &str,
        shape: &[usize],
        dtype: DType,
        mode: AccessMode,
    ) -> Result<BufferHandle> {
        self.pool(ty).allocate(&ty.qualify(key), shape, dtype, mode)
    }

    /// Look up `key`, probing the requested pool first and falling back to
    /// the Normal and Shared pools for cross-type lookups.
    pub fn get(&self, ty: BufferType, key: &str) -> Option<BufferHandle> {
        if let Some(handle) = self.pool(ty).get(&ty.qualify(key)) {
            return Some(handle);
        }
        for fallback in [BufferType::Normal, BufferType::Shared] {
            if fallback != ty {
                if let Some(handle) = self.pool(fallback).get(&fallback.qualify(key)) {
                    debug!(
                        "'{}' not in {} pool, found in {} pool",
                        key, ty, fallback
                    );
                    return Some(handle);
                }
            }
        }
        None
    }

    /// Upsert `data` under `key` in the pool for `ty`.
    pub fn put(
        &self,
        ty: BufferType,
        key: &str,
        data: &[u8],
        shape: &[usize],
        dtype: DType,
        mode: AccessMode,
    ) -> Result<()> {
        self.pool(ty).put(&ty.qualify(key), data, shape, dtype, mode)
    }

    /// Release `key` from the pool for `ty`. Temporary buffers also have
    /// their scratch file removed.
    pub fn release(&self, ty: BufferType, key: &str) -> bool {
        let released = self.pool(ty).release(&ty.qualify(key));
        if released && ty == BufferType::Temporary {
            self.remove_temp_file(key);
        }
        released
    }

    /// Zero-copy element view into a buffer of `ty`.
    pub fn view(&self, ty: BufferType, key: &str, elements: Range<usize>) -> Option<BufferView> {
        self.pool(ty).view(&ty.qualify(key), elements)
    }

    /// Copy between keys within the pool for `ty`.
    pub fn copy(
        &self,
        ty: BufferType,
        src_key: &str,
        dst_key: &str,
        region: Option<Range<usize>>,
    ) -> Result<()> {
        self.pool(ty)
            .copy(&ty.qualify(src_key), &ty.qualify(dst_key), region)
    }

    // ========================================================================
    // Specialized allocation
    // ========================================================================

    /// Allocate a frame sequence buffer of shape `[frames, h, w, channels]`
    /// in the Stream pool.
    pub fn create_stream_buffer(
        &self,
        key: &str,
        frames: usize,
        height: usize,
        width: usize,
        channels: usize,
        dtype: DType,
    ) -> Result<BufferHandle> {
        self.pool(BufferType::Stream).allocate(
            &BufferType::Stream.qualify(key),
            &[frames, height, width, channels],
            dtype,
            AccessMode::ReadWrite,
        )
    }

    /// Allocate a file-backed buffer in the Temporary pool.
    ///
    /// The payload lives in a memory-mapped scratch file named
    /// `temp_<timestamp_ms>_<pid>_<seq>.buffer`, so it never occupies
    /// anonymous heap memory. The file is deleted when the buffer is
    /// released or the pool is cleared.
    ///
    /// Returns the generated key along with the handle.
    pub fn create_temp_buffer(
        &self,
        shape: &[usize],
        dtype: DType,
    ) -> Result<(String, BufferHandle)> {
        let size = crate::common::dtype::byte_size(shape, dtype)?;

        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let key = format!("temp_{}_{}_{}", timestamp_ms, process::id(), seq);
        let path = self.config.scratch_dir.join(format!("{}.buffer", key));

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;
        file.set_len(size as u64)?;

        // SAFETY: the file was just created by us, is held open for the
        // lifetime of the map, and is only mutated through this mapping.
        let map = unsafe {
            MmapMut::map_mut(&file).map_err(|e| Error::Mapping {
                path: path.clone(),
                reason: e.to_string(),
            })?
        };

        let handle = match self
            .pool(BufferType::Temporary)
            .insert_mapped(&BufferType::Temporary.qualify(&key), map, shape, dtype)
        {
            Ok(handle) => handle,
            Err(e) => {
                let _ = fs::remove_file(&path);
                return Err(e);
            }
        };

        self.temp_files.lock().insert(key.clone(), path);
        debug!("created temp buffer '{}' ({} bytes)", key, size);
        Ok((key, handle))
    }

    // ========================================================================
    // File mappings
    // ========================================================================

    /// Map a file through the shared mapping cache.
    pub fn map_file(&self, path: impl Into<PathBuf>, mode: MapMode) -> Result<MappedHandle> {
        self.mapping_cache.map_file(path, mode)
    }

    /// Drop a cached read-only mapping. Returns whether it was cached.
    pub fn unmap(&self, path: impl AsRef<std::path::Path>) -> bool {
        self.mapping_cache.unmap(path)
    }

    /// The shared mapping cache.
    pub fn mapping_cache(&self) -> &MappingCache {
        &self.mapping_cache
    }

    // ========================================================================
    // Maintenance and stats
    // ========================================================================

    /// Snapshot statistics for one pool, or every pool.
    pub fn get_buffer_stats(&self, ty: Option<BufferType>) -> Vec<(BufferType, StatsSnapshot)> {
        match ty {
            Some(ty) => vec![(ty, self.pool(ty).stats().snapshot())],
            None => BufferType::ALL
                .iter()
                .map(|&ty| (ty, self.pool(ty).stats().snapshot()))
                .collect(),
        }
    }

    /// Clear one pool, or every pool. Temporary scratch files are removed
    /// from disk alongside their entries.
    pub fn clear(&self, ty: Option<BufferType>) {
        let targets: &[BufferType] = match ty {
            Some(ref t) => std::slice::from_ref(t),
            None => &BufferType::ALL,
        };
        for &target in targets {
            self.pool(target).clear();
            if target == BufferType::Temporary {
                self.remove_all_temp_files();
            }
        }
    }

    /// Whether `key` exists in the pool for `ty` (no metadata update).
    pub fn contains(&self, ty: BufferType, key: &str) -> bool {
        self.pool(ty).contains(&ty.qualify(key))
    }

    /// Number of entries in the pool for `ty`.
    pub fn len(&self, ty: BufferType) -> usize {
        self.pool(ty).len()
    }

    /// Engine configuration this manager was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn remove_temp_file(&self, key: &str) {
        if let Some(path) = self.temp_files.lock().remove(key) {
            if let Err(e) = fs::remove_file(&path) {
                warn!("failed to remove temp file {}: {}", path.display(), e);
            }
        }
    }

    fn remove_all_temp_files(&self) {
        let paths: Vec<PathBuf> = self.temp_files.lock().drain().map(|(_, p)| p).collect();
        for path in paths {
            if let Err(e) = fs::remove_file(&path) {
                warn!("failed to remove temp file {}: {}", path.display(), e);
            }
        }
    }
}

impl Drop for BufferManager {
    fn drop(&mut self) {
        self.clear(None);
        self.mapping_cache.clear_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager() -> (TempDir, BufferManager) {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig {
            scratch_dir: dir.path().join("scratch"),
            ..EngineConfig::default()
        };
        (dir, BufferManager::new(config).unwrap())
    }

    #[test]
    fn test_pools_are_isolated() {
        let (_dir, m) = manager();

        m.allocate(BufferType::Normal, "k", &[16], DType::U8, AccessMode::ReadWrite)
            .unwrap();
        m.allocate(BufferType::Pipeline, "k", &[32], DType::U8, AccessMode::ReadWrite)
            .unwrap();

        assert_eq!(m.get(BufferType::Normal, "k").unwrap().size_bytes(), 16);
        assert_eq!(m.get(BufferType::Pipeline, "k").unwrap().size_bytes(), 32);
        assert!(m.contains(BufferType::Normal, "k"));
        assert!(!m.contains(BufferType::Stream, "k"));
        assert_eq!(m.len(BufferType::Normal), 1);
    }

    #[test]
    fn test_get_falls_back_to_shared() {
        let (_dir, m) = manager();

        m.allocate(BufferType::Shared, "model", &[16], DType::F32, AccessMode::ReadOnly)
            .unwrap();

        // Lookup against the Stream pool still finds the shared buffer.
        let handle = m.get(BufferType::Stream, "model").unwrap();
        assert_eq!(handle.dtype(), DType::F32);
    }

    #[test]
    fn test_create_stream_buffer_shape() {
        let (_dir, m) = manager();

        let handle = m
            .create_stream_buffer("clip", 4, 8, 8, 3, DType::U8)
            .unwrap();

        assert_eq!(handle.shape(), &[4, 8, 8, 3]);
        assert_eq!(handle.size_bytes(), 4 * 8 * 8 * 3);
    }

    #[test]
    fn test_temp_buffer_is_file_backed() {
        let (_dir, m) = manager();

        let (key, handle) = m.create_temp_buffer(&[256], DType::U8).unwrap();
        handle.write()[0] = 42;

        let path = m.config().scratch_dir.join(format!("{}.buffer", key));
        assert!(path.exists());
        assert_eq!(path.metadata().unwrap().len(), 256);

        assert!(m.release(BufferType::Temporary, &key));
        assert!(!path.exists());
    }

    #[test]
    fn test_clear_temporary_removes_files() {
        let (_dir, m) = manager();

        let (key_a, _) = m.create_temp_buffer(&[64], DType::U8).unwrap();
        let (key_b, _) = m.create_temp_buffer(&[64], DType::U8).unwrap();
        assert_ne!(key_a, key_b);

        m.clear(Some(BufferType::Temporary));

        let scratch = &m.config().scratch_dir;
        assert_eq!(fs::read_dir(scratch).unwrap().count(), 0);
    }

    #[test]
    fn test_stats_cover_all_pools() {
        let (_dir, m) = manager();

        m.allocate(BufferType::Normal, "a", &[16], DType::U8, AccessMode::ReadWrite)
            .unwrap();

        let all = m.get_buffer_stats(None);
        assert_eq!(all.len(), BufferType::ALL.len());

        let normal = m.get_buffer_stats(Some(BufferType::Normal));
        assert_eq!(normal.len(), 1);
        assert_eq!(normal[0].1.allocations, 1);
    }
}
