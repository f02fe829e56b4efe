//! Engine configuration.
//!
//! All tunables live in one [`EngineConfig`] constructed once at process
//! start and passed by reference to every component. There is no global
//! mutable state anywhere in the engine.

use std::path::PathBuf;
use std::time::Duration;

use crate::buffer::Strategy;
use crate::common::BufferType;

/// Default capacity of the Normal pool (256MB).
///
/// Sized for typical full-resolution intermediate results. The Stream and
/// Pipeline pools are smaller because their entries are short-lived.
pub const DEFAULT_NORMAL_CAPACITY: u64 = 256 * 1024 * 1024;

/// Default capacity of the Stream pool (128MB).
pub const DEFAULT_STREAM_CAPACITY: u64 = 128 * 1024 * 1024;

/// Default capacity of the Pipeline pool (128MB).
pub const DEFAULT_PIPELINE_CAPACITY: u64 = 128 * 1024 * 1024;

/// Default capacity of the Shared pool (256MB).
pub const DEFAULT_SHARED_CAPACITY: u64 = 256 * 1024 * 1024;

/// Default capacity of the Temporary pool (64MB).
pub const DEFAULT_TEMPORARY_CAPACITY: u64 = 64 * 1024 * 1024;

/// Maximum number of read-only file mappings kept in the mapping cache.
pub const DEFAULT_MAX_CACHED_MAPS: usize = 10;

/// Payload size above which the auto mode always prefers zero-copy.
/// Copying a payload this large would double its memory footprint.
pub const DEFAULT_LARGE_PAYLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// Memory usage ratio above which the fallback engine stops choosing the
/// zero-copy path in auto mode.
pub const DEFAULT_FALLBACK_THRESHOLD: f64 = 0.9;

/// Memory usage ratio above which zero-copy is refused unconditionally.
/// Adding mapping overhead under extreme pressure makes things worse.
pub const HARD_PRESSURE_RATIO: f64 = 0.95;

/// Minimum wall time between fallback status reconciliations.
pub const STATUS_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// Configuration for the buffer manager, mapping cache and fallback engine.
///
/// # Example
/// ```
/// use framepool::EngineConfig;
///
/// let config = EngineConfig {
///     max_cached_maps: 4,
///     ..EngineConfig::default()
/// };
/// assert_eq!(config.max_cached_maps, 4);
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Capacity in bytes of the Normal pool.
    pub normal_capacity: u64,
    /// Capacity in bytes of the Stream pool.
    pub stream_capacity: u64,
    /// Capacity in bytes of the Pipeline pool.
    pub pipeline_capacity: u64,
    /// Capacity in bytes of the Shared pool.
    pub shared_capacity: u64,
    /// Capacity in bytes of the Temporary pool.
    pub temporary_capacity: u64,
    /// Eviction strategy applied by every pool.
    pub strategy: Strategy,
    /// Maximum number of cached read-only mappings.
    pub max_cached_maps: usize,
    /// Directory for temporary buffer files.
    pub scratch_dir: PathBuf,
    /// Memory usage ratio above which auto mode falls back to copying.
    pub fallback_threshold: f64,
    /// Memory usage ratio above which zero-copy is refused outright.
    pub hard_pressure_ratio: f64,
    /// Payload size above which zero-copy is always preferred.
    pub large_payload_bytes: u64,
    /// Throttle interval for fallback status reconciliation.
    pub status_refresh_interval: Duration,
}

impl EngineConfig {
    /// Capacity of the pool backing the given buffer type.
    pub fn pool_capacity(&self, buffer_type: BufferType) -> u64 {
        match buffer_type {
            BufferType::Normal => self.normal_capacity,
            BufferType::Stream => self.stream_capacity,
            BufferType::Pipeline => self.pipeline_capacity,
            BufferType::Shared => self.shared_capacity,
            BufferType::Temporary => self.temporary_capacity,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            normal_capacity: DEFAULT_NORMAL_CAPACITY,
            stream_capacity: DEFAULT_STREAM_CAPACITY,
            pipeline_capacity: DEFAULT_PIPELINE_CAPACITY,
            shared_capacity: DEFAULT_SHARED_CAPACITY,
            temporary_capacity: DEFAULT_TEMPORARY_CAPACITY,
            strategy: Strategy::Lru,
            max_cached_maps: DEFAULT_MAX_CACHED_MAPS,
            scratch_dir: std::env::temp_dir().join("framepool"),
            fallback_threshold: DEFAULT_FALLBACK_THRESHOLD,
            hard_pressure_ratio: HARD_PRESSURE_RATIO,
            large_payload_bytes: DEFAULT_LARGE_PAYLOAD_BYTES,
            status_refresh_interval: STATUS_REFRESH_INTERVAL,
        }
    }
}
