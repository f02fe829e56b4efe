//! Buffer pools and the typed pool manager.
//!
//! # Components
//! - [`BufferPool`] - A capacity-bounded, strategy-evicted buffer collection
//! - [`BufferManager`] - One pool per [`crate::BufferType`], plus temp files
//! - [`BufferHandle`] / [`BufferView`] - Shared references into pool payloads
//! - [`Strategy`] - Pluggable eviction ordering
//! - [`PoolStats`] - Atomic per-pool statistics

mod handle;
mod manager;
mod pool;
mod stats;
mod strategy;

pub use handle::{BufferHandle, BufferView};
pub use manager::BufferManager;
pub use pool::{AccessMode, BufferPool};
pub use stats::{PoolStats, StatsSnapshot};
pub use strategy::Strategy;
