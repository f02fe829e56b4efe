//! framepool - A zero-copy buffer and pipeline engine with
//! runtime-swappable eviction policies.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           framepool                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │            Pipeline Layer (pipeline/)                    │   │
//! │  │     Pipeline → Stages → StreamingPipeline                │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │          Fallback Layer (fallback/)                      │   │
//! │  │   FallbackEngine: zero-copy ←─pressure─→ full-copy       │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │       Buffer Pools (buffer/)  [Runtime Swappable]       │   │
//! │  │   ┌─────────────────────────────────────────────────┐   │   │
//! │  │   │  Eviction Strategies: FIFO | LRU | LFU | Adaptive│  │   │
//! │  │   └─────────────────────────────────────────────────┘   │   │
//! │  │   BufferManager + BufferPool + Handles + Statistics      │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │           Mapping Layer (mmap/)                          │   │
//! │  │    MappingCache + zero-copy frame extraction             │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (DType, BufferType, Error, config)
//! - [`buffer`] - Typed buffer pools, handles and eviction strategies
//! - [`mmap`] - Memory-mapped file cache and frame extraction
//! - [`fallback`] - Runtime-adaptive zero-copy / full-copy routing
//! - [`pipeline`] - Batch and streaming stage pipelines
//!
//! # Quick Start
//! ```
//! use framepool::{AccessMode, BufferPool, DType, Strategy};
//!
//! let pool = BufferPool::new("frames", 64 * 1024, Strategy::Lru);
//! let frame = pool
//!     .allocate("frame_0", &[8, 8, 3], DType::U8, AccessMode::ReadWrite)
//!     .unwrap();
//! frame.write()[0] = 255;
//!
//! // Views alias the same storage: no hidden copies.
//! let view = pool.view("frame_0", 0..3).unwrap();
//! assert_eq!(view.read()[0], 255);
//! ```

pub mod buffer;
pub mod common;
pub mod fallback;
pub mod mmap;
pub mod pipeline;

// Re-export commonly used items at crate root for convenience
pub use common::{BufferType, DType, EngineConfig, Error, Result};

pub use buffer::{
    AccessMode, BufferHandle, BufferManager, BufferPool, BufferView, PoolStats, StatsSnapshot,
    Strategy,
};
pub use fallback::{FallbackEngine, FallbackStatus, ProcessingMode};
pub use mmap::{MapMode, MappingCache};
pub use pipeline::{Pipeline, StageOutput, StreamingPipeline};
