//! Runtime-adaptive zero-copy fallback.
//!
//! # Components
//! - [`FallbackEngine`] - Per-operation zero-copy / full-copy routing
//! - [`FallbackProcessor`] / [`FnProcessor`] - Dual-path implementations
//! - [`MemoryProbe`] - Injected memory pressure source
//! - [`FallbackStatus`] - Observable degradation state

mod engine;
mod probe;
mod status;

pub use engine::{FallbackEngine, FallbackProcessor, FallbackSignal, FnProcessor, ProcessingMode};
pub use probe::{detect_zero_copy, FixedMemoryProbe, MemoryProbe, SystemMemoryProbe};
pub use status::FallbackStatus;
