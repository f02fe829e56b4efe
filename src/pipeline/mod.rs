//! Batch and streaming pipelines.
//!
//! # Components
//! - [`Pipeline`] - Ordered stage sequence with fold-through execution
//! - [`StreamingPipeline`] / [`ProcessStream`] - Lazy chunk-at-a-time runs
//! - [`Stage`] / [`stage`] helpers - Map, filter and fallible transforms
//! - [`PipelineContext`] - Per-execution timing and progress
//! - [`PipelineStats`] - Lifetime counters

mod batch;
mod context;
pub mod stage;
mod stats;
mod streaming;

pub use batch::{ErrorHandler, Pipeline};
pub use context::PipelineContext;
pub use stage::{FnStage, Stage, StageOutput};
pub use stats::{PipelineStats, PipelineStatsSnapshot};
pub use streaming::{ProcessStream, StreamingPipeline};
