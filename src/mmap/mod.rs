//! Memory-mapped file access.
//!
//! # Components
//! - [`MappingCache`] - LRU-bounded cache of shared read-only mappings
//! - [`MappedHandle`] - A shared or exclusive mapping
//! - [`FrameSource`] / [`map_video_frames`] - Zero-copy frame extraction

mod cache;
mod frames;

pub use cache::{MapMode, MappedHandle, MappingCache};
pub use frames::{
    map_video_frames, FrameBytes, FrameLayout, FrameMapStatus, FrameMapping, FrameSource,
};
