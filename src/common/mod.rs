//! Common types and utilities shared across framepool.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Engine configuration
//! - Error types
//! - Element types and shape arithmetic
//! - The buffer type namespace

mod buffer_type;
pub mod config;
pub mod dtype;
pub mod error;

pub use buffer_type::BufferType;
pub use config::EngineConfig;
pub use dtype::DType;
pub use error::{Error, Result};
