//! Error types for framepool.

use std::path::PathBuf;

use thiserror::Error;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
/// This is a common Rust pattern (see `std::io::Result`).
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in framepool.
///
/// By having a single error type, error handling stays consistent across
/// every component. The taxonomy follows the recovery policy:
/// - [`Error::ZeroCopyUnavailable`] is recoverable and retried exactly once
///   via the traditional path inside the fallback engine.
/// - Everything else propagates to the immediate caller with context.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from file or mapping operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A pool could not free enough space even after considering every
    /// other entry. Fatal to the requesting call, never retried.
    #[error("pool '{pool}' cannot free {requested} bytes within capacity {capacity}")]
    CapacityExceeded {
        pool: String,
        requested: u64,
        capacity: u64,
    },

    /// A shape/dtype combination with zero or negative size was requested.
    /// Caller error, rejected before touching any pool.
    #[error("invalid shape: {0}")]
    InvalidShape(String),

    /// Lookup of a buffer key that is required to exist failed.
    #[error("buffer '{0}' not found")]
    BufferNotFound(String),

    /// The zero-copy path could not run. Recoverable: the fallback engine
    /// handles this by switching to the traditional implementation.
    #[error("zero-copy path unavailable: {0}")]
    ZeroCopyUnavailable(String),

    /// Filesystem/permission/layout failure while mapping a file.
    /// Propagated to the mapping caller, never silently swallowed outside
    /// the best-effort frame-mapping path.
    #[error("mapping '{path}' failed: {reason}")]
    Mapping { path: PathBuf, reason: String },

    /// Generic stage/operation failure, carrying the operation name, the
    /// mode that was attempted and the original cause.
    #[error("operation '{operation}' failed ({mode}): {message}")]
    Processing {
        operation: String,
        mode: String,
        message: String,
    },
}
