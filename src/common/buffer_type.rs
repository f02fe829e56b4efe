//! Buffer type namespace.

use std::fmt;

/// The five disjoint pool namespaces managed by the buffer manager.
///
/// A logical key `k` is stored as `"<type>:<k>"` inside its pool, which
/// keeps keys unique across pools and lets the manager-level `get` probe
/// the Normal and Shared pools on a miss without key collisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferType {
    /// General-purpose allocations.
    Normal,
    /// Frame sequences consumed by streaming pipelines.
    Stream,
    /// Intermediate results owned by a pipeline execution.
    Pipeline,
    /// Results shared across processing stages.
    Shared,
    /// File-backed scratch buffers, deleted on release.
    Temporary,
}

impl BufferType {
    /// All buffer types, in pool index order.
    pub const ALL: [BufferType; 5] = [
        BufferType::Normal,
        BufferType::Stream,
        BufferType::Pipeline,
        BufferType::Shared,
        BufferType::Temporary,
    ];

    /// Short lowercase name used as the key prefix.
    pub const fn as_str(self) -> &'static str {
        match self {
            BufferType::Normal => "normal",
            BufferType::Stream => "stream",
            BufferType::Pipeline => "pipeline",
            BufferType::Shared => "shared",
            BufferType::Temporary => "temporary",
        }
    }

    /// Index of this type's pool in the manager's pool array.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            BufferType::Normal => 0,
            BufferType::Stream => 1,
            BufferType::Pipeline => 2,
            BufferType::Shared => 3,
            BufferType::Temporary => 4,
        }
    }

    /// Qualified key as stored inside the pool: `"<type>:<key>"`.
    pub fn qualify(self, key: &str) -> String {
        format!("{}:{}", self.as_str(), key)
    }
}

impl fmt::Display for BufferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
