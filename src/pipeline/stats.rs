//! Pipeline execution statistics.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifetime counters for one pipeline. All atomic; shared freely.
#[derive(Debug, Default)]
pub struct PipelineStats {
    /// Executions started.
    pub executions: AtomicU64,
    /// Executions that ran every stage to completion.
    pub completions: AtomicU64,
    /// Executions that ended in an unrecovered error.
    pub failures: AtomicU64,
    /// Executions short-circuited by a skipping stage.
    pub skips: AtomicU64,
    /// Individual stage invocations that produced a value.
    pub stages_run: AtomicU64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Consistent point-in-time copy of the counters.
    pub fn snapshot(&self) -> PipelineStatsSnapshot {
        PipelineStatsSnapshot {
            executions: self.executions.load(Ordering::Relaxed),
            completions: self.completions.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            skips: self.skips.load(Ordering::Relaxed),
            stages_run: self.stages_run.load(Ordering::Relaxed),
        }
    }
}

/// Plain-value copy of [`PipelineStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStatsSnapshot {
    pub executions: u64,
    pub completions: u64,
    pub failures: u64,
    pub skips: u64,
    pub stages_run: u64,
}

impl PipelineStatsSnapshot {
    /// Fraction of started executions that completed, in `0.0..=1.0`.
    pub fn completion_rate(&self) -> f64 {
        if self.executions == 0 {
            0.0
        } else {
            self.completions as f64 / self.executions as f64
        }
    }
}

impl fmt::Display for PipelineStatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "executions: {}, completions: {}, failures: {}, skips: {}, stages run: {}",
            self.executions, self.completions, self.failures, self.skips, self.stages_run
        )
    }
}
