//! Per-execution pipeline context.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Bookkeeping for one pipeline execution: timing, progress and
/// free-form numeric stats recorded by stages or error handlers.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    started_at: Instant,
    finished_at: Option<Instant>,
    /// Index and name of the stage currently (or last) running.
    current_stage: Option<(usize, String)>,
    stats: HashMap<String, f64>,
}

impl PipelineContext {
    pub(crate) fn start() -> Self {
        Self {
            started_at: Instant::now(),
            finished_at: None,
            current_stage: None,
            stats: HashMap::new(),
        }
    }

    pub(crate) fn enter_stage(&mut self, index: usize, name: &str) {
        self.current_stage = Some((index, name.to_string()));
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(Instant::now());
    }

    /// Wall time since the execution started, frozen once finished.
    pub fn elapsed(&self) -> Duration {
        self.finished_at
            .unwrap_or_else(Instant::now)
            .duration_since(self.started_at)
    }

    /// Index and name of the stage last entered.
    pub fn current_stage(&self) -> Option<(usize, &str)> {
        self.current_stage
            .as_ref()
            .map(|(i, name)| (*i, name.as_str()))
    }

    /// Record a numeric stat, accumulating over repeated keys.
    pub fn record(&mut self, key: &str, value: f64) {
        *self.stats.entry(key.to_string()).or_insert(0.0) += value;
    }

    /// Recorded stats.
    pub fn stats(&self) -> &HashMap<String, f64> {
        &self.stats
    }
}
