//! Fallback engine status reporting.

use std::collections::HashSet;
use std::time::Instant;

/// Observable state of the fallback engine.
///
/// `is_active` is true while at least one operation is routed through its
/// traditional path; `active_fallbacks` names those operations.
#[derive(Debug, Clone, Default)]
pub struct FallbackStatus {
    /// Whether any operation is currently degraded.
    pub is_active: bool,
    /// Names of operations running on their traditional path.
    pub active_fallbacks: HashSet<String>,
    /// Total zero-copy attempts that signaled unavailability.
    pub error_count: u64,
    /// Most recent unavailability reason.
    pub last_error: Option<String>,
    /// When the status was last reconciled against memory pressure.
    pub last_check_time: Option<Instant>,
}

impl FallbackStatus {
    /// Record that `operation` fell back, with the signaled reason.
    pub(crate) fn record_fallback(&mut self, operation: &str, reason: String) {
        self.active_fallbacks.insert(operation.to_string());
        self.is_active = true;
        self.error_count += 1;
        self.last_error = Some(reason);
    }

    /// Forget every active fallback, keeping the error history.
    pub(crate) fn clear_active(&mut self) {
        self.active_fallbacks.clear();
        self.is_active = false;
    }
}
