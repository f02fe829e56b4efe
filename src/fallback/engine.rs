//! Runtime-adaptive zero-copy / full-copy execution.
//!
//! Operations register a [`FallbackProcessor`] carrying both an optimized
//! zero-copy implementation and a traditional full-copy one. At call time
//! the [`FallbackEngine`] decides which path to run from platform
//! capability, memory pressure and payload size, and transparently
//! retries on the traditional path when the zero-copy attempt signals
//! unavailability.
//!
//! # Decision flow (auto mode)
//! ```text
//! zero-copy unavailable on platform ──────────────► traditional
//! memory ratio ≥ hard_pressure_ratio ─────────────► traditional
//! payload ≥ large_payload_bytes ──────────────────► zero-copy
//! memory ratio < fallback_threshold ──────────────► zero-copy
//! otherwise ──────────────────────────────────────► traditional
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, warn};
use parking_lot::{Mutex, RwLock};

use crate::common::{EngineConfig, Error, Result};
use crate::fallback::probe::{detect_zero_copy, MemoryProbe, SystemMemoryProbe};
use crate::fallback::status::FallbackStatus;

/// Hysteresis factor: active fallbacks are cleared only once pressure
/// drops well below the threshold that caused them.
const RECOVERY_FACTOR: f64 = 0.8;

/// Which implementation path to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingMode {
    /// Require the zero-copy path; unavailability is an error.
    ZeroCopy,
    /// Require the traditional path.
    Traditional,
    /// Let the engine decide, with transparent fallback.
    #[default]
    Auto,
}

/// Signal that a zero-copy attempt could not run.
///
/// This is a value-level outcome of the attempt, not an error: the engine
/// reacts by retrying on the traditional path. Only when both paths are
/// exhausted does an [`Error`] surface.
#[derive(Debug, Clone)]
pub struct FallbackSignal {
    pub reason: String,
}

impl FallbackSignal {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A dual-path operation implementation.
pub trait FallbackProcessor<T>: Send + Sync {
    /// Attempt the optimized path. Signaling unavailability is normal
    /// operation, not failure.
    fn zero_copy(&self, input: &T) -> std::result::Result<T, FallbackSignal>;

    /// The always-available full-copy path.
    fn traditional(&self, input: &T) -> Result<T>;

    /// Payload size hint used by auto-mode gating.
    fn payload_bytes(&self, _input: &T) -> Option<u64> {
        None
    }
}

/// Adapter building a [`FallbackProcessor`] from two closures.
pub struct FnProcessor<T, Z, F>
where
    Z: Fn(&T) -> std::result::Result<T, FallbackSignal> + Send + Sync,
    F: Fn(&T) -> Result<T> + Send + Sync,
{
    zero_copy: Z,
    traditional: F,
    _marker: std::marker::PhantomData<fn(&T) -> T>,
}

impl<T, Z, F> FnProcessor<T, Z, F>
where
    Z: Fn(&T) -> std::result::Result<T, FallbackSignal> + Send + Sync,
    F: Fn(&T) -> Result<T> + Send + Sync,
{
    pub fn new(zero_copy: Z, traditional: F) -> Self {
        Self {
            zero_copy,
            traditional,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T, Z, F> FallbackProcessor<T> for FnProcessor<T, Z, F>
where
    Z: Fn(&T) -> std::result::Result<T, FallbackSignal> + Send + Sync,
    F: Fn(&T) -> Result<T> + Send + Sync,
{
    fn zero_copy(&self, input: &T) -> std::result::Result<T, FallbackSignal> {
        (self.zero_copy)(input)
    }

    fn traditional(&self, input: &T) -> Result<T> {
        (self.traditional)(input)
    }
}

/// Decides, per call, whether an operation runs zero-copy or full-copy.
pub struct FallbackEngine<T> {
    processors: RwLock<HashMap<String, Box<dyn FallbackProcessor<T>>>>,

    /// Platform capability, probed once at construction.
    zero_copy_available: bool,

    /// Memory pressure source.
    memory: Arc<dyn MemoryProbe>,

    fallback_threshold: f64,
    hard_pressure_ratio: f64,
    large_payload_bytes: u64,
    status_refresh_interval: std::time::Duration,

    status: Mutex<FallbackStatus>,
}

impl<T> FallbackEngine<T> {
    /// Build an engine probing the real platform and `/proc/meminfo`.
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_probes(config, detect_zero_copy(), Arc::new(SystemMemoryProbe::new()))
    }

    /// Build with explicit capability and pressure sources.
    pub fn with_probes(
        config: &EngineConfig,
        zero_copy_available: bool,
        memory: Arc<dyn MemoryProbe>,
    ) -> Self {
        debug!(
            "fallback engine ready (zero-copy available: {})",
            zero_copy_available
        );
        Self {
            processors: RwLock::new(HashMap::new()),
            zero_copy_available,
            memory,
            fallback_threshold: config.fallback_threshold,
            hard_pressure_ratio: config.hard_pressure_ratio,
            large_payload_bytes: config.large_payload_bytes,
            status_refresh_interval: config.status_refresh_interval,
            status: Mutex::new(FallbackStatus::default()),
        }
    }

    /// Register a dual-path processor under `operation`, replacing any
    /// previous registration.
    pub fn register(&self, operation: impl Into<String>, processor: Box<dyn FallbackProcessor<T>>) {
        self.processors.write().insert(operation.into(), processor);
    }

    /// Register a pair of closures as the two paths of `operation`.
    pub fn register_processor<Z, F>(
        &self,
        operation: impl Into<String>,
        zero_copy: Z,
        traditional: F,
    ) where
        T: 'static,
        Z: Fn(&T) -> std::result::Result<T, FallbackSignal> + Send + Sync + 'static,
        F: Fn(&T) -> Result<T> + Send + Sync + 'static,
    {
        self.register(operation, Box::new(FnProcessor::new(zero_copy, traditional)));
    }

    /// Names of registered operations, unordered.
    pub fn operations(&self) -> Vec<String> {
        self.processors.read().keys().cloned().collect()
    }

    /// Whether the platform supports the zero-copy machinery at all.
    pub fn zero_copy_available(&self) -> bool {
        self.zero_copy_available
    }

    /// Auto-mode gate: should the next attempt run zero-copy?
    ///
    /// `payload_bytes`, when known, biases very large payloads toward
    /// zero-copy even near the pressure threshold, since copying them
    /// would double their footprint.
    pub fn should_use_zero_copy(&self, payload_bytes: Option<u64>) -> bool {
        if !self.zero_copy_available {
            return false;
        }
        let ratio = self.memory.usage_ratio();
        if ratio >= self.hard_pressure_ratio {
            return false;
        }
        if payload_bytes.is_some_and(|b| b >= self.large_payload_bytes) {
            return true;
        }
        ratio < self.fallback_threshold
    }

    /// Run `operation` on `input` under `mode`.
    ///
    /// In auto mode a signaled zero-copy attempt is retried exactly once
    /// on the traditional path; the caller sees a single result either
    /// way. An explicit [`ProcessingMode::ZeroCopy`] turns the signal
    /// into [`Error::ZeroCopyUnavailable`] instead.
    ///
    /// # Errors
    /// - [`Error::Processing`] for unknown operations or when both paths fail
    /// - [`Error::ZeroCopyUnavailable`] in forced zero-copy mode
    pub fn process_with_fallback(
        &self,
        operation: &str,
        input: &T,
        mode: ProcessingMode,
    ) -> Result<T> {
        self.refresh_status();

        let processors = self.processors.read();
        let processor = processors.get(operation).ok_or_else(|| Error::Processing {
            operation: operation.to_string(),
            mode: "registry".to_string(),
            message: "no processor registered".to_string(),
        })?;

        match mode {
            ProcessingMode::Traditional => processor.traditional(input),
            ProcessingMode::ZeroCopy => {
                if !self.zero_copy_available {
                    return Err(Error::ZeroCopyUnavailable(
                        "platform does not support zero-copy".to_string(),
                    ));
                }
                processor
                    .zero_copy(input)
                    .map_err(|signal| Error::ZeroCopyUnavailable(signal.reason))
            }
            ProcessingMode::Auto => {
                let hint = processor.payload_bytes(input);
                if !self.should_use_zero_copy(hint) {
                    debug!("'{}': auto mode chose traditional path", operation);
                    return processor.traditional(input);
                }
                match processor.zero_copy(input) {
                    Ok(output) => Ok(output),
                    Err(signal) => {
                        warn!(
                            "'{}': zero-copy unavailable ({}), retrying traditional",
                            operation, signal.reason
                        );
                        self.status
                            .lock()
                            .record_fallback(operation, signal.reason.clone());
                        processor.traditional(input).map_err(|e| Error::Processing {
                            operation: operation.to_string(),
                            mode: "zero-copy, then traditional".to_string(),
                            message: format!(
                                "zero-copy: {}; traditional: {}",
                                signal.reason, e
                            ),
                        })
                    }
                }
            }
        }
    }

    /// Run `operation` zero-copy, falling back only while memory pressure
    /// stays below `threshold`. Above it the signal propagates as
    /// [`Error::ZeroCopyUnavailable`] so the caller can shed load instead
    /// of paying for a full copy under pressure.
    pub fn safe_zero_copy(&self, operation: &str, input: &T, threshold: f64) -> Result<T> {
        self.refresh_status();

        let processors = self.processors.read();
        let processor = processors.get(operation).ok_or_else(|| Error::Processing {
            operation: operation.to_string(),
            mode: "registry".to_string(),
            message: "no processor registered".to_string(),
        })?;

        if !self.zero_copy_available {
            return Err(Error::ZeroCopyUnavailable(
                "platform does not support zero-copy".to_string(),
            ));
        }
        match processor.zero_copy(input) {
            Ok(output) => Ok(output),
            Err(signal) => {
                if self.memory.usage_ratio() < threshold {
                    self.status
                        .lock()
                        .record_fallback(operation, signal.reason);
                    processor.traditional(input)
                } else {
                    Err(Error::ZeroCopyUnavailable(signal.reason))
                }
            }
        }
    }

    /// Current status snapshot.
    pub fn get_fallback_status(&self) -> FallbackStatus {
        self.status.lock().clone()
    }

    /// Reconcile the active set against memory pressure, at most once per
    /// refresh interval. Active fallbacks clear once pressure drops below
    /// `RECOVERY_FACTOR * fallback_threshold`.
    fn refresh_status(&self) {
        let mut status = self.status.lock();
        let now = Instant::now();
        if status
            .last_check_time
            .is_some_and(|t| now.duration_since(t) < self.status_refresh_interval)
        {
            return;
        }
        status.last_check_time = Some(now);

        if status.is_active && self.memory.usage_ratio() < self.fallback_threshold * RECOVERY_FACTOR
        {
            debug!(
                "memory pressure recovered, clearing {} active fallbacks",
                status.active_fallbacks.len()
            );
            status.clear_active();
        }
    }
}
