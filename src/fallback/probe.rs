//! Runtime capability and memory pressure probes.

use std::sync::atomic::{AtomicU64, Ordering};

use log::warn;
use memmap2::MmapMut;

/// Reports current memory pressure as a `0.0..=1.0` usage ratio.
///
/// Injected into the fallback engine so tests and embedders can supply
/// deterministic pressure readings.
pub trait MemoryProbe: Send + Sync {
    /// Fraction of memory currently in use. `0.0` when unknown.
    fn usage_ratio(&self) -> f64;
}

/// Reads pressure from `/proc/meminfo` (`MemTotal` / `MemAvailable`).
///
/// Returns `0.0` on platforms without procfs or when the file is
/// unreadable, which biases the engine toward the zero-copy path.
#[derive(Debug, Default)]
pub struct SystemMemoryProbe;

impl SystemMemoryProbe {
    pub fn new() -> Self {
        Self
    }

    #[cfg(target_os = "linux")]
    fn read_meminfo() -> Option<f64> {
        let text = std::fs::read_to_string("/proc/meminfo").ok()?;
        let mut total = None;
        let mut available = None;
        for line in text.lines() {
            if let Some(rest) = line.strip_prefix("MemTotal:") {
                total = parse_kib(rest);
            } else if let Some(rest) = line.strip_prefix("MemAvailable:") {
                available = parse_kib(rest);
            }
        }
        let (total, available) = (total?, available?);
        if total == 0 {
            return None;
        }
        Some(1.0 - available as f64 / total as f64)
    }
}

#[cfg(target_os = "linux")]
fn parse_kib(rest: &str) -> Option<u64> {
    rest.trim().trim_end_matches(" kB").trim().parse().ok()
}

impl MemoryProbe for SystemMemoryProbe {
    fn usage_ratio(&self) -> f64 {
        #[cfg(target_os = "linux")]
        {
            match Self::read_meminfo() {
                Some(ratio) => ratio.clamp(0.0, 1.0),
                None => {
                    warn!("could not read /proc/meminfo, assuming no pressure");
                    0.0
                }
            }
        }
        #[cfg(not(target_os = "linux"))]
        {
            0.0
        }
    }
}

/// A probe returning a settable, fixed ratio. Used in tests and to pin
/// the engine's behavior regardless of the host.
#[derive(Debug)]
pub struct FixedMemoryProbe {
    // f64 stored as its bit pattern so `set` needs no lock.
    bits: AtomicU64,
}

impl FixedMemoryProbe {
    pub fn new(ratio: f64) -> Self {
        Self {
            bits: AtomicU64::new(ratio.to_bits()),
        }
    }

    pub fn set(&self, ratio: f64) {
        self.bits.store(ratio.to_bits(), Ordering::Relaxed);
    }
}

impl MemoryProbe for FixedMemoryProbe {
    fn usage_ratio(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

/// Probe whether the platform supports the zero-copy machinery by
/// creating a small anonymous mapping.
pub fn detect_zero_copy() -> bool {
    match MmapMut::map_anon(4096) {
        Ok(_) => true,
        Err(e) => {
            warn!("anonymous mapping probe failed, zero-copy disabled: {}", e);
            false
        }
    }
}
