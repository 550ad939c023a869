//! System memory monitoring.
//!
//! Memory-pressure policies ask a [`MemoryMonitor`] how much memory the
//! system has left. [`SystemMemoryMonitor`] reads the kernel's figures;
//! [`FixedMemoryMonitor`] reports values set by hand, which is what tests and
//! simulations use.

use std::sync::atomic::{AtomicU64, Ordering};

/// Source of system memory figures.
pub trait MemoryMonitor: Send + Sync {
    /// Bytes available to new allocations.
    fn free_system_memory(&self) -> u64;

    /// Total physical memory in bytes.
    fn total_system_memory(&self) -> u64;

    /// Bytes in use.
    fn used_system_memory(&self) -> u64 {
        self.total_system_memory()
            .saturating_sub(self.free_system_memory())
    }
}

/// Parsed `/proc/meminfo` figures, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MemInfo {
    /// `MemTotal`.
    pub total: u64,
    /// `MemFree`.
    pub free: u64,
    /// `MemAvailable`, absent on old kernels.
    pub available: Option<u64>,
    /// `Buffers`.
    pub buffers: u64,
    /// `Cached`.
    pub cached: u64,
    /// `SwapTotal`.
    pub swap_total: u64,
    /// `SwapFree`.
    pub swap_free: u64,
}

impl MemInfo {
    /// Parses the text of `/proc/meminfo`.
    ///
    /// Unknown lines are ignored; values are given in KiB by the kernel.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut info = Self::default();
        for line in text.lines() {
            let Some((key, rest)) = line.split_once(':') else {
                continue;
            };
            let Some(kib) = rest
                .split_whitespace()
                .next()
                .and_then(|v| v.parse::<u64>().ok())
            else {
                continue;
            };
            let bytes = kib.saturating_mul(1024);

            match key.trim() {
                "MemTotal" => info.total = bytes,
                "MemFree" => info.free = bytes,
                "MemAvailable" => info.available = Some(bytes),
                "Buffers" => info.buffers = bytes,
                "Cached" => info.cached = bytes,
                "SwapTotal" => info.swap_total = bytes,
                "SwapFree" => info.swap_free = bytes,
                _ => {}
            }
        }
        info
    }

    /// Memory usable by new allocations: `MemAvailable` when the kernel
    /// reports it, `MemFree` otherwise.
    #[must_use]
    pub fn usable(&self) -> u64 {
        self.available.unwrap_or(self.free)
    }

    /// Reads the running system's figures.
    ///
    /// Returns `None` where `/proc/meminfo` is not available.
    #[must_use]
    pub fn read_system() -> Option<Self> {
        std::fs::read_to_string("/proc/meminfo")
            .ok()
            .map(|text| Self::parse(&text))
    }
}

/// Reads memory figures from the operating system on every call.
///
/// Without `/proc/meminfo` the monitor reports unlimited free memory, so
/// memory-pressure policies never fire.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMemoryMonitor;

impl SystemMemoryMonitor {
    /// Creates a system monitor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl MemoryMonitor for SystemMemoryMonitor {
    fn free_system_memory(&self) -> u64 {
        MemInfo::read_system().map_or(u64::MAX, |info| info.usable())
    }

    fn total_system_memory(&self) -> u64 {
        MemInfo::read_system().map_or(u64::MAX, |info| info.total)
    }
}

/// Reports figures set by the caller.
#[derive(Debug)]
pub struct FixedMemoryMonitor {
    free: AtomicU64,
    total: AtomicU64,
}

impl FixedMemoryMonitor {
    /// Creates a monitor reporting `free` bytes out of `total`.
    #[must_use]
    pub fn new(free: u64, total: u64) -> Self {
        Self {
            free: AtomicU64::new(free),
            total: AtomicU64::new(total),
        }
    }

    /// Changes the reported free memory.
    pub fn set_free(&self, free: u64) {
        self.free.store(free, Ordering::SeqCst);
    }

    /// Adjusts the reported free memory by `delta` bytes, saturating.
    pub fn adjust_free(&self, delta: i64) {
        let _ = self
            .free
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |free| {
                Some(free.saturating_add_signed(delta))
            });
    }
}

impl MemoryMonitor for FixedMemoryMonitor {
    fn free_system_memory(&self) -> u64 {
        self.free.load(Ordering::SeqCst)
    }

    fn total_system_memory(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
MemTotal:       16318480 kB
MemFree:          512000 kB
MemAvailable:    8000000 kB
Buffers:          100000 kB
Cached:          4000000 kB
SwapCached:            0 kB
SwapTotal:       2097148 kB
SwapFree:        2097148 kB
HugePages_Total:       0
";

    #[test]
    fn test_parse_meminfo() {
        let info = MemInfo::parse(SAMPLE);
        assert_eq!(info.total, 16_318_480 * 1024);
        assert_eq!(info.free, 512_000 * 1024);
        assert_eq!(info.available, Some(8_000_000 * 1024));
        assert_eq!(info.swap_free, 2_097_148 * 1024);
        assert_eq!(info.usable(), 8_000_000 * 1024);
    }

    #[test]
    fn test_usable_falls_back_to_free() {
        let info = MemInfo::parse("MemTotal: 100 kB\nMemFree: 40 kB\n");
        assert_eq!(info.available, None);
        assert_eq!(info.usable(), 40 * 1024);
    }

    #[test]
    fn test_fixed_monitor() {
        let monitor = FixedMemoryMonitor::new(100, 1000);
        assert_eq!(monitor.used_system_memory(), 900);

        monitor.adjust_free(-150);
        assert_eq!(monitor.free_system_memory(), 0);

        monitor.set_free(42);
        assert_eq!(monitor.free_system_memory(), 42);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_system_monitor_reads_something() {
        let monitor = SystemMemoryMonitor::new();
        assert!(monitor.total_system_memory() > 0);
        assert!(monitor.free_system_memory() <= monitor.total_system_memory());
    }
}
