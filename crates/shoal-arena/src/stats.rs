//! Lock-free allocation counters.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Atomic counters updated on every allocate/deallocate.
///
/// All updates use relaxed ordering: the counters are advisory and may be
/// observed slightly out of step with each other, but each one is exact.
#[derive(Debug, Default)]
pub struct ArenaStats {
    total_allocations: AtomicUsize,
    current_allocations: AtomicUsize,
    total_bytes_allocated: AtomicUsize,
    peak_memory_usage: AtomicUsize,
    current_memory_usage: AtomicUsize,
    failed_allocations: AtomicUsize,
}

impl ArenaStats {
    /// All counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for a successful allocation of `bytes` bytes.
    pub fn record_allocation(&self, bytes: usize) {
        self.total_allocations.fetch_add(1, Ordering::Relaxed);
        self.current_allocations.fetch_add(1, Ordering::Relaxed);
        self.total_bytes_allocated.fetch_add(bytes, Ordering::Relaxed);
        let current = self.current_memory_usage.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.peak_memory_usage.fetch_max(current, Ordering::Relaxed);
    }

    /// Account for a release of `bytes` bytes. Counters saturate at zero.
    pub fn record_deallocation(&self, bytes: usize) {
        let _ = self
            .current_allocations
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_sub(1))
            });
        let _ = self
            .current_memory_usage
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_sub(bytes))
            });
    }

    /// Account for a request that could not be satisfied.
    pub fn record_failed_allocation(&self) {
        self.failed_allocations.fetch_add(1, Ordering::Relaxed);
    }

    /// Zero every counter.
    pub fn reset(&self) {
        for counter in [
            &self.total_allocations,
            &self.current_allocations,
            &self.total_bytes_allocated,
            &self.peak_memory_usage,
            &self.current_memory_usage,
            &self.failed_allocations,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    /// Read every counter once.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_allocations: self.total_allocations.load(Ordering::Relaxed),
            current_allocations: self.current_allocations.load(Ordering::Relaxed),
            total_bytes_allocated: self.total_bytes_allocated.load(Ordering::Relaxed),
            peak_memory_usage: self.peak_memory_usage.load(Ordering::Relaxed),
            current_memory_usage: self.current_memory_usage.load(Ordering::Relaxed),
            failed_allocations: self.failed_allocations.load(Ordering::Relaxed),
        }
    }

    /// Multi-line human-readable summary.
    pub fn report(&self) -> String {
        self.snapshot().to_string()
    }
}

/// Point-in-time copy of [`ArenaStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Successful allocations since creation or the last reset.
    pub total_allocations: usize,
    /// Allocations not yet released.
    pub current_allocations: usize,
    /// Sum of block sizes ever handed out.
    pub total_bytes_allocated: usize,
    /// High-water mark of `current_memory_usage`.
    pub peak_memory_usage: usize,
    /// Block bytes currently handed out.
    pub current_memory_usage: usize,
    /// Requests that found no fitting block.
    pub failed_allocations: usize,
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Arena Statistics:")?;
        writeln!(f, "  Total Allocations: {}", self.total_allocations)?;
        writeln!(f, "  Current Allocations: {}", self.current_allocations)?;
        writeln!(f, "  Total Bytes Allocated: {}", self.total_bytes_allocated)?;
        writeln!(f, "  Peak Memory Usage: {} bytes", self.peak_memory_usage)?;
        writeln!(f, "  Current Memory Usage: {} bytes", self.current_memory_usage)?;
        write!(f, "  Failed Allocations: {}", self.failed_allocations)
    }
}
