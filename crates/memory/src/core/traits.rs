//! Capability traits shared by every allocation strategy

use core::fmt;

use crate::core::types::{AllocatorKind, Extent};
use crate::error::AllocResult;
use crate::utils::format_bytes;

/// An allocation strategy operating on byte offsets inside one buffer.
///
/// Implementations never see pointers: they receive their buffer at
/// construction and exchange [`Extent`]s with the caller.
/// Every method either succeeds or returns an error without having changed
/// any state.
pub trait RegionAllocator: MemoryUsage + Resettable {
    /// Which strategy this is
    fn kind(&self) -> AllocatorKind;

    /// Reserves at least `size` bytes.
    ///
    /// The returned extent may be larger than `size` because of the
    /// strategy's granularity; the caller hands that exact extent back to
    /// [`dealloc`](Self::dealloc).
    fn alloc(&mut self, size: usize) -> AllocResult<Extent>;

    /// Returns an extent previously produced by [`alloc`](Self::alloc).
    fn dealloc(&mut self, extent: Extent) -> AllocResult<()>;

    /// Alignment every returned extent has relative to the buffer start
    fn granularity(&self) -> usize;
}

/// Memory usage tracking trait
///
/// Implemented by every strategy; all three figures are exact.
pub trait MemoryUsage {
    /// Get currently used memory in bytes
    fn used_memory(&self) -> usize;

    /// Get available memory in bytes
    fn available_memory(&self) -> usize;

    /// Get total memory capacity in bytes
    fn total_memory(&self) -> usize {
        self.used_memory() + self.available_memory()
    }

    /// Returns memory usage as a percentage (0.0 to 100.0)
    fn memory_usage_percent(&self) -> f32 {
        let total = self.total_memory();
        if total == 0 {
            0.0
        } else {
            (self.used_memory() as f32 / total as f32) * 100.0
        }
    }

    /// Returns a snapshot of all usage figures
    fn memory_usage(&self) -> UsageSnapshot {
        UsageSnapshot {
            used: self.used_memory(),
            available: self.available_memory(),
            total: self.total_memory(),
            usage_percent: self.memory_usage_percent(),
        }
    }
}

/// Point-in-time memory usage of one allocator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsageSnapshot {
    /// Currently used memory in bytes
    pub used: usize,
    /// Available memory in bytes
    pub available: usize,
    /// Total memory capacity in bytes
    pub total: usize,
    /// Memory usage as percentage
    pub usage_percent: f32,
}

impl fmt::Display for UsageSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "used: {}, total: {} ({:.1}%)",
            format_bytes(self.used),
            format_bytes(self.total),
            self.usage_percent
        )
    }
}

/// Allocators that can release every live allocation at once.
///
/// Resetting leaves the control structure in place; extents handed out
/// before the reset must not be returned afterwards.
pub trait Resettable {
    /// Reset allocator to initial state
    fn reset(&mut self);
}
