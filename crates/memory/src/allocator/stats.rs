//! Allocator statistics tracking
//!
//! One [`AllocatorStats`] per allocator, updated by the heap after each
//! successful or failed operation when the allocator's config asks for it.

use core::fmt;

/// Statistics for one allocator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Bytes the allocator reports in use after the last operation
    pub allocated_bytes: usize,
    /// Peak of `allocated_bytes`
    pub peak_allocated_bytes: usize,
    /// Total number of successful allocations
    pub allocation_count: usize,
    /// Total number of accepted deallocations
    pub deallocation_count: usize,
    /// Number of allocations that returned an error
    pub failed_allocations: usize,
    /// Number of deallocations rejected as invariant violations
    pub rejected_deallocations: usize,
    /// Number of resets (stack rewinds included)
    pub reset_count: usize,
    /// Total bytes ever handed out (cumulative, after rounding)
    pub total_bytes_allocated: usize,
}

impl AllocatorStats {
    /// Creates a new empty stats object
    pub const fn new() -> Self {
        Self {
            allocated_bytes: 0,
            peak_allocated_bytes: 0,
            allocation_count: 0,
            deallocation_count: 0,
            failed_allocations: 0,
            rejected_deallocations: 0,
            reset_count: 0,
            total_bytes_allocated: 0,
        }
    }

    pub(crate) fn record_alloc(&mut self, size: usize, in_use: usize) {
        self.allocation_count += 1;
        self.total_bytes_allocated += size;
        self.set_in_use(in_use);
    }

    pub(crate) fn record_dealloc(&mut self, in_use: usize) {
        self.deallocation_count += 1;
        self.set_in_use(in_use);
    }

    pub(crate) fn record_reset(&mut self, in_use: usize) {
        self.reset_count += 1;
        self.set_in_use(in_use);
    }

    fn set_in_use(&mut self, in_use: usize) {
        self.allocated_bytes = in_use;
        self.peak_allocated_bytes = self.peak_allocated_bytes.max(in_use);
    }

    /// Calculate the average allocation size
    pub fn average_allocation_size(&self) -> Option<f64> {
        if self.allocation_count > 0 {
            Some(self.total_bytes_allocated as f64 / self.allocation_count as f64)
        } else {
            None
        }
    }

    /// Calculate current allocation efficiency (0.0 to 1.0)
    /// Higher values indicate fewer failed allocations
    pub fn allocation_efficiency(&self) -> f64 {
        let total_attempts = self.allocation_count + self.failed_allocations;
        if total_attempts > 0 {
            self.allocation_count as f64 / total_attempts as f64
        } else {
            1.0
        }
    }

    /// Get the balance of allocations vs deallocations
    pub fn allocation_balance(&self) -> isize {
        self.allocation_count as isize - self.deallocation_count as isize
    }
}

impl fmt::Display for AllocatorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Allocator Statistics:")?;
        writeln!(f, "  Current allocated: {} bytes", self.allocated_bytes)?;
        writeln!(f, "  Peak allocated: {} bytes", self.peak_allocated_bytes)?;
        writeln!(f, "  Allocations: {}", self.allocation_count)?;
        writeln!(f, "  Deallocations: {}", self.deallocation_count)?;
        writeln!(f, "  Failed allocations: {}", self.failed_allocations)?;
        writeln!(f, "  Rejected deallocations: {}", self.rejected_deallocations)?;
        writeln!(f, "  Resets: {}", self.reset_count)?;
        if let Some(avg) = self.average_allocation_size() {
            writeln!(f, "  Average allocation size: {avg:.2} bytes")?;
        }
        writeln!(
            f,
            "  Allocation efficiency: {:.2}%",
            self.allocation_efficiency() * 100.0
        )
    }
}
