//! Main stack allocator implementation
//!
//! ## Invariants
//!
//! - `top` never exceeds the buffer length
//! - every extent handed out starts on a [`MIN_ALIGN`] boundary
//! - `dealloc` only moves `top` when the extent ends exactly at `top`
//! - `rewind` only moves `top` downwards

use super::{StackConfig, StackMarker};
use crate::core::region::Region;
use crate::core::types::alignment::MIN_ALIGN;
use crate::core::{AllocatorKind, Extent, MemoryUsage, RegionAllocator, Resettable};
use crate::error::{AllocError, AllocResult, Misuse};
use crate::macros::log_trace;
use crate::utils::checked_align_up;

/// Stack allocator that supports LIFO allocation and deallocation
///
/// # Memory Layout
/// ```text
/// [start]----[alloc1]----[alloc2]----[alloc3]----[top]----[free]----[end]
///             <------ allocated ------>         <-- available -->
/// ```
///
/// Only the most recent allocation can be returned; freeing anything else
/// is a no-op and the memory comes back on [`reset`](Resettable::reset), a
/// [`rewind`](Self::rewind), or when the allocator is destroyed.
#[derive(Debug)]
pub struct StackAllocator {
    buffer: Region,
    top: usize,
    alloc_pattern: Option<u8>,
    dealloc_pattern: Option<u8>,
}

impl StackAllocator {
    /// Buffer bytes needed for `capacity` usable bytes
    pub fn region_size(capacity: usize) -> AllocResult<usize> {
        if capacity == 0 {
            return Err(AllocError::invalid_config("stack capacity cannot be zero"));
        }
        Ok(capacity)
    }

    pub(crate) fn with_config(buffer: Region, config: &StackConfig) -> Self {
        Self {
            buffer,
            top: 0,
            alloc_pattern: config.alloc_pattern,
            dealloc_pattern: config.dealloc_pattern,
        }
    }

    pub(crate) fn buffer(&self) -> &Region {
        &self.buffer
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut Region {
        &mut self.buffer
    }

    /// Total capacity in bytes
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Offset of the current top of the stack
    pub fn top(&self) -> usize {
        self.top
    }

    /// Captures the current top so it can be restored with [`rewind`](Self::rewind)
    pub fn mark(&self) -> StackMarker {
        StackMarker { position: self.top }
    }

    /// Releases everything allocated since `marker` was taken.
    ///
    /// A marker above the current top (taken before a reset or an earlier
    /// rewind) is rejected.
    pub fn rewind(&mut self, marker: StackMarker) -> AllocResult<()> {
        if marker.position > self.top {
            return Err(AllocError::misuse(Misuse::MarkerAboveTop {
                position: marker.position,
                top: self.top,
            }));
        }
        if let Some(pattern) = self.dealloc_pattern {
            self.buffer.fill(marker.position, self.top - marker.position, pattern);
        }
        log_trace!(from = self.top, to = marker.position, "stack rewound");
        self.top = marker.position;
        Ok(())
    }

    /// Pops `extent` if it is the most recent allocation
    fn try_pop(&mut self, extent: Extent) -> bool {
        if self.top.checked_sub(extent.size) != Some(extent.offset) {
            return false;
        }
        if let Some(pattern) = self.dealloc_pattern {
            self.buffer.fill(extent.offset, extent.size, pattern);
        }
        self.top = extent.offset;
        true
    }
}

impl RegionAllocator for StackAllocator {
    fn kind(&self) -> AllocatorKind {
        AllocatorKind::Stack
    }

    fn alloc(&mut self, size: usize) -> AllocResult<Extent> {
        let available = self.available_memory();
        let aligned = checked_align_up(size, MIN_ALIGN)
            .filter(|&aligned| aligned <= available)
            .ok_or_else(|| AllocError::out_of_capacity(AllocatorKind::Stack, size, available))?;

        let extent = Extent::new(self.top, aligned);
        self.top += aligned;
        if let Some(pattern) = self.alloc_pattern {
            self.buffer.fill(extent.offset, extent.size, pattern);
        }
        Ok(extent)
    }

    fn dealloc(&mut self, extent: Extent) -> AllocResult<()> {
        if !self.try_pop(extent) {
            log_trace!(offset = extent.offset, top = self.top, "out-of-order stack free ignored");
        }
        Ok(())
    }

    fn granularity(&self) -> usize {
        MIN_ALIGN
    }
}

impl MemoryUsage for StackAllocator {
    fn used_memory(&self) -> usize {
        self.top
    }

    fn available_memory(&self) -> usize {
        // Bytes past the last whole allocation unit can never be handed out.
        (self.buffer.len() - self.top) & !(MIN_ALIGN - 1)
    }

    fn total_memory(&self) -> usize {
        self.buffer.len()
    }
}

impl Resettable for StackAllocator {
    fn reset(&mut self) {
        if let Some(pattern) = self.dealloc_pattern {
            self.buffer.fill(0, self.top, pattern);
        }
        self.top = 0;
    }
}
