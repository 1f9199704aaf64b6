//! General-purpose first-fit allocator over an address-ordered free list
//!
//! # Memory Layout
//! ```text
//! [descriptor table][pad to cache line][buffer ........................]
//!  (offset, size)*                      <- extents are buffer offsets ->
//! ```
//!
//! ## Invariants
//!
//! - descriptors are strictly address-sorted
//! - no descriptor ends where the next one starts (maximally merged)
//! - every descriptor offset and size is a multiple of [`MIN_ALIGN`]
//! - `free_bytes` is the sum of all descriptor sizes
//!
//! Frees are checked against both neighbouring descriptors before the
//! table is touched, so a block that overlaps free space (a double free)
//! is rejected instead of corrupting the table.
//!
//! By default the table has room for every free extent a fully fragmented
//! buffer can hold, so a valid free never runs out of descriptors. A table
//! bounded with [`BlockConfig::with_max_descriptors`] can; the free is then
//! refused with a capacity error and nothing changes.

use super::BlockConfig;
use super::table::{DESCRIPTOR_SIZE, DescriptorTable};
use crate::core::region::Region;
use crate::core::types::alignment::{CACHE_LINE, MIN_ALIGN};
use crate::core::{AllocatorKind, Extent, MemoryUsage, RegionAllocator, Resettable};
use crate::error::{AllocError, AllocResult, Violation};
use crate::utils::{checked_align_up, is_aligned};

const KIND: AllocatorKind = AllocatorKind::Block;

/// Sizes of the two parts of a block allocator's region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    descriptors: usize,
    table_bytes: usize,
    capacity: usize,
}

impl Layout {
    fn compute(capacity: usize, config: &BlockConfig) -> AllocResult<Self> {
        if capacity == 0 {
            return Err(AllocError::invalid_config("block allocator capacity cannot be zero"));
        }
        let capacity = checked_align_up(capacity, MIN_ALIGN)
            .ok_or_else(|| AllocError::invalid_config("block allocator capacity overflows"))?;
        let descriptors = config.descriptors_for(capacity);
        if descriptors == 0 {
            return Err(AllocError::invalid_config("descriptor table needs at least one entry"));
        }
        let table_bytes = descriptors
            .checked_mul(DESCRIPTOR_SIZE)
            .and_then(|bytes| checked_align_up(bytes, CACHE_LINE))
            .ok_or_else(|| AllocError::invalid_config("descriptor table size overflows"))?;
        Ok(Self {
            descriptors,
            table_bytes,
            capacity,
        })
    }

    fn total(self) -> AllocResult<usize> {
        self.table_bytes
            .checked_add(self.capacity)
            .ok_or_else(|| AllocError::invalid_config("block allocator size overflows"))
    }
}

/// Block (free-list) allocator
///
/// Serves variable-size requests first-fit in address order and coalesces
/// freed extents with their free neighbours.
#[derive(Debug)]
pub struct BlockAllocator {
    buffer: Region,
    table: DescriptorTable,
    free_bytes: usize,
    alloc_pattern: Option<u8>,
    dealloc_pattern: Option<u8>,
}

impl BlockAllocator {
    /// Region bytes needed for `capacity` usable bytes plus the descriptor table
    pub fn region_size(capacity: usize, config: &BlockConfig) -> AllocResult<usize> {
        Layout::compute(capacity, config)?.total()
    }

    pub(crate) fn with_config(
        region: Region,
        capacity: usize,
        config: &BlockConfig,
    ) -> AllocResult<Self> {
        let layout = Layout::compute(capacity, config)?;
        if layout.total()? > region.len() {
            return Err(AllocError::invalid_config("block allocator region too small"));
        }

        let table = DescriptorTable::new(region.subregion(0, layout.table_bytes), layout.descriptors);
        let buffer = region.subregion(layout.table_bytes, layout.capacity);
        let mut allocator = Self {
            buffer,
            table,
            free_bytes: 0,
            alloc_pattern: config.fill.alloc_pattern,
            dealloc_pattern: config.fill.dealloc_pattern,
        };
        allocator.reset();
        Ok(allocator)
    }

    pub(crate) fn buffer(&self) -> &Region {
        &self.buffer
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut Region {
        &mut self.buffer
    }

    /// Usable bytes
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Number of free descriptors
    pub fn descriptor_count(&self) -> usize {
        self.table.len()
    }

    /// Maximum number of free descriptors
    pub fn descriptor_capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Snapshot of the free descriptors in address order
    pub fn free_extents(&self) -> Vec<Extent> {
        self.table.iter().collect()
    }

    /// Length of the largest free extent
    pub fn largest_free(&self) -> usize {
        self.table.iter().map(|e| e.size).max().unwrap_or(0)
    }

    fn validate_free(&self, extent: Extent) -> Result<usize, Violation> {
        if extent.size == 0 || !self.buffer.contains_range(extent.offset, extent.size) {
            return Err(Violation::OutOfBounds {
                offset: extent.offset,
                size: extent.size,
            });
        }
        if !is_aligned(extent.offset, MIN_ALIGN) || !is_aligned(extent.size, MIN_ALIGN) {
            return Err(Violation::Misaligned {
                offset: extent.offset,
                align: MIN_ALIGN,
            });
        }

        let index = self.table.lower_bound(extent.offset);
        let overlaps_right = index < self.table.len() && self.table.get(index).offset < extent.end();
        let overlaps_left = index > 0 && self.table.get(index - 1).end() > extent.offset;
        if overlaps_left || overlaps_right {
            return Err(Violation::DoubleFree {
                offset: extent.offset,
                size: extent.size,
            });
        }
        Ok(index)
    }
}

impl RegionAllocator for BlockAllocator {
    fn kind(&self) -> AllocatorKind {
        KIND
    }

    fn alloc(&mut self, size: usize) -> AllocResult<Extent> {
        let aligned = checked_align_up(size, MIN_ALIGN)
            .ok_or_else(|| AllocError::out_of_capacity(KIND, size, self.free_bytes))?;
        let index = self
            .table
            .first_fit(aligned)
            .ok_or_else(|| AllocError::out_of_capacity(KIND, size, self.free_bytes))?;

        let free = self.table.get(index);
        let remainder = free.size - aligned;
        let extent = if remainder < MIN_ALIGN {
            self.table.remove(index);
            free
        } else {
            self.table
                .set(index, Extent::new(free.offset + aligned, remainder));
            Extent::new(free.offset, aligned)
        };
        self.free_bytes -= extent.size;

        if let Some(pattern) = self.alloc_pattern {
            self.buffer.fill(extent.offset, extent.size, pattern);
        }
        Ok(extent)
    }

    fn dealloc(&mut self, extent: Extent) -> AllocResult<()> {
        let index = self
            .validate_free(extent)
            .map_err(|violation| AllocError::violation(KIND, violation))?;

        let left = index.checked_sub(1).map(|i| self.table.get(i));
        let right = (index < self.table.len()).then(|| self.table.get(index));
        let joins_left = left.is_some_and(|l| l.end() == extent.offset);
        let joins_right = right.is_some_and(|r| extent.end() == r.offset);

        if !joins_left && !joins_right && self.table.is_full() {
            return Err(AllocError::descriptor_table_full(self.table.capacity()));
        }

        if let Some(pattern) = self.dealloc_pattern {
            self.buffer.fill(extent.offset, extent.size, pattern);
        }

        match (left, right) {
            (Some(l), Some(r)) if joins_left && joins_right => {
                self.table
                    .set(index - 1, Extent::new(l.offset, l.size + extent.size + r.size));
                self.table.remove(index);
            }
            (_, Some(r)) if joins_right => {
                self.table
                    .set(index, Extent::new(extent.offset, extent.size + r.size));
            }
            (Some(l), _) if joins_left => {
                self.table
                    .set(index - 1, Extent::new(l.offset, l.size + extent.size));
            }
            _ => self.table.insert(index, extent),
        }
        self.free_bytes += extent.size;
        Ok(())
    }

    fn granularity(&self) -> usize {
        MIN_ALIGN
    }
}

impl MemoryUsage for BlockAllocator {
    fn used_memory(&self) -> usize {
        self.buffer.len() - self.free_bytes
    }

    fn available_memory(&self) -> usize {
        self.free_bytes
    }
}

impl Resettable for BlockAllocator {
    fn reset(&mut self) {
        self.table.clear();
        self.table.insert(0, Extent::new(0, self.buffer.len()));
        self.free_bytes = self.buffer.len();
    }
}
