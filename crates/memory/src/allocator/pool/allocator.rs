//! Main pool allocator implementation
//!
//! Free nodes form an intrusive singly-linked list: the first word of each
//! free node holds the offset of the next free node, or [`END`] for the
//! last one.
//!
//! ## Invariants
//!
//! - every node offset is a multiple of `node_size`
//! - the free list holds exactly `free_count` distinct nodes
//! - deallocation validates size, bounds and node alignment before linking

use super::PoolConfig;
use crate::core::region::Region;
use crate::core::types::alignment::{CACHE_LINE, MIN_ALIGN};
use crate::core::{AllocatorKind, Extent, MemoryUsage, RegionAllocator, Resettable};
use crate::error::{AllocError, AllocResult, Violation};
use crate::utils::checked_align_up;

/// Link value terminating the free list
const END: usize = usize::MAX;

const KIND: AllocatorKind = AllocatorKind::Pool;

/// Pool allocator for fixed-size nodes
///
/// Any request up to the node size is served with a whole node; larger
/// requests fail. Both operations are O(1).
#[derive(Debug)]
pub struct PoolAllocator {
    buffer: Region,
    node_size: usize,
    node_count: usize,
    free_head: usize,
    free_count: usize,
    alloc_pattern: Option<u8>,
    dealloc_pattern: Option<u8>,
}

impl PoolAllocator {
    /// Node size after rounding `requested` up to a cache line
    pub fn node_size_for(requested: usize) -> AllocResult<usize> {
        if requested == 0 {
            return Err(AllocError::invalid_config("pool node size cannot be zero"));
        }
        checked_align_up(requested.max(size_of::<usize>()), CACHE_LINE)
            .ok_or_else(|| AllocError::invalid_config("pool node size overflows"))
    }

    /// Buffer bytes needed for `node_count` nodes of `node_size`
    pub fn region_size(node_size: usize, node_count: usize) -> AllocResult<usize> {
        if node_count == 0 {
            return Err(AllocError::invalid_config("pool node count cannot be zero"));
        }
        Self::node_size_for(node_size)?
            .checked_mul(node_count)
            .ok_or_else(|| AllocError::invalid_config("pool size calculation overflows"))
    }

    pub(crate) fn with_config(
        buffer: Region,
        node_size: usize,
        node_count: usize,
        config: &PoolConfig,
    ) -> AllocResult<Self> {
        let node_size = Self::node_size_for(node_size)?;
        if Self::region_size(node_size, node_count)? > buffer.len() {
            return Err(AllocError::invalid_config("pool buffer smaller than node_size * node_count"));
        }

        let mut pool = Self {
            buffer,
            node_size,
            node_count,
            free_head: END,
            free_count: 0,
            alloc_pattern: config.alloc_pattern,
            dealloc_pattern: config.dealloc_pattern,
        };
        pool.link_all();
        Ok(pool)
    }

    pub(crate) fn buffer(&self) -> &Region {
        &self.buffer
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut Region {
        &mut self.buffer
    }

    /// Rebuilds the free list in address order
    fn link_all(&mut self) {
        for index in 0..self.node_count {
            let next = if index + 1 < self.node_count {
                (index + 1) * self.node_size
            } else {
                END
            };
            self.buffer.write_word(index * self.node_size, next);
        }
        self.free_head = 0;
        self.free_count = self.node_count;
    }

    /// Size of every node handed out
    pub fn node_size(&self) -> usize {
        self.node_size
    }

    /// Number of nodes in the pool
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Number of nodes currently on the free list
    pub fn free_count(&self) -> usize {
        self.free_count
    }

    fn validate_free(&self, extent: Extent) -> Result<(), Violation> {
        if extent.size != self.node_size {
            return Err(Violation::NodeSizeMismatch {
                expected: self.node_size,
                actual: extent.size,
            });
        }
        if extent.end() > self.node_size * self.node_count {
            return Err(Violation::OutOfBounds {
                offset: extent.offset,
                size: extent.size,
            });
        }
        if extent.offset % self.node_size != 0 {
            return Err(Violation::Misaligned {
                offset: extent.offset,
                align: self.node_size,
            });
        }
        if self.free_count == self.node_count || self.free_head == extent.offset {
            return Err(Violation::DoubleFree {
                offset: extent.offset,
                size: extent.size,
            });
        }
        Ok(())
    }
}

impl RegionAllocator for PoolAllocator {
    fn kind(&self) -> AllocatorKind {
        KIND
    }

    fn alloc(&mut self, size: usize) -> AllocResult<Extent> {
        let fits = checked_align_up(size, MIN_ALIGN).is_some_and(|aligned| aligned <= self.node_size);
        if !fits {
            return Err(AllocError::oversized(KIND, size, self.node_size));
        }
        if self.free_head == END {
            return Err(AllocError::out_of_capacity(KIND, size, 0));
        }

        let node = self.free_head;
        self.free_head = self.buffer.read_word(node);
        self.free_count -= 1;
        if let Some(pattern) = self.alloc_pattern {
            self.buffer.fill(node, self.node_size, pattern);
        }
        Ok(Extent::new(node, self.node_size))
    }

    fn dealloc(&mut self, extent: Extent) -> AllocResult<()> {
        self.validate_free(extent)
            .map_err(|violation| AllocError::violation(KIND, violation))?;

        if let Some(pattern) = self.dealloc_pattern {
            let word = size_of::<usize>();
            self.buffer.fill(extent.offset + word, self.node_size - word, pattern);
        }
        self.buffer.write_word(extent.offset, self.free_head);
        self.free_head = extent.offset;
        self.free_count += 1;
        Ok(())
    }

    fn granularity(&self) -> usize {
        CACHE_LINE
    }
}

impl MemoryUsage for PoolAllocator {
    fn used_memory(&self) -> usize {
        (self.node_count - self.free_count) * self.node_size
    }

    fn available_memory(&self) -> usize {
        self.free_count * self.node_size
    }
}

impl Resettable for PoolAllocator {
    fn reset(&mut self) {
        self.link_all();
    }
}
