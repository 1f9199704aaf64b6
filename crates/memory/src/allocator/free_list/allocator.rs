//! Main free-list allocator implementation
//!
//! A free list owns no memory. Requests whose rounded size falls in its
//! size class `(min_size, max_size]` are served from a cache of nodes it
//! got from its parent earlier. Cache misses and out-of-class requests go
//! to the parent. Freed in-class blocks go onto the cache instead of back
//! to the parent.
//!
//! Every in-class request takes a whole node of at least `max_size` bytes,
//! so any cached node fits any in-class request.
//!
//! Cached nodes form an intrusive singly-linked list through the parent's
//! memory: the first word of a node holds the offset of the next node, or
//! [`END`], and the second word holds the node's size.
//!
//! ## Invariants
//!
//! - every cached node is at least `node_size` bytes
//! - `leases` holds exactly the blocks handed out and not yet returned
//! - cached and leased extents never overlap

use std::collections::BTreeMap;

use super::FreeListConfig;
use crate::core::region::Region;
use crate::core::types::alignment::MIN_ALIGN;
use crate::core::{AllocatorKind, Extent, MemoryUsage, RegionAllocator, Resettable};
use crate::error::{AllocError, AllocResult, Violation};
use crate::utils::checked_align_up;

/// Link value terminating the cache
const END: usize = usize::MAX;

const WORD: usize = size_of::<usize>();

const KIND: AllocatorKind = AllocatorKind::FreeList;

/// A block handed out and not yet returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Lease {
    size: usize,
    in_class: bool,
}

/// Where a returned block goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Release {
    /// Onto the node cache
    Cache,
    /// Back to the parent
    Parent,
}

/// Size-class cache in front of a parent allocator
///
/// Offsets are relative to the parent's buffer, which the free list
/// shares.
#[derive(Debug)]
pub struct FreeListAllocator {
    region: Region,
    min_size: usize,
    node_size: usize,
    head: usize,
    cached_count: usize,
    cached_bytes: usize,
    leases: BTreeMap<usize, Lease>,
    leased_bytes: usize,
    alloc_pattern: Option<u8>,
    dealloc_pattern: Option<u8>,
}

impl FreeListAllocator {
    /// Node size for the size class `(min_size, max_size]`
    pub fn node_size_for(min_size: usize, max_size: usize) -> AllocResult<usize> {
        if max_size == 0 {
            return Err(AllocError::invalid_config("free-list max size cannot be zero"));
        }
        if min_size >= max_size {
            return Err(AllocError::invalid_config("free-list min size must be below its max size"));
        }
        checked_align_up(max_size, MIN_ALIGN)
            .ok_or_else(|| AllocError::invalid_config("free-list max size overflows"))
    }

    pub(crate) fn with_config(
        region: Region,
        min_size: usize,
        max_size: usize,
        config: &FreeListConfig,
    ) -> AllocResult<Self> {
        Ok(Self {
            region,
            min_size,
            node_size: Self::node_size_for(min_size, max_size)?,
            head: END,
            cached_count: 0,
            cached_bytes: 0,
            leases: BTreeMap::new(),
            leased_bytes: 0,
            alloc_pattern: config.alloc_pattern,
            dealloc_pattern: config.dealloc_pattern,
        })
    }

    pub(crate) fn buffer(&self) -> &Region {
        &self.region
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut Region {
        &mut self.region
    }

    /// Exclusive lower bound of the size class
    pub fn min_size(&self) -> usize {
        self.min_size
    }

    /// Size every in-class request is served with
    pub fn node_size(&self) -> usize {
        self.node_size
    }

    /// Number of nodes on the cache
    pub fn cached_count(&self) -> usize {
        self.cached_count
    }

    /// Number of blocks handed out and not yet returned
    pub fn outstanding(&self) -> usize {
        self.leases.len()
    }

    /// Whether a request of `size` bytes is in the size class
    pub fn serves(&self, size: usize) -> bool {
        checked_align_up(size, MIN_ALIGN)
            .is_some_and(|aligned| aligned > self.min_size && aligned <= self.node_size)
    }

    /// Bytes to ask the parent for when the cache cannot serve `size`
    pub(crate) fn parent_request(&self, size: usize) -> usize {
        if self.serves(size) { self.node_size } else { size }
    }

    /// Pops a cached node for `size`, if `size` is in class and a node is cached
    pub(crate) fn take(&mut self, size: usize) -> Option<Extent> {
        if !self.serves(size) || self.head == END {
            return None;
        }
        let extent = self.cached_head();
        self.unlink_head(extent);
        self.lease(extent, true);
        Some(extent)
    }

    /// Records `extent`, served by the parent for a request of `size`
    pub(crate) fn adopt(&mut self, size: usize, extent: Extent) {
        let in_class = self.serves(size);
        self.lease(extent, in_class);
    }

    /// Where `extent` goes when it is freed. Changes nothing.
    pub(crate) fn route(&self, extent: Extent) -> Result<Release, Violation> {
        match self.leases.get(&extent.offset) {
            None => Err(Violation::DoubleFree {
                offset: extent.offset,
                size: extent.size,
            }),
            Some(lease) if lease.size != extent.size => Err(Violation::NodeSizeMismatch {
                expected: lease.size,
                actual: extent.size,
            }),
            Some(lease) if lease.in_class => Ok(Release::Cache),
            Some(_) => Ok(Release::Parent),
        }
    }

    /// Moves a leased in-class extent onto the cache
    pub(crate) fn cache(&mut self, extent: Extent) {
        self.forget(extent);
        if let Some(pattern) = self.dealloc_pattern {
            self.region
                .fill(extent.offset + 2 * WORD, extent.size - 2 * WORD, pattern);
        }
        self.region.write_word(extent.offset, self.head);
        self.region.write_word(extent.offset + WORD, extent.size);
        self.head = extent.offset;
        self.cached_count += 1;
        self.cached_bytes += extent.size;
    }

    /// Drops the lease on `extent` once the parent has taken it back
    pub(crate) fn forget(&mut self, extent: Extent) {
        if self.leases.remove(&extent.offset).is_some() {
            self.leased_bytes -= extent.size;
        }
    }

    /// Some extent the free list still holds, cached nodes first
    pub(crate) fn next_held(&self) -> Option<Extent> {
        if self.head != END {
            return Some(self.cached_head());
        }
        self.leases
            .first_key_value()
            .map(|(&offset, lease)| Extent::new(offset, lease.size))
    }

    /// Lets go of `extent`, as returned by [`next_held`](Self::next_held),
    /// once the parent has taken it back
    pub(crate) fn drop_held(&mut self, extent: Extent) {
        if self.head == extent.offset {
            self.unlink_head(extent);
        } else {
            self.forget(extent);
        }
    }

    fn cached_head(&self) -> Extent {
        Extent::new(self.head, self.region.read_word(self.head + WORD))
    }

    fn unlink_head(&mut self, head: Extent) {
        self.head = self.region.read_word(head.offset);
        self.cached_count -= 1;
        self.cached_bytes -= head.size;
    }

    fn lease(&mut self, extent: Extent, in_class: bool) {
        if let Some(pattern) = self.alloc_pattern {
            self.region.fill(extent.offset, extent.size, pattern);
        }
        self.leases.insert(
            extent.offset,
            Lease {
                size: extent.size,
                in_class,
            },
        );
        self.leased_bytes += extent.size;
    }
}

/// The free list seen on its own: a cache.
///
/// `alloc` only serves cache hits and `dealloc` only takes in-class
/// blocks. The [`Heap`](crate::heap::Heap) sends everything else to the
/// parent.
impl RegionAllocator for FreeListAllocator {
    fn kind(&self) -> AllocatorKind {
        KIND
    }

    fn alloc(&mut self, size: usize) -> AllocResult<Extent> {
        self.take(size)
            .ok_or_else(|| AllocError::out_of_capacity(KIND, size, self.cached_bytes))
    }

    fn dealloc(&mut self, extent: Extent) -> AllocResult<()> {
        match self
            .route(extent)
            .map_err(|violation| AllocError::violation(KIND, violation))?
        {
            Release::Cache => {
                self.cache(extent);
                Ok(())
            }
            Release::Parent => Err(AllocError::oversized(KIND, extent.size, self.node_size)),
        }
    }

    fn granularity(&self) -> usize {
        MIN_ALIGN
    }
}

impl MemoryUsage for FreeListAllocator {
    fn used_memory(&self) -> usize {
        self.leased_bytes
    }

    fn available_memory(&self) -> usize {
        self.cached_bytes
    }
}

impl Resettable for FreeListAllocator {
    /// Forgets every held extent. The heap hands them back to the parent
    /// first.
    fn reset(&mut self) {
        debug_assert!(self.next_held().is_none(), "free list reset while holding memory");
        self.head = END;
        self.cached_count = 0;
        self.cached_bytes = 0;
        self.leases.clear();
        self.leased_bytes = 0;
    }
}
