//! Closed set of strategies and the recipes that build them

use crate::allocator::bitmapped::{BitmappedAllocator, BitmappedConfig};
use crate::allocator::block::{BlockAllocator, BlockConfig};
use crate::allocator::free_list::{FreeListAllocator, FreeListConfig};
use crate::allocator::pool::{PoolAllocator, PoolConfig};
use crate::allocator::stack::{StackAllocator, StackConfig};
use crate::core::region::Region;
use crate::core::{AllocatorKind, Extent, MemoryUsage, RegionAllocator, Resettable};
use crate::error::AllocResult;

/// Everything needed to build one allocator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocatorSpec {
    /// Bump allocator over `capacity` bytes
    Stack {
        capacity: usize,
        config: StackConfig,
    },
    /// `node_count` nodes of at least `node_size` bytes
    Pool {
        node_size: usize,
        node_count: usize,
        config: PoolConfig,
    },
    /// Free-list allocator over `capacity` bytes
    Block {
        capacity: usize,
        config: BlockConfig,
    },
    /// 64 blocks of at least `block_size` bytes
    BitmappedBlock {
        block_size: usize,
        config: BitmappedConfig,
    },
    /// Cache for requests in `(min_size, max_size]`, layered on a parent
    FreeList {
        min_size: usize,
        max_size: usize,
        config: FreeListConfig,
    },
}

impl AllocatorSpec {
    /// Strategy this recipe builds
    pub fn kind(&self) -> AllocatorKind {
        match self {
            Self::Stack { .. } => AllocatorKind::Stack,
            Self::Pool { .. } => AllocatorKind::Pool,
            Self::Block { .. } => AllocatorKind::Block,
            Self::BitmappedBlock { .. } => AllocatorKind::BitmappedBlock,
            Self::FreeList { .. } => AllocatorKind::FreeList,
        }
    }

    /// Bytes of backing storage the allocator needs, control data included.
    ///
    /// Zero for a free list, which shares its parent's memory.
    pub fn region_size(&self) -> AllocResult<usize> {
        match self {
            Self::Stack { capacity, .. } => StackAllocator::region_size(*capacity),
            Self::Pool {
                node_size,
                node_count,
                ..
            } => PoolAllocator::region_size(*node_size, *node_count),
            Self::Block { capacity, config } => BlockAllocator::region_size(*capacity, config),
            Self::BitmappedBlock { block_size, .. } => BitmappedAllocator::region_size(*block_size),
            Self::FreeList {
                min_size, max_size, ..
            } => FreeListAllocator::node_size_for(*min_size, *max_size).map(|_| 0),
        }
    }

    /// Whether the heap should keep statistics for this allocator
    pub fn track_stats(&self) -> bool {
        match self {
            Self::Stack { config, .. } => config.track_stats,
            Self::Pool { config, .. } => config.track_stats,
            Self::Block { config, .. } => config.fill.track_stats,
            Self::BitmappedBlock { config, .. } => config.track_stats,
            Self::FreeList { config, .. } => config.track_stats,
        }
    }

    pub(crate) fn build(&self, region: Region) -> AllocResult<Strategy> {
        Ok(match self {
            Self::Stack { config, .. } => {
                Strategy::Stack(StackAllocator::with_config(region, config))
            }
            Self::Pool {
                node_size,
                node_count,
                config,
            } => Strategy::Pool(PoolAllocator::with_config(region, *node_size, *node_count, config)?),
            Self::Block { capacity, config } => {
                Strategy::Block(BlockAllocator::with_config(region, *capacity, config)?)
            }
            Self::BitmappedBlock { block_size, config } => {
                Strategy::BitmappedBlock(BitmappedAllocator::with_config(region, *block_size, config)?)
            }
            Self::FreeList {
                min_size,
                max_size,
                config,
            } => Strategy::FreeList(FreeListAllocator::with_config(region, *min_size, *max_size, config)?),
        })
    }
}

/// One allocator of any strategy
#[derive(Debug)]
pub enum Strategy {
    Stack(StackAllocator),
    Pool(PoolAllocator),
    Block(BlockAllocator),
    BitmappedBlock(BitmappedAllocator),
    FreeList(FreeListAllocator),
}

macro_rules! dispatch {
    ($self:expr, $alloc:ident => $body:expr) => {
        match $self {
            Strategy::Stack($alloc) => $body,
            Strategy::Pool($alloc) => $body,
            Strategy::Block($alloc) => $body,
            Strategy::BitmappedBlock($alloc) => $body,
            Strategy::FreeList($alloc) => $body,
        }
    };
}

impl Strategy {
    /// Memory extents are handed out from
    pub(crate) fn buffer(&self) -> &Region {
        dispatch!(self, a => a.buffer())
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut Region {
        dispatch!(self, a => a.buffer_mut())
    }
}

impl RegionAllocator for Strategy {
    fn kind(&self) -> AllocatorKind {
        dispatch!(self, a => a.kind())
    }

    fn alloc(&mut self, size: usize) -> AllocResult<Extent> {
        dispatch!(self, a => a.alloc(size))
    }

    fn dealloc(&mut self, extent: Extent) -> AllocResult<()> {
        dispatch!(self, a => a.dealloc(extent))
    }

    fn granularity(&self) -> usize {
        dispatch!(self, a => a.granularity())
    }
}

impl MemoryUsage for Strategy {
    fn used_memory(&self) -> usize {
        dispatch!(self, a => a.used_memory())
    }

    fn available_memory(&self) -> usize {
        dispatch!(self, a => a.available_memory())
    }

    fn total_memory(&self) -> usize {
        dispatch!(self, a => a.total_memory())
    }
}

impl Resettable for Strategy {
    fn reset(&mut self) {
        dispatch!(self, a => a.reset());
    }
}
