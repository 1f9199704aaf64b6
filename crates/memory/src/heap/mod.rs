//! Allocator registry and composition
//!
//! A [`Heap`] owns every allocator created through it and hands out
//! [`AllocatorId`] handles. Allocators either take their memory from the
//! system or carve it out of a parent allocator registered in the same
//! heap; destroying an allocator returns that memory to wherever it came
//! from.
//!
//! # Lifecycle
//!
//! ```text
//! create ──> live ──(alloc / dealloc / reset)──> live ──destroy──> gone
//! ```
//!
//! A destroyed handle is never reused: its slot's generation moves on, so
//! every later call with it fails with [`Misuse::Destroyed`].
//!
//! # Example
//!
//! ```
//! use strata_memory::prelude::*;
//!
//! let mut heap = Heap::new(HeapConfig::default());
//! let general = heap.create_block(MB, BlockConfig::default(), None)?;
//! let scratch = heap.create_stack(64 * KB, StackConfig::default(), Some(general))?;
//!
//! let block = heap.alloc(scratch, 100)?;
//! assert!(block.size() >= 100);
//! heap.dealloc(scratch, block)?;
//!
//! heap.destroy(scratch)?;
//! heap.destroy(general)?;
//! # Ok::<(), AllocError>(())
//! ```

mod block;
pub mod config;
mod epoch;
mod id;
pub mod typed;

use core::num::NonZeroU32;
use core::ptr::NonNull;

pub use block::Block;
pub use config::HeapConfig;
pub use id::AllocatorId;
pub use typed::{Plain, TypedBlock};

use self::epoch::EpochLog;
use crate::allocator::bitmapped::BitmappedConfig;
use crate::allocator::block::BlockConfig;
use crate::allocator::free_list::allocator::Release;
use crate::allocator::free_list::{FreeListAllocator, FreeListConfig};
use crate::allocator::pool::PoolConfig;
use crate::allocator::stack::{StackConfig, StackMarker};
use crate::allocator::{AllocatorSpec, AllocatorStats, Strategy};
use crate::core::region::{Region, SystemRegion};
use crate::core::{AllocatorKind, Extent, MemoryUsage, RegionAllocator, Resettable, UsageSnapshot};
use crate::error::{AllocError, AllocResult, DeallocError, Misuse, Violation};
use crate::macros::{log_debug, log_error, log_trace, log_warn};

/// Where an allocator's memory came from
#[derive(Debug)]
enum Backing {
    System(SystemRegion),
    /// One block of the parent, returned on destroy
    Carved { parent: AllocatorId, extent: Extent },
    /// The parent's own memory, borrowed block by block (free lists)
    Shared { parent: AllocatorId },
}

#[derive(Debug)]
struct Entry {
    strategy: Strategy,
    backing: Backing,
    children: usize,
    epochs: EpochLog,
    stats: Option<AllocatorStats>,
}

impl Entry {
    fn parent(&self) -> Option<AllocatorId> {
        match self.backing {
            Backing::System(_) => None,
            Backing::Carved { parent, .. } | Backing::Shared { parent } => Some(parent),
        }
    }

    fn refuse_with_children(&self, id: AllocatorId) -> AllocResult<()> {
        if self.children > 0 {
            return Err(AllocError::misuse(Misuse::LiveChildren {
                id,
                children: self.children,
            }));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Slot {
    generation: NonZeroU32,
    entry: Option<Entry>,
}

/// What a strategy did with a request on its own
enum Local<T> {
    Done(AllocResult<T>),
    /// A free list passing the request to its parent
    Forward(AllocatorId),
}

/// Registry of allocators and the memory they own
///
/// All operations take the heap by reference; there is no global state.
/// Memory still held by live allocators is returned to the system when
/// the heap is dropped.
#[derive(Debug)]
pub struct Heap {
    config: HeapConfig,
    slots: Vec<Slot>,
    vacant: Vec<u32>,
    live: usize,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new(HeapConfig::default())
    }
}

impl Heap {
    /// Creates an empty heap
    pub fn new(config: HeapConfig) -> Self {
        Self {
            config,
            slots: Vec::new(),
            vacant: Vec::new(),
            live: 0,
        }
    }

    /// Configuration the heap was created with
    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    /// Number of live allocators
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether no allocator is live
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    // ========================================================================
    // Creation and destruction
    // ========================================================================

    /// Creates an allocator described by `spec`.
    ///
    /// With a `parent`, the allocator's whole region (control data
    /// included) is allocated from the parent and the parent cannot be
    /// reset or destroyed until the child is destroyed. Without one the
    /// region comes from the system allocator. A free list has no region:
    /// it needs a parent and borrows the parent's memory block by block.
    pub fn create(
        &mut self,
        spec: AllocatorSpec,
        parent: Option<AllocatorId>,
    ) -> AllocResult<AllocatorId> {
        let size = spec.region_size()?;
        let index = self.next_index()?;
        let shares_parent = matches!(spec, AllocatorSpec::FreeList { .. });

        let (region, backing) = match parent {
            None if shares_parent => {
                return Err(AllocError::invalid_config("a free-list allocator needs a parent"));
            }
            None => {
                let system = SystemRegion::allocate(size)?;
                (system.region(), Backing::System(system))
            }
            Some(parent) if shares_parent => (*self.region_of(parent)?, Backing::Shared { parent }),
            Some(parent) => {
                let extent = self.alloc_extent(parent, size)?;
                let region = self.region_of(parent)?.subregion(extent.offset, size);
                (region, Backing::Carved { parent, extent })
            }
        };

        let strategy = match spec.build(region) {
            Ok(strategy) => strategy,
            Err(err) => {
                if let Backing::Carved { parent, extent } = backing {
                    if let Err(release) = self.free_extent(parent, extent) {
                        log_warn!(%release, "failed to return region to parent");
                    }
                }
                return Err(err);
            }
        };

        if let Some(parent) = parent {
            self.entry_mut(parent)?.children += 1;
        }

        let stats = spec.track_stats().then(AllocatorStats::new);
        if index as usize == self.slots.len() {
            self.slots.push(Slot {
                generation: NonZeroU32::MIN,
                entry: None,
            });
        } else {
            self.vacant.pop();
        }
        let slot = &mut self.slots[index as usize];
        slot.entry = Some(Entry {
            strategy,
            backing,
            children: 0,
            epochs: EpochLog::default(),
            stats,
        });
        let id = AllocatorId::new(index, slot.generation);
        self.live += 1;

        log_debug!(%id, kind = %spec.kind(), size, ?parent, "allocator created");
        Ok(id)
    }

    /// Creates a [stack allocator](crate::allocator::StackAllocator) with
    /// `capacity` usable bytes
    pub fn create_stack(
        &mut self,
        capacity: usize,
        config: StackConfig,
        parent: Option<AllocatorId>,
    ) -> AllocResult<AllocatorId> {
        self.create(AllocatorSpec::Stack { capacity, config }, parent)
    }

    /// Creates a [pool allocator](crate::allocator::PoolAllocator) of
    /// `node_count` nodes, each at least `node_size` bytes
    pub fn create_pool(
        &mut self,
        node_size: usize,
        node_count: usize,
        config: PoolConfig,
        parent: Option<AllocatorId>,
    ) -> AllocResult<AllocatorId> {
        self.create(
            AllocatorSpec::Pool {
                node_size,
                node_count,
                config,
            },
            parent,
        )
    }

    /// Creates a [block allocator](crate::allocator::BlockAllocator) with
    /// `capacity` usable bytes
    pub fn create_block(
        &mut self,
        capacity: usize,
        config: BlockConfig,
        parent: Option<AllocatorId>,
    ) -> AllocResult<AllocatorId> {
        self.create(AllocatorSpec::Block { capacity, config }, parent)
    }

    /// Creates a [bitmapped-block allocator](crate::allocator::BitmappedAllocator)
    /// of 64 blocks, each at least `block_size` bytes
    pub fn create_bitmapped_block(
        &mut self,
        block_size: usize,
        config: BitmappedConfig,
        parent: Option<AllocatorId>,
    ) -> AllocResult<AllocatorId> {
        self.create(AllocatorSpec::BitmappedBlock { block_size, config }, parent)
    }

    /// Creates a [free list](crate::allocator::FreeListAllocator) caching
    /// requests in `(min_size, max_size]` on top of `parent`
    pub fn create_free_list(
        &mut self,
        min_size: usize,
        max_size: usize,
        config: FreeListConfig,
        parent: AllocatorId,
    ) -> AllocResult<AllocatorId> {
        self.create(
            AllocatorSpec::FreeList {
                min_size,
                max_size,
                config,
            },
            Some(parent),
        )
    }

    /// Destroys an allocator and releases its region.
    ///
    /// Fails with [`Misuse::LiveChildren`] while child allocators exist.
    /// Blocks still allocated from it are released with the region.
    ///
    /// The region goes back to its source before anything else happens, so
    /// when the parent refuses it the allocator is still live and
    /// unchanged. A free list hands every cached node and outstanding
    /// block back to its parent first; its outstanding blocks go stale at
    /// the start of that, and if the parent refuses part of the memory the
    /// free list stays live, holding the rest, and the call can be retried.
    pub fn destroy(&mut self, id: AllocatorId) -> AllocResult<()> {
        let entry = self.entry(id)?;
        entry.refuse_with_children(id)?;
        let parent = entry.parent();
        match entry.backing {
            Backing::System(_) => {}
            Backing::Carved { parent, extent } => self.free_extent(parent, extent)?,
            Backing::Shared { parent } => {
                self.entry_mut(id)?.epochs.reset();
                self.drain_free_list(id, parent)?;
            }
        }
        if let Some(parent) = parent {
            self.entry_mut(parent)?.children -= 1;
        }

        let slot = &mut self.slots[id.slot()];
        let Some(entry) = slot.entry.take() else {
            return Err(AllocError::misuse(Misuse::Destroyed(id)));
        };
        slot.generation = slot.generation.checked_add(1).unwrap_or(NonZeroU32::MIN);
        self.vacant.push(id.index());
        self.live -= 1;

        log_debug!(%id, kind = %entry.strategy.kind(), "allocator destroyed");
        Ok(())
    }

    // ========================================================================
    // Allocation
    // ========================================================================

    /// Allocates at least `size` bytes from `id`
    pub fn alloc(&mut self, id: AllocatorId, size: usize) -> AllocResult<Block> {
        let extent = self.alloc_extent(id, size)?;
        let entry = self.entry(id)?;
        Ok(Block {
            ptr: entry.strategy.buffer().ptr_at(extent.offset),
            size: extent.size,
            owner: id,
            epoch: entry.epochs.current(),
        })
    }

    /// Returns `block` to `id`.
    ///
    /// A refused block comes back inside the [`DeallocError`], still
    /// allocated. A block from another allocator, or one that would corrupt
    /// the allocator's free-space bookkeeping, is refused with an
    /// [`InvariantViolation`](AllocError::InvariantViolation) and nothing
    /// changes; with [`HeapConfig::strict`] set, such a refusal panics. A
    /// block allocator with a bounded descriptor table can also refuse a
    /// valid free with the recoverable
    /// [`DescriptorTableFull`](AllocError::DescriptorTableFull); hand the
    /// block back again once a neighbouring free has merged.
    pub fn dealloc(&mut self, id: AllocatorId, block: Block) -> Result<(), DeallocError> {
        let result = self
            .extent_of(id, &block)
            .and_then(|extent| self.free_extent(id, extent));
        self.enforce(result)
            .map_err(|err| DeallocError::new(block, err))
    }

    /// Makes all of `id`'s memory free again.
    ///
    /// Blocks allocated before the reset become stale and are rejected by
    /// [`dealloc`](Self::dealloc) with [`Misuse::StaleBlock`]. A free list
    /// hands everything it holds back to its parent, as on
    /// [`destroy`](Self::destroy).
    pub fn reset(&mut self, id: AllocatorId) -> AllocResult<()> {
        let entry = self.entry_mut(id)?;
        entry.refuse_with_children(id)?;
        entry.epochs.reset();
        if let Backing::Shared { parent } = entry.backing {
            self.drain_free_list(id, parent)?;
        }

        let entry = self.entry_mut(id)?;
        entry.strategy.reset();
        if let Some(stats) = entry.stats.as_mut() {
            stats.record_reset(entry.strategy.used_memory());
        }
        log_debug!(%id, epoch = entry.epochs.current(), "allocator reset");
        Ok(())
    }

    /// Current top of stack allocator `id`
    pub fn stack_mark(&self, id: AllocatorId) -> AllocResult<StackMarker> {
        match &self.entry(id)?.strategy {
            Strategy::Stack(stack) => Ok(stack.mark()),
            other => Err(AllocError::unsupported("stack_mark", other.kind())),
        }
    }

    /// Releases everything stack allocator `id` handed out since `marker`.
    ///
    /// Blocks above the marker go stale: [`dealloc`](Self::dealloc) and
    /// byte access reject them with [`Misuse::StaleBlock`].
    pub fn stack_rewind(&mut self, id: AllocatorId, marker: StackMarker) -> AllocResult<()> {
        let entry = self.entry_mut(id)?;
        entry.refuse_with_children(id)?;
        match &mut entry.strategy {
            Strategy::Stack(stack) => stack.rewind(marker)?,
            other => return Err(AllocError::unsupported("stack_rewind", other.kind())),
        }
        entry.epochs.rewind(marker.position());
        if let Some(stats) = entry.stats.as_mut() {
            stats.record_reset(entry.strategy.used_memory());
        }
        Ok(())
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Whether `id` names a live allocator of this heap
    pub fn is_live(&self, id: AllocatorId) -> bool {
        self.entry(id).is_ok()
    }

    /// The allocator behind `id`, for strategy-specific queries
    pub fn strategy(&self, id: AllocatorId) -> AllocResult<&Strategy> {
        Ok(&self.entry(id)?.strategy)
    }

    /// Strategy of `id`
    pub fn kind(&self, id: AllocatorId) -> AllocResult<AllocatorKind> {
        Ok(self.entry(id)?.strategy.kind())
    }

    /// Allocator `id` takes its memory from, if any
    pub fn parent(&self, id: AllocatorId) -> AllocResult<Option<AllocatorId>> {
        Ok(self.entry(id)?.parent())
    }

    /// Number of live allocators carved out of `id`
    pub fn children(&self, id: AllocatorId) -> AllocResult<usize> {
        Ok(self.entry(id)?.children)
    }

    /// Used / available bytes of `id`.
    ///
    /// For a free list, used bytes are its outstanding blocks and available
    /// bytes its cached nodes.
    pub fn usage(&self, id: AllocatorId) -> AllocResult<UsageSnapshot> {
        Ok(self.entry(id)?.strategy.memory_usage())
    }

    /// Statistics of `id`, if its config enabled them
    pub fn stats(&self, id: AllocatorId) -> AllocResult<Option<AllocatorStats>> {
        Ok(self.entry(id)?.stats)
    }

    /// Free descriptors of block allocator `id`, in address order
    pub fn free_extents(&self, id: AllocatorId) -> AllocResult<Vec<Extent>> {
        match &self.entry(id)?.strategy {
            Strategy::Block(block) => Ok(block.free_extents()),
            other => Err(AllocError::unsupported("free_extents", other.kind())),
        }
    }

    /// Occupancy mask of bitmapped allocator `id`
    pub fn occupancy(&self, id: AllocatorId) -> AllocResult<u64> {
        match &self.entry(id)?.strategy {
            Strategy::BitmappedBlock(bitmapped) => Ok(bitmapped.mask()),
            other => Err(AllocError::unsupported("occupancy", other.kind())),
        }
    }

    /// Address of the first byte blocks of `id` are served from.
    ///
    /// A free list reports its parent's.
    pub fn base_ptr(&self, id: AllocatorId) -> AllocResult<NonNull<u8>> {
        Ok(self.entry(id)?.strategy.buffer().base())
    }

    /// Contents of `block`
    pub fn bytes(&self, block: &Block) -> AllocResult<&[u8]> {
        let extent = self.extent_of(block.owner, block)?;
        Ok(self
            .entry(block.owner)?
            .strategy
            .buffer()
            .bytes(extent.offset, extent.size))
    }

    /// Mutable contents of `block`
    pub fn bytes_mut(&mut self, block: &Block) -> AllocResult<&mut [u8]> {
        let extent = self.extent_of(block.owner, block)?;
        Ok(self
            .entry_mut(block.owner)?
            .strategy
            .buffer_mut()
            .bytes_mut(extent.offset, extent.size))
    }

    // ========================================================================
    // Internals
    // ========================================================================

    pub(crate) fn region_of(&self, id: AllocatorId) -> AllocResult<&Region> {
        Ok(self.entry(id)?.strategy.buffer())
    }

    fn next_index(&self) -> AllocResult<u32> {
        match self.vacant.last() {
            Some(&index) => Ok(index),
            None => u32::try_from(self.slots.len())
                .map_err(|_| AllocError::invalid_config("heap allocator slots exhausted")),
        }
    }

    fn slot_entry(&self, id: AllocatorId) -> Result<&Entry, Misuse> {
        let slot = self.slots.get(id.slot()).ok_or(Misuse::UnknownAllocator(id))?;
        if slot.generation.get() < id.generation() {
            return Err(Misuse::UnknownAllocator(id));
        }
        match &slot.entry {
            Some(entry) if slot.generation.get() == id.generation() => Ok(entry),
            _ => Err(Misuse::Destroyed(id)),
        }
    }

    fn entry(&self, id: AllocatorId) -> AllocResult<&Entry> {
        self.slot_entry(id).map_err(AllocError::misuse)
    }

    fn entry_mut(&mut self, id: AllocatorId) -> AllocResult<&mut Entry> {
        self.slot_entry(id).map_err(AllocError::misuse)?;
        self.slots[id.slot()]
            .entry
            .as_mut()
            .ok_or_else(|| AllocError::misuse(Misuse::Destroyed(id)))
    }

    fn free_list_mut(&mut self, id: AllocatorId) -> AllocResult<&mut FreeListAllocator> {
        match &mut self.entry_mut(id)?.strategy {
            Strategy::FreeList(list) => Ok(list),
            other => Err(AllocError::unsupported("free-list bookkeeping", other.kind())),
        }
    }

    fn alloc_extent(&mut self, id: AllocatorId, size: usize) -> AllocResult<Extent> {
        let entry = self.entry_mut(id)?;
        if size == 0 {
            return Err(AllocError::misuse(Misuse::ZeroSizeRequest));
        }
        let parent = entry.parent();
        let local = match (&mut entry.strategy, parent) {
            (Strategy::FreeList(list), Some(parent)) => match list.take(size) {
                Some(extent) => Local::Done(Ok(extent)),
                None => Local::Forward(parent),
            },
            (strategy, _) => Local::Done(strategy.alloc(size)),
        };
        let result = match local {
            Local::Done(result) => result,
            Local::Forward(parent) => {
                let request = self.free_list_mut(id)?.parent_request(size);
                let extent = self.alloc_extent(parent, request);
                if let Ok(extent) = extent {
                    self.free_list_mut(id)?.adopt(size, extent);
                }
                extent
            }
        };

        let entry = self.entry_mut(id)?;
        match result {
            Ok(extent) => {
                if let Some(stats) = entry.stats.as_mut() {
                    stats.record_alloc(extent.size, entry.strategy.used_memory());
                }
                log_trace!(%id, offset = extent.offset, size = extent.size, "allocated");
                Ok(extent)
            }
            Err(err) => {
                if let Some(stats) = entry.stats.as_mut() {
                    stats.failed_allocations += 1;
                }
                Err(err)
            }
        }
    }

    /// Offset and size of `block` inside allocator `id`
    fn extent_of(&self, id: AllocatorId, block: &Block) -> AllocResult<Extent> {
        let entry = self.entry(id)?;
        let kind = entry.strategy.kind();
        let foreign = || {
            AllocError::violation(
                kind,
                Violation::ForeignBlock {
                    owner: block.owner,
                },
            )
        };
        if block.owner != id {
            return Err(foreign());
        }
        let offset = entry.strategy.buffer().offset_of(block.ptr).ok_or_else(foreign)?;
        if entry.epochs.is_stale(block.epoch, offset) {
            return Err(AllocError::misuse(Misuse::StaleBlock(id)));
        }
        Ok(Extent::new(offset, block.size))
    }

    fn free_extent(&mut self, id: AllocatorId, extent: Extent) -> AllocResult<()> {
        let entry = self.entry_mut(id)?;
        let parent = entry.parent();
        let local = match (&mut entry.strategy, parent) {
            (Strategy::FreeList(list), Some(parent)) => match list.route(extent) {
                Ok(Release::Cache) => {
                    list.cache(extent);
                    Local::Done(Ok(()))
                }
                Ok(Release::Parent) => Local::Forward(parent),
                Err(violation) => Local::Done(Err(AllocError::violation(AllocatorKind::FreeList, violation))),
            },
            (strategy, _) => Local::Done(strategy.dealloc(extent)),
        };
        let result = match local {
            Local::Done(result) => result,
            Local::Forward(parent) => {
                let result = self.free_extent(parent, extent);
                if result.is_ok() {
                    self.free_list_mut(id)?.forget(extent);
                }
                result
            }
        };

        let entry = self.entry_mut(id)?;
        match result {
            Ok(()) => {
                if let Some(stats) = entry.stats.as_mut() {
                    stats.record_dealloc(entry.strategy.used_memory());
                }
                log_trace!(%id, offset = extent.offset, size = extent.size, "deallocated");
                Ok(())
            }
            Err(err) => {
                if let Some(stats) = entry.stats.as_mut() {
                    stats.rejected_deallocations += 1;
                }
                Err(err)
            }
        }
    }

    /// Hands every extent free list `id` holds back to `parent`, stopping
    /// at the first one the parent refuses
    fn drain_free_list(&mut self, id: AllocatorId, parent: AllocatorId) -> AllocResult<()> {
        while let Some(extent) = self.free_list_mut(id)?.next_held() {
            self.free_extent(parent, extent)?;
            self.free_list_mut(id)?.drop_held(extent);
        }
        Ok(())
    }

    /// Escalates invariant violations to panics in strict mode
    fn enforce<T>(&self, result: AllocResult<T>) -> AllocResult<T> {
        if self.config.strict {
            if let Err(err) = &result {
                if err.is_invariant_violation() {
                    log_error!(%err, code = err.code(), "invariant violation in strict mode");
                    panic!("{err}");
                }
            }
        }
        result
    }
}
