//! # strata-memory
//!
//! Composable user-space allocators that carve memory out of one another.
//!
//! This crate provides five allocation strategies:
//! - **Stack**: bump pointer with LIFO frees and markers
//! - **Pool**: fixed-size nodes on an intrusive free list
//! - **Block**: variable-size first-fit with coalescing frees
//! - **Bitmapped block**: 64 fixed blocks tracked by one `u64` mask
//! - **Free list**: size-class cache in front of a parent allocator
//!
//! Any allocator can take its memory from the system or from a parent
//! allocator, so a block allocator can host a handful of pools and a
//! scratch stack, each returning its region to the parent when destroyed.
//! A free list always sits on a parent and keeps freed nodes of its size
//! class for reuse instead of returning them.
//!
//! ## Quick Start
//!
//! ```rust
//! use strata_memory::prelude::*;
//!
//! let mut heap = Heap::new(HeapConfig::default());
//! let general = heap.create_block(MB, BlockConfig::default(), None)?;
//! let nodes = heap.create_pool(48, 128, PoolConfig::default(), Some(general))?;
//!
//! let node = heap.alloc(nodes, 48)?;
//! heap.dealloc(nodes, node)?;
//!
//! heap.destroy(nodes)?;
//! assert_eq!(heap.usage(general)?.used, 0);
//! # Ok::<(), AllocError>(())
//! ```
//!
//! ## Features
//!
//! - `logging` (default): structured diagnostics through `tracing`
//!
//! ## Architecture
//!
//! - [`core`]: offsets, extents, and the traits every strategy implements
//! - [`allocator`]: the five strategies and their configs
//! - [`heap`]: handle registry, parent/child composition, typed access
//! - [`error`]: one error enum for capacity, corruption, and misuse
//!
//! Strategies are safe code over byte offsets. Raw pointers appear only in
//! the private region layer and in the [`Block`](heap::Block) values the
//! heap hands out.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rust_2018_idioms)]

pub mod allocator;
pub mod core;
pub mod error;
pub mod heap;
mod macros;
pub mod utils;

// Public API exports
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    // Core types
    pub use crate::core::types::alignment::{CACHE_LINE, MIN_ALIGN};
    pub use crate::core::types::size::{GB, KB, MB};
    pub use crate::core::{AllocatorKind, Extent, MemoryUsage, RegionAllocator, Resettable, UsageSnapshot};

    // Error types
    pub use crate::error::{AllocError, AllocResult, DeallocError, ErrorCategory, Misuse, Violation};

    // Allocator types
    pub use crate::allocator::{
        AllocatorSpec, AllocatorStats, BitmappedConfig, BlockConfig, FillConfig, FreeListConfig,
        PoolConfig, StackConfig, StackMarker, Strategy,
    };

    // Heap
    pub use crate::heap::{AllocatorId, Block, Heap, HeapConfig, Plain, TypedBlock};
}

// Re-export the main entry points at crate root for convenience
pub use crate::error::{AllocError, AllocResult, DeallocError};
pub use crate::heap::{AllocatorId, Block, Heap, HeapConfig};
