//! Size-class free list layered on a parent allocator
//!
//! ## Modules
//! - `allocator` - Main `FreeListAllocator`: node cache plus the blocks it has handed out

pub mod allocator;

pub use allocator::FreeListAllocator;

/// Configuration for the free-list allocator
pub type FreeListConfig = super::FillConfig;
