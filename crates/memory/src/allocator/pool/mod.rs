//! Pool allocator for fixed-size nodes
//!
//! ## Modules
//! - `allocator` - Main `PoolAllocator` with an intrusive free list

pub mod allocator;

pub use allocator::PoolAllocator;

/// Configuration for the pool allocator
pub type PoolConfig = super::FillConfig;
