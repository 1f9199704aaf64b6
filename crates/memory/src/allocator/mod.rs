//! Allocation strategies
//!
//! Every strategy works on byte offsets inside a buffer handed to it at
//! construction and implements [`RegionAllocator`](crate::core::RegionAllocator).
//! The free list is the one strategy without a buffer of its own: it shares
//! its parent's. [`Strategy`] is the closed sum of all five; the [`Heap`](crate::heap::Heap)
//! owns them and translates offsets to pointers.

pub mod bitmapped;
pub mod block;
pub mod config;
pub mod free_list;
pub mod pool;
pub mod stack;
pub mod stats;
pub mod strategy;

pub use bitmapped::{BitmappedAllocator, BitmappedConfig};
pub use block::{BlockAllocator, BlockConfig};
pub use config::FillConfig;
pub use free_list::{FreeListAllocator, FreeListConfig};
pub use pool::{PoolAllocator, PoolConfig};
pub use stack::{StackAllocator, StackConfig, StackMarker};
pub use stats::AllocatorStats;
pub use strategy::{AllocatorSpec, Strategy};
