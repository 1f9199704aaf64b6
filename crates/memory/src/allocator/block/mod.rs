//! General-purpose free-list allocator with neighbour coalescing
//!
//! ## Modules
//! - `allocator` - Main `BlockAllocator`: first-fit alloc, four-case merging free
//! - `config` - `BlockConfig` and descriptor table sizing
//! - `table` - In-region descriptor array with stride-then-linear search

pub mod allocator;
pub mod config;
mod table;

pub use allocator::BlockAllocator;
pub use config::BlockConfig;
pub use table::DESCRIPTOR_SIZE;
