//! Bitmapped-block allocator: 64 fixed blocks, one occupancy mask
//!
//! ## Modules
//! - `allocator` - Main `BitmappedAllocator`
//! - `mask` - Bit-run search and run sizing helpers

pub mod allocator;
pub mod mask;

pub use allocator::BitmappedAllocator;

/// Configuration for the bitmapped-block allocator
pub type BitmappedConfig = super::FillConfig;
