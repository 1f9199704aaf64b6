//! A stack allocator for LIFO (Last In, First Out) memory management.
//! Supports markers for scoped deallocation.
//!
//! ## Modules
//! - `allocator` - Main `StackAllocator` implementation with LIFO semantics
//! - `marker` - Position markers for scoped deallocation

pub mod allocator;
pub mod marker;

pub use allocator::StackAllocator;
pub use marker::StackMarker;

/// Configuration for the stack allocator
pub type StackConfig = super::FillConfig;
