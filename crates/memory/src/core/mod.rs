//! Core building blocks shared by every strategy:
//! - Common types and constants
//! - Capability traits
//! - Raw backing regions (the crate's only `unsafe` code)

#[allow(unsafe_code)]
pub(crate) mod region;
pub mod traits;
pub mod types;

pub use traits::{MemoryUsage, RegionAllocator, Resettable, UsageSnapshot};
pub use types::*;
