//! Allocator handles

use core::fmt;
use core::num::NonZeroU32;

/// Handle to an allocator registered in a [`Heap`](super::Heap)
///
/// A handle is a slot index plus the generation the slot had when the
/// allocator was created. Destroying an allocator bumps the slot's
/// generation, so handles to it stop resolving even after the slot is
/// reused. `NonZeroU32` keeps `Option<AllocatorId>` the same size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllocatorId {
    index: u32,
    generation: NonZeroU32,
}

impl AllocatorId {
    pub(crate) const fn new(index: u32, generation: NonZeroU32) -> Self {
        Self { index, generation }
    }

    /// Slot index inside the heap
    #[inline]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Generation of the slot when the allocator was created
    #[inline]
    pub const fn generation(self) -> u32 {
        self.generation.get()
    }

    #[inline]
    pub(crate) const fn slot(self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for AllocatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}
