//! Blocks handed out by the heap

use core::ptr::NonNull;

use super::AllocatorId;

/// A live allocation: `size` bytes starting at `ptr`.
///
/// Blocks are move-only. Handing one back to [`Heap::dealloc`] consumes
/// it, so the same value cannot be freed twice. `size` is the request
/// rounded up to the allocator's unit and is at least what was asked for.
///
/// A block records the allocator that produced it and that allocator's
/// epoch; the heap rejects blocks from another allocator, from before a
/// reset, and stack blocks released by a rewind.
///
/// [`Heap::dealloc`]: super::Heap::dealloc
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a block is only reclaimed by dealloc, reset, or destroying its allocator"]
pub struct Block {
    pub(super) ptr: NonNull<u8>,
    pub(super) size: usize,
    pub(super) owner: AllocatorId,
    pub(super) epoch: u64,
}

impl Block {
    /// Address of the first byte
    #[inline]
    pub fn ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Raw address of the first byte
    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Usable size in bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Allocator the block came from
    #[inline]
    pub fn owner(&self) -> AllocatorId {
        self.owner
    }

    /// Address one past the last byte
    #[inline]
    pub fn end_addr(&self) -> usize {
        self.ptr.addr().get() + self.size
    }

    /// Whether the two blocks share any byte
    pub fn overlaps(&self, other: &Self) -> bool {
        self.ptr.addr().get() < other.end_addr() && other.ptr.addr().get() < self.end_addr()
    }
}
