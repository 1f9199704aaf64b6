//! Raw backing memory.
//!
//! Every strategy addresses its memory through byte offsets into a
//! [`Region`]. This module is the only place that turns those offsets into
//! addresses, reads or writes through them, or talks to the system
//! allocator. Everything above it is safe code over `usize` offsets.

use core::alloc::Layout;
use core::fmt;
use core::ptr::{self, NonNull};
use std::alloc;

use crate::core::types::alignment::CACHE_LINE;
use crate::error::{AllocError, AllocResult};
use crate::heap::typed::Plain;

const WORD: usize = size_of::<usize>();

/// A borrowed view of `len` writable bytes starting at `base`.
///
/// A region does not own its memory. The [`Heap`](crate::heap::Heap) keeps
/// every region's backing storage (a [`SystemRegion`] or a block of the
/// parent allocator) alive for as long as the allocator using it exists.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Region {
    base: NonNull<u8>,
    len: usize,
}

impl Region {
    /// Wraps an existing range of memory.
    ///
    /// # Safety
    ///
    /// `base..base + len` must be valid for reads and writes, must not be
    /// accessed through any other path while the region is in use, and must
    /// outlive every copy of the returned region.
    pub unsafe fn from_raw_parts(base: NonNull<u8>, len: usize) -> Self {
        Self { base, len }
    }

    /// Number of bytes in the region
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the region has no bytes
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Address of the first byte
    #[inline]
    pub fn base(&self) -> NonNull<u8> {
        self.base
    }

    /// Address of the byte at `offset`. `offset == len` yields the
    /// one-past-the-end address.
    #[inline]
    pub fn ptr_at(&self, offset: usize) -> NonNull<u8> {
        assert!(offset <= self.len, "offset {offset} outside region of {} bytes", self.len);
        // SAFETY: offset is within the region or one past its end, which is in
        // bounds of the same allocation.
        unsafe { self.base.add(offset) }
    }

    /// Inverse of [`ptr_at`](Self::ptr_at): the offset of `ptr` if it lies
    /// inside the region.
    #[inline]
    pub fn offset_of(&self, ptr: NonNull<u8>) -> Option<usize> {
        let offset = ptr.addr().get().checked_sub(self.base.addr().get())?;
        (offset < self.len).then_some(offset)
    }

    /// Whether `offset..offset + len` lies inside the region
    #[inline]
    pub fn contains_range(&self, offset: usize, len: usize) -> bool {
        offset.checked_add(len).is_some_and(|end| end <= self.len)
    }

    /// Sub-region `offset..offset + len`
    pub fn subregion(&self, offset: usize, len: usize) -> Self {
        assert!(self.contains_range(offset, len), "subregion out of bounds");
        Self {
            base: self.ptr_at(offset),
            len,
        }
    }

    /// Splits into `..mid` and `mid..`
    pub fn split_at(&self, mid: usize) -> (Self, Self) {
        (self.subregion(0, mid), self.subregion(mid, self.len - mid))
    }

    /// Reads a machine word stored at `offset`; no alignment is required.
    #[inline]
    pub fn read_word(&self, offset: usize) -> usize {
        assert!(self.contains_range(offset, WORD), "word read out of bounds");
        // SAFETY: the range was bounds-checked and the region is readable.
        unsafe { ptr::read_unaligned(self.ptr_at(offset).as_ptr().cast::<usize>()) }
    }

    /// Writes a machine word at `offset`; no alignment is required.
    #[inline]
    pub fn write_word(&self, offset: usize, value: usize) {
        assert!(self.contains_range(offset, WORD), "word write out of bounds");
        // SAFETY: the range was bounds-checked and the region is writable.
        unsafe { ptr::write_unaligned(self.ptr_at(offset).as_ptr().cast::<usize>(), value) }
    }

    /// Moves `len` bytes from `src` to `dst`; the ranges may overlap.
    pub fn copy_within(&self, src: usize, dst: usize, len: usize) {
        assert!(
            self.contains_range(src, len) && self.contains_range(dst, len),
            "copy out of bounds"
        );
        // SAFETY: both ranges were bounds-checked; `ptr::copy` handles overlap.
        unsafe { ptr::copy(self.ptr_at(src).as_ptr(), self.ptr_at(dst).as_ptr(), len) }
    }

    /// Sets `len` bytes at `offset` to `byte`
    pub fn fill(&self, offset: usize, len: usize, byte: u8) {
        assert!(self.contains_range(offset, len), "fill out of bounds");
        // SAFETY: the range was bounds-checked and the region is writable.
        unsafe { ptr::write_bytes(self.ptr_at(offset).as_ptr(), byte, len) }
    }

    /// Shared view of `offset..offset + len`.
    ///
    /// The slice borrows the region value; callers keep the owning
    /// allocator borrowed for as long as the slice is alive.
    pub fn bytes(&self, offset: usize, len: usize) -> &[u8] {
        assert!(self.contains_range(offset, len), "slice out of bounds");
        // SAFETY: in bounds, readable, and the borrow of `self` ties the slice
        // to the allocator that hands out the region.
        unsafe { core::slice::from_raw_parts(self.ptr_at(offset).as_ptr(), len) }
    }

    /// Mutable view of `offset..offset + len`.
    pub fn bytes_mut(&mut self, offset: usize, len: usize) -> &mut [u8] {
        assert!(self.contains_range(offset, len), "slice out of bounds");
        // SAFETY: in bounds, writable, and the exclusive borrow of `self` keeps
        // any other view through this region from coexisting with the slice.
        unsafe { core::slice::from_raw_parts_mut(self.ptr_at(offset).as_ptr(), len) }
    }

    /// Reads a `T` stored at `offset`; no alignment is required.
    pub fn read_value<T: Plain>(&self, offset: usize) -> T {
        assert!(self.contains_range(offset, size_of::<T>()), "value read out of bounds");
        // SAFETY: in bounds and readable. `Plain` types are valid for every bit
        // pattern, so whatever the bytes hold is a valid `T`.
        unsafe { ptr::read_unaligned(self.ptr_at(offset).as_ptr().cast::<T>()) }
    }

    /// Writes `value` at `offset`; no alignment is required.
    pub fn write_value<T: Plain>(&self, offset: usize, value: T) {
        assert!(self.contains_range(offset, size_of::<T>()), "value write out of bounds");
        // SAFETY: in bounds and writable.
        unsafe { ptr::write_unaligned(self.ptr_at(offset).as_ptr().cast::<T>(), value) }
    }
}

// SAFETY: a region is an address range, not shared state. The heap that owns
// every region is the only thing that reads or writes through it.
unsafe impl Send for Region {}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("base", &self.base)
            .field("len", &self.len)
            .finish()
    }
}

/// Region obtained from the system allocator and released on drop.
///
/// Root allocators (those without a parent) own one of these.
pub struct SystemRegion {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl SystemRegion {
    /// Allocates `size` bytes aligned to a cache line.
    pub fn allocate(size: usize) -> AllocResult<Self> {
        if size == 0 {
            return Err(AllocError::invalid_config("system region size must be non-zero"));
        }
        let layout = Layout::from_size_align(size, CACHE_LINE)
            .map_err(|_| AllocError::invalid_config("system region size overflows a Layout"))?;

        // SAFETY: layout has non-zero size.
        let raw = unsafe { alloc::alloc(layout) };
        let ptr = NonNull::new(raw).ok_or_else(|| AllocError::system_allocation_failed(size, CACHE_LINE))?;
        Ok(Self { ptr, layout })
    }

    /// View of the whole allocation
    pub fn region(&self) -> Region {
        // SAFETY: the allocation is live until `self` drops, and the heap keeps
        // the system region alive for as long as the allocator using the view.
        unsafe { Region::from_raw_parts(self.ptr, self.layout.size()) }
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.layout.size()
    }
}

// SAFETY: the region exclusively owns its allocation, which the system
// allocator lets any thread release.
unsafe impl Send for SystemRegion {}

impl Drop for SystemRegion {
    fn drop(&mut self) {
        // SAFETY: `ptr` came from `alloc::alloc` with exactly this layout and is
        // freed only here.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

impl fmt::Debug for SystemRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemRegion")
            .field("ptr", &self.ptr)
            .field("size", &self.layout.size())
            .finish()
    }
}
