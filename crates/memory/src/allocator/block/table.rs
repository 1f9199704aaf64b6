//! Free-descriptor table stored at the front of the block allocator's region.
//!
//! Each descriptor is two machine words, `offset` then `size`, relative to
//! the allocator's buffer. Entries `0..len` are strictly address-sorted and
//! no entry ends where the next begins.

use crate::core::Extent;
use crate::core::region::Region;

const WORD: usize = size_of::<usize>();

/// Bytes occupied by one descriptor
pub const DESCRIPTOR_SIZE: usize = 2 * WORD;

/// Width of the coarse pass in both searches
const STRIDE: usize = 8;

#[derive(Debug)]
pub(crate) struct DescriptorTable {
    storage: Region,
    len: usize,
    capacity: usize,
}

impl DescriptorTable {
    /// Table of `capacity` descriptors stored at the front of `storage`
    pub(crate) fn new(storage: Region, capacity: usize) -> Self {
        debug_assert!(capacity * DESCRIPTOR_SIZE <= storage.len());
        Self {
            storage,
            len: 0,
            capacity,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    pub(crate) fn get(&self, index: usize) -> Extent {
        debug_assert!(index < self.len);
        let at = index * DESCRIPTOR_SIZE;
        Extent::new(self.storage.read_word(at), self.storage.read_word(at + WORD))
    }

    pub(crate) fn set(&mut self, index: usize, extent: Extent) {
        debug_assert!(index < self.len);
        let at = index * DESCRIPTOR_SIZE;
        self.storage.write_word(at, extent.offset);
        self.storage.write_word(at + WORD, extent.size);
    }

    /// Inserts at `index`, shifting `index..len` right by one. The caller
    /// checks [`is_full`](Self::is_full) first.
    pub(crate) fn insert(&mut self, index: usize, extent: Extent) {
        debug_assert!(index <= self.len && !self.is_full());
        let tail = (self.len - index) * DESCRIPTOR_SIZE;
        if tail > 0 {
            let from = index * DESCRIPTOR_SIZE;
            self.storage.copy_within(from, from + DESCRIPTOR_SIZE, tail);
        }
        self.len += 1;
        self.set(index, extent);
    }

    /// Removes `index`, shifting `index + 1..len` left by one
    pub(crate) fn remove(&mut self, index: usize) {
        debug_assert!(index < self.len);
        let tail = (self.len - index - 1) * DESCRIPTOR_SIZE;
        if tail > 0 {
            let to = index * DESCRIPTOR_SIZE;
            self.storage.copy_within(to + DESCRIPTOR_SIZE, to, tail);
        }
        self.len -= 1;
    }

    pub(crate) fn clear(&mut self) {
        self.len = 0;
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = Extent> + '_ {
        (0..self.len).map(|i| self.get(i))
    }

    /// Index of the first descriptor, in address order, at least `size`
    /// bytes long.
    ///
    /// Whole groups of [`STRIDE`] descriptors are rejected by their largest
    /// member before the winning group is scanned entry by entry, which keeps
    /// the result first-fit.
    pub(crate) fn first_fit(&self, size: usize) -> Option<usize> {
        let mut group = 0;
        while group + STRIDE <= self.len {
            let largest = (group..group + STRIDE)
                .map(|i| self.get(i).size)
                .max()
                .unwrap_or(0);
            if largest >= size {
                break;
            }
            group += STRIDE;
        }
        (group..self.len).find(|&i| self.get(i).size >= size)
    }

    /// Index of the first descriptor starting at or after `offset`, or
    /// `len` if there is none.
    pub(crate) fn lower_bound(&self, offset: usize) -> usize {
        let mut index = 0;
        while index + STRIDE <= self.len && self.get(index + STRIDE - 1).offset < offset {
            index += STRIDE;
        }
        while index < self.len && self.get(index).offset < offset {
            index += 1;
        }
        index
    }
}
