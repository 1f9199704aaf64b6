//! Typed access to heap blocks
//!
//! [`TypedBlock`] wraps a [`Block`] holding `len` values of `T`. Values are
//! copied in and out through the heap, so no reference into allocator
//! memory outlives the borrow of the heap that produced it.
//!
//! `T` is limited to [`Plain`] types: integers, floats and arrays of them.
//! Every bit pattern is a valid value of such a type, which is what makes
//! reading back memory that was filled with debug patterns sound.
//!
//! ```
//! use strata_memory::prelude::*;
//!
//! let mut heap = Heap::default();
//! let pool = heap.create_pool(64, 16, PoolConfig::default(), None)?;
//!
//! let point = heap.alloc_value(pool, [1.0f64, 2.0])?;
//! heap.write(&point, 0, [3.0, 4.0])?;
//! assert_eq!(heap.read(&point, 0)?, [3.0, 4.0]);
//! heap.dealloc_typed(pool, point)?;
//! # Ok::<(), AllocError>(())
//! ```

use core::fmt;
use core::marker::PhantomData;

use super::{AllocatorId, Block, Heap};
use crate::core::{MemoryUsage, RegionAllocator};
use crate::error::{AllocError, AllocResult, DeallocError};

mod private {
    pub trait Sealed {}
}

/// Types that can live in allocator memory and be read back from any bytes
///
/// Sealed: only the primitive numeric types and arrays of them qualify.
pub trait Plain: Copy + private::Sealed + 'static {}

macro_rules! impl_plain {
    ($($ty:ty),* $(,)?) => {
        $(
            impl private::Sealed for $ty {}
            impl Plain for $ty {}
        )*
    };
}

impl_plain!(
    u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64,
);

impl<T: Plain, const N: usize> private::Sealed for [T; N] {}
impl<T: Plain, const N: usize> Plain for [T; N] {}

/// A block holding `len` values of `T`
#[must_use = "a block is only reclaimed by dealloc, reset, or destroying its allocator"]
pub struct TypedBlock<T: Plain> {
    block: Block,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T: Plain> TypedBlock<T> {
    /// Number of values
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false; zero-length typed blocks cannot be allocated
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The underlying block
    pub fn block(&self) -> &Block {
        &self.block
    }

    /// Gives up the typed view
    pub fn into_block(self) -> Block {
        self.block
    }

    fn offset_of(&self, index: usize) -> usize {
        assert!(
            index < self.len,
            "index {index} out of bounds for typed block of {} values",
            self.len
        );
        index * size_of::<T>()
    }
}

impl<T: Plain> fmt::Debug for TypedBlock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedBlock")
            .field("type", &core::any::type_name::<T>())
            .field("len", &self.len)
            .field("block", &self.block)
            .finish()
    }
}

impl Heap {
    /// Allocates room for one `T` from `id` and stores `value` in it
    pub fn alloc_value<T: Plain>(&mut self, id: AllocatorId, value: T) -> AllocResult<TypedBlock<T>> {
        self.alloc_slice(id, 1, value)
    }

    /// Allocates room for `len` values of `T` from `id`, each set to `fill`.
    ///
    /// Fails with [`UnsupportedAlignment`](AllocError::UnsupportedAlignment)
    /// when `T` needs stricter alignment than the allocator guarantees.
    pub fn alloc_slice<T: Plain>(
        &mut self,
        id: AllocatorId,
        len: usize,
        fill: T,
    ) -> AllocResult<TypedBlock<T>> {
        let strategy = self.strategy(id)?;
        let kind = strategy.kind();
        let guaranteed = strategy.granularity();
        if align_of::<T>() > guaranteed {
            return Err(AllocError::UnsupportedAlignment {
                kind,
                align: align_of::<T>(),
                guaranteed,
            });
        }
        let bytes = size_of::<T>()
            .checked_mul(len)
            .ok_or_else(|| AllocError::oversized(kind, usize::MAX, strategy.total_memory()))?;

        let block = self.alloc(id, bytes)?;
        let region = self.region_of(id)?;
        let base = self.extent_of(id, &block)?.offset;
        for index in 0..len {
            region.write_value(base + index * size_of::<T>(), fill);
        }
        Ok(TypedBlock {
            block,
            len,
            _marker: PhantomData,
        })
    }

    /// Copy of value `index` of `typed`
    pub fn read<T: Plain>(&self, typed: &TypedBlock<T>, index: usize) -> AllocResult<T> {
        let owner = typed.block.owner();
        let base = self.extent_of(owner, &typed.block)?.offset;
        Ok(self.region_of(owner)?.read_value(base + typed.offset_of(index)))
    }

    /// Overwrites value `index` of `typed`
    pub fn write<T: Plain>(&mut self, typed: &TypedBlock<T>, index: usize, value: T) -> AllocResult<()> {
        let owner = typed.block.owner();
        let base = self.extent_of(owner, &typed.block)?.offset;
        self.region_of(owner)?
            .write_value(base + typed.offset_of(index), value);
        Ok(())
    }

    /// All values of `typed`, in order
    pub fn to_vec<T: Plain>(&self, typed: &TypedBlock<T>) -> AllocResult<Vec<T>> {
        (0..typed.len).map(|index| self.read(typed, index)).collect()
    }

    /// Returns a typed block to `id`; a refused block comes back typed
    pub fn dealloc_typed<T: Plain>(
        &mut self,
        id: AllocatorId,
        typed: TypedBlock<T>,
    ) -> Result<(), DeallocError<TypedBlock<T>>> {
        let TypedBlock { block, len, .. } = typed;
        self.dealloc(id, block).map_err(|err| {
            err.map_block(|block| TypedBlock {
                block,
                len,
                _marker: PhantomData,
            })
        })
    }
}
