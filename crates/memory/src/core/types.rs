//! Common types and constants for memory management

use core::fmt;

/// Memory alignment requirements
pub mod alignment {
    /// Allocation unit of the stack and block strategies, and the minimum
    /// node granularity of the pool strategy.
    pub const MIN_ALIGN: usize = 16;

    /// Granularity of bitmapped blocks and alignment of system-backed regions.
    pub const CACHE_LINE: usize = 64;
}

/// Memory size constants
pub mod size {
    /// 1 Kilobyte
    pub const KB: usize = 1024;

    /// 1 Megabyte
    pub const MB: usize = 1024 * KB;

    /// 1 Gigabyte
    pub const GB: usize = 1024 * MB;
}

/// Which strategy an allocator implements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocatorKind {
    /// Bump pointer with LIFO reclamation
    Stack,
    /// Fixed-size nodes on an intrusive free list
    Pool,
    /// Address-ordered coalescing free list
    Block,
    /// 64 fixed blocks tracked by a bitmask
    BitmappedBlock,
    /// Size-class cache in front of a parent allocator
    FreeList,
}

impl AllocatorKind {
    /// Short lowercase name, used in log fields and error messages
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stack => "stack",
            Self::Pool => "pool",
            Self::Block => "block",
            Self::BitmappedBlock => "bitmapped",
            Self::FreeList => "free-list",
        }
    }
}

impl fmt::Display for AllocatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A byte range inside an allocator's buffer, as seen by a strategy.
///
/// Strategies hand out and take back extents; the heap turns them into
/// pointer-carrying [`Block`](crate::heap::Block)s at the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Extent {
    /// Offset of the first byte from the start of the buffer
    pub offset: usize,
    /// Length in bytes
    pub size: usize,
}

impl Extent {
    /// Creates an extent
    pub const fn new(offset: usize, size: usize) -> Self {
        Self { offset, size }
    }

    /// One past the last byte
    pub const fn end(&self) -> usize {
        self.offset + self.size
    }

    /// Whether the two extents share at least one byte
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }
}
