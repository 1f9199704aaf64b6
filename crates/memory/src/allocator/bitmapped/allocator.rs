//! Fixed-block allocator tracked by a single 64-bit mask
//!
//! The buffer is exactly 64 blocks of `block_size` bytes. A request takes
//! the first run of clear bits long enough to cover it; the mask is the
//! only record of which blocks are live.

use super::BitmappedConfig;
use super::mask::{BLOCKS, find_clear_run, is_run_set, run_length, run_mask};
use crate::core::region::Region;
use crate::core::types::alignment::CACHE_LINE;
use crate::core::{AllocatorKind, Extent, MemoryUsage, RegionAllocator, Resettable};
use crate::error::{AllocError, AllocResult, Violation};
use crate::utils::checked_align_up;

const KIND: AllocatorKind = AllocatorKind::BitmappedBlock;

/// Bitmapped-block allocator
#[derive(Debug)]
pub struct BitmappedAllocator {
    buffer: Region,
    block_size: usize,
    mask: u64,
    alloc_pattern: Option<u8>,
    dealloc_pattern: Option<u8>,
}

impl BitmappedAllocator {
    /// Block size after rounding `requested` up to a cache line
    pub fn block_size_for(requested: usize) -> AllocResult<usize> {
        if requested == 0 {
            return Err(AllocError::invalid_config("bitmapped block size cannot be zero"));
        }
        checked_align_up(requested, CACHE_LINE)
            .ok_or_else(|| AllocError::invalid_config("bitmapped block size overflows"))
    }

    /// Buffer bytes for 64 blocks of `block_size`
    pub fn region_size(block_size: usize) -> AllocResult<usize> {
        Self::block_size_for(block_size)?
            .checked_mul(BLOCKS as usize)
            .ok_or_else(|| AllocError::invalid_config("bitmapped size calculation overflows"))
    }

    pub(crate) fn with_config(
        buffer: Region,
        block_size: usize,
        config: &BitmappedConfig,
    ) -> AllocResult<Self> {
        let block_size = Self::block_size_for(block_size)?;
        let size = Self::region_size(block_size)?;
        if size > buffer.len() {
            return Err(AllocError::invalid_config("bitmapped buffer smaller than 64 blocks"));
        }
        Ok(Self {
            buffer: buffer.subregion(0, size),
            block_size,
            mask: 0,
            alloc_pattern: config.alloc_pattern,
            dealloc_pattern: config.dealloc_pattern,
        })
    }

    pub(crate) fn buffer(&self) -> &Region {
        &self.buffer
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut Region {
        &mut self.buffer
    }

    /// Size of one block
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Current occupancy mask; bit `i` set means block `i` is live
    pub fn mask(&self) -> u64 {
        self.mask
    }

    /// Number of clear bits
    pub fn free_blocks(&self) -> u32 {
        self.mask.count_zeros()
    }

    fn max_request(&self) -> usize {
        self.block_size * BLOCKS as usize
    }

    /// Run length for a request of `size` bytes
    fn blocks_for(&self, size: usize) -> AllocResult<u32> {
        checked_align_up(size, CACHE_LINE)
            .map(|bytes| bytes.div_ceil(self.block_size))
            .and_then(run_length)
            .ok_or_else(|| AllocError::oversized(KIND, size, self.max_request()))
    }

    fn validate_free(&self, extent: Extent) -> Result<(u32, u32), Violation> {
        if extent.size == 0 || extent.end() > self.max_request() {
            return Err(Violation::OutOfBounds {
                offset: extent.offset,
                size: extent.size,
            });
        }
        if extent.offset % self.block_size != 0 {
            return Err(Violation::Misaligned {
                offset: extent.offset,
                align: self.block_size,
            });
        }
        if extent.size % self.block_size != 0 {
            return Err(Violation::NodeSizeMismatch {
                expected: self.block_size,
                actual: extent.size,
            });
        }

        let start = (extent.offset / self.block_size) as u32;
        let len = (extent.size / self.block_size) as u32;
        if !is_run_set(self.mask, start, len) {
            return Err(Violation::DoubleFree {
                offset: extent.offset,
                size: extent.size,
            });
        }
        Ok((start, len))
    }
}

impl RegionAllocator for BitmappedAllocator {
    fn kind(&self) -> AllocatorKind {
        KIND
    }

    fn alloc(&mut self, size: usize) -> AllocResult<Extent> {
        let len = self.blocks_for(size)?;
        let start = find_clear_run(self.mask, len).ok_or_else(|| {
            AllocError::out_of_capacity(KIND, size, self.available_memory())
        })?;

        self.mask |= run_mask(start, len);
        let extent = Extent::new(
            start as usize * self.block_size,
            len as usize * self.block_size,
        );
        if let Some(pattern) = self.alloc_pattern {
            self.buffer.fill(extent.offset, extent.size, pattern);
        }
        Ok(extent)
    }

    fn dealloc(&mut self, extent: Extent) -> AllocResult<()> {
        let (start, len) = self
            .validate_free(extent)
            .map_err(|violation| AllocError::violation(KIND, violation))?;

        if let Some(pattern) = self.dealloc_pattern {
            self.buffer.fill(extent.offset, extent.size, pattern);
        }
        self.mask &= !run_mask(start, len);
        Ok(())
    }

    fn granularity(&self) -> usize {
        CACHE_LINE
    }
}

impl MemoryUsage for BitmappedAllocator {
    fn used_memory(&self) -> usize {
        self.mask.count_ones() as usize * self.block_size
    }

    fn available_memory(&self) -> usize {
        self.free_blocks() as usize * self.block_size
    }
}

impl Resettable for BitmappedAllocator {
    fn reset(&mut self) {
        self.mask = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::region::SystemRegion;

    fn bitmapped(block_size: usize) -> (SystemRegion, BitmappedAllocator) {
        let size = BitmappedAllocator::region_size(block_size).expect("size");
        let sys = SystemRegion::allocate(size).expect("system region");
        let alloc = BitmappedAllocator::with_config(sys.region(), block_size, &BitmappedConfig::production())
            .expect("bitmapped");
        (sys, alloc)
    }

    #[test]
    fn test_block_size_rounds_to_cache_line() {
        assert_eq!(BitmappedAllocator::block_size_for(1).expect("size"), 64);
        assert_eq!(BitmappedAllocator::block_size_for(100).expect("size"), 128);
        assert_eq!(BitmappedAllocator::region_size(64).expect("size"), 64 * 64);
    }

    #[test]
    fn test_requests_round_to_whole_blocks() {
        let (_sys, mut b) = bitmapped(1024);
        assert_eq!(b.alloc(1).expect("alloc"), Extent::new(0, 1024));
        assert_eq!(b.alloc(1025).expect("alloc"), Extent::new(1024, 2048));
        assert_eq!(b.mask(), 0b111);
    }

    #[test]
    fn test_non_power_of_two_block_size() {
        let (_sys, mut b) = bitmapped(192);
        let e = b.alloc(500).expect("alloc");
        assert_eq!(e, Extent::new(0, 576));
        assert_eq!(b.mask(), 0b111);
    }

    #[test]
    fn test_oversized_request_has_no_side_effects() {
        let (_sys, mut b) = bitmapped(64);
        let err = b.alloc(64 * 65).unwrap_err();
        assert!(matches!(err, AllocError::OversizedRequest { max: 4096, .. }));
        assert_eq!(b.mask(), 0);
        assert_eq!(b.alloc(64 * 64).expect("alloc"), Extent::new(0, 4096));
        assert_eq!(b.mask(), u64::MAX);
    }

    #[test]
    fn test_first_fit_run_after_fragmentation() {
        let (_sys, mut b) = bitmapped(64);
        let e: Vec<Extent> = (0..4).map(|_| b.alloc(64).expect("alloc")).collect();
        b.dealloc(e[1]).expect("dealloc");
        b.dealloc(e[2]).expect("dealloc");
        assert_eq!(b.alloc(128).expect("alloc"), Extent::new(64, 128));
        assert_eq!(b.alloc(128).expect("alloc"), Extent::new(256, 128));
    }

    #[test]
    fn test_invalid_frees_rejected() {
        let (_sys, mut b) = bitmapped(64);
        let a = b.alloc(128).expect("alloc");
        for bad in [
            Extent::new(32, 64),
            Extent::new(0, 96),
            Extent::new(128, 64),
            Extent::new(4032, 128),
        ] {
            assert!(b.dealloc(bad).unwrap_err().is_invariant_violation());
        }
        assert_eq!(b.mask(), 0b11);
        b.dealloc(a).expect("dealloc");
        assert!(b.dealloc(a).unwrap_err().is_invariant_violation());
    }
}
