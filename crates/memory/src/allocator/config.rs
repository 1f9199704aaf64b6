//! Configuration shared by every strategy
//!
//! Stack, pool, bitmapped and free-list allocators are configured by a
//! [`FillConfig`] alone; the block allocator extends it with its
//! descriptor table size.

/// Statistics and debug fill patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillConfig {
    /// Enable statistics tracking
    pub track_stats: bool,

    /// Fill pattern byte for newly allocated memory (for debugging)
    pub alloc_pattern: Option<u8>,

    /// Fill pattern byte for freed memory (for debugging).
    ///
    /// Allocators that keep a link inside a free node (pool, free list)
    /// leave that link unfilled.
    pub dealloc_pattern: Option<u8>,
}

/// Byte written over fresh allocations by [`FillConfig::debug`]
pub const ALLOC_PATTERN: u8 = 0xCC;

/// Byte written over freed memory by [`FillConfig::debug`]
pub const DEALLOC_PATTERN: u8 = 0xDD;

impl Default for FillConfig {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::debug()
        } else {
            Self::production()
        }
    }
}

impl FillConfig {
    /// Production configuration - no fills, no stats
    #[must_use]
    pub const fn production() -> Self {
        Self {
            track_stats: false,
            alloc_pattern: None,
            dealloc_pattern: None,
        }
    }

    /// Debug configuration - fill patterns and stats
    #[must_use]
    pub const fn debug() -> Self {
        Self {
            track_stats: true,
            alloc_pattern: Some(ALLOC_PATTERN),
            dealloc_pattern: Some(DEALLOC_PATTERN),
        }
    }

    /// Turns statistics on or off
    #[must_use]
    pub const fn with_stats(mut self, track_stats: bool) -> Self {
        self.track_stats = track_stats;
        self
    }
}
