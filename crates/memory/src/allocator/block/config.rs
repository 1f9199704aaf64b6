//! Block allocator configuration

use crate::allocator::FillConfig;
use crate::core::types::alignment::MIN_ALIGN;

/// Configuration for the block (free-list) allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockConfig {
    /// Statistics and fill patterns
    pub fill: FillConfig,

    /// Descriptor table capacity; `None` sizes it for the worst case
    pub max_descriptors: Option<usize>,
}

impl From<FillConfig> for BlockConfig {
    fn from(fill: FillConfig) -> Self {
        Self {
            fill,
            max_descriptors: None,
        }
    }
}

impl BlockConfig {
    /// Production configuration - no fills, no stats
    #[must_use]
    pub const fn production() -> Self {
        Self {
            fill: FillConfig::production(),
            max_descriptors: None,
        }
    }

    /// Debug configuration - fill patterns and stats
    #[must_use]
    pub const fn debug() -> Self {
        Self {
            fill: FillConfig::debug(),
            max_descriptors: None,
        }
    }

    /// Bounds the descriptor table to `max_descriptors` entries.
    ///
    /// A bounded table can fill up under fragmentation; a free that needs
    /// a new descriptor then fails with
    /// [`DescriptorTableFull`](crate::error::AllocError::DescriptorTableFull)
    /// and the block stays with the caller.
    #[must_use]
    pub const fn with_max_descriptors(mut self, max_descriptors: usize) -> Self {
        self.max_descriptors = Some(max_descriptors);
        self
    }

    /// Descriptor table capacity for a buffer of `capacity` bytes.
    ///
    /// Unless set explicitly this is the most free extents the buffer can
    /// ever hold: one per two allocation units, plus one.
    pub const fn descriptors_for(&self, capacity: usize) -> usize {
        match self.max_descriptors {
            Some(max) => max,
            None => worst_case_descriptors(capacity),
        }
    }
}

/// Free extents a fully fragmented buffer of `capacity` bytes can hold
pub const fn worst_case_descriptors(capacity: usize) -> usize {
    capacity.div_ceil(2 * MIN_ALIGN) + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_sizing() {
        assert_eq!(BlockConfig::production().descriptors_for(1024 * 1024), 32 * 1024 + 1);
        assert_eq!(BlockConfig::production().descriptors_for(16), 2);
        assert_eq!(
            BlockConfig::debug().with_max_descriptors(3).descriptors_for(1024 * 1024),
            3
        );
        assert_eq!(BlockConfig::from(FillConfig::debug()), BlockConfig::debug());
    }
}
