//! Stack marker for position tracking

/// Marker representing a position in the stack allocator
///
/// Rewinding to a marker releases every allocation made after the marker
/// was taken. Blocks from those allocations must not be deallocated
/// afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StackMarker {
    pub(super) position: usize,
}

impl StackMarker {
    /// Offset of the stack top when the marker was taken
    pub fn position(&self) -> usize {
        self.position
    }
}
