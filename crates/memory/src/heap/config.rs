//! Heap configuration

/// Configuration for a [`Heap`](super::Heap)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapConfig {
    /// Panic on invariant violations instead of returning them.
    ///
    /// The error is still logged first. Useful in tests, where a corrupting
    /// free should stop the run at the call that caused it.
    pub strict: bool,
}

impl HeapConfig {
    /// Errors are always returned
    pub fn production() -> Self {
        Self { strict: false }
    }

    /// Invariant violations panic
    pub fn debug() -> Self {
        Self { strict: true }
    }
}
