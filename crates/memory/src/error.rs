//! Error types for strata-memory
//!
//! Uses thiserror for clean, idiomatic Rust error definitions. Every
//! failure is reported before the allocator it concerns changes state, so
//! an `Err` leaves the heap as it was. The one exception is a free list
//! whose parent refuses memory while it is being drained on reset or
//! destroy; see [`Heap::destroy`](crate::heap::Heap::destroy).

use core::fmt;

use thiserror::Error;

use crate::core::types::AllocatorKind;
use crate::heap::{AllocatorId, Block};
use crate::macros::{log_debug, log_error, log_warn};

/// Result alias used throughout the crate
pub type AllocResult<T> = Result<T, AllocError>;

// ============================================================================
// Main Error Types
// ============================================================================

/// Allocation errors
#[must_use = "errors should be handled"]
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    // --- Capacity Errors (recoverable) ---
    #[error("{kind} allocator out of capacity: requested {requested} bytes, {available} bytes free")]
    OutOfCapacity {
        kind: AllocatorKind,
        requested: usize,
        available: usize,
    },

    #[error("{kind} allocator cannot serve {requested} bytes in one request (max: {max})")]
    OversizedRequest {
        kind: AllocatorKind,
        requested: usize,
        max: usize,
    },

    #[error("free-descriptor table is full ({capacity} entries)")]
    DescriptorTableFull { capacity: usize },

    // --- Corrupting frees and mismatched blocks ---
    #[error("{kind} allocator invariant violated: {violation}")]
    InvariantViolation {
        kind: AllocatorKind,
        violation: Violation,
    },

    // --- API misuse ---
    #[error("allocator misuse: {0}")]
    Misuse(#[from] Misuse),

    // --- Construction Errors ---
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("alignment {align} exceeds the {guaranteed}-byte guarantee of the {kind} allocator")]
    UnsupportedAlignment {
        kind: AllocatorKind,
        align: usize,
        guaranteed: usize,
    },

    #[error("System allocation failed: {size} bytes with {align} byte alignment")]
    SystemAllocationFailed { size: usize, align: usize },
}

/// A free that would corrupt allocator state, detected before any mutation
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    #[error("block belongs to allocator {owner}")]
    ForeignBlock { owner: AllocatorId },

    #[error("block at offset {offset} ({size} bytes) lies outside the buffer")]
    OutOfBounds { offset: usize, size: usize },

    #[error("block at offset {offset} is not aligned to {align} bytes")]
    Misaligned { offset: usize, align: usize },

    #[error("block size {actual} does not match node size {expected}")]
    NodeSizeMismatch { expected: usize, actual: usize },

    #[error("block at offset {offset} ({size} bytes) is already free")]
    DoubleFree { offset: usize, size: usize },
}

/// Calls the API does not accept in the current state
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Misuse {
    #[error("allocator {0} has been destroyed")]
    Destroyed(AllocatorId),

    #[error("allocator {0} was not created by this heap")]
    UnknownAllocator(AllocatorId),

    #[error("zero-size allocation request")]
    ZeroSizeRequest,

    #[error("allocator {id} still has {children} live child allocator(s)")]
    LiveChildren { id: AllocatorId, children: usize },

    #[error("block predates the last reset of allocator {0}")]
    StaleBlock(AllocatorId),

    #[error("stack marker at offset {position} lies above the current top {top}")]
    MarkerAboveTop { position: usize, top: usize },

    #[error("{operation} is not supported by the {kind} allocator")]
    Unsupported {
        operation: &'static str,
        kind: AllocatorKind,
    },
}

/// Broad grouping of [`AllocError`] variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The allocator is full or the request can never fit
    Capacity,
    /// A free would have corrupted allocator state
    Invariant,
    /// The call is invalid for the allocator's state
    Misuse,
    /// Bad construction arguments
    Config,
    /// The system allocator failed
    System,
}

impl AllocError {
    /// Whether the caller can recover by freeing memory or asking another allocator
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self.category(), ErrorCategory::Capacity)
    }

    /// Whether this is an [`InvariantViolation`](Self::InvariantViolation)
    #[must_use]
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::InvariantViolation { .. })
    }

    /// The misuse detail, if this is a misuse error
    #[must_use]
    pub fn as_misuse(&self) -> Option<Misuse> {
        match self {
            Self::Misuse(m) => Some(*m),
            _ => None,
        }
    }

    /// Broad category of the error
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::OutOfCapacity { .. }
            | Self::OversizedRequest { .. }
            | Self::DescriptorTableFull { .. } => ErrorCategory::Capacity,
            Self::InvariantViolation { .. } => ErrorCategory::Invariant,
            Self::Misuse(_) => ErrorCategory::Misuse,
            Self::InvalidConfig { .. } | Self::UnsupportedAlignment { .. } => {
                ErrorCategory::Config
            }
            Self::SystemAllocationFailed { .. } => ErrorCategory::System,
        }
    }

    /// Get error code for categorization
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::OutOfCapacity { .. } => "MEM:CAPACITY:EXHAUSTED",
            Self::OversizedRequest { .. } => "MEM:CAPACITY:OVERSIZED",
            Self::DescriptorTableFull { .. } => "MEM:CAPACITY:TABLE_FULL",
            Self::InvariantViolation { violation, .. } => match violation {
                Violation::ForeignBlock { .. } => "MEM:INVARIANT:FOREIGN",
                Violation::OutOfBounds { .. } => "MEM:INVARIANT:BOUNDS",
                Violation::Misaligned { .. } => "MEM:INVARIANT:ALIGN",
                Violation::NodeSizeMismatch { .. } => "MEM:INVARIANT:NODE_SIZE",
                Violation::DoubleFree { .. } => "MEM:INVARIANT:DOUBLE_FREE",
            },
            Self::Misuse(misuse) => match misuse {
                Misuse::Destroyed(_) => "MEM:MISUSE:DESTROYED",
                Misuse::UnknownAllocator(_) => "MEM:MISUSE:UNKNOWN",
                Misuse::ZeroSizeRequest => "MEM:MISUSE:ZERO_SIZE",
                Misuse::LiveChildren { .. } => "MEM:MISUSE:LIVE_CHILDREN",
                Misuse::StaleBlock(_) => "MEM:MISUSE:STALE_BLOCK",
                Misuse::MarkerAboveTop { .. } => "MEM:MISUSE:MARKER",
                Misuse::Unsupported { .. } => "MEM:MISUSE:UNSUPPORTED",
            },
            Self::InvalidConfig { .. } => "MEM:CONFIG:INVALID",
            Self::UnsupportedAlignment { .. } => "MEM:CONFIG:ALIGN",
            Self::SystemAllocationFailed { .. } => "MEM:SYSTEM:ALLOC",
        }
    }

    // ============================================================================
    // Convenience Constructors
    // ============================================================================

    /// Create out of capacity error
    pub fn out_of_capacity(kind: AllocatorKind, requested: usize, available: usize) -> Self {
        log_debug!(%kind, requested, available, "allocator out of capacity");
        Self::OutOfCapacity {
            kind,
            requested,
            available,
        }
    }

    /// Create oversized request error
    pub fn oversized(kind: AllocatorKind, requested: usize, max: usize) -> Self {
        log_debug!(%kind, requested, max, "request larger than allocator can ever serve");
        Self::OversizedRequest {
            kind,
            requested,
            max,
        }
    }

    /// Create descriptor table full error
    pub fn descriptor_table_full(capacity: usize) -> Self {
        log_debug!(capacity, "free needs a descriptor but the table is full");
        Self::DescriptorTableFull { capacity }
    }

    /// Create invariant violation error
    pub fn violation(kind: AllocatorKind, violation: Violation) -> Self {
        log_warn!(%kind, %violation, "rejected free that would corrupt allocator state");
        Self::InvariantViolation { kind, violation }
    }

    /// Create misuse error
    pub fn misuse(misuse: Misuse) -> Self {
        log_warn!(%misuse, "allocator misuse");
        Self::Misuse(misuse)
    }

    /// Create unsupported operation error
    pub fn unsupported(operation: &'static str, kind: AllocatorKind) -> Self {
        Self::misuse(Misuse::Unsupported { operation, kind })
    }

    /// Create invalid config error
    pub fn invalid_config(reason: &str) -> Self {
        Self::InvalidConfig {
            reason: reason.to_string(),
        }
    }

    /// Create system allocation failed error
    pub fn system_allocation_failed(size: usize, align: usize) -> Self {
        log_error!(size, align, "system allocator refused region");
        Self::SystemAllocationFailed { size, align }
    }
}

// ============================================================================
// Refused Deallocations
// ============================================================================

/// A refused deallocation.
///
/// The block was not freed and is handed back with the reason, so memory
/// the allocator could not take back yet (for example because its
/// descriptor table is full) is never lost. Converting into [`AllocError`]
/// with `?` drops the block.
#[must_use = "the block was not freed"]
pub struct DeallocError<B = Block> {
    block: B,
    error: AllocError,
}

impl<B> DeallocError<B> {
    pub(crate) fn new(block: B, error: AllocError) -> Self {
        Self { block, error }
    }

    /// Why the block was refused
    pub fn error(&self) -> &AllocError {
        &self.error
    }

    /// Takes the block back
    pub fn into_block(self) -> B {
        self.block
    }

    /// Splits into the block and the reason
    pub fn into_parts(self) -> (B, AllocError) {
        (self.block, self.error)
    }

    pub(crate) fn map_block<C>(self, f: impl FnOnce(B) -> C) -> DeallocError<C> {
        DeallocError {
            block: f(self.block),
            error: self.error,
        }
    }
}

impl<B: fmt::Debug> fmt::Debug for DeallocError<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeallocError")
            .field("error", &self.error)
            .field("block", &self.block)
            .finish()
    }
}

impl<B> fmt::Display for DeallocError<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl<B: fmt::Debug> std::error::Error for DeallocError<B> {}

impl<B> From<DeallocError<B>> for AllocError {
    fn from(err: DeallocError<B>) -> Self {
        err.error
    }
}
