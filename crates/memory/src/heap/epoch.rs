//! Which blocks of one allocator are still current
//!
//! Every block is stamped with its allocator's epoch when it is handed
//! out. A reset invalidates everything older than the new epoch. A stack
//! rewind only invalidates the older blocks at or above the rewound top;
//! those below the marker stay valid.

/// A stack rewind: blocks older than `epoch` starting at or above `top`
/// are gone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rewind {
    epoch: u64,
    top: usize,
}

#[derive(Debug, Default)]
pub(super) struct EpochLog {
    current: u64,
    valid_from: u64,
    /// Ascending in both `epoch` and `top`
    rewinds: Vec<Rewind>,
}

impl EpochLog {
    /// Stamp for blocks handed out now
    pub(super) fn current(&self) -> u64 {
        self.current
    }

    /// Invalidates every block handed out so far
    pub(super) fn reset(&mut self) {
        self.current += 1;
        self.valid_from = self.current;
        self.rewinds.clear();
    }

    /// Invalidates every block handed out so far that starts at or above `top`
    pub(super) fn rewind(&mut self, top: usize) {
        self.current += 1;
        // A lower rewind covers every older block a higher one did.
        while self.rewinds.last().is_some_and(|last| last.top >= top) {
            self.rewinds.pop();
        }
        self.rewinds.push(Rewind {
            epoch: self.current,
            top,
        });
    }

    /// Whether a block stamped `epoch` at `offset` has been invalidated
    pub(super) fn is_stale(&self, epoch: u64, offset: usize) -> bool {
        epoch < self.valid_from
            || self
                .rewinds
                .iter()
                .any(|rewind| rewind.epoch > epoch && offset >= rewind.top)
    }
}
