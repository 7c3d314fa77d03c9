//! Write-ahead-log collaborator.
//!
//! The buffer pool holds a [`LogManager`] reference but does not consult it
//! in its core operations: enforcing flush-before-write ordering is the
//! job of a recovery layer that hooks in immediately before each dirty
//! page write.

use std::sync::atomic::{AtomicU64, Ordering};

use heron_common::types::Lsn;

/// Hands out log sequence numbers and tracks the durable watermark.
#[derive(Debug)]
pub struct LogManager {
    /// Next LSN to assign.
    next_lsn: AtomicU64,
    /// Highest LSN known to be durable.
    durable_lsn: AtomicU64,
}

impl LogManager {
    /// Creates a log manager with an empty log.
    pub fn new() -> Self {
        Self {
            next_lsn: AtomicU64::new(Lsn::FIRST.as_u64()),
            durable_lsn: AtomicU64::new(Lsn::INVALID.as_u64()),
        }
    }

    /// Assigns and returns the next log sequence number.
    pub fn next_lsn(&self) -> Lsn {
        Lsn::new(self.next_lsn.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the highest LSN known to be durable.
    pub fn durable_lsn(&self) -> Lsn {
        Lsn::new(self.durable_lsn.load(Ordering::Acquire))
    }

    /// Makes the log durable up to `lsn`.
    pub fn flush(&self, lsn: Lsn) {
        self.durable_lsn.fetch_max(lsn.as_u64(), Ordering::AcqRel);
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new()
    }
}
