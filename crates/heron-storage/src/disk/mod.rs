//! Synchronous disk layer for HeronDB.
//!
//! This module defines the [`DiskManager`] interface the buffer pool talks
//! to, plus two implementations:
//!
//! - [`FileDiskManager`] — pages live in a single data file at
//!   `page_id * page_size` offsets
//! - [`MemoryDiskManager`] — pages live on the heap; useful for tests and
//!   ephemeral databases
//!
//! All operations are blocking and position-based. The buffer pool calls
//! them with its own latch held, so a disk manager must be safe to call
//! from any thread but needs no ordering guarantees of its own beyond
//! per-call atomicity.

mod error;
mod file;
mod memory;

pub use error::{DiskError, DiskResult};
pub use file::FileDiskManager;
pub use memory::{DiskStats, MemoryDiskManager};

use heron_common::types::PageId;

/// Interface to the block-oriented backing store.
///
/// Page ids handed out by [`allocate_page`](DiskManager::allocate_page) are
/// monotonic and are not reused until explicitly deallocated. A page that
/// was allocated but never written reads back as zeroed bytes.
///
/// Errors are surfaced to the caller of the triggering operation; there is
/// no internal retry.
pub trait DiskManager: Send + Sync {
    /// Returns the page size in bytes. Every read and write buffer must be
    /// exactly this long.
    fn page_size(&self) -> usize;

    /// Fills `buf` with the on-disk image of `page_id`.
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> DiskResult<()>;

    /// Persists `data` as the image of `page_id`.
    fn write_page(&self, page_id: PageId, data: &[u8]) -> DiskResult<()>;

    /// Returns a fresh page id.
    fn allocate_page(&self) -> DiskResult<PageId>;

    /// Marks `page_id` as free for future reuse.
    fn deallocate_page(&self, page_id: PageId) -> DiskResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_trait_object_safety() {
        let disk: Arc<dyn DiskManager> = Arc::new(MemoryDiskManager::new(512));
        assert_eq!(disk.page_size(), 512);
    }
}
