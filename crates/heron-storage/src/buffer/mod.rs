//! Buffer pool for HeronDB.
//!
//! The buffer pool manages a fixed-size set of in-memory page frames and
//! mediates every page access between the database's upper layers and the
//! disk layer:
//!
//! - **Page caching**: resident pages are served without I/O
//! - **Pin/unpin**: reference counting keeps in-use frames out of eviction
//! - **Dirty tracking**: modified pages are written back before reuse
//! - **Eviction**: strict least-recently-unpinned replacement
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     BufferPool                        │
//! │   page table: PageId → FrameId     free list          │
//! │  ┌─────────┐ ┌─────────┐       ┌─────────┐           │
//! │  │ Frame 0 │ │ Frame 1 │  ...  │ Frame N │           │
//! │  │ page_id │ │ page_id │       │ page_id │           │
//! │  │ data[]  │ │ data[]  │       │ data[]  │           │
//! │  │ pin_cnt │ │ pin_cnt │       │ pin_cnt │           │
//! │  │ dirty   │ │ dirty   │       │ dirty   │           │
//! │  └─────────┘ └─────────┘       └─────────┘           │
//! │                      │                                │
//! │                LruReplacer (unpinned frames only)     │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use heron_storage::buffer::{BufferPool, BufferPoolConfig};
//! use heron_storage::disk::MemoryDiskManager;
//!
//! # fn example() -> heron_storage::buffer::BufferResult<()> {
//! let disk = Arc::new(MemoryDiskManager::new(4096));
//! let pool = BufferPool::new(BufferPoolConfig::new(64), disk, None)?;
//!
//! if let Some(mut handle) = pool.new_page()? {
//!     let page_id = handle.page_id();
//!     handle.data_mut()[0] = 1;
//!     pool.unpin_page(page_id, true);
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod frame;
mod handle;
mod pool;
mod replacer;

pub use config::BufferPoolConfig;
pub use error::{BufferError, BufferResult};
pub use frame::{BufferFrame, FrameId};
pub use handle::PageHandle;
pub use pool::BufferPool;
pub use replacer::LruReplacer;

/// Point-in-time counters and gauges for buffer pool monitoring.
#[derive(Debug, Clone, Default)]
pub struct BufferPoolStats {
    /// Total number of page fetches.
    pub fetches: u64,
    /// Fetches served from a resident frame.
    pub hits: u64,
    /// Fetches that required a disk read.
    pub misses: u64,
    /// Number of pages evicted to make room.
    pub evictions: u64,
    /// Number of dirty pages written back.
    pub flushes: u64,
    /// Frames currently pinned.
    pub pinned_frames: usize,
    /// Frames currently dirty.
    pub dirty_frames: usize,
    /// Frames currently on the free list.
    pub free_frames: usize,
    /// Frames currently eligible for eviction.
    pub replacer_size: usize,
}

impl BufferPoolStats {
    /// Returns the cache hit ratio (0.0 to 1.0).
    pub fn hit_ratio(&self) -> f64 {
        if self.fetches == 0 {
            0.0
        } else {
            self.hits as f64 / self.fetches as f64
        }
    }
}
