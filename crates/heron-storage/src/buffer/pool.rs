//! Buffer pool implementation.
//!
//! The pool owns a fixed frame array, the page table mapping resident page
//! ids to frames, a free list of empty frames, and the LRU replacer. One
//! coarse latch serializes every public operation end to end, including
//! the disk I/O performed inside fetch, new and delete: between taking a
//! victim frame and finishing its replacement I/O no other thread can
//! observe the frame in a half-moved state.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use heron_common::types::PageId;
use parking_lot::Mutex;
use tracing::debug;

use super::config::BufferPoolConfig;
use super::error::{BufferError, BufferResult};
use super::frame::{BufferFrame, FrameId};
use super::handle::PageHandle;
use super::replacer::LruReplacer;
use super::BufferPoolStats;
use crate::disk::DiskManager;
use crate::wal::LogManager;

/// Structural state behind the pool latch.
struct PoolState {
    /// Maps resident page ids to their frames. Entries are unique on both
    /// sides: one page per frame, one frame per page.
    page_table: HashMap<PageId, FrameId>,
    /// Frames with no resident page. Popped from the front.
    free_list: VecDeque<FrameId>,
}

/// Where a frame obtained for reuse came from; decides where it goes back
/// if the operation cannot complete.
#[derive(Clone, Copy)]
enum FrameOrigin {
    FreeList,
    Replacer,
}

/// The buffer pool: a fixed-size page cache over a disk manager.
///
/// All public operations are atomic with respect to a single internal
/// latch. Operations that need a frame when all frames are pinned return
/// `Ok(None)` immediately instead of blocking; disk failures are
/// propagated as errors and never leave the pool's bookkeeping torn.
pub struct BufferPool {
    /// Configuration.
    config: BufferPoolConfig,
    /// Frame array, allocated eagerly at construction.
    frames: Vec<Arc<BufferFrame>>,
    /// Page table and free list, behind the pool latch.
    state: Mutex<PoolState>,
    /// Eviction candidates in least-recently-unpinned order.
    replacer: LruReplacer,
    /// Backing store.
    disk: Arc<dyn DiskManager>,
    /// Write-ahead-log collaborator. Held for a recovery layer to order
    /// log flushes before dirty page writes; unused by the pool itself.
    log: Option<Arc<LogManager>>,
    /// Fetch counter for statistics.
    fetch_count: AtomicU64,
    /// Hit counter for statistics.
    hit_count: AtomicU64,
    /// Miss counter for statistics.
    miss_count: AtomicU64,
    /// Eviction counter for statistics.
    eviction_count: AtomicU64,
    /// Write-back counter for statistics.
    flush_count: AtomicU64,
}

impl BufferPool {
    /// Creates a buffer pool over `disk` with the given configuration.
    pub fn new(
        config: BufferPoolConfig,
        disk: Arc<dyn DiskManager>,
        log: Option<Arc<LogManager>>,
    ) -> BufferResult<Self> {
        config.validate().map_err(BufferError::config)?;
        if config.page_size != disk.page_size() {
            return Err(BufferError::PageSizeMismatch {
                pool: config.page_size,
                disk: disk.page_size(),
            });
        }

        let frames: Vec<Arc<BufferFrame>> = (0..config.pool_size)
            .map(|i| Arc::new(BufferFrame::new(FrameId::new(i), config.page_size)))
            .collect();
        let free_list: VecDeque<FrameId> = (0..config.pool_size).map(FrameId::new).collect();

        debug!(
            pool_size = config.pool_size,
            page_size = config.page_size,
            "buffer pool created"
        );

        Ok(Self {
            replacer: LruReplacer::new(config.pool_size),
            frames,
            state: Mutex::new(PoolState {
                page_table: HashMap::with_capacity(config.pool_size),
                free_list,
            }),
            disk,
            log,
            config,
            fetch_count: AtomicU64::new(0),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            eviction_count: AtomicU64::new(0),
            flush_count: AtomicU64::new(0),
        })
    }

    /// Returns the number of frames in the pool.
    pub fn pool_size(&self) -> usize {
        self.config.pool_size
    }

    /// Returns the page size in bytes.
    pub fn page_size(&self) -> usize {
        self.config.page_size
    }

    /// Returns the write-ahead-log collaborator, if one was attached.
    pub fn log_manager(&self) -> Option<&Arc<LogManager>> {
        self.log.as_ref()
    }

    /// Returns true if `page_id` is resident.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.state.lock().page_table.contains_key(&page_id)
    }

    /// Fetches a page, pinning it.
    ///
    /// Returns `Ok(None)` when the page is not resident and every frame is
    /// pinned. Otherwise the page is served from its resident frame or
    /// read from disk into a reclaimed one, and the caller owns one pin on
    /// it until [`unpin_page`](Self::unpin_page).
    pub fn fetch_page(&self, page_id: PageId) -> BufferResult<Option<PageHandle>> {
        if !page_id.is_valid() {
            return Err(BufferError::InvalidPageId { page_id });
        }
        self.fetch_count.fetch_add(1, Ordering::Relaxed);

        let mut state = self.state.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let frame = &self.frames[frame_id.index()];
            frame.pin();
            self.replacer.pin(frame_id);
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            self.validate_partition(&state);
            return Ok(Some(PageHandle::new(Arc::clone(frame), page_id)));
        }
        self.miss_count.fetch_add(1, Ordering::Relaxed);

        let Some((frame_id, origin)) = self.take_frame(&mut state) else {
            return Ok(None);
        };
        self.write_back_occupant(&mut state, frame_id, origin)?;
        self.detach_occupant(&mut state, frame_id);

        let frame = &self.frames[frame_id.index()];
        frame.set_page_id(page_id);
        frame.set_dirty(false);
        {
            let mut data = frame.write_data();
            data.fill(0);
            if let Err(e) = self.disk.read_page(page_id, &mut data) {
                drop(data);
                frame.reset();
                state.free_list.push_front(frame_id);
                self.validate_partition(&state);
                return Err(e.into());
            }
        }
        frame.pin();

        state.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);
        self.validate_partition(&state);
        Ok(Some(PageHandle::new(Arc::clone(frame), page_id)))
    }

    /// Allocates a fresh page and pins it, zero-filled.
    ///
    /// Returns `Ok(None)` when every frame is pinned. No disk read is
    /// performed: a freshly allocated page has no prior content.
    pub fn new_page(&self) -> BufferResult<Option<PageHandle>> {
        let mut state = self.state.lock();

        let Some((frame_id, origin)) = self.take_frame(&mut state) else {
            return Ok(None);
        };
        self.write_back_occupant(&mut state, frame_id, origin)?;

        let page_id = match self.disk.allocate_page() {
            Ok(id) => id,
            Err(e) => {
                self.put_back_frame(&mut state, frame_id, origin);
                self.validate_partition(&state);
                return Err(e.into());
            }
        };
        self.detach_occupant(&mut state, frame_id);

        let frame = &self.frames[frame_id.index()];
        frame.set_page_id(page_id);
        frame.set_dirty(false);
        frame.write_data().fill(0);
        frame.pin();

        state.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);
        self.validate_partition(&state);
        Ok(Some(PageHandle::new(Arc::clone(frame), page_id)))
    }

    /// Releases one pin on `page_id`, optionally marking it dirty.
    ///
    /// Returns false if the page is not resident or its pin count is
    /// already zero; the double release is surfaced, not corrected. The
    /// dirty flag is sticky: unpinning with `dirty = false` never clears a
    /// previously set flag.
    pub fn unpin_page(&self, page_id: PageId, dirty: bool) -> bool {
        let state = self.state.lock();

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id.index()];
        if frame.pin_count() == 0 {
            return false;
        }

        if dirty {
            frame.set_dirty(true);
        }
        if frame.unpin() == 0 {
            self.replacer.unpin(frame_id);
        }
        self.validate_partition(&state);
        true
    }

    /// Writes `page_id`'s current bytes to disk and clears its dirty flag.
    ///
    /// Returns false if the page is not resident. Flushing a pinned page
    /// is permitted; the write captures whatever the bytes are now.
    pub fn flush_page(&self, page_id: PageId) -> BufferResult<bool> {
        let state = self.state.lock();

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return Ok(false);
        };
        let frame = &self.frames[frame_id.index()];
        {
            let data = frame.read_data();
            self.disk.write_page(page_id, &data)?;
        }
        frame.set_dirty(false);
        self.flush_count.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    /// Writes every dirty resident page to disk.
    ///
    /// Iterates the frame array, not page ids: page ids are sparse and
    /// unrelated to pool indices.
    pub fn flush_all(&self) -> BufferResult<()> {
        let _state = self.state.lock();

        let mut flushed = 0u64;
        for frame in &self.frames {
            let page_id = frame.page_id();
            if page_id.is_valid() && frame.is_dirty() {
                {
                    let data = frame.read_data();
                    self.disk.write_page(page_id, &data)?;
                }
                frame.set_dirty(false);
                flushed += 1;
            }
        }
        self.flush_count.fetch_add(flushed, Ordering::Relaxed);
        debug!(pages = flushed, "flushed all dirty pages");
        Ok(())
    }

    /// Removes `page_id` from the pool and deallocates it on disk.
    ///
    /// Returns true if the page was deleted or was not resident to begin
    /// with, false if it is pinned.
    pub fn delete_page(&self, page_id: PageId) -> BufferResult<bool> {
        let mut state = self.state.lock();

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return Ok(true);
        };
        let frame = &self.frames[frame_id.index()];
        if frame.is_pinned() {
            return Ok(false);
        }

        frame.reset();
        state.page_table.remove(&page_id);
        self.replacer.pin(frame_id);
        state.free_list.push_back(frame_id);
        self.validate_partition(&state);

        self.disk.deallocate_page(page_id)?;
        debug!(page_id = %page_id, frame_id = frame_id.index(), "deleted page");
        Ok(true)
    }

    /// Returns a snapshot of the pool's counters and gauges.
    pub fn stats(&self) -> BufferPoolStats {
        let state = self.state.lock();

        let mut pinned = 0;
        let mut dirty = 0;
        for frame in &self.frames {
            if frame.is_pinned() {
                pinned += 1;
            }
            if frame.is_dirty() {
                dirty += 1;
            }
        }

        BufferPoolStats {
            fetches: self.fetch_count.load(Ordering::Relaxed),
            hits: self.hit_count.load(Ordering::Relaxed),
            misses: self.miss_count.load(Ordering::Relaxed),
            evictions: self.eviction_count.load(Ordering::Relaxed),
            flushes: self.flush_count.load(Ordering::Relaxed),
            pinned_frames: pinned,
            dirty_frames: dirty,
            free_frames: state.free_list.len(),
            replacer_size: self.replacer.size(),
        }
    }

    // -------------------------------------------------------------------------
    // Private helpers
    // -------------------------------------------------------------------------

    /// Claims a frame for reuse: the free list first, then the replacer.
    ///
    /// Free frames are cheaper - no dirty check, no page table fix-up.
    fn take_frame(&self, state: &mut PoolState) -> Option<(FrameId, FrameOrigin)> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Some((frame_id, FrameOrigin::FreeList));
        }
        self.replacer
            .victim()
            .map(|frame_id| (frame_id, FrameOrigin::Replacer))
    }

    /// Returns a claimed frame to wherever it was taken from.
    fn put_back_frame(&self, state: &mut PoolState, frame_id: FrameId, origin: FrameOrigin) {
        match origin {
            FrameOrigin::FreeList => state.free_list.push_front(frame_id),
            FrameOrigin::Replacer => self.replacer.unpin(frame_id),
        }
    }

    /// Writes the claimed frame's occupant back to disk if it is dirty.
    ///
    /// On failure the frame is put back where it came from before the
    /// error propagates, so the caller must not reuse it.
    fn write_back_occupant(
        &self,
        state: &mut PoolState,
        frame_id: FrameId,
        origin: FrameOrigin,
    ) -> BufferResult<()> {
        let frame = &self.frames[frame_id.index()];
        if !frame.is_dirty() {
            return Ok(());
        }

        let result = {
            let data = frame.read_data();
            self.disk.write_page(frame.page_id(), &data)
        };
        match result {
            Ok(()) => {
                frame.set_dirty(false);
                self.flush_count.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.put_back_frame(state, frame_id, origin);
                self.validate_partition(state);
                Err(e.into())
            }
        }
    }

    /// Drops the page table entry of the claimed frame's prior occupant.
    fn detach_occupant(&self, state: &mut PoolState, frame_id: FrameId) {
        let frame = &self.frames[frame_id.index()];
        let old_page_id = frame.page_id();
        if old_page_id.is_valid() {
            debug!(page_id = %old_page_id, frame_id = frame_id.index(), "evicting page");
            state.page_table.remove(&old_page_id);
            self.eviction_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Checks the frame partition before the latch is released: every
    /// frame is in exactly one of the free list, the replacer, or the
    /// pinned-resident set, and the page table agrees with the frames.
    /// Disagreement is a bookkeeping bug, not a recoverable condition.
    fn validate_partition(&self, state: &PoolState) {
        if !cfg!(debug_assertions) {
            return;
        }

        let mut pinned = 0usize;
        for (i, frame) in self.frames.iter().enumerate() {
            let frame_id = FrameId::new(i);
            let in_free = state.free_list.contains(&frame_id);
            let in_replacer = self.replacer.contains(frame_id);
            let page_id = frame.page_id();

            if page_id.is_valid() {
                assert_eq!(
                    state.page_table.get(&page_id),
                    Some(&frame_id),
                    "resident page {page_id} missing from page table"
                );
                assert!(!in_free, "occupied frame {i} on the free list");
                if frame.pin_count() > 0 {
                    pinned += 1;
                    assert!(!in_replacer, "pinned frame {i} in the replacer");
                } else {
                    assert!(in_replacer, "evictable frame {i} not in the replacer");
                }
            } else {
                assert!(in_free, "empty frame {i} not on the free list");
                assert!(!in_replacer, "empty frame {i} in the replacer");
                assert_eq!(frame.pin_count(), 0, "empty frame {i} is pinned");
                assert!(!frame.is_dirty(), "empty frame {i} is dirty");
            }
        }

        for (&page_id, &frame_id) in &state.page_table {
            assert_eq!(
                self.frames[frame_id.index()].page_id(),
                page_id,
                "page table maps {page_id} to a frame holding another page"
            );
        }

        assert_eq!(
            state.free_list.len() + self.replacer.size() + pinned,
            self.config.pool_size,
            "frame partition does not cover the pool"
        );
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("pool_size", &self.config.pool_size)
            .field("page_size", &self.config.page_size)
            .field("resident_pages", &self.state.lock().page_table.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::{DiskError, DiskResult, MemoryDiskManager};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::io;
    use std::sync::atomic::AtomicBool;

    const PAGE: usize = 512;

    fn test_pool(pool_size: usize) -> (BufferPool, Arc<MemoryDiskManager>) {
        let disk = Arc::new(MemoryDiskManager::new(PAGE));
        let config = BufferPoolConfig::new(pool_size).with_page_size(PAGE);
        let pool = BufferPool::new(config, Arc::clone(&disk) as Arc<dyn DiskManager>, None).unwrap();
        (pool, disk)
    }

    /// Pins a page and returns its id, panicking if the pool is full.
    fn must_new_page(pool: &BufferPool) -> PageId {
        pool.new_page().unwrap().expect("pool exhausted").page_id()
    }

    #[test]
    fn test_pool_creation() {
        let (pool, _disk) = test_pool(8);
        assert_eq!(pool.pool_size(), 8);
        assert_eq!(pool.page_size(), PAGE);

        let stats = pool.stats();
        assert_eq!(stats.free_frames, 8);
        assert_eq!(stats.pinned_frames, 0);
        assert_eq!(stats.replacer_size, 0);
    }

    #[test]
    fn test_page_size_mismatch_rejected() {
        let disk = Arc::new(MemoryDiskManager::new(PAGE));
        let config = BufferPoolConfig::new(4).with_page_size(PAGE * 2);
        let err = BufferPool::new(config, disk, None).unwrap_err();
        assert!(matches!(err, BufferError::PageSizeMismatch { .. }));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let disk = Arc::new(MemoryDiskManager::new(PAGE));
        let config = BufferPoolConfig::new(0).with_page_size(PAGE);
        let err = BufferPool::new(config, disk, None).unwrap_err();
        assert!(matches!(err, BufferError::Config { .. }));
    }

    #[test]
    fn test_fetch_invalid_page_id_rejected() {
        let (pool, _disk) = test_pool(4);
        let err = pool.fetch_page(PageId::INVALID).unwrap_err();
        assert!(matches!(err, BufferError::InvalidPageId { .. }));
    }

    #[test]
    fn test_fill_and_overflow() {
        let (pool, _disk) = test_pool(3);

        let p0 = must_new_page(&pool);
        let p1 = must_new_page(&pool);
        let p2 = must_new_page(&pool);
        assert_eq!(p0, PageId::new(0));
        assert_eq!(p1, PageId::new(1));
        assert_eq!(p2, PageId::new(2));

        // All frames pinned: no frame can be surrendered.
        assert!(pool.new_page().unwrap().is_none());

        assert!(pool.unpin_page(p1, false));
        let p3 = must_new_page(&pool);
        assert_eq!(p3, PageId::new(3));

        // The new page took the frame page 1 was in.
        assert!(!pool.contains(p1));
        assert!(pool.contains(p0));
        assert!(pool.contains(p2));
        assert!(pool.contains(p3));
    }

    #[test]
    fn test_new_page_is_zeroed_without_disk_read() {
        let (pool, disk) = test_pool(2);

        let handle = pool.new_page().unwrap().unwrap();
        assert!(handle.data().iter().all(|&b| b == 0));
        assert_eq!(disk.stats().reads, 0);
    }

    #[test]
    fn test_dirty_eviction_writes_back() {
        let (pool, disk) = test_pool(1);

        let mut handle = pool.fetch_page(PageId::new(0)).unwrap().unwrap();
        handle.data_mut()[0] = b'A';
        drop(handle);
        assert!(pool.unpin_page(PageId::new(0), true));

        // Reusing the only frame forces the dirty write-back first.
        let _h4 = pool.fetch_page(PageId::new(4)).unwrap().unwrap();
        assert_eq!(disk.stats().writes, 1);

        let mut buf = vec![0u8; PAGE];
        disk.read_page(PageId::new(0), &mut buf).unwrap();
        assert_eq!(buf[0], b'A');
    }

    #[test]
    fn test_clean_eviction_skips_write_back() {
        let (pool, disk) = test_pool(1);

        pool.fetch_page(PageId::new(0)).unwrap().unwrap();
        assert!(pool.unpin_page(PageId::new(0), false));

        let _h = pool.fetch_page(PageId::new(1)).unwrap().unwrap();
        assert_eq!(disk.stats().writes, 0);
    }

    #[test]
    fn test_pin_prevents_delete() {
        let (pool, disk) = test_pool(3);

        pool.fetch_page(PageId::new(7)).unwrap().unwrap();
        assert!(!pool.delete_page(PageId::new(7)).unwrap());

        assert!(pool.unpin_page(PageId::new(7), false));
        assert!(pool.delete_page(PageId::new(7)).unwrap());

        assert!(!pool.contains(PageId::new(7)));
        assert_eq!(disk.stats().deallocations, 1);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (pool, disk) = test_pool(3);

        let p = must_new_page(&pool);
        assert!(pool.unpin_page(p, false));

        assert!(pool.delete_page(p).unwrap());
        assert!(pool.delete_page(p).unwrap());
        assert_eq!(disk.stats().deallocations, 1);

        // The freed frame is reusable.
        let stats = pool.stats();
        assert_eq!(stats.free_frames, 3);
    }

    #[test]
    fn test_lru_order_under_pin_churn() {
        let (pool, _disk) = test_pool(3);

        let a = must_new_page(&pool);
        let b = must_new_page(&pool);
        let c = must_new_page(&pool);
        assert!(pool.unpin_page(a, false));
        assert!(pool.unpin_page(b, false));
        assert!(pool.unpin_page(c, false));

        // Touch b: it becomes most recently used.
        pool.fetch_page(b).unwrap().unwrap();
        assert!(pool.unpin_page(b, false));

        // Three evictions must claim a, then c, then b.
        pool.fetch_page(PageId::new(100)).unwrap().unwrap();
        assert!(!pool.contains(a));
        assert!(pool.contains(b));
        assert!(pool.contains(c));

        pool.fetch_page(PageId::new(101)).unwrap().unwrap();
        assert!(!pool.contains(c));
        assert!(pool.contains(b));

        pool.fetch_page(PageId::new(102)).unwrap().unwrap();
        assert!(!pool.contains(b));
    }

    #[test]
    fn test_flush_all_scans_frames_not_page_ids() {
        let (pool, disk) = test_pool(3);

        // Page ids far above the pool size: indexing by id would be out of
        // range.
        for id in [100u64, 200, 300] {
            let page_id = PageId::new(id);
            let mut handle = pool.fetch_page(page_id).unwrap().unwrap();
            handle.data_mut()[0..8].copy_from_slice(&id.to_be_bytes());
            drop(handle);
            assert!(pool.unpin_page(page_id, true));
        }

        pool.flush_all().unwrap();
        assert_eq!(disk.stats().writes, 3);

        let mut buf = vec![0u8; PAGE];
        for id in [100u64, 200, 300] {
            disk.read_page(PageId::new(id), &mut buf).unwrap();
            assert_eq!(&buf[0..8], &id.to_be_bytes());
        }

        // Everything was written back: nothing left dirty.
        assert_eq!(pool.stats().dirty_frames, 0);
        pool.flush_all().unwrap();
        assert_eq!(disk.stats().writes, 3);
    }

    #[test]
    fn test_resident_fetch_does_no_io() {
        let (pool, disk) = test_pool(3);

        pool.fetch_page(PageId::new(5)).unwrap().unwrap();
        assert!(pool.unpin_page(PageId::new(5), false));
        assert_eq!(pool.stats().replacer_size, 1);

        pool.fetch_page(PageId::new(5)).unwrap().unwrap();
        assert_eq!(disk.stats().reads, 1);
        // The re-pinned frame left the eviction candidates.
        assert_eq!(pool.stats().replacer_size, 0);

        let stats = pool.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_pin_round_trip_restores_partition() {
        let (pool, _disk) = test_pool(3);

        let p = must_new_page(&pool);
        assert!(pool.unpin_page(p, false));

        let before = pool.stats();
        pool.fetch_page(p).unwrap().unwrap();
        assert!(pool.unpin_page(p, false));
        let after = pool.stats();

        assert_eq!(before.pinned_frames, after.pinned_frames);
        assert_eq!(before.free_frames, after.free_frames);
        assert_eq!(before.replacer_size, after.replacer_size);
        assert_eq!(before.dirty_frames, after.dirty_frames);
    }

    #[test]
    fn test_dirty_bytes_survive_flush() {
        let (pool, disk) = test_pool(2);

        let mut handle = pool.new_page().unwrap().unwrap();
        let p = handle.page_id();
        handle.data_mut()[0..5].copy_from_slice(b"bytes");
        drop(handle);

        assert!(pool.unpin_page(p, true));
        assert!(pool.flush_page(p).unwrap());

        let mut buf = vec![0u8; PAGE];
        disk.read_page(p, &mut buf).unwrap();
        assert_eq!(&buf[0..5], b"bytes");
        assert_eq!(pool.stats().dirty_frames, 0);
    }

    #[test]
    fn test_dirty_flag_is_sticky() {
        let (pool, disk) = test_pool(1);

        let mut handle = pool.new_page().unwrap().unwrap();
        let p = handle.page_id();
        handle.data_mut()[0] = 9;
        drop(handle);
        assert!(pool.unpin_page(p, true));

        // Pin and release again without modifying: still dirty.
        pool.fetch_page(p).unwrap().unwrap();
        assert!(pool.unpin_page(p, false));
        assert_eq!(pool.stats().dirty_frames, 1);

        // Eviction must therefore write it back.
        pool.fetch_page(PageId::new(50)).unwrap().unwrap();
        let mut buf = vec![0u8; PAGE];
        disk.read_page(p, &mut buf).unwrap();
        assert_eq!(buf[0], 9);
    }

    #[test]
    fn test_multiple_pins_require_matching_unpins() {
        let (pool, _disk) = test_pool(2);

        let p = must_new_page(&pool);
        pool.fetch_page(p).unwrap().unwrap();

        assert!(pool.unpin_page(p, false));
        // Still pinned once: not evictable.
        assert_eq!(pool.stats().replacer_size, 0);

        assert!(pool.unpin_page(p, false));
        assert_eq!(pool.stats().replacer_size, 1);
    }

    #[test]
    fn test_unpin_surfaces_caller_bugs() {
        let (pool, _disk) = test_pool(2);

        // Not resident at all.
        assert!(!pool.unpin_page(PageId::new(77), false));

        let p = must_new_page(&pool);
        assert!(pool.unpin_page(p, false));
        // Double release.
        assert!(!pool.unpin_page(p, false));
    }

    #[test]
    fn test_flush_missing_page_returns_false() {
        let (pool, _disk) = test_pool(2);
        assert!(!pool.flush_page(PageId::new(123)).unwrap());
    }

    #[test]
    fn test_flush_pinned_page_is_permitted() {
        let (pool, disk) = test_pool(2);

        let mut handle = pool.new_page().unwrap().unwrap();
        let p = handle.page_id();
        handle.data_mut()[0] = 1;
        drop(handle);

        assert!(pool.flush_page(p).unwrap());
        let mut buf = vec![0u8; PAGE];
        disk.read_page(p, &mut buf).unwrap();
        assert_eq!(buf[0], 1);

        assert!(pool.unpin_page(p, false));
    }

    #[test]
    fn test_eviction_after_delete_prefers_free_frame() {
        let (pool, disk) = test_pool(2);

        let a = must_new_page(&pool);
        let b = must_new_page(&pool);
        assert!(pool.unpin_page(a, false));
        assert!(pool.unpin_page(b, false));
        assert!(pool.delete_page(a).unwrap());

        // The freed frame is claimed before any eviction happens.
        pool.fetch_page(PageId::new(40)).unwrap().unwrap();
        assert!(pool.contains(b));
        assert_eq!(pool.stats().evictions, 0);
        assert_eq!(disk.stats().deallocations, 1);
    }

    /// Disk manager whose writes can be made to fail, for exercising the
    /// pool's error paths.
    struct FlakyDisk {
        inner: MemoryDiskManager,
        fail_writes: AtomicBool,
    }

    impl FlakyDisk {
        fn new(page_size: usize) -> Self {
            Self {
                inner: MemoryDiskManager::new(page_size),
                fail_writes: AtomicBool::new(false),
            }
        }

        fn set_fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::Relaxed);
        }
    }

    impl DiskManager for FlakyDisk {
        fn page_size(&self) -> usize {
            self.inner.page_size()
        }

        fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> DiskResult<()> {
            self.inner.read_page(page_id, buf)
        }

        fn write_page(&self, page_id: PageId, data: &[u8]) -> DiskResult<()> {
            if self.fail_writes.load(Ordering::Relaxed) {
                return Err(DiskError::from(io::Error::new(
                    io::ErrorKind::Other,
                    "injected write failure",
                )));
            }
            self.inner.write_page(page_id, data)
        }

        fn allocate_page(&self) -> DiskResult<PageId> {
            self.inner.allocate_page()
        }

        fn deallocate_page(&self, page_id: PageId) -> DiskResult<()> {
            self.inner.deallocate_page(page_id)
        }
    }

    #[test]
    fn test_failed_write_back_leaves_pool_intact() {
        let disk = Arc::new(FlakyDisk::new(PAGE));
        let config = BufferPoolConfig::new(2).with_page_size(PAGE);
        let pool =
            BufferPool::new(config, Arc::clone(&disk) as Arc<dyn DiskManager>, None).unwrap();

        let a = must_new_page(&pool);
        let b = must_new_page(&pool);
        assert!(pool.unpin_page(a, true));
        assert!(pool.unpin_page(b, true));

        disk.set_fail_writes(true);
        let err = pool.fetch_page(PageId::new(50)).unwrap_err();
        assert!(err.is_disk());

        // Both dirty pages are still resident and still evictable; nothing
        // was lost or orphaned.
        assert!(pool.contains(a));
        assert!(pool.contains(b));
        let stats = pool.stats();
        assert_eq!(stats.pinned_frames, 0);
        assert_eq!(stats.replacer_size, 2);
        assert_eq!(stats.dirty_frames, 2);

        // Once writes work again the fetch goes through. The failed victim
        // rejoined the candidates at the most-recently-used end, so the
        // other page is claimed first.
        disk.set_fail_writes(false);
        pool.fetch_page(PageId::new(50)).unwrap().unwrap();
        assert!(!pool.contains(b));
        assert!(pool.contains(a));
    }

    #[test]
    fn test_failed_flush_keeps_page_dirty() {
        let disk = Arc::new(FlakyDisk::new(PAGE));
        let config = BufferPoolConfig::new(2).with_page_size(PAGE);
        let pool =
            BufferPool::new(config, Arc::clone(&disk) as Arc<dyn DiskManager>, None).unwrap();

        let p = must_new_page(&pool);
        assert!(pool.unpin_page(p, true));

        disk.set_fail_writes(true);
        assert!(pool.flush_page(p).is_err());
        assert_eq!(pool.stats().dirty_frames, 1);

        disk.set_fail_writes(false);
        assert!(pool.flush_page(p).unwrap());
        assert_eq!(pool.stats().dirty_frames, 0);
    }

    #[test]
    fn test_random_operations_preserve_partition() {
        let (pool, _disk) = test_pool(4);
        let mut rng = StdRng::seed_from_u64(0x4845524f4e);
        let mut pinned: Vec<PageId> = Vec::new();

        // Fetch ids start well above anything the allocator mints fresh.
        for _ in 0..500 {
            match rng.gen_range(0..5) {
                0 => {
                    if let Some(handle) = pool.new_page().unwrap() {
                        pinned.push(handle.page_id());
                    }
                }
                1 => {
                    let page_id = PageId::new(rng.gen_range(100..112));
                    if pool.fetch_page(page_id).unwrap().is_some() {
                        pinned.push(page_id);
                    }
                }
                2 => {
                    if !pinned.is_empty() {
                        let i = rng.gen_range(0..pinned.len());
                        let page_id = pinned.swap_remove(i);
                        assert!(pool.unpin_page(page_id, rng.gen_bool(0.5)));
                    }
                }
                3 => {
                    let page_id = PageId::new(rng.gen_range(100..112));
                    pool.flush_page(page_id).unwrap();
                }
                _ => {
                    let page_id = PageId::new(rng.gen_range(100..112));
                    pool.delete_page(page_id).unwrap();
                }
            }
        }

        for page_id in pinned.drain(..) {
            assert!(pool.unpin_page(page_id, false));
        }
        pool.flush_all().unwrap();

        let stats = pool.stats();
        assert_eq!(stats.pinned_frames, 0);
        assert_eq!(stats.dirty_frames, 0);
        assert_eq!(stats.free_frames + stats.replacer_size, 4);
    }

    #[test]
    fn test_concurrent_churn() {
        let (pool, _disk) = test_pool(4);
        let pool = Arc::new(pool);

        std::thread::scope(|scope| {
            for t in 0..4u8 {
                let pool = Arc::clone(&pool);
                scope.spawn(move || {
                    let mut rng = StdRng::seed_from_u64(t as u64);
                    for _ in 0..200 {
                        let page_id = PageId::new(rng.gen_range(0..8));
                        // All frames may be pinned by the other threads.
                        if let Some(mut handle) = pool.fetch_page(page_id).unwrap() {
                            handle.data_mut()[t as usize] = t + 1;
                            drop(handle);
                            assert!(pool.unpin_page(page_id, true));
                        }
                    }
                });
            }
        });

        let stats = pool.stats();
        assert_eq!(stats.pinned_frames, 0);
        assert_eq!(stats.free_frames + stats.replacer_size, 4);
        pool.flush_all().unwrap();
        assert_eq!(pool.stats().dirty_frames, 0);
    }

    #[test]
    fn test_file_backed_pool_durability() {
        use crate::disk::FileDiskManager;

        let dir = tempfile::tempdir().unwrap();
        let disk = Arc::new(FileDiskManager::open(dir.path().join("pool.db"), PAGE).unwrap());
        let config = BufferPoolConfig::new(2).with_page_size(PAGE);
        let pool =
            BufferPool::new(config, Arc::clone(&disk) as Arc<dyn DiskManager>, None).unwrap();

        let mut handle = pool.new_page().unwrap().unwrap();
        let p = handle.page_id();
        handle.data_mut()[0..4].copy_from_slice(b"keep");
        drop(handle);
        assert!(pool.unpin_page(p, true));

        // Eviction pressure forces the dirty page through to the file.
        pool.fetch_page(PageId::new(10)).unwrap().unwrap();
        pool.fetch_page(PageId::new(11)).unwrap().unwrap();
        assert!(!pool.contains(p));

        let mut buf = vec![0u8; PAGE];
        disk.read_page(p, &mut buf).unwrap();
        assert_eq!(&buf[0..4], b"keep");
    }

    #[test]
    fn test_log_manager_is_held_but_dormant() {
        let disk = Arc::new(MemoryDiskManager::new(PAGE));
        let config = BufferPoolConfig::new(2).with_page_size(PAGE);
        let log = Arc::new(LogManager::new());
        let pool = BufferPool::new(config, disk, Some(Arc::clone(&log))).unwrap();

        let p = must_new_page(&pool);
        assert!(pool.unpin_page(p, true));
        pool.flush_all().unwrap();

        // The pool never advances the log on its own.
        assert!(!log.durable_lsn().is_valid());
        assert!(pool.log_manager().is_some());
    }
}
