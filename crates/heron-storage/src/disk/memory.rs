//! Heap-backed disk manager.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use heron_common::types::PageId;
use parking_lot::Mutex;

use super::error::{DiskError, DiskResult};
use super::DiskManager;

/// Operation counters for a [`MemoryDiskManager`].
///
/// Counters let tests and callers observe exactly how many times the
/// backing store was touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskStats {
    /// Number of completed page reads.
    pub reads: u64,
    /// Number of completed page writes.
    pub writes: u64,
    /// Number of page allocations.
    pub allocations: u64,
    /// Number of page deallocations.
    pub deallocations: u64,
}

/// Disk manager that keeps every page on the heap.
///
/// Semantics match [`FileDiskManager`](super::FileDiskManager): never-written
/// pages read back zeroed, and the allocator prefers deallocated ids before
/// minting fresh monotonic ones.
pub struct MemoryDiskManager {
    /// Page size in bytes.
    page_size: usize,
    /// Page images, keyed by raw page id.
    pages: Mutex<HashMap<u64, Vec<u8>>>,
    /// Next never-allocated page id.
    next_page_id: AtomicU64,
    /// Deallocated ids available for reuse.
    free_pages: Mutex<BTreeSet<u64>>,
    reads: AtomicU64,
    writes: AtomicU64,
    allocations: AtomicU64,
    deallocations: AtomicU64,
}

impl MemoryDiskManager {
    /// Creates an empty in-memory backing store.
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            pages: Mutex::new(HashMap::new()),
            next_page_id: AtomicU64::new(PageId::FIRST.as_u64()),
            free_pages: Mutex::new(BTreeSet::new()),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            allocations: AtomicU64::new(0),
            deallocations: AtomicU64::new(0),
        }
    }

    /// Returns a snapshot of the operation counters.
    pub fn stats(&self) -> DiskStats {
        DiskStats {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            allocations: self.allocations.load(Ordering::Relaxed),
            deallocations: self.deallocations.load(Ordering::Relaxed),
        }
    }

    /// Returns the number of pages that have ever been written.
    pub fn written_pages(&self) -> usize {
        self.pages.lock().len()
    }

    fn check_access(&self, page_id: PageId, buf_len: usize) -> DiskResult<()> {
        if !page_id.is_valid() {
            return Err(DiskError::invalid_page(page_id));
        }
        if buf_len != self.page_size {
            return Err(DiskError::bad_buffer(self.page_size, buf_len));
        }
        Ok(())
    }
}

impl DiskManager for MemoryDiskManager {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> DiskResult<()> {
        self.check_access(page_id, buf.len())?;

        let pages = self.pages.lock();
        match pages.get(&page_id.as_u64()) {
            Some(image) => buf.copy_from_slice(image),
            None => buf.fill(0),
        }
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn write_page(&self, page_id: PageId, data: &[u8]) -> DiskResult<()> {
        self.check_access(page_id, data.len())?;

        self.pages.lock().insert(page_id.as_u64(), data.to_vec());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn allocate_page(&self) -> DiskResult<PageId> {
        self.allocations.fetch_add(1, Ordering::Relaxed);
        if let Some(id) = self.free_pages.lock().pop_first() {
            return Ok(PageId::new(id));
        }
        Ok(PageId::new(self.next_page_id.fetch_add(1, Ordering::Relaxed)))
    }

    fn deallocate_page(&self, page_id: PageId) -> DiskResult<()> {
        if !page_id.is_valid() {
            return Err(DiskError::invalid_page(page_id));
        }
        self.pages.lock().remove(&page_id.as_u64());
        self.free_pages.lock().insert(page_id.as_u64());
        self.deallocations.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl std::fmt::Debug for MemoryDiskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDiskManager")
            .field("page_size", &self.page_size)
            .field("written_pages", &self.written_pages())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: usize = 512;

    #[test]
    fn test_roundtrip() {
        let disk = MemoryDiskManager::new(PAGE);
        let id = disk.allocate_page().unwrap();

        let mut data = vec![0u8; PAGE];
        data[0] = 0x42;
        disk.write_page(id, &data).unwrap();

        let mut buf = vec![0u8; PAGE];
        disk.read_page(id, &mut buf).unwrap();
        assert_eq!(buf, data);
    }

    #[test]
    fn test_fresh_page_reads_zeroed() {
        let disk = MemoryDiskManager::new(PAGE);
        let mut buf = vec![0xffu8; PAGE];
        disk.read_page(PageId::new(100), &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_counters() {
        let disk = MemoryDiskManager::new(PAGE);
        let buf = vec![0u8; PAGE];
        let mut out = vec![0u8; PAGE];

        let id = disk.allocate_page().unwrap();
        disk.write_page(id, &buf).unwrap();
        disk.write_page(id, &buf).unwrap();
        disk.read_page(id, &mut out).unwrap();
        disk.deallocate_page(id).unwrap();

        let stats = disk.stats();
        assert_eq!(stats.allocations, 1);
        assert_eq!(stats.writes, 2);
        assert_eq!(stats.reads, 1);
        assert_eq!(stats.deallocations, 1);
    }

    #[test]
    fn test_deallocate_drops_image_and_reuses_id() {
        let disk = MemoryDiskManager::new(PAGE);
        let id = disk.allocate_page().unwrap();
        disk.write_page(id, &vec![7u8; PAGE]).unwrap();

        disk.deallocate_page(id).unwrap();
        assert_eq!(disk.written_pages(), 0);

        // The freed id comes back before a fresh one, and reads as zeroes.
        assert_eq!(disk.allocate_page().unwrap(), id);
        let mut buf = vec![0xffu8; PAGE];
        disk.read_page(id, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_bad_buffer_length_rejected() {
        let disk = MemoryDiskManager::new(PAGE);
        let mut small = vec![0u8; 10];
        assert!(matches!(
            disk.read_page(PageId::new(0), &mut small),
            Err(DiskError::BadBufferLength { .. })
        ));
    }
}
