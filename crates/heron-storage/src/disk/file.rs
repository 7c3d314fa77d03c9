//! File-backed disk manager.

use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use heron_common::types::PageId;
use parking_lot::Mutex;

use super::error::{DiskError, DiskResult};
use super::DiskManager;

/// Disk manager backed by a single data file.
///
/// Page `p` lives at byte offset `p * page_size`. Reads past the end of the
/// file yield zeroed bytes: a page that was allocated but never written has
/// no image yet, and its content is defined to be all zeroes.
///
/// The id allocator hands out monotonically increasing ids, preferring ids
/// returned through [`deallocate_page`](DiskManager::deallocate_page).
/// Allocator state is rebuilt from the file length on open; the free set is
/// not persisted.
pub struct FileDiskManager {
    /// The data file, behind a mutex for positioned access.
    file: Mutex<File>,
    /// Path of the data file.
    path: PathBuf,
    /// Page size in bytes.
    page_size: usize,
    /// Next never-allocated page id.
    next_page_id: AtomicU64,
    /// Deallocated ids available for reuse.
    free_pages: Mutex<BTreeSet<u64>>,
}

impl FileDiskManager {
    /// Opens (creating if necessary) the data file at `path`.
    pub fn open(path: impl AsRef<Path>, page_size: usize) -> DiskResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let len = file.metadata()?.len();
        let next_page_id = len.div_ceil(page_size as u64);

        Ok(Self {
            file: Mutex::new(file),
            path,
            page_size,
            next_page_id: AtomicU64::new(next_page_id),
            free_pages: Mutex::new(BTreeSet::new()),
        })
    }

    /// Returns the path of the data file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Syncs all written data to stable storage.
    pub fn sync(&self) -> DiskResult<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }

    fn check_access(&self, page_id: PageId, buf_len: usize) -> DiskResult<u64> {
        if !page_id.is_valid() {
            return Err(DiskError::invalid_page(page_id));
        }
        if buf_len != self.page_size {
            return Err(DiskError::bad_buffer(self.page_size, buf_len));
        }
        Ok(page_id.as_u64() * self.page_size as u64)
    }
}

impl DiskManager for FileDiskManager {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> DiskResult<()> {
        let offset = self.check_access(page_id, buf.len())?;

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;

        let mut total = 0;
        while total < buf.len() {
            let n = file.read(&mut buf[total..])?;
            if n == 0 {
                break; // EOF: the rest of the page has never been written
            }
            total += n;
        }
        buf[total..].fill(0);
        Ok(())
    }

    fn write_page(&self, page_id: PageId, data: &[u8]) -> DiskResult<()> {
        let offset = self.check_access(page_id, data.len())?;

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        Ok(())
    }

    fn allocate_page(&self) -> DiskResult<PageId> {
        if let Some(id) = self.free_pages.lock().pop_first() {
            return Ok(PageId::new(id));
        }
        Ok(PageId::new(self.next_page_id.fetch_add(1, Ordering::Relaxed)))
    }

    fn deallocate_page(&self, page_id: PageId) -> DiskResult<()> {
        if !page_id.is_valid() {
            return Err(DiskError::invalid_page(page_id));
        }
        self.free_pages.lock().insert(page_id.as_u64());
        Ok(())
    }
}

impl std::fmt::Debug for FileDiskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDiskManager")
            .field("path", &self.path)
            .field("page_size", &self.page_size)
            .field("next_page_id", &self.next_page_id.load(Ordering::Relaxed))
            .finish()
    }
}
