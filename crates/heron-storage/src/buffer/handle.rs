//! Page handle handed out by the buffer pool.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use heron_common::types::PageId;

use super::frame::{BufferFrame, FrameId};

/// Access to a pinned page's bytes.
///
/// A handle is returned by [`BufferPool::fetch_page`](super::BufferPool::fetch_page)
/// and [`BufferPool::new_page`](super::BufferPool::new_page) and stays valid
/// until the caller releases its pin with
/// [`BufferPool::unpin_page`](super::BufferPool::unpin_page). The dirty flag
/// travels on that unpin call; writing through
/// [`data_mut`](PageHandle::data_mut) does not set it implicitly.
///
/// # Contract
///
/// - Do not use a handle after unpinning its page: once the pin count drops
///   to zero the bytes belong to the pool again and the frame may be reused
///   at any time.
/// - Drop any [`data`](PageHandle::data)/[`data_mut`](PageHandle::data_mut)
///   borrow before calling back into the pool; the pool takes the frame's
///   data latch when it writes the page out.
pub struct PageHandle {
    frame: Arc<BufferFrame>,
    page_id: PageId,
}

impl PageHandle {
    pub(crate) fn new(frame: Arc<BufferFrame>, page_id: PageId) -> Self {
        Self { frame, page_id }
    }

    /// Returns the id of the pinned page.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns the frame this page is resident in.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame.frame_id()
    }

    /// Returns a read borrow of the page bytes.
    #[inline]
    pub fn data(&self) -> impl Deref<Target = [u8]> + '_ {
        PageDataRef {
            guard: self.frame.read_data(),
        }
    }

    /// Returns a write borrow of the page bytes.
    ///
    /// Remember to pass `dirty = true` on unpin after modifying the page.
    #[inline]
    pub fn data_mut(&mut self) -> impl DerefMut<Target = [u8]> + '_ {
        PageDataMut {
            guard: self.frame.write_data(),
        }
    }
}

impl std::fmt::Debug for PageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageHandle")
            .field("page_id", &self.page_id)
            .field("frame_id", &self.frame.frame_id())
            .finish()
    }
}

/// Helper struct to provide Deref for page data.
struct PageDataRef<'a> {
    guard: parking_lot::RwLockReadGuard<'a, Vec<u8>>,
}

impl Deref for PageDataRef<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

/// Helper struct to provide DerefMut for page data.
struct PageDataMut<'a> {
    guard: parking_lot::RwLockWriteGuard<'a, Vec<u8>>,
}

impl Deref for PageDataMut<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl DerefMut for PageDataMut<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}
