//! Strict LRU replacement policy.
//!
//! The replacer tracks the frames whose occupant is unpinned and therefore
//! eligible for eviction. It keeps them in least-recently-unpinned order
//! using a doubly-linked list plus a hash index for O(1) victim selection,
//! insertion, and removal.

use std::collections::HashMap;
use std::ptr::NonNull;

use parking_lot::Mutex;

use super::frame::FrameId;

/// A node in the recency list.
struct Node {
    frame_id: FrameId,
    prev: Option<NonNull<Node>>,
    next: Option<NonNull<Node>>,
}

impl Node {
    fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            prev: None,
            next: None,
        }
    }
}

/// List state behind the replacer's latch.
///
/// `head` is the most recently unpinned frame, `tail` the least recently
/// unpinned one - the next victim.
struct LruState {
    capacity: usize,
    map: HashMap<FrameId, NonNull<Node>>,
    head: Option<NonNull<Node>>,
    tail: Option<NonNull<Node>>,
}

// Safety: the nodes are owned exclusively by this structure and only ever
// touched while it is borrowed, so moving the whole structure across
// threads is sound.
unsafe impl Send for LruState {}

impl LruState {
    fn push_front(&mut self, node_ptr: NonNull<Node>) {
        unsafe {
            (*node_ptr.as_ptr()).prev = None;
            (*node_ptr.as_ptr()).next = self.head;

            if let Some(head) = self.head {
                (*head.as_ptr()).prev = Some(node_ptr);
            }
            self.head = Some(node_ptr);

            if self.tail.is_none() {
                self.tail = Some(node_ptr);
            }
        }
    }

    fn unlink(&mut self, node_ptr: NonNull<Node>) {
        unsafe {
            let prev = (*node_ptr.as_ptr()).prev;
            let next = (*node_ptr.as_ptr()).next;

            if let Some(prev) = prev {
                (*prev.as_ptr()).next = next;
            } else {
                self.head = next;
            }

            if let Some(next) = next {
                (*next.as_ptr()).prev = prev;
            } else {
                self.tail = prev;
            }
        }
    }

    /// Removes and frees the tail node, returning its frame id.
    fn pop_tail(&mut self) -> Option<FrameId> {
        let tail = self.tail?;
        self.unlink(tail);
        // Safety: the node was allocated by Box::into_raw and is no longer
        // reachable from the list.
        let node = unsafe { Box::from_raw(tail.as_ptr()) };
        self.map.remove(&node.frame_id);
        Some(node.frame_id)
    }

    fn remove(&mut self, frame_id: FrameId) -> bool {
        if let Some(node_ptr) = self.map.remove(&frame_id) {
            self.unlink(node_ptr);
            // Safety: removed from both the map and the list above.
            drop(unsafe { Box::from_raw(node_ptr.as_ptr()) });
            true
        } else {
            false
        }
    }
}

impl Drop for LruState {
    fn drop(&mut self) {
        let mut current = self.head;
        while let Some(node_ptr) = current {
            unsafe {
                current = (*node_ptr.as_ptr()).next;
                drop(Box::from_raw(node_ptr.as_ptr()));
            }
        }
    }
}

/// Strict LRU replacer over buffer pool frames.
///
/// Each operation is individually atomic behind an internal latch, so the
/// replacer stays consistent even when called outside the pool latch.
pub struct LruReplacer {
    state: Mutex<LruState>,
}

impl LruReplacer {
    /// Creates a replacer that tracks at most `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(LruState {
                capacity,
                map: HashMap::with_capacity(capacity),
                head: None,
                tail: None,
            }),
        }
    }

    /// Removes and returns the least recently unpinned frame, or `None` if
    /// no frame is eligible for eviction.
    pub fn victim(&self) -> Option<FrameId> {
        self.state.lock().pop_tail()
    }

    /// Removes `frame_id` from the eviction candidates.
    ///
    /// Called when a frame's occupant gains its first pin or the frame is
    /// otherwise claimed. A no-op if the frame is not tracked.
    pub fn pin(&self, frame_id: FrameId) {
        self.state.lock().remove(frame_id);
    }

    /// Marks `frame_id` as the most recently unpinned frame.
    ///
    /// Called when a frame's pin count drops to zero. A no-op if the frame
    /// is already tracked; its recency position does not change. If the
    /// replacer is somehow at capacity, the oldest entry is dropped first
    /// (unreachable when the pool pins every frame before reuse).
    pub fn unpin(&self, frame_id: FrameId) {
        let mut state = self.state.lock();
        if state.map.contains_key(&frame_id) {
            return;
        }
        if state.map.len() >= state.capacity {
            state.pop_tail();
        }

        let node = Box::new(Node::new(frame_id));
        let node_ptr = NonNull::from(Box::leak(node));
        state.push_front(node_ptr);
        state.map.insert(frame_id, node_ptr);
    }

    /// Returns the number of tracked frames.
    pub fn size(&self) -> usize {
        self.state.lock().map.len()
    }

    /// Returns true if `frame_id` is currently tracked.
    pub fn contains(&self, frame_id: FrameId) -> bool {
        self.state.lock().map.contains_key(&frame_id)
    }
}

impl std::fmt::Debug for LruReplacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("LruReplacer")
            .field("capacity", &state.capacity)
            .field("size", &state.map.len())
            .finish()
    }
}
