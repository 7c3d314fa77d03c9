//! Buffer pool configuration.

use heron_common::constants::{DEFAULT_PAGE_SIZE, DEFAULT_POOL_FRAMES, MIN_PAGE_SIZE};

/// Configuration for the buffer pool.
///
/// The pool is sized once at construction; there is no dynamic resizing.
#[derive(Debug, Clone)]
pub struct BufferPoolConfig {
    /// Number of page frames, allocated eagerly.
    pub pool_size: usize,
    /// Page size in bytes; must match the disk manager's.
    pub page_size: usize,
}

impl BufferPoolConfig {
    /// Creates a configuration with the given number of frames.
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool_size,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Sets the page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Returns the total memory used by the frame array.
    pub fn memory_usage(&self) -> usize {
        self.pool_size * self.page_size
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.pool_size == 0 {
            return Err("pool_size must be > 0");
        }
        if !self.page_size.is_power_of_two() {
            return Err("page_size must be a power of 2");
        }
        if self.page_size < MIN_PAGE_SIZE {
            return Err("page_size is below the supported minimum");
        }
        Ok(())
    }
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_FRAMES)
    }
}
