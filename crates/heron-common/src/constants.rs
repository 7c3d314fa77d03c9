//! System-wide constants for HeronDB.

// =============================================================================
// Page Constants
// =============================================================================

/// Default page size in bytes (4 KB).
///
/// Matches the typical OS page size and filesystem block size.
pub const DEFAULT_PAGE_SIZE: usize = 4 * 1024;

/// Minimum supported page size in bytes (512 B).
pub const MIN_PAGE_SIZE: usize = 512;

/// Maximum supported page size in bytes (64 KB).
pub const MAX_PAGE_SIZE: usize = 64 * 1024;

// =============================================================================
// Buffer Pool Constants
// =============================================================================

/// Default number of frames in the buffer pool.
pub const DEFAULT_POOL_FRAMES: usize = 1024;

/// Default buffer pool memory budget (64 MB).
pub const DEFAULT_BUFFER_POOL_SIZE: usize = 64 * 1024 * 1024;

/// Minimum buffer pool memory budget (1 MB).
pub const MIN_BUFFER_POOL_SIZE: usize = 1024 * 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_constants() {
        assert!(DEFAULT_PAGE_SIZE.is_power_of_two());
        assert!(MIN_PAGE_SIZE.is_power_of_two());
        assert!(MAX_PAGE_SIZE.is_power_of_two());
        assert!(MIN_PAGE_SIZE <= DEFAULT_PAGE_SIZE);
        assert!(DEFAULT_PAGE_SIZE <= MAX_PAGE_SIZE);
    }

    #[test]
    fn test_buffer_pool_constants() {
        // The default pool holds at least a handful of pages.
        assert!(MIN_BUFFER_POOL_SIZE / DEFAULT_PAGE_SIZE >= 16);
        assert!(DEFAULT_POOL_FRAMES > 0);
    }
}
