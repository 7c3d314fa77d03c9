//! Disk layer errors.

use std::io;

use heron_common::types::PageId;
use thiserror::Error;

/// Result type for disk operations.
pub type DiskResult<T> = Result<T, DiskError>;

/// Errors that can occur in the disk layer.
#[derive(Debug, Error)]
#[allow(missing_docs)] // Fields are documented by variant docs
pub enum DiskError {
    /// Standard I/O error from the backing file.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// Operation on the invalid page id sentinel.
    #[error("invalid page id: {page_id}")]
    InvalidPageId { page_id: PageId },

    /// Caller's buffer does not match the page size.
    #[error("buffer length {actual} does not match page size {expected}")]
    BadBufferLength { expected: usize, actual: usize },

    /// Fewer bytes written than the page holds.
    #[error("short write for page {page_id}: expected {expected} bytes, wrote {actual}")]
    ShortWrite {
        page_id: PageId,
        expected: usize,
        actual: usize,
    },
}

impl DiskError {
    /// Creates an invalid page id error.
    pub fn invalid_page(page_id: PageId) -> Self {
        Self::InvalidPageId { page_id }
    }

    /// Creates a bad buffer length error.
    pub fn bad_buffer(expected: usize, actual: usize) -> Self {
        Self::BadBufferLength { expected, actual }
    }

    /// Returns true if this is a transient error that can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Io { source } => {
                source.kind() == io::ErrorKind::Interrupted
                    || source.kind() == io::ErrorKind::WouldBlock
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DiskError::invalid_page(PageId::INVALID);
        assert!(err.to_string().contains("invalid page id"));

        let err = DiskError::bad_buffer(4096, 100);
        assert!(err.to_string().contains("4096"));
        assert!(err.to_string().contains("100"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err: DiskError = io_err.into();
        assert!(matches!(err, DiskError::Io { .. }));
    }

    #[test]
    fn test_retryable() {
        let err: DiskError = io::Error::new(io::ErrorKind::Interrupted, "interrupted").into();
        assert!(err.is_retryable());

        let err: DiskError = io::Error::new(io::ErrorKind::WouldBlock, "would block").into();
        assert!(err.is_retryable());

        let err: DiskError = io::Error::new(io::ErrorKind::PermissionDenied, "denied").into();
        assert!(!err.is_retryable());

        assert!(!DiskError::invalid_page(PageId::INVALID).is_retryable());
    }
}
