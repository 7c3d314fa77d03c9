//! Buffer pool errors.

use heron_common::types::PageId;
use thiserror::Error;

use crate::disk::DiskError;

/// Result type for buffer pool operations.
pub type BufferResult<T> = Result<T, BufferError>;

/// Errors that can occur during buffer pool operations.
///
/// Pool exhaustion (all frames pinned) is not an error: operations that can
/// hit it return `Ok(None)` instead, leaving the caller to back off.
#[derive(Debug, Error)]
#[allow(missing_docs)] // Fields are documented by variant docs
pub enum BufferError {
    /// Configuration rejected at construction.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Page size disagreement between the pool and its disk manager.
    #[error("page size mismatch: pool uses {pool}, disk manager uses {disk}")]
    PageSizeMismatch { pool: usize, disk: usize },

    /// Operation on the invalid page id sentinel.
    #[error("invalid page id: {page_id}")]
    InvalidPageId { page_id: PageId },

    /// Propagated disk layer failure.
    #[error("disk error: {0}")]
    Disk(#[from] DiskError),
}

impl BufferError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if the failure came from the disk layer.
    pub fn is_disk(&self) -> bool {
        matches!(self, Self::Disk(_))
    }

    /// Returns true if this is a transient error that can be retried.
    ///
    /// Only disk failures can be transient; configuration and page id
    /// errors never go away on their own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Disk(source) if source.is_retryable())
    }
}
