//! # heron-common
//!
//! Common types and constants for HeronDB.
//!
//! This crate provides the foundational types shared by every HeronDB
//! component:
//!
//! - **Types**: core identifiers (`PageId`, `Lsn`) with sentinel values
//! - **Constants**: page and buffer pool sizing limits
//!
//! ## Example
//!
//! ```rust
//! use heron_common::types::{Lsn, PageId};
//!
//! let page_id = PageId::new(42);
//! assert!(page_id.is_valid());
//! assert!(!Lsn::INVALID.is_valid());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod constants;
pub mod types;

// Re-export commonly used items at the crate root
pub use constants::*;
pub use types::{Lsn, PageId};
