//! # heron-storage
//!
//! Buffer pool and disk layer for HeronDB.
//!
//! This crate provides the in-memory page cache that sits between the
//! database's access methods and the block-oriented backing store:
//!
//! - **Buffer pool**: a fixed set of frames, a page table, and strict LRU
//!   eviction with pin counting and dirty write-back
//! - **Disk layer**: the synchronous [`disk::DiskManager`] interface with
//!   file-backed and heap-backed implementations
//! - **Log manager**: the write-ahead-log collaborator the pool holds for
//!   future flush ordering

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Page caching and eviction
pub mod buffer;

/// Backing store interface and implementations
pub mod disk;

/// Write-ahead-log collaborator
pub mod wal;
