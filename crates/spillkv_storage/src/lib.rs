//! # spillkv Storage
//!
//! The disk-backed segment engine underneath spillkv caches.
//!
//! A segment is one append-only file plus a bounded in-memory write buffer and
//! a table mapping each key to the [`PositionDescriptor`] of its latest value.
//! Segments are **opaque byte stores**: they never see values, only the bytes
//! a serializer produced for them.
//!
//! ## Design Principles
//!
//! - Values are appended at a monotonic write cursor; overwrites leave garbage
//! - Compaction rewrites live values into a fresh file and swaps it in
//! - Segments do not lock internally; the owner serializes access
//! - Storage is ephemeral: files are deleted on open and on close
//!
//! ## Example
//!
//! ```rust
//! use spillkv_storage::{LogSegment, SegmentBackend, SegmentOptions};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let path = dir.path().join("demo_cache_0.data");
//! let mut segment = LogSegment::create(&path, SegmentOptions::default()).unwrap();
//!
//! segment.put("greeting", b"hello world").unwrap();
//! assert_eq!(segment.get(&"greeting").unwrap(), b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod descriptor;
mod error;
mod segment;
mod swap;

pub use backend::{SegmentBackend, SegmentKey};
pub use descriptor::{PositionDescriptor, SegmentStatus};
pub use error::{StorageError, StorageResult};
pub use segment::{LogSegment, SegmentOptions, DEFAULT_BUFFER_LIMIT, DEFAULT_CAPACITY};
