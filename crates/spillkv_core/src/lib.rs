//! # spillkv Core
//!
//! An embeddable key-value cache for data sets too large or too short-lived
//! to keep in process memory.
//!
//! Keys and value locations stay in memory while the values themselves live
//! in append-only segment files (see `spillkv_storage`). A [`DiskCache`]
//! routes each key to a segment, allocates new segments as existing ones
//! fill up, and keeps optional secondary indexes in step with every write.
//!
//! ## Features
//!
//! - Null values distinct from absent keys
//! - Capacity-bounded segments with automatic compaction
//! - Secondary indexes over arbitrary value attributes
//! - Thread-safe handles with per-segment locking
//!
//! Storage does not survive a restart: segment files are deleted when the
//! cache is closed, and replaced when a cache with the same name is opened.
//!
//! ## Quick Start
//!
//! ```rust
//! use spillkv_codec::CborSerializer;
//! use spillkv_core::{AttrValue, CacheConfig, DiskCache, IndexDefinition};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let config = CacheConfig::new()
//!     .name("scores")
//!     .directory(dir.path())
//!     .segment_capacity("1m".parse::<spillkv_core::ByteSize>().unwrap());
//!
//! let by_parity = IndexDefinition::new("parity", |v: &u64| AttrValue::Bool(v % 2 == 0));
//! let cache: DiskCache<String, u64> =
//!     DiskCache::open_with_indexes(config, CborSerializer::new(), vec![by_parity]).unwrap();
//!
//! cache.put("alice".to_string(), 42).unwrap();
//! cache.put("bob".to_string(), 7).unwrap();
//!
//! assert_eq!(cache.get(&"alice".to_string()).unwrap(), Some(42));
//! assert_eq!(cache.get_by_index("parity", &AttrValue::Bool(true)).unwrap(), vec![42]);
//! cache.close().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod config;
mod disk;
mod error;
mod index;
mod size;

pub use cache::Cache;
pub use config::CacheConfig;
pub use disk::{CacheStats, DiskCache, SegmentFactory, SegmentStats};
pub use error::{CoreError, CoreResult};
pub use index::{AttrValue, AttributeFn, IndexDefinition, IndexRegistry};
pub use size::{ByteSize, SizeUnit};

pub use spillkv_codec::{CborSerializer, CodecError, JsonSerializer, ValueSerializer};
pub use spillkv_storage::{SegmentBackend, SegmentKey, SegmentOptions, SegmentStatus, StorageError};
