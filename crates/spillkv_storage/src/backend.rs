//! Segment backend trait definition.

use crate::descriptor::SegmentStatus;
use crate::error::StorageResult;
use std::fmt::Debug;
use std::hash::Hash;

/// Bound for keys stored in a segment.
pub trait SegmentKey: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

impl<T> SegmentKey for T where T: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

/// A single storage segment: one backing store plus its key → location table.
///
/// Segments do **no** internal locking. Callers wrap each segment in a mutex and
/// hold it for the duration of every call, including any compaction a `put`
/// happens to trigger.
///
/// # Invariants
///
/// - `used_bytes` equals the sum of the lengths of all live values
/// - a value's bytes are never overwritten while its key still references them
/// - once `close` returns, every other operation fails with `Closed`
///
/// # Implementors
///
/// - [`super::LogSegment`] - buffered append-only file
pub trait SegmentBackend<K: SegmentKey>: Send + Debug {
    /// Stores `data` under `key`, replacing any previous value.
    ///
    /// An empty `data` records an explicit null.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment is closed or an I/O error occurs.
    fn put(&mut self, key: K, data: &[u8]) -> StorageResult<()>;

    /// Returns the bytes stored under `key`; empty for an explicit null.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the key has no descriptor, `Closed` after close,
    /// or an I/O error.
    fn get(&mut self, key: &K) -> StorageResult<Vec<u8>>;

    /// Drops the descriptor for `key`. Returns whether it was present.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment is closed.
    fn remove(&mut self, key: &K) -> StorageResult<bool>;

    /// Returns true if `key` has a descriptor.
    fn contains(&self, key: &K) -> bool;

    /// Returns all keys with a descriptor.
    fn keys(&self) -> Vec<K>;

    /// Number of keys with a descriptor.
    fn len(&self) -> usize;

    /// Returns true if the segment holds no keys.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes referenced by live descriptors.
    fn used_bytes(&self) -> u64;

    /// Bytes written so far, including garbage not yet compacted.
    fn disk_bytes(&self) -> u64;

    /// Current lifecycle state.
    fn status(&self) -> SegmentStatus;

    /// Closes the segment and deletes its backing storage. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing file cannot be removed.
    fn close(&mut self) -> StorageResult<()>;
}
