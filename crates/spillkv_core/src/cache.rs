//! The cache interface.

use crate::error::CoreResult;
use crate::index::AttrValue;

/// A key-value cache with optional secondary indexes.
///
/// Values are optional: a key can be present with a null value, which is
/// distinct from the key being absent. All operations fail with
/// `CacheClosed` once [`close`](Cache::close) has been called.
pub trait Cache<K, V> {
    /// Stores `value` under `key`. Returns whether the key already existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache is closed, the value cannot be encoded,
    /// or the write fails.
    fn put(&self, key: K, value: Option<V>) -> CoreResult<bool>;

    /// Returns the value stored under `key`.
    ///
    /// `None` means either the key is absent or its value is null; use
    /// [`contains`](Cache::contains) to tell the two apart.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache is closed or the read fails.
    fn get(&self, key: &K) -> CoreResult<Option<V>>;

    /// Removes `key`. Returns whether it was present.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache is closed or the segment fails.
    fn remove(&self, key: &K) -> CoreResult<bool>;

    /// Returns true if `key` is present, null or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache is closed.
    fn contains(&self, key: &K) -> CoreResult<bool>;

    /// Returns every present key, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache is closed.
    fn keys(&self) -> CoreResult<Vec<K>>;

    /// Number of present keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache is closed.
    fn len(&self) -> CoreResult<usize>;

    /// Returns true if no key is present.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache is closed.
    fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns the current values of every key filed under `attr` in the
    /// index named `index`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownIndex` for an unregistered index, or any error from
    /// reading the values.
    fn get_by_index(&self, index: &str, attr: &AttrValue) -> CoreResult<Vec<V>>;

    /// Releases every resource the cache holds. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while closing the underlying storage.
    fn close(&self) -> CoreResult<()>;
}
