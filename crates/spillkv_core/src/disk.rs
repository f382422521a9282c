//! The disk-backed cache.
//!
//! A [`DiskCache`] spreads its keys over a growing list of segments. Two lock
//! levels keep it consistent:
//!
//! 1. a routing lock over the key → segment table, held while choosing or
//!    allocating a segment and while updating indexes
//! 2. a mutex per segment, held for every read or write of that segment
//!
//! Locks are always taken in that order. A writer acquires the segment mutex
//! before it releases the routing lock and then does the I/O, so readers
//! never see a route whose bytes are not yet reachable, and writes to
//! different segments proceed in parallel.

use crate::cache::Cache;
use crate::config::CacheConfig;
use crate::error::{CoreError, CoreResult};
use crate::index::{AttrValue, IndexDefinition, IndexRegistry};
use parking_lot::{Mutex, RwLock};
use spillkv_codec::ValueSerializer;
use spillkv_storage::{
    LogSegment, SegmentBackend, SegmentKey, SegmentOptions, SegmentStatus, StorageResult,
};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Creates the backend for a new segment file.
pub type SegmentFactory<K> =
    Box<dyn Fn(&Path, SegmentOptions) -> StorageResult<Box<dyn SegmentBackend<K>>> + Send + Sync>;

type SegmentHandle<K> = Arc<Mutex<Box<dyn SegmentBackend<K>>>>;

/// Usage of one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentStats {
    /// Keys stored in the segment.
    pub keys: usize,
    /// Bytes referenced by live values.
    pub used_bytes: u64,
    /// Bytes written to the segment, garbage included.
    pub disk_bytes: u64,
    /// Lifecycle state.
    pub status: SegmentStatus,
}

/// Snapshot of a cache's usage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of keys in the cache.
    pub entries: usize,
    /// Per-segment usage, in allocation order.
    pub segments: Vec<SegmentStats>,
}

impl CacheStats {
    /// Live bytes across all segments.
    #[must_use]
    pub fn used_bytes(&self) -> u64 {
        self.segments.iter().map(|s| s.used_bytes).sum()
    }

    /// Written bytes across all segments.
    #[must_use]
    pub fn disk_bytes(&self) -> u64 {
        self.segments.iter().map(|s| s.disk_bytes).sum()
    }
}

struct RoutingTable<K: SegmentKey> {
    segments: Vec<SegmentHandle<K>>,
    routes: HashMap<K, usize>,
}

/// A key-value cache that keeps values in segment files on disk.
///
/// Keys and the location of every value stay in memory; values are encoded
/// by a [`ValueSerializer`] and written to append-only segment files of
/// bounded capacity. Storage is ephemeral: segment files are deleted when the
/// cache is closed or dropped.
///
/// # Example
///
/// ```rust
/// use spillkv_codec::JsonSerializer;
/// use spillkv_core::{CacheConfig, DiskCache};
///
/// let dir = tempfile::tempdir().unwrap();
/// let config = CacheConfig::new().name("docs").directory(dir.path());
/// let cache: DiskCache<String, String> =
///     DiskCache::open(config, JsonSerializer::new()).unwrap();
///
/// cache.put("greeting".to_string(), "hello".to_string()).unwrap();
/// assert_eq!(cache.get(&"greeting".to_string()).unwrap().as_deref(), Some("hello"));
/// cache.close().unwrap();
/// ```
pub struct DiskCache<K: SegmentKey, V> {
    config: CacheConfig,
    serializer: Box<dyn ValueSerializer<V>>,
    table: RwLock<RoutingTable<K>>,
    indexes: IndexRegistry<K, V>,
    factory: SegmentFactory<K>,
    alive: AtomicBool,
}

impl<K: SegmentKey, V> DiskCache<K, V> {
    /// Opens a cache without indexes.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the directory
    /// cannot be created.
    pub fn open<S>(config: CacheConfig, serializer: S) -> CoreResult<Self>
    where
        S: ValueSerializer<V> + 'static,
    {
        Self::open_with_indexes(config, serializer, Vec::new())
    }

    /// Opens a cache with the given secondary indexes.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, two indexes share a
    /// name, or the directory cannot be created.
    pub fn open_with_indexes<S>(
        config: CacheConfig,
        serializer: S,
        indexes: Vec<IndexDefinition<V>>,
    ) -> CoreResult<Self>
    where
        S: ValueSerializer<V> + 'static,
    {
        Self::with_factory(config, serializer, indexes, |path, options| {
            let segment: Box<dyn SegmentBackend<K>> = Box::new(LogSegment::create(path, options)?);
            Ok(segment)
        })
    }

    /// Opens a cache whose segments are built by `factory`.
    ///
    /// # Errors
    ///
    /// Same as [`open_with_indexes`](Self::open_with_indexes).
    pub fn with_factory<S, F>(
        config: CacheConfig,
        serializer: S,
        indexes: Vec<IndexDefinition<V>>,
        factory: F,
    ) -> CoreResult<Self>
    where
        S: ValueSerializer<V> + 'static,
        F: Fn(&Path, SegmentOptions) -> StorageResult<Box<dyn SegmentBackend<K>>>
            + Send
            + Sync
            + 'static,
    {
        config.validate()?;

        let mut registry = IndexRegistry::new();
        for definition in indexes {
            registry.register(definition)?;
        }

        std::fs::create_dir_all(&config.directory)?;
        debug!(
            cache = %config.name,
            directory = %config.directory.display(),
            capacity = %config.segment_capacity,
            buffer = %config.buffer_size,
            indexes = registry.len(),
            "opened cache"
        );

        Ok(Self {
            config,
            serializer: Box::new(serializer),
            table: RwLock::new(RoutingTable {
                segments: Vec::new(),
                routes: HashMap::new(),
            }),
            indexes: registry,
            factory: Box::new(factory),
            alive: AtomicBool::new(true),
        })
    }

    /// Cache name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The configuration the cache was opened with.
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Registered secondary indexes.
    #[must_use]
    pub fn indexes(&self) -> &IndexRegistry<K, V> {
        &self.indexes
    }

    /// Returns true until [`close`](Self::close) is called.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(CoreError::cache_closed(&self.config.name))
        }
    }

    /// Stores `value` under `key`, or a null when `value` is `None`.
    ///
    /// Returns whether the key already existed. The value is encoded before
    /// any lock is taken.
    ///
    /// # Errors
    ///
    /// Returns `CacheClosed` after close, a codec error if the value cannot
    /// be encoded, or a storage error if the segment write fails. A failed
    /// write of a new key leaves the key absent.
    pub fn put(&self, key: K, value: impl Into<Option<V>>) -> CoreResult<bool> {
        self.ensure_open()?;
        let value = value.into();
        let bytes = match &value {
            Some(v) => self.serializer.serialize(v)?,
            None => Vec::new(),
        };

        let mut table = self.table.write();
        self.ensure_open()?;
        let existing = table.routes.get(&key).copied();
        let (slot, existed) = match existing {
            Some(slot) => (slot, true),
            None => {
                let slot = self.select_segment(&mut table, bytes.len())?;
                table.routes.insert(key.clone(), slot);
                (slot, false)
            }
        };
        self.indexes.on_put(&key, value.as_ref());

        let segment = Arc::clone(&table.segments[slot]);
        let mut guard = segment.lock();
        drop(table);
        let written = guard.put(key.clone(), &bytes);
        drop(guard);

        if let Err(e) = written {
            if !existed {
                self.rollback(&key, slot);
            }
            return Err(e.into());
        }
        Ok(existed)
    }

    /// Picks the first segment with room for `len` more bytes, allocating a
    /// new one if none has.
    fn select_segment(&self, table: &mut RoutingTable<K>, len: usize) -> CoreResult<usize> {
        let capacity = self.config.segment_capacity.as_u64();
        let needed = len as u64;
        for (slot, segment) in table.segments.iter().enumerate() {
            if capacity.saturating_sub(segment.lock().used_bytes()) > needed {
                return Ok(slot);
            }
        }

        let slot = table.segments.len();
        let path = self.config.segment_path(slot);
        let segment = (self.factory)(&path, self.config.segment_options())?;
        debug!(
            cache = %self.config.name,
            segment = slot,
            path = %path.display(),
            "allocated segment"
        );
        table.segments.push(Arc::new(Mutex::new(segment)));
        Ok(slot)
    }

    /// Undoes the routing and index entries of a new key whose write failed.
    fn rollback(&self, key: &K, slot: usize) {
        let mut table = self.table.write();
        if table.routes.get(key) != Some(&slot) {
            return;
        }
        if table.segments[slot].lock().contains(key) {
            return;
        }
        table.routes.remove(key);
        self.indexes.on_remove(key, None);
        debug!(cache = %self.config.name, key = ?key, "rolled back failed write");
    }

    /// Returns the value stored under `key`.
    ///
    /// `None` means the key is absent or holds a null. The segment is locked
    /// before the routing lock is released, so a concurrent `remove` is seen
    /// either entirely or not at all.
    ///
    /// # Errors
    ///
    /// Returns `CacheClosed` after close, a storage error if the read fails,
    /// or a codec error if the stored bytes do not decode.
    pub fn get(&self, key: &K) -> CoreResult<Option<V>> {
        self.ensure_open()?;
        let table = self.table.read();
        let Some(&slot) = table.routes.get(key) else {
            return Ok(None);
        };
        let segment = Arc::clone(&table.segments[slot]);
        let mut guard = segment.lock();
        drop(table);

        let bytes = guard.get(key).map_err(|e| {
            let e = CoreError::from(e);
            report_missing(&self.config.name, key, &e);
            e
        })?;
        drop(guard);
        self.decode(&bytes)
    }

    fn decode(&self, bytes: &[u8]) -> CoreResult<Option<V>> {
        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.serializer.deserialize(bytes)?))
    }

    /// Removes `key` and its index postings. Returns whether it was present.
    ///
    /// # Errors
    ///
    /// Returns `CacheClosed` after close, or a storage error from reading the
    /// old value or dropping its descriptor.
    pub fn remove(&self, key: &K) -> CoreResult<bool> {
        self.ensure_open()?;
        let old = if self.indexes.is_empty() {
            None
        } else {
            self.get(key)?
        };

        let mut table = self.table.write();
        self.ensure_open()?;
        let Some(slot) = table.routes.remove(key) else {
            return Ok(false);
        };
        self.indexes.on_remove(key, old.as_ref());

        let segment = Arc::clone(&table.segments[slot]);
        let mut guard = segment.lock();
        drop(table);
        Ok(guard.remove(key)?)
    }

    /// Returns true if `key` is present, null or not.
    ///
    /// # Errors
    ///
    /// Returns `CacheClosed` after close.
    pub fn contains(&self, key: &K) -> CoreResult<bool> {
        self.ensure_open()?;
        Ok(self.table.read().routes.contains_key(key))
    }

    /// Returns every present key, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns `CacheClosed` after close.
    pub fn keys(&self) -> CoreResult<Vec<K>> {
        self.ensure_open()?;
        Ok(self.table.read().routes.keys().cloned().collect())
    }

    /// Number of present keys.
    ///
    /// # Errors
    ///
    /// Returns `CacheClosed` after close.
    pub fn len(&self) -> CoreResult<usize> {
        self.ensure_open()?;
        Ok(self.table.read().routes.len())
    }

    /// Returns true if no key is present.
    ///
    /// # Errors
    ///
    /// Returns `CacheClosed` after close.
    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Number of segments allocated so far.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.table.read().segments.len()
    }

    /// Keys filed under `attr` in the index named `index`.
    ///
    /// # Errors
    ///
    /// Returns `CacheClosed` after close or `UnknownIndex`.
    pub fn query(&self, index: &str, attr: &AttrValue) -> CoreResult<Vec<K>> {
        self.ensure_open()?;
        self.indexes.query(index, attr)
    }

    /// Current values of the keys filed under `attr` in the index named
    /// `index`. Keys removed or nulled concurrently are skipped.
    ///
    /// # Errors
    ///
    /// Returns `CacheClosed` after close, `UnknownIndex`, or any error from
    /// reading the values.
    pub fn get_by_index(&self, index: &str, attr: &AttrValue) -> CoreResult<Vec<V>> {
        let keys = self.query(index, attr)?;
        let mut values = Vec::with_capacity(keys.len());
        for key in &keys {
            if let Some(value) = self.get(key)? {
                values.push(value);
            }
        }
        Ok(values)
    }

    /// Snapshot of key counts and byte usage.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let table = self.table.read();
        let segments = table
            .segments
            .iter()
            .map(|segment| {
                let segment = segment.lock();
                SegmentStats {
                    keys: segment.len(),
                    used_bytes: segment.used_bytes(),
                    disk_bytes: segment.disk_bytes(),
                    status: segment.status(),
                }
            })
            .collect();
        CacheStats {
            entries: table.routes.len(),
            segments,
        }
    }

    /// Closes every segment, deleting its file. Idempotent.
    ///
    /// Every segment is closed even if an earlier one fails.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a segment.
    pub fn close(&self) -> CoreResult<()> {
        if self
            .alive
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }

        let table = self.table.write();
        let mut first_error = None;
        for (slot, segment) in table.segments.iter().enumerate() {
            if let Err(e) = segment.lock().close() {
                warn!(cache = %self.config.name, segment = slot, error = %e, "failed to close segment");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        debug!(
            cache = %self.config.name,
            segments = table.segments.len(),
            "closed cache"
        );

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

impl<K: SegmentKey, V> Cache<K, V> for DiskCache<K, V> {
    fn put(&self, key: K, value: Option<V>) -> CoreResult<bool> {
        Self::put(self, key, value)
    }

    fn get(&self, key: &K) -> CoreResult<Option<V>> {
        Self::get(self, key)
    }

    fn remove(&self, key: &K) -> CoreResult<bool> {
        Self::remove(self, key)
    }

    fn contains(&self, key: &K) -> CoreResult<bool> {
        Self::contains(self, key)
    }

    fn keys(&self) -> CoreResult<Vec<K>> {
        Self::keys(self)
    }

    fn len(&self) -> CoreResult<usize> {
        Self::len(self)
    }

    fn get_by_index(&self, index: &str, attr: &AttrValue) -> CoreResult<Vec<V>> {
        Self::get_by_index(self, index, attr)
    }

    fn close(&self) -> CoreResult<()> {
        Self::close(self)
    }
}

impl<K: SegmentKey, V> Drop for DiskCache<K, V> {
    fn drop(&mut self) {
        if !self.alive.swap(false, Ordering::AcqRel) {
            return;
        }
        for segment in &self.table.get_mut().segments {
            if let Err(e) = segment.lock().close() {
                warn!(cache = %self.config.name, error = %e, "failed to close segment on drop");
            }
        }
    }
}

impl<K: SegmentKey, V> fmt::Debug for DiskCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiskCache")
            .field("name", &self.config.name)
            .field("directory", &self.config.directory)
            .field("alive", &self.alive.load(Ordering::Relaxed))
            .field("indexes", &self.indexes)
            .finish_non_exhaustive()
    }
}

/// Logs a segment that lost a routed key.
///
/// Routing and segment tables disagreeing is an invariant violation.
fn report_missing<K: fmt::Debug>(cache: &str, key: &K, err: &CoreError) {
    if err.is_not_found() {
        error!(cache = %cache, key = ?key, "routed key missing from its segment");
    }
}
