//! Test fixtures and cache helpers.
//!
//! Provides caches in throwaway directories plus a small record type with a
//! ready-made index, so tests can start from a working cache in one line.

use serde::{Deserialize, Serialize};
use spillkv_core::{
    CacheConfig, CborSerializer, DiskCache, IndexDefinition, SegmentKey, ValueSerializer,
};
use std::path::Path;
use tempfile::TempDir;

/// A record with an indexable group and an opaque payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRecord {
    /// Record identifier.
    pub id: u64,
    /// Group the record is indexed under.
    pub group: String,
    /// Filler bytes.
    pub payload: Vec<u8>,
}

impl TestRecord {
    /// Creates a record with `payload_len` filler bytes.
    pub fn new(id: u64, group: impl Into<String>, payload_len: usize) -> Self {
        Self {
            id,
            group: group.into(),
            payload: vec![(id % 251) as u8; payload_len],
        }
    }
}

/// Index of [`TestRecord`]s by group, named `"group"`.
pub fn group_index() -> IndexDefinition<TestRecord> {
    IndexDefinition::new("group", |r: &TestRecord| r.group.as_str().into())
}

/// A cache in its own temporary directory.
///
/// The directory outlives the cache, so segment cleanup on drop can be
/// observed by checking [`dir`](Self::dir).
pub struct TestCache<K: SegmentKey, V> {
    /// The cache instance.
    pub cache: DiskCache<K, V>,
    temp_dir: TempDir,
}

impl TestCache<String, TestRecord> {
    /// Record cache with the group index and default sizes.
    pub fn records() -> Self {
        Self::with_indexes(|c| c, CborSerializer::new(), vec![group_index()])
    }

    /// Record cache with small segments, so a few dozen records span
    /// several segments.
    pub fn small_segments() -> Self {
        Self::with_indexes(
            |c| c.segment_capacity(1024).buffer_size(256),
            CborSerializer::new(),
            vec![group_index()],
        )
    }
}

impl<K: SegmentKey, V> TestCache<K, V> {
    /// Opens a cache with `serializer` and no indexes.
    pub fn new<S>(serializer: S) -> Self
    where
        S: ValueSerializer<V> + 'static,
    {
        Self::with_indexes(|c| c, serializer, Vec::new())
    }

    /// Opens a cache, letting `configure` adjust the configuration.
    ///
    /// The name and directory are set before `configure` runs.
    pub fn with_indexes<S, F>(configure: F, serializer: S, indexes: Vec<IndexDefinition<V>>) -> Self
    where
        S: ValueSerializer<V> + 'static,
        F: FnOnce(CacheConfig) -> CacheConfig,
    {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = configure(CacheConfig::new().name("test").directory(temp_dir.path()));
        let cache = DiskCache::open_with_indexes(config, serializer, indexes)
            .expect("Failed to open test cache");
        Self { cache, temp_dir }
    }

    /// Directory holding the segment files.
    pub fn dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Splits into the cache and the directory guard.
    ///
    /// Keep the guard alive for as long as the cache is used.
    pub fn into_parts(self) -> (DiskCache<K, V>, TempDir) {
        (self.cache, self.temp_dir)
    }

    /// Number of files currently in the cache directory.
    pub fn file_count(&self) -> usize {
        std::fs::read_dir(self.temp_dir.path())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

impl<K: SegmentKey, V> std::ops::Deref for TestCache<K, V> {
    type Target = DiskCache<K, V>;

    fn deref(&self) -> &Self::Target {
        &self.cache
    }
}

/// Runs a test against a fresh record cache.
///
/// # Example
///
/// ```rust
/// use spillkv_testkit::{with_temp_cache, TestRecord};
///
/// with_temp_cache(|cache| {
///     cache.put("a".to_string(), TestRecord::new(1, "red", 8)).unwrap();
///     assert_eq!(cache.len().unwrap(), 1);
/// });
/// ```
pub fn with_temp_cache<F, R>(f: F) -> R
where
    F: FnOnce(&DiskCache<String, TestRecord>) -> R,
{
    let test_cache = TestCache::records();
    f(&test_cache.cache)
}

/// Installs a `tracing` subscriber that honors `RUST_LOG`.
///
/// Safe to call from every test; only the first call has an effect.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Pre-populated caches.
pub mod scenarios {
    use super::*;

    /// Groups records are spread over, round-robin.
    pub const GROUPS: [&str; 3] = ["red", "green", "blue"];

    /// Key under which [`populated_cache`] stores record `id`.
    pub fn record_key(id: u64) -> String {
        format!("record-{id:05}")
    }

    /// Record cache holding `count` records across [`GROUPS`].
    pub fn populated_cache(count: u64) -> TestCache<String, TestRecord> {
        let test_cache = TestCache::small_segments();
        for id in 0..count {
            let group = GROUPS[(id % GROUPS.len() as u64) as usize];
            test_cache
                .put(record_key(id), TestRecord::new(id, group, 32))
                .expect("Failed to put record");
        }
        test_cache
    }
}

#[cfg(test)]
mod tests {
    use super::scenarios::*;
    use super::*;
    use spillkv_core::AttrValue;

    #[test]
    fn test_records_fixture() {
        let cache = TestCache::records();
        cache.put("k".into(), TestRecord::new(1, "red", 4)).unwrap();
        assert_eq!(cache.get(&"k".into()).unwrap().unwrap().group, "red");
        assert_eq!(cache.file_count(), 1);
    }

    #[test]
    fn test_populated_cache() {
        let cache = populated_cache(60);
        assert_eq!(cache.len().unwrap(), 60);
        assert!(cache.segment_count() > 1);
        let red = cache.get_by_index("group", &AttrValue::from("red")).unwrap();
        assert_eq!(red.len(), 20);
    }

    #[test]
    fn test_drop_cleans_directory() {
        let test_cache = populated_cache(30);
        let dir = test_cache.dir().to_path_buf();
        let (cache, temp_dir) = test_cache.into_parts();
        drop(cache);
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
        drop(temp_dir);
    }

    #[test]
    fn test_with_temp_cache() {
        let len = with_temp_cache(|cache| {
            cache.put("x".into(), None).unwrap();
            cache.len().unwrap()
        });
        assert_eq!(len, 1);
    }
}
