//! Benchmark utilities.

#![warn(missing_docs)]

use rand::seq::SliceRandom;
use rand::Rng;
use spillkv_codec::CborSerializer;
use spillkv_core::{CacheConfig, DiskCache};
use tempfile::TempDir;

/// Generate random bytes of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate `count` distinct keys in shuffled order.
pub fn shuffled_keys(count: u64) -> Vec<u64> {
    let mut keys: Vec<u64> = (0..count).collect();
    keys.shuffle(&mut rand::thread_rng());
    keys
}

/// Open a byte-valued cache in a fresh temporary directory.
///
/// The directory guard must outlive the cache.
pub fn byte_cache(capacity: u64, buffer: u64) -> (TempDir, DiskCache<u64, Vec<u8>>) {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let config = CacheConfig::new()
        .name("bench")
        .directory(dir.path())
        .segment_capacity(capacity)
        .buffer_size(buffer);
    let cache = DiskCache::open(config, CborSerializer::new()).expect("Failed to open cache");
    (dir, cache)
}
