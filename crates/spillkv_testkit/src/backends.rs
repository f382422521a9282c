//! Segment backends for tests.
//!
//! [`MemorySegment`] keeps values in a map and never touches the disk.
//! [`FaultySegment`] wraps another backend and fails writes on demand.
//! Both plug into a cache through `DiskCache::with_factory`.

use spillkv_core::{SegmentBackend, SegmentKey, SegmentOptions, SegmentStatus, StorageError};
use spillkv_storage::{LogSegment, StorageResult};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A segment that keeps its values in memory.
///
/// Byte accounting matches a file-backed segment without compaction: the
/// written byte count only grows.
#[derive(Debug)]
pub struct MemorySegment<K> {
    path: PathBuf,
    values: HashMap<K, Vec<u8>>,
    used: u64,
    written: u64,
    status: SegmentStatus,
}

impl<K: SegmentKey> MemorySegment<K> {
    /// Creates an empty segment. `path` is only used in error messages.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            values: HashMap::new(),
            used: 0,
            written: 0,
            status: SegmentStatus::Normal,
        }
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.status == SegmentStatus::Closed {
            Err(StorageError::closed(&self.path))
        } else {
            Ok(())
        }
    }
}

impl<K: SegmentKey> SegmentBackend<K> for MemorySegment<K> {
    fn put(&mut self, key: K, data: &[u8]) -> StorageResult<()> {
        self.ensure_open()?;
        self.written += data.len() as u64;
        self.used += data.len() as u64;
        if let Some(old) = self.values.insert(key, data.to_vec()) {
            self.used -= old.len() as u64;
        }
        Ok(())
    }

    fn get(&mut self, key: &K) -> StorageResult<Vec<u8>> {
        self.ensure_open()?;
        self.values
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::not_found(key))
    }

    fn remove(&mut self, key: &K) -> StorageResult<bool> {
        self.ensure_open()?;
        match self.values.remove(key) {
            Some(old) => {
                self.used -= old.len() as u64;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn contains(&self, key: &K) -> bool {
        self.values.contains_key(key)
    }

    fn keys(&self) -> Vec<K> {
        self.values.keys().cloned().collect()
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn used_bytes(&self) -> u64 {
        self.used
    }

    fn disk_bytes(&self) -> u64 {
        self.written
    }

    fn status(&self) -> SegmentStatus {
        self.status
    }

    fn close(&mut self) -> StorageResult<()> {
        self.status = SegmentStatus::Closed;
        self.values.clear();
        self.used = 0;
        Ok(())
    }
}

/// Shared switch that makes [`FaultySegment`] writes fail while set.
#[derive(Debug, Clone, Default)]
pub struct FaultSwitch(Arc<AtomicBool>);

impl FaultSwitch {
    /// Creates a switch in the off position.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent writes fail.
    pub fn trip(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Lets writes through again.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Returns true while writes fail.
    pub fn is_tripped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A backend whose `put` fails with an I/O error while its switch is set.
#[derive(Debug)]
pub struct FaultySegment<K: SegmentKey> {
    inner: Box<dyn SegmentBackend<K>>,
    switch: FaultSwitch,
}

impl<K: SegmentKey> FaultySegment<K> {
    /// Wraps `inner`.
    pub fn new(inner: Box<dyn SegmentBackend<K>>, switch: FaultSwitch) -> Self {
        Self { inner, switch }
    }
}

impl<K: SegmentKey> SegmentBackend<K> for FaultySegment<K> {
    fn put(&mut self, key: K, data: &[u8]) -> StorageResult<()> {
        if self.switch.is_tripped() {
            return Err(StorageError::Io(io::Error::other("injected write fault")));
        }
        self.inner.put(key, data)
    }

    fn get(&mut self, key: &K) -> StorageResult<Vec<u8>> {
        self.inner.get(key)
    }

    fn remove(&mut self, key: &K) -> StorageResult<bool> {
        self.inner.remove(key)
    }

    fn contains(&self, key: &K) -> bool {
        self.inner.contains(key)
    }

    fn keys(&self) -> Vec<K> {
        self.inner.keys()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn used_bytes(&self) -> u64 {
        self.inner.used_bytes()
    }

    fn disk_bytes(&self) -> u64 {
        self.inner.disk_bytes()
    }

    fn status(&self) -> SegmentStatus {
        self.inner.status()
    }

    fn close(&mut self) -> StorageResult<()> {
        self.inner.close()
    }
}

/// Segment factory producing [`MemorySegment`]s.
pub fn memory_factory<K: SegmentKey>(
) -> impl Fn(&Path, SegmentOptions) -> StorageResult<Box<dyn SegmentBackend<K>>> + Send + Sync {
    |path: &Path, _options: SegmentOptions| {
        let segment: Box<dyn SegmentBackend<K>> = Box::new(MemorySegment::new(path));
        Ok(segment)
    }
}

/// Segment factory producing file-backed segments that fail while `switch`
/// is tripped.
pub fn faulty_factory<K: SegmentKey>(
    switch: FaultSwitch,
) -> impl Fn(&Path, SegmentOptions) -> StorageResult<Box<dyn SegmentBackend<K>>> + Send + Sync {
    move |path: &Path, options: SegmentOptions| {
        let inner: Box<dyn SegmentBackend<K>> = Box::new(LogSegment::create(path, options)?);
        let segment: Box<dyn SegmentBackend<K>> =
            Box::new(FaultySegment::new(inner, switch.clone()));
        Ok(segment)
    }
}
