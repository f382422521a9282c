//! Cache configuration.

use crate::error::{CoreError, CoreResult};
use crate::size::ByteSize;
use spillkv_storage::SegmentOptions;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Configuration for opening a [`DiskCache`](crate::DiskCache).
///
/// Settings are fixed for the lifetime of the cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Cache name, used to derive segment file names.
    pub name: String,

    /// Directory holding the segment files. Created if missing.
    pub directory: PathBuf,

    /// Live bytes a segment accepts before new keys go elsewhere.
    pub segment_capacity: ByteSize,

    /// Size of each segment's in-memory write buffer.
    pub buffer_size: ByteSize,

    /// Whether to sync segment files after every write to disk.
    pub sync_on_flush: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis());
        Self {
            name: format!("spillkv_{millis}"),
            directory: std::env::temp_dir().join("spillkv"),
            segment_capacity: ByteSize::mib(50),
            buffer_size: ByteSize::kib(64),
            sync_on_flush: false,
        }
    }
}

impl CacheConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cache name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the storage directory.
    #[must_use]
    pub fn directory(mut self, directory: impl AsRef<Path>) -> Self {
        self.directory = directory.as_ref().to_path_buf();
        self
    }

    /// Sets the per-segment capacity.
    #[must_use]
    pub fn segment_capacity(mut self, size: impl Into<ByteSize>) -> Self {
        self.segment_capacity = size.into();
        self
    }

    /// Sets the per-segment write buffer size.
    #[must_use]
    pub fn buffer_size(mut self, size: impl Into<ByteSize>) -> Self {
        self.buffer_size = size.into();
        self
    }

    /// Sets whether segment files are synced after every write.
    #[must_use]
    pub const fn sync_on_flush(mut self, value: bool) -> Self {
        self.sync_on_flush = value;
        self
    }

    /// Checks that the configuration can be used to open a cache.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for an empty name, a name containing a path
    /// separator, a zero capacity, or a zero or oversized buffer.
    pub fn validate(&self) -> CoreResult<()> {
        if self.name.is_empty() {
            return Err(CoreError::invalid_config("cache name must not be empty"));
        }
        if self.name.contains(['/', '\\']) {
            return Err(CoreError::invalid_config(format!(
                "cache name {:?} must not contain path separators",
                self.name
            )));
        }
        if self.segment_capacity.as_u64() == 0 {
            return Err(CoreError::invalid_config("segment capacity must be positive"));
        }
        let buffer = self.buffer_size.as_u64();
        if buffer == 0 {
            return Err(CoreError::invalid_config("buffer size must be positive"));
        }
        if buffer > u64::from(u32::MAX) {
            return Err(CoreError::invalid_config(format!(
                "buffer size {} exceeds the maximum of 4g",
                self.buffer_size
            )));
        }
        Ok(())
    }

    /// Path of the segment file with the given index.
    #[must_use]
    pub fn segment_path(&self, index: usize) -> PathBuf {
        self.directory
            .join(format!("{}_cache_{}.data", self.name, index))
    }

    /// Storage options shared by every segment of the cache.
    #[must_use]
    pub fn segment_options(&self) -> SegmentOptions {
        SegmentOptions::default()
            .capacity(self.segment_capacity.as_u64())
            .buffer_limit(self.buffer_size.as_u64() as usize)
            .sync_on_flush(self.sync_on_flush)
    }
}
