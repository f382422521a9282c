//! Error types for segment storage.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while reading or writing a segment.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading, writing, renaming or deleting the backing file failed.
    ///
    /// The affected segment must be treated as unusable afterwards.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The backing file could not be created or opened.
    #[error("failed to create segment file {path:?}: {source}")]
    CreationFailed {
        /// Path of the segment file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The segment has been closed.
    #[error("segment {path:?} is closed")]
    Closed {
        /// Path of the closed segment.
        path: PathBuf,
    },

    /// The key has no position descriptor in this segment.
    #[error("key not found in segment: {key}")]
    NotFound {
        /// Debug rendering of the missing key.
        key: String,
    },

    /// A value is too long to be addressed by a position descriptor.
    #[error("value of {len} bytes exceeds the maximum value length")]
    ValueTooLarge {
        /// Length of the rejected value.
        len: usize,
    },

    /// A swap could not leave any usable data file behind.
    #[error("compaction failed: {message}")]
    Compaction {
        /// Description of the failure.
        message: String,
    },
}

impl StorageError {
    /// Creates a closed error for the segment at `path`.
    pub fn closed(path: impl Into<PathBuf>) -> Self {
        Self::Closed { path: path.into() }
    }

    /// Creates a not-found error for `key`.
    pub fn not_found(key: &impl std::fmt::Debug) -> Self {
        Self::NotFound {
            key: format!("{key:?}"),
        }
    }

    /// Creates a compaction error.
    pub fn compaction(message: impl Into<String>) -> Self {
        Self::Compaction {
            message: message.into(),
        }
    }

    /// Returns true if this error reports a closed segment.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }
}
