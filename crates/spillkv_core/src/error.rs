//! Error types for spillkv core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in cache operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Segment storage error.
    #[error("storage error: {0}")]
    Storage(#[from] spillkv_storage::StorageError),

    /// Value serialization error.
    #[error("codec error: {0}")]
    Codec(#[from] spillkv_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The cache has been closed.
    #[error("cache {name} is closed")]
    CacheClosed {
        /// Name of the cache.
        name: String,
    },

    /// Query against an index that was never registered.
    #[error("unknown index: {name}")]
    UnknownIndex {
        /// Name of the index.
        name: String,
    },

    /// An index with this name is already registered.
    #[error("duplicate index: {name}")]
    DuplicateIndex {
        /// Name of the index.
        name: String,
    },

    /// The configuration is not usable.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// A byte size literal could not be parsed.
    #[error("invalid size {input:?}: {reason}")]
    InvalidSize {
        /// The rejected input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl CoreError {
    /// Creates a cache closed error.
    pub fn cache_closed(name: impl Into<String>) -> Self {
        Self::CacheClosed { name: name.into() }
    }

    /// Creates an unknown index error.
    pub fn unknown_index(name: impl Into<String>) -> Self {
        Self::UnknownIndex { name: name.into() }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates an invalid size error.
    pub fn invalid_size(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSize {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if the cache or one of its segments was closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        match self {
            Self::CacheClosed { .. } => true,
            Self::Storage(e) => e.is_closed(),
            _ => false,
        }
    }

    /// Returns true if a routed key was missing from its segment.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Storage(spillkv_storage::StorageError::NotFound { .. })
        )
    }
}
