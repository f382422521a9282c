//! # spillkv Testkit
//!
//! Test utilities for spillkv.
//!
//! This crate provides:
//! - Caches in temporary directories, and a record type with an index
//! - Property-based test generators using proptest
//! - In-memory and failure-injecting segment backends
//! - Stress testing utilities
//!
//! ## Usage
//!
//! ```rust
//! use spillkv_testkit::prelude::*;
//!
//! let cache = scenarios::populated_cache(10);
//! assert_eq!(cache.len().unwrap(), 10);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod backends;
pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::backends::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use backends::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;
