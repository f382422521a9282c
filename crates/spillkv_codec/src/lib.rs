//! # spillkv Codec
//!
//! Serializers that turn cache values into the opaque bytes stored in
//! segments.
//!
//! Caches depend only on the [`ValueSerializer`] capability. Two strategies are
//! provided:
//!
//! - [`CborSerializer`] - compact binary encoding via `ciborium`
//! - [`JsonSerializer`] - human-readable encoding via `serde_json`
//!
//! An empty byte sequence is reserved for null, so serializers reject any
//! value that would encode to zero bytes.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod serializer;

pub use error::{CodecError, CodecResult};
pub use serializer::{CborSerializer, JsonSerializer, ValueSerializer};
