//! The serializer capability and its built-in strategies.

use crate::error::{CodecError, CodecResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Converts cache values to bytes and back.
///
/// Implementations must round-trip every value and must never encode a real
/// value as zero bytes: caches store null as an empty byte sequence.
///
/// # Example
///
/// ```rust
/// use spillkv_codec::{CborSerializer, ValueSerializer};
///
/// let serializer = CborSerializer::<Vec<u32>>::new();
/// let bytes = serializer.serialize(&vec![1, 2, 3]).unwrap();
/// assert_eq!(serializer.deserialize(&bytes).unwrap(), vec![1, 2, 3]);
/// ```
pub trait ValueSerializer<V>: Send + Sync {
    /// Encodes `value`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be encoded.
    fn serialize(&self, value: &V) -> CodecResult<Vec<u8>>;

    /// Decodes a value previously produced by [`serialize`](Self::serialize).
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid encoding.
    fn deserialize(&self, bytes: &[u8]) -> CodecResult<V>;
}

impl<V, S> ValueSerializer<V> for Arc<S>
where
    S: ValueSerializer<V> + ?Sized,
{
    fn serialize(&self, value: &V) -> CodecResult<Vec<u8>> {
        (**self).serialize(value)
    }

    fn deserialize(&self, bytes: &[u8]) -> CodecResult<V> {
        (**self).deserialize(bytes)
    }
}

impl<V, S> ValueSerializer<V> for Box<S>
where
    S: ValueSerializer<V> + ?Sized,
{
    fn serialize(&self, value: &V) -> CodecResult<Vec<u8>> {
        (**self).serialize(value)
    }

    fn deserialize(&self, bytes: &[u8]) -> CodecResult<V> {
        (**self).deserialize(bytes)
    }
}

/// Binary serializer using CBOR via serde.
pub struct CborSerializer<V> {
    _marker: PhantomData<fn() -> V>,
}

impl<V> CborSerializer<V> {
    /// Creates a CBOR serializer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<V> Default for CborSerializer<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for CborSerializer<V> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for CborSerializer<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CborSerializer")
    }
}

impl<V> ValueSerializer<V> for CborSerializer<V>
where
    V: Serialize + DeserializeOwned,
{
    fn serialize(&self, value: &V) -> CodecResult<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
        non_empty(buf)
    }

    fn deserialize(&self, bytes: &[u8]) -> CodecResult<V> {
        ciborium::from_reader(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))
    }
}

/// Text serializer using JSON via serde.
pub struct JsonSerializer<V> {
    _marker: PhantomData<fn() -> V>,
}

impl<V> JsonSerializer<V> {
    /// Creates a JSON serializer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<V> Default for JsonSerializer<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for JsonSerializer<V> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for JsonSerializer<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JsonSerializer")
    }
}

impl<V> ValueSerializer<V> for JsonSerializer<V>
where
    V: Serialize + DeserializeOwned,
{
    fn serialize(&self, value: &V) -> CodecResult<Vec<u8>> {
        let buf =
            serde_json::to_vec(value).map_err(|e| CodecError::encoding_failed(e.to_string()))?;
        non_empty(buf)
    }

    fn deserialize(&self, bytes: &[u8]) -> CodecResult<V> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))
    }
}

fn non_empty(buf: Vec<u8>) -> CodecResult<Vec<u8>> {
    if buf.is_empty() {
        return Err(CodecError::EmptyEncoding);
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct User {
        id: u64,
        name: String,
        tags: Vec<String>,
    }

    fn alice() -> User {
        User {
            id: 7,
            name: "alice".into(),
            tags: vec!["admin".into()],
        }
    }

    #[test]
    fn cbor_roundtrip_struct() {
        let s = CborSerializer::<User>::new();
        let bytes = s.serialize(&alice()).unwrap();
        assert!(!bytes.is_empty());
        assert_eq!(s.deserialize(&bytes).unwrap(), alice());
    }

    #[test]
    fn json_roundtrip_struct() {
        let s = JsonSerializer::<User>::new();
        let bytes = s.serialize(&alice()).unwrap();
        assert!(bytes.starts_with(b"{"));
        assert_eq!(s.deserialize(&bytes).unwrap(), alice());
    }

    #[test]
    fn empty_string_has_non_empty_encoding() {
        let cbor = CborSerializer::<String>::new();
        let json = JsonSerializer::<String>::new();
        assert!(!cbor.serialize(&String::new()).unwrap().is_empty());
        assert_eq!(json.serialize(&String::new()).unwrap(), b"\"\"");
    }

    #[test]
    fn garbage_fails_to_decode() {
        let s = JsonSerializer::<User>::new();
        assert!(matches!(
            s.deserialize(b"not json"),
            Err(CodecError::DecodingFailed { .. })
        ));

        let c = CborSerializer::<User>::new();
        assert!(c.deserialize(&[0xff, 0x00]).is_err());
    }

    #[test]
    fn shared_serializer_delegates() {
        let s: Arc<dyn ValueSerializer<u32>> = Arc::new(CborSerializer::<u32>::new());
        let bytes = s.serialize(&42).unwrap();
        assert_eq!(s.deserialize(&bytes).unwrap(), 42);
    }

    proptest! {
        #[test]
        fn cbor_strings_roundtrip(value in ".*") {
            let s = CborSerializer::<String>::new();
            let bytes = s.serialize(&value).unwrap();
            prop_assert_eq!(s.deserialize(&bytes).unwrap(), value);
        }
    }
}
