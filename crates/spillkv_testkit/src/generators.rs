//! Property-based test generators using proptest.

use crate::fixtures::TestRecord;
use proptest::prelude::*;

/// Strategy for cache keys.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for records in one of a few groups.
pub fn record_strategy() -> impl Strategy<Value = TestRecord> {
    (
        any::<u64>(),
        prop::sample::select(vec!["red", "green", "blue"]),
        0usize..256,
    )
        .prop_map(|(id, group, len)| TestRecord::new(id, group, len))
}

/// Strategy for non-empty byte payloads, as a segment stores them.
pub fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..1024)
}

/// Strategy for size literals and the byte count they denote.
pub fn size_literal_strategy() -> impl Strategy<Value = (String, u64)> {
    (
        0u64..4096,
        prop::sample::select(vec![("", 1u64), ("b", 1), ("k", 1 << 10), ("M", 1 << 20), ("g", 1 << 30)]),
    )
        .prop_map(|(n, (suffix, unit))| (format!("{n}{suffix}"), n * unit))
}

/// Strategy for JSON documents of bounded depth.
pub fn json_value_strategy() -> impl Strategy<Value = serde_json::Value> {
    let leaf = prop_oneof![
        any::<bool>().prop_map(serde_json::Value::from),
        any::<i64>().prop_map(serde_json::Value::from),
        "[a-z ]{0,12}".prop_map(serde_json::Value::from),
    ];
    leaf.prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(serde_json::Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|m| serde_json::Value::Object(m.into_iter().collect())),
        ]
    })
}

/// A single cache operation.
#[derive(Debug, Clone)]
pub enum CacheOp {
    /// Store a record, or a null.
    Put(String, Option<TestRecord>),
    /// Remove a key.
    Remove(String),
    /// Read a key.
    Get(String),
}

/// Strategy for operations over a small key space, so keys repeat.
pub fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    let key = prop::sample::select(vec!["a", "b", "c", "d", "e", "f"]).prop_map(String::from);
    prop_oneof![
        4 => (key.clone(), proptest::option::weighted(0.9, record_strategy()))
            .prop_map(|(k, v)| CacheOp::Put(k, v)),
        2 => key.clone().prop_map(CacheOp::Remove),
        2 => key.prop_map(CacheOp::Get),
    ]
}
