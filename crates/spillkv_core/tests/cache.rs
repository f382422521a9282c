//! End-to-end tests for the disk cache.

use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use spillkv_core::{
    AttrValue, ByteSize, Cache, CacheConfig, CborSerializer, CoreError, DiskCache,
    IndexDefinition, JsonSerializer,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tempfile::{tempdir, TempDir};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Order {
    id: u64,
    status: String,
    items: Vec<String>,
}

fn order(id: u64, status: &str) -> Order {
    Order {
        id,
        status: status.to_string(),
        items: vec![format!("item-{id}")],
    }
}

fn by_status() -> IndexDefinition<Order> {
    IndexDefinition::new("status", |o: &Order| o.status.as_str().into())
}

fn open_orders(dir: &TempDir, capacity: u64) -> DiskCache<u64, Order> {
    let config = CacheConfig::new()
        .name("orders")
        .directory(dir.path())
        .segment_capacity(capacity)
        .buffer_size(ByteSize::kib(1));
    DiskCache::open_with_indexes(config, CborSerializer::new(), vec![by_status()]).unwrap()
}

/// Routes cache events to the test output; `RUST_LOG=spillkv_storage=info`
/// shows compactions.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn sorted<T: Ord>(mut v: Vec<T>) -> Vec<T> {
    v.sort();
    v
}

#[test]
fn round_trip_structured_values() {
    let dir = tempdir().unwrap();
    let cache = open_orders(&dir, ByteSize::mib(1).as_u64());

    for id in 0..50 {
        cache.put(id, order(id, "open")).unwrap();
    }
    for id in 0..50 {
        assert_eq!(cache.get(&id).unwrap(), Some(order(id, "open")));
        assert!(cache.contains(&id).unwrap());
    }
    assert_eq!(cache.len().unwrap(), 50);
    assert_eq!(sorted(cache.keys().unwrap()), (0..50).collect::<Vec<_>>());
}

#[test]
fn null_values_stay_present() {
    let dir = tempdir().unwrap();
    let cache = open_orders(&dir, 4096);

    assert!(!cache.put(1, None).unwrap());
    assert_eq!(cache.get(&1).unwrap(), None);
    assert!(cache.contains(&1).unwrap());
    assert!(!cache.contains(&2).unwrap());
    assert_eq!(cache.len().unwrap(), 1);

    // A value replacing the null is indexed normally.
    assert!(cache.put(1, order(1, "open")).unwrap());
    assert_eq!(cache.query("status", &"open".into()).unwrap(), vec![1]);
}

#[test]
fn overwrite_keeps_size() {
    let dir = tempdir().unwrap();
    let cache = open_orders(&dir, 4096);

    cache.put(7, order(7, "open")).unwrap();
    cache.put(7, order(7, "shipped")).unwrap();

    assert_eq!(cache.get(&7).unwrap().unwrap().status, "shipped");
    assert_eq!(cache.len().unwrap(), 1);
}

#[test]
fn removal_updates_everything() {
    let dir = tempdir().unwrap();
    let cache = open_orders(&dir, 4096);
    cache.put(1, order(1, "open")).unwrap();
    cache.put(2, order(2, "open")).unwrap();

    assert!(!cache.remove(&99).unwrap());
    assert_eq!(cache.len().unwrap(), 2);

    assert!(cache.remove(&1).unwrap());
    assert_eq!(cache.get(&1).unwrap(), None);
    assert!(!cache.contains(&1).unwrap());
    assert_eq!(cache.len().unwrap(), 1);
    assert_eq!(cache.query("status", &"open".into()).unwrap(), vec![2]);
    assert!(!cache.remove(&1).unwrap());
}

#[test]
fn capacity_growth_spreads_keys() {
    let dir = tempdir().unwrap();
    let cache = open_orders(&dir, 512);

    for id in 0..200 {
        cache.put(id, order(id, "open")).unwrap();
    }

    let stats = cache.stats();
    assert!(stats.segments.len() > 1);
    assert_eq!(stats.entries, 200);
    assert_eq!(
        stats.segments.iter().map(|s| s.keys).sum::<usize>(),
        200
    );
    for segment in &stats.segments {
        assert!(segment.used_bytes <= 512);
    }
    for id in 0..200 {
        assert_eq!(cache.get(&id).unwrap(), Some(order(id, "open")));
    }
}

#[test]
fn compaction_preserves_values() {
    init_tracing();
    let dir = tempdir().unwrap();
    let config = CacheConfig::new()
        .name("hot")
        .directory(dir.path())
        .segment_capacity(1000)
        .buffer_size(128);
    let cache: DiskCache<String, String> = DiskCache::open(config, JsonSerializer::new()).unwrap();

    let keys = ["a", "b", "c"];
    for round in 0..500 {
        for k in keys {
            cache.put(k.to_string(), format!("{k}-{round:04}")).unwrap();
        }
    }

    for k in keys {
        assert_eq!(cache.get(&k.to_string()).unwrap(), Some(format!("{k}-0499")));
    }

    let stats = cache.stats();
    assert_eq!(stats.segments.len(), 1);
    // Every value encodes to 8 bytes; far more than 1.8x capacity was written.
    assert_eq!(stats.used_bytes(), 24);
    assert!(stats.disk_bytes() < 1800);
}

#[test]
fn three_versions_of_one_key_never_alias() {
    let dir = tempdir().unwrap();
    let config = CacheConfig::new()
        .name("alias")
        .directory(dir.path())
        .buffer_size(16);
    let cache: DiskCache<String, String> = DiskCache::open(config, JsonSerializer::new()).unwrap();

    cache.put("k".to_string(), "a".repeat(30)).unwrap();
    cache.put("k".to_string(), "b".repeat(5)).unwrap();
    cache.put("other".to_string(), "c".repeat(12)).unwrap();
    cache.put("k".to_string(), "d".repeat(20)).unwrap();

    assert_eq!(cache.get(&"k".to_string()).unwrap(), Some("d".repeat(20)));
    assert_eq!(cache.get(&"other".to_string()).unwrap(), Some("c".repeat(12)));
}

#[test]
fn index_query_matches_current_values() {
    let dir = tempdir().unwrap();
    let cache = open_orders(&dir, 4096);

    for id in 0..10 {
        let status = if id % 2 == 0 { "open" } else { "shipped" };
        cache.put(id, order(id, status)).unwrap();
    }

    assert_eq!(
        sorted(cache.query("status", &"open".into()).unwrap()),
        vec![0, 2, 4, 6, 8]
    );

    cache.remove(&4).unwrap();
    cache.put(6, order(6, "shipped")).unwrap();
    assert_eq!(
        sorted(cache.query("status", &"open".into()).unwrap()),
        vec![0, 2, 8]
    );

    let shipped = cache
        .get_by_index("status", &AttrValue::from("shipped"))
        .unwrap();
    assert_eq!(
        sorted(shipped.iter().map(|o| o.id).collect()),
        vec![1, 3, 5, 6, 7, 9]
    );
    assert!(cache.query("status", &"lost".into()).unwrap().is_empty());
    assert!(matches!(
        cache.query("customer", &AttrValue::Null),
        Err(CoreError::UnknownIndex { .. })
    ));
}

#[test]
fn close_is_final() {
    let dir = tempdir().unwrap();
    let cache = open_orders(&dir, 512);
    for id in 0..50 {
        cache.put(id, order(id, "open")).unwrap();
    }
    assert!(cache.segment_count() > 1);

    cache.close().unwrap();
    cache.close().unwrap();

    let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert!(leftovers.is_empty(), "files left after close: {leftovers:?}");

    assert!(cache.put(1, order(1, "open")).unwrap_err().is_closed());
    assert!(cache.get(&1).unwrap_err().is_closed());
    assert!(cache.remove(&1).unwrap_err().is_closed());
    assert!(cache.keys().unwrap_err().is_closed());
    assert!(cache.get_by_index("status", &"open".into()).unwrap_err().is_closed());
}

#[test]
fn concurrent_closers_close_once() {
    let dir = tempdir().unwrap();
    let cache = Arc::new(open_orders(&dir, 4096));
    cache.put(1, order(1, "open")).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.close())
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }
    assert!(!cache.is_open());
}

#[test]
fn reopening_a_name_starts_empty() {
    let dir = tempdir().unwrap();
    let first = open_orders(&dir, 4096);
    first.put(1, order(1, "open")).unwrap();

    let second = open_orders(&dir, 4096);
    second.put(2, order(2, "open")).unwrap();
    assert_eq!(second.len().unwrap(), 1);
    assert_eq!(second.get(&1).unwrap(), None);
}

#[test]
fn concurrent_disjoint_writers_and_readers() {
    const THREADS: u64 = 8;
    const PER_THREAD: u64 = 250;

    let dir = tempdir().unwrap();
    let cache = Arc::new(open_orders(&dir, 8 * 1024));

    let writers: Vec<_> = (0..THREADS)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    let id = t * PER_THREAD + i;
                    cache.put(id, order(id, "open")).unwrap();
                }
            })
        })
        .collect();
    for handle in writers {
        handle.join().unwrap();
    }

    let readers: Vec<_> = (0..THREADS)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    let id = t * PER_THREAD + i;
                    assert_eq!(cache.get(&id).unwrap(), Some(order(id, "open")));
                }
            })
        })
        .collect();
    for handle in readers {
        handle.join().unwrap();
    }

    assert_eq!(cache.len().unwrap(), (THREADS * PER_THREAD) as usize);
    assert!(cache.segment_count() > 1);
}

#[test]
fn concurrent_writers_on_shared_keys() {
    init_tracing();
    let dir = tempdir().unwrap();
    let config = CacheConfig::new()
        .name("shared")
        .directory(dir.path())
        .segment_capacity(256)
        .buffer_size(64);
    let cache: Arc<DiskCache<u32, u32>> =
        Arc::new(DiskCache::open(config, CborSerializer::new()).unwrap());

    let handles: Vec<_> = (0..4u32)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for round in 0..200u32 {
                    let key = round % 16;
                    cache.put(key, t * 1000 + round).unwrap();
                    assert!(cache.get(&key).unwrap().is_some());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(cache.len().unwrap(), 16);
}

#[test]
fn readers_racing_removals_never_fail() {
    init_tracing();
    let dir = tempdir().unwrap();
    let cache = Arc::new(open_orders(&dir, 64 * 1024));
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let cache = Arc::clone(&cache);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            for round in 0..2_000u64 {
                let id = round % 4;
                cache.put(id, order(id, "open")).unwrap();
                cache.remove(&id).unwrap();
            }
            done.store(true, Ordering::Release);
        })
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut errors = 0;
                while !done.load(Ordering::Acquire) {
                    for id in 0..4u64 {
                        match cache.get(&id) {
                            Ok(None) => {}
                            Ok(Some(found)) => assert_eq!(found, order(id, "open")),
                            Err(_) => errors += 1,
                        }
                        if cache.get_by_index("status", &"open".into()).is_err() {
                            errors += 1;
                        }
                    }
                }
                errors
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        assert_eq!(reader.join().unwrap(), 0);
    }
    assert!(cache.is_empty().unwrap());
    assert!(cache.query("status", &"open".into()).unwrap().is_empty());
}

#[test]
fn usable_through_trait_object() {
    let dir = tempdir().unwrap();
    let cache: Box<dyn Cache<u64, Order>> = Box::new(open_orders(&dir, 4096));

    assert!(cache.is_empty().unwrap());
    cache.put(1, Some(order(1, "open"))).unwrap();
    cache.put(2, None).unwrap();
    assert_eq!(cache.len().unwrap(), 2);
    assert_eq!(
        cache.get_by_index("status", &"open".into()).unwrap(),
        vec![order(1, "open")]
    );
    cache.close().unwrap();
}

#[derive(Debug, Clone)]
enum Op {
    Put(u8, Option<u16>),
    Remove(u8),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (any::<u8>(), proptest::option::of(any::<u16>())).prop_map(|(k, v)| Op::Put(k, v)),
        1 => any::<u8>().prop_map(Op::Remove),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn behaves_like_a_map(ops in proptest::collection::vec(op(), 1..200)) {
        let dir = tempdir().unwrap();
        let config = CacheConfig::new()
            .name("model")
            .directory(dir.path())
            .segment_capacity(64)
            .buffer_size(16);
        let cache: DiskCache<u8, u16> = DiskCache::open(config, CborSerializer::new()).unwrap();
        let mut model: HashMap<u8, Option<u16>> = HashMap::new();

        for op in ops {
            match op {
                Op::Put(k, v) => {
                    let existed = cache.put(k, v).unwrap();
                    prop_assert_eq!(existed, model.insert(k, v).is_some());
                }
                Op::Remove(k) => {
                    prop_assert_eq!(cache.remove(&k).unwrap(), model.remove(&k).is_some());
                }
            }
        }

        prop_assert_eq!(cache.len().unwrap(), model.len());
        for (k, v) in &model {
            prop_assert_eq!(cache.get(k).unwrap(), *v);
        }
    }
}
