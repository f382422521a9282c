//! Cache benchmarks.

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use spillkv_bench::{byte_cache, random_data, shuffled_keys};
use spillkv_codec::{CborSerializer, JsonSerializer, ValueSerializer};
use spillkv_core::{AttrValue, CacheConfig, DiskCache, IndexDefinition};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

/// Benchmark puts of new keys across growing segments.
fn bench_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_put");

    for size in [64, 256, 1024].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let (_dir, cache) = byte_cache(4 * 1024 * 1024, 64 * 1024);
            let data = random_data(size);
            let mut key = 0u64;

            b.iter(|| {
                cache.put(black_box(key), data.clone()).unwrap();
                key += 1;
            });
        });
    }

    group.finish();
}

/// Benchmark random reads of a populated cache.
fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_get");

    for count in [1_000u64, 10_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let (_dir, cache) = byte_cache(1024 * 1024, 64 * 1024);
            for key in 0..count {
                cache.put(key, random_data(256)).unwrap();
            }
            let keys = shuffled_keys(count);
            let mut idx = 0;

            b.iter(|| {
                let value = cache.get(black_box(&keys[idx])).unwrap();
                idx = (idx + 1) % keys.len();
                black_box(value);
            });
        });
    }

    group.finish();
}

/// Benchmark concurrent writers on disjoint key ranges.
fn bench_concurrent_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_concurrent_put");
    group.sample_size(20);

    for threads in [1usize, 2, 4, 8].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(threads),
            threads,
            |b, &threads| {
                b.iter(|| {
                    let (_dir, cache) = byte_cache(256 * 1024, 16 * 1024);
                    let cache = Arc::new(cache);
                    let per_thread = 2_000 / threads as u64;
                    let handles: Vec<_> = (0..threads as u64)
                        .map(|t| {
                            let cache = Arc::clone(&cache);
                            thread::spawn(move || {
                                let data = vec![0xABu8; 128];
                                for i in 0..per_thread {
                                    cache.put(t * per_thread + i, data.clone()).unwrap();
                                }
                            })
                        })
                        .collect();
                    for handle in handles {
                        handle.join().unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

/// Benchmark index-maintaining puts and index queries.
fn bench_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_index");

    let dir = TempDir::new().unwrap();
    let config = CacheConfig::new().name("bench_index").directory(dir.path());
    let bucket = IndexDefinition::new("bucket", |v: &u64| AttrValue::Int((*v % 100) as i64));
    let cache: DiskCache<u64, u64> =
        DiskCache::open_with_indexes(config, CborSerializer::new(), vec![bucket]).unwrap();

    let mut key = 0u64;
    group.bench_function("indexed_put", |b| {
        b.iter(|| {
            cache.put(key, black_box(key)).unwrap();
            key += 1;
        });
    });

    group.bench_function("get_by_index", |b| {
        let mut bucket = 0i64;
        b.iter(|| {
            let values = cache
                .get_by_index("bucket", &AttrValue::Int(bucket))
                .unwrap();
            bucket = (bucket + 1) % 100;
            black_box(values);
        });
    });

    group.finish();
}

/// Benchmark the built-in serializers on a byte payload.
fn bench_serializers(c: &mut Criterion) {
    let mut group = c.benchmark_group("serializer");
    let value = random_data(1024);
    let cbor = CborSerializer::<Vec<u8>>::new();
    let json = JsonSerializer::<Vec<u8>>::new();

    group.bench_function("cbor_roundtrip", |b| {
        b.iter(|| {
            let bytes = cbor.serialize(black_box(&value)).unwrap();
            black_box(cbor.deserialize(&bytes).unwrap());
        });
    });

    group.bench_function("json_roundtrip", |b| {
        b.iter(|| {
            let bytes = json.serialize(black_box(&value)).unwrap();
            black_box(json.deserialize(&bytes).unwrap());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_put,
    bench_get,
    bench_concurrent_put,
    bench_index,
    bench_serializers,
);

criterion_main!(benches);
