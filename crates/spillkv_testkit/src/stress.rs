//! Stress tests for spillkv caches.
//!
//! These helpers drive a cache under heavy and concurrent load and count
//! how many operations succeeded.

use spillkv_core::DiskCache;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Cache type the stress helpers operate on.
pub type ByteCache = DiskCache<u64, Vec<u8>>;

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations, including reads that returned the wrong value.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the run.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations to perform.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Size of each value in bytes.
    pub value_size: usize,
    /// Number of distinct keys.
    pub key_count: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            threads: 4,
            value_size: 256,
            key_count: 1_000,
        }
    }
}

/// Deterministic value for `key`.
pub fn value_for(key: u64, size: usize) -> Vec<u8> {
    (0..size).map(|i| (key as usize + i) as u8).collect()
}

fn populate(cache: &ByteCache, config: &StressConfig) {
    for key in 0..config.key_count as u64 {
        cache
            .put(key, value_for(key, config.value_size))
            .expect("Failed to populate stress cache");
    }
}

fn check_read(cache: &ByteCache, key: u64, size: usize) -> bool {
    matches!(cache.get(&key), Ok(Some(v)) if v == value_for(key, size))
}

/// Writes `operations` values, cycling through the key space.
pub fn stress_sequential_writes(cache: &ByteCache, config: &StressConfig) -> StressResult {
    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        let key = (i % config.key_count) as u64;
        match cache.put(key, value_for(key, config.value_size)) {
            Ok(_) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressResult::new(successful, failed, start.elapsed())
}

/// Populates the key space, then reads it back `operations` times.
pub fn stress_sequential_reads(cache: &ByteCache, config: &StressConfig) -> StressResult {
    populate(cache, config);

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        let key = (i % config.key_count) as u64;
        if check_read(cache, key, config.value_size) {
            successful += 1;
        } else {
            failed += 1;
        }
    }

    StressResult::new(successful, failed, start.elapsed())
}

/// Interleaves puts, gets and removes over the key space.
pub fn stress_mixed_operations(cache: &ByteCache, config: &StressConfig) -> StressResult {
    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        let key = (i % config.key_count) as u64;

        let result = match i % 3 {
            0 => cache.put(key, value_for(key, config.value_size)).map(|_| ()),
            1 => cache.get(&key).map(|_| ()),
            _ => cache.remove(&key).map(|_| ()),
        };

        match result {
            Ok(()) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressResult::new(successful, failed, start.elapsed())
}

/// Threads write disjoint key ranges concurrently.
///
/// Thread `t` owns keys `t * per_thread .. (t + 1) * per_thread`, where
/// `per_thread` is `operations / threads`.
pub fn stress_concurrent_puts(cache: Arc<ByteCache>, config: &StressConfig) -> StressResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let per_thread = config.operations / config.threads;

    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let cache = Arc::clone(&cache);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let value_size = config.value_size;

            thread::spawn(move || {
                for i in 0..per_thread {
                    let key = (t * per_thread + i) as u64;
                    match cache.put(key, value_for(key, value_size)) {
                        Ok(_) => {
                            successful.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(_) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    StressResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Populates the key space, then verifies it from several threads.
pub fn stress_concurrent_gets(cache: Arc<ByteCache>, config: &StressConfig) -> StressResult {
    populate(&cache, config);

    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let per_thread = config.operations / config.threads;

    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let cache = Arc::clone(&cache);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let key_count = config.key_count;
            let value_size = config.value_size;

            thread::spawn(move || {
                for i in 0..per_thread {
                    let key = ((t * per_thread + i) % key_count) as u64;
                    if check_read(&cache, key, value_size) {
                        successful.fetch_add(1, Ordering::Relaxed);
                    } else {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    StressResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Overwrites a handful of keys from several threads, forcing compactions,
/// then checks every key still reads back a value one of the writers wrote.
pub fn stress_concurrent_overwrites(cache: Arc<ByteCache>, config: &StressConfig) -> StressResult {
    let hot_keys = config.key_count.clamp(1, 8) as u64;
    let per_thread = config.operations / config.threads;
    let failed = Arc::new(AtomicUsize::new(0));

    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let failed = Arc::clone(&failed);
            let value_size = config.value_size;

            thread::spawn(move || {
                for i in 0..per_thread {
                    let key = i as u64 % hot_keys;
                    if cache.put(key, value_for(key, value_size)).is_err() {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    let mut failed = failed.load(Ordering::Relaxed);
    for key in 0..hot_keys.min(per_thread as u64) {
        if !check_read(&cache, key, config.value_size) {
            failed += 1;
        }
    }

    let total = per_thread * config.threads;
    StressResult::new(total.saturating_sub(failed), failed, start.elapsed())
}
