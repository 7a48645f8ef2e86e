//! Comparison benchmarks: `ShardedIndex` vs `DashMap`
//!
//! Both are hash-sharded maps with one lock per shard. `ShardedIndex` routes
//! with FNV-1 over a fixed shard count; `DashMap` uses its own hasher and a
//! shard count derived from the core count.
//!
//! Run with: `cargo bench --bench index_comparison`
//! With mimalloc: `cargo bench --bench index_comparison --features mimalloc`

#![expect(clippy::unwrap_used)]
#![expect(clippy::indexing_slicing)]

use dashmap::DashMap;
use divan::{Bencher, black_box};
use shardtree::ShardedIndex;
use std::sync::Arc;
use std::thread;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const N: usize = 10_000;

fn main() {
    divan::main();
}

// =============================================================================
// Setup Helpers
// =============================================================================

fn keys(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("node-{i:08}")).collect()
}

fn setup_index(keys: &[String]) -> ShardedIndex<u64> {
    let index = ShardedIndex::new();
    for (i, key) in keys.iter().enumerate() {
        index.store(key.as_str(), i as u64);
    }
    index
}

fn setup_dashmap(keys: &[String]) -> DashMap<String, u64> {
    let map = DashMap::new();
    for (i, key) in keys.iter().enumerate() {
        map.insert(key.clone(), i as u64);
    }
    map
}

// =============================================================================
// 01: Insert
// =============================================================================

#[divan::bench_group(name = "01_insert")]
mod insert {
    use super::{Bencher, DashMap, N, ShardedIndex, keys};

    #[divan::bench]
    fn sharded_index(bencher: Bencher) {
        let keys = keys(N);
        bencher.bench_local(|| {
            let index: ShardedIndex<u64> = ShardedIndex::new();
            for (i, key) in keys.iter().enumerate() {
                index.store(key.as_str(), i as u64);
            }
            index
        });
    }

    #[divan::bench]
    fn dashmap(bencher: Bencher) {
        let keys = keys(N);
        bencher.bench_local(|| {
            let map: DashMap<String, u64> = DashMap::new();
            for (i, key) in keys.iter().enumerate() {
                map.insert(key.clone(), i as u64);
            }
            map
        });
    }
}

// =============================================================================
// 02: Lookup
// =============================================================================

#[divan::bench_group(name = "02_lookup")]
mod lookup {
    use super::{Bencher, N, black_box, keys, setup_dashmap, setup_index};

    #[divan::bench]
    fn sharded_index(bencher: Bencher) {
        let keys = keys(N);
        let index = setup_index(&keys);
        bencher.bench_local(|| {
            keys.iter()
                .filter(|key| index.load(black_box(key.as_str())).is_some())
                .count()
        });
    }

    #[divan::bench]
    fn dashmap(bencher: Bencher) {
        let keys = keys(N);
        let map = setup_dashmap(&keys);
        bencher.bench_local(|| {
            keys.iter()
                .filter(|key| map.get(black_box(key.as_str())).is_some())
                .count()
        });
    }
}

// =============================================================================
// 03: Concurrent Mixed (90% read, 10% write)
// =============================================================================

#[divan::bench_group(name = "03_concurrent_mixed")]
mod concurrent_mixed {
    use super::{Arc, Bencher, N, keys, setup_dashmap, setup_index, thread};

    const OPS_PER_THREAD: usize = 5_000;

    #[divan::bench(args = [1, 2, 4, 8, 16])]
    fn sharded_index(bencher: Bencher, threads: usize) {
        let keys = Arc::new(keys(N));
        let index = Arc::new(setup_index(&keys));

        bencher.bench_local(|| {
            let handles: Vec<_> = (0..threads)
                .map(|t| {
                    let (keys, index) = (Arc::clone(&keys), Arc::clone(&index));
                    thread::spawn(move || {
                        for i in 0..OPS_PER_THREAD {
                            let key = &keys[(i * 7 + t * 131) % keys.len()];
                            if i % 10 == 0 {
                                index.store(key.as_str(), i as u64);
                            } else {
                                let _ = index.load(key);
                            }
                        }
                    })
                })
                .collect();
            for h in handles {
                h.join().unwrap();
            }
        });
    }

    #[divan::bench(args = [1, 2, 4, 8, 16])]
    fn dashmap(bencher: Bencher, threads: usize) {
        let keys = Arc::new(keys(N));
        let map = Arc::new(setup_dashmap(&keys));

        bencher.bench_local(|| {
            let handles: Vec<_> = (0..threads)
                .map(|t| {
                    let (keys, map) = (Arc::clone(&keys), Arc::clone(&map));
                    thread::spawn(move || {
                        for i in 0..OPS_PER_THREAD {
                            let key = &keys[(i * 7 + t * 131) % keys.len()];
                            if i % 10 == 0 {
                                map.insert(key.clone(), i as u64);
                            } else {
                                let _ = map.get(key).map(|v| *v);
                            }
                        }
                    })
                })
                .collect();
            for h in handles {
                h.join().unwrap();
            }
        });
    }
}
