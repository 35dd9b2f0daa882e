//! # Memory Churn Benchmark
//!
//! Registration churn must not allocate once the pool is warm.
//!
//! Run with: `cargo bench --package ramjet_core`

// Benchmarks don't need docs
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ramjet_core::{DenseIndexMap, ObjectPool, Poolable, SlotAllocator};

/// Entry stand-in with a reusable buffer.
#[derive(Default)]
struct Entry {
    bodies: Vec<u32>,
}

impl Poolable for Entry {
    fn reset(&mut self) {
        self.bodies.clear();
    }
}

/// Benchmark: take/return cycles through a warm pool.
fn bench_pool_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_churn");

    for count in [64usize, 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let mut pool: ObjectPool<Entry> = ObjectPool::with_default(count, Some(count));
            let mut held = Vec::with_capacity(count);
            b.iter(|| {
                for i in 0..count {
                    if let Ok(mut entry) = pool.take() {
                        entry.bodies.push(i as u32);
                        held.push(entry);
                    }
                }
                for entry in held.drain(..) {
                    pool.give_back(entry);
                }
                black_box(pool.available())
            });
        });
    }

    group.finish();
}

/// Benchmark: slot allocation feeding a dense map, then full removal.
fn bench_dense_map_churn(c: &mut Criterion) {
    const COUNT: usize = 4096;

    c.bench_function("dense_map_churn_4096", |b| {
        let mut slots = SlotAllocator::with_limit(COUNT);
        let mut map: DenseIndexMap<ramjet_core::SlotId, u64> = DenseIndexMap::new(COUNT);
        let mut ids = Vec::with_capacity(COUNT);

        b.iter(|| {
            while let Ok(id) = slots.allocate() {
                let _ = map.insert(id, id.to_bits());
                ids.push(id);
            }
            for id in ids.drain(..) {
                black_box(map.remove(id));
                slots.free(id);
            }
            map.len()
        });
    });
}

criterion_group!(benches, bench_pool_churn, bench_dense_map_churn);
criterion_main!(benches);
