//! Buffer pool benchmarks: allocation, hit-path lookups and views.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use framepool::{AccessMode, BufferPool, DType, Strategy};

fn bench_allocate(c: &mut Criterion) {
    c.bench_function("allocate_4kb", |b| {
        let pool = BufferPool::new("bench", 256 * 1024 * 1024, Strategy::Lru);
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("buf_{}", i);
            i += 1;
            black_box(
                pool.allocate(&key, &[4096], DType::U8, AccessMode::ReadWrite)
                    .unwrap(),
            );
        });
    });
}

fn bench_get_hit(c: &mut Criterion) {
    c.bench_function("get_hit", |b| {
        let pool = BufferPool::new("bench", 1024 * 1024, Strategy::Lru);
        pool.allocate("hot", &[4096], DType::U8, AccessMode::ReadWrite)
            .unwrap();
        b.iter(|| black_box(pool.get("hot")));
    });
}

fn bench_view(c: &mut Criterion) {
    c.bench_function("view_slice", |b| {
        let pool = BufferPool::new("bench", 1024 * 1024, Strategy::Lru);
        pool.allocate("img", &[65536], DType::U8, AccessMode::ReadWrite)
            .unwrap();
        b.iter(|| black_box(pool.view("img", 1024..2048)));
    });
}

fn bench_eviction_pressure(c: &mut Criterion) {
    c.bench_function("allocate_with_eviction", |b| {
        // Capacity holds 8 entries; every allocation evicts.
        let pool = BufferPool::new("bench", 8 * 4096, Strategy::Lru);
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("buf_{}", i);
            i += 1;
            black_box(
                pool.allocate(&key, &[4096], DType::U8, AccessMode::ReadWrite)
                    .unwrap(),
            );
        });
    });
}

criterion_group!(
    benches,
    bench_allocate,
    bench_get_hit,
    bench_view,
    bench_eviction_pressure
);
criterion_main!(benches);
