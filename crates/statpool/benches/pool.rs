//! Memory pool performance benchmarks.
//!
//! Measures the cost of the pool's hot paths:
//! - Allocate/deallocate pairs at several sizes
//! - First-fit search over a fragmented chain
//! - Reallocation in place and with a move
//! - Deallocation with and without safe-mode scrubbing

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use statpool::StaticMemPool;

type Pool = StaticMemPool<{ 1 << 20 }>;

fn bench_alloc_free(c: &mut Criterion) {
    let mut group = c.benchmark_group("alloc_free");
    let pool = Pool::new();

    for size in [16, 256, 4_096, 65_536].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let ptr = pool.allocate(black_box(size)).unwrap();
                pool.deallocate(ptr.as_ptr()).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_aligned(c: &mut Criterion) {
    let mut group = c.benchmark_group("alloc_aligned");
    let pool = Pool::new();

    for alignment in [8, 64, 4_096].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(alignment),
            alignment,
            |b, &alignment| {
                b.iter(|| {
                    let ptr = pool.allocate_aligned(100, black_box(alignment)).unwrap();
                    pool.deallocate(ptr.as_ptr()).unwrap();
                });
            },
        );
    }

    group.finish();
}

fn bench_fragmented_first_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("fragmented_first_fit");

    for holes in [10, 100, 1_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(holes), holes, |b, &holes| {
            let pool = Pool::new();
            // Alternate small used and freed chunks so the search walks
            // `holes` free chunks too small for the request.
            let pairs: Vec<_> = (0..holes)
                .map(|_| (pool.allocate(32).unwrap(), pool.allocate(32).unwrap()))
                .collect();
            let mut keep = Vec::with_capacity(holes);
            for (hole, kept) in pairs {
                pool.deallocate(hole.as_ptr()).unwrap();
                keep.push(kept);
            }

            b.iter(|| {
                let ptr = pool.allocate(black_box(512)).unwrap();
                pool.deallocate(ptr.as_ptr()).unwrap();
            });

            for ptr in keep {
                pool.deallocate(ptr.as_ptr()).unwrap();
            }
        });
    }

    group.finish();
}

fn bench_reallocate(c: &mut Criterion) {
    let mut group = c.benchmark_group("reallocate");
    let pool = Pool::new();

    group.bench_function("in_place", |b| {
        let ptr = pool.allocate(1_024).unwrap();
        b.iter(|| black_box(pool.reallocate(ptr.as_ptr(), black_box(512)).unwrap()));
        pool.deallocate(ptr.as_ptr()).unwrap();
    });

    group.bench_function("grow_and_move", |b| {
        b.iter(|| {
            let ptr = pool.allocate(64).unwrap();
            let blocker = pool.allocate(64).unwrap();
            let grown = pool.reallocate(ptr.as_ptr(), black_box(2_048)).unwrap();
            pool.deallocate(grown.as_ptr()).unwrap();
            pool.deallocate(blocker.as_ptr()).unwrap();
        });
    });

    group.finish();
}

fn bench_safe_mode(c: &mut Criterion) {
    let mut group = c.benchmark_group("dealloc_safe_mode");

    for safe in [false, true].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(safe), safe, |b, &safe| {
            let pool = Pool::with_safe(safe);
            b.iter(|| {
                let ptr = pool.allocate(4_096).unwrap();
                pool.deallocate(black_box(ptr.as_ptr())).unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_alloc_free,
    bench_aligned,
    bench_fragmented_first_fit,
    bench_reallocate,
    bench_safe_mode
);
criterion_main!(benches);
