//! Criterion micro-benchmarks for single arena operations and containers.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use shoal_alloc::{allocate_unique, make_arena_vec, ShortAlloc};
use shoal_arena::{Arena, LocalArena};
use shoal_bench::{strategy_config, BENCH_CAPACITY};
use shoal_core::{AllocationStrategy, ArenaConfig};

/// Benchmark: allocate + deallocate of one 64-byte block on an empty arena.
fn bench_alloc_free_pair(c: &mut Criterion) {
    let arena = Arena::new(strategy_config(AllocationStrategy::FirstFit)).unwrap();
    c.bench_function("alloc_free_64", |b| {
        b.iter(|| {
            let p = arena.allocate(black_box(64)).unwrap();
            unsafe { arena.deallocate(p.as_ptr()).unwrap() };
        });
    });

    let local = LocalArena::with_policy(strategy_config(AllocationStrategy::FirstFit)).unwrap();
    c.bench_function("alloc_free_64_single_threaded", |b| {
        b.iter(|| {
            let p = local.allocate(black_box(64)).unwrap();
            unsafe { local.deallocate(p.as_ptr()).unwrap() };
        });
    });
}

/// Benchmark: fill the arena with 256-byte blocks, then release all.
fn bench_fill_and_drain(c: &mut Criterion) {
    let arena = Arena::new(strategy_config(AllocationStrategy::FirstFit)).unwrap();
    let count = BENCH_CAPACITY / (256 + arena.header_size()) - 1;
    c.bench_function("fill_and_drain_256", |b| {
        b.iter(|| {
            let ptrs: Vec<_> = (0..count).map(|_| arena.allocate(256).unwrap()).collect();
            for p in ptrs {
                unsafe { arena.deallocate(p.as_ptr()).unwrap() };
            }
        });
    });
}

/// Benchmark: defragment after freeing every block without coalescing.
fn bench_defragment(c: &mut Criterion) {
    let config = ArenaConfig::new(BENCH_CAPACITY)
        .with_fill_patterns(false)
        .with_coalesce_on_free(false);
    let arena = Arena::new(config).unwrap();
    c.bench_function("defragment_1k_blocks", |b| {
        b.iter(|| {
            let ptrs: Vec<_> = (0..1000).map(|_| arena.allocate(128).unwrap()).collect();
            for p in ptrs {
                unsafe { arena.deallocate(p.as_ptr()).unwrap() };
            }
            black_box(arena.defragment());
        });
    });
}

/// Benchmark: push 1000 u64 into an arena-backed vector vs a heap vector.
fn bench_vec_push(c: &mut Criterion) {
    let arena = Arena::new(strategy_config(AllocationStrategy::FirstFit)).unwrap();
    c.bench_function("arena_vec_push_1000", |b| {
        b.iter(|| {
            let mut v = make_arena_vec::<u64, _>(&arena);
            for i in 0..1000 {
                v.push(black_box(i));
            }
            black_box(v.len());
        });
    });
    c.bench_function("heap_vec_push_1000", |b| {
        b.iter(|| {
            let mut v = Vec::new();
            for i in 0..1000u64 {
                v.push(black_box(i));
            }
            black_box(v.len());
        });
    });
}

/// Benchmark: box a small value in the arena and drop it.
fn bench_allocate_unique(c: &mut Criterion) {
    let arena = Arena::new(strategy_config(AllocationStrategy::FirstFit)).unwrap();
    let alloc = ShortAlloc::<[u64; 4]>::new(&arena);
    c.bench_function("allocate_unique_32", |b| {
        b.iter(|| {
            let boxed = allocate_unique(&alloc, black_box([1, 2, 3, 4])).unwrap();
            black_box(boxed[3]);
        });
    });
}

criterion_group!(
    benches,
    bench_alloc_free_pair,
    bench_fill_and_drain,
    bench_defragment,
    bench_vec_push,
    bench_allocate_unique
);
criterion_main!(benches);
