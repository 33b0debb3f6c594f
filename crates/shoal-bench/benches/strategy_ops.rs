//! Criterion benchmarks comparing placement strategies.
//!
//! Each strategy replays the same seeded churn workload, and picks from
//! a fixed fragmented free list.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use shoal_arena::Arena;
use shoal_bench::{churn_workload, run_workload, strategy_config};
use shoal_core::AllocationStrategy;
use shoal_test_utils::fragmented_arena;

const STRATEGIES: [AllocationStrategy; 3] = [
    AllocationStrategy::FirstFit,
    AllocationStrategy::BestFit,
    AllocationStrategy::WorstFit,
];

/// Benchmark: 10K-op random churn per strategy.
fn bench_churn(c: &mut Criterion) {
    let ops = churn_workload(42, 10_000, 2048);
    let mut group = c.benchmark_group("churn_10k");
    for strategy in STRATEGIES {
        let arena = Arena::new(strategy_config(strategy)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(strategy), &ops, |b, ops| {
            b.iter(|| black_box(run_workload(&arena, ops)));
        });
    }
    group.finish();
}

/// Benchmark: one allocation from a 32-hole free list per strategy.
fn bench_scan(c: &mut Criterion) {
    let holes: Vec<usize> = (0..32).map(|i| 16 + (i * 37) % 48).collect();
    let mut group = c.benchmark_group("scan_32_holes");
    for strategy in STRATEGIES {
        let (arena, _) = fragmented_arena(strategy, &holes);
        group.bench_function(BenchmarkId::from_parameter(strategy), |b| {
            b.iter(|| {
                let p = arena.allocate(black_box(40)).unwrap();
                unsafe { arena.deallocate(p.as_ptr()).unwrap() };
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_churn, bench_scan);
criterion_main!(benches);
