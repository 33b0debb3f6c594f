//! Workloads for benchmarking Shoal arenas.
//!
//! - [`churn_workload`]: seeded random allocate/free sequence
//! - [`run_workload`]: replay a workload against an arena
//! - [`strategy_config`]: the arena configuration every benchmark shares

#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::ptr::NonNull;

use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use shoal_arena::{Arena, LockPolicy};
use shoal_core::{AllocationStrategy, ArenaConfig};

/// Capacity of benchmark arenas: 1 MiB.
pub const BENCH_CAPACITY: usize = 1 << 20;

/// One step of a workload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    /// Allocate this many bytes.
    Alloc(usize),
    /// Release the live block at this index (modulo the live count).
    Free(usize),
}

/// Summary of a replayed workload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Outcome {
    pub allocations: usize,
    pub failures: usize,
    pub peak_used: usize,
}

/// Arena config used by all benchmarks: fill patterns off so release
/// builds measure the allocator, not `memset`.
pub fn strategy_config(strategy: AllocationStrategy) -> ArenaConfig {
    ArenaConfig::new(BENCH_CAPACITY)
        .with_strategy(strategy)
        .with_fill_patterns(false)
}

/// Deterministic allocate/free mix, roughly 60% allocations, with sizes
/// in `1..=max_size`.
pub fn churn_workload(seed: u64, len: usize, max_size: usize) -> Vec<Op> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..len)
        .map(|_| {
            let roll = rng.next_u32();
            if roll % 10 < 6 {
                Op::Alloc(1 + rng.next_u32() as usize % max_size.max(1))
            } else {
                Op::Free(rng.next_u32() as usize)
            }
        })
        .collect()
}

/// Replay `ops` against `arena`, then release everything still live.
///
/// # Panics
///
/// Panics if the arena rejects a release of a pointer it handed out.
#[allow(unsafe_code)]
pub fn run_workload<L: LockPolicy>(arena: &Arena<L>, ops: &[Op]) -> Outcome {
    let mut live: Vec<NonNull<u8>> = Vec::new();
    let mut outcome = Outcome::default();
    for &op in ops {
        match op {
            Op::Alloc(size) => match arena.allocate(size) {
                Ok(p) => {
                    live.push(p);
                    outcome.allocations += 1;
                    outcome.peak_used = outcome.peak_used.max(arena.used());
                }
                Err(_) => outcome.failures += 1,
            },
            Op::Free(pick) if !live.is_empty() => {
                let p = live.swap_remove(pick % live.len());
                // SAFETY: `p` came from `arena` and is dropped from `live`.
                unsafe { arena.deallocate(p.as_ptr()) }.expect("workload pointer is live");
            }
            Op::Free(_) => {}
        }
    }
    for p in live {
        // SAFETY: as above.
        unsafe { arena.deallocate(p.as_ptr()) }.expect("workload pointer is live");
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workload_is_deterministic() {
        assert_eq!(churn_workload(7, 200, 512), churn_workload(7, 200, 512));
        assert_ne!(churn_workload(7, 200, 512), churn_workload(8, 200, 512));
    }

    #[test]
    fn workload_sizes_in_range() {
        for op in churn_workload(42, 1000, 64) {
            if let Op::Alloc(size) = op {
                assert!((1..=64).contains(&size));
            }
        }
    }

    #[test]
    fn replay_leaves_arena_empty() {
        let arena = Arena::new(strategy_config(AllocationStrategy::BestFit)).unwrap();
        let outcome = run_workload(&arena, &churn_workload(1, 2000, 1024));
        assert!(outcome.allocations > 0);
        assert_eq!(arena.used(), 0);
        assert!(arena.validate());
    }
}
