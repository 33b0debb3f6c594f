//! Integration test: externally observable arena guarantees.
//!
//! Placement-strategy determinism on a known fragmented layout, block
//! reuse, capacity accounting, full recovery after defragmentation, and
//! corruption detection through the public API.

use std::ptr::NonNull;

use proptest::prelude::*;
use shoal_arena::{AllocationStrategy, Arena, ArenaConfig, LocalArena};
use shoal_test_utils::{fragmented_arena, FRAGMENTED_CAPACITY};

fn picked(strategy: AllocationStrategy, holes: &[usize], request: usize) -> usize {
    let (arena, ptrs) = fragmented_arena(strategy, holes);
    let p = arena.allocate(request).unwrap();
    let index = ptrs.iter().position(|&h| h == p).unwrap();
    assert_eq!(arena.used() + arena.remaining(), FRAGMENTED_CAPACITY);
    holes[index]
}

// ── Strategy determinism ─────────────────────────────────────────────

#[test]
fn first_fit_takes_first_large_enough() {
    assert_eq!(picked(AllocationStrategy::FirstFit, &[100, 50, 30], 40), 100);
    assert_eq!(picked(AllocationStrategy::FirstFit, &[120, 50, 80], 60), 120);
    assert_eq!(picked(AllocationStrategy::FirstFit, &[80, 120, 70], 60), 80);
    assert_eq!(picked(AllocationStrategy::FirstFit, &[30, 50, 100], 40), 50);
}

#[test]
fn best_fit_takes_smallest_large_enough() {
    assert_eq!(picked(AllocationStrategy::BestFit, &[100, 50, 30], 40), 50);
    assert_eq!(picked(AllocationStrategy::BestFit, &[120, 50, 80], 60), 80);
    assert_eq!(picked(AllocationStrategy::BestFit, &[80, 120, 70], 60), 70);
}

#[test]
fn worst_fit_takes_largest() {
    assert_eq!(picked(AllocationStrategy::WorstFit, &[100, 50, 30], 40), 100);
    assert_eq!(picked(AllocationStrategy::WorstFit, &[120, 50, 80], 60), 120);
    assert_eq!(picked(AllocationStrategy::WorstFit, &[80, 120, 70], 60), 120);
}

// ── Reuse and accounting ─────────────────────────────────────────────

#[test]
fn freed_block_is_reused_first_fit() {
    let arena = Arena::with_capacity(1024).unwrap();
    let header = arena.header_size();
    let p1 = arena.allocate(100).unwrap();
    let p2 = arena.allocate(200).unwrap();
    unsafe { arena.deallocate(p1.as_ptr()).unwrap() };
    let p3 = arena.allocate(90).unwrap();

    assert_eq!(p3, p1);
    assert!(arena.owns(p2.as_ptr()));
    let sizes: Vec<_> = arena.blocks().iter().filter(|b| b.used).map(|b| b.size).collect();
    assert_eq!(sizes, vec![112, 208]);
    assert_eq!(arena.used(), 2 * header + 112 + 208);
}

#[test]
fn owns_distinguishes_arenas() {
    let a = Arena::with_capacity(512).unwrap();
    let b = LocalArena::with_policy(ArenaConfig::new(512)).unwrap();
    let pa = a.allocate(32).unwrap();
    let pb = b.allocate(32).unwrap();
    assert!(a.owns(pa.as_ptr()) && b.owns(pb.as_ptr()));
    assert!(!a.owns(pb.as_ptr()) && !b.owns(pa.as_ptr()));
}

#[test]
fn header_overrun_is_detected() {
    let arena = Arena::new(ArenaConfig::new(1024).with_coalesce_on_free(false)).unwrap();
    let p = arena.allocate(32).unwrap();
    arena.allocate(32).unwrap();
    assert!(arena.validate());

    // Write past the end of `p` into the next block's header.
    unsafe { std::ptr::write_bytes(p.as_ptr().add(32), 0, 4) };
    assert!(!arena.validate());
    assert!(arena.verify().unwrap_err().is_fatal());
}

// ── Recovery ─────────────────────────────────────────────────────────

fn strategy() -> impl Strategy<Value = AllocationStrategy> {
    prop_oneof![
        Just(AllocationStrategy::FirstFit),
        Just(AllocationStrategy::BestFit),
        Just(AllocationStrategy::WorstFit),
    ]
}

proptest! {
    #[test]
    fn full_capacity_recovers_after_release(
        sizes in prop::collection::vec(1usize..256, 1..40),
        order in any::<prop::sample::Index>(),
        strategy in strategy(),
        coalesce in any::<bool>(),
    ) {
        let config = ArenaConfig::new(16 * 1024)
            .with_strategy(strategy)
            .with_coalesce_on_free(coalesce);
        let arena = Arena::new(config).unwrap();
        let mut live: Vec<NonNull<u8>> =
            sizes.iter().filter_map(|&s| arena.allocate(s).ok()).collect();
        for p in &live {
            prop_assert_eq!(p.as_ptr() as usize % arena.alignment(), 0);
        }

        // Release in a rotated order.
        if !live.is_empty() {
            let shift = order.index(live.len());
            live.rotate_left(shift);
        }
        for p in live {
            unsafe { arena.deallocate(p.as_ptr()).unwrap() };
            prop_assert_eq!(arena.used() + arena.remaining(), arena.capacity());
        }

        arena.defragment();
        prop_assert!(arena.validate());
        let whole = arena.capacity() - arena.header_size();
        prop_assert!(arena.allocate(whole).is_ok());
    }
}
