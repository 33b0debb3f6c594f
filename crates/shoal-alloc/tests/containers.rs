//! Integration test: containers and owned values living in an arena.
//!
//! Exercises the adaptor through `allocator_api2` collections, checks
//! that capacity errors leave the arena untouched, and moves boxed values
//! between threads.

use std::thread;

use allocator_api2::boxed::Box as ApiBox;
use allocator_api2::vec::Vec as ApiVec;
use crossbeam_channel::unbounded;
use shoal_alloc::{allocate_unique, make_arena_vec, ArenaBox, ShortAlloc};
use shoal_arena::{Arena, ArenaConfig, ArenaError, LocalArena};
use shoal_test_utils::DropCounter;

#[test]
fn vec_of_strings_round_trip() {
    let arena = Arena::with_capacity(16 * 1024).unwrap();
    {
        let mut names = make_arena_vec::<String, _>(&arena);
        for i in 0..50 {
            names.push(format!("fish-{i}"));
        }
        names.retain(|n| n.ends_with('0'));
        assert_eq!(names.len(), 5);
        assert_eq!(names[2], "fish-20");
        assert!(arena.validate());
    }
    assert_eq!(arena.used(), 0);
}

#[test]
fn vec_growth_reuses_released_buffers() {
    let arena = Arena::with_capacity(16 * 1024).unwrap();
    let mut v: ApiVec<u64, _> = ApiVec::new_in(ShortAlloc::<u64>::new(&arena));
    for i in 0..512u64 {
        v.push(i);
    }
    // Growth releases each old buffer, so only one block is live.
    assert_eq!(arena.live_allocations(), 1);
    v.shrink_to_fit();
    assert_eq!(v.iter().copied().max(), Some(511));
    drop(v);
    assert_eq!(arena.block_count(), 1);
}

#[test]
fn vec_push_fails_cleanly_when_arena_is_full() {
    let arena = Arena::with_capacity(256).unwrap();
    let mut v = make_arena_vec::<u8, _>(&arena);
    let grown = v.try_reserve(10_000);
    assert!(grown.is_err());
    assert!(v.is_empty());
    assert_eq!(arena.used(), 0);
}

#[test]
fn api_box_lives_in_arena() {
    let arena = Arena::with_capacity(1024).unwrap();
    let b = ApiBox::new_in([7u32; 16], ShortAlloc::<u32>::new(&arena));
    assert!(arena.owns(b.as_ptr().cast()));
    assert_eq!(b.iter().sum::<u32>(), 112);
    drop(b);
    assert_eq!(arena.used(), 0);
}

#[test]
fn typed_capacity_guard_leaves_arena_unchanged() {
    let arena = Arena::with_capacity(1024).unwrap();
    let alloc = ShortAlloc::<u64>::new(&arena);
    let before = arena.blocks();
    let err = alloc.allocate(1024 / 8 + 1).unwrap_err();
    assert!(matches!(err, ArenaError::CapacityExceeded { .. }));
    assert_eq!(arena.blocks(), before);
    assert_eq!(arena.used(), 0);
}

#[test]
fn boxes_share_arena_with_containers() {
    let arena = LocalArena::with_policy(ArenaConfig::new(4096)).unwrap();
    let counter = DropCounter::new();
    let alloc = ShortAlloc::new(&arena);

    let boxes: Vec<ArenaBox<'_, _, _>> = (0..10)
        .map(|i| allocate_unique(&alloc, counter.track(i)).unwrap())
        .collect();
    let mut numbers = make_arena_vec::<i32, _>(&arena);
    numbers.extend(boxes.iter().map(|b| b.value));
    assert_eq!(numbers.iter().sum::<i32>(), 45);

    drop(boxes);
    assert_eq!(counter.drops(), 10);
    drop(numbers);
    assert_eq!(arena.used(), 0);
    assert!(arena.validate());
}

#[test]
fn boxes_dropped_on_another_thread() {
    let arena = Arena::with_capacity(8 * 1024).unwrap();
    let counter = DropCounter::new();
    let (tx, rx) = unbounded();

    thread::scope(|s| {
        let alloc = ShortAlloc::new(&arena);
        for i in 0..32 {
            tx.send(allocate_unique(&alloc, counter.track(i)).unwrap())
                .unwrap();
        }
        drop(tx);
        s.spawn(move || {
            let total: i32 = rx.iter().map(|b| b.value).sum();
            assert_eq!(total, (0..32).sum::<i32>());
        });
    });

    assert_eq!(counter.drops(), 32);
    assert_eq!(arena.used(), 0);
}
