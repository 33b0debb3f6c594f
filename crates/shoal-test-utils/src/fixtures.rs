//! Reusable arena test fixtures.
//!
//! - [`DropCounter`] / [`Tracked`]: count destructor runs.
//! - [`ConstructFailed`]: error returned by fallible test constructors.
//! - [`Aligned64`]: a type stricter than the default arena alignment.
//! - [`fragmented_arena`]: an arena whose free list holds given sizes.

use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use shoal_arena::Arena;
use shoal_core::{AllocationStrategy, ArenaConfig};

/// Shared counter of [`Tracked`] drops.
#[derive(Clone, Debug, Default)]
pub struct DropCounter(Arc<AtomicUsize>);

impl DropCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A value that bumps this counter when dropped.
    pub fn track<T>(&self, value: T) -> Tracked<T> {
        Tracked {
            value,
            drops: Arc::clone(&self.0),
        }
    }

    pub fn drops(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Wraps a value and records its drop in a [`DropCounter`].
#[derive(Debug)]
pub struct Tracked<T> {
    pub value: T,
    drops: Arc<AtomicUsize>,
}

impl<T> Drop for Tracked<T> {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Error produced by constructors that fail on purpose.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConstructFailed(pub &'static str);

impl std::fmt::Display for ConstructFailed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "construction failed: {}", self.0)
    }
}

impl std::error::Error for ConstructFailed {}

/// Over-aligned payload for alignment-mismatch tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(align(64))]
pub struct Aligned64(pub u64);

/// Capacity used by [`fragmented_arena`].
pub const FRAGMENTED_CAPACITY: usize = 4096;

/// Build an arena (alignment 1) whose free list contains blocks of exactly
/// `sizes`, in that order, with every other byte allocated.
///
/// Returns the arena and the data pointer of each hole, so callers can
/// check which hole a strategy picked.
///
/// # Panics
///
/// Panics if `sizes` do not fit in [`FRAGMENTED_CAPACITY`].
#[allow(unsafe_code)]
pub fn fragmented_arena(strategy: AllocationStrategy, sizes: &[usize]) -> (Arena, Vec<NonNull<u8>>) {
    let config = ArenaConfig::new(FRAGMENTED_CAPACITY)
        .with_alignment(1)
        .with_strategy(strategy);
    let arena = Arena::new(config).expect("fixture config is valid");

    let mut holes = Vec::with_capacity(sizes.len());
    for &size in sizes {
        holes.push(arena.allocate(size).expect("hole fits in fixture arena"));
        // Separator keeps neighbouring holes from coalescing.
        arena.allocate(1).expect("separator fits in fixture arena");
    }
    arena
        .allocate(arena.largest_free_block())
        .expect("tail block is allocatable");

    // Freed blocks go to the list head, so release in reverse.
    for hole in holes.iter().rev() {
        // SAFETY: each hole was just allocated from `arena` and has no
        // outstanding references.
        unsafe { arena.deallocate(hole.as_ptr()) }.expect("hole is a live block");
    }
    (arena, holes)
}
