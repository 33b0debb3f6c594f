//! Shoal: a fixed-capacity arena allocator.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Shoal sub-crates. For most users, adding `shoal` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use shoal::prelude::*;
//!
//! let config = ArenaConfig::new(4096).with_strategy(AllocationStrategy::BestFit);
//! let arena: Arena = Arena::new(config).unwrap();
//!
//! // Containers and single values borrow the arena.
//! let mut squares = make_arena_vec::<u32, _>(&arena);
//! squares.extend((0..10).map(|i| i * i));
//! assert_eq!(squares[9], 81);
//!
//! let alloc = ShortAlloc::new(&arena);
//! let name = allocate_unique(&alloc, String::from("shoal")).unwrap();
//! assert_eq!(name.len(), 5);
//!
//! drop((squares, name));
//! assert_eq!(arena.used(), 0);
//! assert!(arena.validate());
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `shoal-core` | Config, strategies, errors, alignment helpers |
//! | [`arena`] | `shoal-arena` | The arena, lock policies, statistics |
//! | [`alloc`] | `shoal-alloc` | Typed adaptor, arena vectors, owning boxes |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Configuration, strategies, errors, and alignment helpers (`shoal-core`).
pub use shoal_core as types;

/// The arena itself, lock policies, and statistics (`shoal-arena`).
///
/// [`arena::Arena`] is thread-safe by default; [`arena::LocalArena`] skips
/// locking and cannot be shared across threads.
pub use shoal_arena as arena;

/// Typed allocation on top of an arena (`shoal-alloc`).
///
/// [`alloc::ShortAlloc`] implements `allocator_api2::alloc::Allocator`;
/// [`alloc::ArenaBox`] owns a single value.
pub use shoal_alloc as alloc;

/// Common imports for typical Shoal usage.
///
/// ```rust
/// use shoal::prelude::*;
/// ```
pub mod prelude {
    // Configuration and errors
    pub use shoal_core::{AllocationStrategy, ArenaConfig, ArenaError};

    // Arena
    pub use shoal_arena::{Arena, LocalArena, SingleThreaded, StatsSnapshot, ThreadSafe};

    // Typed allocation
    pub use shoal_alloc::{
        allocate_unique, allocate_unique_with, make_arena_vec, try_allocate_unique_with,
        ArenaBox, ArenaVec, ConstructError, ShortAlloc,
    };
}
