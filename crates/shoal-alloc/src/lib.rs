//! Typed allocation on top of a Shoal [`Arena`](shoal_arena::Arena).
//!
//! [`ShortAlloc`] is a cheap, copyable handle that borrows an arena and
//! allocates arrays of one element type from it. It also implements
//! [`allocator_api2::alloc::Allocator`], so standard-shaped containers
//! (`allocator_api2::vec::Vec`, `allocator_api2::boxed::Box`) can live in
//! an arena; see [`make_arena_vec`].
//!
//! [`ArenaBox`] is the owning counterpart: a single value placed in the
//! arena and destroyed and released exactly once when the box drops.
//! [`allocate_unique_with`] and [`try_allocate_unique_with`] acquire the
//! memory before running the constructor and release it again if the
//! constructor panics or fails.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod boxed;
pub mod error;
pub mod short_alloc;

pub use boxed::{allocate_unique, allocate_unique_with, try_allocate_unique_with, ArenaBox};
pub use error::ConstructError;
pub use short_alloc::{make_arena_vec, ArenaVec, ShortAlloc};
