//! Fixed-capacity free-list arena for Shoal.
//!
//! An [`Arena`] owns one aligned buffer of `capacity` bytes, chosen at
//! construction, and hands out variable-size blocks from it. Released
//! blocks return to a free list and are merged with free physical
//! neighbours, so the arena can be reused indefinitely without touching
//! the system allocator again.
//!
//! # Architecture
//!
//! ```text
//! Arena<L: LockPolicy>
//! ├── RawBuffer (capacity bytes, aligned; headers + user data)
//! ├── L::Cell<ArenaState>   (RwLock for ThreadSafe, RefCell otherwise)
//! │   ├── BlockTable        (side-table records, physical links, offset index)
//! │   └── FreeList          (singly linked through BlockTable indices)
//! └── ArenaStats            (atomics, readable without the lock)
//! ```
//!
//! Block metadata lives in the side table, not in the buffer. The buffer
//! only carries a small header per block: a copy of the block's integrity
//! tag and a canary word, so that an overrun from the preceding block is
//! caught the next time the arena visits the header.
//!
//! # Safety
//!
//! `unsafe` is confined to `raw.rs` (the buffer) and the
//! [`Arena::deallocate`] contract: the caller promises that nothing still
//! references a region it hands back.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod arena;
mod block;
mod free_list;
pub mod lock;
mod raw;
pub mod stats;

pub use arena::{Arena, BlockInfo, LocalArena};
pub use lock::{LockPolicy, SingleThreaded, ThreadSafe};
pub use shoal_core::{AllocationStrategy, ArenaConfig, ArenaError, ArenaId};
pub use stats::{ArenaStats, StatsSnapshot};
