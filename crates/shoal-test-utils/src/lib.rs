//! Test fixtures for Shoal development.
//!
//! Provides drop-tracking values, constructors that fail on demand, and
//! builders for arenas in a known fragmented layout.

#![deny(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

pub use fixtures::{
    fragmented_arena, Aligned64, ConstructFailed, DropCounter, Tracked, FRAGMENTED_CAPACITY,
};
