//! Core types for the Shoal fixed-capacity arena allocator.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by the rest of the workspace: arena identity,
//! construction parameters, the error taxonomy, and the small alignment
//! and canary helpers used by the block machinery.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod align;
pub mod config;
pub mod error;
pub mod id;

pub use config::{AllocationStrategy, ArenaConfig};
pub use error::ArenaError;
pub use id::ArenaId;
