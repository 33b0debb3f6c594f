//! Error types for arena allocation.
//!
//! One enum covers the whole taxonomy, grouped by how a caller is expected
//! to react: allocation failures are per-call and retryable, configuration
//! errors are detected before the arena is touched, invariant violations
//! are caller bugs, and corruption is fatal.

use std::error::Error;
use std::fmt;

/// Errors that can occur during arena construction and allocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArenaError {
    /// No free block is large enough for the request. Arena state is
    /// unchanged; the caller may retry with a smaller size or another arena.
    OutOfMemory {
        /// Number of bytes requested, after rounding up to the alignment.
        requested: usize,
        /// Size of the largest free block at the time of the request.
        largest_free: usize,
    },
    /// A typed request exceeds the total capacity of the arena. Detected
    /// before the arena is touched.
    CapacityExceeded {
        /// Number of bytes requested.
        requested: usize,
        /// Total capacity of the arena in bytes.
        capacity: usize,
    },
    /// A typed request needs a stricter alignment than the arena provides.
    UnsupportedAlignment {
        /// Alignment required by the element type or layout.
        requested: usize,
        /// Alignment the arena was configured with.
        supported: usize,
    },
    /// Construction parameters are inconsistent.
    InvalidConfig {
        /// Description of the violated constraint.
        reason: String,
    },
    /// A byte-level allocation of zero bytes was requested.
    ZeroSizedRequest,
    /// Block metadata failed its integrity check.
    Corruption {
        /// Offset of the offending block from the arena start.
        offset: usize,
        /// Which check failed.
        detail: &'static str,
    },
    /// The block containing this pointer is already free.
    DoubleFree {
        /// Offset of the block from the arena start.
        offset: usize,
    },
    /// The pointer does not address the start of a block in this arena.
    ForeignPointer {
        /// The address that was passed in.
        address: usize,
    },
}

impl ArenaError {
    /// Whether the error signals corrupted memory. Corruption is never
    /// recoverable on the current code path.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Corruption { .. })
    }

    /// Whether the same call may succeed later, or against a larger arena,
    /// without the caller changing its own logic.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::OutOfMemory { .. } | Self::CapacityExceeded { .. }
        )
    }
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory {
                requested,
                largest_free,
            } => {
                write!(
                    f,
                    "arena out of memory: requested {requested} bytes, largest free block {largest_free} bytes"
                )
            }
            Self::CapacityExceeded {
                requested,
                capacity,
            } => {
                write!(
                    f,
                    "arena capacity exceeded: requested {requested} bytes, capacity {capacity} bytes"
                )
            }
            Self::UnsupportedAlignment {
                requested,
                supported,
            } => {
                write!(
                    f,
                    "alignment {requested} exceeds arena alignment {supported}"
                )
            }
            Self::InvalidConfig { reason } => write!(f, "invalid arena config: {reason}"),
            Self::ZeroSizedRequest => write!(f, "zero-sized arena allocation"),
            Self::Corruption { offset, detail } => {
                write!(f, "memory corruption detected at offset {offset}: {detail}")
            }
            Self::DoubleFree { offset } => {
                write!(f, "double free of block at offset {offset}")
            }
            Self::ForeignPointer { address } => {
                write!(f, "pointer {address:#x} was not allocated by this arena")
            }
        }
    }
}

impl Error for ArenaError {}
