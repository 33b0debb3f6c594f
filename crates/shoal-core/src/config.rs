//! Arena construction parameters.

use std::fmt;

use crate::align::header_size;
use crate::error::ArenaError;

/// Rule used to pick which free block satisfies a request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AllocationStrategy {
    /// First free block, in free-list order, that is large enough.
    #[default]
    FirstFit,
    /// Smallest free block that is large enough; first encountered on ties.
    BestFit,
    /// Largest free block that is large enough; first encountered on ties.
    WorstFit,
}

impl fmt::Display for AllocationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FirstFit => "first-fit",
            Self::BestFit => "best-fit",
            Self::WorstFit => "worst-fit",
        };
        f.write_str(name)
    }
}

/// Configuration for a fixed-capacity arena.
///
/// Validated at construction; all values are immutable after creation.
/// Thread safety is not part of this struct: it is selected by the
/// arena's lock-policy type parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Total size of the backing buffer in bytes, headers included.
    pub capacity: usize,

    /// Alignment of every returned data pointer. Must be a power of two.
    ///
    /// Default: 16, the strictest fundamental alignment on mainstream
    /// 64-bit targets.
    pub alignment: usize,

    /// Placement rule used when scanning the free list.
    pub strategy: AllocationStrategy,

    /// Fill allocated data with `0xAB` and released data with `0xFE`.
    ///
    /// Default: on in debug builds, off in release builds.
    pub fill_patterns: bool,

    /// Merge a released block with its free physical neighbours
    /// immediately. When off, adjacent free blocks accumulate until
    /// `defragment()` is called.
    ///
    /// Default: on.
    pub coalesce_on_free: bool,
}

impl ArenaConfig {
    /// Default data alignment in bytes.
    pub const DEFAULT_ALIGNMENT: usize = 16;

    /// Create a config for an arena of `capacity` bytes with default
    /// values for all other parameters.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            alignment: Self::DEFAULT_ALIGNMENT,
            strategy: AllocationStrategy::default(),
            fill_patterns: cfg!(debug_assertions),
            coalesce_on_free: true,
        }
    }

    /// Set the data alignment.
    pub fn with_alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }

    /// Set the placement strategy.
    pub fn with_strategy(mut self, strategy: AllocationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Enable or disable debug fill patterns.
    pub fn with_fill_patterns(mut self, enabled: bool) -> Self {
        self.fill_patterns = enabled;
        self
    }

    /// Enable or disable coalescing on release.
    pub fn with_coalesce_on_free(mut self, enabled: bool) -> Self {
        self.coalesce_on_free = enabled;
        self
    }

    /// Bytes reserved in front of every block for its header.
    pub fn header_size(&self) -> usize {
        header_size(self.alignment)
    }

    /// Smallest capacity that can hold one block: a header plus one
    /// alignment unit of data.
    pub fn min_capacity(&self) -> usize {
        self.header_size() + self.alignment
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ArenaError> {
        if !self.alignment.is_power_of_two() {
            return Err(ArenaError::InvalidConfig {
                reason: format!(
                    "alignment must be a power of two (got {})",
                    self.alignment
                ),
            });
        }
        if self.alignment > isize::MAX as usize / 2 {
            return Err(ArenaError::InvalidConfig {
                reason: format!("alignment {} is too large", self.alignment),
            });
        }
        if self.capacity < self.min_capacity() {
            return Err(ArenaError::InvalidConfig {
                reason: format!(
                    "capacity must be at least {} bytes for alignment {} (got {})",
                    self.min_capacity(),
                    self.alignment,
                    self.capacity,
                ),
            });
        }
        if self.capacity > isize::MAX as usize {
            return Err(ArenaError::InvalidConfig {
                reason: format!("capacity {} exceeds isize::MAX", self.capacity),
            });
        }
        Ok(())
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new(64 * 1024)
    }
}
