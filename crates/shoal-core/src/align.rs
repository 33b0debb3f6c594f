//! Alignment arithmetic, debug fill patterns, and block integrity tags.
//!
//! Everything here is pure arithmetic over `usize`/`u64`; the arena crate
//! applies these helpers to its buffer.

/// Byte written over freshly allocated data when fill patterns are enabled.
pub const ALLOCATED_PATTERN: u8 = 0xAB;

/// Byte written over released data when fill patterns are enabled.
pub const FREED_PATTERN: u8 = 0xFE;

/// Boundary canary stored in every block header, after the integrity tag.
pub const MEMORY_CANARY: u64 = 0xDEAD_BEEF;

/// Salt mixed into [`integrity_tag`].
const TAG_SALT: u64 = 0x1234_5678;

/// Bytes of header payload: the integrity tag followed by the canary.
pub const HEADER_PAYLOAD: usize = 2 * std::mem::size_of::<u64>();

/// Round `value` up to the next multiple of `alignment`.
///
/// `alignment` must be a power of two. Returns `None` on overflow.
pub fn align_up(value: usize, alignment: usize) -> Option<usize> {
    debug_assert!(alignment.is_power_of_two());
    let mask = alignment - 1;
    value.checked_add(mask).map(|v| v & !mask)
}

/// Whether `value` is a multiple of `alignment` (a power of two).
pub fn is_aligned(value: usize, alignment: usize) -> bool {
    debug_assert!(alignment.is_power_of_two());
    value & (alignment - 1) == 0
}

/// Size of the per-block header reserved in the buffer.
///
/// The header payload padded to the arena alignment, so that data that
/// follows a header at an aligned offset is itself aligned.
pub fn header_size(alignment: usize) -> usize {
    // HEADER_PAYLOAD is tiny; the round-up cannot overflow for any
    // power-of-two alignment representable in usize.
    align_up(HEADER_PAYLOAD, alignment).unwrap_or(alignment)
}

/// Integrity tag for a block of `size` usable bytes at `offset`.
///
/// Deterministic in both inputs. A stored tag that no longer matches its
/// block's size and offset means the metadata was overwritten.
pub fn integrity_tag(size: usize, offset: usize) -> u64 {
    ((size ^ offset) as u64).wrapping_add(TAG_SALT)
}
