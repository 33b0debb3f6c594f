//! Low-level primitives over the arena's backing buffer.
//!
//! The buffer is a single aligned heap allocation that is only ever
//! touched through raw pointers: no `&[u8]` or `&mut [u8]` is created
//! over it, so data handed out to callers never aliases a Rust reference
//! held by the arena. Every function here bounds-checks its offsets
//! before entering `unsafe`.

#![allow(unsafe_code)]

use std::alloc::{self, Layout};
use std::ptr::{self, NonNull};

use shoal_core::align::MEMORY_CANARY;

const WORD: usize = std::mem::size_of::<u64>();

/// Aligned, fixed-size byte buffer.
pub(crate) struct RawBuffer {
    ptr: NonNull<u8>,
    layout: Layout,
}

// SAFETY: `RawBuffer` is a uniquely owned heap allocation. Concurrent
// access to its bytes is coordinated by the owning arena's lock policy;
// `SingleThreaded` arenas are `!Sync` through their `RefCell`.
unsafe impl Send for RawBuffer {}
// SAFETY: see `Send` above.
unsafe impl Sync for RawBuffer {}

impl RawBuffer {
    /// Allocate a zeroed buffer of `capacity` bytes aligned to `alignment`.
    ///
    /// Returns `None` if the layout is invalid or the system allocator
    /// refuses the request.
    pub(crate) fn new(capacity: usize, alignment: usize) -> Option<Self> {
        if capacity == 0 {
            return None;
        }
        let layout = Layout::from_size_align(capacity, alignment).ok()?;
        // SAFETY: `layout` has non-zero size (checked above).
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        NonNull::new(ptr).map(|ptr| Self { ptr, layout })
    }

    /// Buffer length in bytes.
    pub(crate) fn len(&self) -> usize {
        self.layout.size()
    }

    /// Address of the first byte.
    pub(crate) fn start(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    /// Whether `addr` lies in `[start, start + len)`.
    pub(crate) fn contains(&self, addr: usize) -> bool {
        let start = self.start();
        addr >= start && addr - start < self.len()
    }

    /// Offset of `addr` from the buffer start, if it lies inside the buffer.
    pub(crate) fn offset_of(&self, addr: usize) -> Option<usize> {
        self.contains(addr).then(|| addr - self.start())
    }

    /// Pointer to the byte at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is outside the buffer.
    pub(crate) fn ptr_at(&self, offset: usize) -> NonNull<u8> {
        assert!(offset < self.len(), "offset {offset} outside arena buffer");
        // SAFETY: `offset` is in bounds of the allocation, so the result is
        // in bounds and non-null.
        unsafe { NonNull::new_unchecked(self.ptr.as_ptr().add(offset)) }
    }

    /// Overwrite `len` bytes starting at `offset` with `byte`.
    ///
    /// # Panics
    ///
    /// Panics if the range extends past the buffer end.
    pub(crate) fn fill(&self, offset: usize, len: usize, byte: u8) {
        let end = offset.checked_add(len).expect("fill range overflows");
        assert!(end <= self.len(), "fill range {offset}..{end} outside arena buffer");
        // SAFETY: the range is in bounds (asserted above). The arena only
        // fills regions it owns (headers, free blocks, and blocks it is
        // about to hand out), so no caller holds a reference into them.
        unsafe { ptr::write_bytes(self.ptr.as_ptr().add(offset), byte, len) }
    }

    /// Write a block header: the integrity tag followed by the canary.
    pub(crate) fn write_header(&self, offset: usize, tag: u64) {
        self.write_word(offset, tag);
        self.write_word(offset + WORD, MEMORY_CANARY);
    }

    /// Read a block header back as `(tag, canary)`.
    pub(crate) fn read_header(&self, offset: usize) -> (u64, u64) {
        (self.read_word(offset), self.read_word(offset + WORD))
    }

    fn write_word(&self, offset: usize, value: u64) {
        assert!(
            offset.checked_add(WORD).is_some_and(|end| end <= self.len()),
            "header word at {offset} outside arena buffer"
        );
        // SAFETY: in bounds (asserted above); unaligned store because
        // headers sit at arbitrary offsets when the alignment is below 8.
        unsafe { ptr::write_unaligned(self.ptr.as_ptr().add(offset).cast::<u64>(), value) }
    }

    fn read_word(&self, offset: usize) -> u64 {
        assert!(
            offset.checked_add(WORD).is_some_and(|end| end <= self.len()),
            "header word at {offset} outside arena buffer"
        );
        // SAFETY: in bounds (asserted above); the buffer is zero-initialised
        // at creation, so every byte is initialised.
        unsafe { ptr::read_unaligned(self.ptr.as_ptr().add(offset).cast::<u64>()) }
    }
}

impl Drop for RawBuffer {
    fn drop(&mut self) {
        // SAFETY: `ptr` was returned by `alloc_zeroed` with exactly `layout`
        // and is freed only here.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) }
    }
}
