//! The typed allocator adaptor.

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::fmt;
use std::marker::PhantomData;
use std::mem::{align_of, size_of};
use std::ptr::{self, NonNull};

use allocator_api2::alloc::{AllocError, Allocator};
use allocator_api2::vec::Vec as ApiVec;
use shoal_arena::{Arena, LockPolicy, ThreadSafe};
use shoal_core::ArenaError;
use tracing::{debug, warn};

/// Typed view of an arena: allocates arrays of `T`.
///
/// Holds only a reference to the arena, so it is `Copy` and costs one
/// pointer. Every copy, and every [`rebind`](Self::rebind) of it, draws
/// from and releases to the same arena; the borrow ensures the arena
/// outlives all of them.
pub struct ShortAlloc<'a, T, L: LockPolicy = ThreadSafe> {
    arena: &'a Arena<L>,
    _marker: PhantomData<fn() -> T>,
}

/// A `Vec` whose buffer lives in an arena.
pub type ArenaVec<'a, T, L = ThreadSafe> = ApiVec<T, ShortAlloc<'a, T, L>>;

impl<'a, T, L: LockPolicy> ShortAlloc<'a, T, L> {
    /// Adaptor over `arena`.
    pub fn new(arena: &'a Arena<L>) -> Self {
        Self {
            arena,
            _marker: PhantomData,
        }
    }

    /// Allocate uninitialized storage for `n` values of `T`.
    ///
    /// `n == 0` and zero-sized `T` return a dangling, well-aligned pointer
    /// without touching the arena.
    ///
    /// # Errors
    ///
    /// `CapacityExceeded` if `n * size_of::<T>()` overflows or exceeds the
    /// arena capacity (the arena is not consulted); `UnsupportedAlignment`
    /// if `T` needs a stricter alignment than the arena provides;
    /// otherwise whatever [`Arena::allocate`] returns.
    pub fn allocate(&self, n: usize) -> Result<NonNull<T>, ArenaError> {
        let elem = size_of::<T>();
        if n == 0 || elem == 0 {
            return Ok(NonNull::dangling());
        }
        let capacity = self.arena.capacity();
        let bytes = match n.checked_mul(elem) {
            Some(bytes) if bytes <= capacity => bytes,
            _ => {
                return Err(ArenaError::CapacityExceeded {
                    requested: n.saturating_mul(elem),
                    capacity,
                })
            }
        };
        if align_of::<T>() > self.arena.alignment() {
            return Err(ArenaError::UnsupportedAlignment {
                requested: align_of::<T>(),
                supported: self.arena.alignment(),
            });
        }
        self.arena.allocate(bytes).map(NonNull::cast)
    }

    /// Release storage obtained from [`allocate`](Self::allocate).
    ///
    /// The element count is accepted but not used: the arena knows each
    /// block's size. Zero-sized `T` and the dangling pointer returned for
    /// empty requests are no-ops; every other pointer goes to the arena.
    ///
    /// # Errors
    ///
    /// Propagates `ForeignPointer` and `DoubleFree` from the arena.
    ///
    /// # Safety
    ///
    /// `p` must have come from an adaptor over the same arena, and no live
    /// reference may point into the block.
    pub unsafe fn deallocate(&self, p: NonNull<T>, _n: usize) -> Result<(), ArenaError> {
        if size_of::<T>() == 0 || (p == NonNull::dangling() && !self.owns(p.as_ptr())) {
            return Ok(());
        }
        // SAFETY: forwarded caller contract.
        unsafe { self.arena.deallocate(p.as_ptr().cast()) }
    }

    /// Move `value` into the slot at `p`.
    ///
    /// # Safety
    ///
    /// `p` must be valid for writes and aligned for `T`. Any value already
    /// there is overwritten without being dropped.
    pub unsafe fn construct(&self, p: NonNull<T>, value: T) {
        // SAFETY: caller guarantees `p` is writable and aligned.
        unsafe { p.as_ptr().write(value) }
    }

    /// Run the destructor of the value at `p` in place.
    ///
    /// # Safety
    ///
    /// `p` must point to an initialized `T` that is not used afterwards.
    pub unsafe fn destroy(&self, p: NonNull<T>) {
        // SAFETY: caller guarantees `p` holds an initialized, unaliased `T`.
        unsafe { ptr::drop_in_place(p.as_ptr()) }
    }

    /// The same arena, viewed as storage for `U`.
    pub fn rebind<U>(&self) -> ShortAlloc<'a, U, L> {
        ShortAlloc::new(self.arena)
    }

    /// The underlying arena.
    pub fn arena(&self) -> &'a Arena<L> {
        self.arena
    }

    /// Whether `p` lies inside the arena's buffer.
    pub fn owns(&self, p: *const T) -> bool {
        self.arena.owns(p.cast())
    }

    /// Largest `n` that could pass the capacity check of
    /// [`allocate`](Self::allocate).
    pub fn max_size(&self) -> usize {
        self.arena.capacity() / size_of::<T>().max(1)
    }

    /// The arena's statistics report.
    pub fn stats_report(&self) -> String {
        self.arena.stats_report()
    }

    /// Run [`Arena::defragment`].
    pub fn defragment(&self) -> usize {
        self.arena.defragment()
    }

    /// Run [`Arena::validate`].
    pub fn validate(&self) -> bool {
        self.arena.validate()
    }
}

impl<T, L: LockPolicy> Clone for ShortAlloc<'_, T, L> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, L: LockPolicy> Copy for ShortAlloc<'_, T, L> {}

impl<T, L: LockPolicy> fmt::Debug for ShortAlloc<'_, T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShortAlloc")
            .field("arena", &self.arena.id())
            .field("element", &std::any::type_name::<T>())
            .finish()
    }
}

/// Adaptors are interchangeable when they share capacity, alignment,
/// thread safety and strategy and draw from the same arena instance,
/// whatever their element types.
impl<'b, T, U, L: LockPolicy, M: LockPolicy> PartialEq<ShortAlloc<'b, U, M>>
    for ShortAlloc<'_, T, L>
{
    fn eq(&self, other: &ShortAlloc<'b, U, M>) -> bool {
        let (ours, theirs) = (self.arena.config(), other.arena.config());
        ours.capacity == theirs.capacity
            && ours.alignment == theirs.alignment
            && L::THREAD_SAFE == M::THREAD_SAFE
            && ours.strategy == theirs.strategy
            && ptr::addr_eq(
                self.arena as *const Arena<L>,
                other.arena as *const Arena<M>,
            )
    }
}

impl<T, L: LockPolicy> Eq for ShortAlloc<'_, T, L> {}

// SAFETY: blocks handed out stay valid until deallocated, reset, or the
// arena drops; the `'a` borrow rules out the latter two while any copy of
// the adaptor exists. All copies and rebinds share one arena, so memory
// from one may be released through another.
unsafe impl<T, L: LockPolicy> Allocator for ShortAlloc<'_, T, L> {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        if layout.size() == 0 {
            let dangling = NonNull::new(ptr::without_provenance_mut::<u8>(layout.align()))
                .ok_or(AllocError)?;
            return Ok(NonNull::slice_from_raw_parts(dangling, 0));
        }
        if layout.align() > self.arena.alignment() {
            debug!(
                arena = %self.arena.id(),
                requested = layout.align(),
                supported = self.arena.alignment(),
                "layout alignment exceeds arena alignment"
            );
            return Err(AllocError);
        }
        let ptr = self.arena.allocate(layout.size()).map_err(|err| {
            debug!(arena = %self.arena.id(), error = %err, "container allocation failed");
            AllocError
        })?;
        Ok(NonNull::slice_from_raw_parts(ptr, layout.size()))
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() == 0 {
            return;
        }
        // SAFETY: the `Allocator` contract guarantees `ptr` is a live block
        // from this allocator (or a copy of it, sharing the arena).
        if let Err(err) = unsafe { self.arena.deallocate(ptr.as_ptr()) } {
            warn!(arena = %self.arena.id(), error = %err, "container deallocation rejected");
        }
    }
}

/// An empty `Vec` whose buffer will live in `arena`.
pub fn make_arena_vec<T, L: LockPolicy>(arena: &Arena<L>) -> ArenaVec<'_, T, L> {
    ApiVec::new_in(ShortAlloc::new(arena))
}
