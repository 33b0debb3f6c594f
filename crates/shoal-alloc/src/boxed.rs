//! Single values owned inside an arena.

#![allow(unsafe_code)]

use std::fmt;
use std::marker::PhantomData;
use std::mem::{self, ManuallyDrop};
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use shoal_arena::{Arena, LockPolicy, ThreadSafe};
use shoal_core::ArenaError;
use tracing::warn;

use crate::error::ConstructError;
use crate::short_alloc::ShortAlloc;

/// Owning pointer to a `T` stored in an arena.
///
/// Dropping the box runs `T`'s destructor and then returns the block to
/// the arena, each exactly once.
pub struct ArenaBox<'a, T, L: LockPolicy = ThreadSafe> {
    ptr: NonNull<T>,
    alloc: ShortAlloc<'a, T, L>,
    _owns: PhantomData<T>,
}

// SAFETY: the box owns its `T` exclusively. Moving it to another thread
// moves the `T` and makes that thread release the block, which requires
// the arena to be shareable.
unsafe impl<T: Send, L: LockPolicy> Send for ArenaBox<'_, T, L> where Arena<L>: Sync {}
// SAFETY: `&ArenaBox` only exposes `&T`.
unsafe impl<T: Sync, L: LockPolicy> Sync for ArenaBox<'_, T, L> where Arena<L>: Sync {}

impl<'a, T, L: LockPolicy> ArenaBox<'a, T, L> {
    /// Move the value out and release its block.
    pub fn into_inner(self) -> T {
        let this = ManuallyDrop::new(self);
        // SAFETY: `ptr` holds an initialized `T`; `this` is never dropped,
        // so the value is read out exactly once.
        let value = unsafe { this.ptr.as_ptr().read() };
        this.release();
        value
    }

    /// Raw pointer to the value. Valid for as long as the box lives.
    pub fn as_ptr(this: &Self) -> *const T {
        this.ptr.as_ptr()
    }

    /// The adaptor the value was allocated through.
    pub fn allocator(this: &Self) -> ShortAlloc<'a, T, L> {
        this.alloc
    }

    fn release(&self) {
        // SAFETY: `ptr` came from `alloc.allocate(1)`; callers release once.
        if let Err(err) = unsafe { self.alloc.deallocate(self.ptr, 1) } {
            warn!(
                arena = %self.alloc.arena().id(),
                error = %err,
                "arena box release rejected"
            );
        }
    }
}

impl<T, L: LockPolicy> Deref for ArenaBox<'_, T, L> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: `ptr` holds an initialized `T` owned by this box.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T, L: LockPolicy> DerefMut for ArenaBox<'_, T, L> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as for `deref`, and `&mut self` makes the access unique.
        unsafe { self.ptr.as_mut() }
    }
}

impl<T, L: LockPolicy> Drop for ArenaBox<'_, T, L> {
    fn drop(&mut self) {
        // SAFETY: the value is initialized and is not touched again.
        unsafe { self.alloc.destroy(self.ptr) };
        self.release();
    }
}

impl<T: fmt::Debug, L: LockPolicy> fmt::Debug for ArenaBox<'_, T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: fmt::Display, L: LockPolicy> fmt::Display for ArenaBox<'_, T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}

/// Releases an unconstructed block if the constructor unwinds or fails.
struct Reservation<'a, T, L: LockPolicy> {
    ptr: NonNull<T>,
    alloc: ShortAlloc<'a, T, L>,
}

impl<'a, T, L: LockPolicy> Reservation<'a, T, L> {
    fn acquire(alloc: &ShortAlloc<'a, T, L>) -> Result<Self, ArenaError> {
        Ok(Self {
            ptr: alloc.allocate(1)?,
            alloc: *alloc,
        })
    }

    fn fill(self, value: T) -> ArenaBox<'a, T, L> {
        let (ptr, alloc) = (self.ptr, self.alloc);
        mem::forget(self);
        // SAFETY: `ptr` is a fresh, suitably aligned block for one `T`.
        unsafe { alloc.construct(ptr, value) };
        ArenaBox {
            ptr,
            alloc,
            _owns: PhantomData,
        }
    }
}

impl<T, L: LockPolicy> Drop for Reservation<'_, T, L> {
    fn drop(&mut self) {
        // SAFETY: the block was never constructed into and is released once.
        if let Err(err) = unsafe { self.alloc.deallocate(self.ptr, 1) } {
            warn!(error = %err, "failed to release block after aborted construction");
        }
    }
}

/// Place `value` in the arena behind `alloc`.
///
/// # Errors
///
/// Any error from [`ShortAlloc::allocate`]; `value` is dropped.
pub fn allocate_unique<'a, T, L: LockPolicy>(
    alloc: &ShortAlloc<'a, T, L>,
    value: T,
) -> Result<ArenaBox<'a, T, L>, ArenaError> {
    Ok(Reservation::acquire(alloc)?.fill(value))
}

/// Reserve a block, then build the value with `f` and place it there.
///
/// If `f` panics, the block is released during unwinding and the panic
/// continues.
///
/// # Errors
///
/// Any error from [`ShortAlloc::allocate`]; `f` is not called.
pub fn allocate_unique_with<'a, T, L: LockPolicy>(
    alloc: &ShortAlloc<'a, T, L>,
    f: impl FnOnce() -> T,
) -> Result<ArenaBox<'a, T, L>, ArenaError> {
    let reservation = Reservation::acquire(alloc)?;
    let value = f();
    Ok(reservation.fill(value))
}

/// Fallible form of [`allocate_unique_with`].
///
/// # Errors
///
/// `ConstructError::Alloc` if no block could be reserved (`f` is not
/// called); `ConstructError::Construct` if `f` fails, after the block has
/// been released.
pub fn try_allocate_unique_with<'a, T, E, L: LockPolicy>(
    alloc: &ShortAlloc<'a, T, L>,
    f: impl FnOnce() -> Result<T, E>,
) -> Result<ArenaBox<'a, T, L>, ConstructError<E>> {
    let reservation = Reservation::acquire(alloc)?;
    match f() {
        Ok(value) => Ok(reservation.fill(value)),
        Err(err) => {
            drop(reservation);
            Err(ConstructError::Construct(err))
        }
    }
}
