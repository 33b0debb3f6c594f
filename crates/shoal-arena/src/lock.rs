//! Lock policies: the type-level thread-safety switch.
//!
//! An arena's mutable bookkeeping sits in a cell chosen by its
//! [`LockPolicy`]. [`ThreadSafe`] wraps it in a `parking_lot::RwLock`, so
//! allocation and release serialize while read-only queries share the
//! lock. [`SingleThreaded`] uses a `RefCell`, which makes the arena
//! `!Sync` and lets the compiler reject cross-thread use outright.

use std::cell::RefCell;

use parking_lot::RwLock;

mod sealed {
    pub trait Sealed {}
}

/// Selects how arena state is guarded.
///
/// Sealed: the two implementations in this module are the only ones.
pub trait LockPolicy: sealed::Sealed + 'static {
    /// Whether arenas using this policy may be shared between threads.
    const THREAD_SAFE: bool;

    /// Cell type that owns the guarded state.
    type Cell<T>;

    /// Wrap `value` in a cell.
    fn new_cell<T>(value: T) -> Self::Cell<T>;

    /// Run `f` with shared access.
    fn read<T, R>(cell: &Self::Cell<T>, f: impl FnOnce(&T) -> R) -> R;

    /// Run `f` with exclusive access.
    fn write<T, R>(cell: &Self::Cell<T>, f: impl FnOnce(&mut T) -> R) -> R;

    /// Exclusive access through `&mut`, no locking needed.
    fn get_mut<T>(cell: &mut Self::Cell<T>) -> &mut T;
}

/// Reader-writer locked state. Arenas are `Send + Sync`.
#[derive(Debug)]
pub enum ThreadSafe {}

impl sealed::Sealed for ThreadSafe {}

impl LockPolicy for ThreadSafe {
    const THREAD_SAFE: bool = true;
    type Cell<T> = RwLock<T>;

    fn new_cell<T>(value: T) -> RwLock<T> {
        RwLock::new(value)
    }

    fn read<T, R>(cell: &RwLock<T>, f: impl FnOnce(&T) -> R) -> R {
        f(&cell.read())
    }

    fn write<T, R>(cell: &RwLock<T>, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut cell.write())
    }

    fn get_mut<T>(cell: &mut RwLock<T>) -> &mut T {
        cell.get_mut()
    }
}

/// Unsynchronized state. Arenas are `Send` but not `Sync`.
#[derive(Debug)]
pub enum SingleThreaded {}

impl sealed::Sealed for SingleThreaded {}

impl LockPolicy for SingleThreaded {
    const THREAD_SAFE: bool = false;
    type Cell<T> = RefCell<T>;

    fn new_cell<T>(value: T) -> RefCell<T> {
        RefCell::new(value)
    }

    fn read<T, R>(cell: &RefCell<T>, f: impl FnOnce(&T) -> R) -> R {
        f(&cell.borrow())
    }

    fn write<T, R>(cell: &RefCell<T>, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut cell.borrow_mut())
    }

    fn get_mut<T>(cell: &mut RefCell<T>) -> &mut T {
        cell.get_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bump<L: LockPolicy>() -> u32 {
        let cell = L::new_cell(1u32);
        L::write(&cell, |v| *v += 1);
        L::read(&cell, |v| *v)
    }

    #[test]
    fn both_policies_guard_state() {
        assert_eq!(bump::<ThreadSafe>(), 2);
        assert_eq!(bump::<SingleThreaded>(), 2);
    }

    #[test]
    fn thread_safety_flags() {
        const _: () = assert!(ThreadSafe::THREAD_SAFE);
        const _: () = assert!(!SingleThreaded::THREAD_SAFE);
    }
}
