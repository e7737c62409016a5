//! A minimal spinlock for handing data between thread mode and an ISR.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, Ordering};

/// Guards a `T` against concurrent or reentrant access.
///
/// Locking never waits politely: [`try_lock`] either succeeds immediately or
/// reports contention, and [`lock`] just retries. An ISR should only ever use
/// `try_lock`, since spinning there against the code it preempted would never
/// end.
///
/// [`try_lock`]: #method.try_lock
/// [`lock`]: #method.lock
#[derive(Debug)]
pub struct SpinLock<T: ?Sized> {
    held: AtomicBool,
    value: UnsafeCell<T>,
}

unsafe impl<T: Send + ?Sized> Sync for SpinLock<T> {}

/// The lock was already held.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Contended;

impl<T> SpinLock<T> {
    pub const fn new(value: T) -> Self {
        SpinLock {
            held: AtomicBool::new(false),
            value: UnsafeCell::new(value),
        }
    }
}

impl<T: ?Sized + Send> SpinLock<T> {
    pub fn try_lock(&self) -> Result<SpinLockGuard<T>, Contended> {
        if self.held.swap(true, Ordering::Acquire) {
            return Err(Contended);
        }
        // We made the false->true transition, so nobody else can be looking.
        Ok(SpinLockGuard {
            release: Release(&self.held),
            value: unsafe { &mut *self.value.get() },
        })
    }

    pub fn lock(&self) -> SpinLockGuard<T> {
        loop {
            if let Ok(guard) = self.try_lock() {
                return guard;
            }
        }
    }

    pub fn is_locked(&self) -> bool {
        self.held.load(Ordering::Relaxed)
    }
}

/// Exclusive access to the contents of a `SpinLock`. Unlocks when dropped.
#[must_use = "dropping the guard unlocks immediately"]
#[derive(Debug)]
pub struct SpinLockGuard<'a, T: ?Sized> {
    release: Release<'a>,
    value: &'a mut T,
}

/// Clears the lock flag on drop. Kept apart from `SpinLockGuard` so `map` can
/// take the guard apart.
#[derive(Debug)]
struct Release<'a>(&'a AtomicBool);

impl<'a> Drop for Release<'a> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<'a, T: ?Sized> SpinLockGuard<'a, T> {
    /// Narrows a guard to part of its contents, keeping the lock held.
    pub fn map<U: ?Sized>(
        guard: SpinLockGuard<'a, T>,
        f: impl FnOnce(&mut T) -> &mut U,
    ) -> SpinLockGuard<'a, U> {
        let SpinLockGuard { release, value } = guard;
        SpinLockGuard {
            release,
            value: f(value),
        }
    }
}

impl<'a, T: ?Sized> core::ops::Deref for SpinLockGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.value
    }
}

impl<'a, T: ?Sized> core::ops::DerefMut for SpinLockGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.value
    }
}
