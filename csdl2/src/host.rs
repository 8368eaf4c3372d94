// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

//! Model of the managed host runtime the wrappers are exposed to.
//!
//! The host runs managed code under a single process-wide execution lock
//! ([`HostLock`]). Threads created by SDL (the audio thread) must acquire it
//! before touching any host object, and binding code releases it around
//! blocking native calls with [`allow_threads`].
//!
//! Host objects are reference counted ([`HostRef`]), and each thread has a
//! pending-error slot that plays the role of the host's current exception.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::Error;

/// Locks a mutex, ignoring poisoning.
///
/// Every critical section in the binding leaves its data consistent before
/// anything that can panic runs.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A strong reference to an arbitrary host object.
#[derive(Clone)]
pub struct HostRef(Arc<dyn Any + Send + Sync>);

impl HostRef {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self(value)
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Returns `true` if both refer to the same host object.
    pub fn ptr_eq(&self, other: &HostRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Number of strong references to the host object, including this one.
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl std::fmt::Debug for HostRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("HostRef")
            .field(&Arc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

/// The process-wide host execution lock.
///
/// Re-entrant for the owning thread: nested [`acquire`] calls on the same
/// thread only increase a per-thread depth counter.
pub struct HostLock {
    held: Mutex<bool>,
    released: Condvar,
}

static HOST_LOCK: HostLock = HostLock {
    held: Mutex::new(false),
    released: Condvar::new(),
};

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
    static PENDING_ERROR: RefCell<Option<Error>> = const { RefCell::new(None) };
}

impl HostLock {
    fn lock_raw(&self) {
        let mut held = lock(&self.held);
        while *held {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *held = true;
    }

    fn unlock_raw(&self) {
        *lock(&self.held) = false;
        self.released.notify_one();
    }
}

/// RAII guard returned by [`acquire`]. Not `Send`: the lock belongs to a thread.
#[must_use = "the host lock is released when the guard is dropped"]
pub struct HostGuard {
    _not_send: PhantomData<*const ()>,
}

/// Acquires the host execution lock for the current thread.
///
/// Blocks while another thread holds it. Returns immediately (incrementing
/// the depth) if the current thread already holds it.
pub fn acquire() -> HostGuard {
    let depth = DEPTH.with(Cell::get);
    if depth == 0 {
        HOST_LOCK.lock_raw();
    }
    DEPTH.with(|d| d.set(depth + 1));
    HostGuard {
        _not_send: PhantomData,
    }
}

impl Drop for HostGuard {
    fn drop(&mut self) {
        let depth = DEPTH.with(Cell::get);
        DEPTH.with(|d| d.set(depth - 1));
        if depth == 1 {
            HOST_LOCK.unlock_raw();
        }
    }
}

/// Returns `true` if the current thread holds the host lock.
pub fn is_held() -> bool {
    DEPTH.with(Cell::get) > 0
}

/// Runs `f` with the host lock released, restoring the previous depth after.
///
/// Used around blocking native calls so other threads (including SDL's audio
/// thread) can run host code meanwhile. If the current thread does not hold
/// the lock, `f` simply runs.
pub fn allow_threads<R>(f: impl FnOnce() -> R) -> R {
    let depth = DEPTH.with(|d| d.replace(0));
    if depth == 0 {
        return f();
    }
    HOST_LOCK.unlock_raw();

    struct Reacquire(usize);
    impl Drop for Reacquire {
        fn drop(&mut self) {
            HOST_LOCK.lock_raw();
            DEPTH.with(|d| d.set(self.0));
        }
    }
    let _reacquire = Reacquire(depth);
    f()
}

/// Records `error` as the current thread's pending host error.
pub fn set_pending_error(error: Error) {
    PENDING_ERROR.with(|pending| *pending.borrow_mut() = Some(error));
}

/// Removes and returns the current thread's pending host error.
pub fn take_pending_error() -> Option<Error> {
    PENDING_ERROR.with(|pending| pending.borrow_mut().take())
}

/// Returns `true` if the current thread has a pending host error.
pub fn has_pending_error() -> bool {
    PENDING_ERROR.with(|pending| pending.borrow().is_some())
}

/// Discards the current thread's pending host error, if any.
pub fn clear_pending_error() {
    PENDING_ERROR.with(|pending| pending.borrow_mut().take());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[test]
    fn acquire_is_reentrant() {
        let outer = acquire();
        {
            let _inner = acquire();
            assert!(is_held());
        }
        assert!(is_held());
        drop(outer);
        assert!(!is_held());
    }

    #[test]
    fn allow_threads_lets_other_threads_in() {
        let _guard = acquire();
        let entered = Arc::new(AtomicBool::new(false));
        let worker = {
            let entered = entered.clone();
            std::thread::spawn(move || {
                let _guard = acquire();
                entered.store(true, Ordering::SeqCst);
            })
        };
        allow_threads(|| {
            worker.join().unwrap();
        });
        assert!(entered.load(Ordering::SeqCst));
        assert!(is_held());
    }

    #[test]
    fn other_threads_wait_for_the_lock() {
        let guard = acquire();
        let entered = Arc::new(AtomicBool::new(false));
        let worker = {
            let entered = entered.clone();
            std::thread::spawn(move || {
                let _guard = acquire();
                entered.store(true, Ordering::SeqCst);
            })
        };
        std::thread::sleep(Duration::from_millis(20));
        assert!(!entered.load(Ordering::SeqCst));
        drop(guard);
        worker.join().unwrap();
        assert!(entered.load(Ordering::SeqCst));
    }

    #[test]
    fn pending_error_is_per_thread() {
        set_pending_error(Error::DeviceBusy);
        assert!(has_pending_error());
        std::thread::spawn(|| assert!(!has_pending_error()))
            .join()
            .unwrap();
        assert_eq!(take_pending_error(), Some(Error::DeviceBusy));
        assert!(!has_pending_error());
    }
}
