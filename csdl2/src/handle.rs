// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

//! Owning, nullable pointers to native resources.

use std::ops::Deref;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};

use crate::host::{allow_threads, lock};
use crate::{Error, Result};

/// An owning, nullable reference to one native resource.
///
/// The handle is valid while it holds a non-null pointer. [`detach`](Self::detach)
/// swaps the pointer out atomically, so exactly one caller ever receives it and
/// can release the resource; every later access fails with
/// [`Error::InvalidHandle`].
///
/// The handle never frees anything itself. The wrapper that owns it decides
/// which native routine releases the pointer once detached.
///
/// Native calls run under a [`Lease`]. `detach` empties the handle at once,
/// so no new lease is granted, and then waits until the leases already
/// handed out are dropped. A thread must not detach a handle it holds a
/// lease on.
pub struct NativeHandle<T> {
    ptr: AtomicPtr<T>,
    leases: Mutex<usize>,
    idle: Condvar,
    kind: &'static str,
}

impl<T> NativeHandle<T> {
    /// Creates a handle owning `ptr`.
    ///
    /// `kind` names the resource in error messages (e.g. `"SDL_Surface"`).
    pub fn new(kind: &'static str, ptr: NonNull<T>) -> Self {
        tracing::trace!(kind, ptr = ?ptr.as_ptr(), "handle attached");
        Self {
            ptr: AtomicPtr::new(ptr.as_ptr()),
            leases: Mutex::new(0),
            idle: Condvar::new(),
            kind,
        }
    }

    /// Creates a handle that does not own anything yet.
    pub fn vacant(kind: &'static str) -> Self {
        Self {
            ptr: AtomicPtr::new(ptr::null_mut()),
            leases: Mutex::new(0),
            idle: Condvar::new(),
            kind,
        }
    }

    /// Wraps the result of a native factory call.
    ///
    /// # Errors
    ///
    /// Returns the translated native error if `ptr` is null.
    pub(crate) fn from_native(
        kind: &'static str,
        ptr: *mut T,
        api: &csdl2_sys::Sdl2Api,
    ) -> Result<Self> {
        NonNull::new(ptr)
            .map(|ptr| Self::new(kind, ptr))
            .ok_or_else(|| Error::from_native(api))
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Returns `true` while the handle owns a pointer.
    pub fn is_valid(&self) -> bool {
        !self.ptr.load(Ordering::Acquire).is_null()
    }

    /// Fails with [`Error::InvalidHandle`] if the handle is empty.
    pub fn validate(&self) -> Result<()> {
        self.borrow_ptr().map(|_| ())
    }

    /// Returns the pointer without holding it.
    ///
    /// Nothing keeps the pointer valid once this returns; a concurrent
    /// [`detach`](Self::detach) may release it. Native calls go through
    /// [`lease`](Self::lease) instead.
    pub fn borrow_ptr(&self) -> Result<NonNull<T>> {
        NonNull::new(self.ptr.load(Ordering::Acquire)).ok_or(Error::InvalidHandle(self.kind))
    }

    /// Holds the pointer for the duration of one native call.
    ///
    /// While the lease lives, [`detach`](Self::detach) on another thread
    /// blocks instead of returning the pointer.
    pub fn lease(&self) -> Result<Lease<'_, T>> {
        let mut leases = lock(&self.leases);
        let ptr = self.borrow_ptr()?;
        *leases += 1;
        Ok(Lease { handle: self, ptr })
    }

    /// Takes the pointer out of the handle, leaving it empty.
    ///
    /// Returns once every outstanding [`Lease`] is dropped. The host lock is
    /// released while waiting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandle`] if the handle was already empty, so a
    /// second release attempt can never reach the native library.
    pub fn detach(&self) -> Result<NonNull<T>> {
        let (ptr, busy) = {
            let leases = lock(&self.leases);
            (self.ptr.swap(ptr::null_mut(), Ordering::AcqRel), *leases > 0)
        };
        let ptr = NonNull::new(ptr).ok_or(Error::InvalidHandle(self.kind))?;
        if busy {
            tracing::debug!(kind = self.kind, "waiting for in-flight native calls");
            allow_threads(|| {
                let mut leases = lock(&self.leases);
                while *leases > 0 {
                    leases = self
                        .idle
                        .wait(leases)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            });
        }
        tracing::trace!(kind = self.kind, ptr = ?ptr.as_ptr(), "handle detached");
        Ok(ptr)
    }

    /// Stores `ptr` in an empty handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Contract`] if the handle already owns a pointer.
    pub fn attach(&self, ptr: NonNull<T>) -> Result<()> {
        self.ptr
            .compare_exchange(
                ptr::null_mut(),
                ptr.as_ptr(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(|_| Error::Contract(format!("{} handle is already attached", self.kind)))
    }

    /// Forgets the pointer without releasing it.
    ///
    /// Used when the native side has already released the resource.
    pub fn invalidate(&self) {
        if !self.ptr.swap(ptr::null_mut(), Ordering::AcqRel).is_null() {
            tracing::trace!(kind = self.kind, "handle invalidated");
        }
    }
}

/// A pointer held out of a [`NativeHandle`] for one native call.
///
/// Dereferences to the pointer.
pub struct Lease<'a, T> {
    handle: &'a NativeHandle<T>,
    ptr: NonNull<T>,
}

impl<T> Deref for Lease<'_, T> {
    type Target = NonNull<T>;

    fn deref(&self) -> &NonNull<T> {
        &self.ptr
    }
}

impl<T> Drop for Lease<'_, T> {
    fn drop(&mut self) {
        let mut leases = lock(&self.handle.leases);
        *leases -= 1;
        if *leases == 0 {
            self.handle.idle.notify_all();
        }
    }
}

impl<T> std::fmt::Debug for Lease<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("kind", &self.handle.kind)
            .field("ptr", &self.ptr)
            .finish()
    }
}

impl<T> std::fmt::Debug for NativeHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeHandle")
            .field("kind", &self.kind)
            .field("ptr", &self.ptr.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detach_hands_out_the_pointer_once() {
        let mut value = 7u32;
        let handle = NativeHandle::new("u32", NonNull::from(&mut value));
        assert!(handle.is_valid());
        assert_eq!(handle.detach().unwrap().as_ptr(), &mut value as *mut u32);
        assert!(!handle.is_valid());
        assert_eq!(handle.detach(), Err(Error::InvalidHandle("u32")));
        assert_eq!(handle.borrow_ptr(), Err(Error::InvalidHandle("u32")));
    }

    #[test]
    fn attach_only_fills_an_empty_handle() {
        let mut a = 1u8;
        let mut b = 2u8;
        let handle = NativeHandle::vacant("u8");
        assert!(handle.validate().is_err());
        handle.attach(NonNull::from(&mut a)).unwrap();
        assert!(matches!(
            handle.attach(NonNull::from(&mut b)),
            Err(Error::Contract(_))
        ));
        handle.invalidate();
        handle.attach(NonNull::from(&mut b)).unwrap();
        assert_eq!(handle.borrow_ptr().unwrap().as_ptr(), &mut b as *mut u8);
    }

    #[test]
    fn concurrent_detach_has_one_winner() {
        let value = Box::into_raw(Box::new(0u64));
        let handle = std::sync::Arc::new(NativeHandle::new(
            "u64",
            NonNull::new(value).unwrap(),
        ));
        let winners: usize = (0..8)
            .map(|_| {
                let handle = handle.clone();
                std::thread::spawn(move || handle.detach().is_ok() as usize)
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|t| t.join().unwrap())
            .sum();
        assert_eq!(winners, 1);
        drop(unsafe { Box::from_raw(value) });
    }

    #[test]
    fn detach_waits_for_outstanding_leases() {
        let value = Box::into_raw(Box::new(5u64));
        let handle = std::sync::Arc::new(NativeHandle::new(
            "u64",
            NonNull::new(value).unwrap(),
        ));
        let lease = handle.lease().unwrap();
        let detacher = {
            let handle = handle.clone();
            std::thread::spawn(move || handle.detach().unwrap().as_ptr() as usize)
        };
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(!detacher.is_finished());
        assert_eq!(unsafe { *lease.as_ptr() }, 5);
        assert_eq!(handle.lease().unwrap_err(), Error::InvalidHandle("u64"));
        drop(lease);
        assert_eq!(detacher.join().unwrap() as *mut u64, value);
        drop(unsafe { Box::from_raw(value) });
    }
}
