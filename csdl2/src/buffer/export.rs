// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

//! RAII exports of a [`BufferView`].

use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::Arc;

use super::{BufferView, Element, Grant, Release};
use crate::{Error, Result};

/// Access requested by an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportFlags {
    writable: bool,
}

impl ExportFlags {
    /// Read-only access. Any number of readers may coexist.
    pub const READ: ExportFlags = ExportFlags { writable: false };
    /// Read-write access. Exclusive with every other reader and writer.
    pub const WRITE: ExportFlags = ExportFlags { writable: true };

    pub fn is_writable(self) -> bool {
        self.writable
    }
}

/// A live export of a [`BufferView`].
///
/// The export borrows the view, so it cannot outlive it. Dropping the export
/// (or calling [`end`](Self::end)) decrements the view's export count.
///
/// # Examples
///
/// ```
/// use csdl2::{BufferView, ExportFlags};
///
/// # fn main() -> Result<(), csdl2::Error> {
/// let buffer = BufferView::new(vec![0u8; 4]);
/// let mut export = buffer.begin_export(ExportFlags::WRITE)?;
/// export.as_mut_slice()?.copy_from_slice(b"abcd");
/// assert_eq!(buffer.export_count(), 1);
/// export.end();
/// assert_eq!(buffer.export_count(), 0);
/// # Ok(())
/// # }
/// ```
#[must_use = "the export ends as soon as it is dropped"]
pub struct Export<'a, E: Element = u8> {
    view: &'a BufferView<E>,
    ptr: NonNull<u8>,
    len: usize,
    writable: bool,
}

impl<'a, E: Element> Export<'a, E> {
    pub(super) fn new(view: &'a BufferView<E>, grant: Grant) -> Self {
        Self {
            view,
            ptr: grant.ptr,
            len: grant.len,
            writable: grant.writable,
        }
    }

    /// Number of elements visible through the export.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn nbytes(&self) -> usize {
        self.len * E::LAYOUT.item_size
    }

    pub fn is_readonly(&self) -> bool {
        !self.writable
    }

    pub fn as_ptr(&self) -> *const E {
        self.ptr.as_ptr() as *const E
    }

    pub fn as_slice(&self) -> &[E] {
        if self.len == 0 {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr() as *const E, self.len) }
    }

    /// Mutable access to the exported elements.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Buffer`] if the export was requested read-only.
    pub fn as_mut_slice(&mut self) -> Result<&mut [E]> {
        if !self.writable {
            return Err(Error::Buffer("export is read-only".to_string()));
        }
        if self.len == 0 {
            return Ok(&mut []);
        }
        Ok(unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr() as *mut E, self.len) })
    }

    /// Ends the export explicitly.
    pub fn end(self) {}
}

impl<E: Element> std::fmt::Debug for Export<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Export")
            .field("kind", &self.view.kind())
            .field("len", &self.len)
            .field("writable", &self.writable)
            .finish()
    }
}

impl<E: Element> Drop for Export<'_, E> {
    fn drop(&mut self) {
        self.view.revoke(self.writable, false);
    }
}

/// An export that owns a strong reference to its view.
///
/// Pins are what native consumers hold: a surface built over host pixels, a
/// memory stream over a host buffer, a typed view cast from a byte buffer.
/// They count towards the export count (so the view cannot be resized,
/// detached or freed) and expose only a raw pointer. A writable pin counts as
/// a writer against host write exports; read exports stay available.
pub struct BufferPin<E: Element = u8> {
    view: Arc<BufferView<E>>,
    ptr: NonNull<u8>,
    len: usize,
    writable: bool,
}

// Safety: the pin only carries the address of memory the pinned view keeps
// alive; the view itself is Send + Sync.
unsafe impl<E: Element> Send for BufferPin<E> {}
unsafe impl<E: Element> Sync for BufferPin<E> {}

impl<E: Element> BufferPin<E> {
    pub(super) fn new(view: Arc<BufferView<E>>, grant: Grant) -> Self {
        Self {
            view,
            ptr: grant.ptr,
            len: grant.len,
            writable: grant.writable,
        }
    }

    pub fn view(&self) -> &Arc<BufferView<E>> {
        &self.view
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub(crate) fn non_null(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Number of elements pinned.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn nbytes(&self) -> usize {
        self.len * E::LAYOUT.item_size
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }
}

impl<E: Element> Drop for BufferPin<E> {
    fn drop(&mut self) {
        self.view.revoke(self.writable, true);
    }
}

impl<E: Element> std::fmt::Debug for BufferPin<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPin")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .field("writable", &self.writable)
            .finish()
    }
}

/// Memory taken out of a [`BufferView`] by [`BufferView::detach_ownership`].
///
/// The caller now owns the memory; it is released with the routine that
/// matches its allocator when this value is dropped.
pub struct DetachedBuffer<E: Element = u8> {
    ptr: NonNull<u8>,
    len: usize,
    release: Release,
    _element: PhantomData<E>,
}

// Safety: the memory is uniquely owned by this value.
unsafe impl<E: Element> Send for DetachedBuffer<E> {}

impl<E: Element> DetachedBuffer<E> {
    pub(super) fn new(ptr: NonNull<u8>, len: usize, release: Release) -> Self {
        Self {
            ptr,
            len,
            release,
            _element: PhantomData,
        }
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn nbytes(&self) -> usize {
        self.len * E::LAYOUT.item_size
    }

    pub fn as_slice(&self) -> &[E] {
        if self.len == 0 {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr() as *const E, self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [E] {
        if self.len == 0 {
            return &mut [];
        }
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr() as *mut E, self.len) }
    }
}

impl<E: Element> std::fmt::Debug for DetachedBuffer<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetachedBuffer")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}

impl<E: Element> Drop for DetachedBuffer<E> {
    fn drop(&mut self) {
        unsafe { self.release.release::<E>(self.ptr, self.len) };
    }
}
