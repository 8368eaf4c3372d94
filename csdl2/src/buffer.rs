// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

//! Zero-copy views over native or host memory with export counting.
//!
//! A [`BufferView`] exposes one contiguous memory range. Consumers obtain
//! access through exports: borrowed [`Export`]s for host code and owned
//! [`BufferPin`]s for native consumers. While any export is outstanding the
//! memory cannot be detached, resized, rebound or freed.

mod element;
mod export;

use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::{Arc, Mutex};

use csdl2_sys::Sdl2Api;

pub use element::{Element, ElementLayout};
pub use export::{BufferPin, DetachedBuffer, Export, ExportFlags};

use crate::api::Sdl2ApiHandle;
use crate::backlink::Backlink;
use crate::handle::NativeHandle;
use crate::host::lock;
use crate::{Error, Result};

const NOT_WRITABLE: &str = "Object is not writable.";
const PINNED_FOR_WRITING: &str = "buffer is pinned for writing by a native consumer";

/// How the memory of a view is released once nobody references it.
pub(crate) enum Release {
    /// Someone else owns the memory.
    Borrowed,
    /// A `Box<[E]>` created by [`BufferView::new`].
    Heap,
    /// Memory allocated by the native library.
    Native {
        api: Sdl2ApiHandle,
        free: unsafe fn(&Sdl2Api, *mut u8),
    },
}

impl Release {
    /// # Safety
    ///
    /// `ptr` and `len` must describe the allocation this release was made for,
    /// and the memory must not be used afterwards.
    pub(crate) unsafe fn release<E: Element>(&self, ptr: NonNull<u8>, len: usize) {
        match self {
            Release::Borrowed => {}
            Release::Heap => unsafe {
                drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                    ptr.as_ptr() as *mut E,
                    len,
                )));
            },
            Release::Native { api, free } => unsafe { free(api, ptr.as_ptr()) },
        }
    }
}

struct ViewState {
    len: usize,
    readers: usize,
    writer: bool,
    pins: usize,
    /// Pins through which a native consumer may write.
    write_pins: usize,
    release: Release,
}

impl ViewState {
    fn export_count(&self) -> usize {
        self.readers + self.writer as usize + self.pins
    }
}

/// What a successful export hands out.
pub(crate) struct Grant {
    ptr: NonNull<u8>,
    len: usize,
    writable: bool,
}

/// A zero-copy view over a memory range of `E` elements.
///
/// Views over native memory carry backlinks to the wrappers that own the
/// memory (a surface for its pixels, a palette for its colours). Once an owner
/// is released, every access fails with [`Error::InvalidHandle`] naming it.
///
/// # Examples
///
/// ```
/// use csdl2::{BufferView, Error, ExportFlags};
///
/// # fn main() -> Result<(), csdl2::Error> {
/// let buffer = BufferView::new(vec![1u8, 2, 3]);
/// let export = buffer.begin_export(ExportFlags::READ)?;
/// assert_eq!(export.as_slice(), &[1, 2, 3]);
///
/// // The memory cannot leave the view while it is exported.
/// assert!(matches!(buffer.detach_ownership(), Err(Error::Buffer(_))));
/// drop(export);
///
/// let detached = buffer.detach_ownership()?;
/// assert_eq!(detached.as_slice(), &[1, 2, 3]);
/// # Ok(())
/// # }
/// ```
pub struct BufferView<E: Element = u8> {
    kind: &'static str,
    base: NativeHandle<u8>,
    readonly: bool,
    links: Vec<Backlink>,
    _source: Option<BufferPin<u8>>,
    state: Mutex<ViewState>,
    _element: PhantomData<E>,
}

impl<E: Element> BufferView<E> {
    fn build(
        kind: &'static str,
        base: NativeHandle<u8>,
        len: usize,
        readonly: bool,
        links: Vec<Backlink>,
        source: Option<BufferPin<u8>>,
        release: Release,
    ) -> Arc<Self> {
        Arc::new(Self {
            kind,
            base,
            readonly,
            links,
            _source: source,
            state: Mutex::new(ViewState {
                len,
                readers: 0,
                writer: false,
                pins: 0,
                write_pins: 0,
                release,
            }),
            _element: PhantomData,
        })
    }

    fn heap(data: Vec<E>, readonly: bool) -> Arc<Self> {
        let len = data.len();
        let raw = Box::into_raw(data.into_boxed_slice()) as *mut E as *mut u8;
        let base = match NonNull::new(raw) {
            Some(ptr) => NativeHandle::new("buffer", ptr),
            None => NativeHandle::vacant("buffer"),
        };
        Self::build("buffer", base, len, readonly, Vec::new(), None, Release::Heap)
    }

    /// Creates a writable, resizable view owning `data`.
    pub fn new(data: Vec<E>) -> Arc<Self> {
        Self::heap(data, false)
    }

    /// Creates a read-only view owning `data`.
    pub fn new_readonly(data: Vec<E>) -> Arc<Self> {
        Self::heap(data, true)
    }

    /// A view over memory owned by the native resources behind `links`.
    pub(crate) fn native(
        kind: &'static str,
        ptr: NonNull<u8>,
        len: usize,
        readonly: bool,
        links: Vec<Backlink>,
    ) -> Arc<Self> {
        Self::build(
            kind,
            NativeHandle::new(kind, ptr),
            len,
            readonly,
            links,
            None,
            Release::Borrowed,
        )
    }

    /// A view that owns native memory and releases it with `free`.
    pub(crate) fn native_owned(
        kind: &'static str,
        ptr: NonNull<u8>,
        len: usize,
        api: Sdl2ApiHandle,
        free: unsafe fn(&Sdl2Api, *mut u8),
    ) -> Arc<Self> {
        Self::build(
            kind,
            NativeHandle::new(kind, ptr),
            len,
            false,
            Vec::new(),
            None,
            Release::Native { api, free },
        )
    }

    /// A view over host memory kept alive by `pin`.
    pub(crate) fn over_pin(
        kind: &'static str,
        pin: BufferPin<u8>,
        readonly: bool,
        links: Vec<Backlink>,
    ) -> Arc<Self> {
        let len = pin.nbytes() / E::LAYOUT.item_size;
        let base = NativeHandle::new(kind, pin.non_null());
        Self::build(kind, base, len, readonly, links, Some(pin), Release::Borrowed)
    }

    /// A view with no memory yet, bound later with [`rebind`](Self::rebind).
    pub(crate) fn unbound(kind: &'static str, links: Vec<Backlink>) -> Arc<Self> {
        Self::build(
            kind,
            NativeHandle::vacant(kind),
            0,
            false,
            links,
            None,
            Release::Borrowed,
        )
    }

    /// Builds an element-typed view over a byte buffer.
    ///
    /// The new view pins `source` for as long as it lives and inherits its
    /// read-only flag.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidHandle`] if `source` is no longer valid
    /// - [`Error::InvalidArg`] if the byte length is not a multiple of the
    ///   element size, or the memory is not aligned for `E`
    pub fn cast(source: &Arc<BufferView<u8>>) -> Result<Arc<Self>> {
        source.validate()?;
        let item_size = E::LAYOUT.item_size;
        let nbytes = source.nbytes();
        if nbytes % item_size != 0 {
            return Err(Error::InvalidArg(format!(
                "buffer of {nbytes} byte(s) is not a multiple of the element size {item_size}"
            )));
        }
        let flags = if source.is_readonly() {
            ExportFlags::READ
        } else {
            ExportFlags::WRITE
        };
        let pin = source.pin(flags)?;
        if (pin.as_ptr() as usize) % std::mem::align_of::<E>() != 0 {
            return Err(Error::InvalidArg(format!(
                "buffer is not aligned for \"{}\" elements",
                E::LAYOUT.format
            )));
        }
        let readonly = source.is_readonly();
        Ok(Self::over_pin(source.kind, pin, readonly, Vec::new()))
    }

    /// Fails with [`Error::InvalidHandle`] if the memory or one of its owners is gone.
    pub fn validate(&self) -> Result<()> {
        for link in &self.links {
            link.check()?;
        }
        self.base.validate()
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    fn grant(&self, flags: ExportFlags, pin: bool) -> Result<Grant> {
        let mut state = lock(&self.state);
        self.validate()?;
        let writable = flags.is_writable();
        if writable && self.readonly {
            return Err(Error::Buffer(NOT_WRITABLE.to_string()));
        }
        if state.writer {
            return Err(Error::Buffer("buffer is exported for writing".to_string()));
        }
        if !pin && writable && state.readers > 0 {
            return Err(Error::Buffer(
                "buffer is already exported and cannot be exported for writing".to_string(),
            ));
        }
        if !pin && writable && state.write_pins > 0 {
            return Err(Error::Buffer(PINNED_FOR_WRITING.to_string()));
        }
        let ptr = self.base.borrow_ptr()?;
        if pin {
            state.pins += 1;
            state.write_pins += writable as usize;
        } else if writable {
            state.writer = true;
        } else {
            state.readers += 1;
        }
        Ok(Grant {
            ptr,
            len: state.len,
            writable,
        })
    }

    pub(crate) fn revoke(&self, writable: bool, pin: bool) {
        let mut state = lock(&self.state);
        if pin {
            state.pins = state.pins.saturating_sub(1);
            if writable {
                state.write_pins = state.write_pins.saturating_sub(1);
            }
        } else if writable {
            state.writer = false;
        } else {
            state.readers = state.readers.saturating_sub(1);
        }
    }

    /// Exports the view to a consumer.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidHandle`] if the memory has been released
    /// - [`Error::Buffer`] if a write export is requested on a read-only view,
    ///   or the request conflicts with an outstanding export. A write export
    ///   conflicts with every reader, the writer and any write pin.
    pub fn begin_export(&self, flags: ExportFlags) -> Result<Export<'_, E>> {
        let grant = self.grant(flags, false)?;
        Ok(Export::new(self, grant))
    }

    /// Exports the view to a native consumer that keeps it alive.
    ///
    /// Pins of either kind coexist with each other and with host readers. A
    /// write pin keeps host code from exporting for writing or calling
    /// [`set`](Self::set), and no pin is granted while a host writer is out.
    pub fn pin(self: &Arc<Self>, flags: ExportFlags) -> Result<BufferPin<E>> {
        let grant = self.grant(flags, true)?;
        Ok(BufferPin::new(self.clone(), grant))
    }

    /// Number of live exports and pins.
    pub fn export_count(&self) -> usize {
        lock(&self.state).export_count()
    }

    /// Fails with [`Error::ExportLeak`] while any export is outstanding.
    pub fn verify_released(&self) -> Result<()> {
        match self.export_count() {
            0 => Ok(()),
            outstanding => Err(Error::ExportLeak { outstanding }),
        }
    }

    /// Reads one element.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidHandle`] if the memory has been released
    /// - [`Error::Buffer`] while a write export is outstanding
    /// - [`Error::IndexOutOfRange`] if `index` is past the end
    pub fn get(&self, index: usize) -> Result<E> {
        let state = lock(&self.state);
        self.validate()?;
        if state.writer {
            return Err(Error::Buffer("buffer is exported for writing".to_string()));
        }
        if index >= state.len {
            return Err(Error::IndexOutOfRange {
                index,
                len: state.len,
            });
        }
        let ptr = self.base.borrow_ptr()?.as_ptr() as *const E;
        Ok(unsafe { ptr.add(index).read_unaligned() })
    }

    /// Writes one element.
    ///
    /// # Errors
    ///
    /// As [`get`](Self::get), plus [`Error::Buffer`] if the view is read-only,
    /// exported to host code or pinned for writing.
    pub fn set(&self, index: usize, value: E) -> Result<()> {
        let state = lock(&self.state);
        self.validate()?;
        if self.readonly {
            return Err(Error::Buffer(NOT_WRITABLE.to_string()));
        }
        if state.readers > 0 || state.writer {
            return Err(Error::Buffer("buffer is exported".to_string()));
        }
        if state.write_pins > 0 {
            return Err(Error::Buffer(PINNED_FOR_WRITING.to_string()));
        }
        if index >= state.len {
            return Err(Error::IndexOutOfRange {
                index,
                len: state.len,
            });
        }
        let ptr = self.base.borrow_ptr()?.as_ptr() as *mut E;
        unsafe { ptr.add(index).write_unaligned(value) };
        Ok(())
    }

    /// Copies the elements out.
    pub fn to_vec(&self) -> Result<Vec<E>> {
        let export = self.begin_export(ExportFlags::READ)?;
        Ok(export.as_slice().to_vec())
    }

    /// Resizes a view created by [`new`](Self::new), filling with `value`.
    ///
    /// # Errors
    ///
    /// - [`Error::Buffer`] while exported, or if the view does not own
    ///   heap memory
    pub fn resize(&self, new_len: usize, value: E) -> Result<()> {
        let mut state = lock(&self.state);
        self.validate()?;
        if state.export_count() > 0 {
            return Err(Error::Buffer(
                "Existing exports of data: object cannot be re-sized".to_string(),
            ));
        }
        if !matches!(state.release, Release::Heap) || self.readonly {
            return Err(Error::Buffer("buffer cannot be re-sized".to_string()));
        }
        let ptr = self.base.detach()?;
        let mut data = unsafe {
            Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                ptr.as_ptr() as *mut E,
                state.len,
            ))
        }
        .into_vec();
        data.resize(new_len, value);
        let raw = Box::into_raw(data.into_boxed_slice()) as *mut E as *mut u8;
        state.len = new_len;
        match NonNull::new(raw) {
            Some(ptr) => self.base.attach(ptr),
            None => Err(Error::Contract("boxed slice returned null".to_string())),
        }
    }

    /// Appends elements to a view created by [`new`](Self::new).
    pub fn extend_from_slice(&self, items: &[E]) -> Result<()> {
        let start = self.len();
        let Some(&first) = items.first() else {
            return Ok(());
        };
        self.resize(start + items.len(), first)?;
        for (offset, item) in items.iter().enumerate().skip(1) {
            self.set(start + offset, *item)?;
        }
        Ok(())
    }

    /// Takes the memory out of the view.
    ///
    /// The view is left empty and invalid; the returned [`DetachedBuffer`]
    /// releases the memory when dropped.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidHandle`] if the memory was already released
    /// - [`Error::Buffer`] while any export is outstanding
    /// - [`Error::InvalidArg`] if the view does not own its memory
    pub fn detach_ownership(&self) -> Result<DetachedBuffer<E>> {
        let mut state = lock(&self.state);
        self.validate()?;
        if state.export_count() > 0 {
            return Err(Error::Buffer(
                "Existing exports of data: object cannot be detached".to_string(),
            ));
        }
        if matches!(state.release, Release::Borrowed) {
            return Err(Error::InvalidArg(
                "buffer does not own its memory".to_string(),
            ));
        }
        let ptr = self.base.detach()?;
        let release = std::mem::replace(&mut state.release, Release::Borrowed);
        let len = std::mem::take(&mut state.len);
        tracing::debug!(kind = self.kind, len, "buffer ownership detached");
        Ok(DetachedBuffer::new(ptr, len, release))
    }

    /// Points an unexported view at new memory.
    pub(crate) fn rebind(&self, ptr: NonNull<u8>, len: usize) -> Result<()> {
        let mut state = lock(&self.state);
        if state.export_count() > 0 {
            return Err(Error::Contract(format!(
                "{} rebound while exported",
                self.kind
            )));
        }
        self.base.attach(ptr)?;
        state.len = len;
        Ok(())
    }

    /// Forgets the memory of a borrowed view.
    pub(crate) fn unbind(&self) {
        let mut state = lock(&self.state);
        self.base.invalidate();
        state.len = 0;
    }

    /// Invalidates a borrowed view whose owner is about to free the memory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Contract`] if the view is still exported. Nothing is
    /// invalidated in that case.
    pub(crate) fn retire(&self) -> Result<()> {
        let mut state = lock(&self.state);
        let outstanding = state.export_count();
        if outstanding > 0 {
            return Err(Error::Contract(format!(
                "{} freed with {outstanding} outstanding export(s)",
                self.kind
            )));
        }
        self.base.invalidate();
        state.len = 0;
        Ok(())
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        lock(&self.state).len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size in bytes.
    pub fn nbytes(&self) -> usize {
        self.len() * E::LAYOUT.item_size
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    pub fn layout(&self) -> ElementLayout {
        E::LAYOUT
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

impl<E: Element> Drop for BufferView<E> {
    fn drop(&mut self) {
        let state = self
            .state
            .get_mut()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Ok(ptr) = self.base.detach() {
            unsafe { state.release.release::<E>(ptr, state.len) };
        }
    }
}

impl<E: Element> std::fmt::Debug for BufferView<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("BufferView")
            .field("kind", &self.kind)
            .field("format", &E::LAYOUT.format)
            .field("len", &state.len)
            .field("readonly", &self.readonly)
            .field("exports", &state.export_count())
            .finish()
    }
}
