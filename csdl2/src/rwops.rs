// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

//! Read/write streams (`SDL_RWops`).
//!
//! A stream is driven through the five callbacks stored in the native struct.
//! [`RwMethod`] captures one of those callbacks so it can be invoked (or
//! installed on another stream) from host code; invoking it checks that the
//! stream still holds the same callback.

use std::ffi::CString;
use std::os::raw::{c_int, c_void};
use std::path::Path;
use std::ptr::NonNull;
use std::sync::{Arc, Mutex};

use csdl2_sys::{
    RWops, RWopsCloseFn, RWopsReadFn, RWopsSeekFn, RWopsSizeFn, RWopsWriteFn, Sdl2Api,
};

use crate::api::Sdl2ApiHandle;
use crate::buffer::{BufferPin, BufferView, ExportFlags};
use crate::handle::{Lease, NativeHandle};
use crate::host::{allow_threads, lock};
use crate::{Error, Result};

const KIND: &str = "SDL_RWops";
const MIX_ERROR: &str = "do not mix different SDL_RWops and callback instances";

/// One of the five callback slots of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RwSlot {
    Size,
    Seek,
    Read,
    Write,
    Close,
}

#[derive(Clone, Copy)]
enum RwCallback {
    Size(RWopsSizeFn),
    Seek(RWopsSeekFn),
    Read(RWopsReadFn),
    Write(RWopsWriteFn),
    Close(RWopsCloseFn),
}

impl RwCallback {
    fn slot(self) -> RwSlot {
        match self {
            RwCallback::Size(_) => RwSlot::Size,
            RwCallback::Seek(_) => RwSlot::Seek,
            RwCallback::Read(_) => RwSlot::Read,
            RwCallback::Write(_) => RwSlot::Write,
            RwCallback::Close(_) => RwSlot::Close,
        }
    }

    unsafe fn load(rw: *const RWops, slot: RwSlot) -> Option<Self> {
        let rw = unsafe { &*rw };
        match slot {
            RwSlot::Size => rw.size.map(RwCallback::Size),
            RwSlot::Seek => rw.seek.map(RwCallback::Seek),
            RwSlot::Read => rw.read.map(RwCallback::Read),
            RwSlot::Write => rw.write.map(RwCallback::Write),
            RwSlot::Close => rw.close.map(RwCallback::Close),
        }
    }

    unsafe fn store(self, rw: *mut RWops) {
        let rw = unsafe { &mut *rw };
        match self {
            RwCallback::Size(f) => rw.size = Some(f),
            RwCallback::Seek(f) => rw.seek = Some(f),
            RwCallback::Read(f) => rw.read = Some(f),
            RwCallback::Write(f) => rw.write = Some(f),
            RwCallback::Close(f) => rw.close = Some(f),
        }
    }

    fn same_as(self, other: Option<RwCallback>) -> bool {
        use std::ptr::fn_addr_eq;
        match (self, other) {
            (RwCallback::Size(a), Some(RwCallback::Size(b))) => fn_addr_eq(a, b),
            (RwCallback::Seek(a), Some(RwCallback::Seek(b))) => fn_addr_eq(a, b),
            (RwCallback::Read(a), Some(RwCallback::Read(b))) => fn_addr_eq(a, b),
            (RwCallback::Write(a), Some(RwCallback::Write(b))) => fn_addr_eq(a, b),
            (RwCallback::Close(a), Some(RwCallback::Close(b))) => fn_addr_eq(a, b),
            _ => false,
        }
    }
}

struct RwOpsInner {
    api: Sdl2ApiHandle,
    handle: NativeHandle<RWops>,
    source: Mutex<Option<BufferPin>>,
}

/// A native read/write stream.
///
/// Cloning the wrapper shares the same stream. The stream is closed with its
/// own close callback when the last clone is dropped, unless it was closed,
/// freed or handed over to the native library before.
#[derive(Clone)]
pub struct RwOps {
    inner: Arc<RwOpsInner>,
}

impl RwOps {
    fn wrap(api: Sdl2ApiHandle, handle: NativeHandle<RWops>, source: Option<BufferPin>) -> Self {
        Self {
            inner: Arc::new(RwOpsInner {
                api,
                handle,
                source: Mutex::new(source),
            }),
        }
    }

    /// Takes ownership of a stream created elsewhere.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live stream from the same library as `api`, and nobody
    /// else may free it.
    pub unsafe fn from_raw(api: Sdl2ApiHandle, ptr: NonNull<RWops>) -> Self {
        Self::wrap(api, NativeHandle::new(KIND, ptr), None)
    }

    pub(crate) fn alloc(api: Sdl2ApiHandle) -> Result<Self> {
        let raw = unsafe { api.alloc_rw() };
        let handle = NativeHandle::from_native(KIND, raw, &api)?;
        // SDL_AllocRW leaves the callbacks uninitialised.
        unsafe {
            let rw = &mut *handle.borrow_ptr()?.as_ptr();
            rw.size = None;
            rw.seek = None;
            rw.read = None;
            rw.write = None;
            rw.close = None;
        }
        Ok(Self::wrap(api, handle, None))
    }

    pub(crate) fn from_file(api: Sdl2ApiHandle, path: &Path, mode: &str) -> Result<Self> {
        let file = CString::new(path.to_string_lossy().as_bytes())?;
        let mode = CString::new(mode)?;
        let raw = allow_threads(|| unsafe { api.rw_from_file(file.as_ptr(), mode.as_ptr()) });
        let handle = NativeHandle::from_native(KIND, raw, &api)?;
        tracing::debug!(path = %path.display(), "opened file stream");
        Ok(Self::wrap(api, handle, None))
    }

    pub(crate) fn from_mem(
        api: Sdl2ApiHandle,
        buffer: &Arc<BufferView>,
        writable: bool,
    ) -> Result<Self> {
        let flags = if writable {
            ExportFlags::WRITE
        } else {
            ExportFlags::READ
        };
        let pin = buffer.pin(flags)?;
        let size = c_int::try_from(pin.len())
            .map_err(|_| Error::InvalidArg("buffer is too large for a stream".to_string()))?;
        let raw = unsafe {
            if writable {
                api.rw_from_mem(pin.as_ptr() as *mut c_void, size)
            } else {
                api.rw_from_const_mem(pin.as_ptr() as *const c_void, size)
            }
        };
        let handle = NativeHandle::from_native(KIND, raw, &api)?;
        Ok(Self::wrap(api, handle, Some(pin)))
    }

    fn api(&self) -> &Sdl2Api {
        &self.inner.api
    }

    pub fn is_valid(&self) -> bool {
        self.inner.handle.is_valid()
    }

    /// Returns the stream pointer without holding it open.
    pub fn borrow_ptr(&self) -> Result<NonNull<RWops>> {
        self.inner.handle.borrow_ptr()
    }

    /// Keeps the stream from being closed or freed until the lease is dropped.
    pub(crate) fn lease(&self) -> Result<Lease<'_, RWops>> {
        self.inner.handle.lease()
    }

    /// The stream's type tag (`SDL_RWOPS_*`).
    pub fn type_(&self) -> Result<u32> {
        let rw = self.lease()?;
        Ok(unsafe { rw.as_ref().type_ })
    }

    pub fn set_type(&self, type_: u32) -> Result<()> {
        let rw = self.lease()?;
        unsafe { (*rw.as_ptr()).type_ = type_ };
        Ok(())
    }

    /// Captures the callback currently installed in `slot`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidHandle`] if the stream is closed
    /// - [`Error::InvalidArg`] if the slot is empty
    pub fn method(&self, slot: RwSlot) -> Result<RwMethod> {
        let rw = self.lease()?;
        unsafe { RwCallback::load(rw.as_ptr(), slot) }
            .map(|callback| RwMethod { callback })
            .ok_or_else(|| Error::InvalidArg(format!("stream has no {slot:?} callback")))
    }

    /// Installs a captured callback in its slot.
    pub fn set_method(&self, method: &RwMethod) -> Result<()> {
        let rw = self.lease()?;
        unsafe { method.callback.store(rw.as_ptr()) };
        Ok(())
    }

    /// Size of the stream in bytes.
    pub fn size(&self) -> Result<i64> {
        self.method(RwSlot::Size)?.size(self)
    }

    /// Seeks to `offset` relative to `whence` (`RW_SEEK_*`) and returns the new position.
    pub fn seek(&self, offset: i64, whence: c_int) -> Result<i64> {
        self.method(RwSlot::Seek)?.seek(self, offset, whence)
    }

    pub fn tell(&self) -> Result<i64> {
        self.seek(0, csdl2_sys::RW_SEEK_CUR)
    }

    /// Reads up to `maxnum` objects of `size` bytes into `dst`.
    ///
    /// Returns the number of objects read; `0` at end of stream.
    ///
    /// # Errors
    ///
    /// - [`Error::Buffer`] if `dst` is read-only, exported, or shorter than
    ///   `size * maxnum` bytes
    /// - [`Error::StreamIo`] if the stream reports a read error
    pub fn read(&self, dst: &BufferView, size: usize, maxnum: usize) -> Result<usize> {
        self.method(RwSlot::Read)?.read(self, dst, size, maxnum)
    }

    /// Writes `num` objects of `size` bytes from `src`.
    pub fn write(&self, src: &BufferView, size: usize, num: usize) -> Result<usize> {
        self.method(RwSlot::Write)?.write(self, src, size, num)
    }

    /// Closes the stream with its close callback.
    ///
    /// The handle is detached first, so the stream is invalid afterwards even
    /// if the close callback reports an error. Calls already running on other
    /// threads finish before the callback runs.
    pub fn close(&self) -> Result<()> {
        let ptr = self.inner.handle.detach()?;
        self.close_detached(ptr)
    }

    fn close_detached(&self, ptr: NonNull<RWops>) -> Result<()> {
        let close = unsafe { ptr.as_ref().close };
        let api = self.api();
        let result = match close {
            Some(close) => {
                unsafe { api.clear_error() };
                let status = allow_threads(|| unsafe { close(ptr.as_ptr()) });
                Error::from_status(api, status)
            }
            None => {
                unsafe { api.free_rw(ptr.as_ptr()) };
                Ok(())
            }
        };
        lock(&self.inner.source).take();
        result
    }

    /// Releases the native struct without calling the close callback.
    pub fn free(&self) -> Result<()> {
        let ptr = self.inner.handle.detach()?;
        unsafe { self.api().free_rw(ptr.as_ptr()) };
        lock(&self.inner.source).take();
        Ok(())
    }

    /// Hands the stream over to a native call that closes it.
    ///
    /// The returned pin (if any) must outlive that call.
    pub(crate) fn surrender(&self) -> Result<(NonNull<RWops>, Option<BufferPin>)> {
        let ptr = self.inner.handle.detach()?;
        Ok((ptr, lock(&self.inner.source).take()))
    }

    fn check_slot(&self, callback: RwCallback) -> Result<Lease<'_, RWops>> {
        let rw = self.lease()?;
        let current = unsafe { RwCallback::load(rw.as_ptr(), callback.slot()) };
        if callback.same_as(current) {
            Ok(rw)
        } else {
            Err(Error::InvalidArg(MIX_ERROR.to_string()))
        }
    }
}

impl Drop for RwOpsInner {
    fn drop(&mut self) {
        let Ok(ptr) = self.handle.detach() else {
            return;
        };
        unsafe {
            match ptr.as_ref().close {
                Some(close) => {
                    if close(ptr.as_ptr()) < 0 {
                        let error = Error::from_native(&self.api);
                        tracing::error!("Failed to close stream: {error}");
                    }
                }
                None => self.api.free_rw(ptr.as_ptr()),
            }
        }
    }
}

impl std::fmt::Debug for RwOps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RwOps")
            .field("handle", &self.inner.handle)
            .finish_non_exhaustive()
    }
}

/// A stream callback captured from one stream's callback slot.
#[derive(Clone, Copy)]
pub struct RwMethod {
    callback: RwCallback,
}

impl RwMethod {
    pub fn slot(&self) -> RwSlot {
        self.callback.slot()
    }

    fn wrong_slot(&self, wanted: RwSlot) -> Error {
        Error::InvalidArg(format!(
            "{:?} callback invoked as a {wanted:?} callback",
            self.slot()
        ))
    }

    pub fn size(&self, rw: &RwOps) -> Result<i64> {
        let RwCallback::Size(f) = self.callback else {
            return Err(self.wrong_slot(RwSlot::Size));
        };
        let ptr = rw.check_slot(self.callback)?;
        let api = rw.api();
        unsafe { api.clear_error() };
        let size = unsafe { f(ptr.as_ptr()) };
        if size < 0 {
            return Err(Error::from_native(api));
        }
        Ok(size)
    }

    pub fn seek(&self, rw: &RwOps, offset: i64, whence: c_int) -> Result<i64> {
        let RwCallback::Seek(f) = self.callback else {
            return Err(self.wrong_slot(RwSlot::Seek));
        };
        let ptr = rw.check_slot(self.callback)?;
        let api = rw.api();
        unsafe { api.clear_error() };
        let position = allow_threads(|| unsafe { f(ptr.as_ptr(), offset, whence) });
        if position < 0 {
            return Err(Error::from_native(api));
        }
        Ok(position)
    }

    pub fn read(&self, rw: &RwOps, dst: &BufferView, size: usize, maxnum: usize) -> Result<usize> {
        let RwCallback::Read(f) = self.callback else {
            return Err(self.wrong_slot(RwSlot::Read));
        };
        let ptr = rw.check_slot(self.callback)?;
        let total = size
            .checked_mul(maxnum)
            .ok_or_else(|| Error::InvalidArg("size * maxnum overflows".to_string()))?;
        let mut export = dst.begin_export(ExportFlags::WRITE)?;
        if total > export.nbytes() {
            return Err(Error::Buffer(format!(
                "buffer of {} byte(s) is too small for {total} byte(s)",
                export.nbytes()
            )));
        }
        let target = export.as_mut_slice()?.as_mut_ptr() as *mut c_void;
        let api = rw.api();
        unsafe { api.clear_error() };
        let count = allow_threads(|| unsafe { f(ptr.as_ptr(), target, size, maxnum) });
        export.end();
        if count == 0 && native_error_pending(api) {
            return Err(Error::from_native(api));
        }
        Ok(count)
    }

    pub fn write(&self, rw: &RwOps, src: &BufferView, size: usize, num: usize) -> Result<usize> {
        let RwCallback::Write(f) = self.callback else {
            return Err(self.wrong_slot(RwSlot::Write));
        };
        let ptr = rw.check_slot(self.callback)?;
        let total = size
            .checked_mul(num)
            .ok_or_else(|| Error::InvalidArg("size * num overflows".to_string()))?;
        let export = src.begin_export(ExportFlags::READ)?;
        if total > export.nbytes() {
            return Err(Error::Buffer(format!(
                "buffer of {} byte(s) is too small for {total} byte(s)",
                export.nbytes()
            )));
        }
        let source = export.as_ptr() as *const c_void;
        let api = rw.api();
        unsafe { api.clear_error() };
        let count = allow_threads(|| unsafe { f(ptr.as_ptr(), source, size, num) });
        export.end();
        if count < num && native_error_pending(api) {
            return Err(Error::from_native(api));
        }
        Ok(count)
    }

    /// Closes `rw` through this callback. The stream is invalid afterwards.
    pub fn close(&self, rw: &RwOps) -> Result<()> {
        let RwCallback::Close(_) = self.callback else {
            return Err(self.wrong_slot(RwSlot::Close));
        };
        drop(rw.check_slot(self.callback)?);
        rw.close()
    }
}

impl std::fmt::Debug for RwMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RwMethod")
            .field("slot", &self.slot())
            .finish()
    }
}

fn native_error_pending(api: &Sdl2Api) -> bool {
    let message = unsafe { api.get_error() };
    !message.is_null() && unsafe { *message } != 0
}

#[cfg(all(test, feature = "soft"))]
mod tests {
    use super::*;
    use crate::api::soft_api;

    #[test]
    fn const_memory_stream_reads_and_refuses_writes() {
        let api = soft_api();
        let source = BufferView::new(b"hello world".to_vec());
        let rw = RwOps::from_mem(api, &source, false).unwrap();
        assert_eq!(rw.type_().unwrap(), csdl2_sys::SDL_RWOPS_MEMORY_RO);
        assert_eq!(rw.size().unwrap(), 11);
        assert_eq!(source.export_count(), 1);

        let dst = BufferView::new(vec![0u8; 5]);
        assert_eq!(rw.read(&dst, 1, 5).unwrap(), 5);
        assert_eq!(dst.to_vec().unwrap(), b"hello");
        assert_eq!(
            rw.write(&dst, 1, 5).unwrap_err(),
            Error::Native("Can't write to read-only memory".to_string())
        );

        rw.close().unwrap();
        assert_eq!(source.export_count(), 0);
        assert_eq!(rw.size().unwrap_err(), Error::InvalidHandle(KIND));
        assert_eq!(rw.close().unwrap_err(), Error::InvalidHandle(KIND));
    }

    #[test]
    fn read_checks_destination_size() {
        let api = soft_api();
        let source = BufferView::new(vec![7u8; 8]);
        let rw = RwOps::from_mem(api, &source, true).unwrap();
        let small = BufferView::new(vec![0u8; 4]);
        assert!(matches!(rw.read(&small, 4, 2), Err(Error::Buffer(_))));
        let readonly = BufferView::new_readonly(vec![0u8; 8]);
        assert!(matches!(rw.read(&readonly, 1, 8), Err(Error::Buffer(_))));
    }

    #[test]
    fn methods_refuse_foreign_streams() {
        let api = soft_api();
        let data = BufferView::new(vec![0u8; 4]);
        let memory = RwOps::from_mem(api.clone(), &data, true).unwrap();
        let blank = RwOps::alloc(api).unwrap();
        assert!(matches!(blank.size(), Err(Error::InvalidArg(_))));

        let size = memory.method(RwSlot::Size).unwrap();
        assert_eq!(size.size(&memory).unwrap(), 4);
        assert_eq!(
            size.size(&blank).unwrap_err(),
            Error::InvalidArg(MIX_ERROR.to_string())
        );
        assert!(matches!(size.seek(&memory, 0, 0), Err(Error::InvalidArg(_))));

        blank.set_method(&size).unwrap();
        assert_eq!(blank.method(RwSlot::Size).unwrap().slot(), RwSlot::Size);
        blank.free().unwrap();
        assert!(!blank.is_valid());
    }
}
