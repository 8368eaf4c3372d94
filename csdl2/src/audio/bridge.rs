// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

//! Re-entry from the native audio thread into host code.
//!
//! The device context is shared between the host and the native library: one
//! strong count is handed to the library as the callback's opaque pointer and
//! is reclaimed only after the native close call has returned. Every callback
//! takes the host lock and re-checks the device state before touching any
//! host object, since the device may be closing concurrently.

use std::os::raw::{c_int, c_void};
use std::panic::AssertUnwindSafe;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, Weak};

use super::spec::{AudioCallback, AudioSpec};
use crate::api::Sdl2ApiHandle;
use crate::backlink::WeakBacklinkRegistry;
use crate::buffer::BufferView;
use crate::handle::NativeHandle;
use crate::host::{self, HostRef, allow_threads, lock};
use crate::{Error, Result};

pub(crate) const DEVICE_KIND: &str = "audio device";

/// Lifecycle of an audio device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DeviceState {
    Closed = 0,
    Opening = 1,
    Open = 2,
    Closing = 3,
}

impl DeviceState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => DeviceState::Opening,
            2 => DeviceState::Open,
            3 => DeviceState::Closing,
            _ => DeviceState::Closed,
        }
    }
}

/// Outcome of one callback invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The host callback ran.
    Delivered,
    /// The device was closing, closed or had no callback; host code was not touched.
    Skipped,
}

#[derive(Default)]
struct HostRefs {
    callback: Option<AudioCallback>,
    userdata: Option<HostRef>,
}

pub(crate) struct DeviceContext {
    api: Sdl2ApiHandle,
    state: AtomicU8,
    context: NativeHandle<DeviceContext>,
    refs: Mutex<HostRefs>,
    view: Arc<BufferView>,
    registry: WeakBacklinkRegistry,
}

/// Binds the stream view to the native buffer for one callback.
///
/// Dropping the binding, on return or on unwind, checks that host code kept
/// no export and detaches the view from the buffer.
struct StreamBinding<'a> {
    view: &'a BufferView,
}

impl<'a> StreamBinding<'a> {
    fn bind(view: &'a BufferView, ptr: NonNull<u8>, len: usize) -> Result<Self> {
        view.rebind(ptr, len)?;
        Ok(Self { view })
    }
}

impl Drop for StreamBinding<'_> {
    fn drop(&mut self) {
        if let Err(error) = self.view.verify_released() {
            tracing::error!("{error}; the native buffer is about to be reused");
            std::process::abort();
        }
        self.view.unbind();
    }
}

/// The single legacy device. Check-and-set happens under the host lock.
static LEGACY_DEVICE: Mutex<Option<Weak<DeviceContext>>> = Mutex::new(None);

unsafe extern "C" fn audio_trampoline(userdata: *mut c_void, stream: *mut u8, len: c_int) {
    // Safety: the library holds a strong count on the context until
    // SDL_CloseAudio has returned.
    let Some(context) = (unsafe { (userdata as *const DeviceContext).as_ref() }) else {
        return;
    };
    let stream = NonNull::new(stream).map(|ptr| (ptr, len.max(0) as usize));
    if std::panic::catch_unwind(AssertUnwindSafe(|| context.dispatch(stream))).is_err() {
        tracing::error!("audio callback panicked");
    }
}

impl DeviceContext {
    pub(crate) fn state(&self) -> DeviceState {
        DeviceState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: DeviceState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Fails with [`Error::InvalidHandle`] unless the device is open.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.state() == DeviceState::Open && self.context.is_valid() {
            Ok(())
        } else {
            Err(Error::InvalidHandle(DEVICE_KIND))
        }
    }

    pub(crate) fn api(&self) -> &Sdl2ApiHandle {
        &self.api
    }

    /// Runs one callback invocation over `stream`.
    pub(crate) fn dispatch(&self, stream: Option<(NonNull<u8>, usize)>) -> Dispatch {
        let _host = host::acquire();
        let live = matches!(self.state(), DeviceState::Opening | DeviceState::Open)
            && self.context.is_valid();
        let (callback, userdata) = {
            let refs = lock(&self.refs);
            (refs.callback.clone(), refs.userdata.clone())
        };
        let (Some(callback), Some((ptr, len)), true) = (callback, stream, live) else {
            host::clear_pending_error();
            return Dispatch::Skipped;
        };
        let binding = match StreamBinding::bind(&self.view, ptr, len) {
            Ok(binding) => binding,
            Err(error) => {
                tracing::error!("Failed to bind audio stream: {error}");
                host::clear_pending_error();
                return Dispatch::Skipped;
            }
        };

        if let Err(error) = callback.call(userdata.as_ref(), &self.view, len) {
            tracing::error!("Exception in audio callback: {error}");
        }
        if let Some(error) = host::take_pending_error() {
            tracing::error!("Exception in audio callback: {error}");
        }

        drop(binding);
        Dispatch::Delivered
    }

    pub(crate) fn traverse(&self, visit: &mut dyn FnMut(&HostRef)) {
        let refs = lock(&self.refs);
        if let Some(callback) = refs.callback.as_ref() {
            visit(&callback.host_ref());
        }
        if let Some(userdata) = refs.userdata.as_ref() {
            visit(userdata);
        }
    }

    pub(crate) fn clear(&self) {
        let refs = std::mem::take(&mut *lock(&self.refs));
        drop(refs);
    }

    /// Closes the device. Safe to race with callbacks on the native thread.
    pub(crate) fn close(self: &Arc<Self>) -> Result<()> {
        let _host = host::acquire();
        let previous = self.state();
        if !matches!(previous, DeviceState::Open | DeviceState::Opening)
            || self
                .state
                .compare_exchange(
                    previous as u8,
                    DeviceState::Closing as u8,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_err()
        {
            return Err(Error::InvalidHandle(DEVICE_KIND));
        }
        let context = self.context.detach()?;
        self.clear();
        self.registry.release_all();

        let api = self.api.clone();
        allow_threads(|| unsafe { api.close_audio() });
        // Safety: this is the count leaked to the library in `open`.
        drop(unsafe { Arc::from_raw(context.as_ptr() as *const DeviceContext) });

        let mut slot = lock(&LEGACY_DEVICE);
        if slot.as_ref().is_some_and(|weak| weak.as_ptr() == Arc::as_ptr(self)) {
            *slot = None;
        }
        self.set_state(DeviceState::Closed);
        tracing::debug!("closed audio device");
        Ok(())
    }
}

/// Opens the legacy audio device.
///
/// Returns the device context and the obtained spec.
pub(crate) fn open(
    api: Sdl2ApiHandle,
    desired: &AudioSpec,
) -> Result<(Arc<DeviceContext>, AudioSpec)> {
    let _host = host::acquire();
    let registry = WeakBacklinkRegistry::new(DEVICE_KIND);
    let view = BufferView::unbound("audio stream", vec![registry.register()]);
    let context = Arc::new(DeviceContext {
        api: api.clone(),
        state: AtomicU8::new(DeviceState::Opening as u8),
        context: NativeHandle::vacant("SDL_AudioCallback userdata"),
        refs: Mutex::new(HostRefs {
            callback: desired.callback.clone(),
            userdata: desired.userdata.clone(),
        }),
        view,
        registry,
    });
    {
        let mut slot = lock(&LEGACY_DEVICE);
        if slot
            .as_ref()
            .and_then(Weak::upgrade)
            .is_some_and(|device| device.state() != DeviceState::Closed)
        {
            context.set_state(DeviceState::Closed);
            return Err(Error::DeviceBusy);
        }
        *slot = Some(Arc::downgrade(&context));
    }

    let shared = NonNull::new(Arc::into_raw(context.clone()) as *mut DeviceContext)
        .ok_or_else(|| Error::Contract("Arc::into_raw returned null".to_string()))?;
    context.context.attach(shared)?;

    let mut native = desired.to_native();
    if desired.callback.is_some() {
        native.callback = Some(audio_trampoline);
        native.userdata = shared.as_ptr() as *mut c_void;
    }
    let mut obtained = csdl2_sys::AudioSpec::default();
    let status = allow_threads(|| unsafe { api.open_audio(&mut native, &mut obtained) });
    if status < 0 {
        let error = Error::from_native(&api);
        context.context.invalidate();
        context.clear();
        context.registry.release_all();
        drop(unsafe { Arc::from_raw(shared.as_ptr() as *const DeviceContext) });
        context.set_state(DeviceState::Closed);
        let mut slot = lock(&LEGACY_DEVICE);
        if slot.as_ref().is_some_and(|weak| weak.as_ptr() == Arc::as_ptr(&context)) {
            *slot = None;
        }
        return Err(error);
    }
    context.set_state(DeviceState::Open);
    tracing::debug!(
        freq = obtained.freq,
        format = obtained.format,
        channels = obtained.channels,
        "opened audio device"
    );
    Ok((context, desired.with_native(&obtained)))
}
