// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::Arc;

use super::bridge::{self, DeviceContext, DeviceState, Dispatch};
use super::spec::AudioSpec;
use crate::api::Sdl2ApiHandle;
use crate::gc::Traverse;
use crate::host::{HostRef, allow_threads};
use crate::Result;

/// The legacy audio device (`SDL_OpenAudio`).
///
/// Only one can be open per process. The device is closed when this value is
/// dropped; closing waits for a running callback to return.
pub struct AudioDevice {
    context: Arc<DeviceContext>,
}

/// Keeps the audio callback from running until dropped (`SDL_LockAudio`).
#[must_use = "the audio callback is unblocked as soon as the guard is dropped"]
pub struct AudioLockGuard<'a> {
    device: &'a AudioDevice,
    // The native lock is owned by the locking thread.
    _not_send: PhantomData<*const ()>,
}

impl AudioDevice {
    pub(crate) fn open(api: Sdl2ApiHandle, desired: &AudioSpec) -> Result<(Self, AudioSpec)> {
        let (context, obtained) = bridge::open(api, desired)?;
        Ok((Self { context }, obtained))
    }

    pub fn state(&self) -> DeviceState {
        self.context.state()
    }

    pub fn is_open(&self) -> bool {
        self.context.validate().is_ok()
    }

    /// Pauses (`true`) or resumes (`false`) playback. Devices start paused.
    ///
    /// The native call waits for a running callback, so the host lock is
    /// released meanwhile.
    pub fn pause(&self, pause_on: bool) -> Result<()> {
        self.context.validate()?;
        let api = self.context.api().clone();
        allow_threads(|| unsafe { api.pause_audio(pause_on as _) });
        Ok(())
    }

    /// One of `SDL_AUDIO_STOPPED`, `SDL_AUDIO_PLAYING` or `SDL_AUDIO_PAUSED`.
    pub fn status(&self) -> csdl2_sys::AudioStatus {
        unsafe { self.context.api().get_audio_status() }
    }

    /// Blocks the audio callback until the returned guard is dropped.
    ///
    /// Waits for a running callback to finish. The host lock is released while
    /// waiting, since the callback needs it to complete.
    pub fn lock(&self) -> Result<AudioLockGuard<'_>> {
        self.context.validate()?;
        let api = self.context.api().clone();
        allow_threads(|| unsafe { api.lock_audio() });
        Ok(AudioLockGuard {
            device: self,
            _not_send: PhantomData,
        })
    }

    /// Runs the callback once over `stream`, as the device thread would.
    ///
    /// Returns [`Dispatch::Skipped`] without touching host code once the
    /// device is closing or closed.
    pub fn invoke(&self, stream: &mut [u8]) -> Dispatch {
        let len = stream.len();
        let stream = NonNull::new(stream.as_mut_ptr()).map(|ptr| (ptr, len));
        self.context.dispatch(stream)
    }

    /// Closes the device, stopping the callback thread.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidHandle`] if the device is already closed.
    pub fn close(&self) -> Result<()> {
        self.context.close()
    }
}

impl Drop for AudioLockGuard<'_> {
    fn drop(&mut self) {
        unsafe { self.device.context.api().unlock_audio() };
    }
}

impl Drop for AudioDevice {
    fn drop(&mut self) {
        if matches!(self.state(), DeviceState::Open | DeviceState::Opening)
            && let Err(error) = self.close()
        {
            tracing::error!("Failed to close audio device: {error}");
        }
    }
}

impl Traverse for AudioDevice {
    fn traverse(&self, visit: &mut dyn FnMut(&HostRef)) {
        self.context.traverse(visit);
    }

    fn clear(&self) {
        self.context.clear();
    }
}

impl std::fmt::Debug for AudioDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioDevice")
            .field("state", &self.state())
            .finish()
    }
}
