// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

use std::ptr::{self, NonNull};
use std::sync::Arc;

use csdl2_sys::Sdl2Api;

use super::spec::AudioSpec;
use crate::api::Sdl2ApiHandle;
use crate::buffer::{BufferView, DetachedBuffer};
use crate::host::allow_threads;
use crate::rwops::RwOps;
use crate::{Error, Result};

const WAV_KIND: &str = "WAV buffer";

unsafe fn free_wav(api: &Sdl2Api, ptr: *mut u8) {
    unsafe { api.free_wav(ptr) };
}

/// Sample data returned by [`load_wav`], released with `SDL_FreeWAV`.
#[derive(Debug, Clone)]
pub struct WavBuffer {
    view: Arc<BufferView>,
}

impl WavBuffer {
    /// The samples as a writable byte view.
    pub fn view(&self) -> &Arc<BufferView> {
        &self.view
    }

    pub fn len(&self) -> usize {
        self.view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }

    /// Releases the samples now instead of when the last view is dropped.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidHandle`] if the samples were already released
    /// - [`Error::Buffer`] while the view is exported
    pub fn free(&self) -> Result<()> {
        drop(self.view.detach_ownership()?);
        Ok(())
    }

    /// Moves the samples out of the view. The view is invalid afterwards.
    pub fn detach_ownership(&self) -> Result<DetachedBuffer> {
        self.view.detach_ownership()
    }
}

/// Loads a WAVE file from `src`.
///
/// With `freesrc` the stream is handed to the native loader, which closes it
/// whether or not loading succeeds; `src` is invalid afterwards.
///
/// # Errors
///
/// - [`Error::InvalidHandle`] if `src` was already closed
/// - the translated native error if the data is not a supported WAVE file
pub(crate) fn load_wav(
    api: Sdl2ApiHandle,
    src: &RwOps,
    freesrc: bool,
) -> Result<(AudioSpec, WavBuffer)> {
    let mut lease = None;
    let (rw, pin) = if freesrc {
        src.surrender()?
    } else {
        let held = src.lease()?;
        let rw = *held;
        lease = Some(held);
        (rw, None)
    };

    let mut spec = csdl2_sys::AudioSpec::default();
    let mut audio_buf: *mut u8 = ptr::null_mut();
    let mut audio_len: u32 = 0;
    let loaded = allow_threads(|| unsafe {
        api.load_wav_rw(
            rw.as_ptr(),
            freesrc as _,
            &mut spec,
            &mut audio_buf,
            &mut audio_len,
        )
    });
    // The stream is closed by now; it may have been reading the pinned memory.
    drop(pin);
    drop(lease);
    if loaded.is_null() {
        return Err(Error::from_native(&api));
    }
    let Some(samples) = NonNull::new(audio_buf) else {
        return Err(Error::Contract("SDL_LoadWAV_RW returned no buffer".to_string()));
    };

    tracing::debug!(
        len = audio_len,
        freq = spec.freq,
        format = spec.format,
        "loaded WAV data"
    );
    let view = BufferView::native_owned(WAV_KIND, samples, audio_len as usize, api, free_wav);
    Ok((AudioSpec::default().with_native(&spec), WavBuffer { view }))
}
