// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

//! The binding's entry point.
//!
//! [`Csdl2`] holds the loaded function table and creates every wrapper. All
//! wrappers keep their own handle on the table, so they may outlive the
//! instance that created them.

use std::os::raw::c_int;
use std::path::Path;
use std::sync::Arc;

use crate::api::Sdl2ApiHandle;
use crate::audio::{self, AudioDevice, AudioSpec, WavBuffer};
use crate::buffer::BufferView;
use crate::config::Csdl2Config;
use crate::rwops::RwOps;
use crate::video::{Masks, Palette, Renderer, Surface, Window};
use crate::Result;

/// Entry point for creating wrapped SDL2 resources.
///
/// The instance is cheaply cloneable and `Send + Sync`.
///
/// # Examples
///
/// ```
/// use csdl2::Csdl2;
///
/// # fn main() -> Result<(), csdl2::Error> {
/// let sdl = Csdl2::soft();
/// let surface = sdl.create_rgb_surface(0, 16, 16, 32, [0; 4])?;
/// surface.fill_rect(None, 0xffff_ffff)?;
/// assert_eq!(surface.pixels()?.get(0)?, 0xff);
/// surface.free()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Csdl2 {
    api: Sdl2ApiHandle,
}

impl Csdl2 {
    /// Creates an instance over an already loaded function table.
    ///
    /// Publishes the capability table on first use.
    pub fn new(api: Sdl2ApiHandle) -> Self {
        crate::capi::publish();
        Self { api }
    }

    /// Creates an instance from a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::LibLoading`] or [`crate::Error::Config`] if the
    /// configured backend cannot be resolved.
    ///
    /// # Examples
    ///
    /// ```
    /// use csdl2::Csdl2;
    /// use csdl2::config::Csdl2Config;
    ///
    /// # fn main() -> Result<(), csdl2::Error> {
    /// let config = Csdl2Config::from_json(r#"{ "backend": "software" }"#)?;
    /// let sdl = Csdl2::from_config(&config)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_config(config: &Csdl2Config) -> Result<Self> {
        Ok(Self::new(config.load_api()?))
    }

    /// Creates an instance backed by the in-process software implementation.
    #[cfg(feature = "soft")]
    pub fn soft() -> Self {
        Self::new(crate::api::soft_api())
    }

    pub fn api(&self) -> &Sdl2ApiHandle {
        &self.api
    }

    /// Allocates a blank stream whose callbacks are all unset.
    pub fn alloc_rw(&self) -> Result<RwOps> {
        RwOps::alloc(self.api.clone())
    }

    /// Opens a file as a stream (`SDL_RWFromFile`).
    ///
    /// # Arguments
    ///
    /// * `path` - File to open
    /// * `mode` - `fopen` mode string, e.g. `"rb"` or `"w+b"`
    ///
    /// # Errors
    ///
    /// Returns the translated native error if the file cannot be opened, or
    /// [`crate::Error::NulString`] if either argument contains a NUL byte.
    pub fn rw_from_file(&self, path: impl AsRef<Path>, mode: &str) -> Result<RwOps> {
        RwOps::from_file(self.api.clone(), path.as_ref(), mode)
    }

    /// Opens a read-write stream over host memory (`SDL_RWFromMem`).
    ///
    /// The stream holds a writable export of `buffer` until it is closed.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::Buffer`] if `buffer` is read-only or already exported
    /// - [`crate::Error::InvalidHandle`] if `buffer` was released
    pub fn rw_from_mem(&self, buffer: &Arc<BufferView>) -> Result<RwOps> {
        RwOps::from_mem(self.api.clone(), buffer, true)
    }

    /// Opens a read-only stream over host memory (`SDL_RWFromConstMem`).
    pub fn rw_from_const_mem(&self, buffer: &Arc<BufferView>) -> Result<RwOps> {
        RwOps::from_mem(self.api.clone(), buffer, false)
    }

    /// Creates a surface with library-owned pixels (`SDL_CreateRGBSurface`).
    pub fn create_rgb_surface(
        &self,
        flags: u32,
        width: c_int,
        height: c_int,
        depth: c_int,
        masks: Masks,
    ) -> Result<Surface> {
        Surface::create(self.api.clone(), flags, width, height, depth, masks)
    }

    /// Creates a surface over host pixels (`SDL_CreateRGBSurfaceFrom`).
    ///
    /// The surface pins a writable export of `pixels` until it is freed.
    ///
    /// # Arguments
    ///
    /// * `pixels` - Writable host buffer of exactly `pitch * height` bytes
    /// * `width`, `height` - Surface size in pixels
    /// * `depth` - Bits per pixel
    /// * `pitch` - Bytes per row, at least `width * bytes_per_pixel`
    /// * `masks` - Red, green, blue and alpha masks
    ///
    /// # Errors
    ///
    /// Checked in this order, with nothing allocated on failure:
    /// - [`crate::Error::Buffer`] if `pixels` is read-only
    /// - [`crate::Error::InvalidArg`] if `pitch` is too small for `width`
    /// - [`crate::Error::Buffer`] if `pitch * height` differs from the buffer length
    pub fn create_rgb_surface_from(
        &self,
        pixels: &Arc<BufferView>,
        width: c_int,
        height: c_int,
        depth: c_int,
        pitch: c_int,
        masks: Masks,
    ) -> Result<Surface> {
        Surface::create_from(self.api.clone(), pixels, width, height, depth, pitch, masks)
    }

    pub fn alloc_palette(&self, ncolors: c_int) -> Result<Palette> {
        Palette::alloc(self.api.clone(), ncolors)
    }

    pub fn create_window(
        &self,
        title: &str,
        x: c_int,
        y: c_int,
        width: c_int,
        height: c_int,
        flags: u32,
    ) -> Result<Window> {
        Window::create(self.api.clone(), title, x, y, width, height, flags)
    }

    /// Creates a renderer for `window`. The renderer keeps the window alive.
    pub fn create_renderer(&self, window: &Window, index: c_int, flags: u32) -> Result<Renderer> {
        Renderer::for_window(self.api.clone(), window, index, flags)
    }

    /// Creates a software renderer drawing into `surface`, which it keeps alive.
    pub fn create_software_renderer(&self, surface: &Surface) -> Result<Renderer> {
        Renderer::for_surface(self.api.clone(), surface)
    }

    /// Opens the legacy audio device (`SDL_OpenAudio`).
    ///
    /// The device starts paused. Its callback runs on the library's audio
    /// thread with the host lock held.
    ///
    /// # Arguments
    ///
    /// * `desired` - Requested format; zero fields take the device defaults
    ///
    /// # Returns
    ///
    /// The device and the obtained spec, which carries `desired`'s callback
    /// and user data.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::DeviceBusy`] if the legacy device is already open
    /// - the translated native error if the device rejects the spec
    ///
    /// # Examples
    ///
    /// ```
    /// use csdl2::{AudioCallback, AudioSpec, Csdl2};
    ///
    /// # fn main() -> Result<(), csdl2::Error> {
    /// let sdl = Csdl2::soft();
    /// let desired = AudioSpec {
    ///     freq: 48000,
    ///     callback: Some(AudioCallback::new(|_, _, _| Ok(()))),
    ///     ..Default::default()
    /// };
    /// let (device, obtained) = sdl.open_audio(&desired)?;
    /// assert_eq!(obtained.freq, 48000);
    /// device.close()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn open_audio(&self, desired: &AudioSpec) -> Result<(AudioDevice, AudioSpec)> {
        AudioDevice::open(self.api.clone(), desired)
    }

    /// One of `SDL_AUDIO_STOPPED`, `SDL_AUDIO_PLAYING` or `SDL_AUDIO_PAUSED`.
    pub fn audio_status(&self) -> csdl2_sys::AudioStatus {
        unsafe { self.api.get_audio_status() }
    }

    /// Loads a WAVE file from `src` (`SDL_LoadWAV_RW`).
    ///
    /// With `freesrc` the stream is closed by the loader and is invalid
    /// afterwards, whether or not loading succeeds.
    pub fn load_wav(&self, src: &RwOps, freesrc: bool) -> Result<(AudioSpec, WavBuffer)> {
        audio::load_wav(self.api.clone(), src, freesrc)
    }
}
