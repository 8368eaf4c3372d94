// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

//! In-process implementation of the SDL2 entry points in [`Sdl2Fns`].
//!
//! Everything here follows SDL2's observable behaviour closely enough for the
//! safe wrapper to be exercised without a display or an audio server: error
//! strings are per thread, palettes are reference counted, the legacy audio
//! device runs its callback on a dedicated mixing thread, and memory streams
//! never copy their backing buffer.
//!
//! Native allocations are counted so tests can assert that wrappers release
//! what they create (see [`live_allocations`]).

use std::sync::atomic::{AtomicIsize, Ordering};

use crate::{Sdl2Api, Sdl2Fns};

mod audio;
mod error;
mod rwops;
mod video;

static LIVE_ALLOCATIONS: AtomicIsize = AtomicIsize::new(0);

/// Number of native objects currently allocated by the software backend.
///
/// Surfaces, palettes, streams, windows, renderers, textures and WAV buffers
/// each count as one allocation.
pub fn live_allocations() -> isize {
    LIVE_ALLOCATIONS.load(Ordering::SeqCst)
}

pub(crate) fn track_alloc() {
    LIVE_ALLOCATIONS.fetch_add(1, Ordering::SeqCst);
}

pub(crate) fn track_free() {
    LIVE_ALLOCATIONS.fetch_sub(1, Ordering::SeqCst);
}

/// Function table pointing at the software implementation.
pub fn fns() -> Sdl2Fns {
    Sdl2Fns {
        get_error: error::get_error,
        clear_error: error::clear_error,

        alloc_rw: rwops::alloc_rw,
        free_rw: rwops::free_rw,
        rw_from_file: rwops::rw_from_file,
        rw_from_mem: rwops::rw_from_mem,
        rw_from_const_mem: rwops::rw_from_const_mem,

        create_rgb_surface: video::create_rgb_surface,
        create_rgb_surface_from: video::create_rgb_surface_from,
        free_surface: video::free_surface,
        lock_surface: video::lock_surface,
        unlock_surface: video::unlock_surface,
        fill_rect: video::fill_rect,

        alloc_palette: video::alloc_palette,
        free_palette: video::free_palette,
        set_palette_colors: video::set_palette_colors,
        set_pixel_format_palette: video::set_pixel_format_palette,
        map_rgba: video::map_rgba,

        create_window: video::create_window,
        destroy_window: video::destroy_window,
        get_window_id: video::get_window_id,
        get_window_title: video::get_window_title,

        create_renderer: video::create_renderer,
        create_software_renderer: video::create_software_renderer,
        destroy_renderer: video::destroy_renderer,

        create_texture: video::create_texture,
        destroy_texture: video::destroy_texture,
        lock_texture: video::lock_texture,
        unlock_texture: video::unlock_texture,

        open_audio: audio::open_audio,
        close_audio: audio::close_audio,
        pause_audio: audio::pause_audio,
        get_audio_status: audio::get_audio_status,
        lock_audio: audio::lock_audio,
        unlock_audio: audio::unlock_audio,
        load_wav_rw: audio::load_wav_rw,
        free_wav: audio::free_wav,
    }
}

/// Builds an [`Sdl2Api`] backed by the software implementation.
pub fn api() -> Sdl2Api {
    Sdl2Api::from_fns(fns())
}
