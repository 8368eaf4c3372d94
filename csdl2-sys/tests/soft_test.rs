// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

//! Smoke tests for the raw function table and the software backend.

use std::ffi::CStr;
use std::os::raw::c_void;

use csdl2_sys::*;

fn last_error(api: &Sdl2Api) -> String {
    unsafe { CStr::from_ptr(api.get_error()) }
        .to_string_lossy()
        .into_owned()
}

/// Verifies the C structures keep the layout the SDL2 headers define.
#[test]
#[cfg(target_pointer_width = "64")]
fn struct_layouts_match_sdl2() {
    assert_eq!(std::mem::size_of::<Color>(), 4);
    assert_eq!(std::mem::size_of::<Rect>(), 16);
    assert_eq!(std::mem::size_of::<AudioSpec>(), 32);
    assert_eq!(std::mem::offset_of!(AudioSpec, callback), 16);
    assert_eq!(std::mem::offset_of!(Surface, pixels), 32);
    assert_eq!(std::mem::offset_of!(RWops, type_), 40);
}

/// Fills a small surface and reads the pixels back through the raw pointer.
#[test]
fn soft_surface_fill_rect() {
    let api = soft::api();
    unsafe {
        let surface = api.create_rgb_surface(0, 4, 2, 32, 0xFF_0000, 0xFF00, 0xFF, 0xFF00_0000);
        assert!(!surface.is_null());
        assert_eq!((*surface).pitch, 16);
        assert_eq!((*(*surface).format).format, SDL_PIXELFORMAT_ARGB8888);

        let rect = Rect { x: 1, y: 0, w: 2, h: 1 };
        assert_eq!(api.fill_rect(surface, &rect, 0xAABB_CCDD), 0);
        let pixels = std::slice::from_raw_parts((*surface).pixels as *const u32, 8);
        assert_eq!(pixels, &[0, 0xAABB_CCDD, 0xAABB_CCDD, 0, 0, 0, 0, 0]);
        api.free_surface(surface);
    }
}

/// Negative dimensions produce an "invalid parameter" error string.
#[test]
fn soft_errors_are_per_thread_strings() {
    let api = soft::api();
    unsafe {
        api.clear_error();
        assert!(api.create_rgb_surface(0, -1, 1, 32, 0, 0, 0, 0).is_null());
        assert_eq!(last_error(&api), "Parameter 'width' is invalid");

        std::thread::spawn(|| {
            let api = soft::api();
            assert_eq!(last_error(&api), "");
        })
        .join()
        .unwrap();

        api.clear_error();
        assert_eq!(last_error(&api), "");
    }
}

/// The pixel format shares ownership of a palette assigned to it.
#[test]
fn soft_palette_refcounting() {
    let api = soft::api();
    unsafe {
        let surface = api.create_rgb_surface(0, 2, 2, 8, 0, 0, 0, 0);
        let palette = api.alloc_palette(16);
        assert_eq!((*palette).refcount, 1);
        assert_eq!(api.set_pixel_format_palette((*surface).format, palette), 0);
        assert_eq!((*palette).refcount, 2);
        api.free_palette(palette);
        assert_eq!((*palette).refcount, 1);
        assert_eq!((*(*surface).format).palette, palette);
        api.free_surface(surface);
    }
}

/// Memory streams read, write and seek inside their backing buffer only.
#[test]
fn soft_memory_stream() {
    let api = soft::api();
    let mut backing = *b"hello world";
    unsafe {
        let rw = api.rw_from_mem(backing.as_mut_ptr() as *mut c_void, backing.len() as i32);
        assert_eq!((*rw).type_, SDL_RWOPS_MEMORY);
        let size = (*rw).size.unwrap();
        let seek = (*rw).seek.unwrap();
        let read = (*rw).read.unwrap();
        let write = (*rw).write.unwrap();
        assert_eq!(size(rw), 11);

        let mut out = [0u8; 5];
        assert_eq!(read(rw, out.as_mut_ptr() as *mut c_void, 1, 5), 5);
        assert_eq!(&out, b"hello");

        assert_eq!(seek(rw, 0, RW_SEEK_SET), 0);
        assert_eq!(write(rw, b"J".as_ptr() as *const c_void, 1, 1), 1);
        assert_eq!(seek(rw, 0, RW_SEEK_END), 11);
        assert_eq!(read(rw, out.as_mut_ptr() as *mut c_void, 1, 5), 0);
        assert_eq!((*rw).close.unwrap()(rw), 0);
    }
    assert_eq!(&backing, b"Jello world");
}

/// Builds a minimal PCM WAV file and decodes it through a read-only stream.
#[test]
fn soft_load_wav() {
    let mut wav = Vec::new();
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36u32 + 4).to_le_bytes());
    wav.extend_from_slice(b"WAVEfmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&8000u32.to_le_bytes());
    wav.extend_from_slice(&16000u32.to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&4u32.to_le_bytes());
    wav.extend_from_slice(&[1, 0, 2, 0]);

    let api = soft::api();
    unsafe {
        let rw = api.rw_from_const_mem(wav.as_ptr() as *const c_void, wav.len() as i32);
        let mut spec = AudioSpec::default();
        let mut buf = std::ptr::null_mut();
        let mut len = 0u32;
        let loaded = api.load_wav_rw(rw, 1, &mut spec, &mut buf, &mut len);
        assert!(!loaded.is_null());
        assert_eq!(spec.freq, 8000);
        assert_eq!(spec.format, AUDIO_S16LSB);
        assert_eq!(spec.channels, 1);
        assert_eq!(len, 4);
        assert_eq!(std::slice::from_raw_parts(buf, 4), &[1, 0, 2, 0]);
        api.free_wav(buf);
    }
}
