// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

//! # csdl2-sys: Raw FFI bindings to SDL2
//!
//! This crate provides low-level, unsafe Rust bindings to the subset of the SDL2
//! C library that `csdl2` wraps. Entry points are resolved at runtime through
//! `libloading`, so nothing links against SDL2 at build time.
//!
//! ## Overview
//!
//! `csdl2-sys` exposes:
//! - Raw C structures (`Surface`, `PixelFormat`, `Palette`, `RWops`, `AudioSpec`, ...)
//! - Opaque handles (`Window`, `Renderer`, `Texture`)
//! - The [`Sdl2Api`] function table (SDL names converted to snake_case)
//! - Constants for surface flags, pixel formats, audio formats and stream types
//!
//! ## Usage
//!
//! **Most users should NOT use this crate directly.** Use the safe `csdl2` wrapper crate
//! instead, which provides handle validation, buffer export tracking and ownership rules.
//!
//! ## Safety
//!
//! All functions in this crate are `unsafe` and require the caller to uphold SDL's
//! invariants:
//! - Pointers passed in must come from the same loaded library
//! - Freed objects must never be passed back
//! - The legacy audio API is process global
//!
//! ## Software backend
//!
//! With the `soft` feature (default) the [`soft`] module provides a pure Rust
//! implementation of every entry point in [`Sdl2Fns`], with the same C ABI.

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(clippy::missing_safety_doc)]

use std::os::raw::{c_int, c_void};

mod api;
pub mod consts;

#[cfg(feature = "soft")]
pub mod soft;

pub use api::{Sdl2Api, Sdl2Fns};
pub use consts::*;

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: c_int,
    pub y: c_int,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: c_int,
    pub y: c_int,
    pub w: c_int,
    pub h: c_int,
}

#[repr(C)]
#[derive(Debug)]
pub struct Palette {
    pub ncolors: c_int,
    pub colors: *mut Color,
    pub version: u32,
    pub refcount: c_int,
}

#[repr(C)]
#[derive(Debug)]
pub struct PixelFormat {
    pub format: u32,
    pub palette: *mut Palette,
    pub BitsPerPixel: u8,
    pub BytesPerPixel: u8,
    pub padding: [u8; 2],
    pub Rmask: u32,
    pub Gmask: u32,
    pub Bmask: u32,
    pub Amask: u32,
    pub Rloss: u8,
    pub Gloss: u8,
    pub Bloss: u8,
    pub Aloss: u8,
    pub Rshift: u8,
    pub Gshift: u8,
    pub Bshift: u8,
    pub Ashift: u8,
    pub refcount: c_int,
    pub next: *mut PixelFormat,
}

/// Private blit mapping data. Never dereferenced on this side.
#[repr(C)]
pub struct BlitMap {
    _private: [u8; 0],
}

#[repr(C)]
#[derive(Debug)]
pub struct Surface {
    pub flags: u32,
    pub format: *mut PixelFormat,
    pub w: c_int,
    pub h: c_int,
    pub pitch: c_int,
    pub pixels: *mut c_void,
    pub userdata: *mut c_void,
    pub locked: c_int,
    pub lock_data: *mut c_void,
    pub clip_rect: Rect,
    pub map: *mut BlitMap,
    pub refcount: c_int,
}

pub type RWopsSizeFn = unsafe extern "C" fn(context: *mut RWops) -> i64;
pub type RWopsSeekFn = unsafe extern "C" fn(context: *mut RWops, offset: i64, whence: c_int) -> i64;
pub type RWopsReadFn =
    unsafe extern "C" fn(context: *mut RWops, ptr: *mut c_void, size: usize, maxnum: usize) -> usize;
pub type RWopsWriteFn =
    unsafe extern "C" fn(context: *mut RWops, ptr: *const c_void, size: usize, num: usize) -> usize;
pub type RWopsCloseFn = unsafe extern "C" fn(context: *mut RWops) -> c_int;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RWopsMem {
    pub base: *mut u8,
    pub here: *mut u8,
    pub stop: *mut u8,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RWopsUnknown {
    pub data1: *mut c_void,
    pub data2: *mut c_void,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union RWopsHidden {
    pub mem: RWopsMem,
    pub unknown: RWopsUnknown,
}

/// A read/write stream. The callbacks are filled in by whoever created the stream.
#[repr(C)]
pub struct RWops {
    pub size: Option<RWopsSizeFn>,
    pub seek: Option<RWopsSeekFn>,
    pub read: Option<RWopsReadFn>,
    pub write: Option<RWopsWriteFn>,
    pub close: Option<RWopsCloseFn>,
    pub type_: u32,
    pub hidden: RWopsHidden,
}

pub type AudioCallback =
    Option<unsafe extern "C" fn(userdata: *mut c_void, stream: *mut u8, len: c_int)>;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct AudioSpec {
    pub freq: c_int,
    pub format: u16,
    pub channels: u8,
    pub silence: u8,
    pub samples: u16,
    pub padding: u16,
    pub size: u32,
    pub callback: AudioCallback,
    pub userdata: *mut c_void,
}

impl Default for AudioSpec {
    fn default() -> Self {
        Self {
            freq: 0,
            format: 0,
            channels: 0,
            silence: 0,
            samples: 0,
            padding: 0,
            size: 0,
            callback: None,
            userdata: std::ptr::null_mut(),
        }
    }
}

pub type AudioStatus = c_int;

#[repr(C)]
pub struct Window {
    _private: [u8; 0],
}

#[repr(C)]
pub struct Renderer {
    _private: [u8; 0],
}

#[repr(C)]
pub struct Texture {
    _private: [u8; 0],
}
