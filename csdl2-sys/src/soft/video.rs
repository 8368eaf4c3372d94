// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

//! Surfaces, pixel formats, palettes, windows, renderers and textures.

use std::ffi::CString;
use std::os::raw::{c_char, c_int, c_void};
use std::ptr;
use std::sync::atomic::{AtomicU32, Ordering};

use super::error::{invalid_param, out_of_memory, set_error};
use super::{track_alloc, track_free};
use crate::consts::*;
use crate::{Color, Palette, PixelFormat, Rect, Renderer, Surface, Texture, Window};

fn alloc_bytes(len: usize) -> *mut u8 {
    let bytes: Box<[u8]> = vec![0u8; len].into_boxed_slice();
    Box::into_raw(bytes) as *mut u8
}

unsafe fn free_bytes(bytes: *mut u8, len: usize) {
    if !bytes.is_null() {
        drop(unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(bytes, len)) });
    }
}

fn masks_to_format(bpp: c_int, r: u32, g: u32, b: u32, a: u32) -> u32 {
    match (bpp, r, g, b, a) {
        (1, 0, 0, 0, 0) => SDL_PIXELFORMAT_INDEX1MSB,
        (4, 0, 0, 0, 0) => SDL_PIXELFORMAT_INDEX4MSB,
        (8, 0, 0, 0, 0) => SDL_PIXELFORMAT_INDEX8,
        (8, 0xE0, 0x1C, 0x03, 0) => SDL_PIXELFORMAT_RGB332,
        (16, 0, 0, 0, 0) | (16, 0xF800, 0x07E0, 0x001F, 0) => SDL_PIXELFORMAT_RGB565,
        (24, 0, 0, 0, 0) | (24, 0xFF_0000, 0xFF00, 0xFF, 0) => SDL_PIXELFORMAT_RGB24,
        (24, 0xFF, 0xFF00, 0xFF_0000, 0) => SDL_PIXELFORMAT_BGR24,
        (32, 0, 0, 0, 0) | (32, 0xFF_0000, 0xFF00, 0xFF, 0) => SDL_PIXELFORMAT_RGB888,
        (32, 0xFF, 0xFF00, 0xFF_0000, 0) => SDL_PIXELFORMAT_BGR888,
        (32, 0xFF_0000, 0xFF00, 0xFF, 0xFF00_0000) => SDL_PIXELFORMAT_ARGB8888,
        (32, 0xFF00_0000, 0xFF_0000, 0xFF00, 0xFF) => SDL_PIXELFORMAT_RGBA8888,
        (32, 0xFF, 0xFF00, 0xFF_0000, 0xFF00_0000) => SDL_PIXELFORMAT_ABGR8888,
        (32, 0xFF00, 0xFF_0000, 0xFF00_0000, 0xFF) => SDL_PIXELFORMAT_BGRA8888,
        _ => SDL_PIXELFORMAT_UNKNOWN,
    }
}

fn format_masks(format: u32) -> [u32; 4] {
    match format {
        SDL_PIXELFORMAT_RGB332 => [0xE0, 0x1C, 0x03, 0],
        SDL_PIXELFORMAT_RGB565 => [0xF800, 0x07E0, 0x001F, 0],
        SDL_PIXELFORMAT_RGB24 | SDL_PIXELFORMAT_RGB888 => [0xFF_0000, 0xFF00, 0xFF, 0],
        SDL_PIXELFORMAT_BGR24 | SDL_PIXELFORMAT_BGR888 => [0xFF, 0xFF00, 0xFF_0000, 0],
        SDL_PIXELFORMAT_ARGB8888 => [0xFF_0000, 0xFF00, 0xFF, 0xFF00_0000],
        SDL_PIXELFORMAT_RGBA8888 => [0xFF00_0000, 0xFF_0000, 0xFF00, 0xFF],
        SDL_PIXELFORMAT_ABGR8888 => [0xFF, 0xFF00, 0xFF_0000, 0xFF00_0000],
        SDL_PIXELFORMAT_BGRA8888 => [0xFF00, 0xFF_0000, 0xFF00_0000, 0xFF],
        _ => [0; 4],
    }
}

/// Storage bits per pixel, as `SDL_PixelFormatEnumToMasks` reports it.
fn storage_bits(format: u32) -> u8 {
    let bytes = bytes_per_pixel(format);
    if bytes <= 2 {
        bits_per_pixel(format) as u8
    } else {
        (bytes * 8) as u8
    }
}

fn mask_shift_loss(mask: u32) -> (u8, u8) {
    if mask == 0 {
        return (0, 8);
    }
    let shift = mask.trailing_zeros();
    let bits = (mask >> shift).count_ones().min(8);
    (shift as u8, (8 - bits) as u8)
}

fn calculate_pitch(width: c_int, bits: u8) -> c_int {
    let row = if bits >= 8 {
        width as i64 * ((bits as i64 + 7) / 8)
    } else {
        (width as i64 * bits as i64 + 7) / 8
    };
    ((row + 3) & !3) as c_int
}

fn alloc_format(format: u32) -> *mut PixelFormat {
    let bits = storage_bits(format);
    let [rmask, gmask, bmask, amask] = format_masks(format);
    let (rshift, rloss) = mask_shift_loss(rmask);
    let (gshift, gloss) = mask_shift_loss(gmask);
    let (bshift, bloss) = mask_shift_loss(bmask);
    let (ashift, aloss) = mask_shift_loss(amask);

    let palette = if is_indexed(format) {
        let palette = unsafe { alloc_palette(1 << bits) };
        if !palette.is_null() && bits == 1 {
            // Two-colour surfaces start out white on black.
            unsafe {
                let colors = (*palette).colors;
                *colors = Color { r: 0xFF, g: 0xFF, b: 0xFF, a: 0xFF };
                *colors.add(1) = Color { r: 0, g: 0, b: 0, a: 0xFF };
            }
        }
        palette
    } else {
        ptr::null_mut()
    };

    Box::into_raw(Box::new(PixelFormat {
        format,
        palette,
        BitsPerPixel: bits,
        BytesPerPixel: bits.div_ceil(8),
        padding: [0; 2],
        Rmask: rmask,
        Gmask: gmask,
        Bmask: bmask,
        Amask: amask,
        Rloss: rloss,
        Gloss: gloss,
        Bloss: bloss,
        Aloss: aloss,
        Rshift: rshift,
        Gshift: gshift,
        Bshift: bshift,
        Ashift: ashift,
        refcount: 1,
        next: ptr::null_mut(),
    }))
}

unsafe fn free_format(format: *mut PixelFormat) {
    if format.is_null() {
        return;
    }
    let format = unsafe { Box::from_raw(format) };
    if !format.palette.is_null() {
        unsafe { free_palette(format.palette) };
    }
}

unsafe fn new_surface(width: c_int, height: c_int, depth: c_int, masks: [u32; 4]) -> *mut Surface {
    if width < 0 {
        invalid_param("width");
        return ptr::null_mut();
    }
    if height < 0 {
        invalid_param("height");
        return ptr::null_mut();
    }
    let [r, g, b, a] = masks;
    let format = masks_to_format(depth, r, g, b, a);
    if format == SDL_PIXELFORMAT_UNKNOWN {
        set_error("Unknown pixel format");
        return ptr::null_mut();
    }
    let format = alloc_format(format);
    let bits = unsafe { (*format).BitsPerPixel };

    track_alloc();
    Box::into_raw(Box::new(Surface {
        flags: SDL_SWSURFACE,
        format,
        w: width,
        h: height,
        pitch: calculate_pitch(width, bits),
        pixels: ptr::null_mut(),
        userdata: ptr::null_mut(),
        locked: 0,
        lock_data: ptr::null_mut(),
        clip_rect: Rect { x: 0, y: 0, w: width, h: height },
        map: ptr::null_mut(),
        refcount: 1,
    }))
}

pub(super) unsafe extern "C" fn create_rgb_surface(
    _flags: u32,
    width: c_int,
    height: c_int,
    depth: c_int,
    rmask: u32,
    gmask: u32,
    bmask: u32,
    amask: u32,
) -> *mut Surface {
    let surface = unsafe { new_surface(width, height, depth, [rmask, gmask, bmask, amask]) };
    if surface.is_null() {
        return surface;
    }
    let surface_ref = unsafe { &mut *surface };
    let len = surface_ref.pitch as usize * surface_ref.h as usize;
    if len > 0 {
        surface_ref.pixels = alloc_bytes(len) as *mut c_void;
    }
    surface
}

pub(super) unsafe extern "C" fn create_rgb_surface_from(
    pixels: *mut c_void,
    width: c_int,
    height: c_int,
    depth: c_int,
    pitch: c_int,
    rmask: u32,
    gmask: u32,
    bmask: u32,
    amask: u32,
) -> *mut Surface {
    let surface = unsafe { new_surface(width, height, depth, [rmask, gmask, bmask, amask]) };
    if surface.is_null() {
        return surface;
    }
    let surface_ref = unsafe { &mut *surface };
    surface_ref.flags |= SDL_PREALLOC;
    surface_ref.pixels = pixels;
    surface_ref.pitch = pitch;
    surface
}

pub(super) unsafe extern "C" fn free_surface(surface: *mut Surface) {
    if surface.is_null() {
        return;
    }
    let surface_ref = unsafe { &mut *surface };
    if surface_ref.flags & SDL_DONTFREE != 0 {
        return;
    }
    surface_ref.refcount -= 1;
    if surface_ref.refcount > 0 {
        return;
    }
    unsafe {
        free_format(surface_ref.format);
        if surface_ref.flags & SDL_PREALLOC == 0 {
            let len = surface_ref.pitch as usize * surface_ref.h as usize;
            free_bytes(surface_ref.pixels as *mut u8, len);
        }
        drop(Box::from_raw(surface));
    }
    track_free();
}

pub(super) unsafe extern "C" fn lock_surface(surface: *mut Surface) -> c_int {
    match unsafe { surface.as_mut() } {
        Some(surface) => {
            surface.locked += 1;
            0
        }
        None => invalid_param("surface"),
    }
}

pub(super) unsafe extern "C" fn unlock_surface(surface: *mut Surface) {
    if let Some(surface) = unsafe { surface.as_mut() }
        && surface.locked > 0
    {
        surface.locked -= 1;
    }
}

fn intersect(a: &Rect, b: &Rect) -> Option<Rect> {
    let x0 = a.x.max(b.x);
    let y0 = a.y.max(b.y);
    let x1 = (a.x + a.w).min(b.x + b.w);
    let y1 = (a.y + a.h).min(b.y + b.h);
    (x1 > x0 && y1 > y0).then_some(Rect { x: x0, y: y0, w: x1 - x0, h: y1 - y0 })
}

pub(super) unsafe extern "C" fn fill_rect(
    dst: *mut Surface,
    rect: *const Rect,
    color: u32,
) -> c_int {
    let Some(dst) = (unsafe { dst.as_mut() }) else {
        return invalid_param("SDL_FillRect(): dst");
    };
    if dst.pixels.is_null() {
        return set_error("SDL_FillRect(): You must lock the surface");
    }
    let bpp = unsafe { (*dst.format).BytesPerPixel } as usize;
    let bytes: ([u8; 4], usize) = match bpp {
        1 => ([color as u8, 0, 0, 0], 1),
        2 => {
            let [b0, b1] = (color as u16).to_ne_bytes();
            ([b0, b1, 0, 0], 2)
        }
        3 => (color.to_le_bytes(), 3),
        4 => (color.to_ne_bytes(), 4),
        _ => return set_error("SDL_FillRect(): Unsupported surface format"),
    };
    let area = match unsafe { rect.as_ref() } {
        Some(rect) => intersect(rect, &dst.clip_rect),
        None => Some(dst.clip_rect),
    };
    let Some(area) = area else {
        return 0;
    };
    let base = dst.pixels as *mut u8;
    for y in area.y..area.y + area.h {
        let row = unsafe { base.add(y as usize * dst.pitch as usize + area.x as usize * bpp) };
        for x in 0..area.w as usize {
            unsafe { ptr::copy_nonoverlapping(bytes.0.as_ptr(), row.add(x * bpp), bytes.1) };
        }
    }
    0
}

pub(super) unsafe extern "C" fn alloc_palette(ncolors: c_int) -> *mut Palette {
    if ncolors < 1 {
        invalid_param("ncolors");
        return ptr::null_mut();
    }
    let white = Color { r: 0xFF, g: 0xFF, b: 0xFF, a: 0xFF };
    let colors: Box<[Color]> = vec![white; ncolors as usize].into_boxed_slice();
    track_alloc();
    Box::into_raw(Box::new(Palette {
        ncolors,
        colors: Box::into_raw(colors) as *mut Color,
        version: 1,
        refcount: 1,
    }))
}

pub(super) unsafe extern "C" fn free_palette(palette: *mut Palette) {
    let Some(palette_ref) = (unsafe { palette.as_mut() }) else {
        invalid_param("palette");
        return;
    };
    palette_ref.refcount -= 1;
    if palette_ref.refcount > 0 {
        return;
    }
    unsafe {
        drop(Box::from_raw(ptr::slice_from_raw_parts_mut(
            palette_ref.colors,
            palette_ref.ncolors as usize,
        )));
        drop(Box::from_raw(palette));
    }
    track_free();
}

pub(super) unsafe extern "C" fn set_palette_colors(
    palette: *mut Palette,
    colors: *const Color,
    firstcolor: c_int,
    ncolors: c_int,
) -> c_int {
    let Some(palette) = (unsafe { palette.as_mut() }) else {
        return invalid_param("palette");
    };
    if colors.is_null() {
        return invalid_param("colors");
    }
    if firstcolor < 0 || ncolors < 0 || firstcolor > palette.ncolors {
        return invalid_param("firstcolor");
    }
    let mut status = 0;
    let mut count = ncolors;
    if count > palette.ncolors - firstcolor {
        count = palette.ncolors - firstcolor;
        status = -1;
    }
    if count > 0 {
        unsafe {
            ptr::copy_nonoverlapping(
                colors,
                palette.colors.add(firstcolor as usize),
                count as usize,
            )
        };
        palette.version = palette.version.wrapping_add(1).max(1);
    }
    status
}

pub(super) unsafe extern "C" fn set_pixel_format_palette(
    format: *mut PixelFormat,
    palette: *mut Palette,
) -> c_int {
    let Some(format) = (unsafe { format.as_mut() }) else {
        return invalid_param("SDL_SetPixelFormatPalette(): format");
    };
    if let Some(palette) = unsafe { palette.as_ref() } {
        let capacity = 1u64.checked_shl(format.BitsPerPixel as u32).unwrap_or(u64::MAX);
        if palette.ncolors as u64 > capacity {
            return set_error(
                "SDL_SetPixelFormatPalette() passed a palette that doesn't match the format",
            );
        }
    }
    if format.palette == palette {
        return 0;
    }
    if let Some(palette) = unsafe { palette.as_mut() } {
        palette.refcount += 1;
    }
    if !format.palette.is_null() {
        unsafe { free_palette(format.palette) };
    }
    format.palette = palette;
    0
}

pub(super) unsafe extern "C" fn map_rgba(
    format: *const PixelFormat,
    r: u8,
    g: u8,
    b: u8,
    a: u8,
) -> u32 {
    let Some(format) = (unsafe { format.as_ref() }) else {
        invalid_param("format");
        return 0;
    };
    if let Some(palette) = unsafe { format.palette.as_ref() } {
        let colors =
            unsafe { std::slice::from_raw_parts(palette.colors, palette.ncolors as usize) };
        let distance = |c: &Color| {
            let dr = c.r as i32 - r as i32;
            let dg = c.g as i32 - g as i32;
            let db = c.b as i32 - b as i32;
            let da = c.a as i32 - a as i32;
            dr * dr + dg * dg + db * db + da * da
        };
        return colors
            .iter()
            .enumerate()
            .min_by_key(|(_, c)| distance(c))
            .map(|(index, _)| index as u32)
            .unwrap_or(0);
    }
    let channel = |value: u8, loss: u8, shift: u8, mask: u32| {
        (((value as u32) >> loss) << shift) & mask
    };
    channel(r, format.Rloss, format.Rshift, format.Rmask)
        | channel(g, format.Gloss, format.Gshift, format.Gmask)
        | channel(b, format.Bloss, format.Bshift, format.Bmask)
        | channel(a, format.Aloss, format.Ashift, format.Amask)
}

struct SoftWindow {
    id: u32,
    title: CString,
}

static NEXT_WINDOW_ID: AtomicU32 = AtomicU32::new(1);

pub(super) unsafe extern "C" fn create_window(
    title: *const c_char,
    _x: c_int,
    _y: c_int,
    w: c_int,
    h: c_int,
    _flags: u32,
) -> *mut Window {
    if w < 0 || h < 0 {
        set_error("Window is too large.");
        return ptr::null_mut();
    }
    let title = if title.is_null() {
        CString::default()
    } else {
        unsafe { std::ffi::CStr::from_ptr(title) }.to_owned()
    };
    track_alloc();
    Box::into_raw(Box::new(SoftWindow {
        id: NEXT_WINDOW_ID.fetch_add(1, Ordering::Relaxed),
        title,
    })) as *mut Window
}

pub(super) unsafe extern "C" fn destroy_window(window: *mut Window) {
    if window.is_null() {
        set_error("Invalid window");
        return;
    }
    drop(unsafe { Box::from_raw(window as *mut SoftWindow) });
    track_free();
}

pub(super) unsafe extern "C" fn get_window_id(window: *mut Window) -> u32 {
    match unsafe { (window as *const SoftWindow).as_ref() } {
        Some(window) => window.id,
        None => {
            set_error("Invalid window");
            0
        }
    }
}

pub(super) unsafe extern "C" fn get_window_title(window: *mut Window) -> *const c_char {
    match unsafe { (window as *const SoftWindow).as_ref() } {
        Some(window) => window.title.as_ptr(),
        None => {
            set_error("Invalid window");
            c"".as_ptr()
        }
    }
}

struct SoftRenderer {
    textures: Vec<*mut SoftTexture>,
}

struct SoftTexture {
    renderer: *mut SoftRenderer,
    access: c_int,
    w: c_int,
    h: c_int,
    bytes_per_pixel: usize,
    pixels: Box<[u8]>,
    locked: bool,
}

fn new_renderer() -> *mut Renderer {
    track_alloc();
    Box::into_raw(Box::new(SoftRenderer { textures: Vec::new() })) as *mut Renderer
}

pub(super) unsafe extern "C" fn create_renderer(
    window: *mut Window,
    _index: c_int,
    _flags: u32,
) -> *mut Renderer {
    if window.is_null() {
        set_error("Invalid window");
        return ptr::null_mut();
    }
    new_renderer()
}

pub(super) unsafe extern "C" fn create_software_renderer(surface: *mut Surface) -> *mut Renderer {
    if surface.is_null() {
        invalid_param("surface");
        return ptr::null_mut();
    }
    new_renderer()
}

pub(super) unsafe extern "C" fn destroy_renderer(renderer: *mut Renderer) {
    if renderer.is_null() {
        set_error("Invalid renderer");
        return;
    }
    let renderer = unsafe { Box::from_raw(renderer as *mut SoftRenderer) };
    for texture in &renderer.textures {
        drop(unsafe { Box::from_raw(*texture) });
        track_free();
    }
    track_free();
}

pub(super) unsafe extern "C" fn create_texture(
    renderer: *mut Renderer,
    format: u32,
    access: c_int,
    w: c_int,
    h: c_int,
) -> *mut Texture {
    let Some(renderer) = (unsafe { (renderer as *mut SoftRenderer).as_mut() }) else {
        set_error("Invalid renderer");
        return ptr::null_mut();
    };
    if w <= 0 || h <= 0 {
        set_error("Texture dimensions can't be 0");
        return ptr::null_mut();
    }
    let bytes_per_pixel = bytes_per_pixel(format) as usize;
    if format == SDL_PIXELFORMAT_UNKNOWN || is_indexed(format) || bytes_per_pixel == 0 {
        set_error("Palettized textures are not supported");
        return ptr::null_mut();
    }
    let Some(len) = (w as usize)
        .checked_mul(h as usize)
        .and_then(|n| n.checked_mul(bytes_per_pixel))
    else {
        out_of_memory();
        return ptr::null_mut();
    };
    let texture = Box::into_raw(Box::new(SoftTexture {
        renderer,
        access,
        w,
        h,
        bytes_per_pixel,
        pixels: vec![0u8; len].into_boxed_slice(),
        locked: false,
    }));
    renderer.textures.push(texture);
    track_alloc();
    texture as *mut Texture
}

pub(super) unsafe extern "C" fn destroy_texture(texture: *mut Texture) {
    let texture = texture as *mut SoftTexture;
    let Some(texture_ref) = (unsafe { texture.as_ref() }) else {
        set_error("Invalid texture");
        return;
    };
    if let Some(renderer) = unsafe { texture_ref.renderer.as_mut() } {
        renderer.textures.retain(|t| *t != texture);
    }
    drop(unsafe { Box::from_raw(texture) });
    track_free();
}

pub(super) unsafe extern "C" fn lock_texture(
    texture: *mut Texture,
    rect: *const Rect,
    pixels: *mut *mut c_void,
    pitch: *mut c_int,
) -> c_int {
    let Some(texture) = (unsafe { (texture as *mut SoftTexture).as_mut() }) else {
        return set_error("Invalid texture");
    };
    if texture.access != SDL_TEXTUREACCESS_STREAMING {
        return set_error("SDL_LockTexture(): texture must be streaming");
    }
    if pixels.is_null() {
        return invalid_param("pixels");
    }
    if pitch.is_null() {
        return invalid_param("pitch");
    }
    let full = Rect { x: 0, y: 0, w: texture.w, h: texture.h };
    let area = match unsafe { rect.as_ref() } {
        Some(rect) => match intersect(rect, &full) {
            Some(area) if area == *rect => area,
            _ => return invalid_param("rect"),
        },
        None => full,
    };
    let row_pitch = texture.w as usize * texture.bytes_per_pixel;
    let offset = area.y as usize * row_pitch + area.x as usize * texture.bytes_per_pixel;
    texture.locked = true;
    unsafe {
        *pixels = texture.pixels.as_mut_ptr().add(offset) as *mut c_void;
        *pitch = row_pitch as c_int;
    }
    0
}

pub(super) unsafe extern "C" fn unlock_texture(texture: *mut Texture) {
    if let Some(texture) = unsafe { (texture as *mut SoftTexture).as_mut() }
        && texture.locked
    {
        texture.locked = false;
    }
}
