// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

//! Numeric constants mirrored from the SDL2 headers.

// Surface flags
pub const SDL_SWSURFACE: u32 = 0;
pub const SDL_PREALLOC: u32 = 0x0000_0001;
pub const SDL_RLEACCEL: u32 = 0x0000_0002;
pub const SDL_DONTFREE: u32 = 0x0000_0004;

pub const SDL_ALPHA_OPAQUE: u8 = 255;
pub const SDL_ALPHA_TRANSPARENT: u8 = 0;

// Pixel types, orders and layouts used to build pixel format enums.
pub const SDL_PIXELTYPE_UNKNOWN: u32 = 0;
pub const SDL_PIXELTYPE_INDEX1: u32 = 1;
pub const SDL_PIXELTYPE_INDEX4: u32 = 2;
pub const SDL_PIXELTYPE_INDEX8: u32 = 3;
pub const SDL_PIXELTYPE_PACKED8: u32 = 4;
pub const SDL_PIXELTYPE_PACKED16: u32 = 5;
pub const SDL_PIXELTYPE_PACKED32: u32 = 6;
pub const SDL_PIXELTYPE_ARRAYU8: u32 = 7;

pub const SDL_BITMAPORDER_NONE: u32 = 0;
pub const SDL_BITMAPORDER_4321: u32 = 1;
pub const SDL_BITMAPORDER_1234: u32 = 2;

pub const SDL_PACKEDORDER_NONE: u32 = 0;
pub const SDL_PACKEDORDER_XRGB: u32 = 1;
pub const SDL_PACKEDORDER_RGBX: u32 = 2;
pub const SDL_PACKEDORDER_ARGB: u32 = 3;
pub const SDL_PACKEDORDER_RGBA: u32 = 4;
pub const SDL_PACKEDORDER_XBGR: u32 = 5;
pub const SDL_PACKEDORDER_BGRX: u32 = 6;
pub const SDL_PACKEDORDER_ABGR: u32 = 7;
pub const SDL_PACKEDORDER_BGRA: u32 = 8;

pub const SDL_ARRAYORDER_NONE: u32 = 0;
pub const SDL_ARRAYORDER_RGB: u32 = 1;
pub const SDL_ARRAYORDER_BGR: u32 = 4;

pub const SDL_PACKEDLAYOUT_NONE: u32 = 0;
pub const SDL_PACKEDLAYOUT_332: u32 = 1;
pub const SDL_PACKEDLAYOUT_565: u32 = 5;
pub const SDL_PACKEDLAYOUT_8888: u32 = 6;

/// Packs a pixel format enum the way `SDL_DEFINE_PIXELFORMAT` does.
pub const fn define_pixelformat(kind: u32, order: u32, layout: u32, bits: u32, bytes: u32) -> u32 {
    (1 << 28) | (kind << 24) | (order << 20) | (layout << 16) | (bits << 8) | bytes
}

/// `SDL_PIXELTYPE`.
pub const fn pixel_type(format: u32) -> u32 {
    (format >> 24) & 0x0F
}

/// `SDL_BITSPERPIXEL`.
pub const fn bits_per_pixel(format: u32) -> u32 {
    (format >> 8) & 0xFF
}

/// `SDL_BYTESPERPIXEL`, valid for non-FourCC formats.
pub const fn bytes_per_pixel(format: u32) -> u32 {
    format & 0xFF
}

/// `SDL_ISPIXELFORMAT_INDEXED`.
pub const fn is_indexed(format: u32) -> bool {
    matches!(
        pixel_type(format),
        SDL_PIXELTYPE_INDEX1 | SDL_PIXELTYPE_INDEX4 | SDL_PIXELTYPE_INDEX8
    )
}

pub const SDL_PIXELFORMAT_UNKNOWN: u32 = 0;
pub const SDL_PIXELFORMAT_INDEX1LSB: u32 =
    define_pixelformat(SDL_PIXELTYPE_INDEX1, SDL_BITMAPORDER_4321, 0, 1, 0);
pub const SDL_PIXELFORMAT_INDEX1MSB: u32 =
    define_pixelformat(SDL_PIXELTYPE_INDEX1, SDL_BITMAPORDER_1234, 0, 1, 0);
pub const SDL_PIXELFORMAT_INDEX4LSB: u32 =
    define_pixelformat(SDL_PIXELTYPE_INDEX4, SDL_BITMAPORDER_4321, 0, 4, 0);
pub const SDL_PIXELFORMAT_INDEX4MSB: u32 =
    define_pixelformat(SDL_PIXELTYPE_INDEX4, SDL_BITMAPORDER_1234, 0, 4, 0);
pub const SDL_PIXELFORMAT_INDEX8: u32 = define_pixelformat(SDL_PIXELTYPE_INDEX8, 0, 0, 8, 1);
pub const SDL_PIXELFORMAT_RGB332: u32 = define_pixelformat(
    SDL_PIXELTYPE_PACKED8,
    SDL_PACKEDORDER_XRGB,
    SDL_PACKEDLAYOUT_332,
    8,
    1,
);
pub const SDL_PIXELFORMAT_RGB565: u32 = define_pixelformat(
    SDL_PIXELTYPE_PACKED16,
    SDL_PACKEDORDER_XRGB,
    SDL_PACKEDLAYOUT_565,
    16,
    2,
);
pub const SDL_PIXELFORMAT_RGB24: u32 =
    define_pixelformat(SDL_PIXELTYPE_ARRAYU8, SDL_ARRAYORDER_RGB, 0, 24, 3);
pub const SDL_PIXELFORMAT_BGR24: u32 =
    define_pixelformat(SDL_PIXELTYPE_ARRAYU8, SDL_ARRAYORDER_BGR, 0, 24, 3);
pub const SDL_PIXELFORMAT_RGB888: u32 = define_pixelformat(
    SDL_PIXELTYPE_PACKED32,
    SDL_PACKEDORDER_XRGB,
    SDL_PACKEDLAYOUT_8888,
    24,
    4,
);
pub const SDL_PIXELFORMAT_BGR888: u32 = define_pixelformat(
    SDL_PIXELTYPE_PACKED32,
    SDL_PACKEDORDER_XBGR,
    SDL_PACKEDLAYOUT_8888,
    24,
    4,
);
pub const SDL_PIXELFORMAT_ARGB8888: u32 = define_pixelformat(
    SDL_PIXELTYPE_PACKED32,
    SDL_PACKEDORDER_ARGB,
    SDL_PACKEDLAYOUT_8888,
    32,
    4,
);
pub const SDL_PIXELFORMAT_RGBA8888: u32 = define_pixelformat(
    SDL_PIXELTYPE_PACKED32,
    SDL_PACKEDORDER_RGBA,
    SDL_PACKEDLAYOUT_8888,
    32,
    4,
);
pub const SDL_PIXELFORMAT_ABGR8888: u32 = define_pixelformat(
    SDL_PIXELTYPE_PACKED32,
    SDL_PACKEDORDER_ABGR,
    SDL_PACKEDLAYOUT_8888,
    32,
    4,
);
pub const SDL_PIXELFORMAT_BGRA8888: u32 = define_pixelformat(
    SDL_PIXELTYPE_PACKED32,
    SDL_PACKEDORDER_BGRA,
    SDL_PACKEDLAYOUT_8888,
    32,
    4,
);

// Stream types
pub const SDL_RWOPS_UNKNOWN: u32 = 0;
pub const SDL_RWOPS_WINFILE: u32 = 1;
pub const SDL_RWOPS_STDFILE: u32 = 2;
pub const SDL_RWOPS_JNIFILE: u32 = 3;
pub const SDL_RWOPS_MEMORY: u32 = 4;
pub const SDL_RWOPS_MEMORY_RO: u32 = 5;

pub const RW_SEEK_SET: i32 = 0;
pub const RW_SEEK_CUR: i32 = 1;
pub const RW_SEEK_END: i32 = 2;

// Audio formats
pub const SDL_AUDIO_MASK_BITSIZE: u16 = 0xFF;
pub const SDL_AUDIO_MASK_DATATYPE: u16 = 1 << 8;
pub const SDL_AUDIO_MASK_ENDIAN: u16 = 1 << 12;
pub const SDL_AUDIO_MASK_SIGNED: u16 = 1 << 15;

pub const AUDIO_U8: u16 = 0x0008;
pub const AUDIO_S8: u16 = 0x8008;
pub const AUDIO_U16LSB: u16 = 0x0010;
pub const AUDIO_S16LSB: u16 = 0x8010;
pub const AUDIO_U16MSB: u16 = 0x1010;
pub const AUDIO_S16MSB: u16 = 0x9010;
pub const AUDIO_U16: u16 = AUDIO_U16LSB;
pub const AUDIO_S16: u16 = AUDIO_S16LSB;
pub const AUDIO_S32LSB: u16 = 0x8020;
pub const AUDIO_S32MSB: u16 = 0x9020;
pub const AUDIO_S32: u16 = AUDIO_S32LSB;
pub const AUDIO_F32LSB: u16 = 0x8120;
pub const AUDIO_F32MSB: u16 = 0x9120;
pub const AUDIO_F32: u16 = AUDIO_F32LSB;

#[cfg(target_endian = "little")]
pub const AUDIO_U16SYS: u16 = AUDIO_U16LSB;
#[cfg(target_endian = "little")]
pub const AUDIO_S16SYS: u16 = AUDIO_S16LSB;
#[cfg(target_endian = "little")]
pub const AUDIO_S32SYS: u16 = AUDIO_S32LSB;
#[cfg(target_endian = "little")]
pub const AUDIO_F32SYS: u16 = AUDIO_F32LSB;
#[cfg(target_endian = "big")]
pub const AUDIO_U16SYS: u16 = AUDIO_U16MSB;
#[cfg(target_endian = "big")]
pub const AUDIO_S16SYS: u16 = AUDIO_S16MSB;
#[cfg(target_endian = "big")]
pub const AUDIO_S32SYS: u16 = AUDIO_S32MSB;
#[cfg(target_endian = "big")]
pub const AUDIO_F32SYS: u16 = AUDIO_F32MSB;

/// `SDL_AUDIO_BITSIZE`.
pub const fn audio_bitsize(format: u16) -> u16 {
    format & SDL_AUDIO_MASK_BITSIZE
}

/// `SDL_AUDIO_ISSIGNED`.
pub const fn audio_is_signed(format: u16) -> bool {
    format & SDL_AUDIO_MASK_SIGNED != 0
}

pub const SDL_AUDIO_ALLOW_FREQUENCY_CHANGE: i32 = 0x0000_0001;
pub const SDL_AUDIO_ALLOW_FORMAT_CHANGE: i32 = 0x0000_0002;
pub const SDL_AUDIO_ALLOW_CHANNELS_CHANGE: i32 = 0x0000_0004;
pub const SDL_AUDIO_ALLOW_ANY_CHANGE: i32 = SDL_AUDIO_ALLOW_FREQUENCY_CHANGE
    | SDL_AUDIO_ALLOW_FORMAT_CHANGE
    | SDL_AUDIO_ALLOW_CHANNELS_CHANGE;

pub const SDL_AUDIO_STOPPED: i32 = 0;
pub const SDL_AUDIO_PLAYING: i32 = 1;
pub const SDL_AUDIO_PAUSED: i32 = 2;

pub const SDL_MIX_MAXVOLUME: i32 = 128;

// Window flags
pub const SDL_WINDOW_FULLSCREEN: u32 = 0x0000_0001;
pub const SDL_WINDOW_OPENGL: u32 = 0x0000_0002;
pub const SDL_WINDOW_SHOWN: u32 = 0x0000_0004;
pub const SDL_WINDOW_HIDDEN: u32 = 0x0000_0008;
pub const SDL_WINDOW_BORDERLESS: u32 = 0x0000_0010;
pub const SDL_WINDOW_RESIZABLE: u32 = 0x0000_0020;

pub const SDL_WINDOWPOS_UNDEFINED: i32 = 0x1FFF_0000;
pub const SDL_WINDOWPOS_CENTERED: i32 = 0x2FFF_0000;

// Renderer flags
pub const SDL_RENDERER_SOFTWARE: u32 = 0x0000_0001;
pub const SDL_RENDERER_ACCELERATED: u32 = 0x0000_0002;
pub const SDL_RENDERER_PRESENTVSYNC: u32 = 0x0000_0004;
pub const SDL_RENDERER_TARGETTEXTURE: u32 = 0x0000_0008;

pub const SDL_TEXTUREACCESS_STATIC: i32 = 0;
pub const SDL_TEXTUREACCESS_STREAMING: i32 = 1;
pub const SDL_TEXTUREACCESS_TARGET: i32 = 2;

pub const SDL_FLIP_NONE: i32 = 0;
pub const SDL_FLIP_HORIZONTAL: i32 = 1;
pub const SDL_FLIP_VERTICAL: i32 = 2;
