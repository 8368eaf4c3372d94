// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

//! Runtime-resolved SDL2 function table.

use std::os::raw::{c_char, c_int, c_void};

use crate::{
    AudioSpec, AudioStatus, Color, Palette, PixelFormat, RWops, Rect, Renderer, Surface, Texture,
    Window,
};

macro_rules! sdl2_api {
    ($( fn $name:ident = $sym:literal ( $($arg:ident : $ty:ty),* ) $(-> $ret:ty)? ; )*) => {
        /// Raw entry points of the wrapped library.
        ///
        /// Every field is a plain C function pointer, so the table can be filled
        /// either from a shared library or from an in-process implementation.
        #[derive(Clone, Copy)]
        pub struct Sdl2Fns {
            $( pub $name: unsafe extern "C" fn($($ty),*) $(-> $ret)?, )*
        }

        /// A loaded SDL2 function table.
        ///
        /// When created from a shared library the library stays loaded for as
        /// long as this value lives.
        pub struct Sdl2Api {
            library: Option<libloading::Library>,
            fns: Sdl2Fns,
        }

        impl Sdl2Api {
            /// Loads the shared library at `path` and resolves every entry point.
            pub unsafe fn new<P: AsRef<std::ffi::OsStr>>(path: P) -> Result<Self, libloading::Error> {
                let library = unsafe { libloading::Library::new(path)? };
                unsafe { Self::from_library(library) }
            }

            /// Resolves every entry point from an already opened library.
            pub unsafe fn from_library(library: libloading::Library) -> Result<Self, libloading::Error> {
                let fns = Sdl2Fns {
                    $( $name: unsafe {
                        *library.get::<unsafe extern "C" fn($($ty),*) $(-> $ret)?>(
                            concat!($sym, "\0").as_bytes(),
                        )?
                    }, )*
                };
                Ok(Self { library: Some(library), fns })
            }

            /// Wraps a function table that is not backed by a shared library.
            pub fn from_fns(fns: Sdl2Fns) -> Self {
                Self { library: None, fns }
            }

            /// Returns `true` if the entry points come from a shared library.
            pub fn is_dynamic(&self) -> bool {
                self.library.is_some()
            }

            pub fn fns(&self) -> &Sdl2Fns {
                &self.fns
            }

            $(
                #[inline]
                pub unsafe fn $name(&self, $($arg: $ty),*) $(-> $ret)? {
                    unsafe { (self.fns.$name)($($arg),*) }
                }
            )*
        }
    };
}

sdl2_api! {
    fn get_error = "SDL_GetError"() -> *const c_char;
    fn clear_error = "SDL_ClearError"();

    fn alloc_rw = "SDL_AllocRW"() -> *mut RWops;
    fn free_rw = "SDL_FreeRW"(area: *mut RWops);
    fn rw_from_file = "SDL_RWFromFile"(file: *const c_char, mode: *const c_char) -> *mut RWops;
    fn rw_from_mem = "SDL_RWFromMem"(mem: *mut c_void, size: c_int) -> *mut RWops;
    fn rw_from_const_mem = "SDL_RWFromConstMem"(mem: *const c_void, size: c_int) -> *mut RWops;

    fn create_rgb_surface = "SDL_CreateRGBSurface"(
        flags: u32, width: c_int, height: c_int, depth: c_int,
        rmask: u32, gmask: u32, bmask: u32, amask: u32
    ) -> *mut Surface;
    fn create_rgb_surface_from = "SDL_CreateRGBSurfaceFrom"(
        pixels: *mut c_void, width: c_int, height: c_int, depth: c_int, pitch: c_int,
        rmask: u32, gmask: u32, bmask: u32, amask: u32
    ) -> *mut Surface;
    fn free_surface = "SDL_FreeSurface"(surface: *mut Surface);
    fn lock_surface = "SDL_LockSurface"(surface: *mut Surface) -> c_int;
    fn unlock_surface = "SDL_UnlockSurface"(surface: *mut Surface);
    fn fill_rect = "SDL_FillRect"(dst: *mut Surface, rect: *const Rect, color: u32) -> c_int;

    fn alloc_palette = "SDL_AllocPalette"(ncolors: c_int) -> *mut Palette;
    fn free_palette = "SDL_FreePalette"(palette: *mut Palette);
    fn set_palette_colors = "SDL_SetPaletteColors"(
        palette: *mut Palette, colors: *const Color, firstcolor: c_int, ncolors: c_int
    ) -> c_int;
    fn set_pixel_format_palette = "SDL_SetPixelFormatPalette"(
        format: *mut PixelFormat, palette: *mut Palette
    ) -> c_int;
    fn map_rgba = "SDL_MapRGBA"(format: *const PixelFormat, r: u8, g: u8, b: u8, a: u8) -> u32;

    fn create_window = "SDL_CreateWindow"(
        title: *const c_char, x: c_int, y: c_int, w: c_int, h: c_int, flags: u32
    ) -> *mut Window;
    fn destroy_window = "SDL_DestroyWindow"(window: *mut Window);
    fn get_window_id = "SDL_GetWindowID"(window: *mut Window) -> u32;
    fn get_window_title = "SDL_GetWindowTitle"(window: *mut Window) -> *const c_char;

    fn create_renderer = "SDL_CreateRenderer"(window: *mut Window, index: c_int, flags: u32) -> *mut Renderer;
    fn create_software_renderer = "SDL_CreateSoftwareRenderer"(surface: *mut Surface) -> *mut Renderer;
    fn destroy_renderer = "SDL_DestroyRenderer"(renderer: *mut Renderer);

    fn create_texture = "SDL_CreateTexture"(
        renderer: *mut Renderer, format: u32, access: c_int, w: c_int, h: c_int
    ) -> *mut Texture;
    fn destroy_texture = "SDL_DestroyTexture"(texture: *mut Texture);
    fn lock_texture = "SDL_LockTexture"(
        texture: *mut Texture, rect: *const Rect, pixels: *mut *mut c_void, pitch: *mut c_int
    ) -> c_int;
    fn unlock_texture = "SDL_UnlockTexture"(texture: *mut Texture);

    fn open_audio = "SDL_OpenAudio"(desired: *mut AudioSpec, obtained: *mut AudioSpec) -> c_int;
    fn close_audio = "SDL_CloseAudio"();
    fn pause_audio = "SDL_PauseAudio"(pause_on: c_int);
    fn get_audio_status = "SDL_GetAudioStatus"() -> AudioStatus;
    fn lock_audio = "SDL_LockAudio"();
    fn unlock_audio = "SDL_UnlockAudio"();
    fn load_wav_rw = "SDL_LoadWAV_RW"(
        src: *mut RWops, freesrc: c_int, spec: *mut AudioSpec,
        audio_buf: *mut *mut u8, audio_len: *mut u32
    ) -> *mut AudioSpec;
    fn free_wav = "SDL_FreeWAV"(audio_buf: *mut u8);
}

impl std::fmt::Debug for Sdl2Api {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sdl2Api")
            .field("dynamic", &self.is_dynamic())
            .finish_non_exhaustive()
    }
}
