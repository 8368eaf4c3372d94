// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

//! The capability table other extensions call the binding through.
//!
//! [`Csdl2Capi`] is published under [`CAPI_NAME`] when the first [`Csdl2`]
//! instance is created. Consumers import it once with [`import`] and call its
//! entries directly. Every wrapper kind has a `validate_*` and a `borrow_*`
//! entry; kinds that can adopt a native pointer also have a `create_*` entry.
//!
//! The field order is part of the compatibility contract. New entries are
//! appended at the end and [`CAPI_VERSION`] is bumped; existing entries are
//! never reordered or removed.
//!
//! [`Csdl2`]: crate::Csdl2

use std::ptr::NonNull;
use std::sync::OnceLock;

use crate::api::Sdl2ApiHandle;
use crate::audio::AudioSpec;
use crate::rwops::RwOps;
use crate::video::{Palette, PixelFormat, Renderer, Surface, Texture, Window};
use crate::{Error, Result, capsule, host};

/// Name the table is published under.
pub const CAPI_NAME: &str = "csdl2._C_API";

/// Current table version.
pub const CAPI_VERSION: u32 = 1;

/// A wrapper around one native resource.
pub trait NativeResource {
    type Raw;

    fn is_valid(&self) -> bool;

    /// Returns the native pointer for one native call.
    fn borrow_ptr(&self) -> Result<NonNull<Self::Raw>>;
}

macro_rules! native_resource {
    ($($wrapper:ty => $raw:ty),* $(,)?) => {
        $(
            impl NativeResource for $wrapper {
                type Raw = $raw;

                fn is_valid(&self) -> bool {
                    <$wrapper>::is_valid(self)
                }

                fn borrow_ptr(&self) -> Result<NonNull<$raw>> {
                    <$wrapper>::borrow_ptr(self)
                }
            }
        )*
    };
}

native_resource! {
    RwOps => csdl2_sys::RWops,
    Surface => csdl2_sys::Surface,
    Palette => csdl2_sys::Palette,
    Window => csdl2_sys::Window,
    Renderer => csdl2_sys::Renderer,
    Texture => csdl2_sys::Texture,
}

impl NativeResource for PixelFormat {
    type Raw = csdl2_sys::PixelFormat;

    fn is_valid(&self) -> bool {
        self.surface().is_valid()
    }

    fn borrow_ptr(&self) -> Result<NonNull<csdl2_sys::PixelFormat>> {
        PixelFormat::borrow_ptr(self)
    }
}

fn validate<W: NativeResource>(wrapper: &W) -> bool {
    wrapper.is_valid()
}

fn borrow<W: NativeResource>(wrapper: &W) -> Result<NonNull<W::Raw>> {
    wrapper.borrow_ptr()
}

fn audio_spec_from_native(native: &csdl2_sys::AudioSpec) -> AudioSpec {
    AudioSpec::default().with_native(native)
}

fn audio_spec_to_native(spec: &AudioSpec) -> csdl2_sys::AudioSpec {
    spec.to_native()
}

type Validate<W> = fn(&W) -> bool;
type Borrow<W, R> = fn(&W) -> Result<NonNull<R>>;
type Create<W, R> = unsafe fn(Sdl2ApiHandle, NonNull<R>) -> W;

/// The exported table.
#[repr(C)]
pub struct Csdl2Capi {
    pub version: u32,
    /// Size of the table in bytes, for consumers built against a newer layout.
    pub size: usize,

    pub validate_rwops: Validate<RwOps>,
    pub borrow_rwops: Borrow<RwOps, csdl2_sys::RWops>,
    pub create_rwops: Create<RwOps, csdl2_sys::RWops>,

    pub audio_spec_from_native: fn(&csdl2_sys::AudioSpec) -> AudioSpec,
    pub audio_spec_to_native: fn(&AudioSpec) -> csdl2_sys::AudioSpec,

    pub validate_surface: Validate<Surface>,
    pub borrow_surface: Borrow<Surface, csdl2_sys::Surface>,
    pub create_surface: Create<Surface, csdl2_sys::Surface>,

    pub validate_pixel_format: Validate<PixelFormat>,
    pub borrow_pixel_format: Borrow<PixelFormat, csdl2_sys::PixelFormat>,

    pub validate_palette: Validate<Palette>,
    pub borrow_palette: Borrow<Palette, csdl2_sys::Palette>,
    pub create_palette: Create<Palette, csdl2_sys::Palette>,

    pub validate_window: Validate<Window>,
    pub borrow_window: Borrow<Window, csdl2_sys::Window>,
    pub create_window: Create<Window, csdl2_sys::Window>,

    pub validate_renderer: Validate<Renderer>,
    pub borrow_renderer: Borrow<Renderer, csdl2_sys::Renderer>,

    pub validate_texture: Validate<Texture>,
    pub borrow_texture: Borrow<Texture, csdl2_sys::Texture>,
}

static CAPI: Csdl2Capi = Csdl2Capi {
    version: CAPI_VERSION,
    size: std::mem::size_of::<Csdl2Capi>(),

    validate_rwops: validate::<RwOps>,
    borrow_rwops: borrow::<RwOps>,
    create_rwops: RwOps::from_raw,

    audio_spec_from_native,
    audio_spec_to_native,

    validate_surface: validate::<Surface>,
    borrow_surface: borrow::<Surface>,
    create_surface: Surface::from_raw,

    validate_pixel_format: validate::<PixelFormat>,
    borrow_pixel_format: borrow::<PixelFormat>,

    validate_palette: validate::<Palette>,
    borrow_palette: borrow::<Palette>,
    create_palette: Palette::from_raw,

    validate_window: validate::<Window>,
    borrow_window: borrow::<Window>,
    create_window: Window::from_raw,

    validate_renderer: validate::<Renderer>,
    borrow_renderer: borrow::<Renderer>,

    validate_texture: validate::<Texture>,
    borrow_texture: borrow::<Texture>,
};

/// Publishes the table. Called when an instance is created.
pub(crate) fn publish() {
    static PUBLISHED: OnceLock<()> = OnceLock::new();
    PUBLISHED.get_or_init(|| {
        if let Err(error) = capsule::publish(CAPI_NAME, &CAPI) {
            tracing::error!("Failed to publish {CAPI_NAME}: {error}");
        }
    });
}

/// Imports the capability table.
///
/// The table is looked up once and cached. On failure the error is also
/// left in the calling thread's pending-error slot, where the host reports it.
///
/// # Errors
///
/// - [`Error::InvalidArg`] if the table has not been published
/// - [`Error::Contract`] if the published table is older than this consumer
///
/// # Examples
///
/// ```
/// use csdl2::{Csdl2, capi};
///
/// # fn main() -> Result<(), csdl2::Error> {
/// let sdl = Csdl2::soft();
/// let surface = sdl.create_rgb_surface(0, 4, 4, 32, [0; 4])?;
///
/// let table = capi::import()?;
/// assert!((table.validate_surface)(&surface));
/// let raw = (table.borrow_surface)(&surface)?;
/// assert_eq!(unsafe { raw.as_ref() }.w, 4);
/// # Ok(())
/// # }
/// ```
pub fn import() -> Result<&'static Csdl2Capi> {
    static IMPORTED: OnceLock<&'static Csdl2Capi> = OnceLock::new();
    if let Some(table) = IMPORTED.get() {
        return Ok(table);
    }
    let table = capsule::import::<Csdl2Capi>(CAPI_NAME)
        .and_then(|table| {
            if table.version < CAPI_VERSION || table.size < std::mem::size_of::<Csdl2Capi>() {
                Err(Error::Contract(format!(
                    "{CAPI_NAME} version {} is older than {CAPI_VERSION}",
                    table.version
                )))
            } else {
                Ok(table)
            }
        })
        .inspect_err(|error| host::set_pending_error(error.clone()))?;
    Ok(IMPORTED.get_or_init(|| table))
}

#[cfg(all(test, feature = "soft"))]
mod tests {
    use super::*;
    use crate::Csdl2;

    #[test]
    fn table_validates_and_borrows() {
        let sdl = Csdl2::soft();
        let table = import().unwrap();
        assert_eq!(table.version, CAPI_VERSION);
        assert_eq!(table.size, std::mem::size_of::<Csdl2Capi>());

        let palette = sdl.alloc_palette(4).unwrap();
        assert!((table.validate_palette)(&palette));
        let raw = (table.borrow_palette)(&palette).unwrap();
        assert_eq!(unsafe { raw.as_ref() }.ncolors, 4);

        palette.free().unwrap();
        assert!(!(table.validate_palette)(&palette));
        assert_eq!(
            (table.borrow_palette)(&palette).unwrap_err(),
            Error::InvalidHandle("SDL_Palette")
        );
    }

    #[test]
    fn created_wrappers_own_the_pointer() {
        let sdl = Csdl2::soft();
        let table = import().unwrap();
        let api = sdl.api().clone();

        let raw = unsafe { api.create_rgb_surface(0, 2, 2, 32, 0, 0, 0, 0) };
        let raw = NonNull::new(raw).unwrap();
        let surface = unsafe { (table.create_surface)(api.clone(), raw) };
        assert_eq!(surface.w().unwrap(), 2);
        let format = surface.format().unwrap();
        assert!((table.validate_pixel_format)(&format));
        surface.free().unwrap();
        assert!(!(table.validate_pixel_format)(&format));
        assert!((table.borrow_pixel_format)(&format).is_err());
    }

    #[test]
    fn audio_spec_entries_copy_the_format() {
        let _sdl = Csdl2::soft();
        let table = import().unwrap();
        let native = csdl2_sys::AudioSpec {
            freq: 22050,
            channels: 1,
            ..Default::default()
        };
        let spec = (table.audio_spec_from_native)(&native);
        assert_eq!((spec.freq, spec.channels), (22050, 1));
        assert!(spec.callback.is_none());
        assert_eq!((table.audio_spec_to_native)(&spec).freq, 22050);
    }
}
