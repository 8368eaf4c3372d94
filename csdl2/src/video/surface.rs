// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

//! Surfaces (`SDL_Surface`) and their pixel formats.

use std::os::raw::{c_int, c_void};
use std::ptr::NonNull;
use std::sync::{Arc, Mutex};

use csdl2_sys::Rect;

use super::pixels::{Palette, PaletteInner};
use super::render::Dependents;
use crate::api::Sdl2ApiHandle;
use crate::backlink::{WeakBacklinkRegistry, WeakRef};
use crate::buffer::{BufferPin, BufferView, ExportFlags};
use crate::gc::Traverse;
use crate::handle::{Lease, NativeHandle};
use crate::host::{HostRef, lock};
use crate::{Error, Result};

pub(crate) const SURFACE_KIND: &str = "SDL_Surface";

/// Colour masks of a surface, in `[r, g, b, a]` order.
pub type Masks = [u32; 4];

pub(crate) struct SurfaceInner {
    api: Sdl2ApiHandle,
    handle: NativeHandle<csdl2_sys::Surface>,
    registry: WeakBacklinkRegistry,
    pixels: Mutex<Option<Arc<BufferView>>>,
    host_pixels: Mutex<Option<BufferPin>>,
    palette: Mutex<Option<WeakRef<PaletteInner>>>,
    userdata: Mutex<Option<HostRef>>,
    pub(crate) renderers: Dependents,
}

/// A surface: a block of pixels in a given [`PixelFormat`].
///
/// Surfaces created with [`create_rgb_surface`](crate::Csdl2::create_rgb_surface)
/// own their pixels. Surfaces created with
/// [`create_rgb_surface_from`](crate::Csdl2::create_rgb_surface_from) draw into a
/// host buffer, which stays pinned until the surface is freed.
#[derive(Clone)]
pub struct Surface {
    pub(crate) inner: Arc<SurfaceInner>,
}

fn bytes_per_pixel(depth: c_int) -> i64 {
    (i64::from(depth) + 7) / 8
}

impl Surface {
    fn wrap(
        api: Sdl2ApiHandle,
        handle: NativeHandle<csdl2_sys::Surface>,
        host_pixels: Option<BufferPin>,
    ) -> Self {
        Self {
            inner: Arc::new(SurfaceInner {
                api,
                handle,
                registry: WeakBacklinkRegistry::new(SURFACE_KIND),
                pixels: Mutex::new(None),
                host_pixels: Mutex::new(host_pixels),
                palette: Mutex::new(None),
                userdata: Mutex::new(None),
                renderers: Dependents::default(),
            }),
        }
    }

    /// Takes ownership of a surface created elsewhere.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live surface from the same library as `api`, and
    /// nobody else may free it.
    pub unsafe fn from_raw(api: Sdl2ApiHandle, ptr: NonNull<csdl2_sys::Surface>) -> Self {
        Self::wrap(api, NativeHandle::new(SURFACE_KIND, ptr), None)
    }

    pub(crate) fn create(
        api: Sdl2ApiHandle,
        flags: u32,
        width: c_int,
        height: c_int,
        depth: c_int,
        [rmask, gmask, bmask, amask]: Masks,
    ) -> Result<Self> {
        let raw = unsafe {
            api.create_rgb_surface(flags, width, height, depth, rmask, gmask, bmask, amask)
        };
        let handle = NativeHandle::from_native(SURFACE_KIND, raw, &api)?;
        tracing::debug!(width, height, depth, "created surface");
        Ok(Self::wrap(api, handle, None))
    }

    /// Nothing is pinned or allocated unless every check passes.
    pub(crate) fn create_from(
        api: Sdl2ApiHandle,
        pixels: &Arc<BufferView>,
        width: c_int,
        height: c_int,
        depth: c_int,
        pitch: c_int,
        [rmask, gmask, bmask, amask]: Masks,
    ) -> Result<Self> {
        if pixels.is_readonly() {
            return Err(Error::Buffer("Object is not writable.".to_string()));
        }
        if i64::from(pitch) < i64::from(width) * bytes_per_pixel(depth) {
            return Err(Error::InvalidArg("invalid pitch".to_string()));
        }
        let required = i64::from(pitch) * i64::from(height);
        if required != pixels.nbytes() as i64 {
            return Err(Error::Buffer(format!(
                "buffer of {} byte(s) does not match pitch * height = {required}",
                pixels.nbytes()
            )));
        }
        let pin = pixels.pin(ExportFlags::WRITE)?;
        let raw = unsafe {
            api.create_rgb_surface_from(
                pin.as_ptr() as *mut c_void,
                width,
                height,
                depth,
                pitch,
                rmask,
                gmask,
                bmask,
                amask,
            )
        };
        let handle = NativeHandle::from_native(SURFACE_KIND, raw, &api)?;
        tracing::debug!(width, height, depth, pitch, "created surface over host pixels");
        Ok(Self::wrap(api, handle, Some(pin)))
    }

    pub fn is_valid(&self) -> bool {
        self.inner.handle.is_valid()
    }

    pub fn borrow_ptr(&self) -> Result<NonNull<csdl2_sys::Surface>> {
        self.inner.handle.borrow_ptr()
    }

    pub(crate) fn lease(&self) -> Result<Lease<'_, csdl2_sys::Surface>> {
        self.inner.handle.lease()
    }

    fn read<T>(&self, f: impl FnOnce(&csdl2_sys::Surface) -> T) -> Result<T> {
        let surface = self.lease()?;
        Ok(f(unsafe { surface.as_ref() }))
    }

    pub fn flags(&self) -> Result<u32> {
        self.read(|s| s.flags)
    }

    pub fn w(&self) -> Result<c_int> {
        self.read(|s| s.w)
    }

    pub fn h(&self) -> Result<c_int> {
        self.read(|s| s.h)
    }

    pub fn pitch(&self) -> Result<c_int> {
        self.read(|s| s.pitch)
    }

    pub fn locked(&self) -> Result<bool> {
        self.read(|s| s.locked != 0)
    }

    pub fn refcount(&self) -> Result<c_int> {
        self.read(|s| s.refcount)
    }

    pub fn clip_rect(&self) -> Result<Rect> {
        self.read(|s| s.clip_rect)
    }

    /// Host object attached to the surface.
    pub fn userdata(&self) -> Result<Option<HostRef>> {
        self.inner.handle.validate()?;
        Ok(lock(&self.inner.userdata).clone())
    }

    pub fn set_userdata(&self, userdata: Option<HostRef>) -> Result<()> {
        self.inner.handle.validate()?;
        *lock(&self.inner.userdata) = userdata;
        Ok(())
    }

    /// The surface's pixel format. The returned wrapper keeps the surface alive.
    pub fn format(&self) -> Result<PixelFormat> {
        self.inner.handle.validate()?;
        Ok(PixelFormat {
            surface: self.clone(),
        })
    }

    /// Writable view of the pixel rows (`pitch * h` bytes).
    ///
    /// The view fails with [`Error::InvalidHandle`] once the surface is freed.
    /// A surface drawing into host pixels returns the host buffer itself,
    /// which stays valid after the surface is gone.
    pub fn pixels(&self) -> Result<Arc<BufferView>> {
        let surface = self.lease()?;
        if let Some(pin) = lock(&self.inner.host_pixels).as_ref() {
            return Ok(pin.view().clone());
        }
        let mut cached = lock(&self.inner.pixels);
        if let Some(view) = cached.as_ref() {
            return Ok(view.clone());
        }
        let (pixels, len) = unsafe {
            let s = surface.as_ref();
            (s.pixels as *mut u8, s.pitch.max(0) as usize * s.h.max(0) as usize)
        };
        let ptr = match NonNull::new(pixels) {
            Some(ptr) => ptr,
            None if len == 0 => NonNull::dangling(),
            None => return Err(Error::Contract("surface has no pixels".to_string())),
        };
        let view = BufferView::native(
            "SDL_Surface.pixels",
            ptr,
            len,
            false,
            vec![self.inner.registry.register()],
        );
        *cached = Some(view.clone());
        Ok(view)
    }

    pub fn lock(&self) -> Result<()> {
        let surface = self.lease()?;
        let api = &self.inner.api;
        Error::from_status(api, unsafe { api.lock_surface(surface.as_ptr()) })
    }

    pub fn unlock(&self) -> Result<()> {
        let surface = self.lease()?;
        unsafe { self.inner.api.unlock_surface(surface.as_ptr()) };
        Ok(())
    }

    /// Fills `rect` (or the whole clip rectangle) with a mapped pixel value.
    pub fn fill_rect(&self, rect: Option<&Rect>, color: u32) -> Result<()> {
        let surface = self.lease()?;
        let rect = rect.map_or(std::ptr::null(), |rect| rect as *const Rect);
        let api = &self.inner.api;
        Error::from_status(api, unsafe { api.fill_rect(surface.as_ptr(), rect, color) })
    }

    /// Frees the surface (`SDL_FreeSurface`).
    ///
    /// Software renderers drawing into the surface are destroyed first.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidHandle`] if the surface was already freed
    /// - [`Error::Contract`] if the pixels view is still exported; nothing is
    ///   freed in that case
    pub fn free(&self) -> Result<()> {
        self.inner.free()
    }
}

impl SurfaceInner {
    fn free(&self) -> Result<()> {
        self.handle.validate()?;
        if let Some(view) = lock(&self.pixels).as_ref() {
            view.retire()?;
        }
        self.renderers.destroy_all();
        let surface = self.handle.detach()?;
        // Host references, then weak registrations, then the native surface.
        let userdata = lock(&self.userdata).take();
        let host_pixels = lock(&self.host_pixels).take();
        drop(userdata);
        drop(host_pixels);
        self.registry.release_all();
        unsafe { self.api.free_surface(surface.as_ptr()) };
        tracing::debug!("freed surface");
        Ok(())
    }
}

impl Drop for SurfaceInner {
    fn drop(&mut self) {
        if self.handle.is_valid()
            && let Err(error) = self.free()
        {
            tracing::error!("Failed to free surface: {error}");
        }
    }
}

impl Traverse for Surface {
    fn traverse(&self, visit: &mut dyn FnMut(&HostRef)) {
        if let Some(userdata) = lock(&self.inner.userdata).as_ref() {
            visit(userdata);
        }
    }

    fn clear(&self) {
        let userdata = lock(&self.inner.userdata).take();
        drop(userdata);
    }
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("handle", &self.inner.handle)
            .finish_non_exhaustive()
    }
}

/// The pixel format of a [`Surface`].
#[derive(Clone, Debug)]
pub struct PixelFormat {
    surface: Surface,
}

impl PixelFormat {
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Returns the native format pointer without holding the surface.
    pub fn borrow_ptr(&self) -> Result<NonNull<csdl2_sys::PixelFormat>> {
        let surface = self.surface.borrow_ptr()?;
        format_of(surface)
    }

    /// Runs `f` on the format while the surface is held.
    fn with_format<T>(
        &self,
        f: impl FnOnce(NonNull<csdl2_sys::PixelFormat>) -> Result<T>,
    ) -> Result<T> {
        let surface = self.surface.lease()?;
        f(format_of(*surface)?)
    }

    fn read<T>(&self, f: impl FnOnce(&csdl2_sys::PixelFormat) -> T) -> Result<T> {
        self.with_format(|format| Ok(f(unsafe { format.as_ref() })))
    }

    /// The `SDL_PIXELFORMAT_*` value.
    pub fn format(&self) -> Result<u32> {
        self.read(|f| f.format)
    }

    pub fn bits_per_pixel(&self) -> Result<u8> {
        self.read(|f| f.BitsPerPixel)
    }

    pub fn bytes_per_pixel(&self) -> Result<u8> {
        self.read(|f| f.BytesPerPixel)
    }

    pub fn masks(&self) -> Result<Masks> {
        self.read(|f| [f.Rmask, f.Gmask, f.Bmask, f.Amask])
    }

    /// Maps an RGBA colour to a pixel value of this format.
    pub fn map_rgba(&self, r: u8, g: u8, b: u8, a: u8) -> Result<u32> {
        self.with_format(|format| {
            Ok(unsafe { self.surface.inner.api.map_rgba(format.as_ptr(), r, g, b, a) })
        })
    }

    /// Makes the format use `palette`.
    ///
    /// The format keeps its own native reference on the palette and a weak
    /// link to the wrapper.
    pub fn set_palette(&self, palette: &Palette) -> Result<()> {
        self.with_format(|format| {
            let native = palette.lease()?;
            let api = &self.surface.inner.api;
            Error::from_status(api, unsafe {
                api.set_pixel_format_palette(format.as_ptr(), native.as_ptr())
            })?;
            *lock(&self.surface.inner.palette) = Some(WeakRef::new(
                &palette.inner.registry,
                &palette.inner,
            ));
            Ok(())
        })
    }

    /// The palette of an indexed format.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidHandle`] if the palette was set from a wrapper that has
    /// since been freed.
    pub fn palette(&self) -> Result<Option<Palette>> {
        self.with_format(|format| {
            let mut linked = lock(&self.surface.inner.palette);
            if let Some(link) = linked.as_ref() {
                return link.upgrade().map(|inner| Some(Palette::from_inner(inner)));
            }
            let Some(native) = NonNull::new(unsafe { format.as_ref().palette }) else {
                return Ok(None);
            };
            let api = self.surface.inner.api.clone();
            let palette = unsafe { Palette::from_borrowed(api, native) };
            *linked = Some(WeakRef::new(&palette.inner.registry, &palette.inner));
            Ok(Some(palette))
        })
    }
}

fn format_of(surface: NonNull<csdl2_sys::Surface>) -> Result<NonNull<csdl2_sys::PixelFormat>> {
    NonNull::new(unsafe { surface.as_ref().format })
        .ok_or_else(|| Error::Contract("surface has no pixel format".to_string()))
}

#[cfg(all(test, feature = "soft"))]
mod tests {
    use super::*;
    use crate::api::soft_api;
    use csdl2_sys::Color;

    #[test]
    fn free_is_refused_while_pixels_are_exported() {
        let surface = Surface::create(soft_api(), 0, 4, 2, 32, [0; 4]).unwrap();
        let pixels = surface.pixels().unwrap();
        assert_eq!(pixels.len(), 32);

        let export = pixels.begin_export(ExportFlags::READ).unwrap();
        assert!(matches!(surface.free(), Err(Error::Contract(_))));
        assert!(surface.is_valid());
        drop(export);

        surface.free().unwrap();
        assert_eq!(surface.free().unwrap_err(), Error::InvalidHandle(SURFACE_KIND));
        assert_eq!(pixels.get(0).unwrap_err(), Error::InvalidHandle(SURFACE_KIND));
        assert_eq!(surface.w().unwrap_err(), Error::InvalidHandle(SURFACE_KIND));
    }

    #[test]
    fn fill_rect_writes_through_to_the_view() {
        let surface = Surface::create(soft_api(), 0, 2, 2, 32, [0; 4]).unwrap();
        let color = surface.format().unwrap().map_rgba(1, 2, 3, 4).unwrap();
        surface
            .fill_rect(Some(&Rect { x: 1, y: 0, w: 1, h: 1 }), color)
            .unwrap();
        let pixels = surface.pixels().unwrap();
        assert_eq!(pixels.get(0).unwrap(), 0);
        assert_eq!(pixels.to_vec().unwrap()[4..8], color.to_ne_bytes());
    }

    #[test]
    fn wrong_sized_host_buffer_allocates_nothing() {
        let before = csdl2_sys::soft::live_allocations();
        let buffer = BufferView::new(vec![0u8; 4 * 4 * 3 - 1]);
        let result = Surface::create_from(soft_api(), &buffer, 4, 3, 32, 16, [0; 4]);
        assert!(matches!(result, Err(Error::Buffer(_))));
        assert_eq!(buffer.export_count(), 0);
        assert!(csdl2_sys::soft::live_allocations() <= before);

        let buffer = BufferView::new(vec![0u8; 48]);
        assert_eq!(
            Surface::create_from(soft_api(), &buffer, 4, 3, 32, 15, [0; 4]).unwrap_err(),
            Error::InvalidArg("invalid pitch".to_string())
        );
        let readonly = BufferView::new_readonly(vec![0u8; 48]);
        assert!(matches!(
            Surface::create_from(soft_api(), &readonly, 4, 3, 32, 16, [0; 4]),
            Err(Error::Buffer(_))
        ));
    }

    #[test]
    fn host_pixels_stay_pinned_until_free() {
        let buffer = BufferView::new(vec![0u8; 16]);
        let surface = Surface::create_from(soft_api(), &buffer, 2, 2, 32, 8, [0; 4]).unwrap();
        assert_eq!(buffer.export_count(), 1);
        assert!(matches!(buffer.resize(32, 0), Err(Error::Buffer(_))));
        surface.fill_rect(None, 0x0102_0304).unwrap();
        assert_eq!(buffer.get(0).unwrap(), 0x0102_0304u32.to_ne_bytes()[0]);
        surface.free().unwrap();
        assert_eq!(buffer.export_count(), 0);
    }

    #[test]
    fn host_pixels_belong_to_the_host_buffer() {
        let buffer = BufferView::new(vec![0u8; 16]);
        let surface = Surface::create_from(soft_api(), &buffer, 2, 2, 32, 8, [0; 4]).unwrap();
        let pixels = surface.pixels().unwrap();
        assert!(Arc::ptr_eq(&pixels, &buffer));
        drop(pixels);

        // Only the surface keeps the buffer alive now.
        let weak = Arc::downgrade(&buffer);
        drop(buffer);
        let reader = weak.upgrade().unwrap();
        let export = reader.begin_export(ExportFlags::READ).unwrap();
        // Reading the host buffer does not hold the surface.
        surface.free().unwrap();
        assert_eq!(export.as_slice(), &[0u8; 16]);
        drop(export);
        assert_eq!(reader.export_count(), 0);
        assert!(reader.is_valid());
        drop(reader);
        assert!(weak.upgrade().is_none());
        assert_eq!(surface.pixels().unwrap_err(), Error::InvalidHandle(SURFACE_KIND));
    }

    #[test]
    fn palette_link_dies_with_the_wrapper() {
        let api = soft_api();
        let surface = Surface::create(api.clone(), 0, 2, 2, 8, [0; 4]).unwrap();
        let format = surface.format().unwrap();
        let palette = Palette::alloc(api, 8).unwrap();
        let blue = Color { r: 0, g: 0, b: 255, a: 255 };
        palette.set_colors(&[blue], 0).unwrap();

        format.set_palette(&palette).unwrap();
        let found = format.palette().unwrap().unwrap();
        assert_eq!(found.colors().unwrap().get(0).unwrap(), blue);
        assert_eq!(format.map_rgba(0, 0, 255, 255).unwrap(), 0);

        drop(found);
        palette.free().unwrap();
        assert_eq!(
            format.palette().unwrap_err(),
            Error::InvalidHandle(super::super::pixels::PALETTE_KIND)
        );
        // The native format still holds its own reference.
        assert_eq!(format.map_rgba(0, 0, 255, 255).unwrap(), 0);
    }

    #[test]
    fn indexed_surfaces_expose_their_native_palette() {
        let surface = Surface::create(soft_api(), 0, 1, 1, 8, [0; 4]).unwrap();
        let palette = surface.format().unwrap().palette().unwrap().unwrap();
        assert_eq!(palette.ncolors().unwrap(), 256);
        palette.free().unwrap();
        surface.free().unwrap();
    }
}
