// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

use std::os::raw::c_int;
use std::ptr::NonNull;
use std::sync::{Arc, Mutex};

use csdl2_sys::Color;

use crate::api::Sdl2ApiHandle;
use crate::backlink::WeakBacklinkRegistry;
use crate::buffer::BufferView;
use crate::handle::{Lease, NativeHandle};
use crate::host::lock;
use crate::{Error, Result};

pub(crate) const PALETTE_KIND: &str = "SDL_Palette";

pub(crate) struct PaletteInner {
    pub(crate) api: Sdl2ApiHandle,
    pub(crate) handle: NativeHandle<csdl2_sys::Palette>,
    pub(crate) registry: WeakBacklinkRegistry,
    colors: Mutex<Option<Arc<BufferView<Color>>>>,
}

/// A colour palette (`SDL_Palette`).
///
/// Each wrapper owns one reference on the native palette. Pixel formats using
/// the palette keep their own native reference, so freeing the wrapper never
/// pulls memory from under a surface.
#[derive(Clone)]
pub struct Palette {
    pub(crate) inner: Arc<PaletteInner>,
}

impl Palette {
    fn wrap(api: Sdl2ApiHandle, handle: NativeHandle<csdl2_sys::Palette>) -> Self {
        Self {
            inner: Arc::new(PaletteInner {
                api,
                handle,
                registry: WeakBacklinkRegistry::new(PALETTE_KIND),
                colors: Mutex::new(None),
            }),
        }
    }

    pub(crate) fn alloc(api: Sdl2ApiHandle, ncolors: c_int) -> Result<Self> {
        let raw = unsafe { api.alloc_palette(ncolors) };
        let handle = NativeHandle::from_native(PALETTE_KIND, raw, &api)?;
        tracing::debug!(ncolors, "allocated palette");
        Ok(Self::wrap(api, handle))
    }

    /// Takes ownership of one reference on a palette created elsewhere.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live palette from the same library as `api`, and the
    /// caller's reference must not be released by anyone else.
    pub unsafe fn from_raw(api: Sdl2ApiHandle, ptr: NonNull<csdl2_sys::Palette>) -> Self {
        Self::wrap(api, NativeHandle::new(PALETTE_KIND, ptr))
    }

    /// Wraps a palette owned by someone else, taking a new native reference.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live palette from the same library as `api`.
    pub(crate) unsafe fn from_borrowed(
        api: Sdl2ApiHandle,
        ptr: NonNull<csdl2_sys::Palette>,
    ) -> Self {
        unsafe { (*ptr.as_ptr()).refcount += 1 };
        Self::wrap(api, NativeHandle::new(PALETTE_KIND, ptr))
    }

    pub(crate) fn from_inner(inner: Arc<PaletteInner>) -> Self {
        Self { inner }
    }

    pub fn is_valid(&self) -> bool {
        self.inner.handle.is_valid()
    }

    pub fn borrow_ptr(&self) -> Result<NonNull<csdl2_sys::Palette>> {
        self.inner.handle.borrow_ptr()
    }

    pub(crate) fn lease(&self) -> Result<Lease<'_, csdl2_sys::Palette>> {
        self.inner.handle.lease()
    }

    pub fn ncolors(&self) -> Result<usize> {
        let palette = self.lease()?;
        Ok(unsafe { palette.as_ref().ncolors.max(0) as usize })
    }

    pub fn version(&self) -> Result<u32> {
        let palette = self.lease()?;
        Ok(unsafe { palette.as_ref().version })
    }

    /// Read-only view of the palette entries.
    ///
    /// Modify the palette with [`set_colors`](Self::set_colors).
    pub fn colors(&self) -> Result<Arc<BufferView<Color>>> {
        let palette = self.lease()?;
        let mut cached = lock(&self.inner.colors);
        if let Some(view) = cached.as_ref() {
            return Ok(view.clone());
        }
        let (colors, ncolors) = unsafe { (palette.as_ref().colors, palette.as_ref().ncolors) };
        let colors = NonNull::new(colors)
            .ok_or_else(|| Error::Contract("palette has no colour array".to_string()))?;
        let view = BufferView::native(
            "SDL_Palette.colors",
            colors.cast(),
            ncolors.max(0) as usize,
            true,
            vec![self.inner.registry.register()],
        );
        *cached = Some(view.clone());
        Ok(view)
    }

    /// Copies `colors` into the palette starting at entry `first`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArg`] if the colours do not fit in the palette
    /// - [`Error::Buffer`] while the colours view is exported
    pub fn set_colors(&self, colors: &[Color], first: usize) -> Result<()> {
        let palette = self.lease()?;
        let ncolors = self.ncolors()?;
        if first.checked_add(colors.len()).is_none_or(|end| end > ncolors) {
            return Err(Error::InvalidArg(format!(
                "{} colour(s) at {first} do not fit in a palette of {ncolors}",
                colors.len()
            )));
        }
        if let Some(view) = lock(&self.inner.colors).as_ref()
            && view.export_count() > 0
        {
            return Err(Error::Buffer("palette colours are exported".to_string()));
        }
        let api = &self.inner.api;
        let status = unsafe {
            api.set_palette_colors(
                palette.as_ptr(),
                colors.as_ptr(),
                first as c_int,
                colors.len() as c_int,
            )
        };
        Error::from_status(api, status)
    }

    /// Releases this wrapper's reference on the native palette.
    ///
    /// # Errors
    ///
    /// - [`Error::Contract`] while the colours view is exported
    /// - [`Error::InvalidHandle`] if already freed
    pub fn free(&self) -> Result<()> {
        self.inner.free()
    }
}

impl PaletteInner {
    fn free(&self) -> Result<()> {
        self.handle.validate()?;
        if let Some(view) = lock(&self.colors).as_ref() {
            view.retire()?;
        }
        let palette = self.handle.detach()?;
        self.registry.release_all();
        unsafe { self.api.free_palette(palette.as_ptr()) };
        Ok(())
    }
}

impl Drop for PaletteInner {
    fn drop(&mut self) {
        if self.handle.is_valid()
            && let Err(error) = self.free()
        {
            tracing::error!("Failed to free palette: {error}");
        }
    }
}

impl std::fmt::Debug for Palette {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Palette")
            .field("handle", &self.inner.handle)
            .finish_non_exhaustive()
    }
}

#[cfg(all(test, feature = "soft"))]
mod tests {
    use super::*;
    use crate::ExportFlags;
    use crate::api::soft_api;

    #[test]
    fn colors_are_a_readonly_view() {
        let palette = Palette::alloc(soft_api(), 16).unwrap();
        let colors = palette.colors().unwrap();
        assert_eq!(colors.len(), 16);
        assert_eq!(colors.nbytes(), 64);
        assert!(colors.is_readonly());
        assert!(colors.begin_export(ExportFlags::READ).is_ok());
        assert!(matches!(
            colors.begin_export(ExportFlags::WRITE),
            Err(Error::Buffer(_))
        ));
    }

    #[test]
    fn set_colors_is_visible_through_the_view() {
        let palette = Palette::alloc(soft_api(), 4).unwrap();
        let red = Color { r: 255, g: 0, b: 0, a: 255 };
        palette.set_colors(&[red, red], 2).unwrap();
        let colors = palette.colors().unwrap();
        assert_eq!(colors.get(3).unwrap(), red);
        assert!(matches!(
            palette.set_colors(&[red, red], 3),
            Err(Error::InvalidArg(_))
        ));

        let export = colors.begin_export(ExportFlags::READ).unwrap();
        assert!(matches!(palette.set_colors(&[red], 0), Err(Error::Buffer(_))));
        assert!(matches!(palette.free(), Err(Error::Contract(_))));
        drop(export);

        palette.free().unwrap();
        assert_eq!(colors.get(0).unwrap_err(), Error::InvalidHandle(PALETTE_KIND));
        assert_eq!(palette.free().unwrap_err(), Error::InvalidHandle(PALETTE_KIND));
    }
}
