// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

//! Renderers and textures.
//!
//! A renderer keeps its render target (window or surface) alive. Destroying a
//! renderer destroys its textures on the native side, so textures only hold a
//! weak backlink to the renderer and skip their own native teardown once it
//! is gone.

use std::os::raw::{c_int, c_void};
use std::ptr::{self, NonNull};
use std::sync::{Arc, Mutex, Weak};

use csdl2_sys::Rect;

use super::surface::Surface;
use super::window::Window;
use crate::api::Sdl2ApiHandle;
use crate::backlink::{Backlink, WeakBacklinkRegistry};
use crate::buffer::BufferView;
use crate::gc::Traverse;
use crate::handle::{Lease, NativeHandle};
use crate::host::{HostRef, lock};
use crate::{Error, Result};

pub(crate) const RENDERER_KIND: &str = "SDL_Renderer";
pub(crate) const TEXTURE_KIND: &str = "SDL_Texture";

/// Renderers that draw into a window or surface.
///
/// The target destroys them before it goes away itself.
#[derive(Default)]
pub(crate) struct Dependents(Mutex<Vec<Weak<RendererInner>>>);

impl Dependents {
    fn register(&self, renderer: &Arc<RendererInner>) {
        let mut renderers = lock(&self.0);
        renderers.retain(|r| r.strong_count() > 0);
        renderers.push(Arc::downgrade(renderer));
    }

    pub(crate) fn destroy_all(&self) {
        let renderers: Vec<_> = lock(&self.0).drain(..).collect();
        for renderer in renderers.iter().filter_map(Weak::upgrade) {
            if renderer.handle.is_valid()
                && let Err(error) = renderer.destroy()
            {
                tracing::error!("Failed to destroy renderer: {error}");
            }
        }
    }
}

/// What a renderer draws into.
#[derive(Clone, Debug)]
pub enum RenderTarget {
    Window(Window),
    Surface(Surface),
}

impl RenderTarget {
    fn host_ref(&self) -> HostRef {
        match self {
            RenderTarget::Window(window) => HostRef::from_arc(window.inner.clone()),
            RenderTarget::Surface(surface) => HostRef::from_arc(surface.inner.clone()),
        }
    }
}

pub(crate) struct RendererInner {
    api: Sdl2ApiHandle,
    handle: NativeHandle<csdl2_sys::Renderer>,
    registry: WeakBacklinkRegistry,
    target: Mutex<Option<RenderTarget>>,
}

/// A 2D renderer (`SDL_Renderer`).
#[derive(Clone)]
pub struct Renderer {
    inner: Arc<RendererInner>,
}

impl Renderer {
    fn wrap(
        api: Sdl2ApiHandle,
        handle: NativeHandle<csdl2_sys::Renderer>,
        target: RenderTarget,
    ) -> Self {
        let inner = Arc::new(RendererInner {
            api,
            handle,
            registry: WeakBacklinkRegistry::new(RENDERER_KIND),
            target: Mutex::new(Some(target.clone())),
        });
        match &target {
            RenderTarget::Window(window) => window.inner.renderers.register(&inner),
            RenderTarget::Surface(surface) => surface.inner.renderers.register(&inner),
        }
        Self { inner }
    }

    pub(crate) fn for_window(
        api: Sdl2ApiHandle,
        window: &Window,
        index: c_int,
        flags: u32,
    ) -> Result<Self> {
        let target = window.lease()?;
        let raw = unsafe { api.create_renderer(target.as_ptr(), index, flags) };
        let handle = NativeHandle::from_native(RENDERER_KIND, raw, &api)?;
        tracing::debug!(index, flags, "created renderer");
        Ok(Self::wrap(api, handle, RenderTarget::Window(window.clone())))
    }

    pub(crate) fn for_surface(api: Sdl2ApiHandle, surface: &Surface) -> Result<Self> {
        let target = surface.lease()?;
        let raw = unsafe { api.create_software_renderer(target.as_ptr()) };
        let handle = NativeHandle::from_native(RENDERER_KIND, raw, &api)?;
        tracing::debug!("created software renderer");
        Ok(Self::wrap(api, handle, RenderTarget::Surface(surface.clone())))
    }

    pub fn is_valid(&self) -> bool {
        self.inner.handle.is_valid()
    }

    pub fn borrow_ptr(&self) -> Result<NonNull<csdl2_sys::Renderer>> {
        self.inner.handle.borrow_ptr()
    }

    fn lease(&self) -> Result<Lease<'_, csdl2_sys::Renderer>> {
        self.inner.handle.lease()
    }

    /// The window or surface this renderer draws into, until it is destroyed.
    pub fn target(&self) -> Result<RenderTarget> {
        self.inner.handle.validate()?;
        lock(&self.inner.target)
            .clone()
            .ok_or_else(|| Error::Contract("renderer has no target".to_string()))
    }

    /// Creates a texture for this renderer.
    ///
    /// # Arguments
    ///
    /// * `format` - An `SDL_PIXELFORMAT_*` value
    /// * `access` - An `SDL_TEXTUREACCESS_*` value
    /// * `w`, `h` - Size in pixels
    pub fn create_texture(
        &self,
        format: u32,
        access: c_int,
        w: c_int,
        h: c_int,
    ) -> Result<Texture> {
        let renderer = self.lease()?;
        let api = &self.inner.api;
        let raw = unsafe { api.create_texture(renderer.as_ptr(), format, access, w, h) };
        let handle = NativeHandle::from_native(TEXTURE_KIND, raw, api)?;
        Ok(Texture {
            inner: Arc::new(TextureInner {
                api: api.clone(),
                handle,
                renderer: self.inner.registry.register(),
                owner: Arc::downgrade(&self.inner),
                registry: WeakBacklinkRegistry::new(TEXTURE_KIND),
                locked: Mutex::new(None),
                format,
                access,
                w,
                h,
            }),
        })
    }

    /// Destroys the renderer and, natively, all of its textures.
    pub fn destroy(&self) -> Result<()> {
        self.inner.destroy()
    }
}

impl RendererInner {
    fn destroy(&self) -> Result<()> {
        let target = lock(&self.target).take();
        let renderer = self.handle.detach()?;
        self.registry.release_all();
        unsafe { self.api.destroy_renderer(renderer.as_ptr()) };
        tracing::debug!("destroyed renderer");
        // The target outlives the native renderer.
        drop(target);
        Ok(())
    }
}

impl Drop for RendererInner {
    fn drop(&mut self) {
        if self.handle.is_valid()
            && let Err(error) = self.destroy()
        {
            tracing::error!("Failed to destroy renderer: {error}");
        }
    }
}

impl Traverse for Renderer {
    fn traverse(&self, visit: &mut dyn FnMut(&HostRef)) {
        if let Some(target) = lock(&self.inner.target).as_ref() {
            visit(&target.host_ref());
        }
    }

    fn clear(&self) {
        // Dropping the target may cascade into this renderer; release the lock first.
        let target = lock(&self.inner.target).take();
        drop(target);
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("handle", &self.inner.handle)
            .finish_non_exhaustive()
    }
}

struct TextureInner {
    api: Sdl2ApiHandle,
    handle: NativeHandle<csdl2_sys::Texture>,
    renderer: Backlink,
    owner: Weak<RendererInner>,
    registry: WeakBacklinkRegistry,
    locked: Mutex<Option<Arc<BufferView>>>,
    format: u32,
    access: c_int,
    w: c_int,
    h: c_int,
}

/// A texture (`SDL_Texture`) owned by a [`Renderer`].
#[derive(Clone)]
pub struct Texture {
    inner: Arc<TextureInner>,
}

impl Texture {
    /// Checks the renderer first: its destruction also destroyed the texture.
    pub fn borrow_ptr(&self) -> Result<NonNull<csdl2_sys::Texture>> {
        self.inner.renderer.check()?;
        self.inner.handle.borrow_ptr()
    }

    pub fn is_valid(&self) -> bool {
        self.borrow_ptr().is_ok()
    }

    pub fn format(&self) -> Result<u32> {
        self.borrow_ptr().map(|_| self.inner.format)
    }

    pub fn access(&self) -> Result<c_int> {
        self.borrow_ptr().map(|_| self.inner.access)
    }

    pub fn size(&self) -> Result<(c_int, c_int)> {
        self.borrow_ptr().map(|_| (self.inner.w, self.inner.h))
    }

    /// Locks `rect` (or the whole texture) for writing.
    ///
    /// Returns a writable view over the locked pixels and the row pitch. The
    /// view is invalidated by [`unlock`](Self::unlock).
    pub fn lock(&self, rect: Option<&Rect>) -> Result<(Arc<BufferView>, c_int)> {
        self.inner.with_texture(|texture| self.lock_held(texture, rect))
    }

    fn lock_held(
        &self,
        texture: NonNull<csdl2_sys::Texture>,
        rect: Option<&Rect>,
    ) -> Result<(Arc<BufferView>, c_int)> {
        let mut locked = lock(&self.inner.locked);
        if locked.is_some() {
            return Err(Error::Buffer("texture is already locked".to_string()));
        }
        let area = rect.copied().unwrap_or(Rect {
            x: 0,
            y: 0,
            w: self.inner.w,
            h: self.inner.h,
        });
        let api = &self.inner.api;
        let mut pixels: *mut c_void = ptr::null_mut();
        let mut pitch: c_int = 0;
        let rect_ptr = rect.map_or(ptr::null(), |rect| rect as *const Rect);
        Error::from_status(api, unsafe {
            api.lock_texture(texture.as_ptr(), rect_ptr, &mut pixels, &mut pitch)
        })?;
        let Some(pixels) = NonNull::new(pixels as *mut u8) else {
            unsafe { api.unlock_texture(texture.as_ptr()) };
            return Err(Error::Contract("locked texture has no pixels".to_string()));
        };
        let row = area.w.max(0) as usize * csdl2_sys::bytes_per_pixel(self.inner.format) as usize;
        let rows = area.h.max(0) as usize;
        let len = match rows {
            0 => 0,
            rows => pitch.max(0) as usize * (rows - 1) + row,
        };
        let view = BufferView::native(
            "SDL_Texture.pixels",
            pixels,
            len,
            false,
            vec![self.inner.renderer.clone(), self.inner.registry.register()],
        );
        *locked = Some(view.clone());
        Ok((view, pitch))
    }

    /// Unlocks the texture, invalidating the view returned by [`lock`](Self::lock).
    ///
    /// # Errors
    ///
    /// [`Error::Buffer`] while that view is exported.
    pub fn unlock(&self) -> Result<()> {
        self.inner.with_texture(|texture| {
            let mut locked = lock(&self.inner.locked);
            if let Some(view) = locked.as_ref() {
                if view.export_count() > 0 {
                    return Err(Error::Buffer(
                        "locked texture pixels are still exported".to_string(),
                    ));
                }
                view.retire()?;
            }
            locked.take();
            unsafe { self.inner.api.unlock_texture(texture.as_ptr()) };
            Ok(())
        })
    }

    pub fn destroy(&self) -> Result<()> {
        self.inner.destroy()
    }
}

impl TextureInner {
    /// Holds the renderer so it cannot destroy the texture natively meanwhile.
    fn with_renderer<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        self.renderer.check()?;
        let renderer = self
            .owner
            .upgrade()
            .ok_or(Error::InvalidHandle(RENDERER_KIND))?;
        let held = renderer.handle.lease()?;
        let result = f();
        drop(held);
        result
    }

    /// Runs `f` on the texture while both it and its renderer are held.
    fn with_texture<T>(
        &self,
        f: impl FnOnce(NonNull<csdl2_sys::Texture>) -> Result<T>,
    ) -> Result<T> {
        self.with_renderer(|| {
            let texture = self.handle.lease()?;
            f(*texture)
        })
    }

    fn destroy(&self) -> Result<()> {
        self.with_renderer(|| {
            self.handle.validate()?;
            let mut locked = lock(&self.locked);
            if let Some(view) = locked.as_ref() {
                view.retire()?;
            }
            locked.take();
            drop(locked);
            let texture = self.handle.detach()?;
            self.registry.release_all();
            unsafe { self.api.destroy_texture(texture.as_ptr()) };
            Ok(())
        })
    }
}

impl Drop for TextureInner {
    fn drop(&mut self) {
        if !self.renderer.is_live() {
            // Destroyed together with its renderer.
            self.handle.invalidate();
            return;
        }
        if self.handle.is_valid()
            && let Err(error) = self.destroy()
        {
            tracing::error!("Failed to destroy texture: {error}");
        }
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("handle", &self.inner.handle)
            .field("renderer", &self.inner.renderer)
            .finish_non_exhaustive()
    }
}

#[cfg(all(test, feature = "soft"))]
mod tests {
    use super::*;
    use crate::ExportFlags;
    use crate::api::soft_api;
    use csdl2_sys::{
        SDL_PIXELFORMAT_ARGB8888, SDL_TEXTUREACCESS_STATIC, SDL_TEXTUREACCESS_STREAMING,
    };

    fn renderer() -> Renderer {
        let api = soft_api();
        let surface = Surface::create(api.clone(), 0, 8, 8, 32, [0; 4]).unwrap();
        Renderer::for_surface(api, &surface).unwrap()
    }

    #[test]
    fn renderer_keeps_its_surface_alive() {
        let renderer = renderer();
        let RenderTarget::Surface(surface) = renderer.target().unwrap() else {
            panic!("expected a surface target");
        };
        assert!(surface.is_valid());
        assert_eq!(crate::gc::reachable(&renderer).len(), 1);
    }

    #[test]
    fn textures_die_with_their_renderer() {
        let renderer = renderer();
        let texture = renderer
            .create_texture(SDL_PIXELFORMAT_ARGB8888, SDL_TEXTUREACCESS_STREAMING, 4, 4)
            .unwrap();
        assert!(texture.is_valid());
        renderer.destroy().unwrap();
        assert_eq!(texture.size().unwrap_err(), Error::InvalidHandle(RENDERER_KIND));
        assert_eq!(texture.destroy().unwrap_err(), Error::InvalidHandle(RENDERER_KIND));
        assert_eq!(renderer.destroy().unwrap_err(), Error::InvalidHandle(RENDERER_KIND));
    }

    #[test]
    fn unlock_is_refused_while_pixels_are_exported() {
        let renderer = renderer();
        let texture = renderer
            .create_texture(SDL_PIXELFORMAT_ARGB8888, SDL_TEXTUREACCESS_STREAMING, 4, 2)
            .unwrap();
        let (pixels, pitch) = texture.lock(None).unwrap();
        assert_eq!(pitch, 16);
        assert_eq!(pixels.len(), 32);

        let export = pixels.begin_export(ExportFlags::WRITE).unwrap();
        assert!(matches!(texture.unlock(), Err(Error::Buffer(_))));
        drop(export);
        texture.unlock().unwrap();
        assert!(!pixels.is_valid());
        texture.destroy().unwrap();
        assert_eq!(pixels.get(0).unwrap_err(), Error::InvalidHandle(TEXTURE_KIND));
    }

    #[test]
    fn static_textures_cannot_be_locked() {
        let renderer = renderer();
        let texture = renderer
            .create_texture(SDL_PIXELFORMAT_ARGB8888, SDL_TEXTUREACCESS_STATIC, 4, 4)
            .unwrap();
        assert_eq!(
            texture.lock(None).unwrap_err(),
            Error::Native("SDL_LockTexture(): texture must be streaming".to_string())
        );
    }
}
