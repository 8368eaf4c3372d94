// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

use std::ffi::{CStr, CString};
use std::os::raw::c_int;
use std::ptr::NonNull;
use std::sync::Arc;

use super::render::Dependents;
use crate::api::Sdl2ApiHandle;
use crate::handle::{Lease, NativeHandle};
use crate::{Error, Result};

pub(crate) const WINDOW_KIND: &str = "SDL_Window";

pub(crate) struct WindowInner {
    api: Sdl2ApiHandle,
    handle: NativeHandle<csdl2_sys::Window>,
    pub(crate) renderers: Dependents,
}

/// A window (`SDL_Window`).
#[derive(Clone)]
pub struct Window {
    pub(crate) inner: Arc<WindowInner>,
}

impl Window {
    fn wrap(api: Sdl2ApiHandle, handle: NativeHandle<csdl2_sys::Window>) -> Self {
        Self {
            inner: Arc::new(WindowInner {
                api,
                handle,
                renderers: Dependents::default(),
            }),
        }
    }

    /// Takes ownership of a window created elsewhere.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live window from the same library as `api`, and nobody
    /// else may destroy it.
    pub unsafe fn from_raw(api: Sdl2ApiHandle, ptr: NonNull<csdl2_sys::Window>) -> Self {
        Self::wrap(api, NativeHandle::new(WINDOW_KIND, ptr))
    }

    pub(crate) fn create(
        api: Sdl2ApiHandle,
        title: &str,
        x: c_int,
        y: c_int,
        w: c_int,
        h: c_int,
        flags: u32,
    ) -> Result<Self> {
        let title = CString::new(title)?;
        let raw = unsafe { api.create_window(title.as_ptr(), x, y, w, h, flags) };
        let handle = NativeHandle::from_native(WINDOW_KIND, raw, &api)?;
        tracing::debug!(?title, w, h, "created window");
        Ok(Self::wrap(api, handle))
    }

    pub fn is_valid(&self) -> bool {
        self.inner.handle.is_valid()
    }

    pub fn borrow_ptr(&self) -> Result<NonNull<csdl2_sys::Window>> {
        self.inner.handle.borrow_ptr()
    }

    pub(crate) fn lease(&self) -> Result<Lease<'_, csdl2_sys::Window>> {
        self.inner.handle.lease()
    }

    pub fn id(&self) -> Result<u32> {
        let window = self.lease()?;
        let api = &self.inner.api;
        match unsafe { api.get_window_id(window.as_ptr()) } {
            0 => Err(Error::from_native(api)),
            id => Ok(id),
        }
    }

    pub fn title(&self) -> Result<String> {
        let window = self.lease()?;
        let title = unsafe { self.inner.api.get_window_title(window.as_ptr()) };
        if title.is_null() {
            return Ok(String::new());
        }
        Ok(unsafe { CStr::from_ptr(title) }.to_string_lossy().into_owned())
    }

    /// Destroys the window, after destroying every renderer drawing into it.
    pub fn destroy(&self) -> Result<()> {
        self.inner.destroy()
    }
}

impl WindowInner {
    fn destroy(&self) -> Result<()> {
        self.handle.validate()?;
        self.renderers.destroy_all();
        let window = self.handle.detach()?;
        unsafe { self.api.destroy_window(window.as_ptr()) };
        tracing::debug!("destroyed window");
        Ok(())
    }
}

impl Drop for WindowInner {
    fn drop(&mut self) {
        if self.handle.is_valid()
            && let Err(error) = self.destroy()
        {
            tracing::error!("Failed to destroy window: {error}");
        }
    }
}

impl std::fmt::Debug for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Window")
            .field("handle", &self.inner.handle)
            .finish_non_exhaustive()
    }
}

#[cfg(all(test, feature = "soft"))]
mod tests {
    use super::*;
    use crate::api::soft_api;
    use crate::video::render::Renderer;

    #[test]
    fn destroy_cascades_to_renderers() {
        let api = soft_api();
        let window = Window::create(api.clone(), "cascade", 0, 0, 64, 48, 0).unwrap();
        assert_eq!(window.title().unwrap(), "cascade");
        assert!(window.id().unwrap() > 0);

        let renderer = Renderer::for_window(api, &window, -1, 0).unwrap();
        window.destroy().unwrap();
        assert!(!renderer.is_valid());
        assert_eq!(window.id().unwrap_err(), Error::InvalidHandle(WINDOW_KIND));
        assert_eq!(window.destroy().unwrap_err(), Error::InvalidHandle(WINDOW_KIND));
    }

    #[test]
    fn interior_nul_in_title_is_rejected() {
        assert!(matches!(
            Window::create(soft_api(), "a\0b", 0, 0, 1, 1, 0),
            Err(Error::NulString(_))
        ));
    }
}
