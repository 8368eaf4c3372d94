// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

//! Loading of the SDL2 function table.

use std::sync::Arc;

use csdl2_sys::Sdl2Api;

use crate::Result;

/// Shared handle to a loaded SDL2 function table.
///
/// Every wrapper object keeps one, so the library stays loaded for as long
/// as any wrapper is alive.
pub type Sdl2ApiHandle = Arc<Sdl2Api>;

/// Loads the SDL2 shared library at `path` and resolves the entry points the
/// binding uses.
///
/// # Errors
///
/// Returns [`crate::Error::LibLoading`] if the library cannot be opened or a
/// symbol is missing.
///
/// # Examples
///
/// ```no_run
/// use csdl2::config::get_sdl_so_path;
/// use csdl2::load_api;
///
/// # fn main() -> Result<(), csdl2::Error> {
/// let api = load_api(get_sdl_so_path())?;
/// # Ok(())
/// # }
/// ```
pub fn load_api(path: impl AsRef<std::ffi::OsStr>) -> Result<Sdl2ApiHandle> {
    let api = unsafe { Sdl2Api::new(path.as_ref())? };
    tracing::debug!(path = ?path.as_ref(), "loaded SDL2 library");
    Ok(Arc::new(api))
}

/// Returns a function table backed by the in-process software implementation.
#[cfg(feature = "soft")]
pub fn soft_api() -> Sdl2ApiHandle {
    Arc::new(csdl2_sys::soft::api())
}
