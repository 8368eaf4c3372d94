// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

//! # csdl2 - SDL2 binding layer for a managed host runtime
//!
//! Safe wrappers around the SDL2 C library for exposure to a garbage
//! collected host runtime. The crate owns the parts of a binding that are hard
//! to get right: who frees a native pointer and when, how native memory is
//! lent to host code without copying, and how the library's audio thread
//! calls back into host code.
//!
//! ## Key Concepts
//!
//! - **NativeHandle**: the single owner of one native pointer ([`NativeHandle`]).
//!   Freeing, closing or destroying a wrapper detaches it; every later access
//!   fails with [`Error::InvalidHandle`] instead of touching freed memory.
//! - **BufferView**: a zero-copy view over native or host memory
//!   ([`BufferView`]) with an export count. Memory is never resized, detached
//!   or freed while an export is outstanding.
//! - **Backlinks**: dependents (pixel views, textures, palette links) hold a
//!   weak link to their owner ([`backlink`]) and observe its teardown.
//! - **Callback bridge**: the audio device re-enters host code from the
//!   library's thread under the host lock ([`host`]), skipping the callback
//!   once the device is closing.
//! - **Capability table**: other extensions call the binding through
//!   [`capi::Csdl2Capi`], published under `"csdl2._C_API"`.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────┐
//! │ Csdl2 │  (function table: shared library or software backend)
//! └───┬───┘
//!     ├─► RwOps ───────────► RwMethod
//!     ├─► Surface ─────────► PixelFormat ──► Palette (weak)
//!     │      └─► pixels: BufferView
//!     ├─► Window ──► Renderer ──► Texture ──► locked pixels: BufferView
//!     ├─► AudioDevice ─────► callback bridge ──► AudioCallback
//!     └─► load_wav ────────► WavBuffer
//! ```
//!
//! ## Examples
//!
//! ```
//! use csdl2::{Csdl2, ExportFlags};
//!
//! # fn main() -> Result<(), csdl2::Error> {
//! let sdl = Csdl2::soft();
//! let palette = sdl.alloc_palette(16)?;
//!
//! let colors = palette.colors()?;
//! assert_eq!(colors.nbytes(), 16 * 4);
//! assert!(colors.begin_export(ExportFlags::READ).is_ok());
//! assert!(colors.begin_export(ExportFlags::WRITE).is_err());
//!
//! palette.free()?;
//! assert!(palette.free().is_err());
//! # Ok(())
//! # }
//! ```
//!
//! ## Thread Safety
//!
//! Wrappers are `Send + Sync`. Blocking native calls release the host lock
//! ([`host::allow_threads`]) so the audio thread can make progress.
//!
//! ## Feature Flags
//!
//! - `soft` (default): enables the in-process software implementation of the
//!   SDL2 entry points, used by the tests and by [`Csdl2::soft`].

mod api;
mod error;
mod handle;
mod instance;

pub mod audio;
pub mod backlink;
pub mod buffer;
pub mod capi;
pub mod capsule;
pub mod config;
pub mod gc;
pub mod host;
pub mod rwops;
pub mod video;

#[cfg(feature = "soft")]
pub use api::soft_api;
pub use api::{Sdl2ApiHandle, load_api};
pub use audio::{AudioCallback, AudioDevice, AudioSpec, DeviceState, Dispatch, WavBuffer};
pub use buffer::{BufferPin, BufferView, DetachedBuffer, Element, Export, ExportFlags};
pub use csdl2_sys::{Color, Point, Rect, consts};
pub use error::{Error, Result};
pub use handle::{Lease, NativeHandle};
pub use host::HostRef;
pub use instance::Csdl2;
pub use rwops::{RwMethod, RwOps, RwSlot};
pub use video::{Masks, Palette, PixelFormat, RenderTarget, Renderer, Surface, Texture, Window};
