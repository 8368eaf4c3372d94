// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

//! Video resources: surfaces, pixel formats, palettes, windows, renderers
//! and textures.

mod pixels;
pub(crate) mod render;
mod surface;
mod window;

pub use pixels::Palette;
pub use render::{RenderTarget, Renderer, Texture};
pub use surface::{Masks, PixelFormat, Surface};
pub use window::Window;
