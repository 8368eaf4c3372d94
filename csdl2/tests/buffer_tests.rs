// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for buffer views and the export protocol.
//!
//! Covers export counting, ownership detachment, read-only native views and
//! the factories that pin host buffers.

use std::sync::Arc;

use csdl2::{BufferView, Color, Csdl2, Error, ExportFlags, Rect};

/// Ensures logging is initialized only once across all tests.
static LOG_ONCE: std::sync::Once = std::sync::Once::new();

fn setup_test() -> Csdl2 {
    LOG_ONCE.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::builder()
                    .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                    .from_env_lossy(),
            )
            .init();
    });
    Csdl2::soft()
}

#[test]
fn export_count_tracks_begin_and_end() {
    let _sdl = setup_test();
    let view = BufferView::new(vec![0u8; 16]);
    let mut exports: Vec<_> = (0..5)
        .map(|_| view.begin_export(ExportFlags::READ).unwrap())
        .collect();
    assert_eq!(view.export_count(), 5);

    exports.truncate(3);
    assert_eq!(view.export_count(), 3);
    assert!(matches!(view.detach_ownership(), Err(Error::Buffer(_))));

    exports.pop().unwrap().end();
    assert_eq!(view.export_count(), 2);
    exports.clear();
    assert_eq!(view.export_count(), 0);
    assert!(view.detach_ownership().is_ok());
}

#[test]
fn detach_succeeds_once_exports_are_released() {
    let _sdl = setup_test();
    let data: Vec<u8> = (0..32).collect();
    let view = BufferView::new(data.clone());

    let export = view.begin_export(ExportFlags::WRITE).unwrap();
    assert_eq!(
        view.detach_ownership().unwrap_err(),
        Error::Buffer("Existing exports of data: object cannot be detached".to_string())
    );
    drop(export);

    let detached = view.detach_ownership().unwrap();
    assert_eq!(detached.len(), data.len());
    assert_eq!(detached.as_slice(), &data[..]);
    assert!(!view.is_valid());
    assert_eq!(view.len(), 0);
    assert!(matches!(view.detach_ownership(), Err(Error::InvalidHandle(_))));
}

#[test]
fn palette_colors_are_a_read_only_view() {
    let sdl = setup_test();
    for ncolors in [1, 16, 256] {
        let palette = sdl.alloc_palette(ncolors).unwrap();
        let colors = palette.colors().unwrap();
        assert_eq!(colors.len(), ncolors as usize);
        assert_eq!(colors.nbytes(), ncolors as usize * std::mem::size_of::<Color>());
        assert!(colors.is_readonly());

        let export = colors.begin_export(ExportFlags::READ).unwrap();
        assert_eq!(export.as_slice()[0], Color { r: 255, g: 255, b: 255, a: 255 });
        assert!(matches!(
            colors.begin_export(ExportFlags::WRITE),
            Err(Error::Buffer(_))
        ));
        assert!(matches!(
            colors.set(0, Color::default()),
            Err(Error::Buffer(_))
        ));
        drop(export);
        palette.free().unwrap();
    }
}

#[test]
fn wrong_sized_host_pixels_are_rejected_before_pinning() {
    let sdl = setup_test();
    let pixels = BufferView::new(vec![0u8; 4 * 4 * 4 - 1]);
    assert!(matches!(
        sdl.create_rgb_surface_from(&pixels, 4, 4, 32, 16, [0; 4]),
        Err(Error::Buffer(_))
    ));
    assert_eq!(
        sdl.create_rgb_surface_from(&pixels, 4, 4, 32, 8, [0; 4])
            .unwrap_err(),
        Error::InvalidArg("invalid pitch".to_string())
    );
    let readonly = BufferView::new_readonly(vec![0u8; 64]);
    assert!(matches!(
        sdl.create_rgb_surface_from(&readonly, 4, 4, 32, 16, [0; 4]),
        Err(Error::Buffer(_))
    ));
    assert_eq!(pixels.export_count(), 0);
    assert_eq!(readonly.export_count(), 0);
    pixels.resize(64, 0).unwrap();
}

#[test]
fn surface_draws_into_pinned_host_pixels() {
    let sdl = setup_test();
    let pixels = BufferView::new(vec![0u8; 4 * 2 * 4]);
    let surface = sdl
        .create_rgb_surface_from(&pixels, 4, 2, 32, 16, [0; 4])
        .unwrap();
    assert_eq!(pixels.export_count(), 1);
    assert!(matches!(pixels.resize(8, 0), Err(Error::Buffer(_))));
    assert!(matches!(
        pixels.begin_export(ExportFlags::WRITE),
        Err(Error::Buffer(_))
    ));

    let rect = Rect { x: 1, y: 1, w: 1, h: 1 };
    surface.fill_rect(Some(&rect), 0x0101_0101).unwrap();
    let written = pixels.to_vec().unwrap();
    assert_eq!(&written[20..24], &[1, 1, 1, 1]);
    assert_eq!(written.iter().filter(|byte| **byte != 0).count(), 4);

    surface.free().unwrap();
    assert_eq!(pixels.export_count(), 0);
    pixels.resize(8, 0).unwrap();
}

#[test]
fn element_views_share_host_memory() {
    let _sdl = setup_test();
    let bytes = BufferView::new(vec![0u8; 8]);
    let colors: Arc<BufferView<Color>> = BufferView::cast(&bytes).unwrap();
    assert_eq!(colors.len(), 2);
    colors.set(1, Color { r: 9, g: 8, b: 7, a: 6 }).unwrap();
    assert_eq!(bytes.to_vec().unwrap(), vec![0, 0, 0, 0, 9, 8, 7, 6]);
    assert_eq!(bytes.export_count(), 1);
    drop(colors);
    assert_eq!(bytes.export_count(), 0);

    let odd = BufferView::new(vec![0u8; 7]);
    assert!(matches!(
        BufferView::<Color>::cast(&odd),
        Err(Error::InvalidArg(_))
    ));
}

#[test]
fn locked_texture_pixels_outlive_nothing() {
    let sdl = setup_test();
    let surface = sdl.create_rgb_surface(0, 8, 8, 32, [0; 4]).unwrap();
    let renderer = sdl.create_software_renderer(&surface).unwrap();
    let texture = renderer
        .create_texture(
            csdl2::consts::SDL_PIXELFORMAT_ARGB8888,
            csdl2::consts::SDL_TEXTUREACCESS_STREAMING,
            2,
            2,
        )
        .unwrap();

    let (pixels, _pitch) = texture.lock(None).unwrap();
    let export = pixels.begin_export(ExportFlags::WRITE).unwrap();
    assert!(matches!(texture.unlock(), Err(Error::Buffer(_))));
    drop(export);
    texture.unlock().unwrap();
    assert!(!pixels.is_valid());
    assert!(matches!(pixels.get(0), Err(Error::InvalidHandle(_))));

    renderer.destroy().unwrap();
    surface.free().unwrap();
}
