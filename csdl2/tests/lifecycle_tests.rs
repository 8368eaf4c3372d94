// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

//! Lifecycle tests for the wrapper family.
//!
//! Every wrapper is created through [`Csdl2`], torn down explicitly, and then
//! used again: each later operation must fail with an invalid-handle error
//! instead of touching freed memory. The tests run against the software
//! backend.

use csdl2::consts::*;
use csdl2::{Csdl2, Error, HostRef, RenderTarget, gc};
use tracing::info;

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

fn is_invalid_handle<T>(result: csdl2::Result<T>) -> bool {
    matches!(result, Err(Error::InvalidHandle(_)))
}

#[test]
fn surface_operations_fail_after_free() {
    let sdl = setup_test();
    let surface = sdl
        .create_rgb_surface(0, 8, 4, 32, [0xFF_0000, 0xFF00, 0xFF, 0xFF00_0000])
        .unwrap();
    let format = surface.format().unwrap();
    assert_eq!(format.format().unwrap(), SDL_PIXELFORMAT_ARGB8888);
    assert_eq!(surface.pitch().unwrap(), 32);

    surface.free().unwrap();
    for _ in 0..3 {
        assert_eq!(surface.free().unwrap_err(), Error::InvalidHandle("SDL_Surface"));
    }
    assert!(is_invalid_handle(surface.w()));
    assert!(is_invalid_handle(surface.pixels()));
    assert!(is_invalid_handle(surface.format()));
    assert!(is_invalid_handle(surface.lock()));
    assert!(is_invalid_handle(surface.fill_rect(None, 0)));
    assert!(is_invalid_handle(format.map_rgba(1, 2, 3, 4)));
}

#[test]
fn stream_operations_fail_after_close() {
    let sdl = setup_test();
    let rw = sdl.alloc_rw().unwrap();
    rw.set_type(SDL_RWOPS_UNKNOWN).unwrap();
    rw.close().unwrap();
    assert!(is_invalid_handle(rw.close()));
    assert!(is_invalid_handle(rw.free()));
    assert!(is_invalid_handle(rw.type_()));
    assert!(is_invalid_handle(rw.size()));
}

#[test]
fn window_destroy_cascades_to_renderers_and_textures() {
    let sdl = setup_test();
    let window = sdl
        .create_window("lifecycle", 0, 0, 32, 32, SDL_WINDOW_HIDDEN)
        .unwrap();
    let renderer = sdl
        .create_renderer(&window, -1, SDL_RENDERER_SOFTWARE)
        .unwrap();
    let texture = renderer
        .create_texture(SDL_PIXELFORMAT_ARGB8888, SDL_TEXTUREACCESS_STREAMING, 4, 4)
        .unwrap();
    assert_eq!(texture.size().unwrap(), (4, 4));

    let (pixels, pitch) = texture.lock(None).unwrap();
    assert_eq!(pitch, 16);
    assert_eq!(pixels.len(), 64);
    texture.unlock().unwrap();

    window.destroy().unwrap();
    info!("window destroyed, checking dependents");
    assert!(!renderer.is_valid());
    assert!(is_invalid_handle(renderer.create_texture(
        SDL_PIXELFORMAT_ARGB8888,
        SDL_TEXTUREACCESS_STATIC,
        1,
        1
    )));
    assert!(is_invalid_handle(texture.lock(None)));
    assert!(is_invalid_handle(texture.destroy()));
    assert!(is_invalid_handle(renderer.destroy()));
    assert!(is_invalid_handle(window.destroy()));
}

#[test]
fn renderer_keeps_its_target_alive() {
    let sdl = setup_test();
    let renderer = {
        let surface = sdl.create_rgb_surface(0, 4, 4, 32, [0; 4]).unwrap();
        sdl.create_software_renderer(&surface).unwrap()
    };
    let RenderTarget::Surface(surface) = renderer.target().unwrap() else {
        panic!("software renderer should draw into a surface");
    };
    assert!(surface.is_valid());
    assert_eq!(surface.w().unwrap(), 4);

    renderer.destroy().unwrap();
    assert!(is_invalid_handle(renderer.target()));
    assert!(surface.is_valid());
    surface.free().unwrap();
}

#[test]
fn palette_link_reports_freed_palette() {
    let sdl = setup_test();
    let surface = sdl.create_rgb_surface(0, 4, 4, 8, [0; 4]).unwrap();
    let format = surface.format().unwrap();
    assert_eq!(format.format().unwrap(), SDL_PIXELFORMAT_INDEX8);

    let palette = sdl.alloc_palette(2).unwrap();
    palette
        .set_colors(&[csdl2::Color { r: 1, g: 2, b: 3, a: 255 }], 1)
        .unwrap();
    format.set_palette(&palette).unwrap();
    let linked = format.palette().unwrap().unwrap();
    assert_eq!(linked.ncolors().unwrap(), 2);
    assert_eq!(linked.colors().unwrap().get(1).unwrap().g, 2);

    palette.free().unwrap();
    assert!(!linked.is_valid());
    assert_eq!(format.palette().unwrap_err(), Error::InvalidHandle("SDL_Palette"));
    // The surface's own reference keeps the native palette usable.
    assert_eq!(format.map_rgba(1, 2, 3, 255).unwrap(), 1);
    surface.free().unwrap();
}

#[test]
fn collector_clears_host_references_only() {
    let sdl = setup_test();
    let surface = sdl.create_rgb_surface(0, 2, 2, 32, [0; 4]).unwrap();
    let userdata = HostRef::new(String::from("payload"));
    surface.set_userdata(Some(userdata.clone())).unwrap();
    assert_eq!(userdata.strong_count(), 2);

    let reachable = gc::reachable(&surface);
    assert_eq!(reachable.len(), 1);
    assert!(reachable[0].ptr_eq(&userdata));
    drop(reachable);

    assert_eq!(gc::collect(&surface), 1);
    assert_eq!(userdata.strong_count(), 1);
    assert!(surface.userdata().unwrap().is_none());
    assert!(surface.is_valid());
    assert_eq!(gc::collect(&surface), 0);
    surface.free().unwrap();
}

#[test]
fn capability_table_borrows_live_wrappers_only() {
    let sdl = setup_test();
    let table = csdl2::capi::import().unwrap();
    let window = sdl.create_window("capi", 0, 0, 8, 8, 0).unwrap();
    assert!((table.validate_window)(&window));
    assert!((table.borrow_window)(&window).is_ok());

    window.destroy().unwrap();
    assert!(!(table.validate_window)(&window));
    assert_eq!(
        (table.borrow_window)(&window).unwrap_err(),
        Error::InvalidHandle("SDL_Window")
    );
}
