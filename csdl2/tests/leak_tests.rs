// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

//! Allocation balance over many create/export/free cycles.
//!
//! The software backend counts its live native objects process-wide, so this
//! file holds a single test and runs in its own process.

use csdl2::{BufferView, Csdl2, ExportFlags};
use csdl2_sys::soft::live_allocations;

const CYCLES: usize = 10_000;

#[test]
fn create_export_free_cycles_do_not_leak() {
    let sdl = Csdl2::soft();
    let before = live_allocations();

    for cycle in 0..CYCLES {
        let surface = sdl.create_rgb_surface(0, 8, 8, 32, [0; 4]).unwrap();
        let pixels = surface.pixels().unwrap();
        {
            let mut export = pixels.begin_export(ExportFlags::WRITE).unwrap();
            export.as_mut_slice().unwrap()[0] = cycle as u8;
        }
        assert_eq!(pixels.export_count(), 0);

        let palette = sdl.alloc_palette(4).unwrap();
        let colors = palette.colors().unwrap();
        drop(colors.begin_export(ExportFlags::READ).unwrap());

        let memory = BufferView::new(vec![0u8; 16]);
        let rw = sdl.rw_from_mem(&memory).unwrap();

        surface.free().unwrap();
        palette.free().unwrap();
        // Dropped without closing: the wrapper closes the stream.
        drop(rw);
        assert_eq!(memory.export_count(), 0);
    }

    assert_eq!(live_allocations(), before);
}
