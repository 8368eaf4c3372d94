// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

//! Build script for the `csdl2` crate.
//!
//! This script generates `constants.rs` containing the platform's default
//! SDL2 shared library name. The configuration module uses it when no
//! explicit library path is configured.

use std::env;
use std::path::PathBuf;

fn main() {
    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    let library = match target_os.as_str() {
        "windows" => "SDL2.dll",
        "macos" | "ios" => "libSDL2-2.0.0.dylib",
        _ => "libSDL2-2.0.so.0",
    };

    let out_path = PathBuf::from(env::var("OUT_DIR").expect("failed to get output directory"))
        .join("constants.rs");
    let data = format!("pub const SDL_DEFAULT_LIBRARY: &str = \"{library}\";\n");
    std::fs::write(out_path, data).expect("Unable to write file");

    println!("cargo::rerun-if-changed=build.rs");
}
