// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

//! Common utilities shared across examples.

use csdl2::Csdl2;
use csdl2::config::Csdl2Config;

/// Initializes tracing subscriber for examples.
///
/// Configures logging to stdout with an INFO level filter, respecting the
/// `RUST_LOG` environment variable for custom log levels.
pub fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();
}

/// Opens the binding described by the JSON config at `path`, or the software
/// backend when no path is given.
pub fn open_binding(path: Option<&str>) -> Result<Csdl2, csdl2::Error> {
    match path {
        Some(path) => Csdl2::from_config(&Csdl2Config::from_file(path)?),
        None => Ok(Csdl2::soft()),
    }
}
