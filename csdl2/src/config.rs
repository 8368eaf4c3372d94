// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

//! Runtime configuration and library path resolution.
//!
//! The binding either loads a system SDL2 shared library or, with the `soft`
//! feature, uses the in-process software implementation. [`Csdl2Config`]
//! selects between the two and can be read from JSON and the environment.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result, api::Sdl2ApiHandle};

// Build script generates constants.rs with SDL_DEFAULT_LIBRARY
include!(concat!(env!("OUT_DIR"), "/constants.rs"));

/// Environment variable selecting the backend (`dynamic` or `software`).
pub const BACKEND_ENV: &str = "CSDL2_BACKEND";

/// Environment variable overriding the shared library path.
pub const LIBRARY_ENV: &str = "CSDL2_LIBRARY";

/// Returns the platform's default SDL2 shared library name.
///
/// The name is resolved by the dynamic loader's normal search path.
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
pub fn get_sdl_so_path() -> PathBuf {
    SDL_DEFAULT_LIBRARY.into()
}

/// Where the SDL2 entry points come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Load the SDL2 shared library at runtime.
    #[default]
    Dynamic,
    /// Use the in-process implementation (requires the `soft` feature).
    Software,
}

impl FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dynamic" => Ok(Backend::Dynamic),
            "software" | "soft" => Ok(Backend::Software),
            other => Err(Error::Config(format!("unknown backend \"{other}\""))),
        }
    }
}

/// Binding configuration.
///
/// # Examples
///
/// ```
/// use csdl2::config::{Backend, Csdl2Config};
///
/// let config = Csdl2Config::from_json(r#"{ "backend": "software" }"#).unwrap();
/// assert_eq!(config.backend, Backend::Software);
/// assert!(config.library.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Csdl2Config {
    /// Backend to resolve entry points from.
    #[serde(default)]
    pub backend: Backend,
    /// Explicit shared library path. Defaults to [`get_sdl_so_path`].
    #[serde(default)]
    pub library: Option<PathBuf>,
}

impl Csdl2Config {
    /// Parses a configuration from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|error| {
            Error::Config(format!(
                "Error while reading configuration from \"{}\": {}",
                path.display(),
                error
            ))
        })?;
        Self::from_json(&json)
    }

    /// Reads the configuration from the environment only.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Applies `CSDL2_BACKEND` and `CSDL2_LIBRARY` on top of this configuration.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(backend) = std::env::var(BACKEND_ENV) {
            self.backend = backend.parse()?;
        }
        if let Some(library) = std::env::var_os(LIBRARY_ENV) {
            self.library = Some(library.into());
        }
        Ok(self)
    }

    /// Returns the shared library path this configuration would load.
    pub fn library_path(&self) -> PathBuf {
        self.library.clone().unwrap_or_else(get_sdl_so_path)
    }

    /// Resolves the configuration into a loaded function table.
    ///
    /// # Errors
    ///
    /// - [`Error::LibLoading`] if the dynamic library cannot be loaded
    /// - [`Error::Config`] if the software backend is requested but the crate
    ///   was built without the `soft` feature
    pub fn load_api(&self) -> Result<Sdl2ApiHandle> {
        match self.backend {
            Backend::Dynamic => crate::load_api(self.library_path()),
            #[cfg(feature = "soft")]
            Backend::Software => Ok(crate::api::soft_api()),
            #[cfg(not(feature = "soft"))]
            Backend::Software => Err(Error::Config(
                "the software backend requires the `soft` feature".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_parses_case_insensitively() {
        assert_eq!("Software".parse::<Backend>().unwrap(), Backend::Software);
        assert_eq!(" dynamic ".parse::<Backend>().unwrap(), Backend::Dynamic);
        assert!(matches!("gpu".parse::<Backend>(), Err(Error::Config(_))));
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let config = Csdl2Config::from_json("{}").unwrap();
        assert_eq!(config, Csdl2Config::default());
        assert_eq!(config.library_path(), get_sdl_so_path());
    }

    #[test]
    fn invalid_json_is_a_config_error() {
        assert!(matches!(
            Csdl2Config::from_json(r#"{ "backend": 3 }"#),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn missing_library_fails_to_load() {
        let config = Csdl2Config {
            backend: Backend::Dynamic,
            library: Some("/nonexistent/libSDL2-missing.so".into()),
        };
        assert!(matches!(config.load_api(), Err(Error::LibLoading(_))));
    }
}
