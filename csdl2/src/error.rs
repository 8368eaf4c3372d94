// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

//! Error types for csdl2 operations.
//!
//! This module defines the error type returned by every fallible binding
//! operation, and the translation of SDL's error string into it.

use std::ffi::CStr;

use csdl2_sys::Sdl2Api;

/// Convenience result type using [`Error`] as the error variant.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors that can occur when using the binding.
///
/// The first group of variants describes misuse of wrapper objects and buffers
/// (detected on this side, before any native call). The second group is the
/// classification of SDL's error string (see [`Error::from_native`]).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The wrapper's native resource was freed, detached or never attached.
    #[error("{0} has been freed")]
    InvalidHandle(&'static str),

    /// SDL reported "Out of memory".
    #[error("Out of memory")]
    OutOfMemory,

    /// SDL failed to read, write or seek in a data stream.
    #[error("{0}")]
    StreamIo(String),

    /// SDL rejected a parameter ("Parameter '...' is invalid").
    #[error("{0}")]
    InvalidParam(String),

    /// Any other SDL error message.
    #[error("{0}")]
    Native(String),

    /// An internal invariant of the binding was violated.
    #[error("Contract violation: {0}")]
    Contract(String),

    /// A buffer could not be exported, resized, detached or was too small.
    #[error("Buffer error: {0}")]
    Buffer(String),

    /// Exports of a callback buffer were still outstanding after the callback returned.
    ///
    /// The callback bridge aborts the process on this error; it is never
    /// returned to callers.
    #[error("{outstanding} export(s) of a callback buffer outlived the callback")]
    ExportLeak { outstanding: usize },

    /// An element index was outside the view.
    #[error("Index {index} out of range for view of {len} element(s)")]
    IndexOutOfRange { index: usize, len: usize },

    /// An argument was rejected before reaching SDL.
    #[error("Invalid argument: {0}")]
    InvalidArg(String),

    /// The legacy audio device is already open.
    #[error("Audio device is already opened")]
    DeviceBusy,

    /// Failed to convert a Rust string to a C-compatible null-terminated string.
    #[error("Null string: {0}")]
    NulString(#[from] std::ffi::NulError),

    /// Failed to load or resolve the SDL2 dynamic library.
    #[error("Loading library: {0}")]
    LibLoading(String),

    /// The configuration could not be read or resolved.
    #[error("Config: {0}")]
    Config(String),
}

impl From<libloading::Error> for Error {
    fn from(error: libloading::Error) -> Self {
        Error::LibLoading(error.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Config(error.to_string())
    }
}

const STREAM_IO_MESSAGES: [&str; 3] = [
    "Error reading from datastream",
    "Error writing to datastream",
    "Error seeking in datastream",
];

impl Error {
    /// Classifies an SDL error message.
    ///
    /// # Arguments
    ///
    /// * `message` - The string returned by `SDL_GetError`
    ///
    /// # Returns
    ///
    /// The matching [`Error`] variant. An empty message means a native call
    /// reported failure without setting an error, which is a binding bug and
    /// maps to [`Error::Contract`].
    pub fn classify(message: &str) -> Error {
        if message.is_empty() {
            Error::Contract("error raised with no active native error".to_string())
        } else if message == "Out of memory" {
            Error::OutOfMemory
        } else if STREAM_IO_MESSAGES.contains(&message) {
            Error::StreamIo(message.to_string())
        } else if message.starts_with("Parameter '") && message.ends_with("' is invalid") {
            Error::InvalidParam(message.to_string())
        } else {
            Error::Native(message.to_string())
        }
    }

    /// Converts SDL's current error string to an [`Error`] and clears it.
    ///
    /// Call this right after a native function reported failure, on the same
    /// thread. The error string is per-thread on the SDL side.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let surface = unsafe { api.create_rgb_surface(0, w, h, 32, 0, 0, 0, 0) };
    /// if surface.is_null() {
    ///     return Err(Error::from_native(&api));
    /// }
    /// ```
    pub fn from_native(api: &Sdl2Api) -> Error {
        let message = unsafe {
            let raw = api.get_error();
            if raw.is_null() {
                String::new()
            } else {
                CStr::from_ptr(raw).to_string_lossy().into_owned()
            }
        };
        unsafe { api.clear_error() };
        Error::classify(&message)
    }

    /// Maps an SDL status code (`0` on success, negative on failure) to a [`Result`].
    pub fn from_status(api: &Sdl2Api, status: std::os::raw::c_int) -> Result<()> {
        if status < 0 {
            Err(Error::from_native(api))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_native_messages() {
        assert_eq!(Error::classify("Out of memory"), Error::OutOfMemory);
        assert!(matches!(
            Error::classify("Error seeking in datastream"),
            Error::StreamIo(_)
        ));
        assert!(matches!(
            Error::classify("Parameter 'width' is invalid"),
            Error::InvalidParam(_)
        ));
        assert!(matches!(Error::classify("Couldn't open foo"), Error::Native(_)));
        assert!(matches!(Error::classify(""), Error::Contract(_)));
    }

    #[test]
    fn near_miss_parameter_message_is_generic() {
        assert!(matches!(
            Error::classify("Parameter 'width' is invalid!"),
            Error::Native(_)
        ));
    }

    #[cfg(feature = "soft")]
    #[test]
    fn from_native_clears_the_error() {
        let api = csdl2_sys::soft::api();
        unsafe {
            let palette = api.alloc_palette(0);
            assert!(palette.is_null());
        }
        assert_eq!(
            Error::from_native(&api),
            Error::InvalidParam("Parameter 'ncolors' is invalid".to_string())
        );
        assert!(matches!(Error::from_native(&api), Error::Contract(_)));
    }
}
