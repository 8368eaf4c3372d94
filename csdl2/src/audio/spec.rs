// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

use std::os::raw::c_int;
use std::sync::Arc;

use crate::buffer::BufferView;
use crate::host::HostRef;
use crate::Result;

type CallbackFn = dyn Fn(Option<&HostRef>, &BufferView, usize) -> Result<()> + Send + Sync;

struct CallbackCell {
    f: Box<CallbackFn>,
}

/// Host code run by the audio device to fill its stream buffer.
///
/// The callback receives the spec's user data, a writable view over the
/// device's buffer and the buffer length in bytes. The view is only valid for
/// the duration of the call: exports of it cannot escape the callback, and
/// one that is leaked anyway aborts the process.
///
/// An `Err` returned by the callback is logged and discarded; the device
/// keeps running.
#[derive(Clone)]
pub struct AudioCallback(Arc<CallbackCell>);

impl AudioCallback {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Option<&HostRef>, &BufferView, usize) -> Result<()> + Send + Sync + 'static,
    {
        Self(Arc::new(CallbackCell { f: Box::new(f) }))
    }

    pub(crate) fn call(
        &self,
        userdata: Option<&HostRef>,
        stream: &BufferView,
        len: usize,
    ) -> Result<()> {
        (self.0.f)(userdata, stream, len)
    }

    /// The callback as a host object, for collector traversal.
    pub fn host_ref(&self) -> HostRef {
        HostRef::from_arc(self.0.clone())
    }

    pub fn ptr_eq(&self, other: &AudioCallback) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for AudioCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AudioCallback")
            .field(&Arc::as_ptr(&self.0))
            .finish()
    }
}

/// Audio format description (`SDL_AudioSpec`) plus the host callback and
/// user data.
///
/// Zero fields ask the device for its defaults when opening.
#[derive(Debug, Clone, Default)]
pub struct AudioSpec {
    /// Samples per second.
    pub freq: c_int,
    /// One of the `AUDIO_*` format constants.
    pub format: u16,
    pub channels: u8,
    /// Silence value, computed by the device.
    pub silence: u8,
    /// Sample frames per callback buffer.
    pub samples: u16,
    /// Callback buffer size in bytes, computed by the device.
    pub size: u32,
    pub callback: Option<AudioCallback>,
    pub userdata: Option<HostRef>,
}

impl AudioSpec {
    /// The native struct, without callback or user data.
    pub(crate) fn to_native(&self) -> csdl2_sys::AudioSpec {
        csdl2_sys::AudioSpec {
            freq: self.freq,
            format: self.format,
            channels: self.channels,
            silence: self.silence,
            samples: self.samples,
            size: self.size,
            ..Default::default()
        }
    }

    /// Copies the format fields of `native`, keeping this spec's callback and user data.
    pub(crate) fn with_native(&self, native: &csdl2_sys::AudioSpec) -> Self {
        Self {
            freq: native.freq,
            format: native.format,
            channels: native.channels,
            silence: native.silence,
            samples: native.samples,
            size: native.size,
            callback: self.callback.clone(),
            userdata: self.userdata.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_empty() {
        let spec = AudioSpec::default();
        assert_eq!(spec.freq, 0);
        assert!(spec.callback.is_none() && spec.userdata.is_none());
        assert!(spec.to_native().callback.is_none());
    }

    #[test]
    fn native_copy_keeps_host_references() {
        let callback = AudioCallback::new(|_, _, _| Ok(()));
        let spec = AudioSpec {
            freq: 44100,
            callback: Some(callback.clone()),
            userdata: Some(HostRef::new(3u8)),
            ..Default::default()
        };
        let native = csdl2_sys::AudioSpec {
            freq: 48000,
            size: 4096,
            ..spec.to_native()
        };
        let obtained = spec.with_native(&native);
        assert_eq!(obtained.freq, 48000);
        assert_eq!(obtained.size, 4096);
        assert!(obtained.callback.unwrap().ptr_eq(&callback));
        assert_eq!(obtained.userdata.unwrap().downcast_ref::<u8>(), Some(&3));
    }
}
