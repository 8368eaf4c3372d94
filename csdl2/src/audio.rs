// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

//! The legacy audio device, its callback bridge and WAV loading.

mod bridge;
mod device;
mod spec;
mod wav;

pub use bridge::{DeviceState, Dispatch};
pub use device::{AudioDevice, AudioLockGuard};
pub use spec::{AudioCallback, AudioSpec};
pub use wav::WavBuffer;

pub(crate) use wav::load_wav;
