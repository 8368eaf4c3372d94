// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

//! The legacy single-device audio API and the WAV loader.
//!
//! The device "plays" by invoking the application callback from a mixing
//! thread at the rate the obtained spec implies. The buffer handed to the
//! callback is owned by that thread and reused between invocations.

use std::collections::HashMap;
use std::os::raw::{c_int, c_void};
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use super::error::{invalid_param, set_error};
use super::{track_alloc, track_free};
use crate::consts::*;
use crate::{AudioSpec, AudioStatus, RWops};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Recursive lock standing in for the device mutex.
struct MixerLock {
    owner: Mutex<(Option<ThreadId>, usize)>,
    released: Condvar,
}

impl MixerLock {
    const fn new() -> Self {
        Self {
            owner: Mutex::new((None, 0)),
            released: Condvar::new(),
        }
    }

    fn acquire(&self) {
        let me = thread::current().id();
        let mut owner = lock(&self.owner);
        loop {
            match owner.0 {
                None => {
                    *owner = (Some(me), 1);
                    return;
                }
                Some(holder) if holder == me => {
                    owner.1 += 1;
                    return;
                }
                Some(_) => {
                    owner = self
                        .released
                        .wait(owner)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }

    fn release(&self) {
        let me = thread::current().id();
        let mut owner = lock(&self.owner);
        if owner.0 == Some(me) {
            owner.1 -= 1;
            if owner.1 == 0 {
                owner.0 = None;
                self.released.notify_all();
            }
        }
    }
}

struct Device {
    paused: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    mixer: Option<JoinHandle<()>>,
}

static DEVICE: Mutex<Option<Device>> = Mutex::new(None);
static MIXER_LOCK: MixerLock = MixerLock::new();

const DEFAULT_FREQUENCY: c_int = 22050;
const DEFAULT_SAMPLES: u16 = 4096;

fn is_supported_format(format: u16) -> bool {
    matches!(
        format,
        AUDIO_U8
            | AUDIO_S8
            | AUDIO_U16LSB
            | AUDIO_S16LSB
            | AUDIO_U16MSB
            | AUDIO_S16MSB
            | AUDIO_S32LSB
            | AUDIO_S32MSB
            | AUDIO_F32LSB
            | AUDIO_F32MSB
    )
}

fn silence_for(format: u16) -> u8 {
    if format == AUDIO_U8 { 0x80 } else { 0 }
}

pub(super) unsafe extern "C" fn open_audio(
    desired: *mut AudioSpec,
    obtained: *mut AudioSpec,
) -> c_int {
    let Some(requested) = (unsafe { desired.as_ref() }).copied() else {
        return invalid_param("desired");
    };
    let Some(callback) = requested.callback else {
        return set_error("SDL_OpenAudio() passed a NULL callback");
    };

    let mut device = lock(&DEVICE);
    if device.is_some() {
        return set_error("Audio device is already opened");
    }

    let mut spec = requested;
    if spec.freq == 0 {
        spec.freq = DEFAULT_FREQUENCY;
    }
    if spec.format == 0 {
        spec.format = AUDIO_S16SYS;
    }
    if spec.channels == 0 {
        spec.channels = 2;
    }
    if spec.samples == 0 {
        spec.samples = DEFAULT_SAMPLES;
    }
    if spec.freq < 0 {
        return invalid_param("freq");
    }
    if !(1..=8).contains(&spec.channels) {
        return set_error(format!("Unsupported number of audio channels: {}", spec.channels));
    }
    if !is_supported_format(spec.format) {
        return set_error(format!("Unsupported audio format: 0x{:04x}", spec.format));
    }
    spec.silence = silence_for(spec.format);
    spec.size =
        (audio_bitsize(spec.format) as u32 / 8) * spec.channels as u32 * spec.samples as u32;

    match unsafe { obtained.as_mut() } {
        Some(obtained) => *obtained = spec,
        None => unsafe { *desired = spec },
    }

    let paused = Arc::new(AtomicBool::new(true));
    let running = Arc::new(AtomicBool::new(true));
    let period = Duration::from_secs_f64(spec.samples as f64 / spec.freq as f64)
        .clamp(Duration::from_millis(1), Duration::from_millis(50));
    let userdata = spec.userdata as usize;
    let len = spec.size as usize;
    let silence = spec.silence;

    let mixer = {
        let paused = paused.clone();
        let running = running.clone();
        thread::Builder::new()
            .name("soft-audio".to_string())
            .spawn(move || {
                let mut stream = vec![silence; len];
                while running.load(Ordering::Acquire) {
                    if !paused.load(Ordering::Acquire) {
                        MIXER_LOCK.acquire();
                        stream.fill(silence);
                        unsafe {
                            callback(userdata as *mut c_void, stream.as_mut_ptr(), len as c_int)
                        };
                        MIXER_LOCK.release();
                    }
                    thread::sleep(period);
                }
            })
    };
    let mixer = match mixer {
        Ok(mixer) => mixer,
        Err(err) => return set_error(format!("Couldn't create audio thread: {err}")),
    };

    *device = Some(Device {
        paused,
        running,
        mixer: Some(mixer),
    });
    0
}

pub(super) unsafe extern "C" fn close_audio() {
    // Take the device out first so the join below never holds the slot lock.
    let device = lock(&DEVICE).take();
    if let Some(mut device) = device {
        device.running.store(false, Ordering::Release);
        if let Some(mixer) = device.mixer.take()
            && mixer.join().is_err()
        {
            tracing::error!("soft audio mixing thread panicked");
        }
    }
}

/// Like SDL, waits for a running callback before changing the pause state.
pub(super) unsafe extern "C" fn pause_audio(pause_on: c_int) {
    MIXER_LOCK.acquire();
    if let Some(device) = lock(&DEVICE).as_ref() {
        device.paused.store(pause_on != 0, Ordering::Release);
    }
    MIXER_LOCK.release();
}

pub(super) unsafe extern "C" fn get_audio_status() -> AudioStatus {
    match lock(&DEVICE).as_ref() {
        None => SDL_AUDIO_STOPPED,
        Some(device) if device.paused.load(Ordering::Acquire) => SDL_AUDIO_PAUSED,
        Some(_) => SDL_AUDIO_PLAYING,
    }
}

pub(super) unsafe extern "C" fn lock_audio() {
    MIXER_LOCK.acquire();
}

pub(super) unsafe extern "C" fn unlock_audio() {
    MIXER_LOCK.release();
}

/// Lengths of the buffers handed out by [`load_wav_rw`], keyed by address.
static WAV_BUFFERS: Mutex<Option<HashMap<usize, usize>>> = Mutex::new(None);

struct WavFormat {
    encoding: u16,
    channels: u16,
    frequency: u32,
    bits: u16,
}

const WAVE_FORMAT_PCM: u16 = 0x0001;
const WAVE_FORMAT_IEEE_FLOAT: u16 = 0x0003;

fn le_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn le_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn parse_wav(bytes: &[u8]) -> Result<(WavFormat, &[u8]), String> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err("Unrecognized file type (not WAVE)".to_string());
    }
    let mut format = None;
    let mut data = None;
    let mut position = 12;
    while position + 8 <= bytes.len() {
        let id = &bytes[position..position + 4];
        let size = le_u32(bytes, position + 4) as usize;
        let start = position + 8;
        let end = start.saturating_add(size).min(bytes.len());
        match id {
            b"fmt " => {
                if end - start < 16 {
                    return Err("Invalid WAVE fmt chunk length".to_string());
                }
                format = Some(WavFormat {
                    encoding: le_u16(bytes, start),
                    channels: le_u16(bytes, start + 2),
                    frequency: le_u32(bytes, start + 4),
                    bits: le_u16(bytes, start + 14),
                });
            }
            b"data" => data = Some(&bytes[start..end]),
            _ => {}
        }
        position = start.saturating_add(size).saturating_add(size & 1);
    }
    let format = format.ok_or_else(|| "Missing fmt chunk in WAVE file".to_string())?;
    let data = data.ok_or_else(|| "Missing data chunk in WAVE file".to_string())?;
    Ok((format, data))
}

fn wav_audio_format(format: &WavFormat) -> Result<u16, String> {
    match (format.encoding, format.bits) {
        (WAVE_FORMAT_PCM, 8) => Ok(AUDIO_U8),
        (WAVE_FORMAT_PCM, 16) => Ok(AUDIO_S16LSB),
        (WAVE_FORMAT_PCM, 32) => Ok(AUDIO_S32LSB),
        (WAVE_FORMAT_PCM, bits) => Err(format!("{bits}-bit PCM data format not supported")),
        (WAVE_FORMAT_IEEE_FLOAT, 32) => Ok(AUDIO_F32LSB),
        (WAVE_FORMAT_IEEE_FLOAT, bits) => {
            Err(format!("{bits}-bit IEEE float data format not supported"))
        }
        (encoding, _) => Err(format!("Unknown WAVE data format: 0x{encoding:04x}")),
    }
}

unsafe fn read_all(src: *mut RWops) -> Result<Vec<u8>, String> {
    let Some(read) = (unsafe { (*src).read }) else {
        return Err("Error reading from datastream".to_string());
    };
    let mut bytes = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = unsafe { read(src, chunk.as_mut_ptr() as *mut c_void, 1, chunk.len()) };
        if n == 0 {
            break;
        }
        bytes.extend_from_slice(&chunk[..n]);
    }
    Ok(bytes)
}

unsafe fn close_source(src: *mut RWops) {
    match unsafe { (*src).close } {
        Some(close) => {
            unsafe { close(src) };
        }
        None => unsafe { super::rwops::free_rw(src) },
    }
}

unsafe fn decode_wav(src: *mut RWops, spec: &mut AudioSpec) -> Result<Vec<u8>, String> {
    let bytes = unsafe { read_all(src)? };
    let (format, data) = parse_wav(&bytes)?;
    let audio_format = wav_audio_format(&format)?;
    if format.channels == 0 || format.channels > 255 {
        return Err(format!("Invalid number of channels: {}", format.channels));
    }
    if format.frequency == 0 || format.frequency > c_int::MAX as u32 {
        return Err(format!("Invalid sample rate: {}", format.frequency));
    }
    let block = (format.bits as usize / 8) * format.channels as usize;
    let len = data.len() - data.len() % block.max(1);

    *spec = AudioSpec {
        freq: format.frequency as c_int,
        format: audio_format,
        channels: format.channels as u8,
        silence: silence_for(audio_format),
        samples: DEFAULT_SAMPLES,
        padding: 0,
        size: 0,
        callback: None,
        userdata: ptr::null_mut(),
    };
    Ok(data[..len].to_vec())
}

pub(super) unsafe extern "C" fn load_wav_rw(
    src: *mut RWops,
    freesrc: c_int,
    spec: *mut AudioSpec,
    audio_buf: *mut *mut u8,
    audio_len: *mut u32,
) -> *mut AudioSpec {
    if src.is_null() {
        invalid_param("src");
        return ptr::null_mut();
    }
    let result = match unsafe { spec.as_mut() } {
        _ if audio_buf.is_null() => Err("Parameter 'audio_buf' is invalid".to_string()),
        _ if audio_len.is_null() => Err("Parameter 'audio_len' is invalid".to_string()),
        Some(spec) => unsafe { decode_wav(src, spec) },
        None => Err("Parameter 'spec' is invalid".to_string()),
    };
    if freesrc != 0 {
        unsafe { close_source(src) };
    }
    let data = match result {
        Ok(data) => data,
        Err(message) => {
            set_error(message);
            return ptr::null_mut();
        }
    };

    let Ok(native_len) = u32::try_from(data.len()) else {
        set_error("Data length too large");
        return ptr::null_mut();
    };
    let mut data = data;
    if data.is_empty() {
        // Every handed out buffer needs a distinct address.
        data.push(0);
    }
    let len = data.len();
    let buffer = Box::into_raw(data.into_boxed_slice()) as *mut u8;
    lock(&WAV_BUFFERS)
        .get_or_insert_with(HashMap::new)
        .insert(buffer as usize, len);
    track_alloc();
    unsafe {
        *audio_buf = buffer;
        *audio_len = native_len;
    }
    spec
}

pub(super) unsafe extern "C" fn free_wav(audio_buf: *mut u8) {
    if audio_buf.is_null() {
        return;
    }
    let len = lock(&WAV_BUFFERS)
        .as_mut()
        .and_then(|buffers| buffers.remove(&(audio_buf as usize)));
    if let Some(len) = len {
        drop(unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(audio_buf, len)) });
        track_free();
    }
}
