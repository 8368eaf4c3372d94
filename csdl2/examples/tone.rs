// SPDX-FileCopyrightText: 2025 Contributors to the csdl2 project.
// SPDX-License-Identifier: Apache-2.0

//! Plays a sine tone through the legacy audio device.
//!
//! Without `--config` the software backend is used, which mixes into a
//! buffer instead of a sound card.

mod common;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use clap::Parser;
use csdl2::consts::AUDIO_S16SYS;
use csdl2::{AudioCallback, AudioSpec, ExportFlags, HostRef};
use tracing::info;

#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Opts {
    /// Binding configuration file (JSON).
    #[arg(long)]
    pub config: Option<String>,

    /// Tone frequency in Hz.
    #[arg(long, default_value_t = 440.0)]
    pub pitch: f64,

    /// Output sample rate.
    #[arg(long, default_value_t = 48000)]
    pub rate: i32,

    /// How long to play, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    pub duration: u64,
}

/// Sample frames written so far.
struct Phase(AtomicU64);

fn main() -> Result<(), csdl2::Error> {
    common::setup_logging();
    let opts: Opts = Opts::parse();
    let sdl = common::open_binding(opts.config.as_deref())?;

    let rate = opts.rate as f64;
    let pitch = opts.pitch;
    let phase = HostRef::new(Phase(AtomicU64::new(0)));
    let desired = AudioSpec {
        freq: opts.rate,
        format: AUDIO_S16SYS,
        channels: 1,
        samples: 1024,
        callback: Some(AudioCallback::new(move |userdata, stream, _len| {
            let Some(Phase(frames)) = userdata.and_then(|u| u.downcast_ref::<Phase>()) else {
                return Ok(());
            };
            let mut export = stream.begin_export(ExportFlags::WRITE)?;
            let samples = export.as_mut_slice()?;
            let start = frames.fetch_add((samples.len() / 2) as u64, Ordering::Relaxed);
            for (index, frame) in samples.chunks_exact_mut(2).enumerate() {
                let t = (start + index as u64) as f64 / rate;
                let amplitude = f64::sin(2.0 * std::f64::consts::PI * pitch * t) * 0.25;
                let value = (amplitude * i16::MAX as f64) as i16;
                frame.copy_from_slice(&value.to_ne_bytes());
            }
            Ok(())
        })),
        userdata: Some(phase.clone()),
        ..Default::default()
    };

    let (device, obtained) = sdl.open_audio(&desired)?;
    info!(
        "Opened audio device: {} Hz, {} channel(s), {} byte buffer",
        obtained.freq, obtained.channels, obtained.size
    );
    device.pause(false)?;
    std::thread::sleep(Duration::from_millis(opts.duration));
    device.close()?;

    let frames = phase
        .downcast_ref::<Phase>()
        .map(|Phase(frames)| frames.load(Ordering::Relaxed))
        .unwrap_or_default();
    info!("Played {frames} frame(s) at {pitch} Hz");
    Ok(())
}
