//! # Audio I/O Module
//!
//! This module handles audio playback and capture using CPAL
//! (Cross-Platform Audio Library): the output side drives the sweep
//! oscillator through the default output device, and the input side
//! streams captured sample chunks to the session over a channel.
//!
//! ## Features
//! - Strict capture configuration (mono, f32, preferred sample rate)
//!   with a relaxed device-default fallback
//! - Streaming capture via crossbeam channels
//! - Sweep playback on the default output device
//! - Mapping of CPAL errors onto the session error taxonomy

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, SupportedStreamConfigRange};
use crossbeam_channel::Sender;

use crate::session::SessionError;
use crate::sweep::SineSweep;
use crate::{SWEEP_AMPLITUDE, SweepSpec};

/// Sample rate requested under strict capture constraints.
pub const PREFERRED_SAMPLE_RATE: u32 = 48_000;

/// How demanding the capture configuration is.
///
/// `Strict` asks for the measurement-friendly configuration (mono,
/// 32-bit float, the preferred sample rate). `Relaxed` takes whatever
/// the device offers by default; it is the automatic fallback after a
/// strict configuration is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureConstraints {
    Strict,
    Relaxed,
}

/// A running capture stream plus the format it actually delivers.
pub struct CaptureStream {
    pub stream: cpal::Stream,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Acquires the default capture device.
pub fn default_input_device() -> Result<cpal::Device, SessionError> {
    cpal::default_host()
        .default_input_device()
        .ok_or(SessionError::DeviceNotFound)
}

/// Starts audio capture on the given device.
///
/// Every chunk the device delivers is converted to f32 (if needed) and
/// sent over the channel as-is, still interleaved; the session folds it
/// to mono after the recording stops.
///
/// # Arguments
/// * `device` - Capture device, usually the cached default input
/// * `constraints` - Strict or relaxed configuration selection
/// * `sender` - Channel sender for the captured sample chunks
///
/// # Returns
/// * `Ok(capture)` - Running stream and its delivered format
/// * `Err(e)` - Mapped CPAL failure; `ConstraintsUnsupported` signals
///   that a relaxed retry may succeed
pub fn start_capture(
    device: &cpal::Device,
    constraints: CaptureConstraints,
    sender: Sender<Vec<f32>>,
) -> Result<CaptureStream, SessionError> {
    let supported = match constraints {
        CaptureConstraints::Strict => {
            let configs = device
                .supported_input_configs()
                .map_err(map_configs_error)?
                .collect::<Vec<_>>();
            let range = find_strict_config(configs, PREFERRED_SAMPLE_RATE).ok_or_else(|| {
                SessionError::ConstraintsUnsupported(
                    "no mono f32 input configuration available".to_string(),
                )
            })?;
            let rate =
                PREFERRED_SAMPLE_RATE.clamp(range.min_sample_rate().0, range.max_sample_rate().0);
            range.with_sample_rate(SampleRate(rate))
        }
        CaptureConstraints::Relaxed => device
            .default_input_config()
            .map_err(map_default_config_error)?,
    };

    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels();
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();

    eprintln!(
        "[AUDIO] Capture config: {sample_rate} Hz, {channels} channel(s), {sample_format} ({constraints:?})"
    );

    let err_fn = |err| eprintln!("[AUDIO] Input stream error: {err}");

    let stream = match sample_format {
        cpal::SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let _ = sender.send(data.to_vec());
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let _ = sender.send(data.iter().map(|&s| s as f32 / 32_768.0).collect());
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::U16 => device.build_input_stream(
            &config,
            move |data: &[u16], _: &cpal::InputCallbackInfo| {
                let _ = sender.send(
                    data.iter()
                        .map(|&s| (s as f32 - 32_768.0) / 32_768.0)
                        .collect(),
                );
            },
            err_fn,
            None,
        ),
        other => {
            return Err(SessionError::ConstraintsUnsupported(format!(
                "unsupported capture sample format {other}"
            )));
        }
    }
    .map_err(map_build_error)?;

    stream.play().map_err(map_play_error)?;

    Ok(CaptureStream {
        stream,
        sample_rate,
        channels,
    })
}

/// Starts sweep playback on the default output device.
///
/// The returned stream keeps playing until dropped; after the sweep's
/// last sample the oscillator emits silence, so stopping a moment late
/// is harmless.
pub fn start_playback(spec: &SweepSpec) -> Result<cpal::Stream, SessionError> {
    let device = cpal::default_host()
        .default_output_device()
        .ok_or_else(|| SessionError::Oscillator("no output device available".to_string()))?;

    let supported = device
        .default_output_config()
        .map_err(|e| SessionError::Oscillator(e.to_string()))?;
    let supported = if supported.sample_format() == cpal::SampleFormat::F32 {
        supported
    } else {
        let configs = device
            .supported_output_configs()
            .map_err(|e| SessionError::Oscillator(e.to_string()))?
            .collect::<Vec<_>>();
        let range = configs
            .into_iter()
            .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
            .min_by_key(|c| rate_distance(c, PREFERRED_SAMPLE_RATE))
            .ok_or_else(|| {
                SessionError::Oscillator("no f32 output configuration available".to_string())
            })?;
        let rate =
            PREFERRED_SAMPLE_RATE.clamp(range.min_sample_rate().0, range.max_sample_rate().0);
        range.with_sample_rate(SampleRate(rate))
    };

    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels() as usize;
    let config: cpal::StreamConfig = supported.into();

    eprintln!("[AUDIO] Playback config: {sample_rate} Hz, {channels} channel(s)");

    let mut sweep = SineSweep::new(spec, SWEEP_AMPLITUDE, sample_rate);
    let err_fn = |err| eprintln!("[AUDIO] Output stream error: {err}");

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    let sample = sweep.next().unwrap_or(0.0);
                    for out in frame.iter_mut() {
                        *out = sample;
                    }
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| SessionError::Oscillator(e.to_string()))?;

    stream.play().map_err(|e| SessionError::Oscillator(e.to_string()))?;

    Ok(stream)
}

/// Finds the best strict capture configuration: mono, 32-bit float,
/// closest available range to the target sample rate.
fn find_strict_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.channels() == 1 && c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| rate_distance(c, target_rate))
}

fn rate_distance(config: &SupportedStreamConfigRange, target_rate: u32) -> i32 {
    let min_diff = (config.min_sample_rate().0 as i32 - target_rate as i32).abs();
    let max_diff = (config.max_sample_rate().0 as i32 - target_rate as i32).abs();
    min_diff.min(max_diff)
}

fn map_configs_error(err: cpal::SupportedStreamConfigsError) -> SessionError {
    match err {
        cpal::SupportedStreamConfigsError::DeviceNotAvailable => SessionError::DeviceNotFound,
        cpal::SupportedStreamConfigsError::InvalidArgument => {
            SessionError::ConstraintsUnsupported("invalid capture configuration query".to_string())
        }
        cpal::SupportedStreamConfigsError::BackendSpecific { err } => map_backend_error(err),
        other => SessionError::Backend(other.to_string()),
    }
}

fn map_default_config_error(err: cpal::DefaultStreamConfigError) -> SessionError {
    match err {
        cpal::DefaultStreamConfigError::DeviceNotAvailable => SessionError::DeviceNotFound,
        cpal::DefaultStreamConfigError::StreamTypeNotSupported => {
            SessionError::ConstraintsUnsupported("input streams not supported".to_string())
        }
        cpal::DefaultStreamConfigError::BackendSpecific { err } => map_backend_error(err),
        other => SessionError::Backend(other.to_string()),
    }
}

fn map_build_error(err: cpal::BuildStreamError) -> SessionError {
    match err {
        cpal::BuildStreamError::DeviceNotAvailable => SessionError::DeviceNotFound,
        cpal::BuildStreamError::StreamConfigNotSupported => SessionError::ConstraintsUnsupported(
            "requested capture configuration rejected by the device".to_string(),
        ),
        cpal::BuildStreamError::InvalidArgument => {
            SessionError::ConstraintsUnsupported("invalid capture configuration".to_string())
        }
        cpal::BuildStreamError::BackendSpecific { err } => map_backend_error(err),
        other => SessionError::Backend(other.to_string()),
    }
}

fn map_play_error(err: cpal::PlayStreamError) -> SessionError {
    match err {
        cpal::PlayStreamError::DeviceNotAvailable => SessionError::DeviceNotFound,
        cpal::PlayStreamError::BackendSpecific { err } => map_backend_error(err),
        other => SessionError::Backend(other.to_string()),
    }
}

/// Backend-specific failures carry only a description string; permission
/// refusals are recognized by wording, everything else stays generic.
fn map_backend_error(err: cpal::BackendSpecificError) -> SessionError {
    let description = err.to_string();
    let lowered = description.to_lowercase();
    if lowered.contains("permission") || lowered.contains("denied") || lowered.contains("access") {
        SessionError::PermissionDenied(description)
    } else {
        SessionError::Backend(description)
    }
}
