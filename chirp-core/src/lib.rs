// chirp-core/src/lib.rs

//! The core logic for the chirp frequency-response analyzer.
//! This crate is responsible for generating the exponential sine sweep,
//! capturing the microphone signal while the sweep plays, and reducing
//! the recording into a plot-ready response curve. It is completely
//! headless and contains no terminal or GUI code.

use serde::Serialize;

pub mod audio;
pub mod level;
pub mod response;
pub mod session;
pub mod sweep;

/// Default sweep duration in seconds.
pub const CHIRP_DURATION_S: f32 = 10.0;
/// Default sweep start frequency in Hz.
pub const START_FREQ_HZ: f32 = 20.0;
/// Default sweep end frequency in Hz.
pub const END_FREQ_HZ: f32 = 20_000.0;
/// Lower bound of the level axis in dB.
pub const MIN_DB: f32 = -100.0;
/// Upper bound of the level axis in dB (0 dB = full scale).
pub const MAX_DB: f32 = 0.0;
/// Playback amplitude of the sweep (half of full scale).
pub const SWEEP_AMPLITUDE: f32 = 0.5;
/// Extra recording time after the nominal sweep end, in milliseconds.
/// The recorder's last buffer may lag slightly past oscillator stop;
/// stopping too early truncates the tail of the sweep.
pub const GUARD_INTERVAL_MS: u64 = 150;

/// Parameters of one exponential sine sweep.
///
/// Immutable once a measurement run begins; the same spec drives both
/// the generated playback signal and the analysis of the recording.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepSpec {
    /// Sweep duration in seconds.
    pub duration_s: f32,
    /// Start frequency in Hz. Must be positive: exponential frequency
    /// ramps are numerically undefined at 0 Hz.
    pub start_freq_hz: f32,
    /// End frequency in Hz. Must be greater than the start frequency.
    pub end_freq_hz: f32,
}

impl Default for SweepSpec {
    fn default() -> Self {
        Self {
            duration_s: CHIRP_DURATION_S,
            start_freq_hz: START_FREQ_HZ,
            end_freq_hz: END_FREQ_HZ,
        }
    }
}

impl SweepSpec {
    /// Checks that the sweep parameters describe a valid exponential ramp.
    ///
    /// # Returns
    /// * `Ok(())` - The spec is usable for generation and analysis
    /// * `Err(e)` - `SessionError::InvalidSweep` describing the problem
    pub fn validate(&self) -> Result<(), session::SessionError> {
        if !self.duration_s.is_finite() || self.duration_s <= 0.0 {
            return Err(session::SessionError::InvalidSweep(format!(
                "duration must be positive, got {}",
                self.duration_s
            )));
        }
        if !self.start_freq_hz.is_finite() || self.start_freq_hz <= 0.0 {
            return Err(session::SessionError::InvalidSweep(format!(
                "start frequency must be positive, got {}",
                self.start_freq_hz
            )));
        }
        if !self.end_freq_hz.is_finite() || self.end_freq_hz <= self.start_freq_hz {
            return Err(session::SessionError::InvalidSweep(format!(
                "end frequency must exceed start frequency, got {} -> {}",
                self.start_freq_hz, self.end_freq_hz
            )));
        }
        Ok(())
    }
}

/// One capture's worth of decoded mono PCM audio.
///
/// Produced once per capture and immutable thereafter; the reducer is
/// its sole consumer.
#[derive(Debug, Clone)]
pub struct PcmBuffer {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Mono samples, nominally in [-1.0, 1.0].
    pub samples: Vec<f32>,
}

/// A single (frequency, level) point of the measured response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResponsePoint {
    /// Frequency in Hz, within the sweep's [start, end] range.
    pub frequency_hz: f32,
    /// Level in dB, clamped to [MIN_DB, MAX_DB].
    pub level_db: f32,
}

/// The measured frequency response: peak and RMS envelopes.
///
/// Both sequences are index-aligned (point i shares the same time bin
/// and therefore the same nominal frequency) and ordered by
/// non-decreasing frequency.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResponseCurve {
    /// Per-bin peak levels.
    pub peak: Vec<ResponsePoint>,
    /// Per-bin RMS levels.
    pub rms: Vec<ResponsePoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_spec_is_valid() {
        assert!(SweepSpec::default().validate().is_ok());
    }

    #[test]
    fn zero_start_frequency_is_rejected() {
        let spec = SweepSpec {
            start_freq_hz: 0.0,
            ..SweepSpec::default()
        };
        assert!(spec.validate().is_err());
    }

    #[test]
    fn inverted_frequency_range_is_rejected() {
        let spec = SweepSpec {
            start_freq_hz: 2000.0,
            end_freq_hz: 20.0,
            ..SweepSpec::default()
        };
        assert!(spec.validate().is_err());
    }

    #[test]
    fn non_positive_duration_is_rejected() {
        let spec = SweepSpec {
            duration_s: 0.0,
            ..SweepSpec::default()
        };
        assert!(spec.validate().is_err());
    }
}
