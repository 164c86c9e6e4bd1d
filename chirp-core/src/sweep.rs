//! # Sweep Module
//!
//! The exponential sine sweep ("chirp") and its time-to-frequency mapping.
//! Both sides of the measurement share one frequency curve: the generator
//! emits a sine whose phase is the closed-form integral of the exponential
//! frequency ramp, and the analyzer inverts the same ramp to label each
//! captured sample with the frequency that was playing at that instant.
//!
//! ## Features
//! - Exponential (logarithmic) time-to-frequency interpolation
//! - Sample-accurate sweep synthesis with drift-free phase
//! - Iterator-based generation for streaming into an output callback

use std::f64::consts::TAU;

use crate::SweepSpec;

/// Maps elapsed sweep time to the instantaneous sweep frequency.
///
/// Exponential interpolation: `f(t) = f0 * (f1/f0)^(t/T)`. Times outside
/// the sweep window clamp to the respective endpoint frequency, so the
/// function is total and deterministic for any valid spec.
///
/// # Arguments
/// * `t` - Elapsed time in seconds since sweep start
/// * `spec` - The sweep parameters
///
/// # Returns
/// * Instantaneous frequency in Hz, within [start, end]
pub fn frequency_at(t: f32, spec: &SweepSpec) -> f32 {
    let t = t.clamp(0.0, spec.duration_s);
    let ratio = spec.end_freq_hz / spec.start_freq_hz;
    spec.start_freq_hz * ratio.powf(t / spec.duration_s)
}

/// Sample-by-sample generator for an exponential sine sweep.
///
/// The instantaneous frequency of the emitted signal matches
/// [`frequency_at`] by construction: the phase at time t is the analytic
/// integral `2*pi*f0*L*(e^(t/L) - 1)` with `L = T / ln(f1/f0)`, computed
/// per sample from the sample index rather than accumulated, so there is
/// no drift between generation and analysis.
///
/// Yields `sample_rate * duration` samples, then `None`.
pub struct SineSweep {
    sample_rate: u32,
    sample_index: u32,
    n_samples: u32,
    amplitude: f32,
    // f64 internally: the unwrapped phase reaches ~1.8e5 rad for a
    // 10 s 20 Hz..20 kHz sweep, too coarse for f32 before reduction.
    start_freq: f64,
    l: f64,
}

impl SineSweep {
    /// Creates a generator for the given spec.
    ///
    /// # Arguments
    /// * `spec` - Sweep parameters (must satisfy `SweepSpec::validate`)
    /// * `amplitude` - Peak amplitude of the emitted sine
    /// * `sample_rate` - Output sample rate in Hz
    pub fn new(spec: &SweepSpec, amplitude: f32, sample_rate: u32) -> Self {
        let ratio = (spec.end_freq_hz / spec.start_freq_hz) as f64;
        let l = spec.duration_s as f64 / ratio.ln();
        SineSweep {
            sample_rate,
            sample_index: 0,
            n_samples: (spec.duration_s * sample_rate as f32).round() as u32,
            amplitude,
            start_freq: spec.start_freq_hz as f64,
            l,
        }
    }

    /// Unwrapped sweep phase in radians at time `t` seconds.
    fn phase_at(&self, t: f64) -> f64 {
        TAU * self.start_freq * self.l * ((t / self.l).exp() - 1.0)
    }
}

impl Iterator for SineSweep {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.sample_index >= self.n_samples {
            return None;
        }
        let t = self.sample_index as f64 / self.sample_rate as f64;
        let phase = self.phase_at(t) % TAU;
        self.sample_index += 1;
        Some(self.amplitude * phase.sin() as f32)
    }
}
