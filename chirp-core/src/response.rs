//! # Response Reduction Module
//!
//! The analytical core of the measurement: reduces a captured PCM buffer
//! into a bounded number of (frequency, level) points suitable for a
//! logarithmic-frequency plot. The reduction is purely time-domain: each
//! bin of consecutive samples contributes one peak point and one RMS
//! point, and the bin's frequency label comes from inverting the sweep's
//! exponential frequency ramp at the bin's midpoint time. No FFT, no
//! deconvolution.

use crate::level::to_decibels;
use crate::sweep::frequency_at;
use crate::{PcmBuffer, ResponseCurve, ResponsePoint, SweepSpec};

/// Reduces a captured buffer into peak and RMS response curves.
///
/// The buffer is partitioned into consecutive, non-overlapping bins of
/// `max(1, sample_count / width)` samples (the trailing bin may be
/// shorter, never empty). Per bin the peak absolute amplitude and the
/// RMS amplitude are converted to dB, and the bin is labelled with the
/// sweep frequency at its midpoint time. Bins whose frequency falls
/// outside the sweep's [start, end] range are dropped; this guards
/// against samples recorded during the guard interval after the sweep.
///
/// Deterministic: the per-bin summation is sequential, so the same
/// buffer, spec and width always produce bit-identical curves.
///
/// # Arguments
/// * `buffer` - Decoded mono capture
/// * `spec` - The sweep parameters used for the run
/// * `width` - Target number of output points, nominally the plot's
///   horizontal resolution in pixels; values below 1 are clamped to 1
///
/// # Returns
/// * Index-aligned peak and RMS point sequences; empty for an empty buffer
pub fn reduce(buffer: &PcmBuffer, spec: &SweepSpec, width: u32) -> ResponseCurve {
    let n = buffer.samples.len();
    if n == 0 {
        return ResponseCurve::default();
    }

    let width = width.max(1) as usize;
    let samples_per_bin = (n / width).max(1);

    let mut curve = ResponseCurve {
        peak: Vec::with_capacity(n.div_ceil(samples_per_bin)),
        rms: Vec::with_capacity(n.div_ceil(samples_per_bin)),
    };

    let mut start = 0;
    while start < n {
        let end = (start + samples_per_bin).min(n);
        let bin = &buffer.samples[start..end];

        let mut peak_amplitude = 0.0_f32;
        let mut sum_of_squares = 0.0_f32;
        for &sample in bin {
            peak_amplitude = peak_amplitude.max(sample.abs());
            sum_of_squares += sample * sample;
        }
        let rms_amplitude = (sum_of_squares / bin.len() as f32).sqrt();

        // The bin's middle sample decides which sweep frequency it gets.
        let middle_index = start + bin.len() / 2;
        let time = (middle_index as f32 / buffer.sample_rate as f32).clamp(0.0, spec.duration_s);
        let frequency_hz = frequency_at(time, spec);

        if frequency_hz >= spec.start_freq_hz && frequency_hz <= spec.end_freq_hz {
            curve.peak.push(ResponsePoint {
                frequency_hz,
                level_db: to_decibels(peak_amplitude),
            });
            curve.rms.push(ResponsePoint {
                frequency_hz,
                level_db: to_decibels(rms_amplitude),
            });
        }

        start = end;
    }

    curve
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MIN_DB;

    fn buffer(sample_rate: u32, samples: Vec<f32>) -> PcmBuffer {
        PcmBuffer {
            sample_rate,
            samples,
        }
    }

    #[test]
    fn empty_buffer_yields_empty_curves() {
        let curve = reduce(&buffer(48_000, vec![]), &SweepSpec::default(), 600);
        assert!(curve.peak.is_empty());
        assert!(curve.rms.is_empty());
    }

    #[test]
    fn silence_sits_on_the_display_floor() {
        // 48000 samples at 4.8 kHz over 10 s, 480 bins of 100 samples.
        let curve = reduce(&buffer(4_800, vec![0.0; 48_000]), &SweepSpec::default(), 480);
        assert_eq!(curve.peak.len(), 480);
        assert_eq!(curve.rms.len(), 480);
        for (p, r) in curve.peak.iter().zip(&curve.rms) {
            assert_eq!(p.level_db, MIN_DB);
            assert_eq!(r.level_db, MIN_DB);
            assert_eq!(p.frequency_hz, r.frequency_hz);
        }
    }

    #[test]
    fn full_scale_sits_at_zero_db() {
        let curve = reduce(&buffer(4_800, vec![1.0; 48_000]), &SweepSpec::default(), 480);
        assert!(!curve.peak.is_empty());
        for (p, r) in curve.peak.iter().zip(&curve.rms) {
            assert_eq!(p.level_db, 0.0);
            assert_eq!(r.level_db, 0.0);
        }
    }

    #[test]
    fn frequencies_are_monotonic_and_within_the_sweep_range() {
        let spec = SweepSpec::default();
        let curve = reduce(&buffer(48_000, vec![0.25; 480_000]), &spec, 600);
        let mut last = 0.0;
        for p in &curve.peak {
            assert!(p.frequency_hz >= spec.start_freq_hz);
            assert!(p.frequency_hz <= spec.end_freq_hz);
            assert!(p.frequency_hz >= last);
            last = p.frequency_hz;
        }
    }

    #[test]
    fn first_bin_of_the_reference_setup_lands_near_20_hz() {
        // 10 s sweep at 48 kHz with width 600: 800 samples per bin, the
        // first bin's midpoint is sample 400 -> t ~= 8.33 ms -> ~20.12 Hz.
        let spec = SweepSpec::default();
        let curve = reduce(&buffer(48_000, vec![0.5; 480_000]), &spec, 600);
        assert_eq!(curve.peak.len(), 600);
        let first = curve.peak[0].frequency_hz;
        assert!((first - 20.115).abs() < 0.01, "got {first}");
    }

    #[test]
    fn width_below_one_is_clamped_to_a_single_bin() {
        let curve = reduce(&buffer(48_000, vec![0.5; 4_800]), &SweepSpec::default(), 0);
        assert_eq!(curve.peak.len(), 1);
        assert_eq!(curve.rms.len(), 1);
    }

    #[test]
    fn trailing_partial_bin_is_kept() {
        // 1049 samples with width 10 -> 104 per bin, ten full bins plus
        // a trailing bin of 9 samples which is still emitted.
        let spec = SweepSpec {
            duration_s: 10.0,
            ..SweepSpec::default()
        };
        let curve = reduce(&buffer(100, vec![0.5; 1_049]), &spec, 10);
        assert_eq!(curve.peak.len(), 11);
    }

    #[test]
    fn samples_past_the_sweep_window_are_dropped() {
        // 1 s of samples against a 0.5 s sweep: bins whose midpoint time
        // clamps to the sweep end map to exactly end_freq and stay, but
        // the curve must never report a frequency beyond the end.
        let spec = SweepSpec {
            duration_s: 0.5,
            start_freq_hz: 100.0,
            end_freq_hz: 1_000.0,
        };
        let curve = reduce(&buffer(1_000, vec![0.5; 1_000]), &spec, 10);
        for p in &curve.peak {
            assert!(p.frequency_hz <= spec.end_freq_hz);
        }
    }

    #[test]
    fn rms_never_exceeds_peak() {
        let samples: Vec<f32> = (0..48_000)
            .map(|i| (i as f32 * 0.01).sin() * 0.8)
            .collect();
        let curve = reduce(&buffer(4_800, samples), &SweepSpec::default(), 300);
        for (p, r) in curve.peak.iter().zip(&curve.rms) {
            assert!(r.level_db <= p.level_db + 1e-4);
        }
    }

    #[test]
    fn reduction_is_deterministic() {
        let samples: Vec<f32> = (0..48_000)
            .map(|i| (i as f32 * 0.37).sin() * 0.6)
            .collect();
        let buf = buffer(4_800, samples);
        let spec = SweepSpec::default();
        let a = reduce(&buf, &spec, 600);
        let b = reduce(&buf, &spec, 600);
        assert_eq!(a.peak, b.peak);
        assert_eq!(a.rms, b.rms);
    }
}
