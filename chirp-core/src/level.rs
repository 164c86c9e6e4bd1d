//! # Level Conversion Module
//!
//! Converts linear sample amplitudes into clamped decibel values for the
//! response plot. The conversion is relative to full scale (amplitude 1.0
//! maps to 0 dB) and is numerically safe at zero amplitude.

use crate::{MAX_DB, MIN_DB};

/// Additive epsilon that keeps `log10` away from -infinity at zero
/// amplitude (1e-9 is roughly -180 dB, far below the display floor).
const DB_EPSILON: f32 = 1e-9;

/// Converts a linear amplitude into a decibel level.
///
/// The result is `20 * log10(|amplitude| + epsilon)` clamped to
/// [`MIN_DB`, `MAX_DB`]. Total function: never fails, and is
/// monotonically non-decreasing in `|amplitude|`.
///
/// # Arguments
/// * `amplitude` - Linear sample amplitude, sign is ignored
///
/// # Returns
/// * Level in dB within [`MIN_DB`, `MAX_DB`]
pub fn to_decibels(amplitude: f32) -> f32 {
    let db = 20.0 * (amplitude.abs() + DB_EPSILON).log10();
    db.clamp(MIN_DB, MAX_DB)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_amplitude_clamps_to_floor() {
        // 20 * log10(1e-9) is about -180 dB, well below the -100 dB floor.
        assert_eq!(to_decibels(0.0), MIN_DB);
    }

    #[test]
    fn full_scale_is_zero_db() {
        assert_eq!(to_decibels(1.0), 0.0);
        assert_eq!(to_decibels(-1.0), 0.0);
    }

    #[test]
    fn half_scale_is_about_minus_six_db() {
        let db = to_decibels(0.5);
        assert!((db - (-6.0206)).abs() < 1e-3, "got {db}");
    }

    #[test]
    fn clipped_amplitudes_clamp_to_ceiling() {
        assert_eq!(to_decibels(1.5), MAX_DB);
    }

    #[test]
    fn monotonically_non_decreasing() {
        let mut last = f32::NEG_INFINITY;
        for i in 0..=1000 {
            let amp = i as f32 / 1000.0;
            let db = to_decibels(amp);
            assert!(db >= last, "level decreased at amplitude {amp}");
            last = db;
        }
    }
}
