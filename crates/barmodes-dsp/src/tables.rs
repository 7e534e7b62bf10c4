//! Shared constants and note mapping for struck-bar modal tables.
//!
//! Free-free Euler-Bernoulli beam with a fixed rectangular profile.
//! Range: MIDI 21 (A0) to MIDI 108 (C8), 88 bars.

use crate::error::ConfigError;
use crate::material::MaterialDescriptor;

pub const NUM_MODES: usize = 8;
pub const MIDI_LO: u8 = 21;
pub const MIDI_HI: u8 = 108;
pub const NUM_NOTES: usize = (MIDI_HI - MIDI_LO + 1) as usize;

/// beta_n * L roots of the free-free frequency equation cos(bL)cosh(bL) = 1.
pub const BEAM_EIGENVALUES: [f64; NUM_MODES] =
    [4.730, 7.853, 10.996, 14.137, 17.279, 20.521, 23.763, 27.005];

/// Bar cross-section (m).
pub const BAR_WIDTH: f64 = 0.03;
pub const BAR_HEIGHT: f64 = 0.02;

/// Reference bar length (m) sounding `F_BASE` before tuning correction.
pub const L_BASE: f64 = 0.3;
pub const F_BASE: f64 = 440.0;

/// MIDI note number to fundamental frequency (Hz), A440 tuning.
pub fn midi_to_freq(midi: i32) -> f64 {
    440.0 * f64::powf(2.0, (midi as f64 - 69.0) / 12.0)
}

/// Frequency ratio of an interval given in cents.
pub fn cents_ratio(cents: f64) -> f64 {
    f64::powf(2.0, cents / 1200.0)
}

/// Cross-sectional area and second moment of area of a rectangular section.
pub fn rect_section(width: f64, height: f64) -> (f64, f64) {
    let area = width * height;
    let inertia = width * height.powi(3) / 12.0;
    (area, inertia)
}

/// Idealized bar length (m) for a note in the given material.
///
/// Length scales as 1/sqrt(f) from the reference bar, then shrinks by
/// sqrt(tuning_ratio) so the material's analytic pitch lands on the note.
pub fn length_for_note(midi: i32, material: &MaterialDescriptor) -> Result<f64, ConfigError> {
    let freq = midi_to_freq(midi);
    let tune = material.tuning_ratio();
    let length = L_BASE * (F_BASE / freq).sqrt() / tune.sqrt();

    if !(length.is_finite() && length > 0.0) {
        return Err(ConfigError::NonPositiveLength { length });
    }
    Ok(length)
}
