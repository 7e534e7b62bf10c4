//! Analytic mode generator for a free-free Euler-Bernoulli bar.
//!
//! f_n   = beta_n^2 / (2 pi L^2) * sqrt(E I / (rho A))
//! amp_n = strength * |sin(pi (n+1) x)| / sqrt(f_n) * override_n
//! t_n   = 2.2 / (eta f_n)

use std::f64::consts::PI;

use crate::error::ConfigError;
use crate::material::MaterialDescriptor;
use crate::modes::{Decay, Mode, ModeSet};
use crate::tables::{BAR_HEIGHT, BAR_WIDTH, BEAM_EIGENVALUES, NUM_MODES, rect_section};

/// Where and how hard the bar is struck.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Strike {
    /// Strike point (m from the bar end). Clamped onto the bar.
    pub position: f64,
    /// Excitation scale, >= 0.
    pub strength: f64,
}

/// Default strike point as a fraction of bar length.
pub const DEFAULT_STRIKE_FRACTION: f64 = 0.25;
pub const DEFAULT_STRIKE_STRENGTH: f64 = 1.0;

impl Strike {
    /// Strike at `fraction` of a bar of `length` m.
    pub fn at_fraction(fraction: f64, length: f64, strength: f64) -> Self {
        Self {
            position: fraction * length,
            strength,
        }
    }
}

/// Flexural wave-speed factor sqrt(E I / (rho A)) for the fixed bar profile.
pub fn flexural_factor(material: &MaterialDescriptor) -> f64 {
    let (area, inertia) = rect_section(BAR_WIDTH, BAR_HEIGHT);
    (material.youngs_modulus() * inertia / (material.density() * area)).sqrt()
}

/// Compute the normalized mode set of one bar.
///
/// Frequencies strictly increase with mode index. A zero strike strength
/// yields all-zero amplitudes.
pub fn generate_modes(
    length: f64,
    material: &MaterialDescriptor,
    strike_pos: f64,
    strike_strength: f64,
) -> Result<ModeSet, ConfigError> {
    if !(length.is_finite() && length > 0.0) {
        return Err(ConfigError::NonPositiveLength { length });
    }
    if !strike_pos.is_finite() {
        return Err(ConfigError::InvalidStrike {
            field: "position",
            value: strike_pos,
        });
    }
    if !(strike_strength.is_finite() && strike_strength >= 0.0) {
        return Err(ConfigError::InvalidStrike {
            field: "strength",
            value: strike_strength,
        });
    }

    let flex = flexural_factor(material);
    let x = (strike_pos / length).clamp(0.0, 1.0);
    let eta = material.loss_factor();

    let mut modes = Vec::with_capacity(NUM_MODES);
    for n in 0..NUM_MODES {
        let beta = BEAM_EIGENVALUES[n];
        let frequency = beta * beta / (2.0 * PI * length * length) * flex;
        if !(frequency.is_finite() && frequency > 0.0) {
            return Err(ConfigError::NonPositiveFrequency { mode: n, frequency });
        }

        let shape = (PI * (n + 1) as f64 * x).sin().abs();
        let amplitude = strike_strength * shape / frequency.sqrt() * material.amplitude_override(n);
        let t60 = 2.2 / (eta * frequency);

        modes.push(Mode {
            frequency,
            amplitude,
            decay_time: Decay::Seconds(t60),
        });
    }

    Ok(ModeSet::normalized(modes))
}

/// Mode set for a bar struck with a [`Strike`].
pub fn generate_struck(length: f64, material: &MaterialDescriptor, strike: Strike) -> Result<ModeSet, ConfigError> {
    generate_modes(length, material, strike.position, strike.strength)
}
