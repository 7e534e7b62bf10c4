//! Static overtone tables: measured ratio, amplitude and decay per material class.
//!
//! Fallback data source when no analytic or recorded set is wanted. The
//! tables are normalized at authoring time and taken verbatim.

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::modes::{Decay, Mode, ModeSet};
use crate::tables::NUM_MODES;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialClass {
    Wood,
    Glass,
    Metal,
}

impl MaterialClass {
    pub const ALL: [MaterialClass; 3] = [MaterialClass::Wood, MaterialClass::Glass, MaterialClass::Metal];

    pub fn name(&self) -> &'static str {
        match self {
            MaterialClass::Wood => "wood",
            MaterialClass::Glass => "glass",
            MaterialClass::Metal => "metal",
        }
    }

    /// f_n / f_1 for each mode.
    pub fn overtone_ratios(&self) -> &'static [f64; NUM_MODES] {
        match self {
            MaterialClass::Wood => &[1.0, 2.76, 5.40, 8.91, 12.02, 16.1, 19.5, 23.0],
            MaterialClass::Glass => &[1.0, 2.78, 5.45, 8.95, 12.1, 16.2, 19.6, 23.1],
            MaterialClass::Metal => &[1.0, 2.74, 5.35, 8.85, 11.95, 16.0, 19.4, 22.9],
        }
    }

    /// Strike-point relative amplitudes.
    pub fn amplitudes(&self) -> &'static [f64; NUM_MODES] {
        match self {
            MaterialClass::Wood => &[1.0, 0.95, 0.64, 0.26, 0.07, 0.27, 0.32, 0.24],
            MaterialClass::Glass => &[1.0, 0.21, 0.71, 0.49, 0.26, 0.04, 0.13, 0.23],
            MaterialClass::Metal => &[1.0, 1.0, 0.76, 0.43, 0.10, 0.15, 0.29, 0.32],
        }
    }

    /// Decay times (s).
    pub fn decay_times(&self) -> &'static [f64; NUM_MODES] {
        match self {
            MaterialClass::Wood => &[0.8, 0.29, 0.15, 0.09, 0.06, 0.04, 0.03, 0.02],
            MaterialClass::Glass => &[1.5, 0.55, 0.28, 0.17, 0.11, 0.08, 0.06, 0.04],
            MaterialClass::Metal => &[3.0, 1.15, 0.60, 0.36, 0.23, 0.17, 0.13, 0.10],
        }
    }
}

impl fmt::Display for MaterialClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MaterialClass {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MaterialClass::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownMaterial(s.to_string()))
    }
}

/// Scale a class's ratio table by `fundamental_freq` and pair it with the
/// class's amplitude and decay tables.
pub fn generate_modes(material_class: MaterialClass, fundamental_freq: f64) -> Result<ModeSet, ConfigError> {
    if !(fundamental_freq.is_finite() && fundamental_freq > 0.0) {
        return Err(ConfigError::NonPositiveFrequency {
            mode: 0,
            frequency: fundamental_freq,
        });
    }

    let ratios = material_class.overtone_ratios();
    let amps = material_class.amplitudes();
    let decays = material_class.decay_times();

    let modes = (0..NUM_MODES)
        .map(|i| Mode {
            frequency: fundamental_freq * ratios[i],
            amplitude: amps[i],
            decay_time: Decay::Seconds(decays[i]),
        })
        .collect();

    Ok(ModeSet::prenormalized(modes))
}
