//! Resonator materials and the startup registry.
//!
//! Descriptors are validated on construction and never mutated afterwards.
//! The material identifier lives in the registry, not in the descriptor; every
//! generator receives the descriptor it needs as an explicit argument.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::tables::{NUM_MODES, cents_ratio};

/// Physical constants of one bar material.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialDescriptor {
    youngs_modulus: f64,
    density: f64,
    loss_factor: f64,
    tuning_ratio: f64,
    amplitude_overrides: [f64; NUM_MODES],
}

impl MaterialDescriptor {
    /// - `youngs_modulus`: E in Pa
    /// - `density`: rho in kg/m^3
    /// - `loss_factor`: damping eta (dimensionless)
    /// - `tuning_ratio`: length-correction scalar
    pub fn new(
        youngs_modulus: f64,
        density: f64,
        loss_factor: f64,
        tuning_ratio: f64,
    ) -> Result<Self, ConfigError> {
        check_positive("youngs_modulus", youngs_modulus)?;
        check_positive("density", density)?;
        check_positive("loss_factor", loss_factor)?;
        check_positive("tuning_ratio", tuning_ratio)?;

        Ok(Self {
            youngs_modulus,
            density,
            loss_factor,
            tuning_ratio,
            amplitude_overrides: [1.0; NUM_MODES],
        })
    }

    /// Attach a per-mode amplitude multiplier. Modes without one stay at 1.0.
    pub fn with_amplitude_override(mut self, mode: usize, multiplier: f64) -> Result<Self, ConfigError> {
        if mode >= NUM_MODES || !multiplier.is_finite() || multiplier < 0.0 {
            return Err(ConfigError::InvalidOverride {
                mode: mode.to_string(),
                limit: NUM_MODES,
            });
        }
        self.amplitude_overrides[mode] = multiplier;
        Ok(self)
    }

    pub fn youngs_modulus(&self) -> f64 {
        self.youngs_modulus
    }

    pub fn density(&self) -> f64 {
        self.density
    }

    pub fn loss_factor(&self) -> f64 {
        self.loss_factor
    }

    pub fn tuning_ratio(&self) -> f64 {
        self.tuning_ratio
    }

    pub fn amplitude_override(&self, mode: usize) -> f64 {
        self.amplitude_overrides.get(mode).copied().unwrap_or(1.0)
    }
}

fn check_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositiveConstant { field, value })
    }
}

/// Ordered mapping from material identifier to descriptor.
#[derive(Debug, Clone, Default)]
pub struct MaterialRegistry {
    entries: Vec<(String, MaterialDescriptor)>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryFile {
    #[serde(default)]
    materials: BTreeMap<String, MaterialEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MaterialEntry {
    youngs_modulus: f64,
    density: f64,
    loss_factor: f64,
    #[serde(default = "unity")]
    tuning_ratio: f64,
    #[serde(default)]
    mode_amplitude_overrides: BTreeMap<String, f64>,
}

fn unity() -> f64 {
    1.0
}

impl MaterialRegistry {
    /// Wood, glass and metal bars as used for the shipped tables.
    ///
    /// Tuning ratios are the measured pitch offsets of each material's
    /// analytic bar (wood +33 cents, glass and metal an octave-folded +323
    /// and +813 cents). Glass gets a quieter second mode.
    pub fn builtin() -> Self {
        let mut registry = Self::default();

        let wood = MaterialDescriptor {
            youngs_modulus: 1.0e10,
            density: 700.0,
            loss_factor: 0.005,
            tuning_ratio: cents_ratio(33.0),
            amplitude_overrides: [1.0; NUM_MODES],
        };

        let mut glass_overrides = [0.8; NUM_MODES];
        glass_overrides[0] = 1.0;
        glass_overrides[1] = 0.2;
        let glass = MaterialDescriptor {
            youngs_modulus: 9.0e10,
            density: 2200.0,
            loss_factor: 0.001,
            tuning_ratio: cents_ratio(323.0) / 2.0,
            amplitude_overrides: glass_overrides,
        };

        let metal = MaterialDescriptor {
            youngs_modulus: 6.5e10,
            density: 2800.0,
            loss_factor: 0.0005,
            tuning_ratio: cents_ratio(813.0) / 2.0,
            amplitude_overrides: [1.0; NUM_MODES],
        };

        registry.entries.push(("wood".to_string(), wood));
        registry.entries.push(("glass".to_string(), glass));
        registry.entries.push(("metal".to_string(), metal));
        registry
    }

    /// Parse a registry from TOML:
    ///
    /// ```toml
    /// [materials.rosewood]
    /// youngs_modulus = 1.6e10
    /// density = 800.0
    /// loss_factor = 0.004
    /// tuning_ratio = 1.0
    /// mode_amplitude_overrides = { "1" = 0.5 }
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let file: RegistryFile = toml::from_str(text)?;
        let mut registry = Self::default();

        for (id, entry) in file.materials {
            let descriptor = entry.into_descriptor().map_err(|e| ConfigError::InvalidMaterial {
                material: id.clone(),
                source: Box::new(e),
            })?;
            registry.entries.push((id, descriptor));
        }
        Ok(registry)
    }

    pub fn get(&self, id: &str) -> Result<&MaterialDescriptor, ConfigError> {
        self.entries
            .iter()
            .find(|(name, _)| name == id)
            .map(|(_, m)| m)
            .ok_or_else(|| ConfigError::UnknownMaterial(id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MaterialDescriptor)> {
        self.entries.iter().map(|(id, m)| (id.as_str(), m))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl MaterialEntry {
    fn into_descriptor(self) -> Result<MaterialDescriptor, ConfigError> {
        let mut descriptor = MaterialDescriptor::new(
            self.youngs_modulus,
            self.density,
            self.loss_factor,
            self.tuning_ratio,
        )?;
        for (key, multiplier) in self.mode_amplitude_overrides {
            let mode: usize = key.trim().parse().map_err(|_| ConfigError::InvalidOverride {
                mode: key.clone(),
                limit: NUM_MODES,
            })?;
            descriptor = descriptor.with_amplitude_override(mode, multiplier)?;
        }
        Ok(descriptor)
    }
}
