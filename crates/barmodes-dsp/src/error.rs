//! Error types.
//!
//! Only fatal configuration problems and protocol misuse are errors. Numeric
//! degeneracies (empty search window, collapsed filter band, zero
//! normalization divisor, non-convergent fit) resolve to documented fallbacks
//! and never surface here.

use crate::modes::TableKey;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be positive and finite, got {value}")]
    NonPositiveConstant { field: &'static str, value: f64 },

    #[error("bar length must be positive, got {length}")]
    NonPositiveLength { length: f64 },

    #[error("mode {mode}: frequency must be positive, got {frequency}")]
    NonPositiveFrequency { mode: usize, frequency: f64 },

    #[error("strike {field} must be finite and non-negative, got {value}")]
    InvalidStrike { field: &'static str, value: f64 },

    #[error("amplitude override for mode '{mode}' must name a mode below {limit} with a finite, non-negative multiplier")]
    InvalidOverride { mode: String, limit: usize },

    #[error("material '{material}': {source}")]
    InvalidMaterial {
        material: String,
        #[source]
        source: Box<ConfigError>,
    },

    #[error("unknown material '{0}'")]
    UnknownMaterial(String),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("table entry ({material}, {key}) already written")]
    DuplicateKey { material: String, key: TableKey },
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SessionError {
    #[error("session already finished; no further events accepted")]
    Finished,
}
