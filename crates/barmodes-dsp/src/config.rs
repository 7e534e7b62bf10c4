//! Tunables for empirical extraction, loadable from TOML.

use serde::Deserialize;

use crate::error::ConfigError;

/// Peak snapping and band isolation settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractorConfig {
    /// Half-width of the peak search window (Hz).
    pub search_window_hz: f64,
    /// Narrowest isolation band (Hz).
    pub min_band_hz: f64,
    /// Band width as a fraction of the mode frequency.
    pub band_fraction: f64,
    /// Lowest allowed lower band edge (Hz).
    pub min_low_edge_hz: f64,
    /// Upper band edge ceiling as a fraction of Nyquist.
    pub nyquist_guard: f64,
    pub fit: FitConfig,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            search_window_hz: 200.0,
            min_band_hz: 50.0,
            band_fraction: 0.05,
            min_low_edge_hz: 1.0,
            nyquist_guard: 0.999,
            fit: FitConfig::default(),
        }
    }
}

/// Exponential decay fit settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FitConfig {
    /// Starting decay time (s).
    pub initial_tau: f64,
    /// Model evaluations before giving up.
    pub max_evaluations: usize,
    /// Relative cost reduction treated as converged.
    pub ftol: f64,
    /// Relative parameter step treated as converged.
    pub xtol: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            initial_tau: 0.1,
            max_evaluations: 2000,
            ftol: 1.49e-8,
            xtol: 1.49e-8,
        }
    }
}

impl ExtractorConfig {
    /// Parse from TOML. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("search_window_hz", self.search_window_hz),
            ("min_band_hz", self.min_band_hz),
            ("min_low_edge_hz", self.min_low_edge_hz),
            ("nyquist_guard", self.nyquist_guard),
            ("fit.initial_tau", self.fit.initial_tau),
            ("fit.ftol", self.fit.ftol),
            ("fit.xtol", self.fit.xtol),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NonPositiveConstant { field, value });
            }
        }
        if !(self.band_fraction.is_finite() && self.band_fraction >= 0.0) {
            return Err(ConfigError::NonPositiveConstant {
                field: "band_fraction",
                value: self.band_fraction,
            });
        }
        if self.nyquist_guard > 1.0 {
            return Err(ConfigError::NonPositiveConstant {
                field: "nyquist_guard",
                value: self.nyquist_guard,
            });
        }
        if self.fit.max_evaluations == 0 {
            return Err(ConfigError::NonPositiveConstant {
                field: "fit.max_evaluations",
                value: 0.0,
            });
        }
        Ok(())
    }

    /// Default isolation band width for a mode at `f0`.
    pub fn band_width(&self, f0: f64) -> f64 {
        self.min_band_hz.max(self.band_fraction * f0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = ExtractorConfig::default();
        assert_eq!(c.search_window_hz, 200.0);
        assert_eq!(c.band_width(440.0), 50.0);
        assert!((c.band_width(4000.0) - 200.0).abs() < 1e-9);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let c = ExtractorConfig::from_toml_str(
            r#"
            search_window_hz = 120.0

            [fit]
            max_evaluations = 500
        "#,
        )
        .unwrap();
        assert_eq!(c.search_window_hz, 120.0);
        assert_eq!(c.min_band_hz, 50.0);
        assert_eq!(c.fit.max_evaluations, 500);
        assert_eq!(c.fit.initial_tau, 0.1);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(ExtractorConfig::from_toml_str("search_window_hz = -1.0").is_err());
        assert!(ExtractorConfig::from_toml_str("nyquist_guard = 1.5").is_err());
        assert!(ExtractorConfig::from_toml_str("unknown_key = 1").is_err());
    }
}
