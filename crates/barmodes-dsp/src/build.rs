//! Batch table construction over materials and notes.
//!
//! A broken (material, note) pair is rejected on its own; the rest of the
//! table is still built.

use std::ops::RangeInclusive;

use crate::beam::{self, DEFAULT_STRIKE_FRACTION, DEFAULT_STRIKE_STRENGTH};
use crate::error::ConfigError;
use crate::material::MaterialRegistry;
use crate::modes::{ModeTable, TableKey};
use crate::overtone::{self, MaterialClass};
use crate::tables::{MIDI_HI, MIDI_LO, length_for_note, midi_to_freq};

/// Strike applied to every bar of an analytic table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrikeSpec {
    /// Fraction of bar length.
    pub position: f64,
    pub strength: f64,
}

impl Default for StrikeSpec {
    fn default() -> Self {
        Self {
            position: DEFAULT_STRIKE_FRACTION,
            strength: DEFAULT_STRIKE_STRENGTH,
        }
    }
}

/// A (material, note) pair that could not be generated.
#[derive(Debug)]
pub struct Rejection {
    pub material: String,
    pub note: u8,
    pub error: ConfigError,
}

#[derive(Debug, Default)]
pub struct TableBuild {
    pub table: ModeTable,
    pub rejected: Vec<Rejection>,
}

/// The 88-key range.
pub fn full_range() -> RangeInclusive<u8> {
    MIDI_LO..=MIDI_HI
}

/// Beam-model modes for every material in `registry` and every note.
pub fn build_analytic_table(
    registry: &MaterialRegistry,
    notes: RangeInclusive<u8>,
    strike: StrikeSpec,
) -> TableBuild {
    let mut build = TableBuild::default();

    for (id, material) in registry.iter() {
        for note in notes.clone() {
            let result = length_for_note(note as i32, material).and_then(|length| {
                beam::generate_modes(length, material, strike.position * length, strike.strength)
            });

            match result {
                Ok(set) => {
                    // Keys are unique per (material, note) by construction.
                    if let Err(e) = build.table.insert(id, TableKey::Note(note), set) {
                        tracing::error!("{e}");
                    }
                }
                Err(error) => {
                    tracing::warn!(material = id, note, "rejected: {error}");
                    build.rejected.push(Rejection {
                        material: id.to_string(),
                        note,
                        error,
                    });
                }
            }
        }
    }

    tracing::info!(
        entries = build.table.len(),
        rejected = build.rejected.len(),
        "analytic table built"
    );
    build
}

/// Static overtone modes for each class, fundamental at the note's pitch.
pub fn build_static_table(classes: &[MaterialClass], notes: RangeInclusive<u8>) -> TableBuild {
    let mut build = TableBuild::default();

    for &class in classes {
        for note in notes.clone() {
            match overtone::generate_modes(class, midi_to_freq(note as i32)) {
                Ok(set) => {
                    if let Err(e) = build.table.insert(class.name(), TableKey::Note(note), set) {
                        tracing::error!("{e}");
                    }
                }
                Err(error) => build.rejected.push(Rejection {
                    material: class.name().to_string(),
                    note,
                    error,
                }),
            }
        }
    }
    build
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::MaterialDescriptor;
    use crate::tables::{NUM_MODES, NUM_NOTES};

    #[test]
    fn test_full_analytic_table() {
        let registry = MaterialRegistry::builtin();
        let build = build_analytic_table(&registry, full_range(), StrikeSpec::default());
        assert!(build.rejected.is_empty());
        assert_eq!(build.table.len(), 3 * NUM_NOTES);
        assert_eq!(build.table.materials(), ["wood", "glass", "metal"]);

        let set = build.table.get("glass", &TableKey::Note(69)).unwrap();
        assert_eq!(set.len(), NUM_MODES);
        assert!((set.max_amplitude() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_higher_note_higher_fundamental() {
        let registry = MaterialRegistry::builtin();
        let build = build_analytic_table(&registry, 60..=72, StrikeSpec::default());
        let c4 = build.table.get("metal", &TableKey::Note(60)).unwrap();
        let c5 = build.table.get("metal", &TableKey::Note(72)).unwrap();
        // Length scales by 1/sqrt(2) per octave and f ~ 1/L^2.
        let ratio = c5.modes()[0].frequency / c4.modes()[0].frequency;
        assert!((ratio - 2.0).abs() < 1e-9, "octave ratio {ratio}");
    }

    #[test]
    fn test_invalid_strike_rejects_pairs() {
        let text = r#"
            [materials.oak]
            youngs_modulus = 1.1e10
            density = 750.0
            loss_factor = 0.006
        "#;
        let registry = MaterialRegistry::from_toml_str(text).unwrap();
        let strike = StrikeSpec {
            position: 0.25,
            strength: -1.0,
        };
        let build = build_analytic_table(&registry, 60..=61, strike);
        assert!(build.table.is_empty());
        assert_eq!(build.rejected.len(), 2);
        assert_eq!(build.rejected[0].material, "oak");
        assert!(matches!(build.rejected[1].error, ConfigError::InvalidStrike { .. }));
    }

    #[test]
    fn test_static_table() {
        let build = build_static_table(&MaterialClass::ALL, full_range());
        assert!(build.rejected.is_empty());
        assert_eq!(build.table.len(), 3 * NUM_NOTES);
        let a4 = build.table.get("wood", &TableKey::Note(69)).unwrap();
        assert!((a4.modes()[0].frequency - 440.0).abs() < 1e-9);
        assert!((a4.modes()[1].frequency - 440.0 * 2.76).abs() < 1e-9);
    }

    #[test]
    fn test_descriptor_passed_not_stored() {
        // Building twice from the same registry gives identical tables.
        let registry = MaterialRegistry::builtin();
        let before: Vec<MaterialDescriptor> = registry.iter().map(|(_, m)| m.clone()).collect();
        let a = build_analytic_table(&registry, 69..=69, StrikeSpec::default());
        let b = build_analytic_table(&registry, 69..=69, StrikeSpec::default());
        let after: Vec<MaterialDescriptor> = registry.iter().map(|(_, m)| m.clone()).collect();
        assert_eq!(before, after);
        for id in ["wood", "glass", "metal"] {
            assert_eq!(a.table.get(id, &TableKey::Note(69)), b.table.get(id, &TableKey::Note(69)));
        }
    }
}
