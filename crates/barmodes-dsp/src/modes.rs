//! Shared output data model: modes, mode sets and the keyed mode table.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::TableError;

/// Decay time of one mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decay {
    /// Exponential decay time in seconds.
    Seconds(f64),
    /// The decay fit did not converge; the decay is undetermined.
    NonConvergent,
}

impl Decay {
    /// Seconds, with `NonConvergent` read as an unbounded decay.
    pub fn as_seconds(&self) -> f64 {
        match *self {
            Decay::Seconds(t) => t,
            Decay::NonConvergent => f64::INFINITY,
        }
    }

    pub fn is_converged(&self) -> bool {
        matches!(self, Decay::Seconds(_))
    }
}

impl Serialize for Decay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            Decay::Seconds(t) => serializer.serialize_f64(t),
            Decay::NonConvergent => serializer.serialize_str("non-convergent"),
        }
    }
}

/// One resonant component.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Mode {
    pub frequency: f64,
    pub amplitude: f64,
    pub decay_time: Decay,
}

/// Ordered modes produced by one generator call.
///
/// Sets are normalized once when they are built and are read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ModeSet {
    modes: Vec<Mode>,
}

impl ModeSet {
    /// Build a set and scale amplitudes so the largest is 1.0.
    ///
    /// An all-zero set is left as-is.
    pub fn normalized(mut modes: Vec<Mode>) -> Self {
        normalize_amplitudes(&mut modes);
        Self { modes }
    }

    /// Build a set whose amplitudes were normalized when the data was authored.
    pub fn prenormalized(modes: Vec<Mode>) -> Self {
        Self { modes }
    }

    pub fn modes(&self) -> &[Mode] {
        &self.modes
    }

    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    pub fn max_amplitude(&self) -> f64 {
        self.modes.iter().map(|m| m.amplitude).fold(0.0f64, f64::max)
    }

    /// Frequencies and decays relative to the first mode.
    ///
    /// This is the shape the synthesizer consumes for recorded instruments:
    /// the fundamental and its decay are supplied at play time and every mode
    /// scales from them. Returns `None` for an empty set.
    pub fn relative_factors(&self) -> Option<RelativeFactors> {
        let base = self.modes.first()?;
        let base_decay = base.decay_time;

        let frequency = self.modes.iter().map(|m| m.frequency / base.frequency).collect();
        let amplitude = self.modes.iter().map(|m| m.amplitude).collect();
        let decay = self
            .modes
            .iter()
            .map(|m| match (m.decay_time, base_decay) {
                (Decay::Seconds(t), Decay::Seconds(b)) if b > 0.0 => Some(t / b),
                _ => None,
            })
            .collect();

        Some(RelativeFactors {
            base_frequency: base.frequency,
            base_decay,
            frequency,
            amplitude,
            decay,
        })
    }
}

/// Per-mode factors relative to the first mode of a set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelativeFactors {
    pub base_frequency: f64,
    pub base_decay: Decay,
    pub frequency: Vec<f64>,
    pub amplitude: Vec<f64>,
    /// `None` where either this mode's or the base decay is non-convergent.
    pub decay: Vec<Option<f64>>,
}

/// Divide every amplitude by the maximum, skipping an all-zero set.
pub fn normalize_amplitudes(modes: &mut [Mode]) {
    let max_amp = modes.iter().map(|m| m.amplitude).fold(0.0f64, f64::max);
    if max_amp > 0.0 {
        for m in modes.iter_mut() {
            m.amplitude /= max_amp;
        }
    } else {
        tracing::debug!("all amplitudes zero, normalization skipped");
    }
}

/// Second half of a mode table key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKey {
    Note(u8),
    Recording(String),
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableKey::Note(n) => write!(f, "note {n}"),
            TableKey::Recording(name) => write!(f, "recording '{name}'"),
        }
    }
}

/// Write-once mapping (material, note or recording) -> mode set.
#[derive(Debug, Clone, Default)]
pub struct ModeTable {
    entries: BTreeMap<(String, TableKey), ModeSet>,
    material_order: Vec<String>,
}

/// Borrowed view of one table entry, used for serialization.
#[derive(Debug, Serialize)]
pub struct TableEntry<'a> {
    pub material: &'a str,
    pub key: &'a TableKey,
    pub modes: &'a ModeSet,
}

impl ModeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, material: &str, key: TableKey, modes: ModeSet) -> Result<(), TableError> {
        let slot = (material.to_string(), key);
        if self.entries.contains_key(&slot) {
            let (material, key) = slot;
            return Err(TableError::DuplicateKey { material, key });
        }
        if !self.material_order.iter().any(|m| m == material) {
            self.material_order.push(material.to_string());
        }
        self.entries.insert(slot, modes);
        Ok(())
    }

    pub fn get(&self, material: &str, key: &TableKey) -> Option<&ModeSet> {
        self.entries.get(&(material.to_string(), key.clone()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Materials in first-insertion order.
    pub fn materials(&self) -> &[String] {
        &self.material_order
    }

    /// Entries for one material, ordered by key.
    pub fn material_entries<'a>(&'a self, material: &'a str) -> impl Iterator<Item = TableEntry<'a>> + 'a {
        self.entries
            .iter()
            .filter(move |((m, _), _)| m == material)
            .map(|((m, key), modes)| TableEntry {
                material: m.as_str(),
                key,
                modes,
            })
    }

    /// All entries, grouped by material in insertion order.
    pub fn entries(&self) -> Vec<TableEntry<'_>> {
        self.material_order
            .iter()
            .flat_map(|m| self.material_entries(m))
            .collect()
    }
}
