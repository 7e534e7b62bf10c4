//! Bar resonator modal parameters: a beam-theory model, static overtone
//! tables, and empirical extraction from recorded strikes.
//!
//! Pure computation with no audio I/O; loading, event sourcing and table
//! emission live in the tools.

pub mod config;
pub mod error;
pub mod material;
pub mod modes;
pub mod tables;

// Generators
pub mod beam;
pub mod build;
pub mod noise;
pub mod overtone;

// Empirical extraction
pub mod decay_fit;
pub mod envelope;
pub mod extractor;
pub mod filters;
pub mod spectrum;
