//! Excitation noise burst table.
//!
//! Independent uniform samples in [-1, 1], no shaping or normalization.
//! Seeded so a regenerated table is identical to the shipped one.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

pub const NOISE_BURST_LEN: usize = 512;
pub const DEFAULT_SEED: u64 = 0x5EED_B0A7;

pub struct NoiseBurst;

impl NoiseBurst {
    /// `count` samples drawn from a PCG stream seeded with `seed`.
    pub fn generate(count: usize, seed: u64) -> Vec<f64> {
        let mut rng = Pcg32::seed_from_u64(seed);
        (0..count).map(|_| rng.gen_range(-1.0..=1.0)).collect()
    }

    /// The standard 512-sample burst.
    pub fn standard() -> Vec<f64> {
        Self::generate(NOISE_BURST_LEN, DEFAULT_SEED)
    }
}
