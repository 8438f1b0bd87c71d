//! Deterministic gradient noise over continuous 3D coordinates.

use noise::{NoiseFn, Perlin};

/// Seed of the permutation table used by [`NoiseField::default`].
pub const DEFAULT_SEED: u32 = 0x5EED_0001;

/// A smooth scalar field in `[-1, 1]`.
///
/// The field is backed by Perlin gradient noise with a fixed permutation table,
/// so identical coordinates always produce bit-identical output and no external
/// random state is involved. The type is `Copy + Send + Sync`; sampling is pure
/// and may happen from any thread.
#[derive(Debug, Clone, Copy)]
pub struct NoiseField {
    perlin: Perlin,
    seed: u32,
}

impl NoiseField {
    /// Creates a field whose permutation table is derived from `seed`.
    pub fn with_seed(seed: u32) -> Self {
        Self {
            perlin: Perlin::new(seed),
            seed,
        }
    }

    /// Returns the seed of the permutation table.
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Samples the field. The result is always within `[-1, 1]`.
    pub fn sample(&self, x: f64, y: f64, z: f64) -> f64 {
        self.perlin.get([x, y, z]).clamp(-1.0, 1.0)
    }

    /// Samples the field at a glam vector.
    pub fn sample_vec(&self, p: glam::DVec3) -> f64 {
        self.sample(p.x, p.y, p.z)
    }
}

impl Default for NoiseField {
    fn default() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }
}
