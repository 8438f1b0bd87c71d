//! Quantized 3D density grids sampled from a [`NoiseField`].

use std::sync::mpsc;
use std::thread;

use glam::{UVec3, Vec3};

use crate::error::{Result, VolumeError};
use crate::noise_field::NoiseField;
use crate::texture::FilterMode;

/// Quantizes a noise value in `[-1, 1]` to a density byte.
///
/// Values outside the nominal range saturate at 0 or 255 instead of wrapping.
#[must_use]
pub fn quantize(noise_value: f64) -> u8 {
    (noise_value * 128.0 + 128.0).round().clamp(0.0, 255.0) as u8
}

/// A 3D grid of 8-bit densities.
///
/// Storage is row-major with x varying fastest, then y, then z, which is also
/// the layout expected by the volume texture upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DensityField {
    dims: UVec3,
    data: Vec<u8>,
}

impl DensityField {
    /// Samples the default [`NoiseField`] over a `dims` grid.
    ///
    /// Each cell `(x, y, z)` is sampled at `(x/nx, y/ny, z/nz) * frequency`.
    pub fn generate(dims: UVec3, frequency: f64) -> Result<Self> {
        Self::generate_with(&NoiseField::default(), dims, frequency)
    }

    /// Samples `noise` over a `dims` grid.
    pub fn generate_with(noise: &NoiseField, dims: UVec3, frequency: f64) -> Result<Self> {
        check_dims(dims)?;

        let mut data = Vec::with_capacity(cell_count(dims));
        let scale = dims.as_dvec3();
        for z in 0..dims.z {
            for y in 0..dims.y {
                for x in 0..dims.x {
                    let c = glam::DVec3::new(f64::from(x), f64::from(y), f64::from(z)) / scale;
                    data.push(quantize(noise.sample_vec(c * frequency)));
                }
            }
        }

        log::debug!(
            "generated {}x{}x{} density field at frequency {frequency}",
            dims.x,
            dims.y,
            dims.z
        );
        Ok(Self { dims, data })
    }

    /// Starts generation on a worker thread.
    ///
    /// The returned handle must be waited on before the field is uploaded.
    pub fn spawn_generate(dims: UVec3, frequency: f64) -> PendingDensityField {
        let (tx, rx) = mpsc::channel();
        let handle = thread::spawn(move || {
            // The receiver may already be gone if the caller dropped the handle.
            let _ = tx.send(Self::generate(dims, frequency));
        });
        PendingDensityField {
            receiver: rx,
            handle,
        }
    }

    /// Wraps existing bytes, checking that the length matches `dims`.
    pub fn from_raw(dims: UVec3, data: Vec<u8>) -> Result<Self> {
        check_dims(dims)?;
        let expected = cell_count(dims);
        if data.len() != expected {
            return Err(VolumeError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { dims, data })
    }

    /// Returns the grid dimensions.
    pub fn dimensions(&self) -> UVec3 {
        self.dims
    }

    /// Returns the number of cells.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the field holds no cells. Never true for a constructed field.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the raw density bytes in upload order.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the field, returning its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Returns the density of a cell, or `None` outside the grid.
    pub fn get(&self, x: u32, y: u32, z: u32) -> Option<u8> {
        if x >= self.dims.x || y >= self.dims.y || z >= self.dims.z {
            return None;
        }
        Some(self.data[self.flatten_index(x, y, z)])
    }

    /// Flattens a 3D cell index to a linear index.
    pub fn flatten_index(&self, x: u32, y: u32, z: u32) -> usize {
        x as usize + self.dims.x as usize * (y as usize + self.dims.y as usize * z as usize)
    }

    /// Reads the field at normalized coordinates, returning a value in `[0, 1]`.
    ///
    /// Mirrors a GPU texture lookup with clamp-to-edge addressing: nearest
    /// filtering picks the texel containing `uvw`, linear filtering blends the
    /// eight surrounding texel centres.
    pub fn sample(&self, uvw: Vec3, filter: FilterMode) -> f32 {
        match filter {
            FilterMode::Nearest => {
                let texel = (uvw * self.dims.as_vec3()).floor();
                let x = clamp_index(texel.x, self.dims.x);
                let y = clamp_index(texel.y, self.dims.y);
                let z = clamp_index(texel.z, self.dims.z);
                self.texel(x, y, z)
            }
            FilterMode::Linear => {
                let p = uvw * self.dims.as_vec3() - Vec3::splat(0.5);
                let base = p.floor();
                let f = p - base;

                let x0 = clamp_index(base.x, self.dims.x);
                let y0 = clamp_index(base.y, self.dims.y);
                let z0 = clamp_index(base.z, self.dims.z);
                let x1 = clamp_index(base.x + 1.0, self.dims.x);
                let y1 = clamp_index(base.y + 1.0, self.dims.y);
                let z1 = clamp_index(base.z + 1.0, self.dims.z);

                let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
                let c00 = lerp(self.texel(x0, y0, z0), self.texel(x1, y0, z0), f.x);
                let c10 = lerp(self.texel(x0, y1, z0), self.texel(x1, y1, z0), f.x);
                let c01 = lerp(self.texel(x0, y0, z1), self.texel(x1, y0, z1), f.x);
                let c11 = lerp(self.texel(x0, y1, z1), self.texel(x1, y1, z1), f.x);
                lerp(lerp(c00, c10, f.y), lerp(c01, c11, f.y), f.z)
            }
        }
    }

    fn texel(&self, x: u32, y: u32, z: u32) -> f32 {
        f32::from(self.data[self.flatten_index(x, y, z)]) / 255.0
    }
}

/// A density field being generated on a worker thread.
#[derive(Debug)]
pub struct PendingDensityField {
    receiver: mpsc::Receiver<Result<DensityField>>,
    handle: thread::JoinHandle<()>,
}

impl PendingDensityField {
    /// Returns true once the worker has finished.
    pub fn is_ready(&self) -> bool {
        self.handle.is_finished()
    }

    /// Blocks until the field is available.
    pub fn wait(self) -> Result<DensityField> {
        let result = self
            .receiver
            .recv()
            .map_err(|_| VolumeError::GenerationFailed)?;
        if self.handle.join().is_err() {
            log::warn!("density generation worker panicked after sending its result");
        }
        result
    }
}

fn check_dims(dims: UVec3) -> Result<()> {
    if dims.x == 0 || dims.y == 0 || dims.z == 0 {
        return Err(VolumeError::InvalidDimensions(dims.x, dims.y, dims.z));
    }
    Ok(())
}

fn cell_count(dims: UVec3) -> usize {
    dims.x as usize * dims.y as usize * dims.z as usize
}

fn clamp_index(v: f32, n: u32) -> u32 {
    (v.max(0.0) as u32).min(n - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_quantize_saturates() {
        assert_eq!(quantize(-1.0), 0);
        assert_eq!(quantize(0.0), 128);
        assert_eq!(quantize(1.0), 255);
        assert_eq!(quantize(5.0), 255);
        assert_eq!(quantize(-5.0), 0);
    }

    #[test]
    fn test_generate_length_matches_dims() {
        let field = DensityField::generate(UVec3::new(8, 4, 2), 6.5).unwrap();
        assert_eq!(field.len(), 8 * 4 * 2);
        assert_eq!(field.as_bytes().len(), 64);
        assert_eq!(field.dimensions(), UVec3::new(8, 4, 2));
    }

    #[test]
    fn test_generate_rejects_zero_dims() {
        let err = DensityField::generate(UVec3::new(8, 0, 8), 6.5).unwrap_err();
        assert!(matches!(err, VolumeError::InvalidDimensions(8, 0, 8)));
    }

    #[test]
    fn test_generate_is_deterministic() {
        let a = DensityField::generate(UVec3::splat(8), 6.5).unwrap();
        let b = DensityField::generate(UVec3::splat(8), 6.5).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_index_order_is_x_fastest() {
        let dims = UVec3::new(2, 3, 4);
        let data: Vec<u8> = (0..24).collect();
        let field = DensityField::from_raw(dims, data).unwrap();
        assert_eq!(field.get(1, 0, 0), Some(1));
        assert_eq!(field.get(0, 1, 0), Some(2));
        assert_eq!(field.get(0, 0, 1), Some(6));
        assert_eq!(field.get(1, 2, 3), Some(23));
        assert_eq!(field.get(2, 0, 0), None);
    }

    #[test]
    fn test_from_raw_checks_length() {
        let err = DensityField::from_raw(UVec3::splat(2), vec![0; 7]).unwrap_err();
        assert!(matches!(
            err,
            VolumeError::SizeMismatch {
                expected: 8,
                actual: 7
            }
        ));
    }

    #[test]
    fn test_sample_nearest_clamps_to_edge() {
        let dims = UVec3::new(2, 1, 1);
        let field = DensityField::from_raw(dims, vec![0, 255]).unwrap();
        assert!((field.sample(Vec3::new(0.25, 0.5, 0.5), FilterMode::Nearest)).abs() < 1e-6);
        assert!((field.sample(Vec3::new(0.75, 0.5, 0.5), FilterMode::Nearest) - 1.0).abs() < 1e-6);
        assert!((field.sample(Vec3::new(-3.0, 0.5, 0.5), FilterMode::Nearest)).abs() < 1e-6);
        assert!((field.sample(Vec3::new(7.0, 9.0, -2.0), FilterMode::Nearest) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_sample_linear_blends_between_centres() {
        let dims = UVec3::new(2, 1, 1);
        let field = DensityField::from_raw(dims, vec![0, 255]).unwrap();
        let mid = field.sample(Vec3::new(0.5, 0.5, 0.5), FilterMode::Linear);
        assert!((mid - 0.5).abs() < 1e-6, "{mid}");
        let at_first_centre = field.sample(Vec3::new(0.25, 0.5, 0.5), FilterMode::Linear);
        assert!(at_first_centre.abs() < 1e-6);
    }

    #[test]
    fn test_spawn_generate_matches_synchronous() {
        let pending = DensityField::spawn_generate(UVec3::splat(8), 6.5);
        let background = pending.wait().unwrap();
        let direct = DensityField::generate(UVec3::splat(8), 6.5).unwrap();
        assert_eq!(background, direct);
    }

    #[test]
    fn test_spawn_generate_propagates_errors() {
        let pending = DensityField::spawn_generate(UVec3::new(0, 1, 1), 6.5);
        assert!(matches!(
            pending.wait(),
            Err(VolumeError::InvalidDimensions(0, 1, 1))
        ));
    }

    proptest! {
        #[test]
        fn prop_generated_values_stay_in_byte_range(
            nx in 1u32..10, ny in 1u32..10, nz in 1u32..10, frequency in 0.1f64..20.0
        ) {
            let field = DensityField::generate(UVec3::new(nx, ny, nz), frequency).unwrap();
            prop_assert_eq!(field.len(), (nx * ny * nz) as usize);
        }

        #[test]
        fn prop_quantize_is_monotonic(a in -2.0f64..2.0, b in -2.0f64..2.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(quantize(lo) <= quantize(hi));
        }
    }
}
