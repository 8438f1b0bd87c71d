//! Configuration options for a volume primitive.

use std::path::Path;

use glam::{UVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VolumeError};
use crate::raymarch::{
    RayMarchParams, FACE_EPSILON, GRADIENT_OFFSET, ISO_THRESHOLD, MAX_MARCH_STEPS, STEP_DIVISOR,
};
use crate::texture::{PixelDatatype, PixelFormat, SamplerState, VolumeTextureDescriptor};

/// Everything needed to generate and render one volume.
///
/// Missing fields take their defaults when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeOptions {
    /// Full edge lengths of the host box in model units.
    pub box_dimensions: Vec3,

    /// Density grid size.
    pub resolution: UVec3,

    /// Noise frequency applied to normalized grid coordinates.
    pub frequency: f64,

    /// Iso-surface threshold on the normalized density.
    pub iso_threshold: f32,

    /// Step divisor of the march.
    pub step_divisor: f32,

    /// Face snapping distance in texture space.
    pub face_epsilon: f32,

    /// Central-difference offset in local units.
    pub gradient_offset: f32,

    /// Texture filtering.
    pub sampler: SamplerState,

    /// Texture channel layout.
    pub pixel_format: PixelFormat,

    /// Texture channel type.
    pub pixel_datatype: PixelDatatype,

    /// Iteration cap per ray.
    pub max_march_steps: u32,
}

impl Default for VolumeOptions {
    fn default() -> Self {
        Self {
            box_dimensions: Vec3::new(3.0, 2.0, 1.0),
            resolution: UVec3::splat(8),
            frequency: 6.5,
            iso_threshold: ISO_THRESHOLD,
            step_divisor: STEP_DIVISOR,
            face_epsilon: FACE_EPSILON,
            gradient_offset: GRADIENT_OFFSET,
            sampler: SamplerState::NEAREST,
            pixel_format: PixelFormat::Alpha,
            pixel_datatype: PixelDatatype::UnsignedByte,
            max_march_steps: MAX_MARCH_STEPS,
        }
    }
}

impl VolumeOptions {
    /// Checks every field for a usable value.
    pub fn validate(&self) -> Result<()> {
        if !self.box_dimensions.is_finite() || self.box_dimensions.min_element() <= 0.0 {
            return Err(VolumeError::InvalidOptions(format!(
                "box_dimensions must be positive and finite, got {}",
                self.box_dimensions
            )));
        }
        if self.resolution.min_element() == 0 {
            return Err(VolumeError::InvalidDimensions(
                self.resolution.x,
                self.resolution.y,
                self.resolution.z,
            ));
        }
        if !self.frequency.is_finite() || self.frequency <= 0.0 {
            return Err(VolumeError::InvalidOptions(format!(
                "frequency must be positive and finite, got {}",
                self.frequency
            )));
        }
        let bytes_per_texel = self.texture_descriptor().bytes_per_texel();
        if bytes_per_texel != 1 {
            return Err(VolumeError::InvalidOptions(format!(
                "generated densities hold one byte per texel, {:?}/{:?} needs {bytes_per_texel}",
                self.pixel_format, self.pixel_datatype
            )));
        }
        self.params().validate()
    }

    /// Parses options from JSON and validates them.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Reads options from a JSON file and validates them.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let options = Self::from_json_str(&json)?;
        log::debug!("loaded volume options from {}", path.display());
        Ok(options)
    }

    /// Serializes the options as pretty JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// March parameters derived from these options.
    pub fn params(&self) -> RayMarchParams {
        RayMarchParams {
            iso_threshold: self.iso_threshold,
            step_divisor: self.step_divisor,
            face_epsilon: self.face_epsilon,
            gradient_offset: self.gradient_offset,
            max_steps: self.max_march_steps,
        }
    }

    /// Texture descriptor matching the grid size and format.
    pub fn texture_descriptor(&self) -> VolumeTextureDescriptor {
        VolumeTextureDescriptor {
            width: self.resolution.x,
            height: self.resolution.y,
            depth: self.resolution.z,
            pixel_format: self.pixel_format,
            pixel_datatype: self.pixel_datatype,
            sampler: self.sampler,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::FilterMode;

    #[test]
    fn test_defaults_are_valid() {
        let options = VolumeOptions::default();
        options.validate().unwrap();
        assert_eq!(options.params(), RayMarchParams::default());
        assert_eq!(options.texture_descriptor().size_in_bytes(), 512);
    }

    #[test]
    fn test_default_json_round_trip() {
        let options = VolumeOptions::default();
        let json = options.to_json_string().unwrap();
        assert_eq!(VolumeOptions::from_json_str(&json).unwrap(), options);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let options =
            VolumeOptions::from_json_str(r#"{ "frequency": 3.0, "resolution": [16, 8, 4] }"#)
                .unwrap();
        assert_eq!(options.frequency, 3.0);
        assert_eq!(options.resolution, UVec3::new(16, 8, 4));
        assert_eq!(options.iso_threshold, ISO_THRESHOLD);
        assert_eq!(options.sampler.min_filter, FilterMode::Nearest);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let bad = [
            VolumeOptions {
                iso_threshold: 1.0,
                ..Default::default()
            },
            VolumeOptions {
                step_divisor: 0.0,
                ..Default::default()
            },
            VolumeOptions {
                box_dimensions: Vec3::new(1.0, -1.0, 1.0),
                ..Default::default()
            },
            VolumeOptions {
                frequency: f64::NAN,
                ..Default::default()
            },
            VolumeOptions {
                max_march_steps: 0,
                ..Default::default()
            },
        ];
        for options in bad {
            assert!(matches!(
                options.validate(),
                Err(VolumeError::InvalidOptions(_))
            ));
        }

        let zero_grid = VolumeOptions {
            resolution: UVec3::new(8, 0, 8),
            ..Default::default()
        };
        assert!(matches!(
            zero_grid.validate(),
            Err(VolumeError::InvalidDimensions(8, 0, 8))
        ));
    }

    #[test]
    fn test_only_single_byte_formats_are_accepted() {
        let formats = [
            PixelFormat::Alpha,
            PixelFormat::Red,
            PixelFormat::Rg,
            PixelFormat::Rgba,
        ];
        let datatypes = [
            PixelDatatype::UnsignedByte,
            PixelDatatype::HalfFloat,
            PixelDatatype::Float,
        ];
        for pixel_format in formats {
            for pixel_datatype in datatypes {
                let options = VolumeOptions {
                    pixel_format,
                    pixel_datatype,
                    ..Default::default()
                };
                let single_byte = options.texture_descriptor().bytes_per_texel() == 1;
                match options.validate() {
                    Ok(()) => assert!(single_byte, "{pixel_format:?}/{pixel_datatype:?}"),
                    Err(VolumeError::InvalidOptions(_)) => assert!(!single_byte),
                    Err(e) => panic!("unexpected error {e}"),
                }
            }
        }

        assert!(matches!(
            VolumeOptions::from_json_str(r#"{ "pixel_format": "Rgba" }"#),
            Err(VolumeError::InvalidOptions(_))
        ));
    }

    #[test]
    fn test_invalid_json_is_reported() {
        assert!(matches!(
            VolumeOptions::from_json_str("{ not json"),
            Err(VolumeError::Json(_))
        ));
        assert!(matches!(
            VolumeOptions::from_json_str(r#"{ "iso_threshold": 2.0 }"#),
            Err(VolumeError::InvalidOptions(_))
        ));
    }

    #[test]
    fn test_from_json_file() {
        let path = std::env::temp_dir().join("volray_options_test.json");
        std::fs::write(&path, r#"{ "box_dimensions": [2.0, 2.0, 2.0] }"#).unwrap();
        let options = VolumeOptions::from_json_file(&path).unwrap();
        assert_eq!(options.box_dimensions, Vec3::splat(2.0));
        std::fs::remove_file(&path).ok();

        assert!(matches!(
            VolumeOptions::from_json_file(path.with_extension("missing")),
            Err(VolumeError::Io(_))
        ));
    }
}
