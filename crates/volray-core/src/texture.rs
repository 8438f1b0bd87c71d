//! Device-independent description of a volume texture.

use glam::UVec3;
use serde::{Deserialize, Serialize};

/// Channel layout of texel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PixelFormat {
    /// Single channel read back through `.r` (alpha-only uploads).
    #[default]
    Alpha,
    /// Single red channel.
    Red,
    /// Two channels.
    Rg,
    /// Four channels.
    Rgba,
}

impl PixelFormat {
    /// Number of channels per texel.
    pub fn channel_count(self) -> u32 {
        match self {
            PixelFormat::Alpha | PixelFormat::Red => 1,
            PixelFormat::Rg => 2,
            PixelFormat::Rgba => 4,
        }
    }
}

/// Storage type of each channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PixelDatatype {
    /// 8-bit unsigned normalized.
    #[default]
    UnsignedByte,
    /// 16-bit float.
    HalfFloat,
    /// 32-bit float.
    Float,
}

impl PixelDatatype {
    /// Size of one channel in bytes.
    pub fn size_in_bytes(self) -> u32 {
        match self {
            PixelDatatype::UnsignedByte => 1,
            PixelDatatype::HalfFloat => 2,
            PixelDatatype::Float => 4,
        }
    }
}

/// Texture filtering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FilterMode {
    /// Nearest texel.
    #[default]
    Nearest,
    /// Trilinear interpolation between texel centres.
    Linear,
}

/// Minification and magnification filters of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct SamplerState {
    /// Filter used when a texel covers less than a pixel.
    pub min_filter: FilterMode,
    /// Filter used when a texel covers more than a pixel.
    pub mag_filter: FilterMode,
}

impl SamplerState {
    /// Nearest filtering in both directions.
    pub const NEAREST: Self = Self {
        min_filter: FilterMode::Nearest,
        mag_filter: FilterMode::Nearest,
    };

    /// Linear filtering in both directions.
    pub const LINEAR: Self = Self {
        min_filter: FilterMode::Linear,
        mag_filter: FilterMode::Linear,
    };
}

/// Size, format and sampling of a volume texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeTextureDescriptor {
    /// Texels along x.
    pub width: u32,
    /// Texels along y.
    pub height: u32,
    /// Texels along z.
    pub depth: u32,
    /// Channel layout.
    pub pixel_format: PixelFormat,
    /// Channel storage type.
    pub pixel_datatype: PixelDatatype,
    /// Filtering.
    pub sampler: SamplerState,
}

impl VolumeTextureDescriptor {
    /// Single-channel byte texture of the given size, nearest filtering.
    pub fn r8(dims: UVec3) -> Self {
        Self {
            width: dims.x,
            height: dims.y,
            depth: dims.z,
            pixel_format: PixelFormat::Alpha,
            pixel_datatype: PixelDatatype::UnsignedByte,
            sampler: SamplerState::NEAREST,
        }
    }

    /// Returns `(width, height, depth)` as a vector.
    pub fn dimensions(&self) -> UVec3 {
        UVec3::new(self.width, self.height, self.depth)
    }

    /// Bytes per texel for the format/datatype pair.
    pub fn bytes_per_texel(&self) -> u32 {
        self.pixel_format.channel_count() * self.pixel_datatype.size_in_bytes()
    }

    /// Bytes in one row of texels.
    pub fn bytes_per_row(&self) -> u32 {
        self.width * self.bytes_per_texel()
    }

    /// Total size of a full upload in bytes.
    pub fn size_in_bytes(&self) -> usize {
        self.width as usize * self.height as usize * self.depth as usize
            * self.bytes_per_texel() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_r8_descriptor_size() {
        let desc = VolumeTextureDescriptor::r8(UVec3::new(8, 4, 2));
        assert_eq!(desc.bytes_per_texel(), 1);
        assert_eq!(desc.bytes_per_row(), 8);
        assert_eq!(desc.size_in_bytes(), 64);
        assert_eq!(desc.dimensions(), UVec3::new(8, 4, 2));
    }

    #[test]
    fn test_bytes_per_texel() {
        let mut desc = VolumeTextureDescriptor::r8(UVec3::ONE);
        desc.pixel_format = PixelFormat::Rgba;
        desc.pixel_datatype = PixelDatatype::HalfFloat;
        assert_eq!(desc.bytes_per_texel(), 8);
    }

    #[test]
    fn test_sampler_default_is_nearest() {
        assert_eq!(SamplerState::default(), SamplerState::NEAREST);
    }
}
