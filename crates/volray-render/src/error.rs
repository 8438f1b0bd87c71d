//! Rendering error types.

use std::fmt;

use thiserror::Error;
use volray_core::{PixelDatatype, PixelFormat, VolumeError};

/// Texture axis named in dimension errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Texels along x.
    Width,
    /// Texels along y.
    Height,
    /// Texels along z.
    Depth,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Axis::Width => "width",
            Axis::Height => "height",
            Axis::Depth => "depth",
        })
    }
}

/// Errors that can occur during rendering operations.
#[derive(Error, Debug)]
pub enum RenderError {
    /// A texture dimension is zero or above the device limit.
    #[error("invalid texture {axis} {value}: must be in 1..={max}")]
    InvalidDimension { axis: Axis, value: u32, max: u32 },

    /// The device cannot sample this format/datatype pair.
    #[error("unsupported texture format {format:?} with datatype {datatype:?}")]
    UnsupportedFormat {
        format: PixelFormat,
        datatype: PixelDatatype,
    },

    /// No rendering context was supplied.
    #[error("no rendering context supplied")]
    MissingContext,

    /// An operation was attempted on a released resource.
    #[error("{0} called after destroy")]
    UseAfterDestroy(&'static str),

    /// Source data does not match the texture size.
    #[error("texture data length mismatch: expected {expected} bytes, got {actual}")]
    InvalidDataLength { expected: usize, actual: usize },

    /// Failed to create wgpu adapter.
    #[error("failed to create graphics adapter")]
    AdapterCreationFailed,

    /// Failed to create wgpu device.
    #[error("failed to create graphics device: {0}")]
    DeviceCreationFailed(#[from] wgpu::RequestDeviceError),

    /// Shader compilation failed.
    #[error("shader compilation failed: {0}")]
    ShaderCompilationFailed(String),

    /// Texture creation failed.
    #[error("texture creation failed: {0}")]
    TextureCreationFailed(String),

    /// Buffer creation failed.
    #[error("buffer creation failed: {0}")]
    BufferCreationFailed(String),

    /// Reading a frame back from the GPU failed.
    #[error("GPU buffer mapping failed")]
    BufferMapFailed,

    /// Invalid volume data or options.
    #[error(transparent)]
    Volume(#[from] VolumeError),
}

/// A specialized Result type for rendering operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;
