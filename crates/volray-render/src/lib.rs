//! Rendering backend for volray.
//!
//! This crate turns a [`DensityField`](volray_core::DensityField) into
//! something drawable:
//! - [`VolumeTexture`] wraps a 3D texture and its sampler
//! - [`VolumePrimitive`] owns the texture, box mesh and ray-march program and
//!   pushes one [`DrawCommand`] per frame
//! - [`WgpuContext`] and [`RenderEngine`] run it on wgpu, headless
//!
//! Resources are created through the [`RenderDevice`] trait, so the
//! lifecycle logic also runs against [`RecordingDevice`] without a GPU.

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
// Texture sizes and index counts fit comfortably in u32
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::module_name_repetitions)]

pub mod buffer;
pub mod camera;
pub mod context;
pub mod device;
pub mod engine;
pub mod error;
pub mod frame;
pub mod primitive;
pub mod recording;
pub mod screenshot;
pub mod shader;
pub mod volume_texture;

pub use camera::Camera;
pub use context::{GpuBindings, GpuMesh, GpuTexture, WgpuContext, COLOR_FORMAT, DEPTH_FORMAT};
pub use device::{DeviceLimits, RenderDevice};
pub use engine::RenderEngine;
pub use error::{Axis, RenderError, RenderResult};
pub use frame::{DrawCommand, FrameState, Pass, RenderState, UniformMap};
pub use primitive::{PrimitiveState, VolumePrimitive, VolumePrimitiveOptions};
pub use recording::{FailPoint, RecordedHandle, RecordingDevice, ResourceCounts};
pub use screenshot::{save_image, save_to_buffer, ScreenshotError};
pub use shader::{ObjectUniforms, RayMarchProgram, ShaderBuilder, VolumeUniforms};
pub use volume_texture::{TextureId, VolumeTexture, VolumeTextureOptions};
