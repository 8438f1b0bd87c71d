//! volray: ray-marched iso-surfaces of procedural 3D density volumes.
//!
//! A [`DensityField`] is sampled from gradient noise, uploaded as a 3D
//! texture and drawn by marching rays through the box that hosts it. The
//! first sample above the iso threshold is shaded from its gradient normal.
//!
//! # Quick Start
//!
//! ```no_run
//! use volray::*;
//!
//! fn main() -> Result<()> {
//!     init();
//!
//!     let mut scene = Scene::new_headless(800, 600)?;
//!     scene.add_volume_from_options(&VolumeOptions::default(), DMat4::IDENTITY)?;
//!     scene.frame_all();
//!     scene.render_to_file("volume.png")?;
//!
//!     shutdown();
//!     Ok(())
//! }
//! ```
//!
//! # Crates
//!
//! - `volray-core`: noise, density fields, box geometry, options and a CPU
//!   reference of the march
//! - `volray-render`: the GPU side, written against the [`RenderDevice`]
//!   trait with a wgpu implementation

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

mod error;
mod init;
mod scene;

pub use error::{Result, VolrayError};
pub use init::{init, shutdown};
pub use scene::{Scene, VolumeHandle};

// Re-export core types
pub use volray_core::{
    raymarch, transforms, BoundingSphere, BoxGeometry, DMat4, DVec3, DensityField, EncodedVec3,
    FilterMode, HalfExtent, Mat4, NoiseField, PixelDatatype, PixelFormat, RayMarchParams,
    SamplerState, UVec3, Vec3, VertexFormat, VolumeError, VolumeOptions,
};

// Re-export render types
pub use volray_render::{
    save_image, Camera, DrawCommand, FrameState, PrimitiveState, RecordingDevice, RenderDevice,
    RenderEngine, RenderError, VolumePrimitive, VolumePrimitiveOptions, VolumeTexture,
    WgpuContext,
};
