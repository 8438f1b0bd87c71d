//! Core data for volray.
//!
//! This crate holds everything about the volume that does not need a GPU:
//! - [`NoiseField`] gradient noise and the [`DensityField`] it is sampled into
//! - the CPU reference of the ray-march algorithm in [`raymarch`]
//! - box geometry, texture descriptions and camera-position encoding
//! - [`VolumeOptions`] configuration

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Grid sizes are small; u32 <-> f32 casts are intentional
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod density;
pub mod encoding;
pub mod error;
pub mod geometry;
pub mod noise_field;
pub mod options;
pub mod raymarch;
pub mod texture;
pub mod transforms;

pub use density::{DensityField, PendingDensityField};
pub use encoding::EncodedVec3;
pub use error::{Result, VolumeError};
pub use geometry::{BoundingSphere, BoxGeometry, BoxMesh, BoxVertex, HalfExtent, VertexFormat};
pub use noise_field::NoiseField;
pub use options::VolumeOptions;
pub use raymarch::{MarchResult, Ray, RayHit, RayMarchParams};
pub use texture::{FilterMode, PixelDatatype, PixelFormat, SamplerState, VolumeTextureDescriptor};

// Re-export glam types for convenience
pub use glam::{DMat4, DVec3, Mat4, UVec3, Vec3};
