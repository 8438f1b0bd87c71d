//! The rendering-context seam.
//!
//! Everything that allocates or releases GPU objects goes through a
//! [`RenderDevice`]. The wgpu implementation lives in [`crate::context`];
//! tests substitute a recording double.

use std::fmt::Debug;

use volray_core::{BoxMesh, PixelDatatype, PixelFormat, SamplerState, VolumeTextureDescriptor};

use crate::error::RenderResult;
use crate::frame::{RenderState, UniformMap};

/// Capabilities relevant to volume textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    /// Largest allowed width, height or depth of a 3D texture.
    pub max_texture_dimension_3d: u32,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            max_texture_dimension_3d: 2048,
        }
    }
}

/// A host rendering context able to create the resources a volume needs.
///
/// Handles are cheap to clone and refer to the same GPU object. Methods take
/// `&self`; the context is used from the thread that owns it.
pub trait RenderDevice {
    /// A 3D texture.
    type Texture: Clone + Debug;
    /// A sampler object.
    type Sampler: Clone + Debug;
    /// Vertex and index buffers of a mesh.
    type VertexArray: Clone + Debug;
    /// A compiled program with its fixed render state.
    type Program: Clone + Debug;
    /// Resources bound to a program for one draw.
    type Bindings: Clone + Debug;

    /// Returns the device limits.
    fn limits(&self) -> DeviceLimits;

    /// Whether textures of this format/datatype pair can be created and
    /// filtered.
    fn supports_format(&self, format: PixelFormat, datatype: PixelDatatype) -> bool;

    /// Allocates a 3D texture and uploads `data` in one transfer, if given.
    ///
    /// Callers validate the descriptor first. Backends that track a bound
    /// texture unit must restore the previous binding before returning.
    fn create_texture_3d(
        &self,
        descriptor: &VolumeTextureDescriptor,
        data: Option<&[u8]>,
        label: Option<&str>,
    ) -> RenderResult<Self::Texture>;

    /// Releases a texture.
    fn destroy_texture(&self, texture: &Self::Texture);

    /// Creates a sampler for the given filters.
    fn create_sampler(&self, state: SamplerState) -> RenderResult<Self::Sampler>;

    /// Uploads a mesh.
    fn create_vertex_array(&self, mesh: &BoxMesh, label: Option<&str>)
        -> RenderResult<Self::VertexArray>;

    /// Releases a mesh.
    fn destroy_vertex_array(&self, vertex_array: &Self::VertexArray);

    /// Returns the ray-march program for `state`, compiling it on first use.
    fn ray_march_program(&self, state: RenderState) -> RenderResult<Self::Program>;

    /// Binds uniforms, texture and sampler to `program`.
    fn create_bindings(
        &self,
        program: &Self::Program,
        uniforms: &UniformMap,
        texture: &Self::Texture,
        sampler: &Self::Sampler,
    ) -> RenderResult<Self::Bindings>;
}
