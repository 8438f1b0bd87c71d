//! Per-frame command collection.

use std::fmt;
use std::sync::Arc;

use volray_core::{BoundingSphere, DMat4, Vec3};

use crate::device::RenderDevice;
use crate::volume_texture::TextureId;

/// Render pass a command belongs to. Opaque commands are executed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Pass {
    /// Depth-tested, depth-writing geometry.
    #[default]
    Opaque,
    /// Blended geometry drawn after every opaque command.
    Translucent,
}

/// Fixed-function state a program is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderState {
    /// Test fragments against the depth buffer.
    pub depth_test: bool,
    /// Discard back-facing triangles.
    pub cull_back_faces: bool,
}

impl RenderState {
    /// Depth-tested with both faces drawn, so the volume still renders with the
    /// camera inside the box.
    pub const VOLUME: Self = Self {
        depth_test: true,
        cull_back_faces: false,
    };
}

impl Default for RenderState {
    fn default() -> Self {
        Self::VOLUME
    }
}

/// Uniform values of a ray-march draw.
///
/// Plain data copied out of the owning primitive when its command is built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformMap {
    /// Half extent of the box (`halfdim` in the program).
    pub halfdim: Vec3,
    /// Iso-surface threshold.
    pub iso_threshold: f32,
    /// Step divisor.
    pub step_divisor: f32,
    /// Face snapping distance in texture space.
    pub face_epsilon: f32,
    /// Gradient offset in local units.
    pub gradient_offset: f32,
    /// Iteration cap.
    pub max_steps: u32,
    /// Texture sampled as `volumnTexture_lxs`.
    pub volume_texture: TextureId,
}

/// Everything the host needs to issue one draw.
pub struct DrawCommand<D: RenderDevice> {
    /// Model-to-world transform.
    pub model_matrix: DMat4,
    /// World-space bounds.
    pub bounding_sphere: BoundingSphere,
    /// Pass the command is executed in.
    pub pass: Pass,
    /// State `program` was built with.
    pub render_state: RenderState,
    /// Compiled program.
    pub program: D::Program,
    /// Box mesh.
    pub vertex_array: D::VertexArray,
    /// Uniform values.
    pub uniforms: UniformMap,
    /// Bound uniforms, texture and sampler.
    pub bindings: D::Bindings,
}

impl<D: RenderDevice> Clone for DrawCommand<D> {
    fn clone(&self) -> Self {
        Self {
            model_matrix: self.model_matrix,
            bounding_sphere: self.bounding_sphere,
            pass: self.pass,
            render_state: self.render_state,
            program: self.program.clone(),
            vertex_array: self.vertex_array.clone(),
            uniforms: self.uniforms,
            bindings: self.bindings.clone(),
        }
    }
}

impl<D: RenderDevice> fmt::Debug for DrawCommand<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrawCommand")
            .field("model_matrix", &self.model_matrix)
            .field("bounding_sphere", &self.bounding_sphere)
            .field("pass", &self.pass)
            .field("render_state", &self.render_state)
            .field("program", &self.program)
            .field("vertex_array", &self.vertex_array)
            .field("uniforms", &self.uniforms)
            .field("bindings", &self.bindings)
            .finish()
    }
}

/// State handed to primitives once per frame.
pub struct FrameState<'a, D: RenderDevice> {
    /// Context owning every GPU resource.
    pub context: &'a D,
    /// Commands to execute this frame, in push order.
    pub command_list: Vec<Arc<DrawCommand<D>>>,
    /// Monotonic frame counter.
    pub frame_number: u64,
}

impl<'a, D: RenderDevice> FrameState<'a, D> {
    /// Starts an empty frame.
    pub fn new(context: &'a D, frame_number: u64) -> Self {
        Self {
            context,
            command_list: Vec::new(),
            frame_number,
        }
    }

    /// Commands ordered by pass, keeping push order within a pass.
    pub fn sorted_commands(&self) -> Vec<Arc<DrawCommand<D>>> {
        let mut commands = self.command_list.clone();
        commands.sort_by_key(|c| c.pass);
        commands
    }
}
