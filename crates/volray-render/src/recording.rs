//! A [`RenderDevice`] that allocates nothing and counts every call.
//!
//! Useful for dry runs and for exercising primitive lifecycles without a GPU.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use volray_core::{BoxMesh, PixelDatatype, PixelFormat, SamplerState, VolumeTextureDescriptor};

use crate::context::texture_format;
use crate::device::{DeviceLimits, RenderDevice};
use crate::error::{RenderError, RenderResult};
use crate::frame::{RenderState, UniformMap};

/// Opaque handle returned for every resource kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordedHandle {
    /// Sequential id, unique per device.
    pub id: u64,
    /// Label passed at creation.
    pub label: Option<String>,
}

/// Number of calls per resource operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceCounts {
    pub textures_created: usize,
    pub textures_destroyed: usize,
    pub bytes_uploaded: usize,
    pub samplers_created: usize,
    pub vertex_arrays_created: usize,
    pub vertex_arrays_destroyed: usize,
    pub programs_compiled: usize,
    pub bindings_created: usize,
}

impl ResourceCounts {
    /// Textures created and not yet destroyed.
    pub fn live_textures(&self) -> usize {
        self.textures_created - self.textures_destroyed
    }

    /// Vertex arrays created and not yet destroyed.
    pub fn live_vertex_arrays(&self) -> usize {
        self.vertex_arrays_created - self.vertex_arrays_destroyed
    }
}

/// Operation that can be made to fail once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    CreateTexture,
    CreateVertexArray,
    CompileProgram,
    CreateBindings,
}

/// Records resource calls instead of touching a GPU.
#[derive(Debug)]
pub struct RecordingDevice {
    limits: DeviceLimits,
    float32_filterable: bool,
    counts: Cell<ResourceCounts>,
    next_id: Cell<u64>,
    programs: RefCell<HashMap<RenderState, RecordedHandle>>,
    fail_next: Cell<Option<FailPoint>>,
}

impl RecordingDevice {
    /// A device with default limits and no 32-bit float filtering.
    pub fn new() -> Self {
        Self {
            limits: DeviceLimits::default(),
            float32_filterable: false,
            counts: Cell::new(ResourceCounts::default()),
            next_id: Cell::new(1),
            programs: RefCell::new(HashMap::new()),
            fail_next: Cell::new(None),
        }
    }

    /// Overrides the limits.
    #[must_use]
    pub fn with_limits(mut self, limits: DeviceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Enables filtering of 32-bit float textures.
    #[must_use]
    pub fn with_float32_filterable(mut self, enabled: bool) -> Self {
        self.float32_filterable = enabled;
        self
    }

    /// Makes the next call of `point` fail.
    pub fn fail_next(&self, point: FailPoint) {
        self.fail_next.set(Some(point));
    }

    /// Snapshot of the call counters.
    pub fn counts(&self) -> ResourceCounts {
        self.counts.get()
    }

    fn record(&self, update: impl FnOnce(&mut ResourceCounts)) {
        let mut counts = self.counts.get();
        update(&mut counts);
        self.counts.set(counts);
    }

    fn check(&self, point: FailPoint) -> RenderResult<()> {
        if self.fail_next.get() == Some(point) {
            self.fail_next.set(None);
            let message = format!("injected {point:?} failure");
            return Err(match point {
                FailPoint::CreateTexture => RenderError::TextureCreationFailed(message),
                FailPoint::CreateVertexArray | FailPoint::CreateBindings => {
                    RenderError::BufferCreationFailed(message)
                }
                FailPoint::CompileProgram => RenderError::ShaderCompilationFailed(message),
            });
        }
        Ok(())
    }

    fn handle(&self, label: Option<&str>) -> RecordedHandle {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        RecordedHandle {
            id,
            label: label.map(str::to_owned),
        }
    }
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderDevice for RecordingDevice {
    type Texture = RecordedHandle;
    type Sampler = RecordedHandle;
    type VertexArray = RecordedHandle;
    type Program = RecordedHandle;
    type Bindings = RecordedHandle;

    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn supports_format(&self, format: PixelFormat, datatype: PixelDatatype) -> bool {
        texture_format(format, datatype, self.float32_filterable).is_some()
    }

    fn create_texture_3d(
        &self,
        _descriptor: &VolumeTextureDescriptor,
        data: Option<&[u8]>,
        label: Option<&str>,
    ) -> RenderResult<Self::Texture> {
        self.check(FailPoint::CreateTexture)?;
        let uploaded = data.map_or(0, <[u8]>::len);
        self.record(|c| {
            c.textures_created += 1;
            c.bytes_uploaded += uploaded;
        });
        Ok(self.handle(label))
    }

    fn destroy_texture(&self, _texture: &Self::Texture) {
        self.record(|c| c.textures_destroyed += 1);
    }

    fn create_sampler(&self, _state: SamplerState) -> RenderResult<Self::Sampler> {
        self.record(|c| c.samplers_created += 1);
        Ok(self.handle(Some("sampler")))
    }

    fn create_vertex_array(
        &self,
        _mesh: &BoxMesh,
        label: Option<&str>,
    ) -> RenderResult<Self::VertexArray> {
        self.check(FailPoint::CreateVertexArray)?;
        self.record(|c| c.vertex_arrays_created += 1);
        Ok(self.handle(label))
    }

    fn destroy_vertex_array(&self, _vertex_array: &Self::VertexArray) {
        self.record(|c| c.vertex_arrays_destroyed += 1);
    }

    fn ray_march_program(&self, state: RenderState) -> RenderResult<Self::Program> {
        if let Some(program) = self.programs.borrow().get(&state) {
            return Ok(program.clone());
        }
        self.check(FailPoint::CompileProgram)?;
        let program = self.handle(Some("ray march program"));
        self.record(|c| c.programs_compiled += 1);
        self.programs.borrow_mut().insert(state, program.clone());
        Ok(program)
    }

    fn create_bindings(
        &self,
        _program: &Self::Program,
        _uniforms: &UniformMap,
        _texture: &Self::Texture,
        _sampler: &Self::Sampler,
    ) -> RenderResult<Self::Bindings> {
        self.check(FailPoint::CreateBindings)?;
        self.record(|c| c.bindings_created += 1);
        Ok(self.handle(Some("bindings")))
    }
}
