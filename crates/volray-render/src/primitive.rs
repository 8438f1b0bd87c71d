//! A ray-marched volume placed in a box.
//!
//! GPU resources are created on the first [`VolumePrimitive::update`] that has
//! geometry to work with. From then on the same [`DrawCommand`] is pushed every
//! frame until something it depends on changes.

use std::sync::Arc;

use volray_core::{
    BoxGeometry, DMat4, DensityField, HalfExtent, PixelDatatype, PixelFormat, RayMarchParams,
    SamplerState, VertexFormat, VolumeError, VolumeOptions, VolumeTextureDescriptor,
};

use crate::device::RenderDevice;
use crate::error::{RenderError, RenderResult};
use crate::frame::{DrawCommand, FrameState, Pass, RenderState, UniformMap};
use crate::volume_texture::{VolumeTexture, VolumeTextureOptions};

/// Arguments of [`VolumePrimitive::new`].
#[derive(Debug, Clone)]
pub struct VolumePrimitiveOptions {
    /// Host box. May be supplied later with [`VolumePrimitive::set_geometry`].
    pub geometry: Option<BoxGeometry>,
    /// Placement of the box in the world.
    pub model_matrix: DMat4,
    /// Texels to upload.
    pub density: DensityField,
    /// March tunables.
    pub params: RayMarchParams,
    /// Initial filtering.
    pub sampler: SamplerState,
    /// Channel layout of `density`.
    pub pixel_format: PixelFormat,
    /// Channel type of `density`.
    pub pixel_datatype: PixelDatatype,
    /// Debug label used for GPU objects.
    pub label: String,
}

impl VolumePrimitiveOptions {
    /// Options with default tunables for `density`.
    pub fn new(density: DensityField) -> Self {
        Self {
            geometry: None,
            model_matrix: DMat4::IDENTITY,
            density,
            params: RayMarchParams::default(),
            sampler: SamplerState::NEAREST,
            pixel_format: PixelFormat::Alpha,
            pixel_datatype: PixelDatatype::UnsignedByte,
            label: "volume".to_string(),
        }
    }

    /// Options taken from a loaded configuration.
    pub fn from_volume_options(
        options: &VolumeOptions,
        density: DensityField,
        model_matrix: DMat4,
    ) -> RenderResult<Self> {
        options.validate()?;
        let geometry =
            BoxGeometry::from_dimensions(VertexFormat::PositionAndSt, options.box_dimensions)?;
        let descriptor = options.texture_descriptor();
        Ok(Self {
            geometry: Some(geometry),
            model_matrix,
            density,
            params: options.params(),
            sampler: descriptor.sampler,
            pixel_format: descriptor.pixel_format,
            pixel_datatype: descriptor.pixel_datatype,
            label: "volume".to_string(),
        })
    }
}

struct ReadyState<D: RenderDevice> {
    command: Arc<DrawCommand<D>>,
    sampler_generation: u64,
}

enum Lifecycle<D: RenderDevice> {
    Uninitialized,
    Ready(ReadyState<D>),
    Destroyed,
}

/// Lifecycle stage of a [`VolumePrimitive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveState {
    /// No draw command yet.
    Uninitialized,
    /// Draw command built and texture resident.
    Ready,
    /// Resources released. Terminal.
    Destroyed,
}

/// A volume rendered by ray marching through its box.
pub struct VolumePrimitive<D: RenderDevice> {
    label: String,
    geometry: Option<BoxGeometry>,
    geometry_dirty: bool,
    model_matrix: DMat4,
    params: RayMarchParams,
    sampler: SamplerState,
    pixel_format: PixelFormat,
    pixel_datatype: PixelDatatype,
    density: Option<DensityField>,
    texture: Option<VolumeTexture<D>>,
    lifecycle: Lifecycle<D>,
}

fn texture_descriptor(
    density: &DensityField,
    pixel_format: PixelFormat,
    pixel_datatype: PixelDatatype,
    sampler: SamplerState,
) -> VolumeTextureDescriptor {
    let dims = density.dimensions();
    VolumeTextureDescriptor {
        width: dims.x,
        height: dims.y,
        depth: dims.z,
        pixel_format,
        pixel_datatype,
        sampler,
    }
}

fn check_geometry(geometry: &BoxGeometry) -> RenderResult<()> {
    BoxGeometry::from_dimensions(geometry.vertex_format, geometry.dimensions)?;
    Ok(())
}

impl<D: RenderDevice> VolumePrimitive<D> {
    /// Validates `options`; no GPU work happens here.
    pub fn new(options: VolumePrimitiveOptions) -> RenderResult<Self> {
        if let Some(geometry) = &options.geometry {
            check_geometry(geometry)?;
        }
        options.params.validate()?;
        if options.density.is_empty() {
            return Err(VolumeError::InvalidOptions("density field is empty".to_string()).into());
        }
        if !options.model_matrix.is_finite() {
            return Err(VolumeError::InvalidOptions(
                "model matrix must be finite".to_string(),
            )
            .into());
        }
        let descriptor = texture_descriptor(
            &options.density,
            options.pixel_format,
            options.pixel_datatype,
            options.sampler,
        );
        if descriptor.size_in_bytes() != options.density.len() {
            return Err(RenderError::InvalidDataLength {
                expected: descriptor.size_in_bytes(),
                actual: options.density.len(),
            });
        }

        Ok(Self {
            label: options.label,
            geometry: options.geometry,
            geometry_dirty: false,
            model_matrix: options.model_matrix,
            params: options.params,
            sampler: options.sampler,
            pixel_format: options.pixel_format,
            pixel_datatype: options.pixel_datatype,
            density: Some(options.density),
            texture: None,
            lifecycle: Lifecycle::Uninitialized,
        })
    }

    /// Pushes this primitive's draw command, building it first if needed.
    ///
    /// Without geometry nothing is pushed and the call succeeds; the next
    /// frame tries again.
    pub fn update(&mut self, frame: &mut FrameState<'_, D>) -> RenderResult<()> {
        let context = frame.context;
        match self.state() {
            PrimitiveState::Destroyed => {
                return Err(RenderError::UseAfterDestroy("VolumePrimitive::update"));
            }
            PrimitiveState::Uninitialized => {
                let Some(geometry) = self.geometry else {
                    log::debug!("{}: no geometry yet, skipping frame", self.label);
                    return Ok(());
                };
                self.initialize(context, &geometry)?;
            }
            PrimitiveState::Ready => {
                if self.geometry_dirty {
                    self.rebuild_geometry(context)?;
                }
                self.refresh_bindings(context)?;
            }
        }

        if let Lifecycle::Ready(ready) = &self.lifecycle {
            frame.command_list.push(Arc::clone(&ready.command));
        }
        Ok(())
    }

    /// Returns the texture, creating and uploading it on first use.
    pub fn get_texture(&mut self, context: &D) -> RenderResult<&VolumeTexture<D>> {
        if matches!(self.lifecycle, Lifecycle::Destroyed) {
            return Err(RenderError::UseAfterDestroy("VolumePrimitive::get_texture"));
        }
        if self.texture.is_none() {
            let density = self
                .density
                .as_ref()
                .ok_or(RenderError::UseAfterDestroy("VolumePrimitive::get_texture"))?;
            let descriptor =
                texture_descriptor(density, self.pixel_format, self.pixel_datatype, self.sampler);
            let label = format!("{} texture", self.label);
            let texture = VolumeTexture::create(VolumeTextureOptions {
                context: Some(context),
                descriptor,
                source: Some(density.as_bytes()),
                label: Some(&label),
            })?;
            self.texture = Some(texture);
        }
        self.texture
            .as_ref()
            .ok_or(RenderError::UseAfterDestroy("VolumePrimitive::get_texture"))
    }

    fn initialize(&mut self, context: &D, geometry: &BoxGeometry) -> RenderResult<()> {
        let texture_was_created = self.texture.is_none();
        self.get_texture(context)?;

        let built = match &self.texture {
            Some(texture) => self.assemble(context, geometry, texture),
            None => Err(RenderError::UseAfterDestroy("VolumePrimitive::update")),
        };

        match built {
            Ok(command) => {
                let sampler_generation = self
                    .texture
                    .as_ref()
                    .map_or(0, VolumeTexture::sampler_generation);
                self.lifecycle = Lifecycle::Ready(ReadyState {
                    command,
                    sampler_generation,
                });
                self.geometry_dirty = false;
                // The texels now live on the GPU only.
                self.density = None;
                log::info!("{} ready", self.label);
                Ok(())
            }
            Err(err) => {
                if texture_was_created {
                    if let Some(mut texture) = self.texture.take() {
                        if let Err(destroy_err) = texture.destroy(context) {
                            log::warn!("{}: releasing texture failed: {destroy_err}", self.label);
                        }
                    }
                }
                Err(err)
            }
        }
    }

    fn assemble(
        &self,
        context: &D,
        geometry: &BoxGeometry,
        texture: &VolumeTexture<D>,
    ) -> RenderResult<Arc<DrawCommand<D>>> {
        let label = format!("{} box", self.label);
        let vertex_array = context.create_vertex_array(&geometry.create_mesh(), Some(&label))?;

        let rest = (|| -> RenderResult<_> {
            let render_state = RenderState::VOLUME;
            let program = context.ray_march_program(render_state)?;
            let uniforms = self.uniform_map(geometry.half_extent(), texture);
            let bindings =
                context.create_bindings(&program, &uniforms, texture.texture()?, texture.sampler()?)?;
            Ok((render_state, program, uniforms, bindings))
        })();

        match rest {
            Ok((render_state, program, uniforms, bindings)) => Ok(Arc::new(DrawCommand {
                model_matrix: self.model_matrix,
                bounding_sphere: geometry.bounding_sphere().transform(&self.model_matrix),
                pass: Pass::Opaque,
                render_state,
                program,
                vertex_array,
                uniforms,
                bindings,
            })),
            Err(err) => {
                context.destroy_vertex_array(&vertex_array);
                Err(err)
            }
        }
    }

    fn uniform_map(&self, half: HalfExtent, texture: &VolumeTexture<D>) -> UniformMap {
        UniformMap {
            halfdim: half.get(),
            iso_threshold: self.params.iso_threshold,
            step_divisor: self.params.step_divisor,
            face_epsilon: self.params.face_epsilon,
            gradient_offset: self.params.gradient_offset,
            max_steps: self.params.max_steps,
            volume_texture: texture.id(),
        }
    }

    fn rebuild_geometry(&mut self, context: &D) -> RenderResult<()> {
        let (Some(geometry), Some(texture)) = (self.geometry, self.texture.as_ref()) else {
            return Ok(());
        };
        let command = self.assemble(context, &geometry, texture)?;
        let sampler_generation = texture.sampler_generation();
        let previous = std::mem::replace(
            &mut self.lifecycle,
            Lifecycle::Ready(ReadyState {
                command,
                sampler_generation,
            }),
        );
        if let Lifecycle::Ready(old) = previous {
            context.destroy_vertex_array(&old.command.vertex_array);
        }
        self.geometry_dirty = false;
        log::debug!("{}: rebuilt box geometry", self.label);
        Ok(())
    }

    fn refresh_bindings(&mut self, context: &D) -> RenderResult<()> {
        let (Lifecycle::Ready(ready), Some(texture)) = (&mut self.lifecycle, self.texture.as_ref())
        else {
            return Ok(());
        };
        if ready.sampler_generation == texture.sampler_generation() {
            return Ok(());
        }
        let mut command = DrawCommand::clone(&ready.command);
        command.bindings = context.create_bindings(
            &command.program,
            &command.uniforms,
            texture.texture()?,
            texture.sampler()?,
        )?;
        ready.command = Arc::new(command);
        ready.sampler_generation = texture.sampler_generation();
        log::debug!("{}: rebuilt bindings after sampler change", self.label);
        Ok(())
    }

    /// Supplies or replaces the host box.
    pub fn set_geometry(&mut self, geometry: BoxGeometry) -> RenderResult<()> {
        if matches!(self.lifecycle, Lifecycle::Destroyed) {
            return Err(RenderError::UseAfterDestroy("VolumePrimitive::set_geometry"));
        }
        check_geometry(&geometry)?;
        if self.geometry != Some(geometry) {
            self.geometry = Some(geometry);
            self.geometry_dirty = matches!(self.lifecycle, Lifecycle::Ready(_));
        }
        Ok(())
    }

    /// Moves the box. Takes effect on the next pushed command.
    pub fn set_model_matrix(&mut self, model_matrix: DMat4) -> RenderResult<()> {
        if matches!(self.lifecycle, Lifecycle::Destroyed) {
            return Err(RenderError::UseAfterDestroy("VolumePrimitive::set_model_matrix"));
        }
        self.model_matrix = model_matrix;
        if let (Lifecycle::Ready(ready), Some(geometry)) = (&mut self.lifecycle, self.geometry) {
            let mut command = DrawCommand::clone(&ready.command);
            command.model_matrix = model_matrix;
            command.bounding_sphere = geometry.bounding_sphere().transform(&model_matrix);
            ready.command = Arc::new(command);
        }
        Ok(())
    }

    /// Changes texture filtering.
    ///
    /// Before the texture exists the state is kept for its creation.
    pub fn set_sampler(&mut self, context: &D, state: SamplerState) -> RenderResult<()> {
        if matches!(self.lifecycle, Lifecycle::Destroyed) {
            return Err(RenderError::UseAfterDestroy("VolumePrimitive::set_sampler"));
        }
        self.sampler = state;
        match &mut self.texture {
            Some(texture) => texture.set_sampler(context, state),
            None => Ok(()),
        }
    }

    /// Releases the texture and vertex array. The primitive cannot be used
    /// afterwards.
    pub fn destroy(&mut self, context: &D) -> RenderResult<()> {
        let previous = std::mem::replace(&mut self.lifecycle, Lifecycle::Destroyed);
        if matches!(previous, Lifecycle::Destroyed) {
            return Err(RenderError::UseAfterDestroy("VolumePrimitive::destroy"));
        }
        if let Lifecycle::Ready(ready) = previous {
            context.destroy_vertex_array(&ready.command.vertex_array);
        }
        if let Some(mut texture) = self.texture.take() {
            texture.destroy(context)?;
        }
        self.density = None;
        log::info!("{} destroyed", self.label);
        Ok(())
    }

    /// Current lifecycle stage.
    pub fn state(&self) -> PrimitiveState {
        match self.lifecycle {
            Lifecycle::Uninitialized => PrimitiveState::Uninitialized,
            Lifecycle::Ready(_) => PrimitiveState::Ready,
            Lifecycle::Destroyed => PrimitiveState::Destroyed,
        }
    }

    /// Whether a draw command has been built.
    pub fn is_ready(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Ready(_))
    }

    /// Whether [`destroy`](Self::destroy) has been called.
    pub fn is_destroyed(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Destroyed)
    }

    /// Half extent of the box, if geometry is known.
    pub fn half_extent(&self) -> Option<HalfExtent> {
        self.geometry.map(|g| g.half_extent())
    }

    /// Placement of the box.
    pub fn model_matrix(&self) -> DMat4 {
        self.model_matrix
    }

    /// Host box, if known.
    pub fn geometry(&self) -> Option<&BoxGeometry> {
        self.geometry.as_ref()
    }

    /// March tunables.
    pub fn params(&self) -> &RayMarchParams {
        &self.params
    }

    /// The cached command once ready.
    pub fn draw_command(&self) -> Option<&Arc<DrawCommand<D>>> {
        match &self.lifecycle {
            Lifecycle::Ready(ready) => Some(&ready.command),
            _ => None,
        }
    }

    /// The texture once created.
    pub fn texture(&self) -> Option<&VolumeTexture<D>> {
        self.texture.as_ref()
    }

    /// Whether the CPU copy of the density field is still held.
    pub fn has_cpu_density(&self) -> bool {
        self.density.is_some()
    }

    /// Debug label.
    pub fn label(&self) -> &str {
        &self.label
    }
}
