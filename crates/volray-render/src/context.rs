//! The wgpu implementation of [`RenderDevice`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use volray_core::{
    BoxMesh, FilterMode, PixelDatatype, PixelFormat, SamplerState, VolumeTextureDescriptor,
};

use crate::buffer::{create_index_buffer, create_uniform_buffer, create_vertex_buffer};
use crate::device::{DeviceLimits, RenderDevice};
use crate::error::{RenderError, RenderResult};
use crate::frame::{RenderState, UniformMap};
use crate::shader::{ObjectUniforms, RayMarchProgram, VolumeUniforms};

/// Colour target format. Shaded colours are written as-is, without sRGB
/// conversion.
pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Depth target format.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Maps a format/datatype pair to a filterable wgpu format.
///
/// 32-bit float formats are only filterable with
/// [`wgpu::Features::FLOAT32_FILTERABLE`].
pub fn texture_format(
    format: PixelFormat,
    datatype: PixelDatatype,
    float32_filterable: bool,
) -> Option<wgpu::TextureFormat> {
    use wgpu::TextureFormat as T;
    match (format, datatype) {
        (PixelFormat::Alpha | PixelFormat::Red, PixelDatatype::UnsignedByte) => Some(T::R8Unorm),
        (PixelFormat::Alpha | PixelFormat::Red, PixelDatatype::HalfFloat) => Some(T::R16Float),
        (PixelFormat::Alpha | PixelFormat::Red, PixelDatatype::Float) => {
            float32_filterable.then_some(T::R32Float)
        }
        (PixelFormat::Rg, PixelDatatype::UnsignedByte) => Some(T::Rg8Unorm),
        (PixelFormat::Rg, PixelDatatype::HalfFloat) => Some(T::Rg16Float),
        (PixelFormat::Rg, PixelDatatype::Float) => float32_filterable.then_some(T::Rg32Float),
        (PixelFormat::Rgba, PixelDatatype::UnsignedByte) => Some(T::Rgba8Unorm),
        (PixelFormat::Rgba, PixelDatatype::HalfFloat) => Some(T::Rgba16Float),
        (PixelFormat::Rgba, PixelDatatype::Float) => float32_filterable.then_some(T::Rgba32Float),
    }
}

fn filter_mode(mode: FilterMode) -> wgpu::FilterMode {
    match mode {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

/// A 3D texture and its default view.
#[derive(Debug)]
pub struct GpuTexture {
    /// The texture.
    pub texture: wgpu::Texture,
    /// 3D view over every texel.
    pub view: wgpu::TextureView,
}

/// Uploaded box mesh.
#[derive(Debug)]
pub struct GpuMesh {
    /// Interleaved `BoxVertex` data.
    pub vertex_buffer: wgpu::Buffer,
    /// 16-bit indices.
    pub index_buffer: wgpu::Buffer,
    /// Number of indices to draw.
    pub index_count: u32,
}

/// Bind group of one ray-march draw plus the buffers behind it.
#[derive(Debug)]
pub struct GpuBindings {
    /// Group 0 of the ray-march program.
    pub bind_group: wgpu::BindGroup,
    /// Rewritten every frame with the camera-dependent transform.
    pub object_buffer: wgpu::Buffer,
    /// March parameters.
    pub volume_buffer: wgpu::Buffer,
}

/// A wgpu device and queue usable as a [`RenderDevice`].
///
/// Compiled programs are cached per [`RenderState`]. The cache is not
/// thread-safe; use the context from the thread that created it.
#[derive(Debug)]
pub struct WgpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    color_format: wgpu::TextureFormat,
    depth_format: wgpu::TextureFormat,
    programs: RefCell<HashMap<RenderState, Arc<RayMarchProgram>>>,
}

impl WgpuContext {
    /// Creates a context on the best available adapter, without a surface.
    pub async fn new_headless() -> RenderResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderError::AdapterCreationFailed)?;

        let info = adapter.get_info();
        log::info!("using adapter {} ({:?})", info.name, info.backend);

        // Optional: lets 32-bit float volumes be filtered.
        let required_features = adapter.features() & wgpu::Features::FLOAT32_FILTERABLE;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("volray device (headless)"),
                required_features,
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                trace: Default::default(),
                experimental_features: Default::default(),
            })
            .await?;

        Ok(Self::from_device(device, queue, COLOR_FORMAT, DEPTH_FORMAT))
    }

    /// Wraps an existing device, e.g. one owned by a windowed host.
    pub fn from_device(
        device: wgpu::Device,
        queue: wgpu::Queue,
        color_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
    ) -> Self {
        Self {
            device,
            queue,
            color_format,
            depth_format,
            programs: RefCell::new(HashMap::new()),
        }
    }

    /// The wgpu device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// The wgpu queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Colour format programs are built for.
    pub fn color_format(&self) -> wgpu::TextureFormat {
        self.color_format
    }

    /// Depth format programs are built for.
    pub fn depth_format(&self) -> wgpu::TextureFormat {
        self.depth_format
    }

    fn float32_filterable(&self) -> bool {
        self.device
            .features()
            .contains(wgpu::Features::FLOAT32_FILTERABLE)
    }
}

impl RenderDevice for WgpuContext {
    type Texture = Arc<GpuTexture>;
    type Sampler = Arc<wgpu::Sampler>;
    type VertexArray = Arc<GpuMesh>;
    type Program = Arc<RayMarchProgram>;
    type Bindings = Arc<GpuBindings>;

    fn limits(&self) -> DeviceLimits {
        DeviceLimits {
            max_texture_dimension_3d: self.device.limits().max_texture_dimension_3d,
        }
    }

    fn supports_format(&self, format: PixelFormat, datatype: PixelDatatype) -> bool {
        texture_format(format, datatype, self.float32_filterable()).is_some()
    }

    fn create_texture_3d(
        &self,
        descriptor: &VolumeTextureDescriptor,
        data: Option<&[u8]>,
        label: Option<&str>,
    ) -> RenderResult<Self::Texture> {
        let format = texture_format(
            descriptor.pixel_format,
            descriptor.pixel_datatype,
            self.float32_filterable(),
        )
        .ok_or_else(|| {
            RenderError::TextureCreationFailed(format!(
                "no wgpu format for {:?}/{:?}",
                descriptor.pixel_format, descriptor.pixel_datatype
            ))
        })?;

        let size = wgpu::Extent3d {
            width: descriptor.width,
            height: descriptor.height,
            depth_or_array_layers: descriptor.depth,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label,
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        if let Some(data) = data {
            self.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                data,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(descriptor.bytes_per_row()),
                    rows_per_image: Some(descriptor.height),
                },
                size,
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label,
            dimension: Some(wgpu::TextureViewDimension::D3),
            ..Default::default()
        });

        Ok(Arc::new(GpuTexture { texture, view }))
    }

    fn destroy_texture(&self, texture: &Self::Texture) {
        texture.texture.destroy();
    }

    fn create_sampler(&self, state: SamplerState) -> RenderResult<Self::Sampler> {
        Ok(Arc::new(self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("volume sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: filter_mode(state.mag_filter),
            min_filter: filter_mode(state.min_filter),
            ..Default::default()
        })))
    }

    fn create_vertex_array(
        &self,
        mesh: &BoxMesh,
        label: Option<&str>,
    ) -> RenderResult<Self::VertexArray> {
        if mesh.vertices.is_empty() || mesh.indices.is_empty() {
            return Err(RenderError::BufferCreationFailed("empty mesh".into()));
        }
        Ok(Arc::new(GpuMesh {
            vertex_buffer: create_vertex_buffer(&self.device, &mesh.vertices, label),
            index_buffer: create_index_buffer(&self.device, &mesh.indices, label),
            index_count: mesh.indices.len() as u32,
        }))
    }

    fn destroy_vertex_array(&self, vertex_array: &Self::VertexArray) {
        vertex_array.vertex_buffer.destroy();
        vertex_array.index_buffer.destroy();
    }

    fn ray_march_program(&self, state: RenderState) -> RenderResult<Self::Program> {
        if let Some(program) = self.programs.borrow().get(&state) {
            return Ok(Arc::clone(program));
        }
        let program = Arc::new(RayMarchProgram::new(
            &self.device,
            self.color_format,
            self.depth_format,
            state,
        )?);
        self.programs
            .borrow_mut()
            .insert(state, Arc::clone(&program));
        Ok(program)
    }

    fn create_bindings(
        &self,
        program: &Self::Program,
        uniforms: &UniformMap,
        texture: &Self::Texture,
        sampler: &Self::Sampler,
    ) -> RenderResult<Self::Bindings> {
        let object_buffer = create_uniform_buffer(
            &self.device,
            &ObjectUniforms::default(),
            Some("ray march object uniforms"),
        );
        let volume_buffer = create_uniform_buffer(
            &self.device,
            &VolumeUniforms::from(uniforms),
            Some("ray march volume uniforms"),
        );

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Ray March Bind Group"),
            layout: &program.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: object_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: volume_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });

        Ok(Arc::new(GpuBindings {
            bind_group,
            object_buffer,
            volume_buffer,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_formats_map_to_filterable_formats() {
        assert_eq!(
            texture_format(PixelFormat::Alpha, PixelDatatype::UnsignedByte, false),
            Some(wgpu::TextureFormat::R8Unorm)
        );
        assert_eq!(
            texture_format(PixelFormat::Rgba, PixelDatatype::HalfFloat, false),
            Some(wgpu::TextureFormat::Rgba16Float)
        );
    }

    #[test]
    fn test_float_formats_need_feature() {
        assert_eq!(
            texture_format(PixelFormat::Red, PixelDatatype::Float, false),
            None
        );
        assert_eq!(
            texture_format(PixelFormat::Red, PixelDatatype::Float, true),
            Some(wgpu::TextureFormat::R32Float)
        );
    }

    #[test]
    fn test_bytes_per_texel_agree_with_wgpu() {
        for format in [
            PixelFormat::Alpha,
            PixelFormat::Red,
            PixelFormat::Rg,
            PixelFormat::Rgba,
        ] {
            for datatype in [
                PixelDatatype::UnsignedByte,
                PixelDatatype::HalfFloat,
                PixelDatatype::Float,
            ] {
                let wgpu_format = texture_format(format, datatype, true).unwrap();
                let desc = VolumeTextureDescriptor {
                    width: 1,
                    height: 1,
                    depth: 1,
                    pixel_format: format,
                    pixel_datatype: datatype,
                    sampler: SamplerState::NEAREST,
                };
                assert_eq!(
                    wgpu_format.block_copy_size(None),
                    Some(desc.bytes_per_texel()),
                    "{format:?}/{datatype:?}"
                );
            }
        }
    }
}
