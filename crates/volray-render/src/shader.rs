//! The ray-march program and its uniform layouts.

use glam::Mat4;
use pollster::FutureExt;
use volray_core::{BoxVertex, EncodedVec3};

use crate::error::{RenderError, RenderResult};
use crate::frame::{RenderState, UniformMap};

/// WGSL source of the ray-march program.
pub const RAY_MARCH_WGSL: &str = include_str!("shaders/ray_march.wgsl");

/// Names the host binds by; renaming them in the WGSL breaks the contract.
const REQUIRED_SYMBOLS: [&str; 2] = ["halfdim", "volumnTexture_lxs"];

/// Per-draw transform and camera.
/// Layout must match WGSL `ObjectUniforms` exactly.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectUniforms {
    /// Model-view-projection matrix.
    pub model_view_proj: [[f32; 4]; 4],
    /// Camera position in model coordinates, coarse part (w unused).
    pub camera_position_high: [f32; 4],
    /// Camera position in model coordinates, fine part (w unused).
    pub camera_position_low: [f32; 4],
}

impl ObjectUniforms {
    /// Packs a transform and an encoded camera position.
    pub fn new(model_view_proj: Mat4, camera: EncodedVec3) -> Self {
        Self {
            model_view_proj: model_view_proj.to_cols_array_2d(),
            camera_position_high: camera.high.extend(0.0).to_array(),
            camera_position_low: camera.low.extend(0.0).to_array(),
        }
    }
}

impl Default for ObjectUniforms {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, EncodedVec3::default())
    }
}

/// March parameters.
/// Layout must match WGSL `VolumeUniforms` exactly.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct VolumeUniforms {
    /// Half extent of the box.
    pub halfdim: [f32; 3],
    /// Iso-surface threshold.
    pub iso_threshold: f32,
    /// Step divisor.
    pub step_divisor: f32,
    /// Face snapping distance.
    pub face_epsilon: f32,
    /// Gradient offset.
    pub gradient_offset: f32,
    /// Iteration cap.
    pub max_steps: u32,
}

impl From<&UniformMap> for VolumeUniforms {
    fn from(map: &UniformMap) -> Self {
        Self {
            halfdim: map.halfdim.to_array(),
            iso_threshold: map.iso_threshold,
            step_divisor: map.step_divisor,
            face_epsilon: map.face_epsilon,
            gradient_offset: map.gradient_offset,
            max_steps: map.max_steps,
        }
    }
}

/// Builder for shader modules.
pub struct ShaderBuilder {
    vertex_source: Option<String>,
    fragment_source: Option<String>,
    required_symbols: Vec<String>,
    label: Option<String>,
}

impl ShaderBuilder {
    /// Creates a new shader builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            vertex_source: None,
            fragment_source: None,
            required_symbols: Vec::new(),
            label: None,
        }
    }

    /// Builder preloaded with the ray-march program.
    #[must_use]
    pub fn ray_march() -> Self {
        REQUIRED_SYMBOLS.into_iter().fold(
            Self::new()
                .with_vertex(RAY_MARCH_WGSL)
                .with_fragment(RAY_MARCH_WGSL)
                .with_label("ray march shader"),
            Self::with_required_symbol,
        )
    }

    /// Sets the vertex shader source (WGSL).
    #[must_use]
    pub fn with_vertex(mut self, source: impl Into<String>) -> Self {
        self.vertex_source = Some(source.into());
        self
    }

    /// Sets the fragment shader source (WGSL).
    #[must_use]
    pub fn with_fragment(mut self, source: impl Into<String>) -> Self {
        self.fragment_source = Some(source.into());
        self
    }

    /// Requires `symbol` to appear in the combined source.
    #[must_use]
    pub fn with_required_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.required_symbols.push(symbol.into());
        self
    }

    /// Sets the shader label for debugging.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Builds the shader module, reporting validation errors.
    pub fn build_module(self, device: &wgpu::Device) -> RenderResult<wgpu::ShaderModule> {
        let source = self.combined_source()?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: self.label.as_deref(),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        if let Some(err) = device.pop_error_scope().block_on() {
            return Err(RenderError::ShaderCompilationFailed(err.to_string()));
        }

        Ok(module)
    }

    fn combined_source(&self) -> RenderResult<String> {
        let vertex = self
            .vertex_source
            .as_ref()
            .ok_or_else(|| RenderError::ShaderCompilationFailed("missing vertex shader".into()))?;

        let fragment = self.fragment_source.as_ref().ok_or_else(|| {
            RenderError::ShaderCompilationFailed("missing fragment shader".into())
        })?;

        let source = if vertex == fragment {
            vertex.clone()
        } else {
            format!("{vertex}\n\n{fragment}")
        };

        if let Some(missing) = self
            .required_symbols
            .iter()
            .find(|symbol| !source.contains(symbol.as_str()))
        {
            return Err(RenderError::ShaderCompilationFailed(format!(
                "shader does not declare `{missing}`"
            )));
        }

        Ok(source)
    }
}

impl Default for ShaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The compiled ray-march pipeline for one [`RenderState`].
#[derive(Debug)]
pub struct RayMarchProgram {
    /// The render pipeline.
    pub pipeline: wgpu::RenderPipeline,
    /// Layout of group 0: object uniforms, volume uniforms, texture, sampler.
    pub bind_group_layout: wgpu::BindGroupLayout,
    /// Fixed-function state the pipeline was built with.
    pub render_state: RenderState,
}

impl RayMarchProgram {
    /// Compiles the program for the given target formats.
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
        render_state: RenderState,
    ) -> RenderResult<Self> {
        let shader = ShaderBuilder::ray_march().build_module(device)?;

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Ray March Bind Group Layout"),
            entries: &[
                // Object uniforms
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<ObjectUniforms>() as u64,
                        ),
                    },
                    count: None,
                },
                // Volume uniforms
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<VolumeUniforms>() as u64,
                        ),
                    },
                    count: None,
                },
                // Density texture
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D3,
                        multisampled: false,
                    },
                    count: None,
                },
                // Sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Ray March Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let vertex_layout = wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<BoxVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2],
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Ray March Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[vertex_layout],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: render_state.cull_back_faces.then_some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: depth_format,
                depth_write_enabled: render_state.depth_test,
                depth_compare: if render_state.depth_test {
                    wgpu::CompareFunction::Less
                } else {
                    wgpu::CompareFunction::Always
                },
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        log::debug!("compiled ray march program for {render_state:?}");

        Ok(Self {
            pipeline,
            bind_group_layout,
            render_state,
        })
    }
}
