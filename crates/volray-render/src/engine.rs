//! Headless render engine: executes draw commands into an off-screen target
//! and reads the pixels back.

use std::sync::Arc;

use volray_core::EncodedVec3;

use crate::buffer::update_uniform_buffer;
use crate::camera::Camera;
use crate::context::WgpuContext;
use crate::error::{RenderError, RenderResult};
use crate::frame::DrawCommand;
use crate::shader::ObjectUniforms;

/// Off-screen colour and depth targets plus the context that owns them.
pub struct RenderEngine {
    context: WgpuContext,
    width: u32,
    height: u32,
    color_texture: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    /// Clear colour.
    pub background: wgpu::Color,
}

impl RenderEngine {
    /// Creates a headless engine rendering `width` x `height` images.
    pub async fn new_headless(width: u32, height: u32) -> RenderResult<Self> {
        let context = WgpuContext::new_headless().await?;
        Self::with_context(context, width, height)
    }

    /// Creates an engine on an existing context.
    pub fn with_context(context: WgpuContext, width: u32, height: u32) -> RenderResult<Self> {
        let max = context.device().limits().max_texture_dimension_2d;
        for (axis, value) in [
            (crate::error::Axis::Width, width),
            (crate::error::Axis::Height, height),
        ] {
            if value == 0 || value > max {
                return Err(RenderError::InvalidDimension { axis, value, max });
            }
        }

        let (color_texture, color_view) = Self::create_color_target(&context, width, height);
        let depth_view = Self::create_depth_target(&context, width, height);

        log::info!("headless engine ready ({width}x{height})");

        Ok(Self {
            context,
            width,
            height,
            color_texture,
            color_view,
            depth_view,
            background: wgpu::Color {
                r: 0.0,
                g: 0.0,
                b: 0.0,
                a: 1.0,
            },
        })
    }

    fn create_color_target(
        context: &WgpuContext,
        width: u32,
        height: u32,
    ) -> (wgpu::Texture, wgpu::TextureView) {
        let texture = context.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("color target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: context.color_format(),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    }

    fn create_depth_target(context: &WgpuContext, width: u32, height: u32) -> wgpu::TextureView {
        let texture = context.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("depth target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: context.depth_format(),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    /// The context primitives create their resources on.
    pub fn context(&self) -> &WgpuContext {
        &self.context
    }

    /// Returns the target dimensions.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Width over height.
    pub fn aspect_ratio(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }

    /// Clears the targets and executes `commands` in order.
    ///
    /// The caller sorts commands by pass, see
    /// [`FrameState::sorted_commands`](crate::frame::FrameState::sorted_commands).
    pub fn render_frame(&self, camera: &Camera, commands: &[Arc<DrawCommand<WgpuContext>>]) {
        // Each command owns its object buffer, so all writes can precede the pass.
        for command in commands {
            let mvp = camera.model_view_projection(&command.model_matrix);
            let eye = command
                .model_matrix
                .inverse()
                .transform_point3(camera.position);
            update_uniform_buffer(
                self.context.queue(),
                &command.bindings.object_buffer,
                &ObjectUniforms::new(mvp, EncodedVec3::encode(eye)),
            );
        }

        let mut encoder =
            self.context
                .device()
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("volume frame encoder"),
                });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("volume pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.background),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            for command in commands {
                pass.set_pipeline(&command.program.pipeline);
                pass.set_bind_group(0, &command.bindings.bind_group, &[]);
                pass.set_vertex_buffer(0, command.vertex_array.vertex_buffer.slice(..));
                pass.set_index_buffer(
                    command.vertex_array.index_buffer.slice(..),
                    wgpu::IndexFormat::Uint16,
                );
                pass.draw_indexed(0..command.vertex_array.index_count, 0, 0..1);
            }
        }

        self.context.queue().submit(std::iter::once(encoder.finish()));
        log::trace!("rendered {} volume command(s)", commands.len());
    }

    fn aligned_bytes_per_row(width: u32) -> u32 {
        let unaligned = width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        unaligned.div_ceil(align) * align
    }

    /// Reads the colour target back as tightly packed RGBA8 rows.
    pub fn capture_frame(&self) -> RenderResult<Vec<u8>> {
        let bytes_per_row = Self::aligned_bytes_per_row(self.width);
        let device = self.context.device();

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("capture buffer"),
            size: u64::from(bytes_per_row) * u64::from(self.height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("capture encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.color_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        self.context.queue().submit(std::iter::once(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = device.poll(wgpu::PollType::wait_indefinitely());
        rx.recv()
            .map_err(|_| RenderError::BufferMapFailed)?
            .map_err(|_| RenderError::BufferMapFailed)?;

        let row_bytes = (self.width * 4) as usize;
        let mut pixels = Vec::with_capacity(row_bytes * self.height as usize);
        {
            let data = slice.get_mapped_range();
            for row in 0..self.height as usize {
                let start = row * bytes_per_row as usize;
                pixels.extend_from_slice(&data[start..start + row_bytes]);
            }
        }
        buffer.unmap();

        Ok(pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aligned_bytes_per_row() {
        assert_eq!(RenderEngine::aligned_bytes_per_row(1), 256);
        assert_eq!(RenderEngine::aligned_bytes_per_row(64), 256);
        assert_eq!(RenderEngine::aligned_bytes_per_row(65), 512);
    }
}
