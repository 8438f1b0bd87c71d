//! A headless scene: one engine, one camera, any number of volumes.

use std::path::Path;

use glam::{DMat4, DVec3};
use pollster::FutureExt;
use volray_core::{BoundingSphere, DensityField, SamplerState, VolumeOptions};
use volray_render::{
    Camera, FrameState, RenderEngine, VolumePrimitive, VolumePrimitiveOptions, WgpuContext,
};

use crate::error::{Result, VolrayError};

/// Local direction the camera looks from when framing a volume: above the
/// box, off one corner.
const FRAMING_DIRECTION: DVec3 = DVec3::new(0.6, -1.0, 0.8);

/// Identifies a volume within the [`Scene`] that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VolumeHandle(usize);

impl VolumeHandle {
    /// Slot index inside the scene.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Owns the render engine and every volume drawn with it.
///
/// There is no global state; all resources live as long as the scene.
pub struct Scene {
    engine: RenderEngine,
    camera: Camera,
    volumes: Vec<Option<VolumePrimitive<WgpuContext>>>,
    frame_number: u64,
}

impl Scene {
    /// Creates a scene rendering `width` x `height` frames without a window.
    pub fn new_headless(width: u32, height: u32) -> Result<Self> {
        let engine = RenderEngine::new_headless(width, height).block_on()?;
        Ok(Self::with_engine(engine))
    }

    /// Creates a scene around an existing engine.
    pub fn with_engine(engine: RenderEngine) -> Self {
        let camera = Camera::new(engine.aspect_ratio());
        Self {
            engine,
            camera,
            volumes: Vec::new(),
            frame_number: 0,
        }
    }

    /// Adds a volume. GPU resources are created on the next render.
    pub fn add_volume(&mut self, options: VolumePrimitiveOptions) -> Result<VolumeHandle> {
        let primitive = VolumePrimitive::new(options)?;
        log::debug!("added volume '{}'", primitive.label());
        self.volumes.push(Some(primitive));
        Ok(VolumeHandle(self.volumes.len() - 1))
    }

    /// Generates a density field from `options` and adds it at `model_matrix`.
    pub fn add_volume_from_options(
        &mut self,
        options: &VolumeOptions,
        model_matrix: DMat4,
    ) -> Result<VolumeHandle> {
        options.validate()?;
        let density = DensityField::spawn_generate(options.resolution, options.frequency).wait()?;
        let mut primitive_options =
            VolumePrimitiveOptions::from_volume_options(options, density, model_matrix)?;
        primitive_options.label = format!("volume {}", self.volumes.len());
        self.add_volume(primitive_options)
    }

    /// Loads options from a JSON file and adds the volume they describe.
    pub fn add_volume_from_json_file(
        &mut self,
        path: impl AsRef<Path>,
        model_matrix: DMat4,
    ) -> Result<VolumeHandle> {
        let options = VolumeOptions::from_json_file(path)?;
        self.add_volume_from_options(&options, model_matrix)
    }

    /// Returns the volume behind `handle`.
    pub fn volume(&self, handle: VolumeHandle) -> Option<&VolumePrimitive<WgpuContext>> {
        self.volumes.get(handle.0).and_then(Option::as_ref)
    }

    /// Returns the volume behind `handle` mutably.
    pub fn volume_mut(&mut self, handle: VolumeHandle) -> Option<&mut VolumePrimitive<WgpuContext>> {
        self.volumes.get_mut(handle.0).and_then(Option::as_mut)
    }

    /// Changes the texture filtering of a volume.
    pub fn set_sampler(&mut self, handle: VolumeHandle, state: SamplerState) -> Result<()> {
        let primitive = self
            .volumes
            .get_mut(handle.0)
            .and_then(Option::as_mut)
            .ok_or(VolrayError::UnknownVolume(handle.0))?;
        primitive.set_sampler(self.engine.context(), state)?;
        Ok(())
    }

    /// Destroys a volume and releases its GPU resources.
    pub fn remove_volume(&mut self, handle: VolumeHandle) -> Result<()> {
        let mut primitive = self
            .volumes
            .get_mut(handle.0)
            .and_then(Option::take)
            .ok_or(VolrayError::UnknownVolume(handle.0))?;
        primitive.destroy(self.engine.context())?;
        Ok(())
    }

    /// Number of live volumes.
    pub fn volume_count(&self) -> usize {
        self.volumes.iter().flatten().count()
    }

    /// Destroys every volume.
    pub fn clear(&mut self) {
        let context = self.engine.context();
        for mut primitive in self.volumes.drain(..).flatten() {
            if let Err(e) = primitive.destroy(context) {
                log::warn!("failed to destroy volume '{}': {e}", primitive.label());
            }
        }
    }

    /// The scene camera.
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// The scene camera, mutably.
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    /// The engine frames are rendered with.
    pub fn engine(&self) -> &RenderEngine {
        &self.engine
    }

    /// The engine, mutably (e.g. to change the background).
    pub fn engine_mut(&mut self) -> &mut RenderEngine {
        &mut self.engine
    }

    /// Frames rendered so far.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// World-space sphere enclosing every volume that has geometry.
    pub fn bounding_sphere(&self) -> Option<BoundingSphere> {
        self.volumes
            .iter()
            .flatten()
            .filter_map(|p| {
                p.geometry()
                    .map(|g| g.bounding_sphere().transform(&p.model_matrix()))
            })
            .reduce(|a, b| a.union(&b))
    }

    /// Points the camera at all volumes. Returns `false` when there is nothing
    /// to frame.
    pub fn frame_all(&mut self) -> bool {
        let Some(sphere) = self.bounding_sphere() else {
            return false;
        };
        // Orient by the first placed volume so globe-placed boxes are seen
        // from above their local horizon.
        let model = self
            .volumes
            .iter()
            .flatten()
            .find(|p| p.geometry().is_some())
            .map_or(DMat4::IDENTITY, VolumePrimitive::model_matrix);

        self.camera.up = model.transform_vector3(DVec3::Z).normalize_or(DVec3::Z);
        self.camera.set_aspect_ratio(self.engine.aspect_ratio());
        self.camera
            .look_at_sphere(&sphere, model.transform_vector3(FRAMING_DIRECTION));
        true
    }

    /// Updates every volume and draws one frame. Returns the number of draw
    /// commands executed.
    pub fn render(&mut self) -> Result<usize> {
        let mut frame = FrameState::new(self.engine.context(), self.frame_number);
        for primitive in self.volumes.iter_mut().flatten() {
            primitive.update(&mut frame)?;
        }
        let commands = frame.sorted_commands();
        self.engine.render_frame(&self.camera, &commands);
        self.frame_number += 1;
        Ok(commands.len())
    }

    /// Renders one frame and returns it as tightly packed RGBA8 rows.
    pub fn render_to_image(&mut self) -> Result<Vec<u8>> {
        self.render()?;
        Ok(self.engine.capture_frame()?)
    }

    /// Renders one frame and saves it as PNG or JPEG.
    pub fn render_to_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let data = self.render_to_image()?;
        let (width, height) = self.engine.dimensions();
        volray_render::save_image(path, &data, width, height)?;
        Ok(())
    }
}

impl Drop for Scene {
    fn drop(&mut self) {
        self.clear();
    }
}
