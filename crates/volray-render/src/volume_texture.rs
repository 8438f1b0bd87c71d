//! GPU-resident 3D textures.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use volray_core::{SamplerState, UVec3, VolumeTextureDescriptor};

use crate::device::RenderDevice;
use crate::error::{Axis, RenderError, RenderResult};

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a [`VolumeTexture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureId(u64);

impl TextureId {
    pub(crate) fn next() -> Self {
        Self(NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TextureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "texture#{}", self.0)
    }
}

/// Arguments of [`VolumeTexture::create`].
pub struct VolumeTextureOptions<'a, D: RenderDevice> {
    /// Context to allocate on. Creation fails without one.
    pub context: Option<&'a D>,
    /// Size, format and sampling.
    pub descriptor: VolumeTextureDescriptor,
    /// Initial texels, x fastest then y then z.
    pub source: Option<&'a [u8]>,
    /// Debug label.
    pub label: Option<&'a str>,
}

/// A 3D texture plus the sampler it is read with.
///
/// The size is fixed at creation. After [`destroy`](Self::destroy) every
/// operation returns [`RenderError::UseAfterDestroy`].
pub struct VolumeTexture<D: RenderDevice> {
    id: TextureId,
    descriptor: VolumeTextureDescriptor,
    label: Option<String>,
    texture: Option<D::Texture>,
    sampler: Option<D::Sampler>,
    sampler_generation: u64,
}

impl<D: RenderDevice> VolumeTexture<D> {
    /// Validates `options` and allocates the texture.
    ///
    /// Checks run in this order: context present, each dimension within
    /// `1..=max_texture_dimension_3d`, format supported, source length.
    /// Nothing is allocated unless all of them pass.
    pub fn create(options: VolumeTextureOptions<'_, D>) -> RenderResult<Self> {
        let context = options.context.ok_or(RenderError::MissingContext)?;
        let descriptor = options.descriptor;

        let max = context.limits().max_texture_dimension_3d;
        for (axis, value) in [
            (Axis::Width, descriptor.width),
            (Axis::Height, descriptor.height),
            (Axis::Depth, descriptor.depth),
        ] {
            if value == 0 || value > max {
                return Err(RenderError::InvalidDimension { axis, value, max });
            }
        }

        if !context.supports_format(descriptor.pixel_format, descriptor.pixel_datatype) {
            return Err(RenderError::UnsupportedFormat {
                format: descriptor.pixel_format,
                datatype: descriptor.pixel_datatype,
            });
        }

        if let Some(source) = options.source {
            let expected = descriptor.size_in_bytes();
            if source.len() != expected {
                return Err(RenderError::InvalidDataLength {
                    expected,
                    actual: source.len(),
                });
            }
        }

        let texture = context.create_texture_3d(&descriptor, options.source, options.label)?;
        let sampler = match context.create_sampler(descriptor.sampler) {
            Ok(sampler) => sampler,
            Err(err) => {
                context.destroy_texture(&texture);
                return Err(err);
            }
        };

        let id = TextureId::next();
        log::info!(
            "created volume texture {id} ({}x{}x{}, {:?}/{:?})",
            descriptor.width,
            descriptor.height,
            descriptor.depth,
            descriptor.pixel_format,
            descriptor.pixel_datatype
        );

        Ok(Self {
            id,
            descriptor,
            label: options.label.map(str::to_owned),
            texture: Some(texture),
            sampler: Some(sampler),
            sampler_generation: 0,
        })
    }

    /// Changes filtering without touching the texels.
    ///
    /// Setting the current state again does nothing.
    pub fn set_sampler(&mut self, context: &D, state: SamplerState) -> RenderResult<()> {
        if self.is_destroyed() {
            return Err(RenderError::UseAfterDestroy("VolumeTexture::set_sampler"));
        }
        if state == self.descriptor.sampler {
            return Ok(());
        }
        self.sampler = Some(context.create_sampler(state)?);
        self.descriptor.sampler = state;
        self.sampler_generation += 1;
        log::debug!("{} sampler changed to {state:?}", self.id);
        Ok(())
    }

    /// Releases the GPU texture.
    pub fn destroy(&mut self, context: &D) -> RenderResult<()> {
        let texture = self
            .texture
            .take()
            .ok_or(RenderError::UseAfterDestroy("VolumeTexture::destroy"))?;
        context.destroy_texture(&texture);
        self.sampler = None;
        log::info!("destroyed volume texture {}", self.id);
        Ok(())
    }

    /// Whether [`destroy`](Self::destroy) has been called.
    pub fn is_destroyed(&self) -> bool {
        self.texture.is_none()
    }

    /// The device texture.
    pub fn texture(&self) -> RenderResult<&D::Texture> {
        self.texture
            .as_ref()
            .ok_or(RenderError::UseAfterDestroy("VolumeTexture::texture"))
    }

    /// The device sampler.
    pub fn sampler(&self) -> RenderResult<&D::Sampler> {
        self.sampler
            .as_ref()
            .ok_or(RenderError::UseAfterDestroy("VolumeTexture::sampler"))
    }

    /// Identifier.
    pub fn id(&self) -> TextureId {
        self.id
    }

    /// Debug label, if any.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Texels along each axis.
    pub fn dimensions(&self) -> UVec3 {
        self.descriptor.dimensions()
    }

    /// Current descriptor, including the sampler state.
    pub fn descriptor(&self) -> &VolumeTextureDescriptor {
        &self.descriptor
    }

    /// Current filters.
    pub fn sampler_state(&self) -> SamplerState {
        self.descriptor.sampler
    }

    /// Incremented every time the sampler actually changes.
    pub fn sampler_generation(&self) -> u64 {
        self.sampler_generation
    }

    /// GPU memory held by the texels.
    pub fn size_in_bytes(&self) -> usize {
        self.descriptor.size_in_bytes()
    }
}

impl<D: RenderDevice> fmt::Debug for VolumeTexture<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VolumeTexture")
            .field("id", &self.id)
            .field("descriptor", &self.descriptor)
            .field("label", &self.label)
            .field("destroyed", &self.is_destroyed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceLimits;
    use crate::recording::RecordingDevice;
    use proptest::prelude::*;
    use volray_core::{PixelDatatype, PixelFormat};

    fn options<'a>(
        context: Option<&'a RecordingDevice>,
        dims: UVec3,
        source: Option<&'a [u8]>,
    ) -> VolumeTextureOptions<'a, RecordingDevice> {
        VolumeTextureOptions {
            context,
            descriptor: VolumeTextureDescriptor::r8(dims),
            source,
            label: Some("test volume"),
        }
    }

    #[test]
    fn test_create_unit_texture() {
        let device = RecordingDevice::new();
        let data = [200u8];
        let texture = VolumeTexture::create(options(Some(&device), UVec3::ONE, Some(&data))).unwrap();
        assert_eq!(texture.dimensions(), UVec3::ONE);
        assert_eq!(texture.size_in_bytes(), 1);
        assert_eq!(texture.label(), Some("test volume"));
        assert_eq!(device.counts().textures_created, 1);
        assert_eq!(device.counts().bytes_uploaded, 1);
    }

    #[test]
    fn test_zero_width_is_rejected() {
        let device = RecordingDevice::new();
        let err = VolumeTexture::create(options(Some(&device), UVec3::new(0, 1, 1), None))
            .unwrap_err();
        assert!(matches!(
            err,
            RenderError::InvalidDimension {
                axis: Axis::Width,
                value: 0,
                ..
            }
        ));
        assert_eq!(device.counts().textures_created, 0);
    }

    #[test]
    fn test_dimension_above_limit_is_rejected() {
        let device = RecordingDevice::new();
        let max = device.limits().max_texture_dimension_3d;
        let err = VolumeTexture::create(options(Some(&device), UVec3::new(max + 1, 1, 1), None))
            .unwrap_err();
        assert!(matches!(
            err,
            RenderError::InvalidDimension { axis: Axis::Width, value, max: m } if value == max + 1 && m == max
        ));

        let err = VolumeTexture::create(options(Some(&device), UVec3::new(1, 1, max + 1), None))
            .unwrap_err();
        assert!(matches!(
            err,
            RenderError::InvalidDimension {
                axis: Axis::Depth,
                ..
            }
        ));
        assert_eq!(device.counts().textures_created, 0);
    }

    #[test]
    fn test_missing_context_is_checked_first() {
        let err = VolumeTexture::<RecordingDevice>::create(options(None, UVec3::ZERO, None))
            .unwrap_err();
        assert!(matches!(err, RenderError::MissingContext));
    }

    #[test]
    fn test_unsupported_format() {
        let device = RecordingDevice::new();
        let mut desc = VolumeTextureDescriptor::r8(UVec3::splat(2));
        desc.pixel_format = PixelFormat::Red;
        desc.pixel_datatype = PixelDatatype::Float;
        let err = VolumeTexture::create(VolumeTextureOptions {
            context: Some(&device),
            descriptor: desc,
            source: None,
            label: None,
        })
        .unwrap_err();
        assert!(matches!(err, RenderError::UnsupportedFormat { .. }));

        let float_device = RecordingDevice::new().with_float32_filterable(true);
        VolumeTexture::create(VolumeTextureOptions {
            context: Some(&float_device),
            descriptor: desc,
            source: None,
            label: None,
        })
        .unwrap();
    }

    #[test]
    fn test_data_length_must_match() {
        let device = RecordingDevice::new();
        let data = vec![0u8; 511];
        let err = VolumeTexture::create(options(Some(&device), UVec3::splat(8), Some(&data)))
            .unwrap_err();
        assert!(matches!(
            err,
            RenderError::InvalidDataLength {
                expected: 512,
                actual: 511
            }
        ));
        assert_eq!(device.counts().textures_created, 0);
    }

    #[test]
    fn test_set_sampler_is_idempotent() {
        let device = RecordingDevice::new();
        let mut texture = VolumeTexture::create(options(Some(&device), UVec3::ONE, None)).unwrap();
        let samplers = device.counts().samplers_created;

        texture.set_sampler(&device, SamplerState::NEAREST).unwrap();
        assert_eq!(texture.sampler_generation(), 0);
        assert_eq!(device.counts().samplers_created, samplers);

        texture.set_sampler(&device, SamplerState::LINEAR).unwrap();
        texture.set_sampler(&device, SamplerState::LINEAR).unwrap();
        assert_eq!(texture.sampler_generation(), 1);
        assert_eq!(texture.sampler_state(), SamplerState::LINEAR);
        assert_eq!(device.counts().samplers_created, samplers + 1);
        assert_eq!(device.counts().textures_created, 1);
    }

    #[test]
    fn test_operations_after_destroy_fail() {
        let device = RecordingDevice::new();
        let mut texture = VolumeTexture::create(options(Some(&device), UVec3::ONE, None)).unwrap();
        texture.destroy(&device).unwrap();

        assert!(texture.is_destroyed());
        assert_eq!(device.counts().textures_destroyed, 1);
        assert!(matches!(
            texture.set_sampler(&device, SamplerState::LINEAR),
            Err(RenderError::UseAfterDestroy(_))
        ));
        assert!(matches!(
            texture.destroy(&device),
            Err(RenderError::UseAfterDestroy(_))
        ));
        assert!(matches!(texture.texture(), Err(RenderError::UseAfterDestroy(_))));
        assert!(matches!(texture.sampler(), Err(RenderError::UseAfterDestroy(_))));
        assert_eq!(device.counts().textures_destroyed, 1);
    }

    #[test]
    fn test_ids_are_unique() {
        let device = RecordingDevice::new();
        let a = VolumeTexture::create(options(Some(&device), UVec3::ONE, None)).unwrap();
        let b = VolumeTexture::create(options(Some(&device), UVec3::ONE, None)).unwrap();
        assert_ne!(a.id(), b.id());
    }

    proptest! {
        #[test]
        fn prop_dimensions_within_limit_are_accepted(
            width in 0u32..20, height in 0u32..20, depth in 0u32..20, max in 1u32..16
        ) {
            let device = RecordingDevice::new().with_limits(DeviceLimits {
                max_texture_dimension_3d: max,
            });
            let dims = UVec3::new(width, height, depth);
            let valid = dims.min_element() >= 1 && dims.max_element() <= max;
            let result = VolumeTexture::create(options(Some(&device), dims, None));
            match result {
                Ok(texture) => {
                    prop_assert!(valid);
                    prop_assert_eq!(texture.dimensions(), dims);
                }
                Err(RenderError::InvalidDimension { value, .. }) => {
                    prop_assert!(!valid);
                    prop_assert!(value == 0 || value > max);
                }
                Err(e) => prop_assert!(false, "unexpected error {}", e),
            }
            prop_assert_eq!(device.counts().textures_created, usize::from(valid));
        }
    }
}
