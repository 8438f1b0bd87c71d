//! CPU reference of the ray-march fragment stage.
//!
//! `shaders/ray_march.wgsl` in `volray-render` runs this same algorithm per
//! pixel. Keeping both in lockstep lets the behaviour be tested without a GPU
//! and lets callers pick surfaces on the CPU.
//!
//! All positions are in the box's local frame, where the volume occupies
//! `[-half, half]`.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::density::DensityField;
use crate::error::{Result, VolumeError};
use crate::geometry::HalfExtent;
use crate::texture::FilterMode;

/// Normalized density above which a sample counts as a surface hit.
pub const ISO_THRESHOLD: f32 = 0.6;

/// Divisor applied to the smallest per-axis unit step.
pub const STEP_DIVISOR: f32 = 200.0;

/// Distance in texture space within which a hit snaps to a face normal.
pub const FACE_EPSILON: f32 = 1e-4;

/// Central-difference offset in local units.
pub const GRADIENT_OFFSET: f32 = 0.01;

/// Hard cap on march iterations per ray.
pub const MAX_MARCH_STEPS: u32 = 4096;

/// Tunables of the march.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RayMarchParams {
    /// Iso-surface threshold on the normalized density.
    pub iso_threshold: f32,
    /// Step divisor.
    pub step_divisor: f32,
    /// Face snapping distance in texture space.
    pub face_epsilon: f32,
    /// Gradient sampling offset.
    pub gradient_offset: f32,
    /// Iteration cap.
    pub max_steps: u32,
}

impl Default for RayMarchParams {
    fn default() -> Self {
        Self {
            iso_threshold: ISO_THRESHOLD,
            step_divisor: STEP_DIVISOR,
            face_epsilon: FACE_EPSILON,
            gradient_offset: GRADIENT_OFFSET,
            max_steps: MAX_MARCH_STEPS,
        }
    }
}

impl RayMarchParams {
    /// Checks that the march is well defined.
    pub fn validate(&self) -> Result<()> {
        if !(self.iso_threshold > 0.0 && self.iso_threshold < 1.0) {
            return Err(VolumeError::InvalidOptions(format!(
                "iso_threshold must lie in (0, 1), got {}",
                self.iso_threshold
            )));
        }
        for (name, value) in [
            ("step_divisor", self.step_divisor),
            ("face_epsilon", self.face_epsilon),
            ("gradient_offset", self.gradient_offset),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(VolumeError::InvalidOptions(format!(
                    "{name} must be positive and finite, got {value}"
                )));
            }
        }
        if self.face_epsilon >= 0.5 {
            return Err(VolumeError::InvalidOptions(format!(
                "face_epsilon must be below 0.5, got {}",
                self.face_epsilon
            )));
        }
        if self.max_steps == 0 {
            return Err(VolumeError::InvalidOptions(
                "max_march_steps must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Anything that can be read like the volume texture.
pub trait DensitySampler {
    /// Returns the normalized density at texture coordinates `uvw`.
    fn density(&self, uvw: Vec3) -> f32;
}

impl<F: Fn(Vec3) -> f32> DensitySampler for F {
    fn density(&self, uvw: Vec3) -> f32 {
        self(uvw)
    }
}

/// A [`DensityField`] read with a given filter.
#[derive(Debug, Clone, Copy)]
pub struct FieldSampler<'a> {
    /// The field.
    pub field: &'a DensityField,
    /// Filter applied on lookup.
    pub filter: FilterMode,
}

impl DensitySampler for FieldSampler<'_> {
    fn density(&self, uvw: Vec3) -> f32 {
        self.field.sample(uvw, self.filter)
    }
}

/// A ray with a unit direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Origin.
    pub origin: Vec3,
    /// Unit direction.
    pub direction: Vec3,
}

impl Ray {
    /// Builds a ray, normalizing `direction`.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    /// Point at parameter `t`.
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Entry and exit distances along a ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Entry distance (may be negative when the origin is inside).
    pub t0: f32,
    /// Exit distance.
    pub t1: f32,
}

impl RayHit {
    /// True when no part of the box lies ahead of the origin.
    pub fn is_miss(&self) -> bool {
        self.t0 > self.t1 || self.t1 < 0.0
    }

    /// Entry distance clamped to the origin.
    pub fn entry(&self) -> f32 {
        self.t0.max(0.0)
    }
}

/// Maps a local position into `[0, 1]^3` texture coordinates.
pub fn to_texture_coords(p: Vec3, half: HalfExtent) -> Vec3 {
    half.to_texture_coords(p)
}

/// Replaces components smaller than `1e-8` in magnitude with `1e-8`, so
/// reciprocals stay finite.
pub fn safe_direction(direction: Vec3) -> Vec3 {
    let tiny = Vec3::splat(1e-8);
    Vec3::select(direction.abs().cmplt(tiny), tiny, direction)
}

/// Slab intersection of a ray with the box `[-half, half]`.
///
/// A ray lying in a face plane hits the low face and misses the high one.
pub fn hit_box(origin: Vec3, direction: Vec3, half: HalfExtent) -> RayHit {
    let box_min = -half.get();
    let box_max = half.get();
    let inv_dir = safe_direction(direction).recip();
    let tmin_tmp = (box_min - origin) * inv_dir;
    let tmax_tmp = (box_max - origin) * inv_dir;
    let tmin = tmin_tmp.min(tmax_tmp);
    let tmax = tmin_tmp.max(tmax_tmp);
    RayHit {
        t0: tmin.max_element(),
        t1: tmax.min_element(),
    }
}

/// Direction-adaptive step: the smallest `1/|d_i|` divided by `divisor`.
pub fn step_size(direction: Vec3, divisor: f32) -> f32 {
    safe_direction(direction).abs().recip().min_element() / divisor
}

/// Iterations needed to cover `[entry, t1]`, capped at `cap`.
pub fn max_steps(hit: RayHit, step: f32, cap: u32) -> u32 {
    if hit.is_miss() || step <= 0.0 {
        return 0;
    }
    let span = hit.t1 - hit.entry();
    ((span / step).ceil().max(0.0) as u32).min(cap)
}

/// Face axis for texture coordinates on the box boundary, if any.
///
/// Faces are tested in the order low x, low y, low z, high x, high y, high z.
pub fn face_normal(uvw: Vec3, epsilon: f32) -> Option<Vec3> {
    if uvw.x < epsilon {
        Some(Vec3::X)
    } else if uvw.y < epsilon {
        Some(Vec3::Y)
    } else if uvw.z < epsilon {
        Some(Vec3::Z)
    } else if uvw.x > 1.0 - epsilon {
        Some(Vec3::NEG_X)
    } else if uvw.y > 1.0 - epsilon {
        Some(Vec3::NEG_Y)
    } else if uvw.z > 1.0 - epsilon {
        Some(Vec3::NEG_Z)
    } else {
        None
    }
}

/// Surface normal at local position `p`.
///
/// On a face the face axis is returned without sampling; inside the volume
/// the normal is the normalized central-difference gradient pointing toward
/// lower density. A flat neighbourhood falls back to facing the viewer.
pub fn surface_normal<S: DensitySampler>(
    sampler: &S,
    p: Vec3,
    view_dir: Vec3,
    half: HalfExtent,
    params: &RayMarchParams,
) -> Vec3 {
    if let Some(n) = face_normal(half.to_texture_coords(p), params.face_epsilon) {
        return n;
    }

    let o = params.gradient_offset;
    let at = |q: Vec3| sampler.density(half.to_texture_coords(q));
    let gradient = Vec3::new(
        at(p - Vec3::X * o) - at(p + Vec3::X * o),
        at(p - Vec3::Y * o) - at(p + Vec3::Y * o),
        at(p - Vec3::Z * o) - at(p + Vec3::Z * o),
    );
    gradient.try_normalize().unwrap_or_else(|| {
        log::debug!("flat density at {p}, normal faces the viewer");
        -view_dir
    })
}

/// Colour of a surface hit.
pub fn shade(normal: Vec3, uvw: Vec3) -> Vec3 {
    (normal * 0.5 + uvw * 0.75 + Vec3::splat(0.125)).clamp(Vec3::ZERO, Vec3::ONE)
}

/// Outcome of marching one ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarchResult {
    /// The ray does not reach the box.
    Outside,
    /// The ray crossed the box without reaching the threshold.
    Miss {
        /// Iterations performed.
        steps: u32,
    },
    /// The threshold was exceeded.
    Hit {
        /// Local position of the hit sample.
        position: Vec3,
        /// Surface normal.
        normal: Vec3,
        /// Shaded colour.
        color: Vec3,
        /// Distance along the ray.
        t: f32,
        /// Iterations performed, including the hit.
        steps: u32,
    },
}

impl MarchResult {
    /// Number of samples taken.
    pub fn steps(&self) -> u32 {
        match *self {
            MarchResult::Outside => 0,
            MarchResult::Miss { steps } | MarchResult::Hit { steps, .. } => steps,
        }
    }

    /// True if a surface was found.
    pub fn is_hit(&self) -> bool {
        matches!(self, MarchResult::Hit { .. })
    }
}

/// Marches `ray` through the volume.
pub fn march<S: DensitySampler>(
    sampler: &S,
    ray: &Ray,
    half: HalfExtent,
    params: &RayMarchParams,
) -> MarchResult {
    let hit = hit_box(ray.origin, ray.direction, half);
    if hit.is_miss() {
        return MarchResult::Outside;
    }

    let delta = step_size(ray.direction, params.step_divisor);
    let count = max_steps(hit, delta, params.max_steps);
    let entry = hit.entry();

    for i in 0..count {
        let t = entry + delta * i as f32;
        let p = ray.at(t);
        let uvw = to_texture_coords(p, half);
        if sampler.density(uvw) > params.iso_threshold {
            let normal = surface_normal(sampler, p, ray.direction, half, params);
            return MarchResult::Hit {
                position: p,
                normal,
                color: shade(normal, uvw),
                t,
                steps: i + 1,
            };
        }
    }

    if count == params.max_steps {
        log::warn!("ray march stopped at the {count}-step cap");
    }
    MarchResult::Miss { steps: count }
}
