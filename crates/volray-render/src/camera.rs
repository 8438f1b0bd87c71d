//! Double-precision camera.
//!
//! Volumes are usually placed in an Earth-fixed frame, millions of metres
//! from the origin, so everything here stays in `f64` until the final
//! model-view-projection product is cast for the GPU.

use glam::{DMat4, DVec3, Mat4};
use volray_core::BoundingSphere;

/// A perspective camera.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Camera position in world space.
    pub position: DVec3,
    /// Point the camera is looking at.
    pub target: DVec3,
    /// Up vector.
    pub up: DVec3,
    /// Vertical field of view in radians.
    pub fov: f64,
    /// Aspect ratio (width / height).
    pub aspect_ratio: f64,
    /// Near clipping plane.
    pub near: f64,
    /// Far clipping plane.
    pub far: f64,
}

impl Camera {
    /// Creates a camera three units down +Z looking at the origin.
    #[must_use]
    pub fn new(aspect_ratio: f64) -> Self {
        Self {
            position: DVec3::new(0.0, 0.0, 3.0),
            target: DVec3::ZERO,
            up: DVec3::Y,
            fov: std::f64::consts::FRAC_PI_4,
            aspect_ratio,
            near: 0.01,
            far: 1000.0,
        }
    }

    /// Sets the aspect ratio.
    pub fn set_aspect_ratio(&mut self, aspect_ratio: f64) {
        self.aspect_ratio = aspect_ratio;
    }

    /// Sets the field of view, clamped to a usable range.
    pub fn set_fov(&mut self, fov: f64) {
        self.fov = fov.clamp(0.1, std::f64::consts::PI - 0.1);
    }

    /// Field of view in degrees.
    #[must_use]
    pub fn fov_degrees(&self) -> f64 {
        self.fov.to_degrees()
    }

    /// Returns the view matrix.
    #[must_use]
    pub fn view_matrix(&self) -> DMat4 {
        DMat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Returns the projection matrix (depth in `0..1`).
    #[must_use]
    pub fn projection_matrix(&self) -> DMat4 {
        DMat4::perspective_rh(self.fov, self.aspect_ratio, self.near, self.far)
    }

    /// Returns the combined view-projection matrix.
    #[must_use]
    pub fn view_projection_matrix(&self) -> DMat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Model-view-projection for one model matrix, cast for upload.
    #[must_use]
    pub fn model_view_projection(&self, model: &DMat4) -> Mat4 {
        (self.view_projection_matrix() * *model).as_mat4()
    }

    /// Returns the camera's forward direction.
    #[must_use]
    pub fn forward(&self) -> DVec3 {
        (self.target - self.position).normalize()
    }

    /// Returns the camera's right direction.
    #[must_use]
    pub fn right(&self) -> DVec3 {
        self.forward().cross(self.up).normalize()
    }

    /// Orbits the camera around the target.
    pub fn orbit(&mut self, delta_x: f64, delta_y: f64) {
        let offset = self.position - self.target;
        let radius = offset.length();
        let up = self.up.normalize();
        let yaw = glam::DQuat::from_axis_angle(up, -delta_x);
        let mut rotated = yaw * offset;

        let right = rotated.cross(up);
        if right.length_squared() > 0.0 {
            let pitch = glam::DQuat::from_axis_angle(right.normalize(), delta_y);
            let candidate = pitch * rotated;
            // Stop short of the poles so look_at stays defined.
            if candidate.normalize().dot(up).abs() < 0.999 {
                rotated = candidate;
            }
        }

        self.position = self.target + rotated.normalize() * radius;
    }

    /// Moves toward (`delta > 0`) or away from the target.
    pub fn zoom(&mut self, delta: f64) {
        let direction = self.forward();
        let distance = (self.position - self.target).length();
        let new_distance = (distance - delta).max(self.near * 2.0);
        self.position = self.target - direction * new_distance;
    }

    /// Looks at `sphere` from along `direction`, far enough that it fills
    /// most of the view. Near and far planes follow the sphere's size.
    pub fn look_at_sphere(&mut self, sphere: &BoundingSphere, direction: DVec3) {
        let radius = sphere.radius.max(1e-6);
        let half_fov = (self.fov * 0.5).min(self.fov * 0.5 * self.aspect_ratio);
        let distance = radius / half_fov.sin() * 1.2;
        let direction = direction.try_normalize().unwrap_or(DVec3::Z);

        self.target = sphere.center;
        self.position = sphere.center + direction * distance;
        self.near = (distance - radius).max(distance * 1e-3) * 0.5;
        self.far = (distance + radius) * 2.0;

        // Keep `up` usable when viewing along it.
        if direction.cross(self.up).length_squared() < 1e-12 {
            self.up = direction.any_orthonormal_vector();
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(16.0 / 9.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_defaults() {
        let camera = Camera::default();
        assert_eq!(camera.target, DVec3::ZERO);
        assert!((camera.fov_degrees() - 45.0).abs() < 1e-9);
        assert!((camera.forward() - DVec3::NEG_Z).length() < 1e-12);
    }

    #[test]
    fn test_target_projects_to_center() {
        let camera = Camera::new(1.0);
        let clip = camera.view_projection_matrix() * camera.target.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-9);
        assert!(ndc.y.abs() < 1e-9);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn test_set_fov_clamping() {
        let mut camera = Camera::new(1.0);
        camera.set_fov(0.0);
        assert!(camera.fov >= 0.1);
        camera.set_fov(std::f64::consts::PI);
        assert!(camera.fov < std::f64::consts::PI);
    }

    #[test]
    fn test_zoom_keeps_direction() {
        let mut camera = Camera::new(1.0);
        camera.zoom(1.0);
        assert!((camera.position - DVec3::new(0.0, 0.0, 2.0)).length() < 1e-12);
        camera.zoom(100.0);
        assert!(camera.position.z > 0.0);
        assert!((camera.forward() - DVec3::NEG_Z).length() < 1e-12);
    }

    #[test]
    fn test_orbit_preserves_radius() {
        let mut camera = Camera::new(1.0);
        camera.orbit(0.7, 0.3);
        let radius = (camera.position - camera.target).length();
        assert!((radius - 3.0).abs() < 1e-9);
        assert!(camera.position.x.abs() > 0.1);
    }

    #[test]
    fn test_look_at_far_sphere_keeps_precision() {
        let center = DVec3::new(-2_500_000.0, 3_500_000.0, 4_500_000.0);
        let sphere = BoundingSphere {
            center,
            radius: 2.0,
        };
        let mut camera = Camera::new(1.0);
        camera.look_at_sphere(&sphere, center.normalize());

        assert_eq!(camera.target, center);
        let distance = (camera.position - center).length();
        assert!(distance > sphere.radius);
        assert!(camera.near < distance - sphere.radius);
        assert!(camera.far > distance + sphere.radius);

        let clip = camera.view_projection_matrix() * center.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-6 && ndc.y.abs() < 1e-6);
    }

    #[test]
    fn test_look_at_along_up_replaces_up() {
        let sphere = BoundingSphere {
            center: DVec3::ZERO,
            radius: 1.0,
        };
        let mut camera = Camera::new(1.0);
        camera.look_at_sphere(&sphere, DVec3::Y);
        assert!(camera.up.cross(DVec3::Y).length() > 0.5);
        assert!(camera.view_matrix().is_finite());
    }
}
