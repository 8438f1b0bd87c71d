//! Box geometry hosting the volume.

use glam::{DMat4, DVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VolumeError};

/// Half of the box dimensions.
///
/// The volume occupies `[-half, half]` in model coordinates. The same vector
/// bounds the ray/box test and maps local positions into texture space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HalfExtent(pub Vec3);

impl HalfExtent {
    /// Derives the half extent from full box dimensions.
    pub fn from_dimensions(dimensions: Vec3) -> Self {
        Self(dimensions * 0.5)
    }

    /// Returns the half extent vector.
    pub fn get(self) -> Vec3 {
        self.0
    }

    /// Maps a local position into `[0, 1]^3` texture coordinates.
    pub fn to_texture_coords(self, position: Vec3) -> Vec3 {
        (position + self.0) / (2.0 * self.0)
    }

    /// Maps texture coordinates back to a local position.
    pub fn from_texture_coords(self, uvw: Vec3) -> Vec3 {
        uvw * 2.0 * self.0 - self.0
    }
}

/// Vertex attributes produced for the box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum VertexFormat {
    /// Positions only; texture coordinates are zero-filled.
    Position,
    /// Positions and per-face texture coordinates.
    #[default]
    PositionAndSt,
}

/// A sphere enclosing a primitive, used for framing and culling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingSphere {
    /// Centre in model coordinates.
    pub center: DVec3,
    /// Radius.
    pub radius: f64,
}

impl BoundingSphere {
    /// Returns the sphere enclosing this one after applying `transform`.
    pub fn transform(&self, transform: &DMat4) -> Self {
        let scale = transform
            .x_axis
            .truncate()
            .length()
            .max(transform.y_axis.truncate().length())
            .max(transform.z_axis.truncate().length());
        Self {
            center: transform.transform_point3(self.center),
            radius: self.radius * scale,
        }
    }

    /// Smallest sphere enclosing both spheres.
    pub fn union(&self, other: &Self) -> Self {
        let offset = other.center - self.center;
        let distance = offset.length();
        if distance + other.radius <= self.radius {
            return *self;
        }
        if distance + self.radius <= other.radius {
            return *other;
        }
        let radius = (distance + self.radius + other.radius) * 0.5;
        Self {
            center: self.center + offset * ((radius - self.radius) / distance),
            radius,
        }
    }
}

/// Description of an axis-aligned box centred on the origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxGeometry {
    /// Attributes to emit.
    pub vertex_format: VertexFormat,
    /// Full edge lengths along x, y and z.
    pub dimensions: Vec3,
}

/// Interleaved vertex of the box mesh.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BoxVertex {
    /// Model-space position.
    pub position: [f32; 3],
    /// Face texture coordinate.
    pub st: [f32; 2],
}

/// Triangulated box ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxMesh {
    /// 24 vertices, four per face.
    pub vertices: Vec<BoxVertex>,
    /// 36 indices, two triangles per face.
    pub indices: Vec<u16>,
}

impl BoxGeometry {
    /// Describes a box with the given edge lengths.
    pub fn from_dimensions(vertex_format: VertexFormat, dimensions: Vec3) -> Result<Self> {
        if !dimensions.is_finite() || dimensions.min_element() <= 0.0 {
            return Err(VolumeError::InvalidOptions(format!(
                "box dimensions must be positive and finite, got {dimensions}"
            )));
        }
        Ok(Self {
            vertex_format,
            dimensions,
        })
    }

    /// Returns the half extent of the box.
    pub fn half_extent(&self) -> HalfExtent {
        HalfExtent::from_dimensions(self.dimensions)
    }

    /// Returns the sphere circumscribing the box.
    pub fn bounding_sphere(&self) -> BoundingSphere {
        BoundingSphere {
            center: DVec3::ZERO,
            radius: f64::from(self.half_extent().get().length()),
        }
    }

    /// Tessellates the box.
    pub fn create_mesh(&self) -> BoxMesh {
        let h = self.half_extent().get();
        // Face order: +X, -X, +Y, -Y, +Z, -Z; corners counter-clockwise seen from outside
        let faces: [[[f32; 3]; 4]; 6] = [
            [[1.0, -1.0, -1.0], [1.0, 1.0, -1.0], [1.0, 1.0, 1.0], [1.0, -1.0, 1.0]],
            [[-1.0, -1.0, 1.0], [-1.0, 1.0, 1.0], [-1.0, 1.0, -1.0], [-1.0, -1.0, -1.0]],
            [[-1.0, 1.0, -1.0], [-1.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, -1.0]],
            [[-1.0, -1.0, 1.0], [-1.0, -1.0, -1.0], [1.0, -1.0, -1.0], [1.0, -1.0, 1.0]],
            [[-1.0, -1.0, 1.0], [1.0, -1.0, 1.0], [1.0, 1.0, 1.0], [-1.0, 1.0, 1.0]],
            [[1.0, -1.0, -1.0], [-1.0, -1.0, -1.0], [-1.0, 1.0, -1.0], [1.0, 1.0, -1.0]],
        ];
        let corner_st = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (face_idx, corners) in faces.iter().enumerate() {
            let base = (face_idx * 4) as u16;
            for (corner, st) in corners.iter().zip(corner_st) {
                let p = Vec3::from_array(*corner) * h;
                vertices.push(BoxVertex {
                    position: p.to_array(),
                    st: match self.vertex_format {
                        VertexFormat::Position => [0.0, 0.0],
                        VertexFormat::PositionAndSt => st,
                    },
                });
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        BoxMesh { vertices, indices }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_extent_texture_mapping() {
        let half = HalfExtent::from_dimensions(Vec3::new(3.0, 2.0, 1.0));
        assert_eq!(half.get(), Vec3::new(1.5, 1.0, 0.5));
        assert_eq!(half.to_texture_coords(-half.get()), Vec3::ZERO);
        assert_eq!(half.to_texture_coords(half.get()), Vec3::ONE);
        assert_eq!(half.to_texture_coords(Vec3::ZERO), Vec3::splat(0.5));
        let p = Vec3::new(0.3, -0.2, 0.1);
        assert!((half.from_texture_coords(half.to_texture_coords(p)) - p).length() < 1e-6);
    }

    #[test]
    fn test_box_mesh_counts_and_bounds() {
        let geometry =
            BoxGeometry::from_dimensions(VertexFormat::PositionAndSt, Vec3::new(3.0, 2.0, 1.0))
                .unwrap();
        let mesh = geometry.create_mesh();
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.indices.len(), 36);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()));
        for v in &mesh.vertices {
            assert!(v.position[0].abs() <= 1.5 + f32::EPSILON);
            assert!(v.position[1].abs() <= 1.0 + f32::EPSILON);
            assert!(v.position[2].abs() <= 0.5 + f32::EPSILON);
        }
    }

    #[test]
    fn test_position_only_format_zeroes_st() {
        let geometry = BoxGeometry::from_dimensions(VertexFormat::Position, Vec3::ONE).unwrap();
        assert!(geometry
            .create_mesh()
            .vertices
            .iter()
            .all(|v| v.st == [0.0, 0.0]));
    }

    #[test]
    fn test_bounding_sphere_encloses_corners() {
        let geometry =
            BoxGeometry::from_dimensions(VertexFormat::Position, Vec3::new(3.0, 2.0, 1.0)).unwrap();
        let sphere = geometry.bounding_sphere();
        let corner = DVec3::new(1.5, 1.0, 0.5);
        assert!((corner.length() - sphere.radius).abs() < 1e-6);
    }

    #[test]
    fn test_bounding_sphere_follows_transform() {
        let sphere = BoundingSphere {
            center: DVec3::ZERO,
            radius: 2.0,
        };
        let m = DMat4::from_scale_rotation_translation(
            DVec3::new(1.0, 3.0, 1.0),
            glam::DQuat::from_rotation_z(0.7),
            DVec3::new(1.0e6, 2.0e6, -5.0),
        );
        let moved = sphere.transform(&m);
        assert!((moved.center - DVec3::new(1.0e6, 2.0e6, -5.0)).length() < 1e-6);
        assert!((moved.radius - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_bounding_sphere_union() {
        let a = BoundingSphere {
            center: DVec3::ZERO,
            radius: 1.0,
        };
        let b = BoundingSphere {
            center: DVec3::new(4.0, 0.0, 0.0),
            radius: 1.0,
        };
        let both = a.union(&b);
        assert!((both.center - DVec3::new(2.0, 0.0, 0.0)).length() < 1e-12);
        assert!((both.radius - 3.0).abs() < 1e-12);

        let inner = BoundingSphere {
            center: DVec3::new(0.2, 0.0, 0.0),
            radius: 0.5,
        };
        assert_eq!(a.union(&inner), a);
        assert_eq!(inner.union(&a), a);
    }

    #[test]
    fn test_rejects_degenerate_box() {
        assert!(BoxGeometry::from_dimensions(VertexFormat::Position, Vec3::new(1.0, 0.0, 1.0))
            .is_err());
        assert!(
            BoxGeometry::from_dimensions(VertexFormat::Position, Vec3::new(f32::NAN, 1.0, 1.0))
                .is_err()
        );
    }
}
