//! Placement of primitives on the WGS84 ellipsoid.

use glam::{DMat4, DVec3, DVec4};

/// WGS84 semi-major and semi-minor radii in metres.
pub const WGS84_RADII: DVec3 = DVec3::new(6_378_137.0, 6_378_137.0, 6_356_752.314_245_179);

/// Converts geodetic degrees and a height above the ellipsoid to Earth-fixed
/// cartesian coordinates.
pub fn cartesian_from_degrees(longitude: f64, latitude: f64, height: f64) -> DVec3 {
    let lon = longitude.to_radians();
    let lat = latitude.to_radians();
    let cos_lat = lat.cos();
    let n = DVec3::new(cos_lat * lon.cos(), cos_lat * lon.sin(), lat.sin()).normalize();
    let k = WGS84_RADII * WGS84_RADII * n;
    let gamma = n.dot(k).sqrt();
    k / gamma + n * height
}

/// Returns the local east-north-up frame at `origin` as a model matrix.
///
/// Columns are east, north, up and the origin itself.
pub fn east_north_up_to_fixed_frame(origin: DVec3) -> DMat4 {
    let up = (origin / (WGS84_RADII * WGS84_RADII)).normalize_or(DVec3::Z);
    let east = DVec3::new(-origin.y, origin.x, 0.0).normalize_or(DVec3::X);
    let north = up.cross(east);
    DMat4::from_cols(
        east.extend(0.0),
        north.extend(0.0),
        up.extend(0.0),
        DVec4::new(origin.x, origin.y, origin.z, 1.0),
    )
}
