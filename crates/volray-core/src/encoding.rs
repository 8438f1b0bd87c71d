//! Splitting double-precision positions into two single-precision parts.
//!
//! At planetary scale a camera position does not fit in an `f32` without losing
//! centimetres. The vertex stage rebuilds it as `high + low`, where `high` holds
//! multiples of 65536 and `low` the remainder, both exactly representable.

use glam::{DVec3, Vec3};

const ENCODE_UNIT: f64 = 65536.0;

/// A vector stored as the sum of two `f32` vectors.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EncodedVec3 {
    /// Coarse part, a multiple of 65536 per component.
    pub high: Vec3,
    /// Fine remainder.
    pub low: Vec3,
}

impl EncodedVec3 {
    /// Encodes a double-precision vector.
    pub fn encode(value: DVec3) -> Self {
        let (hx, lx) = encode_scalar(value.x);
        let (hy, ly) = encode_scalar(value.y);
        let (hz, lz) = encode_scalar(value.z);
        Self {
            high: Vec3::new(hx, hy, hz),
            low: Vec3::new(lx, ly, lz),
        }
    }

    /// Reassembles the vector in double precision.
    pub fn decode(&self) -> DVec3 {
        self.high.as_dvec3() + self.low.as_dvec3()
    }
}

fn encode_scalar(value: f64) -> (f32, f32) {
    let high = if value >= 0.0 {
        (value / ENCODE_UNIT).floor() * ENCODE_UNIT
    } else {
        -((-value / ENCODE_UNIT).floor() * ENCODE_UNIT)
    };
    (high as f32, (value - high) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_values_have_zero_high_part() {
        let e = EncodedVec3::encode(DVec3::new(1.5, -2.25, 100.0));
        assert_eq!(e.high, Vec3::ZERO);
        assert_eq!(e.low, Vec3::new(1.5, -2.25, 100.0));
    }

    #[test]
    fn test_planetary_values_keep_precision() {
        let p = DVec3::new(-2_580_123.456, 3_712_456.789, 4_550_001.125);
        let e = EncodedVec3::encode(p);
        assert!((e.decode() - p).abs().max_element() < 1e-2);
        // A plain f32 cast loses more than that.
        assert!((p.as_vec3().as_dvec3() - p).abs().max_element() > 1e-2);
        assert_eq!(e.high.x % 65536.0, 0.0);
    }
}
