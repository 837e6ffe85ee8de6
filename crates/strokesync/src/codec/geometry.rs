//! Fixed-width binary layout for points and colors.
//!
//! Every element is three little-endian `f32` values (12 bytes). A block has
//! no length prefix; the element count is `len / 12`. Wire values are
//! pre-scaled by the sender and divided back on decode.

use bytes::{Buf, BufMut};

use super::CodecError;
use crate::stroke::{Color3, Point3};

pub const ELEMENT_WIDTH: usize = 12;
pub const POINT_DIVISOR: f32 = 500.0;
pub const COLOR_DIVISOR: f32 = 255.0;

pub fn encode_points(points: &[Point3]) -> Vec<u8> {
    let mut out = Vec::with_capacity(points.len() * ELEMENT_WIDTH);
    for p in points {
        out.put_f32_le(p.x);
        out.put_f32_le(p.y);
        out.put_f32_le(p.z);
    }
    out
}

pub fn decode_points(bytes: &[u8], unit_scale: f32) -> Result<Vec<Point3>, CodecError> {
    check_width(bytes.len())?;

    let mut buf = bytes;
    let mut points = Vec::with_capacity(bytes.len() / ELEMENT_WIDTH);
    while buf.remaining() >= ELEMENT_WIDTH {
        points.push(read_triple(&mut buf) / unit_scale);
    }
    Ok(points)
}

pub fn encode_color(color: Color3) -> [u8; ELEMENT_WIDTH] {
    let mut out = [0u8; ELEMENT_WIDTH];
    let mut dst = &mut out[..];
    dst.put_f32_le(color.r);
    dst.put_f32_le(color.g);
    dst.put_f32_le(color.b);
    out
}

pub fn decode_color(bytes: &[u8], divisor: f32) -> Result<Color3, CodecError> {
    if bytes.len() != ELEMENT_WIDTH {
        return Err(CodecError::MalformedColor { len: bytes.len() });
    }
    let mut buf = bytes;
    Ok(Color3::from_vec3(read_triple(&mut buf) / divisor))
}

/// Multiply every point by `factor`, producing the pre-scaled wire values.
pub fn scale_points(points: &[Point3], factor: f32) -> Vec<Point3> {
    points.iter().map(|p| *p * factor).collect()
}

fn check_width(len: usize) -> Result<(), CodecError> {
    if len % ELEMENT_WIDTH != 0 {
        return Err(CodecError::MalformedGeometry {
            len,
            width: ELEMENT_WIDTH,
        });
    }
    Ok(())
}

fn read_triple(buf: &mut &[u8]) -> Point3 {
    let x = buf.get_f32_le();
    let y = buf.get_f32_le();
    let z = buf.get_f32_le();
    Point3::new(x, y, z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_point_layout_is_little_endian() {
        let bytes = encode_points(&[Vec3::new(1.0, -2.0, 0.5)]);
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[0..4], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[4..8], &(-2.0f32).to_le_bytes());
        assert_eq!(&bytes[8..12], &0.5f32.to_le_bytes());
    }

    #[test]
    fn test_decode_points_applies_divisor() {
        let wire = scale_points(&[Vec3::new(0.1, 0.2, 0.3), Vec3::ONE], POINT_DIVISOR);
        let points = decode_points(&encode_points(&wire), POINT_DIVISOR).unwrap();

        assert_eq!(points.len(), 2);
        assert!(points[0].abs_diff_eq(Vec3::new(0.1, 0.2, 0.3), 1e-6));
        assert!(points[1].abs_diff_eq(Vec3::ONE, 1e-6));
    }

    #[test]
    fn test_decode_points_rejects_partial_element() {
        let err = decode_points(&[0u8; 13], POINT_DIVISOR).unwrap_err();
        assert!(matches!(
            err,
            CodecError::MalformedGeometry { len: 13, width: 12 }
        ));
    }

    #[test]
    fn test_empty_block_is_empty_stroke() {
        assert!(decode_points(&[], POINT_DIVISOR).unwrap().is_empty());
    }

    #[test]
    fn test_color_round_trip() {
        let wire = Color3::new(255.0, 127.5, 0.0);
        let color = decode_color(&encode_color(wire), COLOR_DIVISOR).unwrap();
        assert!((color.r - 1.0).abs() < 1e-6);
        assert!((color.g - 0.5).abs() < 1e-6);
        assert_eq!(color.b, 0.0);
    }

    #[test]
    fn test_color_block_must_be_one_element() {
        let err = decode_color(&[0u8; 24], COLOR_DIVISOR).unwrap_err();
        assert!(matches!(err, CodecError::MalformedColor { len: 24 }));
        assert!(err.to_string().contains("exactly 12 bytes"));
        assert!(decode_color(&[0u8; 11], COLOR_DIVISOR).is_err());
        assert!(decode_color(&[], COLOR_DIVISOR).is_err());
    }
}
