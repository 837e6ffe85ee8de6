use glam::{Affine3A, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::stroke::{Point3, Stroke};

/// Serializable form of the local-to-world space transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpaceTransform {
    pub translation: Vec3,
    /// Quaternion, `[x, y, z, w]`.
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for SpaceTransform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl SpaceTransform {
    /// True when every component is finite and the rotation can be normalized.
    pub fn is_valid(&self) -> bool {
        self.translation.is_finite()
            && self.scale.is_finite()
            && self.rotation.is_finite()
            && self.rotation.length_squared() > f32::EPSILON
    }

    pub fn to_affine(&self) -> Affine3A {
        Affine3A::from_scale_rotation_translation(
            self.scale,
            self.rotation.normalize(),
            self.translation,
        )
    }
}

impl From<SpaceTransform> for Affine3A {
    fn from(t: SpaceTransform) -> Self {
        t.to_affine()
    }
}

/// Per-axis scale followed by an optional affine space transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateTransform {
    axis_scale: Vec3,
    space: Option<Affine3A>,
}

impl Default for CoordinateTransform {
    fn default() -> Self {
        Self::new(Vec3::ONE, None)
    }
}

impl CoordinateTransform {
    pub fn new(axis_scale: Vec3, space: Option<Affine3A>) -> Self {
        Self { axis_scale, space }
    }

    pub fn axis_scale(&self) -> Vec3 {
        self.axis_scale
    }

    pub fn space(&self) -> Option<&Affine3A> {
        self.space.as_ref()
    }

    pub fn is_identity(&self) -> bool {
        self.axis_scale == Vec3::ONE && self.space.is_none_or(|a| a == Affine3A::IDENTITY)
    }

    #[inline]
    pub fn apply_point(&self, p: Point3) -> Point3 {
        let scaled = p * self.axis_scale;
        match &self.space {
            Some(affine) => affine.transform_point3(scaled),
            None => scaled,
        }
    }

    pub fn apply(&self, points: &[Point3]) -> Vec<Point3> {
        points.iter().map(|p| self.apply_point(*p)).collect()
    }

    pub fn apply_stroke(&self, stroke: &Stroke) -> Stroke {
        if self.is_identity() {
            return stroke.clone();
        }
        let points = self.apply(stroke.points());
        stroke.clone().with_points(points)
    }
}
