//! Plain geometric messages embedded in constraint and monitor parameters.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A 3-D vector (or point) in metres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Vector3 {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Vector3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    pub fn scale(self, s: f64) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }

    pub fn dot(self, rhs: Self) -> f64 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    pub fn norm(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction, or `None` for a (near) zero vector.
    pub fn normalized(self) -> Option<Self> {
        let n = self.norm();
        if n < 1e-12 { None } else { Some(self.scale(1.0 / n)) }
    }

    pub fn as_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// A point expressed in a named reference frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PointStamped {
    pub frame_id: String,
    pub point: Vector3,
}

/// A free vector (direction) expressed in a named reference frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Vector3Stamped {
    pub frame_id: String,
    pub vector: Vector3,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_zero_vector_is_none() {
        assert!(Vector3::zero().normalized().is_none());
        let n = Vector3::new(3.0, 0.0, 4.0).normalized().unwrap();
        assert!((n.norm() - 1.0).abs() < 1e-12);
        assert!((n.x - 0.6).abs() < 1e-12);
    }

    #[test]
    fn point_stamped_rejects_unknown_fields() {
        let err = serde_json::from_str::<PointStamped>(
            r#"{"frame_id":"map","point":{"x":1.0},"pose":{}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("pose"));
    }

    #[test]
    fn missing_coordinates_default_to_zero() {
        let p: PointStamped =
            serde_json::from_str(r#"{"frame_id":"map","point":{"x":1.5}}"#).unwrap();
        assert_eq!(p.point, Vector3::new(1.5, 0.0, 0.0));
    }
}
