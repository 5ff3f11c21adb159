//! Rigid transforms and a small frame graph.
//!
//! Provides [`Quaternion`] rotation, [`Transform3D`] composition and
//! inversion, and a [`FrameTree`] that resolves the pose of one named frame
//! relative to another by breadth-first search over registered edges.
//!
//! Vectors are [`Vector3`] from `motum-types`, so geometric messages taken
//! straight from a motion request can be transformed without conversion.

use std::collections::{HashMap, HashSet, VecDeque};

use motum_types::Vector3;

// ────────────────────────────────────────────────────────────────────────────
// Quaternion
// ────────────────────────────────────────────────────────────────────────────

/// A unit quaternion `w + xi + yj + zk`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    pub const fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    pub const fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Rotation of `angle` radians about `axis`.  A zero axis yields identity.
    pub fn from_axis_angle(axis: Vector3, angle: f64) -> Self {
        match axis.normalized() {
            Some(a) => {
                let (s, c) = (angle / 2.0).sin_cos();
                Self::new(c, a.x * s, a.y * s, a.z * s)
            }
            None => Self::identity(),
        }
    }

    /// Hamilton product `self * rhs`.
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
    }

    /// Conjugate (== inverse for a unit quaternion).
    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Rotate a vector: p' = q * p * q*.
    pub fn rotate(self, v: Vector3) -> Vector3 {
        let p = Self::new(0.0, v.x, v.y, v.z);
        let rotated = self.mul(p).mul(self.conjugate());
        Vector3::new(rotated.x, rotated.y, rotated.z)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Transform3D
// ────────────────────────────────────────────────────────────────────────────

/// Pose of frame B in frame A: a point in B maps into A by rotating with
/// `rotation` then adding `translation`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform3D {
    pub translation: Vector3,
    pub rotation: Quaternion,
}

impl Transform3D {
    pub fn new(translation: Vector3, rotation: Quaternion) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    pub fn identity() -> Self {
        Self::new(Vector3::zero(), Quaternion::identity())
    }

    pub fn from_translation(translation: Vector3) -> Self {
        Self::new(translation, Quaternion::identity())
    }

    /// T_A_B ∘ T_B_C = T_A_C.
    pub fn compose(self, other: Self) -> Self {
        let translated = self.translation.add(self.rotation.rotate(other.translation));
        Self::new(translated, self.rotation.mul(other.rotation))
    }

    /// T_A_B → T_B_A.
    pub fn inverse(self) -> Self {
        let inv = self.rotation.conjugate();
        Self::new(inv.rotate(self.translation).scale(-1.0), inv)
    }

    pub fn transform_point(self, p: Vector3) -> Vector3 {
        self.translation.add(self.rotation.rotate(p))
    }

    pub fn transform_vector(self, v: Vector3) -> Vector3 {
        self.rotation.rotate(v)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// FrameTree
// ────────────────────────────────────────────────────────────────────────────

/// Named frames connected by static transforms.
///
/// [`FrameTree::set_transform`] stores the edge in both directions, so
/// [`FrameTree::lookup`] can walk the graph either way.
#[derive(Debug, Default, Clone)]
pub struct FrameTree {
    /// `edges[from][to]` = pose of `to` in `from`.
    edges: HashMap<String, HashMap<String, Transform3D>>,
}

impl FrameTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or update the pose of `child_frame` in `parent_frame`.
    pub fn set_transform(&mut self, parent_frame: &str, child_frame: &str, transform: Transform3D) {
        self.edges
            .entry(parent_frame.to_string())
            .or_default()
            .insert(child_frame.to_string(), transform);
        self.edges
            .entry(child_frame.to_string())
            .or_default()
            .insert(parent_frame.to_string(), transform.inverse());
    }

    pub fn contains(&self, frame: &str) -> bool {
        self.edges.contains_key(frame)
    }

    /// Pose of `target_frame` in `source_frame`, or `None` when unconnected.
    pub fn lookup(&self, source_frame: &str, target_frame: &str) -> Option<Transform3D> {
        if source_frame == target_frame {
            return Some(Transform3D::identity());
        }

        let mut queue: VecDeque<(String, Transform3D)> = VecDeque::new();
        let mut visited: HashSet<String> = HashSet::new();

        queue.push_back((source_frame.to_string(), Transform3D::identity()));
        visited.insert(source_frame.to_string());

        while let Some((current, accumulated)) = queue.pop_front() {
            if let Some(neighbours) = self.edges.get(&current) {
                for (next, edge_tf) in neighbours {
                    if visited.contains(next) {
                        continue;
                    }
                    let composed = accumulated.compose(*edge_tf);
                    if next == target_frame {
                        return Some(composed);
                    }
                    visited.insert(next.clone());
                    queue.push_back((next.clone(), composed));
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_1_SQRT_2, FRAC_PI_2};

    fn close(a: Vector3, b: Vector3) -> bool {
        a.sub(b).norm() < 1e-9
    }

    #[test]
    fn axis_angle_quarter_turn_about_z_maps_x_to_y() {
        let q = Quaternion::from_axis_angle(Vector3::new(0.0, 0.0, 2.0), FRAC_PI_2);
        assert!((q.w - FRAC_1_SQRT_2).abs() < 1e-12);
        assert!(close(q.rotate(Vector3::new(1.0, 0.0, 0.0)), Vector3::new(0.0, 1.0, 0.0)));
    }

    #[test]
    fn zero_axis_is_identity() {
        assert_eq!(Quaternion::from_axis_angle(Vector3::zero(), 1.0), Quaternion::identity());
    }

    #[test]
    fn inverse_undoes_compose() {
        let t = Transform3D::new(
            Vector3::new(1.0, 2.0, 3.0),
            Quaternion::from_axis_angle(Vector3::new(1.0, 1.0, 0.0), 0.7),
        );
        let round = t.compose(t.inverse());
        assert!(close(round.translation, Vector3::zero()));
        let p = Vector3::new(-0.3, 0.4, 2.0);
        assert!(close(t.inverse().transform_point(t.transform_point(p)), p));
    }

    #[test]
    fn lookup_walks_edges_backwards() {
        let mut tree = FrameTree::new();
        tree.set_transform(
            "map",
            "base_link",
            Transform3D::from_translation(Vector3::new(1.0, 0.0, 0.0)),
        );
        tree.set_transform(
            "base_link",
            "camera",
            Transform3D::from_translation(Vector3::new(0.0, 0.5, 0.0)),
        );
        let t = tree.lookup("camera", "map").unwrap();
        assert!(close(t.translation, Vector3::new(-1.0, -0.5, 0.0)));
        assert!(tree.lookup("map", "ghost").is_none());
        assert!(tree.contains("camera"));
    }

    #[test]
    fn lookup_respects_rotation_in_chain() {
        let q90z = Quaternion::new(FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2);
        let mut tree = FrameTree::new();
        tree.set_transform("world", "base", Transform3D::new(Vector3::zero(), q90z));
        tree.set_transform(
            "base",
            "tool",
            Transform3D::from_translation(Vector3::new(1.0, 0.0, 0.0)),
        );
        let t = tree.lookup("world", "tool").unwrap();
        assert!(close(t.translation, Vector3::new(0.0, 1.0, 0.0)));
    }
}
