//! Vector and transform math shared by the replica store and geometry pool

use serde::{Deserialize, Serialize};

/// A 3-component vector used for positions, rotations, scales, and normals
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub const fn one() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }

    pub const fn splat(v: f64) -> Self {
        Self::new(v, v, v)
    }

    pub fn from_array(a: [f64; 3]) -> Self {
        Self::new(a[0], a[1], a[2])
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Component-wise equality within a per-axis epsilon
    pub fn approx_eq(self, other: Vec3, eps: f64) -> bool {
        (self.x - other.x).abs() <= eps
            && (self.y - other.y).abs() <= eps
            && (self.z - other.z).abs() <= eps
    }

    pub fn degrees_to_radians(self) -> Vec3 {
        Self::new(
            self.x.to_radians(),
            self.y.to_radians(),
            self.z.to_radians(),
        )
    }

    pub fn radians_to_degrees(self) -> Vec3 {
        Self::new(self.x.to_degrees(), self.y.to_degrees(), self.z.to_degrees())
    }
}

impl std::ops::Add for Vec3 {
    type Output = Vec3;
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Default for Vec3 {
    fn default() -> Self {
        Self::zero()
    }
}

/// An explicit x/y/z point, the shape measurement endpoints use on the wire
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    pub fn distance(self, other: Point3) -> f64 {
        let d = self.to_vec3() - other.to_vec3();
        (d.x * d.x + d.y * d.y + d.z * d.z).sqrt()
    }
}

/// Replica-side transform. Rotation is stored in degrees, the wire unit;
/// conversion to radians happens once, at the geometry-pool boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    /// Euler rotation in degrees
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Transform {
    pub fn new(position: Vec3, rotation: Vec3, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Rotation converted for the geometry boundary
    pub fn rotation_radians(&self) -> Vec3 {
        self.rotation.degrees_to_radians()
    }

    /// Per-axis comparison across position, rotation, and scale
    pub fn approx_eq(&self, other: &Transform, eps: f64) -> bool {
        self.position.approx_eq(other.position, eps)
            && self.rotation.approx_eq(other.rotation, eps)
            && self.scale.approx_eq(other.scale, eps)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zero(),
            rotation: Vec3::zero(),
            scale: Vec3::one(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_approx_eq() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(1.00005, 2.0, 3.0);
        assert!(a.approx_eq(b, 1e-4));
        assert!(!a.approx_eq(b, 1e-6));
    }

    #[test]
    fn test_degree_radian_round_trip() {
        let deg = Vec3::new(90.0, -45.0, 180.0);
        let back = deg.degrees_to_radians().radians_to_degrees();
        assert!(deg.approx_eq(back, 1e-9));
    }

    #[test]
    fn test_point_distance() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(3.0, 4.0, 0.0);
        assert!((a.distance(b) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_transform_default_scale() {
        let t = Transform::default();
        assert_eq!(t.scale, Vec3::one());
    }
}
