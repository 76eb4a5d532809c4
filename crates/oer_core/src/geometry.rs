//! Triangle geometry shared by the scene graph, the partition transformers and
//! the physics ground query.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Distance under which a point is treated as lying on a plane.
pub const PLANE_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub vertices: [Vec3; 3],
    pub normal: Vec3,
    /// Diffuse texture path resolved by the model loader, if any.
    #[serde(default)]
    pub texture: Option<String>,
}

impl Face {
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self {
            vertices: [a, b, c],
            normal: (b - a).cross(c - a).normalize_or_zero(),
            texture: None,
        }
    }

    pub fn with_texture(mut self, texture: Option<String>) -> Self {
        self.texture = texture;
        self
    }

    pub fn centroid(&self) -> Vec3 {
        (self.vertices[0] + self.vertices[1] + self.vertices[2]) / 3.0
    }

    pub fn plane(&self) -> Plane {
        Plane::from_point_normal(self.vertices[0], self.normal)
    }

    pub fn bounds(&self) -> Aabb {
        let mut aabb = Aabb::EMPTY;
        for v in self.vertices {
            aabb.extend(v);
        }
        aabb
    }

    /// Returns a copy of the face with every vertex moved by `transform`.
    pub fn transformed(&self, transform: &Mat4) -> Face {
        let [a, b, c] = self.vertices.map(|v| transform.transform_point3(v));
        Face::new(a, b, c).with_texture(self.texture.clone())
    }

    /// Height of the triangle surface directly above or below `(x, z)`.
    ///
    /// Returns `None` when the point falls outside the triangle's XZ
    /// projection or the triangle is vertical.
    pub fn height_at(&self, x: f32, z: f32) -> Option<f32> {
        let [a, b, c] = self.vertices;
        let det = (b.z - c.z) * (a.x - c.x) + (c.x - b.x) * (a.z - c.z);
        if det.abs() < PLANE_EPSILON {
            return None;
        }
        let l1 = ((b.z - c.z) * (x - c.x) + (c.x - b.x) * (z - c.z)) / det;
        let l2 = ((c.z - a.z) * (x - c.x) + (a.x - c.x) * (z - c.z)) / det;
        let l3 = 1.0 - l1 - l2;
        let inside = -PLANE_EPSILON;
        if l1 < inside || l2 < inside || l3 < inside {
            return None;
        }
        Some(l1 * a.y + l2 * b.y + l3 * c.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const EMPTY: Aabb = Aabb {
        min: Vec3::splat(f32::MAX),
        max: Vec3::splat(f32::MIN),
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_faces(faces: &[Face]) -> Self {
        faces
            .iter()
            .fold(Aabb::EMPTY, |acc, face| acc.merge(face.bounds()))
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn extend(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn merge(self, other: Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.max - self.min
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn contains_xz(&self, x: f32, z: f32) -> bool {
        x >= self.min.x && x <= self.max.x && z >= self.min.z && z <= self.max.z
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Aabb::EMPTY
    }
}

/// Plane in `normal . p = distance` form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Front,
    Back,
    Coplanar,
    Spanning,
}

impl Plane {
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        Self {
            normal,
            distance: normal.dot(point),
        }
    }

    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) - self.distance
    }

    pub fn classify(&self, face: &Face) -> Side {
        let mut front = 0;
        let mut back = 0;
        for v in face.vertices {
            let d = self.signed_distance(v);
            if d > PLANE_EPSILON {
                front += 1;
            } else if d < -PLANE_EPSILON {
                back += 1;
            }
        }
        match (front, back) {
            (0, 0) => Side::Coplanar,
            (_, 0) => Side::Front,
            (0, _) => Side::Back,
            _ => Side::Spanning,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ground_face() -> Face {
        Face::new(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::new(10.0, 0.0, 0.0),
        )
    }

    #[test]
    fn normal_follows_winding() {
        let face = ground_face();
        assert!((face.normal - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn height_at_inside_and_outside() {
        let mut face = ground_face();
        for v in &mut face.vertices {
            v.y += 3.0;
        }
        let height = face.height_at(1.0, 1.0).expect("point lies inside the triangle");
        assert!((height - 3.0).abs() < 1e-4);
        assert_eq!(face.height_at(9.0, 9.0), None);
    }

    #[test]
    fn classify_reports_each_side() {
        let plane = Plane::from_point_normal(Vec3::ZERO, Vec3::Y);
        let above = Face::new(Vec3::Y, Vec3::new(0.0, 1.0, 1.0), Vec3::new(1.0, 1.0, 0.0));
        let below = Face::new(-Vec3::Y, Vec3::new(0.0, -1.0, 1.0), Vec3::new(1.0, -1.0, 0.0));
        let across = Face::new(-Vec3::Y, Vec3::Y, Vec3::X);
        assert_eq!(plane.classify(&above), Side::Front);
        assert_eq!(plane.classify(&below), Side::Back);
        assert_eq!(plane.classify(&ground_face()), Side::Coplanar);
        assert_eq!(plane.classify(&across), Side::Spanning);
    }

    #[test]
    fn empty_aabb_has_zero_size() {
        assert!(Aabb::EMPTY.is_empty());
        assert_eq!(Aabb::EMPTY.size(), Vec3::ZERO);
        let bounds = Aabb::from_faces(&[ground_face()]);
        assert_eq!(bounds.size(), Vec3::new(10.0, 0.0, 10.0));
    }
}
