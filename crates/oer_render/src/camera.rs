use std::cell::RefCell;
use std::rc::Rc;

use glam::{Mat4, Vec3, Vec4};
use oer_core::geometry::{Aabb, Face, Plane};
use oer_core::scene::{NodeKind, SceneNode, SceneRef};

/// Projection parameters shared by cameras.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewingVolume {
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub aspect: f32,
    pub up: Vec3,
}

impl Default for ViewingVolume {
    fn default() -> Self {
        Self {
            fov_y: std::f32::consts::FRAC_PI_4,
            aspect: 4.0 / 3.0,
            up: Vec3::Y,
        }
    }
}

/// Camera that can be bound to a transformation node.
///
/// While following, position and look target are stored relative to the
/// followed node and move with it.
#[derive(Debug, Clone)]
pub struct FollowCamera {
    pub volume: ViewingVolume,
    position: Vec3,
    target: Vec3,
    follow: Option<SceneRef>,
}

impl FollowCamera {
    pub fn new(volume: ViewingVolume) -> Self {
        Self {
            volume,
            position: Vec3::ZERO,
            target: Vec3::NEG_Z,
            follow: None,
        }
    }

    fn anchor(&self) -> Mat4 {
        let Some(node) = &self.follow else {
            return Mat4::IDENTITY;
        };
        match &node.borrow().kind {
            NodeKind::Transformation(t) => Mat4::from_rotation_translation(t.rotation, t.translation),
            _ => Mat4::IDENTITY,
        }
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = self.anchor().inverse().transform_point3(position);
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.target = self.anchor().inverse().transform_point3(target);
    }

    /// Starts following `node`, keeping the current world position and target.
    pub fn follow(&mut self, node: SceneRef) {
        let position = self.position();
        let target = self.target();
        self.follow = Some(node);
        self.set_position(position);
        self.look_at(target);
    }

    pub fn unfollow(&mut self) {
        let position = self.position();
        let target = self.target();
        self.follow = None;
        self.position = position;
        self.target = target;
    }

    pub fn is_following(&self) -> bool {
        self.follow.is_some()
    }

    pub fn position(&self) -> Vec3 {
        self.anchor().transform_point3(self.position)
    }

    pub fn target(&self) -> Vec3 {
        self.anchor().transform_point3(self.target)
    }

    /// Moves position and target together, in world axes.
    pub fn translate(&mut self, delta: Vec3) {
        let position = self.position() + delta;
        let target = self.target() + delta;
        self.set_position(position);
        self.look_at(target);
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target(), self.volume.up)
    }
}

/// Perspective frustum of a camera.
#[derive(Debug, Clone)]
pub struct Frustum {
    pub camera: Rc<RefCell<FollowCamera>>,
    pub near: f32,
    pub far: f32,
    pub visualize_clipping: bool,
}

impl Frustum {
    pub fn new(camera: Rc<RefCell<FollowCamera>>, near: f32, far: f32) -> Self {
        Self {
            camera,
            near,
            far,
            visualize_clipping: false,
        }
    }

    pub fn projection_matrix(&self) -> Mat4 {
        let volume = self.camera.borrow().volume;
        Mat4::perspective_rh(volume.fov_y, volume.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.camera.borrow().view_matrix()
    }

    /// Left, right, bottom, top, near, far. Normals point inward.
    pub fn planes(&self) -> [Plane; 6] {
        let m = self.view_projection();
        let (r0, r1, r2, r3) = (m.row(0), m.row(1), m.row(2), m.row(3));
        // Depth maps to [0, 1], so the near plane is row 2 alone.
        [r3 + r0, r3 - r0, r3 + r1, r3 - r1, r2, r3 - r2].map(plane_from_row)
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes()
            .iter()
            .all(|plane| plane.signed_distance(point) >= 0.0)
    }

    /// Conservative box test: false only when the box is fully outside one plane.
    pub fn intersects(&self, bounds: &Aabb) -> bool {
        intersects_planes(&self.planes(), bounds)
    }

    /// Corner points in world space, near plane first.
    pub fn corners(&self) -> [Vec3; 8] {
        let inverse = self.view_projection().inverse();
        let mut corners = [Vec3::ZERO; 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            let x = if i & 1 == 0 { -1.0 } else { 1.0 };
            let y = if i & 2 == 0 { -1.0 } else { 1.0 };
            let z = if i & 4 == 0 { 0.0 } else { 1.0 };
            *corner = inverse.project_point3(Vec3::new(x, y, z));
        }
        corners
    }

    /// Geometry node outlining the frustum volume.
    pub fn visualization_node(&self) -> SceneNode {
        let c = self.corners();
        let quads = [
            [0, 1, 3, 2], // near
            [4, 6, 7, 5], // far
            [0, 2, 6, 4], // left
            [1, 5, 7, 3], // right
            [0, 4, 5, 1], // bottom
            [2, 3, 7, 6], // top
        ];
        let faces = quads
            .iter()
            .flat_map(|[a, b, cc, d]| {
                [Face::new(c[*a], c[*b], c[*cc]), Face::new(c[*a], c[*cc], c[*d])]
            })
            .collect();
        SceneNode::geometry(faces)
    }
}

pub fn intersects_planes(planes: &[Plane; 6], bounds: &Aabb) -> bool {
    if bounds.is_empty() {
        return false;
    }
    planes.iter().all(|plane| {
        let positive = Vec3::select(plane.normal.cmpge(Vec3::ZERO), bounds.max, bounds.min);
        plane.signed_distance(positive) >= 0.0
    })
}

fn plane_from_row(row: Vec4) -> Plane {
    let normal = row.truncate();
    let length = normal.length();
    if length == 0.0 {
        return Plane {
            normal: Vec3::Y,
            distance: f32::NEG_INFINITY,
        };
    }
    Plane {
        normal: normal / length,
        distance: -row.w / length,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oer_core::scene::Transform;

    fn camera_at(position: Vec3, target: Vec3) -> Rc<RefCell<FollowCamera>> {
        let mut camera = FollowCamera::new(ViewingVolume::default());
        camera.set_position(position);
        camera.look_at(target);
        Rc::new(RefCell::new(camera))
    }

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-3
    }

    #[test]
    fn following_camera_moves_with_node() {
        let body = SceneNode::transformation(Transform::from_translation(Vec3::new(2.0, 100.0, 2.0)))
            .into_ref();
        let mut camera = FollowCamera::new(ViewingVolume::default());
        camera.set_position(Vec3::new(-148.0, 140.0, 2.0));
        camera.look_at(Vec3::new(2.0, 70.0, 2.0));
        camera.follow(body.clone());
        assert!(approx(camera.position(), Vec3::new(-148.0, 140.0, 2.0)));

        if let NodeKind::Transformation(t) = &mut body.borrow_mut().kind {
            t.translation = Vec3::new(12.0, 100.0, 2.0);
        }
        assert!(approx(camera.position(), Vec3::new(-138.0, 140.0, 2.0)));
        assert!(approx(camera.target(), Vec3::new(12.0, 70.0, 2.0)));

        camera.unfollow();
        assert!(approx(camera.position(), Vec3::new(-138.0, 140.0, 2.0)));
    }

    #[test]
    fn frustum_classifies_points_and_boxes() {
        let frustum = Frustum::new(camera_at(Vec3::ZERO, Vec3::NEG_Z), 20.0, 3000.0);

        assert!(frustum.contains_point(Vec3::new(0.0, 0.0, -100.0)));
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, -10.0)));
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, 100.0)));
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, -4000.0)));

        let ahead = Aabb::new(Vec3::new(-5.0, -5.0, -105.0), Vec3::new(5.0, 5.0, -95.0));
        let behind = Aabb::new(Vec3::new(-5.0, -5.0, 95.0), Vec3::new(5.0, 5.0, 105.0));
        assert!(frustum.intersects(&ahead));
        assert!(!frustum.intersects(&behind));
        assert!(!frustum.intersects(&Aabb::EMPTY));
    }

    #[test]
    fn visualization_has_two_triangles_per_side() {
        let frustum = Frustum::new(camera_at(Vec3::ZERO, Vec3::NEG_Z), 20.0, 3000.0);
        let node = frustum.visualization_node();
        assert_eq!(node.face_count(), 12);
        let corners = frustum.corners();
        assert!((corners[0].z + 20.0).abs() < 0.1);
        assert!((corners[7].z + 3000.0).abs() < 5.0);
    }
}
