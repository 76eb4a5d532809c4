//! Spatial partitioning of static geometry.
//!
//! The physics pipeline runs three transformers in order: geometry collection
//! (bake transforms, merge faces), quad partition over the XZ plane, then a
//! BSP per quad leaf. The result is what gets written to the physics cache.

use glam::Vec3;

use crate::geometry::{Aabb, Face, Side};
use crate::scene::{BspSplit, NodeKind, SceneNode};

/// A pass that rewrites a scene subtree in place.
pub trait SceneTransformer {
    fn name(&self) -> &'static str;
    fn transform(&self, node: &mut SceneNode);
}

/// Flattens a subtree into a single geometry node holding world-space faces.
#[derive(Debug, Default, Clone, Copy)]
pub struct CollectedGeometryTransformer;

impl SceneTransformer for CollectedGeometryTransformer {
    fn name(&self) -> &'static str {
        "collected-geometry"
    }

    fn transform(&self, node: &mut SceneNode) {
        let faces = node.collect_world_faces();
        node.kind = NodeKind::Group;
        node.children.clear();
        if !faces.is_empty() {
            node.add_node(SceneNode::geometry(faces).into_ref());
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QuadTransformer {
    pub max_face_count: usize,
    pub max_quad_size: f32,
    pub max_depth: usize,
}

impl Default for QuadTransformer {
    fn default() -> Self {
        Self {
            max_face_count: 200,
            max_quad_size: 300.0,
            max_depth: 12,
        }
    }
}

impl QuadTransformer {
    pub fn with_limits(max_face_count: usize, max_quad_size: f32) -> Self {
        Self {
            max_face_count,
            max_quad_size,
            ..Self::default()
        }
    }

    fn is_leaf(&self, faces: &[Face], bounds: &Aabb, depth: usize) -> bool {
        let size = bounds.size();
        depth >= self.max_depth
            || (faces.len() <= self.max_face_count && size.x.max(size.z) <= self.max_quad_size)
    }

    fn build(&self, faces: Vec<Face>, depth: usize) -> SceneNode {
        let bounds = Aabb::from_faces(&faces);
        let mut quad = SceneNode::new(NodeKind::Quad(bounds));
        if faces.is_empty() {
            return quad;
        }
        if self.is_leaf(&faces, &bounds, depth) {
            quad.add_node(SceneNode::geometry(faces).into_ref());
            return quad;
        }

        let center = bounds.center();
        let mut buckets: [Vec<Face>; 4] = Default::default();
        let total = faces.len();
        for face in faces {
            let c = face.centroid();
            let index = usize::from(c.x >= center.x) | (usize::from(c.z >= center.z) << 1);
            buckets[index].push(face);
        }

        // All centroids in one cell: splitting further cannot make progress.
        if buckets.iter().any(|b| b.len() == total) {
            let faces = buckets.into_iter().flatten().collect();
            quad.add_node(SceneNode::geometry(faces).into_ref());
            return quad;
        }

        for bucket in buckets {
            if !bucket.is_empty() {
                quad.add_node(self.build(bucket, depth + 1).into_ref());
            }
        }
        quad
    }
}

impl SceneTransformer for QuadTransformer {
    fn name(&self) -> &'static str {
        "quad"
    }

    fn transform(&self, node: &mut SceneNode) {
        let faces = node.collect_world_faces();
        *node = self.build(faces, 0);
    }
}

/// Turns every geometry node of a subtree into a BSP tree.
///
/// Faces spanning a splitting plane are not cut; they go to the side their
/// centroid lies on.
#[derive(Debug, Clone, Copy)]
pub struct BspTransformer {
    pub max_leaf_faces: usize,
    /// Number of candidate splitters scored per node.
    pub candidates: usize,
}

impl Default for BspTransformer {
    fn default() -> Self {
        Self {
            max_leaf_faces: 4,
            candidates: 16,
        }
    }
}

impl BspTransformer {
    /// Index of the best splitting face. Zero-area faces have no plane and
    /// are never candidates.
    fn pick_splitter(&self, faces: &[Face]) -> Option<usize> {
        let candidates: Vec<usize> = (0..faces.len())
            .filter(|i| faces[*i].normal != Vec3::ZERO)
            .collect();
        let stride = (candidates.len() / self.candidates.max(1)).max(1);
        let mut best: Option<(usize, usize)> = None;
        for &index in candidates.iter().step_by(stride) {
            let plane = faces[index].plane();
            let (mut front, mut back, mut spanning) = (0usize, 0usize, 0usize);
            for face in faces {
                match plane.classify(face) {
                    Side::Front => front += 1,
                    Side::Back => back += 1,
                    Side::Spanning => spanning += 1,
                    Side::Coplanar => {}
                }
            }
            let score = front.abs_diff(back) + 3 * spanning;
            if best.map_or(true, |(best_score, _)| score < best_score) {
                best = Some((score, index));
            }
        }
        best.map(|(_, index)| index)
    }

    fn build(&self, faces: Vec<Face>) -> SceneNode {
        if faces.len() <= self.max_leaf_faces {
            return SceneNode::geometry(faces);
        }
        let Some(splitter) = self.pick_splitter(&faces) else {
            return SceneNode::geometry(faces);
        };
        let plane = faces[splitter].plane();
        let mut coplanar = Vec::new();
        let mut front = Vec::new();
        let mut back = Vec::new();
        for face in faces {
            match plane.classify(&face) {
                Side::Coplanar => coplanar.push(face),
                Side::Front => front.push(face),
                Side::Back => back.push(face),
                Side::Spanning => {
                    if plane.signed_distance(face.centroid()) >= 0.0 {
                        front.push(face);
                    } else {
                        back.push(face);
                    }
                }
            }
        }
        if front.is_empty() && back.is_empty() {
            return SceneNode::geometry(coplanar);
        }
        SceneNode::new(NodeKind::Bsp(BspSplit {
            plane,
            faces: coplanar,
        }))
        .with_child(self.build(front))
        .with_child(self.build(back))
    }

    fn convert(&self, node: &mut SceneNode) {
        for child in &node.children {
            self.convert(&mut child.borrow_mut());
        }
        if let NodeKind::Geometry(faces) = &mut node.kind {
            let faces = std::mem::take(faces);
            let tree = self.build(faces);
            if node.children.is_empty() {
                *node = tree;
            } else {
                // Bsp children are reserved for front/back.
                node.kind = NodeKind::Group;
                node.children.insert(0, tree.into_ref());
            }
        }
    }
}

impl SceneTransformer for BspTransformer {
    fn name(&self) -> &'static str {
        "bsp"
    }

    fn transform(&self, node: &mut SceneNode) {
        self.convert(node);
    }
}

/// Highest surface under `(x, z)` that is not above `max_y`.
///
/// Quad cells whose bounds miss the query column are skipped.
pub fn surface_below(node: &SceneNode, x: f32, z: f32, max_y: f32) -> Option<f32> {
    if let NodeKind::Quad(bounds) = &node.kind {
        if bounds.is_empty() || !bounds.contains_xz(x, z) {
            return None;
        }
    }
    let own = node
        .own_faces()
        .iter()
        .filter_map(|f| f.height_at(x, z))
        .filter(|h| *h <= max_y)
        .fold(None, |acc: Option<f32>, h| Some(acc.map_or(h, |a| a.max(h))));
    node.children
        .iter()
        .filter_map(|child| surface_below(&child.borrow(), x, z, max_y))
        .fold(own, |acc, h| Some(acc.map_or(h, |a| a.max(h))))
}

/// Flat grid of `n * n` quads (two triangles each) spanning `size` on XZ at
/// height `y`. Handy for tests and the demo's fallback ground.
pub fn ground_grid(n: usize, size: f32, y: f32) -> Vec<Face> {
    let step = size / n as f32;
    let mut faces = Vec::with_capacity(n * n * 2);
    for i in 0..n {
        for j in 0..n {
            let x0 = i as f32 * step;
            let z0 = j as f32 * step;
            let a = Vec3::new(x0, y, z0);
            let b = Vec3::new(x0, y, z0 + step);
            let c = Vec3::new(x0 + step, y, z0);
            let d = Vec3::new(x0 + step, y, z0 + step);
            faces.push(Face::new(a, b, c));
            faces.push(Face::new(c, b, d));
        }
    }
    faces
}
