//! Scene graph.
//!
//! Nodes are shared through [`SceneRef`] handles so that one transformation
//! node can be attached to the scene, driven by a rigid body, and followed by
//! a camera at the same time. The tree is serializable (each `Rc` is written
//! as its value), which is what the physics scene cache relies on.

use std::cell::RefCell;
use std::rc::Rc;

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::geometry::{Aabb, Face, Plane};
use crate::vertex::VertexArray;

pub type SceneRef = Rc<RefCell<SceneNode>>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::default()
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointLight {
    pub constant_attenuation: f32,
    pub linear_attenuation: f32,
    pub quadratic_attenuation: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            constant_attenuation: 1.0,
            linear_attenuation: 0.0,
            quadratic_attenuation: 0.0,
        }
    }
}

/// Inner node of a BSP tree. Children are ordered front, back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BspSplit {
    pub plane: Plane,
    pub faces: Vec<Face>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NodeKind {
    Group,
    Transformation(Transform),
    Geometry(Vec<Face>),
    VertexArray(VertexArray),
    PointLight(PointLight),
    /// Quad-tree cell; the bounds cover every face below it.
    Quad(Aabb),
    Bsp(BspSplit),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneNode {
    pub kind: NodeKind,
    pub children: Vec<SceneRef>,
}

impl SceneNode {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            children: Vec::new(),
        }
    }

    pub fn group() -> Self {
        Self::new(NodeKind::Group)
    }

    pub fn geometry(faces: Vec<Face>) -> Self {
        Self::new(NodeKind::Geometry(faces))
    }

    pub fn transformation(transform: Transform) -> Self {
        Self::new(NodeKind::Transformation(transform))
    }

    pub fn into_ref(self) -> SceneRef {
        Rc::new(RefCell::new(self))
    }

    pub fn add_node(&mut self, child: SceneRef) {
        self.children.push(child);
    }

    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child.into_ref());
        self
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            NodeKind::Group => "Group",
            NodeKind::Transformation(_) => "Transformation",
            NodeKind::Geometry(_) => "Geometry",
            NodeKind::VertexArray(_) => "VertexArray",
            NodeKind::PointLight(_) => "PointLight",
            NodeKind::Quad(_) => "Quad",
            NodeKind::Bsp(_) => "Bsp",
        }
    }

    /// Faces stored directly on this node, in local space.
    pub fn own_faces(&self) -> Vec<Face> {
        match &self.kind {
            NodeKind::Geometry(faces) => faces.clone(),
            NodeKind::Bsp(split) => split.faces.clone(),
            NodeKind::VertexArray(array) => array.to_faces(),
            _ => Vec::new(),
        }
    }

    pub fn own_face_count(&self) -> usize {
        match &self.kind {
            NodeKind::Geometry(faces) => faces.len(),
            NodeKind::Bsp(split) => split.faces.len(),
            NodeKind::VertexArray(array) => array.triangle_count(),
            _ => 0,
        }
    }

    /// Local transform contributed by this node.
    pub fn local_matrix(&self) -> Mat4 {
        match &self.kind {
            NodeKind::Transformation(transform) => transform.matrix(),
            _ => Mat4::IDENTITY,
        }
    }

    /// Walks the subtree depth-first, parents before children.
    pub fn visit(&self, f: &mut dyn FnMut(&SceneNode, usize)) {
        self.visit_at(0, f);
    }

    fn visit_at(&self, depth: usize, f: &mut dyn FnMut(&SceneNode, usize)) {
        f(self, depth);
        for child in &self.children {
            child.borrow().visit_at(depth + 1, f);
        }
    }

    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.visit(&mut |_, _| count += 1);
        count
    }

    pub fn face_count(&self) -> usize {
        let mut count = 0;
        self.visit(&mut |node, _| count += node.own_face_count());
        count
    }

    /// Every face of the subtree with transformation nodes baked in.
    pub fn collect_world_faces(&self) -> Vec<Face> {
        let mut out = Vec::new();
        self.collect_into(Mat4::IDENTITY, &mut out);
        out
    }

    fn collect_into(&self, parent: Mat4, out: &mut Vec<Face>) {
        let world = parent * self.local_matrix();
        if world == Mat4::IDENTITY {
            out.extend(self.own_faces());
        } else {
            out.extend(self.own_faces().iter().map(|f| f.transformed(&world)));
        }
        for child in &self.children {
            child.borrow().collect_into(world, out);
        }
    }

    /// Depth-first `(depth, kind, face count)` listing, used to compare trees.
    pub fn outline(&self) -> Vec<(usize, &'static str, usize)> {
        let mut out = Vec::new();
        self.visit(&mut |node, depth| {
            out.push((depth, node.kind_name(), node.own_face_count()));
        });
        out
    }
}

impl Default for SceneNode {
    fn default() -> Self {
        Self::group()
    }
}
