//! Interleaved vertex arrays, the representation the renderer draws from.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::geometry::Face;
use crate::scene::{NodeKind, SceneNode};

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable, Serialize, Deserialize)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// Triangle list sharing one texture.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VertexArray {
    pub texture: Option<String>,
    pub vertices: Vec<Vertex>,
}

impl VertexArray {
    pub fn triangle_count(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn to_faces(&self) -> Vec<Face> {
        self.vertices
            .chunks_exact(3)
            .map(|tri| {
                let [a, b, c] = [tri[0], tri[1], tri[2]].map(|v| Vec3::from_array(v.position));
                Face::new(a, b, c).with_texture(self.texture.clone())
            })
            .collect()
    }
}

/// Groups faces by texture into vertex arrays, keeping first-seen order.
pub fn build_vertex_arrays(faces: &[Face]) -> Vec<VertexArray> {
    let mut arrays: Vec<VertexArray> = Vec::new();
    for face in faces {
        let index = match arrays.iter().position(|a| a.texture == face.texture) {
            Some(index) => index,
            None => {
                arrays.push(VertexArray {
                    texture: face.texture.clone(),
                    vertices: Vec::with_capacity(faces.len() * 3),
                });
                arrays.len() - 1
            }
        };
        for v in face.vertices {
            arrays[index].vertices.push(Vertex {
                position: v.to_array(),
                normal: face.normal.to_array(),
            });
        }
    }
    arrays
}

/// Replaces every geometry node in a subtree with one vertex-array node per
/// texture. Transformation nodes are left in place.
#[derive(Debug, Default)]
pub struct VertexArrayTransformer {
    converted: usize,
}

impl VertexArrayTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of geometry nodes converted by the last call to `transform`.
    pub fn converted(&self) -> usize {
        self.converted
    }

    pub fn transform(&mut self, node: &mut SceneNode) {
        self.converted = 0;
        self.convert(node);
    }

    fn convert(&mut self, node: &mut SceneNode) {
        if let NodeKind::Geometry(faces) = &node.kind {
            let mut arrays = build_vertex_arrays(faces);
            self.converted += 1;
            if arrays.len() == 1 {
                node.kind = NodeKind::VertexArray(arrays.remove(0));
            } else {
                node.kind = NodeKind::Group;
                for array in arrays {
                    node.add_node(SceneNode::new(NodeKind::VertexArray(array)).into_ref());
                }
            }
        }
        for child in &node.children {
            self.convert(&mut child.borrow_mut());
        }
    }
}
