//! Graphviz export of scene subtrees.
//!
//! Nodes are numbered in depth-first order; edges follow child order, so the
//! two children of a BSP node appear as front then back.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use oer_core::scene::{NodeKind, SceneNode};

fn label(node: &SceneNode) -> String {
    match &node.kind {
        NodeKind::Group => "Group".to_string(),
        NodeKind::Transformation(t) => format!(
            "Transformation\\n({:.1}, {:.1}, {:.1})",
            t.translation.x, t.translation.y, t.translation.z
        ),
        NodeKind::Geometry(faces) => format!("Geometry\\n{} faces", faces.len()),
        NodeKind::VertexArray(array) => format!(
            "VertexArray\\n{} tris {}",
            array.triangle_count(),
            array.texture.as_deref().unwrap_or("-")
        ),
        NodeKind::PointLight(_) => "PointLight".to_string(),
        NodeKind::Quad(bounds) => {
            let size = bounds.size();
            format!("Quad\\n{:.0} x {:.0}", size.x, size.z)
        }
        NodeKind::Bsp(split) => format!("Bsp\\n{} coplanar", split.faces.len()),
    }
}

fn shape(node: &SceneNode) -> &'static str {
    match node.kind {
        NodeKind::Quad(_) => "box",
        NodeKind::Bsp(_) => "diamond",
        NodeKind::Geometry(_) | NodeKind::VertexArray(_) => "ellipse",
        _ => "plaintext",
    }
}

pub fn write_dot<W: Write>(root: &SceneNode, name: &str, out: &mut W) -> io::Result<()> {
    writeln!(out, "digraph {name} {{")?;
    let mut next_id = 0usize;
    write_node(root, &mut next_id, out)?;
    writeln!(out, "}}")
}

fn write_node<W: Write>(node: &SceneNode, next_id: &mut usize, out: &mut W) -> io::Result<usize> {
    let id = *next_id;
    *next_id += 1;
    writeln!(
        out,
        "  n{id} [label=\"{}\", shape={}];",
        label(node),
        shape(node)
    )?;
    let is_bsp = matches!(node.kind, NodeKind::Bsp(_));
    for (index, child) in node.children.iter().enumerate() {
        let child_id = write_node(&child.borrow(), next_id, out)?;
        if is_bsp {
            let side = if index == 0 { "front" } else { "back" };
            writeln!(out, "  n{id} -> n{child_id} [label=\"{side}\"];")?;
        } else {
            writeln!(out, "  n{id} -> n{child_id};")?;
        }
    }
    Ok(id)
}

/// Writes `root` to `<dir>/<name>.dot`.
pub fn save_dot(root: &SceneNode, name: &str, dir: &Path) -> io::Result<()> {
    let path = dir.join(format!("{name}.dot"));
    let mut out = BufWriter::new(File::create(&path)?);
    write_dot(root, name, &mut out)?;
    out.flush()?;
    log::info!("Saved {} graph to '{}'", name, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use oer_core::partition::{ground_grid, BspTransformer, SceneTransformer};

    fn dot_string(root: &SceneNode, name: &str) -> String {
        let mut out = Vec::new();
        write_dot(root, name, &mut out).expect("write to vec");
        String::from_utf8(out).expect("dot output is utf-8")
    }

    #[test]
    fn one_line_per_node_and_edge() {
        let root = SceneNode::group()
            .with_child(SceneNode::geometry(ground_grid(1, 1.0, 0.0)))
            .with_child(SceneNode::group());
        let dot = dot_string(&root, "dynamicScene");

        assert!(dot.starts_with("digraph dynamicScene {"));
        assert!(dot.trim_end().ends_with('}'));
        assert_eq!(dot.matches("[label=").count(), 3);
        assert!(dot.contains("n0 -> n1;"));
        assert!(dot.contains("n0 -> n2;"));
        assert!(dot.contains("Geometry\\n2 faces"));
    }

    #[test]
    fn bsp_edges_are_labelled_front_and_back() {
        let mut faces = ground_grid(3, 30.0, 0.0);
        faces.extend(ground_grid(3, 30.0, 10.0));
        let mut root = SceneNode::geometry(faces);
        BspTransformer::default().transform(&mut root);

        let dot = dot_string(&root, "physicScene");
        assert!(dot.contains("[label=\"front\"]"));
        assert!(dot.contains("[label=\"back\"]"));
        assert!(dot.contains("shape=diamond"));
    }

    #[test]
    fn save_dot_reports_missing_directory() {
        let dir = std::env::temp_dir().join(format!("oer_dot_missing_{}", std::process::id()));
        let err = save_dot(&SceneNode::group(), "staticScene", &dir).expect_err("no such dir");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
