//! File resources: search paths plus per-extension model and texture plugins.
//!
//! Loaders report failures as `Result<_, String>`; callers log and skip.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use glam::Vec3;

use crate::geometry::Face;
use crate::scene::SceneNode;

pub trait ModelPlugin {
    fn extensions(&self) -> &[&'static str];
    fn load(&self, path: &Path) -> Result<SceneNode, String>;
}

/// Decoded RGBA texture.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

pub trait TexturePlugin {
    fn extensions(&self) -> &[&'static str];
    fn load(&self, path: &Path) -> Result<TextureData, String>;
}

#[derive(Default)]
pub struct ResourceManager {
    search_paths: Vec<PathBuf>,
    model_plugins: Vec<Box<dyn ModelPlugin>>,
    texture_plugins: Vec<Box<dyn TexturePlugin>>,
}

impl ResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_path(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        log::info!("Resource directory: {}", path.display());
        self.search_paths.push(path);
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    pub fn add_model_plugin(&mut self, plugin: Box<dyn ModelPlugin>) {
        self.model_plugins.push(plugin);
    }

    pub fn add_texture_plugin(&mut self, plugin: Box<dyn TexturePlugin>) {
        self.texture_plugins.push(plugin);
    }

    pub fn plugin_count(&self) -> usize {
        self.model_plugins.len() + self.texture_plugins.len()
    }

    /// First existing match of `name` as given, then under each search path in
    /// the order they were appended.
    pub fn find(&self, name: &str) -> Option<PathBuf> {
        let direct = PathBuf::from(name);
        if direct.is_file() {
            return Some(direct);
        }
        self.search_paths
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
    }

    pub fn load_model(&self, name: &str) -> Result<SceneNode, String> {
        let ext = extension_of(name)?;
        let plugin = self
            .model_plugins
            .iter()
            .find(|p| p.extensions().contains(&ext.as_str()))
            .ok_or_else(|| format!("No model plugin for '{name}'"))?;
        let path = self
            .find(name)
            .ok_or_else(|| format!("Model '{name}' not found in resource paths"))?;
        plugin.load(&path)
    }

    pub fn load_texture(&self, name: &str) -> Result<TextureData, String> {
        let ext = extension_of(name)?;
        let plugin = self
            .texture_plugins
            .iter()
            .find(|p| p.extensions().contains(&ext.as_str()))
            .ok_or_else(|| format!("No texture plugin for '{name}'"))?;
        let path = self
            .find(name)
            .ok_or_else(|| format!("Texture '{name}' not found in resource paths"))?;
        plugin.load(&path)
    }
}

fn extension_of(name: &str) -> Result<String, String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| format!("Resource '{name}' has no file extension"))
}

/// Wavefront OBJ: `v`, `f` (polygons fan-triangulated, `v/vt/vn` indices
/// accepted, negative indices relative), `mtllib`, `usemtl`. Materials
/// contribute their `map_Kd` texture name.
#[derive(Debug, Default, Clone, Copy)]
pub struct ObjPlugin;

impl ModelPlugin for ObjPlugin {
    fn extensions(&self) -> &[&'static str] {
        &["obj"]
    }

    fn load(&self, path: &Path) -> Result<SceneNode, String> {
        let source = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read model '{}': {e}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        let faces = parse_obj(&source, |lib| {
            let lib_path = base.join(lib);
            match fs::read_to_string(&lib_path) {
                Ok(text) => parse_mtl(&text),
                Err(err) => {
                    log::warn!("Failed to read material library '{}': {err}", lib_path.display());
                    HashMap::new()
                }
            }
        })
        .map_err(|e| format!("{}: {e}", path.display()))?;
        Ok(SceneNode::geometry(faces))
    }
}

/// Material name to diffuse texture map.
pub fn parse_mtl(source: &str) -> HashMap<String, String> {
    let mut maps = HashMap::new();
    let mut current: Option<String> = None;
    for line in source.lines() {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("newmtl") => current = parts.next().map(str::to_string),
            Some("map_Kd") => {
                if let (Some(material), Some(texture)) = (&current, parts.last()) {
                    maps.insert(material.clone(), texture.to_string());
                }
            }
            _ => {}
        }
    }
    maps
}

pub fn parse_obj(
    source: &str,
    mut load_library: impl FnMut(&str) -> HashMap<String, String>,
) -> Result<Vec<Face>, String> {
    let mut positions: Vec<Vec3> = Vec::new();
    let mut materials: HashMap<String, String> = HashMap::new();
    let mut texture: Option<String> = None;
    let mut faces = Vec::new();

    for (line_no, line) in source.lines().enumerate() {
        let line = line.trim();
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("v") => {
                let coords: Vec<f32> = parts
                    .take(3)
                    .map(|p| p.parse::<f32>())
                    .collect::<Result<_, _>>()
                    .map_err(|e| format!("line {}: bad vertex: {e}", line_no + 1))?;
                if coords.len() != 3 {
                    return Err(format!("line {}: vertex needs 3 coordinates", line_no + 1));
                }
                positions.push(Vec3::new(coords[0], coords[1], coords[2]));
            }
            Some("f") => {
                let indices: Vec<usize> = parts
                    .map(|p| resolve_index(p, positions.len()))
                    .collect::<Result<_, _>>()
                    .map_err(|e| format!("line {}: {e}", line_no + 1))?;
                if indices.len() < 3 {
                    return Err(format!("line {}: face needs 3 vertices", line_no + 1));
                }
                for i in 1..indices.len() - 1 {
                    let face = Face::new(
                        positions[indices[0]],
                        positions[indices[i]],
                        positions[indices[i + 1]],
                    );
                    faces.push(face.with_texture(texture.clone()));
                }
            }
            Some("mtllib") => {
                for lib in parts {
                    materials.extend(load_library(lib));
                }
            }
            Some("usemtl") => {
                texture = parts.next().and_then(|m| materials.get(m).cloned());
            }
            _ => {}
        }
    }
    Ok(faces)
}

fn resolve_index(token: &str, count: usize) -> Result<usize, String> {
    let raw = token.split('/').next().unwrap_or(token);
    let index: i64 = raw
        .parse()
        .map_err(|_| format!("bad face index '{token}'"))?;
    let resolved = if index < 0 {
        count as i64 + index
    } else {
        index - 1
    };
    if resolved < 0 || resolved as usize >= count {
        return Err(format!("face index {index} out of range ({count} vertices)"));
    }
    Ok(resolved as usize)
}

/// TGA and PNG textures through the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImagePlugin;

impl TexturePlugin for ImagePlugin {
    fn extensions(&self) -> &[&'static str] {
        &["tga", "png"]
    }

    fn load(&self, path: &Path) -> Result<TextureData, String> {
        let image = image::open(path)
            .map_err(|e| format!("Failed to decode texture '{}': {e}", path.display()))?
            .to_rgba8();
        let (width, height) = image.dimensions();
        Ok(TextureData {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            width,
            height,
            pixels: image.into_raw(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(name_hint: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "oer_resources_test_{}_{}_{}",
            name_hint,
            std::process::id(),
            nanos
        ));
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    const QUAD_OBJ: &str = "\
# a unit quad
mtllib quad.mtl
v 0 0 0
v 1 0 0
v 1 0 1
v 0 0 1
usemtl road
f 1/1/1 4/4/1 3/3/1 2/2/1
";

    #[test]
    fn obj_polygons_are_fan_triangulated() {
        let faces = parse_obj(QUAD_OBJ, |_| HashMap::new()).expect("parse");
        assert_eq!(faces.len(), 2);
        assert_eq!(faces[1].vertices[2], Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn obj_usemtl_assigns_diffuse_map() {
        let faces = parse_obj(QUAD_OBJ, |lib| {
            assert_eq!(lib, "quad.mtl");
            parse_mtl("newmtl road\nKd 1 1 1\nmap_Kd asphalt.tga\n")
        })
        .expect("parse");
        assert!(faces
            .iter()
            .all(|f| f.texture.as_deref() == Some("asphalt.tga")));
    }

    #[test]
    fn obj_negative_indices_are_relative() {
        let faces = parse_obj("v 0 0 0\nv 1 0 0\nv 0 0 1\nf -3 -1 -2\n", |_| HashMap::new())
            .expect("parse");
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].vertices[1], Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn obj_out_of_range_index_is_error() {
        let err = parse_obj("v 0 0 0\nf 1 2 3\n", |_| HashMap::new()).expect_err("must fail");
        assert!(err.contains("line 2"));
    }

    #[test]
    fn manager_resolves_through_search_paths() {
        let dir = temp_dir("search");
        fs::write(dir.join("quad.obj"), QUAD_OBJ).expect("write obj");
        fs::write(dir.join("quad.mtl"), "newmtl road\nmap_Kd asphalt.tga\n").expect("write mtl");

        let mut manager = ResourceManager::new();
        manager.add_model_plugin(Box::new(ObjPlugin));
        manager.append_path(&dir);

        let node = manager.load_model("quad.obj").expect("load");
        assert_eq!(node.face_count(), 2);
        assert_eq!(
            node.own_faces()[0].texture.as_deref(),
            Some("asphalt.tga")
        );

        let err = manager.load_model("missing.obj").expect_err("missing model");
        assert!(err.contains("not found"));
        let err = manager.load_model("quad.3ds").expect_err("no plugin");
        assert!(err.contains("No model plugin"));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn image_plugin_decodes_png() {
        let dir = temp_dir("png");
        let path = dir.join("tile.png");
        image::RgbaImage::from_pixel(2, 3, image::Rgba([10, 20, 30, 255]))
            .save(&path)
            .expect("write png");

        let texture = ImagePlugin.load(&path).expect("decode");
        assert_eq!((texture.width, texture.height), (2, 3));
        assert_eq!(texture.pixels.len(), 2 * 3 * 4);
        assert_eq!(texture.name, "tile.png");

        let _ = fs::remove_dir_all(dir);
    }
}
