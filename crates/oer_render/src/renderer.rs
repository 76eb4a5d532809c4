use std::collections::BTreeMap;
use std::rc::Rc;

use oer_core::engine::{Module, ProcessArg};
use oer_core::resources::{ResourceManager, TextureData};
use oer_core::scene::{NodeKind, SceneNode, SceneRef};

use crate::view::{DrawList, RenderingView};

/// Work run once over the scene when the renderer initializes.
pub trait RenderTask {
    fn name(&self) -> &'static str;
    fn run(&mut self, root: &SceneNode) -> Result<(), String>;
}

/// Loads every texture referenced by the scene, once per name.
pub struct TextureLoader {
    resources: Rc<ResourceManager>,
    textures: BTreeMap<String, TextureData>,
    failed: Vec<String>,
}

impl TextureLoader {
    pub fn new(resources: Rc<ResourceManager>) -> Self {
        Self {
            resources,
            textures: BTreeMap::new(),
            failed: Vec::new(),
        }
    }

    pub fn texture(&self, name: &str) -> Option<&TextureData> {
        self.textures.get(name)
    }

    pub fn loaded_count(&self) -> usize {
        self.textures.len()
    }

    pub fn failed(&self) -> &[String] {
        &self.failed
    }
}

fn referenced_textures(root: &SceneNode) -> Vec<String> {
    let mut names = Vec::new();
    root.visit(&mut |node, _| {
        let textures: Vec<Option<String>> = match &node.kind {
            NodeKind::VertexArray(array) => vec![array.texture.clone()],
            NodeKind::Geometry(faces) => faces.iter().map(|f| f.texture.clone()).collect(),
            _ => Vec::new(),
        };
        for name in textures.into_iter().flatten() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    });
    names
}

impl RenderTask for TextureLoader {
    fn name(&self) -> &'static str {
        "texture-loader"
    }

    fn run(&mut self, root: &SceneNode) -> Result<(), String> {
        for name in referenced_textures(root) {
            if self.textures.contains_key(&name) || self.failed.contains(&name) {
                continue;
            }
            match self.resources.load_texture(&name) {
                Ok(texture) => {
                    log::debug!("Loaded texture {} ({}x{})", name, texture.width, texture.height);
                    self.textures.insert(name, texture);
                }
                Err(err) => {
                    log::warn!("{err}");
                    self.failed.push(name);
                }
            }
        }
        Ok(())
    }
}

/// Packs every vertex array into an upload-ready byte buffer.
#[derive(Debug, Default)]
pub struct DisplayListBuilder {
    lists: Vec<Vec<u8>>,
}

impl DisplayListBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list_count(&self) -> usize {
        self.lists.len()
    }

    pub fn byte_size(&self) -> usize {
        self.lists.iter().map(Vec::len).sum()
    }
}

impl RenderTask for DisplayListBuilder {
    fn name(&self) -> &'static str {
        "display-list-builder"
    }

    fn run(&mut self, root: &SceneNode) -> Result<(), String> {
        self.lists.clear();
        root.visit(&mut |node, _| {
            if let NodeKind::VertexArray(array) = &node.kind {
                self.lists.push(bytemuck::cast_slice(&array.vertices).to_vec());
            }
        });
        Ok(())
    }
}

pub struct Renderer {
    views: Vec<RenderingView>,
    scene_root: Option<SceneRef>,
    init_tasks: Vec<Box<dyn RenderTask>>,
    last_frame: Vec<DrawList>,
    frames: u64,
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            views: Vec::new(),
            scene_root: None,
            init_tasks: Vec::new(),
            last_frame: Vec::new(),
            frames: 0,
        }
    }

    pub fn add_rendering_view(&mut self, view: RenderingView) {
        self.views.push(view);
    }

    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    pub fn set_scene_root(&mut self, root: SceneRef) {
        self.scene_root = Some(root);
    }

    pub fn scene_root(&self) -> Option<&SceneRef> {
        self.scene_root.as_ref()
    }

    pub fn attach_init_task(&mut self, task: Box<dyn RenderTask>) {
        self.init_tasks.push(task);
    }

    pub fn init_task_names(&self) -> Vec<&'static str> {
        self.init_tasks.iter().map(|t| t.name()).collect()
    }

    /// Draw lists of the last rendered frame, one per view.
    pub fn last_frame(&self) -> &[DrawList] {
        &self.last_frame
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for Renderer {
    fn initialize(&mut self) {
        let Some(root) = &self.scene_root else {
            log::warn!("Renderer initialized without a scene root");
            return;
        };
        let root = root.borrow();
        for task in &mut self.init_tasks {
            if let Err(err) = task.run(&root) {
                log::error!("Render task {} failed: {err}", task.name());
            }
        }
        log::info!(
            "Renderer ready: {} views, {} nodes",
            self.views.len(),
            root.node_count()
        );
    }

    fn process(&mut self, _arg: &ProcessArg) {
        let Some(root) = &self.scene_root else {
            return;
        };
        let root = root.borrow();
        self.last_frame = self.views.iter_mut().map(|view| view.render(&root)).collect();
        self.frames += 1;
    }
}
