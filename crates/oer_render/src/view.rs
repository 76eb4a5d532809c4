//! Rendering views.
//!
//! A [`RenderingView`] walks the scene once per frame. For every node the
//! clipper decides first whether the subtree is visible; only then does the
//! rasterizer turn the node into draw commands. Both are trait objects so a
//! view can combine any clipping strategy with any rasterizer.

use std::cell::RefCell;
use std::rc::Rc;

use glam::Mat4;
use oer_core::geometry::{Aabb, Plane};
use oer_core::scene::{NodeKind, SceneNode};

use crate::camera::intersects_planes;
use crate::viewport::Viewport;

#[derive(Debug, Clone, PartialEq)]
pub struct DrawCommand {
    pub texture: Option<String>,
    pub triangles: usize,
    pub model: Mat4,
}

/// Output of one view for one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawList {
    pub commands: Vec<DrawCommand>,
    pub lights: usize,
    /// Subtrees rejected by the clipper.
    pub culled: usize,
}

impl DrawList {
    pub fn triangle_count(&self) -> usize {
        self.commands.iter().map(|c| c.triangles).sum()
    }
}

pub trait Clipper {
    fn begin_frame(&mut self, _viewport: &Viewport) {}
    fn is_visible(&self, node: &SceneNode, world: &Mat4) -> bool;
}

pub trait Rasterizer {
    fn begin_frame(&mut self) {}
    fn draw(&mut self, node: &SceneNode, world: &Mat4, list: &mut DrawList);
}

/// Culls quad cells against the viewport's frustum. Without a bound frustum
/// everything is visible.
#[derive(Debug, Default)]
pub struct AccelerationClipper {
    planes: Option<[Plane; 6]>,
}

impl AccelerationClipper {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clipper for AccelerationClipper {
    fn begin_frame(&mut self, viewport: &Viewport) {
        self.planes = viewport
            .viewing_volume()
            .map(|frustum| frustum.borrow().planes());
    }

    fn is_visible(&self, node: &SceneNode, world: &Mat4) -> bool {
        let (Some(planes), NodeKind::Quad(bounds)) = (&self.planes, &node.kind) else {
            return true;
        };
        let mut world_bounds = Aabb::EMPTY;
        for corner in bounds.corners() {
            world_bounds.extend(world.transform_point3(corner));
        }
        intersects_planes(planes, &world_bounds)
    }
}

/// Emits one draw command per vertex array or geometry node.
#[derive(Debug, Default)]
pub struct SceneRasterizer {
    frames: u64,
}

impl SceneRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Rasterizer for SceneRasterizer {
    fn begin_frame(&mut self) {
        self.frames += 1;
    }

    fn draw(&mut self, node: &SceneNode, world: &Mat4, list: &mut DrawList) {
        match &node.kind {
            NodeKind::VertexArray(array) => list.commands.push(DrawCommand {
                texture: array.texture.clone(),
                triangles: array.triangle_count(),
                model: *world,
            }),
            NodeKind::Geometry(faces) if !faces.is_empty() => list.commands.push(DrawCommand {
                texture: faces[0].texture.clone(),
                triangles: faces.len(),
                model: *world,
            }),
            NodeKind::PointLight(_) => list.lights += 1,
            _ => {}
        }
    }
}

pub struct RenderingView {
    viewport: Rc<RefCell<Viewport>>,
    clipper: Box<dyn Clipper>,
    rasterizer: Box<dyn Rasterizer>,
}

impl RenderingView {
    pub fn new(
        viewport: Rc<RefCell<Viewport>>,
        clipper: Box<dyn Clipper>,
        rasterizer: Box<dyn Rasterizer>,
    ) -> Self {
        Self {
            viewport,
            clipper,
            rasterizer,
        }
    }

    /// Frustum-culled view drawing through [`SceneRasterizer`].
    pub fn accelerated(viewport: Rc<RefCell<Viewport>>) -> Self {
        Self::new(
            viewport,
            Box::new(AccelerationClipper::new()),
            Box::new(SceneRasterizer::new()),
        )
    }

    pub fn viewport(&self) -> &Rc<RefCell<Viewport>> {
        &self.viewport
    }

    pub fn render(&mut self, root: &SceneNode) -> DrawList {
        self.clipper.begin_frame(&self.viewport.borrow());
        self.rasterizer.begin_frame();
        let mut list = DrawList::default();
        self.walk(root, Mat4::IDENTITY, &mut list);
        list
    }

    fn walk(&mut self, node: &SceneNode, parent: Mat4, list: &mut DrawList) {
        let world = parent * node.local_matrix();
        if !self.clipper.is_visible(node, &world) {
            list.culled += 1;
            return;
        }
        self.rasterizer.draw(node, &world, list);
        for child in &node.children {
            self.walk(&child.borrow(), world, list);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{FollowCamera, Frustum, ViewingVolume};
    use glam::Vec3;
    use oer_core::partition::{ground_grid, QuadTransformer, SceneTransformer};
    use oer_core::scene::PointLight;

    struct RecordingClipper(Rc<RefCell<Vec<&'static str>>>);
    impl Clipper for RecordingClipper {
        fn is_visible(&self, _node: &SceneNode, _world: &Mat4) -> bool {
            self.0.borrow_mut().push("clip");
            true
        }
    }

    struct RecordingRasterizer(Rc<RefCell<Vec<&'static str>>>);
    impl Rasterizer for RecordingRasterizer {
        fn draw(&mut self, _node: &SceneNode, _world: &Mat4, _list: &mut DrawList) {
            self.0.borrow_mut().push("draw");
        }
    }

    fn viewport_looking_down_negative_x() -> Rc<RefCell<Viewport>> {
        let mut camera = FollowCamera::new(ViewingVolume::default());
        camera.set_position(Vec3::new(0.0, 10.0, 0.0));
        camera.look_at(Vec3::new(-100.0, 10.0, 0.0));
        let frustum = Frustum::new(Rc::new(RefCell::new(camera)), 20.0, 3000.0);
        let mut viewport = Viewport::from_frame(&oer_platform::Frame::new(Default::default()));
        viewport.set_viewing_volume(Rc::new(RefCell::new(frustum)));
        Rc::new(RefCell::new(viewport))
    }

    #[test]
    fn clipper_runs_before_rasterizer_for_each_node() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let viewport = viewport_looking_down_negative_x();
        let mut view = RenderingView::new(
            viewport,
            Box::new(RecordingClipper(log.clone())),
            Box::new(RecordingRasterizer(log.clone())),
        );
        let root = SceneNode::group().with_child(SceneNode::group());
        view.render(&root);
        assert_eq!(*log.borrow(), vec!["clip", "draw", "clip", "draw"]);
    }

    #[test]
    fn accelerated_view_culls_quads_behind_camera() {
        // Ground from x = -400 to 400; the camera sees only the negative half.
        let mut ground = SceneNode::geometry(
            ground_grid(8, 800.0, 0.0)
                .into_iter()
                .map(|f| f.transformed(&Mat4::from_translation(Vec3::new(-400.0, 0.0, -400.0))))
                .collect(),
        );
        QuadTransformer::with_limits(8, 200.0).transform(&mut ground);
        let root = SceneNode::group()
            .with_child(ground)
            .with_child(SceneNode::new(NodeKind::PointLight(PointLight::default())));
        let total = root.face_count();

        let mut view = RenderingView::accelerated(viewport_looking_down_negative_x());
        let list = view.render(&root);

        assert!(list.culled > 0);
        assert!(list.triangle_count() > 0);
        assert!(list.triangle_count() < total);
        assert_eq!(list.lights, 1);
    }

    #[test]
    fn unbound_viewport_draws_everything() {
        let frame = oer_platform::Frame::new(Default::default());
        let viewport = Rc::new(RefCell::new(Viewport::from_frame(&frame)));
        let root = SceneNode::group().with_child(SceneNode::geometry(ground_grid(2, 10.0, 0.0)));
        let list = RenderingView::accelerated(viewport).render(&root);
        assert_eq!(list.culled, 0);
        assert_eq!(list.triangle_count(), 8);
    }
}
