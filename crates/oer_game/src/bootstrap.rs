//! Ordered scene setup.
//!
//! Each step checks that its inputs on [`BootstrapConfig`] exist and that its
//! own outputs do not, then fills them in. Calling the steps out of order is
//! a [`SetupError`].

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use glam::Vec3;
use oer_core::engine::{EngineHandle, Subscriptions};
use oer_core::geometry::Aabb;
use oer_core::input::InputDevice;
use oer_core::partition::{
    BspTransformer, CollectedGeometryTransformer, QuadTransformer, SceneTransformer,
};
use oer_core::resources::{ImagePlugin, ObjPlugin, ResourceManager};
use oer_core::scene::{NodeKind, PointLight, SceneNode, SceneRef, Transform};
use oer_core::serialization::{load_scene, save_scene};
use oer_core::vertex::VertexArrayTransformer;
use oer_devtools::{save_dot, Statistics};
use oer_platform::Frame;
use oer_render::{
    DisplayListBuilder, FollowCamera, Frustum, RenderingView, Renderer, TextureLoader,
    ViewingVolume, Viewport,
};
use thiserror::Error;

use crate::controller::{CameraRef, VehicleController};
use crate::handlers::{MoveHandler, QuitHandler};
use crate::model_list::{load_model_list, ModelEntry, Section};
use crate::physics::{BodyRef, FixedTimeStepPhysics, FixedTimeStepPhysicsTimer, PhysicsRef, RigidBox};
use crate::settings::Settings;

const CAMERA_OFFSET: Vec3 = Vec3::new(-150.0, 40.0, 0.0);
const CAMERA_LOOK_DROP: Vec3 = Vec3::new(0.0, 30.0, 0.0);
const VEHICLE_LIGHT: PointLight = PointLight {
    constant_attenuation: 0.5,
    linear_attenuation: 0.001,
    quadratic_attenuation: 0.0001,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    #[error("Setup {step} dependencies are not satisfied.")]
    Dependencies { step: &'static str },
}

fn unsatisfied(step: &'static str) -> SetupError {
    SetupError::Dependencies { step }
}

/// Everything the setup steps produce. `None` means not built yet.
pub struct BootstrapConfig {
    pub engine: EngineHandle,
    pub subscriptions: Subscriptions,
    pub resources: Option<Rc<ResourceManager>>,
    pub resources_loaded: bool,
    pub frame: Option<Rc<RefCell<Frame>>>,
    pub viewport: Option<Rc<RefCell<Viewport>>>,
    pub viewing_volume: Option<ViewingVolume>,
    pub camera: Option<CameraRef>,
    pub frustum: Option<Rc<RefCell<Frustum>>>,
    pub renderer: Option<Rc<RefCell<Renderer>>>,
    pub input: Option<Rc<RefCell<InputDevice>>>,
    pub rendering_scene: Option<SceneRef>,
    pub dynamic_scene: Option<SceneRef>,
    pub static_scene: Option<SceneRef>,
    pub physic_scene: Option<SceneRef>,
    pub physic_body: Option<BodyRef>,
    pub physics: Option<PhysicsRef>,
    pub controller: Option<Rc<RefCell<VehicleController>>>,
}

impl BootstrapConfig {
    pub fn new(engine: EngineHandle) -> Self {
        Self {
            engine,
            subscriptions: Subscriptions::new(),
            resources: None,
            resources_loaded: false,
            frame: None,
            viewport: None,
            viewing_volume: None,
            camera: None,
            frustum: None,
            renderer: None,
            input: None,
            rendering_scene: None,
            dynamic_scene: None,
            static_scene: None,
            physic_scene: None,
            physic_body: None,
            physics: None,
            controller: None,
        }
    }
}

pub struct Bootstrapper {
    settings: Settings,
    physics_pipeline: Vec<Box<dyn SceneTransformer>>,
    config: BootstrapConfig,
}

impl Bootstrapper {
    pub fn new(settings: Settings, engine: EngineHandle) -> Self {
        Self {
            settings,
            physics_pipeline: vec![
                Box::new(CollectedGeometryTransformer),
                Box::new(QuadTransformer::default()),
                Box::new(BspTransformer::default()),
            ],
            config: BootstrapConfig::new(engine),
        }
    }

    /// Replaces the collect, quad, BSP passes run when no physics cache exists.
    #[cfg(test)]
    pub fn with_physics_pipeline(mut self, pipeline: Vec<Box<dyn SceneTransformer>>) -> Self {
        self.physics_pipeline = pipeline;
        self
    }

    #[cfg(test)]
    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    pub fn into_config(self) -> BootstrapConfig {
        self.config
    }

    /// Runs every step in order, plus debugging when enabled in the settings.
    pub fn run(&mut self) -> Result<(), SetupError> {
        self.setup_resources()?;
        self.setup_display()?;
        self.setup_scene()?;
        self.setup_physics()?;
        self.setup_rendering()?;
        self.setup_devices()?;
        if self.settings.debugging {
            self.setup_debugging();
        }
        Ok(())
    }

    pub fn setup_resources(&mut self) -> Result<(), SetupError> {
        let config = &mut self.config;
        if config.resources.is_some() {
            return Err(unsatisfied("resources"));
        }
        let mut resources = ResourceManager::new();
        resources.add_model_plugin(Box::new(ObjPlugin));
        resources.add_texture_plugin(Box::new(ImagePlugin));
        resources.append_path(self.settings.data_dir.clone());
        config.resources = Some(Rc::new(resources));
        config.resources_loaded = true;
        Ok(())
    }

    pub fn setup_display(&mut self) -> Result<(), SetupError> {
        let config = &mut self.config;
        if !config.resources_loaded
            || config.frame.is_some()
            || config.viewport.is_some()
            || config.viewing_volume.is_some()
            || config.camera.is_some()
            || config.frustum.is_some()
        {
            return Err(unsatisfied("display"));
        }

        let frame = Frame::new(self.settings.window.frame_config());
        let volume = ViewingVolume {
            aspect: frame.config().aspect(),
            ..ViewingVolume::default()
        };
        let camera = Rc::new(RefCell::new(FollowCamera::new(volume)));
        let frustum = Rc::new(RefCell::new(Frustum::new(
            camera.clone(),
            self.settings.near,
            self.settings.far,
        )));
        let mut viewport = Viewport::from_frame(&frame);
        viewport.set_viewing_volume(frustum.clone());

        let frame = Rc::new(RefCell::new(frame));
        config.subscriptions.attach(frame.clone());

        config.frame = Some(frame);
        config.viewing_volume = Some(volume);
        config.camera = Some(camera);
        config.frustum = Some(frustum);
        config.viewport = Some(Rc::new(RefCell::new(viewport)));
        Ok(())
    }

    pub fn setup_scene(&mut self) -> Result<(), SetupError> {
        let config = &mut self.config;
        let (Some(resources), Some(camera)) = (&config.resources, &config.camera) else {
            return Err(unsatisfied("scene"));
        };
        if !config.resources_loaded
            || config.rendering_scene.is_some()
            || config.dynamic_scene.is_some()
            || config.static_scene.is_some()
            || config.physic_scene.is_some()
        {
            return Err(unsatisfied("scene"));
        }

        let rendering = SceneNode::group().into_ref();
        let dynamic = SceneNode::group().into_ref();
        let static_scene = SceneNode::group().into_ref();
        let physic = SceneNode::group().into_ref();
        rendering.borrow_mut().add_node(dynamic.clone());
        rendering.borrow_mut().add_node(static_scene.clone());

        let entries = load_model_list(&self.settings.model_list).unwrap_or_else(|err| {
            log::error!("{err}");
            Vec::new()
        });

        let mut section = None;
        let mut body: Option<BodyRef> = None;
        for entry in entries {
            let name = match entry {
                ModelEntry::Section(next) => {
                    section = Some(next);
                    continue;
                }
                ModelEntry::Model(name) => name,
            };
            let model = match resources.load_model(&name) {
                Ok(model) => model,
                Err(err) => {
                    log::warn!("Skipping model: {err}");
                    continue;
                }
            };

            let bounds = Aabb::from_faces(&model.collect_world_faces());
            let transform = SceneNode::transformation(Transform::default())
                .with_child(model)
                .into_ref();

            if section == Some(Section::Dynamic) {
                if body.is_none() {
                    body = Some(spawn_vehicle(&self.settings, &bounds, &transform, camera));
                }
                transform
                    .borrow_mut()
                    .add_node(SceneNode::new(NodeKind::PointLight(VEHICLE_LIGHT)).into_ref());
            }

            let target = match section {
                None | Some(Section::Dynamic) => &dynamic,
                Some(Section::Static) => &static_scene,
                Some(Section::Physic) => &physic,
            };
            target.borrow_mut().add_node(transform);
            log::info!("Successfully loaded {name}");
        }

        let quad = &self.settings.static_quad;
        QuadTransformer::with_limits(quad.max_face_count, quad.max_quad_size)
            .transform(&mut static_scene.borrow_mut());

        config.rendering_scene = Some(rendering);
        config.dynamic_scene = Some(dynamic);
        config.static_scene = Some(static_scene);
        config.physic_scene = Some(physic);
        config.physic_body = body;
        Ok(())
    }

    pub fn setup_physics(&mut self) -> Result<(), SetupError> {
        let config = &mut self.config;
        let (Some(body), Some(physic)) = (&config.physic_body, &config.physic_scene) else {
            return Err(unsatisfied("physics"));
        };
        if config.physics.is_some() {
            return Err(unsatisfied("physics"));
        }

        let cache = self.settings.cache_path.as_path();
        match load_cached_tree(cache) {
            Some(tree) => *physic.borrow_mut() = tree,
            None => {
                log::info!("Creating and serializing the physics tree: started");
                let mut tree = physic.borrow_mut();
                for pass in &self.physics_pipeline {
                    log::debug!("Physics pass: {}", pass.name());
                    pass.transform(&mut tree);
                }
                match save_scene(&tree, cache) {
                    Ok(()) => log::info!("Creating and serializing the physics tree: done"),
                    Err(err) => log::error!("{err}"),
                }
            }
        }

        let mut physics = FixedTimeStepPhysics::new(physic.clone(), self.settings.physics);
        physics.add_rigid_body(body.clone());
        let physics = Rc::new(RefCell::new(physics));
        let timer = Rc::new(RefCell::new(FixedTimeStepPhysicsTimer::new(physics.clone())));

        config.subscriptions.attach_initialize(physics.clone());
        config.subscriptions.attach_process(timer);
        config.subscriptions.attach_deinitialize(physics.clone());
        config.physics = Some(physics);
        Ok(())
    }

    pub fn setup_rendering(&mut self) -> Result<(), SetupError> {
        let config = &mut self.config;
        let (Some(viewport), Some(scene), Some(resources)) =
            (&config.viewport, &config.rendering_scene, &config.resources)
        else {
            return Err(unsatisfied("rendering"));
        };
        if config.renderer.is_some() {
            return Err(unsatisfied("rendering"));
        }

        let mut renderer = Renderer::new();
        renderer.add_rendering_view(RenderingView::accelerated(viewport.clone()));
        renderer.attach_init_task(Box::new(TextureLoader::new(resources.clone())));
        renderer.attach_init_task(Box::new(DisplayListBuilder::new()));

        let mut vertex_arrays = VertexArrayTransformer::new();
        vertex_arrays.transform(&mut scene.borrow_mut());
        log::debug!("Converted {} geometry nodes to vertex arrays", vertex_arrays.converted());

        renderer.set_scene_root(scene.clone());
        let renderer = Rc::new(RefCell::new(renderer));
        config.subscriptions.attach(renderer.clone());
        config.renderer = Some(renderer);
        Ok(())
    }

    pub fn setup_devices(&mut self) -> Result<(), SetupError> {
        let config = &mut self.config;
        let (Some(camera), Some(physics), Some(body)) =
            (&config.camera, &config.physics, &config.physic_body)
        else {
            return Err(unsatisfied("devices"));
        };
        if config.input.is_some() {
            return Err(unsatisfied("devices"));
        }

        let input = Rc::new(RefCell::new(InputDevice::new()));
        config.subscriptions.attach(input.clone());

        let quit = Rc::new(RefCell::new(QuitHandler::new(config.engine.clone())));
        let mover = Rc::new(RefCell::new(MoveHandler::new(
            camera.clone(),
            input.borrow().state(),
        )));
        let controller = Rc::new(RefCell::new(VehicleController::new(
            self.settings.controller,
            config.engine.clone(),
            Some(camera.clone()),
            Some(body.clone()),
            Some(physics.clone()),
        )));

        {
            let mut device = input.borrow_mut();
            device.attach_key_listener(quit.clone());
            device.attach_key_listener(mover.clone());
            device.attach_key_listener(controller.clone());
            device.attach_joystick_listener(controller.clone());
        }
        config.subscriptions.attach(quit);
        config.subscriptions.attach(mover);
        config.subscriptions.attach(controller.clone());

        config.input = Some(input);
        config.controller = Some(controller);
        Ok(())
    }

    /// Frustum and rigid box visualization, frame statistics and `.dot`
    /// dumps of the scene subtrees. Whatever is missing is skipped.
    pub fn setup_debugging(&mut self) {
        let config = &mut self.config;

        if let (Some(frustum), Some(scene)) = (&config.frustum, &config.rendering_scene) {
            let mut frustum = frustum.borrow_mut();
            frustum.visualize_clipping = true;
            scene
                .borrow_mut()
                .add_node(frustum.visualization_node().into_ref());
        }

        if let Some(body) = &config.physic_body {
            let body = body.borrow();
            if let Some(node) = body.transformation_node() {
                node.borrow_mut().add_node(body.debug_node().into_ref());
            }
        }

        config
            .subscriptions
            .attach(Rc::new(RefCell::new(Statistics::new(Duration::from_secs(1)))));

        let scenes = [
            ("dynamicScene", &config.dynamic_scene),
            ("staticScene", &config.static_scene),
            ("physicScene", &config.physic_scene),
        ];
        for (name, scene) in scenes {
            let Some(scene) = scene else {
                continue;
            };
            match save_dot(&scene.borrow(), name, &self.settings.dot_dir) {
                Ok(()) => log::info!("Saved scene graph to '{name}.dot'"),
                Err(err) => log::error!("Can not write '{name}.dot': {err}"),
            }
        }
    }
}

/// Rigid box for the vehicle model, with the camera following it.
fn spawn_vehicle(
    settings: &Settings,
    bounds: &Aabb,
    transform: &SceneRef,
    camera: &CameraRef,
) -> BodyRef {
    let start = Vec3::from(settings.vehicle_start);
    let mut body = RigidBox::new(bounds);
    body.set_center(start);
    body.set_gravity(Vec3::from(settings.vehicle_gravity));
    body.set_transformation_node(transform.clone());

    let mut camera = camera.borrow_mut();
    camera.set_position(start + CAMERA_OFFSET);
    camera.look_at(start - CAMERA_LOOK_DROP);
    camera.follow(transform.clone());

    Rc::new(RefCell::new(body))
}

/// The cached physics tree, if the cache file exists and decodes.
fn load_cached_tree(path: &Path) -> Option<SceneNode> {
    if !path.exists() {
        return None;
    }
    log::info!("Loading the physics tree from file: started");
    match load_scene(path) {
        Ok(tree) => {
            log::info!("Loading the physics tree from file: done");
            Some(tree)
        }
        Err(err) => {
            log::warn!("{err}. Rebuilding the physics tree.");
            None
        }
    }
}
