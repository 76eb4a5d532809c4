use std::cell::RefCell;
use std::rc::Rc;

use glam::{Quat, Vec3};
use oer_core::engine::{EngineHandle, Module, ProcessArg};
use oer_core::input::{DeviceState, InputListener, Key, KeyEvent, MouseBtn};

use crate::controller::CameraRef;

/// Stops the engine on Escape.
pub struct QuitHandler {
    engine: EngineHandle,
}

impl QuitHandler {
    pub fn new(engine: EngineHandle) -> Self {
        Self { engine }
    }
}

impl Module for QuitHandler {}

impl InputListener for QuitHandler {
    fn on_key(&mut self, event: &KeyEvent) {
        if event.pressed && event.key == Key::Escape {
            log::info!("Quit requested");
            self.engine.stop();
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct MoveKeys {
    forward: bool,
    backward: bool,
    left: bool,
    right: bool,
}

/// Free-look camera movement: W/A/S/D move on the ground plane, dragging
/// with the right mouse button turns the view.
pub struct MoveHandler {
    camera: CameraRef,
    device: Rc<RefCell<DeviceState>>,
    keys: MoveKeys,
    /// World units per second.
    pub speed: f32,
    /// Radians per pixel of mouse motion.
    pub sensitivity: f32,
}

impl MoveHandler {
    pub fn new(camera: CameraRef, device: Rc<RefCell<DeviceState>>) -> Self {
        Self {
            camera,
            device,
            keys: MoveKeys::default(),
            speed: 100.0,
            sensitivity: 0.005,
        }
    }

    fn step(&mut self, seconds: f32) {
        let mut camera = self.camera.borrow_mut();
        let view = camera.target() - camera.position();
        let forward = Vec3::new(view.x, 0.0, view.z).normalize_or_zero();
        let right = forward.cross(Vec3::Y);

        let mut motion = Vec3::ZERO;
        if self.keys.forward {
            motion += forward;
        }
        if self.keys.backward {
            motion -= forward;
        }
        if self.keys.right {
            motion += right;
        }
        if self.keys.left {
            motion -= right;
        }
        if motion != Vec3::ZERO {
            camera.translate(motion.normalize() * self.speed * seconds);
        }

        let device = self.device.borrow();
        let (dx, _) = device.mouse_delta;
        if dx != 0.0 && device.is_mouse_held(MouseBtn::Right) {
            let yaw = Quat::from_rotation_y(-(dx as f32) * self.sensitivity);
            let position = camera.position();
            camera.look_at(position + yaw * view);
        }
    }
}

impl Module for MoveHandler {
    fn process(&mut self, arg: &ProcessArg) {
        self.step(arg.elapsed.as_secs_f32());
    }
}

impl InputListener for MoveHandler {
    fn on_key(&mut self, event: &KeyEvent) {
        let held = event.pressed;
        match event.key {
            Key::W => self.keys.forward = held,
            Key::S => self.keys.backward = held,
            Key::A => self.keys.left = held,
            Key::D => self.keys.right = held,
            _ => {}
        }
    }
}
