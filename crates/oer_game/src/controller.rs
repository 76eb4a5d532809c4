//! Vehicle controller: keyboard and joystick input turned into forces on the
//! rigid box, plus the auxiliary driving commands.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use glam::Vec3;
use oer_core::engine::{EngineHandle, Module, ProcessArg};
use oer_core::input::{InputListener, JoystickAxisEvent, JoystickButtonEvent, Key, KeyEvent};
use oer_render::FollowCamera;
use serde::{Deserialize, Serialize};

use crate::physics::{BodyRef, PhysicsRef};

pub type CameraRef = Rc<RefCell<FollowCamera>>;

const FORWARD_POINTS: [usize; 4] = [1, 2, 3, 4];
const BACKWARD_POINTS: [usize; 4] = [5, 6, 7, 8];
const LEFT_POINTS: [usize; 2] = [2, 4];
const RIGHT_POINTS: [usize; 2] = [1, 3];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub speed: f32,
    pub turn: f32,
    /// Multiplier turning elapsed seconds into the force delta.
    pub time_scale: f32,
    pub gravity_factor: f32,
    pub reset_origin: Vec3,
    /// Physics time step change per tick while Plus or Minus is held.
    pub step: f32,
    pub axis_range: f32,
    pub analog_input: bool,
    pub jump_impulse: Vec3,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            speed: 1750.0,
            turn: 550.0,
            time_scale: 10.0,
            gravity_factor: 10.0,
            reset_origin: Vec3::new(2.0, 1.0, 2.0),
            step: 0.001,
            axis_range: 32768.0,
            analog_input: true,
            jump_impulse: Vec3::new(0.0, 5000.0, 0.0),
        }
    }
}

/// Directional intensities in `[0, 1]` plus the time step modifier.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputState {
    pub forward: f32,
    pub backward: f32,
    pub turn_left: f32,
    pub turn_right: f32,
    pub modifier: bool,
    pub step: f32,
}

impl InputState {
    pub fn is_idle(&self) -> bool {
        self.forward == 0.0 && self.backward == 0.0 && self.turn_left == 0.0 && self.turn_right == 0.0
    }
}

pub struct VehicleController {
    config: ControllerConfig,
    input: InputState,
    body: Option<BodyRef>,
    physics: Option<PhysicsRef>,
    camera: Option<CameraRef>,
    engine: EngineHandle,
}

impl VehicleController {
    pub fn new(
        config: ControllerConfig,
        engine: EngineHandle,
        camera: Option<CameraRef>,
        body: Option<BodyRef>,
        physics: Option<PhysicsRef>,
    ) -> Self {
        Self {
            config,
            input: InputState::default(),
            body,
            physics,
            camera,
            engine,
        }
    }

    #[cfg(test)]
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    #[cfg(test)]
    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn on_tick(&mut self, elapsed: Duration) {
        if self.input.modifier {
            if let Some(physics) = &self.physics {
                physics.borrow_mut().nudge_time_step(self.input.step);
            }
        }

        let Some(body) = &self.body else {
            return;
        };
        if self.input.is_idle() {
            return;
        }

        let delta = elapsed.as_secs_f32() * self.config.time_scale;
        let mut body = body.borrow_mut();
        let m = body.rotation_matrix();
        let (speed, turn) = (self.config.speed, self.config.turn);

        if self.input.forward > 0.0 {
            let dir = m.row(0) * delta;
            for point in FORWARD_POINTS {
                body.add_force(dir * speed * self.input.forward, point);
            }
        }
        if self.input.backward > 0.0 {
            let dir = -m.row(0) * delta;
            for point in BACKWARD_POINTS {
                body.add_force(dir * speed * self.input.backward, point);
            }
        }
        if self.input.turn_left > 0.0 {
            let dir = -m.row(2) * delta;
            for point in LEFT_POINTS {
                body.add_force(dir * turn * self.input.turn_left, point);
            }
        }
        if self.input.turn_right > 0.0 {
            let dir = m.row(2) * delta;
            for point in RIGHT_POINTS {
                body.add_force(dir * turn * self.input.turn_right, point);
            }
        }
    }

    pub fn on_key_down(&mut self, key: Key) {
        match key {
            Key::Up => self.input.forward = 1.0,
            Key::Down => self.input.backward = 1.0,
            Key::Left => self.input.turn_left = 1.0,
            Key::Right => self.input.turn_right = 1.0,
            Key::R => self.reset(),
            Key::Space => {
                if let Some(physics) = &self.physics {
                    physics.borrow_mut().toggle_pause();
                }
            }
            Key::C => {
                if let Some(camera) = &self.camera {
                    log::info!("Camera Position: {}", camera.borrow().position());
                }
            }
            Key::PageUp => self.scale_gravity(self.config.gravity_factor),
            Key::PageDown => self.scale_gravity(1.0 / self.config.gravity_factor),
            Key::Plus => {
                self.input.modifier = true;
                self.input.step = self.config.step;
            }
            Key::Minus => {
                self.input.modifier = true;
                self.input.step = -self.config.step;
            }
            Key::Escape => self.engine.stop(),
            _ => {}
        }
    }

    pub fn on_key_up(&mut self, key: Key) {
        match key {
            Key::Up => self.input.forward = 0.0,
            Key::Down => self.input.backward = 0.0,
            Key::Left => self.input.turn_left = 0.0,
            Key::Right => self.input.turn_right = 0.0,
            Key::Plus | Key::Minus => self.input.modifier = false,
            _ => {}
        }
    }

    /// Axis 1 drives forward/backward, axis 0 steers. Replaces whatever the
    /// keys set before.
    pub fn on_axis_change(&mut self, event: &JoystickAxisEvent) {
        if !self.config.analog_input {
            return;
        }
        let range = self.config.axis_range;
        let fraction = |raw: i16| (f32::from(raw) / range).clamp(-1.0, 1.0);
        let drive = fraction(event.axes[1]);
        let steer = fraction(event.axes[0]);
        self.input.forward = (-drive).max(0.0);
        self.input.backward = drive.max(0.0);
        self.input.turn_left = (-steer).max(0.0);
        self.input.turn_right = steer.max(0.0);
    }

    pub fn on_button(&mut self, event: &JoystickButtonEvent) {
        if !event.pressed {
            return;
        }
        log::debug!("joy: {}", event.button);
        match event.button {
            2 => {
                if let Some(body) = &self.body {
                    body.borrow_mut().add_central_force(self.config.jump_impulse);
                }
            }
            4 | 10 => self.reset(),
            7 => self.scale_gravity(self.config.gravity_factor),
            8 => self.scale_gravity(1.0 / self.config.gravity_factor),
            _ => {}
        }
    }

    /// Restarts the physics and puts the body back at the reset origin.
    pub fn reset(&mut self) {
        let (Some(physics), Some(body)) = (&self.physics, &self.body) else {
            return;
        };
        physics.borrow_mut().reinitialize();
        let mut body = body.borrow_mut();
        body.reset_forces();
        body.set_center(self.config.reset_origin);
        log::info!("Reset Physics");
    }

    fn scale_gravity(&mut self, factor: f32) {
        if let Some(body) = &self.body {
            let mut body = body.borrow_mut();
            let gravity = body.gravity() * factor;
            body.set_gravity(gravity);
            log::info!("Gravity {}", gravity);
        }
    }
}

impl Module for VehicleController {
    fn initialize(&mut self) {
        self.input.step = 0.0;
    }

    fn process(&mut self, arg: &ProcessArg) {
        self.on_tick(arg.elapsed);
    }
}

impl InputListener for VehicleController {
    fn on_key(&mut self, event: &KeyEvent) {
        if event.pressed {
            self.on_key_down(event.key);
        } else {
            self.on_key_up(event.key);
        }
    }

    fn on_joystick_axis(&mut self, event: &JoystickAxisEvent) {
        self.on_axis_change(event);
    }

    fn on_joystick_button(&mut self, event: &JoystickButtonEvent) {
        self.on_button(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{FixedTimeStepPhysics, PhysicsConfig, RigidBox, ATTACHMENT_POINTS};
    use oer_core::geometry::Aabb;
    use oer_core::scene::SceneNode;

    struct Rig {
        controller: VehicleController,
        body: BodyRef,
        physics: PhysicsRef,
        engine: EngineHandle,
    }

    fn rig() -> Rig {
        let body = Rc::new(RefCell::new(RigidBox::new(&Aabb::new(
            Vec3::splat(-1.0),
            Vec3::splat(1.0),
        ))));
        body.borrow_mut().set_gravity(Vec3::new(0.0, -9.82 * 20.0, 0.0));
        let physics = Rc::new(RefCell::new(FixedTimeStepPhysics::new(
            SceneNode::group().into_ref(),
            PhysicsConfig::default(),
        )));
        physics.borrow_mut().add_rigid_body(body.clone());
        let engine = EngineHandle::new();
        let controller = VehicleController::new(
            ControllerConfig::default(),
            engine.clone(),
            None,
            Some(body.clone()),
            Some(physics.clone()),
        );
        Rig {
            controller,
            body,
            physics,
            engine,
        }
    }

    const TICK: Duration = Duration::from_millis(100);

    fn delta() -> f32 {
        TICK.as_secs_f32() * ControllerConfig::default().time_scale
    }

    #[test]
    fn idle_tick_leaves_forces_untouched() {
        let mut rig = rig();
        rig.body.borrow_mut().add_force(Vec3::new(3.0, 0.0, 0.0), 6);
        let before = *rig.body.borrow().forces();

        rig.controller.on_tick(TICK);

        assert_eq!(*rig.body.borrow().forces(), before);
    }

    #[test]
    fn forward_force_lands_on_front_points_only() {
        let mut rig = rig();
        rig.controller.on_key_down(Key::Up);
        rig.controller.on_tick(TICK);

        let body = rig.body.borrow();
        let expected = ControllerConfig::default().speed * delta();
        for point in 1..=4 {
            let force = body.force_at(point).expect("front point");
            assert!((force.length() - expected).abs() < 1e-3);
            assert!(force.x > 0.0);
        }
        for point in 5..=8 {
            assert_eq!(body.force_at(point), Some(Vec3::ZERO));
        }
        let total: f32 = body.forces().iter().map(|f| f.length()).sum();
        assert!((total - 4.0 * expected).abs() < 1e-2);
    }

    #[test]
    fn left_and_right_never_share_attachment_points() {
        let mut rig = rig();
        rig.controller.on_key_down(Key::Left);
        rig.controller.on_key_down(Key::Right);
        rig.controller.on_tick(TICK);

        let body = rig.body.borrow();
        let touched: Vec<usize> = (1..=ATTACHMENT_POINTS)
            .filter(|p| body.force_at(*p) != Some(Vec3::ZERO))
            .collect();
        assert_eq!(touched, vec![1, 2, 3, 4]);
        // Left pushes -z on 2 and 4, right pushes +z on 1 and 3.
        assert!(body.force_at(2).expect("p2").z < 0.0);
        assert!(body.force_at(4).expect("p4").z < 0.0);
        assert!(body.force_at(1).expect("p1").z > 0.0);
        assert!(body.force_at(3).expect("p3").z > 0.0);
    }

    #[test]
    fn axis_input_overrides_key_state() {
        let mut rig = rig();
        rig.controller.on_key_down(Key::Up);
        rig.controller.on_key_down(Key::Left);

        rig.controller.on_axis_change(&JoystickAxisEvent {
            axes: [16384, 16384, 0, 0],
        });

        let input = *rig.controller.input();
        assert_eq!(input.forward, 0.0);
        assert_eq!(input.backward, 0.5);
        assert_eq!(input.turn_left, 0.0);
        assert_eq!(input.turn_right, 0.5);

        rig.controller.on_tick(TICK);
        let body = rig.body.borrow();
        assert_eq!(body.force_at(1).map(|f| f.x), Some(0.0));
        assert!(body.force_at(5).expect("back point").x < 0.0);
    }

    #[test]
    fn axis_input_is_ignored_when_analog_disabled() {
        let mut rig = rig();
        rig.controller.config.analog_input = false;
        rig.controller.on_key_down(Key::Up);
        rig.controller.on_axis_change(&JoystickAxisEvent {
            axes: [0, 32767, 0, 0],
        });
        assert_eq!(rig.controller.input().forward, 1.0);
    }

    #[test]
    fn gamepad_stick_and_trigger_reach_the_vehicle() {
        use gilrs::{Axis, Button};
        use oer_core::input::{InputEvent, JOYSTICK_AXES};
        use oer_platform::gamepad::{axis_event, button_event};

        let mut rig = rig();
        let mut axes = [0; JOYSTICK_AXES];
        match axis_event(&mut axes, Axis::LeftStickY, 1.0) {
            Some(InputEvent::JoystickAxis(event)) => rig.controller.on_axis_change(&event),
            other => panic!("expected axis event, got {other:?}"),
        }
        assert!(rig.controller.input().forward > 0.99);
        assert_eq!(rig.controller.input().backward, 0.0);

        let start = rig.body.borrow().gravity();
        match button_event(Button::LeftTrigger2, true) {
            Some(InputEvent::JoystickButton(event)) => rig.controller.on_button(&event),
            other => panic!("expected button event, got {other:?}"),
        }
        assert_eq!(rig.body.borrow().gravity(), start * 10.0);
    }

    #[test]
    fn full_axis_deflection_clamps_to_one() {
        let mut rig = rig();
        rig.controller.on_axis_change(&JoystickAxisEvent {
            axes: [i16::MIN, i16::MIN, 0, 0],
        });
        assert_eq!(rig.controller.input().forward, 1.0);
        assert_eq!(rig.controller.input().turn_left, 1.0);
    }

    #[test]
    fn reset_clears_forces_and_moves_body_to_origin() {
        let mut rig = rig();
        rig.body.borrow_mut().set_center(Vec3::new(40.0, 3.0, -7.0));
        rig.controller.on_key_down(Key::Up);
        rig.controller.on_tick(TICK);
        rig.body.borrow_mut().add_central_force(Vec3::Y);
        assert!(rig.body.borrow().has_forces());

        rig.controller.on_key_down(Key::R);

        let body = rig.body.borrow();
        assert!(!body.has_forces());
        assert_eq!(body.center(), Vec3::new(2.0, 1.0, 2.0));
    }

    #[test]
    fn commands_without_body_are_silent() {
        let engine = EngineHandle::new();
        let mut controller =
            VehicleController::new(ControllerConfig::default(), engine.clone(), None, None, None);
        controller.on_key_down(Key::Up);
        controller.on_tick(TICK);
        controller.on_key_down(Key::R);
        controller.on_key_down(Key::PageUp);
        controller.on_key_down(Key::Space);
        controller.on_key_down(Key::C);
        controller.on_button(&JoystickButtonEvent {
            button: 2,
            pressed: true,
        });
        assert!(!engine.is_stopped());
    }

    #[test]
    fn gravity_keys_scale_by_factor() {
        let mut rig = rig();
        let start = rig.body.borrow().gravity();
        rig.controller.on_key_down(Key::PageUp);
        assert_eq!(rig.body.borrow().gravity(), start * 10.0);
        rig.controller.on_button(&JoystickButtonEvent {
            button: 8,
            pressed: true,
        });
        assert!((rig.body.borrow().gravity() - start).length() < 1e-3);
    }

    #[test]
    fn space_toggles_pause_and_escape_stops_engine() {
        let mut rig = rig();
        rig.controller.on_key(&KeyEvent {
            key: Key::Space,
            pressed: true,
        });
        assert!(rig.physics.borrow().is_paused());
        rig.controller.on_key(&KeyEvent {
            key: Key::Escape,
            pressed: true,
        });
        assert!(rig.engine.is_stopped());
    }

    #[test]
    fn modifier_nudges_time_step_while_held() {
        let mut rig = rig();
        let start = rig.physics.borrow().time_step();
        rig.controller.on_key_down(Key::Plus);
        rig.controller.on_tick(TICK);
        rig.controller.on_tick(TICK);
        rig.controller.on_key_up(Key::Plus);
        rig.controller.on_tick(TICK);
        assert!((rig.physics.borrow().time_step() - (start + 0.002)).abs() < 1e-6);
    }

    #[test]
    fn jump_button_applies_central_impulse() {
        let mut rig = rig();
        rig.controller.on_joystick_button(&JoystickButtonEvent {
            button: 2,
            pressed: true,
        });
        assert_eq!(rig.body.borrow().central_force(), Vec3::new(0.0, 5000.0, 0.0));
    }
}
