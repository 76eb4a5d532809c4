//! Fixed-step rigid box physics.
//!
//! A [`RigidBox`] accumulates forces at eight attachment points plus one
//! central force. Each fixed step integrates them together with gravity,
//! clears the accumulators and resolves contact against the highest surface
//! of the partitioned physics scene under the box.

use std::cell::RefCell;
use std::rc::Rc;

use glam::{Mat3, Quat, Vec3};
use oer_core::engine::{Module, ProcessArg};
use oer_core::geometry::{Aabb, Face};
use oer_core::partition::surface_below;
use oer_core::scene::{NodeKind, SceneNode, SceneRef};
use oer_core::time::FixedStep;
use serde::{Deserialize, Serialize};

pub const ATTACHMENT_POINTS: usize = 8;

pub type BodyRef = Rc<RefCell<RigidBox>>;
pub type PhysicsRef = Rc<RefCell<FixedTimeStepPhysics>>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub time_step: f32,
    pub min_time_step: f32,
    pub max_time_step: f32,
    pub mass: f32,
    /// Fraction of velocity kept per second.
    pub linear_damping: f32,
    pub angular_damping: f32,
    /// Fraction of horizontal velocity kept per second while touching ground.
    pub ground_friction: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            time_step: 0.01,
            min_time_step: 0.001,
            max_time_step: 0.1,
            mass: 1.0,
            linear_damping: 0.9,
            angular_damping: 0.2,
            ground_friction: 0.3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RigidBox {
    half_extents: Vec3,
    center: Vec3,
    velocity: Vec3,
    rotation: Quat,
    angular_velocity: Vec3,
    gravity: Vec3,
    forces: [Vec3; ATTACHMENT_POINTS],
    central_force: Vec3,
    transform: Option<SceneRef>,
}

impl RigidBox {
    /// Box fitted around `bounds`, centered on the origin.
    pub fn new(bounds: &Aabb) -> Self {
        let half_extents = (bounds.size() * 0.5).max(Vec3::splat(0.5));
        Self {
            half_extents,
            center: Vec3::ZERO,
            velocity: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            angular_velocity: Vec3::ZERO,
            gravity: Vec3::ZERO,
            forces: [Vec3::ZERO; ATTACHMENT_POINTS],
            central_force: Vec3::ZERO,
            transform: None,
        }
    }

    pub fn half_extents(&self) -> Vec3 {
        self.half_extents
    }

    /// Local offset of attachment point `point` (1-8). Points 1-4 sit on the
    /// front (+x) face, 5-8 on the back face; odd points on the +z side.
    pub fn attachment_point(&self, point: usize) -> Option<Vec3> {
        if !(1..=ATTACHMENT_POINTS).contains(&point) {
            return None;
        }
        let index = point - 1;
        let x = if index < 4 { 1.0 } else { -1.0 };
        let z = if index % 2 == 0 { 1.0 } else { -1.0 };
        let y = if index % 4 < 2 { -1.0 } else { 1.0 };
        Some(Vec3::new(x, y, z) * self.half_extents)
    }

    /// Accumulates `force` at attachment point `point` (1-8). Out of range
    /// points are ignored.
    pub fn add_force(&mut self, force: Vec3, point: usize) {
        match point.checked_sub(1).and_then(|i| self.forces.get_mut(i)) {
            Some(slot) => *slot += force,
            None => log::warn!("Ignoring force on unknown attachment point {point}"),
        }
    }

    pub fn add_central_force(&mut self, force: Vec3) {
        self.central_force += force;
    }

    #[cfg(test)]
    pub fn force_at(&self, point: usize) -> Option<Vec3> {
        point.checked_sub(1).and_then(|i| self.forces.get(i)).copied()
    }

    #[cfg(test)]
    pub fn forces(&self) -> &[Vec3; ATTACHMENT_POINTS] {
        &self.forces
    }

    #[cfg(test)]
    pub fn central_force(&self) -> Vec3 {
        self.central_force
    }

    #[cfg(test)]
    pub fn has_forces(&self) -> bool {
        self.central_force != Vec3::ZERO || self.forces.iter().any(|f| *f != Vec3::ZERO)
    }

    pub fn reset_forces(&mut self) {
        self.forces = [Vec3::ZERO; ATTACHMENT_POINTS];
        self.central_force = Vec3::ZERO;
    }

    /// Zeroes velocities and orientation. Position is kept.
    pub fn reset_motion(&mut self) {
        self.velocity = Vec3::ZERO;
        self.angular_velocity = Vec3::ZERO;
        self.rotation = Quat::IDENTITY;
        self.sync_transform();
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn set_center(&mut self, center: Vec3) {
        self.center = center;
        self.sync_transform();
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    pub fn rotation_matrix(&self) -> Mat3 {
        Mat3::from_quat(self.rotation)
    }

    pub fn set_transformation_node(&mut self, node: SceneRef) {
        self.transform = Some(node);
        self.sync_transform();
    }

    pub fn transformation_node(&self) -> Option<&SceneRef> {
        self.transform.as_ref()
    }

    fn sync_transform(&self) {
        let Some(node) = &self.transform else {
            return;
        };
        if let NodeKind::Transformation(t) = &mut node.borrow_mut().kind {
            t.translation = self.center;
            t.rotation = self.rotation;
        }
    }

    /// Wireframe-sized box geometry in body space.
    pub fn debug_node(&self) -> SceneNode {
        let c = Aabb::new(-self.half_extents, self.half_extents).corners();
        let quads = [
            [0, 2, 3, 1],
            [4, 5, 7, 6],
            [0, 4, 6, 2],
            [1, 3, 7, 5],
            [0, 1, 5, 4],
            [2, 6, 7, 3],
        ];
        let faces = quads
            .iter()
            .flat_map(|[a, b, cc, d]| {
                [Face::new(c[*a], c[*b], c[*cc]), Face::new(c[*a], c[*cc], c[*d])]
            })
            .collect();
        SceneNode::geometry(faces)
    }

    /// Integrates one step and clears the force accumulators. `ground`
    /// returns the surface height under `(x, z)` not above `max_y`.
    pub fn step(
        &mut self,
        dt: f32,
        config: &PhysicsConfig,
        ground: impl Fn(f32, f32, f32) -> Option<f32>,
    ) {
        let mass = config.mass.max(f32::EPSILON);
        let rotation = self.rotation_matrix();

        let mut total = self.central_force + self.gravity * mass;
        let mut torque = Vec3::ZERO;
        for (index, force) in self.forces.iter().enumerate() {
            total += *force;
            if let Some(offset) = self.attachment_point(index + 1) {
                torque += (rotation * offset).cross(*force);
            }
        }

        let extents = self.half_extents;
        let inertia = mass / 3.0 * (extents.y * extents.y + extents.x.max(extents.z).powi(2));
        self.velocity += total / mass * dt;
        self.angular_velocity += torque / inertia.max(f32::EPSILON) * dt;
        self.velocity *= config.linear_damping.powf(dt);
        self.angular_velocity *= config.angular_damping.powf(dt);

        self.center += self.velocity * dt;
        let spin = self.angular_velocity * dt;
        if spin.length_squared() > 0.0 {
            self.rotation = (Quat::from_scaled_axis(spin) * self.rotation).normalize();
        }

        let bottom = self.center.y - extents.y;
        if let Some(height) = ground(self.center.x, self.center.z, self.center.y + extents.y) {
            if bottom <= height {
                self.center.y = height + extents.y;
                if self.velocity.y < 0.0 {
                    self.velocity.y = 0.0;
                }
                let keep = config.ground_friction.powf(dt);
                self.velocity.x *= keep;
                self.velocity.z *= keep;
                // Only yaw survives ground contact.
                self.angular_velocity.x = 0.0;
                self.angular_velocity.z = 0.0;
            }
        }

        self.reset_forces();
        self.sync_transform();
    }
}

/// Steps every registered body at a fixed rate against a static scene.
pub struct FixedTimeStepPhysics {
    scene: SceneRef,
    bodies: Vec<BodyRef>,
    config: PhysicsConfig,
    time_step: f32,
    paused: bool,
    steps: u64,
}

impl FixedTimeStepPhysics {
    pub fn new(scene: SceneRef, config: PhysicsConfig) -> Self {
        Self {
            scene,
            bodies: Vec::new(),
            time_step: config.time_step,
            config,
            paused: false,
            steps: 0,
        }
    }

    pub fn add_rigid_body(&mut self, body: BodyRef) {
        self.bodies.push(body);
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
        log::info!("Physics {}", if self.paused { "paused" } else { "resumed" });
    }

    pub fn time_step(&self) -> f32 {
        self.time_step
    }

    pub fn set_time_step(&mut self, time_step: f32) {
        self.time_step = time_step.clamp(self.config.min_time_step, self.config.max_time_step);
    }

    pub fn nudge_time_step(&mut self, delta: f32) {
        self.set_time_step(self.time_step + delta);
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Puts every body back at rest and restarts the step counter.
    pub fn reinitialize(&mut self) {
        for body in &self.bodies {
            body.borrow_mut().reset_motion();
        }
        self.time_step = self.config.time_step;
        self.steps = 0;
    }

    pub fn step(&mut self) {
        if self.is_paused() {
            return;
        }
        let scene = self.scene.borrow();
        for body in &self.bodies {
            body.borrow_mut().step(self.time_step, &self.config, |x, z, max_y| {
                surface_below(&scene, x, z, max_y)
            });
        }
        self.steps += 1;
    }
}

impl Module for FixedTimeStepPhysics {
    fn initialize(&mut self) {
        self.reinitialize();
        log::info!(
            "Physics ready: {} bodies, {} scene nodes, step {}s",
            self.body_count(),
            self.scene.borrow().node_count(),
            self.time_step
        );
    }

    fn deinitialize(&mut self) {
        log::info!("Physics ran {} steps", self.steps());
    }
}

/// Feeds wall time into the physics at its current fixed step.
pub struct FixedTimeStepPhysicsTimer {
    physics: PhysicsRef,
    clock: FixedStep,
}

impl FixedTimeStepPhysicsTimer {
    pub fn new(physics: PhysicsRef) -> Self {
        let dt = f64::from(physics.borrow().time_step());
        Self {
            physics,
            clock: FixedStep::new(dt),
        }
    }
}

impl Module for FixedTimeStepPhysicsTimer {
    fn process(&mut self, arg: &ProcessArg) {
        let mut physics = self.physics.borrow_mut();
        self.clock.fixed_dt = f64::from(physics.time_step());
        self.clock.advance(arg.elapsed.as_secs_f64());
        while self.clock.should_step() {
            physics.step();
        }
    }
}
