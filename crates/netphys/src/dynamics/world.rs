//! The dynamics world: integration and contact resolution
//!
//! A deliberately small iterative solver in the mold of the usual
//! quick-step schemes: a fixed number of sequential impulse iterations over
//! the step's contact joints, followed by semi-implicit Euler integration
//! and rest detection.

use slotmap::{new_key_type, SlotMap};

use crate::config::PhysicsConfig;
use crate::foundation::math::{Mat3, Vec3};

use super::body::BodyState;
use super::contact::ContactGroup;

new_key_type! {
    /// Key of a body inside the dynamics world.
    pub struct SolverBodyKey;
}

const SOLVER_ITERATIONS: usize = 8;

/// Dynamics world owning all solver body states.
pub struct World {
    bodies: SlotMap<SolverBodyKey, BodyState>,
    /// Gravitational acceleration vector
    pub gravity: Vec3,
    erp: f32,
    cfm: f32,
    auto_disable_lin_threshold: f32,
    auto_disable_ang_threshold: f32,
    auto_disable_time: f32,
    auto_disable_steps: u32,
}

impl World {
    /// Create a world configured from `config`.
    pub fn new(config: &PhysicsConfig) -> Self {
        Self {
            bodies: SlotMap::with_key(),
            gravity: Vec3::new(0.0, -config.gravity, 0.0),
            erp: config.erp,
            cfm: config.cfm,
            auto_disable_lin_threshold: config.auto_disable_lin_threshold,
            auto_disable_ang_threshold: config.auto_disable_ang_threshold,
            auto_disable_time: config.auto_disable_time,
            auto_disable_steps: config.auto_disable_steps,
        }
    }

    /// Add a body and return its key.
    pub fn insert(&mut self, state: BodyState) -> SolverBodyKey {
        self.bodies.insert(state)
    }

    /// Remove a body. Unknown keys are logged and ignored.
    pub fn remove(&mut self, key: SolverBodyKey) {
        if self.bodies.remove(key).is_none() {
            log::error!("removal of unknown solver body {key:?}");
        }
    }

    /// Borrow a body state.
    ///
    /// # Panics
    /// Panics if the key is stale; live rigid bodies always hold valid keys.
    pub fn body(&self, key: SolverBodyKey) -> &BodyState {
        &self.bodies[key]
    }

    /// Mutably borrow a body state.
    ///
    /// # Panics
    /// Panics if the key is stale; live rigid bodies always hold valid keys.
    pub fn body_mut(&mut self, key: SolverBodyKey) -> &mut BodyState {
        &mut self.bodies[key]
    }

    /// Number of bodies in the world
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// Whether the world holds no bodies
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Advance the world by `dt`, resolving the step's contact joints.
    ///
    /// Any dynamic body referenced by a contact joint is woken first, the
    /// same way attaching a joint wakes a body in the underlying solver
    /// model. Static bodies never appear in joints (`None` stands in).
    pub fn quick_step(&mut self, dt: f32, contacts: &ContactGroup) {
        if dt <= 0.0 {
            return;
        }

        for joint in contacts.joints() {
            for key in [joint.body_a, joint.body_b].into_iter().flatten() {
                if let Some(body) = self.bodies.get_mut(key) {
                    if !body.enabled {
                        body.enabled = true;
                        body.idle.reset();
                    }
                }
            }
        }

        // Apply gravity and external forces to velocities first so the
        // impulse pass sees the post-force velocities.
        for body in self.bodies.values_mut() {
            if !body.enabled || body.mass.mass <= 0.0 {
                continue;
            }
            let inv_mass = body.mass.inv_mass();
            let mut accel = body.force * inv_mass;
            if body.gravity_enabled {
                accel += self.gravity;
            }
            body.lin_vel += accel * dt;

            let inv_inertia = body.world_inertia().try_inverse().unwrap_or_else(Mat3::zeros);
            body.ang_vel += inv_inertia * body.torque * dt;
        }

        for _ in 0..SOLVER_ITERATIONS {
            for joint in contacts.joints() {
                self.solve_contact(joint, dt);
            }
        }

        self.integrate(dt);
    }

    fn solve_contact(&mut self, joint: &super::contact::ContactJoint, dt: f32) {
        let normal = joint.normal;

        let state_of = |world: &Self, key: Option<SolverBodyKey>| {
            key.and_then(|k| world.bodies.get(k)).map(|b| {
                (
                    b.velocity_at_point(joint.position),
                    b.mass.inv_mass(),
                    b.world_inertia().try_inverse().unwrap_or_else(Mat3::zeros),
                    joint.position - b.position,
                )
            })
        };

        let a = state_of(self, joint.body_a);
        let b = state_of(self, joint.body_b);

        let vel_a = a.map_or_else(Vec3::zeros, |s| s.0);
        let vel_b = b.map_or_else(Vec3::zeros, |s| s.0);
        let rel_vel = vel_a - vel_b;
        let vn = rel_vel.dot(&normal);

        // Positional correction folded into the velocity target, softened
        // by cfm so stacked contacts do not fight each other.
        let bias = self.erp * joint.depth.max(0.0) / dt;
        let restitution = if vn < -1e-3 { -joint.bounce * vn } else { 0.0 };
        let target = bias.max(restitution);
        if vn >= target {
            return;
        }

        let ang_term = |s: &Option<(Vec3, f32, Mat3, Vec3)>, n: &Vec3| {
            s.as_ref().map_or(0.0, |(_, _, inv_i, r)| {
                let rxn = r.cross(n);
                (inv_i * rxn).cross(r).dot(n)
            })
        };

        let inv_mass_a = a.map_or(0.0, |s| s.1);
        let inv_mass_b = b.map_or(0.0, |s| s.1);
        let k = inv_mass_a + inv_mass_b + ang_term(&a, &normal) + ang_term(&b, &normal) + self.cfm;
        if k <= 0.0 {
            return;
        }

        let jn = (target - vn) / k;
        self.apply_impulse(joint.body_a, normal * jn, joint.position);
        self.apply_impulse(joint.body_b, normal * -jn, joint.position);

        // Coulomb friction against the tangential relative velocity,
        // clamped by the normal impulse.
        let tangent_vel = rel_vel - normal * vn;
        let tangent_speed = tangent_vel.norm();
        if tangent_speed > 1e-5 {
            let tangent = tangent_vel / tangent_speed;
            let k_t =
                inv_mass_a + inv_mass_b + ang_term(&a, &tangent) + ang_term(&b, &tangent) + self.cfm;
            if k_t > 0.0 {
                let jt = (tangent_speed / k_t).min(joint.friction * jn.abs());
                self.apply_impulse(joint.body_a, tangent * -jt, joint.position);
                self.apply_impulse(joint.body_b, tangent * jt, joint.position);
            }
        }
    }

    fn apply_impulse(&mut self, key: Option<SolverBodyKey>, impulse: Vec3, at: Vec3) {
        let Some(body) = key.and_then(|k| self.bodies.get_mut(k)) else {
            return;
        };
        if body.mass.mass <= 0.0 {
            return;
        }
        body.lin_vel += impulse * body.mass.inv_mass();
        let inv_inertia = body.world_inertia().try_inverse().unwrap_or_else(Mat3::zeros);
        body.ang_vel += inv_inertia * (at - body.position).cross(&impulse);
    }

    fn integrate(&mut self, dt: f32) {
        for body in self.bodies.values_mut() {
            body.force = Vec3::zeros();
            body.torque = Vec3::zeros();

            if !body.enabled {
                continue;
            }

            body.position += body.lin_vel * dt;

            let ang_speed = body.ang_vel.norm();
            if ang_speed > 1e-6 {
                let axis = nalgebra::Unit::new_unchecked(body.ang_vel / ang_speed);
                let rot = nalgebra::Rotation3::from_axis_angle(&axis, ang_speed * dt);
                body.rotation = rot.matrix() * body.rotation;
            }

            // Rest detection
            if body.auto_disable
                && body.lin_vel.norm() < self.auto_disable_lin_threshold
                && body.ang_vel.norm() < self.auto_disable_ang_threshold
            {
                body.idle.time += dt;
                body.idle.steps += 1;
                if body.idle.time >= self.auto_disable_time
                    && body.idle.steps >= self.auto_disable_steps
                {
                    body.enabled = false;
                    body.clear_velocities();
                }
            } else {
                body.idle.reset();
            }
        }
    }
}
