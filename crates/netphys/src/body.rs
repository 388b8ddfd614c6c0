//! Rigid body handles: a named set of geometries simulated as one unit
//!
//! A [`BodyBlueprint`] is an uninstantiated template owned by the model
//! loader's cache; [`RigidBody`] is a live body whose state lives in the
//! dynamics world. All transform accessors go through
//! [`crate::foundation::math::BodyFrame`], which corrects for the center of
//! gravity the solver layer knows nothing about.

use slotmap::new_key_type;

use crate::collision::{Geom, GeomId};
use crate::dynamics::{SolverBodyKey, World};
use crate::foundation::math::{BodyFrame, Vec3};

new_key_type! {
    /// Key of a live rigid body in the simulator.
    pub struct BodyId;
}

/// An uninstantiated body template: shapes and attributes, no solver state.
///
/// Blueprints are created by the model loader, cached by name, and cloned
/// into live bodies by [`crate::simulator::Simulator::instantiate`].
#[derive(Debug, Clone)]
pub struct BodyBlueprint {
    /// Model name the blueprint was loaded from
    pub name: String,
    /// Whether instances start out static
    pub is_static: bool,
    /// Body-local offset of the center of gravity
    pub cog: Vec3,
    /// Geom templates, in declaration order
    pub geoms: Vec<Geom>,
}

/// A live rigid body: solver state plus its geometries.
#[derive(Debug)]
pub struct RigidBody {
    /// Display name, usually the model name
    pub name: String,
    /// Static bodies never integrate and are always asleep
    pub is_static: bool,
    /// Body-local offset of the center of gravity
    pub cog: Vec3,
    /// Key of the state in the dynamics world
    pub state: SolverBodyKey,
    /// Owned geoms, in declaration order
    pub geoms: Vec<GeomId>,
    /// Back-reference to the owning game object, if any
    pub user_data: Option<u64>,
    /// Whether a mass-bearing geom has initialized the body's mass yet
    pub(crate) mass_initialized: bool,
}

impl RigidBody {
    /// Reference-point frame of the body, corrected for the center of
    /// gravity.
    pub fn frame(&self, world: &World) -> BodyFrame {
        let state = world.body(self.state);
        BodyFrame::from_solver(state.rotation, state.position, self.cog)
    }

    /// Set the body's reference-point frame.
    pub fn set_frame(&self, world: &mut World, frame: &BodyFrame) {
        let solver_pos = frame.solver_position(self.cog);
        let state = world.body_mut(self.state);
        state.rotation = frame.rotation;
        state.position = solver_pos;
    }

    /// Reference-point position of the body.
    pub fn position(&self, world: &World) -> Vec3 {
        self.frame(world).translation
    }

    /// Move the body's reference point, keeping its orientation.
    pub fn set_position(&self, world: &mut World, position: Vec3) {
        let mut frame = self.frame(world);
        frame.translation = position;
        self.set_frame(world, &frame);
    }

    /// Whether the body is asleep. Static bodies are always asleep.
    pub fn is_sleeping(&self, world: &World) -> bool {
        let enabled = world.body(self.state).enabled;
        debug_assert!(!self.is_static || !enabled, "static body must be disabled");
        !enabled
    }

    /// Linear velocity in world space
    pub fn lin_vel(&self, world: &World) -> Vec3 {
        world.body(self.state).lin_vel
    }

    /// Angular velocity in world space
    pub fn ang_vel(&self, world: &World) -> Vec3 {
        world.body(self.state).ang_vel
    }

    /// Linear velocity in body space
    pub fn local_lin_vel(&self, world: &World) -> Vec3 {
        self.frame(world).inverse_transform_vector(self.lin_vel(world))
    }

    /// Angular velocity in body space
    pub fn local_ang_vel(&self, world: &World) -> Vec3 {
        self.frame(world).inverse_transform_vector(self.ang_vel(world))
    }

    /// Set the world-space linear velocity. Ignored with an error for
    /// static bodies.
    pub fn set_lin_vel(&self, world: &mut World, v: Vec3) {
        if self.reject_static("set_lin_vel") {
            return;
        }
        world.body_mut(self.state).lin_vel = v;
    }

    /// Set the world-space angular velocity. Ignored with an error for
    /// static bodies.
    pub fn set_ang_vel(&self, world: &mut World, w: Vec3) {
        if self.reject_static("set_ang_vel") {
            return;
        }
        world.body_mut(self.state).ang_vel = w;
    }

    /// Accumulate a world-space force for the next step.
    pub fn add_force(&self, world: &mut World, force: Vec3) {
        if self.reject_static("add_force") {
            return;
        }
        world.body_mut(self.state).force += force;
    }

    /// Accumulate a world-space torque for the next step.
    pub fn add_torque(&self, world: &mut World, torque: Vec3) {
        if self.reject_static("add_torque") {
            return;
        }
        world.body_mut(self.state).torque += torque;
    }

    /// Accumulate a body-space force for the next step.
    pub fn add_local_force(&self, world: &mut World, force: Vec3) {
        let world_force = self.frame(world).transform_vector(force);
        self.add_force(world, world_force);
    }

    /// Accumulate a body-space torque for the next step.
    pub fn add_local_torque(&self, world: &mut World, torque: Vec3) {
        let world_torque = self.frame(world).transform_vector(torque);
        self.add_torque(world, world_torque);
    }

    /// Apply a world-space force at a world-space point, inducing torque
    /// about the center of gravity.
    pub fn add_force_at_point(&self, world: &mut World, force: Vec3, point: Vec3) {
        if self.reject_static("add_force_at_point") {
            return;
        }
        let cog_pos = world.body(self.state).position;
        let state = world.body_mut(self.state);
        state.force += force;
        state.torque += (point - cog_pos).cross(&force);
    }

    /// Velocity of a world-space point carried by this body.
    pub fn vel_at_point(&self, world: &World, point: Vec3) -> Vec3 {
        world.body(self.state).velocity_at_point(point)
    }

    /// Whether gravity affects this body
    pub fn gravity_enabled(&self, world: &World) -> bool {
        world.body(self.state).gravity_enabled
    }

    /// Enable or disable gravity for this body.
    pub fn enable_gravity(&self, world: &mut World, enabled: bool) {
        world.body_mut(self.state).gravity_enabled = enabled;
    }

    /// Total mass of the body
    pub fn mass(&self, world: &World) -> f32 {
        world.body(self.state).mass.mass
    }

    /// Body-space inertia tensor about the center of gravity
    pub fn inertia_tensor(&self, world: &World) -> crate::foundation::math::Mat3 {
        world.body(self.state).mass.inertia
    }

    /// Rescale the body's total mass, keeping the inertia distribution.
    pub fn set_total_mass(&self, world: &mut World, mass: f32) {
        debug_assert!(mass > 0.0);
        let state = world.body_mut(self.state);
        state.mass = state.mass.adjusted(mass);
    }

    /// Index of the first geom with the given name, if any.
    pub fn geom_index(
        &self,
        geoms: &slotmap::SlotMap<GeomId, Geom>,
        name: &str,
    ) -> Option<usize> {
        self.geoms
            .iter()
            .position(|&id| geoms.get(id).map_or(false, |g| g.name == name))
    }

    fn reject_static(&self, what: &str) -> bool {
        if self.is_static {
            debug_assert!(false, "{what} on static body");
            log::error!("{} on static body {}", what, self.name);
            return true;
        }
        false
    }
}
