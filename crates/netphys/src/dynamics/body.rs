//! Solver-level body state
//!
//! The solver knows nothing about centers of gravity, geometries or spaces;
//! it integrates plain states at their mass centers. Everything above it
//! addresses bodies through [`crate::body::RigidBody`].

use crate::foundation::math::{Mat3, Vec3};

use super::mass::MassProperties;

/// Auto-disable bookkeeping: how long a body has been (nearly) at rest.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleTracker {
    /// Consecutive seconds below the velocity thresholds
    pub time: f32,
    /// Consecutive steps below the velocity thresholds
    pub steps: u32,
}

impl IdleTracker {
    /// Reset after any significant motion
    pub fn reset(&mut self) {
        self.time = 0.0;
        self.steps = 0;
    }
}

/// Raw dynamic state of one solver body.
#[derive(Debug, Clone)]
pub struct BodyState {
    /// World position of the center of gravity
    pub position: Vec3,
    /// Orientation as a rotation matrix
    pub rotation: Mat3,
    /// Linear velocity in world space
    pub lin_vel: Vec3,
    /// Angular velocity in world space
    pub ang_vel: Vec3,
    /// Accumulated force for the current step
    pub force: Vec3,
    /// Accumulated torque for the current step
    pub torque: Vec3,
    /// Mass and inertia about the center of gravity
    pub mass: MassProperties,
    /// Whether the body takes part in integration; disabled bodies sleep
    pub enabled: bool,
    /// Whether gravity is applied to this body
    pub gravity_enabled: bool,
    /// Whether auto-disable may put this body to sleep
    pub auto_disable: bool,
    /// Whether the body is submerged; increases damping
    pub below_water: bool,
    /// Rest detection state
    pub idle: IdleTracker,
}

impl Default for BodyState {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Mat3::identity(),
            lin_vel: Vec3::zeros(),
            ang_vel: Vec3::zeros(),
            force: Vec3::zeros(),
            torque: Vec3::zeros(),
            mass: MassProperties::zero(),
            enabled: true,
            gravity_enabled: true,
            auto_disable: true,
            below_water: false,
            idle: IdleTracker::default(),
        }
    }
}

impl BodyState {
    /// Zero both velocities, e.g. when putting a body to sleep.
    pub fn clear_velocities(&mut self) {
        self.lin_vel = Vec3::zeros();
        self.ang_vel = Vec3::zeros();
    }

    /// World-space inertia tensor for the current orientation.
    pub fn world_inertia(&self) -> Mat3 {
        self.rotation * self.mass.inertia * self.rotation.transpose()
    }

    /// Velocity of the world-space point `p` carried by this body.
    pub fn velocity_at_point(&self, p: Vec3) -> Vec3 {
        self.lin_vel + self.ang_vel.cross(&(p - self.position))
    }
}
