//! Contact joints
//!
//! Contact joints live for exactly one step: the collision pass fills the
//! group, the solver consumes it, and the simulator clears it afterwards.

use crate::foundation::math::Vec3;

use super::world::SolverBodyKey;

/// A single contact constraint between two bodies.
///
/// A `None` body stands for the immovable world (static geometry).
#[derive(Debug, Clone, Copy)]
pub struct ContactJoint {
    /// First body, or `None` if static
    pub body_a: Option<SolverBodyKey>,
    /// Second body, or `None` if static
    pub body_b: Option<SolverBodyKey>,
    /// Contact position in world space
    pub position: Vec3,
    /// Contact normal, pointing from `body_b` toward `body_a`
    pub normal: Vec3,
    /// Penetration depth along the normal
    pub depth: f32,
    /// Combined friction coefficient
    pub friction: f32,
    /// Combined restitution
    pub bounce: f32,
}

/// Per-step group of contact joints.
#[derive(Debug, Default)]
pub struct ContactGroup {
    joints: Vec<ContactJoint>,
}

impl ContactGroup {
    /// Create an empty group
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a joint for this step
    pub fn add(&mut self, joint: ContactJoint) {
        self.joints.push(joint);
    }

    /// The joints accumulated this step
    pub fn joints(&self) -> &[ContactJoint] {
        &self.joints
    }

    /// Number of joints accumulated this step
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    /// Whether the group holds no joints
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Drop all joints; called at the end of every step
    pub fn clear(&mut self) {
        self.joints.clear();
    }
}
