//! Surface materials and their combination rules

use serde::{Deserialize, Serialize};

/// Surface and mass properties of a geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Coulomb friction coefficient
    pub friction: f32,
    /// Restitution in [0, 1]
    pub bounciness: f32,
    /// Mass contributed to the owning body, in kg
    pub mass: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            friction: 1.0,
            bounciness: 0.0,
            mass: 1.0,
        }
    }
}

impl Material {
    /// Combined friction of two touching surfaces: geometric mean.
    pub fn combined_friction(a: &Material, b: &Material) -> f32 {
        (a.friction * b.friction).sqrt()
    }

    /// Combined restitution of two touching surfaces: arithmetic mean.
    pub fn combined_bounciness(a: &Material, b: &Material) -> f32 {
        0.5 * (a.bounciness + b.bounciness)
    }
}
