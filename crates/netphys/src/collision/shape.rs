//! Collision shape variants
//!
//! The shape set is closed, so shapes are modeled as a tagged variant with
//! exhaustive matches instead of a trait hierarchy. Mesh and heightfield
//! payloads are shared between blueprint and instances via `Arc`.

use std::sync::Arc;

use crate::dynamics::MassProperties;
use crate::foundation::math::{BodyFrame, Vec3};

use super::aabb::Aabb;
use super::mesh::{HeightfieldData, TriMeshData};

/// Runtime state of a continuous (swept) geometry.
///
/// Each frame the simulator turns the motion since the previous frame into
/// a ray from the old to the new position, so fast movers cannot tunnel
/// between discrete steps.
#[derive(Debug, Clone, Default)]
pub struct ContinuousState {
    /// Body position at the previous frame, `None` until the first advance
    pub prev_pos: Option<Vec3>,
    /// Current sweep origin in world space
    pub origin: Vec3,
    /// Current sweep direction (unit length when active)
    pub direction: Vec3,
    /// Current sweep length
    pub length: f32,
}

/// Collision shape of a geometry.
#[derive(Debug, Clone)]
pub enum Shape {
    /// Sphere of the given radius
    Sphere {
        /// Sphere radius
        radius: f32,
    },
    /// Capsule: cylinder of `length` capped by hemispheres of `radius`,
    /// aligned with the local Z axis
    Capsule {
        /// Cap radius
        radius: f32,
        /// Cylinder length, excluding the caps
        length: f32,
    },
    /// Axis-aligned box in local space with full side lengths
    Box {
        /// Side length along local X
        x: f32,
        /// Side length along local Y
        y: f32,
        /// Side length along local Z
        z: f32,
    },
    /// Half-space below `normal . p = d`, in the owning body's space.
    /// Only valid in static bodies.
    Plane {
        /// Plane normal (unit length)
        normal: Vec3,
        /// Plane offset along the normal
        d: f32,
    },
    /// Ray along the geometry's local Z axis
    Ray {
        /// Ray length
        length: f32,
    },
    /// Triangle mesh. Only valid in static bodies.
    TriMesh(Arc<TriMeshData>),
    /// Swept ray covering the owning body's motion since the last frame
    Continuous(ContinuousState),
    /// Regular-grid heightfield. Belongs directly to a space, not a body.
    Heightfield(Arc<HeightfieldData>),
}

impl Shape {
    /// Short display name of the shape kind
    pub fn kind_name(&self) -> &'static str {
        match self {
            Shape::Sphere { .. } => "Sphere",
            Shape::Capsule { .. } => "Capsule",
            Shape::Box { .. } => "Box",
            Shape::Plane { .. } => "Plane",
            Shape::Ray { .. } => "Ray",
            Shape::TriMesh(_) => "TriMesh",
            Shape::Continuous(_) => "Continuous",
            Shape::Heightfield(_) => "Heightfield",
        }
    }

    /// Whether this shape reports ray-style contacts, where "penetration"
    /// is the distance from the ray origin rather than an overlap depth.
    pub fn is_ray_like(&self) -> bool {
        matches!(self, Shape::Ray { .. } | Shape::Continuous(_))
    }

    /// Mass properties contributed by this shape for the given material
    /// mass. Shapes without volume contribute nothing.
    pub fn mass_properties(&self, mass: f32) -> MassProperties {
        match *self {
            Shape::Sphere { radius } => MassProperties::sphere(mass, radius),
            Shape::Capsule { radius, length } => MassProperties::capsule(mass, radius, length),
            Shape::Box { x, y, z } => MassProperties::cuboid(mass, x, y, z),
            Shape::Plane { .. }
            | Shape::Ray { .. }
            | Shape::TriMesh(_)
            | Shape::Continuous(_)
            | Shape::Heightfield(_) => MassProperties::zero(),
        }
    }

    /// World-space bounding box of the shape under the given pose.
    pub fn aabb(&self, pose: &BodyFrame) -> Aabb {
        match self {
            Shape::Sphere { radius } => {
                Aabb::from_center_extents(pose.translation, Vec3::from_element(*radius))
            }
            Shape::Capsule { radius, length } => {
                let axis = pose.transform_vector(Vec3::new(0.0, 0.0, 0.5 * length));
                let mut aabb = Aabb::from_center_extents(
                    pose.translation + axis,
                    Vec3::from_element(*radius),
                );
                let other = Aabb::from_center_extents(
                    pose.translation - axis,
                    Vec3::from_element(*radius),
                );
                aabb.expand_to(other.min);
                aabb.expand_to(other.max);
                aabb
            }
            Shape::Box { x, y, z } => {
                let half = Vec3::new(0.5 * x, 0.5 * y, 0.5 * z);
                // Extents of a rotated box: sum of the rotated half-axes'
                // absolute components.
                let r = pose.rotation.abs();
                Aabb::from_center_extents(pose.translation, r * half)
            }
            Shape::Plane { .. } => Aabb::everything(),
            Shape::Ray { length } => {
                let end = pose.transform_point(Vec3::new(0.0, 0.0, *length));
                let mut aabb = Aabb::new(pose.translation, pose.translation);
                aabb.expand_to(end);
                aabb
            }
            Shape::TriMesh(mesh) => Aabb::from_center_extents(
                pose.translation,
                Vec3::from_element(mesh.bounding_radius),
            ),
            Shape::Continuous(state) => {
                let mut aabb = Aabb::new(state.origin, state.origin);
                aabb.expand_to(state.origin + state.direction * state.length);
                aabb
            }
            Shape::Heightfield(field) => {
                let min = pose.translation
                    + Vec3::new(-0.5 * field.dim_x(), field.min_height, -0.5 * field.dim_z());
                let max = pose.translation
                    + Vec3::new(0.5 * field.dim_x(), field.max_height, 0.5 * field.dim_z());
                Aabb::new(min, max)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sphere_aabb_follows_pose() {
        let pose = BodyFrame::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let aabb = Shape::Sphere { radius: 0.5 }.aabb(&pose);
        assert_relative_eq!(aabb.min, Vec3::new(0.5, 1.5, 2.5), epsilon = 1e-6);
        assert_relative_eq!(aabb.max, Vec3::new(1.5, 2.5, 3.5), epsilon = 1e-6);
    }

    #[test]
    fn rotated_box_aabb_grows() {
        let rot = nalgebra::Rotation3::from_euler_angles(0.0, std::f32::consts::FRAC_PI_4, 0.0)
            .matrix()
            .clone_owned();
        let pose = BodyFrame::new(rot, Vec3::zeros());
        let aabb = Shape::Box {
            x: 2.0,
            y: 2.0,
            z: 2.0,
        }
        .aabb(&pose);
        // A 45 degree rotation widens the footprint to sqrt(2).
        assert_relative_eq!(aabb.max.x, std::f32::consts::SQRT_2, epsilon = 1e-5);
        assert_relative_eq!(aabb.max.y, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn volumeless_shapes_have_no_mass() {
        assert_eq!(Shape::Ray { length: 5.0 }.mass_properties(3.0).mass, 0.0);
    }
}
