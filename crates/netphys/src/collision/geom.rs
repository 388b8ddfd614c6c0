//! Geometries: shapes plus their simulation-facing attributes

use slotmap::new_key_type;

use crate::body::BodyId;
use crate::foundation::math::BodyFrame;

use super::material::Material;
use super::shape::Shape;

new_key_type! {
    /// Key of a geometry in the simulator's geom arena.
    pub struct GeomId;
}

/// Which of the two standing spaces a geom currently belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceSlot {
    /// The space holding static and sleeping geometry
    Static,
    /// The space holding awake, dynamic geometry
    Actor,
}

/// A geometry: one collidable shape with its attributes.
///
/// Geoms either belong to a body (positioned by the body's frame combined
/// with their local offset) or stand alone in a space (heightfields, free
/// query rays), positioned by their own pose.
#[derive(Debug, Clone)]
pub struct Geom {
    /// Display name for diagnostics
    pub name: String,
    /// The collision shape
    pub shape: Shape,
    /// Surface and mass properties
    pub material: Material,
    /// Offset from the owning body's reference frame, or the world pose
    /// for body-less geoms
    pub offset: BodyFrame,
    /// Sensors report collisions but never generate contact joints
    pub sensor: bool,
    /// Disabled geoms are skipped by all collision queries
    pub enabled: bool,
    /// Collision category, 0..32
    pub category: u32,
    /// Bitmask of categories this geom collides with
    pub collide_bits: u32,
    /// Owning body, if any
    pub body: Option<BodyId>,
    /// Space membership, if any
    pub space: Option<SpaceSlot>,
}

impl Geom {
    /// Create a geom with default attributes for the given shape.
    pub fn new(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            material: Material::default(),
            offset: BodyFrame::identity(),
            sensor: false,
            enabled: true,
            category: 0,
            collide_bits: u32::MAX,
            body: None,
            space: None,
        }
    }

    /// World pose of this geom given its owning body's frame (if any).
    ///
    /// Ray-like and heightfield geoms ignore the body and use their own
    /// offset as an absolute pose, matching how they are positioned by
    /// their users.
    pub fn world_pose(&self, body_frame: Option<&BodyFrame>) -> BodyFrame {
        match (&self.shape, body_frame) {
            (Shape::Heightfield(_) | Shape::Continuous(_), _) => self.offset,
            (_, Some(frame)) => frame.combine(&self.offset),
            (_, None) => self.offset,
        }
    }

    /// Whether two geoms pass category filtering, mirroring the bitmask
    /// test of the underlying solver model.
    pub fn categories_collide(&self, other: &Geom) -> bool {
        let cat_a = 1u32 << self.category;
        let cat_b = 1u32 << other.category;
        (cat_a & other.collide_bits) != 0 && (cat_b & self.collide_bits) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;

    #[test]
    fn category_filter_is_mutual() {
        let mut a = Geom::new("a", Shape::Sphere { radius: 1.0 });
        let mut b = Geom::new("b", Shape::Sphere { radius: 1.0 });
        a.category = 1;
        b.category = 2;

        a.collide_bits = 1 << 2;
        b.collide_bits = 1 << 1;
        assert!(a.categories_collide(&b));

        // One side revoking the pair kills it.
        b.collide_bits = 0;
        assert!(!a.categories_collide(&b));
    }

    #[test]
    fn world_pose_composes_offset() {
        let mut geom = Geom::new("wheel", Shape::Sphere { radius: 0.5 });
        geom.offset = BodyFrame::from_translation(Vec3::new(1.0, 0.0, 0.0));
        let body = BodyFrame::from_translation(Vec3::new(0.0, 2.0, 0.0));

        let pose = geom.world_pose(Some(&body));
        assert_eq!(pose.translation, Vec3::new(1.0, 2.0, 0.0));
    }
}
