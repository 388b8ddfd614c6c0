//! Collision lifecycle events and the handler contract

use crate::body::BodyId;
use crate::foundation::math::Vec3;

use super::geom::GeomId;

/// Lifecycle phase of a collision event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionEventKind {
    /// The pair was not colliding last frame
    Start,
    /// The pair was already colliding last frame
    InProgress,
    /// The pair stopped colliding (position/normal/depth are zeroed)
    Stop,
    /// One-shot query result; no lifecycle tracking
    Single,
}

/// A collision reported to a geom's handler.
///
/// Events are delivered from the perspective of `this_geom`; the normal
/// points away from `other_geom`. The same physical contact is delivered
/// to the other side with the roles swapped and the normal negated.
#[derive(Debug, Clone, Copy)]
pub struct CollisionEvent {
    /// The geom this event is addressed to
    pub this_geom: GeomId,
    /// The geom on the other side
    pub other_geom: GeomId,
    /// Body owning `this_geom`, if any
    pub this_body: Option<BodyId>,
    /// Body owning `other_geom`, if any
    pub other_body: Option<BodyId>,
    /// Deepest contact position in world space
    pub position: Vec3,
    /// Contact normal, pointing toward `this_geom`
    pub normal: Vec3,
    /// Penetration depth; for ray queries, the distance from the ray origin
    pub penetration: f32,
    /// Lifecycle phase
    pub kind: CollisionEventKind,
}

/// A handler's verdict on contact joint generation.
///
/// Votes from both geoms' handlers are combined; when they disagree the
/// collision is logged and joints are suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactGeneration {
    /// Do not generate contact joints
    None,
    /// Generate joints only for the first geom's body
    First,
    /// Generate joints only for the second geom's body
    Second,
    /// Generate joints for both bodies
    Both,
}

impl ContactGeneration {
    /// Collapse a plain yes/no answer into a vote.
    pub fn from_bool(generate: bool) -> Self {
        if generate {
            Self::Both
        } else {
            Self::None
        }
    }

    /// Whether this vote allows any joints at all.
    pub fn any(self) -> bool {
        self != Self::None
    }
}

/// Callback installed on a geom to observe collisions and vote on joint
/// generation.
pub type CollisionHandler = Box<dyn FnMut(&CollisionEvent) -> ContactGeneration>;
