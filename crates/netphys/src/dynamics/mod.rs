//! The solver layer: body states, mass aggregation, contact joints and the
//! stepping world.
//!
//! This layer plays the role of the external rigid body solver: it has no
//! notion of geometries, collision spaces or centers of gravity. The
//! simulation and handle layers above it translate between the two views.

mod body;
mod contact;
mod mass;
mod world;

pub use body::{BodyState, IdleTracker};
pub use contact::{ContactGroup, ContactJoint};
pub use mass::MassProperties;
pub use world::{SolverBodyKey, World};
