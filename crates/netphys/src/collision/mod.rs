//! Collision detection: shapes, geoms, spaces and the event lifecycle

pub mod aabb;
pub mod event;
pub mod geom;
pub mod material;
pub mod mesh;
pub mod primitives;
pub mod quadtree;
pub mod shape;
pub mod space;

pub use aabb::Aabb;
pub use event::{CollisionEvent, CollisionEventKind, CollisionHandler, ContactGeneration};
pub use geom::{Geom, GeomId, SpaceSlot};
pub use material::Material;
pub use mesh::{HeightfieldData, TriMeshData};
pub use primitives::{Contact, Ray};
pub use quadtree::Quadtree;
pub use shape::{ContinuousState, Shape};
pub use space::{CollisionSpace, GeomContext, NarrowContext, PairBatch};
