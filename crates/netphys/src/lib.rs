//! # netphys
//!
//! Fixed-timestep rigid body simulation with networked target/proxy
//! synchronization.
//!
//! ## Architecture
//!
//! - [`dynamics`] — the solver layer: body states, mass aggregation,
//!   contact joints and the iterative stepping world. It has no notion of
//!   geometries, spaces or centers of gravity.
//! - [`collision`] — shapes, geoms, the two-phase collision spaces and the
//!   start/in-progress/stop event lifecycle with contact merging.
//! - [`body`] — rigid body handles (blueprint and live) with
//!   center-of-gravity-corrected transform access.
//! - [`simulator`] — owner of the world, the static and actor spaces and
//!   the per-tick pipeline: sweep advance, collide, velocity caps and
//!   damping, solver step.
//! - [`model`] — blueprint loading from RON shape descriptions, cached by
//!   name.
//! - [`net`] — the networked body: authoritative target, interpolated
//!   proxy, dead reckoning and bit-packed wire state.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use netphys::prelude::*;
//!
//! let config = PhysicsConfig::default();
//! let mut simulator = Simulator::new("server", config);
//! let mut loader = ModelLoader::new("data/models");
//!
//! let target = loader.instantiate_model(&mut simulator, "crate")?;
//! let mut net_body = NetworkedBody::new(&mut simulator, target, 1, false);
//!
//! // Once per logic tick:
//! let dt = 1.0 / 60.0;
//! simulator.frame_move(dt);
//! net_body.frame_move(&mut simulator, dt);
//! # Ok::<(), netphys::model::ModelError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod body;
pub mod collision;
pub mod config;
pub mod dynamics;
pub mod foundation;
pub mod model;
pub mod net;
pub mod simulator;

/// Common imports for crate users
pub mod prelude {
    pub use crate::body::{BodyBlueprint, BodyId, RigidBody};
    pub use crate::collision::{
        CollisionEvent, CollisionEventKind, CollisionSpace, ContactGeneration, Geom, GeomId,
        Material, Shape, SpaceSlot,
    };
    pub use crate::config::{Config, PhysicsConfig};
    pub use crate::foundation::math::{BodyFrame, Mat3, Mat4, Vec3};
    pub use crate::foundation::time::TaskScheduler;
    pub use crate::model::{ModelError, ModelLoader};
    pub use crate::net::{
        BitReader, BitWriter, BodyEvent, NetworkedBody, ProxyState, StateGroups,
    };
    pub use crate::simulator::Simulator;
}
