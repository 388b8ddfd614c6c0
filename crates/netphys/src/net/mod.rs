//! Networked state synchronization: wire encoding, reconciliation policy
//! and the target/proxy body pair

pub mod bitstream;
pub mod networked_body;
pub mod reconcile;

pub use bitstream::{BitReader, BitWriter};
pub use networked_body::{BodyEvent, BodyEventSink, NetworkedBody, ProxyState, StateGroups};
pub use reconcile::{approach_velocity, ReconcilePolicy};
