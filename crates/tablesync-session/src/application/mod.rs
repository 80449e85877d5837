//! Application layer: registry, per-session actors, fan-out and the
//! supervisor that wires them to the wire protocol.

pub mod dispatcher;
pub mod registry;
pub mod rooms;
pub mod supervisor;

mod actor;
