//! tablesync Core — shared identifiers, errors and collaborator seams.
//!
//! Every other crate in the workspace depends on this one. It holds no
//! runtime state; the orchestrator itself lives in `tablesync-session`.

pub mod clock;
pub mod error;
pub mod id;
pub mod narrator;
pub mod rng;
pub mod store;
