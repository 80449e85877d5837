//! tablesync — Live Session orchestration.
//!
//! Keeps every connected client's view of a shared, turn-based session
//! consistent and ordered. Each session is owned by one actor task that
//! applies mutations strictly in submission order and fans the results out
//! to the room; independent sessions never share a lock.
//!
//! This crate is a volatile coordination layer. Durable records live behind
//! [`tablesync_core::store::SessionStore`].

pub mod application;
pub mod config;
pub mod domain;

pub use application::supervisor::{FrameOutcome, Orchestrator};
pub use config::OrchestratorConfig;
