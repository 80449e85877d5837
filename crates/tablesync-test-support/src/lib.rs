//! Shared test doubles for the tablesync session orchestrator.

mod clock;
mod narrator;
mod rng;
mod store;

pub use clock::{FixedClock, ManualClock};
pub use narrator::{FailingNarrator, ScriptedNarrator};
pub use rng::{MockRng, SequenceRng};
pub use store::{DelayedSessionStore, FailingSessionStore, InMemorySessionStore};
