//! tablesync — Dice Resolution.
//!
//! Turns a validated roll request into a result using an injected RNG.
//! The engine never touches session or combat state; callers decide what
//! a result implies.

pub mod application;
pub mod domain;
