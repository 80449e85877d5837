//! tablesync — Turn & Combat.
//!
//! Owns the authoritative in-memory initiative order, round counter and
//! scene for one session. Every transition either fully applies and returns
//! a snapshot for broadcast, or fails and leaves the state untouched.

pub mod domain;
