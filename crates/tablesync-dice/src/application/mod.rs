//! Application layer for dice resolution.

pub mod resolver;
