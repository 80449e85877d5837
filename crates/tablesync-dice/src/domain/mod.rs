//! Domain layer for dice resolution.

pub mod die;
pub mod roll;
