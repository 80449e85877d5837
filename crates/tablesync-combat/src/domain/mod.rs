//! Domain layer for turn and combat state.

pub mod initiative;
pub mod scene;
pub mod table;
