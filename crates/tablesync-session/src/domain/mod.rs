//! Domain layer: connection records, room membership and bounded logs.

pub mod connection;
pub mod flood;
pub mod log;
pub mod room;
