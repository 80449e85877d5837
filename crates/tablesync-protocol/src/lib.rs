//! tablesync Protocol — the realtime event vocabulary.
//!
//! Client events arrive as JSON text frames tagged on `"type"`. Server
//! events travel inside an [`envelope::Envelope`] that records whether a
//! client or the server originated them and, for room traffic, a
//! per-session sequence number.

pub mod client;
pub mod envelope;
pub mod metadata;
pub mod records;
pub mod server;
