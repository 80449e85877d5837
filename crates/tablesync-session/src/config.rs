//! Orchestrator tuning knobs.

use std::time::Duration;

/// Runtime configuration for the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// How long an empty room survives before the sweeper evicts it.
    pub idle_room_ttl: Duration,
    /// Period of the idle-room sweep.
    pub sweep_interval: Duration,
    /// Per-connection outbound queue length.
    pub outbound_buffer: usize,
    /// Per-session actor inbound queue length.
    pub session_mailbox: usize,
    /// Recent entries kept per log for snapshots.
    pub log_retention: usize,
    /// Inbound messages allowed per connection per `flood_window`.
    pub flood_max_messages: usize,
    /// Flood-guard window.
    pub flood_window: Duration,
    /// Largest accepted inbound frame, in bytes.
    pub max_frame_bytes: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            idle_room_ttl: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(30),
            outbound_buffer: 256,
            session_mailbox: 1024,
            log_retention: 100,
            flood_max_messages: 60,
            flood_window: Duration::from_secs(10),
            max_frame_bytes: 64 * 1024,
        }
    }
}
