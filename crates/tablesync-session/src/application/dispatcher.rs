//! Broadcast dispatcher.
//!
//! Fans an envelope out to connection queues without ever waiting on a
//! socket. A full or closed queue affects only its own connection.

use std::sync::Arc;

use tablesync_core::id::{ConnectionId, SessionId, UserId};
use tablesync_protocol::envelope::Envelope;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::application::registry::{ConnectionRegistry, Outbound};

/// What happened to one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Queues that accepted the envelope.
    pub delivered: usize,
    /// Queues that were full or closed.
    pub dropped: usize,
}

/// Delivers envelopes to registered connections.
pub struct BroadcastDispatcher {
    registry: Arc<ConnectionRegistry>,
}

impl BroadcastDispatcher {
    /// A dispatcher over `registry`.
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Sends `envelope` to every connection of `recipients` bound to
    /// `session_id`.
    pub fn publish(
        &self,
        session_id: SessionId,
        recipients: &[UserId],
        envelope: Envelope,
    ) -> DeliveryReport {
        let envelope = Arc::new(envelope);
        let mut report = DeliveryReport::default();
        for user_id in recipients {
            for (connection_id, sender) in self.registry.bound_senders(*user_id, session_id) {
                if deliver(connection_id, &sender, &envelope) {
                    report.delivered += 1;
                } else {
                    report.dropped += 1;
                }
            }
        }
        debug!(
            session_id = %session_id,
            event = envelope.event.name(),
            seq = ?envelope.seq,
            delivered = report.delivered,
            dropped = report.dropped,
            "Envelope published"
        );
        report
    }

    /// Sends `envelope` to one connection. Returns whether it was queued.
    pub fn send_to(&self, connection_id: ConnectionId, envelope: Envelope) -> bool {
        match self.registry.sender(connection_id) {
            Some(sender) => deliver(connection_id, &sender, &Arc::new(envelope)),
            None => {
                debug!(connection_id = %connection_id, "Send to unknown connection skipped");
                false
            }
        }
    }
}

fn deliver(connection_id: ConnectionId, sender: &Outbound, envelope: &Arc<Envelope>) -> bool {
    match sender.try_send(Arc::clone(envelope)) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!(
                connection_id = %connection_id,
                event = envelope.event.name(),
                "Outbound queue full, dropping message"
            );
            false
        }
        Err(TrySendError::Closed(_)) => {
            debug!(connection_id = %connection_id, "Outbound queue closed");
            false
        }
    }
}
