//! Typed envelope around every server event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tablesync_core::id::{Identity, SessionId};

use crate::server::ServerEvent;

/// Who caused an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Origin {
    /// Relayed from a client request, annotated with the sender.
    Client(Identity),
    /// Generated by the orchestrator itself.
    Server,
}

/// One message on the wire from orchestrator to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-session sequence number for room traffic. Absent on
    /// connection-level events such as `connected`, `pong` and `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    /// Session the event belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// Client- or server-originated.
    pub origin: Origin,
    /// Server time the envelope was built.
    pub sent_at: DateTime<Utc>,
    /// The event itself.
    pub event: ServerEvent,
}

impl Envelope {
    /// A sessionless, server-originated envelope.
    #[must_use]
    pub fn direct(event: ServerEvent, sent_at: DateTime<Utc>) -> Self {
        Self {
            seq: None,
            session_id: None,
            origin: Origin::Server,
            sent_at,
            event,
        }
    }

    /// A room envelope with its sequence number.
    #[must_use]
    pub fn room(
        session_id: SessionId,
        seq: u64,
        origin: Origin,
        event: ServerEvent,
        sent_at: DateTime<Utc>,
    ) -> Self {
        Self {
            seq: Some(seq),
            session_id: Some(session_id),
            origin,
            sent_at,
            event,
        }
    }

    /// A session envelope for a subset of the room, such as a whisper or a
    /// snapshot. Carries no sequence number so other members see no gap.
    #[must_use]
    pub fn targeted(
        session_id: SessionId,
        origin: Origin,
        event: ServerEvent,
        sent_at: DateTime<Utc>,
    ) -> Self {
        Self {
            seq: None,
            session_id: Some(session_id),
            origin,
            sent_at,
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablesync_core::id::UserId;

    #[test]
    fn test_direct_envelope_omits_seq_and_session() {
        let envelope = Envelope::direct(ServerEvent::Pong { timestamp: 1 }, Utc::now());
        let json = serde_json::to_value(&envelope).unwrap();
        assert!(json.get("seq").is_none());
        assert!(json.get("session_id").is_none());
        assert_eq!(json["origin"]["kind"], "server");
        assert_eq!(json["event"]["type"], "pong");
    }

    #[test]
    fn test_client_origin_carries_identity() {
        let identity = Identity::new(UserId::new(), "Aria");
        let envelope = Envelope::room(
            SessionId::new(),
            7,
            Origin::Client(identity.clone()),
            ServerEvent::Pong { timestamp: 1 },
            Utc::now(),
        );
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["seq"], 7);
        assert_eq!(json["origin"]["kind"], "client");
        assert_eq!(json["origin"]["display_name"], "Aria");

        let back: Envelope = serde_json::from_value(json).unwrap();
        assert_eq!(back.origin, Origin::Client(identity));
    }
}
