//! A live client connection as the registry sees it.

use chrono::{DateTime, Utc};
use tablesync_core::id::{ConnectionId, Identity, SessionId};

/// Registry record for one live connection.
///
/// The socket itself is never stored here; outbound traffic goes through
/// the sender the registry keeps alongside this record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// Unique handle, minted at registration.
    pub id: ConnectionId,
    /// Who is on the other end.
    pub identity: Identity,
    /// The session this connection is bound to, if any.
    pub session_id: Option<SessionId>,
    /// When the connection registered.
    pub connected_at: DateTime<Utc>,
    /// Last inbound message.
    pub last_activity: DateTime<Utc>,
}

impl Connection {
    /// A fresh, unbound connection.
    #[must_use]
    pub fn new(id: ConnectionId, identity: Identity, now: DateTime<Utc>) -> Self {
        Self {
            id,
            identity,
            session_id: None,
            connected_at: now,
            last_activity: now,
        }
    }

    /// Whether this connection is bound to `session_id`.
    #[must_use]
    pub fn is_bound_to(&self, session_id: SessionId) -> bool {
        self.session_id == Some(session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablesync_core::id::UserId;

    #[test]
    fn test_new_connection_is_unbound() {
        let now = Utc::now();
        let connection = Connection::new(
            ConnectionId::new(),
            Identity::new(UserId::new(), "Aria"),
            now,
        );
        assert!(connection.session_id.is_none());
        assert_eq!(connection.connected_at, now);
        assert!(!connection.is_bound_to(SessionId::new()));
    }
}
