//! Connection registry.
//!
//! Tracks every live connection, the session it is bound to, and the
//! outbound queue that feeds its socket. A secondary index by user lets the
//! dispatcher reach every tab a member has open.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tablesync_core::clock::Clock;
use tablesync_core::error::DomainError;
use tablesync_core::id::{ConnectionId, Identity, SessionId, UserId};
use tablesync_protocol::envelope::Envelope;
use tokio::sync::mpsc;
use tracing::debug;

use crate::domain::connection::Connection;

/// Outbound half of a connection's queue.
pub type Outbound = mpsc::Sender<Arc<Envelope>>;

struct Entry {
    connection: Connection,
    sender: Outbound,
}

/// All live connections, keyed by handle.
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Entry>,
    by_user: DashMap<UserId, HashSet<ConnectionId>>,
    clock: Arc<dyn Clock>,
}

impl ConnectionRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            connections: DashMap::new(),
            by_user: DashMap::new(),
            clock,
        }
    }

    /// Registers a connection and mints its handle.
    pub fn register(&self, identity: Identity, sender: Outbound) -> ConnectionId {
        let id = ConnectionId::new();
        let user_id = identity.user_id;
        let connection = Connection::new(id, identity, self.clock.now());
        self.connections.insert(id, Entry { connection, sender });
        self.by_user.entry(user_id).or_default().insert(id);
        debug!(connection_id = %id, user_id = %user_id, "Connection registered");
        id
    }

    /// Removes a connection, returning its final record. Unknown handles are
    /// a no-op.
    pub fn unregister(&self, connection_id: ConnectionId) -> Option<Connection> {
        let (_, entry) = self.connections.remove(&connection_id)?;
        let user_id = entry.connection.identity.user_id;
        if let Some(mut ids) = self.by_user.get_mut(&user_id) {
            ids.remove(&connection_id);
        }
        self.by_user.remove_if(&user_id, |_, ids| ids.is_empty());
        debug!(connection_id = %connection_id, "Connection unregistered");
        Some(entry.connection)
    }

    /// Binds or unbinds a connection. Returns the previous binding.
    ///
    /// Binding to the session the connection is already in is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConnectionNotFound` for an unknown handle, or
    /// `DomainError::AlreadyInSession` when binding a connection that is
    /// already bound to a different session.
    pub fn set_session(
        &self,
        connection_id: ConnectionId,
        session_id: Option<SessionId>,
    ) -> Result<Option<SessionId>, DomainError> {
        let mut entry = self
            .connections
            .get_mut(&connection_id)
            .ok_or(DomainError::ConnectionNotFound(connection_id))?;
        let previous = entry.connection.session_id;
        if let (Some(current), Some(next)) = (previous, session_id) {
            if current != next {
                return Err(DomainError::AlreadyInSession(current));
            }
        }
        entry.connection.session_id = session_id;
        Ok(previous)
    }

    /// Records inbound activity.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConnectionNotFound` for an unknown handle.
    pub fn touch(&self, connection_id: ConnectionId) -> Result<(), DomainError> {
        let mut entry = self
            .connections
            .get_mut(&connection_id)
            .ok_or(DomainError::ConnectionNotFound(connection_id))?;
        entry.connection.last_activity = self.clock.now();
        Ok(())
    }

    /// A copy of the connection's record.
    #[must_use]
    pub fn get(&self, connection_id: ConnectionId) -> Option<Connection> {
        self.connections
            .get(&connection_id)
            .map(|entry| entry.connection.clone())
    }

    /// The connection's outbound queue.
    #[must_use]
    pub fn sender(&self, connection_id: ConnectionId) -> Option<Outbound> {
        self.connections
            .get(&connection_id)
            .map(|entry| entry.sender.clone())
    }

    /// Outbound queues of `user_id`'s connections bound to `session_id`.
    #[must_use]
    pub fn bound_senders(&self, user_id: UserId, session_id: SessionId) -> Vec<(ConnectionId, Outbound)> {
        let ids: Vec<ConnectionId> = match self.by_user.get(&user_id) {
            Some(ids) => ids.iter().copied().collect(),
            None => return Vec::new(),
        };
        ids.into_iter()
            .filter_map(|id| {
                let entry = self.connections.get(&id)?;
                entry
                    .connection
                    .is_bound_to(session_id)
                    .then(|| (id, entry.sender.clone()))
            })
            .collect()
    }

    /// Whether any of `user_id`'s connections is bound to `session_id`.
    #[must_use]
    pub fn is_online(&self, user_id: UserId, session_id: SessionId) -> bool {
        let Some(ids) = self.by_user.get(&user_id) else {
            return false;
        };
        ids.iter().any(|id| {
            self.connections
                .get(id)
                .is_some_and(|entry| entry.connection.is_bound_to(session_id))
        })
    }

    /// Number of live connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no connection is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
