//! Session room table.
//!
//! Maps session ids to their actor's mailbox. Rooms are created on first
//! join and evicted by the sweeper once they have been empty for the idle
//! window. Each handle carries a generation so that a stale handle is never
//! mistaken for the room that replaced it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tablesync_core::error::DomainError;
use tablesync_core::id::{ConnectionId, Identity, SessionId, UserId};
use tablesync_core::store::SessionRecord;
use tablesync_protocol::records::MemberPresence;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::application::actor::{ActorContext, Mutation, SessionActor, SessionCommand};

#[derive(Clone)]
struct RoomHandle {
    generation: u64,
    mailbox: mpsc::Sender<SessionCommand>,
}

/// Live session rooms.
pub struct SessionRoomTable {
    rooms: DashMap<SessionId, RoomHandle>,
    next_generation: AtomicU64,
    ctx: ActorContext,
    mailbox: usize,
}

impl SessionRoomTable {
    pub(crate) fn new(ctx: ActorContext, mailbox: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            next_generation: AtomicU64::new(1),
            ctx,
            mailbox,
        }
    }

    /// Number of live rooms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Whether no room is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Whether a room for `session_id` is live.
    #[must_use]
    pub fn contains(&self, session_id: SessionId) -> bool {
        self.rooms.contains_key(&session_id)
    }

    /// Adds `identity` to the room for `record`, creating the room on first
    /// use. The joining connection receives its snapshot before the room
    /// hears about the join.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the room could not be
    /// reached after a retry.
    pub(crate) async fn join(
        &self,
        record: &SessionRecord,
        identity: &Identity,
        connection_id: ConnectionId,
    ) -> Result<Vec<MemberPresence>, DomainError> {
        // A room evicted between lookup and delivery drops the request; one
        // retry lands on its replacement.
        for _ in 0..2 {
            let handle = self.open(record);
            let (reply, rx) = oneshot::channel();
            let command = SessionCommand::Join {
                identity: identity.clone(),
                connection_id,
                reply,
            };
            if let Some(result) = request(&handle, command, rx).await {
                return result;
            }
            self.forget(record.session_id, handle.generation);
        }
        Err(DomainError::Infrastructure(format!(
            "session room {} unavailable",
            record.session_id
        )))
    }

    /// Removes `identity` from the room unless another of their connections
    /// is still bound to it. Returns whether they were removed.
    pub(crate) async fn leave(&self, session_id: SessionId, identity: &Identity) -> bool {
        let Some(handle) = self.handle(session_id) else {
            return false;
        };
        let (reply, rx) = oneshot::channel();
        let command = SessionCommand::Leave {
            identity: identity.clone(),
            reply,
        };
        if handle.mailbox.send(command).await.is_err() {
            self.forget(session_id, handle.generation);
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// Sends a snapshot of the room to `connection_id`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotAMember` if the room is gone or `user_id` is
    /// not in it.
    pub(crate) async fn send_snapshot(
        &self,
        session_id: SessionId,
        user_id: UserId,
        connection_id: ConnectionId,
    ) -> Result<(), DomainError> {
        let handle = self
            .handle(session_id)
            .ok_or(DomainError::NotAMember(session_id))?;
        let (reply, rx) = oneshot::channel();
        let command = SessionCommand::Snapshot {
            user_id,
            connection_id,
            reply,
        };
        match request(&handle, command, rx).await {
            Some(result) => result,
            None => {
                self.forget(session_id, handle.generation);
                Err(DomainError::NotAMember(session_id))
            }
        }
    }

    /// Applies `mutation` on behalf of `origin`, in submission order.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotAMember` if the room is gone or `origin` is
    /// not in it, or whatever the transition itself rejects.
    pub(crate) async fn apply(
        &self,
        session_id: SessionId,
        origin: &Identity,
        mutation: Mutation,
    ) -> Result<(), DomainError> {
        let handle = self
            .handle(session_id)
            .ok_or(DomainError::NotAMember(session_id))?;
        let (reply, rx) = oneshot::channel();
        let command = SessionCommand::Apply {
            origin: origin.clone(),
            mutation,
            reply,
        };
        match request(&handle, command, rx).await {
            Some(result) => result,
            None => {
                self.forget(session_id, handle.generation);
                Err(DomainError::NotAMember(session_id))
            }
        }
    }

    /// Evicts every room that has been empty for at least `threshold`.
    /// Returns the number evicted.
    ///
    /// The idle check runs inside each room's actor, so a room with a
    /// mutation queued ahead of the check is never evicted mid-flight.
    pub async fn sweep(&self, threshold: Duration) -> usize {
        let handles: Vec<(SessionId, RoomHandle)> = self
            .rooms
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let mut evicted = 0;
        for (session_id, handle) in handles {
            let (reply, rx) = oneshot::channel();
            let command = SessionCommand::SweepIfIdle { threshold, reply };
            let idle = if handle.mailbox.send(command).await.is_ok() {
                rx.await.unwrap_or(true)
            } else {
                true
            };
            if idle && self.forget(session_id, handle.generation) {
                evicted += 1;
            }
        }
        if evicted > 0 {
            info!(evicted, remaining = self.rooms.len(), "Idle rooms evicted");
        }
        evicted
    }

    fn handle(&self, session_id: SessionId) -> Option<RoomHandle> {
        self.rooms.get(&session_id).map(|entry| entry.value().clone())
    }

    fn open(&self, record: &SessionRecord) -> RoomHandle {
        self.rooms
            .entry(record.session_id)
            .or_insert_with(|| {
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                debug!(session_id = %record.session_id, generation, "Opening session room");
                RoomHandle {
                    generation,
                    mailbox: SessionActor::spawn(record.clone(), self.ctx.clone(), self.mailbox),
                }
            })
            .value()
            .clone()
    }

    /// Drops the table entry if it still points at `generation`.
    fn forget(&self, session_id: SessionId, generation: u64) -> bool {
        self.rooms
            .remove_if(&session_id, |_, handle| handle.generation == generation)
            .is_some()
    }
}

/// Delivers `command` and waits for the reply. `None` means the actor is
/// gone and the command was never applied.
async fn request<T>(
    handle: &RoomHandle,
    command: SessionCommand,
    rx: oneshot::Receiver<Result<T, DomainError>>,
) -> Option<Result<T, DomainError>> {
    handle.mailbox.send(command).await.ok()?;
    rx.await.ok()
}
