//! Lifecycle supervisor.
//!
//! The single entry point transports talk to. Each operation validates its
//! input, gathers anything it needs from collaborators, then hands a
//! fully-resolved mutation to the session's actor. Failures become a
//! self-targeted `error` event; no failure closes the connection.

use std::sync::{Arc, Mutex};

use tablesync_core::clock::Clock;
use tablesync_core::error::DomainError;
use tablesync_core::id::{ConnectionId, Identity, SessionId};
use tablesync_core::narrator::NarrativeEngine;
use tablesync_core::rng::DeterministicRng;
use tablesync_core::store::{CharacterUpdate, SessionStore};
use tablesync_dice::application::resolver;
use tablesync_dice::domain::roll::DiceRollRequest;
use tablesync_protocol::client::{
    CharacterUpdatePayload, ChatPayload, ClientEvent, GameActionPayload,
};
use tablesync_protocol::envelope::Envelope;
use tablesync_protocol::records::{ActionType, MemberPresence};
use tablesync_protocol::server::ServerEvent;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use crate::application::actor::{ActorContext, Mutation};
use crate::application::dispatcher::BroadcastDispatcher;
use crate::application::registry::{ConnectionRegistry, Outbound};
use crate::application::rooms::SessionRoomTable;
use crate::config::OrchestratorConfig;
use crate::domain::connection::Connection;
use crate::domain::flood::FloodGuard;

/// What the transport should do after a frame was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Keep reading.
    Continue,
    /// Close the connection; a `force_disconnect` has been queued.
    Disconnect,
}

/// Owns the registry, the room table and every collaborator.
pub struct Orchestrator {
    config: OrchestratorConfig,
    clock: Arc<dyn Clock>,
    rng: Arc<Mutex<dyn DeterministicRng + Send>>,
    store: Arc<dyn SessionStore>,
    narrator: Arc<dyn NarrativeEngine>,
    registry: Arc<ConnectionRegistry>,
    dispatcher: Arc<BroadcastDispatcher>,
    rooms: SessionRoomTable,
}

impl Orchestrator {
    /// Wires an orchestrator from its collaborators.
    #[must_use]
    pub fn new(
        config: OrchestratorConfig,
        clock: Arc<dyn Clock>,
        rng: Arc<Mutex<dyn DeterministicRng + Send>>,
        store: Arc<dyn SessionStore>,
        narrator: Arc<dyn NarrativeEngine>,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new(Arc::clone(&clock)));
        let dispatcher = Arc::new(BroadcastDispatcher::new(Arc::clone(&registry)));
        let rooms = SessionRoomTable::new(
            ActorContext {
                clock: Arc::clone(&clock),
                registry: Arc::clone(&registry),
                dispatcher: Arc::clone(&dispatcher),
                store: Arc::clone(&store),
                log_retention: config.log_retention,
            },
            config.session_mailbox,
        );
        Self {
            config,
            clock,
            rng,
            store,
            narrator,
            registry,
            dispatcher,
            rooms,
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Number of live connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Number of live session rooms.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Whether a room for `session_id` is currently live.
    #[must_use]
    pub fn has_room(&self, session_id: SessionId) -> bool {
        self.rooms.contains(session_id)
    }

    /// A fresh flood guard sized from the configuration.
    #[must_use]
    pub fn flood_guard(&self) -> FloodGuard {
        FloodGuard::new(self.config.flood_max_messages, self.config.flood_window)
    }

    // --- connection lifecycle ---

    /// Registers a connection and acknowledges it with `connected`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for a malformed identity.
    #[instrument(skip(self, identity, sender), fields(user_id = %identity.user_id))]
    pub fn on_connect(
        &self,
        identity: Identity,
        sender: Outbound,
    ) -> Result<ConnectionId, DomainError> {
        if !identity.is_well_formed() {
            return Err(DomainError::Validation(
                "display name must be 1-64 characters".to_owned(),
            ));
        }
        let connection_id = self.registry.register(identity.clone(), sender);
        self.send_direct(
            connection_id,
            ServerEvent::Connected {
                identity,
                connection_id,
            },
        );
        info!(connection_id = %connection_id, "Client connected");
        Ok(connection_id)
    }

    /// Unregisters a connection and, if it was the user's last one in its
    /// session, removes the user from the room.
    #[instrument(skip(self))]
    pub async fn on_disconnect(&self, connection_id: ConnectionId) {
        let Some(connection) = self.registry.unregister(connection_id) else {
            return;
        };
        if let Some(session_id) = connection.session_id {
            self.release_membership(session_id, &connection.identity)
                .await;
        }
        info!(user_id = %connection.identity.user_id, "Client disconnected");
    }

    /// Binds the connection to `session_id` and adds its user to the room.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AlreadyInSession` if the connection is bound
    /// elsewhere, `DomainError::SessionNotFound` if the store has no such
    /// session, or the store's own error.
    #[instrument(skip(self))]
    pub async fn on_join(
        &self,
        connection_id: ConnectionId,
        session_id: SessionId,
    ) -> Result<Vec<MemberPresence>, DomainError> {
        let connection = self.connection(connection_id)?;
        if let Some(current) = connection.session_id {
            return Err(DomainError::AlreadyInSession(current));
        }

        let record = self
            .store
            .load_session(session_id)
            .await?
            .ok_or(DomainError::SessionNotFound(session_id))?;

        self.registry.set_session(connection_id, Some(session_id))?;
        match self
            .rooms
            .join(&record, &connection.identity, connection_id)
            .await
        {
            Ok(members) => Ok(members),
            Err(e) => {
                // Nothing joined; leave the connection unbound.
                let _ = self.registry.set_session(connection_id, None);
                Err(e)
            }
        }
    }

    /// Unbinds the connection from `session_id`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotAMember` if the connection is not bound to
    /// `session_id`.
    #[instrument(skip(self))]
    pub async fn on_leave(
        &self,
        connection_id: ConnectionId,
        session_id: SessionId,
    ) -> Result<(), DomainError> {
        let connection = self.bound_connection(connection_id, session_id)?;
        self.registry.set_session(connection_id, None)?;
        self.release_membership(session_id, &connection.identity)
            .await;
        Ok(())
    }

    /// The room decides whether the user is really gone, so the check is
    /// ordered with any join from another of the user's connections.
    async fn release_membership(&self, session_id: SessionId, identity: &Identity) {
        self.rooms.leave(session_id, identity).await;
    }

    // --- session traffic ---

    /// Sends a full snapshot to the requesting connection.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotAMember` if the connection is not bound to
    /// `session_id`.
    #[instrument(skip(self))]
    pub async fn get_state(
        &self,
        connection_id: ConnectionId,
        session_id: SessionId,
    ) -> Result<(), DomainError> {
        let connection = self.bound_connection(connection_id, session_id)?;
        self.rooms
            .send_snapshot(session_id, connection.identity.user_id, connection_id)
            .await
    }

    /// Applies a game action. Narration requests call the narrative engine
    /// first and only then enter the session.
    ///
    /// # Errors
    ///
    /// Returns validation, membership or transition errors, or
    /// `DomainError::Infrastructure` if the narrative engine fails.
    #[instrument(
        skip(self, payload),
        fields(session_id = %payload.session_id, action = ?payload.action)
    )]
    pub async fn on_game_action(
        &self,
        connection_id: ConnectionId,
        payload: GameActionPayload,
    ) -> Result<(), DomainError> {
        payload.validate()?;
        let connection = self.bound_connection(connection_id, payload.session_id)?;
        let session_id = payload.session_id;

        let mutation = if payload.action == ActionType::RequestNarration {
            let text = self
                .narrator
                .narrate(session_id, payload.content.trim())
                .await
                .map_err(|e| match e {
                    DomainError::Infrastructure(_) => e,
                    other => DomainError::Infrastructure(format!("narration failed: {other}")),
                })?;
            Mutation::Narration { payload, text }
        } else {
            Mutation::Action(payload)
        };

        self.rooms
            .apply(session_id, &connection.identity, mutation)
            .await
    }

    /// Resolves a dice roll in the connection's session and broadcasts it.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the connection has not joined a
    /// session, or the resolver's errors.
    #[instrument(skip(self, request), fields(die = ?request.die_type))]
    pub async fn on_dice_roll(
        &self,
        connection_id: ConnectionId,
        request: DiceRollRequest,
    ) -> Result<(), DomainError> {
        let connection = self.connection(connection_id)?;
        let session_id = connection.session_id.ok_or_else(|| {
            DomainError::Validation("join a session before rolling dice".to_owned())
        })?;

        // The RNG lock is scoped to this synchronous call.
        let result = resolver::resolve_shared(
            &request,
            &connection.identity,
            self.clock.as_ref(),
            self.rng.as_ref(),
        )?;
        info!(
            session_id = %session_id,
            kept = result.kept,
            total = result.total,
            "Dice rolled"
        );

        self.rooms
            .apply(session_id, &connection.identity, Mutation::DiceRoll(result))
            .await
    }

    /// Relays a chat message to the room or, for whispers, to the sender
    /// and target only.
    ///
    /// # Errors
    ///
    /// Returns validation or membership errors.
    #[instrument(skip(self, payload), fields(session_id = %payload.session_id, kind = ?payload.kind))]
    pub async fn on_chat(
        &self,
        connection_id: ConnectionId,
        payload: ChatPayload,
    ) -> Result<(), DomainError> {
        let route = payload.validate()?;
        let connection = self.bound_connection(connection_id, payload.session_id)?;
        let session_id = payload.session_id;
        self.rooms
            .apply(
                session_id,
                &connection.identity,
                Mutation::Chat { payload, route },
            )
            .await
    }

    /// Saves a character update through the store, then broadcasts it.
    ///
    /// # Errors
    ///
    /// Returns validation or membership errors, or the store's error; on a
    /// store failure nothing is broadcast.
    #[instrument(
        skip(self, payload),
        fields(session_id = %payload.session_id, character_id = %payload.character_id)
    )]
    pub async fn on_character_update(
        &self,
        connection_id: ConnectionId,
        payload: CharacterUpdatePayload,
    ) -> Result<(), DomainError> {
        payload.validate()?;
        let connection = self.bound_connection(connection_id, payload.session_id)?;
        let update = CharacterUpdate {
            session_id: payload.session_id,
            character_id: payload.character_id,
            updates: payload.updates,
            updated_by: connection.identity.clone(),
            updated_at: self.clock.now(),
        };
        self.store.save_character_update(&update).await?;
        self.rooms
            .apply(
                update.session_id,
                &connection.identity,
                Mutation::CharacterUpdate(update),
            )
            .await
    }

    /// Replies with `pong`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConnectionNotFound` for an unknown handle.
    pub fn ping(&self, connection_id: ConnectionId) -> Result<(), DomainError> {
        self.registry.touch(connection_id)?;
        self.send_direct(
            connection_id,
            ServerEvent::Pong {
                timestamp: self.clock.timestamp_millis(),
            },
        );
        Ok(())
    }

    // --- transport entry points ---

    /// Routes one parsed client event. Any failure is reported to the
    /// originating connection as an `error` event.
    pub async fn handle(&self, connection_id: ConnectionId, event: ClientEvent) {
        let name = event.name();
        let _ = self.registry.touch(connection_id);
        let result = match event {
            ClientEvent::JoinSession { session_id } => {
                self.on_join(connection_id, session_id).await.map(|_| ())
            }
            ClientEvent::LeaveSession { session_id } => {
                self.on_leave(connection_id, session_id).await
            }
            ClientEvent::GetSessionState { session_id } => {
                self.get_state(connection_id, session_id).await
            }
            ClientEvent::GameAction(payload) => self.on_game_action(connection_id, payload).await,
            ClientEvent::DiceRoll(request) => self.on_dice_roll(connection_id, request).await,
            ClientEvent::ChatMessage(payload) => self.on_chat(connection_id, payload).await,
            ClientEvent::CharacterUpdate(payload) => {
                self.on_character_update(connection_id, payload).await
            }
            ClientEvent::Ping => self.ping(connection_id),
        };
        if let Err(e) = result {
            self.report(connection_id, name, &e);
        }
    }

    /// Rate-limits, parses and routes one inbound text frame.
    pub async fn handle_frame(
        &self,
        connection_id: ConnectionId,
        text: &str,
        guard: &mut FloodGuard,
    ) -> FrameOutcome {
        if !guard.admit(self.clock.now()) {
            warn!(connection_id = %connection_id, "Inbound rate limit exceeded");
            self.send_direct(
                connection_id,
                ServerEvent::ForceDisconnect {
                    reason: DomainError::RateLimited.to_string(),
                },
            );
            return FrameOutcome::Disconnect;
        }
        match ClientEvent::parse(text, self.config.max_frame_bytes) {
            Ok(event) => self.handle(connection_id, event).await,
            Err(e) => self.report(connection_id, "unparsed", &e),
        }
        FrameOutcome::Continue
    }

    // --- idle rooms ---

    /// Evicts rooms that have been empty for the configured idle window.
    pub async fn sweep_idle_rooms(&self) -> usize {
        self.rooms.sweep(self.config.idle_room_ttl).await
    }

    /// Runs [`Self::sweep_idle_rooms`] on a fixed period until the returned
    /// handle is aborted.
    #[must_use]
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        let period = self.config.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick fires immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = orchestrator.sweep_idle_rooms().await;
                debug!(evicted, "Idle-room sweep finished");
            }
        })
    }

    // --- helpers ---

    fn connection(&self, connection_id: ConnectionId) -> Result<Connection, DomainError> {
        self.registry
            .get(connection_id)
            .ok_or(DomainError::ConnectionNotFound(connection_id))
    }

    fn bound_connection(
        &self,
        connection_id: ConnectionId,
        session_id: SessionId,
    ) -> Result<Connection, DomainError> {
        let connection = self.connection(connection_id)?;
        if connection.is_bound_to(session_id) {
            Ok(connection)
        } else {
            Err(DomainError::NotAMember(session_id))
        }
    }

    fn send_direct(&self, connection_id: ConnectionId, event: ServerEvent) {
        self.dispatcher
            .send_to(connection_id, Envelope::direct(event, self.clock.now()));
    }

    fn report(&self, connection_id: ConnectionId, request: &str, err: &DomainError) {
        match err {
            DomainError::Infrastructure(detail) => {
                error!(connection_id = %connection_id, request, detail = %detail, "Request failed");
            }
            other => {
                debug!(connection_id = %connection_id, request, error = %other, "Request rejected");
            }
        }
        self.send_direct(connection_id, ServerEvent::from_error(err));
    }
}
