//! Per-session actor.
//!
//! One task owns a session's room, table state and recent logs. Commands
//! arrive through a bounded mailbox and are applied one at a time, so two
//! mutations for the same session can never interleave. Sequence numbers
//! are assigned here, which makes delivery order match application order.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tablesync_combat::domain::initiative::CombatantSpec;
use tablesync_combat::domain::table::{CombatSnapshot, TableState, TurnChange};
use tablesync_core::clock::Clock;
use tablesync_core::error::DomainError;
use tablesync_core::id::{CharacterId, ConnectionId, Identity, SessionId, UserId};
use tablesync_core::store::{CharacterUpdate, SessionRecord, SessionStore};
use tablesync_dice::domain::roll::DiceRollResult;
use tablesync_protocol::client::{ChatPayload, ChatRoute, GameActionPayload};
use tablesync_protocol::envelope::{Envelope, Origin};
use tablesync_protocol::metadata::keys;
use tablesync_protocol::records::{
    ActionLogEntry, ActionType, ChatLogEntry, GameEvent, GameEventKind, MemberPresence,
    QuestUpdate, SessionSnapshot,
};
use tablesync_protocol::server::ServerEvent;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::dispatcher::BroadcastDispatcher;
use crate::application::registry::ConnectionRegistry;
use crate::domain::log::RecentLog;
use crate::domain::room::SessionRoom;

pub(crate) type Reply<T> = oneshot::Sender<Result<T, DomainError>>;

/// Requests an actor understands.
pub(crate) enum SessionCommand {
    Join {
        identity: Identity,
        connection_id: ConnectionId,
        reply: Reply<Vec<MemberPresence>>,
    },
    Leave {
        identity: Identity,
        reply: oneshot::Sender<bool>,
    },
    Snapshot {
        user_id: UserId,
        connection_id: ConnectionId,
        reply: Reply<()>,
    },
    Apply {
        origin: Identity,
        mutation: Mutation,
        reply: Reply<()>,
    },
    SweepIfIdle {
        threshold: Duration,
        reply: oneshot::Sender<bool>,
    },
}

/// A validated, fully-resolved change to apply to the session.
#[derive(Debug)]
pub(crate) enum Mutation {
    Action(GameActionPayload),
    Narration {
        payload: GameActionPayload,
        text: String,
    },
    DiceRoll(DiceRollResult),
    Chat {
        payload: ChatPayload,
        route: ChatRoute,
    },
    CharacterUpdate(CharacterUpdate),
}

/// Shared services every actor needs.
#[derive(Clone)]
pub(crate) struct ActorContext {
    pub clock: Arc<dyn Clock>,
    pub registry: Arc<ConnectionRegistry>,
    pub dispatcher: Arc<BroadcastDispatcher>,
    pub store: Arc<dyn SessionStore>,
    pub log_retention: usize,
}

pub(crate) struct SessionActor {
    record: SessionRecord,
    room: SessionRoom,
    table: TableState,
    seq: u64,
    actions: RecentLog<ActionLogEntry>,
    chat: RecentLog<ChatLogEntry>,
    rolls: RecentLog<DiceRollResult>,
    saves: mpsc::UnboundedSender<SessionRecord>,
    ctx: ActorContext,
}

impl SessionActor {
    /// Starts an actor for `record` and returns its mailbox.
    pub(crate) fn spawn(
        record: SessionRecord,
        ctx: ActorContext,
        mailbox: usize,
    ) -> mpsc::Sender<SessionCommand> {
        let (tx, rx) = mpsc::channel(mailbox.max(1));
        let (saves, pending) = mpsc::unbounded_channel();
        tokio::spawn(write_records(Arc::clone(&ctx.store), pending));
        let now = ctx.clock.now();
        let actor = Self {
            room: SessionRoom::new(now),
            table: TableState::with_scene(record.scene.clone(), record.updated_at),
            seq: 0,
            actions: RecentLog::new(ctx.log_retention),
            chat: RecentLog::new(ctx.log_retention),
            rolls: RecentLog::new(ctx.log_retention),
            saves,
            record,
            ctx,
        };
        tokio::spawn(actor.run(rx));
        tx
    }

    fn session_id(&self) -> SessionId {
        self.record.session_id
    }

    async fn run(mut self, mut inbox: mpsc::Receiver<SessionCommand>) {
        info!(session_id = %self.session_id(), "Session room opened");
        while let Some(command) = inbox.recv().await {
            match command {
                SessionCommand::Join {
                    identity,
                    connection_id,
                    reply,
                } => {
                    let members = self.join(&identity, connection_id);
                    let _ = reply.send(Ok(members));
                }
                SessionCommand::Leave { identity, reply } => {
                    let _ = reply.send(self.leave(&identity));
                }
                SessionCommand::Snapshot {
                    user_id,
                    connection_id,
                    reply,
                } => {
                    let _ = reply.send(self.send_snapshot(user_id, connection_id));
                }
                SessionCommand::Apply {
                    origin,
                    mutation,
                    reply,
                } => {
                    let _ = reply.send(self.apply(&origin, mutation));
                }
                SessionCommand::SweepIfIdle { threshold, reply } => {
                    let idle = self.room.is_idle_for(threshold, self.ctx.clock.now());
                    let _ = reply.send(idle);
                    if idle {
                        break;
                    }
                }
            }
        }
        // Dropping the inbox drops any queued commands with their reply
        // channels; callers see the closed channel and retry on a new room.
        info!(
            session_id = %self.session_id(),
            last_seq = self.seq,
            "Session room evicted"
        );
    }

    // --- membership ---

    fn join(&mut self, identity: &Identity, connection_id: ConnectionId) -> Vec<MemberPresence> {
        let now = self.ctx.clock.now();
        let newly_added = self.room.join(identity, now);
        let members = self.presence();

        self.send_targeted(
            connection_id,
            ServerEvent::SessionJoined {
                session_id: self.session_id(),
                name: self.record.name.clone(),
                members: members.clone(),
            },
        );
        let snapshot = self.snapshot_for(identity.user_id);
        self.send_targeted(connection_id, ServerEvent::SessionState { snapshot });

        if newly_added {
            self.broadcast(
                Origin::Server,
                ServerEvent::PlayerJoined {
                    identity: identity.clone(),
                    members: members.clone(),
                },
            );
            info!(
                session_id = %self.session_id(),
                user_id = %identity.user_id,
                members = members.len(),
                "Player joined"
            );
        }
        members
    }

    /// Removes the user unless another of their connections is still bound
    /// here. Runs in mailbox order, so a bind that raced the leave wins.
    fn leave(&mut self, identity: &Identity) -> bool {
        if self.ctx.registry.is_online(identity.user_id, self.session_id()) {
            debug!(
                session_id = %self.session_id(),
                user_id = %identity.user_id,
                "User still has a connection in the session"
            );
            return false;
        }
        let now = self.ctx.clock.now();
        let Some(left) = self.room.leave(identity.user_id, now) else {
            return false;
        };
        let members = self.presence();
        self.broadcast(
            Origin::Server,
            ServerEvent::PlayerLeft {
                identity: left,
                members,
            },
        );
        info!(
            session_id = %self.session_id(),
            user_id = %identity.user_id,
            empty = self.room.is_empty(),
            "Player left"
        );
        true
    }

    fn presence(&self) -> Vec<MemberPresence> {
        self.room
            .members()
            .map(|identity| MemberPresence {
                user_id: identity.user_id,
                display_name: identity.display_name.clone(),
                online: self
                    .ctx
                    .registry
                    .is_online(identity.user_id, self.session_id()),
            })
            .collect()
    }

    fn require_member(&self, user_id: UserId) -> Result<(), DomainError> {
        if self.room.is_member(user_id) {
            Ok(())
        } else {
            Err(DomainError::NotAMember(self.session_id()))
        }
    }

    // --- snapshots ---

    fn snapshot_for(&self, user_id: UserId) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id(),
            name: self.record.name.clone(),
            seq: self.seq,
            scene: self.table.scene().cloned(),
            members: self.presence(),
            combat: self.table.snapshot(),
            recent_actions: self.actions.to_vec(),
            recent_chat: self.chat.collect_where(|entry| entry.is_visible_to(user_id)),
            recent_rolls: self.rolls.to_vec(),
            created_at: self.room.created_at(),
            last_activity: self.room.last_activity(),
        }
    }

    fn send_snapshot(&self, user_id: UserId, connection_id: ConnectionId) -> Result<(), DomainError> {
        self.require_member(user_id)?;
        let snapshot = self.snapshot_for(user_id);
        self.send_targeted(connection_id, ServerEvent::SessionState { snapshot });
        Ok(())
    }

    // --- mutations ---

    fn apply(&mut self, origin: &Identity, mutation: Mutation) -> Result<(), DomainError> {
        self.require_member(origin.user_id)?;
        match mutation {
            Mutation::Action(payload) => self.apply_action(origin, payload)?,
            Mutation::Narration { payload, text } => {
                self.echo_action(origin, payload);
                let event = GameEvent {
                    kind: GameEventKind::Narration,
                    text,
                    requested_by: origin.clone(),
                    at: self.ctx.clock.now(),
                };
                self.broadcast(Origin::Server, ServerEvent::GameEvent(event));
            }
            Mutation::DiceRoll(result) => {
                self.rolls.push(result.clone());
                self.broadcast(Origin::Client(origin.clone()), ServerEvent::DiceRoll(result));
            }
            Mutation::Chat { payload, route } => self.apply_chat(origin, payload, route)?,
            Mutation::CharacterUpdate(update) => {
                self.broadcast(
                    Origin::Client(origin.clone()),
                    ServerEvent::CharacterUpdate(update),
                );
            }
        }
        self.room.touch(self.ctx.clock.now());
        Ok(())
    }

    /// Computes the transition first; nothing is logged or broadcast unless
    /// it succeeds.
    fn apply_action(
        &mut self,
        origin: &Identity,
        payload: GameActionPayload,
    ) -> Result<(), DomainError> {
        match payload.action {
            ActionType::Move
            | ActionType::Attack
            | ActionType::Skill
            | ActionType::Interact
            | ActionType::Speak
            | ActionType::Custom => self.echo_action(origin, payload),
            ActionType::EnterCombat => {
                let combatants: Vec<CombatantSpec> = payload.metadata.require(keys::COMBATANTS)?;
                let change = self.table.enter_combat(combatants)?;
                self.echo_action(origin, payload);
                self.announce_turn(change, true);
            }
            ActionType::AdvanceTurn => {
                let change = self.table.advance_turn()?;
                self.echo_action(origin, payload);
                self.announce_turn(change, true);
            }
            ActionType::ExitCombat => {
                let snapshot = self.table.exit_combat()?;
                self.echo_action(origin, payload);
                self.broadcast(Origin::Server, ServerEvent::CombatStateChange(snapshot));
            }
            ActionType::AddCombatant => {
                let combatant: CombatantSpec = payload.metadata.require(keys::COMBATANT)?;
                let change = self.table.add_combatant(combatant)?;
                self.echo_action(origin, payload);
                self.announce_roster(change.snapshot, change.turn);
            }
            ActionType::RemoveCombatant => {
                let character_id: CharacterId = payload.metadata.require(keys::CHARACTER_ID)?;
                let change = self.table.remove_combatant(character_id)?;
                self.echo_action(origin, payload);
                self.announce_roster(change.snapshot, change.turn);
            }
            ActionType::ChangeScene => {
                let now = self.ctx.clock.now();
                let scene = self.table.change_scene(&payload.content, origin, now)?;
                self.echo_action(origin, payload);
                self.broadcast(Origin::Server, ServerEvent::SceneChange(scene.clone()));
                self.persist_scene(scene.description, now);
            }
            ActionType::UpdateQuest => {
                let quest: serde_json::Value = payload.metadata.require(keys::QUEST)?;
                let update = QuestUpdate {
                    quest,
                    content: payload.content.trim().to_owned(),
                    updated_by: origin.clone(),
                    at: self.ctx.clock.now(),
                };
                self.echo_action(origin, payload);
                self.broadcast(Origin::Server, ServerEvent::QuestUpdate(update));
            }
            ActionType::RequestNarration => {
                return Err(DomainError::Validation(
                    "narration requests must carry generated text".to_owned(),
                ));
            }
        }
        Ok(())
    }

    fn apply_chat(
        &mut self,
        origin: &Identity,
        payload: ChatPayload,
        route: ChatRoute,
    ) -> Result<(), DomainError> {
        if let ChatRoute::Whisper(target) = route {
            if !self.room.is_member(target) {
                return Err(DomainError::Validation(
                    "whisper target is not in this session".to_owned(),
                ));
            }
        }
        let entry = ChatLogEntry {
            id: Uuid::now_v7(),
            session_id: self.session_id(),
            kind: payload.kind,
            message: payload.message.trim().to_owned(),
            sender: origin.clone(),
            target: payload.target,
            sent_at: self.ctx.clock.now(),
        };
        self.chat.push(entry.clone());
        let from = Origin::Client(origin.clone());
        match route {
            ChatRoute::Room => {
                self.broadcast(from, ServerEvent::ChatMessage(entry));
            }
            ChatRoute::Whisper(target) => {
                let mut recipients = vec![origin.user_id];
                if target != origin.user_id {
                    recipients.push(target);
                }
                let envelope = Envelope::targeted(
                    self.session_id(),
                    from,
                    ServerEvent::ChatMessage(entry),
                    self.ctx.clock.now(),
                );
                self.ctx
                    .dispatcher
                    .publish(self.session_id(), &recipients, envelope);
            }
        }
        Ok(())
    }

    fn log_action(&mut self, origin: &Identity, payload: GameActionPayload) -> ActionLogEntry {
        let entry = ActionLogEntry {
            id: Uuid::now_v7(),
            session_id: self.session_id(),
            action: payload.action,
            content: payload.content.trim().to_owned(),
            metadata: payload.metadata,
            actor: origin.clone(),
            at: self.ctx.clock.now(),
        };
        self.actions.push(entry.clone());
        entry
    }

    fn echo_action(&mut self, origin: &Identity, payload: GameActionPayload) {
        let entry = self.log_action(origin, payload);
        self.broadcast(Origin::Client(origin.clone()), ServerEvent::GameAction(entry));
    }

    fn announce_turn(&mut self, change: TurnChange, state_changed: bool) {
        if state_changed {
            self.broadcast(
                Origin::Server,
                ServerEvent::CombatStateChange(change.snapshot.clone()),
            );
        }
        debug!(
            session_id = %self.session_id(),
            round = ?change.snapshot.round,
            turn_index = ?change.snapshot.turn_index,
            "Turn passed"
        );
        self.broadcast(Origin::Server, ServerEvent::player_turn(&change));
    }

    fn announce_roster(&mut self, snapshot: CombatSnapshot, turn: Option<TurnChange>) {
        self.broadcast(Origin::Server, ServerEvent::InitiativeUpdate(snapshot));
        if let Some(change) = turn {
            self.announce_turn(change, false);
        }
    }

    /// Queues the updated record for this session's writer. Saves happen
    /// off the actor and land in the order the scenes were applied.
    fn persist_scene(&mut self, description: String, now: DateTime<Utc>) {
        self.record.scene = Some(description);
        self.record.updated_at = now;
        if self.saves.send(self.record.clone()).is_err() {
            warn!(session_id = %self.session_id(), "Session writer stopped; scene not persisted");
        }
    }

    // --- delivery ---

    fn broadcast(&mut self, origin: Origin, event: ServerEvent) {
        self.seq += 1;
        let envelope = Envelope::room(
            self.session_id(),
            self.seq,
            origin,
            event,
            self.ctx.clock.now(),
        );
        let recipients = self.room.member_ids();
        self.ctx
            .dispatcher
            .publish(self.session_id(), &recipients, envelope);
    }

    fn send_targeted(&self, connection_id: ConnectionId, event: ServerEvent) {
        let envelope =
            Envelope::targeted(self.session_id(), Origin::Server, event, self.ctx.clock.now());
        self.ctx.dispatcher.send_to(connection_id, envelope);
    }
}

/// Saves one session's records strictly in order. A backlog collapses to
/// its newest record. Ends once the actor drops its sender and the queue
/// is drained.
async fn write_records(store: Arc<dyn SessionStore>, mut pending: mpsc::UnboundedReceiver<SessionRecord>) {
    while let Some(mut record) = pending.recv().await {
        while let Ok(newer) = pending.try_recv() {
            record = newer;
        }
        if let Err(e) = store.save_session(&record).await {
            warn!(session_id = %record.session_id, error = %e, "Failed to persist scene");
        }
    }
}
