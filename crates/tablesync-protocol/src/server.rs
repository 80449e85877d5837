//! Orchestrator → client events.

use serde::{Deserialize, Serialize};
use tablesync_combat::domain::initiative::InitiativeEntry;
use tablesync_combat::domain::scene::Scene;
use tablesync_combat::domain::table::{CombatSnapshot, TurnChange};
use tablesync_core::error::DomainError;
use tablesync_core::id::{ConnectionId, Identity, SessionId};
use tablesync_core::store::CharacterUpdate;
use tablesync_dice::domain::roll::DiceRollResult;

use crate::records::{
    ActionLogEntry, ChatLogEntry, GameEvent, MemberPresence, QuestUpdate, SessionSnapshot,
};

/// Everything the orchestrator may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Acknowledges a new connection.
    Connected {
        /// The authenticated identity.
        identity: Identity,
        /// Handle of this connection.
        connection_id: ConnectionId,
    },
    /// A request from this connection was rejected.
    Error {
        /// Stable machine-readable code.
        code: String,
        /// Human-readable detail.
        message: String,
    },
    /// This connection joined a session.
    SessionJoined {
        /// The session joined.
        session_id: SessionId,
        /// Session display name.
        name: String,
        /// Members, including the joiner.
        members: Vec<MemberPresence>,
    },
    /// Full session snapshot.
    SessionState {
        /// The snapshot.
        snapshot: SessionSnapshot,
    },
    /// Someone joined the room.
    PlayerJoined {
        /// Who joined.
        identity: Identity,
        /// Members after the join.
        members: Vec<MemberPresence>,
    },
    /// Someone left the room.
    PlayerLeft {
        /// Who left.
        identity: Identity,
        /// Members after the leave.
        members: Vec<MemberPresence>,
    },
    /// An accepted game action.
    GameAction(ActionLogEntry),
    /// A resolved dice roll.
    DiceRoll(DiceRollResult),
    /// A delivered chat message.
    ChatMessage(ChatLogEntry),
    /// An accepted character update.
    CharacterUpdate(CharacterUpdate),
    /// The turn passed to a combatant.
    PlayerTurn {
        /// Whose turn it is.
        combatant: InitiativeEntry,
        /// Current round.
        round: u32,
        /// Index of the combatant in the initiative order.
        turn_index: usize,
        /// Whether a new round just started.
        new_round: bool,
    },
    /// The initiative order changed mid-fight.
    InitiativeUpdate(CombatSnapshot),
    /// Combat started, advanced or ended.
    CombatStateChange(CombatSnapshot),
    /// The scene changed.
    SceneChange(Scene),
    /// A quest was updated.
    QuestUpdate(QuestUpdate),
    /// A server-generated game event.
    GameEvent(GameEvent),
    /// Reply to `ping`.
    Pong {
        /// Server time in milliseconds since the Unix epoch.
        timestamp: i64,
    },
    /// The server is closing this connection.
    ForceDisconnect {
        /// Why.
        reason: String,
    },
}

impl ServerEvent {
    /// Builds the `error` event for a rejected request.
    #[must_use]
    pub fn from_error(err: &DomainError) -> Self {
        ServerEvent::Error {
            code: err.code().to_owned(),
            message: err.client_message(),
        }
    }

    /// Builds the `player_turn` event for a turn change.
    #[must_use]
    pub fn player_turn(change: &TurnChange) -> Self {
        ServerEvent::PlayerTurn {
            combatant: change.current.clone(),
            round: change.snapshot.round.unwrap_or(1),
            turn_index: change.snapshot.turn_index.unwrap_or(0),
            new_round: change.new_round,
        }
    }

    /// Wire name, for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Connected { .. } => "connected",
            ServerEvent::Error { .. } => "error",
            ServerEvent::SessionJoined { .. } => "session_joined",
            ServerEvent::SessionState { .. } => "session_state",
            ServerEvent::PlayerJoined { .. } => "player_joined",
            ServerEvent::PlayerLeft { .. } => "player_left",
            ServerEvent::GameAction(_) => "game_action",
            ServerEvent::DiceRoll(_) => "dice_roll",
            ServerEvent::ChatMessage(_) => "chat_message",
            ServerEvent::CharacterUpdate(_) => "character_update",
            ServerEvent::PlayerTurn { .. } => "player_turn",
            ServerEvent::InitiativeUpdate(_) => "initiative_update",
            ServerEvent::CombatStateChange(_) => "combat_state_change",
            ServerEvent::SceneChange(_) => "scene_change",
            ServerEvent::QuestUpdate(_) => "quest_update",
            ServerEvent::GameEvent(_) => "game_event",
            ServerEvent::Pong { .. } => "pong",
            ServerEvent::ForceDisconnect { .. } => "force_disconnect",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_event_carries_code_and_message() {
        let event = ServerEvent::from_error(&DomainError::ConflictingModifier);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["code"], "CONFLICTING_MODIFIER");
    }

    #[test]
    fn test_combat_state_change_flattens_snapshot() {
        let event = ServerEvent::CombatStateChange(CombatSnapshot {
            in_combat: true,
            round: Some(1),
            turn_index: Some(0),
            initiative: Vec::new(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "combat_state_change");
        assert_eq!(json["round"], 1);
        assert_eq!(json["turn_index"], 0);
    }

    #[test]
    fn test_pong_round_trips() {
        let event = ServerEvent::Pong { timestamp: 1_700_000_000_000 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json, json!({ "type": "pong", "timestamp": 1_700_000_000_000_i64 }));
        let back: ServerEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.name(), "pong");
    }
}
