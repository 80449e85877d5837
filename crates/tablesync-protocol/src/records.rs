//! Immutable "what happened" records and the session snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tablesync_combat::domain::scene::Scene;
use tablesync_combat::domain::table::CombatSnapshot;
use tablesync_core::id::{Identity, SessionId, UserId};
use tablesync_dice::domain::roll::DiceRollResult;
use uuid::Uuid;

use crate::metadata::Metadata;

/// Kinds of game action a client may submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Movement narration.
    Move,
    /// Attack narration.
    Attack,
    /// Skill use narration.
    Skill,
    /// Interaction with the scene.
    Interact,
    /// In-character speech.
    Speak,
    /// Anything else; content is free text.
    Custom,
    /// Start combat with `metadata.combatants`.
    EnterCombat,
    /// End the current turn.
    AdvanceTurn,
    /// End combat.
    ExitCombat,
    /// Add `metadata.combatant` mid-fight.
    AddCombatant,
    /// Remove `metadata.character_id` mid-fight.
    RemoveCombatant,
    /// Replace the scene with `content`.
    ChangeScene,
    /// Relay `metadata.quest` as a quest update.
    UpdateQuest,
    /// Ask the narrative engine to narrate `content`.
    RequestNarration,
}

impl ActionType {
    /// Whether this action only narrates and never changes table state.
    #[must_use]
    pub fn is_narrative(self) -> bool {
        matches!(
            self,
            ActionType::Move
                | ActionType::Attack
                | ActionType::Skill
                | ActionType::Interact
                | ActionType::Speak
                | ActionType::Custom
        )
    }
}

/// Chat message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    /// In character.
    Ic,
    /// Out of character.
    Ooc,
    /// Private message to one member.
    Whisper,
    /// Table-wide notice.
    System,
}

/// A member of a room and whether any of their connections is live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberPresence {
    /// The member's user id.
    pub user_id: UserId,
    /// Display name resolved at join time.
    pub display_name: String,
    /// Whether the member has a live connection bound to the session.
    pub online: bool,
}

/// One accepted game action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionLogEntry {
    /// Unique entry id.
    pub id: Uuid,
    /// Session the action was made in.
    pub session_id: SessionId,
    /// What kind of action.
    pub action: ActionType,
    /// Free-text content.
    pub content: String,
    /// Metadata as submitted.
    pub metadata: Metadata,
    /// Who acted.
    pub actor: Identity,
    /// Server timestamp.
    pub at: DateTime<Utc>,
}

/// One delivered chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatLogEntry {
    /// Unique entry id.
    pub id: Uuid,
    /// Session the message was sent in.
    pub session_id: SessionId,
    /// Message kind.
    pub kind: ChatKind,
    /// Message text.
    pub message: String,
    /// Who sent it.
    pub sender: Identity,
    /// Whisper recipient.
    pub target: Option<UserId>,
    /// Server timestamp.
    pub sent_at: DateTime<Utc>,
}

impl ChatLogEntry {
    /// Whether `user` may see this message.
    #[must_use]
    pub fn is_visible_to(&self, user: UserId) -> bool {
        match self.kind {
            ChatKind::Whisper => self.sender.user_id == user || self.target == Some(user),
            ChatKind::Ic | ChatKind::Ooc | ChatKind::System => true,
        }
    }
}

/// A relayed quest change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestUpdate {
    /// The quest object as submitted.
    pub quest: Value,
    /// Accompanying text.
    pub content: String,
    /// Who updated it.
    pub updated_by: Identity,
    /// Server timestamp.
    pub at: DateTime<Utc>,
}

/// Kinds of server-generated game event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameEventKind {
    /// Output of the narrative engine.
    Narration,
}

/// A server-generated game event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    /// What happened.
    pub kind: GameEventKind,
    /// Text to display.
    pub text: String,
    /// Who triggered it.
    pub requested_by: Identity,
    /// Server timestamp.
    pub at: DateTime<Utc>,
}

/// Full, self-contained description of a session sent on join and on
/// explicit state fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// The session.
    pub session_id: SessionId,
    /// Session display name.
    pub name: String,
    /// Sequence number of the last room event; the next one is `seq + 1`.
    pub seq: u64,
    /// Current scene.
    pub scene: Option<Scene>,
    /// Members and their presence.
    pub members: Vec<MemberPresence>,
    /// Combat state.
    pub combat: CombatSnapshot,
    /// Most recent game actions, oldest first.
    pub recent_actions: Vec<ActionLogEntry>,
    /// Most recent chat visible to the recipient, oldest first.
    pub recent_chat: Vec<ChatLogEntry>,
    /// Most recent dice rolls, oldest first.
    pub recent_rolls: Vec<DiceRollResult>,
    /// When the room was created in memory.
    pub created_at: DateTime<Utc>,
    /// Last room mutation.
    pub last_activity: DateTime<Utc>,
}
