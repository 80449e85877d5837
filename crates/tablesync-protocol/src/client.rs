//! Client → orchestrator events.

use serde::{Deserialize, Serialize};
use tablesync_core::error::DomainError;
use tablesync_core::id::{CharacterId, SessionId, UserId};
use tablesync_dice::domain::roll::DiceRollRequest;

use crate::metadata::Metadata;
use crate::records::{ActionType, ChatKind};

/// Longest accepted chat message, in characters.
pub const MAX_CHAT_CHARS: usize = 2_000;

/// Longest accepted action content, in characters.
pub const MAX_ACTION_CHARS: usize = 4_000;

/// Most fields one character update may touch.
pub const MAX_CHARACTER_FIELDS: usize = 64;

/// Everything a client may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Join a session's room.
    JoinSession {
        /// The session to join.
        session_id: SessionId,
    },
    /// Leave a session's room.
    LeaveSession {
        /// The session to leave.
        session_id: SessionId,
    },
    /// Request a full snapshot.
    GetSessionState {
        /// The session to describe.
        session_id: SessionId,
    },
    /// Submit a game action.
    GameAction(GameActionPayload),
    /// Roll a die in the bound session.
    DiceRoll(DiceRollRequest),
    /// Send a chat message.
    ChatMessage(ChatPayload),
    /// Submit partial character fields.
    CharacterUpdate(CharacterUpdatePayload),
    /// Liveness probe.
    Ping,
}

impl ClientEvent {
    /// Parses a text frame.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the frame is larger than
    /// `max_bytes` or is not a well-formed client event.
    pub fn parse(text: &str, max_bytes: usize) -> Result<Self, DomainError> {
        if text.len() > max_bytes {
            return Err(DomainError::Validation(format!(
                "message exceeds {max_bytes} bytes"
            )));
        }
        serde_json::from_str(text)
            .map_err(|e| DomainError::Validation(format!("invalid message format: {e}")))
    }

    /// Wire name, for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinSession { .. } => "join_session",
            ClientEvent::LeaveSession { .. } => "leave_session",
            ClientEvent::GetSessionState { .. } => "get_session_state",
            ClientEvent::GameAction(_) => "game_action",
            ClientEvent::DiceRoll(_) => "dice_roll",
            ClientEvent::ChatMessage(_) => "chat_message",
            ClientEvent::CharacterUpdate(_) => "character_update",
            ClientEvent::Ping => "ping",
        }
    }
}

/// A game action as submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameActionPayload {
    /// Action subtype.
    pub action: ActionType,
    /// Target session.
    pub session_id: SessionId,
    /// Free-text content.
    #[serde(default)]
    pub content: String,
    /// Optional metadata.
    #[serde(default)]
    pub metadata: Metadata,
}

impl GameActionPayload {
    /// Checks content and metadata bounds.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` on oversized content or metadata,
    /// or when an action that needs content has none.
    pub fn validate(&self) -> Result<(), DomainError> {
        self.metadata.validate()?;
        let content = self.content.trim();
        if content.chars().count() > MAX_ACTION_CHARS {
            return Err(DomainError::Validation(format!(
                "action content is limited to {MAX_ACTION_CHARS} characters"
            )));
        }
        let needs_content = self.action.is_narrative()
            || matches!(
                self.action,
                ActionType::ChangeScene | ActionType::RequestNarration
            );
        if needs_content && content.is_empty() {
            return Err(DomainError::Validation(
                "action content must not be empty".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Where a chat message goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRoute {
    /// Every member of the room.
    Room,
    /// The sender and one target member.
    Whisper(UserId),
}

/// A chat message as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPayload {
    /// Target session.
    pub session_id: SessionId,
    /// Message text.
    pub message: String,
    /// Message kind.
    pub kind: ChatKind,
    /// Whisper recipient; required for whispers, forbidden otherwise.
    #[serde(default)]
    pub target: Option<UserId>,
}

impl ChatPayload {
    /// Checks the message and derives its route.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for an empty or oversized message, a
    /// whisper without a target, or a target on a non-whisper.
    pub fn validate(&self) -> Result<ChatRoute, DomainError> {
        let message = self.message.trim();
        if message.is_empty() || message.chars().count() > MAX_CHAT_CHARS {
            return Err(DomainError::Validation(format!(
                "chat message must be 1-{MAX_CHAT_CHARS} characters"
            )));
        }
        match (self.kind, self.target) {
            (ChatKind::Whisper, Some(target)) => Ok(ChatRoute::Whisper(target)),
            (ChatKind::Whisper, None) => Err(DomainError::Validation(
                "whisper requires a target".to_owned(),
            )),
            (ChatKind::Ic | ChatKind::Ooc | ChatKind::System, Some(_)) => Err(
                DomainError::Validation("only whispers may name a target".to_owned()),
            ),
            (ChatKind::Ic | ChatKind::Ooc | ChatKind::System, None) => Ok(ChatRoute::Room),
        }
    }
}

/// A partial character update as submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterUpdatePayload {
    /// Target session.
    pub session_id: SessionId,
    /// The character being updated.
    pub character_id: CharacterId,
    /// Fields to change.
    pub updates: serde_json::Map<String, serde_json::Value>,
}

impl CharacterUpdatePayload {
    /// Checks the field count.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for an empty or oversized update.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.updates.is_empty() {
            return Err(DomainError::Validation(
                "character update must change at least one field".to_owned(),
            ));
        }
        if self.updates.len() > MAX_CHARACTER_FIELDS {
            return Err(DomainError::Validation(format!(
                "character update is limited to {MAX_CHARACTER_FIELDS} fields"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tablesync_dice::domain::die::DieType;

    const LIMIT: usize = 64 * 1024;

    fn parse(value: &serde_json::Value) -> Result<ClientEvent, DomainError> {
        ClientEvent::parse(&value.to_string(), LIMIT)
    }

    #[test]
    fn test_parse_join_session() {
        let session_id = SessionId::new();
        let event = parse(&json!({ "type": "join_session", "session_id": session_id })).unwrap();
        assert_eq!(event, ClientEvent::JoinSession { session_id });
    }

    #[test]
    fn test_parse_ping() {
        assert_eq!(parse(&json!({ "type": "ping" })).unwrap(), ClientEvent::Ping);
    }

    #[test]
    fn test_parse_dice_roll_defaults_flags() {
        let event = parse(&json!({
            "type": "dice_roll",
            "die_type": "d20",
            "modifier": 3,
            "purpose": "attack",
            "character_id": CharacterId::new(),
        }))
        .unwrap();
        let ClientEvent::DiceRoll(request) = event else {
            panic!("expected dice_roll");
        };
        assert_eq!(request.die_type, DieType::D20);
        assert!(!request.advantage);
        assert!(!request.disadvantage);
    }

    #[test]
    fn test_parse_rejects_unknown_die() {
        let result = parse(&json!({
            "type": "dice_roll",
            "die_type": "d3",
            "purpose": "attack",
            "character_id": CharacterId::new(),
        }));
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_parse_game_action_with_metadata() {
        let event = parse(&json!({
            "type": "game_action",
            "action": "attack",
            "session_id": SessionId::new(),
            "content": "I swing at the goblin",
            "metadata": { "weapon": "longsword" },
        }))
        .unwrap();
        let ClientEvent::GameAction(action) = event else {
            panic!("expected game_action");
        };
        assert_eq!(action.action, ActionType::Attack);
        assert_eq!(action.metadata.get("weapon"), Some(&json!("longsword")));
        assert!(action.validate().is_ok());
    }

    #[test]
    fn test_parse_rejects_unknown_type_and_garbage() {
        assert!(parse(&json!({ "type": "teleport" })).is_err());
        assert!(ClientEvent::parse("not json", LIMIT).is_err());
    }

    #[test]
    fn test_parse_rejects_oversized_frame() {
        let text = json!({ "type": "ping", "pad": "x".repeat(100) }).to_string();
        assert!(matches!(
            ClientEvent::parse(&text, 16),
            Err(DomainError::Validation(m)) if m.contains("exceeds")
        ));
    }

    #[test]
    fn test_narrative_action_without_content_rejected() {
        let action = GameActionPayload {
            action: ActionType::Move,
            session_id: SessionId::new(),
            content: "  ".to_owned(),
            metadata: Metadata::new(),
        };
        assert!(matches!(action.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_advance_turn_needs_no_content() {
        let action = GameActionPayload {
            action: ActionType::AdvanceTurn,
            session_id: SessionId::new(),
            content: String::new(),
            metadata: Metadata::new(),
        };
        assert!(action.validate().is_ok());
    }

    fn chat(kind: ChatKind, target: Option<UserId>) -> ChatPayload {
        ChatPayload {
            session_id: SessionId::new(),
            message: "hello".to_owned(),
            kind,
            target,
        }
    }

    #[test]
    fn test_whisper_without_target_rejected() {
        assert!(matches!(
            chat(ChatKind::Whisper, None).validate(),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn test_whisper_routes_to_target() {
        let target = UserId::new();
        assert_eq!(
            chat(ChatKind::Whisper, Some(target)).validate().unwrap(),
            ChatRoute::Whisper(target)
        );
    }

    #[test]
    fn test_target_on_room_chat_rejected() {
        assert!(chat(ChatKind::Ooc, Some(UserId::new())).validate().is_err());
        assert_eq!(chat(ChatKind::Ic, None).validate().unwrap(), ChatRoute::Room);
    }

    #[test]
    fn test_empty_character_update_rejected() {
        let update = CharacterUpdatePayload {
            session_id: SessionId::new(),
            character_id: CharacterId::new(),
            updates: serde_json::Map::new(),
        };
        assert!(update.validate().is_err());
    }
}
