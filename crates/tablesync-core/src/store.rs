//! Persistence collaborator abstraction.
//!
//! The orchestrator is a volatile coordination layer. Session and character
//! records live in an external storage service reached through this trait.
//! Implementations are called outside any session's mutation right.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::id::{CharacterId, Identity, SessionId};

/// Durable part of a session the orchestrator reads on join and writes
/// back after scene changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// The session identifier.
    pub session_id: SessionId,
    /// Display name of the session.
    pub name: String,
    /// Current scene description, if one has been set.
    pub scene: Option<String>,
    /// When the record was last written.
    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Creates a record with no scene.
    #[must_use]
    pub fn new(session_id: SessionId, name: impl Into<String>, updated_at: DateTime<Utc>) -> Self {
        Self {
            session_id,
            name: name.into(),
            scene: None,
            updated_at,
        }
    }
}

/// Partial character update as submitted by a player, tagged with the
/// identity that actually sent it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterUpdate {
    /// Session the update was made in.
    pub session_id: SessionId,
    /// The character being updated.
    pub character_id: CharacterId,
    /// Partial character fields. Interpretation belongs to the store.
    pub updates: serde_json::Map<String, serde_json::Value>,
    /// Who submitted the update.
    pub updated_by: Identity,
    /// Server timestamp of submission.
    pub updated_at: DateTime<Utc>,
}

/// Storage service for session and character records.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads a session record. `Ok(None)` means the session does not exist.
    async fn load_session(&self, session_id: SessionId)
    -> Result<Option<SessionRecord>, DomainError>;

    /// Writes a session record back.
    async fn save_session(&self, record: &SessionRecord) -> Result<(), DomainError>;

    /// Applies a partial character update. Field-level authorization is the
    /// store's concern.
    async fn save_character_update(&self, update: &CharacterUpdate) -> Result<(), DomainError>;
}
