//! Process-local collaborators for running the server standalone.
//!
//! Durable storage and narrative generation belong to other services. Until
//! those are wired in, the binary keeps session records in memory and
//! reports narration as unavailable.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tablesync_core::clock::Clock;
use tablesync_core::error::DomainError;
use tablesync_core::id::{CharacterId, SessionId};
use tablesync_core::narrator::NarrativeEngine;
use tablesync_core::store::{CharacterUpdate, SessionRecord, SessionStore};
use tracing::{debug, info};

/// Session store that opens a record for any session id on first load.
pub struct MemorySessionStore {
    sessions: DashMap<SessionId, SessionRecord>,
    characters: DashMap<CharacterId, serde_json::Map<String, serde_json::Value>>,
    clock: Arc<dyn Clock>,
}

impl MemorySessionStore {
    /// An empty store.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: DashMap::new(),
            characters: DashMap::new(),
            clock,
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load_session(
        &self,
        session_id: SessionId,
    ) -> Result<Option<SessionRecord>, DomainError> {
        let record = self
            .sessions
            .entry(session_id)
            .or_insert_with(|| {
                info!(session_id = %session_id, "Opening new session record");
                let short: String = session_id.to_string().chars().take(8).collect();
                SessionRecord::new(session_id, format!("Session {short}"), self.clock.now())
            })
            .clone();
        Ok(Some(record))
    }

    async fn save_session(&self, record: &SessionRecord) -> Result<(), DomainError> {
        self.sessions.insert(record.session_id, record.clone());
        debug!(session_id = %record.session_id, "Session record saved");
        Ok(())
    }

    async fn save_character_update(&self, update: &CharacterUpdate) -> Result<(), DomainError> {
        let mut sheet = self.characters.entry(update.character_id).or_default();
        for (field, value) in &update.updates {
            sheet.insert(field.clone(), value.clone());
        }
        Ok(())
    }
}

/// Narrative engine stand-in that always fails.
#[derive(Debug, Default)]
pub struct UnavailableNarrator;

#[async_trait]
impl NarrativeEngine for UnavailableNarrator {
    async fn narrate(&self, _session_id: SessionId, _prompt: &str) -> Result<String, DomainError> {
        Err(DomainError::Infrastructure(
            "no narrative engine configured".to_owned(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use tablesync_core::id::{Identity, UserId};
    use tablesync_test_support::FixedClock;

    fn store() -> MemorySessionStore {
        MemorySessionStore::new(Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        )))
    }

    #[tokio::test]
    async fn test_load_opens_record_once() {
        let store = store();
        let id = SessionId::new();
        let first = store.load_session(id).await.unwrap().unwrap();
        let mut changed = first.clone();
        changed.scene = Some("A misty bog".to_owned());
        store.save_session(&changed).await.unwrap();

        let again = store.load_session(id).await.unwrap().unwrap();
        assert_eq!(again.scene.as_deref(), Some("A misty bog"));
        assert!(again.name.starts_with("Session "));
    }

    #[tokio::test]
    async fn test_character_updates_merge_fields() {
        let store = store();
        let character_id = CharacterId::new();
        let by = Identity::new(UserId::new(), "Aria");
        for updates in [json!({ "hp": 10, "ac": 15 }), json!({ "hp": 7 })] {
            let serde_json::Value::Object(updates) = updates else {
                unreachable!();
            };
            store
                .save_character_update(&CharacterUpdate {
                    session_id: SessionId::new(),
                    character_id,
                    updates,
                    updated_by: by.clone(),
                    updated_at: Utc::now(),
                })
                .await
                .unwrap();
        }
        let sheet = store.characters.get(&character_id).unwrap();
        assert_eq!(sheet["hp"], 7);
        assert_eq!(sheet["ac"], 15);
    }

    #[tokio::test]
    async fn test_unavailable_narrator_is_infrastructure_failure() {
        let result = UnavailableNarrator.narrate(SessionId::new(), "hello").await;
        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }
}
