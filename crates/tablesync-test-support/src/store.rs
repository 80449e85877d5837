//! Test stores — `SessionStore` implementations for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tablesync_core::error::DomainError;
use tablesync_core::id::SessionId;
use tablesync_core::store::{CharacterUpdate, SessionRecord, SessionStore};

/// A store backed by in-process maps. Records every save so tests can
/// assert on what the orchestrator persisted.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<SessionId, SessionRecord>>,
    saved_sessions: Mutex<Vec<SessionRecord>>,
    character_updates: Mutex<Vec<CharacterUpdate>>,
}

impl InMemorySessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already knows the given sessions.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn with_sessions(records: impl IntoIterator<Item = SessionRecord>) -> Self {
        let store = Self::new();
        {
            let mut sessions = store.sessions.lock().unwrap();
            for record in records {
                sessions.insert(record.session_id, record);
            }
        }
        store
    }

    /// Returns every record passed to `save_session`, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn saved_sessions(&self) -> Vec<SessionRecord> {
        self.saved_sessions.lock().unwrap().clone()
    }

    /// Returns every character update received, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn character_updates(&self) -> Vec<CharacterUpdate> {
        self.character_updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load_session(
        &self,
        session_id: SessionId,
    ) -> Result<Option<SessionRecord>, DomainError> {
        Ok(self.sessions.lock().unwrap().get(&session_id).cloned())
    }

    async fn save_session(&self, record: &SessionRecord) -> Result<(), DomainError> {
        self.sessions
            .lock()
            .unwrap()
            .insert(record.session_id, record.clone());
        self.saved_sessions.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn save_character_update(&self, update: &CharacterUpdate) -> Result<(), DomainError> {
        self.character_updates.lock().unwrap().push(update.clone());
        Ok(())
    }
}

/// An `InMemorySessionStore` whose first `save_session` stalls for a while,
/// so a later save can overtake it if nothing orders them.
#[derive(Debug)]
pub struct DelayedSessionStore {
    inner: Arc<InMemorySessionStore>,
    first_save_delay: Duration,
    stalled: AtomicBool,
}

impl DelayedSessionStore {
    /// Wrap `inner`, delaying its first save by `first_save_delay`. Saves
    /// that complete are visible through `inner`.
    #[must_use]
    pub fn new(inner: Arc<InMemorySessionStore>, first_save_delay: Duration) -> Self {
        Self {
            inner,
            first_save_delay,
            stalled: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl SessionStore for DelayedSessionStore {
    async fn load_session(
        &self,
        session_id: SessionId,
    ) -> Result<Option<SessionRecord>, DomainError> {
        self.inner.load_session(session_id).await
    }

    async fn save_session(&self, record: &SessionRecord) -> Result<(), DomainError> {
        if !self.stalled.swap(true, Ordering::SeqCst) {
            tokio::time::sleep(self.first_save_delay).await;
        }
        self.inner.save_session(record).await
    }

    async fn save_character_update(&self, update: &CharacterUpdate) -> Result<(), DomainError> {
        self.inner.save_character_update(update).await
    }
}

/// A store that always returns an infrastructure error. Useful for testing
/// error-handling paths.
#[derive(Debug)]
pub struct FailingSessionStore;

#[async_trait]
impl SessionStore for FailingSessionStore {
    async fn load_session(
        &self,
        _session_id: SessionId,
    ) -> Result<Option<SessionRecord>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn save_session(&self, _record: &SessionRecord) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn save_character_update(&self, _update: &CharacterUpdate) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}
