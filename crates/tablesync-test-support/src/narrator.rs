//! Test narrators — `NarrativeEngine` implementations for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use tablesync_core::error::DomainError;
use tablesync_core::id::SessionId;
use tablesync_core::narrator::NarrativeEngine;

/// Returns a canned reply and records every prompt it was given.
#[derive(Debug)]
pub struct ScriptedNarrator {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedNarrator {
    /// Create a narrator that answers every prompt with `reply`.
    #[must_use]
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl NarrativeEngine for ScriptedNarrator {
    async fn narrate(&self, _session_id: SessionId, prompt: &str) -> Result<String, DomainError> {
        self.prompts.lock().unwrap().push(prompt.to_owned());
        Ok(self.reply.clone())
    }
}

/// A narrator whose backend is always down.
#[derive(Debug)]
pub struct FailingNarrator;

#[async_trait]
impl NarrativeEngine for FailingNarrator {
    async fn narrate(&self, _session_id: SessionId, _prompt: &str) -> Result<String, DomainError> {
        Err(DomainError::Infrastructure("narrative engine timed out".into()))
    }
}
