//! Narrative-generation collaborator.

use async_trait::async_trait;

use crate::error::DomainError;
use crate::id::SessionId;

/// Black-box text generator. The orchestrator relays its output verbatim.
#[async_trait]
pub trait NarrativeEngine: Send + Sync {
    /// Generates narration for `prompt` in the context of `session_id`.
    async fn narrate(&self, session_id: SessionId, prompt: &str) -> Result<String, DomainError>;
}
