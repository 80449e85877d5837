//! Shared application state.

use std::sync::Arc;

use tablesync_session::Orchestrator;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The session orchestrator.
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}
