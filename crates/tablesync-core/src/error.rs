//! Domain error types.

use thiserror::Error;

use crate::id::{ConnectionId, SessionId};

/// Top-level domain error type.
///
/// Every variant is reported to the originating connection only, as an
/// `error` event carrying [`DomainError::code`]. None of them is fatal to
/// the process.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Malformed or out-of-enum payload.
    #[error("validation error: {0}")]
    Validation(String),

    /// The connection acted on a session it never joined.
    #[error("not a member of session {0}")]
    NotAMember(SessionId),

    /// The connection is already bound to a session.
    #[error("already in session {0}")]
    AlreadyInSession(SessionId),

    /// Advantage and disadvantage were requested together.
    #[error("advantage and disadvantage are mutually exclusive")]
    ConflictingModifier,

    /// A combat transition was requested from the wrong state.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// The storage collaborator has no record of the session.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// The connection is not (or no longer) registered.
    #[error("connection not found: {0}")]
    ConnectionNotFound(ConnectionId),

    /// The connection exceeded its inbound message budget.
    #[error("rate limit exceeded")]
    RateLimited,

    /// An unexpected fault in a collaborator or in internal plumbing.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Machine-readable error code sent to clients.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotAMember(_) => "NOT_A_MEMBER",
            Self::AlreadyInSession(_) => "ALREADY_IN_SESSION",
            Self::ConflictingModifier => "CONFLICTING_MODIFIER",
            Self::InvalidTransition(_) => "INVALID_TRANSITION",
            Self::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Self::ConnectionNotFound(_) => "CONNECTION_NOT_FOUND",
            Self::RateLimited => "RATE_LIMITED",
            Self::Infrastructure(_) => "INTERNAL_FAILURE",
        }
    }

    /// Message safe to show a client. Infrastructure details stay in the logs.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::Infrastructure(_) => "internal failure, please retry".to_owned(),
            other => other.to_string(),
        }
    }
}
