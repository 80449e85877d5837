//! Strongly-typed identifiers and the authenticated identity.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generates a fresh random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

define_id!(
    /// Identifier of a persisted game session (and of its live room).
    SessionId
);
define_id!(
    /// Identifier of one live transport connection.
    ConnectionId
);
define_id!(
    /// Identifier of an authenticated user, issued by the auth collaborator.
    UserId
);
define_id!(
    /// Identifier of a character record owned by the storage collaborator.
    CharacterId
);

/// Maximum accepted length of a display name, in characters.
pub const MAX_DISPLAY_NAME_CHARS: usize = 64;

/// A verified user reference supplied by the auth collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// The user identifier.
    pub user_id: UserId,
    /// Human-readable name shown to other players.
    pub display_name: String,
}

impl Identity {
    /// Creates a new identity, trimming the display name.
    #[must_use]
    pub fn new(user_id: UserId, display_name: impl Into<String>) -> Self {
        let display_name: String = display_name.into();
        Self {
            user_id,
            display_name: display_name.trim().to_owned(),
        }
    }

    /// Whether the display name is non-empty and within bounds.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        !self.display_name.is_empty()
            && self.display_name.chars().count() <= MAX_DISPLAY_NAME_CHARS
    }
}
