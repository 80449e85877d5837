//! Scene state, orthogonal to combat.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tablesync_core::error::DomainError;
use tablesync_core::id::Identity;

/// Longest accepted scene description, in characters.
pub const MAX_SCENE_CHARS: usize = 4_000;

/// The scene the table is currently playing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    /// Free-text description.
    pub description: String,
    /// Who set it. `None` when restored from the store.
    pub changed_by: Option<Identity>,
    /// When it was set.
    pub changed_at: DateTime<Utc>,
}

/// Validates and normalizes a scene description.
///
/// # Errors
///
/// Returns `DomainError::Validation` for an empty or oversized description.
pub fn validate_description(description: &str) -> Result<String, DomainError> {
    let description = description.trim();
    if description.is_empty() {
        return Err(DomainError::Validation(
            "scene description must not be empty".to_owned(),
        ));
    }
    if description.chars().count() > MAX_SCENE_CHARS {
        return Err(DomainError::Validation(format!(
            "scene description is limited to {MAX_SCENE_CHARS} characters"
        )));
    }
    Ok(description.to_owned())
}
