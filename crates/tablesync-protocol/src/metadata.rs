//! Bounded, open key-value metadata attached to game actions.
//!
//! Recognized keys are listed in [`keys`]; everything else is carried
//! through to other clients without interpretation.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tablesync_core::error::DomainError;

/// Most keys a metadata map may hold.
pub const MAX_KEYS: usize = 32;

/// Largest serialized size of a metadata map, in bytes.
pub const MAX_SERIALIZED_BYTES: usize = 16 * 1024;

/// Keys the orchestrator interprets.
pub mod keys {
    /// `enter_combat`: array of combatant specs.
    pub const COMBATANTS: &str = "combatants";
    /// `add_combatant`: one combatant spec.
    pub const COMBATANT: &str = "combatant";
    /// `remove_combatant`: the character to remove.
    pub const CHARACTER_ID: &str = "character_id";
    /// `update_quest`: the quest object relayed to clients.
    pub const QUEST: &str = "quest";
}

/// Open metadata map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, Value>);

impl Metadata {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, returning `self` for chaining.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    /// Raw access to a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Checks the size bounds.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the map has too many keys or is
    /// too large once serialized.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.0.len() > MAX_KEYS {
            return Err(DomainError::Validation(format!(
                "metadata is limited to {MAX_KEYS} keys"
            )));
        }
        let size = serde_json::to_vec(&self.0)
            .map_err(|e| DomainError::Validation(format!("metadata is not serializable: {e}")))?
            .len();
        if size > MAX_SERIALIZED_BYTES {
            return Err(DomainError::Validation(format!(
                "metadata is limited to {MAX_SERIALIZED_BYTES} bytes"
            )));
        }
        Ok(())
    }

    /// Decodes a required recognized key.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the key is missing or has the
    /// wrong shape.
    pub fn require<T: DeserializeOwned>(&self, key: &str) -> Result<T, DomainError> {
        let value = self
            .0
            .get(key)
            .ok_or_else(|| DomainError::Validation(format!("metadata.{key} is required")))?;
        serde_json::from_value(value.clone())
            .map_err(|e| DomainError::Validation(format!("metadata.{key} is malformed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unrecognized_keys_round_trip_untouched() {
        let raw = json!({ "mood": "grim", "weather": { "rain": true } });
        let metadata: Metadata = serde_json::from_value(raw.clone()).unwrap();
        assert!(metadata.validate().is_ok());
        assert_eq!(serde_json::to_value(&metadata).unwrap(), raw);
    }

    #[test]
    fn test_too_many_keys_rejected() {
        let mut metadata = Metadata::new();
        for i in 0..=MAX_KEYS {
            metadata = metadata.with(format!("k{i}"), json!(i));
        }
        assert!(matches!(metadata.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_oversized_value_rejected() {
        let metadata = Metadata::new().with("blob", json!("x".repeat(MAX_SERIALIZED_BYTES)));
        assert!(matches!(metadata.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_require_reports_missing_and_malformed_keys() {
        let metadata = Metadata::new().with(keys::CHARACTER_ID, json!(42));
        let missing: Result<String, _> = metadata.require(keys::QUEST);
        assert!(matches!(missing, Err(DomainError::Validation(m)) if m.contains("required")));
        let malformed: Result<uuid::Uuid, _> = metadata.require(keys::CHARACTER_ID);
        assert!(matches!(malformed, Err(DomainError::Validation(m)) if m.contains("malformed")));
    }
}
