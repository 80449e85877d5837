//! Initiative entries and ordering.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tablesync_core::error::DomainError;
use tablesync_core::id::{CharacterId, UserId};

/// Longest accepted character name, in characters.
pub const MAX_CHARACTER_NAME_CHARS: usize = 64;

/// Largest initiative list accepted for one encounter.
pub const MAX_COMBATANTS: usize = 64;

/// A combatant as submitted when entering combat or joining mid-fight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatantSpec {
    /// The character taking part.
    pub character_id: CharacterId,
    /// Name shown in the initiative tracker.
    pub character_name: String,
    /// The user controlling the character.
    pub owner: UserId,
    /// Initiative score; higher acts first.
    pub initiative: i32,
}

impl CombatantSpec {
    /// Checks the name bounds.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for an empty or oversized name.
    pub fn validate(&self) -> Result<(), DomainError> {
        let name = self.character_name.trim();
        if name.is_empty() || name.chars().count() > MAX_CHARACTER_NAME_CHARS {
            return Err(DomainError::Validation(format!(
                "character name must be 1-{MAX_CHARACTER_NAME_CHARS} characters"
            )));
        }
        Ok(())
    }
}

/// One slot in the initiative order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiativeEntry {
    /// The character taking part.
    pub character_id: CharacterId,
    /// Name shown in the initiative tracker.
    pub character_name: String,
    /// The user controlling the character.
    pub owner: UserId,
    /// Initiative score.
    pub initiative: i32,
    /// Whether this combatant has finished its turn this round.
    pub has_acted: bool,
}

impl From<CombatantSpec> for InitiativeEntry {
    fn from(spec: CombatantSpec) -> Self {
        Self {
            character_id: spec.character_id,
            character_name: spec.character_name.trim().to_owned(),
            owner: spec.owner,
            initiative: spec.initiative,
            has_acted: false,
        }
    }
}

/// Turn order: score descending, then character id ascending so equal
/// scores always land in the same order.
pub fn turn_order(a: &InitiativeEntry, b: &InitiativeEntry) -> Ordering {
    b.initiative
        .cmp(&a.initiative)
        .then_with(|| a.character_id.cmp(&b.character_id))
}

/// Validates a full initiative list and returns it sorted.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the list is empty, too long, has a
/// malformed entry or names the same character twice.
pub fn build_order(specs: Vec<CombatantSpec>) -> Result<Vec<InitiativeEntry>, DomainError> {
    if specs.is_empty() {
        return Err(DomainError::Validation(
            "initiative list must not be empty".to_owned(),
        ));
    }
    if specs.len() > MAX_COMBATANTS {
        return Err(DomainError::Validation(format!(
            "initiative list is limited to {MAX_COMBATANTS} combatants"
        )));
    }

    let mut seen = HashSet::with_capacity(specs.len());
    for spec in &specs {
        spec.validate()?;
        if !seen.insert(spec.character_id) {
            return Err(DomainError::Validation(format!(
                "character {} appears twice in the initiative list",
                spec.character_id
            )));
        }
    }

    let mut order: Vec<InitiativeEntry> = specs.into_iter().map(InitiativeEntry::from).collect();
    order.sort_by(turn_order);
    Ok(order)
}
