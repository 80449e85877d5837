//! Roll requests and results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tablesync_core::error::DomainError;
use tablesync_core::id::{CharacterId, Identity};

use super::die::{DieType, RollMode};

/// Largest accepted absolute modifier.
pub const MAX_MODIFIER: i32 = 100;

/// Longest accepted purpose tag, in characters.
pub const MAX_PURPOSE_CHARS: usize = 64;

/// A request to roll one die.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceRollRequest {
    /// Which die to roll.
    pub die_type: DieType,
    /// Flat modifier added to the kept value. May be negative.
    #[serde(default)]
    pub modifier: i32,
    /// What the roll is for (e.g. "attack", "stealth").
    pub purpose: String,
    /// The character making the roll.
    pub character_id: CharacterId,
    /// Roll twice, keep the higher.
    #[serde(default)]
    pub advantage: bool,
    /// Roll twice, keep the lower.
    #[serde(default)]
    pub disadvantage: bool,
}

impl DiceRollRequest {
    /// Checks the request shape and derives its roll mode.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConflictingModifier` if both advantage flags are
    /// set, or `DomainError::Validation` for an out-of-range modifier or an
    /// empty or oversized purpose.
    pub fn validate(&self) -> Result<RollMode, DomainError> {
        let mode = RollMode::from_flags(self.advantage, self.disadvantage)?;
        if !(-MAX_MODIFIER..=MAX_MODIFIER).contains(&self.modifier) {
            return Err(DomainError::Validation(format!(
                "modifier must be within ±{MAX_MODIFIER}"
            )));
        }
        let purpose = self.purpose.trim();
        if purpose.is_empty() || purpose.chars().count() > MAX_PURPOSE_CHARS {
            return Err(DomainError::Validation(format!(
                "purpose must be 1-{MAX_PURPOSE_CHARS} characters"
            )));
        }
        Ok(mode)
    }
}

/// The outcome of a resolved roll. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceRollResult {
    /// Which die was rolled.
    pub die_type: DieType,
    /// Modifier applied to the kept value.
    pub modifier: i32,
    /// What the roll was for.
    pub purpose: String,
    /// The character that rolled.
    pub character_id: CharacterId,
    /// Normal, advantage or disadvantage.
    pub mode: RollMode,
    /// Raw draws in the order they were made.
    pub rolls: Vec<u32>,
    /// The raw value that counts.
    pub kept: u32,
    /// `kept + modifier`. Not clamped; zero and negative totals are valid.
    pub total: i32,
    /// Kept natural 20 on a d20.
    pub critical: bool,
    /// Kept natural 1 on a d20.
    pub fumble: bool,
    /// Who rolled.
    pub rolled_by: Identity,
    /// Server time of resolution.
    pub rolled_at: DateTime<Utc>,
}
