//! Die types and roll modes.

use serde::{Deserialize, Serialize};
use tablesync_core::error::DomainError;

/// The fixed set of supported dice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DieType {
    /// Four-sided die.
    D4,
    /// Six-sided die.
    D6,
    /// Eight-sided die.
    D8,
    /// Ten-sided die.
    D10,
    /// Twelve-sided die.
    D12,
    /// Twenty-sided die.
    D20,
    /// Percentile die.
    D100,
}

impl DieType {
    /// Every supported die, smallest first.
    pub const ALL: [DieType; 7] = [
        DieType::D4,
        DieType::D6,
        DieType::D8,
        DieType::D10,
        DieType::D12,
        DieType::D20,
        DieType::D100,
    ];

    /// Number of faces on the die.
    #[must_use]
    pub fn faces(self) -> u32 {
        match self {
            DieType::D4 => 4,
            DieType::D6 => 6,
            DieType::D8 => 8,
            DieType::D10 => 10,
            DieType::D12 => 12,
            DieType::D20 => 20,
            DieType::D100 => 100,
        }
    }
}

/// How many dice are drawn and which one is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollMode {
    /// One draw.
    Normal,
    /// Two draws, keep the higher.
    Advantage,
    /// Two draws, keep the lower.
    Disadvantage,
}

impl RollMode {
    /// Builds a mode from the two request flags.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConflictingModifier` if both flags are set.
    pub fn from_flags(advantage: bool, disadvantage: bool) -> Result<Self, DomainError> {
        match (advantage, disadvantage) {
            (true, true) => Err(DomainError::ConflictingModifier),
            (true, false) => Ok(RollMode::Advantage),
            (false, true) => Ok(RollMode::Disadvantage),
            (false, false) => Ok(RollMode::Normal),
        }
    }

    /// Number of raw draws this mode needs.
    #[must_use]
    pub fn draws(self) -> usize {
        match self {
            RollMode::Normal => 1,
            RollMode::Advantage | RollMode::Disadvantage => 2,
        }
    }

    /// Picks the kept value out of the raw draws.
    #[must_use]
    pub fn keep(self, rolls: &[u32]) -> u32 {
        let kept = match self {
            RollMode::Normal => rolls.first().copied(),
            RollMode::Advantage => rolls.iter().copied().max(),
            RollMode::Disadvantage => rolls.iter().copied().min(),
        };
        kept.unwrap_or_default()
    }
}
