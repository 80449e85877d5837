//! The per-session turn/combat state machine.
//!
//! `Idle` → `InCombat(round, turn_index)` → `Idle`. Scene changes are
//! accepted in either state and never touch combat.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tablesync_core::error::DomainError;
use tablesync_core::id::{CharacterId, Identity};
use tracing::debug;

use super::initiative::{
    CombatantSpec, InitiativeEntry, MAX_COMBATANTS, build_order, turn_order,
};
use super::scene::{Scene, validate_description};

/// Live encounter data. Only exists while in combat, so `turn_index` is
/// always a valid index into a non-empty `order`.
#[derive(Debug, Clone)]
struct Encounter {
    round: u32,
    turn_index: usize,
    order: Vec<InitiativeEntry>,
}

impl Encounter {
    fn current(&self) -> &InitiativeEntry {
        &self.order[self.turn_index]
    }

    fn start_next_round(&mut self) {
        self.turn_index = 0;
        self.round = self.round.saturating_add(1);
        for entry in &mut self.order {
            entry.has_acted = false;
        }
    }
}

/// Immutable view of combat state, broadcast after every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatSnapshot {
    /// Whether an encounter is running.
    pub in_combat: bool,
    /// Current round, starting at 1. `None` outside combat.
    pub round: Option<u32>,
    /// Index of the acting combatant. `None` outside combat.
    pub turn_index: Option<usize>,
    /// Initiative order, highest first. Empty outside combat.
    pub initiative: Vec<InitiativeEntry>,
}

impl CombatSnapshot {
    /// Snapshot of the idle state.
    #[must_use]
    pub fn idle() -> Self {
        Self {
            in_combat: false,
            round: None,
            turn_index: None,
            initiative: Vec::new(),
        }
    }
}

/// Result of a transition that hands the turn to someone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnChange {
    /// State after the transition.
    pub snapshot: CombatSnapshot,
    /// Whose turn it now is.
    pub current: InitiativeEntry,
    /// Whether this transition started a new round.
    pub new_round: bool,
}

/// Result of adding or removing a combatant mid-fight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterChange {
    /// State after the change.
    pub snapshot: CombatSnapshot,
    /// Set when the acting combatant changed as a side effect.
    pub turn: Option<TurnChange>,
}

/// Authoritative turn, combat and scene state for one session.
#[derive(Debug, Clone, Default)]
pub struct TableState {
    encounter: Option<Encounter>,
    scene: Option<Scene>,
}

impl TableState {
    /// Creates an idle table with no scene.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an idle table restored to a persisted scene description.
    #[must_use]
    pub fn with_scene(description: Option<String>, restored_at: DateTime<Utc>) -> Self {
        Self {
            encounter: None,
            scene: description.map(|description| Scene {
                description,
                changed_by: None,
                changed_at: restored_at,
            }),
        }
    }

    /// Whether an encounter is running.
    #[must_use]
    pub fn is_in_combat(&self) -> bool {
        self.encounter.is_some()
    }

    /// The current scene, if any.
    #[must_use]
    pub fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }

    /// The combatant whose turn it is.
    #[must_use]
    pub fn current(&self) -> Option<&InitiativeEntry> {
        self.encounter.as_ref().map(Encounter::current)
    }

    /// Current combat state as an immutable snapshot.
    #[must_use]
    pub fn snapshot(&self) -> CombatSnapshot {
        match &self.encounter {
            None => CombatSnapshot::idle(),
            Some(encounter) => CombatSnapshot {
                in_combat: true,
                round: Some(encounter.round),
                turn_index: Some(encounter.turn_index),
                initiative: encounter.order.clone(),
            },
        }
    }

    fn encounter_mut(&mut self, action: &str) -> Result<&mut Encounter, DomainError> {
        self.encounter.as_mut().ok_or_else(|| {
            DomainError::InvalidTransition(format!("cannot {action} while not in combat"))
        })
    }

    fn turn_change(&self, new_round: bool) -> Option<TurnChange> {
        let current = self.current()?.clone();
        Some(TurnChange {
            snapshot: self.snapshot(),
            current,
            new_round,
        })
    }

    /// Starts an encounter: sorts the list, round 1, first combatant acts.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` if already in combat, or
    /// `DomainError::Validation` if the initiative list is unusable.
    pub fn enter_combat(&mut self, combatants: Vec<CombatantSpec>) -> Result<TurnChange, DomainError> {
        if self.encounter.is_some() {
            return Err(DomainError::InvalidTransition(
                "combat is already in progress".to_owned(),
            ));
        }
        let order = build_order(combatants)?;
        debug!(combatants = order.len(), "entering combat");
        self.encounter = Some(Encounter {
            round: 1,
            turn_index: 0,
            order,
        });
        self.turn_change(true).ok_or_else(|| {
            DomainError::Infrastructure("encounter started without combatants".to_owned())
        })
    }

    /// Ends the current turn and hands it to the next combatant, wrapping
    /// into a new round after the last one.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` if not in combat.
    pub fn advance_turn(&mut self) -> Result<TurnChange, DomainError> {
        let encounter = self.encounter_mut("advance the turn")?;
        let acting = encounter.turn_index;
        encounter.order[acting].has_acted = true;
        encounter.turn_index += 1;
        let new_round = encounter.turn_index >= encounter.order.len();
        if new_round {
            encounter.start_next_round();
        }
        self.turn_change(new_round).ok_or_else(|| {
            DomainError::Infrastructure("encounter lost its combatants".to_owned())
        })
    }

    /// Ends the encounter and returns to idle.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` if not in combat.
    pub fn exit_combat(&mut self) -> Result<CombatSnapshot, DomainError> {
        self.encounter_mut("exit combat")?;
        self.encounter = None;
        debug!("combat ended");
        Ok(CombatSnapshot::idle())
    }

    /// Inserts a combatant mid-fight at its initiative position. The
    /// combatant currently acting keeps the turn.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` if not in combat, or
    /// `DomainError::Validation` for a malformed or duplicate combatant.
    pub fn add_combatant(&mut self, combatant: CombatantSpec) -> Result<RosterChange, DomainError> {
        combatant.validate()?;
        let encounter = self.encounter_mut("add a combatant")?;
        if encounter
            .order
            .iter()
            .any(|e| e.character_id == combatant.character_id)
        {
            return Err(DomainError::Validation(format!(
                "character {} is already in the initiative list",
                combatant.character_id
            )));
        }
        if encounter.order.len() >= MAX_COMBATANTS {
            return Err(DomainError::Validation(format!(
                "initiative list is limited to {MAX_COMBATANTS} combatants"
            )));
        }

        let entry = InitiativeEntry::from(combatant);
        let position = encounter
            .order
            .partition_point(|existing| turn_order(existing, &entry).is_lt());
        encounter.order.insert(position, entry);
        if position <= encounter.turn_index {
            encounter.turn_index += 1;
        }

        Ok(RosterChange {
            snapshot: self.snapshot(),
            turn: None,
        })
    }

    /// Removes a combatant mid-fight. If it was acting, the turn passes to
    /// the next combatant (wrapping into a new round if it was last).
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` if not in combat or if this
    /// is the last combatant, and `DomainError::Validation` if the character
    /// is not in the initiative list.
    pub fn remove_combatant(&mut self, character_id: CharacterId) -> Result<RosterChange, DomainError> {
        let encounter = self.encounter_mut("remove a combatant")?;
        let position = encounter
            .order
            .iter()
            .position(|e| e.character_id == character_id)
            .ok_or_else(|| {
                DomainError::Validation(format!(
                    "character {character_id} is not in the initiative list"
                ))
            })?;
        if encounter.order.len() == 1 {
            return Err(DomainError::InvalidTransition(
                "cannot remove the last combatant; exit combat instead".to_owned(),
            ));
        }

        encounter.order.remove(position);
        let was_acting = position == encounter.turn_index;
        let mut new_round = false;
        if position < encounter.turn_index {
            encounter.turn_index -= 1;
        } else if was_acting && encounter.turn_index >= encounter.order.len() {
            encounter.start_next_round();
            new_round = true;
        }

        let turn = if was_acting {
            self.turn_change(new_round)
        } else {
            None
        };
        Ok(RosterChange {
            snapshot: self.snapshot(),
            turn,
        })
    }

    /// Replaces the scene. Valid in any combat state.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for an empty or oversized description.
    pub fn change_scene(
        &mut self,
        description: &str,
        changed_by: &Identity,
        changed_at: DateTime<Utc>,
    ) -> Result<Scene, DomainError> {
        let description = validate_description(description)?;
        let scene = Scene {
            description,
            changed_by: Some(changed_by.clone()),
            changed_at,
        };
        self.scene = Some(scene.clone());
        Ok(scene)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tablesync_core::id::UserId;
    use uuid::Uuid;

    fn spec(id: u128, initiative: i32) -> CombatantSpec {
        CombatantSpec {
            character_id: CharacterId(Uuid::from_u128(id)),
            character_name: format!("c{id}"),
            owner: UserId(Uuid::from_u128(1000 + id)),
            initiative,
        }
    }

    fn cid(id: u128) -> CharacterId {
        CharacterId(Uuid::from_u128(id))
    }

    fn in_combat(specs: Vec<CombatantSpec>) -> TableState {
        let mut table = TableState::new();
        table.enter_combat(specs).unwrap();
        table
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
    }

    // --- enter_combat ---

    #[test]
    fn test_enter_combat_starts_round_one_at_top_of_order() {
        let mut table = TableState::new();

        let change = table.enter_combat(vec![spec(1, 8), spec(2, 15)]).unwrap();

        assert_eq!(change.snapshot.round, Some(1));
        assert_eq!(change.snapshot.turn_index, Some(0));
        assert!(change.snapshot.in_combat);
        assert_eq!(change.current.character_id, cid(2));
        assert!(change.new_round);
    }

    #[test]
    fn test_enter_combat_twice_is_invalid_transition() {
        let mut table = in_combat(vec![spec(1, 8)]);

        let result = table.enter_combat(vec![spec(2, 3)]);

        assert!(matches!(result, Err(DomainError::InvalidTransition(_))));
        assert_eq!(table.current().unwrap().character_id, cid(1));
    }

    #[test]
    fn test_enter_combat_with_bad_list_stays_idle() {
        let mut table = TableState::new();
        assert!(table.enter_combat(vec![]).is_err());
        assert!(!table.is_in_combat());
        assert_eq!(table.snapshot(), CombatSnapshot::idle());
    }

    // --- advance_turn ---

    #[test]
    fn test_advance_turn_marks_actor_and_moves_on() {
        let mut table = in_combat(vec![spec(1, 20), spec(2, 10), spec(3, 5)]);

        let change = table.advance_turn().unwrap();

        assert_eq!(change.snapshot.turn_index, Some(1));
        assert_eq!(change.snapshot.round, Some(1));
        assert!(change.snapshot.initiative[0].has_acted);
        assert!(!change.new_round);
        assert_eq!(change.current.character_id, cid(2));
    }

    #[test]
    fn test_full_cycle_wraps_to_zero_and_increments_round_once() {
        let specs = vec![spec(1, 20), spec(2, 10), spec(3, 5), spec(4, 1)];
        let n = specs.len();
        let mut table = in_combat(specs);

        let mut round_starts = 0;
        let mut last = None;
        for _ in 0..n {
            let change = table.advance_turn().unwrap();
            if change.new_round {
                round_starts += 1;
            }
            last = Some(change);
        }

        let last = last.unwrap();
        assert_eq!(round_starts, 1);
        assert_eq!(last.snapshot.turn_index, Some(0));
        assert_eq!(last.snapshot.round, Some(2));
        assert!(last.snapshot.initiative.iter().all(|e| !e.has_acted));
    }

    #[test]
    fn test_single_combatant_starts_new_round_every_advance() {
        let mut table = in_combat(vec![spec(1, 10)]);
        table.advance_turn().unwrap();
        let change = table.advance_turn().unwrap();
        assert_eq!(change.snapshot.round, Some(3));
        assert_eq!(change.snapshot.turn_index, Some(0));
    }

    #[test]
    fn test_advance_turn_while_idle_is_invalid_transition() {
        let mut table = TableState::new();
        assert!(matches!(
            table.advance_turn(),
            Err(DomainError::InvalidTransition(_))
        ));
    }

    // --- exit_combat ---

    #[test]
    fn test_exit_combat_clears_round_and_order() {
        let mut table = in_combat(vec![spec(1, 10), spec(2, 4)]);
        table.advance_turn().unwrap();

        let snapshot = table.exit_combat().unwrap();

        assert!(!snapshot.in_combat);
        assert_eq!(snapshot.round, None);
        assert_eq!(snapshot.turn_index, None);
        assert!(snapshot.initiative.is_empty());
        assert!(table.current().is_none());
    }

    #[test]
    fn test_exit_combat_while_idle_is_invalid_transition() {
        let mut table = TableState::new();
        assert!(matches!(
            table.exit_combat(),
            Err(DomainError::InvalidTransition(_))
        ));
    }

    #[test]
    fn test_reentering_after_exit_resets_round() {
        let mut table = in_combat(vec![spec(1, 10)]);
        table.advance_turn().unwrap();
        table.exit_combat().unwrap();

        let change = table.enter_combat(vec![spec(2, 3)]).unwrap();

        assert_eq!(change.snapshot.round, Some(1));
    }

    // --- roster changes ---

    #[test]
    fn test_add_combatant_ahead_of_actor_keeps_actor() {
        let mut table = in_combat(vec![spec(1, 20), spec(2, 10), spec(3, 5)]);
        table.advance_turn().unwrap(); // c2 acting at index 1

        let change = table.add_combatant(spec(4, 15)).unwrap();

        assert_eq!(change.snapshot.turn_index, Some(2));
        assert_eq!(table.current().unwrap().character_id, cid(2));
        let order: Vec<CharacterId> = change
            .snapshot
            .initiative
            .iter()
            .map(|e| e.character_id)
            .collect();
        assert_eq!(order, vec![cid(1), cid(4), cid(2), cid(3)]);
        assert!(change.turn.is_none());
    }

    #[test]
    fn test_add_combatant_behind_actor_keeps_index() {
        let mut table = in_combat(vec![spec(1, 20), spec(2, 10)]);

        let change = table.add_combatant(spec(3, 1)).unwrap();

        assert_eq!(change.snapshot.turn_index, Some(0));
        assert_eq!(change.snapshot.initiative.len(), 3);
    }

    #[test]
    fn test_add_duplicate_combatant_rejected() {
        let mut table = in_combat(vec![spec(1, 20)]);
        assert!(matches!(
            table.add_combatant(spec(1, 3)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn test_add_combatant_while_idle_is_invalid_transition() {
        let mut table = TableState::new();
        assert!(matches!(
            table.add_combatant(spec(1, 3)),
            Err(DomainError::InvalidTransition(_))
        ));
    }

    #[test]
    fn test_remove_combatant_before_actor_shifts_index() {
        let mut table = in_combat(vec![spec(1, 20), spec(2, 10), spec(3, 5)]);
        table.advance_turn().unwrap();
        table.advance_turn().unwrap(); // c3 acting at index 2

        let change = table.remove_combatant(cid(1)).unwrap();

        assert_eq!(change.snapshot.turn_index, Some(1));
        assert_eq!(table.current().unwrap().character_id, cid(3));
        assert!(change.turn.is_none());
    }

    #[test]
    fn test_remove_acting_combatant_passes_turn() {
        let mut table = in_combat(vec![spec(1, 20), spec(2, 10), spec(3, 5)]);

        let change = table.remove_combatant(cid(1)).unwrap();

        let turn = change.turn.unwrap();
        assert_eq!(turn.current.character_id, cid(2));
        assert!(!turn.new_round);
        assert_eq!(change.snapshot.turn_index, Some(0));
    }

    #[test]
    fn test_remove_last_in_order_while_acting_wraps_round() {
        let mut table = in_combat(vec![spec(1, 20), spec(2, 10)]);
        table.advance_turn().unwrap(); // c2 acting at index 1

        let change = table.remove_combatant(cid(2)).unwrap();

        let turn = change.turn.unwrap();
        assert!(turn.new_round);
        assert_eq!(change.snapshot.round, Some(2));
        assert_eq!(change.snapshot.turn_index, Some(0));
        assert!(change.snapshot.initiative.iter().all(|e| !e.has_acted));
    }

    #[test]
    fn test_remove_only_combatant_is_invalid_transition() {
        let mut table = in_combat(vec![spec(1, 20)]);
        assert!(matches!(
            table.remove_combatant(cid(1)),
            Err(DomainError::InvalidTransition(_))
        ));
        assert!(table.is_in_combat());
    }

    #[test]
    fn test_remove_unknown_combatant_rejected() {
        let mut table = in_combat(vec![spec(1, 20), spec(2, 4)]);
        assert!(matches!(
            table.remove_combatant(cid(9)),
            Err(DomainError::Validation(_))
        ));
    }

    // --- change_scene ---

    #[test]
    fn test_change_scene_does_not_touch_combat() {
        let mut table = in_combat(vec![spec(1, 20), spec(2, 4)]);
        table.advance_turn().unwrap();
        let before = table.snapshot();
        let gm = Identity::new(UserId::new(), "GM");

        let scene = table.change_scene("  The crypt door groans open. ", &gm, now()).unwrap();

        assert_eq!(scene.description, "The crypt door groans open.");
        assert_eq!(scene.changed_by, Some(gm));
        assert_eq!(table.snapshot(), before);
    }

    #[test]
    fn test_change_scene_while_idle_is_valid() {
        let mut table = TableState::new();
        let gm = Identity::new(UserId::new(), "GM");
        assert!(table.change_scene("Tavern", &gm, now()).is_ok());
        assert_eq!(table.scene().unwrap().description, "Tavern");
    }

    #[test]
    fn test_empty_scene_rejected_and_previous_kept() {
        let mut table = TableState::with_scene(Some("Forest".to_owned()), now());
        let gm = Identity::new(UserId::new(), "GM");

        assert!(table.change_scene("   ", &gm, now()).is_err());
        assert_eq!(table.scene().unwrap().description, "Forest");
    }

    #[test]
    fn test_snapshot_serializes_idle_fields_as_null() {
        let json = serde_json::to_value(TableState::new().snapshot()).unwrap();
        assert_eq!(json["in_combat"], false);
        assert!(json["round"].is_null());
        assert!(json["turn_index"].is_null());
    }
}
