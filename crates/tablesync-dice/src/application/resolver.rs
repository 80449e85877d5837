//! Dice resolution.
//!
//! `resolve` is pure with respect to session state: it reads the request,
//! draws from the RNG and stamps the result with the clock.

use std::sync::Mutex;

use tablesync_core::clock::Clock;
use tablesync_core::error::DomainError;
use tablesync_core::id::Identity;
use tablesync_core::rng::DeterministicRng;
use tracing::debug;

use crate::domain::die::DieType;
use crate::domain::roll::{DiceRollRequest, DiceRollResult};

/// Resolves a roll request.
///
/// Draws one uniform value in `[1, faces]`, or two under advantage or
/// disadvantage, keeps the appropriate one and adds the modifier.
///
/// # Errors
///
/// Returns `DomainError::ConflictingModifier` or `DomainError::Validation`
/// if the request is invalid. No draws are made in that case.
#[allow(clippy::cast_possible_wrap)]
pub fn resolve(
    request: &DiceRollRequest,
    rolled_by: &Identity,
    clock: &dyn Clock,
    rng: &mut dyn DeterministicRng,
) -> Result<DiceRollResult, DomainError> {
    let mode = request.validate()?;
    let faces = request.die_type.faces();

    let rolls: Vec<u32> = (0..mode.draws())
        .map(|_| rng.next_u32_range(1, faces))
        .collect();
    let kept = mode.keep(&rolls);
    let total = kept as i32 + request.modifier;
    let is_d20 = request.die_type == DieType::D20;

    debug!(
        die = ?request.die_type,
        ?mode,
        ?rolls,
        kept,
        total,
        "dice roll resolved"
    );

    Ok(DiceRollResult {
        die_type: request.die_type,
        modifier: request.modifier,
        purpose: request.purpose.trim().to_owned(),
        character_id: request.character_id,
        mode,
        rolls,
        kept,
        total,
        critical: is_d20 && kept == 20,
        fumble: is_d20 && kept == 1,
        rolled_by: rolled_by.clone(),
        rolled_at: clock.now(),
    })
}

/// Resolves a roll against a shared RNG.
///
/// The `Mutex` is locked only for the draw itself; callers must not hold it
/// across an await point.
///
/// # Errors
///
/// Returns the errors of [`resolve`], or `DomainError::Infrastructure` if
/// the RNG mutex is poisoned.
pub fn resolve_shared(
    request: &DiceRollRequest,
    rolled_by: &Identity,
    clock: &dyn Clock,
    rng: &Mutex<dyn DeterministicRng + Send>,
) -> Result<DiceRollResult, DomainError> {
    // Validate before locking so a bad request never contends for the RNG.
    request.validate()?;
    let mut rng_guard = rng
        .lock()
        .map_err(|e| DomainError::Infrastructure(format!("RNG mutex poisoned: {e}")))?;
    resolve(request, rolled_by, clock, &mut *rng_guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tablesync_core::id::{CharacterId, UserId};
    use tablesync_test_support::{FixedClock, MockRng, SequenceRng};

    use crate::domain::die::RollMode;

    fn fixed_clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap())
    }

    fn roller() -> Identity {
        Identity::new(UserId::new(), "Aria")
    }

    fn request(die_type: DieType, modifier: i32) -> DiceRollRequest {
        DiceRollRequest {
            die_type,
            modifier,
            purpose: "attack".to_owned(),
            character_id: CharacterId::new(),
            advantage: false,
            disadvantage: false,
        }
    }

    #[test]
    fn test_normal_roll_adds_modifier_to_single_draw() {
        let mut rng = SequenceRng::new(vec![14]);
        let identity = roller();

        let result = resolve(&request(DieType::D20, 3), &identity, &fixed_clock(), &mut rng).unwrap();

        assert_eq!(result.mode, RollMode::Normal);
        assert_eq!(result.rolls, vec![14]);
        assert_eq!(result.kept, 14);
        assert_eq!(result.total, 17);
        assert_eq!(result.rolled_by, identity);
        assert_eq!(result.rolled_at, fixed_clock().0);
    }

    #[test]
    fn test_advantage_keeps_higher_draw() {
        let mut rng = SequenceRng::new(vec![5, 18]);
        let mut req = request(DieType::D20, 0);
        req.advantage = true;

        let result = resolve(&req, &roller(), &fixed_clock(), &mut rng).unwrap();

        assert_eq!(result.rolls, vec![5, 18]);
        assert_eq!(result.kept, 18);
        assert_eq!(result.total, 18);
    }

    #[test]
    fn test_disadvantage_keeps_lower_draw() {
        let mut rng = SequenceRng::new(vec![5, 18]);
        let mut req = request(DieType::D20, 2);
        req.disadvantage = true;

        let result = resolve(&req, &roller(), &fixed_clock(), &mut rng).unwrap();

        assert_eq!(result.kept, 5);
        assert_eq!(result.total, 7);
    }

    #[test]
    fn test_advantage_total_never_below_disadvantage_for_same_draws() {
        let draws = [(1, 20), (20, 1), (7, 7), (3, 12), (19, 2)];
        for (a, b) in draws {
            let mut adv = request(DieType::D20, -2);
            adv.advantage = true;
            let mut dis = adv.clone();
            dis.advantage = false;
            dis.disadvantage = true;

            let high = resolve(&adv, &roller(), &fixed_clock(), &mut SequenceRng::new(vec![a, b]))
                .unwrap();
            let low = resolve(&dis, &roller(), &fixed_clock(), &mut SequenceRng::new(vec![a, b]))
                .unwrap();

            assert!(high.total >= low.total, "draws ({a}, {b})");
        }
    }

    #[test]
    fn test_conflicting_flags_fail_without_drawing() {
        // An empty SequenceRng panics if drawn from.
        let mut rng = SequenceRng::new(vec![]);
        let mut req = request(DieType::D20, 0);
        req.advantage = true;
        req.disadvantage = true;

        let result = resolve(&req, &roller(), &fixed_clock(), &mut rng);

        assert!(matches!(result, Err(DomainError::ConflictingModifier)));
    }

    #[test]
    fn test_negative_total_is_not_clamped() {
        let mut rng = MockRng;

        let result = resolve(&request(DieType::D4, -5), &roller(), &fixed_clock(), &mut rng).unwrap();

        assert_eq!(result.kept, 1);
        assert_eq!(result.total, -4);
    }

    #[test]
    fn test_natural_twenty_and_one_flagged_on_d20_only() {
        let crit = resolve(
            &request(DieType::D20, 0),
            &roller(),
            &fixed_clock(),
            &mut SequenceRng::new(vec![20]),
        )
        .unwrap();
        assert!(crit.critical);
        assert!(!crit.fumble);

        let fumble = resolve(
            &request(DieType::D20, 5),
            &roller(),
            &fixed_clock(),
            &mut SequenceRng::new(vec![1]),
        )
        .unwrap();
        assert!(fumble.fumble);

        let d6_one = resolve(
            &request(DieType::D6, 0),
            &roller(),
            &fixed_clock(),
            &mut SequenceRng::new(vec![1]),
        )
        .unwrap();
        assert!(!d6_one.fumble);
    }

    #[test]
    fn test_out_of_range_modifier_is_validation_error() {
        let result = resolve(
            &request(DieType::D20, 101),
            &roller(),
            &fixed_clock(),
            &mut MockRng,
        );
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_extreme_modifiers_are_rejected_without_overflow() {
        for modifier in [i32::MIN, i32::MAX, -101] {
            let result = resolve(
                &request(DieType::D20, modifier),
                &roller(),
                &fixed_clock(),
                &mut MockRng,
            );
            assert!(
                matches!(result, Err(DomainError::Validation(_))),
                "modifier {modifier}"
            );
        }
        let edge = resolve(&request(DieType::D20, -100), &roller(), &fixed_clock(), &mut MockRng)
            .unwrap();
        assert_eq!(edge.total, -99);
    }

    #[test]
    fn test_blank_purpose_is_validation_error() {
        let mut req = request(DieType::D8, 0);
        req.purpose = "   ".to_owned();
        let result = resolve(&req, &roller(), &fixed_clock(), &mut MockRng);
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_resolve_shared_locks_rng() {
        let rng = Mutex::new(SequenceRng::new(vec![63]));
        let result =
            resolve_shared(&request(DieType::D100, 10), &roller(), &fixed_clock(), &rng).unwrap();
        assert_eq!(result.total, 73);
    }
}
