//! Pure rules functions.
//!
//! Nothing here touches a [`crate::state::CombatState`]. Every function takes
//! the records it needs and a [`DieRoller`], and returns a value describing
//! what happened; the turn loop decides what to do with it.
//!
//! # Order of mitigation
//!
//! Immunity zeroes and short-circuits, then resistance halves (floor), then
//! vulnerability doubles. Each category applies at most once no matter how
//! many sources grant it.

use serde::{Deserialize, Serialize};
use skirmish_grid::Cover;

use crate::advantage::{AdvantageState, Sources};
use crate::combatant::{Ability, Attack, Combatant, Conditions, DamageType, DeathSaves, Defenses};
use crate::dice::{roll_d20, D20Roll, DiceExpr, DieRoller};

/// Distance in feet within which a prone target is easier to hit.
pub const ADJACENT_FT: u32 = 5;

/// Minimum concentration save DC.
pub const MIN_CONCENTRATION_DC: i32 = 10;

/// Death save success threshold.
pub const DEATH_SAVE_DC: u8 = 10;

// =============================================================================
// Attacks
// =============================================================================

/// Outcome of one attack roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackRoll {
    /// The d20.
    pub roll: D20Roll,
    /// d20 plus bonus.
    pub total: i32,
    /// Armor value plus cover bonus.
    pub defense: i32,
    /// Whether the attack hit.
    pub hit: bool,
    /// Whether the hit is critical.
    pub critical: bool,
}

/// Rolls an attack against `armor_class` behind `cover`.
///
/// A natural 20 always hits and is critical. A natural 1 always misses.
/// Otherwise the attack hits iff `d20 + to_hit >= armor_class + cover bonus`.
///
/// # Example
///
/// ```
/// use skirmish_core::advantage::AdvantageState;
/// use skirmish_core::dice::DieRoller;
/// use skirmish_core::rules::resolve_attack;
/// use skirmish_grid::Cover;
///
/// struct Twelve;
/// impl DieRoller for Twelve {
///     fn roll_die(&mut self, _sides: u32) -> u32 { 12 }
/// }
///
/// let roll = resolve_attack(5, 15, Cover::None, AdvantageState::Normal, &mut Twelve);
/// assert_eq!(roll.total, 17);
/// assert!(roll.hit);
/// ```
pub fn resolve_attack<R: DieRoller + ?Sized>(
    to_hit: i32,
    armor_class: i32,
    cover: Cover,
    state: AdvantageState,
    rng: &mut R,
) -> AttackRoll {
    let roll = roll_d20(state, rng);
    let total = i32::from(roll.natural) + to_hit;
    let defense = armor_class + cover.bonus();
    let (hit, critical) = if roll.is_natural_20() {
        (true, true)
    } else if roll.is_natural_1() {
        (false, false)
    } else {
        (total >= defense, false)
    };
    tracing::trace!(
        target: "skirmish::rules",
        natural = roll.natural,
        total,
        defense,
        hit,
        critical,
        "attack roll"
    );
    AttackRoll {
        roll,
        total,
        defense,
        hit,
        critical,
    }
}

/// Collects condition-derived advantage sources for one attack.
///
/// # Arguments
///
/// * `attacker` - The attacking combatant
/// * `target` - The target
/// * `attack` - The strike being made
/// * `distance_ft` - Distance between the two
/// * `threatened` - A hostile, conscious combatant is within 5 ft of the attacker
#[must_use]
pub fn attack_sources(
    attacker: &Combatant,
    target: &Combatant,
    attack: &Attack,
    distance_ft: u32,
    threatened: bool,
) -> Sources {
    let mut sources = Sources::new();
    let a = attacker.conditions;
    let t = target.conditions;

    for (flag, name) in [
        (Conditions::BLINDED, "attacker blinded"),
        (Conditions::POISONED, "attacker poisoned"),
        (Conditions::PRONE, "attacker prone"),
        (Conditions::RESTRAINED, "attacker restrained"),
        (Conditions::FRIGHTENED, "attacker frightened"),
    ] {
        if a.contains(flag) {
            sources.impose(name);
        }
    }
    if a.contains(Conditions::INVISIBLE) {
        sources.grant("attacker invisible");
    }

    for (flag, name) in [
        (Conditions::BLINDED, "target blinded"),
        (Conditions::RESTRAINED, "target restrained"),
        (Conditions::PARALYZED, "target paralyzed"),
        (Conditions::STUNNED, "target stunned"),
        (Conditions::UNCONSCIOUS, "target unconscious"),
    ] {
        if t.contains(flag) {
            sources.grant(name);
        }
    }
    if t.contains(Conditions::INVISIBLE) {
        sources.impose("target invisible");
    }
    if t.contains(Conditions::PRONE) {
        if distance_ft <= ADJACENT_FT {
            sources.grant("target prone, adjacent");
        } else {
            sources.impose("target prone, distant");
        }
    }

    if is_ranged_use(attack, distance_ft) && threatened {
        sources.impose("ranged attack in melee");
    }
    sources
}

/// True if the attack is being made at range rather than in melee.
#[must_use]
pub fn is_ranged_use(attack: &Attack, distance_ft: u32) -> bool {
    attack.reach_ft.map_or(true, |reach| distance_ft > reach)
}

/// A melee hit on a paralyzed or unconscious target within 5 ft is critical.
#[must_use]
pub fn forces_critical(attack: &Attack, target: &Combatant, distance_ft: u32) -> bool {
    !is_ranged_use(attack, distance_ft)
        && distance_ft <= ADJACENT_FT
        && target
            .conditions
            .intersects(Conditions::PARALYZED | Conditions::UNCONSCIOUS)
}

// =============================================================================
// Damage
// =============================================================================

/// Rolls damage, doubling the dice (never the modifier) on a critical.
pub fn roll_damage<R: DieRoller + ?Sized>(expr: &DiceExpr, critical: bool, rng: &mut R) -> u32 {
    let expr = if critical { expr.critical() } else { *expr };
    expr.roll(rng)
}

/// Which mitigation categories fired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MitigationApplied {
    /// Immunity zeroed the damage.
    pub immune: bool,
    /// Resistance halved it.
    pub resisted: bool,
    /// Vulnerability doubled it.
    pub vulnerable: bool,
}

/// Damage after mitigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mitigated {
    /// Final amount.
    pub amount: u32,
    /// Categories applied.
    pub applied: MitigationApplied,
}

/// Applies immunity, resistance and vulnerability in that order.
///
/// ```
/// use skirmish_core::combatant::{DamageType, Defenses};
/// use skirmish_core::rules::apply_mitigation;
///
/// let defenses = Defenses {
///     resistances: vec![DamageType::Fire, DamageType::Fire],
///     vulnerabilities: vec![DamageType::Fire],
///     ..Defenses::default()
/// };
/// assert_eq!(apply_mitigation(20, DamageType::Fire, &defenses).amount, 20);
/// assert_eq!(apply_mitigation(7, DamageType::Fire, &defenses).amount, 6);
/// ```
#[must_use]
pub fn apply_mitigation(amount: u32, damage_type: DamageType, defenses: &Defenses) -> Mitigated {
    let mut applied = MitigationApplied::default();
    if defenses.is_immune(damage_type) {
        applied.immune = true;
        return Mitigated { amount: 0, applied };
    }
    let mut amount = amount;
    if defenses.resists(damage_type) {
        amount /= 2;
        applied.resisted = true;
    }
    if defenses.is_vulnerable(damage_type) {
        amount = amount.saturating_mul(2);
        applied.vulnerable = true;
    }
    Mitigated { amount, applied }
}

// =============================================================================
// Saving throws
// =============================================================================

/// Outcome of a saving throw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveRoll {
    /// The d20, or `None` when the save failed automatically.
    pub roll: Option<D20Roll>,
    /// d20 plus modifier plus cover.
    pub total: i32,
    /// Difficulty class.
    pub dc: i32,
    /// Whether the save succeeded.
    pub success: bool,
}

/// True if a save of `ability` fails without rolling.
#[must_use]
pub fn save_auto_fails(target: &Combatant, ability: Ability) -> bool {
    matches!(ability, Ability::Str | Ability::Dex)
        && target.conditions.intersects(Conditions::FAILS_PHYSICAL_SAVES)
}

/// Condition-derived advantage sources for a save.
#[must_use]
pub fn save_sources(target: &Combatant, ability: Ability) -> Sources {
    let mut sources = Sources::new();
    if ability == Ability::Dex && target.conditions.contains(Conditions::RESTRAINED) {
        sources.impose("restrained");
    }
    sources
}

/// Rolls a saving throw.
///
/// Cover adds to Dex saves only. Str and Dex saves fail without a roll while
/// the target is paralyzed, stunned or unconscious.
pub fn saving_throw<R: DieRoller + ?Sized>(
    target: &Combatant,
    ability: Ability,
    dc: i32,
    cover: Cover,
    rng: &mut R,
) -> SaveRoll {
    if save_auto_fails(target, ability) {
        tracing::trace!(target: "skirmish::rules", id = %target.id, ?ability, dc, "save auto-fails");
        return SaveRoll {
            roll: None,
            total: 0,
            dc,
            success: false,
        };
    }
    let state = save_sources(target, ability).resolve();
    let roll = roll_d20(state, rng);
    let cover_bonus = if ability == Ability::Dex { cover.bonus() } else { 0 };
    let total = i32::from(roll.natural) + target.modifiers.get(ability) + cover_bonus;
    let success = total >= dc;
    tracing::trace!(target: "skirmish::rules", id = %target.id, ?ability, total, dc, success, "save");
    SaveRoll {
        roll: Some(roll),
        total,
        dc,
        success,
    }
}

// =============================================================================
// Death saves
// =============================================================================

/// Result of one death save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathSaveRoll {
    /// The d20.
    pub natural: u8,
    /// Counters after the save.
    pub saves: DeathSaves,
    /// A natural 20 brought the combatant back to 1 vitality.
    pub revived: bool,
}

/// Rolls a death save.
///
/// Natural 1 is two failures, natural 20 revives with counters cleared,
/// otherwise 10 or more is a success.
pub fn death_save<R: DieRoller + ?Sized>(saves: DeathSaves, rng: &mut R) -> DeathSaveRoll {
    let roll = roll_d20(AdvantageState::Normal, rng);
    let (saves, revived) = match roll.natural {
        20 => (DeathSaves::reset(), true),
        1 => (saves.fail(2), false),
        n if n >= DEATH_SAVE_DC => (saves.succeed(), false),
        _ => (saves.fail(1), false),
    };
    DeathSaveRoll {
        natural: roll.natural,
        saves,
        revived,
    }
}

/// Counters after taking damage at 0 vitality: one failure, two on a
/// critical hit. A stable combatant becomes unstable.
#[must_use]
pub fn damage_at_zero(saves: DeathSaves, critical: bool) -> DeathSaves {
    saves.fail(if critical { 2 } else { 1 })
}

// =============================================================================
// Concentration
// =============================================================================

/// Concentration save DC: half the damage, at least 10.
#[must_use]
pub fn concentration_dc(damage: u32) -> i32 {
    i32::try_from(damage / 2)
        .unwrap_or(i32::MAX)
        .max(MIN_CONCENTRATION_DC)
}

/// Outcome of a concentration check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcentrationCheck {
    /// The Con save.
    pub save: SaveRoll,
    /// Whether the effect survives.
    pub maintained: bool,
}

/// Runs a concentration check if one is owed.
///
/// Returns `None` when the combatant sustains nothing or the final damage
/// is zero.
pub fn concentration_check<R: DieRoller + ?Sized>(
    combatant: &Combatant,
    damage: u32,
    rng: &mut R,
) -> Option<ConcentrationCheck> {
    if damage == 0 || combatant.concentration.is_none() {
        return None;
    }
    let save = saving_throw(
        combatant,
        Ability::Con,
        concentration_dc(damage),
        Cover::None,
        rng,
    );
    Some(ConcentrationCheck {
        save,
        maintained: save.success,
    })
}

/// Starts a sustained effect, dropping any previous one without a save.
///
/// Returns the updated record and the name of the effect that ended.
#[must_use]
pub fn begin_concentration(combatant: &Combatant, effect: &str) -> (Combatant, Option<String>) {
    let mut next = combatant.clone();
    let dropped = next.concentration.replace(effect.to_string());
    (next, dropped)
}
