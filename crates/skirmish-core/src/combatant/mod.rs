//! Combatant data model.
//!
//! A [`Combatant`] is a plain record: the turn loop never mutates one in
//! place, it asks [`crate::state::CombatState`] for a new snapshot holding an
//! updated copy. Records arrive from an external loader and are treated as
//! templates; every Monte Carlo run clones the templates afresh.
//!
//! - [`CombatantId`]: ordered string identifier
//! - [`Team`]: party or enemies
//! - [`Conditions`]: recognized condition tags as a bit set
//! - [`Defenses`]: resistances, immunities, vulnerabilities
//! - [`Action`]: attacks or area effects
//!
//! # Example
//!
//! ```
//! use skirmish_core::combatant::{Action, Attack, Combatant, DamageType, Team};
//! use skirmish_core::dice::DiceExpr;
//! use skirmish_grid::Cell;
//!
//! let goblin = Combatant::new("goblin_1", Team::Enemies, Cell::new(4, 0), 15, 7)
//!     .with_name("Goblin")
//!     .with_action(Action::attack(Attack::melee(
//!         "Scimitar", 4, DiceExpr::new(1, 6, 2), DamageType::Slashing, 5,
//!     )));
//!
//! assert!(goblin.is_alive());
//! assert_eq!(goblin.melee_reach_ft(), Some(5));
//! ```

pub mod action;

use std::collections::BTreeMap;
use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use skirmish_grid::Cell;

use crate::error::StateError;

pub use action::{
    Action, ActionKind, AreaEffect, AreaShape, Attack, ResourceCost, DEFAULT_REACH_FT,
};

/// Unique identifier for a combatant.
///
/// Ordered lexically; the order breaks initiative ties and fixes iteration
/// order everywhere a collection of combatants is walked.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CombatantId(String);

impl CombatantId {
    /// Creates an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CombatantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CombatantId({})", self.0)
    }
}

impl fmt::Display for CombatantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CombatantId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for CombatantId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Which side a combatant fights on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    /// The player party.
    Party,
    /// The opposition.
    Enemies,
}

impl Team {
    /// The other side.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::Party => Self::Enemies,
            Self::Enemies => Self::Party,
        }
    }

    /// Static name for errors and events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Party => "party",
            Self::Enemies => "enemies",
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The six abilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ability {
    /// Strength.
    Str,
    /// Dexterity.
    Dex,
    /// Constitution.
    Con,
    /// Intelligence.
    Int,
    /// Wisdom.
    Wis,
    /// Charisma.
    Cha,
}

/// Ability modifiers, one per ability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct AbilityModifiers {
    /// Strength modifier.
    pub str: i32,
    /// Dexterity modifier.
    pub dex: i32,
    /// Constitution modifier.
    pub con: i32,
    /// Intelligence modifier.
    pub int: i32,
    /// Wisdom modifier.
    pub wis: i32,
    /// Charisma modifier.
    pub cha: i32,
}

impl AbilityModifiers {
    /// Modifiers from raw scores in `[str, dex, con, int, wis, cha]` order.
    ///
    /// ```
    /// use skirmish_core::combatant::{Ability, AbilityModifiers};
    ///
    /// let m = AbilityModifiers::from_scores([8, 14, 10, 11, 9, 20]);
    /// assert_eq!(m.get(Ability::Str), -1);
    /// assert_eq!(m.get(Ability::Wis), -1);
    /// assert_eq!(m.get(Ability::Cha), 5);
    /// ```
    #[must_use]
    pub const fn from_scores(scores: [i32; 6]) -> Self {
        const fn m(score: i32) -> i32 {
            (score - 10).div_euclid(2)
        }
        Self {
            str: m(scores[0]),
            dex: m(scores[1]),
            con: m(scores[2]),
            int: m(scores[3]),
            wis: m(scores[4]),
            cha: m(scores[5]),
        }
    }

    /// Modifier for one ability.
    #[must_use]
    pub const fn get(&self, ability: Ability) -> i32 {
        match ability {
            Ability::Str => self.str,
            Ability::Dex => self.dex,
            Ability::Con => self.con,
            Ability::Int => self.int,
            Ability::Wis => self.wis,
            Ability::Cha => self.cha,
        }
    }
}

/// Damage types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum DamageType {
    Acid,
    Bludgeoning,
    Cold,
    Fire,
    Force,
    Lightning,
    Necrotic,
    Piercing,
    Poison,
    Psychic,
    Radiant,
    Slashing,
    Thunder,
}

impl fmt::Display for DamageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Acid => "acid",
            Self::Bludgeoning => "bludgeoning",
            Self::Cold => "cold",
            Self::Fire => "fire",
            Self::Force => "force",
            Self::Lightning => "lightning",
            Self::Necrotic => "necrotic",
            Self::Piercing => "piercing",
            Self::Poison => "poison",
            Self::Psychic => "psychic",
            Self::Radiant => "radiant",
            Self::Slashing => "slashing",
            Self::Thunder => "thunder",
        };
        f.write_str(s)
    }
}

bitflags! {
    /// Active condition tags.
    ///
    /// Only recognized tags are representable.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Conditions: u16 {
        /// Cannot see.
        const BLINDED       = 1 << 0;
        /// Frightened of a source.
        const FRIGHTENED    = 1 << 1;
        /// Cannot take actions.
        const INCAPACITATED = 1 << 2;
        /// Cannot be seen.
        const INVISIBLE     = 1 << 3;
        /// Incapacitated and cannot move.
        const PARALYZED     = 1 << 4;
        /// Poisoned.
        const POISONED      = 1 << 5;
        /// Lying on the ground.
        const PRONE         = 1 << 6;
        /// Speed zero.
        const RESTRAINED    = 1 << 7;
        /// Incapacitated.
        const STUNNED       = 1 << 8;
        /// Incapacitated and prone.
        const UNCONSCIOUS   = 1 << 9;
    }
}

impl Conditions {
    /// Conditions that prevent acting.
    pub const DISABLING: Self = Self::INCAPACITATED
        .union(Self::PARALYZED)
        .union(Self::STUNNED)
        .union(Self::UNCONSCIOUS);

    /// Conditions that make Str and Dex saves fail automatically.
    pub const FAILS_PHYSICAL_SAVES: Self = Self::PARALYZED
        .union(Self::STUNNED)
        .union(Self::UNCONSCIOUS);

    /// Parses a lowercase tag such as `"prone"`. Unknown tags give `None`.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        let flag = match tag.trim().to_ascii_lowercase().as_str() {
            "blinded" => Self::BLINDED,
            "frightened" => Self::FRIGHTENED,
            "incapacitated" => Self::INCAPACITATED,
            "invisible" => Self::INVISIBLE,
            "paralyzed" => Self::PARALYZED,
            "poisoned" => Self::POISONED,
            "prone" => Self::PRONE,
            "restrained" => Self::RESTRAINED,
            "stunned" => Self::STUNNED,
            "unconscious" => Self::UNCONSCIOUS,
            _ => return None,
        };
        Some(flag)
    }

    /// True if any disabling condition is present.
    #[must_use]
    pub const fn is_disabled(self) -> bool {
        self.intersects(Self::DISABLING)
    }
}

/// Damage-type defenses. A type listed twice still applies once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defenses {
    /// Halved.
    pub resistances: Vec<DamageType>,
    /// Zeroed.
    pub immunities: Vec<DamageType>,
    /// Doubled.
    pub vulnerabilities: Vec<DamageType>,
}

impl Defenses {
    /// True if immune to `t`.
    #[must_use]
    pub fn is_immune(&self, t: DamageType) -> bool {
        self.immunities.contains(&t)
    }

    /// True if resistant to `t`.
    #[must_use]
    pub fn resists(&self, t: DamageType) -> bool {
        self.resistances.contains(&t)
    }

    /// True if vulnerable to `t`.
    #[must_use]
    pub fn is_vulnerable(&self, t: DamageType) -> bool {
        self.vulnerabilities.contains(&t)
    }
}

/// Death save counters for a combatant at 0 vitality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathSaves {
    /// Successes so far, 0..=3.
    pub successes: u8,
    /// Failures so far, 0..=3.
    pub failures: u8,
    /// Three successes reached; no more saves until damaged.
    pub stable: bool,
    /// Three failures reached.
    pub dead: bool,
}

impl DeathSaves {
    /// Saves needed to stabilize or die.
    pub const LIMIT: u8 = 3;

    /// Adds failures, marking death at the limit.
    #[must_use]
    pub fn fail(mut self, count: u8) -> Self {
        self.failures = (self.failures + count).min(Self::LIMIT);
        self.stable = false;
        self.dead = self.failures >= Self::LIMIT;
        self
    }

    /// Adds one success, stabilizing at the limit.
    #[must_use]
    pub fn succeed(mut self) -> Self {
        self.successes = (self.successes + 1).min(Self::LIMIT);
        self.stable = self.successes >= Self::LIMIT;
        self
    }

    /// Counters cleared.
    #[must_use]
    pub fn reset() -> Self {
        Self::default()
    }
}

/// A participant in an encounter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combatant {
    /// Unique identifier.
    pub id: CombatantId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Side.
    pub team: Team,
    /// Grid cell.
    pub position: Cell,
    /// Armor value attacks must meet.
    pub armor_class: i32,
    /// Current vitality.
    pub hp: u32,
    /// Maximum vitality.
    pub max_hp: u32,
    /// Walking speed in feet.
    #[serde(default = "default_speed")]
    pub speed_ft: u32,
    /// Added to the initiative d20.
    #[serde(default)]
    pub initiative_bonus: i32,
    /// Ability modifiers, used for saves.
    #[serde(default)]
    pub modifiers: AbilityModifiers,
    /// Active conditions.
    #[serde(default)]
    pub conditions: Conditions,
    /// Damage-type defenses.
    #[serde(default)]
    pub defenses: Defenses,
    /// Available actions.
    #[serde(default)]
    pub actions: Vec<Action>,
    /// Remaining charges by key.
    #[serde(default)]
    pub resources: BTreeMap<String, u32>,
    /// Name of the action whose sustained effect is active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concentration: Option<String>,
    /// Death save counters.
    #[serde(default)]
    pub death_saves: DeathSaves,
}

const fn default_speed() -> u32 {
    30
}

impl Combatant {
    /// Creates a combatant at full vitality with 30 ft speed and no actions.
    ///
    /// # Arguments
    ///
    /// * `id` - Unique identifier; also used as the display name
    /// * `team` - Side
    /// * `position` - Starting cell
    /// * `armor_class` - Armor value
    /// * `max_hp` - Maximum (and starting) vitality
    pub fn new(
        id: impl Into<CombatantId>,
        team: Team,
        position: Cell,
        armor_class: i32,
        max_hp: u32,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.as_str().to_string(),
            id,
            team,
            position,
            armor_class,
            hp: max_hp,
            max_hp,
            speed_ft: default_speed(),
            initiative_bonus: 0,
            modifiers: AbilityModifiers::default(),
            conditions: Conditions::empty(),
            defenses: Defenses::default(),
            actions: Vec::new(),
            resources: BTreeMap::new(),
            concentration: None,
            death_saves: DeathSaves::default(),
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets current vitality.
    #[must_use]
    pub const fn with_hp(mut self, hp: u32) -> Self {
        self.hp = hp;
        self
    }

    /// Sets speed in feet.
    #[must_use]
    pub const fn with_speed(mut self, speed_ft: u32) -> Self {
        self.speed_ft = speed_ft;
        self
    }

    /// Sets the initiative bonus.
    #[must_use]
    pub const fn with_initiative_bonus(mut self, bonus: i32) -> Self {
        self.initiative_bonus = bonus;
        self
    }

    /// Sets ability modifiers.
    #[must_use]
    pub const fn with_modifiers(mut self, modifiers: AbilityModifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Adds conditions.
    #[must_use]
    pub fn with_conditions(mut self, conditions: Conditions) -> Self {
        self.conditions |= conditions;
        self
    }

    /// Sets defenses.
    #[must_use]
    pub fn with_defenses(mut self, defenses: Defenses) -> Self {
        self.defenses = defenses;
        self
    }

    /// Adds an action.
    #[must_use]
    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Sets a resource count.
    #[must_use]
    pub fn with_resource(mut self, key: impl Into<String>, charges: u32) -> Self {
        self.resources.insert(key.into(), charges);
        self
    }

    /// Above 0 vitality.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// At 0 vitality and out of the fight for good.
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.hp == 0 && self.death_saves.dead
    }

    /// Owes a death save at the start of its turn.
    #[must_use]
    pub const fn owes_death_save(&self) -> bool {
        self.hp == 0 && !self.death_saves.stable && !self.death_saves.dead
    }

    /// Alive and not disabled.
    #[must_use]
    pub const fn can_act(&self) -> bool {
        self.is_alive() && !self.conditions.is_disabled()
    }

    /// Looks up an action by name.
    #[must_use]
    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name == name)
    }

    /// Reach used for opportunity attacks.
    ///
    /// The largest reach among single-attack melee actions, or `None` if the
    /// combatant has no melee attack at all.
    #[must_use]
    pub fn melee_reach_ft(&self) -> Option<u32> {
        let single = self
            .actions
            .iter()
            .filter(|a| a.attacks().len() == 1)
            .filter_map(|a| a.attacks()[0].reach_ft)
            .max();
        single.or_else(|| {
            self.actions
                .iter()
                .flat_map(Action::attacks)
                .any(Attack::is_melee)
                .then_some(DEFAULT_REACH_FT)
        })
    }

    /// The attack used for an opportunity attack: the longest-reach
    /// single melee strike, falling back to the first melee sub-attack.
    #[must_use]
    pub fn opportunity_attack(&self) -> Option<(&Action, &Attack)> {
        let single = self
            .actions
            .iter()
            .filter(|a| a.attacks().len() == 1 && a.attacks()[0].is_melee())
            .max_by_key(|a| a.attacks()[0].reach_ft)
            .map(|a| (a, &a.attacks()[0]));
        single.or_else(|| {
            self.actions.iter().find_map(|a| {
                a.attacks().iter().find(|atk| atk.is_melee()).map(|atk| (a, atk))
            })
        })
    }

    /// Remaining charges for a resource; unknown keys have none.
    #[must_use]
    pub fn charges(&self, key: &str) -> u32 {
        self.resources.get(key).copied().unwrap_or(0)
    }

    /// True if the action's cost can be paid.
    #[must_use]
    pub fn can_afford(&self, action: &Action) -> bool {
        action
            .cost
            .as_ref()
            .map_or(true, |c| self.charges(&c.resource) >= c.amount)
    }

    /// Checks record invariants.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if maximum vitality is zero or current vitality
    /// exceeds it.
    pub fn validate(&self) -> Result<(), StateError> {
        if self.max_hp == 0 {
            return Err(StateError::ZeroMaxHp(self.id.clone()));
        }
        if self.hp > self.max_hp {
            return Err(StateError::HpAboveMax {
                id: self.id.clone(),
                hp: self.hp,
                max: self.max_hp,
            });
        }
        Ok(())
    }
}
