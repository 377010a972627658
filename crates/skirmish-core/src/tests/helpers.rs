//! Test helper functions for building combatants, encounters and dice.
//!
//! This module provides factory functions and a scripted roller that make
//! writing tests more ergonomic and consistent.

use std::collections::{BTreeMap, VecDeque};

use skirmish_grid::Cell;
use tracing_subscriber::EnvFilter;

use crate::combatant::{AbilityModifiers, Action, Attack, Combatant, CombatantId, DamageType, Team};
use crate::decision::{Decision, DecisionSource, TurnView};
use crate::dice::{DiceExpr, DieRoller};
use crate::error::DecisionError;

/// Installs a test subscriber honoring `RUST_LOG`; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// =============================================================================
// Scripted dice
// =============================================================================

/// A die roller that returns a fixed sequence.
///
/// Panics when asked for more dice than were scripted, so a test also pins
/// down how many dice a code path draws.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRoller {
    values: VecDeque<u32>,
}

impl ScriptedRoller {
    /// Creates a roller yielding `values` in order.
    pub fn new(values: impl IntoIterator<Item = u32>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }

    /// A roller that must never be asked for a die.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Dice not yet drawn.
    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

impl DieRoller for ScriptedRoller {
    fn roll_die(&mut self, sides: u32) -> u32 {
        let value = self
            .values
            .pop_front()
            .unwrap_or_else(|| panic!("scripted roller exhausted (asked for a d{sides})"));
        assert!(
            (1..=sides).contains(&value),
            "scripted value {value} does not fit a d{sides}"
        );
        value
    }
}

// =============================================================================
// Combatants
// =============================================================================

/// A party fighter: AC 16, 28 hp, longsword +5 for 1d8+3 slashing.
///
/// # Arguments
///
/// * `id` - Combatant id
/// * `position` - Starting cell
pub fn fighter(id: &str, position: Cell) -> Combatant {
    let longsword = Attack::melee("Longsword", 5, DiceExpr::new(1, 8, 3), DamageType::Slashing, 5);
    Combatant::new(id, Team::Party, position, 16, 28)
        .with_initiative_bonus(1)
        .with_modifiers(AbilityModifiers::from_scores([16, 12, 14, 10, 12, 8]))
        .with_action(Action::attack(longsword))
}

/// An enemy goblin: AC 15, 7 hp, scimitar (reach 5) and shortbow (80 ft),
/// both +4 for 1d6+2.
///
/// # Arguments
///
/// * `id` - Combatant id
/// * `position` - Starting cell
pub fn goblin(id: &str, position: Cell) -> Combatant {
    let scimitar = Attack::melee("Scimitar", 4, DiceExpr::new(1, 6, 2), DamageType::Slashing, 5);
    let shortbow = Attack::ranged("Shortbow", 4, DiceExpr::new(1, 6, 2), DamageType::Piercing, 80);
    Combatant::new(id, Team::Enemies, position, 15, 7)
        .with_initiative_bonus(2)
        .with_modifiers(AbilityModifiers::from_scores([8, 14, 10, 10, 8, 8]))
        .with_action(Action::attack(scimitar))
        .with_action(Action::attack(shortbow))
}

/// Two fighters against three goblins, a few squares apart.
///
/// # Returns
///
/// Template combatants for an encounter.
pub fn skirmish() -> Vec<Combatant> {
    vec![
        fighter("fighter", Cell::new(0, 0)),
        fighter("paladin", Cell::new(0, 1)),
        goblin("goblin-1", Cell::new(5, 0)),
        goblin("goblin-2", Cell::new(5, 1)),
        goblin("goblin-3", Cell::new(6, 2)),
    ]
}

// =============================================================================
// Decisions
// =============================================================================

/// A decision source that replays a fixed decision per combatant.
///
/// Combatants without an entry dodge.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    decisions: BTreeMap<CombatantId, Decision>,
}

impl Plan {
    /// Empty plan: everyone dodges.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the decision `id` makes every turn.
    pub fn with(mut self, id: &str, decision: Decision) -> Self {
        self.decisions.insert(id.into(), decision);
        self
    }
}

impl DecisionSource for Plan {
    fn decide(&self, view: &TurnView<'_>) -> Result<Decision, DecisionError> {
        Ok(self
            .decisions
            .get(&view.actor().id)
            .cloned()
            .unwrap_or_else(Decision::dodge))
    }
}
