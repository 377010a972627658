//! # Skirmish Core
//!
//! Encounter balance evaluation: a deterministic turn-based combat engine
//! and a Monte Carlo batch runner on top of it.
//!
//! ## Architecture
//!
//! - **Rules**: pure functions for attacks, damage mitigation, saves, death
//!   saves and concentration, drawing dice through a [`DieRoller`]
//! - **State**: an immutable [`CombatState`] snapshot; every transition
//!   returns a new snapshot and older ones stay valid
//! - **Simulator**: the turn loop, asking a [`DecisionSource`] what each
//!   combatant does and re-validating every proposal
//! - **Monte Carlo**: progressive sampling over independent seeded streams,
//!   stopping on a Wilson interval width
//!
//! ## Usage
//!
//! ```
//! use skirmish_core::{
//!     Action, Attack, Combatant, DamageType, DiceExpr, Heuristic, MonteCarlo,
//!     MonteCarloConfig, NoProgress, Simulator, SimulatorConfig, Team,
//! };
//! use skirmish_core::grid::{Cell, Terrain};
//!
//! let sword = Attack::melee("Longsword", 5, DiceExpr::new(1, 8, 3), DamageType::Slashing, 5);
//! let claws = Attack::melee("Claws", 3, DiceExpr::new(1, 6, 1), DamageType::Slashing, 5);
//! let templates = vec![
//!     Combatant::new("knight", Team::Party, Cell::new(0, 0), 16, 24).with_action(Action::attack(sword)),
//!     Combatant::new("wolf", Team::Enemies, Cell::new(4, 0), 13, 11).with_action(Action::attack(claws)),
//! ];
//!
//! let sim = Simulator::new(SimulatorConfig::default(), Terrain::open()).unwrap();
//! let config = MonteCarloConfig { min_runs: 50, max_runs: 200, ..MonteCarloConfig::default() };
//! let batch = MonteCarlo::new(config, sim).unwrap();
//! let result = batch.run(&templates, &Heuristic::default(), &Heuristic::default(), &mut NoProgress).unwrap();
//! assert!(result.runs >= 50);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Re-export the grid crate for positions and terrain
pub use skirmish_grid as grid;

pub mod advantage;
pub mod combatant;
pub mod decision;
pub mod dice;
pub mod error;
pub mod event;
pub mod monte_carlo;
pub mod rules;
pub mod simulator;
pub mod state;
pub mod stats;

pub use advantage::{resolve_advantage, AdvantageState, Sources};
pub use combatant::{
    Ability, AbilityModifiers, Action, ActionKind, AreaEffect, AreaShape, Attack, Combatant,
    CombatantId, Conditions, DamageType, DeathSaves, Defenses, ResourceCost, Team,
};
pub use decision::{validate, Decision, DecisionSource, Heuristic, TurnView};
pub use dice::{DiceExpr, DieRoller, SeededRoller};
pub use error::{ConfigError, DecisionError, DiceError, IllegalAction, SimError, StateError};
pub use event::{CombatEvent, EventLog, EventSink, NullSink, SkipReason, TracingSink};
pub use monte_carlo::{BatchResult, CancelFlag, MonteCarlo, MonteCarloConfig, NoProgress, Progress, ProgressSink};
pub use simulator::{DamageRecord, DeathSavePolicy, EncounterReport, Simulator, SimulatorConfig};
pub use state::{CombatState, Outcome};
pub use stats::{classify, wilson_interval, Difficulty, DifficultyInput, DifficultyThresholds, Interval};

#[cfg(test)]
mod tests;
