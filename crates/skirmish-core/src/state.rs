//! Immutable combat state.
//!
//! [`CombatState`] is a value. Every mutation-shaped method takes `&self` and
//! returns a new snapshot; the old one stays valid and unchanged. The large
//! pieces sit behind `Arc` and are cloned with [`Arc::make_mut`] only when a
//! snapshot that still shares them is modified, so threading one state
//! through a turn loop copies nothing.
//!
//! # Example
//!
//! ```
//! use skirmish_core::combatant::{Combatant, Team};
//! use skirmish_core::state::CombatState;
//! use skirmish_grid::Cell;
//!
//! let hero = Combatant::new("hero", Team::Party, Cell::new(0, 0), 15, 10);
//! let orc = Combatant::new("orc", Team::Enemies, Cell::new(1, 0), 13, 15);
//! let state = CombatState::new(vec![hero, orc], vec!["orc".into(), "hero".into()]).unwrap();
//!
//! let (hurt, _) = state.apply_damage(&"hero".into(), 4, false).unwrap();
//! assert_eq!(hurt.combatant(&"hero".into()).unwrap().hp, 6);
//! assert_eq!(state.combatant(&"hero".into()).unwrap().hp, 10);
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use skirmish_grid::Cell;

use crate::advantage::AdvantageState;
use crate::combatant::{Combatant, CombatantId, Conditions, Team};
use crate::dice::{roll_d20, DieRoller};
use crate::error::StateError;
use crate::event::CombatEvent;
use crate::rules::damage_at_zero;

/// How an encounter ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Every enemy is at 0 vitality.
    PartyVictory,
    /// Every party member is at 0 vitality.
    PartyDefeat,
    /// The round cap was reached.
    Timeout,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PartyVictory => write!(f, "party victory"),
            Self::PartyDefeat => write!(f, "party defeat"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

/// One combatant's initiative roll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiativeRoll {
    /// Who rolled.
    pub id: CombatantId,
    /// The d20.
    pub natural: u8,
    /// Initiative bonus.
    pub bonus: i32,
    /// d20 plus bonus.
    pub total: i32,
}

/// What a damage application did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DamageApplied {
    /// Vitality before.
    pub hp_before: u32,
    /// Vitality after.
    pub hp_after: u32,
    /// This instance took the combatant from above 0 to 0.
    pub dropped: bool,
    /// This instance landed while already at 0 and added death save failures.
    pub hit_while_down: bool,
    /// Sustained effect lost by dropping to 0.
    pub concentration_lost: Option<String>,
}

/// Snapshot of an encounter.
#[derive(Debug, Clone, PartialEq)]
pub struct CombatState {
    combatants: Arc<BTreeMap<CombatantId, Combatant>>,
    initiative: Arc<Vec<CombatantId>>,
    round: u32,
    turn: usize,
    reactions_used: Arc<BTreeSet<CombatantId>>,
    events: Arc<Vec<CombatEvent>>,
    ended: Option<Outcome>,
}

impl CombatState {
    /// Builds a state at round 1, turn 0.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if a record is inconsistent, an id repeats, the
    /// initiative order does not name every combatant exactly once, or a team
    /// is empty.
    pub fn new(combatants: Vec<Combatant>, initiative: Vec<CombatantId>) -> Result<Self, StateError> {
        let mut map = BTreeMap::new();
        for c in combatants {
            c.validate()?;
            let id = c.id.clone();
            if map.insert(id.clone(), c).is_some() {
                return Err(StateError::DuplicateId(id));
            }
        }

        for team in [Team::Party, Team::Enemies] {
            if !map.values().any(|c| c.team == team) {
                return Err(StateError::EmptyTeam(team.as_str()));
            }
        }

        let mut seen = BTreeSet::new();
        for id in &initiative {
            if !map.contains_key(id) {
                return Err(StateError::UnknownInInitiative(id.clone()));
            }
            if !seen.insert(id.clone()) {
                return Err(StateError::DuplicateId(id.clone()));
            }
        }
        if let Some(missing) = map.keys().find(|id| !seen.contains(*id)) {
            return Err(StateError::MissingFromInitiative(missing.clone()));
        }

        Ok(Self {
            combatants: Arc::new(map),
            initiative: Arc::new(initiative),
            round: 1,
            turn: 0,
            reactions_used: Arc::new(BTreeSet::new()),
            events: Arc::new(Vec::new()),
            ended: None,
        })
    }

    /// Rolls initiative and builds the state.
    ///
    /// Combatants roll in id order. The order is descending total with ties
    /// broken by id ascending.
    ///
    /// # Errors
    ///
    /// Same as [`CombatState::new`].
    pub fn roll_initiative<R: DieRoller + ?Sized>(
        mut combatants: Vec<Combatant>,
        rng: &mut R,
    ) -> Result<(Self, Vec<InitiativeRoll>), StateError> {
        combatants.sort_by(|a, b| a.id.cmp(&b.id));
        let mut rolls: Vec<InitiativeRoll> = combatants
            .iter()
            .map(|c| {
                let natural = roll_d20(AdvantageState::Normal, rng).natural;
                InitiativeRoll {
                    id: c.id.clone(),
                    natural,
                    bonus: c.initiative_bonus,
                    total: i32::from(natural) + c.initiative_bonus,
                }
            })
            .collect();
        rolls.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.id.cmp(&b.id)));
        let order = rolls.iter().map(|r| r.id.clone()).collect();
        let state = Self::new(combatants, order)?;
        Ok((state, rolls))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Looks up a combatant.
    #[must_use]
    pub fn combatant(&self, id: &CombatantId) -> Option<&Combatant> {
        self.combatants.get(id)
    }

    /// Looks up a combatant, failing on unknown ids.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::UnknownCombatant`].
    pub fn get(&self, id: &CombatantId) -> Result<&Combatant, StateError> {
        self.combatants
            .get(id)
            .ok_or_else(|| StateError::UnknownCombatant(id.clone()))
    }

    /// All combatants in id order.
    pub fn combatants(&self) -> impl Iterator<Item = &Combatant> {
        self.combatants.values()
    }

    /// Combatants of a team above 0 vitality.
    pub fn living(&self, team: Team) -> impl Iterator<Item = &Combatant> {
        self.combatants
            .values()
            .filter(move |c| c.team == team && c.is_alive())
    }

    /// Initiative order.
    #[must_use]
    pub fn initiative(&self) -> &[CombatantId] {
        &self.initiative
    }

    /// Current round, starting at 1.
    #[must_use]
    pub const fn round(&self) -> u32 {
        self.round
    }

    /// Index into the initiative order.
    #[must_use]
    pub const fn turn_index(&self) -> usize {
        self.turn
    }

    /// Whose turn it is.
    #[must_use]
    pub fn current(&self) -> Option<&CombatantId> {
        self.initiative.get(self.turn)
    }

    /// True if `id` has not used its reaction this round.
    #[must_use]
    pub fn has_reaction(&self, id: &CombatantId) -> bool {
        !self.reactions_used.contains(id)
    }

    /// The living combatant standing on `cell`, if any.
    #[must_use]
    pub fn occupant(&self, cell: Cell) -> Option<&Combatant> {
        self.combatants
            .values()
            .find(|c| c.position == cell && c.is_alive())
    }

    /// Recorded events.
    #[must_use]
    pub fn events(&self) -> &[CombatEvent] {
        &self.events
    }

    /// Outcome if one team has no one standing.
    #[must_use]
    pub fn outcome(&self) -> Option<Outcome> {
        if self.ended.is_some() {
            return self.ended;
        }
        if self.living(Team::Party).next().is_none() {
            Some(Outcome::PartyDefeat)
        } else if self.living(Team::Enemies).next().is_none() {
            Some(Outcome::PartyVictory)
        } else {
            None
        }
    }

    /// True if every party member is at 0 vitality.
    #[must_use]
    pub fn is_tpk(&self) -> bool {
        self.combatants
            .values()
            .filter(|c| c.team == Team::Party)
            .all(|c| c.hp == 0)
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Returns a new state with one combatant modified.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::UnknownCombatant`].
    pub fn update(
        &self,
        id: &CombatantId,
        f: impl FnOnce(&mut Combatant),
    ) -> Result<Self, StateError> {
        if !self.combatants.contains_key(id) {
            return Err(StateError::UnknownCombatant(id.clone()));
        }
        let mut next = self.clone();
        if let Some(c) = Arc::make_mut(&mut next.combatants).get_mut(id) {
            f(c);
        }
        Ok(next)
    }

    /// Applies final (post-mitigation) damage.
    ///
    /// Vitality floors at 0. Dropping to 0 adds the unconscious condition and
    /// ends any sustained effect. Damage taken while already at 0 adds death
    /// save failures (two on a critical) unless the combatant is dead.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::UnknownCombatant`].
    pub fn apply_damage(
        &self,
        id: &CombatantId,
        amount: u32,
        critical: bool,
    ) -> Result<(Self, DamageApplied), StateError> {
        let before = self.get(id)?;
        let hp_before = before.hp;
        let already_dead = before.death_saves.dead;

        let mut applied = DamageApplied {
            hp_before,
            hp_after: hp_before.saturating_sub(amount),
            dropped: false,
            hit_while_down: false,
            concentration_lost: None,
        };

        let next = self.update(id, |c| {
            if hp_before == 0 {
                if amount > 0 && !already_dead {
                    c.death_saves = damage_at_zero(c.death_saves, critical);
                    applied.hit_while_down = true;
                }
                return;
            }
            c.hp = applied.hp_after;
            if c.hp == 0 {
                applied.dropped = true;
                c.conditions |= Conditions::UNCONSCIOUS;
                applied.concentration_lost = c.concentration.take();
            }
        })?;
        Ok((next, applied))
    }

    /// Moves a combatant.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::UnknownCombatant`].
    pub fn move_combatant(&self, id: &CombatantId, to: Cell) -> Result<Self, StateError> {
        self.update(id, |c| c.position = to)
    }

    /// Advances to the next turn, rolling over to a new round (and clearing
    /// reactions) after the last combatant.
    #[must_use]
    pub fn advance_turn(&self) -> Self {
        let mut next = self.clone();
        next.turn += 1;
        if next.turn >= next.initiative.len() {
            next.turn = 0;
            next.round += 1;
            next.reactions_used = Arc::new(BTreeSet::new());
        }
        next
    }

    /// Marks a reaction as used for this round.
    #[must_use]
    pub fn consume_reaction(&self, id: &CombatantId) -> Self {
        let mut next = self.clone();
        Arc::make_mut(&mut next.reactions_used).insert(id.clone());
        next
    }

    /// Appends an event.
    #[must_use]
    pub fn record(&self, event: CombatEvent) -> Self {
        let mut next = self.clone();
        Arc::make_mut(&mut next.events).push(event);
        next
    }

    /// Marks the encounter as finished.
    #[must_use]
    pub fn end(&self, outcome: Outcome) -> Self {
        let mut next = self.clone();
        next.ended = Some(outcome);
        next
    }
}
