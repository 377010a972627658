//! The decision interface and the built-in heuristic.
//!
//! A [`DecisionSource`] proposes what the acting combatant does. The engine
//! never trusts a proposal: [`validate`] checks it against the state first,
//! and the turn loop falls back to a second source when the first one fails
//! or proposes something illegal.
//!
//! [`Heuristic`] is the deterministic fallback shipped with the engine. It
//! only reads the state, so it gives the same answer for the same snapshot.

use serde::{Deserialize, Serialize};
use skirmish_grid::{
    feet, grid_distance, step_away, step_toward, within_radius, Cell, DistanceMetric,
    FEET_PER_SQUARE,
};

use crate::combatant::{Action, ActionKind, Attack, Combatant, CombatantId, Conditions};
use crate::error::{DecisionError, IllegalAction};
use crate::state::CombatState;

/// A proposal for one turn.
///
/// `action == None` means move only, or do nothing if there is no move.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Action name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Target for attack actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<CombatantId>,
    /// Destination, reached before the action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub move_to: Option<Cell>,
    /// Center for area actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_center: Option<Cell>,
}

impl Decision {
    /// Take no action.
    #[must_use]
    pub fn dodge() -> Self {
        Self::default()
    }

    /// Attack `target` with `action`.
    pub fn attack(action: impl Into<String>, target: impl Into<CombatantId>) -> Self {
        Self {
            action: Some(action.into()),
            target: Some(target.into()),
            ..Self::default()
        }
    }

    /// Use an area `action` centered on `center`.
    pub fn area(action: impl Into<String>, center: Cell) -> Self {
        Self {
            action: Some(action.into()),
            area_center: Some(center),
            ..Self::default()
        }
    }

    /// Only move.
    #[must_use]
    pub fn move_only(to: Cell) -> Self {
        Self {
            move_to: Some(to),
            ..Self::default()
        }
    }

    /// Adds a move before the action.
    #[must_use]
    pub const fn with_move(mut self, to: Cell) -> Self {
        self.move_to = Some(to);
        self
    }
}

/// Read-only view handed to a decision source.
#[derive(Debug, Clone, Copy)]
pub struct TurnView<'a> {
    state: &'a CombatState,
    actor: &'a Combatant,
}

impl<'a> TurnView<'a> {
    /// View for `actor`'s turn.
    ///
    /// # Errors
    ///
    /// Returns [`DecisionError::Undecided`] if `actor` is not in the state.
    pub fn new(state: &'a CombatState, actor: &CombatantId) -> Result<Self, DecisionError> {
        let actor = state.combatant(actor).ok_or(DecisionError::Undecided)?;
        Ok(Self { state, actor })
    }

    /// The whole snapshot.
    #[must_use]
    pub const fn state(&self) -> &'a CombatState {
        self.state
    }

    /// The acting combatant.
    #[must_use]
    pub const fn actor(&self) -> &'a Combatant {
        self.actor
    }

    /// Actions the actor can pay for.
    pub fn available_actions(&self) -> impl Iterator<Item = &'a Action> {
        let actor = self.actor;
        actor.actions.iter().filter(move |a| actor.can_afford(a))
    }

    /// Living opponents in id order.
    pub fn enemies(&self) -> impl Iterator<Item = &'a Combatant> {
        self.state.living(self.actor.team.opponent())
    }

    /// Living allies in id order, the actor included.
    pub fn allies(&self) -> impl Iterator<Item = &'a Combatant> {
        self.state.living(self.actor.team)
    }

    /// Speed available this turn in feet.
    #[must_use]
    pub fn speed_ft(&self) -> u32 {
        effective_speed(self.actor)
    }
}

/// Something that proposes a turn.
///
/// Implementations may be slow or fail; the engine always has a fallback.
pub trait DecisionSource: Send + Sync {
    /// Proposes what the actor in `view` does.
    ///
    /// # Errors
    ///
    /// Returns [`DecisionError`] when no proposal can be made.
    fn decide(&self, view: &TurnView<'_>) -> Result<Decision, DecisionError>;
}

impl<F> DecisionSource for F
where
    F: Fn(&TurnView<'_>) -> Result<Decision, DecisionError> + Send + Sync,
{
    fn decide(&self, view: &TurnView<'_>) -> Result<Decision, DecisionError> {
        self(view)
    }
}

/// Speed after conditions: restrained or downed combatants cannot move.
#[must_use]
pub fn effective_speed(c: &Combatant) -> u32 {
    if c.conditions.contains(Conditions::RESTRAINED) || !c.is_alive() {
        0
    } else {
        c.speed_ft
    }
}

/// Checks a proposal against the state.
///
/// Reach and range are measured from the post-move position.
///
/// # Errors
///
/// Returns the first [`IllegalAction`] found.
pub fn validate(
    state: &CombatState,
    actor_id: &CombatantId,
    decision: &Decision,
) -> Result<(), IllegalAction> {
    let actor = state
        .combatant(actor_id)
        .filter(|a| a.can_act())
        .ok_or_else(|| IllegalAction::ActorCannotAct(actor_id.clone()))?;

    let origin = match decision.move_to {
        Some(to) if to != actor.position => {
            let requested_ft = feet(actor.position, to);
            let speed_ft = effective_speed(actor);
            if requested_ft > speed_ft {
                return Err(IllegalAction::MoveTooFar {
                    requested_ft,
                    speed_ft,
                });
            }
            if let Some(other) = state.occupant(to).filter(|o| o.id != actor.id) {
                return Err(IllegalAction::DestinationOccupied(other.id.clone()));
            }
            to
        }
        _ => actor.position,
    };

    let Some(name) = decision.action.as_deref() else {
        return Ok(());
    };
    let action = actor
        .action(name)
        .ok_or_else(|| IllegalAction::UnknownAction(name.to_string()))?;
    if let Some(cost) = &action.cost {
        if actor.charges(&cost.resource) < cost.amount {
            return Err(IllegalAction::NoCharges(cost.resource.clone()));
        }
    }

    match &action.kind {
        ActionKind::Attacks(attacks) => {
            let target_id = decision
                .target
                .as_ref()
                .ok_or_else(|| IllegalAction::MissingTarget(name.to_string()))?;
            let target = state
                .combatant(target_id)
                .ok_or_else(|| IllegalAction::UnknownTarget(target_id.clone()))?;
            if !target.is_alive() {
                return Err(IllegalAction::TargetDown(target_id.clone()));
            }
            if target.team == actor.team {
                return Err(IllegalAction::FriendlyTarget(target_id.clone()));
            }
            let distance_ft = feet(origin, target.position);
            if !attacks.iter().any(|a| a.reach_or_range_ft() >= distance_ft) {
                return Err(IllegalAction::OutOfReach {
                    target: target_id.clone(),
                    distance_ft,
                });
            }
        }
        ActionKind::Area(effect) => {
            let center = decision
                .area_center
                .ok_or_else(|| IllegalAction::MissingCenter(name.to_string()))?;
            let distance_ft = feet(origin, center);
            if distance_ft > effect.range_ft {
                return Err(IllegalAction::CenterOutOfRange {
                    distance_ft,
                    range_ft: effect.range_ft,
                });
            }
        }
    }
    Ok(())
}

// =============================================================================
// Heuristic fallback
// =============================================================================

/// Ranged attacks reach farther than this.
const MELEE_BAND_FT: u32 = 10;

/// Nearest-enemy heuristic with a survival mode.
///
/// - Targets the nearest living enemy (ties: lower vitality, then id).
/// - Uses an area action when two or more enemies stand and the actor would
///   not be caught in its own blast.
/// - Prefers a multiattack over single attacks.
/// - In survival mode (a quarter of its vitality or less, badly outmatched,
///   or no melee option at all) it prefers ranged attacks and backs away
///   from adjacent enemies.
/// - Otherwise closes to reach and attacks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Heuristic {
    area_metric: DistanceMetric,
}

impl Heuristic {
    /// Heuristic that measures blast radii with `metric`.
    #[must_use]
    pub const fn with_metric(metric: DistanceMetric) -> Self {
        Self {
            area_metric: metric,
        }
    }

    fn nearest_enemy<'a>(view: &TurnView<'a>) -> Option<&'a Combatant> {
        let pos = view.actor().position;
        view.enemies()
            .min_by(|a, b| {
                grid_distance(pos, a.position)
                    .cmp(&grid_distance(pos, b.position))
                    .then(a.hp.cmp(&b.hp))
                    .then_with(|| a.id.cmp(&b.id))
            })
    }

    fn survival_mode(view: &TurnView<'_>) -> bool {
        let actor = view.actor();
        let enemies: Vec<_> = view.enemies().collect();
        let allies: Vec<_> = view.allies().collect();
        let enemy_hp: u32 = enemies.iter().map(|c| c.hp).sum();
        let ally_hp: u32 = allies.iter().map(|c| c.hp).sum();

        let low_hp = actor.hp <= actor.max_hp / 4;
        let outnumbered = enemies.len() > allies.len();
        let outmatched = f64::from(ally_hp) < f64::from(enemy_hp) * 0.6;
        let has_melee = actor
            .actions
            .iter()
            .flat_map(Action::attacks)
            .any(Attack::is_melee);
        low_hp || (outnumbered && outmatched) || !has_melee
    }

    /// Furthest free cell on the way from `from` toward `to`, stopping
    /// `keep_squares` short of it and within `budget` squares.
    fn approach(
        state: &CombatState,
        mover: &CombatantId,
        from: Cell,
        to: Cell,
        keep_squares: u32,
        budget: u32,
    ) -> Cell {
        let gap = grid_distance(from, to).saturating_sub(keep_squares.max(1));
        let mut steps = budget.min(gap);
        loop {
            let cell = step_toward(from, to, steps);
            let free = state.occupant(cell).map_or(true, |o| &o.id == mover);
            if free || steps == 0 {
                return if free { cell } else { from };
            }
            steps -= 1;
        }
    }

    fn retreat(
        state: &CombatState,
        mover: &CombatantId,
        from: Cell,
        threat: Cell,
        budget: u32,
    ) -> Cell {
        let mut steps = budget;
        loop {
            let cell = step_away(from, threat, steps);
            let free = state.occupant(cell).map_or(true, |o| &o.id == mover);
            if free || steps == 0 {
                return if free { cell } else { from };
            }
            steps -= 1;
        }
    }

    fn area_decision(&self, view: &TurnView<'_>, target: &Combatant) -> Option<Decision> {
        if view.enemies().count() < 2 {
            return None;
        }
        let actor = view.actor();
        let center = target.position;
        view.available_actions().find_map(|action| {
            let effect = action.area_effect()?;
            let caught_self = within_radius(center, actor.position, effect.radius, self.area_metric);
            let in_range = feet(actor.position, center) <= effect.range_ft;
            (!caught_self && in_range).then(|| Decision::area(action.name.clone(), center))
        })
    }

    /// Longest-reaching sub-attack of `action` that reaches `distance_ft`.
    fn best_in_range(action: &Action, distance_ft: u32) -> Option<&Attack> {
        action
            .attacks()
            .iter()
            .filter(|a| a.reach_or_range_ft() >= distance_ft)
            .max_by_key(|a| a.reach_or_range_ft())
    }

    /// Longest true ranged reach of an action, if it has a ranged strike.
    fn ranged_reach(action: &Action) -> Option<u32> {
        action
            .attacks()
            .iter()
            .filter(|a| a.range_ft.is_some_and(|r| r > MELEE_BAND_FT))
            .map(Attack::reach_or_range_ft)
            .max()
    }

    /// Keep distance and shoot. `None` if the actor has nothing ranged.
    fn survival_decision(
        view: &TurnView<'_>,
        best: &Action,
        target: &Combatant,
    ) -> Option<Decision> {
        let actor = view.actor();
        let state = view.state();
        let dist = feet(actor.position, target.position);
        let speed_squares = view.speed_ft() / FEET_PER_SQUARE;

        let (action, reach) = view
            .available_actions()
            .find(|a| a.is_ranged_only())
            .into_iter()
            .chain(std::iter::once(best))
            .find_map(|a| Self::ranged_reach(a).map(|r| (a, r)))?;
        let shoot = || Decision::attack(action.name.clone(), target.id.clone());

        if dist <= MELEE_BAND_FT && speed_squares >= 1 {
            let away = Self::retreat(state, &actor.id, actor.position, target.position, speed_squares);
            if away != actor.position {
                return Some(if feet(away, target.position) <= reach {
                    shoot().with_move(away)
                } else {
                    Decision::move_only(away)
                });
            }
        }
        if dist <= reach {
            return Some(shoot());
        }
        let keep = reach / FEET_PER_SQUARE;
        let closer = Self::approach(state, &actor.id, actor.position, target.position, keep, speed_squares);
        Some(if feet(closer, target.position) <= reach {
            shoot().with_move(closer)
        } else {
            Decision::move_only(closer)
        })
    }
}

impl DecisionSource for Heuristic {
    fn decide(&self, view: &TurnView<'_>) -> Result<Decision, DecisionError> {
        let actor = view.actor();
        if !actor.can_act() {
            return Ok(Decision::dodge());
        }
        let Some(target) = Self::nearest_enemy(view) else {
            return Ok(Decision::dodge());
        };

        if let Some(decision) = self.area_decision(view, target) {
            return Ok(decision);
        }

        let attack_actions: Vec<&Action> = view
            .available_actions()
            .filter(|a| !a.attacks().is_empty())
            .collect();
        let Some(best) = attack_actions
            .iter()
            .copied()
            .find(|a| a.is_multiattack())
            .or_else(|| attack_actions.first().copied())
        else {
            return Ok(Decision::dodge());
        };

        if Self::survival_mode(view) {
            if let Some(decision) = Self::survival_decision(view, best, target) {
                return Ok(decision);
            }
        }

        let dist = feet(actor.position, target.position);
        let reach = Self::best_in_range(best, dist)
            .or_else(|| best.attacks().first())
            .map_or(0, Attack::reach_or_range_ft);

        if dist <= reach {
            return Ok(Decision::attack(best.name.clone(), target.id.clone()));
        }

        let speed_squares = view.speed_ft() / FEET_PER_SQUARE;
        let keep = (reach / FEET_PER_SQUARE).max(1);
        let closer = Self::approach(view.state(), &actor.id, actor.position, target.position, keep, speed_squares);
        if feet(closer, target.position) <= reach {
            Ok(Decision::attack(best.name.clone(), target.id.clone()).with_move(closer))
        } else if closer == actor.position {
            Ok(Decision::dodge())
        } else {
            Ok(Decision::move_only(closer))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combatant::{Ability, AreaEffect, AreaShape, DamageType};
    use crate::dice::DiceExpr;
    use crate::tests::{fighter, goblin};

    fn c(label: &str) -> Cell {
        label.parse().unwrap()
    }

    fn id(s: &str) -> CombatantId {
        CombatantId::from(s)
    }

    fn state_of(combatants: Vec<Combatant>) -> CombatState {
        let order = combatants.iter().map(|c| c.id.clone()).collect();
        CombatState::new(combatants, order).unwrap()
    }

    mod validate_tests {
        use super::*;

        fn duel() -> CombatState {
            state_of(vec![fighter("fighter", c("A1")), goblin("goblin", c("C1"))])
        }

        #[test]
        fn accepts_move_then_attack() {
            let d = Decision::attack("Longsword", "goblin").with_move(c("B1"));
            assert_eq!(validate(&duel(), &id("fighter"), &d), Ok(()));
        }

        #[test]
        fn rejects_out_of_reach() {
            let d = Decision::attack("Longsword", "goblin");
            assert_eq!(
                validate(&duel(), &id("fighter"), &d),
                Err(IllegalAction::OutOfReach {
                    target: id("goblin"),
                    distance_ft: 10
                })
            );
        }

        #[test]
        fn rejects_unknown_action_and_target() {
            let d = Decision::attack("Fireball", "goblin");
            assert_eq!(
                validate(&duel(), &id("fighter"), &d),
                Err(IllegalAction::UnknownAction("Fireball".into()))
            );
            let d = Decision::attack("Longsword", "dragon").with_move(c("B1"));
            assert_eq!(
                validate(&duel(), &id("fighter"), &d),
                Err(IllegalAction::UnknownTarget(id("dragon")))
            );
        }

        #[test]
        fn rejects_long_move_and_occupied_cell() {
            let d = Decision::move_only(c("H1"));
            assert!(matches!(
                validate(&duel(), &id("fighter"), &d),
                Err(IllegalAction::MoveTooFar { requested_ft: 35, speed_ft: 30 })
            ));
            let d = Decision::move_only(c("C1"));
            assert_eq!(
                validate(&duel(), &id("fighter"), &d),
                Err(IllegalAction::DestinationOccupied(id("goblin")))
            );
        }

        #[test]
        fn rejects_friendly_and_down_targets() {
            let s = state_of(vec![
                fighter("fighter", c("A1")),
                fighter("cleric", c("B1")),
                goblin("goblin", c("A2")).with_hp(0),
                goblin("boss", c("J9")),
            ]);
            assert_eq!(
                validate(&s, &id("fighter"), &Decision::attack("Longsword", "cleric")),
                Err(IllegalAction::FriendlyTarget(id("cleric")))
            );
            assert_eq!(
                validate(&s, &id("fighter"), &Decision::attack("Longsword", "goblin")),
                Err(IllegalAction::TargetDown(id("goblin")))
            );
        }

        #[test]
        fn restrained_cannot_move() {
            let s = state_of(vec![
                fighter("fighter", c("A1")).with_conditions(Conditions::RESTRAINED),
                goblin("goblin", c("C1")),
            ]);
            assert!(matches!(
                validate(&s, &id("fighter"), &Decision::move_only(c("B1"))),
                Err(IllegalAction::MoveTooFar { speed_ft: 0, .. })
            ));
        }

        #[test]
        fn disabled_actor_cannot_act() {
            let s = state_of(vec![
                fighter("fighter", c("A1")).with_conditions(Conditions::STUNNED),
                goblin("goblin", c("B1")),
            ]);
            assert_eq!(
                validate(&s, &id("fighter"), &Decision::dodge()),
                Err(IllegalAction::ActorCannotAct(id("fighter")))
            );
        }

        #[test]
        fn area_needs_center_in_range_and_charges() {
            let burst = Action::area(
                "Burst",
                AreaEffect {
                    shape: AreaShape::Sphere,
                    radius: 1,
                    range_ft: 20,
                    save: Ability::Dex,
                    dc: 13,
                    damage: DiceExpr::new(2, 6, 0),
                    damage_type: DamageType::Fire,
                },
            )
            .with_cost("slot_1", 1);
            let mage = fighter("mage", c("A1")).with_action(burst);
            let s = state_of(vec![mage.clone(), goblin("goblin", c("J1"))]);
            assert_eq!(
                validate(&s, &id("mage"), &Decision::area("Burst", c("B1"))),
                Err(IllegalAction::NoCharges("slot_1".into()))
            );

            let s = state_of(vec![mage.with_resource("slot_1", 1), goblin("goblin", c("J1"))]);
            assert_eq!(validate(&s, &id("mage"), &Decision::area("Burst", c("B1"))), Ok(()));
            assert_eq!(
                validate(&s, &id("mage"), &Decision::area("Burst", c("J1"))),
                Err(IllegalAction::CenterOutOfRange {
                    distance_ft: 45,
                    range_ft: 20
                })
            );
            assert_eq!(
                validate(&s, &id("mage"), &Decision::attack("Burst", "goblin")),
                Err(IllegalAction::MissingCenter("Burst".into()))
            );
        }
    }

    mod heuristic_tests {
        use super::*;

        fn decide(state: &CombatState, actor: &str) -> Decision {
            let view = TurnView::new(state, &id(actor)).unwrap();
            Heuristic::default().decide(&view).unwrap()
        }

        #[test]
        fn attacks_adjacent_enemy() {
            let s = state_of(vec![fighter("fighter", c("A1")), goblin("goblin", c("B1"))]);
            assert_eq!(decide(&s, "fighter"), Decision::attack("Longsword", "goblin"));
        }

        #[test]
        fn closes_distance_and_stops_adjacent() {
            let s = state_of(vec![fighter("fighter", c("A1")), goblin("goblin", c("F1"))]);
            let d = decide(&s, "fighter");
            assert_eq!(d, Decision::attack("Longsword", "goblin").with_move(c("E1")));
            assert_eq!(validate(&s, &id("fighter"), &d), Ok(()));
        }

        #[test]
        fn far_target_means_move_only() {
            let s = state_of(vec![fighter("fighter", c("A1")), goblin("goblin", c("T1"))]);
            assert_eq!(decide(&s, "fighter"), Decision::move_only(c("G1")));
        }

        #[test]
        fn picks_nearest_then_weakest() {
            let s = state_of(vec![
                fighter("fighter", c("B2")),
                goblin("g1", c("B3")),
                goblin("g2", c("C2")).with_hp(3),
            ]);
            assert_eq!(decide(&s, "fighter").target, Some(id("g2")));
        }

        #[test]
        fn prefers_multiattack() {
            let bite = Attack::melee("Bite", 4, DiceExpr::new(1, 6, 2), DamageType::Piercing, 5);
            let wolf = fighter("wolf", c("A1"))
                .with_action(Action::multiattack("Multiattack", vec![bite.clone(), bite]));
            let s = state_of(vec![wolf, goblin("goblin", c("B1"))]);
            assert_eq!(decide(&s, "wolf").action.as_deref(), Some("Multiattack"));
        }

        #[test]
        fn every_heuristic_decision_validates() {
            let s = state_of(vec![
                fighter("fighter", c("A1")),
                fighter("cleric", c("A2")),
                goblin("g1", c("E4")),
                goblin("g2", c("H8")),
                goblin("g3", c("B1")),
            ]);
            for actor in ["fighter", "cleric", "g1", "g2", "g3"] {
                let d = decide(&s, actor);
                assert_eq!(validate(&s, &id(actor), &d), Ok(()), "{actor}: {d:?}");
            }
        }

        #[test]
        fn plain_functions_are_sources() {
            fn undecided(_: &TurnView<'_>) -> Result<Decision, DecisionError> {
                Err(DecisionError::Undecided)
            }
            let s = state_of(vec![fighter("fighter", c("A1")), goblin("goblin", c("B1"))]);
            let view = TurnView::new(&s, &id("fighter")).unwrap();
            assert_eq!(undecided.decide(&view), Err(DecisionError::Undecided));
        }
    }
}
