//! The turn loop: one encounter from initiative to outcome.
//!
//! # Turn structure
//!
//! 1. A combatant at 0 vitality rolls a death save if it owes one, then its
//!    turn ends. Stable, dead and disabled combatants are skipped.
//! 2. The decision source is asked for a proposal; it is validated. On
//!    failure or rejection the fallback source is asked and validated. If
//!    that also fails the combatant takes no action.
//! 3. Movement happens first. Every enemy whose melee reach holds the start
//!    cell but not the destination, and who still has its reaction, makes
//!    one opportunity attack before the move completes. If the mover drops,
//!    the rest of the turn is abandoned.
//! 4. The action resolves. A sub-attack sequence stops when the target drops.
//!
//! After any step, an actor that has dropped to 0 or gained a disabling
//! condition loses the rest of its turn. The outcome is checked after every
//! turn.

use serde::{Deserialize, Serialize};
use skirmish_grid::{cover_between, feet, within_radius, Cell, DistanceMetric, Terrain};

use crate::combatant::{
    Action, ActionKind, AreaEffect, Attack, Combatant, CombatantId, Conditions, DamageType, Team,
};
use crate::decision::{validate, Decision, DecisionSource, TurnView};
use crate::dice::{DieRoller, SeededRoller};
use crate::error::{ConfigError, SimError, StateError};
use crate::event::{CombatEvent, EventSink, SkipReason};
use crate::rules::{
    apply_mitigation, attack_sources, begin_concentration, concentration_check, death_save,
    forces_critical, resolve_attack, roll_damage, saving_throw, ADJACENT_FT,
};
use crate::state::{CombatState, Outcome};

/// Who rolls death saves at 0 vitality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathSavePolicy {
    /// Party members roll; enemies die at 0.
    #[default]
    PartyOnly,
    /// Everyone rolls.
    Everyone,
    /// Everyone dies at 0.
    Nobody,
}

impl DeathSavePolicy {
    /// True if combatants on `team` roll death saves.
    #[must_use]
    pub const fn applies_to(self, team: Team) -> bool {
        match self {
            Self::PartyOnly => matches!(team, Team::Party),
            Self::Everyone => true,
            Self::Nobody => false,
        }
    }
}

/// Turn loop configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Round safety cap; reaching it is a timeout.
    pub max_rounds: u32,
    /// How area radii are measured.
    pub area_metric: DistanceMetric,
    /// Keep the event log on the final state.
    pub record_events: bool,
    /// Who rolls death saves.
    pub death_saves: DeathSavePolicy,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            max_rounds: 100,
            area_metric: DistanceMetric::Manhattan,
            record_events: true,
            death_saves: DeathSavePolicy::PartyOnly,
        }
    }
}

impl SimulatorConfig {
    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotPositive`] if `max_rounds` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_rounds == 0 {
            return Err(ConfigError::NotPositive("max_rounds"));
        }
        Ok(())
    }
}

/// Damage dealt by one source with one action to one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageRecord {
    /// Who dealt it.
    pub source: CombatantId,
    /// Action name.
    pub action: String,
    /// Who took it.
    pub target: CombatantId,
    /// Post-mitigation amount, not capped at remaining vitality.
    pub amount: u32,
}

/// Result of one encounter.
#[derive(Debug, Clone, PartialEq)]
pub struct EncounterReport {
    /// How it ended.
    pub outcome: Outcome,
    /// Rounds fought, including the last partial one.
    pub rounds: u32,
    /// Every party member ended at 0 vitality.
    pub tpk: bool,
    /// Damage instances in order.
    pub damage: Vec<DamageRecord>,
    /// Final snapshot.
    pub final_state: CombatState,
}

/// Runs encounters on one terrain.
#[derive(Debug, Clone)]
pub struct Simulator {
    config: SimulatorConfig,
    terrain: Terrain,
}

impl Simulator {
    /// Creates a simulator.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is invalid.
    pub fn new(config: SimulatorConfig, terrain: Terrain) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, terrain })
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Terrain in use.
    #[must_use]
    pub const fn terrain(&self) -> &Terrain {
        &self.terrain
    }

    /// Runs one encounter with a roller seeded from `seed`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError`] if the templates do not form a valid state.
    pub fn run_encounter<D, F, S>(
        &self,
        templates: &[Combatant],
        decider: &D,
        fallback: &F,
        seed: u64,
        sink: &mut S,
    ) -> Result<EncounterReport, SimError>
    where
        D: DecisionSource + ?Sized,
        F: DecisionSource + ?Sized,
        S: EventSink + ?Sized,
    {
        let mut rng = SeededRoller::new(seed);
        self.run_with_roller(templates, decider, fallback, &mut rng, sink)
    }

    /// Runs one encounter drawing dice from `rng`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError`] if the templates do not form a valid state.
    pub fn run_with_roller<D, F, R, S>(
        &self,
        templates: &[Combatant],
        decider: &D,
        fallback: &F,
        rng: &mut R,
        sink: &mut S,
    ) -> Result<EncounterReport, SimError>
    where
        D: DecisionSource + ?Sized,
        F: DecisionSource + ?Sized,
        R: DieRoller + ?Sized,
        S: EventSink + ?Sized,
    {
        let (state, rolls) = CombatState::roll_initiative(templates.to_vec(), rng)?;
        let mut encounter = Encounter {
            config: &self.config,
            terrain: &self.terrain,
            rng,
            sink,
            state,
            damage: Vec::new(),
        };
        for roll in rolls {
            encounter.emit(CombatEvent::InitiativeRolled {
                id: roll.id,
                natural: roll.natural,
                bonus: roll.bonus,
                total: roll.total,
            });
        }
        encounter.run(decider, fallback)
    }
}

/// Mutable driver for one encounter. The state itself is only ever replaced.
struct Encounter<'a, R: ?Sized, S: ?Sized> {
    config: &'a SimulatorConfig,
    terrain: &'a Terrain,
    rng: &'a mut R,
    sink: &'a mut S,
    state: CombatState,
    damage: Vec<DamageRecord>,
}

impl<R, S> Encounter<'_, R, S>
where
    R: DieRoller + ?Sized,
    S: EventSink + ?Sized,
{
    fn emit(&mut self, event: CombatEvent) {
        self.sink.emit(&event);
        if self.config.record_events {
            self.state = self.state.record(event);
        }
    }

    fn combatant(&self, id: &CombatantId) -> Result<&Combatant, StateError> {
        self.state.get(id)
    }

    fn run<D, F>(mut self, decider: &D, fallback: &F) -> Result<EncounterReport, SimError>
    where
        D: DecisionSource + ?Sized,
        F: DecisionSource + ?Sized,
    {
        let max_rounds = self.config.max_rounds;
        self.emit(CombatEvent::RoundStarted { round: 1 });

        let outcome = loop {
            let Some(id) = self.state.current().cloned() else {
                break Outcome::Timeout;
            };
            self.take_turn(&id, decider, fallback)?;
            if let Some(outcome) = self.state.outcome() {
                break outcome;
            }
            let next = self.state.advance_turn();
            let new_round = next.round() != self.state.round();
            self.state = next;
            if new_round {
                if self.state.round() > max_rounds {
                    break Outcome::Timeout;
                }
                self.emit(CombatEvent::RoundStarted {
                    round: self.state.round(),
                });
            }
        };

        let rounds = self.state.round().min(max_rounds);
        self.state = self.state.end(outcome);
        self.emit(CombatEvent::CombatEnded { outcome, rounds });
        tracing::debug!(target: "skirmish::turn", %outcome, rounds, "encounter finished");

        let tpk = outcome == Outcome::PartyDefeat && self.state.is_tpk();
        Ok(EncounterReport {
            outcome,
            rounds,
            tpk,
            damage: self.damage,
            final_state: self.state,
        })
    }

    // =========================================================================
    // Turn
    // =========================================================================

    fn take_turn<D, F>(&mut self, id: &CombatantId, decider: &D, fallback: &F) -> Result<(), StateError>
    where
        D: DecisionSource + ?Sized,
        F: DecisionSource + ?Sized,
    {
        let actor = self.combatant(id)?;
        if !actor.is_alive() {
            if actor.owes_death_save() {
                return self.roll_death_save(id);
            }
            let reason = if actor.death_saves.dead {
                SkipReason::Dead
            } else {
                SkipReason::Stable
            };
            self.emit(CombatEvent::TurnSkipped { id: id.clone(), reason });
            return Ok(());
        }
        if !actor.can_act() {
            self.emit(CombatEvent::TurnSkipped {
                id: id.clone(),
                reason: SkipReason::Disabled,
            });
            return Ok(());
        }

        match self.choose(id, decider, fallback) {
            Some(decision) => self.execute(id, &decision),
            None => {
                self.emit(CombatEvent::TurnSkipped {
                    id: id.clone(),
                    reason: SkipReason::Dodge,
                });
                Ok(())
            }
        }
    }

    /// Asks the decider, then the fallback, for a legal decision.
    fn choose<D, F>(&mut self, id: &CombatantId, decider: &D, fallback: &F) -> Option<Decision>
    where
        D: DecisionSource + ?Sized,
        F: DecisionSource + ?Sized,
    {
        self.propose(id, decider, false)
            .or_else(|| self.propose(id, fallback, true))
    }

    fn propose<D>(&mut self, id: &CombatantId, source: &D, from_fallback: bool) -> Option<Decision>
    where
        D: DecisionSource + ?Sized,
    {
        let proposal = TurnView::new(&self.state, id).and_then(|view| source.decide(&view));
        let decision = match proposal {
            Ok(decision) => decision,
            Err(e) => {
                tracing::warn!(target: "skirmish::turn", %id, error = %e, from_fallback, "decision source failed");
                return None;
            }
        };
        match validate(&self.state, id, &decision) {
            Ok(()) => {
                tracing::debug!(target: "skirmish::turn", %id, ?decision, from_fallback, "decision accepted");
                Some(decision)
            }
            Err(reason) => {
                if from_fallback {
                    tracing::warn!(target: "skirmish::turn", %id, %reason, "fallback decision illegal");
                } else {
                    tracing::debug!(target: "skirmish::turn", %id, %reason, "decision rejected");
                }
                self.emit(CombatEvent::DecisionRejected {
                    id: id.clone(),
                    reason: reason.to_string(),
                    from_fallback,
                });
                None
            }
        }
    }

    fn execute(&mut self, id: &CombatantId, decision: &Decision) -> Result<(), StateError> {
        if let Some(to) = decision.move_to {
            if to != self.combatant(id)?.position {
                self.move_with_reactions(id, to)?;
                if !self.combatant(id)?.can_act() {
                    tracing::debug!(target: "skirmish::turn", %id, "turn cut short during movement");
                    return Ok(());
                }
            }
        }

        let Some(name) = decision.action.as_deref() else {
            return Ok(());
        };
        let Some(action) = self.combatant(id)?.action(name).cloned() else {
            return Ok(());
        };
        self.pay_for(id, &action)?;

        match &action.kind {
            ActionKind::Attacks(attacks) => {
                if let Some(target) = &decision.target {
                    for attack in attacks {
                        if !self.combatant(target)?.is_alive() || !self.combatant(id)?.can_act() {
                            break;
                        }
                        let distance_ft = feet(self.combatant(id)?.position, self.combatant(target)?.position);
                        if attack.reach_or_range_ft() < distance_ft {
                            tracing::debug!(
                                target: "skirmish::turn",
                                %id,
                                attack = attack.name.as_str(),
                                distance_ft,
                                "sub-attack out of reach"
                            );
                            continue;
                        }
                        self.strike(id, target, &action.name, attack)?;
                    }
                }
            }
            ActionKind::Area(effect) => {
                if let Some(center) = decision.area_center {
                    self.area(id, &action.name, effect, center)?;
                }
            }
        }
        Ok(())
    }

    /// Spends charges and starts concentration.
    fn pay_for(&mut self, id: &CombatantId, action: &Action) -> Result<(), StateError> {
        if let Some(cost) = &action.cost {
            let mut remaining = 0;
            self.state = self.state.update(id, |c| {
                let left = c.charges(&cost.resource).saturating_sub(cost.amount);
                c.resources.insert(cost.resource.clone(), left);
                remaining = left;
            })?;
            self.emit(CombatEvent::ResourceSpent {
                id: id.clone(),
                resource: cost.resource.clone(),
                remaining,
            });
        }
        if action.concentration {
            let (updated, replaced) = begin_concentration(self.combatant(id)?, &action.name);
            self.state = self.state.update(id, |c| *c = updated)?;
            if let Some(old) = &replaced {
                tracing::debug!(target: "skirmish::turn", %id, old = old.as_str(), new = action.name.as_str(), "concentration replaced");
            }
            self.emit(CombatEvent::ConcentrationStarted {
                id: id.clone(),
                effect: action.name.clone(),
                replaced,
            });
        }
        Ok(())
    }

    // =========================================================================
    // Movement
    // =========================================================================

    /// Enemies whose reach holds `from` but not `to` and who can still react.
    fn provoked_by(&self, mover: &Combatant, from: Cell, to: Cell) -> Vec<CombatantId> {
        self.state
            .combatants()
            .filter(|r| r.team != mover.team && r.can_act() && self.state.has_reaction(&r.id))
            .filter(|r| {
                r.melee_reach_ft()
                    .is_some_and(|reach| feet(r.position, from) <= reach && feet(r.position, to) > reach)
            })
            .map(|r| r.id.clone())
            .collect()
    }

    fn move_with_reactions(&mut self, id: &CombatantId, to: Cell) -> Result<(), StateError> {
        let mover = self.combatant(id)?.clone();
        let from = mover.position;

        for reactor in self.provoked_by(&mover, from, to) {
            if !self.combatant(id)?.is_alive() {
                break;
            }
            let r = self.combatant(&reactor)?;
            if !r.can_act() || !self.state.has_reaction(&reactor) {
                continue;
            }
            let Some((action, attack)) = r.opportunity_attack() else {
                continue;
            };
            let (action_name, attack) = (action.name.clone(), attack.clone());

            self.state = self.state.consume_reaction(&reactor);
            tracing::debug!(target: "skirmish::turn", %reactor, mover = %id, "opportunity attack");
            self.emit(CombatEvent::OpportunityAttack {
                reactor: reactor.clone(),
                mover: id.clone(),
            });
            self.strike(&reactor, id, &action_name, &attack)?;
        }

        if !self.combatant(id)?.is_alive() {
            tracing::debug!(target: "skirmish::turn", %id, "move abandoned");
            return Ok(());
        }
        self.state = self.state.move_combatant(id, to)?;
        self.emit(CombatEvent::Moved {
            id: id.clone(),
            from,
            to,
        });
        Ok(())
    }

    // =========================================================================
    // Attacks and damage
    // =========================================================================

    /// A hostile combatant able to act stands within 5 ft of `id`.
    fn threatened(&self, who: &Combatant) -> bool {
        self.state.combatants().any(|o| {
            o.team != who.team && o.can_act() && feet(o.position, who.position) <= ADJACENT_FT
        })
    }

    fn strike(
        &mut self,
        attacker_id: &CombatantId,
        target_id: &CombatantId,
        action: &str,
        attack: &Attack,
    ) -> Result<(), StateError> {
        let attacker = self.combatant(attacker_id)?;
        let target = self.combatant(target_id)?;
        let distance_ft = feet(attacker.position, target.position);
        let cover = cover_between(attacker.position, target.position, self.terrain.cover_map());
        let advantage = attack_sources(attacker, target, attack, distance_ft, self.threatened(attacker)).resolve();
        let auto_crit = forces_critical(attack, target, distance_ft);
        let armor_class = target.armor_class;

        let mut roll = resolve_attack(attack.to_hit, armor_class, cover, advantage, &mut *self.rng);
        if roll.hit && auto_crit {
            roll.critical = true;
        }
        self.emit(CombatEvent::AttackResolved {
            attacker: attacker_id.clone(),
            target: target_id.clone(),
            action: action.to_string(),
            attack: attack.name.clone(),
            roll,
            advantage,
            cover,
        });

        if roll.hit {
            let raw = roll_damage(&attack.damage, roll.critical, &mut *self.rng);
            self.deal_damage(attacker_id, action, target_id, raw, attack.damage_type, roll.critical)?;
        }
        Ok(())
    }

    fn area(
        &mut self,
        caster: &CombatantId,
        action: &str,
        effect: &AreaEffect,
        center: Cell,
    ) -> Result<(), StateError> {
        let metric = self.config.area_metric;
        let caught: Vec<CombatantId> = self
            .state
            .combatants()
            .filter(|c| !c.death_saves.dead && within_radius(center, c.position, effect.radius, metric))
            .map(|c| c.id.clone())
            .collect();
        let rolled = effect.damage.roll(&mut *self.rng);
        self.emit(CombatEvent::AreaResolved {
            caster: caster.clone(),
            action: action.to_string(),
            center,
            caught: caught.clone(),
            rolled,
        });

        for id in &caught {
            let target = self.state.get(id)?;
            let cover = cover_between(center, target.position, self.terrain.cover_map());
            let save = saving_throw(target, effect.save, effect.dc, cover, &mut *self.rng);
            self.emit(CombatEvent::SavingThrow {
                id: id.clone(),
                ability: effect.save,
                save,
            });
            let amount = if save.success { rolled / 2 } else { rolled };
            self.deal_damage(caster, action, id, amount, effect.damage_type, false)?;
        }
        Ok(())
    }

    fn deal_damage(
        &mut self,
        source: &CombatantId,
        action: &str,
        target_id: &CombatantId,
        raw: u32,
        damage_type: DamageType,
        critical: bool,
    ) -> Result<(), StateError> {
        let target = self.combatant(target_id)?;
        let team = target.team;
        let mitigated = apply_mitigation(raw, damage_type, &target.defenses);

        let (state, applied) = self.state.apply_damage(target_id, mitigated.amount, critical)?;
        self.state = state;
        self.emit(CombatEvent::DamageApplied {
            source: source.clone(),
            target: target_id.clone(),
            action: action.to_string(),
            raw,
            amount: mitigated.amount,
            damage_type,
            mitigation: mitigated.applied,
            hp_after: applied.hp_after,
        });
        self.damage.push(DamageRecord {
            source: source.clone(),
            action: action.to_string(),
            target: target_id.clone(),
            amount: mitigated.amount,
        });

        if let Some(effect) = applied.concentration_lost {
            self.emit(CombatEvent::ConcentrationBroken {
                id: target_id.clone(),
                effect,
            });
        }
        if applied.dropped {
            self.emit(CombatEvent::Downed { id: target_id.clone() });
            if !self.config.death_saves.applies_to(team) {
                self.kill(target_id)?;
            }
        } else if applied.hit_while_down {
            if self.combatant(target_id)?.death_saves.dead {
                self.emit(CombatEvent::Died { id: target_id.clone() });
            }
        } else if mitigated.amount > 0 {
            self.check_concentration(target_id, mitigated.amount)?;
        }
        Ok(())
    }

    fn kill(&mut self, id: &CombatantId) -> Result<(), StateError> {
        self.state = self.state.update(id, |c| {
            c.death_saves.dead = true;
            c.death_saves.stable = false;
        })?;
        self.emit(CombatEvent::Died { id: id.clone() });
        Ok(())
    }

    fn check_concentration(&mut self, id: &CombatantId, damage: u32) -> Result<(), StateError> {
        let target = self.state.get(id)?;
        let Some(effect) = target.concentration.clone() else {
            return Ok(());
        };
        let Some(check) = concentration_check(target, damage, &mut *self.rng) else {
            return Ok(());
        };
        self.emit(CombatEvent::ConcentrationChecked {
            id: id.clone(),
            effect: effect.clone(),
            check,
        });
        if !check.maintained {
            tracing::debug!(target: "skirmish::turn", %id, effect = effect.as_str(), "concentration broken");
            self.state = self.state.update(id, |c| c.concentration = None)?;
            self.emit(CombatEvent::ConcentrationBroken {
                id: id.clone(),
                effect,
            });
        }
        Ok(())
    }

    fn roll_death_save(&mut self, id: &CombatantId) -> Result<(), StateError> {
        let saves = self.combatant(id)?.death_saves;
        let roll = death_save(saves, &mut *self.rng);
        self.state = self.state.update(id, |c| {
            c.death_saves = roll.saves;
            if roll.revived {
                c.hp = 1;
                c.conditions.remove(Conditions::UNCONSCIOUS);
            }
        })?;
        self.emit(CombatEvent::DeathSave {
            id: id.clone(),
            roll,
        });
        if roll.saves.dead {
            self.emit(CombatEvent::Died { id: id.clone() });
        }
        Ok(())
    }
}
