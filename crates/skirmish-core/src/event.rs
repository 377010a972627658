//! Structured combat events and the sinks that consume them.
//!
//! The turn loop emits one [`CombatEvent`] per thing that happens, in turn
//! order. What a sink does with them (display, log file, nothing) is its own
//! business.

use serde::{Deserialize, Serialize};
use skirmish_grid::{Cell, Cover};

use crate::advantage::AdvantageState;
use crate::combatant::{Ability, CombatantId, DamageType};
use crate::rules::{AttackRoll, ConcentrationCheck, DeathSaveRoll, MitigationApplied, SaveRoll};
use crate::state::Outcome;

/// Why a combatant did not act.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// A disabling condition.
    Disabled,
    /// At 0 vitality and stable.
    Stable,
    /// Dead.
    Dead,
    /// Neither the decision source nor the fallback produced a legal action.
    Dodge,
}

/// One thing that happened in an encounter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CombatEvent {
    /// A combatant rolled initiative.
    InitiativeRolled {
        /// Who rolled.
        id: CombatantId,
        /// The d20.
        natural: u8,
        /// Initiative bonus.
        bonus: i32,
        /// d20 plus bonus.
        total: i32,
    },
    /// A new round began.
    RoundStarted {
        /// Round number, starting at 1.
        round: u32,
    },
    /// A combatant moved.
    Moved {
        /// Who moved.
        id: CombatantId,
        /// Start cell.
        from: Cell,
        /// End cell.
        to: Cell,
    },
    /// A move provoked an opportunity attack.
    OpportunityAttack {
        /// Who reacted.
        reactor: CombatantId,
        /// Who was leaving reach.
        mover: CombatantId,
    },
    /// An attack roll was resolved.
    AttackResolved {
        /// Attacker.
        attacker: CombatantId,
        /// Target.
        target: CombatantId,
        /// Action name.
        action: String,
        /// Sub-attack name.
        attack: String,
        /// Roll details.
        roll: AttackRoll,
        /// Advantage state the roll was made under.
        advantage: AdvantageState,
        /// Cover the target had.
        cover: Cover,
    },
    /// An area effect went off.
    AreaResolved {
        /// Caster.
        caster: CombatantId,
        /// Action name.
        action: String,
        /// Center cell.
        center: Cell,
        /// Everyone inside the area, in id order.
        caught: Vec<CombatantId>,
        /// Damage rolled once for all.
        rolled: u32,
    },
    /// A saving throw was made.
    SavingThrow {
        /// Who saved.
        id: CombatantId,
        /// Ability used.
        ability: Ability,
        /// Roll details.
        save: SaveRoll,
    },
    /// Damage landed.
    DamageApplied {
        /// Who dealt it.
        source: CombatantId,
        /// Who took it.
        target: CombatantId,
        /// Action name.
        action: String,
        /// Damage before mitigation.
        raw: u32,
        /// Damage after mitigation.
        amount: u32,
        /// Damage type.
        damage_type: DamageType,
        /// Mitigation categories that fired.
        mitigation: MitigationApplied,
        /// Target vitality afterwards.
        hp_after: u32,
    },
    /// A combatant dropped to 0 vitality.
    Downed {
        /// Who dropped.
        id: CombatantId,
    },
    /// A combatant died.
    Died {
        /// Who died.
        id: CombatantId,
    },
    /// A death save was rolled.
    DeathSave {
        /// Who rolled.
        id: CombatantId,
        /// Result.
        roll: DeathSaveRoll,
    },
    /// A sustained effect began.
    ConcentrationStarted {
        /// Caster.
        id: CombatantId,
        /// New effect.
        effect: String,
        /// Effect that ended to make room, if any.
        replaced: Option<String>,
    },
    /// A concentration check was rolled.
    ConcentrationChecked {
        /// Caster.
        id: CombatantId,
        /// Effect at stake.
        effect: String,
        /// Result.
        check: ConcentrationCheck,
    },
    /// A sustained effect ended involuntarily.
    ConcentrationBroken {
        /// Caster.
        id: CombatantId,
        /// Effect that ended.
        effect: String,
    },
    /// Charges were spent.
    ResourceSpent {
        /// Who spent.
        id: CombatantId,
        /// Resource key.
        resource: String,
        /// Charges left.
        remaining: u32,
    },
    /// A proposed decision was rejected.
    DecisionRejected {
        /// Acting combatant.
        id: CombatantId,
        /// Why.
        reason: String,
        /// The rejected proposal came from the fallback.
        from_fallback: bool,
    },
    /// A combatant's turn passed without an action.
    TurnSkipped {
        /// Who.
        id: CombatantId,
        /// Why.
        reason: SkipReason,
    },
    /// The encounter ended.
    CombatEnded {
        /// Result.
        outcome: Outcome,
        /// Rounds fought.
        rounds: u32,
    },
}

/// Consumer of combat events.
pub trait EventSink {
    /// Receives one event.
    fn emit(&mut self, event: &CombatEvent);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: &CombatEvent) {}
}

/// Collects events in memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventLog {
    events: Vec<CombatEvent>,
}

impl EventLog {
    /// Empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded events in order.
    #[must_use]
    pub fn events(&self) -> &[CombatEvent] {
        &self.events
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drains the log.
    pub fn take(&mut self) -> Vec<CombatEvent> {
        std::mem::take(&mut self.events)
    }
}

impl EventSink for EventLog {
    fn emit(&mut self, event: &CombatEvent) {
        self.events.push(event.clone());
    }
}

/// Forwards every event to `tracing` at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&mut self, event: &CombatEvent) {
        match event {
            CombatEvent::RoundStarted { round } => {
                tracing::debug!(target: "skirmish::turn", round, "round started");
            }
            CombatEvent::AttackResolved {
                attacker,
                target,
                action,
                roll,
                ..
            } => {
                tracing::debug!(
                    target: "skirmish::turn",
                    %attacker,
                    %target,
                    action = action.as_str(),
                    natural = roll.roll.natural,
                    total = roll.total,
                    hit = roll.hit,
                    critical = roll.critical,
                    "attack"
                );
            }
            CombatEvent::DamageApplied {
                source,
                target,
                amount,
                hp_after,
                ..
            } => {
                tracing::debug!(target: "skirmish::turn", %source, %target, amount, hp_after, "damage");
            }
            CombatEvent::CombatEnded { outcome, rounds } => {
                tracing::debug!(target: "skirmish::turn", ?outcome, rounds, "combat ended");
            }
            other => tracing::debug!(target: "skirmish::turn", event = ?other),
        }
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: &CombatEvent) {
        (**self).emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_collects_in_order() {
        let mut log = EventLog::new();
        log.emit(&CombatEvent::RoundStarted { round: 1 });
        log.emit(&CombatEvent::RoundStarted { round: 2 });
        assert_eq!(log.len(), 2);
        assert_eq!(log.events()[1], CombatEvent::RoundStarted { round: 2 });
        assert_eq!(log.take().len(), 2);
        assert!(log.is_empty());
    }

    #[test]
    fn forwarding_through_mut_ref() {
        fn feed(mut sink: impl EventSink) {
            sink.emit(&CombatEvent::RoundStarted { round: 1 });
        }
        let mut log = EventLog::new();
        feed(&mut log);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn events_serialize_with_tag() {
        let event = CombatEvent::Moved {
            id: CombatantId::from("rogue"),
            from: Cell::new(0, 0),
            to: Cell::new(2, 0),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""event":"moved""#));
        assert!(json.contains(r#""to":"C1""#));
        let back: CombatEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn tracing_sink_accepts_everything() {
        let mut sink = TracingSink;
        sink.emit(&CombatEvent::Died {
            id: CombatantId::from("x"),
        });
    }
}
