//! Error types for the encounter engine.
//!
//! Rejected decisions are not errors of the engine: they surface as
//! [`IllegalAction`] values that the turn loop answers with a fallback.

use thiserror::Error;

use crate::combatant::CombatantId;

/// Malformed damage expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    /// Nothing to parse.
    #[error("empty dice expression")]
    Empty,

    /// Unparseable text.
    #[error("malformed dice expression '{0}'")]
    Malformed(String),

    /// Zero-sided die.
    #[error("invalid die sides: {0}")]
    InvalidSides(u32),

    /// Dice count above [`crate::dice::MAX_DICE`].
    #[error("too many dice: {0}")]
    TooManyDice(u32),
}

/// Inconsistent combatant or state input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// Current vitality above maximum.
    #[error("combatant {id}: hp {hp} exceeds max {max}")]
    HpAboveMax {
        /// Offending combatant.
        id: CombatantId,
        /// Current vitality.
        hp: u32,
        /// Maximum vitality.
        max: u32,
    },

    /// Zero maximum vitality.
    #[error("combatant {0}: max hp must be positive")]
    ZeroMaxHp(CombatantId),

    /// Two records share an id.
    #[error("duplicate combatant id {0}")]
    DuplicateId(CombatantId),

    /// Initiative names an id that is not in the state.
    #[error("initiative order references unknown combatant {0}")]
    UnknownInInitiative(CombatantId),

    /// A combatant is missing from the initiative order.
    #[error("combatant {0} missing from initiative order")]
    MissingFromInitiative(CombatantId),

    /// An encounter needs at least one combatant per team.
    #[error("team {0} has no combatants")]
    EmptyTeam(&'static str),

    /// Lookup of an id that is not in the state.
    #[error("unknown combatant {0}")]
    UnknownCombatant(CombatantId),
}

/// Invalid simulator or batch configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A count that must be positive is zero.
    #[error("{0} must be positive")]
    NotPositive(&'static str),

    /// `min_runs` above `max_runs`.
    #[error("min_runs ({min}) cannot exceed max_runs ({max})")]
    MinAboveMax {
        /// Configured minimum.
        min: u32,
        /// Configured maximum.
        max: u32,
    },

    /// A rate outside [0, 1].
    #[error("{name} must be in [0, 1], got {value}")]
    NotAProportion {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f64,
    },

    /// A proportion outside (0, 1).
    #[error("{name} must be in (0, 1), got {value}")]
    OutOfUnitRange {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f64,
    },
}

/// A decision source could not produce a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecisionError {
    /// The source has nothing to propose.
    #[error("decision source could not decide")]
    Undecided,

    /// The source failed, e.g. a remote call timed out.
    #[error("decision source unavailable: {0}")]
    Unavailable(String),
}

/// Why a proposed action was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IllegalAction {
    /// The actor cannot act this turn.
    #[error("{0} cannot act")]
    ActorCannotAct(CombatantId),

    /// Named action is not on the actor.
    #[error("unknown action '{0}'")]
    UnknownAction(String),

    /// Target id is not in the encounter.
    #[error("unknown target {0}")]
    UnknownTarget(CombatantId),

    /// Target is at 0 hp.
    #[error("target {0} is down")]
    TargetDown(CombatantId),

    /// Attack aimed at the actor's own team.
    #[error("target {0} is an ally")]
    FriendlyTarget(CombatantId),

    /// Attack action without a target.
    #[error("action '{0}' needs a target")]
    MissingTarget(String),

    /// Area action without a center.
    #[error("action '{0}' needs an area center")]
    MissingCenter(String),

    /// Target beyond every sub-attack's reach or range.
    #[error("target {target} is {distance_ft} ft away, beyond reach")]
    OutOfReach {
        /// Target id.
        target: CombatantId,
        /// Distance after movement.
        distance_ft: u32,
    },

    /// Area center beyond the effect's range.
    #[error("area center is {distance_ft} ft away, range is {range_ft} ft")]
    CenterOutOfRange {
        /// Distance after movement.
        distance_ft: u32,
        /// Effect range.
        range_ft: u32,
    },

    /// Movement longer than the actor's speed.
    #[error("move of {requested_ft} ft exceeds speed {speed_ft} ft")]
    MoveTooFar {
        /// Requested distance.
        requested_ft: u32,
        /// Available speed.
        speed_ft: u32,
    },

    /// Destination occupied by a living combatant.
    #[error("destination is occupied by {0}")]
    DestinationOccupied(CombatantId),

    /// Resource charges exhausted.
    #[error("no '{0}' charges left")]
    NoCharges(String),
}

/// Top-level error for encounter and batch runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// Bad input state.
    #[error(transparent)]
    State(#[from] StateError),

    /// Bad configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
