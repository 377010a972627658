//! Advantage and disadvantage.
//!
//! The state is ternary, never a counter: any advantage source together with
//! any disadvantage source cancels to [`AdvantageState::Normal`], however many
//! sources sit on either side. [`resolve_advantage`] is the only place sources
//! are combined. Cover is not a source; it is a flat bonus (see
//! [`skirmish_grid::Cover::bonus`]).

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a d20 is rolled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvantageState {
    /// Two dice, keep the higher.
    Advantage,
    /// One die.
    #[default]
    Normal,
    /// Two dice, keep the lower.
    Disadvantage,
}

impl fmt::Display for AdvantageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Advantage => write!(f, "advantage"),
            Self::Normal => write!(f, "normal"),
            Self::Disadvantage => write!(f, "disadvantage"),
        }
    }
}

/// Combines advantage and disadvantage sources for one roll.
///
/// # Example
///
/// ```
/// use skirmish_core::advantage::{resolve_advantage, AdvantageState};
///
/// let adv = ["flanking", "pack tactics", "guiding bolt"];
/// let dis = ["prone"];
/// assert_eq!(resolve_advantage(&adv, &dis), AdvantageState::Normal);
/// assert_eq!(resolve_advantage(&adv, &[] as &[&str]), AdvantageState::Advantage);
/// ```
#[must_use]
pub fn resolve_advantage<A, D>(advantage: &[A], disadvantage: &[D]) -> AdvantageState {
    match (advantage.is_empty(), disadvantage.is_empty()) {
        (false, false) | (true, true) => AdvantageState::Normal,
        (false, true) => AdvantageState::Advantage,
        (true, false) => AdvantageState::Disadvantage,
    }
}

/// Collected sources for one roll, named for the event log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sources {
    /// Advantage-granting sources.
    pub advantage: Vec<&'static str>,
    /// Disadvantage-granting sources.
    pub disadvantage: Vec<&'static str>,
}

impl Sources {
    /// Empty source lists.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an advantage source.
    pub fn grant(&mut self, source: &'static str) {
        self.advantage.push(source);
    }

    /// Adds a disadvantage source.
    pub fn impose(&mut self, source: &'static str) {
        self.disadvantage.push(source);
    }

    /// Resolved state.
    #[must_use]
    pub fn resolve(&self) -> AdvantageState {
        resolve_advantage(&self.advantage, &self.disadvantage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const NONE: &[&str] = &[];

    #[test]
    fn no_sources_is_normal() {
        assert_eq!(resolve_advantage(NONE, NONE), AdvantageState::Normal);
    }

    #[test]
    fn single_side_wins() {
        assert_eq!(resolve_advantage(&["flanking"], NONE), AdvantageState::Advantage);
        assert_eq!(resolve_advantage(NONE, &["prone"]), AdvantageState::Disadvantage);
    }

    #[test]
    fn three_against_one_still_cancels() {
        let adv = ["flanking", "pack tactics", "guiding bolt"];
        assert_eq!(resolve_advantage(&adv, &["prone"]), AdvantageState::Normal);
    }

    #[test]
    fn sources_builder_resolves() {
        let mut s = Sources::new();
        s.grant("target restrained");
        assert_eq!(s.resolve(), AdvantageState::Advantage);
        s.impose("attacker poisoned");
        assert_eq!(s.resolve(), AdvantageState::Normal);
    }

    proptest! {
        #[test]
        fn both_sides_always_cancel(adv in 1usize..8, dis in 1usize..8) {
            let a = vec!["a"; adv];
            let d = vec!["d"; dis];
            prop_assert_eq!(resolve_advantage(&a, &d), AdvantageState::Normal);
        }

        #[test]
        fn one_sided_is_never_normal(n in 1usize..8, adv_side in any::<bool>()) {
            let sources = vec!["s"; n];
            let state = if adv_side {
                resolve_advantage(&sources, NONE)
            } else {
                resolve_advantage(NONE, &sources)
            };
            prop_assert_ne!(state, AdvantageState::Normal);
        }
    }
}
