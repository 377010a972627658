//! Damage dice expressions and the d20.
//!
//! Expressions are the `NdS+M` subset used by stat blocks: a count of
//! same-sided dice plus a flat modifier. Critical hits double the dice count
//! and leave the modifier alone.

use std::fmt;
use std::str::FromStr;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::advantage::AdvantageState;
use crate::error::DiceError;

/// Upper bound on dice in one expression.
pub const MAX_DICE: u32 = 100;

/// Source of die results.
///
/// Rules code only ever asks for "one die with this many sides", which lets
/// tests script exact results without depending on how a generator maps bits
/// to ranges.
pub trait DieRoller {
    /// Returns a value in `1..=sides`.
    fn roll_die(&mut self, sides: u32) -> u32;
}

/// Seeded roller used for real encounters.
///
/// Each encounter owns one, built from the batch seed and the run index
/// (ChaCha stream), so runs are independent and individually reproducible.
#[derive(Debug, Clone)]
pub struct SeededRoller(ChaCha8Rng);

impl SeededRoller {
    /// Roller on stream 0 of `seed`.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self(ChaCha8Rng::seed_from_u64(seed))
    }

    /// Roller on stream `stream` of `seed`.
    #[must_use]
    pub fn with_stream(seed: u64, stream: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(stream);
        Self(rng)
    }
}

impl DieRoller for SeededRoller {
    fn roll_die(&mut self, sides: u32) -> u32 {
        self.0.gen_range(1..=sides.max(1))
    }
}

/// A damage expression such as `2d6+3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DiceExpr {
    /// Number of dice.
    pub count: u32,
    /// Sides per die.
    pub sides: u32,
    /// Flat modifier.
    pub modifier: i32,
}

impl DiceExpr {
    /// Creates an expression.
    #[must_use]
    pub const fn new(count: u32, sides: u32, modifier: i32) -> Self {
        Self {
            count,
            sides,
            modifier,
        }
    }

    /// A dice-less flat amount.
    #[must_use]
    pub const fn flat(modifier: i32) -> Self {
        Self::new(0, 1, modifier)
    }

    /// Parses `NdS`, `NdS+M`, `NdS-M`, `dS` or a bare integer.
    ///
    /// # Errors
    ///
    /// Returns [`DiceError`] for empty or malformed text, zero-sided dice, or
    /// more than [`MAX_DICE`] dice.
    pub fn parse(text: &str) -> Result<Self, DiceError> {
        let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return Err(DiceError::Empty);
        }
        let lower = compact.to_ascii_lowercase();
        let malformed = || DiceError::Malformed(text.to_string());

        let Some((count_str, rest)) = lower.split_once('d') else {
            let modifier = lower.parse().map_err(|_| malformed())?;
            return Ok(Self::flat(modifier));
        };

        let count = if count_str.is_empty() {
            1
        } else {
            count_str.parse().map_err(|_| malformed())?
        };

        let (sides_str, modifier) = match rest.find(['+', '-']) {
            Some(idx) => {
                let modifier: i32 = rest[idx..].parse().map_err(|_| malformed())?;
                (&rest[..idx], modifier)
            }
            None => (rest, 0),
        };
        let sides: u32 = sides_str.parse().map_err(|_| malformed())?;

        if sides == 0 {
            return Err(DiceError::InvalidSides(sides));
        }
        if count > MAX_DICE {
            return Err(DiceError::TooManyDice(count));
        }
        Ok(Self::new(count, sides, modifier))
    }

    /// The critical-hit version: dice count doubled, modifier unchanged.
    #[must_use]
    pub const fn critical(self) -> Self {
        Self::new(self.count.saturating_mul(2), self.sides, self.modifier)
    }

    /// Rolls the expression. The total never drops below zero.
    pub fn roll<R: DieRoller + ?Sized>(&self, rng: &mut R) -> u32 {
        let dice: i64 = (0..self.count)
            .map(|_| i64::from(rng.roll_die(self.sides)))
            .sum();
        let total = (dice + i64::from(self.modifier)).max(0);
        u32::try_from(total).unwrap_or(u32::MAX)
    }

    /// Lowest possible total.
    #[must_use]
    pub fn min(&self) -> u32 {
        let lo = i64::from(self.count) + i64::from(self.modifier);
        u32::try_from(lo.max(0)).unwrap_or(u32::MAX)
    }

    /// Highest possible total.
    #[must_use]
    pub fn max(&self) -> u32 {
        let hi = i64::from(self.count) * i64::from(self.sides) + i64::from(self.modifier);
        u32::try_from(hi.max(0)).unwrap_or(u32::MAX)
    }
}

impl fmt::Display for DiceExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 0 {
            return write!(f, "{}", self.modifier);
        }
        write!(f, "{}d{}", self.count, self.sides)?;
        match self.modifier {
            0 => Ok(()),
            m if m > 0 => write!(f, "+{m}"),
            m => write!(f, "{m}"),
        }
    }
}

impl FromStr for DiceExpr {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DiceExpr {
    type Error = DiceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DiceExpr> for String {
    fn from(expr: DiceExpr) -> Self {
        expr.to_string()
    }
}

/// One d20 check, keeping the raw dice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct D20Roll {
    /// The kept die.
    pub natural: u8,
    /// Both dice when two were drawn; the second equals the first otherwise.
    pub rolls: [u8; 2],
    /// State the roll was made under.
    pub state: AdvantageState,
}

impl D20Roll {
    /// Natural 20.
    #[must_use]
    pub const fn is_natural_20(&self) -> bool {
        self.natural == 20
    }

    /// Natural 1.
    #[must_use]
    pub const fn is_natural_1(&self) -> bool {
        self.natural == 1
    }
}

fn d20<R: DieRoller + ?Sized>(rng: &mut R) -> u8 {
    u8::try_from(rng.roll_die(20).clamp(1, 20)).unwrap_or(20)
}

/// Rolls a d20 under an advantage state.
///
/// Advantage draws two dice and keeps the higher, disadvantage the lower,
/// normal draws one.
pub fn roll_d20<R: DieRoller + ?Sized>(state: AdvantageState, rng: &mut R) -> D20Roll {
    let first = d20(rng);
    let (natural, second) = match state {
        AdvantageState::Normal => (first, first),
        AdvantageState::Advantage => {
            let second = d20(rng);
            (first.max(second), second)
        }
        AdvantageState::Disadvantage => {
            let second = d20(rng);
            (first.min(second), second)
        }
    };
    tracing::trace!(target: "skirmish::dice", ?state, first, second, natural, "d20");
    D20Roll {
        natural,
        rolls: [first, second],
        state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::ScriptedRoller;

    mod parse_tests {
        use super::*;

        #[test]
        fn parses_full_expression() {
            assert_eq!(DiceExpr::parse("2d6+3").unwrap(), DiceExpr::new(2, 6, 3));
        }

        #[test]
        fn parses_negative_modifier_and_spaces() {
            assert_eq!(DiceExpr::parse(" 1d10 - 1 ").unwrap(), DiceExpr::new(1, 10, -1));
        }

        #[test]
        fn parses_implicit_count_and_case() {
            assert_eq!(DiceExpr::parse("D8").unwrap(), DiceExpr::new(1, 8, 0));
        }

        #[test]
        fn parses_flat_amount() {
            assert_eq!(DiceExpr::parse("7").unwrap(), DiceExpr::flat(7));
        }

        #[test]
        fn rejects_garbage() {
            assert_eq!(DiceExpr::parse("  "), Err(DiceError::Empty));
            assert!(matches!(DiceExpr::parse("2x6"), Err(DiceError::Malformed(_))));
            assert!(matches!(DiceExpr::parse("2d"), Err(DiceError::Malformed(_))));
            assert!(matches!(DiceExpr::parse("2d6+"), Err(DiceError::Malformed(_))));
            assert_eq!(DiceExpr::parse("1d0"), Err(DiceError::InvalidSides(0)));
            assert_eq!(DiceExpr::parse("101d6"), Err(DiceError::TooManyDice(101)));
        }

        #[test]
        fn display_round_trips() {
            for text in ["1d8+3", "2d6", "1d10-1", "4"] {
                assert_eq!(DiceExpr::parse(text).unwrap().to_string(), text);
            }
        }
    }

    mod roll_tests {
        use super::*;

        #[test]
        fn critical_doubles_dice_not_modifier() {
            let expr = DiceExpr::new(1, 8, 3);
            assert_eq!(expr.critical(), DiceExpr::new(2, 8, 3));
            assert_eq!((expr.min(), expr.max()), (4, 11));
            assert_eq!((expr.critical().min(), expr.critical().max()), (5, 19));
        }

        #[test]
        fn critical_saturates_huge_counts() {
            let expr = DiceExpr::new(u32::MAX - 1, 6, 0);
            assert_eq!(expr.critical().count, u32::MAX);
        }

        #[test]
        fn critical_rolls_stay_in_range() {
            let mut rng = SeededRoller::new(7);
            let crit = DiceExpr::new(1, 8, 3).critical();
            for _ in 0..2_000 {
                let dmg = crit.roll(&mut rng);
                assert!((5..=19).contains(&dmg), "crit damage {dmg} out of range");
            }
        }

        #[test]
        fn normal_rolls_stay_in_range() {
            let mut rng = SeededRoller::new(8);
            let expr = DiceExpr::new(1, 8, 3);
            for _ in 0..2_000 {
                let dmg = expr.roll(&mut rng);
                assert!((4..=11).contains(&dmg));
            }
        }

        #[test]
        fn flat_critical_is_unchanged() {
            let mut rng = SeededRoller::new(1);
            assert_eq!(DiceExpr::flat(5).critical().roll(&mut rng), 5);
        }

        #[test]
        fn negative_total_floors_at_zero() {
            let mut rng = ScriptedRoller::new([1]);
            assert_eq!(DiceExpr::new(1, 4, -3).roll(&mut rng), 0);
        }
    }

    mod d20_tests {
        use super::*;

        #[test]
        fn normal_draws_one_die() {
            let mut rng = ScriptedRoller::new([12, 19]);
            let roll = roll_d20(AdvantageState::Normal, &mut rng);
            assert_eq!(roll.natural, 12);
            assert_eq!(rng.remaining(), 1);
        }

        #[test]
        fn advantage_keeps_higher() {
            let mut rng = ScriptedRoller::new([4, 17]);
            let roll = roll_d20(AdvantageState::Advantage, &mut rng);
            assert_eq!(roll.natural, 17);
            assert_eq!(roll.rolls, [4, 17]);
        }

        #[test]
        fn disadvantage_keeps_lower() {
            let mut rng = ScriptedRoller::new([4, 17]);
            let roll = roll_d20(AdvantageState::Disadvantage, &mut rng);
            assert_eq!(roll.natural, 4);
        }

        #[test]
        fn seeded_rolls_cover_the_die() {
            let mut rng = SeededRoller::new(3);
            let mut seen = [false; 20];
            for _ in 0..1_000 {
                let n = roll_d20(AdvantageState::Normal, &mut rng).natural;
                seen[usize::from(n - 1)] = true;
            }
            assert!(seen.iter().all(|s| *s));
        }
    }
}
