//! Confidence intervals and difficulty classification.
//!
//! Win proportions use the Wilson score interval, which stays inside [0, 1]
//! and behaves at small samples and near 0 or 1 where the normal
//! approximation does not.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// =============================================================================
// Wilson interval
// =============================================================================

/// A binomial proportion confidence interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    /// Lower bound.
    pub lower: f64,
    /// Upper bound.
    pub upper: f64,
    /// Observed proportion.
    pub point: f64,
}

impl Interval {
    /// Maximum uncertainty, used before any sample exists.
    pub const UNINFORMED: Self = Self {
        lower: 0.0,
        upper: 1.0,
        point: 0.5,
    };

    /// Total width, `upper - lower`.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

impl Default for Interval {
    fn default() -> Self {
        Self::UNINFORMED
    }
}

/// Standard normal quantile for probability `p` (Acklam's approximation).
///
/// Relative error is below 1.2e-9 over the open unit interval. `p` is
/// clamped away from 0 and 1.
#[must_use]
pub fn z_score(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.024_25;

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    let p = p.clamp(f64::EPSILON, 1.0 - f64::EPSILON);
    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}

/// Wilson score interval for `successes` out of `n` trials.
///
/// `n = 0` gives [`Interval::UNINFORMED`]. `successes` above `n` is treated
/// as `n`. `confidence` is two-sided and must lie in (0, 1).
///
/// # Example
///
/// ```
/// use skirmish_core::stats::wilson_interval;
///
/// let ci = wilson_interval(70, 100, 0.95);
/// assert!((ci.lower - 0.6042).abs() < 1e-3);
/// assert!((ci.upper - 0.7811).abs() < 1e-3);
/// assert!((ci.point - 0.7).abs() < 1e-12);
/// ```
#[must_use]
pub fn wilson_interval(successes: u32, n: u32, confidence: f64) -> Interval {
    if n == 0 {
        return Interval::UNINFORMED;
    }
    let n_f = f64::from(n);
    let p = f64::from(successes.min(n)) / n_f;
    let z = z_score(1.0 - (1.0 - confidence) / 2.0);
    let z2 = z * z;

    let denom = 1.0 + z2 / n_f;
    let center = (p + z2 / (2.0 * n_f)) / denom;
    let half = z * (p * (1.0 - p) / n_f + z2 / (4.0 * n_f * n_f)).sqrt() / denom;

    Interval {
        lower: (center - half).max(0.0),
        upper: (center + half).min(1.0),
        point: p,
    }
}

/// True once the interval is no wider than `target_width`.
#[must_use]
pub fn precision_met(interval: &Interval, target_width: f64) -> bool {
    interval.width() <= target_width
}

// =============================================================================
// Sample summaries
// =============================================================================

/// Mean and range of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Sample size.
    pub count: usize,
    /// Arithmetic mean.
    pub mean: f64,
    /// Smallest value.
    pub min: u32,
    /// Largest value.
    pub max: u32,
}

impl Summary {
    /// Summarizes `samples`; `None` if empty.
    #[must_use]
    pub fn of(samples: &[u32]) -> Option<Self> {
        let min = samples.iter().copied().min()?;
        let max = samples.iter().copied().max()?;
        let total: u64 = samples.iter().map(|&s| u64::from(s)).sum();
        #[allow(clippy::cast_precision_loss)]
        let mean = total as f64 / samples.len() as f64;
        Some(Self {
            count: samples.len(),
            mean,
            min,
            max,
        })
    }
}

// =============================================================================
// Difficulty
// =============================================================================

/// Encounter difficulty band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    /// Comfortable win, negligible risk.
    Easy,
    /// Likely win, some risk.
    Medium,
    /// Coin flip or real risk of a wipe.
    Hard,
    /// Likely loss or high wipe risk.
    Deadly,
}

impl Difficulty {
    /// One band harder, saturating at [`Difficulty::Deadly`].
    #[must_use]
    pub const fn harder(self) -> Self {
        match self {
            Self::Easy => Self::Medium,
            Self::Medium => Self::Hard,
            Self::Hard | Self::Deadly => Self::Deadly,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Easy => "Easy",
            Self::Medium => "Medium",
            Self::Hard => "Hard",
            Self::Deadly => "Deadly",
        };
        f.write_str(s)
    }
}

/// Batch statistics fed to [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultyInput {
    /// Party win proportion.
    pub win_rate: f64,
    /// Total-party-kill proportion.
    pub tpk_rate: f64,
    /// Mean rounds per encounter.
    pub avg_rounds: f64,
    /// Party members.
    pub party_size: u32,
}

/// Thresholds for a baseline party, with a per-member shift.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DifficultyThresholds {
    /// Party size the win thresholds are written for.
    pub baseline_party: u32,
    /// Win rate at or above which an encounter can be Easy.
    pub easy_win: f64,
    /// Win rate at or above which an encounter can be Medium.
    pub medium_win: f64,
    /// Win rate below which an encounter is Deadly.
    pub hard_win: f64,
    /// Added to every win threshold per member above the baseline.
    pub per_member_shift: f64,
    /// TPK rate from which an encounter is at least Medium.
    pub medium_tpk: f64,
    /// TPK rate from which an encounter is at least Hard.
    pub hard_tpk: f64,
    /// TPK rate above which an encounter is Deadly.
    pub deadly_tpk: f64,
    /// Mean rounds from which the Easy bar rises.
    pub long_fight_rounds: f64,
    /// How far the Easy bar rises for long fights.
    pub long_fight_penalty: f64,
    /// Mean rounds from which the result is bumped one band harder.
    pub very_long_fight_rounds: f64,
}

impl Default for DifficultyThresholds {
    fn default() -> Self {
        Self {
            baseline_party: 4,
            easy_win: 0.80,
            medium_win: 0.60,
            hard_win: 0.40,
            per_member_shift: 0.025,
            medium_tpk: 0.05,
            hard_tpk: 0.15,
            deadly_tpk: 0.30,
            long_fight_rounds: 10.0,
            long_fight_penalty: 0.05,
            very_long_fight_rounds: 15.0,
        }
    }
}

impl DifficultyThresholds {
    /// Classifies by the worse of win rate and TPK risk.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a rate is outside [0, 1] or the party is
    /// empty.
    pub fn classify(&self, input: &DifficultyInput) -> Result<Difficulty, ConfigError> {
        for (name, value) in [("win_rate", input.win_rate), ("tpk_rate", input.tpk_rate)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::NotAProportion { name, value });
            }
        }
        if input.party_size == 0 {
            return Err(ConfigError::NotPositive("party_size"));
        }

        let shift =
            (f64::from(input.party_size) - f64::from(self.baseline_party)) * self.per_member_shift;
        let easy_win = self.easy_win + shift;
        let medium_win = self.medium_win + shift;
        let hard_win = self.hard_win + shift;
        let penalty = if input.avg_rounds >= self.long_fight_rounds {
            self.long_fight_penalty
        } else {
            0.0
        };

        let (win, tpk) = (input.win_rate, input.tpk_rate);
        let band = if win < hard_win || tpk > self.deadly_tpk {
            Difficulty::Deadly
        } else if win < medium_win || tpk >= self.hard_tpk {
            Difficulty::Hard
        } else if win < easy_win + penalty || tpk >= self.medium_tpk {
            Difficulty::Medium
        } else {
            Difficulty::Easy
        };

        Ok(if input.avg_rounds >= self.very_long_fight_rounds {
            band.harder()
        } else {
            band
        })
    }
}

/// Classifies with the default thresholds.
///
/// # Errors
///
/// See [`DifficultyThresholds::classify`].
///
/// # Example
///
/// ```
/// use skirmish_core::stats::{classify, Difficulty, DifficultyInput};
///
/// let input = DifficultyInput { win_rate: 0.85, tpk_rate: 0.03, avg_rounds: 4.0, party_size: 4 };
/// assert_eq!(classify(&input).unwrap(), Difficulty::Easy);
/// ```
pub fn classify(input: &DifficultyInput) -> Result<Difficulty, ConfigError> {
    DifficultyThresholds::default().classify(input)
}
