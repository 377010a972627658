//! Monte Carlo batch engine with progressive sampling.
//!
//! Runs the same encounter many times, each on its own random stream, and
//! stops once the win-rate confidence interval is narrow enough or the run
//! cap is reached.
//!
//! # Sampling schedule
//!
//! 1. Run `min_runs` encounters.
//! 2. Recompute the Wilson interval. Stop if its width is at or below
//!    `target_width`, or if `max_runs` encounters have run.
//! 3. Otherwise run another `check_interval` encounters (fewer if that
//!    would pass `max_runs`) and go to 2.
//!
//! # Determinism
//!
//! Run `i` always uses stream `i` of `base_seed`, so a batch is reproducible
//! and the parallel schedule produces exactly the sequential result: each
//! chunk is executed with rayon, collected in run order, then merged.

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::combatant::{Combatant, CombatantId};
use crate::decision::DecisionSource;
use crate::dice::SeededRoller;
use crate::error::{ConfigError, SimError};
use crate::event::NullSink;
use crate::simulator::{EncounterReport, Simulator};
use crate::state::Outcome;
use crate::stats::{precision_met, wilson_interval, Difficulty, DifficultyInput, Interval, Summary};

// =============================================================================
// Configuration
// =============================================================================

/// Progressive sampling parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloConfig {
    /// Runs before the first interval check.
    pub min_runs: u32,
    /// Hard cap on runs.
    pub max_runs: u32,
    /// Runs between interval checks.
    pub check_interval: u32,
    /// Stop once the interval is at most this wide (0.10 is about ±5%).
    pub target_width: f64,
    /// Two-sided confidence level of the interval.
    pub confidence_level: f64,
    /// Seed of the per-run streams.
    pub base_seed: u64,
    /// Execute each chunk on the rayon pool.
    pub parallel: bool,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            min_runs: 100,
            max_runs: 5000,
            check_interval: 100,
            target_width: 0.10,
            confidence_level: 0.95,
            base_seed: 0,
            parallel: false,
        }
    }
}

impl MonteCarloConfig {
    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a zero count, `min_runs > max_runs`, or a
    /// width or confidence level outside (0, 1).
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("min_runs", self.min_runs),
            ("max_runs", self.max_runs),
            ("check_interval", self.check_interval),
        ] {
            if value == 0 {
                return Err(ConfigError::NotPositive(name));
            }
        }
        if self.min_runs > self.max_runs {
            return Err(ConfigError::MinAboveMax {
                min: self.min_runs,
                max: self.max_runs,
            });
        }
        for (name, value) in [
            ("target_width", self.target_width),
            ("confidence_level", self.confidence_level),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(ConfigError::OutOfUnitRange { name, value });
            }
        }
        Ok(())
    }
}

// =============================================================================
// Progress and cancellation
// =============================================================================

/// Batch progress after a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Runs finished so far.
    pub completed: u32,
    /// Most runs the batch can take.
    pub planned_max: u32,
    /// Party wins so far.
    pub wins: u32,
}

/// Receives batch progress.
///
/// Runs are reported as each sampling chunk is merged into the result. With
/// [`MonteCarloConfig::parallel`] set, the reports for a chunk arrive together
/// once its last run finishes, still one per run and in run order.
pub trait ProgressSink {
    /// Called once per completed run, in run order.
    fn report(&mut self, progress: Progress);
}

impl<F: FnMut(Progress)> ProgressSink for F {
    fn report(&mut self, progress: Progress) {
        self(progress);
    }
}

/// Ignores progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _progress: Progress) {}
}

/// Cooperative cancellation, checked between sampling chunks.
#[derive(Debug, Default)]
pub struct CancelFlag(AtomicBool);

impl CancelFlag {
    /// Flag that is not raised.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// True once raised.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Results
// =============================================================================

/// Aggregate of completed runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    /// Completed runs.
    pub runs: u32,
    /// Party victories.
    pub wins: u32,
    /// Party defeats.
    pub losses: u32,
    /// Timeouts.
    pub draws: u32,
    /// Runs ending with every party member at 0 vitality.
    pub tpks: u32,
    /// Round counts per outcome, in run order.
    pub rounds: BTreeMap<Outcome, Vec<u32>>,
    /// Damage dealt per combatant.
    pub damage_by_combatant: BTreeMap<CombatantId, u64>,
    /// Damage dealt per combatant, per action name.
    pub damage_by_action: BTreeMap<CombatantId, BTreeMap<String, u64>>,
    /// Win-rate interval at the last check.
    pub interval: Interval,
    /// The interval reached the target width.
    pub precision_met: bool,
    /// Stopped early by cancellation.
    pub partial: bool,
}

impl Default for BatchResult {
    fn default() -> Self {
        Self {
            runs: 0,
            wins: 0,
            losses: 0,
            draws: 0,
            tpks: 0,
            rounds: BTreeMap::new(),
            damage_by_combatant: BTreeMap::new(),
            damage_by_action: BTreeMap::new(),
            interval: Interval::UNINFORMED,
            precision_met: false,
            partial: false,
        }
    }
}

impl BatchResult {
    /// Adds one completed run.
    pub fn absorb(&mut self, report: &EncounterReport) {
        self.runs += 1;
        match report.outcome {
            Outcome::PartyVictory => self.wins += 1,
            Outcome::PartyDefeat => self.losses += 1,
            Outcome::Timeout => self.draws += 1,
        }
        if report.tpk {
            self.tpks += 1;
        }
        self.rounds.entry(report.outcome).or_default().push(report.rounds);
        for record in &report.damage {
            let amount = u64::from(record.amount);
            *self.damage_by_combatant.entry(record.source.clone()).or_default() += amount;
            *self
                .damage_by_action
                .entry(record.source.clone())
                .or_default()
                .entry(record.action.clone())
                .or_default() += amount;
        }
    }

    /// Combines two disjoint sets of runs.
    ///
    /// Counts and damage add, round samples concatenate (`self` first). The
    /// interval is left for the caller to recompute with [`Self::refresh`].
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.runs += other.runs;
        self.wins += other.wins;
        self.losses += other.losses;
        self.draws += other.draws;
        self.tpks += other.tpks;
        for (outcome, samples) in other.rounds {
            self.rounds.entry(outcome).or_default().extend(samples);
        }
        for (id, amount) in other.damage_by_combatant {
            *self.damage_by_combatant.entry(id).or_default() += amount;
        }
        for (id, actions) in other.damage_by_action {
            let mine = self.damage_by_action.entry(id).or_default();
            for (action, amount) in actions {
                *mine.entry(action).or_default() += amount;
            }
        }
        self.partial |= other.partial;
        self
    }

    /// Recomputes the interval and the precision flag.
    pub fn refresh(&mut self, confidence_level: f64, target_width: f64) {
        self.interval = wilson_interval(self.wins, self.runs, confidence_level);
        self.precision_met = self.runs > 0 && precision_met(&self.interval, target_width);
    }

    /// Party win proportion; 0 before any run.
    #[must_use]
    pub fn win_rate(&self) -> f64 {
        ratio(self.wins, self.runs)
    }

    /// TPK proportion; 0 before any run.
    #[must_use]
    pub fn tpk_rate(&self) -> f64 {
        ratio(self.tpks, self.runs)
    }

    /// Mean rounds over every run; 0 before any run.
    #[must_use]
    pub fn avg_rounds(&self) -> f64 {
        let all: Vec<u32> = self.rounds.values().flatten().copied().collect();
        Summary::of(&all).map_or(0.0, |s| s.mean)
    }

    /// Mean rounds over runs with `outcome`.
    #[must_use]
    pub fn avg_rounds_for(&self, outcome: Outcome) -> Option<f64> {
        self.rounds_summary(outcome).map(|s| s.mean)
    }

    /// Round summary for runs with `outcome`.
    #[must_use]
    pub fn rounds_summary(&self, outcome: Outcome) -> Option<Summary> {
        self.rounds.get(&outcome).and_then(|r| Summary::of(r))
    }

    /// Damage dealt by everyone.
    #[must_use]
    pub fn total_damage(&self) -> u64 {
        self.damage_by_combatant.values().sum()
    }

    /// Difficulty band for a party of `party_size`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotPositive`] if `party_size` is zero.
    pub fn difficulty(&self, party_size: u32) -> Result<Difficulty, ConfigError> {
        crate::stats::classify(&DifficultyInput {
            win_rate: self.win_rate(),
            tpk_rate: self.tpk_rate(),
            avg_rounds: self.avg_rounds(),
            party_size,
        })
    }
}

fn ratio(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        f64::from(part) / f64::from(whole)
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Batch runner over one simulator.
#[derive(Debug, Clone)]
pub struct MonteCarlo {
    config: MonteCarloConfig,
    simulator: Simulator,
}

impl MonteCarlo {
    /// Creates a batch runner.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is invalid.
    pub fn new(config: MonteCarloConfig, simulator: Simulator) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, simulator })
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &MonteCarloConfig {
        &self.config
    }

    /// Simulator in use.
    #[must_use]
    pub const fn simulator(&self) -> &Simulator {
        &self.simulator
    }

    /// Runs one encounter from the batch.
    ///
    /// # Errors
    ///
    /// Returns [`SimError`] if the templates are invalid.
    pub fn run_one<D, F>(
        &self,
        templates: &[Combatant],
        decider: &D,
        fallback: &F,
        index: u32,
    ) -> Result<EncounterReport, SimError>
    where
        D: DecisionSource + ?Sized,
        F: DecisionSource + ?Sized,
    {
        let mut rng = SeededRoller::with_stream(self.config.base_seed, u64::from(index));
        self.simulator
            .run_with_roller(templates, decider, fallback, &mut rng, &mut NullSink)
    }

    /// Runs a batch to precision or the run cap.
    ///
    /// # Errors
    ///
    /// Returns [`SimError`] if the templates are invalid.
    pub fn run<D, F, P>(
        &self,
        templates: &[Combatant],
        decider: &D,
        fallback: &F,
        progress: &mut P,
    ) -> Result<BatchResult, SimError>
    where
        D: DecisionSource + ?Sized,
        F: DecisionSource + ?Sized,
        P: ProgressSink + ?Sized,
    {
        self.run_with_cancel(templates, decider, fallback, progress, &CancelFlag::new())
    }

    /// Like [`Self::run`], stopping at the next chunk boundary once `cancel`
    /// is raised. A cancelled result is marked `partial`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError`] if the templates are invalid.
    pub fn run_with_cancel<D, F, P>(
        &self,
        templates: &[Combatant],
        decider: &D,
        fallback: &F,
        progress: &mut P,
        cancel: &CancelFlag,
    ) -> Result<BatchResult, SimError>
    where
        D: DecisionSource + ?Sized,
        F: DecisionSource + ?Sized,
        P: ProgressSink + ?Sized,
    {
        let cfg = &self.config;
        tracing::info!(
            target: "skirmish::batch",
            min_runs = cfg.min_runs,
            max_runs = cfg.max_runs,
            target_width = cfg.target_width,
            parallel = cfg.parallel,
            "batch started"
        );

        let mut result = BatchResult::default();
        let mut chunk = cfg.min_runs;
        loop {
            if cancel.is_cancelled() {
                result.partial = true;
                tracing::info!(target: "skirmish::batch", runs = result.runs, "batch cancelled");
                break;
            }

            let start = result.runs;
            let reports = self.run_chunk(templates, decider, fallback, start..start + chunk)?;
            for report in &reports {
                result.absorb(report);
                progress.report(Progress {
                    completed: result.runs,
                    planned_max: cfg.max_runs,
                    wins: result.wins,
                });
            }
            result.refresh(cfg.confidence_level, cfg.target_width);
            tracing::info!(
                target: "skirmish::batch",
                runs = result.runs,
                win_rate = result.win_rate(),
                width = result.interval.width(),
                "checkpoint"
            );

            if result.precision_met || result.runs >= cfg.max_runs {
                break;
            }
            chunk = cfg.check_interval.min(cfg.max_runs - result.runs);
        }

        if result.precision_met {
            tracing::info!(target: "skirmish::batch", runs = result.runs, "precision met");
        } else {
            tracing::info!(
                target: "skirmish::batch",
                runs = result.runs,
                width = result.interval.width(),
                "precision not met"
            );
        }
        Ok(result)
    }

    fn run_chunk<D, F>(
        &self,
        templates: &[Combatant],
        decider: &D,
        fallback: &F,
        runs: Range<u32>,
    ) -> Result<Vec<EncounterReport>, SimError>
    where
        D: DecisionSource + ?Sized,
        F: DecisionSource + ?Sized,
    {
        if self.config.parallel {
            runs.into_par_iter()
                .map(|i| self.run_one(templates, decider, fallback, i))
                .collect()
        } else {
            runs.map(|i| self.run_one(templates, decider, fallback, i))
                .collect()
        }
    }
}
