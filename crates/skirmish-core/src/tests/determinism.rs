//! Determinism verification tests.
//!
//! These tests verify that encounters and batches produce identical results
//! when:
//! - Started with the same seed
//! - Given identical templates and decision sources
//! - Run sequentially or on the rayon pool
//!
//! This is critical for:
//! - Reproducing a surprising balance result
//! - Comparing two encounter variants on the same dice

use skirmish_grid::Terrain;

use crate::decision::Heuristic;
use crate::event::{EventLog, TracingSink};
use crate::monte_carlo::{MonteCarlo, MonteCarloConfig, NoProgress};
use crate::simulator::{Simulator, SimulatorConfig};

use super::helpers::{init_tracing, skirmish};

fn simulator() -> Simulator {
    Simulator::new(SimulatorConfig::default(), Terrain::open()).unwrap()
}

fn fixed_batch(runs: u32, parallel: bool) -> MonteCarlo {
    let config = MonteCarloConfig {
        min_runs: runs,
        max_runs: runs,
        check_interval: runs,
        base_seed: 42,
        parallel,
        ..MonteCarloConfig::default()
    };
    MonteCarlo::new(config, simulator()).unwrap()
}

// =============================================================================
// Single Encounters
// =============================================================================

/// Same seed, same event stream.
#[test]
fn same_seed_same_events() {
    let sim = simulator();
    let heuristic = Heuristic::default();

    let mut first = EventLog::new();
    let a = sim
        .run_encounter(&skirmish(), &heuristic, &heuristic, 7, &mut first)
        .unwrap();
    let mut second = EventLog::new();
    let b = sim
        .run_encounter(&skirmish(), &heuristic, &heuristic, 7, &mut second)
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(a.outcome, b.outcome);
    assert_eq!(a.damage, b.damage);
    assert_eq!(a.final_state, b.final_state);
}

/// Observing through tracing draws no dice of its own.
#[test]
fn tracing_sink_matches_event_log() {
    init_tracing();
    let sim = simulator();
    let heuristic = Heuristic::default();

    let mut log = EventLog::new();
    let logged = sim
        .run_encounter(&skirmish(), &heuristic, &heuristic, 11, &mut log)
        .unwrap();
    let traced = sim
        .run_encounter(&skirmish(), &heuristic, &heuristic, 11, &mut TracingSink)
        .unwrap();

    assert_eq!(logged.final_state, traced.final_state);
    assert_eq!(logged.damage, traced.damage);
}

/// Different seeds diverge somewhere across a handful of runs.
#[test]
fn different_seeds_diverge() {
    let sim = simulator();
    let heuristic = Heuristic::default();
    let logs: Vec<EventLog> = (0..10)
        .map(|seed| {
            let mut log = EventLog::new();
            sim.run_encounter(&skirmish(), &heuristic, &heuristic, seed, &mut log)
                .unwrap();
            log
        })
        .collect();
    assert!(logs.windows(2).any(|w| w[0] != w[1]));
}

/// A batch run can be replayed on its own from its index.
#[test]
fn batch_run_replays_from_index() {
    let mc = fixed_batch(10, false);
    let heuristic = Heuristic::default();
    let a = mc.run_one(&skirmish(), &heuristic, &heuristic, 5).unwrap();
    let b = mc.run_one(&skirmish(), &heuristic, &heuristic, 5).unwrap();
    assert_eq!(a.final_state, b.final_state);
    assert_eq!(a.rounds, b.rounds);
}

// =============================================================================
// Batches
// =============================================================================

/// 1,000 encounters reproduce the same win count with the same seed.
#[test]
fn thousand_runs_same_win_count() {
    let heuristic = Heuristic::default();
    let first = fixed_batch(1000, false)
        .run(&skirmish(), &heuristic, &heuristic, &mut NoProgress)
        .unwrap();
    let second = fixed_batch(1000, false)
        .run(&skirmish(), &heuristic, &heuristic, &mut NoProgress)
        .unwrap();

    assert_eq!(first.runs, 1000);
    assert_eq!(first.wins, second.wins);
    assert_eq!(first, second);
}

/// The parallel schedule merges to exactly the sequential result.
#[test]
fn parallel_matches_sequential() {
    let heuristic = Heuristic::default();
    let sequential = fixed_batch(200, false)
        .run(&skirmish(), &heuristic, &heuristic, &mut NoProgress)
        .unwrap();
    let parallel = fixed_batch(200, true)
        .run(&skirmish(), &heuristic, &heuristic, &mut NoProgress)
        .unwrap();
    assert_eq!(sequential, parallel);
}

/// Progressive sampling stops at the same checkpoint on a replay.
#[test]
fn progressive_stop_is_reproducible() {
    let config = MonteCarloConfig {
        min_runs: 50,
        max_runs: 1000,
        check_interval: 50,
        target_width: 0.2,
        base_seed: 9,
        ..MonteCarloConfig::default()
    };
    let heuristic = Heuristic::default();
    let run = || {
        MonteCarlo::new(config.clone(), simulator())
            .unwrap()
            .run(&skirmish(), &heuristic, &heuristic, &mut NoProgress)
            .unwrap()
    };
    let (a, b) = (run(), run());
    assert_eq!(a.runs, b.runs);
    assert_eq!(a.runs % 50, 0);
    assert_eq!(a.interval, b.interval);
}
