//! Test module for determinism and integration tests.
//!
//! This module provides cross-module tests for the encounter engine:
//! - **Determinism tests**: Verify same seed produces identical results
//! - **Integration tests**: Full turns with scripted dice and decisions
//! - **Helper functions**: Utilities for test setup
//!
//! # Test Structure
//!
//! - `determinism.rs`: Tests that verify deterministic execution
//! - `integration.rs`: End-to-end tests of the turn loop
//! - `helpers.rs`: Test setup utilities and factory functions

mod determinism;
mod helpers;

// Re-export for convenience
pub use helpers::*;
