//! Scenario host
//!
//! A reference host for the engine: scripted entities built from a
//! scenario file, and the runner that executes the scenario's script.

pub mod entity;
pub mod runner;

pub use entity::{CallCounts, ScriptedEntity};
pub use runner::{ExpectationOutcome, RunSummary, Runner};
