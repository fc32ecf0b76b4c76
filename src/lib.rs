//! `lifecycles` - deterministic barrier-driven lifecycle orchestration
//!
//! Managed entities request phase transitions (awake, enable, disable,
//! destroy) at any time. The [`lifecycle::LifecycleEngine`] runs them in
//! fixed-order barrier passes with per-entity fault isolation. The
//! [`host`] module drives the engine from YAML scenario files.

pub mod cli;
pub mod config;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod observability;
