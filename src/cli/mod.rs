//! Command-line interface
//!
//! Argument definitions and command handlers for the `lifecycles` binary.

pub mod args;
pub mod commands;
