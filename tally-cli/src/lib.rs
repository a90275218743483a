//! Tally CLI library: argument parsing, command execution, and logging setup
//! shared by the `tally` binary and its tests.

pub mod args;
pub mod commands;
pub mod error;
pub mod telemetry;
