//! Runtime glue that wires configuration, telemetry, and the periodic runner.

pub mod config;
pub mod runner;
pub mod telemetry;
