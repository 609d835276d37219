//! Headless runner for the harvest simulation.
//!
//! This crate drives a [`harvest_core`] simulation without graphics. It can
//! be controlled via JSON commands on stdin, with responses on stdout, or run
//! scenarios in bulk. This enables:
//!
//! - **Scripted control**: An external controller can play a session
//! - **CI verification**: Automated checks of behavior and determinism
//! - **Statistics**: Many seeds of a scenario aggregated into one summary
//!
//! # Protocol
//!
//! Communication uses JSON lines (one JSON object per line):
//!
//! - **stdin**: Commands from controller (tick, spawn_hostile, assign, etc.)
//! - **stdout**: Responses and state snapshots (JSON)
//! - **stderr**: Debug logs (human-readable)
//!
//! See [`protocol`] module for the full command/response format.
//!
//! # Example
//!
//! ```bash
//! # Run interactively
//! echo '{"cmd":"tick","count":60}' | cargo run -p harvest_headless
//!
//! # Run a scenario
//! cargo run -p harvest_headless -- run --scenario crates/harvest_headless/scenarios/two_bases.ron
//!
//! # Verify determinism
//! cargo run -p harvest_headless -- verify --scenario siege --runs 5
//! ```

pub mod batch;
pub mod metrics;
pub mod protocol;
pub mod runner;
pub mod scenario;

pub use batch::{run_batch, run_game, BatchConfig, BatchError, BatchResults};
pub use metrics::{BatchSummary, GameMetrics, MetricsCollector, Outcome};
pub use protocol::{Command, Response, StateSnapshot};
pub use runner::{HeadlessConfig, HeadlessRunner};
pub use scenario::{Scenario, ScenarioError, ScenarioRun};
