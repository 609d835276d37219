//! # Harvest Core
//!
//! Deterministic simulation core for the harvest swarm.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering (presentation goes through [`visual::VisualLayer`])
//! - No IO
//! - No system randomness
//! - No floating-point state (positions are fixed-point)
//!
//! Workers shuttle resources from depletable nodes to their base, hostiles
//! hunt the workers, and defenders guard the bases. One [`simulation::Simulation`]
//! owns every entity and advances them in a fixed order each tick.
//!
//! ## Crate Structure
//!
//! - [`registry`] - Ordered entity storage with generational ids
//! - [`economy`] - Resource nodes and the resource bank
//! - [`worker`], [`hostile`], [`defender`] - Per-unit state machines
//! - [`combat`] - Damage resolution and attack cooldowns
//! - [`spawn`] - Bases and spawn placement
//! - [`simulation`] - Core simulation loop
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod combat;
pub mod config;
pub mod defender;
pub mod economy;
pub mod error;
pub mod hostile;
pub mod kinds;
pub mod math;
pub mod registry;
pub mod simulation;
pub mod spawn;
pub mod visual;
pub mod worker;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::combat::{AttackReport, Attacker, Combatant, DamageOutcome, Health, Victim};
    pub use crate::config::SimConfig;
    pub use crate::defender::{Defender, DefenderState};
    pub use crate::economy::{NodeSummary, ResourceBank, ResourceNode, ResourceRegistry};
    pub use crate::error::{Result, SimError};
    pub use crate::hostile::{Hostile, HostileState};
    pub use crate::kinds::{Tier, UnitStats};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::registry::{BaseId, DefenderId, HostileId, NodeId, Registry, WorkerId};
    pub use crate::simulation::{Simulation, TickEvents};
    pub use crate::spawn::Base;
    pub use crate::visual::{NullVisuals, VisualHandle, VisualKind, VisualLayer};
    pub use crate::worker::{Worker, WorkerEvent, WorkerState};
}
