//! Test fixtures and helpers.
//!
//! Pre-built simulations and a visual layer that records every call, for
//! consistent testing.

use std::cell::RefCell;
use std::rc::Rc;

use fixed::types::I32F32;
use harvest_core::config::SimConfig;
use harvest_core::math::Vec2Fixed;
use harvest_core::registry::{BaseId, NodeId, WorkerId};
use harvest_core::simulation::Simulation;
use harvest_core::visual::{VisualHandle, VisualKind, VisualLayer};

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Integer position shorthand.
#[must_use]
pub fn pos(x: i32, y: i32) -> Vec2Fixed {
    Vec2Fixed::from_ints(x, y)
}

/// One call received by [`RecordingVisuals`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualCall {
    /// A proxy was created.
    Create {
        /// Handle given out.
        handle: VisualHandle,
        /// Requested kind.
        kind: VisualKind,
    },
    /// A proxy was released.
    Destroy(VisualHandle),
    /// Selection highlight toggled.
    Select(VisualHandle, bool),
    /// Attack flash.
    Pulse(VisualHandle),
}

/// Visual layer that records what the simulation asked of it.
///
/// Clones share one log, so a test can keep a clone after boxing the
/// original into a [`Simulation`].
#[derive(Debug, Clone, Default)]
pub struct RecordingVisuals {
    next: u64,
    log: Rc<RefCell<Vec<VisualCall>>>,
}

impl RecordingVisuals {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every recorded call.
    #[must_use]
    pub fn calls(&self) -> Vec<VisualCall> {
        self.log.borrow().clone()
    }

    /// Handles created and not yet destroyed.
    #[must_use]
    pub fn live_handles(&self) -> Vec<VisualHandle> {
        let mut live = Vec::new();
        for call in self.log.borrow().iter() {
            match *call {
                VisualCall::Create { handle, .. } => live.push(handle),
                VisualCall::Destroy(handle) => live.retain(|h| *h != handle),
                _ => {}
            }
        }
        live
    }

    /// How many times `handle` was destroyed.
    #[must_use]
    pub fn destroy_count(&self, handle: VisualHandle) -> usize {
        self.log
            .borrow()
            .iter()
            .filter(|call| **call == VisualCall::Destroy(handle))
            .count()
    }

    /// How many attack flashes were requested.
    #[must_use]
    pub fn pulse_count(&self) -> usize {
        self.log
            .borrow()
            .iter()
            .filter(|call| matches!(call, VisualCall::Pulse(_)))
            .count()
    }

    fn record(&self, call: VisualCall) {
        self.log.borrow_mut().push(call);
    }
}

impl VisualLayer for RecordingVisuals {
    fn create_visual(&mut self, kind: VisualKind, _position: Vec2Fixed) -> VisualHandle {
        let handle = VisualHandle(self.next);
        self.next += 1;
        self.record(VisualCall::Create { handle, kind });
        handle
    }

    fn destroy_visual(&mut self, handle: VisualHandle) {
        self.record(VisualCall::Destroy(handle));
    }

    fn set_visual_selected(&mut self, handle: VisualHandle, selected: bool) {
        self.record(VisualCall::Select(handle, selected));
    }

    fn pulse_visual(&mut self, handle: VisualHandle) {
        self.record(VisualCall::Pulse(handle));
    }
}

/// Simulation wired to a [`RecordingVisuals`], plus a handle on the log.
#[must_use]
pub fn recorded_simulation(config: SimConfig) -> (Simulation, RecordingVisuals) {
    let visuals = RecordingVisuals::new();
    let sim = Simulation::with_visuals(config, Box::new(visuals.clone()));
    (sim, visuals)
}

/// A base at `at` with no starting workers or nodes.
pub fn empty_base(sim: &mut Simulation, at: Vec2Fixed) -> BaseId {
    let base = sim.create_base(at);
    let starting: Vec<WorkerId> = sim
        .workers()
        .iter()
        .filter(|(_, w)| w.home_base == base)
        .map(|(id, _)| id)
        .collect();
    for id in starting {
        sim.remove_worker(id);
    }
    sim.reset_resources();
    base
}

/// One worker at the origin base assigned to a node `distance` units east.
///
/// Returns the simulation, the worker and the node.
#[must_use]
pub fn lone_harvester(distance: i32, amount: u32) -> (Simulation, WorkerId, NodeId) {
    let mut sim = Simulation::new();
    let base = empty_base(&mut sim, Vec2Fixed::ZERO);
    let worker = sim
        .spawn_worker(base, Vec2Fixed::ZERO)
        .expect("base was just created");
    let node = sim
        .create_resource(pos(distance, 0), amount)
        .expect("amount is positive");
    assert!(sim.assign_to_resource(worker, node));
    (sim, worker, node)
}

/// A base at the origin with its starting workers sent to the nearest nodes.
#[must_use]
pub fn busy_colony(seed: u64) -> Simulation {
    let mut sim = Simulation::with_config(SimConfig::default().with_seed(seed));
    sim.create_base(Vec2Fixed::ZERO);
    sim.assign_idle_to_nearest();
    sim
}
