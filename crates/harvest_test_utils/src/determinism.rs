//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation
//! produces identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! Replays, headless verification and batch comparisons all assume a run
//! can be reproduced from its seed and inputs. Sources of non-determinism
//! include:
//!
//! - **Floating-point math**: Positions use fixed-point arithmetic via
//!   [`harvest_core::math::Fixed`]; floats only appear while placing spawns.
//!
//! - **HashMap iteration order**: Registries iterate in insertion order.
//!
//! - **System randomness**: Spawn jitter comes from the simulation's seeded
//!   generator.

use std::thread;

use harvest_core::simulation::Simulation;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial simulation state
/// * `step` - Function to advance simulation by one tick
/// * `hash` - Function to compute state hash
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run a simulation setup twice and compare the final state hashes.
pub fn verify_simulation_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |sim| {
            sim.tick();
        },
        |sim| sim.state_hash(),
    )
    .is_deterministic
}

/// Run `num_sims` simulations on scoped threads and collect their final hashes.
///
/// Each simulation is built and run on its own thread.
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn run_parallel_simulations<F>(
    setup_fn: F,
    num_sims: usize,
    num_ticks: u64,
) -> DeterminismResult
where
    F: Fn() -> Simulation + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    for _ in 0..num_ticks {
                        sim.tick();
                    }
                    sim.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("simulation thread panicked"))
            .collect()
    });

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks: num_ticks,
    }
}

/// Compare two simulation runs tick-by-tick, finding first divergence.
///
/// # Returns
///
/// `None` if simulations are deterministic, `Some(tick)` if they diverge
/// at that tick.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        sim1.tick();
        sim2.tick();

        if sim1.state_hash() != sim2.state_hash() {
            tracing::warn!(tick, "Simulations diverged");
            return Some(tick);
        }
    }

    None
}

/// Proptest strategies for simulation inputs.
pub mod strategies {
    use harvest_core::kinds::Tier;
    use harvest_core::math::{Fixed, Vec2Fixed};
    use harvest_core::simulation::Simulation;
    use proptest::prelude::*;

    /// Generate a fixed-point coordinate within a small battlefield.
    ///
    /// Range: -30 to 30 in steps of 1/4.
    pub fn arb_fixed_position() -> impl Strategy<Value = Fixed> {
        (-120i32..120i32).prop_map(|quarters| Fixed::from_num(quarters) / Fixed::from_num(4))
    }

    /// Generate a fixed-point 2D vector for positions.
    pub fn arb_vec2_position() -> impl Strategy<Value = Vec2Fixed> {
        (arb_fixed_position(), arb_fixed_position()).prop_map(|(x, y)| Vec2Fixed::new(x, y))
    }

    /// Generate a unit tier.
    pub fn arb_tier() -> impl Strategy<Value = Tier> {
        prop_oneof![Just(Tier::Basic), Just(Tier::Fast), Just(Tier::Tank)]
    }

    /// Generate a starting node amount.
    pub fn arb_amount() -> impl Strategy<Value = u32> {
        1u32..200
    }

    /// Generate a collection request size.
    pub fn arb_request() -> impl Strategy<Value = u32> {
        0u32..12
    }

    /// Generate health values.
    pub fn arb_health() -> impl Strategy<Value = u32> {
        1u32..50
    }

    /// Generate damage values.
    pub fn arb_damage() -> impl Strategy<Value = u32> {
        0u32..20
    }

    /// An externally driven input to a running simulation.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Action {
        /// Advance this many ticks.
        Tick(u8),
        /// Create a node.
        CreateResource(Vec2Fixed, u32),
        /// Spawn a hostile of the given tier.
        SpawnHostile(Vec2Fixed, Tier),
        /// Send idle workers to their nearest nodes.
        AssignIdle,
        /// Remove every node.
        ResetResources,
    }

    impl Action {
        /// Apply this action to `sim`.
        pub fn apply(&self, sim: &mut Simulation) {
            match self {
                Self::Tick(n) => {
                    for _ in 0..*n {
                        sim.tick();
                    }
                }
                Self::CreateResource(at, amount) => {
                    sim.create_resource(*at, *amount);
                }
                Self::SpawnHostile(at, tier) => {
                    sim.spawn_hostile(*at, Some(*tier));
                }
                Self::AssignIdle => {
                    sim.assign_idle_to_nearest();
                }
                Self::ResetResources => sim.reset_resources(),
            }
        }
    }

    /// Generate one action, weighted toward ticking.
    pub fn arb_action() -> impl Strategy<Value = Action> {
        prop_oneof![
            6 => (1u8..40).prop_map(Action::Tick),
            2 => (arb_vec2_position(), arb_amount())
                .prop_map(|(at, amount)| Action::CreateResource(at, amount)),
            1 => (arb_vec2_position(), arb_tier())
                .prop_map(|(at, tier)| Action::SpawnHostile(at, tier)),
            2 => Just(Action::AssignIdle),
            1 => Just(Action::ResetResources),
        ]
    }

    /// Generate a script of actions.
    pub fn arb_script(max_len: usize) -> impl Strategy<Value = Vec<Action>> {
        proptest::collection::vec(arb_action(), 0..max_len)
    }
}
