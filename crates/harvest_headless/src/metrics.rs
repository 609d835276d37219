//! Game metrics collection for batch analysis.
//!
//! A [`MetricsCollector`] watches the [`TickEvents`] of one run and produces
//! a [`GameMetrics`] record. [`BatchSummary`] aggregates many records.

use std::collections::HashMap;

use harvest_core::combat::{Attacker, Victim};
use harvest_core::simulation::{Simulation, TickEvents};
use serde::{Deserialize, Serialize};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The tick limit was reached.
    #[default]
    TimeLimit,
    /// Every node was emptied and every load delivered.
    Exhausted,
    /// Every worker was killed.
    Overrun,
}

impl Outcome {
    /// Short name used in summaries.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::TimeLimit => "time_limit",
            Self::Exhausted => "exhausted",
            Self::Overrun => "overrun",
        }
    }
}

/// Complete metrics for a single run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameMetrics {
    /// Unique game identifier.
    pub game_id: String,
    /// Scenario name.
    pub scenario: String,
    /// Random seed used.
    pub seed: u64,
    /// Total run length in ticks.
    pub duration_ticks: u64,
    /// How the run ended.
    pub outcome: Outcome,

    // === Economy ===
    /// Resources on the map after setup.
    pub initial_resources: u64,
    /// Resources delivered over the run.
    pub collected_total: u64,
    /// Unspent stockpile at the end.
    pub stockpile: u64,
    /// Resources still in nodes at the end.
    pub resources_remaining: u64,
    /// Nodes emptied during the run.
    pub depleted_nodes: u32,

    // === Combat ===
    /// Workers present after setup.
    pub workers_start: u32,
    /// Workers alive at the end.
    pub workers_alive: u32,
    /// Workers killed.
    pub workers_lost: u32,
    /// Hostiles killed by defenders.
    pub hostiles_killed: u32,
    /// Attacks that landed.
    pub attacks: u32,
    /// Damage dealt to workers.
    pub damage_taken: u64,
    /// Damage dealt by defenders.
    pub damage_dealt: u64,
    /// Tick of the first worker death.
    pub first_worker_loss_tick: Option<u64>,

    /// Timed events log.
    pub events: Vec<TimedEvent>,
    /// Final simulation state hash (for determinism validation).
    pub final_state_hash: u64,
}

impl GameMetrics {
    /// Create a new game metrics instance.
    #[must_use]
    pub fn new(game_id: impl Into<String>, scenario: impl Into<String>, seed: u64) -> Self {
        Self {
            game_id: game_id.into(),
            scenario: scenario.into(),
            seed,
            ..Default::default()
        }
    }

    /// Delivered share of the starting resources.
    #[must_use]
    pub fn harvest_efficiency(&self) -> f64 {
        if self.initial_resources == 0 {
            return 0.0;
        }
        self.collected_total as f64 / self.initial_resources as f64
    }

    /// Whether any worker survived.
    #[must_use]
    pub const fn survived(&self) -> bool {
        self.workers_alive > 0
    }
}

/// A timed event during the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedEvent {
    /// Tick when the event occurred.
    pub tick: u64,
    /// Type of event.
    pub event_type: EventType,
}

/// Types of events that can be recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    /// First attack on a worker.
    FirstAttack,
    /// A worker was killed.
    WorkerKilled,
    /// A hostile was killed.
    HostileKilled,
    /// A node was emptied.
    ResourcesDepleted,
}

/// Summary statistics across multiple runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Total runs.
    pub total_games: u32,
    /// Runs per outcome.
    pub outcomes: HashMap<String, u32>,
    /// Share of runs with at least one surviving worker.
    pub survival_rate: f64,
    /// Average run length in ticks.
    pub avg_duration_ticks: f64,
    /// Shortest run.
    pub min_duration_ticks: u64,
    /// Longest run.
    pub max_duration_ticks: u64,
    /// Average delivered resources.
    pub avg_collected: f64,
    /// Average delivered share of the starting resources.
    pub avg_efficiency: f64,
    /// Average workers killed.
    pub avg_workers_lost: f64,
    /// Average tick of the first worker death, over runs that had one.
    pub avg_first_loss_tick: Option<f64>,
}

impl BatchSummary {
    /// Calculate summary from a list of game metrics.
    #[must_use]
    pub fn from_games(games: &[GameMetrics]) -> Self {
        if games.is_empty() {
            return Self::default();
        }

        let count = games.len() as f64;
        let mut summary = Self {
            total_games: games.len() as u32,
            min_duration_ticks: u64::MAX,
            ..Default::default()
        };

        let mut duration_sum = 0u64;
        let mut collected_sum = 0u64;
        let mut efficiency_sum = 0.0;
        let mut lost_sum = 0u64;
        let mut survivors = 0u32;
        let mut first_losses = Vec::new();

        for game in games {
            duration_sum += game.duration_ticks;
            summary.min_duration_ticks = summary.min_duration_ticks.min(game.duration_ticks);
            summary.max_duration_ticks = summary.max_duration_ticks.max(game.duration_ticks);

            *summary
                .outcomes
                .entry(game.outcome.name().to_string())
                .or_default() += 1;

            collected_sum += game.collected_total;
            efficiency_sum += game.harvest_efficiency();
            lost_sum += u64::from(game.workers_lost);
            if game.survived() {
                survivors += 1;
            }
            if let Some(tick) = game.first_worker_loss_tick {
                first_losses.push(tick);
            }
        }

        summary.avg_duration_ticks = duration_sum as f64 / count;
        summary.avg_collected = collected_sum as f64 / count;
        summary.avg_efficiency = efficiency_sum / count;
        summary.avg_workers_lost = lost_sum as f64 / count;
        summary.survival_rate = f64::from(survivors) / count;
        if !first_losses.is_empty() {
            summary.avg_first_loss_tick =
                Some(first_losses.iter().sum::<u64>() as f64 / first_losses.len() as f64);
        }

        summary
    }

    /// Whether at least `threshold` of the runs kept a worker alive.
    #[must_use]
    pub fn is_sustainable(&self, threshold: f64) -> bool {
        self.total_games > 0 && self.survival_rate >= threshold
    }
}

/// Metrics collector that tracks events during a run.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    /// Current game metrics.
    metrics: GameMetrics,
}

impl MetricsCollector {
    /// Create a new metrics collector.
    #[must_use]
    pub fn new(game_id: &str, scenario: &str, seed: u64) -> Self {
        Self {
            metrics: GameMetrics::new(game_id, scenario, seed),
        }
    }

    /// Record the starting state.
    pub fn start(&mut self, sim: &Simulation) {
        self.metrics.initial_resources = sim.nodes().total_available();
        self.metrics.workers_start = sim.workers().len() as u32;
    }

    /// Fold in the events of the tick that just ran.
    pub fn record(&mut self, tick: u64, events: &TickEvents) {
        let metrics = &mut self.metrics;

        for attack in &events.attacks {
            if metrics.attacks == 0 {
                metrics.events.push(TimedEvent {
                    tick,
                    event_type: EventType::FirstAttack,
                });
            }
            metrics.attacks += 1;
            if matches!(attack.victim, Victim::Worker(_)) {
                metrics.damage_taken += u64::from(attack.damage);
            }
            if matches!(attack.attacker, Attacker::Defender(_)) {
                metrics.damage_dealt += u64::from(attack.damage);
            }
        }

        for _ in &events.worker_deaths {
            metrics.workers_lost += 1;
            metrics.first_worker_loss_tick.get_or_insert(tick);
            metrics.events.push(TimedEvent {
                tick,
                event_type: EventType::WorkerKilled,
            });
        }

        for _ in &events.hostile_deaths {
            metrics.hostiles_killed += 1;
            metrics.events.push(TimedEvent {
                tick,
                event_type: EventType::HostileKilled,
            });
        }

        for _ in &events.depleted_nodes {
            metrics.depleted_nodes += 1;
            metrics.events.push(TimedEvent {
                tick,
                event_type: EventType::ResourcesDepleted,
            });
        }
    }

    /// Finalize the run with its outcome.
    #[must_use]
    pub fn finalize(mut self, sim: &Simulation, outcome: Outcome) -> GameMetrics {
        let metrics = &mut self.metrics;
        metrics.duration_ticks = sim.get_tick();
        metrics.outcome = outcome;
        metrics.collected_total = sim.bank().collected_total;
        metrics.stockpile = sim.bank().stockpile;
        metrics.resources_remaining = sim.nodes().total_available();
        metrics.workers_alive = sim.workers().len() as u32;
        metrics.final_state_hash = sim.state_hash();
        self.metrics
    }

    /// Get current metrics (for inspection during the run).
    #[must_use]
    pub fn current(&self) -> &GameMetrics {
        &self.metrics
    }
}
