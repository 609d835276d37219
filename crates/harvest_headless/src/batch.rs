//! Batch runner for scenario statistics.
//!
//! Runs many seeds of one scenario in parallel using rayon and aggregates
//! their metrics.

use crate::metrics::{BatchSummary, GameMetrics, MetricsCollector, Outcome};
use crate::scenario::{Scenario, ScenarioError};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

/// File name of the saved results inside [`BatchConfig::output_dir`].
pub const RESULTS_FILE: &str = "batch_results.json";

/// Error type for batch runs.
#[derive(Error, Debug)]
pub enum BatchError {
    /// The scenario could not be loaded.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    /// The results could not be written.
    #[error("Failed to save batch results: {0}")]
    Save(#[from] std::io::Error),
}

/// Configuration for a batch run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Built-in scenario name or RON path
    pub scenario: String,
    /// Number of games to run
    pub game_count: u32,
    /// Maximum parallel games (0 = use rayon default)
    pub parallel_games: u32,
    /// Directory to save [`RESULTS_FILE`] into. Nothing is written without one.
    pub output_dir: Option<PathBuf>,
    /// Starting seed for deterministic runs
    pub seed_start: u64,
    /// Maximum ticks per game (0 = the scenario's own length)
    pub max_ticks: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            scenario: "siege".to_string(),
            game_count: 100,
            parallel_games: 0,
            output_dir: None,
            seed_start: 0,
            max_ticks: 0,
        }
    }
}

impl BatchConfig {
    /// Create config for a specific scenario
    pub fn new(scenario: &str, game_count: u32) -> Self {
        Self {
            scenario: scenario.to_string(),
            game_count,
            ..Default::default()
        }
    }

    /// Set output directory
    pub fn with_output(mut self, dir: PathBuf) -> Self {
        self.output_dir = Some(dir);
        self
    }

    /// Set seed start
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Set tick limit
    pub fn with_max_ticks(mut self, ticks: u64) -> Self {
        self.max_ticks = ticks;
        self
    }
}

/// Results from a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used
    pub config: BatchConfig,
    /// Individual game metrics
    pub games: Vec<GameMetrics>,
    /// Aggregate summary
    pub summary: BatchSummary,
    /// Total runtime
    pub duration_seconds: f64,
}

impl BatchResults {
    /// Save results to JSON file
    pub fn save(&self, path: &std::path::Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from JSON file
    pub fn load(path: &std::path::Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// Progress tracking for batch runs
#[derive(Debug)]
pub struct BatchProgress {
    /// Total games
    pub total: u32,
    completed: AtomicU32,
    overruns: AtomicU32,
    start_time: Instant,
}

impl BatchProgress {
    /// Create new progress tracker
    pub fn new(total: u32) -> Self {
        Self {
            total,
            completed: AtomicU32::new(0),
            overruns: AtomicU32::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a completed game
    pub fn record_completion(&self, outcome: Outcome) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        if outcome == Outcome::Overrun {
            self.overruns.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get current completion count
    pub fn current(&self) -> u32 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Get completion percentage
    pub fn percentage(&self) -> f64 {
        self.current() as f64 / self.total.max(1) as f64 * 100.0
    }

    /// Get estimated time remaining
    pub fn eta(&self) -> Duration {
        let completed = self.current();
        if completed == 0 {
            return Duration::from_secs(0);
        }

        let elapsed = self.start_time.elapsed();
        let per_game = elapsed.as_secs_f64() / completed as f64;
        let remaining = self.total.saturating_sub(completed);
        Duration::from_secs_f64(per_game * remaining as f64)
    }

    /// Share of finished games in which every worker died
    pub fn overrun_rate(&self) -> f64 {
        let completed = self.current();
        if completed == 0 {
            return 0.0;
        }
        self.overruns.load(Ordering::Relaxed) as f64 / completed as f64
    }

    /// Display progress to stderr
    pub fn display(&self) {
        let eta = self.eta();
        eprintln!("╔════════════════════════════════════╗");
        eprintln!(
            "║ Batch Progress: {:>4}/{:<4} ({:>5.1}%) ║",
            self.current(),
            self.total,
            self.percentage()
        );
        eprintln!(
            "║ ETA: {:>28} ║",
            format!("{}m {}s", eta.as_secs() / 60, eta.as_secs() % 60)
        );
        eprintln!("║ Overrun so far: {:>17.1}% ║", self.overrun_rate() * 100.0);
        eprintln!("╚════════════════════════════════════╝");
    }
}

/// Run one seed of a scenario to completion.
///
/// Stops early once every worker is dead, or once the map is empty and
/// nothing is left in transit.
pub fn run_game(scenario: &Scenario, seed: u64, max_ticks: u64) -> GameMetrics {
    let limit = if max_ticks == 0 { scenario.ticks } else { max_ticks };
    let game_id = format!("game_{seed}");

    let mut run = scenario.start_with_seed(seed);
    let mut collector = MetricsCollector::new(&game_id, &scenario.name, seed);
    collector.start(&run.sim);
    let had_workers = !run.sim.workers().is_empty();

    let mut outcome = Outcome::TimeLimit;
    while run.sim.get_tick() < limit {
        let events = run.step();
        collector.record(run.sim.get_tick(), &events);

        if had_workers && run.sim.workers().is_empty() {
            outcome = Outcome::Overrun;
            break;
        }
        let in_transit = run.sim.workers().values().any(|w| w.carried() > 0);
        if run.sim.nodes().is_empty() && !in_transit && run.pending_waves() == 0 {
            outcome = Outcome::Exhausted;
            break;
        }
    }

    debug!(
        game = %game_id,
        ticks = run.sim.get_tick(),
        outcome = outcome.name(),
        "Game finished"
    );
    collector.finalize(&run.sim, outcome)
}

/// Run a batch of games, saving the results when an output directory is set.
pub fn run_batch(config: BatchConfig) -> Result<BatchResults, BatchError> {
    let scenario = Scenario::resolve(&config.scenario)?;
    let start = Instant::now();
    let progress = BatchProgress::new(config.game_count);

    info!(
        "Starting batch run: {} games of '{}'",
        config.game_count, scenario.name
    );

    // Configure thread pool if specified
    if config.parallel_games > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_games as usize)
            .build_global()
            .ok(); // Ignore if already set
    }

    let games: Vec<GameMetrics> = (0..config.game_count)
        .into_par_iter()
        .map(|i| {
            let seed = config.seed_start.wrapping_add(u64::from(i));
            let metrics = run_game(&scenario, seed, config.max_ticks);

            progress.record_completion(metrics.outcome);
            let completed = progress.current();
            if completed % 10 == 0 {
                debug!("Progress: {}/{}", completed, config.game_count);
            }
            if completed % 100 == 0 {
                progress.display();
            }
            metrics
        })
        .collect();

    let summary = BatchSummary::from_games(&games);
    let duration_seconds = start.elapsed().as_secs_f64();

    info!(
        "Batch complete: {} games in {:.1}s ({:.1} games/sec)",
        games.len(),
        duration_seconds,
        games.len() as f64 / duration_seconds.max(f64::EPSILON)
    );

    let results = BatchResults {
        config,
        games,
        summary,
        duration_seconds,
    };
    if let Some(dir) = &results.config.output_dir {
        let path = dir.join(RESULTS_FILE);
        results.save(&path)?;
        info!(path = %path.display(), "Batch results saved");
    }
    Ok(results)
}

/// Verify determinism by running the same seed several times in parallel.
pub fn verify_determinism(scenario: &Scenario, seed: u64, runs: u32) -> bool {
    let results: Vec<GameMetrics> = (0..runs)
        .into_par_iter()
        .map(|_| run_game(scenario, seed, 0))
        .collect();

    let Some(first) = results.first() else {
        return true;
    };
    results.iter().all(|r| {
        r.final_state_hash == first.final_state_hash
            && r.duration_ticks == first.duration_ticks
            && r.outcome == first.outcome
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{HostileWave, Point};
    use harvest_core::kinds::Tier;

    fn short_siege() -> Scenario {
        let mut scenario = Scenario::siege();
        scenario.ticks = 400;
        scenario
    }

    #[test]
    fn test_batch_config_default() {
        let config = BatchConfig::default();
        assert_eq!(config.game_count, 100);
        assert_eq!(config.scenario, "siege");
        assert_eq!(config.output_dir, None);
    }

    #[test]
    fn test_batch_config_builder() {
        let config = BatchConfig::new("custom_scenario", 500)
            .with_output(PathBuf::from("/tmp/results"))
            .with_seed(12345)
            .with_max_ticks(60);

        assert_eq!(config.scenario, "custom_scenario");
        assert_eq!(config.game_count, 500);
        assert_eq!(config.seed_start, 12345);
        assert_eq!(config.max_ticks, 60);
        assert_eq!(config.output_dir, Some(PathBuf::from("/tmp/results")));
    }

    #[test]
    fn test_progress_tracking() {
        let progress = BatchProgress::new(100);
        assert_eq!(progress.current(), 0);
        assert!(progress.percentage().abs() < f64::EPSILON);

        progress.record_completion(Outcome::Overrun);
        progress.record_completion(Outcome::TimeLimit);
        progress.record_completion(Outcome::TimeLimit);

        assert_eq!(progress.current(), 3);
        assert!((progress.overrun_rate() - 0.333).abs() < 0.01);
    }

    #[test]
    fn test_run_game_respects_limit() {
        let metrics = run_game(&short_siege(), 3, 120);
        assert_eq!(metrics.duration_ticks, 120);
        assert_eq!(metrics.outcome, Outcome::TimeLimit);
        assert_eq!(metrics.seed, 3);
        assert!(metrics.initial_resources > 0);
    }

    #[test]
    fn test_empty_map_is_exhausted_immediately() {
        let scenario = Scenario::empty(harvest_core::config::SimConfig::default());
        let metrics = run_game(&scenario, 0, 100);
        assert_eq!(metrics.outcome, Outcome::Exhausted);
        assert_eq!(metrics.duration_ticks, 1);
    }

    #[test]
    fn test_overrun_stops_early() {
        let mut scenario = Scenario::empty(harvest_core::config::SimConfig::default());
        scenario.bases = vec![Point::new(0.0, 0.0)];
        scenario.hostiles = vec![HostileWave {
            x: 0.0,
            y: 0.0,
            kind: Some(Tier::Fast),
            count: 8,
            at_tick: 0,
        }];
        scenario.ticks = 20_000;

        let metrics = run_game(&scenario, 1, 0);
        assert_eq!(metrics.outcome, Outcome::Overrun);
        assert!(metrics.duration_ticks < 20_000);
        assert_eq!(metrics.workers_alive, 0);
        assert_eq!(metrics.workers_lost, metrics.workers_start);
    }

    #[test]
    fn test_run_batch_small() {
        let config = BatchConfig::new("siege", 6).with_max_ticks(200);
        let results = run_batch(config).expect("built-in scenario");

        assert_eq!(results.games.len(), 6);
        assert_eq!(results.summary.total_games, 6);
        let seeds: Vec<u64> = results.games.iter().map(|g| g.seed).collect();
        assert_eq!(seeds, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_unknown_scenario_fails() {
        let result = run_batch(BatchConfig::new("/no/such/scenario.ron", 1));
        assert!(matches!(
            result,
            Err(BatchError::Scenario(ScenarioError::FileNotFound(_)))
        ));
    }

    #[test]
    fn test_verify_determinism() {
        assert!(verify_determinism(&short_siege(), 12345, 4));
    }

    #[test]
    fn test_run_batch_writes_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("nested");
        let config = BatchConfig::new("siege", 2)
            .with_max_ticks(30)
            .with_output(output.clone());
        let results = run_batch(config).expect("built-in scenario");

        let loaded = BatchResults::load(&output.join(RESULTS_FILE)).unwrap();
        assert_eq!(loaded.games, results.games);
        assert_eq!(loaded.config.output_dir, Some(output));
    }

    #[test]
    fn test_batch_results_save_load() {
        let config = BatchConfig::new("siege", 3).with_max_ticks(50);
        let results = run_batch(config).expect("built-in scenario");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");

        results.save(&path).unwrap();
        assert!(path.exists());

        let loaded = BatchResults::load(&path).unwrap();
        assert_eq!(loaded.games, results.games);
        assert_eq!(loaded.config.scenario, "siege");
    }
}
