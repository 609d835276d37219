//! Headless harvest simulation runner.
//!
//! This binary runs the simulation without graphics, controlled via JSON on
//! stdin/stdout. Designed for scripted controllers, CI testing, and
//! determinism checks.
//!
//! # Usage
//!
//! ```bash
//! # Interactive mode - read commands from stdin
//! cargo run -p harvest_headless
//!
//! # Interactive session on a scenario
//! cargo run -p harvest_headless -- run --scenario siege
//!
//! # Run many seeds and collect statistics
//! cargo run -p harvest_headless -- batch --scenario siege --count 500 --output results/
//!
//! # Check that a seed replays identically
//! cargo run -p harvest_headless -- verify --scenario scenarios/two_bases.ron --runs 5
//! ```
//!
//! # Protocol
//!
//! Input (stdin): JSON commands, one per line
//! Output (stdout): JSON responses, one per line
//! Logs (stderr): Debug information
//!
//! See the protocol module for command/response format.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use harvest_headless::{
    batch::{run_batch, verify_determinism, BatchConfig, RESULTS_FILE},
    runner::{HeadlessConfig, HeadlessRunner},
    scenario::Scenario,
};

#[derive(Parser)]
#[command(name = "harvest_headless")]
#[command(about = "Headless harvest simulation runner for scripted control and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an interactive session
    Run {
        /// Built-in scenario name or RON file to load
        #[arg(short, long)]
        scenario: Option<String>,

        /// Output state after every tick
        #[arg(long)]
        auto_state: bool,
    },

    /// Run many seeds of a scenario
    Batch {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "siege")]
        scenario: String,

        /// Number of games to run
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Maximum parallel games (0 = all cores)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// First seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Tick limit per game (0 = scenario length)
        #[arg(long, default_value = "0")]
        max_ticks: u64,
    },

    /// Verify that a seed produces identical results
    Verify {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "siege")]
        scenario: String,

        /// Seed to check
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of runs to compare
        #[arg(short, long, default_value = "3")]
        runs: u32,
    },

    /// Measure tick throughput
    Benchmark {
        /// Number of ticks to run
        #[arg(short, long, default_value = "10000")]
        ticks: u64,

        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "siege")]
        scenario: String,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for protocol)
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    match cli.command {
        Some(Commands::Run {
            scenario,
            auto_state,
        }) => cmd_run(scenario, auto_state),
        Some(Commands::Batch {
            scenario,
            count,
            parallel,
            output,
            seed,
            max_ticks,
        }) => cmd_batch(BatchConfig {
            scenario,
            game_count: count,
            parallel_games: parallel,
            output_dir: Some(output),
            seed_start: seed,
            max_ticks,
        }),
        Some(Commands::Verify {
            scenario,
            seed,
            runs,
        }) => cmd_verify(&scenario, seed, runs),
        Some(Commands::Benchmark { ticks, scenario }) => cmd_benchmark(ticks, &scenario),
        None => {
            // Default: interactive mode
            cmd_run(None, false);
        }
    }
}

fn load_scenario(name_or_path: &str) -> Scenario {
    match Scenario::resolve(name_or_path) {
        Ok(scenario) => scenario,
        Err(e) => {
            tracing::error!(error = %e, scenario = name_or_path, "Failed to load scenario");
            eprintln!("FATAL: {e}");
            std::process::exit(1);
        }
    }
}

/// Run a single interactive session
fn cmd_run(scenario: Option<String>, auto_state: bool) {
    tracing::info!("Starting interactive session");

    let config = HeadlessConfig {
        auto_state_output: auto_state,
        scenario: scenario.as_deref().map(load_scenario),
    };

    let mut runner = HeadlessRunner::with_config(config);
    if let Err(e) = runner.run_stdio() {
        tracing::error!(error = %e, "Session I/O failed");
        std::process::exit(1);
    }
}

/// Run a batch of seeds
fn cmd_batch(config: BatchConfig) {
    let batch_start = Instant::now();

    tracing::info!(
        scenario = %config.scenario,
        count = config.game_count,
        parallel = config.parallel_games,
        seed = config.seed_start,
        max_ticks = config.max_ticks,
        "Batch configuration"
    );

    let results = match run_batch(config) {
        Ok(results) => results,
        Err(e) => {
            tracing::error!(error = %e, "Batch failed");
            eprintln!("FATAL: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        games_completed = results.games.len(),
        total_duration_secs = format!("{:.1}", batch_start.elapsed().as_secs_f64()),
        "Batch execution finished"
    );

    // Print summary
    let summary = &results.summary;
    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATCH COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Games played: {}", summary.total_games);
    eprintln!(
        "Duration: {:.1} avg ({} min, {} max) ticks",
        summary.avg_duration_ticks, summary.min_duration_ticks, summary.max_duration_ticks
    );
    let mut outcomes: Vec<_> = summary.outcomes.iter().collect();
    outcomes.sort();
    for (outcome, games) in outcomes {
        eprintln!("  {outcome:<12} {games}");
    }
    eprintln!("Survival rate: {:.1}%", summary.survival_rate * 100.0);
    eprintln!(
        "Collected: {:.1} avg ({:.1}% of supply)",
        summary.avg_collected,
        summary.avg_efficiency * 100.0
    );
    eprintln!("Workers lost: {:.2} avg", summary.avg_workers_lost);
    if let Some(tick) = summary.avg_first_loss_tick {
        eprintln!("First loss: tick {tick:.0} avg");
    }
    if let Some(dir) = &results.config.output_dir {
        eprintln!("Results: {}", dir.join(RESULTS_FILE).display());
    }
}

/// Verify determinism
fn cmd_verify(scenario: &str, seed: u64, runs: u32) {
    tracing::info!(
        "Verifying determinism: {} with seed {} ({} runs)",
        scenario,
        seed,
        runs
    );

    let scenario = load_scenario(scenario);
    if verify_determinism(&scenario, seed, runs) {
        eprintln!("PASS: All {runs} runs produced identical results");
    } else {
        eprintln!("FAIL: Non-determinism detected!");
        std::process::exit(1);
    }
}

/// Run benchmark
fn cmd_benchmark(ticks: u64, scenario: &str) {
    tracing::info!("Running {} tick benchmark", ticks);

    let scenario = load_scenario(scenario);
    let mut run = scenario.start();

    eprintln!(
        "Starting benchmark with {} workers on {} nodes",
        run.sim.workers().len(),
        run.sim.nodes().len()
    );
    eprintln!("Running {ticks} ticks...");

    // Warmup
    for _ in 0..100 {
        run.step();
    }

    let start = Instant::now();
    for _ in 0..ticks {
        run.step();
    }
    let elapsed = start.elapsed();

    let tps = ticks as f64 / elapsed.as_secs_f64().max(f64::EPSILON);

    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BENCHMARK RESULTS");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Ticks: {ticks}");
    eprintln!("Duration: {:.3}s", elapsed.as_secs_f64());
    eprintln!("Ticks/second: {tps:.1}");
    eprintln!("ms/tick: {:.4}", elapsed.as_secs_f64() * 1000.0 / ticks.max(1) as f64);
    eprintln!("Final workers: {}", run.sim.workers().len());
    eprintln!("Collected: {}", run.sim.bank().collected_total);
    eprintln!("State hash: {:016x}", run.sim.state_hash());
}
