//! Headless session runner.
//!
//! Reads one [`Command`] per line, applies it to the simulation and writes
//! exactly one [`Response`] line back.

use std::io::{self, BufRead, Write};

use harvest_core::config::SimConfig;
use harvest_core::math::Vec2Fixed;
use harvest_core::registry::{BaseId, DefenderId, HostileId, NodeId, WorkerId};
use harvest_core::simulation::Simulation;

use crate::protocol::{
    from_wire, parse_tier, wire_id, Command, Response, StateSnapshot, TickSummary,
};
use crate::scenario::{Scenario, ScenarioRun};

/// Headless runner configuration.
#[derive(Debug, Clone, Default)]
pub struct HeadlessConfig {
    /// Output state after every tick (vs only on query).
    pub auto_state_output: bool,
    /// Scenario to load on startup. Without one the map starts empty.
    pub scenario: Option<Scenario>,
}

/// Headless runner for externally controlled sessions.
#[derive(Debug)]
pub struct HeadlessRunner {
    config: HeadlessConfig,
    run: ScenarioRun,
}

impl HeadlessRunner {
    /// Create a new headless runner on an empty map.
    pub fn new() -> Self {
        Self::with_config(HeadlessConfig::default())
    }

    /// Create a runner with custom configuration.
    pub fn with_config(config: HeadlessConfig) -> Self {
        let run = match &config.scenario {
            Some(scenario) => scenario.start(),
            None => Scenario::empty(SimConfig::default()).start(),
        };
        Self { config, run }
    }

    /// The simulation being driven.
    pub fn simulation(&self) -> &Simulation {
        &self.run.sim
    }

    /// Run the session on stdin/stdout.
    pub fn run_stdio(&mut self) -> io::Result<()> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        self.run(stdin.lock(), stdout.lock())
    }

    /// Run the session until `quit` or end of input.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> io::Result<()> {
        output.write_all(Response::ready(self.run.sim.get_tick()).to_json_line().as_bytes())?;
        output.flush()?;

        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let response = match Command::from_json(line) {
                Ok(Command::Quit) => {
                    output.write_all(Response::Bye.to_json_line().as_bytes())?;
                    output.flush()?;
                    tracing::info!(tick = self.run.sim.get_tick(), "Session ended");
                    return Ok(());
                }
                Ok(cmd) => self.handle(cmd),
                Err(e) => Response::error(format!("Parse error: {e}"), None),
            };

            output.write_all(response.to_json_line().as_bytes())?;
            output.flush()?;
        }

        tracing::info!(tick = self.run.sim.get_tick(), "Input closed");
        Ok(())
    }

    /// Apply one command and build its response.
    pub fn handle(&mut self, cmd: Command) -> Response {
        let name = cmd.name();
        tracing::debug!(cmd = name, "Processing command");
        match self.apply(cmd) {
            Ok(response) => response,
            Err(message) => {
                tracing::debug!(cmd = name, %message, "Command rejected");
                Response::error(message, Some(name))
            }
        }
    }

    fn apply(&mut self, cmd: Command) -> Result<Response, String> {
        let name = cmd.name();

        if let Command::Tick { count } = cmd {
            let mut summary = TickSummary::default();
            for _ in 0..count {
                let events = self.run.step();
                summary.absorb(&events);
            }
            let sim = &self.run.sim;
            if self.config.auto_state_output {
                return Ok(Response::State(StateSnapshot::capture(sim)));
            }
            summary.tick = sim.get_tick();
            summary.now_ms = sim.now_ms();
            return Ok(Response::Ticked(summary));
        }

        let sim = &mut self.run.sim;
        let response = match cmd {
            Command::Tick { .. } => Response::ack(name),

            Command::Query => Response::State(StateSnapshot::capture(sim)),

            Command::Hash => Response::StateHash {
                tick: sim.get_tick(),
                hash: sim.state_hash(),
            },

            Command::CreateBase { x, y } => {
                let id = sim.create_base(point(x, y)?);
                Response::created(name, wire_id(id))
            }

            Command::RemoveBase { base } => {
                require(sim.remove_base(from_wire::<BaseId>(base)), "base", base)?;
                Response::ack(name)
            }

            Command::CreateResource { x, y, amount } => {
                let id = sim
                    .create_resource(point(x, y)?, amount)
                    .ok_or_else(|| "Amount must be positive".to_string())?;
                Response::created(name, wire_id(id))
            }

            Command::ResetResources => {
                sim.reset_resources();
                Response::ack(name)
            }

            Command::SpawnWorker { base, x, y } => {
                let id = sim
                    .spawn_worker(from_wire::<BaseId>(base), point(x, y)?)
                    .ok_or_else(|| unknown("base", base))?;
                Response::created(name, wire_id(id))
            }

            Command::SpawnHostile { x, y, kind } => {
                let kind = parse_tier(kind.as_deref())?;
                let id = sim.spawn_hostile(point(x, y)?, kind);
                Response::created(name, wire_id(id))
            }

            Command::SpawnDefender { base, kind } => {
                let kind = parse_tier(kind.as_deref())?.unwrap_or_default();
                let base_id = from_wire::<BaseId>(base);
                let at = sim
                    .bases()
                    .get(base_id)
                    .map(|b| b.position)
                    .ok_or_else(|| unknown("base", base))?;
                let id = sim
                    .spawn_defender(base_id, kind, at)
                    .ok_or_else(|| unknown("base", base))?;
                Response::created(name, wire_id(id))
            }

            Command::PurchaseWorker { base } => {
                let id = sim
                    .purchase_worker(from_wire::<BaseId>(base))
                    .ok_or_else(|| "Purchase rejected".to_string())?;
                Response::created(name, wire_id(id))
            }

            Command::PurchaseDefender { base, kind } => {
                let kind = parse_tier(kind.as_deref())?.unwrap_or_default();
                let id = sim
                    .purchase_defender(from_wire::<BaseId>(base), kind)
                    .ok_or_else(|| "Purchase rejected".to_string())?;
                Response::created(name, wire_id(id))
            }

            Command::Assign { worker, node } => {
                let worker_id = from_wire::<WorkerId>(worker);
                if !sim.assign_to_resource(worker_id, from_wire::<NodeId>(node)) {
                    return Err(format!("Cannot assign worker {worker} to node {node}"));
                }
                Response::ack(name)
            }

            Command::AssignNearest { worker: Some(worker) } => {
                if !sim.assign_to_nearest(from_wire::<WorkerId>(worker)) {
                    return Err(format!("No node available for worker {worker}"));
                }
                Response::ack(name)
            }

            Command::AssignNearest { worker: None } => {
                sim.assign_idle_to_nearest();
                Response::ack(name)
            }

            Command::Select { worker, selected } => {
                require(
                    sim.select_worker(from_wire::<WorkerId>(worker), selected),
                    "worker",
                    worker,
                )?;
                Response::ack(name)
            }

            Command::RemoveWorker { worker } => {
                require(sim.remove_worker(from_wire::<WorkerId>(worker)), "worker", worker)?;
                Response::ack(name)
            }

            Command::RemoveHostile { hostile } => {
                require(sim.remove_hostile(from_wire::<HostileId>(hostile)), "hostile", hostile)?;
                Response::ack(name)
            }

            Command::RemoveDefender { defender } => {
                require(
                    sim.remove_defender(from_wire::<DefenderId>(defender)),
                    "defender",
                    defender,
                )?;
                Response::ack(name)
            }

            Command::SetDefaultHostile { kind } => {
                let kind = parse_tier(Some(kind.as_str()))?.unwrap_or_default();
                sim.set_default_hostile_kind(kind);
                Response::ack(name)
            }

            Command::Quit => Response::Bye,
        };

        Ok(response)
    }
}

impl Default for HeadlessRunner {
    fn default() -> Self {
        Self::new()
    }
}

fn point(x: f64, y: f64) -> Result<Vec2Fixed, String> {
    Vec2Fixed::checked_from_f64(x, y).ok_or_else(|| "Coordinate out of range".to_string())
}

fn unknown(what: &str, id: u64) -> String {
    format!("Unknown {what}: {id}")
}

fn require(found: bool, what: &str, id: u64) -> Result<(), String> {
    if found {
        Ok(())
    } else {
        Err(unknown(what, id))
    }
}
