//! JSON protocol for headless simulation control.
//!
//! The headless runner communicates via JSON lines (one JSON object per line):
//!
//! **Input (stdin):** Commands from the controller
//! **Output (stdout):** Responses and state snapshots
//!
//! # Protocol Flow
//!
//! 1. Runner starts, outputs `{"type":"ready","version":"1.0","tick":0}`
//! 2. Controller sends commands as JSON lines
//! 3. Runner answers every command with exactly one response line
//! 4. `quit` is answered with `bye` and ends the session
//!
//! Entity ids are opaque 64-bit numbers. An id stays unique for the whole
//! session, so a stale id is never mistaken for a newer entity.
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"1.0","tick":0}
//! -> {"cmd":"create_base","x":0.0,"y":0.0}
//! <- {"type":"ack","cmd":"create_base","id":4294967297}
//! -> {"cmd":"spawn_hostile","x":20.0,"y":20.0,"kind":"fast"}
//! <- {"type":"ack","cmd":"spawn_hostile","id":4294967297}
//! -> {"cmd":"tick","count":60}
//! <- {"type":"ticked","tick":60,"delivered":0,...}
//! -> {"cmd":"query"}
//! <- {"type":"state","tick":60,...}
//! ```

use harvest_core::kinds::Tier;
use harvest_core::simulation::{Simulation, TickEvents};
use serde::{Deserialize, Serialize};
use slotmap::{Key, KeyData};

// ============================================================================
// Input Commands (Controller -> Runner)
// ============================================================================

/// Commands that can be sent to the headless runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Advance simulation by N ticks (default: 1).
    Tick {
        #[serde(default = "default_tick_count")]
        count: u32,
    },

    /// Query current state without advancing time.
    Query,

    /// Current state hash (for determinism verification).
    Hash,

    /// Create a base with its starting workers and nodes.
    CreateBase { x: f64, y: f64 },

    /// Remove a base. Its units stay.
    RemoveBase { base: u64 },

    /// Create a resource node.
    CreateResource { x: f64, y: f64, amount: u32 },

    /// Remove every resource node.
    ResetResources,

    /// Spawn a worker for a base at an exact spot.
    SpawnWorker { base: u64, x: f64, y: f64 },

    /// Spawn a hostile. `kind` is `basic`, `fast` or `tank`.
    SpawnHostile {
        x: f64,
        y: f64,
        #[serde(default)]
        kind: Option<String>,
    },

    /// Spawn a defender on top of its base.
    SpawnDefender {
        base: u64,
        #[serde(default)]
        kind: Option<String>,
    },

    /// Buy a worker from the stockpile.
    PurchaseWorker { base: u64 },

    /// Buy a defender from the stockpile.
    PurchaseDefender {
        base: u64,
        #[serde(default)]
        kind: Option<String>,
    },

    /// Send a worker to a specific node.
    Assign { worker: u64, node: u64 },

    /// Send a worker (or, without one, every idle worker) to the nearest node.
    AssignNearest {
        #[serde(default)]
        worker: Option<u64>,
    },

    /// Select or deselect a worker.
    Select { worker: u64, selected: bool },

    /// Remove a worker.
    RemoveWorker { worker: u64 },

    /// Remove a hostile.
    RemoveHostile { hostile: u64 },

    /// Remove a defender.
    RemoveDefender { defender: u64 },

    /// Set the tier used for hostiles spawned without one.
    SetDefaultHostile { kind: String },

    /// Quit the session.
    Quit,
}

fn default_tick_count() -> u32 {
    1
}

// ============================================================================
// Output Responses (Runner -> Controller)
// ============================================================================

/// Responses sent from the headless runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Runner is ready to accept commands.
    Ready { version: String, tick: u64 },

    /// Acknowledgment of a command.
    Ack {
        cmd: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
    },

    /// Error processing a command.
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cmd: Option<String>,
    },

    /// Summary of the ticks just run.
    Ticked(TickSummary),

    /// Full state snapshot.
    State(StateSnapshot),

    /// State hash for determinism verification.
    StateHash { tick: u64, hash: u64 },

    /// Goodbye message before shutdown.
    Bye,
}

// ============================================================================
// State Types
// ============================================================================

/// Aggregated events over one `tick` command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSummary {
    pub tick: u64,
    pub now_ms: u64,
    pub delivered: u64,
    pub attacks: u32,
    pub worker_deaths: Vec<u64>,
    pub hostile_deaths: Vec<u64>,
    pub depleted_nodes: Vec<u64>,
}

impl TickSummary {
    /// Fold one tick's events into the summary.
    pub fn absorb(&mut self, events: &TickEvents) {
        self.delivered += events.delivered();
        self.attacks += events.attacks.len() as u32;
        self.worker_deaths
            .extend(events.worker_deaths.iter().map(|id| wire_id(*id)));
        self.hostile_deaths
            .extend(events.hostile_deaths.iter().map(|id| wire_id(*id)));
        self.depleted_nodes
            .extend(events.depleted_nodes.iter().map(|id| wire_id(*id)));
    }
}

/// Position on the ground plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Health state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthState {
    pub current: u32,
    pub max: u32,
}

/// Resource totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankState {
    pub collected_total: u64,
    pub stockpile: u64,
}

/// A base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseState {
    pub id: u64,
    pub position: Position,
}

/// A worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerView {
    pub id: u64,
    pub base: u64,
    pub position: Position,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<u64>,
    pub carried: u32,
    pub health: HealthState,
    pub selected: bool,
}

/// A hostile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostileView {
    pub id: u64,
    pub kind: String,
    pub position: Position,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthState>,
}

/// A defender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefenderView {
    pub id: u64,
    pub kind: String,
    pub base: u64,
    pub position: Position,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<u64>,
    pub health: HealthState,
}

/// A resource node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeView {
    pub index: usize,
    pub id: u64,
    pub position: Position,
    pub amount: u32,
}

/// Everything a controller can observe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub tick: u64,
    pub now_ms: u64,
    pub bank: BankState,
    pub bases: Vec<BaseState>,
    pub workers: Vec<WorkerView>,
    pub hostiles: Vec<HostileView>,
    pub defenders: Vec<DefenderView>,
    pub nodes: Vec<NodeView>,
    pub hash: u64,
}

impl StateSnapshot {
    /// Capture the observable state of `sim`.
    pub fn capture(sim: &Simulation) -> Self {
        use harvest_core::combat::{Combatant, Health};
        use harvest_core::math::Vec2Fixed;

        fn position(at: Vec2Fixed) -> Position {
            Position {
                x: at.x.to_num(),
                y: at.y.to_num(),
            }
        }

        fn health(pool: &Health) -> HealthState {
            HealthState {
                current: pool.current(),
                max: pool.max(),
            }
        }

        let summary = sim.resource_summary();
        Self {
            tick: sim.get_tick(),
            now_ms: sim.now_ms(),
            bank: BankState {
                collected_total: sim.bank().collected_total,
                stockpile: sim.bank().stockpile,
            },
            bases: sim
                .bases()
                .iter()
                .map(|(id, base)| BaseState {
                    id: wire_id(id),
                    position: position(base.position),
                })
                .collect(),
            workers: sim
                .workers()
                .iter()
                .map(|(id, worker)| WorkerView {
                    id: wire_id(id),
                    base: wire_id(worker.home_base),
                    position: position(worker.position),
                    state: format!("{:?}", worker.state()),
                    target: worker.target().map(wire_id),
                    carried: worker.carried(),
                    health: health(worker.health_pool()),
                    selected: worker.is_selected(),
                })
                .collect(),
            hostiles: sim
                .hostiles()
                .iter()
                .map(|(id, hostile)| HostileView {
                    id: wire_id(id),
                    kind: hostile.kind.name().to_string(),
                    position: position(hostile.position),
                    state: format!("{:?}", hostile.state()),
                    target: hostile.target().map(wire_id),
                    health: hostile.health().map(health),
                })
                .collect(),
            defenders: sim
                .defenders()
                .iter()
                .map(|(id, defender)| DefenderView {
                    id: wire_id(id),
                    kind: defender.kind.name().to_string(),
                    base: wire_id(defender.home_base),
                    position: position(defender.position),
                    state: format!("{:?}", defender.state()),
                    target: defender.target().map(wire_id),
                    health: health(defender.health_pool()),
                })
                .collect(),
            nodes: summary
                .iter()
                .filter_map(|entry| {
                    let node = sim.nodes().get(entry.id)?;
                    Some(NodeView {
                        index: entry.index,
                        id: wire_id(entry.id),
                        position: position(node.position),
                        amount: entry.amount,
                    })
                })
                .collect(),
            hash: sim.state_hash(),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// External id for a simulation key.
pub fn wire_id<K: Key>(id: K) -> u64 {
    id.data().as_ffi()
}

/// Simulation key for an external id.
pub fn from_wire<K: Key>(id: u64) -> K {
    K::from(KeyData::from_ffi(id))
}

/// Parse an optional tier name.
pub fn parse_tier(kind: Option<&str>) -> Result<Option<Tier>, String> {
    match kind {
        None => Ok(None),
        Some(name) => Tier::from_name(name)
            .map(Some)
            .ok_or_else(|| format!("Unknown kind: {name}")),
    }
}

impl Response {
    /// Create a ready response.
    pub fn ready(tick: u64) -> Self {
        Self::Ready {
            version: "1.0".to_string(),
            tick,
        }
    }

    /// Create an acknowledgment.
    pub fn ack(cmd: &str) -> Self {
        Self::Ack {
            cmd: cmd.to_string(),
            id: None,
        }
    }

    /// Create an acknowledgment naming a created entity.
    pub fn created(cmd: &str, id: u64) -> Self {
        Self::Ack {
            cmd: cmd.to_string(),
            id: Some(id),
        }
    }

    /// Create an error response.
    pub fn error(message: impl Into<String>, cmd: Option<&str>) -> Self {
        Self::Error {
            message: message.into(),
            cmd: cmd.map(String::from),
        }
    }

    /// Serialize to JSON line (with newline).
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"Serialization failed: {e}"}}"#)
        });
        json.push('\n');
        json
    }
}

impl Command {
    /// Parse from a JSON line.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Get command name for acknowledgment.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tick { .. } => "tick",
            Self::Query => "query",
            Self::Hash => "hash",
            Self::CreateBase { .. } => "create_base",
            Self::RemoveBase { .. } => "remove_base",
            Self::CreateResource { .. } => "create_resource",
            Self::ResetResources => "reset_resources",
            Self::SpawnWorker { .. } => "spawn_worker",
            Self::SpawnHostile { .. } => "spawn_hostile",
            Self::SpawnDefender { .. } => "spawn_defender",
            Self::PurchaseWorker { .. } => "purchase_worker",
            Self::PurchaseDefender { .. } => "purchase_defender",
            Self::Assign { .. } => "assign",
            Self::AssignNearest { .. } => "assign_nearest",
            Self::Select { .. } => "select",
            Self::RemoveWorker { .. } => "remove_worker",
            Self::RemoveHostile { .. } => "remove_hostile",
            Self::RemoveDefender { .. } => "remove_defender",
            Self::SetDefaultHostile { .. } => "set_default_hostile",
            Self::Quit => "quit",
        }
    }
}
