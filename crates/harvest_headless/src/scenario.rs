//! Scenario loading and configuration.
//!
//! Scenarios define the starting layout for headless runs: bases, extra
//! resource nodes, defenders, timed hostile waves and the simulation config.
//!
//! # Example RON
//!
//! ```ron
//! Scenario(
//!     name: "Two bases",
//!     seed: 7,
//!     bases: [(x: 0.0, y: 0.0), (x: 14.0, y: 0.0)],
//!     hostiles: [(x: 20.0, y: 20.0, kind: Some(Fast), count: 3, at_tick: 300)],
//!     ticks: 3600,
//! )
//! ```

use std::path::Path;

use harvest_core::config::SimConfig;
use harvest_core::error::SimError;
use harvest_core::kinds::Tier;
use harvest_core::math::Vec2Fixed;
use harvest_core::registry::BaseId;
use harvest_core::simulation::{Simulation, TickEvents};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The embedded simulation config is unusable.
    #[error("Invalid scenario config: {0}")]
    InvalidConfig(#[from] SimError),
    /// A defender refers to a base that is not in the scenario.
    #[error("Defender {index} refers to missing base {base}")]
    UnknownBase {
        /// Position of the defender entry.
        index: usize,
        /// Base index it named.
        base: usize,
    },
    /// A position does not fit the simulation's coordinate range.
    #[error("{what} {index} is outside the coordinate range")]
    OutOfRange {
        /// Kind of entry (`base`, `resource node` or `hostile wave`).
        what: &'static str,
        /// Position of the entry in its list.
        index: usize,
    },
}

/// A point on the ground plane in world units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate.
    pub x: f32,
    /// Depth coordinate.
    pub y: f32,
}

impl Point {
    /// Create a point.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Convert to simulation coordinates, if they fit.
    #[must_use]
    pub fn to_fixed(self) -> Option<Vec2Fixed> {
        Vec2Fixed::checked_from_f64(f64::from(self.x), f64::from(self.y))
    }

    fn placed(self, what: &'static str) -> Vec2Fixed {
        self.to_fixed().unwrap_or_else(|| {
            tracing::warn!(what, x = self.x, y = self.y, "Position out of range, using origin");
            Vec2Fixed::ZERO
        })
    }
}

/// An extra resource node placed by the scenario.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeSetup {
    /// X coordinate.
    pub x: f32,
    /// Depth coordinate.
    pub y: f32,
    /// Starting amount.
    pub amount: u32,
}

impl NodeSetup {
    /// Where the node goes.
    #[must_use]
    pub const fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// A group of hostiles that appears at a given tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HostileWave {
    /// X coordinate.
    pub x: f32,
    /// Depth coordinate.
    pub y: f32,
    /// Tier, or the config default.
    #[serde(default)]
    pub kind: Option<Tier>,
    /// How many hostiles to spawn.
    #[serde(default = "default_count")]
    pub count: u32,
    /// Tick before which the wave appears.
    #[serde(default)]
    pub at_tick: u64,
}

impl HostileWave {
    /// Where the wave appears.
    #[must_use]
    pub const fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// A defender stationed at one of the scenario's bases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefenderSetup {
    /// Index into [`Scenario::bases`].
    pub base: usize,
    /// Defender tier.
    #[serde(default)]
    pub kind: Tier,
}

fn default_count() -> u32 {
    1
}

fn default_ticks() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

/// A complete scenario configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Placement seed, overrides `config.seed`.
    #[serde(default)]
    pub seed: u64,
    /// Base positions. Each base brings its own workers and nodes.
    pub bases: Vec<Point>,
    /// Additional resource nodes.
    #[serde(default)]
    pub resource_nodes: Vec<NodeSetup>,
    /// Defenders present from the start.
    #[serde(default)]
    pub defenders: Vec<DefenderSetup>,
    /// Hostile waves.
    #[serde(default)]
    pub hostiles: Vec<HostileWave>,
    /// Send idle workers to the nearest node every tick.
    #[serde(default = "default_true")]
    pub auto_assign: bool,
    /// Length of a scripted run.
    #[serde(default = "default_ticks")]
    pub ticks: u64,
    /// Simulation tunables.
    #[serde(default)]
    pub config: SimConfig,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::siege()
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Check the config, positions and cross references.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        self.config.validate()?;
        let points = [
            ("base", self.bases.clone()),
            ("resource node", self.resource_nodes.iter().map(NodeSetup::point).collect()),
            ("hostile wave", self.hostiles.iter().map(HostileWave::point).collect()),
        ];
        for (what, list) in points {
            if let Some(index) = list.iter().position(|p| p.to_fixed().is_none()) {
                return Err(ScenarioError::OutOfRange { what, index });
            }
        }
        for (index, defender) in self.defenders.iter().enumerate() {
            if defender.base >= self.bases.len() {
                return Err(ScenarioError::UnknownBase {
                    index,
                    base: defender.base,
                });
            }
        }
        Ok(())
    }

    /// One base under attack by a trickle of hostiles.
    #[must_use]
    pub fn siege() -> Self {
        Self {
            name: "Siege".to_string(),
            description: "One colony harvesting while hostile waves close in".to_string(),
            seed: 12345,
            bases: vec![Point::new(0.0, 0.0)],
            resource_nodes: vec![
                NodeSetup {
                    x: 9.0,
                    y: -6.0,
                    amount: 120,
                },
                NodeSetup {
                    x: -10.0,
                    y: 7.0,
                    amount: 80,
                },
            ],
            defenders: Vec::new(),
            hostiles: vec![
                HostileWave {
                    x: 22.0,
                    y: 22.0,
                    kind: Some(Tier::Basic),
                    count: 1,
                    at_tick: 600,
                },
                HostileWave {
                    x: -22.0,
                    y: 18.0,
                    kind: Some(Tier::Fast),
                    count: 2,
                    at_tick: 1500,
                },
                HostileWave {
                    x: 0.0,
                    y: -25.0,
                    kind: Some(Tier::Tank),
                    count: 1,
                    at_tick: 2400,
                },
            ],
            auto_assign: true,
            ticks: 3600,
            config: SimConfig::default(),
        }
    }

    /// Nothing on the map. Used for protocol sessions that build their own.
    #[must_use]
    pub fn empty(config: SimConfig) -> Self {
        Self {
            name: "Empty".to_string(),
            description: String::new(),
            seed: config.seed,
            bases: Vec::new(),
            resource_nodes: Vec::new(),
            defenders: Vec::new(),
            hostiles: Vec::new(),
            auto_assign: false,
            ticks: default_ticks(),
            config,
        }
    }

    /// Look up a built-in scenario by name.
    #[must_use]
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "siege" => Some(Self::siege()),
            _ => None,
        }
    }

    /// Resolve a CLI argument: a built-in name or a RON file path.
    pub fn resolve(name_or_path: &str) -> Result<Self, ScenarioError> {
        match Self::builtin(name_or_path) {
            Some(scenario) => Ok(scenario),
            None => Self::load(name_or_path),
        }
    }

    /// Build the starting state with the scenario's own seed.
    #[must_use]
    pub fn start(&self) -> ScenarioRun {
        self.start_with_seed(self.seed)
    }

    /// Build the starting state with an explicit seed.
    #[must_use]
    pub fn start_with_seed(&self, seed: u64) -> ScenarioRun {
        let mut sim = Simulation::with_config(self.config.clone().with_seed(seed));

        let bases: Vec<BaseId> = self
            .bases
            .iter()
            .map(|point| sim.create_base(point.placed("base")))
            .collect();

        for node in &self.resource_nodes {
            sim.create_resource(node.point().placed("resource node"), node.amount);
        }

        for defender in &self.defenders {
            if let (Some(&base), Some(point)) =
                (bases.get(defender.base), self.bases.get(defender.base))
            {
                sim.spawn_defender(base, defender.kind, point.placed("base"));
            }
        }

        let mut waves = self.hostiles.clone();
        waves.sort_by_key(|wave| wave.at_tick);

        tracing::debug!(
            scenario = %self.name,
            seed,
            bases = bases.len(),
            waves = waves.len(),
            "Scenario started"
        );

        ScenarioRun {
            sim,
            bases,
            waves,
            next_wave: 0,
            auto_assign: self.auto_assign,
        }
    }
}

/// A simulation driven by a scenario's timed inputs.
#[derive(Debug)]
pub struct ScenarioRun {
    /// The simulation.
    pub sim: Simulation,
    /// Bases in scenario order.
    pub bases: Vec<BaseId>,
    waves: Vec<HostileWave>,
    next_wave: usize,
    auto_assign: bool,
}

impl ScenarioRun {
    /// Spawn due waves, hand out idle workers, then tick.
    pub fn step(&mut self) -> TickEvents {
        let tick = self.sim.get_tick();
        while let Some(wave) = self.waves.get(self.next_wave) {
            if wave.at_tick > tick {
                break;
            }
            let at = wave.point().placed("hostile wave");
            for _ in 0..wave.count {
                self.sim.spawn_hostile(at, wave.kind);
            }
            tracing::debug!(tick, count = wave.count, kind = ?wave.kind, "Hostile wave arrived");
            self.next_wave += 1;
        }

        if self.auto_assign {
            self.sim.assign_idle_to_nearest();
        }

        self.sim.tick()
    }

    /// Waves not yet spawned.
    #[must_use]
    pub fn pending_waves(&self) -> usize {
        self.waves.len() - self.next_wave
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_siege_is_valid() {
        let scenario = Scenario::siege();
        assert!(scenario.validate().is_ok());
        assert_eq!(scenario.bases.len(), 1);
    }

    #[test]
    fn test_minimal_ron_uses_defaults() {
        let scenario =
            Scenario::from_ron_str(r#"Scenario(name: "tiny", bases: [(x: 1.0, y: 2.0)])"#)
                .expect("valid scenario");
        assert_eq!(scenario.ticks, 3600);
        assert!(scenario.auto_assign);
        assert!(scenario.hostiles.is_empty());
        assert_eq!(scenario.config, SimConfig::default());
    }

    #[test]
    fn test_wave_defaults() {
        let scenario = Scenario::from_ron_str(
            r#"Scenario(name: "w", bases: [], hostiles: [(x: 1.0, y: 1.0)])"#,
        )
        .expect("valid scenario");
        let wave = scenario.hostiles[0];
        assert_eq!(wave.count, 1);
        assert_eq!(wave.at_tick, 0);
        assert_eq!(wave.kind, None);
    }

    #[test]
    fn test_defender_must_name_existing_base() {
        let err = Scenario::from_ron_str(
            r#"Scenario(name: "d", bases: [], defenders: [(base: 0, kind: Tank)])"#,
        )
        .unwrap_err();
        assert!(matches!(err, ScenarioError::UnknownBase { index: 0, base: 0 }));
    }

    #[test]
    fn test_out_of_range_positions_rejected() {
        let err = Scenario::from_ron_str(
            r#"Scenario(
                name: "far",
                bases: [(x: 0.0, y: 0.0)],
                resource_nodes: [(x: 1.0, y: 1.0, amount: 5), (x: 3e9, y: 0.0, amount: 5)],
            )"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ScenarioError::OutOfRange {
                what: "resource node",
                index: 1
            }
        ));

        let mut scenario = Scenario::siege();
        scenario.hostiles[0].y = f32::NEG_INFINITY;
        assert!(matches!(
            scenario.validate(),
            Err(ScenarioError::OutOfRange {
                what: "hostile wave",
                index: 0
            })
        ));
    }

    #[test]
    fn test_bad_config_rejected() {
        let err = Scenario::from_ron_str(
            r#"Scenario(name: "c", bases: [], config: (collection_cap: 0))"#,
        )
        .unwrap_err();
        assert!(matches!(err, ScenarioError::InvalidConfig(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = Scenario::load("/definitely/not/here.ron").unwrap_err();
        assert!(matches!(err, ScenarioError::FileNotFound(_)));
    }

    #[test]
    fn test_waves_arrive_on_schedule() {
        let mut scenario = Scenario::siege();
        scenario.hostiles = vec![HostileWave {
            x: 30.0,
            y: 30.0,
            kind: None,
            count: 2,
            at_tick: 5,
        }];
        let mut run = scenario.start();

        for _ in 0..5 {
            run.step();
        }
        assert!(run.sim.hostiles().is_empty());
        run.step();
        assert_eq!(run.sim.hostiles().len(), 2);
        assert_eq!(run.pending_waves(), 0);
    }

    #[test]
    fn test_defenders_start_at_their_base() {
        let mut scenario = Scenario::siege();
        scenario.defenders = vec![DefenderSetup {
            base: 0,
            kind: Tier::Fast,
        }];
        let run = scenario.start();
        let defender = run.sim.defenders().values().next().expect("defender");
        assert_eq!(defender.home_base, run.bases[0]);
        assert_eq!(defender.kind, Tier::Fast);
    }
}
