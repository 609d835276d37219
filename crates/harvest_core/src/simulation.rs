//! Core simulation loop.
//!
//! [`Simulation`] owns every registry, the resource bank, the spawn RNG and
//! the presentation collaborators. Each tick it runs the entity updates in a
//! fixed order so identical inputs always produce identical state.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::combat::{AttackReport, Combatant, Health, Victim};
use crate::config::SimConfig;
use crate::defender::{DefendContext, Defender};
use crate::economy::{NodeSummary, ResourceBank, ResourceRegistry};
use crate::hostile::{Hostile, HuntContext};
use crate::kinds::Tier;
use crate::math::Vec2Fixed;
use crate::registry::{BaseId, DefenderId, HostileId, NodeId, Registry, WorkerId};
use crate::spawn::{node_placements, ring_position, worker_positions, Base, SpawnRng};
use crate::visual::{NullVisuals, VisualKind, VisualLayer};
use crate::worker::{HarvestContext, Worker, WorkerEvent, WorkerState};

/// Callback invoked after every resolved attack.
pub type UiRefreshHook = Box<dyn FnMut(&AttackReport)>;

/// Events generated during a simulation tick.
///
/// Hosts use these to drive sounds, UI counters and logs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickEvents {
    /// Worker state changes worth reporting, in update order.
    pub worker_events: Vec<(WorkerId, WorkerEvent)>,
    /// Attacks that landed this tick.
    pub attacks: Vec<AttackReport>,
    /// Nodes emptied and removed this tick.
    pub depleted_nodes: Vec<NodeId>,
    /// Workers killed this tick.
    pub worker_deaths: Vec<WorkerId>,
    /// Hostiles killed this tick.
    pub hostile_deaths: Vec<HostileId>,
}

impl TickEvents {
    /// Units delivered to bases this tick.
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.worker_events
            .iter()
            .map(|(_, event)| match event {
                WorkerEvent::Delivered { amount } => u64::from(*amount),
                _ => 0,
            })
            .sum()
    }
}

/// The harvest simulation.
///
/// # Update Order
///
/// Each tick runs, in this order:
/// 1. **Workers** in registry order
/// 2. **Node refresh** so the visual layer can animate idle nodes
/// 3. **Hostiles** in registry order, seeing this tick's worker positions
/// 4. **Defenders** in registry order
///
/// Every operation is infallible. Requests naming a stale id or an
/// unaffordable purchase are ignored and reported through the return value.
pub struct Simulation {
    config: SimConfig,
    tick: u64,
    clock_ms: u64,
    rng: SpawnRng,
    bases: Registry<BaseId, Base>,
    workers: Registry<WorkerId, Worker>,
    hostiles: Registry<HostileId, Hostile>,
    defenders: Registry<DefenderId, Defender>,
    nodes: ResourceRegistry,
    bank: ResourceBank,
    visuals: Box<dyn VisualLayer>,
    ui_refresh: Option<UiRefreshHook>,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("tick", &self.tick)
            .field("clock_ms", &self.clock_ms)
            .field("bases", &self.bases.len())
            .field("workers", &self.workers.len())
            .field("hostiles", &self.hostiles.len())
            .field("defenders", &self.defenders.len())
            .field("nodes", &self.nodes.len())
            .field("bank", &self.bank)
            .finish_non_exhaustive()
    }
}

impl Simulation {
    /// Create an empty simulation with the default config.
    ///
    /// # Example
    ///
    /// ```
    /// use harvest_core::simulation::Simulation;
    ///
    /// let sim = Simulation::new();
    /// assert_eq!(sim.get_tick(), 0);
    /// assert_eq!(sim.now_ms(), 0);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SimConfig::default())
    }

    /// Create an empty simulation without visuals.
    #[must_use]
    pub fn with_config(config: SimConfig) -> Self {
        Self::with_visuals(config, Box::new(NullVisuals::default()))
    }

    /// Create an empty simulation driving the given visual layer.
    #[must_use]
    pub fn with_visuals(config: SimConfig, visuals: Box<dyn VisualLayer>) -> Self {
        Self {
            rng: SpawnRng::new(config.seed),
            config,
            tick: 0,
            clock_ms: 0,
            bases: Registry::new(),
            workers: Registry::new(),
            hostiles: Registry::new(),
            defenders: Registry::new(),
            nodes: ResourceRegistry::new(),
            bank: ResourceBank::default(),
            visuals,
            ui_refresh: None,
        }
    }

    /// Register the callback run after each attack, replacing any previous one.
    pub fn set_ui_refresh(&mut self, hook: impl FnMut(&AttackReport) + 'static) {
        self.ui_refresh = Some(Box::new(hook));
    }

    /// Drop the attack callback.
    pub fn clear_ui_refresh(&mut self) {
        self.ui_refresh = None;
    }

    /// Get the current tick number.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.tick
    }

    /// Simulation time of the last tick.
    #[must_use]
    pub const fn now_ms(&self) -> u64 {
        self.clock_ms
    }

    /// Active config.
    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Tier used by [`spawn_hostile`](Self::spawn_hostile) when none is given.
    pub fn set_default_hostile_kind(&mut self, kind: Tier) {
        self.config.default_hostile_kind = kind;
    }

    /// Delivered resources.
    #[must_use]
    pub const fn bank(&self) -> &ResourceBank {
        &self.bank
    }

    /// Resource nodes.
    #[must_use]
    pub const fn nodes(&self) -> &ResourceRegistry {
        &self.nodes
    }

    /// Bases.
    #[must_use]
    pub const fn bases(&self) -> &Registry<BaseId, Base> {
        &self.bases
    }

    /// Workers.
    #[must_use]
    pub const fn workers(&self) -> &Registry<WorkerId, Worker> {
        &self.workers
    }

    /// Hostiles.
    #[must_use]
    pub const fn hostiles(&self) -> &Registry<HostileId, Hostile> {
        &self.hostiles
    }

    /// Defenders.
    #[must_use]
    pub const fn defenders(&self) -> &Registry<DefenderId, Defender> {
        &self.defenders
    }

    /// Look up a worker.
    #[must_use]
    pub fn worker(&self, id: WorkerId) -> Option<&Worker> {
        self.workers.get(id)
    }

    /// Look up a hostile.
    #[must_use]
    pub fn hostile(&self, id: HostileId) -> Option<&Hostile> {
        self.hostiles.get(id)
    }

    /// Look up a defender.
    #[must_use]
    pub fn defender(&self, id: DefenderId) -> Option<&Defender> {
        self.defenders.get(id)
    }

    /// Per-node remaining amounts for display.
    #[must_use]
    pub fn resource_summary(&self) -> Vec<NodeSummary> {
        self.nodes.summary()
    }

    /// Advance the clock by one tick duration and run the tick.
    ///
    /// # Example
    ///
    /// ```
    /// use harvest_core::simulation::Simulation;
    ///
    /// let mut sim = Simulation::new();
    /// sim.tick();
    /// assert_eq!(sim.get_tick(), 1);
    /// assert_eq!(sim.now_ms(), 16);
    /// ```
    pub fn tick(&mut self) -> TickEvents {
        let now_ms = self.clock_ms + self.config.tick_duration_ms;
        self.tick_at(now_ms)
    }

    /// Run one tick at an explicit time.
    ///
    /// Times earlier than the last tick are clamped so cooldowns never run
    /// backwards.
    pub fn tick_at(&mut self, now_ms: u64) -> TickEvents {
        self.clock_ms = self.clock_ms.max(now_ms);
        let now_ms = self.clock_ms;
        let mut events = TickEvents::default();

        self.run_workers(&mut events);
        self.refresh_nodes();
        self.run_hostiles(now_ms, &mut events);
        self.run_defenders(now_ms, &mut events);

        self.tick += 1;

        #[cfg(feature = "debug-validation")]
        self.check_invariants();

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.tick, state_hash = hash, "Simulation state hash");
        }

        events
    }

    fn run_workers(&mut self, events: &mut TickEvents) {
        for id in self.workers.ids() {
            let Some(worker) = self.workers.get_mut(id) else {
                continue;
            };
            let mut ctx = HarvestContext {
                home: self.bases.get(worker.home_base).map(|base| base.position),
                nodes: &mut self.nodes,
                bank: &mut self.bank,
                visuals: self.visuals.as_mut(),
                config: &self.config,
            };
            let Some(event) = worker.update(&mut ctx) else {
                continue;
            };
            if let WorkerEvent::Collected {
                node,
                depleted: true,
                ..
            } = event
            {
                events.depleted_nodes.push(node);
            }
            events.worker_events.push((id, event));
        }
    }

    fn refresh_nodes(&mut self) {
        for (_, node) in self.nodes.iter() {
            self.visuals.refresh_node(node.visual(), node.amount());
        }
    }

    fn run_hostiles(&mut self, now_ms: u64, events: &mut TickEvents) {
        for id in self.hostiles.ids() {
            let Some(hostile) = self.hostiles.get_mut(id) else {
                continue;
            };
            let mut ctx = HuntContext {
                workers: &mut self.workers,
                visuals: self.visuals.as_mut(),
                stats: self.config.hostile_stats(hostile.kind),
                engagement_range: self.config.engagement_range,
                now_ms,
            };
            if let Some(report) = hostile.update(id, &mut ctx) {
                self.record_attack(report, events);
            }
        }
    }

    fn run_defenders(&mut self, now_ms: u64, events: &mut TickEvents) {
        for id in self.defenders.ids() {
            let Some(defender) = self.defenders.get_mut(id) else {
                continue;
            };
            let mut ctx = DefendContext {
                hostiles: &mut self.hostiles,
                visuals: self.visuals.as_mut(),
                stats: self.config.defender_stats(defender.kind),
                home: self.bases.get(defender.home_base).map(|base| base.position),
                engagement_range: self.config.engagement_range,
                guard_range: self.config.delivery_range,
                aggro_range: self.config.defender_aggro_range,
                hostiles_vulnerable: self.config.hostiles_vulnerable,
                now_ms,
            };
            if let Some(report) = defender.update(id, &mut ctx) {
                self.record_attack(report, events);
            }
        }
    }

    fn record_attack(&mut self, report: AttackReport, events: &mut TickEvents) {
        if report.outcome.is_kill() {
            match report.victim {
                Victim::Worker(id) => events.worker_deaths.push(id),
                Victim::Hostile(id) => events.hostile_deaths.push(id),
            }
        }
        if let Some(hook) = self.ui_refresh.as_mut() {
            hook(&report);
        }
        events.attacks.push(report);
    }

    /// Found a base with its starting workers and resource nodes.
    ///
    /// Workers that find no free spot are skipped, see
    /// [`worker_positions`](crate::spawn::worker_positions).
    pub fn create_base(&mut self, position: Vec2Fixed) -> BaseId {
        let visual = self.visuals.create_visual(VisualKind::Base, position);
        let base = self.bases.insert(Base::new(position, visual));

        let occupied: Vec<Vec2Fixed> = self.workers.values().map(|w| w.position).collect();
        let spots = worker_positions(position, &occupied, &self.config, &mut self.rng);
        let workers = spots.len();
        for spot in spots {
            self.spawn_worker(base, spot);
        }

        let placements = node_placements(position, &mut self.rng);
        for placement in &placements {
            self.nodes
                .create(self.visuals.as_mut(), placement.position, placement.amount);
        }

        tracing::debug!(?base, workers, nodes = placements.len(), "Base founded");
        base
    }

    /// Remove a base. Its units stay but stop acting until reassigned a home.
    pub fn remove_base(&mut self, id: BaseId) -> bool {
        let Some(base) = self.bases.remove(id) else {
            return false;
        };
        self.visuals.destroy_visual(base.visual());
        true
    }

    /// Create a resource node. A zero amount creates nothing.
    pub fn create_resource(&mut self, position: Vec2Fixed, amount: u32) -> Option<NodeId> {
        self.nodes.create(self.visuals.as_mut(), position, amount)
    }

    /// Remove every resource node.
    pub fn reset_resources(&mut self) {
        self.nodes.remove_all(self.visuals.as_mut());
        tracing::debug!("Resource nodes cleared");
    }

    /// Spawn an idle worker for `base`. Returns `None` if the base is gone.
    pub fn spawn_worker(&mut self, base: BaseId, position: Vec2Fixed) -> Option<WorkerId> {
        if !self.bases.contains(base) {
            return None;
        }
        let visual = self.visuals.create_visual(VisualKind::Worker, position);
        let id = self.workers.insert(Worker::new(
            base,
            position,
            self.config.worker.health,
            visual,
        ));
        tracing::trace!(?id, ?base, "Worker spawned");
        Some(id)
    }

    /// Spawn a hostile. `kind` defaults to the configured hostile kind.
    pub fn spawn_hostile(&mut self, position: Vec2Fixed, kind: Option<Tier>) -> HostileId {
        let kind = kind.unwrap_or(self.config.default_hostile_kind);
        let health = self
            .config
            .hostiles_vulnerable
            .then(|| self.config.hostile_stats(kind).health);
        let visual = self.visuals.create_visual(VisualKind::Hostile(kind), position);
        let id = self
            .hostiles
            .insert(Hostile::new(kind, position, health, visual));
        tracing::trace!(?id, ?kind, "Hostile spawned");
        id
    }

    /// Spawn a defender guarding `base`. Returns `None` if the base is gone.
    pub fn spawn_defender(
        &mut self,
        base: BaseId,
        kind: Tier,
        position: Vec2Fixed,
    ) -> Option<DefenderId> {
        if !self.bases.contains(base) {
            return None;
        }
        let health = self.config.defender_stats(kind).health;
        let visual = self.visuals.create_visual(VisualKind::Defender(kind), position);
        let id = self
            .defenders
            .insert(Defender::new(kind, base, position, health, visual));
        tracing::trace!(?id, ?kind, ?base, "Defender spawned");
        Some(id)
    }

    /// Buy a worker next to `base` with stockpiled resources.
    ///
    /// Returns `None` without spending when the base is gone or the
    /// stockpile is short.
    pub fn purchase_worker(&mut self, base: BaseId) -> Option<WorkerId> {
        let center = self.bases.get(base)?.position;
        if !self.bank.spend(self.config.worker_cost) {
            tracing::debug!(?base, stockpile = self.bank.stockpile, "Cannot afford worker");
            return None;
        }
        let position = ring_position(center, &mut self.rng);
        self.spawn_worker(base, position)
    }

    /// Buy a defender next to `base` with stockpiled resources.
    pub fn purchase_defender(&mut self, base: BaseId, kind: Tier) -> Option<DefenderId> {
        let center = self.bases.get(base)?.position;
        if !self.bank.spend(self.config.defender_cost) {
            tracing::debug!(?base, stockpile = self.bank.stockpile, "Cannot afford defender");
            return None;
        }
        let position = ring_position(center, &mut self.rng);
        self.spawn_defender(base, kind, position)
    }

    /// Remove a worker. Removing a stale id is a no-op.
    pub fn remove_worker(&mut self, id: WorkerId) -> bool {
        let Some(worker) = self.workers.remove(id) else {
            return false;
        };
        self.visuals.destroy_visual(worker.visual());
        true
    }

    /// Remove a hostile. Removing a stale id is a no-op.
    pub fn remove_hostile(&mut self, id: HostileId) -> bool {
        let Some(hostile) = self.hostiles.remove(id) else {
            return false;
        };
        self.visuals.destroy_visual(hostile.visual());
        true
    }

    /// Remove a defender. Removing a stale id is a no-op.
    pub fn remove_defender(&mut self, id: DefenderId) -> bool {
        let Some(defender) = self.defenders.remove(id) else {
            return false;
        };
        self.visuals.destroy_visual(defender.visual());
        true
    }

    /// Send a worker to a specific node.
    pub fn assign_to_resource(&mut self, worker: WorkerId, node: NodeId) -> bool {
        match self.workers.get_mut(worker) {
            Some(w) => w.assign_to_resource(&self.nodes, node),
            None => false,
        }
    }

    /// Send a worker to the nearest non-empty node.
    pub fn assign_to_nearest(&mut self, worker: WorkerId) -> bool {
        match self.workers.get_mut(worker) {
            Some(w) => w.assign_to_nearest(&self.nodes),
            None => false,
        }
    }

    /// Send every idle worker to its nearest node. Returns how many took.
    pub fn assign_idle_to_nearest(&mut self) -> usize {
        let mut assigned = 0;
        for id in self.workers.ids() {
            let Some(worker) = self.workers.get_mut(id) else {
                continue;
            };
            if worker.state() == WorkerState::Idle
                && worker.assign_to_nearest(&self.nodes)
            {
                assigned += 1;
            }
        }
        assigned
    }

    /// Mark a worker as selected or not. Unknown ids are ignored.
    pub fn select_worker(&mut self, id: WorkerId, selected: bool) -> bool {
        let Some(worker) = self.workers.get_mut(id) else {
            return false;
        };
        worker.set_selected(selected);
        self.visuals.set_visual_selected(worker.visual(), selected);
        true
    }

    /// Ids of selected workers in registry order.
    #[must_use]
    pub fn selected_workers(&self) -> Vec<WorkerId> {
        self.workers
            .iter()
            .filter(|(_, w)| w.is_selected())
            .map(|(id, _)| id)
            .collect()
    }

    /// Calculate a hash of the current simulation state.
    ///
    /// Two simulations fed the same config and inputs hash identically.
    /// Visual handles are left out so the hash does not depend on the
    /// presentation layer.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);
        self.clock_ms.hash(&mut hasher);
        self.bank.collected_total.hash(&mut hasher);
        self.bank.stockpile.hash(&mut hasher);

        self.bases.len().hash(&mut hasher);
        for (id, base) in self.bases.iter() {
            id.hash(&mut hasher);
            base.position.hash(&mut hasher);
        }

        self.nodes.len().hash(&mut hasher);
        for (id, node) in self.nodes.iter() {
            id.hash(&mut hasher);
            node.position.hash(&mut hasher);
            node.amount().hash(&mut hasher);
        }

        self.workers.len().hash(&mut hasher);
        for (id, worker) in self.workers.iter() {
            id.hash(&mut hasher);
            worker.home_base.hash(&mut hasher);
            worker.position.hash(&mut hasher);
            worker.state().hash(&mut hasher);
            worker.target().hash(&mut hasher);
            worker.carried().hash(&mut hasher);
            worker.health_pool().current().hash(&mut hasher);
        }

        self.hostiles.len().hash(&mut hasher);
        for (id, hostile) in self.hostiles.iter() {
            id.hash(&mut hasher);
            hostile.kind.hash(&mut hasher);
            hostile.position.hash(&mut hasher);
            hostile.state().hash(&mut hasher);
            hostile.target().hash(&mut hasher);
            hostile.last_attack_ms().hash(&mut hasher);
            hostile.health().map(Health::current).hash(&mut hasher);
        }

        self.defenders.len().hash(&mut hasher);
        for (id, defender) in self.defenders.iter() {
            id.hash(&mut hasher);
            defender.kind.hash(&mut hasher);
            defender.position.hash(&mut hasher);
            defender.state().hash(&mut hasher);
            defender.target().hash(&mut hasher);
            defender.health_pool().current().hash(&mut hasher);
        }

        hasher.finish()
    }

    #[cfg(feature = "debug-validation")]
    fn check_invariants(&self) {
        for (id, node) in self.nodes.iter() {
            assert!(!node.is_depleted(), "empty node {id:?} still registered");
        }
        for (id, worker) in self.workers.iter() {
            assert!(
                worker.carried() == 0 || worker.state() == WorkerState::Returning,
                "worker {id:?} carrying while {:?}",
                worker.state()
            );
            assert!(!worker.health_pool().is_dead(), "dead worker {id:?} still registered");
        }
        for (id, hostile) in self.hostiles.iter() {
            if let Some(health) = hostile.health() {
                assert!(!health.is_dead(), "dead hostile {id:?} still registered");
            }
        }
        assert!(
            self.bank.stockpile <= self.bank.collected_total,
            "stockpile exceeds lifetime deliveries"
        );
    }
}
