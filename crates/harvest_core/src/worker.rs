//! Harvesting workers.
//!
//! A worker cycles through three states:
//!
//! ```text
//!            assign                 in range: collect
//!   Idle ───────────────► MovingToResource ───────────────► Returning
//!    ▲                         │   ▲                            │
//!    │      target gone        │   │    delivered, node left    │
//!    ├─────────────────────────┘   └────────────────────────────┤
//!    │                 delivered, node gone                     │
//!    └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The target node is held by id only and re-validated every tick, so a node
//! drained by another worker is noticed on the next update.

use serde::{Deserialize, Serialize};

use crate::combat::{Combatant, Health};
use crate::config::SimConfig;
use crate::economy::{ResourceBank, ResourceRegistry};
use crate::math::Vec2Fixed;
use crate::registry::{BaseId, NodeId, Positioned};
use crate::visual::{VisualHandle, VisualLayer};

/// State of a harvesting worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WorkerState {
    /// Waiting for an assignment.
    #[default]
    Idle,
    /// Heading for the target node.
    MovingToResource,
    /// Carrying a load back to the home base.
    Returning,
}

/// Something that happened to a worker during its update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerEvent {
    /// Picked up a load.
    Collected {
        /// Node harvested.
        node: NodeId,
        /// Units picked up.
        taken: u32,
        /// Whether the pickup emptied the node.
        depleted: bool,
    },
    /// Dropped a load at the base.
    Delivered {
        /// Units delivered.
        amount: u32,
    },
    /// The target node vanished before the worker got there.
    TargetLost {
        /// The stale node id.
        node: Option<NodeId>,
    },
}

/// Everything a worker update reads or writes besides the worker itself.
pub struct HarvestContext<'a> {
    /// Position of the worker's home base, `None` if the base is gone.
    pub home: Option<Vec2Fixed>,
    /// Resource nodes.
    pub nodes: &'a mut ResourceRegistry,
    /// Delivery counter.
    pub bank: &'a mut ResourceBank,
    /// Presentation collaborator.
    pub visuals: &'a mut dyn VisualLayer,
    /// Tunables.
    pub config: &'a SimConfig,
}

/// A harvesting unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worker {
    /// Base this worker delivers to.
    pub home_base: BaseId,
    /// Position in world space.
    pub position: Vec2Fixed,
    state: WorkerState,
    target: Option<NodeId>,
    carried: u32,
    health: Health,
    selected: bool,
    visual: VisualHandle,
}

impl Worker {
    /// Create an idle worker at full health.
    #[must_use]
    pub fn new(
        home_base: BaseId,
        position: Vec2Fixed,
        max_health: u32,
        visual: VisualHandle,
    ) -> Self {
        Self {
            home_base,
            position,
            state: WorkerState::Idle,
            target: None,
            carried: 0,
            health: Health::new(max_health),
            selected: false,
            visual,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> WorkerState {
        self.state
    }

    /// Node this worker is harvesting, if any.
    #[must_use]
    pub const fn target(&self) -> Option<NodeId> {
        self.target
    }

    /// Units being carried.
    #[must_use]
    pub const fn carried(&self) -> u32 {
        self.carried
    }

    /// Health pool.
    #[must_use]
    pub const fn health_pool(&self) -> &Health {
        &self.health
    }

    /// Whether the worker is selected.
    #[must_use]
    pub const fn is_selected(&self) -> bool {
        self.selected
    }

    pub(crate) fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }

    /// Send the worker to `node`.
    ///
    /// Ignored when the node is gone or empty. A worker that is carrying a
    /// load keeps returning and heads for the new node after delivering.
    /// Returns whether the assignment took.
    pub fn assign_to_resource(&mut self, nodes: &ResourceRegistry, node: NodeId) -> bool {
        if !nodes.is_available(node) {
            return false;
        }
        self.target = Some(node);
        if self.carried == 0 {
            self.state = WorkerState::MovingToResource;
        }
        true
    }

    /// Send the worker to the nearest non-empty node.
    ///
    /// Returns whether a node was found.
    pub fn assign_to_nearest(&mut self, nodes: &ResourceRegistry) -> bool {
        match nodes.nearest(self.position) {
            Some(node) => self.assign_to_resource(nodes, node),
            None => false,
        }
    }

    /// Advance one tick.
    pub fn update(&mut self, ctx: &mut HarvestContext<'_>) -> Option<WorkerEvent> {
        let home = ctx.home?;
        match self.state {
            WorkerState::Idle => None,
            WorkerState::MovingToResource => self.seek(ctx),
            WorkerState::Returning => self.return_home(home, ctx),
        }
    }

    fn seek(&mut self, ctx: &mut HarvestContext<'_>) -> Option<WorkerEvent> {
        let node_pos = match self.target.and_then(|id| ctx.nodes.get(id)) {
            Some(node) if !node.is_depleted() => node.position,
            _ => {
                let lost = self.target.take();
                self.state = WorkerState::Idle;
                tracing::trace!(node = ?lost, "Worker lost its target");
                return Some(WorkerEvent::TargetLost { node: lost });
            }
        };

        let range = ctx.config.collection_range;
        if self.position.distance_squared(node_pos) < range * range {
            let node = self.target?;
            let request = ctx.config.collection_cap;
            let collection = ctx.nodes.collect(&mut *ctx.visuals, node, request);
            self.carried = collection.taken;
            self.state = WorkerState::Returning;
            return Some(WorkerEvent::Collected {
                node,
                taken: collection.taken,
                depleted: collection.depleted,
            });
        }

        self.step_toward(node_pos, ctx);
        None
    }

    fn return_home(
        &mut self,
        home: Vec2Fixed,
        ctx: &mut HarvestContext<'_>,
    ) -> Option<WorkerEvent> {
        let range = ctx.config.delivery_range;
        if self.position.distance_squared(home) >= range * range {
            self.step_toward(home, ctx);
            return None;
        }

        let amount = std::mem::take(&mut self.carried);
        ctx.bank.deposit(amount);

        match self.target {
            Some(node) if ctx.nodes.is_available(node) => {
                self.state = WorkerState::MovingToResource;
            }
            _ => {
                self.target = None;
                self.state = WorkerState::Idle;
            }
        }
        Some(WorkerEvent::Delivered { amount })
    }

    fn step_toward(&mut self, target: Vec2Fixed, ctx: &mut HarvestContext<'_>) {
        self.position = self.position.step_toward(target, ctx.config.worker.speed);
        ctx.visuals.move_visual(self.visual, self.position);
    }
}

impl Positioned for Worker {
    fn position(&self) -> Vec2Fixed {
        self.position
    }
}

impl Combatant for Worker {
    fn health(&self) -> Option<&Health> {
        Some(&self.health)
    }

    fn health_mut(&mut self) -> Option<&mut Health> {
        Some(&mut self.health)
    }

    fn visual(&self) -> VisualHandle {
        self.visual
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::ratio;
    use crate::visual::NullVisuals;

    struct Rig {
        config: SimConfig,
        nodes: ResourceRegistry,
        bank: ResourceBank,
        visuals: NullVisuals,
        home: Option<Vec2Fixed>,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                config: SimConfig::default(),
                nodes: ResourceRegistry::new(),
                bank: ResourceBank::default(),
                visuals: NullVisuals::default(),
                home: Some(Vec2Fixed::ZERO),
            }
        }

        fn node(&mut self, x: i32, y: i32, amount: u32) -> NodeId {
            self.nodes
                .create(&mut self.visuals, Vec2Fixed::from_ints(x, y), amount)
                .expect("positive amount")
        }

        fn step(&mut self, worker: &mut Worker) -> Option<WorkerEvent> {
            let mut ctx = HarvestContext {
                home: self.home,
                nodes: &mut self.nodes,
                bank: &mut self.bank,
                visuals: &mut self.visuals,
                config: &self.config,
            };
            worker.update(&mut ctx)
        }
    }

    fn worker_at(x: i32, y: i32) -> Worker {
        Worker::new(
            BaseId::default(),
            Vec2Fixed::from_ints(x, y),
            6,
            VisualHandle(0),
        )
    }

    #[test]
    fn test_idle_worker_does_nothing() {
        let mut rig = Rig::new();
        rig.node(3, 0, 10);
        let mut worker = worker_at(0, 0);

        assert_eq!(rig.step(&mut worker), None);
        assert_eq!(worker.position, Vec2Fixed::ZERO);
        assert_eq!(worker.state(), WorkerState::Idle);
    }

    #[test]
    fn test_assign_to_missing_node_is_ignored() {
        let mut rig = Rig::new();
        let node = rig.node(3, 0, 4);
        rig.nodes.collect(&mut rig.visuals, node, 4);

        let mut worker = worker_at(0, 0);
        assert!(!worker.assign_to_resource(&rig.nodes, node));
        assert_eq!(worker.state(), WorkerState::Idle);
        assert_eq!(worker.target(), None);
    }

    #[test]
    fn test_assign_to_nearest_without_nodes() {
        let rig = Rig::new();
        let mut worker = worker_at(0, 0);
        assert!(!worker.assign_to_nearest(&rig.nodes));
        assert_eq!(worker.state(), WorkerState::Idle);
    }

    #[test]
    fn test_reaches_collection_range_after_32_ticks() {
        let mut rig = Rig::new();
        let node = rig.node(3, 0, 50);
        let mut worker = worker_at(0, 0);
        assert!(worker.assign_to_resource(&rig.nodes, node));

        let node_pos = Vec2Fixed::from_ints(3, 0);
        let range = ratio(1, 2);
        for tick in 1..=32 {
            assert_eq!(rig.step(&mut worker), None, "no collection on tick {tick}");
            let in_range = worker.position.distance(node_pos) < range;
            assert_eq!(in_range, tick == 32, "tick {tick}");
        }

        let event = rig.step(&mut worker);
        assert_eq!(
            event,
            Some(WorkerEvent::Collected {
                node,
                taken: 4,
                depleted: false
            })
        );
        assert_eq!(worker.state(), WorkerState::Returning);
        assert_eq!(worker.carried(), 4);
        assert_eq!(rig.nodes.amount(node), Some(46));
    }

    #[test]
    fn test_full_round_trip_delivers_and_resumes() {
        let mut rig = Rig::new();
        let node = rig.node(2, 0, 10);
        let mut worker = worker_at(0, 0);
        worker.assign_to_resource(&rig.nodes, node);

        let mut delivered = None;
        for _ in 0..200 {
            if let Some(WorkerEvent::Delivered { amount }) = rig.step(&mut worker) {
                delivered = Some(amount);
                break;
            }
        }

        assert_eq!(delivered, Some(4));
        assert_eq!(rig.bank.collected_total, 4);
        assert_eq!(worker.carried(), 0);
        assert_eq!(worker.state(), WorkerState::MovingToResource);
        assert_eq!(worker.target(), Some(node));
    }

    #[test]
    fn test_goes_idle_after_draining_node() {
        let mut rig = Rig::new();
        let node = rig.node(2, 0, 3);
        let mut worker = worker_at(0, 0);
        worker.assign_to_resource(&rig.nodes, node);

        for _ in 0..200 {
            if let Some(WorkerEvent::Delivered { .. }) = rig.step(&mut worker) {
                break;
            }
        }

        assert_eq!(rig.bank.collected_total, 3);
        assert!(rig.nodes.is_empty());
        assert_eq!(worker.state(), WorkerState::Idle);
        assert_eq!(worker.target(), None);
    }

    #[test]
    fn test_target_removed_mid_trip_falls_back_to_idle() {
        let mut rig = Rig::new();
        let node = rig.node(5, 0, 4);
        let mut worker = worker_at(0, 0);
        worker.assign_to_resource(&rig.nodes, node);
        rig.step(&mut worker);

        rig.nodes.remove_all(&mut rig.visuals);
        let event = rig.step(&mut worker);

        assert_eq!(event, Some(WorkerEvent::TargetLost { node: Some(node) }));
        assert_eq!(worker.state(), WorkerState::Idle);
        assert_eq!(worker.target(), None);
    }

    #[test]
    fn test_carried_only_nonzero_while_returning() {
        let mut rig = Rig::new();
        let node = rig.node(1, 1, 9);
        let mut worker = worker_at(0, 0);
        worker.assign_to_resource(&rig.nodes, node);

        for _ in 0..500 {
            rig.step(&mut worker);
            if worker.carried() > 0 {
                assert_eq!(worker.state(), WorkerState::Returning);
            }
        }
        assert_eq!(rig.bank.collected_total, 9);
    }

    #[test]
    fn test_reassign_while_carrying_keeps_returning() {
        let mut rig = Rig::new();
        let first = rig.node(0, 0, 10);
        let second = rig.node(9, 9, 10);
        rig.home = Some(Vec2Fixed::from_ints(5, 0));
        let mut worker = worker_at(0, 0);
        worker.assign_to_resource(&rig.nodes, first);
        rig.step(&mut worker);
        assert_eq!(worker.state(), WorkerState::Returning);

        assert!(worker.assign_to_resource(&rig.nodes, second));
        assert_eq!(worker.state(), WorkerState::Returning);
        assert_eq!(worker.target(), Some(second));
    }

    #[test]
    fn test_worker_without_base_stands_still() {
        let mut rig = Rig::new();
        let node = rig.node(3, 0, 10);
        rig.home = None;
        let mut worker = worker_at(0, 0);
        worker.assign_to_resource(&rig.nodes, node);

        assert_eq!(rig.step(&mut worker), None);
        assert_eq!(worker.position, Vec2Fixed::ZERO);
        assert_eq!(worker.state(), WorkerState::MovingToResource);
    }
}
