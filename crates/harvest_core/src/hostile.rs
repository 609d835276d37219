//! Hostile units.
//!
//! Hostiles have no memory of who they were chasing: every tick they look up
//! the nearest living worker, close in on it in a straight line and strike
//! once in range, gated by their kind's cooldown.

use serde::{Deserialize, Serialize};

use crate::combat::{take_damage, AttackReport, AttackTimer, Attacker, Combatant, Health, Victim};
use crate::kinds::{Tier, UnitStats};
use crate::math::{Fixed, Vec2Fixed};
use crate::registry::{HostileId, Positioned, Registry, WorkerId};
use crate::visual::{VisualHandle, VisualLayer};
use crate::worker::Worker;

/// State of a hostile unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HostileState {
    /// Chasing or attacking a worker.
    #[default]
    Hunting,
    /// No workers left to chase.
    Idle,
}

/// Everything a hostile update reads or writes besides the hostile itself.
pub struct HuntContext<'a> {
    /// Prey.
    pub workers: &'a mut Registry<WorkerId, Worker>,
    /// Presentation collaborator.
    pub visuals: &'a mut dyn VisualLayer,
    /// Stats of this hostile's kind.
    pub stats: &'a UnitStats,
    /// Strike distance.
    pub engagement_range: Fixed,
    /// Current simulation time.
    pub now_ms: u64,
}

/// A unit that hunts workers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hostile {
    /// Kind, selects the stat block.
    pub kind: Tier,
    /// Position in world space.
    pub position: Vec2Fixed,
    state: HostileState,
    target: Option<WorkerId>,
    timer: AttackTimer,
    health: Option<Health>,
    visual: VisualHandle,
}

impl Hostile {
    /// Create a hunting hostile.
    ///
    /// `health` is `None` for hostiles that cannot be hurt.
    #[must_use]
    pub fn new(kind: Tier, position: Vec2Fixed, health: Option<u32>, visual: VisualHandle) -> Self {
        Self {
            kind,
            position,
            state: HostileState::Hunting,
            target: None,
            timer: AttackTimer::default(),
            health: health.map(Health::new),
            visual,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> HostileState {
        self.state
    }

    /// Worker chosen on the last update.
    #[must_use]
    pub const fn target(&self) -> Option<WorkerId> {
        self.target
    }

    /// Time of the last successful attack.
    #[must_use]
    pub const fn last_attack_ms(&self) -> Option<u64> {
        self.timer.last_attack_ms()
    }

    /// Advance one tick. Returns a report when an attack landed.
    pub fn update(&mut self, id: HostileId, ctx: &mut HuntContext<'_>) -> Option<AttackReport> {
        let Some((target, dist_sq)) = ctx.workers.nearest(self.position) else {
            self.state = HostileState::Idle;
            self.target = None;
            return None;
        };
        self.state = HostileState::Hunting;
        self.target = Some(target);

        let range = ctx.engagement_range;
        if dist_sq < range * range {
            return self.strike(id, target, ctx);
        }

        let target_pos = ctx.workers.get(target)?.position;
        self.position = self.position.step_toward(target_pos, ctx.stats.speed);
        ctx.visuals.move_visual(self.visual, self.position);
        None
    }

    fn strike(
        &mut self,
        id: HostileId,
        target: WorkerId,
        ctx: &mut HuntContext<'_>,
    ) -> Option<AttackReport> {
        if !self.timer.ready(ctx.now_ms, ctx.stats.cooldown_ms) {
            return None;
        }
        self.timer.fire(ctx.now_ms);

        let damage = ctx.stats.damage;
        let outcome = take_damage(&mut *ctx.workers, &mut *ctx.visuals, target, damage);
        ctx.visuals.pulse_visual(self.visual);
        if outcome.is_kill() {
            self.target = None;
            tracing::debug!(?id, worker = ?target, "Worker killed");
        }

        Some(AttackReport {
            attacker: Attacker::Hostile(id),
            victim: Victim::Worker(target),
            damage,
            outcome,
            at_ms: ctx.now_ms,
        })
    }
}

impl Positioned for Hostile {
    fn position(&self) -> Vec2Fixed {
        self.position
    }
}

impl Combatant for Hostile {
    fn health(&self) -> Option<&Health> {
        self.health.as_ref()
    }

    fn health_mut(&mut self) -> Option<&mut Health> {
        self.health.as_mut()
    }

    fn visual(&self) -> VisualHandle {
        self.visual
    }
}
