//! Defenders guarding a base.
//!
//! A defender stays near its home base and engages the nearest hostile that
//! wanders into the base's aggro radius. When hostiles cannot be hurt there
//! is nothing worth engaging, so defenders just hold position.

use serde::{Deserialize, Serialize};

use crate::combat::{take_damage, AttackReport, AttackTimer, Attacker, Combatant, Health, Victim};
use crate::hostile::Hostile;
use crate::kinds::{Tier, UnitStats};
use crate::math::{Fixed, Vec2Fixed};
use crate::registry::{BaseId, DefenderId, HostileId, Positioned, Registry};
use crate::visual::{VisualHandle, VisualLayer};

/// State of a defender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DefenderState {
    /// Holding position at the base.
    #[default]
    Guarding,
    /// Closing in on or fighting a hostile.
    Engaging,
    /// Walking back to the base.
    Returning,
}

/// Everything a defender update reads or writes besides the defender itself.
pub struct DefendContext<'a> {
    /// Hostiles that may be engaged.
    pub hostiles: &'a mut Registry<HostileId, Hostile>,
    /// Presentation collaborator.
    pub visuals: &'a mut dyn VisualLayer,
    /// Stats of this defender's kind.
    pub stats: &'a UnitStats,
    /// Home base position, `None` if the base is gone.
    pub home: Option<Vec2Fixed>,
    /// Strike distance.
    pub engagement_range: Fixed,
    /// Distance from the base at which a defender counts as home.
    pub guard_range: Fixed,
    /// Hostiles farther than this from the base are ignored.
    pub aggro_range: Fixed,
    /// Whether hostiles can be hurt at all.
    pub hostiles_vulnerable: bool,
    /// Current simulation time.
    pub now_ms: u64,
}

/// A combat unit that protects a base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defender {
    /// Kind, selects the stat block.
    pub kind: Tier,
    /// Base this defender protects.
    pub home_base: BaseId,
    /// Position in world space.
    pub position: Vec2Fixed,
    state: DefenderState,
    target: Option<HostileId>,
    timer: AttackTimer,
    health: Health,
    visual: VisualHandle,
}

impl Defender {
    /// Create a guarding defender at full health.
    #[must_use]
    pub fn new(
        kind: Tier,
        home_base: BaseId,
        position: Vec2Fixed,
        max_health: u32,
        visual: VisualHandle,
    ) -> Self {
        Self {
            kind,
            home_base,
            position,
            state: DefenderState::Guarding,
            target: None,
            timer: AttackTimer::default(),
            health: Health::new(max_health),
            visual,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> DefenderState {
        self.state
    }

    /// Hostile being engaged.
    #[must_use]
    pub const fn target(&self) -> Option<HostileId> {
        self.target
    }

    /// Health pool.
    #[must_use]
    pub const fn health_pool(&self) -> &Health {
        &self.health
    }

    /// Advance one tick. Returns a report when an attack landed.
    pub fn update(&mut self, id: DefenderId, ctx: &mut DefendContext<'_>) -> Option<AttackReport> {
        let home = ctx.home?;

        let threat = if ctx.hostiles_vulnerable {
            let aggro_sq = ctx.aggro_range * ctx.aggro_range;
            ctx.hostiles
                .nearest_where(self.position, |h| h.position.distance_squared(home) <= aggro_sq)
        } else {
            None
        };

        let Some((target, dist_sq)) = threat else {
            self.target = None;
            self.fall_back(home, ctx);
            return None;
        };

        self.state = DefenderState::Engaging;
        self.target = Some(target);

        let range = ctx.engagement_range;
        if dist_sq < range * range {
            return self.strike(id, target, ctx);
        }

        let target_pos = ctx.hostiles.get(target)?.position;
        self.step_toward(target_pos, ctx);
        None
    }

    fn fall_back(&mut self, home: Vec2Fixed, ctx: &mut DefendContext<'_>) {
        let guard = ctx.guard_range;
        if self.position.distance_squared(home) < guard * guard {
            self.state = DefenderState::Guarding;
        } else {
            self.state = DefenderState::Returning;
            self.step_toward(home, ctx);
        }
    }

    fn strike(
        &mut self,
        id: DefenderId,
        target: HostileId,
        ctx: &mut DefendContext<'_>,
    ) -> Option<AttackReport> {
        if !self.timer.ready(ctx.now_ms, ctx.stats.cooldown_ms) {
            return None;
        }
        self.timer.fire(ctx.now_ms);

        let damage = ctx.stats.damage;
        let outcome = take_damage(&mut *ctx.hostiles, &mut *ctx.visuals, target, damage);
        ctx.visuals.pulse_visual(self.visual);
        if outcome.is_kill() {
            self.target = None;
            tracing::debug!(?id, hostile = ?target, "Hostile killed");
        }

        Some(AttackReport {
            attacker: Attacker::Defender(id),
            victim: Victim::Hostile(target),
            damage,
            outcome,
            at_ms: ctx.now_ms,
        })
    }

    fn step_toward(&mut self, target: Vec2Fixed, ctx: &mut DefendContext<'_>) {
        self.position = self.position.step_toward(target, ctx.stats.speed);
        ctx.visuals.move_visual(self.visual, self.position);
    }
}

impl Positioned for Defender {
    fn position(&self) -> Vec2Fixed {
        self.position
    }
}

impl Combatant for Defender {
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
    use crate::combat::DamageOutcome;
    use crate::math::ratio;
    use crate::visual::NullVisuals;

    struct Rig {
        hostiles: Registry<HostileId, Hostile>,
        visuals: NullVisuals,
        stats: UnitStats,
        vulnerable: bool,
    }

    impl Rig {
        fn new(vulnerable: bool) -> Self {
            Self {
                hostiles: Registry::new(),
                visuals: NullVisuals::default(),
                stats: UnitStats::defender(Tier::Basic),
                vulnerable,
            }
        }

        fn hostile(&mut self, x: i32, y: i32, health: u32) -> HostileId {
            let health = self.vulnerable.then_some(health);
            self.hostiles.insert(Hostile::new(
                Tier::Basic,
                Vec2Fixed::from_ints(x, y),
                health,
                VisualHandle(7),
            ))
        }

        fn step(&mut self, defender: &mut Defender, now_ms: u64) -> Option<AttackReport> {
            let mut ctx = DefendContext {
                hostiles: &mut self.hostiles,
                visuals: &mut self.visuals,
                stats: &self.stats,
                home: Some(Vec2Fixed::ZERO),
                engagement_range: ratio(12, 10),
                guard_range: Fixed::ONE,
                aggro_range: Fixed::from_num(8),
                hostiles_vulnerable: self.vulnerable,
                now_ms,
            };
            defender.update(DefenderId::default(), &mut ctx)
        }
    }

    fn defender_at(x: i32, y: i32) -> Defender {
        Defender::new(
            Tier::Basic,
            BaseId::default(),
            Vec2Fixed::from_ints(x, y),
            10,
            VisualHandle(1),
        )
    }

    #[test]
    fn test_holds_position_when_hostiles_invulnerable() {
        let mut rig = Rig::new(false);
        rig.hostile(1, 0, 8);
        let mut defender = defender_at(0, 0);

        assert!(rig.step(&mut defender, 0).is_none());
        assert_eq!(defender.state(), DefenderState::Guarding);
        assert_eq!(defender.position, Vec2Fixed::ZERO);
    }

    #[test]
    fn test_ignores_hostiles_outside_aggro_radius() {
        let mut rig = Rig::new(true);
        rig.hostile(20, 0, 8);
        let mut defender = defender_at(0, 0);

        rig.step(&mut defender, 0);
        assert_eq!(defender.target(), None);
        assert_eq!(defender.state(), DefenderState::Guarding);
    }

    #[test]
    fn test_engages_and_kills_hostile() {
        let mut rig = Rig::new(true);
        let target = rig.hostile(1, 0, 8);
        let mut defender = defender_at(0, 0);

        let first = rig.step(&mut defender, 0).expect("in range");
        assert_eq!(first.outcome, DamageOutcome::Survived { remaining: 4 });
        assert!(rig.step(&mut defender, 500).is_none());
        let second = rig.step(&mut defender, 800).expect("cooled down");
        assert_eq!(second.victim, Victim::Hostile(target));
        assert_eq!(second.outcome, DamageOutcome::Died);
        assert!(rig.hostiles.is_empty());
    }

    #[test]
    fn test_walks_home_when_no_threat() {
        let mut rig = Rig::new(true);
        let mut defender = defender_at(5, 0);

        rig.step(&mut defender, 0);
        assert_eq!(defender.state(), DefenderState::Returning);
        assert!(defender.position.x < Fixed::from_num(5));
    }
}
