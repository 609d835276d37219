//! Damage resolution.
//!
//! [`take_damage`] is the only code path that lowers health. It clamps at
//! zero, and when a unit dies it removes the unit from its registry and
//! releases its visual in the same call, so a death is processed exactly once.
//!
//! The interface is symmetric: workers, defenders and hostiles all implement
//! [`Combatant`]. A combatant without a health pool (hostiles, unless the
//! config makes them vulnerable) reports [`DamageOutcome::Immune`].

use serde::{Deserialize, Serialize};
use slotmap::Key;

use crate::registry::{DefenderId, HostileId, Positioned, Registry, WorkerId};
use crate::visual::{VisualHandle, VisualLayer};

/// Current and maximum hit points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Health {
    current: u32,
    max: u32,
}

impl Health {
    /// Full health pool of size `max`.
    #[must_use]
    pub const fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    /// Remaining hit points.
    #[must_use]
    pub const fn current(&self) -> u32 {
        self.current
    }

    /// Maximum hit points.
    #[must_use]
    pub const fn max(&self) -> u32 {
        self.max
    }

    /// Whether the pool is empty.
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.current == 0
    }

    fn apply(&mut self, amount: u32) -> u32 {
        self.current = self.current.saturating_sub(amount);
        self.current
    }
}

/// Something that can be attacked.
pub trait Combatant: Positioned {
    /// Health pool, `None` for units that cannot be hurt.
    fn health(&self) -> Option<&Health>;

    /// Mutable health pool.
    fn health_mut(&mut self) -> Option<&mut Health>;

    /// Visual proxy released on death.
    fn visual(&self) -> VisualHandle;
}

/// Result of applying damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DamageOutcome {
    /// Target took the hit and is still standing.
    Survived {
        /// Hit points left.
        remaining: u32,
    },
    /// Target reached zero health and was removed.
    Died,
    /// Target has no health pool.
    Immune,
    /// Target no longer exists.
    Missing,
}

impl DamageOutcome {
    /// Whether this hit killed the target.
    #[must_use]
    pub const fn is_kill(self) -> bool {
        matches!(self, Self::Died)
    }
}

/// Apply `amount` damage to the entity `id` in `registry`.
///
/// On death the entity is removed from `registry` and its visual destroyed.
pub fn take_damage<K, T>(
    registry: &mut Registry<K, T>,
    visuals: &mut dyn VisualLayer,
    id: K,
    amount: u32,
) -> DamageOutcome
where
    K: Key,
    T: Combatant,
{
    let Some(target) = registry.get_mut(id) else {
        return DamageOutcome::Missing;
    };
    let Some(health) = target.health_mut() else {
        return DamageOutcome::Immune;
    };

    let remaining = health.apply(amount);
    if remaining > 0 {
        return DamageOutcome::Survived { remaining };
    }

    if let Some(dead) = registry.remove(id) {
        visuals.destroy_visual(dead.visual());
    }
    DamageOutcome::Died
}

/// Cooldown gate shared by every attacker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AttackTimer {
    last_attack_ms: Option<u64>,
}

impl AttackTimer {
    /// Whether an attack is allowed at `now_ms`.
    ///
    /// The first attack is always allowed.
    #[must_use]
    pub fn ready(&self, now_ms: u64, cooldown_ms: u64) -> bool {
        match self.last_attack_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= cooldown_ms,
        }
    }

    /// Record an attack at `now_ms`.
    pub fn fire(&mut self, now_ms: u64) {
        self.last_attack_ms = Some(now_ms);
    }

    /// Time of the last attack.
    #[must_use]
    pub const fn last_attack_ms(&self) -> Option<u64> {
        self.last_attack_ms
    }
}

/// Who struck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Attacker {
    /// A hostile unit.
    Hostile(HostileId),
    /// A defender.
    Defender(DefenderId),
}

/// Who was struck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Victim {
    /// A worker.
    Worker(WorkerId),
    /// A hostile unit.
    Hostile(HostileId),
}

/// One resolved attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackReport {
    /// Attacking unit.
    pub attacker: Attacker,
    /// Target unit.
    pub victim: Victim,
    /// Damage dealt.
    pub damage: u32,
    /// What happened to the target.
    pub outcome: DamageOutcome,
    /// Simulation time of the attack.
    pub at_ms: u64,
}
