//! Unit kinds and their per-kind simulation parameters.
//!
//! Hostiles and defenders both come in three variants that trade speed for
//! damage. The variant is a plain [`Tier`]; the numbers behind each tier live
//! in a [`TierTable`] inside [`SimConfig`](crate::config::SimConfig), so the
//! state machines never hard-code a stat.

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, ratio, Fixed};

/// Variant of a combat unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Tier {
    /// Balanced speed and damage.
    #[default]
    Basic,
    /// Quick, light hitter with a short cooldown.
    Fast,
    /// Slow, heavy hitter with a long cooldown.
    Tank,
}

impl Tier {
    /// All tiers in declaration order.
    pub const ALL: [Self; 3] = [Self::Basic, Self::Fast, Self::Tank];

    /// Lowercase name used by scenario files and the headless protocol.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Fast => "fast",
            Self::Tank => "tank",
        }
    }

    /// Parse a lowercase tier name.
    ///
    /// # Example
    ///
    /// ```
    /// use harvest_core::kinds::Tier;
    ///
    /// assert_eq!(Tier::from_name("tank"), Some(Tier::Tank));
    /// assert_eq!(Tier::from_name("dragon"), None);
    /// ```
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tier| tier.name() == name)
    }
}

/// Movement and combat numbers for one unit kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitStats {
    /// Distance covered per tick.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Damage dealt per successful attack.
    pub damage: u32,
    /// Minimum milliseconds between two attacks.
    pub cooldown_ms: u64,
    /// Starting and maximum health. Zero means the unit has no health pool.
    pub health: u32,
}

impl UnitStats {
    /// Create a stat block.
    #[must_use]
    pub const fn new(speed: Fixed, damage: u32, cooldown_ms: u64, health: u32) -> Self {
        Self {
            speed,
            damage,
            cooldown_ms,
            health,
        }
    }

    /// Harvesting worker. Non-combatant.
    #[must_use]
    pub fn worker() -> Self {
        Self::new(ratio(8, 100), 0, 0, 6)
    }

    /// Default hostile stats for a tier.
    ///
    /// Health only matters when hostiles are configured vulnerable.
    #[must_use]
    pub fn hostile(tier: Tier) -> Self {
        match tier {
            Tier::Basic => Self::new(ratio(6, 100), 2, 1000, 8),
            Tier::Fast => Self::new(ratio(12, 100), 1, 500, 4),
            Tier::Tank => Self::new(ratio(3, 100), 4, 2000, 16),
        }
    }

    /// Default defender stats for a tier.
    #[must_use]
    pub fn defender(tier: Tier) -> Self {
        match tier {
            Tier::Basic => Self::new(ratio(7, 100), 4, 800, 10),
            Tier::Fast => Self::new(ratio(12, 100), 2, 500, 6),
            Tier::Tank => Self::new(ratio(4, 100), 8, 1500, 20),
        }
    }
}

/// One value per [`Tier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TierTable<T> {
    /// Value for [`Tier::Basic`].
    pub basic: T,
    /// Value for [`Tier::Fast`].
    pub fast: T,
    /// Value for [`Tier::Tank`].
    pub tank: T,
}

impl<T> TierTable<T> {
    /// Build a table by evaluating `f` for every tier.
    pub fn from_fn(mut f: impl FnMut(Tier) -> T) -> Self {
        Self {
            basic: f(Tier::Basic),
            fast: f(Tier::Fast),
            tank: f(Tier::Tank),
        }
    }

    /// Look up the value for `tier`.
    #[must_use]
    pub const fn get(&self, tier: Tier) -> &T {
        match tier {
            Tier::Basic => &self.basic,
            Tier::Fast => &self.fast,
            Tier::Tank => &self.tank,
        }
    }
}
