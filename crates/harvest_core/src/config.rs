//! Simulation configuration.
//!
//! Every tunable the state machines read lives here: per-kind stats, the
//! global interaction ranges and the spawn layout. Defaults reproduce the
//! reference scenario. A config can be loaded from RON, where any omitted
//! field keeps its default.
//!
//! # Example RON
//!
//! ```ron
//! SimConfig(
//!     seed: 7,
//!     collection_cap: 6,
//!     hostiles_vulnerable: true,
//! )
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::kinds::{Tier, TierTable, UnitStats};
use crate::math::{fixed_serde, ratio, Fixed};

/// Tunable parameters for a [`Simulation`](crate::simulation::Simulation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Seed for the spawn coordinator's placement jitter.
    pub seed: u64,
    /// Clock advance per [`Simulation::tick`](crate::simulation::Simulation::tick).
    pub tick_duration_ms: u64,

    /// Maximum amount a worker picks up per trip.
    pub collection_cap: u32,
    /// A worker closer than this to its node collects.
    #[serde(with = "fixed_serde")]
    pub collection_range: Fixed,
    /// A returning worker closer than this to its base delivers.
    #[serde(with = "fixed_serde")]
    pub delivery_range: Fixed,
    /// An attacker closer than this to its target may strike.
    #[serde(with = "fixed_serde")]
    pub engagement_range: Fixed,

    /// Worker stats.
    pub worker: UnitStats,
    /// Hostile stats per tier.
    pub hostiles: TierTable<UnitStats>,
    /// Defender stats per tier.
    pub defenders: TierTable<UnitStats>,
    /// Whether hostiles carry a health pool and can be killed.
    pub hostiles_vulnerable: bool,
    /// Tier used when a hostile is spawned without one.
    pub default_hostile_kind: Tier,
    /// Defenders only chase hostiles within this distance of their base.
    #[serde(with = "fixed_serde")]
    pub defender_aggro_range: Fixed,

    /// Workers placed around every new base.
    pub workers_per_base: u32,
    /// Placement retries per worker before it is skipped.
    pub spawn_attempts: u32,
    /// Minimum distance between freshly placed workers.
    #[serde(with = "fixed_serde")]
    pub min_worker_separation: Fixed,

    /// Stockpile cost of a purchased worker.
    pub worker_cost: u32,
    /// Stockpile cost of a purchased defender.
    pub defender_cost: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 12345,
            tick_duration_ms: 16,
            collection_cap: 4,
            collection_range: ratio(1, 2),
            delivery_range: Fixed::ONE,
            engagement_range: ratio(12, 10),
            worker: UnitStats::worker(),
            hostiles: TierTable::from_fn(UnitStats::hostile),
            defenders: TierTable::from_fn(UnitStats::defender),
            hostiles_vulnerable: false,
            default_hostile_kind: Tier::Basic,
            defender_aggro_range: Fixed::from_num(8),
            workers_per_base: 4,
            spawn_attempts: 20,
            min_worker_separation: ratio(3, 2),
            worker_cost: 4,
            defender_cost: 10,
        }
    }
}

impl SimConfig {
    /// Parse and validate a RON config.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        let config: Self = ron::from_str(ron)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the placement seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Make hostiles killable (or not).
    #[must_use]
    pub const fn with_vulnerable_hostiles(mut self, vulnerable: bool) -> Self {
        self.hostiles_vulnerable = vulnerable;
        self
    }

    /// Stats for a hostile tier.
    #[must_use]
    pub const fn hostile_stats(&self, tier: Tier) -> &UnitStats {
        self.hostiles.get(tier)
    }

    /// Stats for a defender tier.
    #[must_use]
    pub const fn defender_stats(&self, tier: Tier) -> &UnitStats {
        self.defenders.get(tier)
    }

    /// Reject values the state machines cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.collection_cap == 0 {
            return Err(SimError::invalid("collection_cap", "must be positive"));
        }
        for (name, range) in [
            ("collection_range", self.collection_range),
            ("delivery_range", self.delivery_range),
            ("engagement_range", self.engagement_range),
            ("min_worker_separation", self.min_worker_separation),
            ("defender_aggro_range", self.defender_aggro_range),
        ] {
            if range < Fixed::ZERO {
                return Err(SimError::invalid(name, "must not be negative"));
            }
        }
        check_stats("worker", &self.worker, true)?;
        for tier in Tier::ALL {
            check_stats(
                &format!("hostiles.{}", tier.name()),
                self.hostiles.get(tier),
                self.hostiles_vulnerable,
            )?;
            check_stats(
                &format!("defenders.{}", tier.name()),
                self.defenders.get(tier),
                true,
            )?;
        }
        Ok(())
    }
}

fn check_stats(name: &str, stats: &UnitStats, needs_health: bool) -> Result<()> {
    if stats.speed < Fixed::ZERO {
        return Err(SimError::invalid(
            format!("{name}.speed"),
            "must not be negative",
        ));
    }
    if needs_health && stats.health == 0 {
        return Err(SimError::invalid(
            format!("{name}.health"),
            "must be positive",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SimConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.collection_cap, 4);
        assert_eq!(config.workers_per_base, 4);
        assert!(!config.hostiles_vulnerable);
    }

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let config =
            SimConfig::from_ron_str("SimConfig(seed: 7, collection_cap: 6)").expect("valid ron");
        assert_eq!(config.seed, 7);
        assert_eq!(config.collection_cap, 6);
        assert_eq!(config.delivery_range, Fixed::ONE);
        assert_eq!(config.worker, UnitStats::worker());
    }

    #[test]
    fn test_zero_cap_rejected() {
        let err = SimConfig::from_ron_str("SimConfig(collection_cap: 0)").unwrap_err();
        assert!(matches!(
            err,
            SimError::InvalidParameter { ref name, .. } if name == "collection_cap"
        ));
    }

    #[test]
    fn test_malformed_ron_rejected() {
        let err = SimConfig::from_ron_str("SimConfig(seed: \"nope\")").unwrap_err();
        assert!(matches!(err, SimError::ConfigParse(_)));
    }

    #[test]
    fn test_vulnerable_hostiles_need_health() {
        let mut config = SimConfig::default().with_vulnerable_hostiles(true);
        config.hostiles.fast.health = 0;
        assert!(config.validate().is_err());

        config.hostiles_vulnerable = false;
        assert!(config.validate().is_ok());
    }
}
