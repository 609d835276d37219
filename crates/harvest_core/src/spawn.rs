//! Bases and the placement rules used when a base is founded.
//!
//! Founding a base drops a ring of workers around it and one or two resource
//! nodes a little farther out. Positions are jittered with a seeded
//! generator so the same seed always yields the same layout.

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::math::{Fixed, Vec2Fixed};
use crate::registry::Positioned;
use crate::visual::VisualHandle;

/// A friendly structure workers deliver to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Base {
    /// Position in world space.
    pub position: Vec2Fixed,
    visual: VisualHandle,
}

impl Base {
    /// Create a base record.
    #[must_use]
    pub const fn new(position: Vec2Fixed, visual: VisualHandle) -> Self {
        Self { position, visual }
    }

    /// Handle of the base's visual proxy.
    #[must_use]
    pub const fn visual(&self) -> VisualHandle {
        self.visual
    }
}

impl Positioned for Base {
    fn position(&self) -> Vec2Fixed {
        self.position
    }
}

/// Simple deterministic RNG for spawn placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRng {
    state: u64,
}

impl SpawnRng {
    /// Seed a new generator.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            state: seed.wrapping_add(0x9E37_79B9_7F4A_7C15),
        }
    }

    fn next(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        // The high bits of an LCG are the well-mixed ones.
        self.state >> 33
    }

    /// Uniform value in `[0, 1)`.
    pub fn next_f32(&mut self) -> f32 {
        (self.next() % 1_000_000) as f32 / 1_000_000.0
    }

    /// Uniform integer in `[min, max)`.
    pub fn next_range(&mut self, min: u32, max: u32) -> u32 {
        let range = u64::from(max.saturating_sub(min));
        if range == 0 {
            return min;
        }
        min + (self.next() % range) as u32
    }
}

/// A resource node to create next to a new base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodePlacement {
    /// Where the node goes.
    pub position: Vec2Fixed,
    /// Starting amount.
    pub amount: u32,
}

fn polar(center: Vec2Fixed, angle: f32, radius: f32) -> Vec2Fixed {
    center + Vec2Fixed::from_f32(angle.cos() * radius, angle.sin() * radius)
}

/// Pick positions for the workers of a new base.
///
/// Worker `i` is tried at angle `2π·i/n` plus up to half a radian of jitter,
/// two to three and a half units out. A spot closer than
/// `min_worker_separation` to any worker in `occupied` or placed earlier in
/// this call is rejected. After `spawn_attempts` rejections the worker is
/// skipped, so fewer than `workers_per_base` positions may come back.
pub fn worker_positions(
    center: Vec2Fixed,
    occupied: &[Vec2Fixed],
    config: &SimConfig,
    rng: &mut SpawnRng,
) -> Vec<Vec2Fixed> {
    let count = config.workers_per_base;
    let min_sq = config.min_worker_separation * config.min_worker_separation;
    let mut placed: Vec<Vec2Fixed> = Vec::with_capacity(count as usize);

    for i in 0..count {
        let base_angle = std::f32::consts::TAU * i as f32 / count as f32;
        let spot = (0..config.spawn_attempts).find_map(|_| {
            let angle = base_angle + rng.next_f32() * 0.5;
            let radius = 2.0 + rng.next_f32() * 1.5;
            let candidate = polar(center, angle, radius);
            let clear = occupied
                .iter()
                .chain(placed.iter())
                .all(|other| candidate.distance_squared(*other) >= min_sq);
            clear.then_some(candidate)
        });

        match spot {
            Some(position) => placed.push(position),
            None => tracing::debug!(index = i, "No room for worker, skipping"),
        }
    }

    placed
}

/// A random spot on the worker ring around `center`, used for purchased units.
pub fn ring_position(center: Vec2Fixed, rng: &mut SpawnRng) -> Vec2Fixed {
    let angle = std::f32::consts::TAU * rng.next_f32();
    let radius = 2.0 + rng.next_f32() * 1.5;
    polar(center, angle, radius)
}

/// Pick one or two resource nodes around a new base.
///
/// Nodes sit four to five units out and start with 40 to 99 units.
pub fn node_placements(center: Vec2Fixed, rng: &mut SpawnRng) -> Vec<NodePlacement> {
    let count = rng.next_range(1, 3);
    (0..count)
        .map(|i| {
            let angle = std::f32::consts::TAU * i as f32 / count as f32 + rng.next_f32() * 0.5;
            let radius = 4.0 + rng.next_f32();
            NodePlacement {
                position: polar(center, angle, radius),
                amount: rng.next_range(40, 100),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rng_is_deterministic() {
        let mut a = SpawnRng::new(42);
        let mut b = SpawnRng::new(42);
        for _ in 0..100 {
            assert_eq!(a.next_range(0, 1000), b.next_range(0, 1000));
        }
    }

    #[test]
    fn test_rng_ranges() {
        let mut rng = SpawnRng::new(1);
        for _ in 0..1000 {
            let f = rng.next_f32();
            assert!((0.0..1.0).contains(&f));
            let n = rng.next_range(40, 100);
            assert!((40..100).contains(&n));
        }
        assert_eq!(rng.next_range(5, 5), 5);
    }

    #[test]
    fn test_worker_positions_ring_and_separation() {
        let config = SimConfig::default();
        let mut rng = SpawnRng::new(config.seed);
        let center = Vec2Fixed::from_ints(10, -4);

        let spots = worker_positions(center, &[], &config, &mut rng);
        assert!(!spots.is_empty());
        assert!(spots.len() <= 4);

        let min_sq = config.min_worker_separation * config.min_worker_separation;
        for (i, a) in spots.iter().enumerate() {
            let r = a.distance(center);
            assert!(r >= Fixed::from_num(1.99) && r <= Fixed::from_num(3.51), "radius {r}");
            for b in &spots[i + 1..] {
                assert!(a.distance_squared(*b) >= min_sq);
            }
        }
    }

    #[test]
    fn test_crowded_area_skips_workers() {
        let config = SimConfig::default();
        let mut rng = SpawnRng::new(3);
        let center = Vec2Fixed::ZERO;

        // Blanket the whole spawn ring so no candidate is clear.
        let mut occupied = Vec::new();
        for x in -5..=5 {
            for y in -5..=5 {
                occupied.push(Vec2Fixed::from_ints(x, y));
            }
        }

        assert!(worker_positions(center, &occupied, &config, &mut rng).is_empty());
    }

    #[test]
    fn test_ring_position_radius() {
        let mut rng = SpawnRng::new(5);
        for _ in 0..20 {
            let r = ring_position(Vec2Fixed::ZERO, &mut rng).length();
            assert!(r >= Fixed::from_num(1.99) && r <= Fixed::from_num(3.51));
        }
    }

    #[test]
    fn test_node_placements() {
        let mut rng = SpawnRng::new(9);
        let center = Vec2Fixed::from_ints(3, 3);
        for _ in 0..50 {
            let nodes = node_placements(center, &mut rng);
            assert!((1..=2).contains(&nodes.len()));
            for node in nodes {
                assert!((40..100).contains(&node.amount));
                let r = node.position.distance(center);
                assert!(r >= Fixed::from_num(3.99) && r <= Fixed::from_num(5.01));
            }
        }
    }
}
