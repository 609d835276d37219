//! Ordered entity storage with generational handles.
//!
//! A [`Registry`] owns every live entity of one kind. Ids are generational
//! slotmap keys, so a reference held across ticks is validated by a plain
//! lookup: once an entity is removed its id never resolves again, even if
//! the slot is reused.
//!
//! Iteration follows insertion order and removal keeps the relative order of
//! the survivors. Nearest-neighbour queries depend on that order for their
//! tie-break, which keeps them deterministic.

use slotmap::{new_key_type, Key, SlotMap};

use crate::math::{Fixed, Vec2Fixed};

new_key_type! {
    /// Handle to a [`ResourceNode`](crate::economy::ResourceNode).
    pub struct NodeId;
    /// Handle to a [`Worker`](crate::worker::Worker).
    pub struct WorkerId;
    /// Handle to a [`Hostile`](crate::hostile::Hostile).
    pub struct HostileId;
    /// Handle to a [`Defender`](crate::defender::Defender).
    pub struct DefenderId;
    /// Handle to a [`Base`](crate::spawn::Base).
    pub struct BaseId;
}

/// Anything with a position on the ground plane.
pub trait Positioned {
    /// Current position.
    fn position(&self) -> Vec2Fixed;
}

/// Ordered arena of entities of one kind.
#[derive(Debug, Clone)]
pub struct Registry<K: Key, T> {
    slots: SlotMap<K, T>,
    order: Vec<K>,
}

impl<K: Key, T> Default for Registry<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Key, T> Registry<K, T> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: SlotMap::with_key(),
            order: Vec::new(),
        }
    }

    /// Append an entity and return its id.
    pub fn insert(&mut self, value: T) -> K {
        let id = self.slots.insert(value);
        self.order.push(id);
        id
    }

    /// Append an entity that needs to know its own id.
    pub fn insert_with_key(&mut self, f: impl FnOnce(K) -> T) -> K {
        let id = self.slots.insert_with_key(f);
        self.order.push(id);
        id
    }

    /// Remove an entity. Removing a stale id is a no-op returning `None`.
    pub fn remove(&mut self, id: K) -> Option<T> {
        let value = self.slots.remove(id)?;
        if let Some(index) = self.order.iter().position(|&k| k == id) {
            self.order.remove(index);
        }
        Some(value)
    }

    /// Remove everything, yielding the entities in registry order.
    pub fn drain(&mut self) -> Vec<T> {
        let order = std::mem::take(&mut self.order);
        let drained = order
            .into_iter()
            .filter_map(|id| self.slots.remove(id))
            .collect();
        self.slots.clear();
        drained
    }

    /// Look up a live entity.
    #[must_use]
    pub fn get(&self, id: K) -> Option<&T> {
        self.slots.get(id)
    }

    /// Look up a live entity mutably.
    pub fn get_mut(&mut self, id: K) -> Option<&mut T> {
        self.slots.get_mut(id)
    }

    /// Whether `id` still refers to a live entity.
    #[must_use]
    pub fn contains(&self, id: K) -> bool {
        self.slots.contains_key(id)
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Snapshot of the ids in registry order.
    ///
    /// Drivers iterate the snapshot so entities may be removed mid-pass.
    #[must_use]
    pub fn ids(&self) -> Vec<K> {
        self.order.clone()
    }

    /// Iterate `(id, entity)` pairs in registry order.
    pub fn iter(&self) -> impl Iterator<Item = (K, &T)> + '_ {
        self.order
            .iter()
            .filter_map(move |&id| self.slots.get(id).map(|value| (id, value)))
    }

    /// Iterate entities in registry order.
    pub fn values(&self) -> impl Iterator<Item = &T> + '_ {
        self.iter().map(|(_, value)| value)
    }
}

impl<K: Key, T: Positioned> Registry<K, T> {
    /// Nearest entity to `from` that passes `filter`.
    ///
    /// Returns the id and the squared distance. Ties go to the entity that
    /// comes first in registry order.
    pub fn nearest_where(
        &self,
        from: Vec2Fixed,
        mut filter: impl FnMut(&T) -> bool,
    ) -> Option<(K, Fixed)> {
        let mut best: Option<(K, Fixed)> = None;
        for (id, value) in self.iter() {
            if !filter(value) {
                continue;
            }
            let dist_sq = from.distance_squared(value.position());
            match best {
                Some((_, best_sq)) if dist_sq >= best_sq => {}
                _ => best = Some((id, dist_sq)),
            }
        }
        best
    }

    /// Nearest entity to `from`.
    pub fn nearest(&self, from: Vec2Fixed) -> Option<(K, Fixed)> {
        self.nearest_where(from, |_| true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Dot(Vec2Fixed);

    impl Positioned for Dot {
        fn position(&self) -> Vec2Fixed {
            self.0
        }
    }

    #[test]
    fn test_insert_preserves_order() {
        let mut reg: Registry<WorkerId, Dot> = Registry::new();
        let a = reg.insert(Dot(Vec2Fixed::from_ints(1, 0)));
        let b = reg.insert(Dot(Vec2Fixed::from_ints(2, 0)));
        let c = reg.insert(Dot(Vec2Fixed::from_ints(3, 0)));
        assert_eq!(reg.ids(), vec![a, b, c]);

        reg.remove(b);
        assert_eq!(reg.ids(), vec![a, c]);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut reg: Registry<WorkerId, Dot> = Registry::new();
        let a = reg.insert(Dot(Vec2Fixed::ZERO));
        let b = reg.insert(Dot(Vec2Fixed::ZERO));

        assert!(reg.remove(a).is_some());
        assert!(reg.remove(a).is_none());
        assert_eq!(reg.len(), 1);
        assert!(reg.contains(b));
    }

    #[test]
    fn test_stale_id_does_not_resolve_after_slot_reuse() {
        let mut reg: Registry<NodeId, Dot> = Registry::new();
        let old = reg.insert(Dot(Vec2Fixed::ZERO));
        reg.remove(old);
        let new = reg.insert(Dot(Vec2Fixed::from_ints(5, 5)));

        assert_ne!(old, new);
        assert!(reg.get(old).is_none());
        assert!(reg.get(new).is_some());
    }

    #[test]
    fn test_nearest_picks_minimum_distance() {
        let mut reg: Registry<WorkerId, Dot> = Registry::new();
        reg.insert(Dot(Vec2Fixed::from_ints(10, 0)));
        let near = reg.insert(Dot(Vec2Fixed::from_ints(2, 0)));
        reg.insert(Dot(Vec2Fixed::from_ints(-5, 0)));

        let (id, dist_sq) = reg.nearest(Vec2Fixed::ZERO).expect("non-empty");
        assert_eq!(id, near);
        assert_eq!(dist_sq, Fixed::from_num(4));
    }

    #[test]
    fn test_nearest_tie_goes_to_first_inserted() {
        let mut reg: Registry<WorkerId, Dot> = Registry::new();
        let first = reg.insert(Dot(Vec2Fixed::from_ints(3, 0)));
        reg.insert(Dot(Vec2Fixed::from_ints(-3, 0)));
        reg.insert(Dot(Vec2Fixed::from_ints(0, 3)));

        assert_eq!(reg.nearest(Vec2Fixed::ZERO).map(|(id, _)| id), Some(first));
    }

    #[test]
    fn test_nearest_respects_filter() {
        let mut reg: Registry<WorkerId, Dot> = Registry::new();
        reg.insert(Dot(Vec2Fixed::from_ints(1, 0)));
        let far = reg.insert(Dot(Vec2Fixed::from_ints(9, 0)));

        let found = reg.nearest_where(Vec2Fixed::ZERO, |d| d.0.x > Fixed::from_num(5));
        assert_eq!(found.map(|(id, _)| id), Some(far));
    }

    #[test]
    fn test_nearest_with_far_away_entities() {
        let mut reg: Registry<NodeId, Dot> = Registry::new();
        reg.insert(Dot(Vec2Fixed::from_ints(50_000, 0)));
        let near = reg.insert(Dot(Vec2Fixed::from_ints(100, 0)));
        reg.insert(Dot(Vec2Fixed::from_ints(-60_000, 60_000)));

        assert_eq!(reg.nearest(Vec2Fixed::ZERO).map(|(id, _)| id), Some(near));
    }

    #[test]
    fn test_nearest_on_empty_registry() {
        let reg: Registry<WorkerId, Dot> = Registry::new();
        assert!(reg.nearest(Vec2Fixed::ZERO).is_none());
    }

    #[test]
    fn test_drain_yields_in_order_and_empties() {
        let mut reg: Registry<WorkerId, Dot> = Registry::new();
        reg.insert(Dot(Vec2Fixed::from_ints(1, 0)));
        reg.insert(Dot(Vec2Fixed::from_ints(2, 0)));

        let drained = reg.drain();
        assert_eq!(
            drained,
            vec![
                Dot(Vec2Fixed::from_ints(1, 0)),
                Dot(Vec2Fixed::from_ints(2, 0))
            ]
        );
        assert!(reg.is_empty());
    }
}
