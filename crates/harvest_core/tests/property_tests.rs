//! Property tests for the resource and combat invariants.

use harvest_core::combat::take_damage;
use harvest_core::prelude::*;
use harvest_test_utils::determinism::strategies::{
    arb_amount, arb_damage, arb_health, arb_request, arb_script, arb_vec2_position, Action,
};
use harvest_test_utils::fixtures::{busy_colony, pos};
use proptest::prelude::*;

proptest! {
    /// Node amounts only go down, and what was taken adds up to what left.
    #[test]
    fn prop_collect_is_monotone_and_conserving(
        amount in arb_amount(),
        requests in proptest::collection::vec(arb_request(), 1..80),
    ) {
        let mut visuals = NullVisuals::default();
        let mut nodes = ResourceRegistry::new();
        let id = nodes.create(&mut visuals, pos(1, 1), amount).expect("positive amount");

        let mut remaining = amount;
        let mut taken_total = 0u32;
        for request in requests {
            let collection = nodes.collect(&mut visuals, id, request);
            prop_assert!(collection.taken <= request);
            prop_assert!(collection.taken <= remaining);
            remaining -= collection.taken;
            taken_total += collection.taken;

            match nodes.amount(id) {
                Some(left) => {
                    prop_assert_eq!(left, remaining);
                    prop_assert!(left > 0);
                    prop_assert!(!collection.depleted);
                }
                None => prop_assert_eq!(remaining, 0),
            }
        }
        prop_assert_eq!(taken_total + remaining, amount);
    }

    /// Nearest always returns a node at least as close as every other node.
    #[test]
    fn prop_nearest_is_closest(
        from in arb_vec2_position(),
        spots in proptest::collection::vec((arb_vec2_position(), arb_amount()), 1..12),
    ) {
        let mut visuals = NullVisuals::default();
        let mut nodes = ResourceRegistry::new();
        for (at, amount) in &spots {
            nodes.create(&mut visuals, *at, *amount);
        }

        let best = nodes.nearest(from).expect("non-empty");
        let best_sq = nodes.get(best).map(|n| n.position.distance_squared(from)).expect("live");
        for (_, node) in nodes.iter() {
            prop_assert!(best_sq <= node.position.distance_squared(from));
        }
    }

    /// Health never rises, and a unit dies at most once.
    #[test]
    fn prop_health_is_monotone(
        health in arb_health(),
        hits in proptest::collection::vec(arb_damage(), 1..40),
    ) {
        let mut visuals = NullVisuals::default();
        let mut workers: Registry<WorkerId, Worker> = Registry::new();
        let handle = visuals.create_visual(VisualKind::Worker, Vec2Fixed::ZERO);
        let id = workers.insert(Worker::new(BaseId::default(), Vec2Fixed::ZERO, health, handle));

        let mut last = health;
        let mut deaths = 0;
        for damage in hits {
            match take_damage(&mut workers, &mut visuals, id, damage) {
                DamageOutcome::Survived { remaining } => {
                    prop_assert!(remaining <= last);
                    prop_assert!(remaining > 0);
                    last = remaining;
                }
                DamageOutcome::Died => {
                    deaths += 1;
                    last = 0;
                }
                DamageOutcome::Missing => prop_assert_eq!(last, 0),
                DamageOutcome::Immune => prop_assert!(false, "workers always have health"),
            }
        }
        prop_assert!(deaths <= 1);
        prop_assert_eq!(workers.contains(id), deaths == 0);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Whatever the script, resources are neither created by harvesting nor lost.
    #[test]
    fn prop_harvest_conserves_resources(seed in 0u64..500, script in arb_script(10)) {
        let mut sim = busy_colony(seed);
        let mut supplied = sim.nodes().total_available();
        let mut wiped = 0u64;

        for action in script {
            match action {
                Action::CreateResource(_, amount) => supplied += u64::from(amount),
                Action::ResetResources => wiped += sim.nodes().total_available(),
                _ => {}
            }
            action.apply(&mut sim);

            let carried: u64 = sim.workers().values().map(|w| u64::from(w.carried())).sum();
            let accounted = sim.bank().collected_total
                + carried
                + sim.nodes().total_available()
                + wiped;
            // Loads carried by killed workers vanish with them, so only an upper bound holds.
            prop_assert!(accounted <= supplied);
        }
    }
}
