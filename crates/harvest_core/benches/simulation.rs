//! Simulation benchmarks for harvest_core.
//!
//! Run with: `cargo bench -p harvest_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use harvest_core::prelude::*;

fn colony(bases: i32, hostiles: i32) -> Simulation {
    let mut sim = Simulation::new();
    for i in 0..bases {
        sim.create_base(Vec2Fixed::from_ints(i * 12, 0));
    }
    for i in 0..hostiles {
        sim.spawn_hostile(Vec2Fixed::from_ints(i * 3 - 20, 25), None);
    }
    sim.assign_idle_to_nearest();
    sim
}

/// Ticks a mid-sized colony with and without hostile pressure.
pub fn simulation_benchmark(c: &mut Criterion) {
    c.bench_function("harvest_8_bases_100_ticks", |b| {
        b.iter_batched(
            || colony(8, 0),
            |mut sim| {
                for _ in 0..100 {
                    black_box(sim.tick());
                }
                sim
            },
            BatchSize::SmallInput,
        );
    });

    c.bench_function("siege_8_bases_16_hostiles_100_ticks", |b| {
        b.iter_batched(
            || colony(8, 16),
            |mut sim| {
                for _ in 0..100 {
                    black_box(sim.tick());
                }
                sim
            },
            BatchSize::SmallInput,
        );
    });

    c.bench_function("state_hash", |b| {
        let sim = colony(8, 16);
        b.iter(|| black_box(sim.state_hash()));
    });
}

criterion_group!(benches, simulation_benchmark);
criterion_main!(benches);
