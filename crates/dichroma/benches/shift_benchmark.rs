//! Benchmarks for the world-shift hot paths: the full toggle dispatch over
//! a populated scene, and steady-state ticks with plate heartbeats.

use criterion::{criterion_group, criterion_main, Criterion};

use dichroma::{GameConfig, InputState, PlateBehavior, Simulation, Vec2, WorldState};

fn populated_sim() -> Simulation {
    let config = GameConfig {
        start_world: WorldState::Black,
        ..GameConfig::default()
    };
    let mut sim = Simulation::new(config, Vec2::new(0.0, 0.7));

    sim.spawn_solid(WorldState::Black, Vec2::new(0.0, 0.0), 40.0, 0.5)
        .expect("floor");
    sim.spawn_solid(WorldState::White, Vec2::new(0.0, 6.0), 40.0, 0.5)
        .expect("ceiling");

    // A row of plates with blocks on them: worst case for dispatch and
    // heartbeats.
    for i in 0..16 {
        let x = -15.0 + i as f32 * 2.0;
        sim.spawn_plate(
            WorldState::Black,
            Vec2::new(x, 0.4),
            1.2,
            0.3,
            0.3,
            PlateBehavior::Hold,
        )
        .expect("plate");
        sim.spawn_block(WorldState::Black, Vec2::new(x, 1.2), 0.5)
            .expect("block");
    }

    // Let everything settle and latch.
    let idle = InputState::default();
    for _ in 0..100 {
        sim.tick(&idle);
    }
    sim
}

fn bench_toggle_dispatch(c: &mut Criterion) {
    let mut sim = populated_sim();
    c.bench_function("toggle_dispatch_34_subscribers", |b| {
        b.iter(|| {
            let to = sim.solid_world().opposite();
            sim.force_world(to);
        });
    });
}

fn bench_steady_tick(c: &mut Criterion) {
    let mut sim = populated_sim();
    let idle = InputState::default();
    c.bench_function("steady_tick_heartbeats", |b| {
        b.iter(|| {
            sim.tick(&idle);
        });
    });
}

criterion_group!(benches, bench_toggle_dispatch, bench_steady_tick);
criterion_main!(benches);
