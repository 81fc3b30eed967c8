//! # Shift Soak Test
//!
//! Headless torture run: a small two-world room, a plate, a block, and a
//! seeded random input stream mashing move/jump/shift for thousands of
//! ticks. After every tick the world/active-flag consistency invariant is
//! checked; any violation aborts with a diagnostic.
//!
//! Deterministic by construction: same seed, same ticks, same outcome.
//!
//! Usage: `shift_soak [ticks] [seed]`

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::Instant;

use dichroma::{
    GameConfig, GameEvent, InputState, PlateBehavior, ShiftOutcome, Simulation, Vec2, WorldState,
};

fn build_room() -> Simulation {
    let config = GameConfig {
        start_world: WorldState::Black,
        ..GameConfig::default()
    };
    let mut sim = Simulation::new(config, Vec2::new(0.0, 0.7));

    // Black floor and white ceiling: both shift directions have somewhere
    // to land.
    sim.spawn_solid(WorldState::Black, Vec2::new(0.0, 0.0), 12.0, 0.5)
        .expect("black floor");
    sim.spawn_solid(WorldState::White, Vec2::new(0.0, 5.0), 12.0, 0.5)
        .expect("white ceiling");

    // Side walls, always solid, keep everything in the room.
    sim.spawn_wall(Vec2::new(-6.5, 2.5), 1.0, 12.0);
    sim.spawn_wall(Vec2::new(6.5, 2.5), 1.0, 12.0);

    // A plate with a block parked on it: the latch under fire.
    sim.spawn_plate(
        WorldState::Black,
        Vec2::new(3.0, 0.4),
        1.2,
        0.3,
        0.3,
        PlateBehavior::Hold,
    )
    .expect("plate");
    sim.spawn_block(WorldState::Black, Vec2::new(3.0, 1.2), 0.5)
        .expect("block");

    sim
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let ticks: u64 = args
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(20_000);
    let seed: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(0xD1C);

    println!("==============================================================");
    println!(" DICHROMA SHIFT SOAK - {ticks} ticks, seed {seed:#x}");
    println!("==============================================================");

    let mut sim = build_room();
    let receiver = sim.event_receiver();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut shifts_committed = 0u64;
    let mut shifts_rolled_back = 0u64;
    let mut shift_failures = 0u64;
    let mut plate_changes = 0u64;
    let mut was_shifting = false;

    let start = Instant::now();

    for tick in 0..ticks {
        let input = InputState {
            move_x: match rng.gen_range(0..4) {
                0 => -1.0,
                1 => 1.0,
                _ => 0.0,
            },
            jump_pressed: rng.gen_bool(0.05),
            shift_pressed: rng.gen_bool(0.02),
        };

        sim.tick(&input);

        // Outcome accounting on the shifting edge.
        let shifting = sim.player().is_shifting();
        if was_shifting && !shifting {
            match sim.player().last_shift_outcome() {
                Some(ShiftOutcome::Committed) => shifts_committed += 1,
                Some(ShiftOutcome::RolledBack) => shifts_rolled_back += 1,
                None => {}
            }
        }
        was_shifting = shifting;

        for event in receiver.drain() {
            match event {
                GameEvent::ShiftFailed { .. } => shift_failures += 1,
                GameEvent::PlateChanged { .. } => plate_changes += 1,
                _ => {}
            }
        }

        if let Some(offender) = sim.find_inconsistency() {
            eprintln!(
                "CONSISTENCY VIOLATION at tick {}: entity {:?} disagrees with solid world {:?}",
                tick,
                offender,
                sim.solid_world()
            );
            std::process::exit(1);
        }
    }

    let elapsed = start.elapsed();
    let per_tick_us = elapsed.as_micros() as f64 / ticks as f64;

    println!();
    println!("--------------------------------------------------------------");
    println!(" RESULTS");
    println!("--------------------------------------------------------------");
    println!(" Ticks simulated:      {ticks}");
    println!(" Wall time:            {:.2?} ({per_tick_us:.2} us/tick)", elapsed);
    println!(" Final world:          {:?}", sim.solid_world());
    println!(" Shifts committed:     {shifts_committed}");
    println!(" Shifts rolled back:   {shifts_rolled_back}");
    println!(" Shift guard refusals: {shift_failures}");
    println!(" Plate transitions:    {plate_changes}");
    println!(
        " Player at:            ({:.2}, {:.2})",
        sim.player().position().x,
        sim.player().position().y
    );
    println!("--------------------------------------------------------------");
    println!(" Consistency invariant held for every tick. OK.");
}
