//! # Shift Consistency Integration Tests
//!
//! Drives whole simulations through shifts, rollbacks and latch races and
//! checks the engine-level guarantees: world/active-flag consistency,
//! transition safety, and the cross-world latch surviving the collider
//! enable-order race.

use dichroma::{
    GameConfig, GameEvent, InputState, PlateBehavior, ShiftFailReason, ShiftOutcome, Simulation,
    Vec2, WorldState,
};

const IDLE: InputState = InputState {
    move_x: 0.0,
    jump_pressed: false,
    shift_pressed: false,
};

const SHIFT: InputState = InputState {
    move_x: 0.0,
    jump_pressed: false,
    shift_pressed: true,
};

fn black_start_config() -> GameConfig {
    GameConfig {
        start_world: WorldState::Black,
        ..GameConfig::default()
    }
}

/// A room with a black floor to stand on and a white slab overhead to land
/// on after the flip (inverted gravity pulls the player up onto its
/// underside).
fn basic_room() -> Simulation {
    let mut sim = Simulation::new(black_start_config(), Vec2::new(0.0, 0.7));
    sim.spawn_solid(WorldState::Black, Vec2::new(0.0, 0.0), 8.0, 0.5)
        .expect("floor");
    sim.spawn_solid(WorldState::White, Vec2::new(0.0, 4.0), 8.0, 0.5)
        .expect("white landing slab");
    sim
}

fn settle_on_ground(sim: &mut Simulation) {
    for _ in 0..50 {
        sim.tick(&IDLE);
    }
    assert!(sim.player_grounded(), "player should settle onto the floor");
}

fn run_shift_to_completion(sim: &mut Simulation) {
    sim.tick(&SHIFT);
    assert!(sim.player().is_shifting(), "shift should launch");
    for _ in 0..120 {
        sim.tick(&IDLE);
        if !sim.player().is_shifting() {
            return;
        }
    }
    panic!("shift never completed (failsafe should have bounded this)");
}

#[test]
fn test_shift_with_empty_destination_commits() {
    let mut sim = basic_room();
    settle_on_ground(&mut sim);
    let start_world = sim.solid_world();

    run_shift_to_completion(&mut sim);

    assert_eq!(sim.player().last_shift_outcome(), Some(ShiftOutcome::Committed));
    assert_eq!(sim.solid_world(), start_world.opposite());
    assert!(sim.is_view_flipped());
    // Gravity inverted with the world.
    assert!(sim.player().gravity_scale() < 0.0);
    assert!(sim.find_inconsistency().is_none());

    // The player floats up and lands on the white slab's underside.
    for _ in 0..200 {
        sim.tick(&IDLE);
        if sim.player_grounded() {
            break;
        }
    }
    assert!(sim.player_grounded(), "player should land in the white world");
    assert!(sim.player().position().y > 0.7);
}

#[test]
fn test_shift_into_blocked_destination_rolls_back() {
    let mut sim = Simulation::new(black_start_config(), Vec2::new(0.0, 0.7));
    sim.spawn_solid(WorldState::Black, Vec2::new(0.0, 0.0), 8.0, 0.5)
        .expect("floor");
    // The entire space below the floor is white-solid, reaching up past
    // the pass-through destination: the player arrives fully inside it and
    // the clamped push-out cannot walk far enough to escape.
    sim.spawn_solid(WorldState::White, Vec2::new(0.0, -24.8), 100.0, 50.0)
        .expect("white mega block");

    settle_on_ground(&mut sim);
    let before_pos = sim.player().position();
    let before_gravity = sim.player().gravity_scale();

    run_shift_to_completion(&mut sim);

    assert_eq!(
        sim.player().last_shift_outcome(),
        Some(ShiftOutcome::RolledBack)
    );
    // World, gravity and position all restored.
    assert_eq!(sim.solid_world(), WorldState::Black);
    assert_eq!(sim.player().gravity_scale(), before_gravity);
    let pos = sim.player().position();
    assert!(
        (pos.x - before_pos.x).abs() < 1e-4 && (pos.y - before_pos.y).abs() < 1e-4,
        "rollback must restore the exact pre-shift position, got ({}, {})",
        pos.x,
        pos.y
    );
    assert!(sim.find_inconsistency().is_none());

    let events = sim.event_receiver().drain();
    assert!(
        events
            .iter()
            .any(|e| matches!(e, GameEvent::ShiftRolledBack)),
        "rollback should be reported on the event bus"
    );
}

#[test]
fn test_double_toggle_round_trips_every_entity() {
    let mut sim = basic_room();
    let _plate = sim
        .spawn_plate(
            WorldState::Black,
            Vec2::new(2.0, 0.4),
            1.0,
            0.3,
            0.3,
            PlateBehavior::Hold,
        )
        .expect("plate");
    settle_on_ground(&mut sim);

    let world_before = sim.solid_world();
    sim.force_world(world_before.opposite());
    assert!(sim.find_inconsistency().is_none());
    sim.force_world(world_before);
    assert!(sim.find_inconsistency().is_none());
    assert_eq!(sim.solid_world(), world_before);
}

#[test]
fn test_airborne_shift_is_refused_with_feedback() {
    // No floor at all: the player is falling.
    let mut sim = Simulation::new(black_start_config(), Vec2::new(0.0, 5.0));
    let receiver = sim.event_receiver();
    sim.tick(&IDLE);

    sim.tick(&SHIFT);

    assert!(!sim.player().is_shifting());
    assert_eq!(sim.solid_world(), WorldState::Black);
    let events = receiver.drain();
    assert!(
        events.iter().any(|e| matches!(
            e,
            GameEvent::ShiftFailed {
                reason: ShiftFailReason::Unsupported
            }
        )),
        "airborne shift should emit failure feedback"
    );
}

#[test]
fn test_shift_on_wall_is_refused() {
    let mut sim = Simulation::new(black_start_config(), Vec2::new(0.0, 0.7));
    sim.spawn_wall(Vec2::new(0.0, 0.0), 8.0, 0.5);
    settle_on_ground(&mut sim);
    let receiver = sim.event_receiver();
    let _ = receiver.drain();

    sim.tick(&SHIFT);

    assert!(!sim.player().is_shifting());
    assert_eq!(sim.solid_world(), WorldState::Black);
    let events = receiver.drain();
    assert!(events.iter().any(|e| matches!(
        e,
        GameEvent::ShiftFailed {
            reason: ShiftFailReason::StandingOnWall
        }
    )));
}

/// The canonical latch scenario: a block parked on a plate holds the
/// plate's condition across a full away-and-back double shift, even though
/// the block's collider is still disabled on the tick the plate rebuilds
/// its occupancy (the plate subscribed first, so it reactivates first).
#[test]
fn test_block_latch_survives_double_shift() {
    let mut sim = basic_room();
    let plate_id = sim
        .spawn_plate(
            WorldState::Black,
            Vec2::new(2.0, 0.4),
            1.2,
            0.3,
            0.3,
            PlateBehavior::Hold,
        )
        .expect("plate");
    let _block = sim
        .spawn_block(WorldState::Black, Vec2::new(2.0, 1.2), 0.5)
        .expect("block");

    // Let the block fall onto the plate and the sensor notice it.
    for _ in 0..60 {
        sim.tick(&IDLE);
    }
    {
        let plate = sim.scene_mut().plate_mut(plate_id).expect("plate exists");
        assert!(plate.has_occupant(), "block should be standing on the plate");
        assert!(plate.is_on(), "plate should be pressed");
        assert!(plate.is_latched(), "block presence should latch");
    }

    // Shift away: the plate's world goes intangible.
    sim.force_world(WorldState::White);
    {
        let plate = sim.scene_mut().plate_mut(plate_id).expect("plate exists");
        assert!(!plate.is_visible());
        assert!(plate.is_on(), "latched plate stays on across the shift");
        assert!(plate.is_latched());
    }

    // A few ticks in the other world; the latch must not decay while the
    // plate is inactive.
    for _ in 0..20 {
        sim.tick(&IDLE);
    }

    // Shift back. The plate reactivates BEFORE the block in dispatch
    // order, so its immediate rebuild sees nothing; the deferred rebuild
    // must still conclude "latched" within its retry budget.
    sim.force_world(WorldState::Black);
    for _ in 0..10 {
        sim.tick(&IDLE);
    }
    {
        let plate = sim.scene_mut().plate_mut(plate_id).expect("plate exists");
        assert!(plate.is_visible());
        assert!(plate.is_on(), "plate must still be on after the round trip");
        assert!(plate.is_latched());
        assert!(
            plate.has_occupant(),
            "deferred rebuild should have found the block"
        );
    }
    assert!(sim.find_inconsistency().is_none());
}

/// A player on a plate does NOT hold it across a shift: shifting away is
/// stepping off.
#[test]
fn test_player_does_not_latch_plate() {
    let mut sim = basic_room();
    let plate_id = sim
        .spawn_plate(
            WorldState::Black,
            Vec2::new(0.0, 0.4),
            1.2,
            0.3,
            0.4,
            PlateBehavior::Hold,
        )
        .expect("plate");

    // The player spawns above the plate and settles onto it.
    for _ in 0..60 {
        sim.tick(&IDLE);
    }
    {
        let plate = sim.scene_mut().plate_mut(plate_id).expect("plate exists");
        assert!(plate.has_occupant(), "player should be on the plate");
        assert!(plate.is_on());
        assert!(!plate.is_latched(), "players never latch");
    }

    sim.force_world(WorldState::White);
    {
        let plate = sim.scene_mut().plate_mut(plate_id).expect("plate exists");
        assert!(!plate.is_on(), "player-held plate releases on shift");
    }
}

/// Latch debounce timing: removed for one tick, the latch holds through
/// the grace window; removed for good, it clears within grace plus one
/// heartbeat interval (plus the final confirm pass).
#[test]
fn test_latch_debounce_bounds() {
    let mut sim = basic_room();
    let plate_id = sim
        .spawn_plate(
            WorldState::Black,
            Vec2::new(2.0, 0.4),
            1.2,
            0.3,
            0.3,
            PlateBehavior::Hold,
        )
        .expect("plate");
    let block_id = sim
        .spawn_block(WorldState::Black, Vec2::new(2.0, 1.2), 0.5)
        .expect("block");

    for _ in 0..60 {
        sim.tick(&IDLE);
    }
    assert!(sim
        .scene_mut()
        .plate_mut(plate_id)
        .expect("plate")
        .is_latched());

    // Teleport the block far away: a position snap, no intermediate
    // motion, exactly the operation the latch must survive gracefully.
    sim.teleport_block(block_id, Vec2::new(50.0, 50.0), 0.0);

    // Within the grace window (0.12s = 6 ticks at 50Hz) the latch holds.
    for _ in 0..3 {
        sim.tick(&IDLE);
    }
    assert!(
        sim.scene_mut()
            .plate_mut(plate_id)
            .expect("plate")
            .is_latched(),
        "latch must not clear within the grace window"
    );

    // Gone for good: grace + heartbeat + confirm is well under a second.
    for _ in 0..50 {
        sim.tick(&IDLE);
    }
    let plate = sim.scene_mut().plate_mut(plate_id).expect("plate");
    assert!(!plate.is_latched(), "latch must clear after a real departure");
    assert!(!plate.is_on());
}

/// Timed plates linger after release instead of dropping instantly.
#[test]
fn test_timed_plate_lingers_after_release() {
    let mut config = black_start_config();
    // No latch for this one: we want the release path, not the hold path.
    config.plate.keep_block_condition_across_worlds = false;

    let mut sim = Simulation::new(config, Vec2::new(-3.0, 0.7));
    sim.spawn_solid(WorldState::Black, Vec2::new(-3.0, 0.0), 2.0, 0.5)
        .expect("player floor");
    let plate_id = sim
        .spawn_plate(
            WorldState::Black,
            Vec2::new(2.0, 0.4),
            1.2,
            0.3,
            0.3,
            PlateBehavior::Timed {
                linger_seconds: 0.3,
            },
        )
        .expect("plate");
    let block_id = sim
        .spawn_block(WorldState::Black, Vec2::new(2.0, 1.2), 0.5)
        .expect("block");

    for _ in 0..60 {
        sim.tick(&IDLE);
    }
    assert!(sim.scene_mut().plate_mut(plate_id).expect("plate").is_on());

    sim.teleport_block(block_id, Vec2::new(50.0, 50.0), 0.0);

    // Still on shortly after release (linger window).
    for _ in 0..5 {
        sim.tick(&IDLE);
    }
    assert!(
        sim.scene_mut().plate_mut(plate_id).expect("plate").is_on(),
        "timed plate should linger after release"
    );

    // Off once the linger expires.
    for _ in 0..30 {
        sim.tick(&IDLE);
    }
    assert!(!sim.scene_mut().plate_mut(plate_id).expect("plate").is_on());
}

/// `force_world` to the current world is a complete no-op.
#[test]
fn test_idempotent_set_world() {
    let mut sim = basic_room();
    settle_on_ground(&mut sim);
    let receiver = sim.event_receiver();
    let _ = receiver.drain();

    sim.force_world(sim.solid_world());

    assert!(receiver.drain().is_empty(), "no events for a no-op set");
    assert!(sim.find_inconsistency().is_none());
}

/// Cancelling mid-flight leaves a usable player (level reload path).
#[test]
fn test_force_cancel_for_reload() {
    let mut sim = basic_room();
    settle_on_ground(&mut sim);

    sim.tick(&SHIFT);
    assert!(sim.player().is_shifting());

    sim.force_cancel_shift_for_reload();
    assert!(!sim.player().is_shifting());

    // The simulation keeps running normally afterwards.
    for _ in 0..50 {
        sim.tick(&IDLE);
    }
    assert!(sim.find_inconsistency().is_none());
}
