//! # The Simulation
//!
//! Single-threaded, fixed-tick orchestrator. Owns the clock, the collision
//! space, the shift bus, the scene and the player, and runs one
//! deterministic step per [`Simulation::tick`]:
//!
//! 1. clock advance, player timers
//! 2. shift intent (`try_start_shift` - the only driver of the bus toggle)
//! 3. shift machine advance OR ordinary movement
//! 4. block physics
//! 5. sensor diffing and enter/exit routing (occupancy fast path)
//! 6. plate ticks (motion, linger, deferred rebuilds, heartbeats)
//!
//! Nothing here blocks, suspends or reads a wall clock. "Waiting" is
//! always an explicit countdown drained by a later tick.

use dichroma_core::{EntityAllocator, EntityId, FixedClock, Vec2, WorldState};
use dichroma_physics::{
    Body, Collider, ColliderHandle, ColliderKind, Layer, SensorEventKind, Space,
};

use crate::config::GameConfig;
use crate::entities::{Block, Plate, PlateBehavior, Scene, WorldSolid, DEFAULT_INACTIVE_ALPHA};
use crate::error::SpawnError;
use crate::events::{EventBus, EventReceiver, EventSender, GameEvent};
use crate::occupancy::{OccupantKind, SensorRegion};
use crate::player::shift::ShiftContext;
use crate::player::{InputState, Player};
use crate::presence::{PresenceCore, PresenceCtx, WorldPresence};
use crate::shift::{ShiftBus, WorldObserverHost};

/// Resolves subscriber ids to scene entities for the bus dispatch.
///
/// Built on the fly wherever a world change is driven; holds the split
/// borrows the hooks need.
pub struct DispatchHost<'a> {
    /// The scene (dispatch targets).
    pub scene: &'a mut Scene,
    /// The collision space.
    pub space: &'a mut Space,
    /// The simulation clock.
    pub clock: &'a FixedClock,
    /// Outbound event sink.
    pub events: &'a EventSender,
    /// The bus itself (hooks read the view flip through it).
    pub bus: &'a ShiftBus,
}

impl WorldObserverHost for DispatchHost<'_> {
    fn deliver_pre_world_change(&mut self, id: EntityId, from: WorldState, to: WorldState) {
        self.scene
            .deliver_pre_world_change(id, self.space, self.clock.time(), from, to);
    }

    fn deliver_world_changed(&mut self, id: EntityId, to: WorldState) {
        let mut ctx = PresenceCtx {
            space: &mut *self.space,
            clock: self.clock,
            events: self.events,
            view_flipped: self.bus.is_view_flipped(),
        };
        self.scene.deliver_world_changed(id, &mut ctx, to);
    }
}

/// Where to place a plate's sensor region relative to its slab.
fn plate_sensor_offset(owner: WorldState, height: f32, sensor_height: f32) -> Vec2 {
    // Black-world plates are stood on from above; white-world plates are
    // authored upside-down and stood on from below.
    let up = match owner {
        WorldState::Black => Vec2::UP,
        WorldState::White => Vec2::DOWN,
    };
    up * (height / 2.0 + sensor_height / 2.0)
}

/// The simulation.
pub struct Simulation {
    clock: FixedClock,
    space: Space,
    bus: ShiftBus,
    scene: Scene,
    player: Player,
    allocator: EntityAllocator,
    events: EventBus,
    sender: EventSender,
    config: GameConfig,
}

impl Simulation {
    /// Creates a simulation with the player spawned at `player_pos`.
    #[must_use]
    pub fn new(config: GameConfig, player_pos: Vec2) -> Self {
        let mut space = Space::new();
        let mut allocator = EntityAllocator::new();
        let bus = ShiftBus::new(config.start_world);
        let events = EventBus::default();
        let sender = events.sender();

        let player_id = allocator.allocate();
        let collider = space.add_collider(Collider {
            center: player_pos,
            half: Vec2::new(config.player.width / 2.0, config.player.height / 2.0),
            layer: Layer::PLAYER,
            owner: player_id,
            enabled: true,
            blocking: true,
            kind: ColliderKind::Solid,
        });
        let player = Player::new(player_id, config.player, config.shift, player_pos, collider);

        Self {
            clock: FixedClock::new(config.tick_rate),
            space,
            bus,
            scene: Scene::new(),
            player,
            allocator,
            events,
            sender,
            config,
        }
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// The currently solid world.
    #[must_use]
    pub fn solid_world(&self) -> WorldState {
        self.bus.solid_world()
    }

    /// Whether the camera view is inverted.
    #[must_use]
    pub fn is_view_flipped(&self) -> bool {
        self.bus.is_view_flipped()
    }

    /// The simulation clock.
    #[must_use]
    pub fn clock(&self) -> &FixedClock {
        &self.clock
    }

    /// The collision space.
    #[must_use]
    pub fn space(&self) -> &Space {
        &self.space
    }

    /// The player.
    #[must_use]
    pub fn player(&self) -> &Player {
        &self.player
    }

    /// The scene.
    #[must_use]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// The scene, mutable (tests and tooling).
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    /// A receiver for the outbound event stream.
    #[must_use]
    pub fn event_receiver(&self) -> EventReceiver {
        self.events.receiver()
    }

    /// Whether the player is currently grounded.
    #[must_use]
    pub fn player_grounded(&self) -> bool {
        self.player.is_grounded_now(&self.space)
    }

    /// Checks the bus/active-flag consistency invariant over every entity.
    /// Returns the first offender, if any.
    #[must_use]
    pub fn find_inconsistency(&self) -> Option<EntityId> {
        self.scene.find_inconsistency(self.bus.solid_world())
    }

    // ========================================================================
    // SPAWNING
    // ========================================================================

    /// Spawns an always-solid wall (solid in both worlds, not an entity).
    pub fn spawn_wall(&mut self, center: Vec2, width: f32, height: f32) -> ColliderHandle {
        let owner = self.allocator.allocate();
        self.space.add_collider(Collider {
            center,
            half: Vec2::new(width / 2.0, height / 2.0),
            layer: Layer::WALL,
            owner,
            enabled: true,
            blocking: true,
            kind: ColliderKind::Solid,
        })
    }

    /// Spawns a static world-bound solid.
    pub fn spawn_solid(
        &mut self,
        owner_world: WorldState,
        center: Vec2,
        width: f32,
        height: f32,
    ) -> Result<EntityId, SpawnError> {
        if width <= 0.0 || height <= 0.0 {
            return Err(SpawnError::DegenerateCollider { width, height });
        }
        let id = self.allocator.allocate();
        let core = PresenceCore::new(owner_world, self.bus.solid_world());
        let collider = self.space.add_collider(Collider {
            center,
            half: Vec2::new(width / 2.0, height / 2.0),
            layer: Layer::SOLID,
            owner: id,
            enabled: core.is_active(),
            blocking: true,
            kind: ColliderKind::Solid,
        });
        self.scene
            .add_solid(WorldSolid::new(id, core, collider, DEFAULT_INACTIVE_ALPHA));
        self.bus.subscribe(id);
        Ok(id)
    }

    /// Spawns a movable block.
    pub fn spawn_block(
        &mut self,
        owner_world: WorldState,
        center: Vec2,
        size: f32,
    ) -> Result<EntityId, SpawnError> {
        if size <= 0.0 {
            return Err(SpawnError::DegenerateCollider {
                width: size,
                height: size,
            });
        }
        let id = self.allocator.allocate();
        let core = PresenceCore::new(owner_world, self.bus.solid_world());
        let half = Vec2::new(size / 2.0, size / 2.0);
        let collider = self.space.add_collider(Collider {
            center,
            half,
            layer: Layer::SOLID.union(Layer::BLOCK),
            owner: id,
            enabled: core.is_active(),
            blocking: true,
            kind: ColliderKind::Solid,
        });
        let body = Body::new(center, half);
        self.scene.add_block(Block::new(id, core, body, collider));
        self.bus.subscribe(id);
        Ok(id)
    }

    /// Spawns a pressure plate. The sensor region sits on the standable
    /// side of the slab.
    pub fn spawn_plate(
        &mut self,
        owner_world: WorldState,
        center: Vec2,
        width: f32,
        height: f32,
        sensor_height: f32,
        behavior: PlateBehavior,
    ) -> Result<EntityId, SpawnError> {
        if width <= 0.0 || height <= 0.0 {
            return Err(SpawnError::DegenerateCollider { width, height });
        }
        if sensor_height <= 0.0 {
            // A plate with no sensor region can never observe occupancy:
            // refuse it at spawn instead of faulting at runtime.
            tracing::error!(
                "plate at ({:.2}, {:.2}) spawned without a sensor region; disabled",
                center.x,
                center.y
            );
            return Err(SpawnError::MissingSensor {
                x: center.x,
                y: center.y,
            });
        }

        let id = self.allocator.allocate();
        let core = PresenceCore::new(owner_world, self.bus.solid_world());
        let detect_mask = Layer::PLAYER.union(Layer::BLOCK);

        let body_offset = Vec2::ZERO;
        let body_collider = self.space.add_collider(Collider {
            center: center + body_offset,
            half: Vec2::new(width / 2.0, height / 2.0),
            layer: Layer::SOLID,
            owner: id,
            enabled: core.is_active(),
            blocking: true,
            kind: ColliderKind::Solid,
        });

        let sensor_offset = plate_sensor_offset(owner_world, height, sensor_height);
        let sensor_handle = self.space.add_collider(Collider {
            center: center + sensor_offset,
            half: Vec2::new(width / 2.0, sensor_height / 2.0),
            layer: Layer::NONE,
            owner: id,
            enabled: core.is_active(),
            blocking: false,
            kind: ColliderKind::Sensor { detect_mask },
        });
        let sensor = SensorRegion {
            handle: sensor_handle,
            detect_mask,
            owner: id,
        };

        self.scene.add_plate(Plate::new(
            id,
            core,
            behavior,
            self.config.plate,
            center,
            body_collider,
            body_offset,
            sensor,
            sensor_offset,
        ));
        self.bus.subscribe(id);
        Ok(id)
    }

    // ========================================================================
    // EXTERNAL CONTROL
    // ========================================================================

    /// Hard-cancels an in-flight shift (level reload collaborator).
    pub fn force_cancel_shift_for_reload(&mut self) {
        self.player.force_cancel_for_reload(&mut self.space);
    }

    /// Forces the solid world (level load/reload collaborator). Goes
    /// through the full broadcast so every entity stays consistent.
    pub fn force_world(&mut self, to: WorldState) {
        let Self {
            scene,
            space,
            clock,
            sender,
            bus,
            ..
        } = self;
        let from = bus.solid_world();
        let changed = {
            let mut host = DispatchHost {
                scene,
                space,
                clock,
                events: sender,
                bus,
            };
            bus.set_world(to, &mut host)
        };
        if changed {
            sender.send(GameEvent::WorldShifted { from, to });
        }
    }

    /// Teleports a block (tests, scripted puzzles).
    pub fn teleport_block(&mut self, block: EntityId, to: Vec2, grid: f32) {
        let Self {
            scene,
            space,
            clock,
            sender,
            bus,
            ..
        } = self;
        let mut ctx = PresenceCtx {
            space,
            clock,
            events: sender,
            view_flipped: bus.is_view_flipped(),
        };
        if let Some(entity) = scene.block_mut(block) {
            entity.teleport_to(&mut ctx, to, grid);
        }
    }

    // ========================================================================
    // THE TICK
    // ========================================================================

    /// Runs one fixed simulation step.
    pub fn tick(&mut self, input: &InputState) {
        self.clock.advance();
        let dt = self.clock.fixed_dt();

        let Self {
            clock,
            space,
            bus,
            scene,
            player,
            sender,
            ..
        } = self;

        player.advance_shift_timers(dt);

        // Shift intent. The player transition controller is the only
        // driver of the bus toggle.
        if input.shift_pressed && !player.is_shifting() {
            let mut ctx = ShiftContext {
                space: &mut *space,
                bus: &*bus,
                scene: &mut *scene,
                clock: &*clock,
                events: &*sender,
            };
            player.try_start_shift(&mut ctx);
        }

        // Maneuver advance or ordinary movement; never both.
        if player.is_shifting() {
            let mut ctx = ShiftContext {
                space: &mut *space,
                bus: &*bus,
                scene: &mut *scene,
                clock: &*clock,
                events: &*sender,
            };
            player.advance_shift(&mut ctx);
        } else {
            player.fixed_tick_movement(input, space, dt, bus.is_view_flipped());
        }

        // Block physics.
        {
            let mut ctx = PresenceCtx {
                space: &mut *space,
                clock: &*clock,
                events: &*sender,
                view_flipped: bus.is_view_flipped(),
            };
            for block in scene.blocks_mut() {
                block.fixed_tick(&mut ctx);
            }
        }

        // Sensor diffing, then the occupancy fast path.
        space.update_sensors();
        let sensor_events = space.drain_sensor_events();
        let now = clock.time();
        for event in sensor_events {
            let changed = match event.kind {
                SensorEventKind::Enter => {
                    let Some(kind) = space
                        .get(event.other)
                        .map(|c| c.layer)
                        .and_then(OccupantKind::from_layer)
                    else {
                        continue;
                    };
                    scene
                        .plate_mut(event.sensor_owner)
                        .map(|plate| plate.note_enter(event.other_owner, kind, now))
                }
                SensorEventKind::Exit => scene
                    .plate_mut(event.sensor_owner)
                    .map(|plate| plate.note_exit(event.other_owner)),
            };

            if changed == Some(true) {
                let mut ctx = PresenceCtx {
                    space: &mut *space,
                    clock: &*clock,
                    events: &*sender,
                    view_flipped: bus.is_view_flipped(),
                };
                if let Some(plate) = scene.plate_mut(event.sensor_owner) {
                    plate.on_occupancy_changed(&mut ctx);
                }
            }
        }

        // Plate ticks: motion, linger, deferred rebuilds, heartbeats.
        for plate in scene.plates_mut() {
            let mut ctx = PresenceCtx {
                space: &mut *space,
                clock: &*clock,
                events: &*sender,
                view_flipped: bus.is_view_flipped(),
            };
            plate.fixed_tick(&mut ctx);
        }

        debug_assert!(
            self.find_inconsistency().is_none(),
            "world/active-flag consistency violated"
        );
    }
}
