//! # Pressure Plates
//!
//! The entity the occupancy latch was built for. A plate is a kinematic
//! slab with a solid top and a child sensor region; its output (`is_on`)
//! drives doors, exits and other puzzle logic through `PlateChanged`
//! events.
//!
//! The cross-world rule: a player standing on a plate releases it when the
//! plate's world goes intangible ("shift away = step off"), but a block
//! parked on it keeps the condition held across arbitrarily many shifts.
//! That asymmetry is the latch.

use dichroma_core::{Ease, EntityId, MoveInterp, Vec2};
use dichroma_physics::{ColliderHandle, Space};
use serde::{Deserialize, Serialize};

use crate::events::GameEvent;
use crate::occupancy::{LatchConfig, OccupancyLatch, OccupantKind, OccupantMap, SensorRegion};
use crate::presence::{PreChangeSnapshot, PresenceCore, PresenceCtx, RebuildStep, WorldPresence};

/// What the plate does with its pressed state.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum PlateBehavior {
    /// On exactly while occupied (or latched).
    Hold,
    /// Stays on for a linger window after the last occupant leaves.
    Timed {
        /// Seconds the output lingers after release.
        linger_seconds: f32,
    },
}

/// Plate tuning.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PlateConfig {
    /// How far the plate sinks when pressed (world units).
    pub sink_distance: f32,
    /// Press motion duration (seconds).
    pub press_duration: f32,
    /// Raise motion duration (seconds).
    pub raise_duration: f32,
    /// Distance considered "fully pressed".
    pub epsilon: f32,
    /// A block parked on the plate holds the condition across shifts.
    pub keep_block_condition_across_worlds: bool,
    /// Physics steps the reactivation rebuild retries before concluding
    /// the plate is empty.
    pub reactivation_retry_ticks: u32,
    /// Latch hysteresis tuning.
    pub latch: LatchConfig,
}

impl Default for PlateConfig {
    fn default() -> Self {
        Self {
            sink_distance: 0.12,
            press_duration: 0.25,
            raise_duration: 0.15,
            epsilon: 0.002,
            keep_block_condition_across_worlds: true,
            reactivation_retry_ticks: 30,
            latch: LatchConfig::default(),
        }
    }
}

/// A pressure plate.
pub struct Plate {
    id: EntityId,
    core: PresenceCore,
    behavior: PlateBehavior,
    config: PlateConfig,

    /// The standable top (layer SOLID).
    body_collider: ColliderHandle,
    /// Offset of the body collider from the plate position.
    body_offset: Vec2,
    /// The sensor region above the top.
    sensor: SensorRegion,
    /// Offset of the sensor from the plate position.
    sensor_offset: Vec2,

    occupants: OccupantMap,
    latch: OccupancyLatch,

    position: Vec2,
    base_pos: Vec2,
    pressed_pos: Vec2,
    motion: Option<MoveInterp>,

    is_on: bool,
    visible: bool,
    /// Timed behavior: seconds of linger remaining, if counting down.
    linger_remaining: Option<f32>,
}

impl Plate {
    /// Wires up a plate around already-created colliders.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: EntityId,
        core: PresenceCore,
        behavior: PlateBehavior,
        config: PlateConfig,
        position: Vec2,
        body_collider: ColliderHandle,
        body_offset: Vec2,
        sensor: SensorRegion,
        sensor_offset: Vec2,
    ) -> Self {
        let visible = core.is_active();
        Self {
            id,
            core,
            behavior,
            config,
            body_collider,
            body_offset,
            sensor,
            sensor_offset,
            occupants: OccupantMap::new(),
            latch: OccupancyLatch::new(),
            position,
            base_pos: position,
            pressed_pos: position,
            motion: None,
            is_on: false,
            visible,
            linger_remaining: None,
        }
    }

    /// Entity id.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Current output state.
    #[must_use]
    pub fn is_on(&self) -> bool {
        self.is_on
    }

    /// Whether the plate renders this frame.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether a block currently holds the condition across worlds.
    #[must_use]
    pub fn is_latched(&self) -> bool {
        self.config.keep_block_condition_across_worlds && self.latch.is_latched()
    }

    /// Distinct occupants currently tracked.
    #[must_use]
    pub fn occupant_count(&self) -> usize {
        self.occupants.len()
    }

    /// True if anything is tracked as standing on the plate.
    #[must_use]
    pub fn has_occupant(&self) -> bool {
        self.occupants.has_any()
    }

    /// Current plate position (the top slab sinks when pressed).
    #[must_use]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// True when the slab sits within epsilon of the pressed pose.
    #[must_use]
    pub fn is_fully_pressed(&self) -> bool {
        self.position.distance(self.pressed_pos) <= self.config.epsilon
    }

    /// Physics steps the reactivation rebuild may retry.
    #[must_use]
    pub fn presence_retry_ticks(&self) -> u32 {
        self.config.reactivation_retry_ticks
    }

    // ========================================================================
    // SENSOR FAST PATH
    // ========================================================================

    /// Routes a sensor enter. Returns true if occupancy changed.
    pub fn note_enter(&mut self, occupant: EntityId, kind: OccupantKind, now: f32) -> bool {
        if !self.core.is_active() {
            return false;
        }
        let new_occupant = self.occupants.notify_enter(occupant, kind);
        if new_occupant
            && kind == OccupantKind::Block
            && self.config.keep_block_condition_across_worlds
        {
            self.latch.observe(now);
        }
        new_occupant
    }

    /// Routes a sensor exit. Returns true if occupancy changed.
    ///
    /// Exits never clear the latch: an exit is routinely just a collider
    /// being disabled mid-shift. The heartbeat confirms real departures.
    pub fn note_exit(&mut self, occupant: EntityId) -> bool {
        if !self.core.is_active() {
            return false;
        }
        match self.occupants.notify_exit(occupant) {
            Some(OccupantKind::Block) => {
                if self.config.keep_block_condition_across_worlds {
                    self.latch.restart_miss_window();
                }
                true
            }
            Some(OccupantKind::Player) => true,
            None => false,
        }
    }

    // ========================================================================
    // FIXED TICK: motion, linger, deferred rebuild, heartbeat
    // ========================================================================

    /// One physics step.
    pub fn fixed_tick(&mut self, ctx: &mut PresenceCtx<'_>) {
        let dt = ctx.clock.fixed_dt();

        // The timed linger keeps counting even while the plate's world is
        // intangible; a timed door should not pause because the player
        // shifted away.
        if let Some(remaining) = self.linger_remaining.as_mut() {
            *remaining -= dt;
            if *remaining <= 0.0 {
                self.linger_remaining = None;
                if !self.has_occupant() && !self.is_latched() {
                    self.set_on(false, false, ctx);
                    if self.core.is_active() {
                        self.start_raise();
                    }
                }
            }
        }

        if !self.core.is_active() {
            return;
        }

        // Press/raise motion.
        if let Some(motion) = self.motion.as_mut() {
            let pos = motion.advance(dt);
            let finished = motion.is_finished();
            self.set_position(pos, ctx.space);
            if finished {
                self.motion = None;
            }
        }

        // Deferred reactivation rebuild.
        match self.core.step_rebuild() {
            RebuildStep::Idle => {}
            RebuildStep::Retry => {
                if self.rebuild_silently(ctx.space, ctx.clock.time()) {
                    self.core.cancel_rebuild();
                    self.finish_deferred_rebuild(ctx);
                }
            }
            RebuildStep::LastAttempt => {
                self.rebuild_silently(ctx.space, ctx.clock.time());
                self.finish_deferred_rebuild(ctx);
            }
        }

        self.heartbeat(ctx);
    }

    /// Heartbeat reconciliation: rebuild the occupant map from a direct
    /// overlap query and run the latch hysteresis. Recovers from missed
    /// enter/exit callbacks; never replaces them.
    fn heartbeat(&mut self, ctx: &mut PresenceCtx<'_>) {
        let now = ctx.clock.time();
        if !self.latch.heartbeat_due(now) {
            return;
        }
        self.latch.schedule_heartbeat(now, &self.config.latch);

        let mut changed = false;

        let before = (
            self.occupants.has_any(),
            self.occupants.has_kind(OccupantKind::Player),
            self.occupants.has_kind(OccupantKind::Block),
        );
        self.rebuild_silently(ctx.space, now);
        let after = (
            self.occupants.has_any(),
            self.occupants.has_kind(OccupantKind::Player),
            self.occupants.has_kind(OccupantKind::Block),
        );
        if before != after {
            changed = true;
            tracing::trace!(
                "plate {:?} heartbeat rebuild changed: any {}->{}, player {}->{}, block {}->{}",
                self.id,
                before.0,
                after.0,
                before.1,
                after.1,
                before.2,
                after.2
            );
        }

        if self.config.keep_block_condition_across_worlds {
            // Two independent probes; either sighting refreshes the latch.
            let seen_now = self.sensor.has_kind_now(ctx.space, OccupantKind::Block)
                || self.sensor.has_kind_box(ctx.space, OccupantKind::Block);

            if seen_now {
                if self.latch.observe(now) {
                    changed = true;
                }
            } else if self.latch.is_latched()
                && self.latch.register_miss(now, &self.config.latch)
            {
                // Thresholds armed a clear; one final box probe gets the
                // last word.
                if self.sensor.has_kind_box(ctx.space, OccupantKind::Block) {
                    self.latch.defer_clear(now);
                } else if self.latch.clear() {
                    changed = true;
                }
            }
        }

        if changed {
            self.apply_occupancy(ctx);
        }
    }

    /// Tail of the deferred reactivation rebuild: settle the latch (set
    /// only, never clear - a miss here must not erase a held condition)
    /// and publish the result.
    fn finish_deferred_rebuild(&mut self, ctx: &mut PresenceCtx<'_>) {
        let now = ctx.clock.time();
        if self.config.keep_block_condition_across_worlds {
            let seen = self.occupants.has_kind(OccupantKind::Block)
                || self.sensor.has_kind_box(ctx.space, OccupantKind::Block);
            if seen {
                self.latch.observe(now);
            }
        } else {
            self.latch.reset();
        }
        self.apply_occupancy(ctx);
    }

    /// Clears and rebuilds the occupant map from the sensor overlap list.
    /// Returns true if any occupant was found.
    fn rebuild_silently(&mut self, space: &Space, now: f32) -> bool {
        self.occupants.rebuild(self.sensor.overlap_now(space));
        if self.config.keep_block_condition_across_worlds
            && self.occupants.has_kind(OccupantKind::Block)
        {
            self.latch.observe(now);
        }
        self.occupants.has_any()
    }

    // ========================================================================
    // OUTPUT & MOTION
    // ========================================================================

    /// The direction "pressed" sinks toward, relative to the current view.
    /// With the view flipped, down-on-screen is world up.
    fn press_direction(view_flipped: bool) -> Vec2 {
        if view_flipped {
            Vec2::UP
        } else {
            Vec2::DOWN
        }
    }

    fn recompute_pressed_pos(&mut self, view_flipped: bool) {
        let dir = Self::press_direction(view_flipped);
        self.pressed_pos = self.base_pos + dir * self.config.sink_distance.abs();
    }

    fn set_position(&mut self, pos: Vec2, space: &mut Space) {
        self.position = pos;
        space.set_center(self.body_collider, pos + self.body_offset);
        space.set_center(self.sensor.handle, pos + self.sensor_offset);
    }

    fn start_press(&mut self) {
        self.motion = Some(MoveInterp::new(
            self.position,
            self.pressed_pos,
            self.config.press_duration,
            Ease::InOutSine,
        ));
    }

    fn start_raise(&mut self) {
        self.motion = Some(MoveInterp::new(
            self.position,
            self.base_pos,
            self.config.raise_duration,
            Ease::OutQuad,
        ));
    }

    fn set_on(&mut self, on: bool, silent: bool, ctx: &mut PresenceCtx<'_>) {
        if self.is_on == on {
            return;
        }
        self.is_on = on;
        if !silent {
            ctx.events.send(GameEvent::PlateChanged { plate: self.id, on });
            tracing::debug!("plate {:?} -> {}", self.id, if on { "ON" } else { "OFF" });
        }
    }

    /// Applies the current occupancy/latch state to the output and motion.
    fn apply_occupancy(&mut self, ctx: &mut PresenceCtx<'_>) {
        if !self.core.is_active() {
            return;
        }

        if self.has_occupant() {
            self.linger_remaining = None;
            self.set_on(true, false, ctx);
            self.recompute_pressed_pos(ctx.view_flipped);
            self.start_press();
            return;
        }

        if self.is_latched() {
            // Held by a block that is currently intangible or mid-settle:
            // stay on, parked in the pressed pose, no motion.
            self.set_on(true, false, ctx);
            self.motion = None;
            self.recompute_pressed_pos(ctx.view_flipped);
            let pressed = self.pressed_pos;
            self.set_position(pressed, ctx.space);
            return;
        }

        match self.behavior {
            PlateBehavior::Hold => {
                self.set_on(false, false, ctx);
                self.start_raise();
            }
            PlateBehavior::Timed { linger_seconds } => {
                if self.is_on && self.linger_remaining.is_none() {
                    self.linger_remaining = Some(linger_seconds.max(0.0));
                }
                // Raise happens when the linger expires.
            }
        }
    }
}

impl WorldPresence for Plate {
    fn presence(&self) -> &PresenceCore {
        &self.core
    }

    fn presence_mut(&mut self) -> &mut PresenceCore {
        &mut self.core
    }

    fn snapshot_occupancy(&mut self, space: &Space, now: f32) -> PreChangeSnapshot {
        // Map first (fast), then both probes: the snapshot must not miss an
        // occupant whose enter callback got lost.
        let had_player = self.occupants.has_kind(OccupantKind::Player)
            || self.sensor.has_kind_now(space, OccupantKind::Player)
            || self.sensor.has_kind_box(space, OccupantKind::Player);
        let had_block = self.occupants.has_kind(OccupantKind::Block)
            || self.sensor.has_kind_now(space, OccupantKind::Block)
            || self.sensor.has_kind_box(space, OccupantKind::Block);

        if had_block && self.config.keep_block_condition_across_worlds {
            self.latch.observe(now);
        }
        tracing::trace!(
            "plate {:?} pre-shift snapshot: player={}, block={}, latched={}",
            self.id,
            had_player,
            had_block,
            self.latch.is_latched()
        );
        PreChangeSnapshot {
            had_player,
            had_block,
        }
    }

    fn set_components_active(&mut self, space: &mut Space, active: bool) {
        space.set_enabled(self.body_collider, active);
        space.set_enabled(self.sensor.handle, active);
        self.visible = active;
    }

    fn rebuild_occupancy(&mut self, space: &Space, now: f32) -> bool {
        self.rebuild_silently(space, now)
    }

    fn tracks_occupancy(&self) -> bool {
        true
    }

    fn on_became_inactive(&mut self, ctx: &mut PresenceCtx<'_>, _had_player: bool, had_block: bool) {
        if had_block && self.config.keep_block_condition_across_worlds {
            self.latch.observe(ctx.clock.time());
        }

        // A block holds the condition across worlds; a player does not.
        let hold = self.is_latched();
        match self.behavior {
            PlateBehavior::Hold => self.set_on(hold, false, ctx),
            PlateBehavior::Timed { linger_seconds } => {
                if !hold && self.is_on && self.linger_remaining.is_none() {
                    // The player shifted away mid-press: the countdown runs
                    // across worlds.
                    self.linger_remaining = Some(linger_seconds.max(0.0));
                }
            }
        }

        self.motion = None;
        let base = self.base_pos;
        self.set_position(base, ctx.space);
        self.occupants.clear();
    }

    fn on_became_active(&mut self, ctx: &mut PresenceCtx<'_>) {
        self.motion = None;
        if self.is_latched() {
            // Snap straight to the pressed pose, silently: the block never
            // really left.
            self.recompute_pressed_pos(ctx.view_flipped);
            let pressed = self.pressed_pos;
            self.set_position(pressed, ctx.space);
            self.set_on(true, true, ctx);
        }
        // Reconcile as soon as possible after reactivation.
        self.latch.expedite_heartbeat();
    }

    fn on_occupancy_changed(&mut self, ctx: &mut PresenceCtx<'_>) {
        self.apply_occupancy(ctx);
    }
}
