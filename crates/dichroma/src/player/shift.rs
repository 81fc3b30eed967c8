//! # The Shift Maneuver
//!
//! The player's transactional world flip:
//!
//! ```text
//! Idle -> Launching -> InFlight -> Settling -> Committed
//!   ^                                  |
//!   '------------- RolledBack <--------'
//! ```
//!
//! Launching validates the guards, snapshots the pre-shift physics state,
//! takes the body kinematic and pass-through, flips the world and gravity,
//! and starts the eased pass-through interpolation. Settling restores the
//! body, waits an optional physics tick for other subscribers' colliders to
//! land, then either resolves any penetration by iterative push-out or
//! rolls the entire transition back - world, gravity, position - leaving no
//! trace beyond a brief visual flip.
//!
//! A failsafe timer bounds the whole maneuver: if the interpolation never
//! signals completion the machine force-finishes rather than wedging player
//! control forever.

use dichroma_core::{Cooldown, Countdown, Ease, FixedClock, MoveInterp, Vec2, WorldState};
use dichroma_physics::{BodyMode, Space};
use serde::{Deserialize, Serialize};

use crate::entities::Scene;
use crate::events::{EventSender, GameEvent, ShiftFailReason};
use crate::shift::ShiftBus;
use crate::sim::DispatchHost;

use super::Player;

/// Shift maneuver tuning.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ShiftConfig {
    /// Seconds between shift attempts.
    pub cooldown: f32,
    /// Base animation duration; the pass-through move runs at twice this
    /// (matches the camera flip).
    pub anim_duration: f32,
    /// Extra clearance past the crossed surface.
    pub pass_extra: f32,
    /// Only allow shifting when grounded (with edge-support assist).
    pub require_grounded: bool,
    /// Max overhang fraction allowed to shift; 0.2 means at least 80% of
    /// the support rays must hit ground.
    pub max_overhang_fraction: f32,
    /// Rays in the support fan.
    pub support_rays: usize,
    /// Fractional inset from the collider edges for the outermost rays.
    pub edge_ray_margin: f32,
    /// Ray reach beyond the foot line.
    pub ground_check_extra: f32,
    /// Nudge toward better support before refusing a marginal stance.
    pub nudge_enabled: bool,
    /// Nudge step per iteration.
    pub nudge_step: f32,
    /// Max total nudge distance.
    pub nudge_max_distance: f32,
    /// Try push-out resolution before considering rollback.
    pub resolve_instead_of_rollback: bool,
    /// Roll the transition back if resolution fails.
    pub rollback_if_stuck: bool,
    /// Wait one physics tick before the overlap check (a cooperating
    /// subscriber's collider toggle can land later in the same dispatch).
    pub delay_settle_one_tick: bool,
    /// Push-out iteration budget.
    pub resolve_iterations: u32,
    /// Max corrective translation per iteration.
    pub resolve_max_step: f32,
    /// Skin added to each push-out.
    pub resolve_skin: f32,
    /// Penetration below this is not "stuck" (contact-offset noise).
    pub stuck_epsilon: f32,
    /// Refuse to shift while standing on an always-solid wall.
    pub block_when_on_wall: bool,
    /// Force-finish a shift that never completes within this many seconds.
    pub failsafe_seconds: f32,
}

impl Default for ShiftConfig {
    fn default() -> Self {
        Self {
            cooldown: 0.12,
            anim_duration: 0.18,
            pass_extra: 0.15,
            require_grounded: true,
            max_overhang_fraction: 0.2,
            support_rays: 5,
            edge_ray_margin: 0.04,
            ground_check_extra: 0.06,
            nudge_enabled: true,
            nudge_step: 0.02,
            nudge_max_distance: 0.45,
            resolve_instead_of_rollback: true,
            rollback_if_stuck: true,
            delay_settle_one_tick: true,
            resolve_iterations: 10,
            resolve_max_step: 0.35,
            resolve_skin: 0.01,
            stuck_epsilon: 0.02,
            block_when_on_wall: true,
            failsafe_seconds: 0.9,
        }
    }
}

/// How the last completed transition ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShiftOutcome {
    /// Landed cleanly (possibly after push-out resolution).
    Committed,
    /// Could not resolve; world, gravity and position were restored.
    RolledBack,
}

/// Physics state captured at launch, restored verbatim on rollback. Owned
/// exclusively by the in-flight transition.
#[derive(Clone, Copy, Debug)]
struct TransitionSnapshot {
    before_world: WorldState,
    before_gravity_scale: f32,
    before_position: Vec2,
    before_mode: BodyMode,
}

#[derive(Clone, Copy, Debug)]
enum ShiftPhase {
    Idle,
    InFlight { interp: MoveInterp },
    Settling { wait: Countdown },
}

/// Shift machine runtime state.
pub struct ShiftState {
    phase: ShiftPhase,
    cooldown: Cooldown,
    failsafe_elapsed: f32,
    snapshot: Option<TransitionSnapshot>,
    last_outcome: Option<ShiftOutcome>,
}

impl Default for ShiftState {
    fn default() -> Self {
        Self {
            phase: ShiftPhase::Idle,
            cooldown: Cooldown::default(),
            failsafe_elapsed: 0.0,
            snapshot: None,
            last_outcome: None,
        }
    }
}

impl ShiftState {
    /// True while a transition is in flight or settling.
    #[must_use]
    pub fn is_shifting(&self) -> bool {
        !matches!(self.phase, ShiftPhase::Idle)
    }

    /// How the most recent transition ended.
    #[must_use]
    pub fn last_outcome(&self) -> Option<ShiftOutcome> {
        self.last_outcome
    }

    /// True while the inter-shift cooldown is running.
    #[must_use]
    pub fn cooldown_active(&self) -> bool {
        self.cooldown.is_active()
    }
}

/// Everything the shift maneuver touches.
pub struct ShiftContext<'a> {
    /// The collision space.
    pub space: &'a mut Space,
    /// The world-state broadcaster.
    pub bus: &'a ShiftBus,
    /// World-bound entities (dispatch targets).
    pub scene: &'a mut Scene,
    /// The simulation clock.
    pub clock: &'a FixedClock,
    /// Outbound event sink.
    pub events: &'a EventSender,
}

impl Player {
    /// Ticks the shift cooldown. Called every simulation tick.
    pub fn advance_shift_timers(&mut self, dt: f32) {
        self.shift.cooldown.advance(dt);
    }

    /// True while the maneuver owns the body.
    #[must_use]
    pub fn is_shifting(&self) -> bool {
        self.shift.is_shifting()
    }

    /// How the most recent transition ended.
    #[must_use]
    pub fn last_shift_outcome(&self) -> Option<ShiftOutcome> {
        self.shift.last_outcome()
    }

    /// Attempts to start a shift. Guard failures emit failure feedback and
    /// change no state; an accepted launch flips the world inside this
    /// call.
    pub fn try_start_shift(&mut self, ctx: &mut ShiftContext<'_>) {
        if self.shift.is_shifting() || self.shift.cooldown.is_active() {
            return;
        }

        if self.shift_config.require_grounded && !self.can_start_from_edge(ctx) {
            tracing::debug!("shift refused: insufficient ground support");
            ctx.events.send(GameEvent::ShiftFailed {
                reason: ShiftFailReason::Unsupported,
            });
            return;
        }

        if self.shift_config.block_when_on_wall && self.is_standing_on_wall(ctx.space) {
            tracing::debug!("shift refused: standing on always-solid wall");
            ctx.events.send(GameEvent::ShiftFailed {
                reason: ShiftFailReason::StandingOnWall,
            });
            return;
        }

        self.launch(ctx);
    }

    /// Advances an in-flight maneuver by one tick.
    pub fn advance_shift(&mut self, ctx: &mut ShiftContext<'_>) {
        let dt = ctx.clock.fixed_dt();
        self.shift.failsafe_elapsed += dt;

        match self.shift.phase {
            ShiftPhase::Idle => {}
            ShiftPhase::InFlight { mut interp } => {
                if self.shift.failsafe_elapsed >= self.shift_config.failsafe_seconds {
                    tracing::warn!(
                        "shift failsafe fired after {:.2}s; forcing completion",
                        self.shift.failsafe_elapsed
                    );
                    self.begin_settle(ctx);
                    return;
                }

                let pos = interp.advance(dt);
                self.body.position = pos;
                ctx.space.set_center(self.collider, pos);

                if interp.is_finished() {
                    self.begin_settle(ctx);
                } else {
                    self.shift.phase = ShiftPhase::InFlight { interp };
                }
            }
            ShiftPhase::Settling { mut wait } => {
                if !wait.is_done() {
                    wait.step();
                    self.shift.phase = ShiftPhase::Settling { wait };
                    return;
                }
                self.settle(ctx);
            }
        }
    }

    /// Hard reset to Idle (level reload). Restores blocking collision and a
    /// dynamic body; does not touch the world state.
    pub fn force_cancel_for_reload(&mut self, space: &mut Space) {
        self.shift.phase = ShiftPhase::Idle;
        self.shift.snapshot = None;
        self.shift.failsafe_elapsed = 0.0;
        space.set_blocking(self.collider, true);
        self.body.mode = BodyMode::Dynamic;
        self.reset_movement_state();
    }

    // ========================================================================
    // LAUNCH
    // ========================================================================

    fn launch(&mut self, ctx: &mut ShiftContext<'_>) {
        self.coyote_timer = 0.0;
        self.jump_buffer_timer = 0.0;
        self.shift.cooldown.arm(self.shift_config.cooldown);
        self.shift.failsafe_elapsed = 0.0;

        let snapshot = TransitionSnapshot {
            before_world: ctx.bus.solid_world(),
            before_gravity_scale: self.body.gravity_scale,
            before_position: self.body.position,
            before_mode: self.body.mode,
        };
        self.shift.snapshot = Some(snapshot);

        // Pass distance is measured along the OLD gravity before anything
        // flips: it is the distance to cross the surface we stand on.
        let old_gravity_dir = self.body.gravity_down();
        let pass = self.compute_pass_distance(ctx.space, old_gravity_dir);

        self.body.velocity = Vec2::ZERO;
        self.body.mode = BodyMode::Kinematic;
        ctx.space.set_blocking(self.collider, false);

        let (from, to) = {
            let mut host = DispatchHost {
                scene: &mut *ctx.scene,
                space: &mut *ctx.space,
                clock: ctx.clock,
                events: ctx.events,
                bus: ctx.bus,
            };
            ctx.bus.toggle(&mut host)
        };
        ctx.events.send(GameEvent::WorldShifted { from, to });

        // Gravity inverts immediately so the new world pulls the right way
        // the moment the interpolation ends.
        self.body.gravity_scale = -snapshot.before_gravity_scale;

        let target = snapshot.before_position + old_gravity_dir * pass;
        self.shift.phase = ShiftPhase::InFlight {
            interp: MoveInterp::new(
                snapshot.before_position,
                target,
                self.shift_config.anim_duration * 2.0,
                Ease::InOutSine,
            ),
        };

        tracing::info!(
            "shift launched: {} -> {}, pass {:.3} units",
            from.name(),
            to.name(),
            pass
        );
    }

    /// Distance to travel so the collider fully crosses the surface it was
    /// standing on: ray hit distance + half extent + clearance, with a
    /// fallback when no surface is under (or above) the player.
    fn compute_pass_distance(&self, space: &Space, old_gravity_dir: Vec2) -> f32 {
        let center = self.body.position;
        let ext_y = self.body.half.y;
        let ray_dist = ext_y + 2.0;

        match space.raycast(center, old_gravity_dir, ray_dist, Self::SOLID_MASK, self.id) {
            Some(hit) => hit.distance + ext_y + self.shift_config.pass_extra,
            None => ext_y * 2.0 + self.shift_config.pass_extra,
        }
    }

    /// Ground-support guard with the edge-nudge assist: a stance that is
    /// supported but not fully may be walked inward (in swept steps that
    /// never clip through walls) until support stops improving.
    fn can_start_from_edge(&mut self, ctx: &mut ShiftContext<'_>) -> bool {
        let cfg = self.shift_config;
        let min_support = (1.0 - cfg.max_overhang_fraction).clamp(0.0, 1.0);
        let (support, left_hits, right_hits) =
            self.ground_support_fraction(ctx.space, cfg.support_rays);

        if support <= 0.0 {
            return false;
        }
        if support < min_support {
            return false;
        }

        if cfg.nudge_enabled && support < 0.999 {
            let nudge_dir = if right_hits < left_hits {
                Vec2::LEFT
            } else if left_hits < right_hits {
                Vec2::RIGHT
            } else {
                Vec2::ZERO
            };

            if nudge_dir != Vec2::ZERO {
                let mut moved = 0.0;
                let mut best_support = support;

                while moved < cfg.nudge_max_distance {
                    if !ctx.space.cast_is_clear(
                        &self.body.aabb(),
                        nudge_dir,
                        cfg.nudge_step,
                        Self::SOLID_MASK,
                        self.id,
                    ) {
                        break;
                    }

                    self.body.position += nudge_dir * cfg.nudge_step;
                    ctx.space.set_center(self.collider, self.body.position);
                    moved += cfg.nudge_step;

                    let (new_support, _, _) =
                        self.ground_support_fraction(ctx.space, cfg.support_rays);
                    if new_support > best_support + 0.001 {
                        best_support = new_support;
                    }
                    if new_support >= 0.999 {
                        break;
                    }
                    if new_support + 0.001 < best_support {
                        break;
                    }
                }
            }
        }

        true
    }

    // ========================================================================
    // SETTLE / RESOLVE / ROLLBACK
    // ========================================================================

    /// Restores blocking collision and the pre-shift body mode, then parks
    /// in Settling (optionally for one tick, letting world-bound collider
    /// toggles take effect before the overlap check).
    fn begin_settle(&mut self, ctx: &mut ShiftContext<'_>) {
        ctx.space.set_blocking(self.collider, true);
        if let Some(snapshot) = self.shift.snapshot {
            self.body.mode = snapshot.before_mode;
        }
        ctx.space.set_center(self.collider, self.body.position);

        let wait = Countdown::new(u32::from(self.shift_config.delay_settle_one_tick));
        self.shift.phase = ShiftPhase::Settling { wait };
    }

    fn settle(&mut self, ctx: &mut ShiftContext<'_>) {
        let Some(snapshot) = self.shift.snapshot else {
            // Nothing to restore against; treat as committed.
            self.finish(ShiftOutcome::Committed);
            return;
        };

        if self.penetration_vector(ctx.space).is_some() {
            let resolved = self.shift_config.resolve_instead_of_rollback
                && self.try_resolve_overlap(ctx.space);

            if !resolved && self.shift_config.rollback_if_stuck {
                self.rollback(ctx, snapshot);
                self.finish(ShiftOutcome::RolledBack);
                return;
            }
        }

        self.finish(ShiftOutcome::Committed);
    }

    fn finish(&mut self, outcome: ShiftOutcome) {
        self.shift.phase = ShiftPhase::Idle;
        self.shift.snapshot = None;
        self.shift.failsafe_elapsed = 0.0;
        self.shift.last_outcome = Some(outcome);
        tracing::info!("shift finished: {:?}", outcome);
    }

    /// Accumulated push-out against every overlapping solid collider, or
    /// `None` when nothing penetrates deeper than the noise epsilon.
    fn penetration_vector(&self, space: &Space) -> Option<Vec2> {
        let bounds = self.body.aabb();
        let mut push = Vec2::ZERO;
        let mut any = false;

        for handle in space.overlap_aabb(&bounds, Self::SOLID_MASK, self.id) {
            let Some(other) = space.aabb_of(handle) else {
                continue;
            };
            let sep = Space::separation(&bounds, &other);
            if sep.distance >= 0.0 {
                continue;
            }
            let penetration = -sep.distance;
            if penetration <= self.shift_config.stuck_epsilon {
                continue;
            }
            push += -sep.normal * (penetration + self.shift_config.resolve_skin);
            any = true;
        }

        any.then_some(push)
    }

    /// Iterative, magnitude-clamped push-out. True if the overlap was fully
    /// resolved within the iteration budget.
    fn try_resolve_overlap(&mut self, space: &mut Space) -> bool {
        for _ in 0..self.shift_config.resolve_iterations {
            let Some(push) = self.penetration_vector(space) else {
                return true;
            };
            if push.length_sq() < 1e-8 {
                break;
            }
            let push = push.clamp_magnitude(self.shift_config.resolve_max_step);
            self.body.position += push;
            space.set_center(self.collider, self.body.position);
        }

        self.penetration_vector(space).is_none()
    }

    /// Reverts the entire transition: world, gravity, position, body mode.
    /// Gameplay-silent beyond the world having briefly appeared to flip.
    fn rollback(&mut self, ctx: &mut ShiftContext<'_>, snapshot: TransitionSnapshot) {
        tracing::warn!(
            "shift rollback: destination blocked, restoring {} at ({:.2}, {:.2})",
            snapshot.before_world.name(),
            snapshot.before_position.x,
            snapshot.before_position.y
        );

        self.body.mode = BodyMode::Kinematic;
        ctx.space.set_blocking(self.collider, false);

        let changed = {
            let mut host = DispatchHost {
                scene: &mut *ctx.scene,
                space: &mut *ctx.space,
                clock: ctx.clock,
                events: ctx.events,
                bus: ctx.bus,
            };
            ctx.bus.set_world(snapshot.before_world, &mut host)
        };
        if changed {
            ctx.events.send(GameEvent::WorldShifted {
                from: snapshot.before_world.opposite(),
                to: snapshot.before_world,
            });
        }

        self.body.gravity_scale = snapshot.before_gravity_scale;
        self.body.position = snapshot.before_position;
        self.body.velocity = Vec2::ZERO;
        ctx.space.set_center(self.collider, snapshot.before_position);

        ctx.space.set_blocking(self.collider, true);
        self.body.mode = snapshot.before_mode;

        ctx.events.send(GameEvent::ShiftRolledBack);
    }
}
