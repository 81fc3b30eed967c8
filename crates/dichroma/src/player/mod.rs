//! # The Player
//!
//! A dynamic box with platformer movement feel (acceleration curves, jump
//! buffering, coyote time) and the shift maneuver. Input mapping is an
//! external collaborator: the simulation is fed an [`InputState`] per tick
//! and never reads devices.
//!
//! The shift state machine lives in [`shift`]; this module is ordinary
//! locomotion plus the ray fans the shift guards share with grounding
//! checks.

pub mod shift;

use dichroma_core::{EntityId, Vec2};
use dichroma_physics::{Body, BodyMode, ColliderHandle, Layer, Space};
use serde::{Deserialize, Serialize};

use self::shift::{ShiftConfig, ShiftState};

/// Per-tick input snapshot.
#[derive(Clone, Copy, Debug, Default)]
pub struct InputState {
    /// Horizontal axis in [-1, 1], in SCREEN space. The player flips it
    /// when the view is flipped.
    pub move_x: f32,
    /// Jump was pressed this tick.
    pub jump_pressed: bool,
    /// Shift was pressed this tick.
    pub shift_pressed: bool,
}

/// Player movement tuning.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Horizontal top speed (units per second).
    pub move_speed: f32,
    /// Acceleration toward the target speed.
    pub acceleration: f32,
    /// Deceleration when no input is held.
    pub deceleration: f32,
    /// Jump impulse along gravity-up.
    pub jump_force: f32,
    /// A jump pressed this long before landing still fires on touch-down.
    pub jump_buffer_time: f32,
    /// A jump still fires this long after walking off a ledge.
    pub coyote_time: f32,
    /// Contact normal dot threshold to count as ground.
    pub ground_normal_threshold: f32,
    /// Max |normal.x| for a ray hit to count as ground (rejects walls).
    pub ground_max_normal_x: f32,
    /// Clamp vertical speed.
    pub clamp_vertical_speed: bool,
    /// Max fall speed (relative to gravity).
    pub max_fall_speed: f32,
    /// Max rise speed (relative to gravity).
    pub max_rise_speed: f32,
    /// Collider width.
    pub width: f32,
    /// Collider height.
    pub height: f32,
    /// Skin distance for the contact scan.
    pub contact_skin: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            move_speed: 8.0,
            acceleration: 80.0,
            deceleration: 90.0,
            jump_force: 14.0,
            jump_buffer_time: 0.10,
            coyote_time: 0.10,
            ground_normal_threshold: 0.55,
            ground_max_normal_x: 0.2,
            clamp_vertical_speed: true,
            max_fall_speed: 22.0,
            max_rise_speed: 40.0,
            width: 0.8,
            height: 0.9,
            contact_skin: 0.04,
        }
    }
}

/// The player entity.
pub struct Player {
    id: EntityId,
    config: PlayerConfig,
    shift_config: ShiftConfig,
    body: Body,
    collider: ColliderHandle,
    pub(crate) shift: ShiftState,

    // Contacts (refreshed each movement tick).
    grounded: bool,
    grounded_prev: bool,

    // Input forgiveness runtime.
    coyote_timer: f32,
    jump_buffer_timer: f32,
    jump_available: bool,
    jump_queued: bool,

    controls_inverted: bool,
}

impl Player {
    /// Layers the player collides against.
    pub const SOLID_MASK: Layer =
        Layer(Layer::SOLID.0 | Layer::WALL.0 | Layer::BLOCK.0);

    /// Wires up the player around an already-created collider.
    #[must_use]
    pub fn new(
        id: EntityId,
        config: PlayerConfig,
        shift_config: ShiftConfig,
        position: Vec2,
        collider: ColliderHandle,
    ) -> Self {
        let body = Body::new(position, Vec2::new(config.width / 2.0, config.height / 2.0));
        Self {
            id,
            config,
            shift_config,
            body,
            collider,
            shift: ShiftState::default(),
            grounded: false,
            grounded_prev: false,
            coyote_timer: 0.0,
            jump_buffer_timer: 0.0,
            jump_available: true,
            jump_queued: false,
            controls_inverted: false,
        }
    }

    /// Entity id.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Current center position.
    #[must_use]
    pub fn position(&self) -> Vec2 {
        self.body.position
    }

    /// Current velocity.
    #[must_use]
    pub fn velocity(&self) -> Vec2 {
        self.body.velocity
    }

    /// The player's collider.
    #[must_use]
    pub fn collider(&self) -> ColliderHandle {
        self.collider
    }

    /// Current gravity scale (sign selects which way is down).
    #[must_use]
    pub fn gravity_scale(&self) -> f32 {
        self.body.gravity_scale
    }

    /// Grounded this tick, by contacts or by the support ray fan.
    #[must_use]
    pub fn is_grounded_now(&self, space: &Space) -> bool {
        self.grounded || self.is_supported_by_rays(space)
    }

    /// Inverts horizontal controls (gravity-trigger gimmick rooms).
    pub fn set_controls_inverted(&mut self, inverted: bool) {
        self.controls_inverted = inverted;
    }

    /// One movement step. Must not be called while shifting; the shift
    /// machine owns the body then.
    pub fn fixed_tick_movement(
        &mut self,
        input: &InputState,
        space: &mut Space,
        dt: f32,
        view_flipped: bool,
    ) {
        debug_assert!(!self.shift.is_shifting());

        self.refresh_grounded(space);

        if self.grounded && !self.grounded_prev {
            self.jump_available = true;
        }

        if self.grounded && self.jump_available {
            self.coyote_timer = self.config.coyote_time;
        } else {
            self.coyote_timer = (self.coyote_timer - dt).max(0.0);
        }

        if input.jump_pressed {
            self.jump_buffer_timer = self.config.jump_buffer_time;
        } else {
            self.jump_buffer_timer = (self.jump_buffer_timer - dt).max(0.0);
        }

        if self.jump_buffer_timer > 0.0 && self.jump_available && self.coyote_timer > 0.0 {
            self.jump_queued = true;
            self.jump_buffer_timer = 0.0;
            self.coyote_timer = 0.0;
        }

        self.grounded_prev = self.grounded;

        // Horizontal: screen-space input, flipped with the view.
        let mut x = input.move_x.clamp(-1.0, 1.0);
        if view_flipped {
            x = -x;
        }
        if self.controls_inverted {
            x = -x;
        }

        let target_vx = x * self.config.move_speed;
        let rate = if target_vx.abs() > 0.01 {
            self.config.acceleration
        } else {
            self.config.deceleration
        };
        let vx = move_toward(self.body.velocity.x, target_vx, rate * dt);
        self.body.velocity.x = vx;

        if self.jump_queued {
            self.jump_queued = false;
            self.jump();
        }

        if self.config.clamp_vertical_speed {
            let up = self.body.gravity_up();
            let along_up = self.body.velocity.dot(up);
            let clamped = along_up.clamp(-self.config.max_fall_speed, self.config.max_rise_speed);
            self.body.velocity += up * (clamped - along_up);
        }

        let result = self
            .body
            .integrate(dt, space, self.collider, Self::SOLID_MASK);
        space.set_center(self.collider, self.body.position);
        if result.grounded {
            self.grounded = true;
        }
    }

    fn jump(&mut self) {
        let up = self.body.gravity_up();
        let along_up = self.body.velocity.dot(up);
        self.body.velocity += up * (self.config.jump_force - along_up);
        self.grounded = false;
        self.jump_available = false;
    }

    /// Refreshes the grounded flag from a contact scan.
    fn refresh_grounded(&mut self, space: &Space) {
        let up = self.body.gravity_up();
        self.grounded = space
            .contacts(
                &self.body.aabb(),
                Self::SOLID_MASK,
                self.id,
                self.config.contact_skin,
            )
            .iter()
            .any(|c| c.normal.dot(up) >= self.config.ground_normal_threshold);
    }

    // ========================================================================
    // SUPPORT RAY FANS (shared by grounding and the shift launch guard)
    // ========================================================================

    /// True if at least one support ray hits ground.
    #[must_use]
    pub fn is_supported_by_rays(&self, space: &Space) -> bool {
        let rays = self.shift_config.support_rays.max(3);
        let (support, _, _) = self.ground_support_fraction(space, rays);
        support > 0.0
    }

    /// Fraction of the support ray fan that hits standable ground, plus the
    /// per-side hit counts (for the edge nudge).
    ///
    /// Rays start slightly inset from the gravity-facing edge and travel a
    /// short distance along gravity; hits are filtered to ground-like
    /// normals so grazing wall contacts never count as support.
    pub(crate) fn ground_support_fraction(
        &self,
        space: &Space,
        rays: usize,
    ) -> (f32, u32, u32) {
        let rays = rays.clamp(3, 21);
        let bounds = self.body.aabb();
        let dir = self.body.gravity_down();
        let up = self.body.gravity_up();
        let foot_y = if self.body.gravity_sign() > 0.0 {
            bounds.min.y
        } else {
            bounds.max.y
        };

        let margin = self.shift_config.edge_ray_margin.clamp(0.0, 1.0);
        let x_min = lerp(bounds.min.x, bounds.max.x, margin);
        let x_max = lerp(bounds.max.x, bounds.min.x, margin);

        let dist = self.shift_config.ground_check_extra + 0.12;
        const INSET: f32 = 0.02;

        let mut hits = 0u32;
        let mut left_hits = 0u32;
        let mut right_hits = 0u32;
        let mid = rays / 2;

        for i in 0..rays {
            let t = i as f32 / (rays - 1) as f32;
            let x = lerp(x_min, x_max, t);
            let origin = Vec2::new(x, foot_y) - dir * INSET;

            let Some(hit) = space.raycast(origin, dir, dist, Self::SOLID_MASK, self.id) else {
                continue;
            };
            if hit.normal.dot(up) < self.config.ground_normal_threshold {
                continue;
            }
            if hit.normal.x.abs() > self.config.ground_max_normal_x {
                continue;
            }
            if hit.distance <= 1e-4 {
                continue;
            }

            hits += 1;
            if i < mid {
                left_hits += 1;
            } else if i > mid {
                right_hits += 1;
            } else {
                left_hits += 1;
                right_hits += 1;
            }
        }

        (hits as f32 / rays as f32, left_hits, right_hits)
    }

    /// True if the same ray fan hits an always-solid wall surface: shifting
    /// while standing on one is forbidden (there is nowhere to pass to).
    pub(crate) fn is_standing_on_wall(&self, space: &Space) -> bool {
        let rays = self.shift_config.support_rays.max(3);
        let bounds = self.body.aabb();
        let dir = self.body.gravity_down();
        let foot_y = if self.body.gravity_sign() > 0.0 {
            bounds.min.y
        } else {
            bounds.max.y
        };

        let margin = self.shift_config.edge_ray_margin.clamp(0.0, 1.0);
        let x_min = lerp(bounds.min.x, bounds.max.x, margin);
        let x_max = lerp(bounds.max.x, bounds.min.x, margin);
        let dist = self.shift_config.ground_check_extra + 0.12;
        const INSET: f32 = 0.02;

        for i in 0..rays {
            let t = i as f32 / (rays - 1) as f32;
            let x = lerp(x_min, x_max, t);
            let origin = Vec2::new(x, foot_y) - dir * INSET;
            if space
                .raycast(origin, dir, dist, Layer::WALL, self.id)
                .is_some()
            {
                return true;
            }
        }
        false
    }

    /// Hard-resets movement runtime (level reload).
    pub fn reset_movement_state(&mut self) {
        self.body.velocity = Vec2::ZERO;
        self.body.mode = BodyMode::Dynamic;
        self.grounded = false;
        self.grounded_prev = false;
        self.coyote_timer = 0.0;
        self.jump_buffer_timer = 0.0;
        self.jump_available = true;
        self.jump_queued = false;
    }
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
fn move_toward(current: f32, target: f32, max_delta: f32) -> f32 {
    if (target - current).abs() <= max_delta {
        target
    } else {
        current + (target - current).signum() * max_delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_toward() {
        assert_eq!(move_toward(0.0, 10.0, 3.0), 3.0);
        assert_eq!(move_toward(9.0, 10.0, 3.0), 10.0);
        assert_eq!(move_toward(10.0, 0.0, 4.0), 6.0);
    }

    #[test]
    fn test_config_defaults() {
        let config = PlayerConfig::default();
        assert!(config.move_speed > 0.0);
        assert!(config.coyote_time > 0.0);
        assert!(config.width > 0.0 && config.height > 0.0);
    }
}
