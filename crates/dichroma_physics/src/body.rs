//! # Bodies
//!
//! Kinematic character-style movement: gravity integration with a terminal
//! clamp and axis-separated move-and-collide against the space's blocking
//! colliders. The shift maneuver flips a body between dynamic and kinematic
//! and back; while kinematic, gravity and collision response are skipped and
//! the owner writes positions directly.

use dichroma_core::{Aabb, Vec2};

use crate::space::{ColliderHandle, Layer, Space};

/// Gravity acceleration (world units per second squared) at gravity scale 1.
pub const GRAVITY: f32 = 30.0;

/// Terminal velocity (world units per second).
pub const TERMINAL_VELOCITY: f32 = 50.0;

/// How a body responds to the simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyMode {
    /// Integrated by gravity, collides and is pushed out of solids.
    Dynamic,
    /// Position is written directly by the owner; no gravity, no response.
    Kinematic,
}

/// Result of one movement integration step.
#[derive(Clone, Copy, Debug, Default)]
pub struct MoveResult {
    /// The body ended the step supported against gravity.
    pub grounded: bool,
    /// Horizontal motion was blocked this step.
    pub hit_wall: bool,
}

/// A moving body bound to one collider in the space.
#[derive(Clone, Copy, Debug)]
pub struct Body {
    /// Center position (kept in sync with the collider).
    pub position: Vec2,
    /// Velocity in world units per second.
    pub velocity: Vec2,
    /// Gravity multiplier; the sign selects which way is down.
    pub gravity_scale: f32,
    /// Dynamic or kinematic.
    pub mode: BodyMode,
    /// Half-extents of the bound collider.
    pub half: Vec2,
}

impl Body {
    /// Creates a dynamic body.
    #[must_use]
    pub fn new(position: Vec2, half: Vec2) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            gravity_scale: 1.0,
            mode: BodyMode::Dynamic,
            half,
        }
    }

    /// Sign of gravity: +1.0 pulls -y, -1.0 pulls +y.
    #[inline]
    #[must_use]
    pub fn gravity_sign(&self) -> f32 {
        if self.gravity_scale >= 0.0 {
            1.0
        } else {
            -1.0
        }
    }

    /// The direction gravity pulls this body.
    #[inline]
    #[must_use]
    pub fn gravity_down(&self) -> Vec2 {
        if self.gravity_sign() > 0.0 {
            Vec2::DOWN
        } else {
            Vec2::UP
        }
    }

    /// Opposite of [`Body::gravity_down`].
    #[inline]
    #[must_use]
    pub fn gravity_up(&self) -> Vec2 {
        -self.gravity_down()
    }

    /// Current world bounds.
    #[inline]
    #[must_use]
    pub fn aabb(&self) -> Aabb {
        Aabb::from_center(self.position, self.half.x * 2.0, self.half.y * 2.0)
    }

    /// Integrates gravity and moves with collision against `mask`,
    /// excluding the body's own collider. Kinematic bodies are untouched.
    ///
    /// After the step the bound collider's center must be re-synced by the
    /// caller via [`Space::set_center`] (the mover cannot, the space is
    /// borrowed immutably for queries).
    pub fn integrate(
        &mut self,
        dt: f32,
        space: &Space,
        own_collider: ColliderHandle,
        mask: Layer,
    ) -> MoveResult {
        if self.mode == BodyMode::Kinematic {
            return MoveResult::default();
        }

        // Gravity toward the current "down", clamped to terminal velocity.
        let fall = GRAVITY * self.gravity_scale.abs() * dt;
        self.velocity += self.gravity_down() * fall;
        let along_down = self.velocity.dot(self.gravity_down());
        if along_down > TERMINAL_VELOCITY {
            self.velocity += self.gravity_down() * (TERMINAL_VELOCITY - along_down);
        }

        let delta = self.velocity * dt;
        self.move_with_collision(delta, space, own_collider, mask)
    }

    /// Axis-separated move: translate on x, resolve, then y, resolve.
    pub fn move_with_collision(
        &mut self,
        delta: Vec2,
        space: &Space,
        own_collider: ColliderHandle,
        mask: Layer,
    ) -> MoveResult {
        let mut result = MoveResult::default();
        let owner = space
            .get(own_collider)
            .map(|c| c.owner)
            .unwrap_or(dichroma_core::EntityId::NULL);

        if delta.x.abs() > 1e-5 {
            self.position.x += delta.x;
            if self.resolve_axis(0, space, owner, mask) {
                self.velocity.x = 0.0;
                result.hit_wall = true;
            }
        }

        let was_falling = self.velocity.dot(self.gravity_down()) > 0.0;
        if delta.y.abs() > 1e-5 {
            self.position.y += delta.y;
            if self.resolve_axis(1, space, owner, mask) {
                // Blocked vertically while moving toward gravity = landed.
                if was_falling {
                    result.grounded = true;
                }
                self.velocity.y = 0.0;
            }
        }

        // Resting contact check: a thin probe on the gravity-facing edge.
        if !result.grounded && self.velocity.dot(self.gravity_down()) >= -1e-4 {
            let feet = self.feet_probe(0.05);
            if !space.overlap_aabb(&feet, mask, owner).is_empty() {
                result.grounded = true;
            }
        }

        result
    }

    /// Thin AABB hugging the gravity-facing edge, extended `depth` outward.
    #[must_use]
    pub fn feet_probe(&self, depth: f32) -> Aabb {
        let bounds = self.aabb();
        if self.gravity_sign() > 0.0 {
            Aabb::new(
                Vec2::new(bounds.min.x, bounds.min.y - depth),
                Vec2::new(bounds.max.x, bounds.min.y + 1e-3),
            )
        } else {
            Aabb::new(
                Vec2::new(bounds.min.x, bounds.max.y - 1e-3),
                Vec2::new(bounds.max.x, bounds.max.y + depth),
            )
        }
    }

    /// Pushes the body out of overlapping colliders along one axis.
    /// Returns true if any overlap was resolved.
    fn resolve_axis(
        &mut self,
        axis: usize,
        space: &Space,
        owner: dichroma_core::EntityId,
        mask: Layer,
    ) -> bool {
        let mut collided = false;
        // Two passes: pushing out of one collider can push into another.
        for _ in 0..2 {
            let bounds = self.aabb();
            let hits = space.overlap_aabb(&bounds, mask, owner);
            if hits.is_empty() {
                break;
            }
            for handle in hits {
                let Some(other) = space.aabb_of(handle) else {
                    continue;
                };
                let bounds = self.aabb();
                if !bounds.intersects(&other) {
                    continue;
                }
                collided = true;
                let ov = bounds.overlap(&other);
                if axis == 0 {
                    let push = if self.position.x < other.center().x {
                        -ov.x
                    } else {
                        ov.x
                    };
                    self.position.x += push;
                } else {
                    let push = if self.position.y < other.center().y {
                        -ov.y
                    } else {
                        ov.y
                    };
                    self.position.y += push;
                }
            }
        }
        collided
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::{Collider, ColliderKind};
    use dichroma_core::EntityId;

    fn ground_space(player: EntityId) -> (Space, ColliderHandle) {
        let mut space = Space::new();
        space.add_collider(Collider {
            center: Vec2::new(0.0, -1.0),
            half: Vec2::new(20.0, 0.5),
            layer: Layer::SOLID,
            owner: EntityId::new(100, 0),
            enabled: true,
            blocking: true,
            kind: ColliderKind::Solid,
        });
        let body_col = space.add_collider(Collider {
            center: Vec2::new(0.0, 2.0),
            half: Vec2::new(0.4, 0.5),
            layer: Layer::PLAYER,
            owner: player,
            enabled: true,
            blocking: true,
            kind: ColliderKind::Solid,
        });
        (space, body_col)
    }

    #[test]
    fn test_body_falls_and_lands() {
        let player = EntityId::new(1, 0);
        let (mut space, col) = ground_space(player);
        let mut body = Body::new(Vec2::new(0.0, 2.0), Vec2::new(0.4, 0.5));

        let mut grounded = false;
        for _ in 0..200 {
            let result = body.integrate(0.02, &space, col, Layer::SOLID);
            space.set_center(col, body.position);
            if result.grounded {
                grounded = true;
                break;
            }
        }

        assert!(grounded, "body should land on the ground slab");
        // Resting on top of the slab: feet at y = -0.5.
        assert!((body.aabb().min.y - (-0.5)).abs() < 0.05);
        assert_eq!(body.velocity.y, 0.0);
    }

    #[test]
    fn test_inverted_gravity_falls_up() {
        let player = EntityId::new(1, 0);
        let mut space = Space::new();
        space.add_collider(Collider {
            center: Vec2::new(0.0, 5.0),
            half: Vec2::new(20.0, 0.5),
            layer: Layer::SOLID,
            owner: EntityId::new(100, 0),
            enabled: true,
            blocking: true,
            kind: ColliderKind::Solid,
        });
        let col = space.add_collider(Collider {
            center: Vec2::ZERO,
            half: Vec2::new(0.4, 0.5),
            layer: Layer::PLAYER,
            owner: player,
            enabled: true,
            blocking: true,
            kind: ColliderKind::Solid,
        });

        let mut body = Body::new(Vec2::ZERO, Vec2::new(0.4, 0.5));
        body.gravity_scale = -1.0;
        assert_eq!(body.gravity_down(), Vec2::UP);

        let mut grounded = false;
        for _ in 0..200 {
            let result = body.integrate(0.02, &space, col, Layer::SOLID);
            space.set_center(col, body.position);
            if result.grounded {
                grounded = true;
                break;
            }
        }
        assert!(grounded, "inverted body should land on the ceiling");
        assert!((body.aabb().max.y - 4.5).abs() < 0.05);
    }

    #[test]
    fn test_kinematic_ignores_gravity() {
        let player = EntityId::new(1, 0);
        let (space, col) = ground_space(player);
        let mut body = Body::new(Vec2::new(0.0, 2.0), Vec2::new(0.4, 0.5));
        body.mode = BodyMode::Kinematic;

        for _ in 0..50 {
            body.integrate(0.02, &space, col, Layer::SOLID);
        }
        assert_eq!(body.position, Vec2::new(0.0, 2.0));
        assert_eq!(body.velocity, Vec2::ZERO);
    }

    #[test]
    fn test_horizontal_block() {
        let player = EntityId::new(1, 0);
        let (mut space, col) = ground_space(player);
        space.add_collider(Collider {
            center: Vec2::new(2.0, 0.0),
            half: Vec2::new(0.5, 2.0),
            layer: Layer::SOLID,
            owner: EntityId::new(101, 0),
            enabled: true,
            blocking: true,
            kind: ColliderKind::Solid,
        });

        let mut body = Body::new(Vec2::new(0.0, 0.0), Vec2::new(0.4, 0.5));
        body.velocity = Vec2::new(10.0, 0.0);
        let result = body.move_with_collision(Vec2::new(1.8, 0.0), &space, col, Layer::SOLID);

        assert!(result.hit_wall);
        assert_eq!(body.velocity.x, 0.0);
        // Flush against the obstacle's left face at x = 1.5.
        assert!((body.aabb().max.x - 1.5).abs() < 1e-3);
    }
}
