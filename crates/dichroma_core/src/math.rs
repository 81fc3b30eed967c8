//! # 2D Math
//!
//! Vectors, axis-aligned boxes and the easing/interpolation helpers used by
//! the shift maneuver and plate press motion.

use serde::{Deserialize, Serialize};

/// A 2D vector (world units).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    /// Horizontal component.
    pub x: f32,
    /// Vertical component.
    pub y: f32,
}

impl Vec2 {
    /// The zero vector.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };
    /// Unit vector pointing up (+y).
    pub const UP: Self = Self { x: 0.0, y: 1.0 };
    /// Unit vector pointing down (-y).
    pub const DOWN: Self = Self { x: 0.0, y: -1.0 };
    /// Unit vector pointing left (-x).
    pub const LEFT: Self = Self { x: -1.0, y: 0.0 };
    /// Unit vector pointing right (+x).
    pub const RIGHT: Self = Self { x: 1.0, y: 0.0 };

    /// Creates a new vector.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Dot product.
    #[inline]
    #[must_use]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Squared length.
    #[inline]
    #[must_use]
    pub fn length_sq(self) -> f32 {
        self.dot(self)
    }

    /// Length.
    #[inline]
    #[must_use]
    pub fn length(self) -> f32 {
        self.length_sq().sqrt()
    }

    /// Returns a unit-length copy, or zero if the vector is degenerate.
    #[must_use]
    pub fn normalized(self) -> Self {
        let len = self.length();
        if len < 1e-6 {
            Self::ZERO
        } else {
            Self::new(self.x / len, self.y / len)
        }
    }

    /// Component-wise scale.
    #[inline]
    #[must_use]
    pub fn scale(self, s: f32) -> Self {
        Self::new(self.x * s, self.y * s)
    }

    /// Distance to another point.
    #[inline]
    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        (other - self).length()
    }

    /// Clamps the vector's magnitude to `max`, preserving direction.
    #[must_use]
    pub fn clamp_magnitude(self, max: f32) -> Self {
        let len_sq = self.length_sq();
        if len_sq <= max * max || len_sq < 1e-12 {
            return self;
        }
        self.scale(max / len_sq.sqrt())
    }

    /// Linear interpolation between two points. `t` is clamped to [0, 1].
    #[must_use]
    pub fn lerp(from: Self, to: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        Self::new(
            from.x + (to.x - from.x) * t,
            from.y + (to.y - from.y) * t,
        )
    }
}

impl std::ops::Add for Vec2 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::AddAssign for Vec2 {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Neg for Vec2 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

impl std::ops::Mul<f32> for Vec2 {
    type Output = Self;
    #[inline]
    fn mul(self, s: f32) -> Self {
        self.scale(s)
    }
}

// ============================================================================
// AABB (Axis-Aligned Bounding Box)
// ============================================================================

/// Axis-aligned bounding box for collision detection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vec2,
    /// Maximum corner.
    pub max: Vec2,
}

impl Aabb {
    /// Creates a new AABB from corners.
    #[inline]
    #[must_use]
    pub const fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Creates an AABB centered at `center` with the given full extents.
    #[must_use]
    pub fn from_center(center: Vec2, width: f32, height: f32) -> Self {
        let half_w = width / 2.0;
        let half_h = height / 2.0;
        Self {
            min: Vec2::new(center.x - half_w, center.y - half_h),
            max: Vec2::new(center.x + half_w, center.y + half_h),
        }
    }

    /// Center point.
    #[inline]
    #[must_use]
    pub fn center(&self) -> Vec2 {
        Vec2::new(
            (self.min.x + self.max.x) * 0.5,
            (self.min.y + self.max.y) * 0.5,
        )
    }

    /// Half-extents (half width, half height).
    #[inline]
    #[must_use]
    pub fn extents(&self) -> Vec2 {
        Vec2::new(
            (self.max.x - self.min.x) * 0.5,
            (self.max.y - self.min.y) * 0.5,
        )
    }

    /// Checks if this AABB intersects another (strict overlap, touching
    /// edges do not count).
    #[inline]
    #[must_use]
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
    }

    /// Checks if a point lies inside (inclusive).
    #[inline]
    #[must_use]
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Returns the overlap amount on each axis. Positive = overlap,
    /// negative = gap.
    #[inline]
    #[must_use]
    pub fn overlap(&self, other: &Aabb) -> Vec2 {
        Vec2::new(
            self.max.x.min(other.max.x) - self.min.x.max(other.min.x),
            self.max.y.min(other.max.y) - self.min.y.max(other.min.y),
        )
    }

    /// Moves the AABB by `delta`.
    #[inline]
    #[must_use]
    pub fn translate(&self, delta: Vec2) -> Self {
        Self {
            min: self.min + delta,
            max: self.max + delta,
        }
    }

    /// Grows the AABB by `amount` on every side.
    #[must_use]
    pub fn expand(&self, amount: f32) -> Self {
        Self {
            min: self.min - Vec2::new(amount, amount),
            max: self.max + Vec2::new(amount, amount),
        }
    }
}

// ============================================================================
// EASING / INTERPOLATION
// ============================================================================

/// Easing curve applied to a [`MoveInterp`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ease {
    /// Constant-speed blend.
    Linear,
    /// Sine-based S-curve: slow in, slow out. The shift maneuver's curve.
    #[default]
    InOutSine,
    /// Starts fast, slows down. Used for plate raise motion.
    OutQuad,
}

impl Ease {
    /// Maps raw progress `t` in [0, 1] to eased progress.
    #[must_use]
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Ease::Linear => t,
            Ease::InOutSine => 0.5 - 0.5 * (std::f32::consts::PI * t).cos(),
            Ease::OutQuad => 1.0 - (1.0 - t) * (1.0 - t),
        }
    }
}

/// Fixed-tick position interpolator.
///
/// This replaces tween objects: it is advanced explicitly once per tick and
/// never runs on its own. Progress is driven by accumulated delta time, so a
/// paused simulation pauses the motion with it.
#[derive(Clone, Copy, Debug)]
pub struct MoveInterp {
    from: Vec2,
    to: Vec2,
    duration: f32,
    elapsed: f32,
    ease: Ease,
}

impl MoveInterp {
    /// Starts a new interpolation. A non-positive duration completes on the
    /// first advance.
    #[must_use]
    pub fn new(from: Vec2, to: Vec2, duration: f32, ease: Ease) -> Self {
        Self {
            from,
            to,
            duration: duration.max(0.0),
            elapsed: 0.0,
            ease,
        }
    }

    /// Advances by `dt` seconds and returns the new position.
    pub fn advance(&mut self, dt: f32) -> Vec2 {
        self.elapsed += dt;
        self.sample()
    }

    /// Samples the current position without advancing.
    #[must_use]
    pub fn sample(&self) -> Vec2 {
        if self.is_finished() {
            return self.to;
        }
        let t = self.ease.apply(self.elapsed / self.duration);
        Vec2::lerp(self.from, self.to, t)
    }

    /// True once the full duration has elapsed.
    #[inline]
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.duration <= 0.0 || self.elapsed >= self.duration
    }

    /// The interpolation target.
    #[inline]
    #[must_use]
    pub fn target(&self) -> Vec2 {
        self.to
    }
}
