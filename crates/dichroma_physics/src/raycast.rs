//! # Raycasts
//!
//! Slab-test raycasts against AABBs. The space's nearest-hit query is built
//! on [`ray_vs_aabb`].

use dichroma_core::{Aabb, EntityId, Vec2};

use crate::space::ColliderHandle;

/// Result of a raycast.
#[derive(Clone, Copy, Debug)]
pub struct RayHit {
    /// The collider that was hit (filled in by the space query).
    pub handle: ColliderHandle,
    /// Owner of the hit collider.
    pub owner: EntityId,
    /// Distance from ray origin to the hit point.
    pub distance: f32,
    /// Surface normal at the hit point.
    pub normal: Vec2,
    /// Hit position in world space.
    pub point: Vec2,
}

/// Ray vs AABB slab test.
///
/// `direction` must be normalized. Returns the entry hit within
/// `max_distance`, or `None`. Rays starting inside the box report a hit at
/// distance zero with a zero normal.
#[must_use]
pub fn ray_vs_aabb(
    origin: Vec2,
    direction: Vec2,
    max_distance: f32,
    aabb: &Aabb,
) -> Option<RayHit> {
    const EPS: f32 = 1e-8;

    let mut t_min = 0.0f32;
    let mut t_max = max_distance;
    // Normal of the slab face crossed last on entry.
    let mut entry_normal = Vec2::ZERO;

    for axis in 0..2 {
        let (o, d, lo, hi, min_face_normal, max_face_normal) = if axis == 0 {
            (
                origin.x,
                direction.x,
                aabb.min.x,
                aabb.max.x,
                Vec2::LEFT,
                Vec2::RIGHT,
            )
        } else {
            (
                origin.y,
                direction.y,
                aabb.min.y,
                aabb.max.y,
                Vec2::DOWN,
                Vec2::UP,
            )
        };

        if d.abs() < EPS {
            // Parallel to the slab: must already be within it.
            if o < lo || o > hi {
                return None;
            }
            continue;
        }

        let inv = 1.0 / d;
        let (mut t0, mut t1) = ((lo - o) * inv, (hi - o) * inv);
        // Travelling +axis enters through the min face; -axis through max.
        let slab_normal = if d > 0.0 {
            min_face_normal
        } else {
            max_face_normal
        };
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        if t0 > t_min {
            t_min = t0;
            entry_normal = slab_normal;
        }
        t_max = t_max.min(t1);
        if t_min > t_max {
            return None;
        }
    }

    Some(RayHit {
        handle: ColliderHandle::INVALID,
        owner: EntityId::NULL,
        distance: t_min,
        normal: entry_normal,
        point: origin + direction * t_min,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_hits_box_from_above() {
        let aabb = Aabb::from_center(Vec2::new(0.0, -2.0), 2.0, 1.0);
        let hit = ray_vs_aabb(Vec2::ZERO, Vec2::DOWN, 10.0, &aabb).expect("hit");
        assert!((hit.distance - 1.5).abs() < 1e-5);
        assert_eq!(hit.normal, Vec2::UP);
        assert!((hit.point.y + 1.5).abs() < 1e-5);
    }

    #[test]
    fn test_ray_misses_to_the_side() {
        let aabb = Aabb::from_center(Vec2::new(5.0, 0.0), 1.0, 1.0);
        assert!(ray_vs_aabb(Vec2::ZERO, Vec2::DOWN, 10.0, &aabb).is_none());
    }

    #[test]
    fn test_ray_respects_max_distance() {
        let aabb = Aabb::from_center(Vec2::new(0.0, -5.0), 1.0, 1.0);
        assert!(ray_vs_aabb(Vec2::ZERO, Vec2::DOWN, 2.0, &aabb).is_none());
        assert!(ray_vs_aabb(Vec2::ZERO, Vec2::DOWN, 6.0, &aabb).is_some());
    }

    #[test]
    fn test_ray_from_inside_reports_zero_distance() {
        let aabb = Aabb::from_center(Vec2::ZERO, 2.0, 2.0);
        let hit = ray_vs_aabb(Vec2::ZERO, Vec2::RIGHT, 10.0, &aabb).expect("hit");
        assert_eq!(hit.distance, 0.0);
    }

    #[test]
    fn test_horizontal_ray_normal() {
        let aabb = Aabb::from_center(Vec2::new(3.0, 0.0), 2.0, 2.0);
        let hit = ray_vs_aabb(Vec2::ZERO, Vec2::RIGHT, 10.0, &aabb).expect("hit");
        assert_eq!(hit.normal, Vec2::LEFT);
        assert!((hit.distance - 2.0).abs() < 1e-5);
    }
}
