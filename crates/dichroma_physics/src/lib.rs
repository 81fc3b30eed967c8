//! # DICHROMA Physics
//!
//! The collision space the world-shift engine runs on: an arena of AABB
//! colliders with layer masks and a blocking/sensor split, plus the queries
//! the gameplay layer needs:
//!
//! - nearest-hit raycasts (pass-through distance, ground-support ray fans)
//! - overlap and closest-distance queries (post-shift penetration resolve)
//! - swept clearance casts (edge-nudge movement)
//! - sensor enter/exit diffing (occupancy fast path)
//! - a kinematic/dynamic [`Body`] with axis-separated move-and-collide
//!
//! Everything is synchronous and deterministic. Collider enable/disable
//! takes effect immediately; the *ordering* races the gameplay layer guards
//! against come from multiple components toggling colliders at different
//! points within the same tick, not from deferred application.

pub mod body;
pub mod raycast;
pub mod space;

pub use body::{Body, BodyMode, MoveResult, GRAVITY, TERMINAL_VELOCITY};
pub use raycast::{ray_vs_aabb, RayHit};
pub use space::{
    Collider, ColliderHandle, ColliderKind, Contact, Layer, Separation, SensorEvent,
    SensorEventKind, Space,
};
