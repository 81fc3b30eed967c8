//! # DICHROMA Core
//!
//! Kernel types shared by every other crate: 2D math, stable entity
//! identifiers, the fixed-tick clock, and the `WorldState` enum.
//!
//! Nothing here knows about colliders, plates or players. Keep it that way.

pub mod entity;
pub mod math;
pub mod tick;
pub mod world;

pub use entity::{EntityAllocator, EntityId};
pub use math::{Aabb, Ease, MoveInterp, Vec2};
pub use tick::{Cooldown, Countdown, FixedClock};
pub use world::WorldState;
