//! # DICHROMA
//!
//! The world-shift engine: two mutually-exclusive physical worlds over one
//! scene graph, an instantaneous player-triggered shift between them, and
//! the occupancy bookkeeping that keeps every world-bound entity consistent
//! across a state flip that can land mid-overlap, mid-motion, or while
//! colliders are being toggled by several components in the same tick.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                           SIMULATION TICK                            │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                                                                      │
//! │   ┌────────────┐   toggle()   ┌────────────┐   pre/post dispatch     │
//! │   │   Player   │─────────────>│  ShiftBus  │────────────────────┐    │
//! │   │ transition │              │ WorldState │                    │    │
//! │   │  machine   │              └────────────┘                    ▼    │
//! │   └─────┬──────┘                                      ┌─────────────┐│
//! │         │ guards, pass-through,                       │   Plates    ││
//! │         │ resolve-or-rollback                         │   Blocks    ││
//! │         ▼                                             │   Solids    ││
//! │   ┌────────────┐   raycasts, overlaps, sensors        └──────┬──────┘│
//! │   │   Space    │<────────────────────────────────────────────┘       │
//! │   │ (physics)  │        occupancy latch + presence                   │
//! │   └────────────┘                                                     │
//! │                                                                      │
//! │   GameEvent bus ───> presentation layer (shake, flip, plate sfx)     │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`shift`]: the world-state broadcaster and its pre/post contract
//! - [`player`]: movement + the transactional shift maneuver
//! - [`occupancy`]: occupant refcounting and the debounced latch
//! - [`presence`]: the world-presence capability every entity implements
//! - [`entities`]: plates, movable blocks, static solids, the scene
//! - [`sim`]: the fixed-tick orchestrator
//! - [`events`]: outbound notifications for the presentation layer
//! - [`config`] / [`progress`]: startup tuning and level-unlock tracking

pub mod config;
pub mod entities;
pub mod error;
pub mod events;
pub mod occupancy;
pub mod player;
pub mod presence;
pub mod progress;
pub mod shift;
pub mod sim;

// Re-export the kernel crates
pub use dichroma_core as core;
pub use dichroma_physics as physics;

// Re-export commonly used types
pub use config::GameConfig;
pub use dichroma_core::{EntityId, Vec2, WorldState};
pub use entities::{Block, Plate, PlateBehavior, PlateConfig, Scene, WorldSolid};
pub use events::{EventBus, EventReceiver, EventSender, GameEvent, ShiftFailReason};
pub use occupancy::{LatchConfig, OccupancyLatch, OccupantKind, OccupantMap};
pub use player::shift::{ShiftConfig, ShiftOutcome};
pub use player::{InputState, Player, PlayerConfig};
pub use presence::{PreChangeSnapshot, PresenceCore, WorldPresence};
pub use progress::ProgressStore;
pub use shift::ShiftBus;
pub use sim::Simulation;
