//! # World Solids
//!
//! Static world-bound geometry: tiles and platforms that are solid only
//! while their owner world is solid. While inactive they keep existing
//! visually as ghosts (the renderer draws them at `inactive_alpha`) but
//! their collider is gone.

use dichroma_core::EntityId;
use dichroma_physics::{ColliderHandle, Space};

use crate::presence::{PresenceCore, PresenceCtx, WorldPresence};

/// Alpha applied to a solid's sprite while its world is not solid.
pub const DEFAULT_INACTIVE_ALPHA: f32 = 0.15;

/// A static world-bound collider.
pub struct WorldSolid {
    id: EntityId,
    core: PresenceCore,
    collider: ColliderHandle,
    /// Render alpha, toggled by presence. Read by the presentation layer.
    alpha: f32,
    inactive_alpha: f32,
}

impl WorldSolid {
    /// Wires up a solid around an already-created collider.
    #[must_use]
    pub fn new(
        id: EntityId,
        core: PresenceCore,
        collider: ColliderHandle,
        inactive_alpha: f32,
    ) -> Self {
        let alpha = if core.is_active() { 1.0 } else { inactive_alpha };
        Self {
            id,
            core,
            collider,
            alpha,
            inactive_alpha,
        }
    }

    /// Entity id.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// The solid's collider.
    #[must_use]
    pub fn collider(&self) -> ColliderHandle {
        self.collider
    }

    /// Current render alpha.
    #[must_use]
    pub fn alpha(&self) -> f32 {
        self.alpha
    }
}

impl WorldPresence for WorldSolid {
    fn presence(&self) -> &PresenceCore {
        &self.core
    }

    fn presence_mut(&mut self) -> &mut PresenceCore {
        &mut self.core
    }

    fn set_components_active(&mut self, space: &mut Space, active: bool) {
        space.set_enabled(self.collider, active);
        self.alpha = if active { 1.0 } else { self.inactive_alpha };
    }

    fn on_became_inactive(&mut self, _ctx: &mut PresenceCtx<'_>, _had_player: bool, _had_block: bool) {}

    fn on_became_active(&mut self, _ctx: &mut PresenceCtx<'_>) {}

    fn on_occupancy_changed(&mut self, _ctx: &mut PresenceCtx<'_>) {}
}
