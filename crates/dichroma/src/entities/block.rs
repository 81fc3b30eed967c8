//! # Movable Blocks
//!
//! The Secondary occupant: a dynamic box under gravity that exists only in
//! its owner world. "World not active" means the block does not exist -
//! not simulated, not collidable, not visible - which is precisely why
//! plates need the latch: the block's disappearance fires sensor exits that
//! have nothing to do with it physically leaving.

use dichroma_core::{EntityId, Vec2};
use dichroma_physics::{Body, ColliderHandle, Layer, Space};

use crate::events::GameEvent;
use crate::presence::{PresenceCore, PresenceCtx, WorldPresence};

/// A movable, world-bound block.
pub struct Block {
    id: EntityId,
    core: PresenceCore,
    body: Body,
    collider: ColliderHandle,
    visible: bool,
}

impl Block {
    /// Layers a block collides against.
    pub const SOLID_MASK: Layer = Layer(Layer::SOLID.0 | Layer::WALL.0);

    /// Wires up a block around an already-created collider.
    #[must_use]
    pub fn new(id: EntityId, core: PresenceCore, body: Body, collider: ColliderHandle) -> Self {
        let visible = core.is_active();
        Self {
            id,
            core,
            body,
            collider,
            visible,
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

    /// The block's collider.
    #[must_use]
    pub fn collider(&self) -> ColliderHandle {
        self.collider
    }

    /// Whether the block renders this frame.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// One physics step. Inactive blocks are not simulated at all.
    pub fn fixed_tick(&mut self, ctx: &mut PresenceCtx<'_>) {
        if !self.core.is_active() {
            return;
        }
        self.body
            .integrate(ctx.clock.fixed_dt(), ctx.space, self.collider, Self::SOLID_MASK);
        ctx.space.set_center(self.collider, self.body.position);
    }

    /// Teleports the block, snapping to `grid` if positive. Teleports move
    /// the collider without crossing the space in between; sensors notice
    /// on their next update.
    pub fn teleport_to(&mut self, ctx: &mut PresenceCtx<'_>, target: Vec2, grid: f32) {
        let to = if grid > 0.0 {
            Vec2::new(
                (target.x / grid).round() * grid,
                (target.y / grid).round() * grid,
            )
        } else {
            target
        };
        self.body.position = to;
        self.body.velocity = Vec2::ZERO;
        ctx.space.set_center(self.collider, to);
        ctx.events.send(GameEvent::BlockTeleported { block: self.id, to });
        tracing::debug!("block {:?} teleported to ({:.2}, {:.2})", self.id, to.x, to.y);
    }
}

impl WorldPresence for Block {
    fn presence(&self) -> &PresenceCore {
        &self.core
    }

    fn presence_mut(&mut self) -> &mut PresenceCore {
        &mut self.core
    }

    fn set_components_active(&mut self, space: &mut Space, active: bool) {
        space.set_enabled(self.collider, active);
        self.visible = active;
    }

    fn on_became_inactive(&mut self, _ctx: &mut PresenceCtx<'_>, _had_player: bool, _had_block: bool) {
        // Freeze: whatever momentum the block had does not survive its
        // world going intangible.
        self.body.velocity = Vec2::ZERO;
    }

    fn on_became_active(&mut self, _ctx: &mut PresenceCtx<'_>) {}

    fn on_occupancy_changed(&mut self, _ctx: &mut PresenceCtx<'_>) {}
}
