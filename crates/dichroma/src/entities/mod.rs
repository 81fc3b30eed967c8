//! # Scene Registry
//!
//! Storage for world-bound entities plus the id-to-entity resolution the
//! shift bus dispatch goes through. Always-solid walls are plain colliders
//! in the space and never appear here.

pub mod block;
pub mod plate;
pub mod solid;

pub use block::Block;
pub use plate::{Plate, PlateBehavior, PlateConfig};
pub use solid::{WorldSolid, DEFAULT_INACTIVE_ALPHA};

use std::collections::HashMap;

use dichroma_core::{EntityId, WorldState};
use dichroma_physics::Space;

use crate::presence::{self, PresenceCtx, WorldPresence};

enum SceneEntry {
    Plate(usize),
    Block(usize),
    Solid(usize),
}

/// All world-bound entities, indexed by id.
#[derive(Default)]
pub struct Scene {
    plates: Vec<Plate>,
    blocks: Vec<Block>,
    solids: Vec<WorldSolid>,
    index: HashMap<EntityId, SceneEntry>,
}

impl Scene {
    /// Creates an empty scene.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plate.
    pub fn add_plate(&mut self, plate: Plate) {
        self.index
            .insert(plate.id(), SceneEntry::Plate(self.plates.len()));
        self.plates.push(plate);
    }

    /// Registers a block.
    pub fn add_block(&mut self, block: Block) {
        self.index
            .insert(block.id(), SceneEntry::Block(self.blocks.len()));
        self.blocks.push(block);
    }

    /// Registers a solid.
    pub fn add_solid(&mut self, solid: WorldSolid) {
        self.index
            .insert(solid.id(), SceneEntry::Solid(self.solids.len()));
        self.solids.push(solid);
    }

    /// Plates, in spawn order.
    #[must_use]
    pub fn plates(&self) -> &[Plate] {
        &self.plates
    }

    /// Plates, mutable.
    pub fn plates_mut(&mut self) -> &mut [Plate] {
        &mut self.plates
    }

    /// Blocks, in spawn order.
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Blocks, mutable.
    pub fn blocks_mut(&mut self) -> &mut [Block] {
        &mut self.blocks
    }

    /// Solids, in spawn order.
    #[must_use]
    pub fn solids(&self) -> &[WorldSolid] {
        &self.solids
    }

    /// Looks up a plate by id.
    pub fn plate_mut(&mut self, id: EntityId) -> Option<&mut Plate> {
        match self.index.get(&id)? {
            SceneEntry::Plate(i) => self.plates.get_mut(*i),
            _ => None,
        }
    }

    /// Looks up a block by id.
    pub fn block_mut(&mut self, id: EntityId) -> Option<&mut Block> {
        match self.index.get(&id)? {
            SceneEntry::Block(i) => self.blocks.get_mut(*i),
            _ => None,
        }
    }

    /// Delivers the pre-change hook to one subscriber.
    pub fn deliver_pre_world_change(
        &mut self,
        id: EntityId,
        space: &Space,
        now: f32,
        from: WorldState,
        to: WorldState,
    ) {
        match self.index.get(&id) {
            Some(SceneEntry::Plate(i)) => {
                presence::deliver_pre_world_change(&mut self.plates[*i], space, now, from, to);
            }
            Some(SceneEntry::Block(i)) => {
                presence::deliver_pre_world_change(&mut self.blocks[*i], space, now, from, to);
            }
            Some(SceneEntry::Solid(i)) => {
                presence::deliver_pre_world_change(&mut self.solids[*i], space, now, from, to);
            }
            None => {}
        }
    }

    /// Delivers the post-change hook to one subscriber.
    pub fn deliver_world_changed(
        &mut self,
        id: EntityId,
        ctx: &mut PresenceCtx<'_>,
        to: WorldState,
    ) {
        match self.index.get(&id) {
            Some(SceneEntry::Plate(i)) => {
                let retry = self.plates[*i].presence_retry_ticks();
                presence::deliver_world_changed(&mut self.plates[*i], ctx, to, retry);
            }
            Some(SceneEntry::Block(i)) => {
                presence::deliver_world_changed(&mut self.blocks[*i], ctx, to, 0);
            }
            Some(SceneEntry::Solid(i)) => {
                presence::deliver_world_changed(&mut self.solids[*i], ctx, to, 0);
            }
            None => {}
        }
    }

    /// Checks the global consistency invariant: every entity's active flag
    /// agrees with the solid world. Returns the first offender, if any.
    #[must_use]
    pub fn find_inconsistency(&self, solid_world: WorldState) -> Option<EntityId> {
        let bad_plate = self
            .plates
            .iter()
            .find(|p| p.presence().is_active() != (p.presence().owner_world() == solid_world))
            .map(Plate::id);
        if bad_plate.is_some() {
            return bad_plate;
        }
        let bad_block = self
            .blocks
            .iter()
            .find(|b| b.presence().is_active() != (b.presence().owner_world() == solid_world))
            .map(Block::id);
        if bad_block.is_some() {
            return bad_block;
        }
        self.solids
            .iter()
            .find(|s| s.presence().is_active() != (s.presence().owner_world() == solid_world))
            .map(WorldSolid::id)
    }
}
