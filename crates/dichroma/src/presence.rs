//! # World Presence
//!
//! The contract every world-bound entity implements to stay consistent
//! across a shift, and the reusable state that drives it.
//!
//! The hard case this module exists for: the pre-change snapshot. Collider
//! disablement happens on `world_changed`, one event after
//! `pre_world_change` - so an entity that waits until deactivation to ask
//! "was I occupied" can already be wrong, because the occupant's own
//! collider may have been disabled (and its sensor exit delivered) in
//! between. The snapshot is taken in the pre hook, while every collider is
//! still enabled, and consumed exactly once at deactivation.
//!
//! Entities implement the [`WorldPresence`] capability trait; the generic
//! controller logic lives in [`deliver_pre_world_change`] and
//! [`deliver_world_changed`], with [`PresenceCore`] composed into each
//! entity as a value, not inherited.

use dichroma_core::{Countdown, FixedClock, WorldState};
use dichroma_physics::Space;

use crate::events::EventSender;

/// Occupancy facts captured in the pre-change hook, before any collider is
/// disabled. Consumed exactly once by the deactivation step.
#[derive(Clone, Copy, Debug, Default)]
pub struct PreChangeSnapshot {
    /// A player was present.
    pub had_player: bool,
    /// A movable block was present.
    pub had_block: bool,
}

/// Everything a presence hook may touch.
pub struct PresenceCtx<'a> {
    /// The collision space (for probes and component toggling).
    pub space: &'a mut Space,
    /// The simulation clock.
    pub clock: &'a FixedClock,
    /// Outbound event sink.
    pub events: &'a EventSender,
    /// Whether the camera view is currently flipped (white world solid).
    pub view_flipped: bool,
}

/// One step of a deferred occupancy rebuild.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RebuildStep {
    /// No rebuild pending.
    Idle,
    /// Retry the rebuild this tick; more attempts remain.
    Retry,
    /// Retry this tick; this is the final attempt.
    LastAttempt,
}

/// Reusable world-presence state composed into each world-bound entity.
#[derive(Clone, Copy, Debug)]
pub struct PresenceCore {
    owner_world: WorldState,
    active: bool,
    snapshot: Option<PreChangeSnapshot>,
    rebuild: Option<Countdown>,
}

impl PresenceCore {
    /// Creates presence state for an entity owned by `owner_world`, active
    /// iff that world is currently solid.
    #[must_use]
    pub fn new(owner_world: WorldState, solid_world: WorldState) -> Self {
        Self {
            owner_world,
            active: owner_world == solid_world,
            snapshot: None,
            rebuild: None,
        }
    }

    /// The world this entity is solid and visible in. Immutable after
    /// spawn.
    #[inline]
    #[must_use]
    pub const fn owner_world(&self) -> WorldState {
        self.owner_world
    }

    /// Whether the entity is currently active (solid + visible).
    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// True if the pre hook should capture a snapshot: currently active and
    /// about to become inactive.
    #[must_use]
    pub fn wants_snapshot(&self, from: WorldState, to: WorldState) -> bool {
        self.active && from == self.owner_world && to != self.owner_world
    }

    /// Stores the pre-change snapshot.
    pub fn store_snapshot(&mut self, snapshot: PreChangeSnapshot) {
        self.snapshot = Some(snapshot);
    }

    /// Consumes the stored snapshot, if any.
    pub fn take_snapshot(&mut self) -> Option<PreChangeSnapshot> {
        self.snapshot.take()
    }

    /// Applies the new solid world. Returns the new active flag if it
    /// changed, `None` if nothing changed.
    pub fn apply_world(&mut self, solid_world: WorldState) -> Option<bool> {
        let new_active = solid_world == self.owner_world;
        if new_active == self.active {
            return None;
        }
        self.active = new_active;
        Some(new_active)
    }

    /// Schedules a deferred occupancy rebuild over `ticks` physics steps.
    pub fn begin_rebuild(&mut self, ticks: u32) {
        self.rebuild = Some(Countdown::new(ticks.max(1)));
    }

    /// Cancels a pending rebuild (deactivation, or occupant found).
    pub fn cancel_rebuild(&mut self) {
        self.rebuild = None;
    }

    /// True while a deferred rebuild is pending.
    #[must_use]
    pub fn rebuild_pending(&self) -> bool {
        self.rebuild.is_some()
    }

    /// Draws one tick from the pending rebuild.
    pub fn step_rebuild(&mut self) -> RebuildStep {
        match self.rebuild.as_mut() {
            None => RebuildStep::Idle,
            Some(countdown) => {
                if countdown.step() {
                    self.rebuild = None;
                    RebuildStep::LastAttempt
                } else {
                    RebuildStep::Retry
                }
            }
        }
    }
}

/// Capability trait for world-bound entities.
///
/// The three `on_*` hooks are the entity-specific behavior; the rest feeds
/// the generic controller. Entities that track no occupancy keep the
/// default no-op implementations.
pub trait WorldPresence {
    /// Shared presence state.
    fn presence(&self) -> &PresenceCore;
    /// Shared presence state, mutable.
    fn presence_mut(&mut self) -> &mut PresenceCore;

    /// Captures occupancy facts right now, by the fastest reliable means
    /// available (occupant map, then probes). Also the fallback when a
    /// deactivation finds no stored snapshot.
    fn snapshot_occupancy(&mut self, space: &Space, now: f32) -> PreChangeSnapshot {
        let _ = (space, now);
        PreChangeSnapshot::default()
    }

    /// Enables or disables this entity's colliders/sensor/visibility.
    fn set_components_active(&mut self, space: &mut Space, active: bool);

    /// Clears and rebuilds the occupant map from a fresh overlap query.
    /// Returns true if any occupant was found. Default: tracks nothing.
    fn rebuild_occupancy(&mut self, space: &Space, now: f32) -> bool {
        let _ = (space, now);
        false
    }

    /// Whether this entity tracks occupancy (drives the deferred rebuild).
    fn tracks_occupancy(&self) -> bool {
        false
    }

    /// The entity just became inactive, with the occupancy facts captured
    /// before its components were disabled.
    fn on_became_inactive(&mut self, ctx: &mut PresenceCtx<'_>, had_player: bool, had_block: bool);

    /// The entity just became active again.
    fn on_became_active(&mut self, ctx: &mut PresenceCtx<'_>);

    /// The entity's occupancy changed while active.
    fn on_occupancy_changed(&mut self, ctx: &mut PresenceCtx<'_>);
}

/// Generic pre-change delivery: snapshot occupancy while every collider is
/// still enabled.
pub fn deliver_pre_world_change<T: WorldPresence + ?Sized>(
    entity: &mut T,
    space: &Space,
    now: f32,
    from: WorldState,
    to: WorldState,
) {
    if !entity.presence().wants_snapshot(from, to) {
        return;
    }
    let snapshot = entity.snapshot_occupancy(space, now);
    entity.presence_mut().store_snapshot(snapshot);
}

/// Generic post-change delivery: toggle components, route the snapshot, run
/// the rebuild-or-defer dance.
pub fn deliver_world_changed<T: WorldPresence + ?Sized>(
    entity: &mut T,
    ctx: &mut PresenceCtx<'_>,
    to: WorldState,
    rebuild_retry_ticks: u32,
) {
    let Some(new_active) = entity.presence_mut().apply_world(to) else {
        return;
    };

    if !new_active {
        // Consume the pre-change snapshot; if the pre hook never ran (e.g.
        // the entity spawned mid-dispatch) fall back to probing right now,
        // before components go down.
        let snapshot = match entity.presence_mut().take_snapshot() {
            Some(snapshot) => snapshot,
            None => entity.snapshot_occupancy(ctx.space, ctx.clock.time()),
        };
        entity.presence_mut().cancel_rebuild();
        entity.set_components_active(ctx.space, false);
        entity.on_became_inactive(ctx, snapshot.had_player, snapshot.had_block);
        return;
    }

    // Reactivation.
    entity.presence_mut().cancel_rebuild();
    entity.set_components_active(ctx.space, true);
    let found = entity.rebuild_occupancy(ctx.space, ctx.clock.time());
    entity.on_became_active(ctx);

    if entity.tracks_occupancy() {
        if found {
            entity.on_occupancy_changed(ctx);
        } else {
            // A cooperating entity's collider may legally still be disabled
            // this tick (it sits later in the dispatch order). Retry for a
            // bounded number of physics steps before concluding "empty".
            entity.presence_mut().begin_rebuild(rebuild_retry_ticks);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wants_snapshot_only_when_deactivating() {
        let core = PresenceCore::new(WorldState::Black, WorldState::Black);
        assert!(core.is_active());
        assert!(core.wants_snapshot(WorldState::Black, WorldState::White));
        // Not our departure.
        assert!(!core.wants_snapshot(WorldState::White, WorldState::Black));

        let inactive = PresenceCore::new(WorldState::Black, WorldState::White);
        assert!(!inactive.is_active());
        assert!(!inactive.wants_snapshot(WorldState::Black, WorldState::White));
    }

    #[test]
    fn test_apply_world_reports_only_changes() {
        let mut core = PresenceCore::new(WorldState::Black, WorldState::Black);
        assert_eq!(core.apply_world(WorldState::Black), None);
        assert_eq!(core.apply_world(WorldState::White), Some(false));
        assert_eq!(core.apply_world(WorldState::White), None);
        assert_eq!(core.apply_world(WorldState::Black), Some(true));
    }

    #[test]
    fn test_snapshot_consumed_once() {
        let mut core = PresenceCore::new(WorldState::Black, WorldState::Black);
        core.store_snapshot(PreChangeSnapshot {
            had_player: true,
            had_block: false,
        });
        let snap = core.take_snapshot().expect("stored");
        assert!(snap.had_player);
        assert!(core.take_snapshot().is_none());
    }

    #[test]
    fn test_rebuild_countdown() {
        let mut core = PresenceCore::new(WorldState::Black, WorldState::Black);
        assert_eq!(core.step_rebuild(), RebuildStep::Idle);

        core.begin_rebuild(3);
        assert!(core.rebuild_pending());
        assert_eq!(core.step_rebuild(), RebuildStep::Retry);
        assert_eq!(core.step_rebuild(), RebuildStep::Retry);
        assert_eq!(core.step_rebuild(), RebuildStep::LastAttempt);
        assert_eq!(core.step_rebuild(), RebuildStep::Idle);

        core.begin_rebuild(2);
        core.cancel_rebuild();
        assert_eq!(core.step_rebuild(), RebuildStep::Idle);
    }
}
