//! # Occupancy Tracking & The Latch
//!
//! Every interactive world-bound entity needs a reliable answer to "who is
//! standing on me", and the one thing this engine guarantees about sensor
//! callbacks is that they cannot be trusted in isolation: colliders get
//! enabled and disabled by several independent components inside one tick,
//! blocks teleport without crossing the space in between, and a shift can
//! fire exits for occupants that never physically left.
//!
//! The answer is layered:
//!
//! - an [`OccupantMap`] reference-counted by occupant identity, updated
//!   incrementally by sensor enter/exit events (the fast path);
//! - a periodic heartbeat that rebuilds the map from a direct overlap query
//!   to correct for missed callbacks (reconciliation, never replacement);
//! - an [`OccupancyLatch`] for the block-holds-the-plate condition: set
//!   instantly on direct observation, cleared only through hysteresis
//!   (consecutive misses AND/OR a grace window, then one final
//!   double-confirming box probe).
//!
//! The asymmetry is deliberate. A latch that stays true one heartbeat too
//! long is a cosmetic glitch; a latch that drops for one bad frame softlocks
//! the puzzle.

use dichroma_core::{Aabb, EntityId};
use dichroma_physics::{ColliderHandle, Layer, Space};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// OCCUPANTS
// ============================================================================

/// What kind of entity an occupant is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OccupantKind {
    /// The player (primary occupant).
    Player,
    /// A movable block (secondary occupant). Only blocks latch.
    Block,
}

impl OccupantKind {
    /// Derives the occupant kind from a collider layer, if the layer is an
    /// occupant layer at all.
    #[must_use]
    pub fn from_layer(layer: Layer) -> Option<Self> {
        if layer.matches(Layer::PLAYER) {
            Some(OccupantKind::Player)
        } else if layer.matches(Layer::BLOCK) {
            Some(OccupantKind::Block)
        } else {
            None
        }
    }
}

/// Reference-counted record for one occupant.
#[derive(Clone, Copy, Debug)]
pub struct OccupantRecord {
    /// How many of this occupant's colliders currently overlap the sensor.
    pub ref_count: u32,
    /// What the occupant is.
    pub kind: OccupantKind,
}

/// Occupants keyed by entity identity.
///
/// Invariant: `ref_count > 0` for every stored record; a count reaching
/// zero removes the entry, so `is_empty()` is exactly "nobody here".
#[derive(Clone, Debug, Default)]
pub struct OccupantMap {
    map: HashMap<EntityId, OccupantRecord>,
}

impl OccupantMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one collider of `id` entering. Returns true if this made
    /// the entity a new occupant (refcount 0 -> 1).
    pub fn notify_enter(&mut self, id: EntityId, kind: OccupantKind) -> bool {
        match self.map.get_mut(&id) {
            Some(record) => {
                record.ref_count += 1;
                false
            }
            None => {
                self.map.insert(id, OccupantRecord { ref_count: 1, kind });
                true
            }
        }
    }

    /// Registers one collider of `id` exiting. Returns the occupant's kind
    /// if this removed the entity entirely (refcount reached zero).
    pub fn notify_exit(&mut self, id: EntityId) -> Option<OccupantKind> {
        let record = self.map.get_mut(&id)?;
        record.ref_count -= 1;
        if record.ref_count == 0 {
            let kind = record.kind;
            self.map.remove(&id);
            Some(kind)
        } else {
            None
        }
    }

    /// True if anyone is present.
    #[inline]
    #[must_use]
    pub fn has_any(&self) -> bool {
        !self.map.is_empty()
    }

    /// True if any occupant of `kind` is present.
    #[must_use]
    pub fn has_kind(&self, kind: OccupantKind) -> bool {
        self.map.values().any(|r| r.kind == kind)
    }

    /// Number of distinct occupants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True when nobody is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Drops every record without notifications.
    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Rebuilds from a fresh physical overlap listing: one refcount per
    /// reported collider, grouped by owner.
    pub fn rebuild<I>(&mut self, overlaps: I)
    where
        I: IntoIterator<Item = (EntityId, OccupantKind)>,
    {
        self.map.clear();
        for (id, kind) in overlaps {
            self.notify_enter(id, kind);
        }
    }
}

// ============================================================================
// SENSOR REGION
// ============================================================================

/// A plate's sensor region: the trigger collider plus the probes built on
/// it.
#[derive(Clone, Copy, Debug)]
pub struct SensorRegion {
    /// The sensor collider in the space.
    pub handle: ColliderHandle,
    /// Layers that count as occupants.
    pub detect_mask: Layer,
    /// Sensor owner (excluded from probes).
    pub owner: EntityId,
}

impl SensorRegion {
    /// Fresh overlap listing through the sensor collider itself. Empty if
    /// the sensor is currently disabled.
    #[must_use]
    pub fn overlap_now(&self, space: &Space) -> Vec<(EntityId, OccupantKind)> {
        space
            .sensor_overlaps(self.handle)
            .into_iter()
            .filter_map(|(h, owner)| {
                let layer = space.get(h)?.layer;
                Some((owner, OccupantKind::from_layer(layer)?))
            })
            .collect()
    }

    /// Geometry box probe over the sensor's region, independent of whether
    /// the sensor collider is enabled. The latch's second opinion.
    #[must_use]
    pub fn probe_box(&self, space: &Space) -> Vec<(EntityId, OccupantKind)> {
        let Some(region) = self.region(space) else {
            return Vec::new();
        };
        space
            .probe_box(&region, self.detect_mask, self.owner)
            .into_iter()
            .filter_map(|(h, owner)| {
                let layer = space.get(h)?.layer;
                Some((owner, OccupantKind::from_layer(layer)?))
            })
            .collect()
    }

    /// World bounds of the sensor region (valid even while disabled).
    #[must_use]
    pub fn region(&self, space: &Space) -> Option<Aabb> {
        space.aabb_of(self.handle)
    }

    /// True if `overlap_now` sees an occupant of `kind`.
    #[must_use]
    pub fn has_kind_now(&self, space: &Space, kind: OccupantKind) -> bool {
        self.overlap_now(space).iter().any(|&(_, k)| k == kind)
    }

    /// True if the box probe sees an occupant of `kind`.
    #[must_use]
    pub fn has_kind_box(&self, space: &Space, kind: OccupantKind) -> bool {
        self.probe_box(space).iter().any(|&(_, k)| k == kind)
    }
}

// ============================================================================
// THE LATCH
// ============================================================================

/// Tuning for the latch hysteresis. None of these values are load-bearing;
/// they trade flicker resistance against release latency.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LatchConfig {
    /// Seconds between heartbeat reconciliation passes.
    pub heartbeat_interval: f32,
    /// Consecutive heartbeats without the block before a clear is armed.
    pub clear_miss_frames: u32,
    /// Grace seconds since last sighting before a clear is armed.
    pub clear_grace_seconds: f32,
}

impl Default for LatchConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: 0.10,
            clear_miss_frames: 3,
            clear_grace_seconds: 0.12,
        }
    }
}

/// The debounced "a block is holding my condition" boolean.
///
/// Fast set, slow clear: `observe` latches immediately; clearing requires
/// the miss/grace thresholds AND a final confirming probe, driven by the
/// owner's heartbeat.
#[derive(Clone, Copy, Debug)]
pub struct OccupancyLatch {
    latched: bool,
    miss_count: u32,
    last_seen_time: f32,
    next_heartbeat_time: f32,
}

impl Default for OccupancyLatch {
    fn default() -> Self {
        Self {
            latched: false,
            miss_count: 0,
            last_seen_time: -999.0,
            next_heartbeat_time: 0.0,
        }
    }
}

impl OccupancyLatch {
    /// Creates an unlatched latch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current latch state.
    #[inline]
    #[must_use]
    pub const fn is_latched(&self) -> bool {
        self.latched
    }

    /// Direct observation of a block: latch immediately, reset the miss
    /// window. Returns true if this flipped the latch on.
    pub fn observe(&mut self, now: f32) -> bool {
        self.last_seen_time = now;
        self.miss_count = 0;
        if self.latched {
            false
        } else {
            self.latched = true;
            true
        }
    }

    /// Restarts the miss window without touching the latch. Called when an
    /// exit notification removes the block from the occupant map - exits
    /// are routinely caused by collider disablement during a shift, so they
    /// are never trusted to clear.
    pub fn restart_miss_window(&mut self) {
        self.miss_count = 0;
    }

    /// One heartbeat in which no probe saw the block. Returns true when the
    /// miss-count or grace-time threshold arms a clear; the caller must
    /// then run the final confirming probe and call [`Self::clear`] or
    /// [`Self::defer_clear`].
    pub fn register_miss(&mut self, now: f32, config: &LatchConfig) -> bool {
        if !self.latched {
            return false;
        }
        self.miss_count += 1;
        let grace = config.clear_grace_seconds.max(0.02);
        let misses = config.clear_miss_frames.max(1);
        let time_expired = (now - self.last_seen_time) >= grace;
        let miss_expired = self.miss_count >= misses;
        time_expired || miss_expired
    }

    /// Commits an armed clear. Returns true if the latch flipped off.
    pub fn clear(&mut self) -> bool {
        self.miss_count = 0;
        if self.latched {
            self.latched = false;
            true
        } else {
            false
        }
    }

    /// The final probe contradicted the clear decision: keep the latch and
    /// reset the miss window as if the block had just been seen.
    pub fn defer_clear(&mut self, now: f32) {
        self.last_seen_time = now;
        self.miss_count = 0;
    }

    /// Drops the latch unconditionally (entity deactivating with no block).
    pub fn reset(&mut self) {
        self.latched = false;
        self.miss_count = 0;
    }

    /// True when the next heartbeat is due.
    #[must_use]
    pub fn heartbeat_due(&self, now: f32) -> bool {
        now >= self.next_heartbeat_time
    }

    /// Schedules the next heartbeat.
    pub fn schedule_heartbeat(&mut self, now: f32, config: &LatchConfig) {
        self.next_heartbeat_time = now + config.heartbeat_interval.max(0.02);
    }

    /// Forces the next heartbeat to run immediately (used on reactivation).
    pub fn expedite_heartbeat(&mut self) {
        self.next_heartbeat_time = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refcount_shared_across_colliders() {
        let mut map = OccupantMap::new();
        let player = EntityId::new(1, 0);

        // Two colliders of the same occupant share one record.
        assert!(map.notify_enter(player, OccupantKind::Player));
        assert!(!map.notify_enter(player, OccupantKind::Player));
        assert_eq!(map.len(), 1);

        // First exit decrements, second removes.
        assert_eq!(map.notify_exit(player), None);
        assert!(map.has_any());
        assert_eq!(map.notify_exit(player), Some(OccupantKind::Player));
        assert!(map.is_empty());

        // Exit without entry is a no-op.
        assert_eq!(map.notify_exit(player), None);
    }

    #[test]
    fn test_has_kind() {
        let mut map = OccupantMap::new();
        map.notify_enter(EntityId::new(1, 0), OccupantKind::Player);
        assert!(map.has_kind(OccupantKind::Player));
        assert!(!map.has_kind(OccupantKind::Block));

        map.notify_enter(EntityId::new(2, 0), OccupantKind::Block);
        assert!(map.has_kind(OccupantKind::Block));
    }

    #[test]
    fn test_rebuild_groups_by_owner() {
        let mut map = OccupantMap::new();
        let block = EntityId::new(5, 0);
        map.rebuild(vec![
            (block, OccupantKind::Block),
            (block, OccupantKind::Block),
            (EntityId::new(6, 0), OccupantKind::Player),
        ]);
        assert_eq!(map.len(), 2);
        assert_eq!(map.notify_exit(block), None);
        assert_eq!(map.notify_exit(block), Some(OccupantKind::Block));
    }

    #[test]
    fn test_latch_fast_set() {
        let mut latch = OccupancyLatch::new();
        assert!(!latch.is_latched());
        assert!(latch.observe(1.0));
        assert!(latch.is_latched());
        // Re-observation is not a transition.
        assert!(!latch.observe(1.1));
    }

    #[test]
    fn test_latch_clears_after_miss_frames() {
        let config = LatchConfig {
            heartbeat_interval: 0.1,
            clear_miss_frames: 3,
            clear_grace_seconds: 100.0, // grace never expires in this test
        };
        let mut latch = OccupancyLatch::new();
        latch.observe(0.0);

        assert!(!latch.register_miss(0.1, &config));
        assert!(!latch.register_miss(0.2, &config));
        assert!(latch.register_miss(0.3, &config));
        assert!(latch.clear());
        assert!(!latch.is_latched());
    }

    #[test]
    fn test_latch_clears_after_grace_time() {
        let config = LatchConfig {
            heartbeat_interval: 0.1,
            clear_miss_frames: 1000, // misses never expire in this test
            clear_grace_seconds: 0.12,
        };
        let mut latch = OccupancyLatch::new();
        latch.observe(0.0);

        assert!(!latch.register_miss(0.1, &config));
        assert!(latch.register_miss(0.13, &config));
    }

    #[test]
    fn test_deferred_clear_resets_the_window() {
        let config = LatchConfig {
            heartbeat_interval: 0.1,
            clear_miss_frames: 2,
            clear_grace_seconds: 100.0,
        };
        let mut latch = OccupancyLatch::new();
        latch.observe(0.0);

        assert!(!latch.register_miss(0.1, &config));
        assert!(latch.register_miss(0.2, &config));
        // Final probe saw the block after all: clear deferred.
        latch.defer_clear(0.2);
        assert!(latch.is_latched());
        // The window starts over.
        assert!(!latch.register_miss(0.3, &config));
        assert!(latch.register_miss(0.4, &config));
    }

    #[test]
    fn test_exit_never_clears() {
        let mut latch = OccupancyLatch::new();
        latch.observe(0.0);
        latch.restart_miss_window();
        assert!(latch.is_latched());
    }
}
