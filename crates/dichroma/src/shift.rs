//! # The Shift Bus
//!
//! The single authoritative owner of [`WorldState`] and the broadcast
//! contract every world-bound entity builds on:
//!
//! 1. `pre_world_change(from, to)` is delivered to every subscriber, in
//!    registration order, while `solid_world()` still answers `from`.
//! 2. The state mutates.
//! 3. `world_changed(to)` is delivered the same way; `solid_world()` now
//!    answers `to`.
//!
//! Both phases run synchronously inside the caller's tick. Setting the
//! already-current world is an idempotent no-op: no delivery, no mutation.
//!
//! Dispatch takes `&self`: the solid world lives in a `Cell`, mutated only
//! inside `toggle`/`set_world`. That lets subscribers keep a shared
//! reference to the bus and query it mid-dispatch, which is exactly the
//! old-state/new-state visibility the contract promises. The simulation is
//! single-threaded; there is no locking to get wrong.
//!
//! Delivery goes through a [`WorldObserverHost`] so the bus owns the
//! subscriber list and ordering without owning the entities; the simulation
//! resolves subscriber ids to concrete entities.

use std::cell::Cell;

use dichroma_core::{EntityId, WorldState};

/// Resolves subscriber ids to concrete entities during a dispatch.
pub trait WorldObserverHost {
    /// Deliver the pre-change hook to one subscriber.
    fn deliver_pre_world_change(&mut self, id: EntityId, from: WorldState, to: WorldState);
    /// Deliver the post-change hook to one subscriber.
    fn deliver_world_changed(&mut self, id: EntityId, to: WorldState);
}

/// The world-state broadcaster.
pub struct ShiftBus {
    solid: Cell<WorldState>,
    /// Subscribers in registration order. Order is the delivery order.
    subscribers: Vec<EntityId>,
    /// Total completed world changes (telemetry).
    changes: Cell<u64>,
    /// Re-entrancy guard: a hook must not drive another change.
    dispatching: Cell<bool>,
}

impl ShiftBus {
    /// Creates a bus with `start` as the initially solid world.
    #[must_use]
    pub fn new(start: WorldState) -> Self {
        Self {
            solid: Cell::new(start),
            subscribers: Vec::new(),
            changes: Cell::new(0),
            dispatching: Cell::new(false),
        }
    }

    /// The currently solid world.
    #[inline]
    #[must_use]
    pub fn solid_world(&self) -> WorldState {
        self.solid.get()
    }

    /// Whether the camera view (and horizontal input) is inverted.
    ///
    /// The white world is authored upside-down; while it is solid the
    /// camera rotates 180 degrees.
    #[inline]
    #[must_use]
    pub fn is_view_flipped(&self) -> bool {
        self.solid.get() == WorldState::White
    }

    /// Completed world changes since construction.
    #[inline]
    #[must_use]
    pub fn change_count(&self) -> u64 {
        self.changes.get()
    }

    /// Registers a subscriber. Re-registering keeps the original position.
    pub fn subscribe(&mut self, id: EntityId) {
        if !self.subscribers.contains(&id) {
            self.subscribers.push(id);
        }
    }

    /// Removes a subscriber. Unknown ids are ignored.
    pub fn unsubscribe(&mut self, id: EntityId) {
        self.subscribers.retain(|&s| s != id);
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Flips the solid world. Returns the completed `(from, to)` pair.
    pub fn toggle<H: WorldObserverHost>(&self, host: &mut H) -> (WorldState, WorldState) {
        let from = self.solid.get();
        let to = from.opposite();
        self.set_world(to, host);
        (from, to)
    }

    /// Sets the solid world. No-op (no events) if `to` is already solid.
    /// Returns true if a change happened.
    pub fn set_world<H: WorldObserverHost>(&self, to: WorldState, host: &mut H) -> bool {
        if self.solid.get() == to {
            return false;
        }
        if self.dispatching.replace(true) {
            // A subscriber hook tried to drive a nested change. The player
            // transition controller is the only legitimate driver; refuse.
            tracing::warn!("re-entrant world change to {} ignored", to.name());
            return false;
        }
        let from = self.solid.get();
        let order = self.subscribers.clone();

        for &id in &order {
            host.deliver_pre_world_change(id, from, to);
        }

        self.solid.set(to);
        self.changes.set(self.changes.get() + 1);

        for &id in &order {
            host.deliver_world_changed(id, to);
        }

        self.dispatching.set(false);

        tracing::info!(
            "world shift: {} -> {} ({} subscribers, change #{})",
            from.name(),
            to.name(),
            order.len(),
            self.changes.get()
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records delivery order and what the bus answered at each hook.
    struct RecordingHost<'a> {
        bus: &'a ShiftBus,
        log: Vec<(EntityId, &'static str, WorldState)>,
    }

    impl WorldObserverHost for RecordingHost<'_> {
        fn deliver_pre_world_change(&mut self, id: EntityId, _from: WorldState, _to: WorldState) {
            self.log.push((id, "pre", self.bus.solid_world()));
        }
        fn deliver_world_changed(&mut self, id: EntityId, _to: WorldState) {
            self.log.push((id, "post", self.bus.solid_world()));
        }
    }

    struct NullHost;
    impl WorldObserverHost for NullHost {
        fn deliver_pre_world_change(&mut self, _: EntityId, _: WorldState, _: WorldState) {}
        fn deliver_world_changed(&mut self, _: EntityId, _: WorldState) {}
    }

    #[test]
    fn test_set_same_world_is_idempotent() {
        let bus = ShiftBus::new(WorldState::White);
        let mut host = RecordingHost {
            bus: &bus,
            log: Vec::new(),
        };
        let changed = bus.set_world(WorldState::White, &mut host);
        assert!(!changed);
        assert!(host.log.is_empty());
        assert_eq!(bus.change_count(), 0);
    }

    #[test]
    fn test_pre_sees_old_state_post_sees_new() {
        let mut bus = ShiftBus::new(WorldState::White);
        bus.subscribe(EntityId::new(1, 0));
        bus.subscribe(EntityId::new(2, 0));

        let mut host = RecordingHost {
            bus: &bus,
            log: Vec::new(),
        };
        bus.toggle(&mut host);
        let log = host.log;

        assert_eq!(log.len(), 4);
        // All pre deliveries complete before any post delivery.
        assert_eq!(log[0].1, "pre");
        assert_eq!(log[1].1, "pre");
        assert_eq!(log[2].1, "post");
        assert_eq!(log[3].1, "post");
        // Pre observes the old world, post the new one.
        assert_eq!(log[0].2, WorldState::White);
        assert_eq!(log[1].2, WorldState::White);
        assert_eq!(log[2].2, WorldState::Black);
        assert_eq!(log[3].2, WorldState::Black);
        // Registration order is delivery order.
        assert_eq!(log[0].0, EntityId::new(1, 0));
        assert_eq!(log[1].0, EntityId::new(2, 0));
    }

    #[test]
    fn test_double_toggle_round_trips() {
        let bus = ShiftBus::new(WorldState::Black);
        bus.toggle(&mut NullHost);
        assert_eq!(bus.solid_world(), WorldState::White);
        assert!(bus.is_view_flipped());
        bus.toggle(&mut NullHost);
        assert_eq!(bus.solid_world(), WorldState::Black);
        assert!(!bus.is_view_flipped());
        assert_eq!(bus.change_count(), 2);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut bus = ShiftBus::new(WorldState::Black);
        let a = EntityId::new(1, 0);
        let b = EntityId::new(2, 0);
        bus.subscribe(a);
        bus.subscribe(b);
        bus.unsubscribe(a);

        let mut host = RecordingHost {
            bus: &bus,
            log: Vec::new(),
        };
        bus.toggle(&mut host);

        assert!(host.log.iter().all(|(id, _, _)| *id == b));
        assert_eq!(host.log.len(), 2);
    }

    #[test]
    fn test_reentrant_change_is_refused() {
        struct ReentrantHost<'a> {
            bus: &'a ShiftBus,
            nested_result: Option<bool>,
        }
        impl WorldObserverHost for ReentrantHost<'_> {
            fn deliver_pre_world_change(&mut self, _: EntityId, _: WorldState, to: WorldState) {
                // Misbehaving subscriber tries to flip the world back.
                let mut null = NullHost;
                self.nested_result = Some(self.bus.set_world(to.opposite(), &mut null));
            }
            fn deliver_world_changed(&mut self, _: EntityId, _: WorldState) {}
        }

        let mut bus = ShiftBus::new(WorldState::Black);
        bus.subscribe(EntityId::new(1, 0));
        let mut host = ReentrantHost {
            bus: &bus,
            nested_result: None,
        };
        bus.set_world(WorldState::White, &mut host);

        assert_eq!(host.nested_result, Some(false));
        assert_eq!(bus.solid_world(), WorldState::White);
        assert_eq!(bus.change_count(), 1);
    }
}
