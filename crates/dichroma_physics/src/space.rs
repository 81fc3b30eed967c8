//! # Collision Space
//!
//! An arena of AABB colliders. Each collider carries a layer, an owner
//! entity, an enabled flag and a blocking flag. Sensors are non-blocking
//! colliders that track which blocking colliders overlap them and emit
//! enter/exit events when that set changes.

use dichroma_core::{Aabb, EntityId, Vec2};

use crate::raycast::{ray_vs_aabb, RayHit};

// ============================================================================
// LAYERS
// ============================================================================

/// Collision layer bitmask.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layer(pub u32);

impl Layer {
    /// World geometry owned by one of the two worlds (tiles, platforms,
    /// plates, blocks). Standable.
    pub const SOLID: Layer = Layer(1 << 0);
    /// Always-solid walls. Solid in both worlds; shifting while standing on
    /// one is forbidden.
    pub const WALL: Layer = Layer(1 << 1);
    /// The player's own collider.
    pub const PLAYER: Layer = Layer(1 << 2);
    /// Movable blocks (also on SOLID for standability; this bit exists so
    /// sensors can narrow their detect mask).
    pub const BLOCK: Layer = Layer(1 << 3);

    /// Everything.
    pub const ALL: Layer = Layer(u32::MAX);
    /// Nothing.
    pub const NONE: Layer = Layer(0);

    /// True if any bit overlaps with `mask`.
    #[inline]
    #[must_use]
    pub const fn matches(self, mask: Layer) -> bool {
        self.0 & mask.0 != 0
    }

    /// Union of two masks.
    #[inline]
    #[must_use]
    pub const fn union(self, other: Layer) -> Layer {
        Layer(self.0 | other.0)
    }
}

// ============================================================================
// COLLIDERS
// ============================================================================

/// What role a collider plays in the space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColliderKind {
    /// A physical collider. Participates in movement, raycasts and overlap
    /// queries while `blocking` is true.
    Solid,
    /// A sensor region. Never blocks; tracks overlapping blocking colliders
    /// that match `detect_mask` and emits enter/exit events.
    Sensor {
        /// Which layers this sensor notices.
        detect_mask: Layer,
    },
}

/// A collider in the space.
#[derive(Clone, Copy, Debug)]
pub struct Collider {
    /// Center position in world space.
    pub center: Vec2,
    /// Half-extents.
    pub half: Vec2,
    /// Collision layer (single bit by convention).
    pub layer: Layer,
    /// Owning entity, for occupant identity and self-exclusion.
    pub owner: EntityId,
    /// Disabled colliders are invisible to every query.
    pub enabled: bool,
    /// Non-blocking colliders are pass-through: ignored by movement,
    /// raycasts, solid overlap queries and sensors alike. Only blocking
    /// colliders ever count as occupants.
    pub blocking: bool,
    /// Role of the collider.
    pub kind: ColliderKind,
}

impl Collider {
    /// World-space bounds.
    #[inline]
    #[must_use]
    pub fn aabb(&self) -> Aabb {
        Aabb::from_center(self.center, self.half.x * 2.0, self.half.y * 2.0)
    }

    fn is_queryable(&self) -> bool {
        self.enabled && self.blocking && matches!(self.kind, ColliderKind::Solid)
    }
}

/// Handle to a collider, generation-checked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ColliderHandle {
    index: u32,
    generation: u32,
}

impl ColliderHandle {
    /// A handle that never resolves.
    pub const INVALID: Self = Self {
        index: u32::MAX,
        generation: u32::MAX,
    };
}

// ============================================================================
// QUERY RESULTS
// ============================================================================

/// Result of a closest-distance query between two AABBs.
#[derive(Clone, Copy, Debug)]
pub struct Separation {
    /// Signed distance. Negative means the boxes overlap by `-distance`.
    pub distance: f32,
    /// Direction from the first box toward the second along the minimal
    /// axis. Push the first box by `-normal` to separate.
    pub normal: Vec2,
}

/// A contact between a queried AABB and a collider in the space.
#[derive(Clone, Copy, Debug)]
pub struct Contact {
    /// The touching collider.
    pub handle: ColliderHandle,
    /// Owner of the touching collider.
    pub owner: EntityId,
    /// Contact normal pointing from the collider toward the queried AABB.
    pub normal: Vec2,
}

/// Sensor overlap transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SensorEventKind {
    /// A blocking collider started overlapping the sensor.
    Enter,
    /// A previously-overlapping collider stopped overlapping (including by
    /// being disabled or made non-blocking).
    Exit,
}

/// An enter/exit transition observed on a sensor.
#[derive(Clone, Copy, Debug)]
pub struct SensorEvent {
    /// The sensor that observed the transition.
    pub sensor: ColliderHandle,
    /// Owner of the sensor.
    pub sensor_owner: EntityId,
    /// The collider that entered or exited.
    pub other: ColliderHandle,
    /// Owner of that collider.
    pub other_owner: EntityId,
    /// Enter or exit.
    pub kind: SensorEventKind,
}

// ============================================================================
// SPACE
// ============================================================================

struct Slot {
    collider: Collider,
    generation: u32,
    live: bool,
    /// For sensors: handles overlapped last update (sorted by index).
    sensor_contacts: Vec<ColliderHandle>,
}

/// The collision space.
#[derive(Default)]
pub struct Space {
    slots: Vec<Slot>,
    free: Vec<u32>,
    pending_events: Vec<SensorEvent>,
}

impl Space {
    /// Creates an empty space.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a collider and returns its handle.
    pub fn add_collider(&mut self, collider: Collider) -> ColliderHandle {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.collider = collider;
            slot.live = true;
            slot.sensor_contacts.clear();
            return ColliderHandle {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            collider,
            generation: 0,
            live: true,
            sensor_contacts: Vec::new(),
        });
        ColliderHandle {
            index,
            generation: 0,
        }
    }

    /// Removes a collider. Stale handles are ignored.
    pub fn remove_collider(&mut self, handle: ColliderHandle) {
        if let Some(slot) = self.slot_mut(handle) {
            slot.live = false;
            slot.generation = slot.generation.wrapping_add(1);
            slot.sensor_contacts.clear();
            self.free.push(handle.index);
        }
    }

    fn slot(&self, handle: ColliderHandle) -> Option<&Slot> {
        let slot = self.slots.get(handle.index as usize)?;
        (slot.live && slot.generation == handle.generation).then_some(slot)
    }

    fn slot_mut(&mut self, handle: ColliderHandle) -> Option<&mut Slot> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        (slot.live && slot.generation == handle.generation).then_some(slot)
    }

    /// Looks up a collider.
    #[must_use]
    pub fn get(&self, handle: ColliderHandle) -> Option<&Collider> {
        self.slot(handle).map(|s| &s.collider)
    }

    /// World bounds of a collider, if the handle is live.
    #[must_use]
    pub fn aabb_of(&self, handle: ColliderHandle) -> Option<Aabb> {
        self.get(handle).map(Collider::aabb)
    }

    /// Moves a collider's center.
    pub fn set_center(&mut self, handle: ColliderHandle, center: Vec2) {
        if let Some(slot) = self.slot_mut(handle) {
            slot.collider.center = center;
        }
    }

    /// Enables or disables a collider. Disabled colliders vanish from every
    /// query; sensors notice the disappearance on their next update and emit
    /// exits.
    pub fn set_enabled(&mut self, handle: ColliderHandle, enabled: bool) {
        if let Some(slot) = self.slot_mut(handle) {
            slot.collider.enabled = enabled;
        }
    }

    /// Switches a collider between blocking and pass-through.
    pub fn set_blocking(&mut self, handle: ColliderHandle, blocking: bool) {
        if let Some(slot) = self.slot_mut(handle) {
            slot.collider.blocking = blocking;
        }
    }

    /// Whether a collider is currently enabled.
    #[must_use]
    pub fn is_enabled(&self, handle: ColliderHandle) -> bool {
        self.get(handle).map(|c| c.enabled).unwrap_or(false)
    }

    fn live_solids(&self) -> impl Iterator<Item = (ColliderHandle, &Collider)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            if !slot.live || !slot.collider.is_queryable() {
                return None;
            }
            Some((
                ColliderHandle {
                    index: i as u32,
                    generation: slot.generation,
                },
                &slot.collider,
            ))
        })
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Returns every enabled blocking collider on `mask` whose bounds
    /// overlap `aabb`, excluding colliders owned by `exclude_owner`.
    #[must_use]
    pub fn overlap_aabb(
        &self,
        aabb: &Aabb,
        mask: Layer,
        exclude_owner: EntityId,
    ) -> Vec<ColliderHandle> {
        self.live_solids()
            .filter(|(_, c)| c.layer.matches(mask))
            .filter(|(_, c)| c.owner != exclude_owner)
            .filter(|(_, c)| c.aabb().intersects(aabb))
            .map(|(h, _)| h)
            .collect()
    }

    /// Closest-distance query between two AABBs along the minimal axis.
    ///
    /// `distance` is negative when the boxes overlap; `normal` points from
    /// `a` toward `b`, so pushing `a` by `-normal * -distance` separates
    /// them.
    #[must_use]
    pub fn separation(a: &Aabb, b: &Aabb) -> Separation {
        let ov = a.overlap(b);
        let ac = a.center();
        let bc = b.center();

        if ov.x > 0.0 && ov.y > 0.0 {
            // Overlapping: minimal axis, normal toward b.
            if ov.x < ov.y {
                let sign = if bc.x >= ac.x { 1.0 } else { -1.0 };
                Separation {
                    distance: -ov.x,
                    normal: Vec2::new(sign, 0.0),
                }
            } else {
                let sign = if bc.y >= ac.y { 1.0 } else { -1.0 };
                Separation {
                    distance: -ov.y,
                    normal: Vec2::new(0.0, sign),
                }
            }
        } else {
            // Separated: gap along the most-separated axis.
            let gap_x = -ov.x;
            let gap_y = -ov.y;
            if gap_x >= gap_y {
                let sign = if bc.x >= ac.x { 1.0 } else { -1.0 };
                Separation {
                    distance: gap_x.max(0.0),
                    normal: Vec2::new(sign, 0.0),
                }
            } else {
                let sign = if bc.y >= ac.y { 1.0 } else { -1.0 };
                Separation {
                    distance: gap_y.max(0.0),
                    normal: Vec2::new(0.0, sign),
                }
            }
        }
    }

    /// Nearest raycast hit against enabled blocking colliders on `mask`.
    #[must_use]
    pub fn raycast(
        &self,
        origin: Vec2,
        direction: Vec2,
        max_distance: f32,
        mask: Layer,
        exclude_owner: EntityId,
    ) -> Option<RayHit> {
        let dir = direction.normalized();
        if dir == Vec2::ZERO {
            return None;
        }

        let mut nearest: Option<RayHit> = None;
        for (handle, collider) in self.live_solids() {
            if !collider.layer.matches(mask) || collider.owner == exclude_owner {
                continue;
            }
            if let Some(mut hit) = ray_vs_aabb(origin, dir, max_distance, &collider.aabb()) {
                hit.handle = handle;
                hit.owner = collider.owner;
                match nearest {
                    Some(ref best) if best.distance <= hit.distance => {}
                    _ => nearest = Some(hit),
                }
            }
        }
        nearest
    }

    /// Swept clearance test: can `aabb` translate by `dir * distance`
    /// without touching any enabled blocking collider on `mask`?
    #[must_use]
    pub fn cast_is_clear(
        &self,
        aabb: &Aabb,
        dir: Vec2,
        distance: f32,
        mask: Layer,
        exclude_owner: EntityId,
    ) -> bool {
        let delta = dir.normalized() * distance;
        let swept = Aabb {
            min: Vec2::new(
                aabb.min.x + delta.x.min(0.0),
                aabb.min.y + delta.y.min(0.0),
            ),
            max: Vec2::new(
                aabb.max.x + delta.x.max(0.0),
                aabb.max.y + delta.y.max(0.0),
            ),
        };

        for (_, collider) in self.live_solids() {
            if !collider.layer.matches(mask) || collider.owner == exclude_owner {
                continue;
            }
            let other = collider.aabb();
            // Already overlapping at the start does not block the sweep;
            // the mover's push-out handles resting contact.
            if aabb.intersects(&other) {
                continue;
            }
            if swept.intersects(&other) {
                return false;
            }
        }
        true
    }

    /// Contact scan: every enabled blocking collider on `mask` within
    /// `skin` of `aabb`, with the contact normal pointing back at the
    /// queried box.
    #[must_use]
    pub fn contacts(
        &self,
        aabb: &Aabb,
        mask: Layer,
        exclude_owner: EntityId,
        skin: f32,
    ) -> Vec<Contact> {
        let probe = aabb.expand(skin);
        let mut out = Vec::new();
        for (handle, collider) in self.live_solids() {
            if !collider.layer.matches(mask) || collider.owner == exclude_owner {
                continue;
            }
            let other = collider.aabb();
            if !probe.intersects(&other) {
                continue;
            }
            let sep = Self::separation(aabb, &other);
            out.push(Contact {
                handle,
                owner: collider.owner,
                // separation normal points a -> other; the contact normal
                // pushes back from the surface toward the queried box.
                normal: -sep.normal,
            });
        }
        out
    }

    // ========================================================================
    // SENSORS
    // ========================================================================

    /// Fresh overlap list for a sensor: enabled blocking colliders matching
    /// the sensor's detect mask, excluding the sensor's own owner. Returns
    /// an empty list if the sensor itself is disabled.
    #[must_use]
    pub fn sensor_overlaps(&self, sensor: ColliderHandle) -> Vec<(ColliderHandle, EntityId)> {
        let Some(slot) = self.slot(sensor) else {
            return Vec::new();
        };
        let ColliderKind::Sensor { detect_mask } = slot.collider.kind else {
            return Vec::new();
        };
        if !slot.collider.enabled {
            return Vec::new();
        }
        let region = slot.collider.aabb();
        let owner = slot.collider.owner;
        self.live_solids()
            .filter(|(_, c)| c.layer.matches(detect_mask))
            .filter(|(_, c)| c.owner != owner)
            .filter(|(_, c)| c.aabb().intersects(&region))
            .map(|(h, c)| (h, c.owner))
            .collect()
    }

    /// Geometry-only box probe against enabled blocking colliders. Unlike
    /// [`Space::sensor_overlaps`] this does not require the probing entity's
    /// own sensor to be enabled, which is exactly why the latch uses it as
    /// the second opinion.
    #[must_use]
    pub fn probe_box(
        &self,
        region: &Aabb,
        mask: Layer,
        exclude_owner: EntityId,
    ) -> Vec<(ColliderHandle, EntityId)> {
        self.live_solids()
            .filter(|(_, c)| c.layer.matches(mask))
            .filter(|(_, c)| c.owner != exclude_owner)
            .filter(|(_, c)| c.aabb().intersects(region))
            .map(|(h, c)| (h, c.owner))
            .collect()
    }

    /// Recomputes every sensor's overlap set and queues enter/exit events
    /// for the differences. Call once per tick after movement.
    pub fn update_sensors(&mut self) {
        let sensor_handles: Vec<ColliderHandle> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| {
                (slot.live && matches!(slot.collider.kind, ColliderKind::Sensor { .. }))
                    .then_some(ColliderHandle {
                        index: i as u32,
                        generation: slot.generation,
                    })
            })
            .collect();

        for sensor in sensor_handles {
            let current: Vec<ColliderHandle> = self
                .sensor_overlaps(sensor)
                .into_iter()
                .map(|(h, _)| h)
                .collect();

            let (sensor_owner, previous) = match self.slot(sensor) {
                Some(slot) => (slot.collider.owner, slot.sensor_contacts.clone()),
                None => continue,
            };

            for &entered in current.iter().filter(|h| !previous.contains(h)) {
                let Some(other_owner) = self.get(entered).map(|c| c.owner) else {
                    continue;
                };
                self.pending_events.push(SensorEvent {
                    sensor,
                    sensor_owner,
                    other: entered,
                    other_owner,
                    kind: SensorEventKind::Enter,
                });
            }
            for &exited in previous.iter().filter(|h| !current.contains(h)) {
                // The exited collider may be gone entirely; report the exit
                // with whatever identity is still known.
                let other_owner = self.get(exited).map(|c| c.owner).unwrap_or(EntityId::NULL);
                self.pending_events.push(SensorEvent {
                    sensor,
                    sensor_owner,
                    other: exited,
                    other_owner,
                    kind: SensorEventKind::Exit,
                });
            }

            if let Some(slot) = self.slot_mut(sensor) {
                slot.sensor_contacts = current;
            }
        }
    }

    /// Takes the queued sensor events.
    pub fn drain_sensor_events(&mut self) -> Vec<SensorEvent> {
        std::mem::take(&mut self.pending_events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(center: Vec2, w: f32, h: f32, layer: Layer, owner: EntityId) -> Collider {
        Collider {
            center,
            half: Vec2::new(w / 2.0, h / 2.0),
            layer,
            owner,
            enabled: true,
            blocking: true,
            kind: ColliderKind::Solid,
        }
    }

    #[test]
    fn test_overlap_query_respects_mask_and_owner() {
        let mut space = Space::new();
        let me = EntityId::new(1, 0);
        let other = EntityId::new(2, 0);

        space.add_collider(solid(Vec2::ZERO, 2.0, 2.0, Layer::SOLID, other));
        space.add_collider(solid(Vec2::ZERO, 2.0, 2.0, Layer::WALL, other));
        space.add_collider(solid(Vec2::ZERO, 2.0, 2.0, Layer::SOLID, me));

        let probe = Aabb::from_center(Vec2::ZERO, 1.0, 1.0);
        assert_eq!(space.overlap_aabb(&probe, Layer::SOLID, me).len(), 1);
        assert_eq!(space.overlap_aabb(&probe, Layer::WALL, me).len(), 1);
        assert_eq!(
            space
                .overlap_aabb(&probe, Layer::SOLID.union(Layer::WALL), me)
                .len(),
            2
        );
    }

    #[test]
    fn test_disabled_and_passthrough_invisible() {
        let mut space = Space::new();
        let owner = EntityId::new(1, 0);
        let h = space.add_collider(solid(Vec2::ZERO, 2.0, 2.0, Layer::SOLID, owner));

        let probe = Aabb::from_center(Vec2::ZERO, 1.0, 1.0);
        assert_eq!(space.overlap_aabb(&probe, Layer::ALL, EntityId::NULL).len(), 1);

        space.set_enabled(h, false);
        assert!(space.overlap_aabb(&probe, Layer::ALL, EntityId::NULL).is_empty());

        space.set_enabled(h, true);
        space.set_blocking(h, false);
        assert!(space.overlap_aabb(&probe, Layer::ALL, EntityId::NULL).is_empty());
    }

    #[test]
    fn test_separation_overlapping() {
        let a = Aabb::from_center(Vec2::ZERO, 2.0, 2.0);
        let b = Aabb::from_center(Vec2::new(1.5, 0.0), 2.0, 2.0);
        let sep = Space::separation(&a, &b);
        assert!((sep.distance + 0.5).abs() < 1e-5);
        assert_eq!(sep.normal, Vec2::new(1.0, 0.0));
    }

    #[test]
    fn test_separation_apart() {
        let a = Aabb::from_center(Vec2::ZERO, 2.0, 2.0);
        let b = Aabb::from_center(Vec2::new(0.0, 5.0), 2.0, 2.0);
        let sep = Space::separation(&a, &b);
        assert!((sep.distance - 3.0).abs() < 1e-5);
        assert_eq!(sep.normal, Vec2::new(0.0, 1.0));
    }

    #[test]
    fn test_raycast_nearest() {
        let mut space = Space::new();
        let owner = EntityId::new(9, 0);
        space.add_collider(solid(Vec2::new(0.0, -2.0), 4.0, 1.0, Layer::SOLID, owner));
        space.add_collider(solid(Vec2::new(0.0, -6.0), 4.0, 1.0, Layer::SOLID, owner));

        let hit = space
            .raycast(Vec2::ZERO, Vec2::DOWN, 20.0, Layer::SOLID, EntityId::NULL)
            .expect("should hit the upper slab");
        assert!((hit.distance - 1.5).abs() < 1e-4);
        assert_eq!(hit.normal, Vec2::UP);
    }

    #[test]
    fn test_cast_is_clear() {
        let mut space = Space::new();
        let owner = EntityId::new(3, 0);
        space.add_collider(solid(Vec2::new(2.0, 0.0), 1.0, 4.0, Layer::SOLID, owner));

        let probe = Aabb::from_center(Vec2::ZERO, 1.0, 1.0);
        assert!(space.cast_is_clear(&probe, Vec2::RIGHT, 0.5, Layer::SOLID, EntityId::NULL));
        assert!(!space.cast_is_clear(&probe, Vec2::RIGHT, 2.0, Layer::SOLID, EntityId::NULL));
        assert!(space.cast_is_clear(&probe, Vec2::LEFT, 5.0, Layer::SOLID, EntityId::NULL));
    }

    #[test]
    fn test_sensor_enter_exit_on_motion_and_disable() {
        let mut space = Space::new();
        let plate = EntityId::new(1, 0);
        let walker = EntityId::new(2, 0);

        let sensor = space.add_collider(Collider {
            center: Vec2::ZERO,
            half: Vec2::new(1.0, 0.5),
            layer: Layer::NONE,
            owner: plate,
            enabled: true,
            blocking: false,
            kind: ColliderKind::Sensor {
                detect_mask: Layer::PLAYER,
            },
        });
        let body = space.add_collider(solid(
            Vec2::new(10.0, 0.0),
            1.0,
            1.0,
            Layer::PLAYER,
            walker,
        ));

        space.update_sensors();
        assert!(space.drain_sensor_events().is_empty());

        // Walk into the sensor.
        space.set_center(body, Vec2::ZERO);
        space.update_sensors();
        let events = space.drain_sensor_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, SensorEventKind::Enter);
        assert_eq!(events[0].other_owner, walker);
        assert_eq!(events[0].sensor, sensor);

        // Disabling the occupant's collider produces an exit.
        space.set_enabled(body, false);
        space.update_sensors();
        let events = space.drain_sensor_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, SensorEventKind::Exit);
    }

    #[test]
    fn test_disabled_sensor_sees_nothing_but_box_probe_does() {
        let mut space = Space::new();
        let plate = EntityId::new(1, 0);
        let walker = EntityId::new(2, 0);

        let sensor = space.add_collider(Collider {
            center: Vec2::ZERO,
            half: Vec2::new(1.0, 0.5),
            layer: Layer::NONE,
            owner: plate,
            enabled: false,
            blocking: false,
            kind: ColliderKind::Sensor {
                detect_mask: Layer::PLAYER,
            },
        });
        space.add_collider(solid(Vec2::ZERO, 1.0, 1.0, Layer::PLAYER, walker));

        assert!(space.sensor_overlaps(sensor).is_empty());

        let region = Aabb::from_center(Vec2::ZERO, 2.0, 1.0);
        let hits = space.probe_box(&region, Layer::PLAYER, plate);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].1, walker);
    }
}
