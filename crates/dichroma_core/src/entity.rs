//! # Entity Identifiers
//!
//! Entities are lightweight identifiers consisting of:
//! - An index into storage arrays
//! - A generation counter for safe reuse

/// Unique identifier for an entity.
///
/// The ID is split into two parts:
/// - Lower 32 bits: index into storage arrays
/// - Upper 32 bits: generation counter for detecting stale references
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Null/invalid entity ID.
    pub const NULL: Self = Self(u64::MAX);

    /// Creates a new entity ID from index and generation.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Returns the index portion of the entity ID.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Returns the generation portion of the entity ID.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Checks if this entity ID is null/invalid.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::NULL
    }
}

/// Allocates entity IDs with generation-checked reuse.
///
/// Freed indices go on a free list; re-allocating one bumps its generation
/// so stale IDs can never alias a new entity.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    generations: Vec<u32>,
    free: Vec<u32>,
}

impl EntityAllocator {
    /// Creates an empty allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh entity ID.
    pub fn allocate(&mut self) -> EntityId {
        if let Some(index) = self.free.pop() {
            let generation = self.generations[index as usize];
            return EntityId::new(index, generation);
        }
        let index = self.generations.len() as u32;
        self.generations.push(0);
        EntityId::new(index, 0)
    }

    /// Frees an entity ID. Stale or out-of-range IDs are ignored.
    pub fn free(&mut self, id: EntityId) {
        let index = id.index() as usize;
        if index >= self.generations.len() {
            return;
        }
        if self.generations[index] != id.generation() {
            return;
        }
        self.generations[index] = self.generations[index].wrapping_add(1);
        self.free.push(id.index());
    }

    /// Checks whether an ID refers to a currently-live allocation.
    #[must_use]
    pub fn is_live(&self, id: EntityId) -> bool {
        if id.is_null() {
            return false;
        }
        let index = id.index() as usize;
        index < self.generations.len()
            && self.generations[index] == id.generation()
            && !self.free.contains(&id.index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_packing_roundtrip() {
        let id = EntityId::new(42, 7);
        assert_eq!(id.index(), 42);
        assert_eq!(id.generation(), 7);
        assert!(!id.is_null());
        assert!(EntityId::NULL.is_null());
    }

    #[test]
    fn test_allocator_reuse_bumps_generation() {
        let mut alloc = EntityAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        assert_ne!(a, b);

        alloc.free(a);
        assert!(!alloc.is_live(a));

        let c = alloc.allocate();
        assert_eq!(c.index(), a.index());
        assert_ne!(c.generation(), a.generation());
        assert!(alloc.is_live(c));
    }

    #[test]
    fn test_double_free_is_ignored() {
        let mut alloc = EntityAllocator::new();
        let a = alloc.allocate();
        alloc.free(a);
        alloc.free(a);
        let b = alloc.allocate();
        let c = alloc.allocate();
        assert_ne!(b, c);
        assert_ne!(b.index(), c.index());
    }
}
