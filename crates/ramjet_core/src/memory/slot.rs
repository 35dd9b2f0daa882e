//! # Slot Management
//!
//! Slot ids are lightweight identifiers consisting of:
//! - An index into a dense array
//! - A generation counter for safe reuse

use super::dense_map::DenseKey;
use crate::error::{CoreError, CoreResult};

/// Identifier for an allocated slot.
///
/// The ID is split into two parts:
/// - Lower 32 bits: Index into dense arrays
/// - Upper 32 bits: Generation counter for detecting stale references
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct SlotId(u64);

impl SlotId {
    /// Creates a slot ID from index and generation.
    ///
    /// # Arguments
    ///
    /// * `index` - The dense index (0 to 2^32-1)
    /// * `generation` - The generation counter (0 to 2^32-1)
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Returns the index portion of the slot ID.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Returns the generation portion of the slot ID.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Raw 64-bit representation.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    /// Null/invalid slot ID.
    pub const NULL: Self = Self(u64::MAX);

    /// Checks if this slot ID is null/invalid.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }
}

impl Default for SlotId {
    fn default() -> Self {
        Self::NULL
    }
}

impl DenseKey for SlotId {
    #[inline]
    fn dense_index(self) -> usize {
        self.index() as usize
    }
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

/// Hands out [`SlotId`]s up to a fixed limit, recycling freed indices.
///
/// Freed indices come back with a bumped generation so ids issued before
/// the free no longer validate.
#[derive(Debug)]
pub struct SlotAllocator {
    /// Current generation per index.
    generations: Vec<u32>,
    /// Liveness per index.
    alive: Vec<bool>,
    /// Free list of indices for reuse.
    free_indices: Vec<u32>,
    /// Number of live ids.
    live_count: usize,
    /// Maximum number of distinct indices.
    limit: usize,
}

impl SlotAllocator {
    /// Creates an allocator that never issues more than `limit` live ids.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        let reserve = limit.min(1024);
        Self {
            generations: Vec::with_capacity(reserve),
            alive: Vec::with_capacity(reserve),
            free_indices: Vec::new(),
            live_count: 0,
            limit: limit.min(u32::MAX as usize),
        }
    }

    /// Creates an allocator bounded only by the 32-bit index space.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::with_limit(u32::MAX as usize)
    }

    /// Configured limit.
    #[inline]
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Number of live ids.
    #[inline]
    #[must_use]
    pub const fn live_count(&self) -> usize {
        self.live_count
    }

    /// Number of ids that can still be allocated.
    #[inline]
    #[must_use]
    pub const fn available(&self) -> usize {
        self.limit - self.live_count
    }

    /// Allocates a new id.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SlotsExhausted`] when `limit` ids are live.
    pub fn allocate(&mut self) -> CoreResult<SlotId> {
        if let Some(index) = self.free_indices.pop() {
            let slot = index as usize;
            // Increment generation to invalidate old references
            let generation = self.generations[slot].wrapping_add(1);
            self.generations[slot] = generation;
            self.alive[slot] = true;
            self.live_count += 1;
            return Ok(SlotId::new(index, generation));
        }

        if self.generations.len() >= self.limit {
            return Err(CoreError::SlotsExhausted { limit: self.limit });
        }

        let index = self.generations.len() as u32;
        self.generations.push(0);
        self.alive.push(true);
        self.live_count += 1;
        Ok(SlotId::new(index, 0))
    }

    /// Releases `id`.
    ///
    /// # Returns
    ///
    /// `false` if the id is stale or was never issued.
    pub fn free(&mut self, id: SlotId) -> bool {
        if !self.is_live(id) {
            return false;
        }
        let index = id.index();
        self.alive[index as usize] = false;
        self.free_indices.push(index);
        self.live_count -= 1;
        true
    }

    /// True if `id` is currently allocated and not stale.
    #[inline]
    #[must_use]
    pub fn is_live(&self, id: SlotId) -> bool {
        if id.is_null() {
            return false;
        }
        let slot = id.index() as usize;
        self.alive.get(slot).copied().unwrap_or(false) && self.generations[slot] == id.generation()
    }

    /// Iterates live ids in index order.
    pub fn iter_live(&self) -> impl Iterator<Item = SlotId> + '_ {
        self.alive
            .iter()
            .enumerate()
            .filter(|(_, alive)| **alive)
            .map(|(slot, _)| SlotId::new(slot as u32, self.generations[slot]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_id_roundtrip() {
        let id = SlotId::new(12345, 67890);
        assert_eq!(id.index(), 12345);
        assert_eq!(id.generation(), 67890);
        assert!(SlotId::default().is_null());
    }

    #[test]
    fn test_free_bumps_generation() {
        let mut slots = SlotAllocator::with_limit(4);

        let id1 = slots.allocate().unwrap();
        assert!(slots.free(id1));
        assert!(!slots.free(id1)); // Already freed

        let id2 = slots.allocate().unwrap();
        assert_eq!(id1.index(), id2.index()); // Same slot reused
        assert_ne!(id1.generation(), id2.generation()); // Different generation
        assert!(!slots.is_live(id1));
        assert!(slots.is_live(id2));
    }

    #[test]
    fn test_limit_enforced() {
        let mut slots = SlotAllocator::with_limit(2);
        let a = slots.allocate().unwrap();
        let _b = slots.allocate().unwrap();
        assert_eq!(slots.available(), 0);
        assert_eq!(slots.allocate(), Err(CoreError::SlotsExhausted { limit: 2 }));

        slots.free(a);
        assert_eq!(slots.available(), 1);
        assert!(slots.allocate().is_ok());
    }

    #[test]
    fn test_iter_live() {
        let mut slots = SlotAllocator::unbounded();
        let a = slots.allocate().unwrap();
        let b = slots.allocate().unwrap();
        let c = slots.allocate().unwrap();
        slots.free(b);

        let live: Vec<_> = slots.iter_live().collect();
        assert_eq!(live, vec![a, c]);
        assert_eq!(slots.live_count(), 2);
    }
}
