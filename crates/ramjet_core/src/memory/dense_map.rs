//! # Dense Index Map
//!
//! Associative storage keyed by small integers.
//!
//! The map is a pre-allocated array of optional slots:
//! - Insert, remove and lookup are O(1) array accesses
//! - No hashing and no fragmentation
//! - `len` counts occupied slots exactly; overwriting a key never double-counts

use crate::error::{CoreError, CoreResult};
use std::marker::PhantomData;

/// Keys that convert to a dense array index.
pub trait DenseKey: Copy {
    /// Array index for this key.
    fn dense_index(self) -> usize;
}

impl DenseKey for usize {
    #[inline]
    fn dense_index(self) -> usize {
        self
    }
}

impl DenseKey for u32 {
    #[inline]
    fn dense_index(self) -> usize {
        self as usize
    }
}

impl DenseKey for u16 {
    #[inline]
    fn dense_index(self) -> usize {
        self as usize
    }
}

/// Fixed-capacity map from dense keys to values.
///
/// # Type Parameters
///
/// * `K` - Key type, converted to an index with [`DenseKey::dense_index`]
/// * `V` - Stored value
///
/// # Example
///
/// ```rust,ignore
/// let mut map: DenseIndexMap<u32, &str> = DenseIndexMap::new(16);
/// map.insert(3, "three")?;
/// assert_eq!(map.get(3), Some(&"three"));
/// ```
pub struct DenseIndexMap<K: DenseKey, V> {
    /// One slot per possible key.
    slots: Box<[Option<V>]>,
    /// Occupied slot count.
    len: usize,
    /// Marker for key type.
    _key: PhantomData<fn(K)>,
}

impl<K: DenseKey, V> DenseIndexMap<K, V> {
    /// Creates an empty map able to hold keys `0..capacity`.
    ///
    /// # Arguments
    ///
    /// * `capacity` - One past the highest permitted key index
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let slots: Vec<Option<V>> = (0..capacity).map(|_| None).collect();
        Self {
            slots: slots.into_boxed_slice(),
            len: 0,
            _key: PhantomData,
        }
    }

    /// Number of key slots.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// True when no slot is occupied.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stores `value` under `key`.
    ///
    /// # Returns
    ///
    /// The value previously stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IndexOutOfRange`] if the key does not fit.
    pub fn insert(&mut self, key: K, value: V) -> CoreResult<Option<V>> {
        let index = key.dense_index();
        let capacity = self.slots.len();
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(CoreError::IndexOutOfRange { index, capacity })?;

        let previous = slot.replace(value);
        if previous.is_none() {
            self.len += 1;
        }
        Ok(previous)
    }

    /// Removes and returns the value under `key`.
    pub fn remove(&mut self, key: K) -> Option<V> {
        let value = self.slots.get_mut(key.dense_index())?.take()?;
        self.len -= 1;
        Some(value)
    }

    /// Value under `key`.
    #[inline]
    #[must_use]
    pub fn get(&self, key: K) -> Option<&V> {
        self.slots.get(key.dense_index())?.as_ref()
    }

    /// Mutable value under `key`.
    #[inline]
    pub fn get_mut(&mut self, key: K) -> Option<&mut V> {
        self.slots.get_mut(key.dense_index())?.as_mut()
    }

    /// True if `key` is occupied.
    #[inline]
    #[must_use]
    pub fn contains_key(&self, key: K) -> bool {
        self.get(key).is_some()
    }

    /// Empties every slot, keeping the allocation.
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.len = 0;
    }

    /// Iterates occupied slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &V)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|v| (index, v)))
    }

    /// Iterates occupied slots mutably in index order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut V)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_mut().map(|v| (index, v)))
    }

    /// Iterates occupied values in index order.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.slots.iter().filter_map(Option::as_ref)
    }
}

impl<K: DenseKey, V: std::fmt::Debug> std::fmt::Debug for DenseIndexMap<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
