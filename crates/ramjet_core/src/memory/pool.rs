//! # Object Pool
//!
//! Growth-step pool for objects that are taken and returned in bursts.
//!
//! Unlike a slot allocator the pool hands out *ownership*: a taken object
//! lives wherever the caller puts it and comes back through [`ObjectPool::give_back`],
//! which resets it before it is stacked for reuse.

use crate::error::{CoreError, CoreResult};

/// Objects that can be recycled through an [`ObjectPool`].
pub trait Poolable {
    /// Clears all per-use state so the object can be handed out again.
    ///
    /// Implementations should keep allocated capacity (e.g. `Vec::clear`).
    fn reset(&mut self);
}

/// Counters describing pool traffic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Objects ever taken.
    pub taken: u64,
    /// Objects ever given back.
    pub returned: u64,
    /// Objects constructed by the factory so far.
    pub allocated: usize,
    /// Objects sitting in the pool right now.
    pub available: usize,
}

impl PoolStats {
    /// Objects currently held by callers.
    #[inline]
    #[must_use]
    pub const fn outstanding(&self) -> u64 {
        self.taken - self.returned
    }
}

/// A stack of reusable objects that grows `growth_step` objects at a time.
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. Keep it behind the owner's lock.
///
/// # Example
///
/// ```rust,ignore
/// let mut pool = ObjectPool::new(16, Some(64), Entry::default);
///
/// let entry = pool.take()?;   // grows by 16 on first use
/// pool.give_back(entry);      // reset + stacked
/// ```
pub struct ObjectPool<T: Poolable> {
    /// Objects ready for reuse.
    free: Vec<T>,
    /// Constructs fresh objects when the stack runs dry.
    factory: Box<dyn Fn() -> T + Send>,
    /// Number of objects created per growth.
    growth_step: usize,
    /// Hard cap on constructed objects.
    limit: Option<usize>,
    /// Traffic counters.
    stats: PoolStats,
}

impl<T: Poolable> ObjectPool<T> {
    /// Creates an empty pool.
    ///
    /// Nothing is constructed until the first [`take`](Self::take).
    ///
    /// # Arguments
    ///
    /// * `growth_step` - Objects constructed per growth (clamped to at least 1)
    /// * `limit` - Maximum objects ever constructed, `None` for unbounded
    /// * `factory` - Builds a fresh object
    #[must_use]
    pub fn new<F>(growth_step: usize, limit: Option<usize>, factory: F) -> Self
    where
        F: Fn() -> T + Send + 'static,
    {
        let growth_step = growth_step.max(1);
        Self {
            free: Vec::with_capacity(limit.map_or(growth_step, |l| l.min(growth_step * 4))),
            factory: Box::new(factory),
            growth_step,
            limit,
            stats: PoolStats::default(),
        }
    }

    /// Creates a pool that builds objects with `T::default()`.
    #[must_use]
    pub fn with_default(growth_step: usize, limit: Option<usize>) -> Self
    where
        T: Default + 'static,
    {
        Self::new(growth_step, limit, T::default)
    }

    /// Objects currently waiting in the pool.
    #[inline]
    #[must_use]
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Growth step.
    #[inline]
    #[must_use]
    pub const fn growth_step(&self) -> usize {
        self.growth_step
    }

    /// Snapshot of the traffic counters.
    #[inline]
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            available: self.free.len(),
            ..self.stats
        }
    }

    /// Takes an object, growing the pool if it is empty.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::PoolExhausted`] when the pool is empty and the
    /// limit forbids constructing another object.
    pub fn take(&mut self) -> CoreResult<T> {
        if self.free.is_empty() {
            self.grow()?;
        }
        let item = self.free.pop().ok_or(CoreError::PoolExhausted {
            limit: self.limit.unwrap_or(usize::MAX),
        })?;
        self.stats.taken += 1;
        Ok(item)
    }

    /// Resets `item` and stacks it for reuse.
    pub fn give_back(&mut self, mut item: T) {
        item.reset();
        self.free.push(item);
        self.stats.returned += 1;
    }

    /// Constructs up to `growth_step` objects, never exceeding the limit.
    fn grow(&mut self) -> CoreResult<()> {
        let room = self
            .limit
            .map_or(self.growth_step, |limit| limit.saturating_sub(self.stats.allocated));
        let count = room.min(self.growth_step);
        if count == 0 {
            return Err(CoreError::PoolExhausted {
                limit: self.limit.unwrap_or(usize::MAX),
            });
        }

        self.free.reserve(count);
        for _ in 0..count {
            self.free.push((self.factory)());
        }
        self.stats.allocated += count;
        Ok(())
    }
}

impl<T: Poolable> std::fmt::Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectPool")
            .field("growth_step", &self.growth_step)
            .field("limit", &self.limit)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Scratch {
        items: Vec<u32>,
    }

    impl Poolable for Scratch {
        fn reset(&mut self) {
            self.items.clear();
        }
    }

    #[test]
    fn test_pool_grows_in_steps() {
        let mut pool: ObjectPool<Scratch> = ObjectPool::with_default(4, None);
        assert_eq!(pool.available(), 0);

        let a = pool.take().unwrap();
        assert_eq!(pool.available(), 3);
        assert_eq!(pool.stats().allocated, 4);

        pool.give_back(a);
        assert_eq!(pool.available(), 4);
    }

    #[test]
    fn test_pool_resets_on_return() {
        let mut pool: ObjectPool<Scratch> = ObjectPool::with_default(1, None);

        let mut a = pool.take().unwrap();
        a.items.extend([1, 2, 3]);
        let capacity = a.items.capacity();
        pool.give_back(a);

        let b = pool.take().unwrap();
        assert!(b.items.is_empty());
        assert_eq!(b.items.capacity(), capacity); // Capacity kept
    }

    #[test]
    fn test_pool_limit() {
        let mut pool: ObjectPool<Scratch> = ObjectPool::with_default(3, Some(2));

        let a = pool.take().unwrap();
        let _b = pool.take().unwrap();
        assert_eq!(pool.take().err(), Some(CoreError::PoolExhausted { limit: 2 }));

        pool.give_back(a);
        assert!(pool.take().is_ok());
    }

    #[test]
    fn test_pool_conservation() {
        let mut pool: ObjectPool<Scratch> = ObjectPool::with_default(8, None);

        for _ in 0..10 {
            let taken: Vec<_> = (0..5).map(|_| pool.take().unwrap()).collect();
            for item in taken {
                pool.give_back(item);
            }
        }

        let stats = pool.stats();
        assert_eq!(stats.taken, 50);
        assert_eq!(stats.taken, stats.returned);
        assert_eq!(stats.outstanding(), 0);
        assert_eq!(stats.allocated, 8);
    }
}
