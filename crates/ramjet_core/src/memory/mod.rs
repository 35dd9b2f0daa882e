//! # Memory Management
//!
//! Pre-sized containers for registration churn.
//!
//! ## Design Philosophy
//!
//! Capacity is decided when the registry is configured. Afterwards:
//! - Entries are recycled, not dropped
//! - Lookups index arrays, never hash
//! - Running out of room is reported, not papered over

mod dense_map;
mod pool;
mod slot;

pub use dense_map::{DenseIndexMap, DenseKey};
pub use pool::{ObjectPool, PoolStats, Poolable};
pub use slot::{SlotAllocator, SlotId};
