//! # RAMJET Core
//!
//! Bookkeeping primitives for the physics registration layer:
//! - Object pools that grow in fixed steps up to a hard limit
//! - Dense index maps with O(1) insert/remove/lookup and no hashing
//! - Generational slot ids for stale-reference detection
//!
//! ## Architecture Rules
//!
//! 1. **No allocation on the churn path** - pools and maps are sized up front
//! 2. **Fixed budgets** - exceeding a limit is an error, never silent growth
//! 3. **Stale ids are detectable** - every slot carries a generation

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod memory;

pub use error::{CoreError, CoreResult};
pub use memory::{DenseIndexMap, DenseKey, ObjectPool, PoolStats, Poolable, SlotAllocator, SlotId};
