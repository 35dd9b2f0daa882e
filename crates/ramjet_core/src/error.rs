//! # Core Errors

use thiserror::Error;

/// Errors raised by the bookkeeping primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Key maps outside the fixed capacity of a dense map.
    #[error("index {index} out of range for capacity {capacity}")]
    IndexOutOfRange {
        /// Offending dense index.
        index: usize,
        /// Map capacity.
        capacity: usize,
    },

    /// Slot allocator has handed out every slot it may.
    #[error("slot allocator exhausted: limit {limit}")]
    SlotsExhausted {
        /// Configured limit.
        limit: usize,
    },

    /// Object pool reached its limit and cannot grow.
    #[error("object pool exhausted: limit {limit}")]
    PoolExhausted {
        /// Configured limit.
        limit: usize,
    },
}

/// Result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
