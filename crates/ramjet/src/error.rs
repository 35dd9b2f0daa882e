//! # Physics Error Types
//!
//! The orchestration layer sorts failures into four families:
//! - **Config**: bad or contradictory configuration
//! - **Capacity**: a fixed budget would be exceeded
//! - **InvariantViolation**: an ordering or shape rule was broken; the
//!   offending operation is aborted
//! - **State**: the world is not initialized or already disposed
//!
//! Kernel and bookkeeping failures pass through unchanged.

use ramjet_core::CoreError;
use ramjet_kernel::KernelError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the registration layer.
#[derive(Error, Debug)]
pub enum PhysicsError {
    /// Configuration is invalid and could not be auto-corrected.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A fixed budget would be exceeded.
    #[error("capacity exceeded: {requested} requested, {available} available (limit {limit})")]
    Capacity {
        /// Slots the call needed.
        requested: usize,
        /// Slots still free.
        available: usize,
        /// Configured limit.
        limit: usize,
    },

    /// An ordering or geometry rule was broken.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// The world is in the wrong lifecycle state for the call.
    #[error("invalid state: {0}")]
    State(&'static str),

    /// The kernel rejected a call.
    #[error(transparent)]
    Kernel(#[from] KernelError),

    /// A bookkeeping primitive rejected a call.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML for [`RamjetConfig`](crate::RamjetConfig).
    #[error("failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type for registration-layer operations.
pub type PhysicsResult<T> = Result<T, PhysicsError>;
