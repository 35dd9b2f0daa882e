//! # Kernel Error Types
//!
//! All errors a kernel call can report.

use crate::handle::NativeHandle;
use crate::types::WorldKind;
use thiserror::Error;

/// Errors reported by a [`Kernel`](crate::Kernel).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KernelError {
    /// Handle was destroyed or never issued by this kernel.
    #[error("stale handle {0}")]
    StaleHandle(NativeHandle),

    /// Handle refers to an object of a different kind.
    #[error("handle {handle} is a {found}, expected {expected}")]
    WrongKind {
        /// The offending handle.
        handle: NativeHandle,
        /// Kind the call needed.
        expected: &'static str,
        /// Kind actually stored.
        found: &'static str,
    },

    /// Object is still referenced and cannot be destroyed.
    #[error("handle {handle} still has {refs} reference(s)")]
    StillReferenced {
        /// The object.
        handle: NativeHandle,
        /// Outstanding references (world membership counts as one).
        refs: u32,
    },

    /// Object is not a member of the given world.
    #[error("handle {0} is not in this world")]
    NotInWorld(NativeHandle),

    /// Object is already a member of a world.
    #[error("handle {0} is already in a world")]
    AlreadyInWorld(NativeHandle),

    /// Operation needs a more capable world kind.
    #[error("{operation} is not supported by a {kind:?} world")]
    Unsupported {
        /// What was attempted.
        operation: &'static str,
        /// Kind of the world it was attempted on.
        kind: WorldKind,
    },

    /// Descriptor failed validation.
    #[error("invalid description: {0}")]
    InvalidDescription(String),

    /// Index past the end of a kernel list.
    #[error("index {index} out of range (len {len})")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// List length.
        len: usize,
    },
}

/// Result type for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;
