//! # Native Handles
//!
//! Opaque references to kernel-owned objects.

use ramjet_core::SlotId;

/// Reference to an object allocated by a [`Kernel`](crate::Kernel).
///
/// Handles are generational: once the object is destroyed the handle
/// stops validating, even if the kernel reuses the slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NativeHandle(SlotId);

impl NativeHandle {
    /// Wraps a slot id issued by a kernel's allocator.
    #[inline]
    #[must_use]
    pub const fn from_slot(slot: SlotId) -> Self {
        Self(slot)
    }

    /// Underlying slot id.
    #[inline]
    #[must_use]
    pub const fn slot(self) -> SlotId {
        self.0
    }

    /// Dense index of the slot.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0.index()
    }
}

impl std::fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
