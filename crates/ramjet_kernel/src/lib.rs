//! # RAMJET Kernel
//!
//! The simulation kernel is an opaque collaborator. This crate defines the
//! surface the registration layer consumes and ships one implementation.
//!
//! ## Architecture Rules
//!
//! 1. **Handles, not pointers** - every native object is a [`NativeHandle`]
//! 2. **Explicit lifetime** - nothing is freed until [`Kernel::destroy`]
//! 3. **Ordering is enforced** - destroying an object that is still
//!    referenced or still in a world fails with [`KernelError::StillReferenced`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use ramjet_kernel::{Kernel, ReferenceKernel};
//!
//! let mut kernel = ReferenceKernel::new();
//! let config = kernel.create_collision_configuration(CollisionConfigKind::Default)?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod handle;
pub mod kernel;
pub mod reference;
pub mod shape;
pub mod types;

pub use error::{KernelError, KernelResult};
pub use handle::NativeHandle;
pub use kernel::{Kernel, TickCallback};
pub use reference::ReferenceKernel;
pub use shape::CollisionShape;
pub use types::{
    ActivationState, Aabb, AdditionalDamping, BroadphaseDesc, BroadphaseKind,
    CharacterControllerDesc, CollisionConfigKind, CollisionFilterGroups, CollisionFlags,
    CollisionObjectDesc, ConstraintDesc, ConstraintKind, ContactPoint, DebugDrawModes,
    PersistentManifold, RigidBodyDesc, RigidBodyProperties, SoftBodyDesc, SoftBodyWorldInfoDesc,
    WorldDesc, WorldKind,
};
