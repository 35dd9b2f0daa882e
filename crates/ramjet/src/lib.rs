//! # RAMJET
//!
//! Registration, lifecycle and stepping orchestration between a host scene
//! and a physics simulation kernel.
//!
//! ## Layers
//!
//! ```text
//! ┌────────────────────────────────────────────────┐
//! │  WorldEntryRegistry   (batches, pre-tick hook) │
//! ├────────────────────────────────────────────────┤
//! │  SceneObject → PhysicsBody / Constraint        │
//! │               / PhysicsComponent               │
//! ├────────────────────────────────────────────────┤
//! │  PhysicsWorld         (lifecycle, stepping)    │
//! ├────────────────────────────────────────────────┤
//! │  dyn Kernel           (opaque simulation)      │
//! └────────────────────────────────────────────────┘
//! ```
//!
//! ## Architecture Rules
//!
//! 1. **Bodies before constraints** - constraints are added after every body
//!    of their batch and removed before any body they reference
//! 2. **Fixed budgets** - registry capacity is set once; exceeding it fails
//!    the whole call
//! 3. **Nothing leaks** - disposing a world destroys every native object it
//!    still holds, and disposing twice is a no-op
//!
//! ## Example
//!
//! ```rust,ignore
//! use ramjet::{PhysicsWorld, RamjetConfig, WorldEntryRegistry};
//!
//! let config = RamjetConfig::load("physics.toml")?;
//! let mut world = PhysicsWorld::with_reference_kernel(config.world);
//! world.initialize()?;
//!
//! let registry = WorldEntryRegistry::new(config.registry);
//! registry.attach(&mut world)?;
//! registry.add_objects(&mut world, scene_objects)?;
//!
//! loop {
//!     registry.simulate_step(&mut world, 1.0 / 60.0);
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod behaviour;
pub mod body;
pub mod collision;
pub mod config;
pub mod constraint;
pub mod error;
pub mod registry;
pub mod scene;
pub mod world;

pub use behaviour::{ExecutionOrder, PhysicsComponent, TickContext};
pub use body::{
    BodyBase, BodyId, BodyKind, BodyLifecycle, CharacterBody, CollisionObjectBody, GhostBody,
    PhysicsBody, RigidBody, RigidBodyMut, RigidBodyState, SoftBody, WorldRegistrar,
};
pub use collision::{CollisionCallbackHandler, ContactEvent, ContactEvents, ContactTracker};
pub use config::{RamjetConfig, RegistryConfig, SoftBodyWorldSettings, WorldConfig};
pub use constraint::Constraint;
pub use error::{PhysicsError, PhysicsResult};
pub use registry::{EntryHandle, WorldEntryRegistry};
pub use scene::{BehaviourSlot, Component, ObjectId, SceneObject};
pub use world::PhysicsWorld;

pub use ramjet_kernel::{
    CollisionFilterGroups, CollisionFlags, CollisionShape, ConstraintKind, Kernel, NativeHandle,
    ReferenceKernel, WorldKind,
};
pub use ramjet_shared::{Quaternion, Transform, Vec3};
