//! # Registrars
//!
//! Two layers:
//! - [`WorldRegistrar`] is the public add/remove/dispose contract shared by
//!   bodies and constraints.
//! - `KindRegistrar` is the per-kind strategy a [`PhysicsBody`](super::PhysicsBody)
//!   delegates to. The body runs the shared pipeline (scale check, body
//!   table, lifecycle) and the strategy does the kind-specific kernel calls.

use super::BodyBase;
use crate::error::PhysicsResult;
use crate::world::PhysicsWorld;
use ramjet_kernel::NativeHandle;

/// Something that can enter and leave a [`PhysicsWorld`].
pub trait WorldRegistrar {
    /// Builds (or rebuilds) the native object and adds it to `world`.
    ///
    /// # Returns
    ///
    /// `false` if the object is disabled or could not be added; the reason
    /// is logged.
    fn add_to(&mut self, world: &mut PhysicsWorld) -> bool;

    /// Takes the native object out of `world`. No-op when not in a world.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::InvariantViolation`](crate::PhysicsError::InvariantViolation)
    /// when removal would break an ordering rule; the object stays in the world.
    fn remove_from(&mut self, world: &mut PhysicsWorld) -> PhysicsResult<()>;

    /// Removes from `world` if needed and destroys every native object owned.
    ///
    /// Safe to call more than once.
    fn dispose(&mut self, world: &mut PhysicsWorld);
}

/// Kind-specific half of the body registration protocol.
pub(crate) trait KindRegistrar {
    /// Creates the native object, or rewrites `existing` in place.
    ///
    /// `existing` is live and outside any world.
    fn build(
        &mut self,
        base: &BodyBase,
        existing: Option<NativeHandle>,
        world: &mut PhysicsWorld,
    ) -> PhysicsResult<NativeHandle>;

    /// Adds the built object to the world.
    fn add(
        &mut self,
        base: &BodyBase,
        handle: NativeHandle,
        world: &mut PhysicsWorld,
    ) -> PhysicsResult<()>;

    /// Takes the object out of the world.
    fn remove(
        &mut self,
        base: &BodyBase,
        handle: NativeHandle,
        world: &mut PhysicsWorld,
    ) -> PhysicsResult<()>;

    /// Destroys companion objects that hold a reference to `handle` (actions)
    /// before `handle` itself is destroyed.
    fn release(&mut self, _handle: NativeHandle, _world: &mut PhysicsWorld) {}

    /// Destroys companion objects `handle` held (motion states) once it is gone.
    fn released(&mut self, _world: &mut PhysicsWorld) {}
}
