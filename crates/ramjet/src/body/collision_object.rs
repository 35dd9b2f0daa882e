//! Plain collision objects: geometry the world collides against but never
//! integrates.

use super::registrar::KindRegistrar;
use super::BodyBase;
use crate::error::PhysicsResult;
use crate::world::PhysicsWorld;
use ramjet_kernel::NativeHandle;

/// Marker for the collision-only body kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CollisionObjectBody;

impl KindRegistrar for CollisionObjectBody {
    fn build(
        &mut self,
        base: &BodyBase,
        existing: Option<NativeHandle>,
        world: &mut PhysicsWorld,
    ) -> PhysicsResult<NativeHandle> {
        let desc = base.object_desc(base.require_shape()?);
        let kernel = world.kernel_mut();
        match existing {
            Some(object) => {
                kernel.configure_collision_object(object, &desc)?;
                Ok(object)
            }
            None => Ok(kernel.create_collision_object(&desc)?),
        }
    }

    fn add(
        &mut self,
        base: &BodyBase,
        handle: NativeHandle,
        world: &mut PhysicsWorld,
    ) -> PhysicsResult<()> {
        let world_handle = world.native_world()?;
        world
            .kernel_mut()
            .add_collision_object(world_handle, handle, base.group(), base.mask())?;
        Ok(())
    }

    fn remove(
        &mut self,
        _base: &BodyBase,
        handle: NativeHandle,
        world: &mut PhysicsWorld,
    ) -> PhysicsResult<()> {
        let world_handle = world.native_world()?;
        world.kernel_mut().remove_collision_object(world_handle, handle)?;
        Ok(())
    }
}
