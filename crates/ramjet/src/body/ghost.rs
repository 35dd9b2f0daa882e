//! Ghost objects.
//!
//! A ghost collides with nothing but remembers what overlaps it. The world
//! only tracks those overlaps once its ghost pair callback is installed,
//! which the first ghost to enter the world does.

use super::registrar::KindRegistrar;
use super::BodyBase;
use crate::error::PhysicsResult;
use crate::world::PhysicsWorld;
use ramjet_kernel::NativeHandle;

/// Marker for the ghost body kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GhostBody;

/// Creates or rewrites the ghost object of `base`.
pub(crate) fn build_ghost(
    base: &BodyBase,
    existing: Option<NativeHandle>,
    world: &mut PhysicsWorld,
) -> PhysicsResult<NativeHandle> {
    let desc = base.object_desc(base.require_shape()?);
    let kernel = world.kernel_mut();
    match existing {
        Some(ghost) => {
            kernel.configure_collision_object(ghost, &desc)?;
            Ok(ghost)
        }
        None => Ok(kernel.create_ghost_object(&desc)?),
    }
}

/// Adds a ghost object, installing the pair callback on first use.
pub(crate) fn add_ghost(
    base: &BodyBase,
    ghost: NativeHandle,
    world: &mut PhysicsWorld,
) -> PhysicsResult<()> {
    world.ensure_ghost_pair_callback()?;
    let world_handle = world.native_world()?;
    world
        .kernel_mut()
        .add_collision_object(world_handle, ghost, base.group(), base.mask())?;
    Ok(())
}

impl KindRegistrar for GhostBody {
    fn build(
        &mut self,
        base: &BodyBase,
        existing: Option<NativeHandle>,
        world: &mut PhysicsWorld,
    ) -> PhysicsResult<NativeHandle> {
        build_ghost(base, existing, world)
    }

    fn add(
        &mut self,
        base: &BodyBase,
        handle: NativeHandle,
        world: &mut PhysicsWorld,
    ) -> PhysicsResult<()> {
        add_ghost(base, handle, world)
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

#[cfg(test)]
mod tests {
    use super::super::{BodyId, PhysicsBody, WorldRegistrar};
    use crate::config::WorldConfig;
    use crate::world::PhysicsWorld;
    use ramjet_kernel::{CollisionShape, WorldKind};
    use ramjet_shared::{Transform, Vec3};

    #[test]
    fn test_ghost_sees_overlapping_body() {
        let mut world = PhysicsWorld::with_reference_kernel(WorldConfig {
            world_kind: WorldKind::CollisionOnly,
            ..WorldConfig::default()
        });
        world.initialize().unwrap();

        let mut ghost = PhysicsBody::ghost(
            BodyId(1),
            CollisionShape::Sphere { radius: 2.0 },
            Transform::IDENTITY,
        );
        let mut rock = PhysicsBody::collision_object(
            BodyId(2),
            CollisionShape::Sphere { radius: 0.5 },
            Transform::from_position(Vec3::new(1.0, 0.0, 0.0)),
        );
        assert!(!world.has_ghost_pair_callback());
        assert!(ghost.add_to(&mut world));
        assert!(world.has_ghost_pair_callback());
        assert!(rock.add_to(&mut world));

        world.step(1.0 / 60.0);
        let mut overlaps = Vec::new();
        ghost.overlapping_bodies(&mut world, &mut overlaps).unwrap();
        assert_eq!(overlaps, vec![BodyId(2)]);

        assert!(rock.overlapping_bodies(&mut world, &mut overlaps).is_err());
        world.dispose();
        assert_eq!(world.kernel().live_handle_count(), 0);
    }
}
