//! Soft bodies: point-mass clouds living in soft-body worlds.
//!
//! The kernel cannot rewrite a soft body in place, so a rebuild destroys the
//! old native object and creates a new one.

use super::registrar::KindRegistrar;
use super::BodyBase;
use crate::error::{PhysicsError, PhysicsResult};
use crate::world::PhysicsWorld;
use ramjet_kernel::{NativeHandle, SoftBodyDesc};
use ramjet_shared::Vec3;

/// Soft-body node cloud.
#[derive(Clone, Debug, PartialEq)]
pub struct SoftBody {
    nodes: Vec<Vec3>,
    total_mass: f32,
}

impl SoftBody {
    pub(crate) fn new(nodes: Vec<Vec3>, total_mass: f32) -> Self {
        Self { nodes, total_mass }
    }

    /// Node positions, local space.
    #[must_use]
    pub fn nodes(&self) -> &[Vec3] {
        &self.nodes
    }

    /// Mass shared by all nodes.
    #[must_use]
    pub const fn total_mass(&self) -> f32 {
        self.total_mass
    }
}

impl KindRegistrar for SoftBody {
    fn build(
        &mut self,
        base: &BodyBase,
        existing: Option<NativeHandle>,
        world: &mut PhysicsWorld,
    ) -> PhysicsResult<NativeHandle> {
        let Some(world_info) = world.soft_body_world_info() else {
            tracing::error!(
                body = %base.id(),
                world_kind = ?world.config().world_kind,
                "soft bodies need a soft body world"
            );
            return Err(PhysicsError::Config(format!(
                "soft {} needs a soft body world",
                base.id()
            )));
        };
        if self.nodes.is_empty() {
            return Err(PhysicsError::InvariantViolation(format!(
                "soft {} has no nodes",
                base.id()
            )));
        }

        let kernel = world.kernel_mut();
        if let Some(old) = existing {
            kernel.destroy(old)?;
        }
        let handle = kernel.create_soft_body(&SoftBodyDesc {
            world_info,
            nodes: self.nodes.clone(),
            total_mass: self.total_mass,
            transform: base.transform(),
            flags: base.flags(),
            user_index: base.id().0,
        })?;
        Ok(handle)
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
            .add_soft_body(world_handle, handle, base.group(), base.mask())?;
        Ok(())
    }

    fn remove(
        &mut self,
        _base: &BodyBase,
        handle: NativeHandle,
        world: &mut PhysicsWorld,
    ) -> PhysicsResult<()> {
        let world_handle = world.native_world()?;
        world.kernel_mut().remove_soft_body(world_handle, handle)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::{BodyId, PhysicsBody, WorldRegistrar};
    use crate::config::WorldConfig;
    use crate::world::PhysicsWorld;
    use ramjet_kernel::WorldKind;
    use ramjet_shared::{Transform, Vec3};

    fn cloth(id: u32) -> PhysicsBody {
        let nodes = vec![Vec3::ZERO, Vec3::X, Vec3::Z, Vec3::new(1.0, 0.0, 1.0)];
        PhysicsBody::soft(BodyId(id), nodes, 1.0, Transform::IDENTITY)
    }

    #[test]
    fn test_soft_body_needs_soft_world() {
        let mut world = PhysicsWorld::with_reference_kernel(WorldConfig::default());
        world.initialize().unwrap();
        let mut body = cloth(1);
        assert!(!body.add_to(&mut world));
        assert!(body.handle().is_none());
        world.dispose();
    }

    #[test]
    fn test_soft_body_rebuild_recreates() {
        let mut world = PhysicsWorld::with_reference_kernel(WorldConfig {
            world_kind: WorldKind::SoftBodyAndRigidBody,
            ..WorldConfig::default()
        });
        world.initialize().unwrap();
        let mut body = cloth(1);
        assert!(body.add_to(&mut world));
        let first = body.handle().unwrap();

        assert!(body.add_to(&mut world));
        let second = body.handle().unwrap();
        assert_ne!(first, second);
        assert!(!world.kernel().is_live(first));

        body.dispose(&mut world);
        world.dispose();
        assert_eq!(world.kernel().live_handle_count(), 0);
    }
}
