//! Character bodies.
//!
//! A character is a ghost object plus a controller action that moves it by
//! the walk direction every sub-step. Both enter and leave the world
//! together; the controller is destroyed before the ghost it references.

use super::ghost::{add_ghost, build_ghost};
use super::registrar::KindRegistrar;
use super::BodyBase;
use crate::error::{PhysicsError, PhysicsResult};
use crate::world::PhysicsWorld;
use ramjet_kernel::{CharacterControllerDesc, NativeHandle};
use ramjet_shared::Vec3;

/// Controller settings of a character body.
#[derive(Clone, Debug, PartialEq)]
pub struct CharacterBody {
    step_height: f32,
    up: Vec3,
    walk_direction: Vec3,
    controller: Option<NativeHandle>,
}

impl CharacterBody {
    pub(crate) fn new(step_height: f32) -> Self {
        Self {
            step_height,
            up: Vec3::Y,
            walk_direction: Vec3::ZERO,
            controller: None,
        }
    }

    /// Maximum step-up height.
    #[must_use]
    pub const fn step_height(&self) -> f32 {
        self.step_height
    }

    /// Displacement per second.
    #[must_use]
    pub const fn walk_direction(&self) -> Vec3 {
        self.walk_direction
    }

    /// Controller action handle, once built.
    #[must_use]
    pub const fn controller(&self) -> Option<NativeHandle> {
        self.controller
    }

    pub(crate) fn set_walk_direction(
        &mut self,
        world: &mut PhysicsWorld,
        direction: Vec3,
    ) -> PhysicsResult<()> {
        if !direction.is_finite() {
            return Err(PhysicsError::InvariantViolation(format!(
                "walk direction {direction:?} is not finite"
            )));
        }
        self.walk_direction = direction;
        if let Some(controller) = self.live_controller(world) {
            world.kernel_mut().set_walk_direction(controller, direction)?;
        }
        Ok(())
    }

    fn live_controller(&self, world: &PhysicsWorld) -> Option<NativeHandle> {
        self.controller
            .filter(|controller| world.kernel().is_live(*controller))
    }
}

impl KindRegistrar for CharacterBody {
    fn build(
        &mut self,
        base: &BodyBase,
        existing: Option<NativeHandle>,
        world: &mut PhysicsWorld,
    ) -> PhysicsResult<NativeHandle> {
        let ghost = build_ghost(base, existing, world)?;
        let controller = match self.live_controller(world) {
            Some(controller) => controller,
            None => {
                let created = world
                    .kernel_mut()
                    .create_character_controller(&CharacterControllerDesc {
                        ghost,
                        step_height: self.step_height,
                        up: self.up,
                    });
                match created {
                    Ok(controller) => controller,
                    Err(err) => {
                        if existing.is_none() {
                            if let Err(rollback) = world.kernel_mut().destroy(ghost) {
                                tracing::error!(error = %rollback, "failed to roll back character ghost");
                            }
                        }
                        return Err(err.into());
                    }
                }
            }
        };
        self.controller = Some(controller);
        world
            .kernel_mut()
            .set_walk_direction(controller, self.walk_direction)?;
        Ok(ghost)
    }

    fn add(
        &mut self,
        base: &BodyBase,
        handle: NativeHandle,
        world: &mut PhysicsWorld,
    ) -> PhysicsResult<()> {
        let controller = self
            .controller
            .ok_or(PhysicsError::State("character controller not built"))?;
        add_ghost(base, handle, world)?;

        let world_handle = world.native_world()?;
        let kernel = world.kernel_mut();
        if let Err(err) = kernel.add_action(world_handle, controller) {
            if let Err(rollback) = kernel.remove_collision_object(world_handle, handle) {
                tracing::error!(error = %rollback, "failed to roll back character ghost add");
            }
            return Err(err.into());
        }
        Ok(())
    }

    fn remove(
        &mut self,
        _base: &BodyBase,
        handle: NativeHandle,
        world: &mut PhysicsWorld,
    ) -> PhysicsResult<()> {
        let world_handle = world.native_world()?;
        let kernel = world.kernel_mut();
        if let Some(controller) = self.controller {
            kernel.remove_action(world_handle, controller)?;
        }
        kernel.remove_collision_object(world_handle, handle)?;
        Ok(())
    }

    fn release(&mut self, _handle: NativeHandle, world: &mut PhysicsWorld) {
        if let Some(controller) = self.controller.take() {
            if let Err(err) = world.kernel_mut().destroy(controller) {
                tracing::error!(error = %err, "failed to destroy character controller");
            }
        }
    }
}
