//! # Constraints
//!
//! A constraint links one rigid body to the world or two rigid bodies to each
//! other. Bodies are referenced by [`BodyId`] and resolved through the world's
//! body table, so both must already be in the world when the constraint is
//! added.
//!
//! ## Ordering
//!
//! While a constraint is in the world its bodies refuse removal. Remove
//! constraints first; the registry and [`PhysicsWorld::dispose`] do.

use crate::body::{BodyId, WorldRegistrar};
use crate::error::{PhysicsError, PhysicsResult};
use crate::world::PhysicsWorld;
use ramjet_kernel::{ConstraintDesc, ConstraintKind, NativeHandle};

/// A joint between rigid bodies.
#[derive(Clone, Debug)]
pub struct Constraint {
    kind: ConstraintKind,
    body_a: BodyId,
    body_b: Option<BodyId>,
    breaking_impulse_threshold: f32,
    disable_collisions_between_linked_bodies: bool,
    enabled: bool,
    handle: Option<NativeHandle>,
    in_world: bool,
}

impl Constraint {
    /// Joint of `kind` between `body_a` and `body_b` (or the world).
    #[must_use]
    pub fn new(kind: ConstraintKind, body_a: BodyId, body_b: Option<BodyId>) -> Self {
        Self {
            kind,
            body_a,
            body_b,
            breaking_impulse_threshold: f32::INFINITY,
            disable_collisions_between_linked_bodies: false,
            enabled: true,
            handle: None,
            in_world: false,
        }
    }

    /// Returns the constraint breaking above `threshold`.
    #[must_use]
    pub fn with_breaking_impulse_threshold(mut self, threshold: f32) -> Self {
        self.breaking_impulse_threshold = threshold;
        self
    }

    /// Returns the constraint with linked-body collisions on or off.
    #[must_use]
    pub fn with_disable_collisions_between_linked_bodies(mut self, disable: bool) -> Self {
        self.disable_collisions_between_linked_bodies = disable;
        self
    }

    /// Joint type.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> &ConstraintKind {
        &self.kind
    }

    /// First body.
    #[inline]
    #[must_use]
    pub const fn body_a(&self) -> BodyId {
        self.body_a
    }

    /// Second body, `None` for a world anchor.
    #[inline]
    #[must_use]
    pub const fn body_b(&self) -> Option<BodyId> {
        self.body_b
    }

    /// Native handle, once built.
    #[inline]
    #[must_use]
    pub const fn handle(&self) -> Option<NativeHandle> {
        self.handle
    }

    /// True while registered with a world.
    #[inline]
    #[must_use]
    pub const fn is_in_world(&self) -> bool {
        self.in_world
    }

    /// False for constraints that `add_to` skips.
    #[inline]
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enables or disables the constraint. Takes effect on the next `add_to`.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn resolve(&self, world: &PhysicsWorld, id: BodyId) -> PhysicsResult<NativeHandle> {
        world.body_handle(id).ok_or_else(|| {
            PhysicsError::InvariantViolation(format!(
                "{} constraint needs {id} in the world",
                self.kind.name()
            ))
        })
    }

    fn try_add_to(&mut self, world: &mut PhysicsWorld) -> PhysicsResult<()> {
        let world_handle = world.native_world()?;
        let body_a = self.resolve(world, self.body_a)?;
        let body_b = match self.body_b {
            Some(id) => Some(self.resolve(world, id)?),
            None => None,
        };

        // Bodies may have been rebuilt into new handles; never reuse across them
        if let Some(stale) = self.handle.take() {
            if world.kernel().is_live(stale) {
                world.kernel_mut().destroy(stale)?;
            }
        }

        let kernel = world.kernel_mut();
        let handle = kernel.create_constraint(&ConstraintDesc {
            kind: self.kind,
            body_a,
            body_b,
            breaking_impulse_threshold: self.breaking_impulse_threshold,
        })?;
        if let Err(err) =
            kernel.add_constraint(world_handle, handle, self.disable_collisions_between_linked_bodies)
        {
            if let Err(rollback) = kernel.destroy(handle) {
                tracing::error!(error = %rollback, "failed to roll back constraint");
            }
            return Err(err.into());
        }
        self.handle = Some(handle);
        self.in_world = true;
        Ok(())
    }
}

impl WorldRegistrar for Constraint {
    fn add_to(&mut self, world: &mut PhysicsWorld) -> bool {
        if !self.enabled {
            tracing::debug!(kind = self.kind.name(), "disabled constraint not added");
            return false;
        }
        if self.in_world {
            if let Err(err) = self.remove_from(world) {
                tracing::error!(error = %err, "constraint re-add failed");
                return false;
            }
        }
        match self.try_add_to(world) {
            Ok(()) => {
                tracing::trace!(kind = self.kind.name(), body_a = %self.body_a, "constraint added");
                true
            }
            Err(err) => {
                tracing::error!(
                    kind = self.kind.name(),
                    body_a = %self.body_a,
                    error = %err,
                    "failed to add constraint to world"
                );
                false
            }
        }
    }

    fn remove_from(&mut self, world: &mut PhysicsWorld) -> PhysicsResult<()> {
        if !self.in_world {
            return Ok(());
        }
        let Some(handle) = self.handle.filter(|h| world.kernel().is_live(*h)) else {
            // Destroyed with its world
            self.handle = None;
            self.in_world = false;
            return Ok(());
        };
        let world_handle = world.native_world()?;
        world.kernel_mut().remove_constraint(world_handle, handle)?;
        self.in_world = false;
        Ok(())
    }

    fn dispose(&mut self, world: &mut PhysicsWorld) {
        if let Err(err) = self.remove_from(world) {
            tracing::error!(error = %err, "constraint dispose aborted");
            return;
        }
        let Some(handle) = self.handle else {
            return;
        };
        if world.kernel().is_live(handle) {
            if let Err(err) = world.kernel_mut().destroy(handle) {
                tracing::error!(error = %err, "failed to destroy constraint, handle kept");
                return;
            }
        }
        self.handle = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::PhysicsBody;
    use crate::config::WorldConfig;
    use ramjet_kernel::CollisionShape;
    use ramjet_shared::{Transform, Vec3};

    fn hinge() -> ConstraintKind {
        ConstraintKind::Hinge {
            pivot_a: Vec3::new(0.5, 0.0, 0.0),
            pivot_b: Vec3::new(-0.5, 0.0, 0.0),
            axis_a: Vec3::Z,
            axis_b: Vec3::Z,
        }
    }

    fn cube(id: u32, x: f32) -> PhysicsBody {
        PhysicsBody::rigid(
            BodyId(id),
            CollisionShape::Box {
                half_extents: Vec3::splat(0.5),
            },
            Transform::from_position(Vec3::new(x, 0.0, 0.0)),
            1.0,
        )
    }

    #[test]
    fn test_constraint_blocks_body_removal() {
        let mut world = PhysicsWorld::with_reference_kernel(WorldConfig::default());
        world.initialize().unwrap();
        let mut door = cube(1, 0.0);
        let mut frame = cube(2, 1.0);
        assert!(door.add_to(&mut world));
        assert!(frame.add_to(&mut world));

        let mut joint = Constraint::new(hinge(), BodyId(1), Some(BodyId(2)));
        assert!(joint.add_to(&mut world));

        assert!(matches!(
            door.remove_from(&mut world),
            Err(PhysicsError::InvariantViolation(_))
        ));
        assert!(door.is_in_world());

        joint.remove_from(&mut world).unwrap();
        door.remove_from(&mut world).unwrap();
        assert!(!door.is_in_world());

        joint.dispose(&mut world);
        door.dispose(&mut world);
        frame.dispose(&mut world);
        world.dispose();
        assert_eq!(world.kernel().live_handle_count(), 0);
    }

    #[test]
    fn test_constraint_needs_bodies_in_world() {
        let mut world = PhysicsWorld::with_reference_kernel(WorldConfig::default());
        world.initialize().unwrap();
        let mut joint = Constraint::new(hinge(), BodyId(1), Some(BodyId(2)));
        assert!(!joint.add_to(&mut world));
        assert!(joint.handle().is_none());
        world.dispose();
    }

    #[test]
    fn test_world_dispose_takes_constraints_down() {
        let mut world = PhysicsWorld::with_reference_kernel(WorldConfig::default());
        world.initialize().unwrap();
        let mut door = cube(1, 0.0);
        assert!(door.add_to(&mut world));
        let mut anchor = Constraint::new(
            ConstraintKind::PointToPoint {
                pivot_a: Vec3::ZERO,
                pivot_b: Vec3::ZERO,
            },
            BodyId(1),
            None,
        );
        assert!(anchor.add_to(&mut world));

        world.dispose();
        assert_eq!(world.kernel().live_handle_count(), 0);
        anchor.dispose(&mut world);
        door.dispose(&mut world);
        assert!(anchor.handle().is_none());
    }
}
