//! # Behaviours
//!
//! Per-tick callbacks attached to scene objects. The registry's pre-tick
//! hook calls every live behaviour once per kernel sub-step, before the
//! kernel integrates it, in [`ExecutionOrder`] sequence.
//!
//! ## Ordering
//!
//! Each behaviour type has a priority (default 0). Higher priorities run
//! first. Behaviours with equal priority run in reverse discovery order.

use crate::body::BodyId;
use crate::error::{PhysicsError, PhysicsResult};
use ramjet_kernel::{Kernel, NativeHandle};
use ramjet_shared::{Transform, Vec3};
use std::collections::BTreeMap;

/// A per-tick physics callback.
///
/// Implementations must be `Send`; the pre-tick hook is owned by the kernel.
pub trait PhysicsComponent: Send {
    /// Key into the [`ExecutionOrder`] table.
    ///
    /// All instances of one behaviour type should return the same key.
    fn type_key(&self) -> &'static str;

    /// Called once per sub-step before integration.
    ///
    /// # Arguments
    ///
    /// * `dt` - Sub-step length in seconds
    /// * `ctx` - Access to the owning object's bodies
    fn physics_update(&mut self, dt: f32, ctx: &mut TickContext<'_>);
}

/// Behaviour type key to priority.
///
/// The registry keeps one schedule across all registered objects. Higher
/// priorities run first. Within one priority the most recently discovered
/// behaviour runs first, and that reversal spans objects too: at equal
/// priority every behaviour of a later-registered object runs before those
/// of earlier objects. Unlisted keys get priority 0.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutionOrder {
    priorities: BTreeMap<String, i32>,
}

impl ExecutionOrder {
    /// Empty table; every key has priority 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Table from configuration.
    #[must_use]
    pub fn from_table(priorities: BTreeMap<String, i32>) -> Self {
        Self { priorities }
    }

    /// Sets the priority of `type_key`.
    pub fn set(&mut self, type_key: impl Into<String>, priority: i32) {
        self.priorities.insert(type_key.into(), priority);
    }

    /// Priority of `type_key`, 0 when unlisted.
    #[must_use]
    pub fn priority_of(&self, type_key: &str) -> i32 {
        self.priorities.get(type_key).copied().unwrap_or(0)
    }
}

/// What a behaviour may touch during its tick.
///
/// Body access is limited to the owning object's in-world bodies.
pub struct TickContext<'a> {
    kernel: &'a mut dyn Kernel,
    bodies: &'a [(BodyId, NativeHandle)],
    destroy_requested: bool,
}

impl<'a> TickContext<'a> {
    pub(crate) fn new(kernel: &'a mut dyn Kernel, bodies: &'a [(BodyId, NativeHandle)]) -> Self {
        Self {
            kernel,
            bodies,
            destroy_requested: false,
        }
    }

    /// Ids of the owning object's bodies currently in the world.
    pub fn bodies(&self) -> impl Iterator<Item = BodyId> + '_ {
        self.bodies.iter().map(|(id, _)| *id)
    }

    /// Native handle of one of the owning object's bodies.
    #[must_use]
    pub fn handle(&self, id: BodyId) -> Option<NativeHandle> {
        self.bodies
            .iter()
            .find(|(body, _)| *body == id)
            .map(|(_, handle)| *handle)
    }

    fn owned(&self, id: BodyId) -> PhysicsResult<NativeHandle> {
        self.handle(id).ok_or_else(|| {
            PhysicsError::InvariantViolation(format!("{id} is not an in-world body of this object"))
        })
    }

    /// Direct kernel access.
    pub fn kernel(&mut self) -> &mut dyn Kernel {
        &mut *self.kernel
    }

    /// World transform of a body.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::InvariantViolation`] for bodies of other objects.
    pub fn world_transform(&self, id: BodyId) -> PhysicsResult<Transform> {
        let handle = self.owned(id)?;
        Ok(self.kernel.world_transform(handle)?)
    }

    /// Linear velocity of a rigid body.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::InvariantViolation`] for bodies of other objects.
    pub fn linear_velocity(&self, id: BodyId) -> PhysicsResult<Vec3> {
        let handle = self.owned(id)?;
        Ok(self.kernel.linear_velocity(handle)?)
    }

    /// Sets the linear velocity of a rigid body.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::InvariantViolation`] for bodies of other objects.
    pub fn set_linear_velocity(&mut self, id: BodyId, velocity: Vec3) -> PhysicsResult<()> {
        let handle = self.owned(id)?;
        Ok(self.kernel.set_linear_velocity(handle, velocity)?)
    }

    /// Force through the centre of mass for the rest of the step call.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::InvariantViolation`] for bodies of other objects.
    pub fn apply_central_force(&mut self, id: BodyId, force: Vec3) -> PhysicsResult<()> {
        let handle = self.owned(id)?;
        Ok(self.kernel.apply_central_force(handle, force)?)
    }

    /// Impulse through the centre of mass.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::InvariantViolation`] for bodies of other objects.
    pub fn apply_central_impulse(&mut self, id: BodyId, impulse: Vec3) -> PhysicsResult<()> {
        let handle = self.owned(id)?;
        Ok(self.kernel.apply_central_impulse(handle, impulse)?)
    }

    /// Torque for the rest of the step call.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::InvariantViolation`] for bodies of other objects.
    pub fn apply_torque(&mut self, id: BodyId, torque: Vec3) -> PhysicsResult<()> {
        let handle = self.owned(id)?;
        Ok(self.kernel.apply_torque(handle, torque)?)
    }

    /// Wakes a body.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::InvariantViolation`] for bodies of other objects.
    pub fn activate(&mut self, id: BodyId) -> PhysicsResult<()> {
        let handle = self.owned(id)?;
        Ok(self.kernel.activate(handle)?)
    }

    /// Destroys the calling behaviour after this tick.
    ///
    /// Its slot is pruned from the schedule before the next tick.
    pub fn destroy_self(&mut self) {
        self.destroy_requested = true;
    }

    pub(crate) const fn destroy_requested(&self) -> bool {
        self.destroy_requested
    }
}

impl std::fmt::Debug for TickContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickContext")
            .field("kernel", &self.kernel.name())
            .field("bodies", &self.bodies)
            .field("destroy_requested", &self.destroy_requested)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlisted_priority_is_zero() {
        let mut order = ExecutionOrder::new();
        order.set("controller", 20);
        assert_eq!(order.priority_of("controller"), 20);
        assert_eq!(order.priority_of("effect"), 0);
    }

    #[test]
    fn test_context_rejects_foreign_bodies() {
        use ramjet_core::SlotId;
        let mut kernel = ramjet_kernel::ReferenceKernel::new();
        let bodies = [(BodyId(1), NativeHandle::from_slot(SlotId::new(0, 0)))];
        let mut ctx = TickContext::new(&mut kernel, &bodies);
        assert_eq!(ctx.bodies().collect::<Vec<_>>(), vec![BodyId(1)]);
        assert!(matches!(
            ctx.apply_central_force(BodyId(2), Vec3::Y),
            Err(PhysicsError::InvariantViolation(_))
        ));
        assert!(!ctx.destroy_requested());
        ctx.destroy_self();
        assert!(ctx.destroy_requested());
    }
}
