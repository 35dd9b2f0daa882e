//! Rigid bodies.
//!
//! A rigid body owns a motion state that receives interpolated transforms.
//! Material, damping and velocity setters are cached on the host and pushed
//! to the native body immediately when it exists.

use super::registrar::KindRegistrar;
use super::BodyBase;
use crate::error::{PhysicsError, PhysicsResult};
use crate::world::PhysicsWorld;
use ramjet_kernel::{
    ActivationState, AdditionalDamping, CollisionShape, Kernel, NativeHandle, RigidBodyDesc,
    RigidBodyProperties,
};
use ramjet_shared::{Transform, Vec3};
use serde::{Deserialize, Serialize};

/// Pose and velocities of a rigid body.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RigidBodyState {
    /// World transform.
    pub transform: Transform,
    /// Linear velocity.
    pub linear_velocity: Vec3,
    /// Angular velocity.
    pub angular_velocity: Vec3,
}

/// Rigid-body settings and companions.
#[derive(Clone, Debug)]
pub struct RigidBody {
    mass: f32,
    properties: RigidBodyProperties,
    /// Used when (re)building; refreshed by `sync_from_kernel`.
    linear_velocity: Vec3,
    angular_velocity: Vec3,
    motion_state: Option<NativeHandle>,
}

impl RigidBody {
    pub(crate) fn new(mass: f32) -> Self {
        Self {
            mass,
            properties: RigidBodyProperties::default(),
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            motion_state: None,
        }
    }

    /// Configured mass. Ignored while static or kinematic.
    #[inline]
    #[must_use]
    pub const fn mass(&self) -> f32 {
        self.mass
    }

    /// Material and damping parameters.
    #[inline]
    #[must_use]
    pub const fn properties(&self) -> &RigidBodyProperties {
        &self.properties
    }

    /// Motion state handle, once built.
    #[inline]
    #[must_use]
    pub const fn motion_state(&self) -> Option<NativeHandle> {
        self.motion_state
    }

    /// Mass and inertia the native body should carry.
    fn mass_props(&self, base: &BodyBase, shape: CollisionShape) -> (f32, Vec3) {
        if base.is_dynamic() {
            (self.mass, shape.calculate_local_inertia(self.mass))
        } else {
            (0.0, Vec3::ZERO)
        }
    }

    /// Pushes mass and inertia derived from the current flags and shape.
    pub(crate) fn push_mass_props(
        &self,
        base: &BodyBase,
        handle: NativeHandle,
        world: &mut PhysicsWorld,
    ) -> PhysicsResult<()> {
        let shape = base.require_shape()?;
        let (mass, inertia) = self.mass_props(base, shape);
        world.kernel_mut().set_mass_props(handle, mass, inertia)?;
        Ok(())
    }

    pub(crate) fn cache_velocities(&mut self, handle: NativeHandle, kernel: &dyn Kernel) {
        if let Ok(velocity) = kernel.linear_velocity(handle) {
            self.linear_velocity = velocity;
        }
        if let Ok(velocity) = kernel.angular_velocity(handle) {
            self.angular_velocity = velocity;
        }
    }
}

impl KindRegistrar for RigidBody {
    fn build(
        &mut self,
        base: &BodyBase,
        existing: Option<NativeHandle>,
        world: &mut PhysicsWorld,
    ) -> PhysicsResult<NativeHandle> {
        let shape = base.require_shape()?;
        if base.is_dynamic() {
            if shape.is_static_only() {
                return Err(PhysicsError::InvariantViolation(format!(
                    "{} shape cannot belong to dynamic {}",
                    shape.name(),
                    base.id()
                )));
            }
            if !(self.mass > 0.0) {
                tracing::error!(body = %base.id(), mass = self.mass, "dynamic rigid body needs a positive mass");
                return Err(PhysicsError::InvariantViolation(format!(
                    "dynamic {} has mass {}",
                    base.id(),
                    self.mass
                )));
            }
        }

        let (mass, local_inertia) = self.mass_props(base, shape);
        let kernel = world.kernel_mut();
        let reusable = self.motion_state.filter(|handle| kernel.is_live(*handle));
        let (motion_state, fresh) = match reusable {
            Some(motion_state) => (motion_state, false),
            None => (kernel.create_motion_state(base.transform())?, true),
        };

        let desc = RigidBodyDesc {
            object: base.object_desc(shape),
            mass,
            local_inertia,
            motion_state: Some(motion_state),
            linear_velocity: self.linear_velocity,
            angular_velocity: self.angular_velocity,
            properties: self.properties,
        };
        let built = match existing {
            Some(body) => kernel.configure_rigid_body(body, &desc).map(|()| body),
            None => kernel.create_rigid_body(&desc),
        };
        let body = match built {
            Ok(body) => body,
            Err(err) => {
                if fresh {
                    if let Err(rollback) = kernel.destroy(motion_state) {
                        tracing::error!(error = %rollback, "failed to roll back motion state");
                    }
                }
                return Err(err.into());
            }
        };
        self.motion_state = Some(motion_state);

        if base.is_kinematic() {
            kernel.set_activation_state(body, ActivationState::DisableDeactivation)?;
        }
        Ok(body)
    }

    fn add(
        &mut self,
        base: &BodyBase,
        handle: NativeHandle,
        world: &mut PhysicsWorld,
    ) -> PhysicsResult<()> {
        let world_kind = world.config().world_kind;
        if !world_kind.is_dynamics() {
            tracing::error!(body = %base.id(), world_kind = ?world_kind, "rigid bodies need a dynamics world");
            return Err(PhysicsError::Config(format!(
                "rigid {} cannot join a {world_kind:?} world",
                base.id()
            )));
        }
        let world_handle = world.native_world()?;
        world
            .kernel_mut()
            .add_rigid_body(world_handle, handle, base.group(), base.mask())?;
        Ok(())
    }

    fn remove(
        &mut self,
        base: &BodyBase,
        handle: NativeHandle,
        world: &mut PhysicsWorld,
    ) -> PhysicsResult<()> {
        let refs = world.kernel().num_constraint_refs(handle)?;
        if refs > 0 {
            tracing::error!(body = %base.id(), refs, "rigid body removed while constraints still reference it");
            return Err(PhysicsError::InvariantViolation(format!(
                "{} still has {refs} constraint reference(s)",
                base.id()
            )));
        }
        let world_handle = world.native_world()?;
        world.kernel_mut().remove_rigid_body(world_handle, handle)?;
        Ok(())
    }

    fn released(&mut self, world: &mut PhysicsWorld) {
        let Some(motion_state) = self.motion_state.take() else {
            return;
        };
        if world.kernel().is_live(motion_state) {
            if let Err(err) = world.kernel_mut().destroy(motion_state) {
                tracing::error!(error = %err, "failed to destroy motion state");
            }
        }
    }
}

/// Runtime API of a rigid body, borrowed from its [`PhysicsBody`](super::PhysicsBody).
///
/// Setters update the host copy and push to the native body when it is
/// built. Forces and impulses only act while the body is in a world.
#[derive(Debug)]
pub struct RigidBodyMut<'a> {
    base: &'a mut BodyBase,
    rigid: &'a mut RigidBody,
}

impl<'a> RigidBodyMut<'a> {
    pub(crate) fn new(base: &'a mut BodyBase, rigid: &'a mut RigidBody) -> Self {
        Self { base, rigid }
    }

    /// Configured mass.
    #[inline]
    #[must_use]
    pub fn mass(&self) -> f32 {
        self.rigid.mass
    }

    /// Sets the mass.
    ///
    /// On a built dynamic body the local inertia is recomputed from the
    /// current shape and pushed with the mass.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::InvariantViolation`] for a non-positive mass
    /// on a dynamic body; the value is not applied.
    pub fn set_mass(&mut self, world: &mut PhysicsWorld, mass: f32) -> PhysicsResult<()> {
        if self.base.is_dynamic() && !(mass > 0.0) {
            tracing::error!(body = %self.base.id(), mass, "dynamic rigid body needs a positive mass");
            return Err(PhysicsError::InvariantViolation(format!(
                "dynamic {} cannot have mass {mass}",
                self.base.id()
            )));
        }
        self.rigid.mass = mass;
        if let Some(handle) = self.base.live_handle(world) {
            if self.base.is_dynamic() {
                self.rigid.push_mass_props(self.base, handle, world)?;
            }
        }
        Ok(())
    }

    /// Material and damping parameters.
    #[inline]
    #[must_use]
    pub fn properties(&self) -> &RigidBodyProperties {
        &self.rigid.properties
    }

    fn update_properties(
        &mut self,
        world: &mut PhysicsWorld,
        update: impl FnOnce(&mut RigidBodyProperties),
    ) -> PhysicsResult<()> {
        update(&mut self.rigid.properties);
        if let Some(handle) = self.base.live_handle(world) {
            world
                .kernel_mut()
                .set_rigid_body_properties(handle, &self.rigid.properties)?;
        }
        Ok(())
    }

    /// Sets sliding friction.
    ///
    /// # Errors
    ///
    /// Propagates kernel failures.
    pub fn set_friction(&mut self, world: &mut PhysicsWorld, friction: f32) -> PhysicsResult<()> {
        self.update_properties(world, |p| p.friction = friction)
    }

    /// Sets rolling friction.
    ///
    /// # Errors
    ///
    /// Propagates kernel failures.
    pub fn set_rolling_friction(&mut self, world: &mut PhysicsWorld, friction: f32) -> PhysicsResult<()> {
        self.update_properties(world, |p| p.rolling_friction = friction)
    }

    /// Sets restitution.
    ///
    /// # Errors
    ///
    /// Propagates kernel failures.
    pub fn set_restitution(&mut self, world: &mut PhysicsWorld, restitution: f32) -> PhysicsResult<()> {
        self.update_properties(world, |p| p.restitution = restitution)
    }

    /// Sets linear and angular damping.
    ///
    /// # Errors
    ///
    /// Propagates kernel failures, including out-of-range values.
    pub fn set_damping(&mut self, world: &mut PhysicsWorld, linear: f32, angular: f32) -> PhysicsResult<()> {
        self.update_properties(world, |p| {
            p.linear_damping = linear;
            p.angular_damping = angular;
        })
    }

    /// Sets the sleeping thresholds.
    ///
    /// # Errors
    ///
    /// Propagates kernel failures.
    pub fn set_sleeping_thresholds(
        &mut self,
        world: &mut PhysicsWorld,
        linear: f32,
        angular: f32,
    ) -> PhysicsResult<()> {
        self.update_properties(world, |p| {
            p.linear_sleeping_threshold = linear;
            p.angular_sleeping_threshold = angular;
        })
    }

    /// Sets the per-axis linear velocity scale.
    ///
    /// # Errors
    ///
    /// Propagates kernel failures.
    pub fn set_linear_factor(&mut self, world: &mut PhysicsWorld, factor: Vec3) -> PhysicsResult<()> {
        self.update_properties(world, |p| p.linear_factor = factor)
    }

    /// Sets the per-axis angular velocity scale.
    ///
    /// # Errors
    ///
    /// Propagates kernel failures.
    pub fn set_angular_factor(&mut self, world: &mut PhysicsWorld, factor: Vec3) -> PhysicsResult<()> {
        self.update_properties(world, |p| p.angular_factor = factor)
    }

    /// Sets additional damping. Only allowed before the body is built.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::InvariantViolation`] once built.
    pub fn set_additional_damping(&mut self, damping: Option<AdditionalDamping>) -> PhysicsResult<()> {
        if self.base.handle().is_some() {
            tracing::error!(body = %self.base.id(), "additional damping is fixed once built");
            return Err(PhysicsError::InvariantViolation(format!(
                "{} is built; additional damping cannot change",
                self.base.id()
            )));
        }
        self.rigid.properties.additional_damping = damping;
        Ok(())
    }

    // =========================================================================
    // Velocities
    // =========================================================================

    /// Linear velocity, read live while built.
    #[must_use]
    pub fn linear_velocity(&self, world: &PhysicsWorld) -> Vec3 {
        self.base
            .live_handle(world)
            .and_then(|handle| world.kernel().linear_velocity(handle).ok())
            .unwrap_or(self.rigid.linear_velocity)
    }

    /// Sets linear velocity.
    ///
    /// # Errors
    ///
    /// Propagates kernel failures.
    pub fn set_linear_velocity(&mut self, world: &mut PhysicsWorld, velocity: Vec3) -> PhysicsResult<()> {
        self.rigid.linear_velocity = velocity;
        if let Some(handle) = self.base.live_handle(world) {
            world.kernel_mut().set_linear_velocity(handle, velocity)?;
        }
        Ok(())
    }

    /// Angular velocity, read live while built.
    #[must_use]
    pub fn angular_velocity(&self, world: &PhysicsWorld) -> Vec3 {
        self.base
            .live_handle(world)
            .and_then(|handle| world.kernel().angular_velocity(handle).ok())
            .unwrap_or(self.rigid.angular_velocity)
    }

    /// Sets angular velocity.
    ///
    /// # Errors
    ///
    /// Propagates kernel failures.
    pub fn set_angular_velocity(&mut self, world: &mut PhysicsWorld, velocity: Vec3) -> PhysicsResult<()> {
        self.rigid.angular_velocity = velocity;
        if let Some(handle) = self.base.live_handle(world) {
            world.kernel_mut().set_angular_velocity(handle, velocity)?;
        }
        Ok(())
    }

    /// Pose and velocities. Live while built, host copy otherwise.
    #[must_use]
    pub fn state(&self, world: &PhysicsWorld) -> RigidBodyState {
        let transform = self
            .base
            .live_handle(world)
            .and_then(|handle| world.kernel().world_transform(handle).ok())
            .unwrap_or(self.base.transform());
        RigidBodyState {
            transform,
            linear_velocity: self.linear_velocity(world),
            angular_velocity: self.angular_velocity(world),
        }
    }

    /// Restores pose and velocities.
    ///
    /// # Errors
    ///
    /// Propagates kernel failures, including a non-unit scale.
    pub fn set_state(&mut self, world: &mut PhysicsWorld, state: RigidBodyState) -> PhysicsResult<()> {
        self.base.transform = state.transform;
        self.rigid.linear_velocity = state.linear_velocity;
        self.rigid.angular_velocity = state.angular_velocity;
        if let Some(handle) = self.base.live_handle(world) {
            let kernel = world.kernel_mut();
            kernel.set_world_transform(handle, state.transform)?;
            kernel.set_linear_velocity(handle, state.linear_velocity)?;
            kernel.set_angular_velocity(handle, state.angular_velocity)?;
        }
        Ok(())
    }

    /// Wakes the body.
    ///
    /// # Errors
    ///
    /// Propagates kernel failures.
    pub fn activate(&mut self, world: &mut PhysicsWorld) -> PhysicsResult<()> {
        if let Some(handle) = self.base.live_handle(world) {
            world.kernel_mut().activate(handle)?;
        }
        Ok(())
    }

    // =========================================================================
    // Forces
    // =========================================================================

    /// Impulse through the centre of mass.
    ///
    /// # Errors
    ///
    /// Propagates kernel failures.
    pub fn apply_central_impulse(&mut self, world: &mut PhysicsWorld, impulse: Vec3) -> PhysicsResult<()> {
        if let Some(handle) = self.base.world_handle(world) {
            world.kernel_mut().apply_central_impulse(handle, impulse)?;
        }
        Ok(())
    }

    /// Impulse at `rel_pos` from the centre of mass.
    ///
    /// # Errors
    ///
    /// Propagates kernel failures.
    pub fn apply_impulse(
        &mut self,
        world: &mut PhysicsWorld,
        impulse: Vec3,
        rel_pos: Vec3,
    ) -> PhysicsResult<()> {
        if let Some(handle) = self.base.world_handle(world) {
            world.kernel_mut().apply_impulse(handle, impulse, rel_pos)?;
        }
        Ok(())
    }

    /// Angular impulse.
    ///
    /// # Errors
    ///
    /// Propagates kernel failures.
    pub fn apply_torque_impulse(&mut self, world: &mut PhysicsWorld, torque: Vec3) -> PhysicsResult<()> {
        if let Some(handle) = self.base.world_handle(world) {
            world.kernel_mut().apply_torque_impulse(handle, torque)?;
        }
        Ok(())
    }

    /// Force through the centre of mass for the next step call.
    ///
    /// # Errors
    ///
    /// Propagates kernel failures.
    pub fn apply_central_force(&mut self, world: &mut PhysicsWorld, force: Vec3) -> PhysicsResult<()> {
        if let Some(handle) = self.base.world_handle(world) {
            world.kernel_mut().apply_central_force(handle, force)?;
        }
        Ok(())
    }

    /// Force at `rel_pos` for the next step call.
    ///
    /// # Errors
    ///
    /// Propagates kernel failures.
    pub fn apply_force(&mut self, world: &mut PhysicsWorld, force: Vec3, rel_pos: Vec3) -> PhysicsResult<()> {
        if let Some(handle) = self.base.world_handle(world) {
            world.kernel_mut().apply_force(handle, force, rel_pos)?;
        }
        Ok(())
    }

    /// Torque for the next step call.
    ///
    /// # Errors
    ///
    /// Propagates kernel failures.
    pub fn apply_torque(&mut self, world: &mut PhysicsWorld, torque: Vec3) -> PhysicsResult<()> {
        if let Some(handle) = self.base.world_handle(world) {
            world.kernel_mut().apply_torque(handle, torque)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::{BodyId, PhysicsBody, WorldRegistrar};
    use super::*;
    use crate::config::WorldConfig;
    use ramjet_kernel::{CollisionFlags, WorldKind};

    fn world(kind: WorldKind) -> PhysicsWorld {
        let mut world = PhysicsWorld::with_reference_kernel(WorldConfig {
            world_kind: kind,
            ..WorldConfig::default()
        });
        world.initialize().unwrap();
        world
    }

    fn ball(id: u32) -> PhysicsBody {
        PhysicsBody::rigid(
            BodyId(id),
            CollisionShape::Sphere { radius: 0.5 },
            Transform::IDENTITY,
            1.0,
        )
    }

    #[test]
    fn test_zero_mass_rejected_on_dynamic_body() {
        let mut world = world(WorldKind::RigidBodyDynamics);
        let mut body = ball(1);
        assert!(body.add_to(&mut world));
        let mut rigid = body.rigid_mut().unwrap();
        assert!(matches!(
            rigid.set_mass(&mut world, 0.0),
            Err(PhysicsError::InvariantViolation(_))
        ));
        assert_eq!(rigid.mass(), 1.0);
        world.dispose();
    }

    #[test]
    fn test_mass_change_pushes_inertia() {
        let mut world = world(WorldKind::RigidBodyDynamics);
        let mut body = ball(1);
        assert!(body.add_to(&mut world));
        body.rigid_mut().unwrap().set_mass(&mut world, 4.0).unwrap();

        // Same impulse, a quarter of the velocity change
        let mut rigid = body.rigid_mut().unwrap();
        rigid.apply_central_impulse(&mut world, Vec3::X).unwrap();
        let velocity = rigid.linear_velocity(&world);
        assert!((velocity.x - 0.25).abs() < 1.0e-6);
        world.dispose();
    }

    #[test]
    fn test_rigid_needs_dynamics_world() {
        let mut world = world(WorldKind::CollisionOnly);
        let mut body = ball(1);
        assert!(!body.add_to(&mut world));
        assert!(!body.is_in_world());
        body.dispose(&mut world);
        world.dispose();
        assert_eq!(world.kernel().live_handle_count(), 0);
    }

    #[test]
    fn test_kinematic_never_sleeps() {
        let mut world = world(WorldKind::RigidBodyDynamics);
        let mut body = ball(1).with_flags(CollisionFlags::KINEMATIC_OBJECT);
        assert!(body.add_to(&mut world));
        let handle = body.handle().unwrap();
        assert_eq!(
            world.kernel().activation_state(handle).unwrap(),
            ActivationState::DisableDeactivation
        );
        world.dispose();
    }

    #[test]
    fn test_additional_damping_fixed_once_built() {
        let mut world = world(WorldKind::RigidBodyDynamics);
        let mut body = ball(1);
        body.rigid_mut()
            .unwrap()
            .set_additional_damping(Some(AdditionalDamping::default()))
            .unwrap();
        assert!(body.add_to(&mut world));
        assert!(body
            .rigid_mut()
            .unwrap()
            .set_additional_damping(None)
            .is_err());
        world.dispose();
    }

    #[test]
    fn test_state_round_trip() {
        let mut world = world(WorldKind::RigidBodyDynamics);
        let mut body = ball(1);
        assert!(body.add_to(&mut world));
        let state = RigidBodyState {
            transform: Transform::from_position(Vec3::new(3.0, 4.0, 5.0)),
            linear_velocity: Vec3::new(1.0, 0.0, 0.0),
            angular_velocity: Vec3::new(0.0, 2.0, 0.0),
        };
        let mut rigid = body.rigid_mut().unwrap();
        rigid.set_state(&mut world, state).unwrap();
        assert_eq!(rigid.state(&world), state);
        world.dispose();
    }

    #[test]
    fn test_forces_ignored_outside_world() {
        let mut world = world(WorldKind::RigidBodyDynamics);
        let mut body = ball(1);
        let mut rigid = body.rigid_mut().unwrap();
        rigid.apply_central_impulse(&mut world, Vec3::X).unwrap();
        assert_eq!(rigid.linear_velocity(&world), Vec3::ZERO);
        world.dispose();
    }
}
