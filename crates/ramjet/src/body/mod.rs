//! # Physics Bodies
//!
//! A [`PhysicsBody`] is a shared [`BodyBase`] plus one [`BodyKind`]:
//!
//! | Kind               | Native object              | World call            |
//! |--------------------|----------------------------|-----------------------|
//! | `CollisionObject`  | collision object           | add_collision_object  |
//! | `Rigid`            | rigid body + motion state  | add_rigid_body        |
//! | `Soft`             | soft body                  | add_soft_body         |
//! | `Ghost`            | ghost object               | add_collision_object  |
//! | `Character`        | ghost object + controller  | add_collision_object + add_action |
//!
//! ## Lifecycle
//!
//! ```text
//! NotBuilt ──add_to──▶ InWorld ──remove_from──▶ Removed
//!    ▲                   ▲                        │
//!    └──── dispose ──────┴──────── add_to ────────┘
//! ```
//!
//! Rebuilding an in-world body removes it first. A rebuild rewrites the
//! existing native object in place so sleep timers and interpolation state
//! survive; soft bodies are recreated.

mod character;
mod collision_object;
mod ghost;
mod registrar;
mod rigid;
mod soft;

pub use character::CharacterBody;
pub use collision_object::CollisionObjectBody;
pub use ghost::GhostBody;
pub use registrar::WorldRegistrar;
pub use rigid::{RigidBody, RigidBodyMut, RigidBodyState};
pub use soft::SoftBody;

use crate::error::{PhysicsError, PhysicsResult};
use crate::world::PhysicsWorld;
use registrar::KindRegistrar;
use ramjet_core::DenseKey;
use ramjet_kernel::{
    ActivationState, CollisionFilterGroups, CollisionFlags, CollisionObjectDesc, CollisionShape,
    NativeHandle,
};
use ramjet_shared::{Quaternion, Transform, Vec3};
use serde::{Deserialize, Serialize};

/// Host-chosen identity of a body.
///
/// Doubles as the native user index and as the key of the world's body
/// table, so it must be below [`WorldConfig::max_bodies`](crate::WorldConfig::max_bodies)
/// and unique among bodies in one world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BodyId(pub u32);

impl DenseKey for BodyId {
    #[inline]
    fn dense_index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for BodyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "body#{}", self.0)
    }
}

/// Where a body is in its lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BodyLifecycle {
    /// No native object.
    #[default]
    NotBuilt,
    /// Native object registered with a world.
    InWorld,
    /// Native object exists outside any world.
    Removed,
}

/// State shared by every body kind.
#[derive(Clone, Debug)]
pub struct BodyBase {
    id: BodyId,
    shape: Option<CollisionShape>,
    transform: Transform,
    flags: CollisionFlags,
    group: CollisionFilterGroups,
    mask: CollisionFilterGroups,
    enabled: bool,
    handle: Option<NativeHandle>,
    lifecycle: BodyLifecycle,
}

impl BodyBase {
    fn new(id: BodyId, shape: Option<CollisionShape>, transform: Transform) -> Self {
        Self {
            id,
            shape,
            transform,
            flags: CollisionFlags::empty(),
            group: CollisionFilterGroups::DEFAULT,
            mask: CollisionFilterGroups::ALL,
            enabled: true,
            handle: None,
            lifecycle: BodyLifecycle::NotBuilt,
        }
    }

    /// Body id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> BodyId {
        self.id
    }

    /// Collision shape, if any.
    #[inline]
    #[must_use]
    pub const fn shape(&self) -> Option<CollisionShape> {
        self.shape
    }

    /// Host transform snapshot.
    #[inline]
    #[must_use]
    pub const fn transform(&self) -> Transform {
        self.transform
    }

    /// Collision flags.
    #[inline]
    #[must_use]
    pub const fn flags(&self) -> CollisionFlags {
        self.flags
    }

    /// Collision group.
    #[inline]
    #[must_use]
    pub const fn group(&self) -> CollisionFilterGroups {
        self.group
    }

    /// Collision mask.
    #[inline]
    #[must_use]
    pub const fn mask(&self) -> CollisionFilterGroups {
        self.mask
    }

    /// False for bodies that `add_to` skips.
    #[inline]
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Native handle, if built.
    #[inline]
    #[must_use]
    pub const fn handle(&self) -> Option<NativeHandle> {
        self.handle
    }

    /// Lifecycle state.
    #[inline]
    #[must_use]
    pub const fn lifecycle(&self) -> BodyLifecycle {
        self.lifecycle
    }

    /// True while registered with a world.
    #[inline]
    #[must_use]
    pub fn is_in_world(&self) -> bool {
        self.lifecycle == BodyLifecycle::InWorld
    }

    /// True unless the static or kinematic flag is set.
    #[inline]
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        !self
            .flags
            .intersects(CollisionFlags::STATIC_OBJECT | CollisionFlags::KINEMATIC_OBJECT)
    }

    /// True if the kinematic flag is set.
    #[inline]
    #[must_use]
    pub fn is_kinematic(&self) -> bool {
        self.flags.contains(CollisionFlags::KINEMATIC_OBJECT)
    }

    /// Shape, validated.
    pub(crate) fn require_shape(&self) -> PhysicsResult<CollisionShape> {
        let Some(shape) = self.shape else {
            tracing::error!(body = %self.id, "body has no collision shape");
            return Err(PhysicsError::InvariantViolation(format!(
                "{} has no collision shape",
                self.id
            )));
        };
        shape.validate()?;
        Ok(shape)
    }

    pub(crate) fn object_desc(&self, shape: CollisionShape) -> CollisionObjectDesc {
        CollisionObjectDesc {
            shape,
            transform: self.transform,
            flags: self.flags,
            user_index: self.id.0,
        }
    }

    /// Handle that still refers to a live kernel object.
    pub(crate) fn live_handle(&self, world: &PhysicsWorld) -> Option<NativeHandle> {
        self.handle.filter(|handle| world.kernel().is_live(*handle))
    }

    /// Live handle of an in-world body.
    pub(crate) fn world_handle(&self, world: &PhysicsWorld) -> Option<NativeHandle> {
        if self.is_in_world() {
            self.live_handle(world)
        } else {
            None
        }
    }
}

/// Kind-specific body state.
#[derive(Clone, Debug)]
pub enum BodyKind {
    /// Static or kinematic geometry without dynamics.
    CollisionObject(CollisionObjectBody),
    /// Rigid body.
    Rigid(RigidBody),
    /// Point-mass soft body.
    Soft(SoftBody),
    /// Overlap-tracking ghost object.
    Ghost(GhostBody),
    /// Ghost object driven by a character controller action.
    Character(CharacterBody),
}

impl BodyKind {
    /// Short name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CollisionObject(_) => "collision_object",
            Self::Rigid(_) => "rigid",
            Self::Soft(_) => "soft",
            Self::Ghost(_) => "ghost",
            Self::Character(_) => "character",
        }
    }

    fn registrar(&mut self) -> &mut dyn KindRegistrar {
        match self {
            Self::CollisionObject(body) => body,
            Self::Rigid(body) => body,
            Self::Soft(body) => body,
            Self::Ghost(body) => body,
            Self::Character(body) => body,
        }
    }
}

/// A body contributed by a scene object.
///
/// # Example
///
/// ```rust,ignore
/// let mut ball = PhysicsBody::rigid(BodyId(1), CollisionShape::Sphere { radius: 0.5 },
///     Transform::from_position(Vec3::new(0.0, 10.0, 0.0)), 1.0);
/// assert!(ball.add_to(&mut world));
/// world.step(1.0 / 60.0);
/// ball.sync_from_kernel(&world);
/// ```
#[derive(Clone, Debug)]
pub struct PhysicsBody {
    base: BodyBase,
    kind: BodyKind,
}

impl PhysicsBody {
    // =========================================================================
    // Construction
    // =========================================================================

    /// Plain collision object.
    #[must_use]
    pub fn collision_object(id: BodyId, shape: CollisionShape, transform: Transform) -> Self {
        Self {
            base: BodyBase::new(id, Some(shape), transform),
            kind: BodyKind::CollisionObject(CollisionObjectBody),
        }
    }

    /// Rigid body of `mass`.
    ///
    /// Dynamic unless a static or kinematic flag is set later, so `mass`
    /// must be positive unless it is.
    #[must_use]
    pub fn rigid(id: BodyId, shape: CollisionShape, transform: Transform, mass: f32) -> Self {
        Self {
            base: BodyBase::new(id, Some(shape), transform),
            kind: BodyKind::Rigid(RigidBody::new(mass)),
        }
    }

    /// Static rigid body: zero mass, `STATIC_OBJECT` flag, `STATIC` group.
    #[must_use]
    pub fn static_rigid(id: BodyId, shape: CollisionShape, transform: Transform) -> Self {
        let mut body = Self::rigid(id, shape, transform, 0.0);
        body.base.flags = CollisionFlags::STATIC_OBJECT;
        body.base.group = CollisionFilterGroups::STATIC;
        body
    }

    /// Soft body made of `nodes` (local space) sharing `total_mass`.
    #[must_use]
    pub fn soft(id: BodyId, nodes: Vec<Vec3>, total_mass: f32, transform: Transform) -> Self {
        Self {
            base: BodyBase::new(id, None, transform),
            kind: BodyKind::Soft(SoftBody::new(nodes, total_mass)),
        }
    }

    /// Ghost object.
    #[must_use]
    pub fn ghost(id: BodyId, shape: CollisionShape, transform: Transform) -> Self {
        let mut body = Self {
            base: BodyBase::new(id, Some(shape), transform),
            kind: BodyKind::Ghost(GhostBody),
        };
        body.base.flags = CollisionFlags::NO_CONTACT_RESPONSE;
        body.base.group = CollisionFilterGroups::SENSOR_TRIGGER;
        body
    }

    /// Character: a ghost moved by a controller action.
    #[must_use]
    pub fn character(id: BodyId, shape: CollisionShape, transform: Transform, step_height: f32) -> Self {
        let mut body = Self {
            base: BodyBase::new(id, Some(shape), transform),
            kind: BodyKind::Character(CharacterBody::new(step_height)),
        };
        body.base.flags = CollisionFlags::CHARACTER_OBJECT;
        body.base.group = CollisionFilterGroups::CHARACTER;
        body
    }

    /// Returns the body with `flags`.
    #[must_use]
    pub fn with_flags(mut self, flags: CollisionFlags) -> Self {
        self.base.flags = flags;
        self
    }

    /// Returns the body with collision `group` and `mask`.
    #[must_use]
    pub fn with_filter(mut self, group: CollisionFilterGroups, mask: CollisionFilterGroups) -> Self {
        self.base.group = group;
        self.base.mask = mask;
        self
    }

    /// Returns the body enabled or disabled.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.base.enabled = enabled;
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Shared state.
    #[inline]
    #[must_use]
    pub const fn base(&self) -> &BodyBase {
        &self.base
    }

    /// Kind-specific state.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> &BodyKind {
        &self.kind
    }

    /// Body id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> BodyId {
        self.base.id
    }

    /// Native handle, if built.
    #[inline]
    #[must_use]
    pub const fn handle(&self) -> Option<NativeHandle> {
        self.base.handle
    }

    /// True while registered with a world.
    #[inline]
    #[must_use]
    pub fn is_in_world(&self) -> bool {
        self.base.is_in_world()
    }

    /// Host transform snapshot.
    #[inline]
    #[must_use]
    pub const fn transform(&self) -> Transform {
        self.base.transform
    }

    /// Rigid state, if this is a rigid body.
    #[must_use]
    pub fn as_rigid(&self) -> Option<&RigidBody> {
        match &self.kind {
            BodyKind::Rigid(rigid) => Some(rigid),
            _ => None,
        }
    }

    /// Rigid runtime API, if this is a rigid body.
    pub fn rigid_mut(&mut self) -> Option<RigidBodyMut<'_>> {
        let Self { base, kind } = self;
        match kind {
            BodyKind::Rigid(rigid) => Some(RigidBodyMut::new(base, rigid)),
            _ => None,
        }
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Enables or disables the body. Takes effect on the next `add_to`.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.base.enabled = enabled;
    }

    /// Replaces the collision shape. Takes effect on the next build.
    pub fn set_shape(&mut self, shape: Option<CollisionShape>) {
        self.base.shape = shape;
    }

    /// Replaces the host transform. Takes effect on the next build.
    ///
    /// Use [`set_position_and_rotation`](Self::set_position_and_rotation) to
    /// move a body that is in a world.
    pub fn set_transform(&mut self, transform: Transform) {
        self.base.transform = transform;
    }

    /// Sets collision group and mask.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::InvariantViolation`] once the native object
    /// exists.
    pub fn set_collision_filter(
        &mut self,
        group: CollisionFilterGroups,
        mask: CollisionFilterGroups,
    ) -> PhysicsResult<()> {
        if self.base.handle.is_some() {
            tracing::error!(body = %self.base.id, "collision group and mask are fixed once built");
            return Err(PhysicsError::InvariantViolation(format!(
                "{} is built; group and mask cannot change",
                self.base.id
            )));
        }
        self.base.group = group;
        self.base.mask = mask;
        Ok(())
    }

    /// Sets collision flags, pushing them to a built body.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::InvariantViolation`] if the flags would make a
    /// massless rigid body dynamic.
    pub fn set_collision_flags(
        &mut self,
        world: &mut PhysicsWorld,
        flags: CollisionFlags,
    ) -> PhysicsResult<()> {
        let becomes_dynamic =
            !flags.intersects(CollisionFlags::STATIC_OBJECT | CollisionFlags::KINEMATIC_OBJECT);
        if let BodyKind::Rigid(rigid) = &self.kind {
            if becomes_dynamic && !(rigid.mass() > 0.0) {
                tracing::error!(body = %self.base.id, "dynamic rigid body needs a positive mass");
                return Err(PhysicsError::InvariantViolation(format!(
                    "{} has no mass and cannot become dynamic",
                    self.base.id
                )));
            }
        }

        self.base.flags = flags;
        let Some(handle) = self.base.live_handle(world) else {
            return Ok(());
        };
        world.kernel_mut().set_collision_flags(handle, flags)?;
        if let BodyKind::Rigid(rigid) = &self.kind {
            rigid.push_mass_props(&self.base, handle, world)?;
        }
        if self.base.is_kinematic() {
            world
                .kernel_mut()
                .set_activation_state(handle, ActivationState::DisableDeactivation)?;
        }
        Ok(())
    }

    /// Moves the body, mirroring the pose into the kernel while in a world.
    ///
    /// # Errors
    ///
    /// Propagates kernel failures.
    pub fn set_position_and_rotation(
        &mut self,
        world: &mut PhysicsWorld,
        position: Vec3,
        rotation: Quaternion,
    ) -> PhysicsResult<()> {
        self.base.transform.position = position;
        self.base.transform.rotation = rotation;
        if let Some(handle) = self.base.world_handle(world) {
            world
                .kernel_mut()
                .set_world_transform(handle, Transform::new(position, rotation))?;
        }
        Ok(())
    }

    /// Pulls the simulated pose (and rigid velocities) into the host snapshot.
    pub fn sync_from_kernel(&mut self, world: &PhysicsWorld) {
        let Some(handle) = self.base.world_handle(world) else {
            return;
        };
        let kernel = world.kernel();
        let transform = match &mut self.kind {
            BodyKind::Rigid(rigid) => {
                rigid.cache_velocities(handle, kernel);
                match rigid.motion_state() {
                    Some(motion_state) => kernel.motion_state_transform(motion_state),
                    None => kernel.world_transform(handle),
                }
            }
            _ => kernel.world_transform(handle),
        };
        match transform {
            Ok(transform) => {
                self.base.transform.position = transform.position;
                self.base.transform.rotation = transform.rotation;
            }
            Err(err) => tracing::warn!(body = %self.base.id, error = %err, "transform sync failed"),
        }
    }

    /// Writes the ids of bodies overlapping this ghost or character into `out`.
    ///
    /// Empty while the body is not in a world.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::InvariantViolation`] for other body kinds.
    pub fn overlapping_bodies(
        &self,
        world: &mut PhysicsWorld,
        out: &mut Vec<BodyId>,
    ) -> PhysicsResult<()> {
        if !matches!(self.kind, BodyKind::Ghost(_) | BodyKind::Character(_)) {
            return Err(PhysicsError::InvariantViolation(format!(
                "{} is a {} body and tracks no overlaps",
                self.base.id,
                self.kind.name()
            )));
        }
        match self.base.world_handle(world) {
            Some(ghost) => world.ghost_overlaps(ghost, out),
            None => {
                out.clear();
                Ok(())
            }
        }
    }

    /// Sets a character's per-second walk displacement.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::InvariantViolation`] for non-character bodies.
    pub fn set_walk_direction(&mut self, world: &mut PhysicsWorld, direction: Vec3) -> PhysicsResult<()> {
        match &mut self.kind {
            BodyKind::Character(character) => character.set_walk_direction(world, direction),
            other => Err(PhysicsError::InvariantViolation(format!(
                "{} is a {} body, not a character",
                self.base.id,
                other.name()
            ))),
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Builds or rebuilds the native object from the current configuration.
    ///
    /// An in-world body is removed first. The native object is rewritten in
    /// place when one exists.
    ///
    /// # Errors
    ///
    /// - [`PhysicsError::State`] if the world is not initialized
    /// - [`PhysicsError::InvariantViolation`] for non-unit scale, a missing
    ///   shape, or when removal is refused
    /// - [`PhysicsError::Kernel`] if the kernel rejects the description
    pub fn build(&mut self, world: &mut PhysicsWorld) -> PhysicsResult<NativeHandle> {
        if self.base.is_in_world() {
            self.remove_from(world)?;
        }
        world.native_world()?;

        if !self.base.transform.has_unit_scale() {
            tracing::error!(
                body = %self.base.id,
                scale = ?self.base.transform.scale,
                "physics bodies require unit scale"
            );
            return Err(PhysicsError::InvariantViolation(format!(
                "{} has non-unit scale {:?}",
                self.base.id, self.base.transform.scale
            )));
        }

        let existing = self.base.live_handle(world);
        if existing.is_none() && self.base.handle.is_some() {
            // Destroyed with a previous world
            self.base.handle = None;
            self.base.lifecycle = BodyLifecycle::NotBuilt;
        }

        let handle = self.kind.registrar().build(&self.base, existing, world)?;
        self.base.handle = Some(handle);
        if self.base.lifecycle == BodyLifecycle::NotBuilt {
            self.base.lifecycle = BodyLifecycle::Removed;
        }
        Ok(handle)
    }

    fn try_add_to(&mut self, world: &mut PhysicsWorld) -> PhysicsResult<()> {
        let handle = self.build(world)?;
        world.register_body(self.base.id, handle)?;
        if let Err(err) = self.kind.registrar().add(&self.base, handle, world) {
            world.unregister_body(self.base.id, handle);
            return Err(err);
        }
        self.base.lifecycle = BodyLifecycle::InWorld;
        Ok(())
    }
}

impl WorldRegistrar for PhysicsBody {
    fn add_to(&mut self, world: &mut PhysicsWorld) -> bool {
        if !self.base.enabled {
            tracing::debug!(body = %self.base.id, "disabled body not added");
            return false;
        }
        match self.try_add_to(world) {
            Ok(()) => {
                tracing::trace!(body = %self.base.id, kind = self.kind.name(), "body added");
                true
            }
            Err(err) => {
                tracing::error!(
                    body = %self.base.id,
                    kind = self.kind.name(),
                    error = %err,
                    "failed to add body to world"
                );
                false
            }
        }
    }

    fn remove_from(&mut self, world: &mut PhysicsWorld) -> PhysicsResult<()> {
        if !self.base.is_in_world() {
            return Ok(());
        }
        let Some(handle) = self.base.live_handle(world) else {
            self.base.handle = None;
            self.base.lifecycle = BodyLifecycle::NotBuilt;
            return Ok(());
        };

        self.kind.registrar().remove(&self.base, handle, world)?;
        world.unregister_body(self.base.id, handle);
        self.base.lifecycle = BodyLifecycle::Removed;
        tracing::trace!(body = %self.base.id, "body removed");
        Ok(())
    }

    fn dispose(&mut self, world: &mut PhysicsWorld) {
        if let Err(err) = self.remove_from(world) {
            tracing::error!(body = %self.base.id, error = %err, "body dispose aborted");
            return;
        }
        let Some(handle) = self.base.handle else {
            return;
        };
        if world.kernel().is_live(handle) {
            self.kind.registrar().release(handle, world);
            // Refused while a live constraint still holds the body; keep ownership
            if let Err(err) = world.kernel_mut().destroy(handle) {
                tracing::error!(body = %self.base.id, error = %err, "failed to destroy body, handle kept");
                return;
            }
        }
        self.base.handle = None;
        self.base.lifecycle = BodyLifecycle::NotBuilt;
        self.kind.registrar().released(world);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;
    use crate::constraint::Constraint;
    use ramjet_kernel::{ConstraintKind, WorldKind};

    fn world(kind: WorldKind) -> PhysicsWorld {
        let mut world = PhysicsWorld::with_reference_kernel(WorldConfig {
            world_kind: kind,
            ..WorldConfig::default()
        });
        world.initialize().unwrap();
        world
    }

    fn sphere() -> CollisionShape {
        CollisionShape::Sphere { radius: 0.5 }
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut world = world(WorldKind::RigidBodyDynamics);
        let mut body = PhysicsBody::rigid(BodyId(1), sphere(), Transform::IDENTITY, 1.0);
        assert_eq!(body.base().lifecycle(), BodyLifecycle::NotBuilt);
        assert!(body.as_rigid().is_some());
        assert!(PhysicsBody::collision_object(BodyId(2), sphere(), Transform::IDENTITY)
            .as_rigid()
            .is_none());

        assert!(body.add_to(&mut world));
        assert_eq!(body.base().lifecycle(), BodyLifecycle::InWorld);
        assert_eq!(world.body_handle(BodyId(1)), body.handle());

        body.remove_from(&mut world).unwrap();
        assert_eq!(body.base().lifecycle(), BodyLifecycle::Removed);
        assert_eq!(world.body_handle(BodyId(1)), None);

        body.dispose(&mut world);
        body.dispose(&mut world);
        assert_eq!(body.base().lifecycle(), BodyLifecycle::NotBuilt);
        world.dispose();
        assert_eq!(world.kernel().live_handle_count(), 0);
    }

    #[test]
    fn test_rebuild_keeps_native_handle() {
        let mut world = world(WorldKind::RigidBodyDynamics);
        let mut body = PhysicsBody::rigid(BodyId(1), sphere(), Transform::IDENTITY, 1.0);
        assert!(body.add_to(&mut world));
        let first = body.handle();

        body.set_shape(Some(CollisionShape::Sphere { radius: 2.0 }));
        assert!(body.add_to(&mut world));
        assert_eq!(body.handle(), first);
        assert!(body.is_in_world());
        world.dispose();
    }

    #[test]
    fn test_rebuild_keeps_deactivation_timer() {
        let mut world = world(WorldKind::RigidBodyDynamics);
        let mut body = PhysicsBody::rigid(BodyId(1), sphere(), Transform::IDENTITY, 1.0);
        assert!(body.add_to(&mut world));
        let handle = body.handle().unwrap();
        world.kernel_mut().set_deactivation_time(handle, 0.5).unwrap();

        assert!(body.add_to(&mut world));
        assert_eq!(body.handle(), Some(handle));
        let timer = world.kernel().deactivation_time(handle).unwrap();
        assert!((timer - 0.5).abs() < f32::EPSILON);
        world.dispose();
    }

    #[test]
    fn test_dispose_keeps_handle_while_constraint_alive() {
        let mut world = world(WorldKind::RigidBodyDynamics);
        let mut a = PhysicsBody::rigid(BodyId(1), sphere(), Transform::IDENTITY, 1.0);
        let mut b = PhysicsBody::rigid(
            BodyId(2),
            sphere(),
            Transform::from_position(Vec3::new(2.0, 0.0, 0.0)),
            1.0,
        );
        assert!(a.add_to(&mut world));
        assert!(b.add_to(&mut world));
        let mut joint = Constraint::new(
            ConstraintKind::PointToPoint {
                pivot_a: Vec3::new(1.0, 0.0, 0.0),
                pivot_b: Vec3::new(-1.0, 0.0, 0.0),
            },
            BodyId(1),
            Some(BodyId(2)),
        );
        assert!(joint.add_to(&mut world));
        joint.remove_from(&mut world).unwrap();

        // Out of the world but alive, the joint still pins body 1
        a.dispose(&mut world);
        let kept = a.handle().unwrap();
        assert!(world.kernel().is_live(kept));
        assert!(!a.is_in_world());

        joint.dispose(&mut world);
        b.dispose(&mut world);
        a.dispose(&mut world);
        assert!(a.handle().is_none());
        assert_eq!(a.base().lifecycle(), BodyLifecycle::NotBuilt);
        world.dispose();
        assert_eq!(world.kernel().live_handle_count(), 0);
    }

    #[test]
    fn test_non_unit_scale_rejected() {
        let mut world = world(WorldKind::RigidBodyDynamics);
        let transform = Transform::IDENTITY.with_scale(Vec3::splat(2.0));
        let mut body = PhysicsBody::rigid(BodyId(1), sphere(), transform, 1.0);
        assert!(matches!(
            body.build(&mut world),
            Err(PhysicsError::InvariantViolation(_))
        ));
        assert!(!body.add_to(&mut world));
        assert!(body.handle().is_none());
        world.dispose();
    }

    #[test]
    fn test_missing_shape_rejected() {
        let mut world = world(WorldKind::RigidBodyDynamics);
        let mut body = PhysicsBody::collision_object(BodyId(3), sphere(), Transform::IDENTITY);
        body.set_shape(None);
        assert!(matches!(
            body.build(&mut world),
            Err(PhysicsError::InvariantViolation(_))
        ));
        world.dispose();
    }

    #[test]
    fn test_disabled_body_not_added() {
        let mut world = world(WorldKind::RigidBodyDynamics);
        let mut body =
            PhysicsBody::rigid(BodyId(1), sphere(), Transform::IDENTITY, 1.0).with_enabled(false);
        assert!(!body.add_to(&mut world));
        assert!(body.handle().is_none());

        body.set_enabled(true);
        assert!(body.add_to(&mut world));
        world.dispose();
    }

    #[test]
    fn test_filter_fixed_once_built() {
        let mut world = world(WorldKind::RigidBodyDynamics);
        let mut body = PhysicsBody::collision_object(BodyId(2), sphere(), Transform::IDENTITY);
        body.set_collision_filter(CollisionFilterGroups::DEBRIS, CollisionFilterGroups::STATIC)
            .unwrap();
        assert!(body.add_to(&mut world));
        assert!(body
            .set_collision_filter(CollisionFilterGroups::DEFAULT, CollisionFilterGroups::ALL)
            .is_err());
        assert_eq!(body.base().group(), CollisionFilterGroups::DEBRIS);

        body.set_collision_flags(&mut world, CollisionFlags::NO_CONTACT_RESPONSE)
            .unwrap();
        let handle = body.handle().unwrap();
        assert_eq!(
            world.kernel().collision_flags(handle).unwrap(),
            CollisionFlags::NO_CONTACT_RESPONSE
        );
        world.dispose();
    }

    #[test]
    fn test_duplicate_body_id_rejected() {
        let mut world = world(WorldKind::RigidBodyDynamics);
        let mut first = PhysicsBody::collision_object(BodyId(5), sphere(), Transform::IDENTITY);
        let mut second = PhysicsBody::collision_object(BodyId(5), sphere(), Transform::IDENTITY);
        assert!(first.add_to(&mut world));
        assert!(!second.add_to(&mut world));
        assert!(!second.is_in_world());
        second.dispose(&mut world);
        world.dispose();
        assert_eq!(world.kernel().live_handle_count(), 0);
    }

    #[test]
    fn test_position_mirrored_into_kernel() {
        let mut world = world(WorldKind::RigidBodyDynamics);
        let mut body = PhysicsBody::collision_object(BodyId(1), sphere(), Transform::IDENTITY);
        assert!(body.add_to(&mut world));
        let target = Vec3::new(1.0, 2.0, 3.0);
        body.set_position_and_rotation(&mut world, target, Quaternion::IDENTITY)
            .unwrap();
        let handle = body.handle().unwrap();
        assert_eq!(world.kernel().world_transform(handle).unwrap().position, target);
        assert_eq!(body.transform().position, target);
        world.dispose();
    }

    #[test]
    fn test_body_survives_world_disposal() {
        let mut world = world(WorldKind::RigidBodyDynamics);
        let mut body = PhysicsBody::rigid(BodyId(1), sphere(), Transform::IDENTITY, 1.0);
        assert!(body.add_to(&mut world));
        world.dispose();

        // Stale handle is forgotten, the body can enter a fresh world
        world.initialize().unwrap();
        assert!(body.add_to(&mut world));
        body.dispose(&mut world);
        world.dispose();
        assert_eq!(world.kernel().live_handle_count(), 0);
    }
}
