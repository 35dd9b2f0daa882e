//! # Reference Kernel
//!
//! Deterministic, in-process implementation of [`Kernel`].
//!
//! It tracks every object it hands out, enforces the destruction ordering a
//! native engine would crash on, and integrates bodies well enough to test
//! orchestration against:
//! - Semi-implicit Euler with gravity, damping and linear/angular factors
//! - Fixed-step accumulator with motion-state interpolation
//! - Sleeping after [`DEACTIVATION_TIME`](ramjet_shared::constants::DEACTIVATION_TIME)
//!   below the thresholds
//! - Bounding-sphere and plane overlap manifolds, filtered by group/mask
//! - Point-mass soft bodies and walk-direction character controllers
//!
//! It does not resolve contacts or solve constraints.

mod objects;
mod step;

use crate::error::{KernelError, KernelResult};
use crate::handle::NativeHandle;
use crate::kernel::{Kernel, TickCallback};
use crate::types::{
    ActivationState, BroadphaseDesc, CharacterControllerDesc, CollisionConfigKind,
    CollisionFilterGroups, CollisionFlags, CollisionObjectDesc, ConstraintDesc, DebugDrawModes,
    PersistentManifold, RigidBodyDesc, RigidBodyProperties, SoftBodyDesc, SoftBodyWorldInfoDesc,
    WorldDesc,
};
use objects::{
    BodyKind, BodyState, CharacterState, ConstraintState, DrawerState, Object, RigidState, Slot,
    SoftState, WorldState,
};
use ramjet_core::SlotAllocator;
use ramjet_shared::{Transform, Vec3};

/// In-process kernel used by tests and hosts without a native engine.
pub struct ReferenceKernel {
    /// Handle generations.
    slots: SlotAllocator,
    /// Objects by slot index.
    objects: Vec<Option<Slot>>,
    /// Reused by the step loop.
    scratch: step::Scratch,
}

impl Default for ReferenceKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReferenceKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceKernel")
            .field("live_handles", &self.slots.live_count())
            .finish_non_exhaustive()
    }
}

fn wrong_kind(handle: NativeHandle, expected: &'static str, found: &Object) -> KernelError {
    KernelError::WrongKind {
        handle,
        expected,
        found: found.kind_name(),
    }
}

fn invalid(message: impl Into<String>) -> KernelError {
    KernelError::InvalidDescription(message.into())
}

fn check_transform(transform: &Transform) -> KernelResult<()> {
    if !transform.position.is_finite() || !transform.rotation.is_finite() {
        return Err(invalid("transform is not finite"));
    }
    if !transform.has_unit_scale() {
        return Err(invalid(format!("transform scale {:?} is not unit", transform.scale)));
    }
    Ok(())
}

impl ReferenceKernel {
    /// Creates an empty kernel.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: SlotAllocator::unbounded(),
            objects: Vec::new(),
            scratch: step::Scratch::default(),
        }
    }

    // =========================================================================
    // Slot store
    // =========================================================================

    fn insert(&mut self, object: Object) -> KernelResult<NativeHandle> {
        let slot = self
            .slots
            .allocate()
            .map_err(|e| invalid(format!("handle space: {e}")))?;
        let index = slot.index() as usize;
        if self.objects.len() <= index {
            self.objects.resize_with(index + 1, || None);
        }
        tracing::trace!(handle = %slot, kind = object.kind_name(), "kernel object created");
        self.objects[index] = Some(Slot { object, refs: 0 });
        Ok(NativeHandle::from_slot(slot))
    }

    fn slot(&self, handle: NativeHandle) -> KernelResult<&Slot> {
        if !self.slots.is_live(handle.slot()) {
            return Err(KernelError::StaleHandle(handle));
        }
        self.objects
            .get(handle.index() as usize)
            .and_then(Option::as_ref)
            .ok_or(KernelError::StaleHandle(handle))
    }

    fn slot_mut(&mut self, handle: NativeHandle) -> KernelResult<&mut Slot> {
        if !self.slots.is_live(handle.slot()) {
            return Err(KernelError::StaleHandle(handle));
        }
        self.objects
            .get_mut(handle.index() as usize)
            .and_then(Option::as_mut)
            .ok_or(KernelError::StaleHandle(handle))
    }

    fn retain(&mut self, handle: NativeHandle) -> KernelResult<()> {
        self.slot_mut(handle)?.refs += 1;
        Ok(())
    }

    fn release(&mut self, handle: NativeHandle) {
        if let Ok(slot) = self.slot_mut(handle) {
            slot.refs = slot.refs.saturating_sub(1);
        }
    }

    fn expect_kind(&self, handle: NativeHandle, expected: &'static str) -> KernelResult<()> {
        let slot = self.slot(handle)?;
        if slot.object.kind_name() == expected {
            Ok(())
        } else {
            Err(wrong_kind(handle, expected, &slot.object))
        }
    }

    // =========================================================================
    // Typed access
    // =========================================================================

    fn world(&self, handle: NativeHandle) -> KernelResult<&WorldState> {
        match &self.slot(handle)?.object {
            Object::World(world) => Ok(world),
            other => Err(wrong_kind(handle, "world", other)),
        }
    }

    fn world_mut(&mut self, handle: NativeHandle) -> KernelResult<&mut WorldState> {
        match &mut self.slot_mut(handle)?.object {
            Object::World(world) => Ok(world),
            other => Err(wrong_kind(handle, "world", other)),
        }
    }

    fn body(&self, handle: NativeHandle) -> KernelResult<&BodyState> {
        match &self.slot(handle)?.object {
            Object::Body(body) => Ok(body),
            other => Err(wrong_kind(handle, "collision object", other)),
        }
    }

    fn body_mut(&mut self, handle: NativeHandle) -> KernelResult<&mut BodyState> {
        match &mut self.slot_mut(handle)?.object {
            Object::Body(body) => Ok(body),
            other => Err(wrong_kind(handle, "collision object", other)),
        }
    }

    fn body_of_kind(&self, handle: NativeHandle, kind: BodyKind) -> KernelResult<&BodyState> {
        let slot = self.slot(handle)?;
        match &slot.object {
            Object::Body(body) if body.kind == kind => Ok(body),
            other => Err(wrong_kind(handle, kind.name(), other)),
        }
    }

    fn rigid(&self, handle: NativeHandle) -> KernelResult<&RigidState> {
        let slot = self.slot(handle)?;
        match &slot.object {
            Object::Body(body) => body
                .rigid
                .as_ref()
                .ok_or_else(|| wrong_kind(handle, "rigid body", &slot.object)),
            other => Err(wrong_kind(handle, "rigid body", other)),
        }
    }

    fn rigid_mut(&mut self, handle: NativeHandle) -> KernelResult<&mut RigidState> {
        let body = self.body_mut(handle)?;
        let kind = body.kind;
        body.rigid.as_mut().ok_or(KernelError::WrongKind {
            handle,
            expected: "rigid body",
            found: kind.name(),
        })
    }

    fn character_mut(&mut self, handle: NativeHandle) -> KernelResult<&mut CharacterState> {
        match &mut self.slot_mut(handle)?.object {
            Object::Character(character) => Ok(character),
            other => Err(wrong_kind(handle, "character controller", other)),
        }
    }

    fn constraint(&self, handle: NativeHandle) -> KernelResult<&ConstraintState> {
        match &self.slot(handle)?.object {
            Object::Constraint(constraint) => Ok(constraint),
            other => Err(wrong_kind(handle, "constraint", other)),
        }
    }

    fn constraint_mut(&mut self, handle: NativeHandle) -> KernelResult<&mut ConstraintState> {
        match &mut self.slot_mut(handle)?.object {
            Object::Constraint(constraint) => Ok(constraint),
            other => Err(wrong_kind(handle, "constraint", other)),
        }
    }

    fn drawer_mut(&mut self, handle: NativeHandle) -> KernelResult<&mut DrawerState> {
        match &mut self.slot_mut(handle)?.object {
            Object::DebugDrawer(drawer) => Ok(drawer),
            other => Err(wrong_kind(handle, "debug drawer", other)),
        }
    }

    fn motion_state_transform_mut(&mut self, handle: NativeHandle) -> KernelResult<&mut Transform> {
        match &mut self.slot_mut(handle)?.object {
            Object::MotionState(transform) => Ok(transform),
            other => Err(wrong_kind(handle, "motion state", other)),
        }
    }

    // =========================================================================
    // Membership helpers
    // =========================================================================

    fn add_body_to_world(
        &mut self,
        world: NativeHandle,
        object: NativeHandle,
        group: CollisionFilterGroups,
        mask: CollisionFilterGroups,
    ) -> KernelResult<()> {
        let (broadphase, count) = {
            let state = self.world(world)?;
            (state.broadphase, state.objects.len())
        };
        if let Object::Broadphase(desc) = &self.slot(broadphase)?.object {
            if desc.kind.uses_bounds() && count >= desc.max_proxies as usize {
                return Err(invalid(format!(
                    "broadphase proxy limit {} reached",
                    desc.max_proxies
                )));
            }
        }

        let body = self.body_mut(object)?;
        if body.world.is_some() {
            return Err(KernelError::AlreadyInWorld(object));
        }
        body.world = Some(world);
        body.group = group;
        body.mask = mask;
        self.world_mut(world)?.objects.push(object);
        Ok(())
    }

    fn remove_body_from_world(&mut self, world: NativeHandle, object: NativeHandle) -> KernelResult<()> {
        let body = self.body(object)?;
        if body.world != Some(world) {
            return Err(KernelError::NotInWorld(object));
        }
        if !body.constraint_refs.is_empty() {
            return Err(KernelError::StillReferenced {
                handle: object,
                refs: body.constraint_refs.len() as u32,
            });
        }

        let state = self.world_mut(world)?;
        state.objects.retain(|h| *h != object);
        state
            .manifolds
            .retain(|m| m.body0 != object && m.body1 != object);

        let body = self.body_mut(object)?;
        body.world = None;
        body.overlaps.clear();
        Ok(())
    }

    fn collision_configuration_kind(&self, world: NativeHandle) -> KernelResult<CollisionConfigKind> {
        let configuration = self.world(world)?.collision_configuration;
        match &self.slot(configuration)?.object {
            Object::CollisionConfiguration(kind) => Ok(*kind),
            other => Err(wrong_kind(configuration, "collision configuration", other)),
        }
    }

    fn create_body(
        &mut self,
        kind: BodyKind,
        desc: &CollisionObjectDesc,
    ) -> KernelResult<NativeHandle> {
        desc.shape.validate()?;
        check_transform(&desc.transform)?;

        let mut body = BodyState::new(kind, desc.shape, desc.transform);
        body.flags = desc.flags;
        body.user_index = desc.user_index;
        self.insert(Object::Body(Box::new(body)))
    }

    fn validate_rigid_desc(&self, desc: &RigidBodyDesc) -> KernelResult<()> {
        desc.object.shape.validate()?;
        check_transform(&desc.object.transform)?;
        if !desc.mass.is_finite() || desc.mass < 0.0 {
            return Err(invalid(format!("mass {} must be finite and >= 0", desc.mass)));
        }
        if desc.mass > 0.0 && desc.object.shape.is_static_only() {
            return Err(invalid(format!(
                "{} cannot belong to a dynamic body",
                desc.object.shape.name()
            )));
        }
        if let Some(motion_state) = desc.motion_state {
            self.expect_kind(motion_state, "motion state")?;
        }
        Ok(())
    }

    fn apply_rigid_desc(body: &mut BodyState, rigid: &mut RigidState, desc: &RigidBodyDesc) {
        body.shape = desc.object.shape;
        body.transform = desc.object.transform;
        body.user_index = desc.object.user_index;
        body.flags = desc.object.flags;
        if desc.mass > 0.0 {
            body.flags.remove(CollisionFlags::STATIC_OBJECT);
        } else {
            body.flags.insert(CollisionFlags::STATIC_OBJECT);
        }
        rigid.set_mass_props(desc.mass, desc.local_inertia);
        rigid.linear_velocity = desc.linear_velocity;
        rigid.angular_velocity = desc.angular_velocity;
        let additional = rigid.properties.additional_damping;
        rigid.properties = desc.properties;
        rigid.properties.additional_damping = additional;
    }
}

impl Kernel for ReferenceKernel {
    fn name(&self) -> &'static str {
        "reference"
    }

    // =========================================================================
    // World subsystems
    // =========================================================================

    fn create_collision_configuration(
        &mut self,
        kind: CollisionConfigKind,
    ) -> KernelResult<NativeHandle> {
        self.insert(Object::CollisionConfiguration(kind))
    }

    fn create_dispatcher(&mut self, configuration: NativeHandle) -> KernelResult<NativeHandle> {
        self.expect_kind(configuration, "collision configuration")?;
        self.retain(configuration)?;
        self.insert(Object::Dispatcher { configuration })
    }

    fn create_broadphase(&mut self, desc: &BroadphaseDesc) -> KernelResult<NativeHandle> {
        if desc.kind.uses_bounds() && (!desc.bounds.is_valid() || desc.max_proxies == 0) {
            return Err(invalid(format!("sweep broadphase needs valid bounds: {desc:?}")));
        }
        self.insert(Object::Broadphase(*desc))
    }

    fn create_constraint_solver(&mut self, random_seed: u32) -> KernelResult<NativeHandle> {
        self.insert(Object::Solver { random_seed })
    }

    fn create_soft_body_world_info(
        &mut self,
        desc: &SoftBodyWorldInfoDesc,
    ) -> KernelResult<NativeHandle> {
        self.expect_kind(desc.dispatcher, "dispatcher")?;
        self.expect_kind(desc.broadphase, "broadphase")?;
        if !desc.gravity.is_finite() || !desc.air_density.is_finite() {
            return Err(invalid("soft body world info is not finite"));
        }
        self.insert(Object::SoftBodyWorldInfo(*desc))
    }

    fn create_world(&mut self, desc: &WorldDesc) -> KernelResult<NativeHandle> {
        self.expect_kind(desc.collision_configuration, "collision configuration")?;
        self.expect_kind(desc.dispatcher, "dispatcher")?;
        self.expect_kind(desc.broadphase, "broadphase")?;

        if desc.kind.is_dynamics() {
            let solver = desc
                .solver
                .ok_or_else(|| invalid(format!("{:?} world needs a solver", desc.kind)))?;
            if let Object::Solver { random_seed } = &self.slot(solver)?.object {
                tracing::trace!(solver = %solver, random_seed, "solver bound to world");
            } else {
                self.expect_kind(solver, "constraint solver")?;
            }
        }
        if desc.kind.supports_soft_bodies() {
            let info = desc
                .soft_body_world_info
                .ok_or_else(|| invalid("soft body world needs soft body world info"))?;
            self.expect_kind(info, "soft body world info")?;
        }

        let members = [
            Some(desc.collision_configuration),
            Some(desc.dispatcher),
            Some(desc.broadphase),
            desc.solver,
            desc.soft_body_world_info,
        ];
        for handle in members.into_iter().flatten() {
            self.retain(handle)?;
        }

        self.insert(Object::World(Box::new(WorldState::new(desc.kind, desc))))
    }

    fn set_gravity(&mut self, world: NativeHandle, gravity: Vec3) -> KernelResult<()> {
        if !gravity.is_finite() {
            return Err(invalid("gravity is not finite"));
        }
        self.world_mut(world)?.gravity = gravity;
        Ok(())
    }

    fn gravity(&self, world: NativeHandle) -> KernelResult<Vec3> {
        Ok(self.world(world)?.gravity)
    }

    fn install_ghost_pair_callback(&mut self, world: NativeHandle) -> KernelResult<()> {
        self.world_mut(world)?.ghost_pair_callback = true;
        Ok(())
    }

    fn create_debug_drawer(&mut self, mode: DebugDrawModes) -> KernelResult<NativeHandle> {
        self.insert(Object::DebugDrawer(DrawerState { mode, world: None }))
    }

    fn set_debug_drawer(
        &mut self,
        world: NativeHandle,
        drawer: Option<NativeHandle>,
    ) -> KernelResult<()> {
        if let Some(new) = drawer {
            let state = self.drawer_mut(new)?;
            if state.world.is_some_and(|w| w != world) {
                return Err(KernelError::AlreadyInWorld(new));
            }
        }

        let previous = self.world(world)?.debug_drawer;
        if previous == drawer {
            return Ok(());
        }
        if let Some(old) = previous {
            if let Ok(state) = self.drawer_mut(old) {
                state.world = None;
            }
            self.release(old);
        }
        if let Some(new) = drawer {
            self.drawer_mut(new)?.world = Some(world);
            self.retain(new)?;
        }
        self.world_mut(world)?.debug_drawer = drawer;
        Ok(())
    }

    fn set_debug_draw_mode(
        &mut self,
        drawer: NativeHandle,
        mode: DebugDrawModes,
    ) -> KernelResult<()> {
        self.drawer_mut(drawer)?.mode = mode;
        Ok(())
    }

    fn debug_draw_mode(&self, drawer: NativeHandle) -> KernelResult<DebugDrawModes> {
        match &self.slot(drawer)?.object {
            Object::DebugDrawer(state) => Ok(state.mode),
            other => Err(wrong_kind(drawer, "debug drawer", other)),
        }
    }

    // =========================================================================
    // Objects
    // =========================================================================

    fn create_motion_state(&mut self, transform: Transform) -> KernelResult<NativeHandle> {
        check_transform(&transform)?;
        self.insert(Object::MotionState(transform))
    }

    fn motion_state_transform(&self, motion_state: NativeHandle) -> KernelResult<Transform> {
        match &self.slot(motion_state)?.object {
            Object::MotionState(transform) => Ok(*transform),
            other => Err(wrong_kind(motion_state, "motion state", other)),
        }
    }

    fn create_collision_object(&mut self, desc: &CollisionObjectDesc) -> KernelResult<NativeHandle> {
        self.create_body(BodyKind::CollisionObject, desc)
    }

    fn create_ghost_object(&mut self, desc: &CollisionObjectDesc) -> KernelResult<NativeHandle> {
        self.create_body(BodyKind::Ghost, desc)
    }

    fn create_rigid_body(&mut self, desc: &RigidBodyDesc) -> KernelResult<NativeHandle> {
        self.validate_rigid_desc(desc)?;

        let mut body = BodyState::new(BodyKind::Rigid, desc.object.shape, desc.object.transform);
        let mut rigid = RigidState {
            inverse_mass: 0.0,
            inverse_inertia: Vec3::ZERO,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            total_force: Vec3::ZERO,
            total_torque: Vec3::ZERO,
            properties: desc.properties,
            motion_state: desc.motion_state,
            interpolation_transform: desc.object.transform,
            interpolation_linear_velocity: desc.linear_velocity,
            interpolation_angular_velocity: desc.angular_velocity,
        };
        Self::apply_rigid_desc(&mut body, &mut rigid, desc);
        body.rigid = Some(rigid);

        if let Some(motion_state) = desc.motion_state {
            self.retain(motion_state)?;
            *self.motion_state_transform_mut(motion_state)? = desc.object.transform;
        }
        self.insert(Object::Body(Box::new(body)))
    }

    fn create_soft_body(&mut self, desc: &SoftBodyDesc) -> KernelResult<NativeHandle> {
        self.expect_kind(desc.world_info, "soft body world info")?;
        check_transform(&desc.transform)?;
        if desc.nodes.is_empty() {
            return Err(invalid("soft body needs at least one node"));
        }
        if !desc.total_mass.is_finite() || desc.total_mass < 0.0 {
            return Err(invalid(format!("soft body mass {} is invalid", desc.total_mass)));
        }

        let nodes: Vec<Vec3> = desc
            .nodes
            .iter()
            .map(|n| desc.transform.transform_point(*n))
            .collect();
        let node_count = nodes.len();
        let soft = SoftState {
            world_info: desc.world_info,
            velocities: vec![Vec3::ZERO; node_count],
            inverse_node_mass: if desc.total_mass > 0.0 {
                node_count as f32 / desc.total_mass
            } else {
                0.0
            },
            nodes,
        };

        let radius = SoftState::NODE_RADIUS;
        let mut body = BodyState::new(
            BodyKind::Soft,
            crate::shape::CollisionShape::Sphere { radius },
            Transform::new(soft.centroid(), desc.transform.rotation),
        );
        body.flags = desc.flags;
        body.user_index = desc.user_index;
        body.soft = Some(soft);

        self.retain(desc.world_info)?;
        self.insert(Object::Body(Box::new(body)))
    }

    fn create_character_controller(
        &mut self,
        desc: &CharacterControllerDesc,
    ) -> KernelResult<NativeHandle> {
        self.body_of_kind(desc.ghost, BodyKind::Ghost)?;
        if !desc.step_height.is_finite() || desc.step_height < 0.0 {
            return Err(invalid(format!("step height {} is invalid", desc.step_height)));
        }
        if desc.up.length_squared() <= f32::EPSILON {
            return Err(invalid("character up vector is zero"));
        }
        self.retain(desc.ghost)?;
        self.insert(Object::Character(CharacterState {
            ghost: desc.ghost,
            walk_direction: Vec3::ZERO,
            world: None,
        }))
    }

    fn create_constraint(&mut self, desc: &ConstraintDesc) -> KernelResult<NativeHandle> {
        self.rigid(desc.body_a)?;
        if let Some(body_b) = desc.body_b {
            self.rigid(body_b)?;
            if body_b == desc.body_a {
                return Err(invalid("constraint links a body to itself"));
            }
        }
        if desc.breaking_impulse_threshold.is_nan() || desc.breaking_impulse_threshold <= 0.0 {
            return Err(invalid("breaking impulse threshold must be positive"));
        }

        self.retain(desc.body_a)?;
        if let Some(body_b) = desc.body_b {
            self.retain(body_b)?;
        }
        self.insert(Object::Constraint(ConstraintState {
            body_a: desc.body_a,
            body_b: desc.body_b,
            kind_name: desc.kind.name(),
            disable_collisions_between_linked_bodies: false,
            world: None,
        }))
    }

    fn configure_collision_object(
        &mut self,
        object: NativeHandle,
        desc: &CollisionObjectDesc,
    ) -> KernelResult<()> {
        desc.shape.validate()?;
        check_transform(&desc.transform)?;
        let body = self.body_mut(object)?;
        if !matches!(body.kind, BodyKind::CollisionObject | BodyKind::Ghost) {
            return Err(KernelError::WrongKind {
                handle: object,
                expected: "collision object",
                found: body.kind.name(),
            });
        }
        if body.world.is_some() {
            return Err(KernelError::AlreadyInWorld(object));
        }
        body.shape = desc.shape;
        body.transform = desc.transform;
        body.flags = desc.flags;
        body.user_index = desc.user_index;
        Ok(())
    }

    fn configure_rigid_body(
        &mut self,
        body: NativeHandle,
        desc: &RigidBodyDesc,
    ) -> KernelResult<()> {
        self.validate_rigid_desc(desc)?;
        if self.body(body)?.world.is_some() {
            return Err(KernelError::AlreadyInWorld(body));
        }

        let previous = self.rigid(body)?.motion_state;
        if previous != desc.motion_state {
            if let Some(new) = desc.motion_state {
                self.retain(new)?;
            }
            if let Some(old) = previous {
                self.release(old);
            }
        }
        if let Some(motion_state) = desc.motion_state {
            *self.motion_state_transform_mut(motion_state)? = desc.object.transform;
        }

        let state = self.body_mut(body)?;
        let mut rigid = state.rigid.take().ok_or(KernelError::WrongKind {
            handle: body,
            expected: "rigid body",
            found: state.kind.name(),
        })?;
        Self::apply_rigid_desc(state, &mut rigid, desc);
        rigid.motion_state = desc.motion_state;
        rigid.total_force = Vec3::ZERO;
        rigid.total_torque = Vec3::ZERO;
        state.rigid = Some(rigid);
        Ok(())
    }

    fn set_rigid_body_properties(
        &mut self,
        body: NativeHandle,
        properties: &RigidBodyProperties,
    ) -> KernelResult<()> {
        let rigid = self.rigid_mut(body)?;
        let additional = rigid.properties.additional_damping;
        rigid.properties = *properties;
        rigid.properties.additional_damping = additional;
        Ok(())
    }

    fn set_mass_props(
        &mut self,
        body: NativeHandle,
        mass: f32,
        local_inertia: Vec3,
    ) -> KernelResult<()> {
        if !mass.is_finite() || mass < 0.0 || !local_inertia.is_finite() {
            return Err(invalid(format!("mass {mass} / inertia {local_inertia:?} invalid")));
        }
        self.rigid(body)?;
        let state = self.body_mut(body)?;
        if mass > 0.0 && state.shape.is_static_only() {
            return Err(invalid("static-only shape cannot take mass"));
        }
        if mass > 0.0 {
            state.flags.remove(CollisionFlags::STATIC_OBJECT);
        } else {
            state.flags.insert(CollisionFlags::STATIC_OBJECT);
        }
        self.rigid_mut(body)?.set_mass_props(mass, local_inertia);
        Ok(())
    }

    fn collision_flags(&self, object: NativeHandle) -> KernelResult<CollisionFlags> {
        Ok(self.body(object)?.flags)
    }

    fn set_collision_flags(
        &mut self,
        object: NativeHandle,
        flags: CollisionFlags,
    ) -> KernelResult<()> {
        self.body_mut(object)?.flags = flags;
        Ok(())
    }

    // =========================================================================
    // World membership
    // =========================================================================

    fn add_collision_object(
        &mut self,
        world: NativeHandle,
        object: NativeHandle,
        group: CollisionFilterGroups,
        mask: CollisionFilterGroups,
    ) -> KernelResult<()> {
        let kind = self.body(object)?.kind;
        if !matches!(kind, BodyKind::CollisionObject | BodyKind::Ghost) {
            return Err(KernelError::WrongKind {
                handle: object,
                expected: "collision object",
                found: kind.name(),
            });
        }
        self.add_body_to_world(world, object, group, mask)
    }

    fn remove_collision_object(
        &mut self,
        world: NativeHandle,
        object: NativeHandle,
    ) -> KernelResult<()> {
        self.remove_body_from_world(world, object)
    }

    fn add_rigid_body(
        &mut self,
        world: NativeHandle,
        body: NativeHandle,
        group: CollisionFilterGroups,
        mask: CollisionFilterGroups,
    ) -> KernelResult<()> {
        let kind = self.world(world)?.kind;
        if !kind.is_dynamics() {
            return Err(KernelError::Unsupported {
                operation: "add_rigid_body",
                kind,
            });
        }
        self.body_of_kind(body, BodyKind::Rigid)?;
        self.add_body_to_world(world, body, group, mask)
    }

    fn remove_rigid_body(&mut self, world: NativeHandle, body: NativeHandle) -> KernelResult<()> {
        self.body_of_kind(body, BodyKind::Rigid)?;
        self.remove_body_from_world(world, body)
    }

    fn add_soft_body(
        &mut self,
        world: NativeHandle,
        body: NativeHandle,
        group: CollisionFilterGroups,
        mask: CollisionFilterGroups,
    ) -> KernelResult<()> {
        let kind = self.world(world)?.kind;
        if !kind.supports_soft_bodies()
            || self.collision_configuration_kind(world)? != CollisionConfigKind::SoftBodyRigidBody
        {
            return Err(KernelError::Unsupported {
                operation: "add_soft_body",
                kind,
            });
        }
        self.body_of_kind(body, BodyKind::Soft)?;
        self.add_body_to_world(world, body, group, mask)
    }

    fn remove_soft_body(&mut self, world: NativeHandle, body: NativeHandle) -> KernelResult<()> {
        self.body_of_kind(body, BodyKind::Soft)?;
        self.remove_body_from_world(world, body)
    }

    fn add_action(&mut self, world: NativeHandle, action: NativeHandle) -> KernelResult<()> {
        let kind = self.world(world)?.kind;
        if !kind.is_dynamics() {
            return Err(KernelError::Unsupported {
                operation: "add_action",
                kind,
            });
        }
        let character = self.character_mut(action)?;
        if character.world.is_some() {
            return Err(KernelError::AlreadyInWorld(action));
        }
        character.world = Some(world);
        self.world_mut(world)?.actions.push(action);
        Ok(())
    }

    fn remove_action(&mut self, world: NativeHandle, action: NativeHandle) -> KernelResult<()> {
        let character = self.character_mut(action)?;
        if character.world != Some(world) {
            return Err(KernelError::NotInWorld(action));
        }
        character.world = None;
        self.world_mut(world)?.actions.retain(|h| *h != action);
        Ok(())
    }

    fn num_actions(&self, world: NativeHandle) -> KernelResult<usize> {
        Ok(self.world(world)?.actions.len())
    }

    fn action_at(&self, world: NativeHandle, index: usize) -> KernelResult<NativeHandle> {
        let actions = &self.world(world)?.actions;
        actions.get(index).copied().ok_or(KernelError::IndexOutOfRange {
            index,
            len: actions.len(),
        })
    }

    fn add_constraint(
        &mut self,
        world: NativeHandle,
        constraint: NativeHandle,
        disable_collisions_between_linked_bodies: bool,
    ) -> KernelResult<()> {
        let kind = self.world(world)?.kind;
        if !kind.is_dynamics() {
            return Err(KernelError::Unsupported {
                operation: "add_constraint",
                kind,
            });
        }
        let state = self.constraint_mut(constraint)?;
        if state.world.is_some() {
            return Err(KernelError::AlreadyInWorld(constraint));
        }
        state.world = Some(world);
        state.disable_collisions_between_linked_bodies = disable_collisions_between_linked_bodies;
        let (body_a, body_b, kind_name) = (state.body_a, state.body_b, state.kind_name);

        for body in std::iter::once(body_a).chain(body_b) {
            self.body_mut(body)?.constraint_refs.push(constraint);
        }
        self.world_mut(world)?.constraints.push(constraint);
        tracing::trace!(constraint = %constraint, kind = kind_name, "constraint added");
        Ok(())
    }

    fn remove_constraint(
        &mut self,
        world: NativeHandle,
        constraint: NativeHandle,
    ) -> KernelResult<()> {
        let state = self.constraint_mut(constraint)?;
        if state.world != Some(world) {
            return Err(KernelError::NotInWorld(constraint));
        }
        state.world = None;
        let (body_a, body_b) = (state.body_a, state.body_b);

        for body in std::iter::once(body_a).chain(body_b) {
            if let Ok(state) = self.body_mut(body) {
                state.constraint_refs.retain(|c| *c != constraint);
            }
        }
        self.world_mut(world)?.constraints.retain(|c| *c != constraint);
        Ok(())
    }

    fn num_collision_objects(&self, world: NativeHandle) -> KernelResult<usize> {
        Ok(self.world(world)?.objects.len())
    }

    fn collision_object_at(&self, world: NativeHandle, index: usize) -> KernelResult<NativeHandle> {
        let objects = &self.world(world)?.objects;
        objects.get(index).copied().ok_or(KernelError::IndexOutOfRange {
            index,
            len: objects.len(),
        })
    }

    fn num_constraints(&self, world: NativeHandle) -> KernelResult<usize> {
        Ok(self.world(world)?.constraints.len())
    }

    fn constraint_at(&self, world: NativeHandle, index: usize) -> KernelResult<NativeHandle> {
        let constraints = &self.world(world)?.constraints;
        constraints.get(index).copied().ok_or(KernelError::IndexOutOfRange {
            index,
            len: constraints.len(),
        })
    }

    // =========================================================================
    // Body state
    // =========================================================================

    fn num_constraint_refs(&self, body: NativeHandle) -> KernelResult<usize> {
        Ok(self.body(body)?.constraint_refs.len())
    }

    fn constraint_ref_at(&self, body: NativeHandle, index: usize) -> KernelResult<NativeHandle> {
        let refs = &self.body(body)?.constraint_refs;
        refs.get(index).copied().ok_or(KernelError::IndexOutOfRange {
            index,
            len: refs.len(),
        })
    }

    fn remove_constraint_ref(
        &mut self,
        body: NativeHandle,
        constraint: NativeHandle,
    ) -> KernelResult<()> {
        self.body_mut(body)?.constraint_refs.retain(|c| *c != constraint);
        Ok(())
    }

    fn motion_state(&self, body: NativeHandle) -> KernelResult<Option<NativeHandle>> {
        Ok(self.rigid(body)?.motion_state)
    }

    fn detach_motion_state(&mut self, body: NativeHandle) -> KernelResult<Option<NativeHandle>> {
        let detached = self.rigid_mut(body)?.motion_state.take();
        if let Some(motion_state) = detached {
            self.release(motion_state);
        }
        Ok(detached)
    }

    fn world_transform(&self, object: NativeHandle) -> KernelResult<Transform> {
        Ok(self.body(object)?.transform)
    }

    fn set_world_transform(
        &mut self,
        object: NativeHandle,
        transform: Transform,
    ) -> KernelResult<()> {
        check_transform(&transform)?;
        let body = self.body_mut(object)?;
        let delta = transform.position - body.transform.position;
        body.transform = transform;
        if let Some(soft) = body.soft.as_mut() {
            for node in &mut soft.nodes {
                *node += delta;
            }
        }
        let motion_state = match body.rigid.as_mut() {
            Some(rigid) => {
                rigid.interpolation_transform = transform;
                rigid.motion_state
            }
            None => None,
        };
        if let Some(motion_state) = motion_state {
            *self.motion_state_transform_mut(motion_state)? = transform;
        }
        Ok(())
    }

    fn linear_velocity(&self, body: NativeHandle) -> KernelResult<Vec3> {
        Ok(self.rigid(body)?.linear_velocity)
    }

    fn set_linear_velocity(&mut self, body: NativeHandle, velocity: Vec3) -> KernelResult<()> {
        self.rigid_mut(body)?.linear_velocity = velocity;
        Ok(())
    }

    fn angular_velocity(&self, body: NativeHandle) -> KernelResult<Vec3> {
        Ok(self.rigid(body)?.angular_velocity)
    }

    fn set_angular_velocity(&mut self, body: NativeHandle, velocity: Vec3) -> KernelResult<()> {
        self.rigid_mut(body)?.angular_velocity = velocity;
        Ok(())
    }

    fn activation_state(&self, object: NativeHandle) -> KernelResult<ActivationState> {
        Ok(self.body(object)?.activation)
    }

    fn set_activation_state(
        &mut self,
        object: NativeHandle,
        state: ActivationState,
    ) -> KernelResult<()> {
        self.body_mut(object)?.activation = state;
        Ok(())
    }

    fn activate(&mut self, object: NativeHandle) -> KernelResult<()> {
        let body = self.body_mut(object)?;
        if matches!(
            body.activation,
            ActivationState::IslandSleeping | ActivationState::WantsDeactivation
        ) {
            body.activation = ActivationState::Active;
        }
        body.deactivation_time = 0.0;
        Ok(())
    }

    fn deactivation_time(&self, object: NativeHandle) -> KernelResult<f32> {
        Ok(self.body(object)?.deactivation_time)
    }

    fn set_deactivation_time(&mut self, object: NativeHandle, seconds: f32) -> KernelResult<()> {
        self.body_mut(object)?.deactivation_time = seconds;
        Ok(())
    }

    fn user_index(&self, object: NativeHandle) -> KernelResult<u32> {
        Ok(self.body(object)?.user_index)
    }

    fn ghost_overlaps(&self, ghost: NativeHandle, out: &mut Vec<NativeHandle>) -> KernelResult<()> {
        let body = self.body_of_kind(ghost, BodyKind::Ghost)?;
        out.clear();
        out.extend_from_slice(&body.overlaps);
        Ok(())
    }

    fn set_walk_direction(
        &mut self,
        character: NativeHandle,
        direction: Vec3,
    ) -> KernelResult<()> {
        if !direction.is_finite() {
            return Err(invalid("walk direction is not finite"));
        }
        self.character_mut(character)?.walk_direction = direction;
        Ok(())
    }

    // =========================================================================
    // Forces
    // =========================================================================

    fn apply_central_impulse(&mut self, body: NativeHandle, impulse: Vec3) -> KernelResult<()> {
        let rigid = self.rigid_mut(body)?;
        let factor = rigid.properties.linear_factor;
        rigid.linear_velocity += impulse.mul_elem(factor) * rigid.inverse_mass;
        Ok(())
    }

    fn apply_impulse(
        &mut self,
        body: NativeHandle,
        impulse: Vec3,
        rel_pos: Vec3,
    ) -> KernelResult<()> {
        self.apply_central_impulse(body, impulse)?;
        let factor = self.rigid(body)?.properties.linear_factor;
        self.apply_torque_impulse(body, rel_pos.cross(impulse.mul_elem(factor)))
    }

    fn apply_torque_impulse(&mut self, body: NativeHandle, torque: Vec3) -> KernelResult<()> {
        let rigid = self.rigid_mut(body)?;
        let factor = rigid.properties.angular_factor;
        rigid.angular_velocity += rigid.inverse_inertia.mul_elem(torque).mul_elem(factor);
        Ok(())
    }

    fn apply_central_force(&mut self, body: NativeHandle, force: Vec3) -> KernelResult<()> {
        let rigid = self.rigid_mut(body)?;
        rigid.total_force += force.mul_elem(rigid.properties.linear_factor);
        Ok(())
    }

    fn apply_force(&mut self, body: NativeHandle, force: Vec3, rel_pos: Vec3) -> KernelResult<()> {
        self.apply_central_force(body, force)?;
        let factor = self.rigid(body)?.properties.linear_factor;
        self.apply_torque(body, rel_pos.cross(force.mul_elem(factor)))
    }

    fn apply_torque(&mut self, body: NativeHandle, torque: Vec3) -> KernelResult<()> {
        let rigid = self.rigid_mut(body)?;
        rigid.total_torque += torque.mul_elem(rigid.properties.angular_factor);
        Ok(())
    }

    // =========================================================================
    // Stepping
    // =========================================================================

    fn set_internal_tick_callback(
        &mut self,
        world: NativeHandle,
        callback: Option<TickCallback>,
        is_pre_tick: bool,
    ) -> KernelResult<()> {
        let state = self.world_mut(world)?;
        if !state.kind.is_dynamics() {
            return Err(KernelError::Unsupported {
                operation: "set_internal_tick_callback",
                kind: state.kind,
            });
        }
        let slot = state.tick_slot(is_pre_tick);
        slot.callback = callback;
        slot.epoch += 1;
        Ok(())
    }

    fn step_simulation(
        &mut self,
        world: NativeHandle,
        time_step: f32,
        max_sub_steps: u32,
        fixed_time_step: f32,
    ) -> KernelResult<u32> {
        if !time_step.is_finite() || time_step < 0.0 {
            return Err(invalid(format!("time step {time_step} is invalid")));
        }
        if max_sub_steps > 0 && !(fixed_time_step.is_finite() && fixed_time_step > 0.0) {
            return Err(invalid(format!("fixed time step {fixed_time_step} is invalid")));
        }
        self.step_world(world, time_step, max_sub_steps, fixed_time_step)
    }

    fn num_manifolds(&self, world: NativeHandle) -> KernelResult<usize> {
        Ok(self.world(world)?.manifolds.len())
    }

    fn manifold_by_index_internal(
        &self,
        world: NativeHandle,
        index: usize,
    ) -> KernelResult<&PersistentManifold> {
        let manifolds = &self.world(world)?.manifolds;
        manifolds.get(index).ok_or(KernelError::IndexOutOfRange {
            index,
            len: manifolds.len(),
        })
    }

    // =========================================================================
    // Lifetime
    // =========================================================================

    fn destroy(&mut self, handle: NativeHandle) -> KernelResult<()> {
        let slot = self.slot(handle)?;
        let memberships = match &slot.object {
            Object::World(world) => world.member_count() as u32,
            Object::Body(body) => u32::from(body.world.is_some()),
            Object::Character(character) => u32::from(character.world.is_some()),
            Object::Constraint(constraint) => u32::from(constraint.world.is_some()),
            _ => 0,
        };
        let refs = slot.refs + memberships;
        if refs > 0 {
            return Err(KernelError::StillReferenced { handle, refs });
        }

        let Some(slot) = self
            .objects
            .get_mut(handle.index() as usize)
            .and_then(Option::take)
        else {
            return Err(KernelError::StaleHandle(handle));
        };
        self.slots.free(handle.slot());
        tracing::trace!(handle = %handle, kind = slot.object.kind_name(), "kernel object destroyed");

        match slot.object {
            Object::Dispatcher { configuration } => self.release(configuration),
            Object::World(world) => {
                let members = [
                    Some(world.collision_configuration),
                    Some(world.dispatcher),
                    Some(world.broadphase),
                    world.solver,
                    world.soft_body_world_info,
                    world.debug_drawer,
                ];
                for member in members.into_iter().flatten() {
                    self.release(member);
                }
                if let Some(drawer) = world.debug_drawer {
                    if let Ok(state) = self.drawer_mut(drawer) {
                        state.world = None;
                    }
                }
            }
            Object::Body(body) => {
                if let Some(motion_state) = body.rigid.and_then(|r| r.motion_state) {
                    self.release(motion_state);
                }
                if let Some(soft) = body.soft {
                    self.release(soft.world_info);
                }
            }
            Object::Character(character) => self.release(character.ghost),
            Object::Constraint(constraint) => {
                self.release(constraint.body_a);
                if let Some(body_b) = constraint.body_b {
                    self.release(body_b);
                }
            }
            Object::CollisionConfiguration(_)
            | Object::Broadphase(_)
            | Object::Solver { .. }
            | Object::SoftBodyWorldInfo(_)
            | Object::DebugDrawer(_)
            | Object::MotionState(_) => {}
        }
        Ok(())
    }

    fn is_live(&self, handle: NativeHandle) -> bool {
        self.slot(handle).is_ok()
    }

    fn live_handle_count(&self) -> usize {
        self.slots.live_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::CollisionShape;
    use crate::types::{Aabb, BroadphaseKind, ConstraintKind, WorldKind};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct Fixture {
        kernel: ReferenceKernel,
        world: NativeHandle,
        subsystems: Vec<NativeHandle>,
    }

    fn fixture(kind: WorldKind) -> Fixture {
        let mut kernel = ReferenceKernel::new();
        let config_kind = if kind.supports_soft_bodies() {
            CollisionConfigKind::SoftBodyRigidBody
        } else {
            CollisionConfigKind::Default
        };
        let config = kernel.create_collision_configuration(config_kind).unwrap();
        let dispatcher = kernel.create_dispatcher(config).unwrap();
        let broadphase = kernel
            .create_broadphase(&BroadphaseDesc::new(BroadphaseKind::DynamicAabb, Aabb::default()))
            .unwrap();
        let solver = kind
            .is_dynamics()
            .then(|| kernel.create_constraint_solver(12_345).unwrap());
        let info = kind.supports_soft_bodies().then(|| {
            kernel
                .create_soft_body_world_info(&SoftBodyWorldInfoDesc {
                    air_density: 1.2,
                    water_density: 0.0,
                    water_offset: 0.0,
                    water_normal: Vec3::ZERO,
                    gravity: Vec3::new(0.0, -9.8, 0.0),
                    dispatcher,
                    broadphase,
                })
                .unwrap()
        });
        let world = kernel
            .create_world(&WorldDesc {
                kind,
                collision_configuration: config,
                dispatcher,
                broadphase,
                solver,
                soft_body_world_info: info,
            })
            .unwrap();
        kernel.set_gravity(world, Vec3::new(0.0, -9.8, 0.0)).unwrap();

        let mut subsystems = vec![broadphase, dispatcher, config];
        subsystems.extend(solver);
        subsystems.extend(info);
        Fixture {
            kernel,
            world,
            subsystems,
        }
    }

    fn sphere_body(kernel: &mut ReferenceKernel, mass: f32, position: Vec3) -> NativeHandle {
        let shape = CollisionShape::Sphere { radius: 0.5 };
        kernel
            .create_rigid_body(&RigidBodyDesc {
                object: CollisionObjectDesc::new(shape, Transform::from_position(position)),
                mass,
                local_inertia: shape.calculate_local_inertia(mass),
                motion_state: None,
                linear_velocity: Vec3::ZERO,
                angular_velocity: Vec3::ZERO,
                properties: RigidBodyProperties::default(),
            })
            .unwrap()
    }

    #[test]
    fn test_teardown_order_enforced() {
        let Fixture {
            mut kernel,
            world,
            subsystems,
        } = fixture(WorldKind::RigidBodyDynamics);

        // Dispatcher is held by the world
        assert!(matches!(
            kernel.destroy(subsystems[1]),
            Err(KernelError::StillReferenced { .. })
        ));

        kernel.destroy(world).unwrap();
        for handle in subsystems {
            kernel.destroy(handle).unwrap();
        }
        assert_eq!(kernel.live_handle_count(), 0);
    }

    #[test]
    fn test_body_in_world_cannot_be_destroyed() {
        let mut f = fixture(WorldKind::RigidBodyDynamics);
        let body = sphere_body(&mut f.kernel, 1.0, Vec3::ZERO);
        f.kernel
            .add_rigid_body(f.world, body, CollisionFilterGroups::DEFAULT, CollisionFilterGroups::ALL)
            .unwrap();

        assert!(f.kernel.destroy(body).is_err());
        assert!(f.kernel.destroy(f.world).is_err());

        f.kernel.remove_rigid_body(f.world, body).unwrap();
        f.kernel.destroy(body).unwrap();
        assert!(!f.kernel.is_live(body));
        assert_eq!(f.kernel.destroy(body), Err(KernelError::StaleHandle(body)));
    }

    #[test]
    fn test_constraint_refs_block_body_removal() {
        let mut f = fixture(WorldKind::RigidBodyDynamics);
        let a = sphere_body(&mut f.kernel, 1.0, Vec3::ZERO);
        let b = sphere_body(&mut f.kernel, 1.0, Vec3::new(0.0, 2.0, 0.0));
        for body in [a, b] {
            f.kernel
                .add_rigid_body(f.world, body, CollisionFilterGroups::DEFAULT, CollisionFilterGroups::ALL)
                .unwrap();
        }
        let joint = f
            .kernel
            .create_constraint(&ConstraintDesc {
                kind: ConstraintKind::PointToPoint {
                    pivot_a: Vec3::new(0.0, 1.0, 0.0),
                    pivot_b: Vec3::new(0.0, -1.0, 0.0),
                },
                body_a: a,
                body_b: Some(b),
                breaking_impulse_threshold: f32::INFINITY,
            })
            .unwrap();
        f.kernel.add_constraint(f.world, joint, true).unwrap();
        assert_eq!(f.kernel.num_constraint_refs(a).unwrap(), 1);

        assert!(matches!(
            f.kernel.remove_rigid_body(f.world, a),
            Err(KernelError::StillReferenced { .. })
        ));

        f.kernel.remove_constraint(f.world, joint).unwrap();
        assert_eq!(f.kernel.num_constraint_refs(a).unwrap(), 0);
        f.kernel.remove_rigid_body(f.world, a).unwrap();
    }

    #[test]
    fn test_fixed_step_accumulator() {
        let mut f = fixture(WorldKind::RigidBodyDynamics);
        let fixed = 1.0 / 60.0;

        // Half a step: nothing happens yet
        assert_eq!(f.kernel.step_simulation(f.world, fixed * 0.5, 3, fixed).unwrap(), 0);
        // Completes the first step
        assert_eq!(f.kernel.step_simulation(f.world, fixed * 0.5, 3, fixed).unwrap(), 1);
        // Ten steps requested, clamped to three
        assert_eq!(f.kernel.step_simulation(f.world, fixed * 10.0, 3, fixed).unwrap(), 3);
    }

    #[test]
    fn test_pre_tick_runs_once_per_sub_step() {
        let mut f = fixture(WorldKind::RigidBodyDynamics);
        let calls = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&calls);
        f.kernel
            .set_internal_tick_callback(
                f.world,
                Some(Box::new(move |_kernel: &mut dyn Kernel, _dt: f32| {
                    seen.fetch_add(1, Ordering::SeqCst);
                })),
                true,
            )
            .unwrap();

        let fixed = 1.0 / 60.0;
        let steps = f.kernel.step_simulation(f.world, fixed * 2.0, 3, fixed).unwrap();
        assert_eq!(steps, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_collision_only_world_rejects_dynamics() {
        let mut f = fixture(WorldKind::CollisionOnly);
        let body = sphere_body(&mut f.kernel, 1.0, Vec3::ZERO);
        assert!(matches!(
            f.kernel.add_rigid_body(
                f.world,
                body,
                CollisionFilterGroups::DEFAULT,
                CollisionFilterGroups::ALL
            ),
            Err(KernelError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_overlapping_spheres_produce_manifold() {
        let mut f = fixture(WorldKind::RigidBodyDynamics);
        f.kernel.set_gravity(f.world, Vec3::ZERO).unwrap();
        let a = sphere_body(&mut f.kernel, 1.0, Vec3::ZERO);
        let b = sphere_body(&mut f.kernel, 1.0, Vec3::new(0.8, 0.0, 0.0));
        let far = sphere_body(&mut f.kernel, 1.0, Vec3::new(10.0, 0.0, 0.0));
        for body in [a, b, far] {
            f.kernel
                .add_rigid_body(f.world, body, CollisionFilterGroups::DEFAULT, CollisionFilterGroups::ALL)
                .unwrap();
        }

        f.kernel.step_simulation(f.world, 1.0 / 60.0, 1, 1.0 / 60.0).unwrap();
        assert_eq!(f.kernel.num_manifolds(f.world).unwrap(), 1);
        let manifold = f.kernel.manifold_by_index_internal(f.world, 0).unwrap();
        assert_eq!((manifold.body0, manifold.body1), (a, b));
        assert!(manifold.contacts[0].distance < 0.0);
    }

    #[test]
    fn test_motion_state_receives_transform() {
        let mut f = fixture(WorldKind::RigidBodyDynamics);
        let motion_state = f.kernel.create_motion_state(Transform::IDENTITY).unwrap();
        let shape = CollisionShape::Sphere { radius: 0.5 };
        let body = f
            .kernel
            .create_rigid_body(&RigidBodyDesc {
                object: CollisionObjectDesc::new(shape, Transform::from_position(Vec3::Y)),
                mass: 1.0,
                local_inertia: shape.calculate_local_inertia(1.0),
                motion_state: Some(motion_state),
                linear_velocity: Vec3::ZERO,
                angular_velocity: Vec3::ZERO,
                properties: RigidBodyProperties::default(),
            })
            .unwrap();
        f.kernel
            .add_rigid_body(f.world, body, CollisionFilterGroups::DEFAULT, CollisionFilterGroups::ALL)
            .unwrap();

        let fixed = 1.0 / 60.0;
        f.kernel.step_simulation(f.world, fixed, 1, fixed).unwrap();
        let synced = f.kernel.motion_state_transform(motion_state).unwrap();
        assert!(synced.position.y < 1.0);

        // Motion state is retained by the body
        assert!(f.kernel.destroy(motion_state).is_err());
        assert_eq!(f.kernel.detach_motion_state(body).unwrap(), Some(motion_state));
        f.kernel.destroy(motion_state).unwrap();
    }
}
