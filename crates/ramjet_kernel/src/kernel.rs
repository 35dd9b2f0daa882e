//! # Kernel Interface
//!
//! The object-safe surface the registration layer drives.
//!
//! ## Ownership
//!
//! Every `create_*` call returns a [`NativeHandle`] the caller owns until it
//! passes it to [`Kernel::destroy`]. Objects referenced by other objects
//! (a dispatcher by its world, a body by its constraints) or still inside a
//! world refuse to be destroyed.
//!
//! ## Stepping
//!
//! [`Kernel::step_simulation`] follows fixed-step accumulator semantics:
//! - `max_sub_steps > 0`: `time_step` is accumulated and consumed in whole
//!   `fixed_time_step` chunks, at most `max_sub_steps` per call; motion
//!   states receive transforms interpolated by the leftover time.
//! - `max_sub_steps == 0`: one variable step of `time_step`.
//!
//! Internal tick callbacks run once per sub-step, the pre-tick callback
//! before integration and the post-tick callback after it.

use crate::error::KernelResult;
use crate::handle::NativeHandle;
use crate::types::{
    ActivationState, BroadphaseDesc, CharacterControllerDesc, CollisionConfigKind,
    CollisionFilterGroups, CollisionFlags, CollisionObjectDesc, ConstraintDesc, DebugDrawModes,
    PersistentManifold, RigidBodyDesc, RigidBodyProperties, SoftBodyDesc, SoftBodyWorldInfoDesc,
    WorldDesc,
};
use ramjet_shared::{Transform, Vec3};

/// Internal tick callback.
///
/// Receives the kernel itself so the callback can push forces and read
/// state mid-step, and the sub-step length in seconds.
pub type TickCallback = Box<dyn FnMut(&mut dyn Kernel, f32) + Send>;

/// A physics simulation kernel.
pub trait Kernel: Send {
    /// Implementation name for logs.
    fn name(&self) -> &'static str;

    // =========================================================================
    // World subsystems
    // =========================================================================

    /// Creates a collision configuration.
    fn create_collision_configuration(
        &mut self,
        kind: CollisionConfigKind,
    ) -> KernelResult<NativeHandle>;

    /// Creates a dispatcher bound to `configuration`.
    fn create_dispatcher(&mut self, configuration: NativeHandle) -> KernelResult<NativeHandle>;

    /// Creates a broadphase.
    fn create_broadphase(&mut self, desc: &BroadphaseDesc) -> KernelResult<NativeHandle>;

    /// Creates a sequential-impulse constraint solver.
    fn create_constraint_solver(&mut self, random_seed: u32) -> KernelResult<NativeHandle>;

    /// Creates soft-body world info.
    fn create_soft_body_world_info(
        &mut self,
        desc: &SoftBodyWorldInfoDesc,
    ) -> KernelResult<NativeHandle>;

    /// Creates a world from previously created subsystems.
    fn create_world(&mut self, desc: &WorldDesc) -> KernelResult<NativeHandle>;

    /// Sets world gravity.
    fn set_gravity(&mut self, world: NativeHandle, gravity: Vec3) -> KernelResult<()>;

    /// World gravity.
    fn gravity(&self, world: NativeHandle) -> KernelResult<Vec3>;

    /// Installs the ghost pair callback so ghost objects track overlaps.
    fn install_ghost_pair_callback(&mut self, world: NativeHandle) -> KernelResult<()>;

    /// Creates a debug drawer.
    fn create_debug_drawer(&mut self, mode: DebugDrawModes) -> KernelResult<NativeHandle>;

    /// Attaches (`Some`) or detaches (`None`) the world's debug drawer.
    fn set_debug_drawer(
        &mut self,
        world: NativeHandle,
        drawer: Option<NativeHandle>,
    ) -> KernelResult<()>;

    /// Changes what a drawer renders.
    fn set_debug_draw_mode(&mut self, drawer: NativeHandle, mode: DebugDrawModes)
        -> KernelResult<()>;

    /// What a drawer renders.
    fn debug_draw_mode(&self, drawer: NativeHandle) -> KernelResult<DebugDrawModes>;

    // =========================================================================
    // Objects
    // =========================================================================

    /// Creates a motion state holding `transform`.
    fn create_motion_state(&mut self, transform: Transform) -> KernelResult<NativeHandle>;

    /// Transform last written to a motion state.
    fn motion_state_transform(&self, motion_state: NativeHandle) -> KernelResult<Transform>;

    /// Creates a plain collision object.
    fn create_collision_object(&mut self, desc: &CollisionObjectDesc) -> KernelResult<NativeHandle>;

    /// Creates a ghost object.
    fn create_ghost_object(&mut self, desc: &CollisionObjectDesc) -> KernelResult<NativeHandle>;

    /// Creates a rigid body.
    fn create_rigid_body(&mut self, desc: &RigidBodyDesc) -> KernelResult<NativeHandle>;

    /// Creates a soft body.
    fn create_soft_body(&mut self, desc: &SoftBodyDesc) -> KernelResult<NativeHandle>;

    /// Creates a character controller action driving a ghost object.
    fn create_character_controller(
        &mut self,
        desc: &CharacterControllerDesc,
    ) -> KernelResult<NativeHandle>;

    /// Creates a constraint. Bodies learn about it when it is added to a world.
    fn create_constraint(&mut self, desc: &ConstraintDesc) -> KernelResult<NativeHandle>;

    /// Rewrites a collision or ghost object in place. Must not be in a world.
    fn configure_collision_object(
        &mut self,
        object: NativeHandle,
        desc: &CollisionObjectDesc,
    ) -> KernelResult<()>;

    /// Rewrites a rigid body in place. Must not be in a world.
    ///
    /// Deactivation time and interpolation state survive.
    fn configure_rigid_body(&mut self, body: NativeHandle, desc: &RigidBodyDesc)
        -> KernelResult<()>;

    /// Pushes material and damping parameters.
    ///
    /// Additional damping is ignored after creation.
    fn set_rigid_body_properties(
        &mut self,
        body: NativeHandle,
        properties: &RigidBodyProperties,
    ) -> KernelResult<()>;

    /// Sets mass and principal inertia.
    fn set_mass_props(&mut self, body: NativeHandle, mass: f32, local_inertia: Vec3)
        -> KernelResult<()>;

    /// Collision flags.
    fn collision_flags(&self, object: NativeHandle) -> KernelResult<CollisionFlags>;

    /// Replaces collision flags.
    fn set_collision_flags(&mut self, object: NativeHandle, flags: CollisionFlags)
        -> KernelResult<()>;

    // =========================================================================
    // World membership
    // =========================================================================

    /// Adds a collision or ghost object.
    fn add_collision_object(
        &mut self,
        world: NativeHandle,
        object: NativeHandle,
        group: CollisionFilterGroups,
        mask: CollisionFilterGroups,
    ) -> KernelResult<()>;

    /// Removes a collision or ghost object.
    fn remove_collision_object(&mut self, world: NativeHandle, object: NativeHandle)
        -> KernelResult<()>;

    /// Adds a rigid body. Requires a dynamics world.
    fn add_rigid_body(
        &mut self,
        world: NativeHandle,
        body: NativeHandle,
        group: CollisionFilterGroups,
        mask: CollisionFilterGroups,
    ) -> KernelResult<()>;

    /// Removes a rigid body. Fails while constraints reference it.
    fn remove_rigid_body(&mut self, world: NativeHandle, body: NativeHandle) -> KernelResult<()>;

    /// Adds a soft body. Requires a soft-body world.
    fn add_soft_body(
        &mut self,
        world: NativeHandle,
        body: NativeHandle,
        group: CollisionFilterGroups,
        mask: CollisionFilterGroups,
    ) -> KernelResult<()>;

    /// Removes a soft body.
    fn remove_soft_body(&mut self, world: NativeHandle, body: NativeHandle) -> KernelResult<()>;

    /// Adds an action to the dynamics loop. Requires a dynamics world.
    fn add_action(&mut self, world: NativeHandle, action: NativeHandle) -> KernelResult<()>;

    /// Removes an action.
    fn remove_action(&mut self, world: NativeHandle, action: NativeHandle) -> KernelResult<()>;

    /// Actions in the world.
    fn num_actions(&self, world: NativeHandle) -> KernelResult<usize>;

    /// Action at `index`.
    fn action_at(&self, world: NativeHandle, index: usize) -> KernelResult<NativeHandle>;

    /// Adds a constraint and registers it with its bodies.
    fn add_constraint(
        &mut self,
        world: NativeHandle,
        constraint: NativeHandle,
        disable_collisions_between_linked_bodies: bool,
    ) -> KernelResult<()>;

    /// Removes a constraint and unregisters it from its bodies.
    fn remove_constraint(&mut self, world: NativeHandle, constraint: NativeHandle)
        -> KernelResult<()>;

    /// Collision objects in the world, in insertion order.
    fn num_collision_objects(&self, world: NativeHandle) -> KernelResult<usize>;

    /// Collision object at `index`.
    fn collision_object_at(&self, world: NativeHandle, index: usize) -> KernelResult<NativeHandle>;

    /// Constraints in the world.
    fn num_constraints(&self, world: NativeHandle) -> KernelResult<usize>;

    /// Constraint at `index`.
    fn constraint_at(&self, world: NativeHandle, index: usize) -> KernelResult<NativeHandle>;

    // =========================================================================
    // Body state
    // =========================================================================

    /// Constraints currently referencing `body`.
    fn num_constraint_refs(&self, body: NativeHandle) -> KernelResult<usize>;

    /// Constraint reference at `index`.
    fn constraint_ref_at(&self, body: NativeHandle, index: usize) -> KernelResult<NativeHandle>;

    /// Drops `constraint` from `body`'s reference list without touching any world.
    fn remove_constraint_ref(&mut self, body: NativeHandle, constraint: NativeHandle)
        -> KernelResult<()>;

    /// Motion state attached to a rigid body.
    fn motion_state(&self, body: NativeHandle) -> KernelResult<Option<NativeHandle>>;

    /// Detaches and returns a rigid body's motion state.
    fn detach_motion_state(&mut self, body: NativeHandle) -> KernelResult<Option<NativeHandle>>;

    /// World transform of any collision object.
    fn world_transform(&self, object: NativeHandle) -> KernelResult<Transform>;

    /// Teleports a collision object. Updates its motion state too.
    fn set_world_transform(&mut self, object: NativeHandle, transform: Transform)
        -> KernelResult<()>;

    /// Linear velocity of a rigid body.
    fn linear_velocity(&self, body: NativeHandle) -> KernelResult<Vec3>;

    /// Sets linear velocity.
    fn set_linear_velocity(&mut self, body: NativeHandle, velocity: Vec3) -> KernelResult<()>;

    /// Angular velocity of a rigid body.
    fn angular_velocity(&self, body: NativeHandle) -> KernelResult<Vec3>;

    /// Sets angular velocity.
    fn set_angular_velocity(&mut self, body: NativeHandle, velocity: Vec3) -> KernelResult<()>;

    /// Activation state.
    fn activation_state(&self, object: NativeHandle) -> KernelResult<ActivationState>;

    /// Forces the activation state.
    fn set_activation_state(&mut self, object: NativeHandle, state: ActivationState)
        -> KernelResult<()>;

    /// Wakes a sleeping object and resets its deactivation timer.
    fn activate(&mut self, object: NativeHandle) -> KernelResult<()>;

    /// Seconds spent below the sleeping thresholds.
    fn deactivation_time(&self, object: NativeHandle) -> KernelResult<f32>;

    /// Overrides the deactivation timer.
    fn set_deactivation_time(&mut self, object: NativeHandle, seconds: f32) -> KernelResult<()>;

    /// Host value given at creation.
    fn user_index(&self, object: NativeHandle) -> KernelResult<u32>;

    /// Writes the objects overlapping a ghost into `out` (cleared first).
    fn ghost_overlaps(&self, ghost: NativeHandle, out: &mut Vec<NativeHandle>) -> KernelResult<()>;

    /// Sets the per-second displacement of a character controller.
    fn set_walk_direction(&mut self, character: NativeHandle, direction: Vec3)
        -> KernelResult<()>;

    // =========================================================================
    // Forces
    // =========================================================================

    /// Impulse through the centre of mass.
    fn apply_central_impulse(&mut self, body: NativeHandle, impulse: Vec3) -> KernelResult<()>;

    /// Impulse at `rel_pos` from the centre of mass.
    fn apply_impulse(&mut self, body: NativeHandle, impulse: Vec3, rel_pos: Vec3)
        -> KernelResult<()>;

    /// Angular impulse.
    fn apply_torque_impulse(&mut self, body: NativeHandle, torque: Vec3) -> KernelResult<()>;

    /// Force through the centre of mass, cleared after the next step call.
    fn apply_central_force(&mut self, body: NativeHandle, force: Vec3) -> KernelResult<()>;

    /// Force at `rel_pos`, cleared after the next step call.
    fn apply_force(&mut self, body: NativeHandle, force: Vec3, rel_pos: Vec3) -> KernelResult<()>;

    /// Torque, cleared after the next step call.
    fn apply_torque(&mut self, body: NativeHandle, torque: Vec3) -> KernelResult<()>;

    // =========================================================================
    // Stepping
    // =========================================================================

    /// Installs (`Some`) or clears (`None`) an internal tick callback.
    fn set_internal_tick_callback(
        &mut self,
        world: NativeHandle,
        callback: Option<TickCallback>,
        is_pre_tick: bool,
    ) -> KernelResult<()>;

    /// Advances the world. Returns the number of sub-steps performed.
    fn step_simulation(
        &mut self,
        world: NativeHandle,
        time_step: f32,
        max_sub_steps: u32,
        fixed_time_step: f32,
    ) -> KernelResult<u32>;

    /// Contact manifolds from the last sub-step.
    fn num_manifolds(&self, world: NativeHandle) -> KernelResult<usize>;

    /// Manifold at `index`.
    fn manifold_by_index_internal(
        &self,
        world: NativeHandle,
        index: usize,
    ) -> KernelResult<&PersistentManifold>;

    // =========================================================================
    // Lifetime
    // =========================================================================

    /// Frees an object.
    fn destroy(&mut self, handle: NativeHandle) -> KernelResult<()>;

    /// True if `handle` refers to a live object.
    fn is_live(&self, handle: NativeHandle) -> bool;

    /// Number of live objects of every kind.
    fn live_handle_count(&self) -> usize;
}
