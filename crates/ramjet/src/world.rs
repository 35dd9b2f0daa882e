//! # Physics World Lifecycle
//!
//! Owns one simulation world and every subsystem it was built from.
//!
//! ```text
//! initialize():                      dispose():
//! ┌──────────────────────────┐       ┌──────────────────────────────────┐
//! │ 1. collision config      │       │ 1. constraints (reverse order)   │
//! │ 2. dispatcher            │       │ 2. actions     (reverse order)   │
//! │ 3. broadphase            │       │ 3. bodies      (reverse order)   │
//! │ 4. solver      (dynamics)│       │    └─ motion state detached      │
//! │ 5. soft info   (soft)    │       │ 4. debug drawer                  │
//! │ 6. world + gravity       │       │ 5. world, broadphase, dispatcher,│
//! │ 7. debug drawer (opt.)   │       │    config, solver, soft info     │
//! └──────────────────────────┘       └──────────────────────────────────┘
//! ```
//!
//! The world also keeps the body table: which [`BodyId`] owns which native
//! object while it is in the world, plus the optional collision handler per
//! body that [`step`](PhysicsWorld::step) dispatches manifolds to.

use crate::body::BodyId;
use crate::collision::CollisionCallbackHandler;
use crate::config::WorldConfig;
use crate::error::{PhysicsError, PhysicsResult};
use ramjet_core::DenseIndexMap;
use ramjet_kernel::{
    Aabb, BroadphaseDesc, BroadphaseKind, CollisionConfigKind, DebugDrawModes, Kernel,
    KernelResult, NativeHandle, ReferenceKernel, SoftBodyWorldInfoDesc, TickCallback, WorldDesc,
    WorldKind,
};
use ramjet_shared::Vec3;

/// Native objects making up an initialized world.
#[derive(Clone, Copy, Debug)]
struct NativeWorld {
    world: NativeHandle,
    collision_configuration: NativeHandle,
    dispatcher: NativeHandle,
    broadphase: NativeHandle,
    solver: Option<NativeHandle>,
    soft_body_world_info: Option<NativeHandle>,
    debug_drawer: Option<NativeHandle>,
    ghost_pair_callback: bool,
}

/// A body currently in the world.
struct BodyRecord {
    handle: NativeHandle,
    handler: Option<Box<dyn CollisionCallbackHandler>>,
}

/// The simulation world and its subsystems.
///
/// # Lifecycle
///
/// Created empty by [`new`](Self::new), built by [`initialize`](Self::initialize),
/// torn down by [`dispose`](Self::dispose). Disposal is explicit; dropping an
/// initialized world leaks nothing on the host side but leaves the native
/// objects alive inside the kernel.
pub struct PhysicsWorld {
    /// The simulation kernel.
    kernel: Box<dyn Kernel>,
    /// Current configuration. Frozen knobs only change before initialize.
    config: WorldConfig,
    /// `Some` between initialize and dispose.
    native: Option<NativeWorld>,
    /// Bodies in the world, keyed by id.
    bodies: DenseIndexMap<BodyId, BodyRecord>,
    /// Scratch for ghost overlap queries.
    overlap_scratch: Vec<NativeHandle>,
    /// Number of `step` calls since initialize.
    frame_count: u64,
}

impl PhysicsWorld {
    /// Creates an uninitialized world driving `kernel`.
    #[must_use]
    pub fn new(kernel: Box<dyn Kernel>, config: WorldConfig) -> Self {
        let bodies = DenseIndexMap::new(config.max_bodies);
        Self {
            kernel,
            config,
            native: None,
            bodies,
            overlap_scratch: Vec::new(),
            frame_count: 0,
        }
    }

    /// Creates an uninitialized world backed by a [`ReferenceKernel`].
    #[must_use]
    pub fn with_reference_kernel(config: WorldConfig) -> Self {
        Self::new(Box::new(ReferenceKernel::new()), config)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Current configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// True between [`initialize`](Self::initialize) and [`dispose`](Self::dispose).
    #[inline]
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.native.is_some()
    }

    /// Native world handle, if initialized.
    #[inline]
    #[must_use]
    pub fn handle(&self) -> Option<NativeHandle> {
        self.native.map(|n| n.world)
    }

    /// Soft-body world info, present for initialized soft-body worlds.
    #[inline]
    #[must_use]
    pub fn soft_body_world_info(&self) -> Option<NativeHandle> {
        self.native.and_then(|n| n.soft_body_world_info)
    }

    /// Attached debug drawer.
    #[inline]
    #[must_use]
    pub fn debug_drawer(&self) -> Option<NativeHandle> {
        self.native.and_then(|n| n.debug_drawer)
    }

    /// The kernel.
    #[inline]
    #[must_use]
    pub fn kernel(&self) -> &dyn Kernel {
        self.kernel.as_ref()
    }

    /// The kernel, mutably.
    #[inline]
    pub fn kernel_mut(&mut self) -> &mut dyn Kernel {
        self.kernel.as_mut()
    }

    /// `step` calls since initialize.
    #[inline]
    #[must_use]
    pub const fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Bodies currently in the world.
    #[inline]
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Native handle of the body with `id`, if it is in the world.
    #[must_use]
    pub fn body_handle(&self, id: BodyId) -> Option<NativeHandle> {
        self.bodies.get(id).map(|record| record.handle)
    }

    /// Native world handle.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::State`] before initialize or after dispose.
    pub(crate) fn native_world(&self) -> PhysicsResult<NativeHandle> {
        self.handle()
            .ok_or(PhysicsError::State("physics world is not initialized"))
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Sets the world kind. Rejected once initialized.
    pub fn set_world_kind(&mut self, kind: WorldKind) -> bool {
        if self.reject_frozen("world_kind") {
            return false;
        }
        self.config.world_kind = kind;
        true
    }

    /// Sets the collision configuration. Rejected once initialized.
    pub fn set_collision_configuration(&mut self, kind: CollisionConfigKind) -> bool {
        if self.reject_frozen("collision_configuration") {
            return false;
        }
        self.config.collision_configuration = kind;
        true
    }

    /// Sets the broadphase. Rejected once initialized.
    pub fn set_broadphase(&mut self, kind: BroadphaseKind) -> bool {
        if self.reject_frozen("broadphase") {
            return false;
        }
        self.config.broadphase = kind;
        true
    }

    /// Sets the sweep broadphase bounds. Rejected once initialized.
    pub fn set_broadphase_bounds(&mut self, bounds: Aabb) -> bool {
        if self.reject_frozen("broadphase_bounds") {
            return false;
        }
        self.config.broadphase_bounds = bounds;
        true
    }

    fn reject_frozen(&self, knob: &'static str) -> bool {
        if self.is_initialized() {
            tracing::error!(knob, "cannot change world configuration after initialize");
            return true;
        }
        false
    }

    /// Sets the fixed sub-step used by [`step`](Self::step).
    pub fn set_fixed_time_step(&mut self, seconds: f32) {
        self.config.fixed_time_step = seconds;
    }

    /// Sets the sub-step cap used by [`step`](Self::step).
    pub fn set_max_sub_steps(&mut self, max_sub_steps: u32) {
        self.config.max_sub_steps = max_sub_steps;
    }

    /// Sets gravity, pushing it to the kernel when initialized.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::Config`] for non-finite gravity.
    pub fn set_gravity(&mut self, gravity: Vec3) -> PhysicsResult<()> {
        if !gravity.is_finite() {
            return Err(PhysicsError::Config(format!(
                "gravity {gravity:?} is not finite"
            )));
        }
        self.config.gravity = gravity;
        if let Some(native) = self.native {
            self.kernel.set_gravity(native.world, gravity)?;
        }
        Ok(())
    }

    /// Turns debug drawing on or off.
    ///
    /// Enabling on an initialized world creates and attaches a drawer;
    /// disabling detaches and destroys it.
    ///
    /// # Errors
    ///
    /// Propagates kernel failures; the flag is updated either way.
    pub fn set_debug_draw(&mut self, enabled: bool) -> PhysicsResult<()> {
        self.config.debug_draw = enabled;
        let Some(native) = self.native else {
            return Ok(());
        };

        match (enabled, native.debug_drawer) {
            (true, None) => {
                let drawer = self.kernel.create_debug_drawer(self.config.debug_draw_mode)?;
                if let Err(err) = self.kernel.set_debug_drawer(native.world, Some(drawer)) {
                    log_failure(self.kernel.destroy(drawer), "debug drawer");
                    return Err(err.into());
                }
                self.set_native_drawer(Some(drawer));
            }
            (false, Some(drawer)) => {
                self.kernel.set_debug_drawer(native.world, None)?;
                self.kernel.destroy(drawer)?;
                self.set_native_drawer(None);
            }
            _ => {}
        }
        Ok(())
    }

    /// Changes what the debug drawer renders.
    ///
    /// # Errors
    ///
    /// Propagates kernel failures when a drawer is attached.
    pub fn set_debug_draw_mode(&mut self, mode: DebugDrawModes) -> PhysicsResult<()> {
        self.config.debug_draw_mode = mode;
        if let Some(drawer) = self.debug_drawer() {
            self.kernel.set_debug_draw_mode(drawer, mode)?;
        }
        Ok(())
    }

    fn set_native_drawer(&mut self, drawer: Option<NativeHandle>) {
        if let Some(native) = self.native.as_mut() {
            native.debug_drawer = drawer;
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Builds the world from the current configuration.
    ///
    /// Objects already created are destroyed again if a later step fails.
    /// A debug drawer that cannot be created is logged and skipped.
    ///
    /// # Errors
    ///
    /// - [`PhysicsError::State`] if already initialized
    /// - [`PhysicsError::Config`] if the configuration is invalid
    /// - [`PhysicsError::Kernel`] if the kernel refuses a subsystem
    pub fn initialize(&mut self) -> PhysicsResult<()> {
        if self.is_initialized() {
            return Err(PhysicsError::State("physics world already initialized"));
        }

        self.config = self.config.clone().validated()?;
        if self.bodies.capacity() != self.config.max_bodies {
            self.bodies = DenseIndexMap::new(self.config.max_bodies);
        }

        let mut created = Vec::with_capacity(6);
        let native = match self.create_subsystems(&mut created) {
            Ok(native) => native,
            Err(err) => {
                for handle in created.into_iter().rev() {
                    log_failure(self.kernel.destroy(handle), "rollback");
                }
                tracing::error!(error = %err, "physics world initialization failed");
                return Err(err.into());
            }
        };
        self.native = Some(native);
        self.frame_count = 0;

        if self.config.debug_draw {
            if let Err(err) = self.set_debug_draw(true) {
                tracing::error!(error = %err, "debug drawer unavailable");
            }
        }

        tracing::debug!(
            kernel = self.kernel.name(),
            world_kind = ?self.config.world_kind,
            broadphase = ?self.config.broadphase,
            "physics world initialized"
        );
        Ok(())
    }

    fn create_subsystems(&mut self, created: &mut Vec<NativeHandle>) -> KernelResult<NativeWorld> {
        let config = &self.config;
        let kernel = self.kernel.as_mut();

        let collision_configuration =
            kernel.create_collision_configuration(config.collision_configuration)?;
        created.push(collision_configuration);

        let dispatcher = kernel.create_dispatcher(collision_configuration)?;
        created.push(dispatcher);

        let broadphase = kernel.create_broadphase(&BroadphaseDesc::new(
            config.broadphase,
            config.broadphase_bounds,
        ))?;
        created.push(broadphase);

        let solver = if config.world_kind.is_dynamics() {
            let solver = kernel.create_constraint_solver(config.solver_random_seed)?;
            created.push(solver);
            Some(solver)
        } else {
            None
        };

        let soft_body_world_info = if config.world_kind.supports_soft_bodies() {
            let settings = &config.soft_body;
            let info = kernel.create_soft_body_world_info(&SoftBodyWorldInfoDesc {
                air_density: settings.air_density,
                water_density: settings.water_density,
                water_offset: settings.water_offset,
                water_normal: settings.water_normal,
                gravity: config.gravity,
                dispatcher,
                broadphase,
            })?;
            created.push(info);
            Some(info)
        } else {
            None
        };

        let world = kernel.create_world(&WorldDesc {
            kind: config.world_kind,
            collision_configuration,
            dispatcher,
            broadphase,
            solver,
            soft_body_world_info,
        })?;
        created.push(world);
        kernel.set_gravity(world, config.gravity)?;

        Ok(NativeWorld {
            world,
            collision_configuration,
            dispatcher,
            broadphase,
            solver,
            soft_body_world_info,
            debug_drawer: None,
            ghost_pair_callback: false,
        })
    }

    /// Tears the world down in dependency order.
    ///
    /// Everything still inside the world is destroyed with it. Safe to call
    /// more than once and before initialize.
    pub fn dispose(&mut self) {
        let Some(native) = self.native.take() else {
            tracing::trace!("dispose on uninitialized world ignored");
            return;
        };
        let kernel = self.kernel.as_mut();
        let world = native.world;

        let constraints = kernel.num_constraints(world).unwrap_or(0);
        for index in (0..constraints).rev() {
            if let Ok(constraint) = kernel.constraint_at(world, index) {
                log_failure(kernel.remove_constraint(world, constraint), "constraint");
                log_failure(kernel.destroy(constraint), "constraint");
            }
        }

        let actions = kernel.num_actions(world).unwrap_or(0);
        for index in (0..actions).rev() {
            if let Ok(action) = kernel.action_at(world, index) {
                log_failure(kernel.remove_action(world, action), "action");
                log_failure(kernel.destroy(action), "action");
            }
        }

        let objects = kernel.num_collision_objects(world).unwrap_or(0);
        for index in (0..objects).rev() {
            let Ok(object) = kernel.collision_object_at(world, index) else {
                continue;
            };
            if kernel.num_constraint_refs(object).unwrap_or(0) > 0 {
                tracing::error!(object = %object, "body still referenced by a constraint at dispose");
            }
            // Only rigid bodies carry a motion state
            if let Ok(Some(motion_state)) = kernel.detach_motion_state(object) {
                log_failure(kernel.destroy(motion_state), "motion state");
            }
            log_failure(kernel.remove_collision_object(world, object), "body");
            log_failure(kernel.destroy(object), "body");
        }

        if let Some(drawer) = native.debug_drawer {
            log_failure(kernel.set_debug_drawer(world, None), "debug drawer");
            log_failure(kernel.destroy(drawer), "debug drawer");
        }

        log_failure(kernel.destroy(world), "world");
        log_failure(kernel.destroy(native.broadphase), "broadphase");
        log_failure(kernel.destroy(native.dispatcher), "dispatcher");
        log_failure(
            kernel.destroy(native.collision_configuration),
            "collision configuration",
        );
        if let Some(solver) = native.solver {
            log_failure(kernel.destroy(solver), "constraint solver");
        }
        if let Some(info) = native.soft_body_world_info {
            log_failure(kernel.destroy(info), "soft body world info");
        }

        self.bodies.clear();
        tracing::debug!(frames = self.frame_count, "physics world disposed");
    }

    // =========================================================================
    // Stepping
    // =========================================================================

    /// Installs (`Some`) or clears (`None`) the pre-tick callback.
    ///
    /// The kernel calls it before integrating every internal sub-step.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::State`] if the world is not initialized.
    pub fn set_pre_tick_callback(&mut self, callback: Option<TickCallback>) -> PhysicsResult<()> {
        let world = self.native_world()?;
        self.kernel.set_internal_tick_callback(world, callback, true)?;
        Ok(())
    }

    /// Installs (`Some`) or clears (`None`) the post-tick callback.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::State`] if the world is not initialized.
    pub fn set_post_tick_callback(&mut self, callback: Option<TickCallback>) -> PhysicsResult<()> {
        let world = self.native_world()?;
        self.kernel.set_internal_tick_callback(world, callback, false)?;
        Ok(())
    }

    /// Advances the simulation with explicit stepping parameters.
    ///
    /// # Returns
    ///
    /// Sub-steps performed. 0 (and a logged error) when the world is not
    /// initialized or the kernel fails.
    pub fn step_simulation(&mut self, time_step: f32, max_sub_steps: u32, fixed_time_step: f32) -> u32 {
        let Some(native) = self.native else {
            tracing::error!("step_simulation called on an uninitialized physics world");
            return 0;
        };

        let steps = match self.kernel.step_simulation(
            native.world,
            time_step,
            max_sub_steps,
            fixed_time_step,
        ) {
            Ok(steps) => steps,
            Err(err) => {
                tracing::error!(error = %err, "step_simulation failed");
                return 0;
            }
        };

        self.frame_count += 1;
        self.dispatch_collision_callbacks(native.world);
        tracing::trace!(frame = self.frame_count, steps, "physics step");
        steps
    }

    /// Advances the simulation by `time_step` using the configured sub-stepping.
    pub fn step(&mut self, time_step: f32) -> u32 {
        self.step_simulation(
            time_step,
            self.config.max_sub_steps,
            self.config.fixed_time_step,
        )
    }

    fn dispatch_collision_callbacks(&mut self, world: NativeHandle) {
        if !self.bodies.values().any(|record| record.handler.is_some()) {
            return;
        }

        let kernel = self.kernel.as_ref();
        let bodies = &mut self.bodies;
        let manifolds = kernel.num_manifolds(world).unwrap_or(0);
        for index in 0..manifolds {
            let Ok(manifold) = kernel.manifold_by_index_internal(world, index) else {
                continue;
            };
            for object in [manifold.body0, manifold.body1] {
                let Ok(user_index) = kernel.user_index(object) else {
                    continue;
                };
                let Some(record) = bodies.get_mut(BodyId(user_index)) else {
                    continue;
                };
                if record.handle != object {
                    continue;
                }
                if let Some(handler) = record.handler.as_mut() {
                    handler.on_visit_manifold(manifold);
                }
            }
        }

        for (_, record) in bodies.iter_mut() {
            if let Some(handler) = record.handler.as_mut() {
                handler.on_finished_visiting_manifolds();
            }
        }
    }

    // =========================================================================
    // Ghost objects
    // =========================================================================

    /// Installs the ghost pair callback the first time a ghost needs it.
    pub(crate) fn ensure_ghost_pair_callback(&mut self) -> PhysicsResult<()> {
        let world = self.native_world()?;
        let already = self.native.is_some_and(|n| n.ghost_pair_callback);
        if already {
            return Ok(());
        }
        self.kernel.install_ghost_pair_callback(world)?;
        if let Some(native) = self.native.as_mut() {
            native.ghost_pair_callback = true;
        }
        tracing::debug!("ghost pair callback installed");
        Ok(())
    }

    /// True once a ghost object has been added to this world.
    #[must_use]
    pub fn has_ghost_pair_callback(&self) -> bool {
        self.native.is_some_and(|n| n.ghost_pair_callback)
    }

    /// Writes the ids of bodies overlapping `ghost` into `out` (cleared first).
    ///
    /// Objects not registered through a body are skipped.
    pub(crate) fn ghost_overlaps(
        &mut self,
        ghost: NativeHandle,
        out: &mut Vec<BodyId>,
    ) -> PhysicsResult<()> {
        out.clear();
        self.kernel.ghost_overlaps(ghost, &mut self.overlap_scratch)?;
        for &object in &self.overlap_scratch {
            let Ok(user_index) = self.kernel.user_index(object) else {
                continue;
            };
            let id = BodyId(user_index);
            if self.body_handle(id) == Some(object) {
                out.push(id);
            }
        }
        Ok(())
    }

    // =========================================================================
    // Body table
    // =========================================================================

    /// Records that `id` entered the world as `handle`.
    ///
    /// # Errors
    ///
    /// - [`PhysicsError::Core`] if `id` is outside the body table
    /// - [`PhysicsError::InvariantViolation`] if another body uses `id`
    pub(crate) fn register_body(&mut self, id: BodyId, handle: NativeHandle) -> PhysicsResult<()> {
        if let Some(existing) = self.bodies.get(id) {
            if existing.handle != handle {
                return Err(PhysicsError::InvariantViolation(format!(
                    "body id {id} is already used by {}",
                    existing.handle
                )));
            }
            return Ok(());
        }
        self.bodies.insert(
            id,
            BodyRecord {
                handle,
                handler: None,
            },
        )?;
        Ok(())
    }

    /// Forgets `id` if it is still bound to `handle`. Drops its handler.
    pub(crate) fn unregister_body(&mut self, id: BodyId, handle: NativeHandle) {
        if self.body_handle(id) == Some(handle) {
            self.bodies.remove(id);
        }
    }

    /// Attaches the collision handler of a body in the world.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::InvariantViolation`] if the body is not in the
    /// world or already has a handler.
    pub fn register_collision_handler(
        &mut self,
        id: BodyId,
        handler: Box<dyn CollisionCallbackHandler>,
    ) -> PhysicsResult<()> {
        let Some(record) = self.bodies.get_mut(id) else {
            tracing::error!(body = %id, "collision handler for a body not in the world");
            return Err(PhysicsError::InvariantViolation(format!(
                "body {id} is not in the world"
            )));
        };
        if record.handler.is_some() {
            tracing::error!(body = %id, "body already has a collision handler");
            return Err(PhysicsError::InvariantViolation(format!(
                "body {id} already has a collision handler"
            )));
        }
        record.handler = Some(handler);
        Ok(())
    }

    /// Detaches and returns a body's collision handler.
    pub fn unregister_collision_handler(
        &mut self,
        id: BodyId,
    ) -> Option<Box<dyn CollisionCallbackHandler>> {
        self.bodies.get_mut(id).and_then(|record| record.handler.take())
    }
}

impl std::fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("kernel", &self.kernel.name())
            .field("world", &self.handle())
            .field("world_kind", &self.config.world_kind)
            .field("bodies", &self.bodies.len())
            .field("frame_count", &self.frame_count)
            .finish()
    }
}

fn log_failure<T>(result: KernelResult<T>, what: &'static str) {
    if let Err(err) = result {
        tracing::error!(object = what, error = %err, "teardown step failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ramjet_kernel::{CollisionObjectDesc, CollisionShape};
    use ramjet_shared::Transform;

    fn world(kind: WorldKind) -> PhysicsWorld {
        let config = WorldConfig {
            world_kind: kind,
            ..WorldConfig::default()
        };
        PhysicsWorld::with_reference_kernel(config)
    }

    #[test]
    fn test_initialize_dispose_leaves_nothing() {
        for kind in [
            WorldKind::CollisionOnly,
            WorldKind::RigidBodyDynamics,
            WorldKind::MultiBody,
            WorldKind::SoftBodyAndRigidBody,
        ] {
            let mut world = world(kind);
            world.initialize().unwrap();
            assert!(world.kernel().live_handle_count() > 0);
            world.dispose();
            assert_eq!(world.kernel().live_handle_count(), 0, "{kind:?}");
            world.dispose();
            assert!(!world.is_initialized());
        }
    }

    #[test]
    fn test_initialize_twice_is_state_error() {
        let mut world = world(WorldKind::RigidBodyDynamics);
        world.initialize().unwrap();
        assert!(matches!(world.initialize(), Err(PhysicsError::State(_))));
        world.dispose();
    }

    #[test]
    fn test_frozen_knobs_rejected_after_initialize() {
        let mut world = world(WorldKind::RigidBodyDynamics);
        assert!(world.set_broadphase(BroadphaseKind::Simple));
        world.initialize().unwrap();
        assert!(!world.set_world_kind(WorldKind::CollisionOnly));
        assert!(!world.set_broadphase(BroadphaseKind::DynamicAabb));
        assert_eq!(world.config().broadphase, BroadphaseKind::Simple);
        assert_eq!(world.config().world_kind, WorldKind::RigidBodyDynamics);
        world.dispose();
    }

    #[test]
    fn test_step_before_initialize_is_noop() {
        let mut world = world(WorldKind::RigidBodyDynamics);
        assert_eq!(world.step(1.0 / 60.0), 0);
        assert_eq!(world.frame_count(), 0);
    }

    #[test]
    fn test_debug_draw_toggle() {
        let mut world = world(WorldKind::RigidBodyDynamics);
        world.initialize().unwrap();
        let baseline = world.kernel().live_handle_count();

        world.set_debug_draw(true).unwrap();
        let drawer = world.debug_drawer().unwrap();
        assert_eq!(world.kernel().live_handle_count(), baseline + 1);

        world.set_debug_draw_mode(DebugDrawModes::AABB).unwrap();
        assert_eq!(world.kernel().debug_draw_mode(drawer).unwrap(), DebugDrawModes::AABB);

        world.set_debug_draw(false).unwrap();
        assert!(world.debug_drawer().is_none());
        assert_eq!(world.kernel().live_handle_count(), baseline);
        world.dispose();
    }

    #[test]
    fn test_dispose_destroys_leftover_bodies() {
        let mut world = world(WorldKind::RigidBodyDynamics);
        world.initialize().unwrap();
        let handle = world.handle().unwrap();

        let kernel = world.kernel_mut();
        let object = kernel
            .create_collision_object(&CollisionObjectDesc::new(
                CollisionShape::Sphere { radius: 1.0 },
                Transform::IDENTITY,
            ))
            .unwrap();
        kernel
            .add_collision_object(handle, object, Default::default(), Default::default())
            .unwrap();

        world.dispose();
        assert_eq!(world.kernel().live_handle_count(), 0);
    }

    #[test]
    fn test_initialize_rejects_bad_config() {
        let mut world = PhysicsWorld::with_reference_kernel(WorldConfig {
            fixed_time_step: 0.0,
            ..WorldConfig::default()
        });
        assert!(matches!(world.initialize(), Err(PhysicsError::Config(_))));
        assert_eq!(world.kernel().live_handle_count(), 0);
    }
}
