//! # World Entry Registry
//!
//! Batch registration of [`SceneObject`]s with a [`PhysicsWorld`] and the
//! pre-tick hook that drives their behaviours.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     WorldEntryRegistry                       │
//! │                                                              │
//! │  add_objects(batch)                                          │
//! │    ├─ capacity check (all or nothing)                        │
//! │    ├─ pool.take() + slot per object, discover components     │
//! │    ├─ phase 1: every body of the batch      → world          │
//! │    └─ phase 2: every constraint of the batch → world         │
//! │                                                              │
//! │  remove_objects(handles)                                     │
//! │    ├─ phase 1: constraints out                               │
//! │    ├─ phase 2: bodies out                                    │
//! │    └─ entry.reset() → pool                                   │
//! │                                                              │
//! │  pre-tick (kernel, once per sub-step)                        │
//! │    └─ schedule (priority desc, newest tie first)             │
//! │         └─ behaviour.physics_update(dt, ctx)                 │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The registry state sits behind a shared lock because the kernel owns the
//! pre-tick closure. The lock is never held across a world step.

use crate::behaviour::{ExecutionOrder, TickContext};
use crate::body::{BodyId, WorldRegistrar};
use crate::config::RegistryConfig;
use crate::error::{PhysicsError, PhysicsResult};
use crate::scene::{Component, ObjectId, SceneObject};
use crate::world::PhysicsWorld;
use parking_lot::Mutex;
use ramjet_core::{DenseIndexMap, ObjectPool, PoolStats, Poolable, SlotAllocator, SlotId};
use ramjet_kernel::{Kernel, NativeHandle};
use std::sync::Arc;

/// Opaque handle to a registered object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntryHandle(SlotId);

impl EntryHandle {
    /// Slot id backing this handle.
    #[inline]
    #[must_use]
    pub const fn slot(self) -> SlotId {
        self.0
    }

    /// Unregisters the object (constraints, then bodies) and returns it.
    ///
    /// # Errors
    ///
    /// As [`WorldEntryRegistry::remove_object`].
    pub fn dispose(
        self,
        registry: &WorldEntryRegistry,
        world: &mut PhysicsWorld,
    ) -> PhysicsResult<SceneObject> {
        registry.remove_object(world, self)
    }
}

/// Registry-owned record of one registered object.
#[derive(Debug, Default)]
struct WorldEntry {
    handle: SlotId,
    object: Option<SceneObject>,
    /// Component indices of bodies, declaration order.
    bodies: Vec<usize>,
    /// Component indices of constraints, declaration order.
    constraints: Vec<usize>,
    /// Component indices of behaviours, execution order.
    behaviours: Vec<usize>,
}

impl Poolable for WorldEntry {
    fn reset(&mut self) {
        self.handle = SlotId::default();
        self.object = None;
        self.bodies.clear();
        self.constraints.clear();
        self.behaviours.clear();
    }
}

impl WorldEntry {
    fn add_bodies(&mut self, world: &mut PhysicsWorld) -> usize {
        let Some(object) = self.object.as_mut() else {
            return 0;
        };
        let mut added = 0;
        for &index in &self.bodies {
            if let Some(Component::Body(body)) = object.component_mut(index) {
                if body.add_to(world) {
                    added += 1;
                }
            }
        }
        added
    }

    fn add_constraints(&mut self, world: &mut PhysicsWorld) -> usize {
        let Some(object) = self.object.as_mut() else {
            return 0;
        };
        let mut added = 0;
        for &index in &self.constraints {
            if let Some(Component::Constraint(constraint)) = object.component_mut(index) {
                if constraint.add_to(world) {
                    added += 1;
                }
            }
        }
        added
    }

    fn remove_constraints(&mut self, world: &mut PhysicsWorld) {
        let Some(object) = self.object.as_mut() else {
            return;
        };
        let id = object.id();
        for &index in self.constraints.iter().rev() {
            if let Some(Component::Constraint(constraint)) = object.component_mut(index) {
                if let Err(err) = constraint.remove_from(world) {
                    tracing::error!(object = %id, error = %err, "constraint removal failed");
                }
            }
        }
    }

    fn remove_bodies(&mut self, world: &mut PhysicsWorld) {
        let Some(object) = self.object.as_mut() else {
            return;
        };
        let id = object.id();
        for &index in self.bodies.iter().rev() {
            if let Some(Component::Body(body)) = object.component_mut(index) {
                if let Err(err) = body.remove_from(world) {
                    tracing::error!(object = %id, body = %body.id(), error = %err, "body removal failed");
                }
            }
        }
    }
}

/// One behaviour in the tick schedule.
#[derive(Clone, Copy, Debug)]
struct ScheduledBehaviour {
    entry: SlotId,
    component: usize,
    priority: i32,
    /// Global discovery sequence.
    seq: u64,
    pruned: bool,
}

struct RegistryState {
    config: RegistryConfig,
    pool: ObjectPool<WorldEntry>,
    slots: SlotAllocator,
    entries: DenseIndexMap<SlotId, WorldEntry>,
    order: ExecutionOrder,
    schedule: Vec<ScheduledBehaviour>,
    next_seq: u64,
    /// Discovery scratch: (priority, component index).
    scratch: Vec<(i32, usize)>,
    /// Tick scratch: in-world bodies of the object being ticked.
    tick_handles: Vec<(BodyId, NativeHandle)>,
    ticks: u64,
}

impl RegistryState {
    fn new(config: RegistryConfig) -> Self {
        let max_objects = config.max_objects;
        Self {
            pool: ObjectPool::with_default(config.pool_growth_step, Some(max_objects)),
            slots: SlotAllocator::with_limit(max_objects),
            entries: DenseIndexMap::new(max_objects),
            order: ExecutionOrder::from_table(config.execution_order.clone()),
            schedule: Vec::with_capacity(max_objects),
            next_seq: 0,
            scratch: Vec::new(),
            tick_handles: Vec::new(),
            ticks: 0,
            config,
        }
    }

    fn handles(&self) -> Vec<EntryHandle> {
        self.slots.iter_live().map(EntryHandle).collect()
    }

    fn find_by_object(&self, id: ObjectId) -> Option<SlotId> {
        self.entries
            .values()
            .find(|entry| entry.object.as_ref().is_some_and(|object| object.id() == id))
            .map(|entry| entry.handle)
    }

    fn check_capacity(&self, requested: usize) -> PhysicsResult<()> {
        let available = self.slots.available();
        if requested > available {
            tracing::error!(requested, available, "registry capacity exceeded");
            return Err(PhysicsError::Capacity {
                requested,
                available,
                limit: self.slots.limit(),
            });
        }
        Ok(())
    }

    fn check_unique(&self, objects: &[SceneObject]) -> PhysicsResult<()> {
        for (i, object) in objects.iter().enumerate() {
            let id = object.id();
            if self.find_by_object(id).is_some() || objects[..i].iter().any(|o| o.id() == id) {
                return Err(PhysicsError::InvariantViolation(format!(
                    "{id} is already registered"
                )));
            }
        }
        Ok(())
    }

    /// Takes a pooled entry for `object` and schedules its behaviours.
    fn admit(&mut self, object: SceneObject) -> PhysicsResult<SlotId> {
        let slot = self.slots.allocate()?;
        let mut entry = match self.pool.take() {
            Ok(entry) => entry,
            Err(err) => {
                self.slots.free(slot);
                return Err(err.into());
            }
        };
        entry.handle = slot;

        self.scratch.clear();
        for (index, component) in object.components().iter().enumerate() {
            match component {
                Component::Body(_) => entry.bodies.push(index),
                Component::Constraint(_) => entry.constraints.push(index),
                Component::Behaviour(behaviour_slot) => {
                    if let Some(behaviour) = behaviour_slot.behaviour() {
                        let priority = self.order.priority_of(behaviour.type_key());
                        self.scratch.push((priority, index));
                    }
                }
            }
        }

        // Stable ascending sort then reverse: higher priority first, later ties first
        self.scratch.sort_by_key(|(priority, _)| *priority);
        self.scratch.reverse();
        entry.behaviours.extend(self.scratch.iter().map(|(_, index)| *index));

        let base_seq = self.next_seq;
        for &(priority, component) in &self.scratch {
            self.schedule.push(ScheduledBehaviour {
                entry: slot,
                component,
                priority,
                seq: base_seq + component as u64,
                pruned: false,
            });
        }
        self.next_seq = base_seq + object.components().len() as u64;

        tracing::debug!(
            object = %object.id(),
            slot = %slot,
            bodies = entry.bodies.len(),
            constraints = entry.constraints.len(),
            behaviours = entry.behaviours.len(),
            "object admitted"
        );
        entry.object = Some(object);

        if let Err(err) = self.entries.insert(slot, entry) {
            self.schedule.retain(|s| s.entry != slot);
            self.slots.free(slot);
            return Err(err.into());
        }
        Ok(slot)
    }

    fn sort_schedule(&mut self) {
        self.schedule
            .sort_by(|a, b| (b.priority, b.seq).cmp(&(a.priority, a.seq)));
    }

    /// Returns the entry to the pool and hands back its object.
    fn release(&mut self, slot: SlotId) -> Option<SceneObject> {
        let mut entry = self.entries.remove(slot)?;
        self.schedule.retain(|s| s.entry != slot);
        self.slots.free(slot);
        let object = entry.object.take();
        self.pool.give_back(entry);
        object
    }

    fn remove(&mut self, world: &mut PhysicsWorld, slots: &[SlotId]) -> PhysicsResult<Vec<SceneObject>> {
        for &slot in slots {
            if !self.slots.is_live(slot) {
                return Err(PhysicsError::InvariantViolation(format!(
                    "entry {slot} is not registered"
                )));
            }
        }

        for &slot in slots {
            if let Some(entry) = self.entries.get_mut(slot) {
                entry.remove_constraints(world);
            }
        }
        for &slot in slots {
            if let Some(entry) = self.entries.get_mut(slot) {
                entry.remove_bodies(world);
            }
        }

        let objects: Vec<_> = slots.iter().filter_map(|&slot| self.release(slot)).collect();
        tracing::debug!(count = objects.len(), live = self.entries.len(), "objects removed");
        Ok(objects)
    }

    fn run_pre_tick(&mut self, kernel: &mut dyn Kernel, dt: f32) {
        let Self {
            entries,
            schedule,
            tick_handles,
            ticks,
            ..
        } = self;
        *ticks += 1;
        let mut prune = false;

        for scheduled in schedule.iter_mut() {
            let Some(object) = entries
                .get_mut(scheduled.entry)
                .and_then(|entry| entry.object.as_mut())
            else {
                scheduled.pruned = true;
                prune = true;
                continue;
            };
            if !object.is_active() {
                continue;
            }

            tick_handles.clear();
            tick_handles.extend(
                object
                    .bodies()
                    .filter(|body| body.is_in_world())
                    .filter_map(|body| body.handle().map(|handle| (body.id(), handle))),
            );

            let Some(slot) = object.behaviour_slot_mut(scheduled.component) else {
                scheduled.pruned = true;
                prune = true;
                continue;
            };
            if !slot.is_enabled() {
                continue;
            }
            let Some(behaviour) = slot.behaviour_mut() else {
                // Destroyed since the last tick
                scheduled.pruned = true;
                prune = true;
                continue;
            };

            let mut ctx = TickContext::new(&mut *kernel, tick_handles.as_slice());
            behaviour.physics_update(dt, &mut ctx);
            if ctx.destroy_requested() {
                tracing::debug!(type_key = behaviour.type_key(), "behaviour destroyed itself");
                slot.destroy();
                scheduled.pruned = true;
                prune = true;
            }
        }

        if prune {
            schedule.retain(|s| !s.pruned);
        }
    }
}

/// Registers composite scene objects with a world and ticks their behaviours.
///
/// # Example
///
/// ```rust,ignore
/// let registry = WorldEntryRegistry::new(RegistryConfig::default());
/// registry.attach(&mut world)?;
///
/// let handles = registry.add_objects(&mut world, vec![door, frame])?;
/// registry.simulate_step(&mut world, 1.0 / 60.0);
/// let objects = registry.remove_objects(&mut world, &handles)?;
/// ```
#[derive(Clone)]
pub struct WorldEntryRegistry {
    shared: Arc<Mutex<RegistryState>>,
}

impl WorldEntryRegistry {
    /// Creates an empty registry sized by `config.max_objects`.
    ///
    /// A budget of zero is kept as is: every add fails with
    /// [`PhysicsError::Capacity`].
    #[must_use]
    pub fn new(config: RegistryConfig) -> Self {
        tracing::debug!(
            max_objects = config.max_objects,
            growth_step = config.pool_growth_step,
            "registry created"
        );
        if config.max_objects == 0 {
            tracing::warn!("registry has no object budget; every add will fail");
        }
        Self {
            shared: Arc::new(Mutex::new(RegistryState::new(config))),
        }
    }

    /// Configuration the registry was created with.
    #[must_use]
    pub fn config(&self) -> RegistryConfig {
        self.shared.lock().config.clone()
    }

    /// Installs the pre-tick hook on `world`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::State`] if the world is not initialized.
    pub fn attach(&self, world: &mut PhysicsWorld) -> PhysicsResult<()> {
        let shared = Arc::clone(&self.shared);
        world.set_pre_tick_callback(Some(Box::new(move |kernel: &mut dyn Kernel, dt: f32| {
            match shared.try_lock() {
                Some(mut state) => state.run_pre_tick(kernel, dt),
                None => tracing::warn!("registry busy during pre-tick; behaviours skipped"),
            }
        })))?;
        tracing::debug!("registry attached to world");
        Ok(())
    }

    /// Removes the pre-tick hook from `world`.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::State`] if the world is not initialized.
    pub fn detach(&self, world: &mut PhysicsWorld) -> PhysicsResult<()> {
        world.set_pre_tick_callback(None)
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers one object.
    ///
    /// # Errors
    ///
    /// As [`add_objects`](Self::add_objects).
    pub fn add_object(&self, world: &mut PhysicsWorld, object: SceneObject) -> PhysicsResult<EntryHandle> {
        let mut handles = self.add_objects(world, vec![object])?;
        handles
            .pop()
            .ok_or(PhysicsError::State("registration produced no entry"))
    }

    /// Registers a batch: every body of the batch first, then every
    /// constraint.
    ///
    /// Individual bodies or constraints that fail to build are logged and
    /// skipped; their objects are still registered.
    ///
    /// # Errors
    ///
    /// Nothing is registered when:
    /// - [`PhysicsError::State`]: the world is not initialized
    /// - [`PhysicsError::Capacity`]: the batch does not fit
    /// - [`PhysicsError::InvariantViolation`]: an object id is already registered
    pub fn add_objects(
        &self,
        world: &mut PhysicsWorld,
        objects: Vec<SceneObject>,
    ) -> PhysicsResult<Vec<EntryHandle>> {
        if !world.is_initialized() {
            tracing::error!("add_objects called on an uninitialized physics world");
            return Err(PhysicsError::State("physics world is not initialized"));
        }

        let mut state = self.shared.lock();
        state.check_capacity(objects.len())?;
        state.check_unique(&objects)?;

        let mut slots = Vec::with_capacity(objects.len());
        for object in objects {
            match state.admit(object) {
                Ok(slot) => slots.push(slot),
                Err(err) => {
                    for slot in slots {
                        state.release(slot);
                    }
                    return Err(err);
                }
            }
        }
        state.sort_schedule();

        let mut bodies = 0;
        for &slot in &slots {
            if let Some(entry) = state.entries.get_mut(slot) {
                bodies += entry.add_bodies(world);
            }
        }
        let mut constraints = 0;
        for &slot in &slots {
            if let Some(entry) = state.entries.get_mut(slot) {
                constraints += entry.add_constraints(world);
            }
        }

        tracing::debug!(
            objects = slots.len(),
            bodies,
            constraints,
            live = state.entries.len(),
            "objects registered"
        );
        Ok(slots.into_iter().map(EntryHandle).collect())
    }

    /// Unregisters one object and hands it back.
    ///
    /// The object keeps its native handles; call
    /// [`SceneObject::dispose`] to release them or register it again.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::InvariantViolation`] for a stale handle.
    pub fn remove_object(&self, world: &mut PhysicsWorld, handle: EntryHandle) -> PhysicsResult<SceneObject> {
        let mut objects = self.remove_objects(world, &[handle])?;
        objects
            .pop()
            .ok_or(PhysicsError::State("removal produced no object"))
    }

    /// Unregisters the object with `id`, if registered.
    ///
    /// # Errors
    ///
    /// As [`remove_object`](Self::remove_object).
    pub fn remove_object_by_id(
        &self,
        world: &mut PhysicsWorld,
        id: ObjectId,
    ) -> PhysicsResult<Option<SceneObject>> {
        let mut state = self.shared.lock();
        let Some(slot) = state.find_by_object(id) else {
            return Ok(None);
        };
        Ok(state.remove(world, &[slot])?.pop())
    }

    /// Unregisters a batch: every constraint of the batch first, then every
    /// body.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::InvariantViolation`] without removing anything
    /// if any handle is stale.
    pub fn remove_objects(
        &self,
        world: &mut PhysicsWorld,
        handles: &[EntryHandle],
    ) -> PhysicsResult<Vec<SceneObject>> {
        let slots: Vec<_> = handles.iter().map(|h| h.0).collect();
        self.shared.lock().remove(world, &slots)
    }

    /// Unregisters every object and releases all of their native objects.
    ///
    /// Call before [`PhysicsWorld::dispose`].
    pub fn dispose_all(&self, world: &mut PhysicsWorld) {
        let mut state = self.shared.lock();
        let slots: Vec<_> = state.slots.iter_live().collect();
        let mut objects = match state.remove(world, &slots) {
            Ok(objects) => objects,
            Err(err) => {
                tracing::error!(error = %err, "registry teardown failed");
                return;
            }
        };
        drop(state);

        // Constraints may reference bodies of any other object
        for object in &mut objects {
            for constraint in object.constraints_mut() {
                constraint.dispose(world);
            }
        }
        let count = objects.len();
        for mut object in objects {
            object.dispose(world);
        }
        tracing::debug!(count, "registry disposed");
    }

    // =========================================================================
    // Stepping
    // =========================================================================

    /// Steps `world` by `dt` and mirrors simulated poses back into every
    /// registered body.
    ///
    /// # Returns
    ///
    /// Sub-steps performed.
    pub fn simulate_step(&self, world: &mut PhysicsWorld, dt: f32) -> u32 {
        let steps = world.step(dt);

        let mut state = self.shared.lock();
        for (_, entry) in state.entries.iter_mut() {
            if let Some(object) = entry.object.as_mut() {
                for body in object.bodies_mut() {
                    body.sync_from_kernel(world);
                }
            }
        }
        steps
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Runs `f` on a registered object.
    pub fn with_object<R>(&self, handle: EntryHandle, f: impl FnOnce(&SceneObject) -> R) -> Option<R> {
        let state = self.shared.lock();
        state.entries.get(handle.0).and_then(|e| e.object.as_ref()).map(f)
    }

    /// Runs `f` on a registered object, mutably.
    ///
    /// Components added here are picked up on the next registration only.
    pub fn with_object_mut<R>(
        &self,
        handle: EntryHandle,
        f: impl FnOnce(&mut SceneObject) -> R,
    ) -> Option<R> {
        let mut state = self.shared.lock();
        state.entries.get_mut(handle.0).and_then(|e| e.object.as_mut()).map(f)
    }

    /// Handle of the registered object with `id`.
    #[must_use]
    pub fn find(&self, id: ObjectId) -> Option<EntryHandle> {
        self.shared.lock().find_by_object(id).map(EntryHandle)
    }

    /// True while `handle` refers to a registered object.
    #[must_use]
    pub fn contains(&self, handle: EntryHandle) -> bool {
        self.shared.lock().slots.is_live(handle.0)
    }

    /// Handles of all registered objects in slot order.
    #[must_use]
    pub fn handles(&self) -> Vec<EntryHandle> {
        self.shared.lock().handles()
    }

    /// Registered objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.lock().entries.len()
    }

    /// True if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum concurrently registered objects.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.shared.lock().slots.limit()
    }

    /// Objects that can still be registered.
    #[must_use]
    pub fn available(&self) -> usize {
        self.shared.lock().slots.available()
    }

    /// Entry pool counters.
    #[must_use]
    pub fn pool_stats(&self) -> PoolStats {
        self.shared.lock().pool.stats()
    }

    /// Behaviours currently scheduled.
    #[must_use]
    pub fn behaviour_count(&self) -> usize {
        self.shared.lock().schedule.len()
    }

    /// Pre-tick invocations so far.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.shared.lock().ticks
    }

    /// Sets the priority of a behaviour type for objects registered later.
    pub fn set_priority(&self, type_key: impl Into<String>, priority: i32) {
        self.shared.lock().order.set(type_key, priority);
    }
}

impl std::fmt::Debug for WorldEntryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.shared.try_lock() {
            Some(state) => f
                .debug_struct("WorldEntryRegistry")
                .field("live", &state.entries.len())
                .field("limit", &state.slots.limit())
                .field("scheduled", &state.schedule.len())
                .field("pool", &state.pool)
                .finish(),
            None => f.write_str("WorldEntryRegistry { <locked> }"),
        }
    }
}
