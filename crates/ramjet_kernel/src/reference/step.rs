//! Fixed-step simulation loop of the reference kernel.
//!
//! One sub-step runs, in order:
//! 1. pre-tick callback
//! 2. velocity integration (gravity, forces, damping)
//! 3. discrete collision detection
//! 4. transform integration
//! 5. actions
//! 6. activation update
//! 7. post-tick callback

use super::objects::{BodyKind, BodyState, RigidState, SoftState};
use super::ReferenceKernel;
use crate::error::KernelResult;
use crate::handle::NativeHandle;
use crate::kernel::Kernel;
use crate::shape::CollisionShape;
use crate::types::{ActivationState, CollisionFilterGroups, ContactPoint, PersistentManifold};
use ramjet_shared::constants::DEACTIVATION_TIME;
use ramjet_shared::Vec3;

/// Angular speed removed per sub-step by additional damping.
const ADDITIONAL_ANGULAR_DAMP_VELOCITY: f32 = 0.005;

/// Buffers reused across steps.
#[derive(Default)]
pub(super) struct Scratch {
    objects: Vec<NativeHandle>,
    colliders: Vec<Collider>,
    manifolds: Vec<PersistentManifold>,
    unlinked_pairs: Vec<(NativeHandle, NativeHandle)>,
}

/// Narrowphase view of one object.
#[derive(Clone, Copy)]
struct Collider {
    handle: NativeHandle,
    kind: BodyKind,
    center: Vec3,
    radius: f32,
    /// World-space `(normal, constant)` for planes.
    plane: Option<(Vec3, f32)>,
    group: CollisionFilterGroups,
    mask: CollisionFilterGroups,
    inert: bool,
}

impl Collider {
    fn of(handle: NativeHandle, body: &BodyState) -> Self {
        let (center, radius) = body.bounding_sphere();
        let plane = match body.shape {
            CollisionShape::StaticPlane { normal, constant } if body.soft.is_none() => {
                let normal = body.transform.rotation.rotate(normal).normalize_or_zero();
                Some((normal, constant + normal.dot(body.transform.position)))
            }
            _ => None,
        };
        Self {
            handle,
            kind: body.kind,
            center,
            radius,
            plane,
            group: body.group,
            mask: body.mask,
            inert: body.is_static_or_kinematic(),
        }
    }
}

impl ReferenceKernel {
    pub(super) fn step_world(
        &mut self,
        world: NativeHandle,
        time_step: f32,
        max_sub_steps: u32,
        fixed_time_step: f32,
    ) -> KernelResult<u32> {
        if !self.world(world)?.kind.is_dynamics() {
            self.perform_discrete_collision_detection(world)?;
            return Ok(0);
        }

        let state = self.world_mut(world)?;

        let (sub_steps, step) = if max_sub_steps > 0 {
            state.local_time += time_step;
            let mut count = 0_u32;
            if state.local_time >= fixed_time_step {
                count = (state.local_time / fixed_time_step) as u32;
                state.local_time -= count as f32 * fixed_time_step;
            }
            (count.min(max_sub_steps), fixed_time_step)
        } else {
            state.local_time = 0.0;
            (u32::from(time_step > f32::EPSILON), time_step)
        };

        for _ in 0..sub_steps {
            self.run_tick_callback(world, step, true)?;
            self.integrate_velocities(world, step)?;
            self.perform_discrete_collision_detection(world)?;
            self.integrate_transforms(world, step)?;
            self.update_actions(world, step)?;
            self.update_activation_state(world, step)?;
            self.run_tick_callback(world, step, false)?;
        }

        self.synchronize_motion_states(world)?;
        self.clear_forces(world)?;
        Ok(sub_steps)
    }

    /// Copies the world's object list into the scratch buffer.
    fn snapshot_objects(&mut self, world: NativeHandle) -> KernelResult<Vec<NativeHandle>> {
        let mut objects = std::mem::take(&mut self.scratch.objects);
        objects.clear();
        objects.extend_from_slice(&self.world(world)?.objects);
        Ok(objects)
    }

    fn run_tick_callback(
        &mut self,
        world: NativeHandle,
        dt: f32,
        is_pre_tick: bool,
    ) -> KernelResult<()> {
        let slot = self.world_mut(world)?.tick_slot(is_pre_tick);
        let epoch = slot.epoch;
        let Some(mut callback) = slot.callback.take() else {
            return Ok(());
        };

        let kernel: &mut dyn Kernel = &mut *self;
        callback(kernel, dt);

        // The callback may have replaced itself or torn the world down
        if let Ok(state) = self.world_mut(world) {
            let slot = state.tick_slot(is_pre_tick);
            if slot.epoch == epoch {
                slot.callback = Some(callback);
            }
        }
        Ok(())
    }

    fn integrate_velocities(&mut self, world: NativeHandle, dt: f32) -> KernelResult<()> {
        let gravity = self.world(world)?.gravity;
        let objects = self.snapshot_objects(world)?;

        for &handle in &objects {
            let soft_gravity = match self.body(handle)?.soft.as_ref() {
                Some(soft) => Some(self.soft_gravity(soft)?),
                None => None,
            };
            let body = self.body_mut(handle)?;
            if !body.activation.is_awake() || body.is_static_or_kinematic() {
                continue;
            }
            if let Some(rigid) = body.rigid.as_mut() {
                integrate_rigid_velocity(rigid, gravity, dt);
            }
            if let (Some(soft), Some(g)) = (body.soft.as_mut(), soft_gravity) {
                if soft.inverse_node_mass > 0.0 {
                    for velocity in &mut soft.velocities {
                        *velocity += g * dt;
                    }
                }
            }
        }

        self.scratch.objects = objects;
        Ok(())
    }

    fn soft_gravity(&self, soft: &SoftState) -> KernelResult<Vec3> {
        match &self.slot(soft.world_info)?.object {
            super::objects::Object::SoftBodyWorldInfo(info) => Ok(info.gravity),
            other => Err(super::wrong_kind(soft.world_info, "soft body world info", other)),
        }
    }

    pub(super) fn perform_discrete_collision_detection(
        &mut self,
        world: NativeHandle,
    ) -> KernelResult<()> {
        let objects = self.snapshot_objects(world)?;
        let ghost_pairs = self.world(world)?.ghost_pair_callback;

        let mut unlinked = std::mem::take(&mut self.scratch.unlinked_pairs);
        unlinked.clear();
        for &constraint in &self.world(world)?.constraints {
            let state = self.constraint(constraint)?;
            if state.disable_collisions_between_linked_bodies {
                if let Some(body_b) = state.body_b {
                    unlinked.push((state.body_a, body_b));
                }
            }
        }

        let mut colliders = std::mem::take(&mut self.scratch.colliders);
        colliders.clear();
        for &handle in &objects {
            let body = self.body_mut(handle)?;
            if body.kind == BodyKind::Ghost {
                body.overlaps.clear();
            }
            if body.activation == ActivationState::DisableSimulation {
                continue;
            }
            colliders.push(Collider::of(handle, body));
        }

        let mut manifolds = std::mem::take(&mut self.scratch.manifolds);
        manifolds.clear();
        for (i, a) in colliders.iter().enumerate() {
            for b in &colliders[i + 1..] {
                if !CollisionFilterGroups::passes(a.group, a.mask, b.group, b.mask) {
                    continue;
                }
                let ghost_pair = a.kind == BodyKind::Ghost || b.kind == BodyKind::Ghost;
                if !ghost_pair && a.inert && b.inert {
                    continue;
                }
                if unlinked
                    .iter()
                    .any(|&(x, y)| (x == a.handle && y == b.handle) || (x == b.handle && y == a.handle))
                {
                    continue;
                }
                let Some(contact) = contact_between(a, b) else {
                    continue;
                };

                if ghost_pair {
                    if ghost_pairs {
                        for (ghost, other) in [(a, b), (b, a)] {
                            if ghost.kind == BodyKind::Ghost {
                                self.body_mut(ghost.handle)?.overlaps.push(other.handle);
                            }
                        }
                    }
                    continue;
                }
                manifolds.push(PersistentManifold {
                    body0: a.handle,
                    body1: b.handle,
                    contacts: vec![contact],
                });
            }
        }

        std::mem::swap(&mut self.world_mut(world)?.manifolds, &mut manifolds);
        self.scratch.manifolds = manifolds;
        self.scratch.colliders = colliders;
        self.scratch.unlinked_pairs = unlinked;
        self.scratch.objects = objects;
        Ok(())
    }

    fn integrate_transforms(&mut self, world: NativeHandle, dt: f32) -> KernelResult<()> {
        let objects = self.snapshot_objects(world)?;

        for &handle in &objects {
            let body = self.body_mut(handle)?;
            if !body.activation.is_awake() || body.is_static_or_kinematic() {
                continue;
            }

            if let Some(rigid) = body.rigid.as_mut() {
                if rigid.inverse_mass > 0.0 {
                    body.transform.position += rigid.linear_velocity * dt;
                    body.transform.rotation =
                        body.transform.rotation.integrate(rigid.angular_velocity, dt);
                }
                rigid.interpolation_transform = body.transform;
                rigid.interpolation_linear_velocity = rigid.linear_velocity;
                rigid.interpolation_angular_velocity = rigid.angular_velocity;
            }

            if let Some(soft) = body.soft.as_mut() {
                for (node, velocity) in soft.nodes.iter_mut().zip(&soft.velocities) {
                    *node += *velocity * dt;
                }
                body.transform.position = soft.centroid();
            }
        }

        self.scratch.objects = objects;
        Ok(())
    }

    fn update_actions(&mut self, world: NativeHandle, dt: f32) -> KernelResult<()> {
        let count = self.world(world)?.actions.len();
        for index in 0..count {
            let action = self.action_at(world, index)?;
            let (ghost, walk) = match &self.slot(action)?.object {
                super::objects::Object::Character(character) => {
                    (character.ghost, character.walk_direction)
                }
                other => return Err(super::wrong_kind(action, "character controller", other)),
            };
            if walk != Vec3::ZERO {
                self.body_mut(ghost)?.transform.position += walk * dt;
            }
        }
        Ok(())
    }

    fn update_activation_state(&mut self, world: NativeHandle, dt: f32) -> KernelResult<()> {
        let objects = self.snapshot_objects(world)?;

        for &handle in &objects {
            let body = self.body_mut(handle)?;
            if body.is_static_or_kinematic() {
                continue;
            }
            let Some(rigid) = body.rigid.as_mut() else {
                continue;
            };
            if matches!(
                body.activation,
                ActivationState::IslandSleeping
                    | ActivationState::DisableDeactivation
                    | ActivationState::DisableSimulation
            ) {
                continue;
            }

            let linear = rigid.properties.linear_sleeping_threshold;
            let angular = rigid.properties.angular_sleeping_threshold;
            let resting = rigid.linear_velocity.length_squared() < linear * linear
                && rigid.angular_velocity.length_squared() < angular * angular;
            if !resting {
                body.deactivation_time = 0.0;
                body.activation = ActivationState::Active;
                continue;
            }

            body.deactivation_time += dt;
            if body.deactivation_time > DEACTIVATION_TIME {
                if body.activation == ActivationState::WantsDeactivation {
                    body.activation = ActivationState::IslandSleeping;
                    rigid.linear_velocity = Vec3::ZERO;
                    rigid.angular_velocity = Vec3::ZERO;
                } else {
                    body.activation = ActivationState::WantsDeactivation;
                }
            }
        }

        self.scratch.objects = objects;
        Ok(())
    }

    /// Writes interpolated transforms into the motion states of moving bodies.
    fn synchronize_motion_states(&mut self, world: NativeHandle) -> KernelResult<()> {
        let local_time = self.world(world)?.local_time;
        let objects = self.snapshot_objects(world)?;

        for &handle in &objects {
            let body = self.body(handle)?;
            if !body.activation.is_awake() || body.is_static_or_kinematic() {
                continue;
            }
            let Some(rigid) = body.rigid.as_ref() else {
                continue;
            };
            let Some(motion_state) = rigid.motion_state else {
                continue;
            };

            let mut predicted = rigid.interpolation_transform;
            predicted.position += rigid.interpolation_linear_velocity * local_time;
            predicted.rotation = predicted
                .rotation
                .integrate(rigid.interpolation_angular_velocity, local_time);
            *self.motion_state_transform_mut(motion_state)? = predicted;
        }

        self.scratch.objects = objects;
        Ok(())
    }

    fn clear_forces(&mut self, world: NativeHandle) -> KernelResult<()> {
        let objects = self.snapshot_objects(world)?;
        for &handle in &objects {
            if let Some(rigid) = self.body_mut(handle)?.rigid.as_mut() {
                rigid.total_force = Vec3::ZERO;
                rigid.total_torque = Vec3::ZERO;
            }
        }
        self.scratch.objects = objects;
        Ok(())
    }
}

/// Gravity, accumulated forces, then damping.
fn integrate_rigid_velocity(rigid: &mut RigidState, gravity: Vec3, dt: f32) {
    if rigid.inverse_mass <= 0.0 {
        return;
    }
    let properties = rigid.properties;

    rigid.linear_velocity +=
        (gravity.mul_elem(properties.linear_factor) + rigid.total_force * rigid.inverse_mass) * dt;
    rigid.angular_velocity += rigid.inverse_inertia.mul_elem(rigid.total_torque) * dt;

    rigid.linear_velocity *= (1.0 - properties.linear_damping.clamp(0.0, 1.0)).powf(dt);
    rigid.angular_velocity *= (1.0 - properties.angular_damping.clamp(0.0, 1.0)).powf(dt);

    if let Some(extra) = properties.additional_damping {
        if rigid.linear_velocity.length_squared() < extra.linear_threshold_sqr
            && rigid.angular_velocity.length_squared() < extra.angular_threshold_sqr
        {
            rigid.linear_velocity *= extra.factor;
            rigid.angular_velocity *= extra.factor;
        }

        let angular_speed = rigid.angular_velocity.length();
        if angular_speed < extra.angular_factor {
            rigid.angular_velocity = if angular_speed > ADDITIONAL_ANGULAR_DAMP_VELOCITY {
                rigid.angular_velocity
                    - rigid.angular_velocity.normalize_or_zero() * ADDITIONAL_ANGULAR_DAMP_VELOCITY
            } else {
                Vec3::ZERO
            };
        }
    }
}

/// Single deepest contact between two colliders, if they touch.
///
/// The normal points from `b` towards `a`.
fn contact_between(a: &Collider, b: &Collider) -> Option<ContactPoint> {
    match (a.plane, b.plane) {
        (Some(_), Some(_)) => None,
        (Some((normal, constant)), None) => {
            let signed = normal.dot(b.center) - constant;
            let distance = signed - b.radius;
            (distance <= 0.0).then(|| ContactPoint {
                position_world_on_a: b.center - normal * signed,
                position_world_on_b: b.center - normal * b.radius,
                normal_world_on_b: -normal,
                distance,
            })
        }
        (None, Some((normal, constant))) => {
            let signed = normal.dot(a.center) - constant;
            let distance = signed - a.radius;
            (distance <= 0.0).then(|| ContactPoint {
                position_world_on_a: a.center - normal * a.radius,
                position_world_on_b: a.center - normal * signed,
                normal_world_on_b: normal,
                distance,
            })
        }
        (None, None) => {
            let offset = a.center - b.center;
            let distance = offset.length() - a.radius - b.radius;
            if distance > 0.0 {
                return None;
            }
            let normal = match offset.normalize_or_zero() {
                n if n == Vec3::ZERO => Vec3::Y,
                n => n,
            };
            Some(ContactPoint {
                position_world_on_a: a.center - normal * a.radius,
                position_world_on_b: b.center + normal * b.radius,
                normal_world_on_b: normal,
                distance,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Aabb, BroadphaseDesc, BroadphaseKind, CharacterControllerDesc, CollisionConfigKind,
        CollisionObjectDesc, RigidBodyDesc, RigidBodyProperties, WorldDesc, WorldKind,
    };
    use ramjet_shared::Transform;

    fn dynamics_world(kernel: &mut ReferenceKernel) -> NativeHandle {
        let config = kernel
            .create_collision_configuration(CollisionConfigKind::Default)
            .unwrap();
        let dispatcher = kernel.create_dispatcher(config).unwrap();
        let broadphase = kernel
            .create_broadphase(&BroadphaseDesc::new(BroadphaseKind::DynamicAabb, Aabb::default()))
            .unwrap();
        let solver = kernel.create_constraint_solver(1).unwrap();
        kernel
            .create_world(&WorldDesc {
                kind: WorldKind::RigidBodyDynamics,
                collision_configuration: config,
                dispatcher,
                broadphase,
                solver: Some(solver),
                soft_body_world_info: None,
            })
            .unwrap()
    }

    fn add_ball(kernel: &mut ReferenceKernel, world: NativeHandle, position: Vec3) -> NativeHandle {
        let shape = CollisionShape::Sphere { radius: 0.5 };
        let body = kernel
            .create_rigid_body(&RigidBodyDesc {
                object: CollisionObjectDesc::new(shape, Transform::from_position(position)),
                mass: 1.0,
                local_inertia: shape.calculate_local_inertia(1.0),
                motion_state: None,
                linear_velocity: Vec3::ZERO,
                angular_velocity: Vec3::ZERO,
                properties: RigidBodyProperties::default(),
            })
            .unwrap();
        kernel
            .add_rigid_body(world, body, CollisionFilterGroups::DEFAULT, CollisionFilterGroups::ALL)
            .unwrap();
        body
    }

    #[test]
    fn test_semi_implicit_free_fall() {
        let mut kernel = ReferenceKernel::new();
        let world = dynamics_world(&mut kernel);
        kernel.set_gravity(world, Vec3::new(0.0, -10.0, 0.0)).unwrap();
        let ball = add_ball(&mut kernel, world, Vec3::ZERO);

        let dt = 0.1;
        for _ in 0..3 {
            assert_eq!(kernel.step_simulation(world, dt, 0, dt).unwrap(), 1);
        }
        // y_n = -g dt^2 n(n+1)/2
        let y = kernel.world_transform(ball).unwrap().position.y;
        assert!((y - (-10.0 * 0.01 * 6.0)).abs() < 1.0e-4, "y = {y}");
    }

    #[test]
    fn test_resting_body_falls_asleep() {
        let mut kernel = ReferenceKernel::new();
        let world = dynamics_world(&mut kernel);
        kernel.set_gravity(world, Vec3::ZERO).unwrap();
        let ball = add_ball(&mut kernel, world, Vec3::ZERO);

        let fixed = 1.0 / 60.0;
        for _ in 0..(DEACTIVATION_TIME / fixed) as usize + 4 {
            kernel.step_simulation(world, fixed, 1, fixed).unwrap();
        }
        assert_eq!(
            kernel.activation_state(ball).unwrap(),
            ActivationState::IslandSleeping
        );

        kernel.activate(ball).unwrap();
        assert_eq!(kernel.activation_state(ball).unwrap(), ActivationState::Active);
        assert_eq!(kernel.deactivation_time(ball).unwrap(), 0.0);
    }

    #[test]
    fn test_ghost_overlaps_need_pair_callback() {
        let mut kernel = ReferenceKernel::new();
        let world = dynamics_world(&mut kernel);
        kernel.set_gravity(world, Vec3::ZERO).unwrap();
        let ball = add_ball(&mut kernel, world, Vec3::ZERO);
        let ghost = kernel
            .create_ghost_object(&CollisionObjectDesc::new(
                CollisionShape::Sphere { radius: 1.0 },
                Transform::IDENTITY,
            ))
            .unwrap();
        kernel
            .add_collision_object(world, ghost, CollisionFilterGroups::SENSOR_TRIGGER, CollisionFilterGroups::ALL)
            .unwrap();

        let mut overlaps = Vec::new();
        kernel.step_simulation(world, 0.1, 0, 0.1).unwrap();
        kernel.ghost_overlaps(ghost, &mut overlaps).unwrap();
        assert!(overlaps.is_empty());

        kernel.install_ghost_pair_callback(world).unwrap();
        kernel.step_simulation(world, 0.1, 0, 0.1).unwrap();
        kernel.ghost_overlaps(ghost, &mut overlaps).unwrap();
        assert_eq!(overlaps, vec![ball]);
        // Ghost pairs never produce manifolds
        assert_eq!(kernel.num_manifolds(world).unwrap(), 0);
    }

    #[test]
    fn test_character_walks_its_ghost() {
        let mut kernel = ReferenceKernel::new();
        let world = dynamics_world(&mut kernel);
        let ghost = kernel
            .create_ghost_object(&CollisionObjectDesc::new(
                CollisionShape::Capsule {
                    radius: 0.5,
                    half_height: 0.5,
                },
                Transform::IDENTITY,
            ))
            .unwrap();
        let character = kernel
            .create_character_controller(&CharacterControllerDesc {
                ghost,
                step_height: 0.35,
                up: Vec3::Y,
            })
            .unwrap();
        kernel
            .add_collision_object(world, ghost, CollisionFilterGroups::CHARACTER, CollisionFilterGroups::ALL)
            .unwrap();
        kernel.add_action(world, character).unwrap();
        kernel.set_walk_direction(character, Vec3::new(2.0, 0.0, 0.0)).unwrap();

        kernel.step_simulation(world, 0.5, 0, 0.5).unwrap();
        let x = kernel.world_transform(ghost).unwrap().position.x;
        assert!((x - 1.0).abs() < 1.0e-5);

        // Ghost is held by the controller
        kernel.remove_action(world, character).unwrap();
        kernel.remove_collision_object(world, ghost).unwrap();
        assert!(kernel.destroy(ghost).is_err());
        kernel.destroy(character).unwrap();
        kernel.destroy(ghost).unwrap();
    }

    #[test]
    fn test_forces_cleared_after_step() {
        let mut kernel = ReferenceKernel::new();
        let world = dynamics_world(&mut kernel);
        kernel.set_gravity(world, Vec3::ZERO).unwrap();
        let ball = add_ball(&mut kernel, world, Vec3::ZERO);

        kernel.apply_central_force(ball, Vec3::new(10.0, 0.0, 0.0)).unwrap();
        kernel.step_simulation(world, 0.1, 0, 0.1).unwrap();
        let v1 = kernel.linear_velocity(ball).unwrap();
        assert!((v1.x - 1.0).abs() < 1.0e-5);

        kernel.step_simulation(world, 0.1, 0, 0.1).unwrap();
        assert_eq!(kernel.linear_velocity(ball).unwrap(), v1);
    }
}
