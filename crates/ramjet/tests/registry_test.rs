//! # Registry Integration Tests
//!
//! Batch registration, teardown ordering, behaviour scheduling and the
//! fixed object budget, driven through the public API only.

use parking_lot::Mutex;
use ramjet::{
    BodyId, CollisionShape, Constraint, ConstraintKind, ObjectId, PhysicsBody, PhysicsComponent,
    PhysicsError, PhysicsWorld, RamjetConfig, RegistryConfig, SceneObject, TickContext, Transform,
    Vec3, WorldConfig, WorldEntryRegistry, WorldKind,
};
use std::collections::BTreeSet;
use std::sync::Arc;

fn world_of(kind: WorldKind) -> PhysicsWorld {
    let config = WorldConfig {
        world_kind: kind,
        ..WorldConfig::default()
    };
    let mut world = PhysicsWorld::with_reference_kernel(config);
    world.initialize().unwrap();
    world
}

fn cube(id: u32) -> PhysicsBody {
    PhysicsBody::rigid(
        BodyId(id),
        CollisionShape::Box {
            half_extents: Vec3::splat(0.5),
        },
        Transform::from_position(Vec3::new(id as f32 * 3.0, 0.0, 0.0)),
        1.0,
    )
}

fn crate_object(id: u64) -> SceneObject {
    SceneObject::new(ObjectId(id), format!("crate-{id}")).with_body(cube(id as u32))
}

/// Collision objects currently registered with the kernel world.
fn in_world_handles(world: &PhysicsWorld) -> BTreeSet<ramjet::NativeHandle> {
    let kernel = world.kernel();
    let Some(native) = world.handle() else {
        return BTreeSet::new();
    };
    let count = kernel.num_collision_objects(native).unwrap();
    (0..count)
        .map(|i| kernel.collision_object_at(native, i).unwrap())
        .collect()
}

struct Recorder {
    key: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl PhysicsComponent for Recorder {
    fn type_key(&self) -> &'static str {
        self.key
    }

    fn physics_update(&mut self, _dt: f32, _ctx: &mut TickContext<'_>) {
        self.log.lock().push(self.key);
    }
}

#[test]
fn test_full_scene_teardown_leaves_no_handles() {
    let mut world = world_of(WorldKind::SoftBodyAndRigidBody);
    let registry = WorldEntryRegistry::new(RegistryConfig::default());
    registry.attach(&mut world).unwrap();

    let sphere = CollisionShape::Sphere { radius: 0.5 };
    let capsule = CollisionShape::Capsule {
        radius: 0.3,
        half_height: 0.6,
    };
    let door = SceneObject::new(ObjectId(1), "door")
        .with_body(cube(1))
        .with_body(cube(2))
        .with_constraint(Constraint::new(
            ConstraintKind::PointToPoint {
                pivot_a: Vec3::new(1.5, 0.0, 0.0),
                pivot_b: Vec3::new(-1.5, 0.0, 0.0),
            },
            BodyId(1),
            Some(BodyId(2)),
        ));
    let props = SceneObject::new(ObjectId(2), "props")
        .with_body(PhysicsBody::static_rigid(
            BodyId(10),
            CollisionShape::StaticPlane {
                normal: Vec3::Y,
                constant: -10.0,
            },
            Transform::IDENTITY,
        ))
        .with_body(PhysicsBody::ghost(BodyId(11), sphere, Transform::IDENTITY))
        .with_body(PhysicsBody::collision_object(
            BodyId(12),
            sphere,
            Transform::from_position(Vec3::new(0.0, 5.0, 0.0)),
        ))
        .with_body(PhysicsBody::character(BodyId(13), capsule, Transform::IDENTITY, 0.35))
        .with_body(PhysicsBody::soft(
            BodyId(14),
            vec![Vec3::ZERO, Vec3::X, Vec3::Z],
            1.0,
            Transform::from_position(Vec3::new(0.0, 2.0, 0.0)),
        ));

    let handles = registry.add_objects(&mut world, vec![door, props]).unwrap();
    assert_eq!(handles.len(), 2);
    assert_eq!(world.body_count(), 7);
    assert!(world.has_ghost_pair_callback());

    for _ in 0..10 {
        registry.simulate_step(&mut world, 1.0 / 60.0);
    }

    registry.dispose_all(&mut world);
    assert!(registry.is_empty());
    assert_eq!(world.body_count(), 0);

    world.dispose();
    assert_eq!(world.kernel().live_handle_count(), 0);
    world.dispose();
    assert_eq!(world.kernel().live_handle_count(), 0);
}

#[test]
fn test_pool_conservation_over_cycles() {
    let mut world = world_of(WorldKind::RigidBodyDynamics);
    let registry = WorldEntryRegistry::new(RegistryConfig::with_max_objects(16));
    registry.add_object(&mut world, crate_object(100)).unwrap();
    let live_before = registry.len();

    for cycle in 0..5_u64 {
        let batch: Vec<_> = (0..8).map(|i| crate_object(cycle * 10 + i)).collect();
        let handles = registry.add_objects(&mut world, batch).unwrap();
        assert_eq!(registry.len(), live_before + 8);
        let objects = registry.remove_objects(&mut world, &handles).unwrap();
        for mut object in objects {
            object.dispose(&mut world);
        }
        assert_eq!(registry.len(), live_before);
    }

    let stats = registry.pool_stats();
    assert_eq!(stats.taken, 41);
    assert_eq!(stats.returned, 40);
    assert_eq!(stats.outstanding(), live_before as u64);
    // Warm pool: no growth past the first batch
    assert!(stats.allocated <= 16);
}

#[test]
fn test_add_then_remove_restores_world_membership() {
    let mut world = world_of(WorldKind::RigidBodyDynamics);
    let registry = WorldEntryRegistry::new(RegistryConfig::default());
    registry
        .add_object(
            &mut world,
            SceneObject::new(ObjectId(999), "ground").with_body(PhysicsBody::static_rigid(
                BodyId(999),
                CollisionShape::StaticPlane {
                    normal: Vec3::Y,
                    constant: 0.0,
                },
                Transform::IDENTITY,
            )),
        )
        .unwrap();
    let before = in_world_handles(&world);
    assert_eq!(before.len(), 1);

    let handles = registry
        .add_objects(&mut world, (1..=6).map(crate_object).collect())
        .unwrap();
    assert_eq!(in_world_handles(&world).len(), 7);

    let objects = registry.remove_objects(&mut world, &handles).unwrap();
    assert_eq!(objects.len(), 6);
    assert_eq!(in_world_handles(&world), before);
    assert!(objects.iter().all(|o| o.bodies().all(|b| !b.is_in_world())));
}

#[test]
fn test_constrained_body_removal_refused() {
    let mut world = world_of(WorldKind::RigidBodyDynamics);
    let registry = WorldEntryRegistry::new(RegistryConfig::default());

    let hinge = Constraint::new(
        ConstraintKind::Hinge {
            pivot_a: Vec3::new(1.5, 0.0, 0.0),
            pivot_b: Vec3::new(-1.5, 0.0, 0.0),
            axis_a: Vec3::Y,
            axis_b: Vec3::Y,
        },
        BodyId(1),
        Some(BodyId(2)),
    );
    let handles = registry
        .add_objects(
            &mut world,
            vec![crate_object(1), crate_object(2).with_constraint(hinge)],
        )
        .unwrap();
    assert_eq!(world.kernel().num_constraints(world.handle().unwrap()).unwrap(), 1);

    // Body 1 is still referenced by the hinge owned by object 2
    let mut first = registry.remove_object(&mut world, handles[0]).unwrap();
    assert!(first.body(BodyId(1)).unwrap().is_in_world());
    assert_eq!(world.body_count(), 2);

    let mut second = registry.remove_object(&mut world, handles[1]).unwrap();
    assert_eq!(world.kernel().num_constraints(world.handle().unwrap()).unwrap(), 0);
    assert!(!second.body(BodyId(2)).unwrap().is_in_world());

    // The hinge is out of the world but alive, so body 1 cannot be destroyed yet
    first.dispose(&mut world);
    let pinned = first.body(BodyId(1)).unwrap().handle().unwrap();
    assert!(world.kernel().is_live(pinned));

    second.dispose(&mut world);
    first.dispose(&mut world);
    assert!(!world.kernel().is_live(pinned));
    assert!(first.body(BodyId(1)).unwrap().handle().is_none());
    assert_eq!(world.body_count(), 0);
    world.dispose();
    assert_eq!(world.kernel().live_handle_count(), 0);
}

#[test]
fn test_constraints_follow_bodies_across_batch() {
    let mut world = world_of(WorldKind::RigidBodyDynamics);
    let registry = WorldEntryRegistry::new(RegistryConfig::default());

    // The constraint's object comes first but its second body is in a later object
    let anchor = SceneObject::new(ObjectId(1), "anchor")
        .with_body(cube(1))
        .with_constraint(Constraint::new(
            ConstraintKind::Fixed {
                frame_a: Transform::from_position(Vec3::new(1.5, 0.0, 0.0)),
                frame_b: Transform::from_position(Vec3::new(-1.5, 0.0, 0.0)),
            },
            BodyId(1),
            Some(BodyId(2)),
        ));
    let handles = registry
        .add_objects(&mut world, vec![anchor, crate_object(2)])
        .unwrap();

    let added = registry
        .with_object(handles[0], |o| o.constraints().all(Constraint::is_in_world))
        .unwrap();
    assert!(added);
    registry.dispose_all(&mut world);
}

#[test]
fn test_higher_priority_runs_first_in_any_submission_order() {
    for reversed in [false, true] {
        let mut world = world_of(WorldKind::RigidBodyDynamics);
        let mut config = RegistryConfig::default();
        config.execution_order.insert("effect".into(), 10);
        config.execution_order.insert("controller".into(), 20);
        let registry = WorldEntryRegistry::new(config);
        registry.attach(&mut world).unwrap();

        let log = Arc::new(Mutex::new(Vec::new()));
        let a = SceneObject::new(ObjectId(1), "a").with_behaviour(Recorder {
            key: "effect",
            log: Arc::clone(&log),
        });
        let b = SceneObject::new(ObjectId(2), "b").with_behaviour(Recorder {
            key: "controller",
            log: Arc::clone(&log),
        });
        let batch = if reversed { vec![b, a] } else { vec![a, b] };
        registry.add_objects(&mut world, batch).unwrap();

        registry.simulate_step(&mut world, 1.0 / 60.0);
        assert_eq!(*log.lock(), vec!["controller", "effect"], "reversed = {reversed}");
    }
}

#[test]
fn test_behaviours_run_once_per_sub_step() {
    let mut world = world_of(WorldKind::RigidBodyDynamics);
    let registry = WorldEntryRegistry::new(RegistryConfig::default());
    registry.attach(&mut world).unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    registry
        .add_object(
            &mut world,
            SceneObject::new(ObjectId(1), "a").with_behaviour(Recorder {
                key: "tick",
                log: Arc::clone(&log),
            }),
        )
        .unwrap();

    // 3.5 fixed steps: three sub-steps run, the remainder carries over
    let dt = world.config().fixed_time_step;
    let steps = registry.simulate_step(&mut world, dt * 3.5);
    assert_eq!(steps, 3);
    assert_eq!(log.lock().len(), 3);
    assert_eq!(registry.tick_count(), 3);
}

#[test]
fn test_free_fall_matches_integration() {
    let gravity = 9.8_f32;
    let mut world = PhysicsWorld::with_reference_kernel(WorldConfig {
        world_kind: WorldKind::RigidBodyDynamics,
        gravity: Vec3::new(0.0, -gravity, 0.0),
        ..WorldConfig::default()
    });
    world.initialize().unwrap();
    let registry = WorldEntryRegistry::new(RegistryConfig::default());

    let ball = PhysicsBody::rigid(
        BodyId(1),
        CollisionShape::Sphere { radius: 0.5 },
        Transform::IDENTITY,
        1.0,
    );
    let handle = registry
        .add_object(&mut world, SceneObject::new(ObjectId(1), "ball").with_body(ball))
        .unwrap();

    let dt = 1.0 / 60.0_f32;
    let mut last_y = 0.0_f32;
    for n in 1..=60 {
        assert_eq!(registry.simulate_step(&mut world, dt), 1);
        let y = registry
            .with_object(handle, |o| o.body(BodyId(1)).unwrap().transform().position.y)
            .unwrap();
        assert!(y < last_y, "y must decrease monotonically (step {n})");

        // Semi-implicit Euler: y_n = -g dt^2 n (n + 1) / 2
        let expected = -gravity * dt * dt * (n * (n + 1)) as f32 / 2.0;
        assert!((y - expected).abs() < 1.0e-3, "step {n}: {y} vs {expected}");
        last_y = y;
    }

    let t = 1.0_f32;
    let analytic = -0.5 * gravity * t * t;
    assert!((last_y - analytic).abs() < gravity * dt * t);
}

#[test]
fn test_capacity_limit_is_all_or_nothing() {
    let mut world = world_of(WorldKind::RigidBodyDynamics);
    let registry = WorldEntryRegistry::new(RegistryConfig::with_max_objects(4));

    for id in 1..=4 {
        registry.add_object(&mut world, crate_object(id)).unwrap();
    }
    assert_eq!(registry.available(), 0);

    let result = registry.add_object(&mut world, crate_object(5));
    assert!(matches!(
        result,
        Err(PhysicsError::Capacity {
            requested: 1,
            available: 0,
            limit: 4
        })
    ));
    assert_eq!(registry.len(), 4);
    assert_eq!(world.body_count(), 4);

    // A batch larger than the remaining room registers nothing
    let first = registry.find(ObjectId(1)).unwrap();
    registry.remove_object(&mut world, first).unwrap();
    let result = registry.add_objects(&mut world, vec![crate_object(6), crate_object(7)]);
    assert!(matches!(result, Err(PhysicsError::Capacity { .. })));
    assert_eq!(registry.len(), 3);
    assert_eq!(world.body_count(), 3);
    assert_eq!(registry.pool_stats().outstanding(), 3);
}

#[test]
fn test_registry_built_from_toml() {
    let config = RamjetConfig::from_toml_str(
        r#"
        [world]
        world_kind = "rigid_body_dynamics"
        max_sub_steps = 4

        [registry]
        max_objects = 2

        [registry.execution_order]
        controller = 5
        "#,
    )
    .unwrap();

    let mut world = PhysicsWorld::with_reference_kernel(config.world);
    world.initialize().unwrap();
    let registry = WorldEntryRegistry::new(config.registry);
    assert_eq!(registry.capacity(), 2);
    assert_eq!(registry.config().execution_order.get("controller"), Some(&5));

    registry
        .add_objects(&mut world, vec![crate_object(1), crate_object(2)])
        .unwrap();
    assert!(registry.add_object(&mut world, crate_object(3)).is_err());
}

#[test]
fn test_remove_by_id() {
    let mut world = world_of(WorldKind::RigidBodyDynamics);
    let registry = WorldEntryRegistry::new(RegistryConfig::default());
    registry
        .add_objects(&mut world, vec![crate_object(1), crate_object(2)])
        .unwrap();

    let removed = registry.remove_object_by_id(&mut world, ObjectId(2)).unwrap();
    assert_eq!(removed.map(|o| o.id()), Some(ObjectId(2)));
    assert!(registry
        .remove_object_by_id(&mut world, ObjectId(2))
        .unwrap()
        .is_none());
    assert_eq!(registry.len(), 1);
}
