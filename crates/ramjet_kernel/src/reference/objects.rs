//! Object records held by the reference kernel.

use crate::handle::NativeHandle;
use crate::kernel::TickCallback;
use crate::shape::CollisionShape;
use crate::types::{
    ActivationState, BroadphaseDesc, CollisionConfigKind, CollisionFilterGroups, CollisionFlags,
    DebugDrawModes, PersistentManifold, RigidBodyProperties, SoftBodyWorldInfoDesc, WorldKind,
};
use ramjet_shared::{Transform, Vec3};

/// A live kernel object plus the number of objects referencing it.
pub(crate) struct Slot {
    pub object: Object,
    pub refs: u32,
}

/// Every kind of object the reference kernel allocates.
pub(crate) enum Object {
    CollisionConfiguration(CollisionConfigKind),
    Dispatcher { configuration: NativeHandle },
    Broadphase(BroadphaseDesc),
    Solver { random_seed: u32 },
    SoftBodyWorldInfo(SoftBodyWorldInfoDesc),
    World(Box<WorldState>),
    DebugDrawer(DrawerState),
    MotionState(Transform),
    Body(Box<BodyState>),
    Character(CharacterState),
    Constraint(ConstraintState),
}

impl Object {
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Self::CollisionConfiguration(_) => "collision configuration",
            Self::Dispatcher { .. } => "dispatcher",
            Self::Broadphase(_) => "broadphase",
            Self::Solver { .. } => "constraint solver",
            Self::SoftBodyWorldInfo(_) => "soft body world info",
            Self::World(_) => "world",
            Self::DebugDrawer(_) => "debug drawer",
            Self::MotionState(_) => "motion state",
            Self::Body(body) => body.kind.name(),
            Self::Character(_) => "character controller",
            Self::Constraint(_) => "constraint",
        }
    }
}

pub(crate) struct WorldState {
    pub kind: WorldKind,
    pub collision_configuration: NativeHandle,
    pub dispatcher: NativeHandle,
    pub broadphase: NativeHandle,
    pub solver: Option<NativeHandle>,
    pub soft_body_world_info: Option<NativeHandle>,
    pub gravity: Vec3,
    /// Collision objects of every kind, insertion order.
    pub objects: Vec<NativeHandle>,
    pub actions: Vec<NativeHandle>,
    pub constraints: Vec<NativeHandle>,
    pub manifolds: Vec<PersistentManifold>,
    pub pre_tick: TickSlot,
    pub post_tick: TickSlot,
    pub ghost_pair_callback: bool,
    pub debug_drawer: Option<NativeHandle>,
    /// Time accumulated towards the next fixed sub-step.
    pub local_time: f32,
}

impl WorldState {
    pub(crate) fn new(kind: WorldKind, desc: &crate::types::WorldDesc) -> Self {
        Self {
            kind,
            collision_configuration: desc.collision_configuration,
            dispatcher: desc.dispatcher,
            broadphase: desc.broadphase,
            solver: desc.solver,
            soft_body_world_info: desc.soft_body_world_info,
            gravity: Vec3::ZERO,
            objects: Vec::new(),
            actions: Vec::new(),
            constraints: Vec::new(),
            manifolds: Vec::new(),
            pre_tick: TickSlot::default(),
            post_tick: TickSlot::default(),
            ghost_pair_callback: false,
            debug_drawer: None,
            local_time: 0.0,
        }
    }

    /// Members blocking destruction.
    pub(crate) fn member_count(&self) -> usize {
        self.objects.len() + self.actions.len() + self.constraints.len()
    }

    pub(crate) fn tick_slot(&mut self, is_pre_tick: bool) -> &mut TickSlot {
        if is_pre_tick {
            &mut self.pre_tick
        } else {
            &mut self.post_tick
        }
    }
}

/// An installed tick callback.
///
/// The callback is taken out while it runs; `epoch` tells the step loop
/// whether it was replaced in the meantime.
#[derive(Default)]
pub(crate) struct TickSlot {
    pub callback: Option<TickCallback>,
    pub epoch: u64,
}

pub(crate) struct DrawerState {
    pub mode: DebugDrawModes,
    pub world: Option<NativeHandle>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BodyKind {
    CollisionObject,
    Ghost,
    Rigid,
    Soft,
}

impl BodyKind {
    pub(crate) const fn name(self) -> &'static str {
        match self {
            Self::CollisionObject => "collision object",
            Self::Ghost => "ghost object",
            Self::Rigid => "rigid body",
            Self::Soft => "soft body",
        }
    }
}

pub(crate) struct BodyState {
    pub kind: BodyKind,
    pub shape: CollisionShape,
    pub transform: Transform,
    pub flags: CollisionFlags,
    pub user_index: u32,
    pub group: CollisionFilterGroups,
    pub mask: CollisionFilterGroups,
    pub world: Option<NativeHandle>,
    pub activation: ActivationState,
    pub deactivation_time: f32,
    pub rigid: Option<RigidState>,
    pub soft: Option<SoftState>,
    /// Objects overlapping this ghost after the last sub-step.
    pub overlaps: Vec<NativeHandle>,
    /// Constraints in a world that reference this body.
    pub constraint_refs: Vec<NativeHandle>,
}

impl BodyState {
    pub(crate) fn new(kind: BodyKind, shape: CollisionShape, transform: Transform) -> Self {
        Self {
            kind,
            shape,
            transform,
            flags: CollisionFlags::empty(),
            user_index: 0,
            group: CollisionFilterGroups::DEFAULT,
            mask: CollisionFilterGroups::ALL,
            world: None,
            activation: ActivationState::Active,
            deactivation_time: 0.0,
            rigid: None,
            soft: None,
            overlaps: Vec::new(),
            constraint_refs: Vec::new(),
        }
    }

    /// True if the integrator never moves the object.
    pub(crate) fn is_static_or_kinematic(&self) -> bool {
        self.flags
            .intersects(CollisionFlags::STATIC_OBJECT | CollisionFlags::KINEMATIC_OBJECT)
    }

    /// Sphere (centre, radius) enclosing the object.
    pub(crate) fn bounding_sphere(&self) -> (Vec3, f32) {
        if let Some(soft) = &self.soft {
            let center = soft.centroid();
            let radius = soft
                .nodes
                .iter()
                .map(|n| n.distance(center))
                .fold(SoftState::NODE_RADIUS, f32::max);
            return (center, radius);
        }
        (self.transform.position, self.shape.bounding_radius())
    }
}

pub(crate) struct RigidState {
    pub inverse_mass: f32,
    pub inverse_inertia: Vec3,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub total_force: Vec3,
    pub total_torque: Vec3,
    pub properties: RigidBodyProperties,
    pub motion_state: Option<NativeHandle>,
    pub interpolation_transform: Transform,
    pub interpolation_linear_velocity: Vec3,
    pub interpolation_angular_velocity: Vec3,
}

impl RigidState {
    pub(crate) fn set_mass_props(&mut self, mass: f32, local_inertia: Vec3) {
        self.inverse_mass = if mass > 0.0 { 1.0 / mass } else { 0.0 };
        self.inverse_inertia = Vec3::new(
            recip_or_zero(local_inertia.x),
            recip_or_zero(local_inertia.y),
            recip_or_zero(local_inertia.z),
        );
    }
}

fn recip_or_zero(v: f32) -> f32 {
    if v > 0.0 {
        1.0 / v
    } else {
        0.0
    }
}

pub(crate) struct SoftState {
    pub world_info: NativeHandle,
    /// Node positions, world space.
    pub nodes: Vec<Vec3>,
    pub velocities: Vec<Vec3>,
    pub inverse_node_mass: f32,
}

impl SoftState {
    /// Collision radius of a single node.
    pub(crate) const NODE_RADIUS: f32 = 0.05;

    pub(crate) fn centroid(&self) -> Vec3 {
        if self.nodes.is_empty() {
            return Vec3::ZERO;
        }
        let sum = self.nodes.iter().fold(Vec3::ZERO, |acc, n| acc + *n);
        sum * (1.0 / self.nodes.len() as f32)
    }
}

pub(crate) struct CharacterState {
    pub ghost: NativeHandle,
    pub walk_direction: Vec3,
    pub world: Option<NativeHandle>,
}

pub(crate) struct ConstraintState {
    pub body_a: NativeHandle,
    pub body_b: Option<NativeHandle>,
    pub kind_name: &'static str,
    pub disable_collisions_between_linked_bodies: bool,
    pub world: Option<NativeHandle>,
}
