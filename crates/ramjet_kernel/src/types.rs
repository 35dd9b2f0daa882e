//! # Kernel Types
//!
//! Kinds, flags and descriptors exchanged with a [`Kernel`](crate::Kernel).
//!
//! Descriptors are plain values. The kernel copies what it needs out of
//! them; nothing here holds a borrow into the host.

use crate::handle::NativeHandle;
use crate::shape::CollisionShape;
use ramjet_shared::constants::{
    AXIS3_SWEEP_MAX_PROXIES, DEFAULT_ANGULAR_SLEEPING_THRESHOLD, DEFAULT_BROADPHASE_MAX,
    DEFAULT_BROADPHASE_MIN, DEFAULT_LINEAR_SLEEPING_THRESHOLD,
};
use ramjet_shared::{Transform, Vec3};
use serde::{Deserialize, Serialize};

// =============================================================================
// WORLD KINDS
// =============================================================================

/// Capability tier of a simulation world.
///
/// Ordered: each kind supports everything the kinds before it support.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorldKind {
    /// Collision detection only, no dynamics.
    CollisionOnly,
    /// Discrete rigid-body dynamics.
    #[default]
    RigidBodyDynamics,
    /// Rigid bodies plus multi-body chains.
    MultiBody,
    /// Rigid bodies plus soft bodies.
    SoftBodyAndRigidBody,
}

impl WorldKind {
    /// True for worlds that integrate bodies and run actions.
    #[inline]
    #[must_use]
    pub fn is_dynamics(self) -> bool {
        self >= Self::RigidBodyDynamics
    }

    /// True for worlds that accept soft bodies.
    #[inline]
    #[must_use]
    pub const fn supports_soft_bodies(self) -> bool {
        matches!(self, Self::SoftBodyAndRigidBody)
    }
}

/// Collision configuration variant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionConfigKind {
    /// Rigid-rigid algorithms only.
    #[default]
    Default,
    /// Adds soft-rigid and soft-soft algorithms.
    SoftBodyRigidBody,
}

/// Broadphase acceleration structure.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadphaseKind {
    /// Dynamic AABB tree. Unbounded.
    #[default]
    DynamicAabb,
    /// 16-bit sweep and prune inside fixed bounds.
    Axis3Sweep,
    /// 32-bit sweep and prune inside fixed bounds.
    Axis3Sweep32Bit,
    /// Brute force pair list.
    Simple,
}

impl BroadphaseKind {
    /// True for variants that need world bounds.
    #[inline]
    #[must_use]
    pub const fn uses_bounds(self) -> bool {
        matches!(self, Self::Axis3Sweep | Self::Axis3Sweep32Bit)
    }
}

/// Axis aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Aabb {
    /// Creates a box from its corners.
    #[must_use]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// True when `min <= max` on every axis and both corners are finite.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.min.is_finite()
            && self.max.is_finite()
            && self.min.x <= self.max.x
            && self.min.y <= self.max.y
            && self.min.z <= self.max.z
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::new(DEFAULT_BROADPHASE_MIN, DEFAULT_BROADPHASE_MAX)
    }
}

// =============================================================================
// FLAGS
// =============================================================================

bitflags::bitflags! {
    /// Per-object collision behaviour flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct CollisionFlags: u32 {
        /// Never moves; zero mass.
        const STATIC_OBJECT = 1;
        /// Moved by the host, not by the integrator.
        const KINEMATIC_OBJECT = 1 << 1;
        /// Reports contacts but receives no response.
        const NO_CONTACT_RESPONSE = 1 << 2;
        /// Calls the custom material callback for contacts.
        const CUSTOM_MATERIAL_CALLBACK = 1 << 3;
        /// Character controller object.
        const CHARACTER_OBJECT = 1 << 4;
        /// Hidden from debug drawing.
        const DISABLE_VISUALIZE_OBJECT = 1 << 5;
    }
}

bitflags::bitflags! {
    /// Collision filter groups and masks.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CollisionFilterGroups: u32 {
        /// Default group.
        const DEFAULT = 1;
        /// Static geometry.
        const STATIC = 1 << 1;
        /// Kinematic bodies.
        const KINEMATIC = 1 << 2;
        /// Small debris.
        const DEBRIS = 1 << 3;
        /// Sensors and triggers.
        const SENSOR_TRIGGER = 1 << 4;
        /// Characters.
        const CHARACTER = 1 << 5;
        /// Every group.
        const ALL = u32::MAX;
    }
}

impl Default for CollisionFilterGroups {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl CollisionFilterGroups {
    /// Bullet-style pair test: each side's group must be in the other's mask.
    #[inline]
    #[must_use]
    pub fn passes(
        group_a: Self,
        mask_a: Self,
        group_b: Self,
        mask_b: Self,
    ) -> bool {
        group_a.intersects(mask_b) && group_b.intersects(mask_a)
    }
}

bitflags::bitflags! {
    /// What a debug drawer renders.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct DebugDrawModes: u32 {
        /// Shape wireframes.
        const WIREFRAME = 1;
        /// Bounding boxes.
        const AABB = 1 << 1;
        /// Feature labels.
        const FEATURES_TEXT = 1 << 2;
        /// Contact points.
        const CONTACT_POINTS = 1 << 3;
        /// Ignore deactivation when drawing.
        const NO_DEACTIVATION = 1 << 4;
        /// Constraint frames.
        const CONSTRAINTS = 1 << 11;
        /// Constraint limits.
        const CONSTRAINT_LIMITS = 1 << 12;
    }
}

/// Sleeping state of a collision object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ActivationState {
    /// Simulated.
    #[default]
    Active,
    /// Asleep; skipped by the integrator until woken.
    IslandSleeping,
    /// Below thresholds long enough to sleep next step.
    WantsDeactivation,
    /// Never sleeps.
    DisableDeactivation,
    /// Never simulated.
    DisableSimulation,
}

impl ActivationState {
    /// True if the integrator should move the object.
    #[inline]
    #[must_use]
    pub const fn is_awake(self) -> bool {
        matches!(self, Self::Active | Self::WantsDeactivation | Self::DisableDeactivation)
    }
}

// =============================================================================
// OBJECT DESCRIPTORS
// =============================================================================

/// Common fields of every collision object.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CollisionObjectDesc {
    /// Geometry.
    pub shape: CollisionShape,
    /// Initial world transform. Must have unit scale.
    pub transform: Transform,
    /// Behaviour flags.
    pub flags: CollisionFlags,
    /// Opaque host value returned by [`Kernel::user_index`](crate::Kernel::user_index).
    pub user_index: u32,
}

impl CollisionObjectDesc {
    /// Descriptor with default flags and user index 0.
    #[must_use]
    pub const fn new(shape: CollisionShape, transform: Transform) -> Self {
        Self {
            shape,
            transform,
            flags: CollisionFlags::empty(),
            user_index: 0,
        }
    }
}

/// Extra damping applied to slow bodies.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdditionalDamping {
    /// Multiplier applied below the thresholds.
    pub factor: f32,
    /// Squared linear speed threshold.
    pub linear_threshold_sqr: f32,
    /// Squared angular speed threshold.
    pub angular_threshold_sqr: f32,
    /// Angular damping multiplier.
    pub angular_factor: f32,
}

impl Default for AdditionalDamping {
    fn default() -> Self {
        Self {
            factor: 0.005,
            linear_threshold_sqr: 0.01,
            angular_threshold_sqr: 0.01,
            angular_factor: 0.01,
        }
    }
}

/// Material and damping parameters of a rigid body.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigidBodyProperties {
    /// Sliding friction.
    pub friction: f32,
    /// Rolling friction.
    pub rolling_friction: f32,
    /// Bounciness.
    pub restitution: f32,
    /// Linear damping in `[0, 1]`.
    pub linear_damping: f32,
    /// Angular damping in `[0, 1]`.
    pub angular_damping: f32,
    /// Linear speed below which the body may sleep.
    pub linear_sleeping_threshold: f32,
    /// Angular speed below which the body may sleep.
    pub angular_sleeping_threshold: f32,
    /// Per-axis linear velocity scale.
    pub linear_factor: Vec3,
    /// Per-axis angular velocity scale.
    pub angular_factor: Vec3,
    /// Optional extra damping. Fixed once the body exists.
    pub additional_damping: Option<AdditionalDamping>,
}

impl Default for RigidBodyProperties {
    fn default() -> Self {
        Self {
            friction: 0.5,
            rolling_friction: 0.0,
            restitution: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            linear_sleeping_threshold: DEFAULT_LINEAR_SLEEPING_THRESHOLD,
            angular_sleeping_threshold: DEFAULT_ANGULAR_SLEEPING_THRESHOLD,
            linear_factor: Vec3::ONE,
            angular_factor: Vec3::ONE,
            additional_damping: None,
        }
    }
}

/// Rigid body construction info.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RigidBodyDesc {
    /// Shape, transform, flags.
    pub object: CollisionObjectDesc,
    /// Mass; zero for static and kinematic bodies.
    pub mass: f32,
    /// Principal moments of inertia.
    pub local_inertia: Vec3,
    /// Motion state receiving interpolated transforms.
    pub motion_state: Option<NativeHandle>,
    /// Initial linear velocity.
    pub linear_velocity: Vec3,
    /// Initial angular velocity.
    pub angular_velocity: Vec3,
    /// Material and damping.
    pub properties: RigidBodyProperties,
}

/// Soft body construction info: a cloud of point masses.
#[derive(Clone, Debug, PartialEq)]
pub struct SoftBodyDesc {
    /// World info the body belongs to.
    pub world_info: NativeHandle,
    /// Node positions in local space.
    pub nodes: Vec<Vec3>,
    /// Total mass spread evenly across nodes.
    pub total_mass: f32,
    /// Placement of the node cloud.
    pub transform: Transform,
    /// Behaviour flags.
    pub flags: CollisionFlags,
    /// Opaque host value.
    pub user_index: u32,
}

/// Character controller construction info.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CharacterControllerDesc {
    /// Ghost object the controller moves.
    pub ghost: NativeHandle,
    /// Maximum step-up height.
    pub step_height: f32,
    /// Up direction.
    pub up: Vec3,
}

/// Joint type and frames.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConstraintKind {
    /// Ball joint.
    PointToPoint {
        /// Pivot in body A space.
        pivot_a: Vec3,
        /// Pivot in body B space (or world space when single-body).
        pivot_b: Vec3,
    },
    /// Single-axis hinge.
    Hinge {
        /// Pivot in body A space.
        pivot_a: Vec3,
        /// Pivot in body B space.
        pivot_b: Vec3,
        /// Axis in body A space.
        axis_a: Vec3,
        /// Axis in body B space.
        axis_b: Vec3,
    },
    /// Cone-twist joint.
    ConeTwist {
        /// Frame in body A space.
        frame_a: Transform,
        /// Frame in body B space.
        frame_b: Transform,
    },
    /// Welds the bodies together.
    Fixed {
        /// Frame in body A space.
        frame_a: Transform,
        /// Frame in body B space.
        frame_b: Transform,
    },
}

impl ConstraintKind {
    /// Short name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PointToPoint { .. } => "point_to_point",
            Self::Hinge { .. } => "hinge",
            Self::ConeTwist { .. } => "cone_twist",
            Self::Fixed { .. } => "fixed",
        }
    }
}

/// Constraint construction info.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstraintDesc {
    /// Joint type.
    pub kind: ConstraintKind,
    /// First rigid body.
    pub body_a: NativeHandle,
    /// Second rigid body, `None` to constrain against the world.
    pub body_b: Option<NativeHandle>,
    /// Impulse above which the joint breaks.
    pub breaking_impulse_threshold: f32,
}

// =============================================================================
// WORLD DESCRIPTORS
// =============================================================================

/// Broadphase construction info.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BroadphaseDesc {
    /// Variant.
    pub kind: BroadphaseKind,
    /// Bounds, used by sweep variants only.
    pub bounds: Aabb,
    /// Proxy limit, used by sweep variants only.
    pub max_proxies: u32,
}

impl BroadphaseDesc {
    /// Broadphase of `kind`; bounds are kept only for sweep variants.
    #[must_use]
    pub fn new(kind: BroadphaseKind, bounds: Aabb) -> Self {
        if kind.uses_bounds() {
            Self {
                kind,
                bounds,
                max_proxies: AXIS3_SWEEP_MAX_PROXIES,
            }
        } else {
            Self {
                kind,
                bounds: Aabb::default(),
                max_proxies: 0,
            }
        }
    }
}

/// Soft-body environment parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SoftBodyWorldInfoDesc {
    /// Air density.
    pub air_density: f32,
    /// Water density.
    pub water_density: f32,
    /// Water plane offset.
    pub water_offset: f32,
    /// Water plane normal.
    pub water_normal: Vec3,
    /// Gravity applied to nodes.
    pub gravity: Vec3,
    /// Dispatcher shared with the world.
    pub dispatcher: NativeHandle,
    /// Broadphase shared with the world.
    pub broadphase: NativeHandle,
}

/// World construction info.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldDesc {
    /// Capability tier.
    pub kind: WorldKind,
    /// Collision configuration.
    pub collision_configuration: NativeHandle,
    /// Dispatcher.
    pub dispatcher: NativeHandle,
    /// Broadphase.
    pub broadphase: NativeHandle,
    /// Constraint solver; required for dynamics worlds.
    pub solver: Option<NativeHandle>,
    /// Soft-body world info; required for soft-body worlds.
    pub soft_body_world_info: Option<NativeHandle>,
}

// =============================================================================
// CONTACTS
// =============================================================================

/// One contact between two objects.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContactPoint {
    /// Deepest point on A, world space.
    pub position_world_on_a: Vec3,
    /// Deepest point on B, world space.
    pub position_world_on_b: Vec3,
    /// Contact normal pointing from B to A.
    pub normal_world_on_b: Vec3,
    /// Signed separation; negative when penetrating.
    pub distance: f32,
}

/// Contacts between one pair of objects for the last step.
#[derive(Clone, Debug, PartialEq)]
pub struct PersistentManifold {
    /// First object.
    pub body0: NativeHandle,
    /// Second object.
    pub body1: NativeHandle,
    /// Contact points.
    pub contacts: Vec<ContactPoint>,
}

impl PersistentManifold {
    /// Number of contacts.
    #[inline]
    #[must_use]
    pub fn num_contacts(&self) -> usize {
        self.contacts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_kind_ordering() {
        assert!(!WorldKind::CollisionOnly.is_dynamics());
        assert!(WorldKind::RigidBodyDynamics.is_dynamics());
        assert!(WorldKind::SoftBodyAndRigidBody.is_dynamics());
        assert!(WorldKind::SoftBodyAndRigidBody.supports_soft_bodies());
        assert!(!WorldKind::MultiBody.supports_soft_bodies());
    }

    #[test]
    fn test_broadphase_bounds_only_for_sweep() {
        let bounds = Aabb::new(Vec3::splat(-5.0), Vec3::splat(5.0));
        let sweep = BroadphaseDesc::new(BroadphaseKind::Axis3Sweep, bounds);
        assert_eq!(sweep.bounds, bounds);
        assert_eq!(sweep.max_proxies, AXIS3_SWEEP_MAX_PROXIES);

        let tree = BroadphaseDesc::new(BroadphaseKind::DynamicAabb, bounds);
        assert_eq!(tree.bounds, Aabb::default());
        assert_eq!(tree.max_proxies, 0);
    }

    #[test]
    fn test_filter_pair_test() {
        use CollisionFilterGroups as G;
        assert!(G::passes(G::DEFAULT, G::ALL, G::STATIC, G::ALL));
        assert!(!G::passes(G::DEBRIS, G::STATIC, G::DEBRIS, G::STATIC));
        assert!(!G::passes(G::DEFAULT, G::ALL, G::STATIC, G::KINEMATIC));
    }
}
