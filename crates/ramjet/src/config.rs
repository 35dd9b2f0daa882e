//! # Configuration
//!
//! Plain values, loadable from TOML. Every field has a default, so an empty
//! file is a valid configuration.
//!
//! ```toml
//! [world]
//! world_kind = "soft_body_and_rigid_body"
//! broadphase = "axis3_sweep"
//! gravity = { x = 0.0, y = -9.8, z = 0.0 }
//!
//! [registry]
//! max_objects = 256
//!
//! [registry.execution_order]
//! controller = 20
//! effect = 10
//! ```

use crate::error::{PhysicsError, PhysicsResult};
use ramjet_kernel::{Aabb, BroadphaseKind, CollisionConfigKind, DebugDrawModes, WorldKind};
use ramjet_shared::constants::{
    DEFAULT_AIR_DENSITY, DEFAULT_FIXED_TIME_STEP, DEFAULT_GRAVITY, DEFAULT_MAX_BODIES,
    DEFAULT_MAX_OBJECTS, DEFAULT_MAX_SUB_STEPS, DEFAULT_POOL_GROWTH_STEP, DEFAULT_WATER_DENSITY,
    DEFAULT_WATER_NORMAL, DEFAULT_WATER_OFFSET, SOLVER_RANDOM_SEED,
};
use ramjet_shared::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Soft-body environment of a soft-body world.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoftBodyWorldSettings {
    /// Air density.
    pub air_density: f32,
    /// Water density.
    pub water_density: f32,
    /// Water plane offset.
    pub water_offset: f32,
    /// Water plane normal.
    pub water_normal: Vec3,
}

impl Default for SoftBodyWorldSettings {
    fn default() -> Self {
        Self {
            air_density: DEFAULT_AIR_DENSITY,
            water_density: DEFAULT_WATER_DENSITY,
            water_offset: DEFAULT_WATER_OFFSET,
            water_normal: DEFAULT_WATER_NORMAL,
        }
    }
}

/// Configuration of a [`PhysicsWorld`](crate::PhysicsWorld).
///
/// World kind, collision configuration, broadphase and bounds are frozen
/// once the world is initialized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Capability tier.
    pub world_kind: WorldKind,
    /// Collision configuration variant.
    pub collision_configuration: CollisionConfigKind,
    /// Broadphase variant.
    pub broadphase: BroadphaseKind,
    /// Bounds for sweep broadphases.
    pub broadphase_bounds: Aabb,
    /// World gravity.
    pub gravity: Vec3,
    /// Fixed sub-step length in seconds.
    pub fixed_time_step: f32,
    /// Maximum sub-steps per [`step`](crate::PhysicsWorld::step); 0 for a variable step.
    pub max_sub_steps: u32,
    /// Attach a debug drawer on initialize.
    pub debug_draw: bool,
    /// What the debug drawer renders.
    pub debug_draw_mode: DebugDrawModes,
    /// Seed of the constraint solver.
    pub solver_random_seed: u32,
    /// Size of the body table; body ids must be below it.
    pub max_bodies: usize,
    /// Soft-body environment, used by soft-body worlds only.
    pub soft_body: SoftBodyWorldSettings,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            world_kind: WorldKind::RigidBodyDynamics,
            collision_configuration: CollisionConfigKind::Default,
            broadphase: BroadphaseKind::DynamicAabb,
            broadphase_bounds: Aabb::default(),
            gravity: DEFAULT_GRAVITY,
            fixed_time_step: DEFAULT_FIXED_TIME_STEP,
            max_sub_steps: DEFAULT_MAX_SUB_STEPS,
            debug_draw: false,
            debug_draw_mode: DebugDrawModes::WIREFRAME,
            solver_random_seed: SOLVER_RANDOM_SEED,
            max_bodies: DEFAULT_MAX_BODIES,
            soft_body: SoftBodyWorldSettings::default(),
        }
    }
}

impl WorldConfig {
    /// Builds and validates a configuration from the frozen knobs.
    ///
    /// # Arguments
    ///
    /// * `world_kind` - Capability tier
    /// * `collision_configuration` - Collision configuration variant
    /// * `broadphase` - Broadphase variant
    /// * `bounds` - Broadphase bounds (sweep variants only)
    /// * `gravity` - World gravity
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::Config`] when the combination is invalid and
    /// has no safe correction.
    pub fn configure(
        world_kind: WorldKind,
        collision_configuration: CollisionConfigKind,
        broadphase: BroadphaseKind,
        bounds: Aabb,
        gravity: Vec3,
    ) -> PhysicsResult<Self> {
        Self {
            world_kind,
            collision_configuration,
            broadphase,
            broadphase_bounds: bounds,
            gravity,
            ..Self::default()
        }
        .validated()
    }

    /// Returns the configuration with safe corrections applied.
    ///
    /// A soft-body world paired with the rigid-only collision configuration
    /// is switched to the soft-body configuration and a warning is logged.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::Config`] for non-finite gravity, a non-positive
    /// fixed time step, invalid sweep bounds or an empty body table.
    pub fn validated(mut self) -> PhysicsResult<Self> {
        if self.world_kind.supports_soft_bodies()
            && self.collision_configuration != CollisionConfigKind::SoftBodyRigidBody
        {
            tracing::warn!(
                world_kind = ?self.world_kind,
                requested = ?self.collision_configuration,
                "soft body world requires the soft body collision configuration; correcting"
            );
            self.collision_configuration = CollisionConfigKind::SoftBodyRigidBody;
        }

        if !self.gravity.is_finite() {
            return Err(PhysicsError::Config(format!(
                "gravity {:?} is not finite",
                self.gravity
            )));
        }
        if !(self.fixed_time_step.is_finite() && self.fixed_time_step > 0.0) {
            return Err(PhysicsError::Config(format!(
                "fixed time step {} must be positive",
                self.fixed_time_step
            )));
        }
        if self.broadphase.uses_bounds() && !self.broadphase_bounds.is_valid() {
            return Err(PhysicsError::Config(format!(
                "{:?} broadphase needs valid bounds, got {:?}",
                self.broadphase, self.broadphase_bounds
            )));
        }
        if self.max_bodies == 0 {
            return Err(PhysicsError::Config("max_bodies must be at least 1".into()));
        }
        Ok(self)
    }
}

/// Configuration of a [`WorldEntryRegistry`](crate::WorldEntryRegistry).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Maximum concurrently registered objects.
    pub max_objects: usize,
    /// Entries constructed each time the pool runs dry.
    pub pool_growth_step: usize,
    /// Behaviour type key to priority. Higher priorities run first.
    pub execution_order: BTreeMap<String, i32>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_objects: DEFAULT_MAX_OBJECTS,
            pool_growth_step: DEFAULT_POOL_GROWTH_STEP,
            execution_order: BTreeMap::new(),
        }
    }
}

impl RegistryConfig {
    /// Registry config limited to `max_objects` entries.
    #[must_use]
    pub fn with_max_objects(max_objects: usize) -> Self {
        Self {
            max_objects,
            ..Self::default()
        }
    }
}

/// Top-level configuration file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RamjetConfig {
    /// World settings.
    pub world: WorldConfig,
    /// Registry settings.
    pub registry: RegistryConfig,
}

impl RamjetConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::Toml`] for malformed input and
    /// [`PhysicsError::Config`] for values that fail validation.
    pub fn from_toml_str(source: &str) -> PhysicsResult<Self> {
        let mut config: Self = toml::from_str(source)?;
        config.world = config.world.validated()?;
        if config.registry.max_objects == 0 {
            return Err(PhysicsError::Config("max_objects must be at least 1".into()));
        }
        Ok(config)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::Io`] if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> PhysicsResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| PhysicsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soft_world_config_is_corrected() {
        let config = WorldConfig::configure(
            WorldKind::SoftBodyAndRigidBody,
            CollisionConfigKind::Default,
            BroadphaseKind::DynamicAabb,
            Aabb::default(),
            DEFAULT_GRAVITY,
        )
        .unwrap();
        assert_eq!(
            config.collision_configuration,
            CollisionConfigKind::SoftBodyRigidBody
        );
    }

    #[test]
    fn test_bad_sweep_bounds_rejected() {
        let inverted = Aabb::new(Vec3::splat(10.0), Vec3::splat(-10.0));
        let result = WorldConfig::configure(
            WorldKind::RigidBodyDynamics,
            CollisionConfigKind::Default,
            BroadphaseKind::Axis3Sweep,
            inverted,
            DEFAULT_GRAVITY,
        );
        assert!(matches!(result, Err(PhysicsError::Config(_))));

        // Bounds are irrelevant to the tree broadphase
        assert!(WorldConfig::configure(
            WorldKind::RigidBodyDynamics,
            CollisionConfigKind::Default,
            BroadphaseKind::DynamicAabb,
            inverted,
            DEFAULT_GRAVITY,
        )
        .is_ok());
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = RamjetConfig::from_toml_str("").unwrap();
        assert_eq!(config, RamjetConfig::default());
    }

    #[test]
    fn test_toml_overrides() {
        let config = RamjetConfig::from_toml_str(
            r#"
            [world]
            world_kind = "soft_body_and_rigid_body"
            broadphase = "axis3_sweep"
            max_sub_steps = 0
            gravity = { x = 0.0, y = -1.62, z = 0.0 }

            [world.soft_body]
            water_density = 1000.0

            [registry]
            max_objects = 8

            [registry.execution_order]
            controller = 20
            effect = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.world.world_kind, WorldKind::SoftBodyAndRigidBody);
        assert_eq!(
            config.world.collision_configuration,
            CollisionConfigKind::SoftBodyRigidBody
        );
        assert_eq!(config.world.broadphase, BroadphaseKind::Axis3Sweep);
        assert_eq!(config.world.max_sub_steps, 0);
        assert_eq!(config.world.gravity.y, -1.62);
        assert_eq!(config.world.soft_body.water_density, 1000.0);
        assert_eq!(config.world.soft_body.air_density, DEFAULT_AIR_DENSITY);
        assert_eq!(config.registry.max_objects, 8);
        assert_eq!(config.registry.execution_order.get("controller"), Some(&20));
    }

    #[test]
    fn test_zero_objects_rejected() {
        let result = RamjetConfig::from_toml_str("[registry]\nmax_objects = 0\n");
        assert!(matches!(result, Err(PhysicsError::Config(_))));
    }
}
